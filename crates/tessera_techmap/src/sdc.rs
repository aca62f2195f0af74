//! Design constraints handed to the mapper.

use serde::{Deserialize, Serialize};

/// Area and arrival-time bounds.
///
/// Unset bounds are represented by infinity and never constrain a mapping.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Sdc {
    /// Maximum allowed total cell area.
    pub area_max: f64,
    /// Maximum allowed arrival time at any primary output (in levels).
    pub arrival_time_max: f64,
}

impl Default for Sdc {
    fn default() -> Self {
        Self {
            area_max: f64::INFINITY,
            arrival_time_max: f64::INFINITY,
        }
    }
}

impl Sdc {
    /// A constraint set bounding only the area.
    pub fn with_area_max(area_max: f64) -> Self {
        Self {
            area_max,
            ..Self::default()
        }
    }

    /// True if `area` fits the budget.
    pub fn area_ok(&self, area: f64) -> bool {
        area <= self.area_max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unconstrained() {
        let sdc = Sdc::default();
        assert!(sdc.area_ok(1e12));
        assert!(sdc.arrival_time_max.is_infinite());
    }

    #[test]
    fn serde_roundtrip() {
        let sdc = Sdc {
            area_max: 100.0,
            arrival_time_max: 8.0,
        };
        let json = serde_json::to_string(&sdc).unwrap();
        let restored: Sdc = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.area_max, 100.0);
        assert_eq!(restored.arrival_time_max, 8.0);
    }
}
