//! Cost vectors, optimization criteria, and constraint penalties.
//!
//! A [`CostVector`] carries the three estimated design indicators (area,
//! delay, power). A [`Criterion`] pairs an objective over the vector with
//! per-indicator min/max constraints and a penalty formula applied to the
//! normalized constraint tension.

use serde::{Deserialize, Serialize};

/// Cost datatype.
pub type Cost = f32;

/// Epsilon for all floating-point comparisons in cost paths.
pub const COST_EPS: Cost = 1e-6;

/// Lower clamp of the constraint tension.
const TENSION_MIN: Cost = 0.001;

/// Upper clamp of the constraint tension.
const TENSION_MAX: Cost = 1000.0;

/// Penalty scale factor.
const LAMBDA: Cost = 0.2;

/// Estimated (predicted) design characteristics: `[area, delay, power]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CostVector(pub [Cost; 3]);

/// Indicator identifier: an index into a cost vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Indicator {
    /// Total area.
    Area = 0,
    /// Critical-path delay.
    Delay = 1,
    /// Switching power.
    Power = 2,
}

impl CostVector {
    /// The zero cost vector.
    pub const ZERO: CostVector = CostVector([0.0; 3]);

    /// Builds a vector from its three indicators.
    pub fn new(area: Cost, delay: Cost, power: Cost) -> Self {
        Self([area, delay, power])
    }

    /// Reads one indicator.
    pub fn get(&self, indicator: Indicator) -> Cost {
        self.0[indicator as usize]
    }

    /// Component-wise `(self - min) / (max - min)`, guarding degenerate
    /// ranges with the cost epsilon.
    pub fn normalize(&self, min: &CostVector, max: &CostVector) -> CostVector {
        let mut out = [0.0; 3];
        for i in 0..3 {
            let range = max.0[i] - min.0[i];
            out[i] = if range.abs() < COST_EPS {
                0.0
            } else {
                (self.0[i] - min.0[i]) / range
            };
        }
        CostVector(out)
    }

    /// Component-wise clamp into `[lo, hi]`.
    pub fn truncate(&self, lo: Cost, hi: Cost) -> CostVector {
        CostVector(self.0.map(|c| c.clamp(lo, hi)))
    }

    /// Component-wise power.
    fn pow(&self, p: Cost) -> CostVector {
        CostVector(self.0.map(|c| c.powf(p)))
    }

    /// Sum of the components.
    pub fn sum(&self) -> Cost {
        self.0.iter().sum()
    }

    /// True if both vectors agree within the cost epsilon.
    pub fn approx_eq(&self, other: &CostVector) -> bool {
        self.0
            .iter()
            .zip(other.0.iter())
            .all(|(a, b)| (a - b).abs() < COST_EPS)
    }
}

macro_rules! impl_componentwise {
    ($trait:ident, $method:ident, $op:tt) => {
        impl std::ops::$trait for CostVector {
            type Output = CostVector;

            fn $method(self, rhs: CostVector) -> CostVector {
                let mut out = [0.0; 3];
                for i in 0..3 {
                    out[i] = self.0[i] $op rhs.0[i];
                }
                CostVector(out)
            }
        }
    };
}

impl_componentwise!(Add, add, +);
impl_componentwise!(Sub, sub, -);
impl_componentwise!(Mul, mul, *);
impl_componentwise!(Div, div, /);

impl std::ops::Mul<Cost> for CostVector {
    type Output = CostVector;

    fn mul(self, rhs: Cost) -> CostVector {
        CostVector(self.0.map(|c| c * rhs))
    }
}

impl std::ops::Div<Cost> for CostVector {
    type Output = CostVector;

    fn div(self, rhs: Cost) -> CostVector {
        CostVector(self.0.map(|c| c / rhs))
    }
}

/// Objective function over a cost vector.
#[derive(Clone, Copy)]
pub enum Objective {
    /// Minimize a single indicator.
    Single(Indicator),
    /// Minimize an arbitrary pure function of the vector.
    Custom(fn(&CostVector) -> Cost),
}

impl Objective {
    /// Evaluates the objective.
    pub fn cost(&self, vector: &CostVector) -> Cost {
        match self {
            Objective::Single(indicator) => vector.get(*indicator),
            Objective::Custom(f) => f(vector),
        }
    }
}

/// Min/max constraint on one indicator.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Constraint {
    /// The constrained indicator.
    pub indicator: Indicator,
    /// Lower bound (usually 0).
    pub min: Cost,
    /// Upper bound.
    pub max: Cost,
}

impl Constraint {
    /// Upper-bound constraint with a zero lower bound.
    pub fn at_most(indicator: Indicator, max: Cost) -> Self {
        Self {
            indicator,
            min: 0.0,
            max,
        }
    }

    /// True if the vector satisfies the constraint (with epsilon slack).
    pub fn check(&self, vector: &CostVector) -> bool {
        let cost = vector.get(self.indicator);
        self.min - COST_EPS <= cost && cost <= self.max + COST_EPS
    }
}

/// A full constraint set (one per indicator at most).
pub type Constraints = Vec<Constraint>;

fn min_vector(constraints: &Constraints) -> CostVector {
    let mut out = CostVector::ZERO;
    for c in constraints {
        out.0[c.indicator as usize] = c.min;
    }
    out
}

fn max_vector(constraints: &Constraints) -> CostVector {
    let mut out = CostVector::ZERO;
    for c in constraints {
        out.0[c.indicator as usize] = c.max;
    }
    out
}

/// Penalty formula applied to the constraint tension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PenaltyKind {
    /// No penalty.
    Zero,
    /// `lambda * sum(t[i] * v[i])`.
    Linear,
    /// `lambda * sum(t[i]^2 * v[i])`.
    Quadratic,
    /// `lambda * sum(t[i]^3 * v[i])`.
    Cubic,
}

impl PenaltyKind {
    fn apply(self, vector: &CostVector, tension: &CostVector) -> Cost {
        let power = match self {
            PenaltyKind::Zero => return 0.0,
            PenaltyKind::Linear => 1.0,
            PenaltyKind::Quadratic => 2.0,
            PenaltyKind::Cubic => 3.0,
        };
        (tension.pow(power) * *vector).sum() * LAMBDA
    }
}

/// Optimization criterion: objective, constraints, and penalty formula.
pub struct Criterion {
    /// The objective to minimize.
    pub objective: Objective,
    /// Per-indicator bounds.
    pub constraints: Constraints,
    /// Penalty combining formula.
    pub penalty: PenaltyKind,
}

impl Criterion {
    /// Creates a criterion with the cubic penalty (the default formula).
    pub fn new(objective: Objective, constraints: Constraints) -> Self {
        Self {
            objective,
            constraints,
            penalty: PenaltyKind::Cubic,
        }
    }

    /// Normalizes a vector against the constraint bounds.
    pub fn normalize(&self, vector: &CostVector) -> CostVector {
        vector.normalize(&min_vector(&self.constraints), &max_vector(&self.constraints))
    }

    /// Constraint tension: the normalized vector clamped into the tension
    /// range.
    pub fn tension(&self, vector: &CostVector) -> CostVector {
        self.normalize(vector).truncate(TENSION_MIN, TENSION_MAX)
    }

    /// Raw objective value.
    pub fn cost(&self, vector: &CostVector) -> Cost {
        self.objective.cost(vector)
    }

    /// Penalty for the given vector.
    pub fn penalty(&self, vector: &CostVector) -> Cost {
        self.penalty.apply(vector, &self.tension(vector))
    }

    /// Objective plus penalty.
    pub fn penalized_cost(&self, vector: &CostVector) -> Cost {
        self.cost(vector) + self.penalty(vector)
    }

    /// True if all constraints hold.
    pub fn check(&self, vector: &CostVector) -> bool {
        self.constraints.iter().all(|c| c.check(vector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn componentwise_arithmetic() {
        let a = CostVector::new(1.0, 2.0, 3.0);
        let b = CostVector::new(2.0, 2.0, 2.0);
        assert_eq!(a + b, CostVector::new(3.0, 4.0, 5.0));
        assert_eq!(a - b, CostVector::new(-1.0, 0.0, 1.0));
        assert_eq!(a * b, CostVector::new(2.0, 4.0, 6.0));
        assert_eq!(a / b, CostVector::new(0.5, 1.0, 1.5));
        assert_eq!(a * 2.0, CostVector::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn normalize_and_truncate() {
        let v = CostVector::new(5.0, 50.0, 0.5);
        let min = CostVector::ZERO;
        let max = CostVector::new(10.0, 100.0, 1.0);
        let n = v.normalize(&min, &max);
        assert!(n.approx_eq(&CostVector::new(0.5, 0.5, 0.5)));
        let t = CostVector::new(-5.0, 0.5, 2000.0).truncate(0.001, 1000.0);
        assert!(t.approx_eq(&CostVector::new(0.001, 0.5, 1000.0)));
    }

    #[test]
    fn normalize_degenerate_range() {
        let v = CostVector::new(3.0, 0.0, 0.0);
        let n = v.normalize(&CostVector::ZERO, &CostVector::ZERO);
        assert!(n.approx_eq(&CostVector::ZERO));
    }

    #[test]
    fn objective_forms() {
        let v = CostVector::new(4.0, 7.0, 1.0);
        assert_eq!(Objective::Single(Indicator::Delay).cost(&v), 7.0);
        let mixed = Objective::Custom(|v| v.get(Indicator::Area) + v.get(Indicator::Power));
        assert_eq!(mixed.cost(&v), 5.0);
    }

    #[test]
    fn constraint_check_with_epsilon() {
        let c = Constraint::at_most(Indicator::Area, 10.0);
        assert!(c.check(&CostVector::new(10.0, 0.0, 0.0)));
        assert!(c.check(&CostVector::new(10.0 + 1e-7, 0.0, 0.0)));
        assert!(!c.check(&CostVector::new(10.1, 0.0, 0.0)));
    }

    #[test]
    fn penalty_orders() {
        let criterion = Criterion::new(
            Objective::Single(Indicator::Area),
            vec![
                Constraint::at_most(Indicator::Area, 10.0),
                Constraint::at_most(Indicator::Delay, 10.0),
                Constraint::at_most(Indicator::Power, 10.0),
            ],
        );
        let v = CostVector::new(20.0, 0.0, 0.0);
        let tension = criterion.tension(&v);
        // Area over budget -> tension at the area slot is 2.0.
        assert!((tension.get(Indicator::Area) - 2.0).abs() < COST_EPS);

        let linear = PenaltyKind::Linear.apply(&v, &tension);
        let cubic = PenaltyKind::Cubic.apply(&v, &tension);
        assert!(cubic > linear);
        assert_eq!(PenaltyKind::Zero.apply(&v, &tension), 0.0);
    }

    #[test]
    fn penalized_cost_adds_up() {
        let criterion = Criterion {
            objective: Objective::Single(Indicator::Area),
            constraints: vec![Constraint::at_most(Indicator::Area, 10.0)],
            penalty: PenaltyKind::Zero,
        };
        let v = CostVector::new(4.0, 0.0, 0.0);
        assert_eq!(criterion.penalized_cost(&v), 4.0);
        assert!(criterion.check(&v));
        assert!(!criterion.check(&CostVector::new(11.0, 0.0, 0.0)));
    }

    #[test]
    fn serde_roundtrip() {
        let v = CostVector::new(1.0, 2.0, 3.0);
        let json = serde_json::to_string(&v).unwrap();
        let restored: CostVector = serde_json::from_str(&json).unwrap();
        assert_eq!(v, restored);
    }
}
