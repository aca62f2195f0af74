//! Cost estimators.

use crate::activity::SimulationEstimator;
use crate::cost::CostVector;
use tessera_common::CoreResult;
use tessera_model::{Context, Subnet};

/// Produces a cost vector from a design artifact.
pub trait CostEstimator<T> {
    /// Estimates `[area, delay, power]` for the artifact.
    fn cost(&self, artifact: &T, ctx: &Context) -> CoreResult<CostVector>;
}

/// Logical characteristics of a subnet: the number of interior cells as
/// area, the depth as delay, and the switching-activity sum as power.
pub struct LogicEstimator {
    activity: SimulationEstimator,
}

impl Default for LogicEstimator {
    fn default() -> Self {
        Self {
            activity: SimulationEstimator::default(),
        }
    }
}

impl LogicEstimator {
    /// Creates an estimator using `vectors` random simulation vectors.
    pub fn new(vectors: usize) -> Self {
        Self {
            activity: SimulationEstimator::new(vectors),
        }
    }
}

impl CostEstimator<Subnet> for LogicEstimator {
    fn cost(&self, subnet: &Subnet, ctx: &Context) -> CoreResult<CostVector> {
        let cells = subnet
            .iter_cells()
            .filter(|(_, c)| !c.is_in() && !c.is_out())
            .count();
        let (_, depth) = subnet.path_length();
        let switching = self.activity.estimate(subnet, ctx)?.total();
        Ok(CostVector::new(cells as f32, depth as f32, switching as f32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::Indicator;
    use tessera_model::{CellSymbol, SubnetBuilder};

    #[test]
    fn logic_estimator_counts_cells_and_depth() {
        let ctx = Context::new();
        let mut builder = SubnetBuilder::new(&ctx);
        let inputs = builder.add_inputs(3);
        let and0 = builder.add_cell(CellSymbol::And, &inputs[..2]).unwrap();
        let and1 = builder
            .add_cell(CellSymbol::And, &[and0, inputs[2]])
            .unwrap();
        builder.add_output(and1).unwrap();
        let subnet = ctx.subnet(builder.make().unwrap());

        let cost = LogicEstimator::new(64).cost(&subnet, &ctx).unwrap();
        assert_eq!(cost.get(Indicator::Area), 2.0);
        assert_eq!(cost.get(Indicator::Delay), 2.0);
        assert!(cost.get(Indicator::Power) >= 0.0);
    }
}
