//! Simulation-based switching-activity estimation.
//!
//! Runs the bit-parallel simulator over random input chunks and derives,
//! per entry, the number of observed 0->1 and 1->0 transitions and the
//! switching probability. The 64 lanes of each chunk are treated as a
//! stream of consecutive vectors.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tessera_common::CoreResult;
use tessera_model::{Context, Subnet};
use tessera_sim::{Simulator, DATA_CHUNK_BITS};

/// Per-entry switching statistics.
pub struct SwitchActivity {
    switches_on: Vec<u32>,
    switches_off: Vec<u32>,
    vectors: usize,
}

impl SwitchActivity {
    /// Number of observed 0->1 transitions at entry `i`.
    pub fn switches_on(&self, i: usize) -> u32 {
        self.switches_on[i]
    }

    /// Number of observed 1->0 transitions at entry `i`.
    pub fn switches_off(&self, i: usize) -> u32 {
        self.switches_off[i]
    }

    /// Probability that entry `i` toggles between consecutive vectors.
    pub fn switch_probability(&self, i: usize) -> f64 {
        if self.vectors <= 1 {
            return 0.0;
        }
        f64::from(self.switches_on[i] + self.switches_off[i]) / (self.vectors - 1) as f64
    }

    /// Sum of switching probabilities over all entries.
    pub fn total(&self) -> f64 {
        (0..self.switches_on.len())
            .map(|i| self.switch_probability(i))
            .sum()
    }
}

/// Estimates switching activity by random simulation.
pub struct SimulationEstimator {
    vectors: usize,
    seed: u64,
}

impl Default for SimulationEstimator {
    fn default() -> Self {
        Self {
            vectors: 256,
            seed: 0x5eed,
        }
    }
}

impl SimulationEstimator {
    /// Creates an estimator simulating `vectors` random input vectors.
    pub fn new(vectors: usize) -> Self {
        Self {
            vectors,
            ..Self::default()
        }
    }

    /// Estimates the switching activity of `subnet`.
    pub fn estimate(&self, subnet: &Subnet, ctx: &Context) -> CoreResult<SwitchActivity> {
        let mut sim = Simulator::new(subnet, ctx)?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let n = subnet.size();
        let mut activity = SwitchActivity {
            switches_on: vec![0; n],
            switches_off: vec![0; n],
            vectors: self.vectors,
        };

        let rounds = self.vectors.div_ceil(DATA_CHUNK_BITS);
        let mut last_bits: Vec<Option<u64>> = vec![None; n];
        for _ in 0..rounds {
            let inputs: Vec<u64> = (0..subnet.in_num()).map(|_| rng.gen()).collect();
            sim.simulate(&inputs);
            for i in 0..n {
                let chunk = sim.value(i);
                // Transitions within the chunk's lane stream.
                let rising = (chunk >> 1) & !chunk;
                let falling = !(chunk >> 1) & chunk;
                activity.switches_on[i] += (rising & !(1 << 63)).count_ones();
                activity.switches_off[i] += (falling & !(1 << 63)).count_ones();
                // Transition across the round boundary.
                if let Some(prev) = last_bits[i] {
                    let first = chunk & 1;
                    if prev == 0 && first == 1 {
                        activity.switches_on[i] += 1;
                    } else if prev == 1 && first == 0 {
                        activity.switches_off[i] += 1;
                    }
                }
                last_bits[i] = Some((chunk >> 63) & 1);
            }
        }
        Ok(activity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_model::{CellSymbol, SubnetBuilder};

    fn simple_net(ctx: &Context) -> Subnet {
        let mut builder = SubnetBuilder::new(ctx);
        let inputs = builder.add_inputs(2);
        let and = builder.add_cell(CellSymbol::And, &inputs).unwrap();
        builder.add_output(and).unwrap();
        let id = builder.make().unwrap();
        ctx.subnet(id).as_ref().clone()
    }

    #[test]
    fn deterministic_for_fixed_seed() {
        let ctx = Context::new();
        let subnet = simple_net(&ctx);
        let est = SimulationEstimator::new(256);
        let a = est.estimate(&subnet, &ctx).unwrap();
        let b = est.estimate(&subnet, &ctx).unwrap();
        for i in 0..subnet.size() {
            assert_eq!(a.switches_on(i), b.switches_on(i));
            assert_eq!(a.switches_off(i), b.switches_off(i));
        }
    }

    #[test]
    fn probability_in_unit_range() {
        let ctx = Context::new();
        let subnet = simple_net(&ctx);
        let activity = SimulationEstimator::new(256)
            .estimate(&subnet, &ctx)
            .unwrap();
        for i in 0..subnet.size() {
            let p = activity.switch_probability(i);
            assert!((0.0..=1.0).contains(&p), "p = {p} at entry {i}");
        }
        assert!(activity.total() > 0.0);
    }

    #[test]
    fn constant_never_switches() {
        let ctx = Context::new();
        let mut builder = SubnetBuilder::new(&ctx);
        let a = builder.add_input();
        let zero = builder.add_cell(CellSymbol::Zero, &[]).unwrap();
        let and = builder.add_cell(CellSymbol::And, &[a, zero]).unwrap();
        builder.add_output(and).unwrap();
        let subnet = ctx.subnet(builder.make().unwrap());
        let activity = SimulationEstimator::new(128)
            .estimate(&subnet, &ctx)
            .unwrap();
        assert_eq!(activity.switch_probability(and.index()), 0.0);
    }
}
