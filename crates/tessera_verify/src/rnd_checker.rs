//! Random and exhaustive simulation-based equivalence checking.

use crate::checker::{CheckResult, Checker};
use crate::miter::{miter, MiterBinding};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tessera_model::{Context, SubnetId};
use tessera_sim::{Simulator, DATA_CHUNK_BITS};
use tracing::debug;

/// Simulates the miter with random 64-bit vectors or a full input sweep.
///
/// Supports up to 64 primary inputs. The exhaustive mode proves
/// equivalence; the random mode can only refute it or report `Unknown`.
pub struct RndChecker {
    tries: u64,
    exhaustive: bool,
    seed: u64,
}

impl RndChecker {
    /// A checker sweeping all `2^n` input patterns.
    pub fn exhaustive() -> Self {
        Self {
            tries: 0,
            exhaustive: true,
            seed: 0x5eed,
        }
    }

    /// A checker simulating `tries` random 64-bit chunks per input.
    pub fn random(tries: u64) -> Self {
        Self {
            tries,
            exhaustive: false,
            seed: 0x5eed,
        }
    }
}

/// Chunk values encoding patterns `round * 64 .. round * 64 + 63`: lane `t`
/// of input `i` carries bit `i` of pattern `round * 64 + t`.
fn sweep_chunk(n_in: usize, round: u64) -> Vec<u64> {
    let mut values = vec![0u64; n_in];
    for lane in 0..DATA_CHUNK_BITS as u64 {
        let pattern = round * DATA_CHUNK_BITS as u64 + lane;
        for (i, value) in values.iter_mut().enumerate() {
            if (pattern >> i) & 1 == 1 {
                *value |= 1 << lane;
            }
        }
    }
    values
}

/// Extracts the input assignment of the first failing lane.
fn extract_witness(values: &[u64], output: u64) -> Vec<u64> {
    let lane = output.trailing_zeros();
    values.iter().map(|v| (v >> lane) & 1).collect()
}

impl Checker for RndChecker {
    fn equivalent(
        &self,
        ctx: &Context,
        lhs: SubnetId,
        rhs: SubnetId,
        binding: &MiterBinding,
    ) -> CheckResult {
        let lhs = ctx.subnet(lhs);
        let rhs = ctx.subnet(rhs);
        let miter_id = match miter(ctx, &lhs, &rhs, binding) {
            Ok(id) => id,
            Err(err) => {
                debug!(%err, "miter construction failed");
                return CheckResult::error();
            }
        };
        let miter_net = ctx.subnet(miter_id);
        let n_in = miter_net.in_num();
        if n_in == 0 || n_in > DATA_CHUNK_BITS {
            debug!(n_in, "unsupported input width for simulation checking");
            return CheckResult::error();
        }

        let mut sim = match Simulator::new(&miter_net, ctx) {
            Ok(sim) => sim,
            Err(err) => {
                debug!(%err, "miter compilation failed");
                return CheckResult::error();
            }
        };

        if self.exhaustive {
            let patterns = 1u128 << n_in;
            let rounds = patterns.div_ceil(DATA_CHUNK_BITS as u128) as u64;
            for round in 0..rounds {
                let values = sweep_chunk(n_in, round);
                sim.simulate(&values);
                let mut output = sim.output(0);
                // Mask lanes beyond the pattern space on the last round.
                let used = patterns - round as u128 * DATA_CHUNK_BITS as u128;
                if used < DATA_CHUNK_BITS as u128 {
                    output &= (1u64 << used) - 1;
                }
                if output != 0 {
                    return CheckResult::not_equal(extract_witness(&values, output));
                }
            }
            return CheckResult::equal();
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        for _ in 0..self.tries {
            let values: Vec<u64> = (0..n_in).map(|_| rng.gen()).collect();
            sim.simulate(&values);
            let output = sim.output(0);
            if output != 0 {
                return CheckResult::not_equal(extract_witness(&values, output));
            }
        }
        CheckResult::unknown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::CheckStatus;
    use tessera_model::{CellSymbol, SubnetBuilder};

    fn net(ctx: &Context, symbol: CellSymbol, n: usize) -> SubnetId {
        let mut builder = SubnetBuilder::new(ctx);
        let inputs = builder.add_inputs(n);
        let gate = builder.add_cell(symbol, &inputs).unwrap();
        builder.add_output(gate).unwrap();
        builder.make().unwrap()
    }

    #[test]
    fn exhaustive_proves_equality() {
        let ctx = Context::new();
        let a = net(&ctx, CellSymbol::And, 3);
        let b = net(&ctx, CellSymbol::And, 3);
        let binding = MiterBinding::identity(&ctx.subnet(a), &ctx.subnet(b));
        let result = RndChecker::exhaustive().equivalent(&ctx, a, b, &binding);
        assert_eq!(result.status, CheckStatus::Equal);
    }

    #[test]
    fn exhaustive_finds_single_disagreement() {
        let ctx = Context::new();
        // AND and OR of 6 inputs differ on many patterns; AND3 vs MAJ3
        // differ on exactly three. Use the tighter pair.
        let a = net(&ctx, CellSymbol::And, 3);
        let b = net(&ctx, CellSymbol::Maj, 3);
        let binding = MiterBinding::identity(&ctx.subnet(a), &ctx.subnet(b));
        let result = RndChecker::exhaustive().equivalent(&ctx, a, b, &binding);
        assert_eq!(result.status, CheckStatus::NotEqual);
        let cex = result.counterexample.unwrap();
        assert_eq!(cex.iter().filter(|&&v| v == 1).count(), 2);
    }

    #[test]
    fn random_refutes_or_gives_unknown() {
        let ctx = Context::new();
        let a = net(&ctx, CellSymbol::And, 2);
        let b = net(&ctx, CellSymbol::Or, 2);
        let binding = MiterBinding::identity(&ctx.subnet(a), &ctx.subnet(b));
        let result = RndChecker::random(100).equivalent(&ctx, a, b, &binding);
        // 100 random chunks virtually always hit a mixed assignment.
        assert_eq!(result.status, CheckStatus::NotEqual);
    }

    #[test]
    fn random_unknown_on_equal_nets() {
        let ctx = Context::new();
        let a = net(&ctx, CellSymbol::Xor, 2);
        let b = net(&ctx, CellSymbol::Xor, 2);
        let binding = MiterBinding::identity(&ctx.subnet(a), &ctx.subnet(b));
        let result = RndChecker::random(10).equivalent(&ctx, a, b, &binding);
        assert_eq!(result.status, CheckStatus::Unknown);
    }

    #[test]
    fn wide_sweep_covers_more_than_one_round() {
        let ctx = Context::new();
        let a = net(&ctx, CellSymbol::Xor, 8);
        let b = net(&ctx, CellSymbol::Xor, 8);
        let binding = MiterBinding::identity(&ctx.subnet(a), &ctx.subnet(b));
        let result = RndChecker::exhaustive().equivalent(&ctx, a, b, &binding);
        assert_eq!(result.status, CheckStatus::Equal);
    }
}
