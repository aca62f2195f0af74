//! SAT-based equivalence checking.

use crate::checker::{CheckResult, Checker};
use crate::encoder::{encode, encode_equal_const, EncoderContext};
use crate::miter::{miter, MiterBinding};
use crate::solver::Solver;
use tessera_common::CoreError;
use tessera_model::{Context, SubnetId};
use tracing::debug;

/// Encodes the miter and asserts its output; `UNSAT` proves equivalence,
/// a model is a counterexample.
pub struct SatChecker;

impl Checker for SatChecker {
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

        let mut solver = Solver::new();
        let mut ectx = EncoderContext::new(&miter_net);
        if let Err(err) = encode(&miter_net, ctx, &mut ectx, &mut solver) {
            debug!(%err, "miter encoding failed");
            return CheckResult::error();
        }

        let mut prop = encode_equal_const(&mut solver, &ectx, miter_net.out_link(0), true);
        prop.assert_onto(&mut solver);
        match solver.solve_with(&[prop.lit]) {
            Ok(true) => {
                let counterexample = (0..miter_net.in_num())
                    .map(|k| u64::from(solver.value(ectx.var(k, 0))))
                    .collect();
                CheckResult::not_equal(counterexample)
            }
            Ok(false) => CheckResult::equal(),
            Err(CoreError::SolverTimeout) => CheckResult::unknown(),
            Err(err) => {
                debug!(%err, "SAT check failed");
                CheckResult::error()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::CheckStatus;
    use std::collections::HashMap;
    use tessera_model::{CellSymbol, ReplaceHooks, SubnetBuilder};

    #[test]
    fn xor_rewrite_preserves_function() {
        let ctx = Context::new();

        // Source: y = XOR(a, b).
        let mut builder = SubnetBuilder::new(&ctx);
        let inputs = builder.add_inputs(2);
        let xor = builder.add_cell(CellSymbol::Xor, &inputs).unwrap();
        builder.add_output(xor).unwrap();
        let before = builder.make().unwrap();

        // Rebuild the same net and rewrite it to OR(AND(a,~b), AND(~a,b)).
        let mut work = SubnetBuilder::new(&ctx);
        let inputs = work.add_inputs(2);
        let xor = work.add_cell(CellSymbol::Xor, &inputs).unwrap();
        work.add_output(xor).unwrap();

        let mut rhs = SubnetBuilder::new(&ctx);
        let rins = rhs.add_inputs(2);
        let and0 = rhs.add_cell(CellSymbol::And, &[rins[0], !rins[1]]).unwrap();
        let and1 = rhs.add_cell(CellSymbol::And, &[!rins[0], rins[1]]).unwrap();
        let or = rhs.add_cell(CellSymbol::Or, &[and0, and1]).unwrap();
        rhs.add_output(or).unwrap();
        let rhs = ctx.subnet(rhs.make().unwrap());

        let mut map = HashMap::from([
            (0, inputs[0].index()),
            (1, inputs[1].index()),
            (rhs.out_entry(0), xor.index()),
        ]);
        work.replace(&rhs, &mut map, None, ReplaceHooks::default())
            .unwrap();
        let after = work.make().unwrap();

        let binding = MiterBinding::identity(&ctx.subnet(before), &ctx.subnet(after));
        let result = SatChecker.equivalent(&ctx, before, after, &binding);
        assert_eq!(result.status, CheckStatus::Equal);
    }

    #[test]
    fn counterexample_is_a_real_witness() {
        let ctx = Context::new();
        let mut builder = SubnetBuilder::new(&ctx);
        let inputs = builder.add_inputs(2);
        let and = builder.add_cell(CellSymbol::And, &inputs).unwrap();
        builder.add_output(and).unwrap();
        let lhs = builder.make().unwrap();

        let mut builder = SubnetBuilder::new(&ctx);
        let inputs = builder.add_inputs(2);
        let or = builder.add_cell(CellSymbol::Or, &inputs).unwrap();
        builder.add_output(or).unwrap();
        let rhs = builder.make().unwrap();

        let binding = MiterBinding::identity(&ctx.subnet(lhs), &ctx.subnet(rhs));
        let result = SatChecker.equivalent(&ctx, lhs, rhs, &binding);
        assert_eq!(result.status, CheckStatus::NotEqual);
        let cex = result.counterexample.unwrap();
        // AND and OR differ exactly when the inputs are mixed.
        assert_eq!(cex.iter().filter(|&&v| v == 1).count(), 1);
    }
}
