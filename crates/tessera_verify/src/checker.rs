//! The common equivalence-checker contract.

use crate::bdd_checker::BddChecker;
use crate::miter::MiterBinding;
use crate::rnd_checker::RndChecker;
use crate::sat_checker::SatChecker;
use tessera_model::{Context, SubnetId};

/// Outcome of an equivalence check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckStatus {
    /// An internal error occurred.
    Error,
    /// The check could not decide (budget exhausted, random tries spent).
    Unknown,
    /// The nets are equivalent.
    Equal,
    /// The nets differ.
    NotEqual,
}

/// Result of an equivalence check, with a counterexample on `NotEqual`.
#[derive(Clone, Debug)]
pub struct CheckResult {
    /// Check outcome.
    pub status: CheckStatus,
    /// One 0/1 value per primary input witnessing the difference.
    pub counterexample: Option<Vec<u64>>,
}

impl CheckResult {
    /// The nets are equivalent.
    pub fn equal() -> Self {
        Self {
            status: CheckStatus::Equal,
            counterexample: None,
        }
    }

    /// The nets differ on the given input assignment.
    pub fn not_equal(counterexample: Vec<u64>) -> Self {
        Self {
            status: CheckStatus::NotEqual,
            counterexample: Some(counterexample),
        }
    }

    /// The check was inconclusive.
    pub fn unknown() -> Self {
        Self {
            status: CheckStatus::Unknown,
            counterexample: None,
        }
    }

    /// The check failed.
    pub fn error() -> Self {
        Self {
            status: CheckStatus::Error,
            counterexample: None,
        }
    }

    /// True if the status is `Equal`.
    pub fn is_equal(&self) -> bool {
        self.status == CheckStatus::Equal
    }
}

/// An equivalence checker over two published subnets.
pub trait Checker {
    /// Decides whether `lhs` and `rhs` compute the same function under the
    /// given input/output binding.
    fn equivalent(
        &self,
        ctx: &Context,
        lhs: SubnetId,
        rhs: SubnetId,
        binding: &MiterBinding,
    ) -> CheckResult;
}

/// Checker selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LecKind {
    /// SAT-based check over the encoded miter.
    Sat,
    /// BDD-based check of the miter function.
    Bdd,
    /// Random/exhaustive simulation of the miter.
    Rnd,
}

/// Creates a checker of the requested kind with default settings.
pub fn make_checker(kind: LecKind) -> Box<dyn Checker> {
    match kind {
        LecKind::Sat => Box::new(SatChecker),
        LecKind::Bdd => Box::new(BddChecker),
        LecKind::Rnd => Box::new(RndChecker::exhaustive()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_model::{CellSymbol, SubnetBuilder};

    /// Two implementations of maj(a, b, c): the MAJ3 cell and the
    /// three-AND-plus-OR expansion. Every checker kind must agree.
    fn maj_direct(ctx: &Context) -> SubnetId {
        let mut builder = SubnetBuilder::new(ctx);
        let inputs = builder.add_inputs(3);
        let maj = builder.add_cell(CellSymbol::Maj, &inputs).unwrap();
        builder.add_output(maj).unwrap();
        builder.make().unwrap()
    }

    fn maj_expanded(ctx: &Context) -> SubnetId {
        let mut builder = SubnetBuilder::new(ctx);
        let inputs = builder.add_inputs(3);
        let ab = builder
            .add_cell(CellSymbol::And, &[inputs[0], inputs[1]])
            .unwrap();
        let ac = builder
            .add_cell(CellSymbol::And, &[inputs[0], inputs[2]])
            .unwrap();
        let bc = builder
            .add_cell(CellSymbol::And, &[inputs[1], inputs[2]])
            .unwrap();
        let or = builder
            .add_cell_tree(CellSymbol::Or, &[ab, ac, bc], 2)
            .unwrap();
        builder.add_output(or).unwrap();
        builder.make().unwrap()
    }

    #[test]
    fn all_checkers_agree_on_majority() {
        let ctx = Context::new();
        let lhs = maj_direct(&ctx);
        let rhs = maj_expanded(&ctx);
        let binding = MiterBinding::identity(&ctx.subnet(lhs), &ctx.subnet(rhs));

        for kind in [LecKind::Sat, LecKind::Bdd, LecKind::Rnd] {
            let checker = make_checker(kind);
            let result = checker.equivalent(&ctx, lhs, rhs, &binding);
            assert_eq!(result.status, CheckStatus::Equal, "{kind:?} disagrees");
        }
    }

    #[test]
    fn random_tries_never_claim_inequality_of_equals() {
        let ctx = Context::new();
        let lhs = maj_direct(&ctx);
        let rhs = maj_expanded(&ctx);
        let binding = MiterBinding::identity(&ctx.subnet(lhs), &ctx.subnet(rhs));
        let checker = RndChecker::random(100);
        let result = checker.equivalent(&ctx, lhs, rhs, &binding);
        assert!(
            matches!(result.status, CheckStatus::Unknown | CheckStatus::Equal),
            "random sampling must not refute equal nets"
        );
    }

    #[test]
    fn all_checkers_find_differences() {
        let ctx = Context::new();
        let lhs = maj_direct(&ctx);
        let mut builder = SubnetBuilder::new(&ctx);
        let inputs = builder.add_inputs(3);
        let and = builder.add_cell(CellSymbol::And, &inputs).unwrap();
        builder.add_output(and).unwrap();
        let rhs = builder.make().unwrap();
        let binding = MiterBinding::identity(&ctx.subnet(lhs), &ctx.subnet(rhs));

        for kind in [LecKind::Sat, LecKind::Bdd, LecKind::Rnd] {
            let checker = make_checker(kind);
            let result = checker.equivalent(&ctx, lhs, rhs, &binding);
            assert_eq!(result.status, CheckStatus::NotEqual, "{kind:?} missed");
            let cex = result.counterexample.expect("counterexample expected");
            assert_eq!(cex.len(), 3);
            // maj(1,1,0) = 1 but and(1,1,0) = 0: the witness must be a real
            // disagreement.
            let ones = cex.iter().filter(|&&v| v == 1).count();
            assert!(ones == 2, "witness {cex:?} should set exactly two inputs");
        }
    }

    #[test]
    fn port_mismatch_reports_error() {
        let ctx = Context::new();
        let lhs = maj_direct(&ctx);
        let mut builder = SubnetBuilder::new(&ctx);
        let x = builder.add_input();
        builder.add_output(x).unwrap();
        let rhs = builder.make().unwrap();
        let binding = MiterBinding::identity(&ctx.subnet(lhs), &ctx.subnet(rhs));

        for kind in [LecKind::Sat, LecKind::Bdd, LecKind::Rnd] {
            let result = make_checker(kind).equivalent(&ctx, lhs, rhs, &binding);
            assert_eq!(result.status, CheckStatus::Error);
        }
    }
}
