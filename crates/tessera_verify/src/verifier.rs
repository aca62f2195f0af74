//! Encode-once property verification.

use crate::encoder::{encode, encode_equal, encode_equal_const, EncoderContext, Property};
use crate::solver::{Solver, Var};
use tessera_common::CoreResult;
use tessera_model::{Context, Link, Subnet};

/// Checks properties of a single subnet against an incremental solver.
///
/// The subnet is encoded once at construction. Properties are created with
/// [`equals`](Verifier::equals)/[`equals_const`](Verifier::equals_const) and
/// asserted per query as solve assumptions, which leaves the solver state
/// untouched between checks.
pub struct Verifier {
    solver: Solver,
    ectx: EncoderContext,
}

impl Verifier {
    /// Encodes `subnet` and prepares the verifier.
    pub fn new(subnet: &Subnet, ctx: &Context) -> CoreResult<Self> {
        let mut solver = Solver::new();
        let mut ectx = EncoderContext::new(subnet);
        encode(subnet, ctx, &mut ectx, &mut solver)?;
        Ok(Self { solver, ectx })
    }

    /// The CNF variable of primary input `k`.
    pub fn input_var(&self, k: usize) -> Var {
        self.ectx.var(k, 0)
    }

    /// Builds the property `link == value`.
    pub fn equals_const(&mut self, link: Link, value: bool) -> Property {
        encode_equal_const(&mut self.solver, &self.ectx, link, value)
    }

    /// Builds the property `lhs == rhs`.
    pub fn equals(&mut self, lhs: Link, rhs: Link) -> Property {
        encode_equal(&mut self.solver, &self.ectx, lhs, rhs)
    }

    /// True if the property holds on every input assignment.
    ///
    /// With `inv` set, checks that the property is always false.
    pub fn check_always(&mut self, prop: &mut Property, inv: bool) -> CoreResult<bool> {
        prop.assert_onto(&mut self.solver);
        let assumption = if inv { prop.lit } else { !prop.lit };
        Ok(!self.solver.solve_with(&[assumption])?)
    }

    /// True if some input assignment makes the property hold.
    ///
    /// With `inv` set, looks for an assignment falsifying the property.
    pub fn check_eventually(&mut self, prop: &mut Property, inv: bool) -> CoreResult<bool> {
        prop.assert_onto(&mut self.solver);
        let assumption = if inv { !prop.lit } else { prop.lit };
        self.solver.solve_with(&[assumption])
    }

    /// Access to the underlying solver (model values, DIMACS dump).
    pub fn solver(&mut self) -> &mut Solver {
        &mut self.solver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_model::{CellSymbol, SubnetBuilder};

    #[test]
    fn tautology_checks() {
        let ctx = Context::new();
        let mut builder = SubnetBuilder::new(&ctx);
        let x = builder.add_input();
        // y = x & ~x == 0 (no NOT cell, polarity on the edge).
        let y = builder.add_cell(CellSymbol::And, &[x, !x]).unwrap();
        builder.add_output(y).unwrap();
        let subnet = ctx.subnet(builder.make().unwrap());

        let mut verifier = Verifier::new(&subnet, &ctx).unwrap();
        let out = subnet.out_link(0);
        let mut always_zero = verifier.equals_const(out, false);
        assert!(verifier.check_always(&mut always_zero, false).unwrap());

        let mut eventually_one = verifier.equals_const(out, true);
        assert!(!verifier.check_eventually(&mut eventually_one, false).unwrap());
    }

    #[test]
    fn satisfiable_property() {
        let ctx = Context::new();
        let mut builder = SubnetBuilder::new(&ctx);
        let inputs = builder.add_inputs(2);
        let and = builder.add_cell(CellSymbol::And, &inputs).unwrap();
        builder.add_output(and).unwrap();
        let subnet = ctx.subnet(builder.make().unwrap());

        let mut verifier = Verifier::new(&subnet, &ctx).unwrap();
        let out = subnet.out_link(0);
        let mut is_one = verifier.equals_const(out, true);
        assert!(verifier.check_eventually(&mut is_one, false).unwrap());
        assert!(!verifier.check_always(&mut is_one, false).unwrap());
        // The witness assigns both inputs to 1.
        let x0 = verifier.input_var(0);
        assert!(verifier.solver().value(x0));
    }

    #[test]
    fn equality_of_strash_twins() {
        let ctx = Context::new();
        let mut builder = SubnetBuilder::new(&ctx);
        let inputs = builder.add_inputs(2);
        let and0 = builder.add_cell(CellSymbol::And, &inputs).unwrap();
        let or0 = builder.add_cell(CellSymbol::Or, &inputs).unwrap();
        builder.add_output(and0).unwrap();
        builder.add_output(or0).unwrap();
        let subnet = ctx.subnet(builder.make().unwrap());

        let mut verifier = Verifier::new(&subnet, &ctx).unwrap();
        let mut equal = verifier.equals(subnet.out_link(0), subnet.out_link(1));
        // AND and OR differ on mixed inputs.
        assert!(!verifier.check_always(&mut equal, false).unwrap());
        assert!(verifier.check_eventually(&mut equal, false).unwrap());
    }

    #[test]
    fn inverted_check_direction() {
        let ctx = Context::new();
        let mut builder = SubnetBuilder::new(&ctx);
        let x = builder.add_input();
        let y = builder.add_cell(CellSymbol::Or, &[x, !x]).unwrap();
        builder.add_output(y).unwrap();
        let subnet = ctx.subnet(builder.make().unwrap());

        let mut verifier = Verifier::new(&subnet, &ctx).unwrap();
        let mut is_zero = verifier.equals_const(subnet.out_link(0), false);
        // y == 0 is always false.
        assert!(verifier.check_always(&mut is_zero, true).unwrap());
        assert!(!verifier.check_eventually(&mut is_zero, false).unwrap());
    }
}
