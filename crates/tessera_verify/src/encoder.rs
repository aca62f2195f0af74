//! Tseitin CNF encoding of subnets.
//!
//! The encoder walks a subnet in storage order and emits clauses for every
//! cell, one fresh Boolean variable per cell output. Soft cells are encoded
//! by recursively encoding their implementation subnet into the same solver
//! and binding the interface ports with BUF clauses.

use crate::solver::{Lit, Solver, Var};
use tessera_common::{CoreError, CoreResult};
use tessera_model::{CellSymbol, Context, Link, Subnet};

/// Variable assignment of one encoded subnet.
pub struct EncoderContext {
    vars: Vec<Vec<Var>>,
}

impl EncoderContext {
    /// Creates an empty context sized for `subnet`.
    pub fn new(subnet: &Subnet) -> Self {
        Self {
            vars: vec![Vec::new(); subnet.size()],
        }
    }

    /// The variable of output `out` of entry `idx`.
    pub fn var(&self, idx: usize, out: usize) -> Var {
        self.vars[idx][out]
    }

    /// A literal asserting that `link` carries `want_true`.
    pub fn lit(&self, link: Link, want_true: bool) -> Lit {
        Lit::new(
            self.var(link.index(), link.out as usize),
            want_true != link.inv,
        )
    }

    fn set_vars(&mut self, idx: usize, n_out: usize, solver: &mut Solver) {
        self.vars[idx] = (0..n_out).map(|_| solver.new_var()).collect();
    }
}

/// A lazily asserted property: auxiliary clauses plus a literal whose truth
/// means the property holds.
pub struct Property {
    /// The property literal.
    pub lit: Lit,
    clauses: Vec<Vec<Lit>>,
    added: bool,
}

impl Property {
    /// Adds the defining clauses to the solver (once).
    pub fn assert_onto(&mut self, solver: &mut Solver) {
        if self.added {
            return;
        }
        for clause in &self.clauses {
            solver.add_clause(clause);
        }
        self.added = true;
    }
}

/// Encodes `subnet` into `solver`, filling `ectx` with the variable map.
pub fn encode(
    subnet: &Subnet,
    ctx: &Context,
    ectx: &mut EncoderContext,
    solver: &mut Solver,
) -> CoreResult<()> {
    for (i, cell) in subnet.iter_cells() {
        match cell.symbol() {
            Some(CellSymbol::In) => ectx.set_vars(i, 1, solver),
            Some(CellSymbol::Zero) => {
                ectx.set_vars(i, 1, solver);
                let y = ectx.lit(Link::new(i), false);
                solver.add_clause(&[y]);
            }
            Some(CellSymbol::One) => {
                ectx.set_vars(i, 1, solver);
                let y = ectx.lit(Link::new(i), true);
                solver.add_clause(&[y]);
            }
            Some(CellSymbol::Buf) | Some(CellSymbol::Out) => {
                ectx.set_vars(i, 1, solver);
                let y = ectx.lit(Link::new(i), true);
                let x = ectx.lit(subnet.link(i, 0), true);
                solver.encode_buf(y, x);
            }
            Some(CellSymbol::And) => encode_and(subnet, i, ectx, solver, false),
            Some(CellSymbol::Or) => encode_and(subnet, i, ectx, solver, true),
            Some(CellSymbol::Xor) => encode_xor(subnet, i, ectx, solver),
            Some(CellSymbol::Maj) => encode_maj(subnet, i, cell.arity as usize, ectx, solver)?,
            Some(sym) => {
                return Err(CoreError::EncoderUnsupported(sym.name().to_string()));
            }
            None => encode_soft(subnet, i, ctx, ectx, solver)?,
        }
    }
    Ok(())
}

/// AND (or, via duality, OR) over any arity.
fn encode_and(subnet: &Subnet, i: usize, ectx: &mut EncoderContext, solver: &mut Solver, dual: bool) {
    let arity = subnet.cell(i).arity as usize;
    ectx.set_vars(i, 1, solver);
    let y = ectx.lit(Link::new(i), true);
    if arity == 1 {
        let x = ectx.lit(subnet.link(i, 0), true);
        solver.encode_buf(y, x);
        return;
    }

    // AND: (¬y ∨ x_i) for each input, (y ∨ ⋁ ¬x_i). OR is the dual.
    let mut wide = vec![if dual { !y } else { y }];
    for j in 0..arity {
        let x = ectx.lit(subnet.link(i, j), true);
        wide.push(if dual { x } else { !x });
        if dual {
            solver.add_clause(&[y, !x]);
        } else {
            solver.add_clause(&[!y, x]);
        }
    }
    solver.add_clause(&wide);
}

/// XOR as an associative chain with one auxiliary per pair.
fn encode_xor(subnet: &Subnet, i: usize, ectx: &mut EncoderContext, solver: &mut Solver) {
    let arity = subnet.cell(i).arity as usize;
    ectx.set_vars(i, 1, solver);
    let y = ectx.lit(Link::new(i), true);
    if arity == 1 {
        let x = ectx.lit(subnet.link(i, 0), true);
        solver.encode_buf(y, x);
        return;
    }

    let mut rhs = y;
    for j in 0..arity - 1 {
        let lhs1 = ectx.lit(subnet.link(i, j), true);
        let lhs2 = if j == arity - 2 {
            ectx.lit(subnet.link(i, j + 1), true)
        } else {
            solver.new_lit()
        };
        solver.encode_xor(rhs, lhs1, lhs2);
        rhs = lhs2;
    }
}

fn encode_maj(
    subnet: &Subnet,
    i: usize,
    arity: usize,
    ectx: &mut EncoderContext,
    solver: &mut Solver,
) -> CoreResult<()> {
    ectx.set_vars(i, 1, solver);
    let y = ectx.lit(Link::new(i), true);
    match arity {
        1 => {
            let x = ectx.lit(subnet.link(i, 0), true);
            solver.encode_buf(y, x);
            Ok(())
        }
        3 => {
            let a = ectx.lit(subnet.link(i, 0), true);
            let b = ectx.lit(subnet.link(i, 1), true);
            let c = ectx.lit(subnet.link(i, 2), true);
            solver.encode_maj(y, a, b, c);
            Ok(())
        }
        _ => Err(CoreError::EncoderUnsupported(format!("MAJ{arity}"))),
    }
}

/// A soft cell: encode the implementation subnet into the same solver and
/// bind the interface ports.
fn encode_soft(
    subnet: &Subnet,
    i: usize,
    ctx: &Context,
    ectx: &mut EncoderContext,
    solver: &mut Solver,
) -> CoreResult<()> {
    let cell = subnet.cell(i);
    let cell_type = ctx
        .try_cell_type(cell.type_id)
        .ok_or_else(|| CoreError::EncoderUnsupported("unregistered type".to_string()))?;
    let inner_id = cell_type
        .subnet
        .ok_or_else(|| CoreError::EncoderUnsupported(cell_type.name.clone()))?;
    let inner = ctx.subnet(inner_id);

    let mut inner_ectx = EncoderContext::new(&inner);
    encode(&inner, ctx, &mut inner_ectx, solver)?;

    ectx.set_vars(i, inner.out_num(), solver);

    // Inner input j <-> outer link j.
    for j in 0..inner.in_num() {
        let inner_lit = inner_ectx.lit(inner.input(j), true);
        let outer_lit = ectx.lit(subnet.link(i, j), true);
        solver.encode_buf(inner_lit, outer_lit);
    }
    // Outer output j <-> inner output entry j.
    for j in 0..inner.out_num() {
        let outer_lit = ectx.lit(Link::to_port(i, j as u8, false), true);
        let inner_lit = inner_ectx.lit(Link::new(inner.out_entry(j)), true);
        solver.encode_buf(outer_lit, inner_lit);
    }
    Ok(())
}

/// Builds the property `link == value`.
pub fn encode_equal_const(
    solver: &mut Solver,
    ectx: &EncoderContext,
    link: Link,
    value: bool,
) -> Property {
    let p = solver.new_lit();
    let l = ectx.lit(link, value);
    Property {
        lit: p,
        clauses: vec![vec![l, !p], vec![!l, p]],
        added: false,
    }
}

/// Builds the property `lhs == rhs` over two links.
pub fn encode_equal(solver: &mut Solver, ectx: &EncoderContext, lhs: Link, rhs: Link) -> Property {
    let p = solver.new_lit();
    let l1 = ectx.lit(lhs, true);
    let l2 = ectx.lit(rhs, true);
    Property {
        lit: p,
        clauses: vec![
            vec![l1, l2, p],
            vec![l1, !l2, !p],
            vec![!l1, l2, !p],
            vec![!l1, !l2, p],
        ],
        added: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_model::{CellAttr, CellType, SubnetBuilder};
    use tessera_sim::Simulator;

    fn encode_net(ctx: &Context, subnet: &Subnet) -> (EncoderContext, Solver) {
        let mut solver = Solver::new();
        let mut ectx = EncoderContext::new(subnet);
        encode(subnet, ctx, &mut ectx, &mut solver).unwrap();
        (ectx, solver)
    }

    /// CNF and simulator must agree on every input assignment.
    fn assert_cnf_matches_simulation(ctx: &Context, subnet: &Subnet) {
        let (ectx, mut solver) = encode_net(ctx, subnet);
        let mut sim = Simulator::new(subnet, ctx).unwrap();
        let n = subnet.in_num();
        for pattern in 0..(1u64 << n) {
            sim.simulate_pattern(pattern);
            let expected = sim.output(0) & 1 == 1;
            let mut assumptions = Vec::new();
            for i in 0..n {
                let bit = (pattern >> i) & 1 == 1;
                assumptions.push(ectx.lit(Link::new(i), bit));
            }
            assumptions.push(ectx.lit(Link::new(subnet.out_entry(0)), expected));
            assert!(
                solver.solve_with(&assumptions).unwrap(),
                "CNF disagrees with simulation on {pattern:b}"
            );
            assumptions.pop();
            assumptions.push(ectx.lit(Link::new(subnet.out_entry(0)), !expected));
            assert!(
                !solver.solve_with(&assumptions).unwrap(),
                "CNF admits wrong output on {pattern:b}"
            );
        }
    }

    #[test]
    fn gates_agree_with_simulation() {
        for symbol in [
            CellSymbol::And,
            CellSymbol::Or,
            CellSymbol::Xor,
            CellSymbol::Maj,
        ] {
            let ctx = Context::new();
            let mut builder = SubnetBuilder::new(&ctx);
            let inputs = builder.add_inputs(3);
            let gate = builder.add_cell(symbol, &inputs).unwrap();
            builder.add_output(gate).unwrap();
            let subnet = ctx.subnet(builder.make().unwrap());
            assert_cnf_matches_simulation(&ctx, &subnet);
        }
    }

    #[test]
    fn wide_xor_chain() {
        let ctx = Context::new();
        let mut builder = SubnetBuilder::new(&ctx);
        let inputs = builder.add_inputs(5);
        let gate = builder.add_cell(CellSymbol::Xor, &inputs).unwrap();
        builder.add_output(gate).unwrap();
        let subnet = ctx.subnet(builder.make().unwrap());
        assert_cnf_matches_simulation(&ctx, &subnet);
    }

    #[test]
    fn constants_and_polarity() {
        let ctx = Context::new();
        let mut builder = SubnetBuilder::new(&ctx);
        let a = builder.add_input();
        let one = builder.add_cell(CellSymbol::One, &[]).unwrap();
        let and = builder.add_cell(CellSymbol::And, &[!a, one]).unwrap();
        builder.add_output(and).unwrap();
        let subnet = ctx.subnet(builder.make().unwrap());
        assert_cnf_matches_simulation(&ctx, &subnet);
    }

    #[test]
    fn soft_cell_binding() {
        let ctx = Context::new();
        let mut inner = SubnetBuilder::new(&ctx);
        let ins = inner.add_inputs(2);
        let and = inner.add_cell(CellSymbol::And, &ins).unwrap();
        inner.add_output(!and).unwrap();
        let inner_id = inner.make().unwrap();
        let nand2 = ctx.register_type(CellType::library_cell(
            "NAND2",
            CellSymbol::Nand,
            2,
            Some(inner_id),
            CellAttr::default(),
        ));

        let mut builder = SubnetBuilder::new(&ctx);
        let inputs = builder.add_inputs(2);
        let cell = builder.add_cell(nand2, &inputs).unwrap();
        builder.add_output(cell).unwrap();
        let subnet = ctx.subnet(builder.make().unwrap());
        assert_cnf_matches_simulation(&ctx, &subnet);
    }

    #[test]
    fn sequential_rejected() {
        let ctx = Context::new();
        let mut builder = SubnetBuilder::new(&ctx);
        let d = builder.add_input();
        let clk = builder.add_input();
        let q = builder.add_cell(CellSymbol::Dff, &[d, clk]).unwrap();
        builder.add_output(q).unwrap();
        let subnet = ctx.subnet(builder.make().unwrap());
        let mut solver = Solver::new();
        let mut ectx = EncoderContext::new(&subnet);
        assert!(matches!(
            encode(&subnet, &ctx, &mut ectx, &mut solver),
            Err(CoreError::EncoderUnsupported(_))
        ));
    }

    #[test]
    fn property_clauses_added_once() {
        let ctx = Context::new();
        let mut builder = SubnetBuilder::new(&ctx);
        let a = builder.add_input();
        builder.add_output(a).unwrap();
        let subnet = ctx.subnet(builder.make().unwrap());
        let (ectx, mut solver) = encode_net(&ctx, &subnet);
        let mut prop = encode_equal_const(&mut solver, &ectx, Link::new(0), true);
        let before = solver.num_clauses();
        prop.assert_onto(&mut solver);
        let after = solver.num_clauses();
        prop.assert_onto(&mut solver);
        assert_eq!(solver.num_clauses(), after);
        assert!(after > before);
    }
}
