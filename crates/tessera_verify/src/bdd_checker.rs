//! BDD-based equivalence checking.

use crate::checker::{CheckResult, Checker};
use crate::miter::{miter, MiterBinding};
use biodivine_lib_bdd::{Bdd, BddVariable, BddVariableSet};
use tessera_common::{CoreError, CoreResult};
use tessera_model::{evaluate, CellSymbol, Context, Subnet, SubnetId};
use tracing::debug;

/// Builds a BDD for the miter output; the zero BDD proves equivalence.
pub struct BddChecker;

impl Checker for BddChecker {
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

        let variables = BddVariableSet::new_anonymous(miter_net.in_num() as u16);
        let out = match convert(&miter_net, ctx, &variables) {
            Ok(bdd) => bdd,
            Err(err) => {
                debug!(%err, "BDD conversion failed");
                return CheckResult::error();
            }
        };

        if out.is_false() {
            return CheckResult::equal();
        }
        match out.sat_witness() {
            Some(valuation) => {
                let counterexample = variables
                    .variables()
                    .iter()
                    .map(|&v| u64::from(valuation.value(v)))
                    .collect();
                CheckResult::not_equal(counterexample)
            }
            None => CheckResult::equal(),
        }
    }
}

/// Converts the single output of `subnet` into a BDD, bottom-up over the
/// storage order.
fn convert(subnet: &Subnet, ctx: &Context, variables: &BddVariableSet) -> CoreResult<Bdd> {
    let vars: Vec<BddVariable> = variables.variables();
    let mut nodes: Vec<Option<Bdd>> = vec![None; subnet.size()];
    let mut result = variables.mk_false();

    let input_of = |nodes: &[Option<Bdd>], link: tessera_model::Link| -> Bdd {
        let bdd = nodes[link.index()].as_ref().expect("topological order");
        if link.inv {
            bdd.not()
        } else {
            bdd.clone()
        }
    };

    let mut next_input = 0usize;
    for (i, cell) in subnet.iter_cells() {
        let bdd = match cell.symbol() {
            Some(CellSymbol::In) => {
                let bdd = variables.mk_var(vars[next_input]);
                next_input += 1;
                bdd
            }
            Some(CellSymbol::Out) => {
                result = input_of(&nodes, subnet.link(i, 0));
                continue;
            }
            Some(CellSymbol::Zero) => variables.mk_false(),
            Some(CellSymbol::One) => variables.mk_true(),
            Some(CellSymbol::Buf) => input_of(&nodes, subnet.link(i, 0)),
            Some(CellSymbol::And) => fold(subnet, &nodes, i, variables.mk_true(), Bdd::and),
            Some(CellSymbol::Or) => fold(subnet, &nodes, i, variables.mk_false(), Bdd::or),
            Some(CellSymbol::Xor) => fold(subnet, &nodes, i, variables.mk_false(), Bdd::xor),
            Some(CellSymbol::Maj) if cell.arity == 3 => {
                let x1 = input_of(&nodes, subnet.link(i, 0));
                let x2 = input_of(&nodes, subnet.link(i, 1));
                let x3 = input_of(&nodes, subnet.link(i, 2));
                x1.and(&x2).or(&x1.and(&x3)).or(&x2.and(&x3))
            }
            Some(sym) => {
                return Err(CoreError::EncoderUnsupported(sym.name().to_string()));
            }
            None => soft_cell_bdd(subnet, ctx, &nodes, i, variables)?,
        };
        nodes[i] = Some(bdd);
    }
    Ok(result)
}

fn fold(
    subnet: &Subnet,
    nodes: &[Option<Bdd>],
    i: usize,
    unit: Bdd,
    op: impl Fn(&Bdd, &Bdd) -> Bdd,
) -> Bdd {
    let mut acc = unit;
    for link in subnet.links(i) {
        let bdd = nodes[link.index()].as_ref().expect("topological order");
        let bdd = if link.inv { bdd.not() } else { bdd.clone() };
        acc = op(&acc, &bdd);
    }
    acc
}

/// A technology cell: expand its truth table over the input BDDs as a sum
/// of minterms.
fn soft_cell_bdd(
    subnet: &Subnet,
    ctx: &Context,
    nodes: &[Option<Bdd>],
    i: usize,
    variables: &BddVariableSet,
) -> CoreResult<Bdd> {
    let cell = subnet.cell(i);
    let cell_type = ctx
        .try_cell_type(cell.type_id)
        .ok_or_else(|| CoreError::EncoderUnsupported("unregistered type".to_string()))?;
    let inner_id = cell_type
        .subnet
        .ok_or_else(|| CoreError::EncoderUnsupported(cell_type.name.clone()))?;
    let inner = ctx.subnet(inner_id);
    let tt = evaluate(&inner, ctx)?
        .into_iter()
        .next()
        .ok_or_else(|| CoreError::EncoderUnsupported(cell_type.name.clone()))?;

    let inputs: Vec<Bdd> = subnet
        .links(i)
        .iter()
        .map(|&l| {
            let bdd = nodes[l.index()].as_ref().expect("topological order");
            if l.inv {
                bdd.not()
            } else {
                bdd.clone()
            }
        })
        .collect();

    let mut acc = variables.mk_false();
    for assignment in 0..tt.num_bits() {
        if !tt.get_bit(assignment) {
            continue;
        }
        let mut minterm = variables.mk_true();
        for (k, input) in inputs.iter().enumerate() {
            let factor = if (assignment >> k) & 1 == 1 {
                input.clone()
            } else {
                input.not()
            };
            minterm = minterm.and(&factor);
        }
        acc = acc.or(&minterm);
    }
    Ok(acc)
}
