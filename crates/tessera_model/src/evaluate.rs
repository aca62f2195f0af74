//! Truth-table evaluation of frozen subnets.
//!
//! Walks a subnet in storage order and computes one [`TruthTable`] per
//! primary output over the primary inputs. Soft cells are evaluated by
//! recursing into their implementation subnets.

use crate::celltype::CellSymbol;
use crate::context::Context;
use crate::subnet::{Link, Subnet};
use tessera_common::{CoreError, CoreResult, TruthTable};

/// Computes the truth tables of all outputs of `subnet`.
///
/// Fails with `EncoderUnsupported` on sequential or opaque cells and on
/// soft operators without an implementation subnet.
pub fn evaluate(subnet: &Subnet, ctx: &Context) -> CoreResult<Vec<TruthTable>> {
    let n = subnet.in_num();
    let mut tables: Vec<Option<Vec<TruthTable>>> = vec![None; subnet.size()];
    let mut outputs = Vec::with_capacity(subnet.out_num());

    let table_of = |tables: &[Option<Vec<TruthTable>>], link: Link| -> TruthTable {
        let columns = tables[link.index()]
            .as_ref()
            .expect("source evaluated before use");
        let tt = &columns[link.out as usize];
        if link.inv {
            tt.not()
        } else {
            tt.clone()
        }
    };

    let mut next_input = 0usize;
    for (i, cell) in subnet.iter_cells() {
        let symbol = cell.symbol();
        let columns = match symbol {
            Some(CellSymbol::In) => {
                let tt = TruthTable::var(next_input, n);
                next_input += 1;
                vec![tt]
            }
            Some(CellSymbol::Out) => {
                outputs.push(table_of(&tables, subnet.link(i, 0)));
                continue;
            }
            Some(CellSymbol::Zero) => vec![TruthTable::zeros(n)],
            Some(CellSymbol::One) => vec![TruthTable::ones(n)],
            Some(CellSymbol::Buf) => vec![table_of(&tables, subnet.link(i, 0))],
            Some(CellSymbol::And) => vec![fold(subnet, &tables, i, n, TruthTable::ones, |a, b| {
                a.and(b)
            })],
            Some(CellSymbol::Or) => vec![fold(subnet, &tables, i, n, TruthTable::zeros, |a, b| {
                a.or(b)
            })],
            Some(CellSymbol::Xor) => vec![fold(subnet, &tables, i, n, TruthTable::zeros, |a, b| {
                a.xor(b)
            })],
            Some(CellSymbol::Maj) => vec![majority(subnet, &tables, i, n)?],
            Some(sym) => {
                return Err(CoreError::EncoderUnsupported(sym.name().to_string()));
            }
            None => {
                let cell_type = ctx
                    .try_cell_type(cell.type_id)
                    .ok_or_else(|| CoreError::InvalidCell("unregistered type".to_string()))?;
                let inner_id = cell_type.subnet.ok_or_else(|| {
                    CoreError::EncoderUnsupported(cell_type.name.clone())
                })?;
                let inner = ctx.subnet(inner_id);
                let inner_tables = evaluate(&inner, ctx)?;
                // Substitute the cell's input functions into the inner tables.
                let inputs: Vec<TruthTable> = subnet
                    .links(i)
                    .iter()
                    .map(|&l| table_of(&tables, l))
                    .collect();
                inner_tables
                    .iter()
                    .map(|tt| compose(tt, &inputs, n))
                    .collect()
            }
        };
        tables[i] = Some(columns);
    }

    Ok(outputs)
}

fn fold(
    subnet: &Subnet,
    tables: &[Option<Vec<TruthTable>>],
    i: usize,
    n: usize,
    unit: impl Fn(usize) -> TruthTable,
    op: impl Fn(&TruthTable, &TruthTable) -> TruthTable,
) -> TruthTable {
    let mut acc = unit(n);
    for link in subnet.links(i) {
        let columns = tables[link.index()].as_ref().expect("topological order");
        let tt = &columns[link.out as usize];
        let tt = if link.inv { tt.not() } else { tt.clone() };
        acc = op(&acc, &tt);
    }
    acc
}

fn majority(
    subnet: &Subnet,
    tables: &[Option<Vec<TruthTable>>],
    i: usize,
    n: usize,
) -> CoreResult<TruthTable> {
    let links = subnet.links(i);
    if links.len() % 2 == 0 {
        return Err(CoreError::InvalidCell(format!(
            "MAJ arity must be odd, got {}",
            links.len()
        )));
    }
    let inputs: Vec<TruthTable> = links
        .iter()
        .map(|&l| {
            let tt = &tables[l.index()].as_ref().expect("topological order")[l.out as usize];
            if l.inv {
                tt.not()
            } else {
                tt.clone()
            }
        })
        .collect();
    let mut result = TruthTable::zeros(n);
    let threshold = links.len() / 2;
    for b in 0..result.num_bits() {
        let weight = inputs.iter().filter(|tt| tt.get_bit(b)).count();
        if weight > threshold {
            result.set_bit(b, true);
        }
    }
    Ok(result)
}

/// Substitutes `inputs` (functions over `n` outer variables) into `inner`.
fn compose(inner: &TruthTable, inputs: &[TruthTable], n: usize) -> TruthTable {
    debug_assert_eq!(inner.num_vars(), inputs.len());
    let mut result = TruthTable::zeros(n);
    for b in 0..result.num_bits() {
        let mut index = 0usize;
        for (k, input) in inputs.iter().enumerate() {
            if input.get_bit(b) {
                index |= 1 << k;
            }
        }
        if inner.get_bit(index) {
            result.set_bit(b, true);
        }
    }
    result
}
