//! One-level supergate composition.
//!
//! Feeds library cells into the pins of other library cells, materializes
//! each composition as a pattern subnet, and keeps the result only when no
//! cheaper pattern with the same truth table exists. This lets the mapper
//! cover functions (e.g. AND via INV over NAND) that no single cell
//! provides.

use crate::library::PatternAttr;
use std::collections::HashMap;
use tessera_common::{CoreResult, TruthTable};
use tessera_model::{evaluate, CellTypeId, Context, Link, SubnetBuilder, SubnetId};
use tracing::debug;

/// Upper bound on the inputs of a generated supergate.
const MAX_INPUTS: usize = 6;

/// Upper bound on generated supergates per library.
const MAX_SUPERGATES: usize = 512;

type BasePattern = (SubnetId, CellTypeId, PatternAttr);

/// Pin assignment: a fresh input or one base pattern.
type PinChoice = Option<usize>;

pub(crate) fn generate_supergates(
    ctx: &Context,
    base: &[BasePattern],
    existing: &HashMap<TruthTable, Vec<SubnetId>>,
    attrs: &HashMap<SubnetId, PatternAttr>,
) -> CoreResult<Vec<(SubnetId, TruthTable, PatternAttr)>> {
    let mut best_area: HashMap<TruthTable, f32> = HashMap::new();
    for (tt, ids) in existing {
        let min = ids
            .iter()
            .map(|id| attrs[id].area)
            .fold(f32::INFINITY, f32::min);
        best_area.insert(tt.clone(), min);
    }

    let mut results = Vec::new();
    for (outer_id, _, outer_attr) in base {
        let outer = ctx.subnet(*outer_id);
        let m = outer.in_num();
        let mut choices: Vec<PinChoice> = vec![None; m];
        enumerate_pins(
            ctx,
            base,
            &outer,
            outer_attr,
            &mut choices,
            0,
            &mut best_area,
            &mut results,
        )?;
        if results.len() >= MAX_SUPERGATES {
            debug!(limit = MAX_SUPERGATES, "supergate generation capped");
            break;
        }
    }
    Ok(results)
}

#[allow(clippy::too_many_arguments)]
fn enumerate_pins(
    ctx: &Context,
    base: &[BasePattern],
    outer: &tessera_model::Subnet,
    outer_attr: &PatternAttr,
    choices: &mut Vec<PinChoice>,
    pin: usize,
    best_area: &mut HashMap<TruthTable, f32>,
    results: &mut Vec<(SubnetId, TruthTable, PatternAttr)>,
) -> CoreResult<()> {
    if results.len() >= MAX_SUPERGATES {
        return Ok(());
    }
    if pin == choices.len() {
        // The all-fresh-inputs assignment is the base cell itself.
        if choices.iter().all(Option::is_none) {
            return Ok(());
        }
        let total: usize = choices
            .iter()
            .map(|c| c.map_or(1, |j| ctx.subnet(base[j].0).in_num()))
            .sum();
        if total > MAX_INPUTS {
            return Ok(());
        }
        materialize(ctx, base, outer, outer_attr, choices, best_area, results)?;
        return Ok(());
    }
    for choice in std::iter::once(None).chain((0..base.len()).map(Some)) {
        choices[pin] = choice;
        enumerate_pins(ctx, base, outer, outer_attr, choices, pin + 1, best_area, results)?;
    }
    choices[pin] = None;
    Ok(())
}

fn materialize(
    ctx: &Context,
    base: &[BasePattern],
    outer: &tessera_model::Subnet,
    outer_attr: &PatternAttr,
    choices: &[PinChoice],
    best_area: &mut HashMap<TruthTable, f32>,
    results: &mut Vec<(SubnetId, TruthTable, PatternAttr)>,
) -> CoreResult<()> {
    let total: usize = choices
        .iter()
        .map(|c| c.map_or(1, |j| ctx.subnet(base[j].0).in_num()))
        .sum();

    let mut builder = SubnetBuilder::new(ctx);
    let inputs = builder.add_inputs(total);
    let mut offset = 0usize;
    let mut pin_links: Vec<Link> = Vec::with_capacity(choices.len());
    let mut area = outer_attr.area;
    let mut delay = outer_attr.delay;
    let mut cells = outer_attr.cells;
    let mut pin_power: Vec<(f32, f32)> = Vec::new();
    let mut name_parts: Vec<String> = Vec::new();

    for (pin, choice) in choices.iter().enumerate() {
        match choice {
            None => {
                pin_links.push(inputs[offset]);
                pin_power.push(
                    outer_attr
                        .pin_power
                        .get(pin)
                        .copied()
                        .unwrap_or((0.0, 0.0)),
                );
                name_parts.push("*".to_string());
                offset += 1;
            }
            Some(j) => {
                let (inner_id, _, inner_attr) = &base[*j];
                let inner = ctx.subnet(*inner_id);
                let n = inner.in_num();
                let link =
                    builder.add_single_output_subnet(&inner, &inputs[offset..offset + n])?;
                pin_links.push(link);
                pin_power.extend(inner_attr.pin_power.iter().copied());
                name_parts.push(inner_attr.name.clone());
                area += inner_attr.area;
                delay = delay.max(outer_attr.delay + inner_attr.delay);
                cells += inner_attr.cells;
                offset += n;
            }
        }
    }

    let out = builder.add_single_output_subnet(outer, &pin_links)?;
    builder.add_output(out)?;
    let id = builder.make()?;
    let tt = match evaluate(&ctx.subnet(id), ctx)?.into_iter().next() {
        Some(tt) => tt,
        None => return Ok(()),
    };

    if let Some(&best) = best_area.get(&tt) {
        if best <= area {
            return Ok(());
        }
    }
    best_area.insert(tt.clone(), area);
    results.push((
        id,
        tt,
        PatternAttr {
            name: format!("{}({})", outer_attr.name, name_parts.join(",")),
            area,
            delay,
            pin_power,
            cells,
        },
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::library::test_support::nand_not_library;
    use tessera_common::TruthTable;
    use tessera_model::Context;

    #[test]
    fn inv_over_nand_yields_and() {
        let ctx = Context::new();
        let library = nand_not_library(&ctx);
        let and2 = TruthTable::from_u64(0b1000, 2);
        assert!(!library.patterns_for_tt(&and2).is_empty());
    }

    #[test]
    fn nand_over_invs_yields_or() {
        let ctx = Context::new();
        let library = nand_not_library(&ctx);
        // NAND2(INV(a), INV(b)) == a | b.
        let or2 = TruthTable::from_u64(0b1110, 2);
        let candidates = library.patterns_for_tt(&or2);
        assert!(!candidates.is_empty());
        let attr = library.attr(candidates[0]);
        assert_eq!(attr.cells, 3);
    }

    #[test]
    fn cheapest_pattern_wins() {
        let ctx = Context::new();
        let library = nand_not_library(&ctx);
        // The NAND function itself must stay the single-cell pattern.
        let nand2 = TruthTable::from_u64(0b0111, 2);
        let min_cells = library
            .patterns_for_tt(&nand2)
            .iter()
            .map(|&id| library.attr(id).cells)
            .min()
            .unwrap();
        assert_eq!(min_cells, 1);
    }
}
