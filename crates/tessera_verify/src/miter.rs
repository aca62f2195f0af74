//! Miter construction.
//!
//! The miter of two subnets shares one input layer, copies both fan-ins,
//! XORs every paired output, and OR-reduces the XORs into a single output
//! that is 1 iff the two nets disagree on some input.

use std::collections::HashMap;
use tessera_common::{CoreError, CoreResult};
use tessera_model::{CellSymbol, Context, Link, Subnet, SubnetBuilder, SubnetId};

/// Primary input/output pairing between two subnets.
#[derive(Clone, Debug)]
pub struct MiterBinding {
    /// Pairs of (lhs input entry, rhs input entry).
    pub inputs: Vec<(usize, usize)>,
    /// Pairs of (lhs output entry, rhs output entry).
    pub outputs: Vec<(usize, usize)>,
}

impl MiterBinding {
    /// Pairs the `k`-th input and output of both nets positionally.
    pub fn identity(lhs: &Subnet, rhs: &Subnet) -> Self {
        Self {
            inputs: (0..lhs.in_num().min(rhs.in_num())).map(|k| (k, k)).collect(),
            outputs: (0..lhs.out_num().min(rhs.out_num()))
                .map(|k| (lhs.out_entry(k), rhs.out_entry(k)))
                .collect(),
        }
    }
}

fn check_miterable(lhs: &Subnet, rhs: &Subnet, binding: &MiterBinding) -> CoreResult<()> {
    if lhs.in_num() != rhs.in_num() {
        return Err(CoreError::NotMiterable(format!(
            "input counts differ ({} vs {})",
            lhs.in_num(),
            rhs.in_num()
        )));
    }
    if lhs.out_num() != rhs.out_num() {
        return Err(CoreError::NotMiterable(format!(
            "output counts differ ({} vs {})",
            lhs.out_num(),
            rhs.out_num()
        )));
    }
    if binding.inputs.len() != lhs.in_num() || binding.inputs.is_empty() {
        return Err(CoreError::NotMiterable(format!(
            "binding covers {} of {} inputs",
            binding.inputs.len(),
            lhs.in_num()
        )));
    }
    if binding.outputs.len() != lhs.out_num() {
        return Err(CoreError::NotMiterable(format!(
            "binding covers {} of {} outputs",
            binding.outputs.len(),
            lhs.out_num()
        )));
    }
    Ok(())
}

/// Copies the interior of `net` into `builder`, extending `map`.
///
/// Output entries map to their (polarity-composed) driver links, so output
/// pairs can be consumed by the XOR layer.
fn copy_cells(
    net: &Subnet,
    builder: &mut SubnetBuilder,
    map: &mut HashMap<usize, Link>,
) -> CoreResult<()> {
    for (i, cell) in net.iter_cells() {
        if cell.is_in() {
            continue;
        }
        let links: Vec<Link> = net
            .links(i)
            .iter()
            .map(|l| {
                let mapped = map[&l.index()];
                Link {
                    idx: mapped.idx,
                    out: l.out,
                    inv: l.inv ^ mapped.inv,
                }
            })
            .collect();
        if cell.is_out() {
            map.insert(i, links[0]);
        } else {
            map.insert(i, builder.add_cell(cell.type_id, &links)?);
        }
    }
    Ok(())
}

/// Builds the miter of two subnets under an input/output binding.
pub fn miter(
    ctx: &Context,
    lhs: &Subnet,
    rhs: &Subnet,
    binding: &MiterBinding,
) -> CoreResult<SubnetId> {
    check_miterable(lhs, rhs, binding)?;

    let mut builder = SubnetBuilder::new(ctx);
    let mut map_l: HashMap<usize, Link> = HashMap::new();
    let mut map_r: HashMap<usize, Link> = HashMap::new();

    for &(li, ri) in &binding.inputs {
        let input = builder.add_input();
        map_l.insert(li, input);
        map_r.insert(ri, input);
    }

    copy_cells(lhs, &mut builder, &mut map_l)?;
    copy_cells(rhs, &mut builder, &mut map_r)?;

    let mut xors = Vec::with_capacity(binding.outputs.len());
    for &(lo, ro) in &binding.outputs {
        let xor = builder.add_cell(CellSymbol::Xor, &[map_l[&lo], map_r[&ro]])?;
        xors.push(xor);
    }
    let out = if xors.len() == 1 {
        xors[0]
    } else {
        builder.add_cell_tree(CellSymbol::Or, &xors, 2)?
    };
    builder.add_output(out)?;
    builder.make()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_sim::Simulator;

    fn and_net(ctx: &Context) -> SubnetId {
        let mut builder = SubnetBuilder::new(ctx);
        let inputs = builder.add_inputs(2);
        let and = builder.add_cell(CellSymbol::And, &inputs).unwrap();
        builder.add_output(and).unwrap();
        builder.make().unwrap()
    }

    fn nand_as_inverted_and(ctx: &Context) -> SubnetId {
        let mut builder = SubnetBuilder::new(ctx);
        let inputs = builder.add_inputs(2);
        let and = builder.add_cell(CellSymbol::And, &inputs).unwrap();
        builder.add_output(!and).unwrap();
        builder.make().unwrap()
    }

    #[test]
    fn miter_of_equal_nets_is_constant_zero() {
        let ctx = Context::new();
        let a = ctx.subnet(and_net(&ctx));
        let b = ctx.subnet(and_net(&ctx));
        let binding = MiterBinding::identity(&a, &b);
        let m = ctx.subnet(miter(&ctx, &a, &b, &binding).unwrap());

        let mut sim = Simulator::new(&m, &ctx).unwrap();
        for pattern in 0..4u64 {
            sim.simulate_pattern(pattern);
            assert_eq!(sim.output(0) & 1, 0);
        }
    }

    #[test]
    fn miter_flags_differing_nets() {
        let ctx = Context::new();
        let a = ctx.subnet(and_net(&ctx));
        let b = ctx.subnet(nand_as_inverted_and(&ctx));
        let binding = MiterBinding::identity(&a, &b);
        let m = ctx.subnet(miter(&ctx, &a, &b, &binding).unwrap());

        let mut sim = Simulator::new(&m, &ctx).unwrap();
        let mut saw_difference = false;
        for pattern in 0..4u64 {
            sim.simulate_pattern(pattern);
            saw_difference |= sim.output(0) & 1 == 1;
        }
        assert!(saw_difference);
    }

    #[test]
    fn multi_output_or_reduction() {
        let ctx = Context::new();
        let mut builder = SubnetBuilder::new(&ctx);
        let inputs = builder.add_inputs(2);
        let and = builder.add_cell(CellSymbol::And, &inputs).unwrap();
        let or = builder.add_cell(CellSymbol::Or, &inputs).unwrap();
        builder.add_output(and).unwrap();
        builder.add_output(or).unwrap();
        let a_id = builder.make().unwrap();
        let a = ctx.subnet(a_id);

        let binding = MiterBinding::identity(&a, &a);
        let m = ctx.subnet(miter(&ctx, &a, &a, &binding).unwrap());
        assert_eq!(m.out_num(), 1);

        let mut sim = Simulator::new(&m, &ctx).unwrap();
        for pattern in 0..4u64 {
            sim.simulate_pattern(pattern);
            assert_eq!(sim.output(0) & 1, 0);
        }
    }

    #[test]
    fn arity_mismatch_rejected() {
        let ctx = Context::new();
        let a = ctx.subnet(and_net(&ctx));
        let mut builder = SubnetBuilder::new(&ctx);
        let x = builder.add_input();
        builder.add_output(x).unwrap();
        let b = ctx.subnet(builder.make().unwrap());

        let binding = MiterBinding::identity(&a, &b);
        assert!(matches!(
            miter(&ctx, &a, &b, &binding),
            Err(CoreError::NotMiterable(_))
        ));
    }
}
