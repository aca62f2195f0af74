//! The technology pattern library.
//!
//! Every combinational library cell is materialized as single-cell pattern
//! subnets, one per input permutation, keyed by truth table so matching is
//! order-agnostic. One-level supergate compositions widen the pattern set.
//! Sequential cells are grouped by symbol family for the sequential mapper.

use crate::supergate::generate_supergates;
use std::collections::HashMap;
use tessera_common::{CoreError, CoreResult, TruthTable};
use tessera_model::{evaluate, CellTypeId, Context, Link, SubnetBuilder, SubnetId};
use tracing::debug;

/// Per-pattern attributes: identity plus the physical figures the mapper
/// optimizes for.
#[derive(Clone, Debug)]
pub struct PatternAttr {
    /// Human-readable pattern name.
    pub name: String,
    /// Total area of the pattern's cells.
    pub area: f32,
    /// Worst pin-to-pin delay of the pattern.
    pub delay: f32,
    /// Rise/fall power per pattern input, flattened as `[rise, fall]` pairs.
    pub pin_power: Vec<(f32, f32)>,
    /// Number of library cells the pattern instantiates.
    pub cells: u32,
}

/// A truth-table keyed library of pattern subnets.
pub struct CellLibrary {
    by_tt: HashMap<TruthTable, Vec<SubnetId>>,
    attrs: HashMap<SubnetId, PatternAttr>,
    dff: Vec<(CellTypeId, PatternAttr)>,
    dffrs: Vec<(CellTypeId, PatternAttr)>,
    latch: Vec<(CellTypeId, PatternAttr)>,
}

/// Maximum cell arity expanded by permutation enumeration.
const MAX_PERMUTED_ARITY: usize = 6;

impl CellLibrary {
    /// Builds the library from registered cell types.
    ///
    /// Combinational types must carry an implementation subnet (their truth
    /// table comes from evaluating it). Sequential types are taken as-is.
    pub fn new(
        ctx: &Context,
        comb: &[CellTypeId],
        dffs: &[CellTypeId],
        dffrs: &[CellTypeId],
        latches: &[CellTypeId],
    ) -> CoreResult<Self> {
        let mut library = Self {
            by_tt: HashMap::new(),
            attrs: HashMap::new(),
            dff: Vec::new(),
            dffrs: Vec::new(),
            latch: Vec::new(),
        };

        let mut base = Vec::new();
        for &type_id in comb {
            library.add_comb_type(ctx, type_id, &mut base)?;
        }
        debug!(
            cells = comb.len(),
            patterns = library.attrs.len(),
            "expanded library cell permutations"
        );

        for (id, tt, attr) in generate_supergates(ctx, &base, &library.by_tt, &library.attrs)? {
            library.insert_pattern(id, tt, attr);
        }
        debug!(patterns = library.attrs.len(), "library ready");

        for &type_id in dffs {
            library.dff.push(seq_entry(ctx, type_id)?);
        }
        for &type_id in dffrs {
            library.dffrs.push(seq_entry(ctx, type_id)?);
        }
        for &type_id in latches {
            library.latch.push(seq_entry(ctx, type_id)?);
        }
        Ok(library)
    }

    fn add_comb_type(
        &mut self,
        ctx: &Context,
        type_id: CellTypeId,
        base: &mut Vec<(SubnetId, CellTypeId, PatternAttr)>,
    ) -> CoreResult<()> {
        let cell_type = ctx
            .try_cell_type(type_id)
            .ok_or_else(|| CoreError::InvalidCell("unregistered library type".to_string()))?;
        let n = cell_type.n_in as usize;
        if n > MAX_PERMUTED_ARITY {
            debug!(name = %cell_type.name, n, "skipping wide cell");
            return Ok(());
        }
        let attr = cell_type.attr.clone().unwrap_or_default();

        for (p, perm) in permutations(n).into_iter().enumerate() {
            let mut builder = SubnetBuilder::new(ctx);
            let inputs = builder.add_inputs(n);
            // Pattern input i drives cell pin perm[i].
            let mut pins = vec![Link::default(); n];
            for (i, &pin) in perm.iter().enumerate() {
                pins[pin] = inputs[i];
            }
            let cell = builder.add_cell(type_id, &pins)?;
            builder.add_output(cell)?;
            let id = builder.make()?;

            let tt = evaluate(&ctx.subnet(id), ctx)?
                .into_iter()
                .next()
                .ok_or_else(|| CoreError::InvalidCell(cell_type.name.clone()))?;

            let pin_power: Vec<(f32, f32)> = perm
                .iter()
                .map(|&pin| {
                    attr.pin_power
                        .get(pin)
                        .map(|pp| (pp.rise, pp.fall))
                        .unwrap_or((0.0, 0.0))
                })
                .collect();
            let pattern_attr = PatternAttr {
                name: cell_type.name.clone(),
                area: attr.area,
                delay: attr.delay,
                pin_power,
                cells: 1,
            };
            if p == 0 {
                base.push((id, type_id, pattern_attr.clone()));
            }
            self.insert_pattern(id, tt, pattern_attr);
        }
        Ok(())
    }

    fn insert_pattern(&mut self, id: SubnetId, tt: TruthTable, attr: PatternAttr) {
        self.by_tt.entry(tt).or_default().push(id);
        self.attrs.insert(id, attr);
    }

    /// Pattern subnets computing exactly the given function.
    pub fn patterns_for_tt(&self, tt: &TruthTable) -> &[SubnetId] {
        self.by_tt.get(tt).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Attributes of a pattern.
    pub fn attr(&self, id: SubnetId) -> &PatternAttr {
        &self.attrs[&id]
    }

    /// All stored patterns.
    pub fn patterns(&self) -> impl Iterator<Item = SubnetId> + '_ {
        self.attrs.keys().copied()
    }

    /// Library D flip-flops.
    pub fn dff(&self) -> &[(CellTypeId, PatternAttr)] {
        &self.dff
    }

    /// Library flip-flops with reset/set.
    pub fn dffrs(&self) -> &[(CellTypeId, PatternAttr)] {
        &self.dffrs
    }

    /// Library latches.
    pub fn latch(&self) -> &[(CellTypeId, PatternAttr)] {
        &self.latch
    }
}

fn seq_entry(ctx: &Context, type_id: CellTypeId) -> CoreResult<(CellTypeId, PatternAttr)> {
    let cell_type = ctx
        .try_cell_type(type_id)
        .ok_or_else(|| CoreError::InvalidCell("unregistered library type".to_string()))?;
    let attr = cell_type.attr.clone().unwrap_or_default();
    Ok((
        type_id,
        PatternAttr {
            name: cell_type.name.clone(),
            area: attr.area,
            delay: attr.delay,
            pin_power: attr.pin_power.iter().map(|p| (p.rise, p.fall)).collect(),
            cells: 1,
        },
    ))
}

/// All permutations of `0..n` (Heap's algorithm).
pub(crate) fn permutations(n: usize) -> Vec<Vec<usize>> {
    let mut current: Vec<usize> = (0..n).collect();
    let mut result = vec![current.clone()];
    let mut counters = vec![0usize; n];
    let mut i = 0;
    while i < n {
        if counters[i] < i {
            if i % 2 == 0 {
                current.swap(0, i);
            } else {
                current.swap(counters[i], i);
            }
            result.push(current.clone());
            counters[i] += 1;
            i = 0;
        } else {
            counters[i] = 0;
            i += 1;
        }
    }
    result
}
