//! The cut-based combinational mapper.
//!
//! Mapping proceeds in passes over a frozen AND/inverter subnet:
//!
//! 1. A traditional depth pass assigns every AND/BUF node the cut and
//!    library pattern minimizing its level (ties broken by area, then
//!    pin power).
//! 2. Required times propagate backwards from the latest primary-output
//!    arrival (tightened by the SDC bound when feasible).
//! 3. Global area-flow recovery re-chooses cuts minimizing the area flow
//!    under the required-time constraint, tie-broken by switch flow.
//! 4. Local exact-area recovery commits swaps whose ref/deref-accounted
//!    exact area improves.
//!
//! The cover is then rebuilt by splicing the chosen pattern subnets over
//! their leaves. Inputs, outputs, and constants pass through; non-AND
//! interior cells are kept verbatim; sequential cells go through the
//! sequential mapper.

use crate::library::CellLibrary;
use crate::sdc::Sdc;
use crate::seq_mapper::{SequentialMapper, Strategy};
use std::collections::HashMap;
use tessera_common::{CoreError, CoreResult};
use tessera_model::{evaluate, CellSymbol, Context, Link, Subnet, SubnetBuilder, SubnetId};
use tessera_opt::{ConeBuilder, Cut, CutExtractor, SimulationEstimator, SwitchActivity};
use tracing::{debug, warn};

const FLOW_EPS: f64 = 1e-6;

/// Summary of a finished mapping.
#[derive(Clone, Copy, Debug)]
pub struct MapReport {
    /// Sum of the areas of all instantiated library patterns.
    pub area: f64,
    /// Largest level over all primary-output drivers.
    pub depth: u32,
}

/// Cut-based technology mapper.
pub struct CutMapper {
    /// Target cut size (leaves per cut).
    pub cut_size: usize,
    /// Cuts kept per node during enumeration.
    pub cut_limit: usize,
    /// Strategy for mapping sequential cells.
    pub seq_strategy: Strategy,
}

impl Default for CutMapper {
    fn default() -> Self {
        Self {
            cut_size: 6,
            cut_limit: 16,
            seq_strategy: Strategy::Area,
        }
    }
}

#[derive(Clone, PartialEq)]
enum Choice {
    /// Inputs, outputs, constants: carried over unchanged.
    PassThrough,
    /// Interior cell kept verbatim (non-AND gates, sequential cells,
    /// nodes without any library cover).
    Keep,
    /// Covered by a library pattern over the given leaves.
    Pattern {
        pattern: SubnetId,
        leaves: Vec<usize>,
    },
}

#[derive(Clone)]
struct NodeState {
    level: u32,
    required: u32,
    area_flow: f64,
    switch_flow: f64,
    refs: i32,
}

impl Default for NodeState {
    fn default() -> Self {
        Self {
            level: 0,
            required: u32::MAX,
            area_flow: f64::INFINITY,
            switch_flow: f64::INFINITY,
            refs: 0,
        }
    }
}

struct MapSession<'a> {
    ctx: &'a Context,
    subnet: &'a Subnet,
    library: &'a CellLibrary,
    extractor: CutExtractor,
    activity: Option<SwitchActivity>,
    choice: Vec<Choice>,
    state: Vec<NodeState>,
    mappable: Vec<usize>,
    is_mappable: Vec<bool>,
}

impl CutMapper {
    /// Maps `subnet_id` onto the library, honoring the SDC bounds.
    pub fn map(
        &self,
        ctx: &Context,
        subnet_id: SubnetId,
        library: &CellLibrary,
        sdc: &Sdc,
    ) -> CoreResult<SubnetId> {
        Ok(self.map_with_report(ctx, subnet_id, library, sdc)?.0)
    }

    /// Maps `subnet_id` and returns the mapped subnet with a report.
    pub fn map_with_report(
        &self,
        ctx: &Context,
        subnet_id: SubnetId,
        library: &CellLibrary,
        sdc: &Sdc,
    ) -> CoreResult<(SubnetId, MapReport)> {
        let subnet = ctx.subnet(subnet_id);
        let extractor = CutExtractor::with_limit(&subnet, self.cut_size, self.cut_limit);
        let activity = match SimulationEstimator::default().estimate(&subnet, ctx) {
            Ok(activity) => Some(activity),
            Err(err) => {
                debug!(%err, "switching estimation unavailable, power ties ignored");
                None
            }
        };

        let mut session = MapSession {
            ctx,
            subnet: &subnet,
            library,
            extractor,
            activity,
            choice: vec![Choice::PassThrough; subnet.size()],
            state: vec![NodeState::default(); subnet.size()],
            mappable: Vec::new(),
            is_mappable: vec![false; subnet.size()],
        };

        session.classify();
        session.depth_pass()?;
        session.init_refs();
        session.compute_required(sdc);
        session.area_flow_pass()?;
        session.exact_area_pass()?;
        let (mapped, report) = session.rebuild(self.seq_strategy)?;

        if !sdc.area_ok(report.area) {
            warn!(
                area = report.area,
                budget = sdc.area_max,
                "mapped area exceeds the SDC budget"
            );
        }
        Ok((mapped, report))
    }
}

impl<'a> MapSession<'a> {
    fn classify(&mut self) {
        for (i, cell) in self.subnet.iter_cells() {
            if cell.is_in() || cell.is_out() || cell.is_const() {
                continue;
            }
            match cell.symbol() {
                Some(CellSymbol::And) | Some(CellSymbol::Buf) => {
                    self.mappable.push(i);
                    self.is_mappable[i] = true;
                }
                _ => {
                    self.choice[i] = Choice::Keep;
                }
            }
        }
    }

    fn leaf_level(&self, leaf: usize) -> u32 {
        self.state[leaf].level
    }

    fn cut_level(&self, cut: &Cut) -> u32 {
        1 + cut
            .leaves
            .iter()
            .map(|&l| self.leaf_level(l))
            .max()
            .unwrap_or(0)
    }

    /// Truth table of the cone over `cut`, in leaf order.
    fn cone_tt(&self, cut: &Cut) -> CoreResult<tessera_common::TruthTable> {
        let cone = ConeBuilder::new(self.ctx, self.subnet).cone(cut)?;
        let tables = evaluate(&self.ctx.subnet(cone.subnet), self.ctx)?;
        tables
            .into_iter()
            .next()
            .ok_or(CoreError::LibraryMiss(cut.root))
    }

    /// Pin-power figure of a candidate on a cut, weighted by switching.
    fn candidate_power(&self, pattern: SubnetId, cut: &Cut) -> f64 {
        let Some(activity) = &self.activity else {
            return 0.0;
        };
        let attr = self.library.attr(pattern);
        cut.leaves
            .iter()
            .zip(attr.pin_power.iter())
            .map(|(&leaf, &(rise, fall))| {
                f64::from(rise.abs()) * f64::from(activity.switches_on(leaf))
                    + f64::from(fall.abs()) * f64::from(activity.switches_off(leaf))
            })
            .sum()
    }

    /// The cheapest candidate pattern covering `cut`, by (area, power).
    ///
    /// A cone that cannot be evaluated (it crosses a sequential or opaque
    /// cell) counts as a library miss.
    fn best_candidate(&self, cut: &Cut) -> Option<(SubnetId, f32, f64)> {
        let tt = self.cone_tt(cut).ok()?;
        let mut best: Option<(SubnetId, f32, f64)> = None;
        for &pattern in self.library.patterns_for_tt(&tt) {
            let area = self.library.attr(pattern).area;
            let power = self.candidate_power(pattern, cut);
            let better = match best.as_ref() {
                None => true,
                Some(&(_, best_area, best_power)) => {
                    area + f32::EPSILON < best_area
                        || ((area - best_area).abs() <= f32::EPSILON && power < best_power)
                }
            };
            if better {
                best = Some((pattern, area, power));
            }
        }
        best
    }

    /// Depth pass: minimize level, break ties by area then pin power.
    ///
    /// Walks in storage order so every leaf (mapped or kept) has its level
    /// before it is consumed.
    fn depth_pass(&mut self) -> CoreResult<()> {
        let order: Vec<usize> = self.subnet.iter_cells().map(|(i, _)| i).collect();
        for node in order {
            if self.choice[node] == Choice::Keep {
                self.state[node].level = 1 + self
                    .subnet
                    .links(node)
                    .iter()
                    .map(|l| self.leaf_level(l.index()))
                    .max()
                    .unwrap_or(0);
                continue;
            }
            if !self.is_mappable[node] {
                continue;
            }
            let mut best: Option<(Cut, SubnetId, u32, f32, f64)> = None;
            for cut in self.extractor.cuts(node) {
                if cut.contains(node) {
                    continue;
                }
                let level = self.cut_level(cut);
                let Some((pattern, area, power)) = self.best_candidate(cut) else {
                    continue;
                };
                let better = match best.as_ref() {
                    None => true,
                    Some(&(_, _, b_level, b_area, b_power)) => {
                        level < b_level
                            || (level == b_level
                                && (area + f32::EPSILON < b_area
                                    || ((area - b_area).abs() <= f32::EPSILON
                                        && power < b_power)))
                    }
                };
                if better {
                    best = Some((cut.clone(), pattern, level, area, power));
                }
            }
            match best {
                Some((cut, pattern, level, area, _)) => {
                    self.state[node].level = level;
                    self.state[node].area_flow = self.area_flow(&cut, area);
                    self.state[node].switch_flow = self.switch_flow(&cut);
                    self.choice[node] = Choice::Pattern {
                        pattern,
                        leaves: cut.leaves,
                    };
                }
                None => {
                    // No library cover for any cut: keep the cell.
                    debug!(node, "no library candidate, keeping the cell");
                    self.choice[node] = Choice::Keep;
                    self.state[node].level = 1 + self
                        .subnet
                        .links(node)
                        .iter()
                        .map(|l| self.leaf_level(l.index()))
                        .max()
                        .unwrap_or(0);
                }
            }
        }
        Ok(())
    }

    fn init_refs(&mut self) {
        for (i, _) in self.subnet.iter_cells() {
            let deps: Vec<usize> = match &self.choice[i] {
                Choice::Pattern { leaves, .. } => leaves.clone(),
                Choice::Keep => self.subnet.links(i).iter().map(|l| l.index()).collect(),
                Choice::PassThrough => continue,
            };
            for leaf in deps {
                self.state[leaf].refs += 1;
            }
        }
        for k in 0..self.subnet.out_num() {
            let driver = self.subnet.out_link(k).index();
            self.state[driver].refs += 1;
        }
    }

    /// Backward required-time propagation from the latest PO arrival.
    fn compute_required(&mut self, sdc: &Sdc) {
        let latest = (0..self.subnet.out_num())
            .map(|k| self.state[self.subnet.out_link(k).index()].level)
            .max()
            .unwrap_or(0);
        let target = if sdc.arrival_time_max.is_finite() {
            let bound = sdc.arrival_time_max as u32;
            if bound < latest {
                warn!(latest, bound, "arrival-time bound infeasible, relaxing");
                latest
            } else {
                bound
            }
        } else {
            latest
        };

        for k in 0..self.subnet.out_num() {
            let driver = self.subnet.out_link(k).index();
            self.state[driver].required = target;
        }

        let order: Vec<usize> = self.subnet.iter_cells().map(|(i, _)| i).collect();
        for &i in order.iter().rev() {
            if self.state[i].required == u32::MAX {
                continue;
            }
            let next = self.state[i].required.saturating_sub(1);
            let deps: Vec<usize> = match &self.choice[i] {
                Choice::Pattern { leaves, .. } => leaves.clone(),
                Choice::Keep => self.subnet.links(i).iter().map(|l| l.index()).collect(),
                Choice::PassThrough => continue,
            };
            for dep in deps {
                self.state[dep].required = self.state[dep].required.min(next);
            }
        }
    }

    /// Area flow of choosing `cut` with a cell of the given area.
    fn area_flow(&self, cut: &Cut, cell_area: f32) -> f64 {
        let mut flow = f64::from(cell_area);
        for &leaf in &cut.leaves {
            let leaf_flow = match &self.choice[leaf] {
                Choice::Pattern { .. } | Choice::Keep => self.state[leaf].area_flow,
                Choice::PassThrough => 0.0,
            };
            if leaf_flow.is_finite() {
                flow += leaf_flow / f64::from(self.structural_refs(leaf));
            }
        }
        flow
    }

    fn switch_flow(&self, cut: &Cut) -> f64 {
        let Some(activity) = &self.activity else {
            return 0.0;
        };
        let mut flow = activity.switch_probability(cut.root);
        for &leaf in &cut.leaves {
            let leaf_flow = match &self.choice[leaf] {
                Choice::Pattern { .. } | Choice::Keep => self.state[leaf].switch_flow,
                Choice::PassThrough => activity.switch_probability(leaf),
            };
            if leaf_flow.is_finite() {
                flow += leaf_flow / f64::from(self.structural_refs(leaf));
            }
        }
        flow
    }

    fn structural_refs(&self, entry: usize) -> u32 {
        self.subnet.cell(entry).refcount.max(1)
    }

    /// Global area-flow recovery under the required-time constraint.
    fn area_flow_pass(&mut self) -> CoreResult<()> {
        for idx in 0..self.mappable.len() {
            let node = self.mappable[idx];
            if matches!(self.choice[node], Choice::Keep) {
                continue;
            }
            let mut best: Option<(Cut, SubnetId, u32, f64, f64)> = None;
            for cut in self.extractor.cuts(node) {
                if cut.contains(node) {
                    continue;
                }
                let level = self.cut_level(cut);
                if level > self.state[node].required {
                    continue;
                }
                let Some((pattern, area, _)) = self.best_candidate(cut) else {
                    continue;
                };
                let flow = self.area_flow(cut, area);
                let switch = self.switch_flow(cut);
                let better = match best.as_ref() {
                    None => true,
                    Some(&(_, _, _, b_flow, b_switch)) => {
                        flow + FLOW_EPS < b_flow
                            || ((flow - b_flow).abs() <= FLOW_EPS && switch + FLOW_EPS < b_switch)
                    }
                };
                if better {
                    best = Some((cut.clone(), pattern, level, flow, switch));
                }
            }
            if let Some((cut, pattern, level, flow, switch)) = best {
                self.commit(node, pattern, cut.leaves);
                self.state[node].level = level;
                self.state[node].area_flow = flow;
                self.state[node].switch_flow = switch;
            }
        }
        Ok(())
    }

    /// Replaces the node's choice, maintaining the mapping refcounts.
    fn commit(&mut self, node: usize, pattern: SubnetId, leaves: Vec<usize>) {
        if let Choice::Pattern { leaves: old, .. } = &self.choice[node] {
            for leaf in old.clone() {
                self.state[leaf].refs -= 1;
            }
        }
        for &leaf in &leaves {
            self.state[leaf].refs += 1;
        }
        self.choice[node] = Choice::Pattern { pattern, leaves };
    }

    fn pattern_area(&self, node: usize) -> f64 {
        match &self.choice[node] {
            Choice::Pattern { pattern, .. } => f64::from(self.library.attr(*pattern).area),
            _ => 0.0,
        }
    }

    /// Exact-area reference: adds the cover rooted at the leaves, returning
    /// the area newly accounted for.
    fn ref_cut(&mut self, leaves: &[usize], cell_area: f64) -> f64 {
        let mut area = cell_area;
        for &leaf in leaves {
            if let Choice::Pattern { leaves: inner, .. } = &self.choice[leaf] {
                let inner = inner.clone();
                let leaf_area = self.pattern_area(leaf);
                if self.state[leaf].refs == 0 {
                    area += self.ref_cut(&inner, leaf_area);
                }
                self.state[leaf].refs += 1;
            }
        }
        area
    }

    /// Inverse of [`ref_cut`](Self::ref_cut).
    fn deref_cut(&mut self, leaves: &[usize], cell_area: f64) -> f64 {
        let mut area = cell_area;
        for &leaf in leaves {
            if let Choice::Pattern { leaves: inner, .. } = &self.choice[leaf] {
                let inner = inner.clone();
                let leaf_area = self.pattern_area(leaf);
                self.state[leaf].refs -= 1;
                if self.state[leaf].refs == 0 {
                    area += self.deref_cut(&inner, leaf_area);
                }
            }
        }
        area
    }

    /// Exact area of covering `node` with `leaves`/`cell_area`, leaving the
    /// refcounts unchanged.
    fn exact_area(&mut self, node: usize, leaves: &[usize], cell_area: f64) -> f64 {
        let current = match &self.choice[node] {
            Choice::Pattern { leaves: cur, .. } => cur.clone(),
            _ => return f64::INFINITY,
        };
        if current == leaves {
            let area = self.deref_cut(leaves, cell_area);
            self.ref_cut(leaves, cell_area);
            area
        } else {
            let area = self.ref_cut(leaves, cell_area);
            self.deref_cut(leaves, cell_area);
            area
        }
    }

    /// Local exact-area recovery.
    fn exact_area_pass(&mut self) -> CoreResult<()> {
        for idx in 0..self.mappable.len() {
            let node = self.mappable[idx];
            let current_leaves = match &self.choice[node] {
                Choice::Pattern { leaves, .. } => leaves.clone(),
                _ => continue,
            };
            let current_area = self.pattern_area(node);
            let mut best_area = self.exact_area(node, &current_leaves, current_area);
            let mut best: Option<(Cut, SubnetId)> = None;

            let cuts: Vec<Cut> = self.extractor.cuts(node).to_vec();
            for cut in cuts {
                if cut.contains(node) || cut.leaves == current_leaves {
                    continue;
                }
                if self.cut_level(&cut) > self.state[node].required {
                    continue;
                }
                let Some((pattern, area, _)) = self.best_candidate(&cut) else {
                    continue;
                };
                let exact = self.exact_area(node, &cut.leaves, f64::from(area));
                if exact + FLOW_EPS < best_area {
                    best_area = exact;
                    best = Some((cut, pattern));
                }
            }
            if let Some((cut, pattern)) = best {
                let level = self.cut_level(&cut);
                self.commit(node, pattern, cut.leaves);
                self.state[node].level = level;
            }
        }
        Ok(())
    }

    /// Entries reachable from the primary outputs through the mapping.
    fn cover(&self) -> Vec<bool> {
        let mut needed = vec![false; self.subnet.size()];
        let mut stack: Vec<usize> = (0..self.subnet.out_num())
            .map(|k| self.subnet.out_link(k).index())
            .collect();
        while let Some(i) = stack.pop() {
            if needed[i] {
                continue;
            }
            needed[i] = true;
            match &self.choice[i] {
                Choice::Pattern { leaves, .. } => stack.extend(leaves.iter().copied()),
                Choice::Keep => {
                    stack.extend(self.subnet.links(i).iter().map(|l| l.index()));
                }
                Choice::PassThrough => {}
            }
        }
        needed
    }

    /// Writes the chosen cover into a fresh builder.
    fn rebuild(&self, seq_strategy: Strategy) -> CoreResult<(SubnetId, MapReport)> {
        let needed = self.cover();
        let seq_mapper = SequentialMapper::new(self.library, seq_strategy);
        let mut builder = SubnetBuilder::new(self.ctx);
        let mut map: HashMap<usize, Link> = HashMap::new();
        let mut area = 0.0f64;

        for (i, cell) in self.subnet.iter_cells() {
            if cell.is_in() {
                map.insert(i, builder.add_input());
                continue;
            }
            if cell.is_out() || !needed[i] {
                continue;
            }
            match &self.choice[i] {
                Choice::PassThrough => {
                    // Constants carry over unchanged.
                    map.insert(i, builder.add_cell(cell.type_id, &[])?);
                }
                Choice::Keep => {
                    let links: Vec<Link> = self
                        .subnet
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
                    let symbol = cell.symbol();
                    let type_id = match symbol {
                        Some(sym) if sym.is_sequential() => {
                            match seq_mapper.map_cell(sym) {
                                Some((chosen, attr)) => {
                                    area += f64::from(attr.area);
                                    chosen
                                }
                                None => cell.type_id,
                            }
                        }
                        _ => cell.type_id,
                    };
                    map.insert(i, builder.add_cell(type_id, &links)?);
                }
                Choice::Pattern { pattern, leaves } => {
                    let bindings: Vec<Link> = leaves.iter().map(|&l| map[&l]).collect();
                    let pattern_net = self.ctx.subnet(*pattern);
                    let link = builder.add_single_output_subnet(&pattern_net, &bindings)?;
                    map.insert(i, link);
                    area += f64::from(self.library.attr(*pattern).area);
                }
            }
        }

        for k in 0..self.subnet.out_num() {
            let out = self.subnet.out_link(k);
            let mapped = map[&out.index()];
            builder.add_output(Link {
                idx: mapped.idx,
                out: out.out,
                inv: out.inv ^ mapped.inv,
            })?;
        }

        let depth = (0..self.subnet.out_num())
            .map(|k| self.state[self.subnet.out_link(k).index()].level)
            .max()
            .unwrap_or(0);
        Ok((builder.make()?, MapReport { area, depth }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::test_support::{nand_not_library, register_gate};
    use tessera_model::CellKind;
    use tessera_verify::{CheckStatus, LecKind, MiterBinding, make_checker};

    /// 3-input AND realized as two 2-ANDs, mapped onto NAND2 + INV.
    #[test]
    fn and3_maps_onto_nand_inv_library() {
        let ctx = Context::new();
        let library = nand_not_library(&ctx);

        let mut builder = SubnetBuilder::new(&ctx);
        let inputs = builder.add_inputs(3);
        let and0 = builder.add_cell(CellSymbol::And, &inputs[..2]).unwrap();
        let and1 = builder
            .add_cell(CellSymbol::And, &[and0, inputs[2]])
            .unwrap();
        builder.add_output(and1).unwrap();
        let source = builder.make().unwrap();

        let mapper = CutMapper::default();
        let (mapped, report) = mapper
            .map_with_report(&ctx, source, &library, &Sdc::default())
            .unwrap();
        let mapped_net = ctx.subnet(mapped);

        // Every interior cell is a technology cell.
        let mut tech_cells = 0;
        for (_, cell) in mapped_net.iter_cells() {
            if cell.is_in() || cell.is_out() {
                continue;
            }
            let kind = ctx.cell_type(cell.type_id).kind;
            assert_eq!(kind, CellKind::Cell, "interior cell not mapped");
            tech_cells += 1;
        }
        assert_eq!(tech_cells, 4, "expected 2x(NAND2 + INV)");
        assert!(report.area > 0.0);

        // Function preserved.
        let binding = MiterBinding::identity(&ctx.subnet(source), &mapped_net);
        let result = make_checker(LecKind::Sat).equivalent(&ctx, source, mapped, &binding);
        assert_eq!(result.status, CheckStatus::Equal);
    }

    #[test]
    fn shared_node_mapped_once() {
        let ctx = Context::new();
        let library = nand_not_library(&ctx);

        // AND(a, b) feeds two downstream ANDs.
        let mut builder = SubnetBuilder::new(&ctx);
        let inputs = builder.add_inputs(4);
        let shared = builder.add_cell(CellSymbol::And, &inputs[..2]).unwrap();
        let left = builder
            .add_cell(CellSymbol::And, &[shared, inputs[2]])
            .unwrap();
        let right = builder
            .add_cell(CellSymbol::And, &[shared, inputs[3]])
            .unwrap();
        builder.add_output(left).unwrap();
        builder.add_output(right).unwrap();
        let source = builder.make().unwrap();

        let mapped = CutMapper::default()
            .map(&ctx, source, &library, &Sdc::default())
            .unwrap();

        let binding = MiterBinding::identity(&ctx.subnet(source), &ctx.subnet(mapped));
        let result = make_checker(LecKind::Rnd).equivalent(&ctx, source, mapped, &binding);
        assert_eq!(result.status, CheckStatus::Equal);
    }

    #[test]
    fn inverted_edges_survive_mapping() {
        let ctx = Context::new();
        let library = nand_not_library(&ctx);

        // y = ~(a & ~b), exercising inverted fan-in and output polarity.
        let mut builder = SubnetBuilder::new(&ctx);
        let inputs = builder.add_inputs(2);
        let and = builder
            .add_cell(CellSymbol::And, &[inputs[0], !inputs[1]])
            .unwrap();
        builder.add_output(!and).unwrap();
        let source = builder.make().unwrap();

        let mapped = CutMapper::default()
            .map(&ctx, source, &library, &Sdc::default())
            .unwrap();
        let binding = MiterBinding::identity(&ctx.subnet(source), &ctx.subnet(mapped));
        let result = make_checker(LecKind::Bdd).equivalent(&ctx, source, mapped, &binding);
        assert_eq!(result.status, CheckStatus::Equal);
    }

    #[test]
    fn constants_pass_through() {
        let ctx = Context::new();
        let library = nand_not_library(&ctx);

        let mut builder = SubnetBuilder::new(&ctx);
        let a = builder.add_input();
        let one = builder.add_cell(CellSymbol::One, &[]).unwrap();
        let and = builder.add_cell(CellSymbol::And, &[a, one]).unwrap();
        builder.add_output(and).unwrap();
        let source = builder.make().unwrap();

        let mapped = CutMapper::default()
            .map(&ctx, source, &library, &Sdc::default())
            .unwrap();
        let binding = MiterBinding::identity(&ctx.subnet(source), &ctx.subnet(mapped));
        let result = make_checker(LecKind::Sat).equivalent(&ctx, source, mapped, &binding);
        assert_eq!(result.status, CheckStatus::Equal);
    }

    #[test]
    fn area_recovery_prefers_larger_cuts_for_single_fanout() {
        let ctx = Context::new();
        // Library with NAND2, INV, and a 3-input NAND: the AND3 chain packs
        // into one NAND3 + INV instead of two NAND2 + two INV.
        let nand2 = register_gate(&ctx, "NAND2", CellSymbol::Nand, 2, 2.0);
        let nand3 = register_gate(&ctx, "NAND3", CellSymbol::Nand, 3, 2.5);
        let inv = register_gate(&ctx, "INV", CellSymbol::Not, 1, 1.0);
        let library = CellLibrary::new(&ctx, &[nand2, nand3, inv], &[], &[], &[]).unwrap();

        let mut builder = SubnetBuilder::new(&ctx);
        let inputs = builder.add_inputs(3);
        let and0 = builder.add_cell(CellSymbol::And, &inputs[..2]).unwrap();
        let and1 = builder
            .add_cell(CellSymbol::And, &[and0, inputs[2]])
            .unwrap();
        builder.add_output(and1).unwrap();
        let source = builder.make().unwrap();

        let (mapped, report) = CutMapper::default()
            .map_with_report(&ctx, source, &library, &Sdc::default())
            .unwrap();
        // NAND3 + INV = 3.5 beats 2 * (NAND2 + INV) = 6.0.
        assert!(report.area <= 3.5 + 1e-6, "area {}", report.area);

        let binding = MiterBinding::identity(&ctx.subnet(source), &ctx.subnet(mapped));
        let result = make_checker(LecKind::Sat).equivalent(&ctx, source, mapped, &binding);
        assert_eq!(result.status, CheckStatus::Equal);
    }

    #[test]
    fn level_respects_required_time() {
        let ctx = Context::new();
        let library = nand_not_library(&ctx);

        let mut builder = SubnetBuilder::new(&ctx);
        let inputs = builder.add_inputs(4);
        let mut acc = inputs[0];
        for &next in &inputs[1..] {
            acc = builder.add_cell(CellSymbol::And, &[acc, next]).unwrap();
        }
        builder.add_output(acc).unwrap();
        let source = builder.make().unwrap();

        let (_, report) = CutMapper::default()
            .map_with_report(&ctx, source, &library, &Sdc::default())
            .unwrap();
        assert!(report.depth >= 1);
    }

    #[test]
    fn unmappable_gate_kept_verbatim() {
        let ctx = Context::new();
        let library = nand_not_library(&ctx);

        // XOR is not an AND network node; the mapper keeps it.
        let mut builder = SubnetBuilder::new(&ctx);
        let inputs = builder.add_inputs(2);
        let xor = builder.add_cell(CellSymbol::Xor, &inputs).unwrap();
        builder.add_output(xor).unwrap();
        let source = builder.make().unwrap();

        let mapped = CutMapper::default()
            .map(&ctx, source, &library, &Sdc::default())
            .unwrap();
        let mapped_net = ctx.subnet(mapped);
        assert!(mapped_net
            .iter_cells()
            .any(|(_, c)| c.symbol() == Some(CellSymbol::Xor)));
    }
}
