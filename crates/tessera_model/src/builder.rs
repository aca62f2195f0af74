//! The mutable subnet builder.
//!
//! A [`SubnetBuilder`] is the working copy of a netlist during construction
//! and rewriting. It owns the entry arena with a free list, per-entry
//! descriptors forming a doubly-linked topological order, depth bounds, a
//! structural-hashing table, an optional fanout index, and a session counter
//! for cheap traversal marking. `make` compacts the arena and publishes an
//! immutable [`Subnet`](crate::subnet::Subnet).

use crate::celltype::{CellKind, CellSymbol, ANY_ARITY};
use crate::context::Context;
use crate::ids::{CellTypeId, SubnetId};
use crate::subnet::{push_entries, Cell, Entry, Link, Subnet, IN_PLACE_LINKS};
use std::collections::HashMap;
use tessera_common::{CoreError, CoreResult};

const INVALID_ID: u32 = u32::MAX;
const NORMAL_ORDER_ID: u32 = u32::MAX - 1;
const LOWER_BOUND_ID: u32 = u32::MAX - 2;
const UPPER_BOUND_ID: u32 = u32::MAX - 3;

/// Per-entry bookkeeping.
#[derive(Clone, Copy, Debug)]
struct Descriptor {
    prev: u32,
    next: u32,
    depth: u32,
    session: u32,
    weight: f32,
}

impl Default for Descriptor {
    fn default() -> Self {
        Self {
            prev: NORMAL_ORDER_ID,
            next: NORMAL_ORDER_ID,
            depth: 0,
            session: 0,
            weight: 0.0,
        }
    }
}

/// Normalized structural key: type plus link list, sorted for commutative ops.
#[derive(Clone, PartialEq, Eq, Hash)]
struct StrashKey {
    type_id: CellTypeId,
    links: Vec<Link>,
}

/// Closure computing the weight of a new cell from its source-entry index.
pub type CellWeightProvider<'a> = dyn Fn(usize) -> f32 + 'a;

/// Closure adjusting a provided weight.
pub type CellWeightModifier<'a> = dyn Fn(f32) -> f32 + 'a;

/// Rewrite callbacks invoked by [`SubnetBuilder::replace`].
#[derive(Default)]
pub struct ReplaceHooks<'h> {
    /// Called for every freshly allocated (or repointed) cell.
    pub on_new_cell: Option<&'h mut dyn FnMut(usize)>,
    /// Called for a reused cell whose depth equals the old root depth.
    pub on_equal_depth: Option<&'h mut dyn FnMut(usize)>,
    /// Called for a reused cell whose depth exceeds the old root depth.
    pub on_greater_depth: Option<&'h mut dyn FnMut(usize)>,
}

/// Predicted effect of a rewrite: cells removed, depth gained, weight freed.
///
/// Positive components mean improvement (fewer cells, smaller depth).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Effect {
    /// Change in live cell count.
    pub cells: i32,
    /// Change in root depth.
    pub depth: i32,
    /// Change in accumulated weight.
    pub weight: f32,
}

impl std::ops::Sub for Effect {
    type Output = Effect;

    fn sub(self, rhs: Effect) -> Effect {
        Effect {
            cells: self.cells - rhs.cells,
            depth: self.depth - rhs.depth,
            weight: self.weight - rhs.weight,
        }
    }
}

/// Merge specification: keeper entry -> entries merged onto it.
pub type MergeMap = HashMap<usize, Vec<usize>>;

/// The mutable working copy of a subnet.
pub struct SubnetBuilder<'c> {
    ctx: &'c Context,
    entries: Vec<Cell>,
    /// Overflow links of wide cells (arity beyond the in-place capacity).
    extra: HashMap<u32, Vec<Link>>,
    desc: Vec<Descriptor>,
    free: Vec<u32>,
    n_in: u32,
    n_out: u32,
    subnet_begin: u32,
    subnet_end: u32,
    depth_bounds: Vec<(u32, u32)>,
    strash: HashMap<StrashKey, u32>,
    fanouts: Vec<Vec<u32>>,
    fanouts_enabled: bool,
    session: u32,
}

impl<'c> SubnetBuilder<'c> {
    /// Creates an empty builder bound to a context.
    pub fn new(ctx: &'c Context) -> Self {
        Self {
            ctx,
            entries: Vec::new(),
            extra: HashMap::new(),
            desc: Vec::new(),
            free: Vec::new(),
            n_in: 0,
            n_out: 0,
            subnet_begin: NORMAL_ORDER_ID,
            subnet_end: NORMAL_ORDER_ID,
            depth_bounds: Vec::new(),
            strash: HashMap::new(),
            fanouts: Vec::new(),
            fanouts_enabled: false,
            session: 0,
        }
    }

    /// Creates a builder pre-loaded with the cells of a frozen subnet.
    pub fn from_subnet(ctx: &'c Context, subnet: &Subnet) -> CoreResult<Self> {
        let mut builder = Self::new(ctx);
        let mut remap: HashMap<usize, Link> = HashMap::new();
        for (i, cell) in subnet.iter_cells() {
            if cell.is_in() {
                remap.insert(i, builder.add_input());
                continue;
            }
            let links: Vec<Link> = subnet
                .links(i)
                .iter()
                .map(|l| {
                    let mapped = remap[&l.index()];
                    Link {
                        idx: mapped.idx,
                        out: l.out,
                        inv: l.inv ^ mapped.inv,
                    }
                })
                .collect();
            if cell.is_out() {
                builder.add_output(links[0])?;
            } else {
                remap.insert(i, builder.add_cell(cell.type_id, &links)?);
            }
        }
        Ok(builder)
    }

    /// The context this builder resolves types against.
    pub fn context(&self) -> &'c Context {
        self.ctx
    }

    //------------------------------------------------------------------//
    // Read access
    //------------------------------------------------------------------//

    /// Number of primary inputs added so far.
    pub fn in_num(&self) -> usize {
        self.n_in as usize
    }

    /// Number of primary outputs added so far.
    pub fn out_num(&self) -> usize {
        self.n_out as usize
    }

    /// Size of the arena (live and freed slots).
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of live cells.
    pub fn live_cell_count(&self) -> usize {
        self.entries.len() - self.free.len()
    }

    /// The cell stored at `idx`.
    pub fn cell(&self, idx: usize) -> &Cell {
        &self.entries[idx]
    }

    /// The builtin symbol of the cell at `idx`, if its type is builtin.
    pub fn symbol_of(&self, idx: usize) -> Option<CellSymbol> {
        self.entries[idx].symbol()
    }

    /// Depth of the entry: 0 for inputs and constants.
    pub fn depth(&self, idx: usize) -> usize {
        self.desc[idx].depth as usize
    }

    /// In-degree of the entry.
    pub fn refcount(&self, idx: usize) -> usize {
        self.entries[idx].refcount as usize
    }

    /// Weight attached to the entry.
    pub fn weight(&self, idx: usize) -> f32 {
        self.desc[idx].weight
    }

    /// Attaches a weight to the entry.
    pub fn set_weight(&mut self, idx: usize, weight: f32) {
        self.desc[idx].weight = weight;
    }

    /// The `j`-th input link of the cell at `idx`.
    pub fn link_of(&self, idx: usize, j: usize) -> Link {
        let cell = &self.entries[idx];
        debug_assert!(j < cell.arity as usize);
        if j < IN_PLACE_LINKS {
            cell.links[j]
        } else {
            self.extra[&(idx as u32)][j - IN_PLACE_LINKS]
        }
    }

    /// All input links of the cell at `idx`.
    pub fn links_of(&self, idx: usize) -> Vec<Link> {
        let cell = &self.entries[idx];
        let arity = cell.arity as usize;
        let mut links: Vec<Link> = cell.links[..arity.min(IN_PLACE_LINKS)].to_vec();
        if arity > IN_PLACE_LINKS {
            links.extend_from_slice(&self.extra[&(idx as u32)]);
        }
        links
    }

    fn set_link(&mut self, idx: usize, j: usize, link: Link) {
        if j < IN_PLACE_LINKS {
            self.entries[idx].links[j] = link;
        } else {
            self.extra.get_mut(&(idx as u32)).expect("missing overflow links")
                [j - IN_PLACE_LINKS] = link;
        }
    }

    /// Iterates live entry indices in topological order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        let mut cur = self.first_entry();
        std::iter::from_fn(move || {
            if cur == UPPER_BOUND_ID || cur == INVALID_ID {
                return None;
            }
            let out = cur as usize;
            cur = self.next_entry(cur);
            Some(out)
        })
    }

    //------------------------------------------------------------------//
    // Topological order
    //------------------------------------------------------------------//

    fn first_entry(&self) -> u32 {
        if self.subnet_begin == NORMAL_ORDER_ID {
            if self.entries.is_empty() {
                INVALID_ID
            } else {
                0
            }
        } else {
            self.subnet_begin
        }
    }

    fn last_entry(&self) -> u32 {
        if self.subnet_end == NORMAL_ORDER_ID {
            if self.entries.is_empty() {
                INVALID_ID
            } else {
                (self.entries.len() - 1) as u32
            }
        } else {
            self.subnet_end
        }
    }

    fn next_entry(&self, entry: u32) -> u32 {
        debug_assert!(entry != UPPER_BOUND_ID && entry != INVALID_ID && entry != NORMAL_ORDER_ID);
        if entry == LOWER_BOUND_ID {
            return if self.first_entry() == INVALID_ID {
                UPPER_BOUND_ID
            } else {
                self.first_entry()
            };
        }
        if entry == self.last_entry() {
            return UPPER_BOUND_ID;
        }
        let next = self.desc[entry as usize].next;
        if next == NORMAL_ORDER_ID {
            entry + 1
        } else {
            next
        }
    }

    fn prev_entry(&self, entry: u32) -> u32 {
        debug_assert!(entry != LOWER_BOUND_ID && entry != INVALID_ID && entry != NORMAL_ORDER_ID);
        if entry == UPPER_BOUND_ID {
            return if self.first_entry() == INVALID_ID {
                LOWER_BOUND_ID
            } else {
                self.last_entry()
            };
        }
        if entry == self.first_entry() {
            return LOWER_BOUND_ID;
        }
        let prev = self.desc[entry as usize].prev;
        if prev == NORMAL_ORDER_ID {
            entry - 1
        } else {
            prev
        }
    }

    /// Declares that `second` immediately follows `first` in the order.
    fn set_order(&mut self, first: u32, second: u32) {
        debug_assert!(first != UPPER_BOUND_ID && second != LOWER_BOUND_ID);
        if first == LOWER_BOUND_ID && second == UPPER_BOUND_ID {
            self.subnet_begin = INVALID_ID;
            self.subnet_end = INVALID_ID;
            return;
        }
        if second == self.first_entry() && first != LOWER_BOUND_ID {
            self.subnet_begin = first;
        } else if first == LOWER_BOUND_ID {
            self.subnet_begin = second;
        }
        if first == self.last_entry() && second != UPPER_BOUND_ID {
            self.subnet_end = second;
        } else if second == UPPER_BOUND_ID {
            self.subnet_end = first;
        }
        if second != UPPER_BOUND_ID && self.prev_entry(second) != first {
            self.desc[second as usize].prev = first;
        }
        if first != LOWER_BOUND_ID && self.next_entry(first) != second {
            self.desc[first as usize].next = second;
        }
    }

    fn place_after(&mut self, entry: u32, pivot: u32) {
        debug_assert!(pivot != UPPER_BOUND_ID);
        self.set_order(entry, self.next_entry(pivot));
        self.set_order(pivot, entry);
    }

    //------------------------------------------------------------------//
    // Depth bounds
    //------------------------------------------------------------------//

    fn delete_depth_bounds(&mut self, entry: u32) {
        let depth = self.desc[entry as usize].depth as usize;
        debug_assert!(self.depth_bounds.len() > depth);
        let (first, last) = self.depth_bounds[depth];
        if first == last {
            self.depth_bounds[depth] = (INVALID_ID, INVALID_ID);
        } else if first == entry {
            self.depth_bounds[depth].0 = self.next_entry(entry);
        } else if last == entry {
            self.depth_bounds[depth].1 = self.prev_entry(entry);
        }
        self.set_order(self.prev_entry(entry), self.next_entry(entry));
    }

    /// Inserts `entry` into the order according to its depth.
    ///
    /// Inputs prepend to the input zone (before the constant cells at depth
    /// 0), outputs append after everything, interior cells go after the last
    /// entry of their depth.
    fn add_depth_bounds(&mut self, entry: u32) {
        let symbol = self.entries[entry as usize].symbol();
        let depth = self.desc[entry as usize].depth as usize;
        if self.depth_bounds.len() <= depth {
            self.depth_bounds.resize(depth + 1, (INVALID_ID, INVALID_ID));
        }
        if symbol == Some(CellSymbol::Out) {
            let end = self.last_entry();
            let pivot = if end == INVALID_ID { LOWER_BOUND_ID } else { end };
            self.place_after(entry, pivot);
            return;
        }
        if self.depth_bounds[depth].0 == INVALID_ID {
            self.depth_bounds[depth] = (entry, entry);
            if depth == 0 {
                self.place_after(entry, LOWER_BOUND_ID);
            } else {
                let mut d = depth;
                let mut pivot = LOWER_BOUND_ID;
                while d > 0 {
                    d -= 1;
                    if self.depth_bounds[d].1 != INVALID_ID {
                        pivot = self.depth_bounds[d].1;
                        break;
                    }
                }
                self.place_after(entry, pivot);
            }
            return;
        }
        let mut pivot = self.depth_bounds[depth].1;
        if depth == 0 && symbol == Some(CellSymbol::In) {
            // Keep inputs grouped before the depth-0 constants.
            while pivot != LOWER_BOUND_ID
                && self.entries[pivot as usize]
                    .symbol()
                    .is_some_and(CellSymbol::is_constant)
            {
                pivot = self.prev_entry(pivot);
            }
        }
        self.place_after(entry, pivot);
        if self.depth_bounds[depth].1 == pivot {
            self.depth_bounds[depth].1 = entry;
        }
    }

    //------------------------------------------------------------------//
    // Fanout index
    //------------------------------------------------------------------//

    /// Builds the fanout index for the current arena.
    pub fn enable_fanouts(&mut self) {
        self.fanouts_enabled = true;
        self.fanouts = vec![Vec::new(); self.entries.len()];
        let indices: Vec<usize> = self.iter().collect();
        for i in indices {
            for link in self.links_of(i) {
                self.add_fanout(link.index(), i);
            }
        }
    }

    /// Drops the fanout index.
    pub fn disable_fanouts(&mut self) {
        self.fanouts_enabled = false;
        self.fanouts.clear();
    }

    /// Fanout entries of `idx` (empty when the index is disabled).
    pub fn fanouts_of(&self, idx: usize) -> &[u32] {
        if !self.fanouts_enabled || idx >= self.fanouts.len() {
            return &[];
        }
        &self.fanouts[idx]
    }

    fn add_fanout(&mut self, source: usize, fanout: usize) {
        if !self.fanouts_enabled {
            return;
        }
        if self.fanouts.len() <= source {
            self.fanouts.resize(source + 1, Vec::new());
        }
        self.fanouts[source].push(fanout as u32);
    }

    fn del_fanout(&mut self, source: usize, fanout: usize) {
        if !self.fanouts_enabled {
            return;
        }
        if let Some(list) = self.fanouts.get_mut(source) {
            if let Some(pos) = list.iter().position(|&f| f == fanout as u32) {
                list.swap_remove(pos);
            }
        }
    }

    //------------------------------------------------------------------//
    // Strashing
    //------------------------------------------------------------------//

    fn is_strashable(&self, type_id: CellTypeId, arity: usize) -> bool {
        match type_id.builtin_symbol() {
            Some(sym) => sym.is_gate() && arity <= IN_PLACE_LINKS,
            None => false,
        }
    }

    fn strash_key(&self, type_id: CellTypeId, links: &[Link]) -> StrashKey {
        let mut links = links.to_vec();
        if type_id
            .builtin_symbol()
            .is_some_and(CellSymbol::is_commutative)
        {
            links.sort_by_key(|l| (l.idx, l.out, l.inv));
        }
        StrashKey { type_id, links }
    }

    /// Looks up an existing strash slot for the key of `idx`.
    pub fn strash_hit(&self, type_id: CellTypeId, links: &[Link]) -> Option<usize> {
        if !self.is_strashable(type_id, links.len()) {
            return None;
        }
        self.strash
            .get(&self.strash_key(type_id, links))
            .map(|&i| i as usize)
    }

    fn destrash_entry(&mut self, idx: usize) {
        let cell = &self.entries[idx];
        if !self.is_strashable(cell.type_id, cell.arity as usize) {
            return;
        }
        let key = self.strash_key(cell.type_id, &self.links_of(idx));
        if self.strash.get(&key) == Some(&(idx as u32)) {
            self.strash.remove(&key);
        }
    }

    //------------------------------------------------------------------//
    // Allocation
    //------------------------------------------------------------------//

    fn alloc_slot(&mut self) -> u32 {
        if let Some(idx) = self.free.pop() {
            return idx;
        }
        self.entries.push(Cell::new(CellSymbol::Undef.into(), &[]));
        self.desc.push(Descriptor::default());
        (self.entries.len() - 1) as u32
    }

    /// Allocates (or reuses) an entry for a cell with the given links.
    fn alloc_entry(&mut self, type_id: CellTypeId, links: &[Link]) -> usize {
        // Fixate the order endpoints before the physical tail moves.
        if self.subnet_begin == NORMAL_ORDER_ID {
            self.subnet_begin = self.first_entry();
        }
        if self.subnet_end == NORMAL_ORDER_ID {
            self.subnet_end = self.last_entry();
        }

        let idx = if self.is_strashable(type_id, links.len()) {
            let key = self.strash_key(type_id, links);
            if let Some(&existing) = self.strash.get(&key) {
                return existing as usize;
            }
            let idx = self.alloc_slot();
            self.strash.insert(key, idx);
            idx
        } else {
            self.alloc_slot()
        };

        let idx_usize = idx as usize;
        self.desc[idx_usize].depth = 0;
        self.desc[idx_usize].session = 0;
        self.desc[idx_usize].weight = 0.0;

        for link in links {
            let depth = (self.desc[link.index()].depth + 1).max(self.desc[idx_usize].depth);
            self.desc[idx_usize].depth = depth;
            self.add_fanout(link.index(), idx_usize);
            self.entries[link.index()].refcount += 1;
        }

        self.entries[idx_usize] = Cell::new(type_id, links);
        self.entries[idx_usize].more = 0;
        if links.len() > IN_PLACE_LINKS {
            self.extra
                .insert(idx, links[IN_PLACE_LINKS..].to_vec());
        }
        self.add_depth_bounds(idx);
        idx_usize
    }

    fn dealloc_entry(&mut self, idx: usize) {
        debug_assert_eq!(self.entries[idx].refcount, 0);
        self.destrash_entry(idx);
        self.delete_depth_bounds(idx as u32);
        self.desc[idx].depth = INVALID_ID;
        self.extra.remove(&(idx as u32));
        self.free.push(idx as u32);
    }

    //------------------------------------------------------------------//
    // Cell creation
    //------------------------------------------------------------------//

    /// Adds a primary input and returns its link.
    pub fn add_input(&mut self) -> Link {
        let idx = self.alloc_entry(CellSymbol::In.into(), &[]);
        self.n_in += 1;
        Link::new(idx)
    }

    /// Adds `n` primary inputs.
    pub fn add_inputs(&mut self, n: usize) -> Vec<Link> {
        (0..n).map(|_| self.add_input()).collect()
    }

    /// Adds a primary output driven by `link`.
    pub fn add_output(&mut self, link: Link) -> CoreResult<Link> {
        self.check_links(std::slice::from_ref(&link))?;
        let idx = self.alloc_entry(CellSymbol::Out.into(), &[link]);
        self.n_out += 1;
        Ok(Link::new(idx))
    }

    /// Adds a cell of the given type over `links`.
    ///
    /// Structurally identical cells are collapsed: the returned link may
    /// refer to an existing entry. Negative types are rejected; polarity
    /// belongs on links.
    pub fn add_cell(&mut self, type_id: impl Into<CellTypeId>, links: &[Link]) -> CoreResult<Link> {
        let type_id = type_id.into();
        let cell_type = self
            .ctx
            .try_cell_type(type_id)
            .ok_or_else(|| CoreError::InvalidCell(format!("unknown type {}", type_id.as_raw())))?;
        // Negative gates never appear as cells; their inversion lives on
        // links. Technology cells of a negative family are fine.
        if cell_type.kind == CellKind::Gate && cell_type.symbol.is_negative() {
            return Err(CoreError::InvalidCell(cell_type.symbol.name().to_string()));
        }
        if cell_type.symbol.is_soft_op() && cell_type.kind == CellKind::Gate {
            return Err(CoreError::InvalidCell(format!(
                "{} has no synthesized implementation",
                cell_type.symbol.name()
            )));
        }
        if cell_type.n_in != ANY_ARITY && cell_type.n_in as usize != links.len() {
            return Err(CoreError::InvalidCell(format!(
                "{} expects {} inputs, got {}",
                cell_type.name,
                cell_type.n_in,
                links.len()
            )));
        }
        self.check_links(links)?;

        let idx = self.alloc_entry(type_id, links);
        if cell_type.symbol == CellSymbol::In {
            self.n_in += 1;
        }
        if cell_type.symbol == CellSymbol::Out {
            self.n_out += 1;
        }
        Ok(Link::new(idx))
    }

    /// Fans a wide regroupable operator into a balanced `k`-ary tree.
    pub fn add_cell_tree(
        &mut self,
        symbol: CellSymbol,
        links: &[Link],
        k: usize,
    ) -> CoreResult<Link> {
        if !symbol.is_regroupable() {
            return Err(CoreError::NotRegroupable(symbol.name().to_string()));
        }
        let k = k.max(2);
        if links.len() <= k {
            return self.add_cell(symbol, links);
        }

        let mut queue: Vec<Link> = links.to_vec();
        let mut i = 0;
        while i < queue.len() - 1 {
            let rest = queue.len() - i;
            let n_args = rest.min(k);
            let args: Vec<Link> = queue[i..i + n_args].to_vec();
            i += n_args;
            let link = self.add_cell(symbol, &args)?;
            queue.push(link);
        }
        Ok(*queue.last().expect("tree reduction leaves a root"))
    }

    fn check_links(&self, links: &[Link]) -> CoreResult<()> {
        for link in links {
            let idx = link.index();
            if idx >= self.entries.len() || self.desc[idx].depth == INVALID_ID {
                return Err(CoreError::BadLink {
                    idx,
                    size: self.entries.len(),
                });
            }
            let cell = &self.entries[idx];
            if cell.symbol() == Some(CellSymbol::Out) {
                return Err(CoreError::BadLink {
                    idx,
                    size: self.entries.len(),
                });
            }
            let n_out = match cell.symbol() {
                Some(_) => 1,
                None => self
                    .ctx
                    .try_cell_type(cell.type_id)
                    .map_or(1, |t| t.n_out.max(1)),
            };
            if link.out as u16 >= n_out {
                return Err(CoreError::BadLink {
                    idx,
                    size: self.entries.len(),
                });
            }
        }
        Ok(())
    }

    //------------------------------------------------------------------//
    // Subnet splicing
    //------------------------------------------------------------------//

    /// Splices a frozen subnet, rewiring its inputs to `bindings`.
    ///
    /// Returns the links corresponding to the inner subnet's outputs. When a
    /// strashed duplicate already exists for a spliced cell, the duplicate
    /// is destrashed first so the spliced cell takes over the slot.
    pub fn add_subnet(
        &mut self,
        inner: &Subnet,
        bindings: &[Link],
        weight_fn: Option<&CellWeightProvider>,
    ) -> CoreResult<Vec<Link>> {
        if bindings.len() != inner.in_num() {
            return Err(CoreError::BadLink {
                idx: bindings.len(),
                size: inner.in_num(),
            });
        }
        self.check_links(bindings)?;

        let mut map: HashMap<usize, Link> = HashMap::new();
        for (k, binding) in bindings.iter().enumerate() {
            map.insert(k, *binding);
        }

        let mut outs = Vec::with_capacity(inner.out_num());
        for (i, cell) in inner.iter_cells() {
            if cell.is_in() {
                continue;
            }
            let links: Vec<Link> = inner
                .links(i)
                .iter()
                .map(|l| {
                    let mapped = map[&l.index()];
                    Link {
                        idx: mapped.idx,
                        out: if l.index() < inner.in_num() { mapped.out } else { l.out },
                        inv: l.inv ^ mapped.inv,
                    }
                })
                .collect();
            if cell.is_out() {
                outs.push(links[0]);
                continue;
            }
            // Destrash a colliding duplicate so the spliced cell wins.
            if let Some(existing) = self.strash_hit(cell.type_id, &links) {
                self.destrash_entry(existing);
            }
            let link = self.add_cell(cell.type_id, &links)?;
            if let Some(weight_fn) = weight_fn {
                self.set_weight(link.index(), weight_fn(i));
            }
            map.insert(i, link);
        }
        Ok(outs)
    }

    /// Splices a single-output subnet and returns its one output link.
    pub fn add_single_output_subnet(
        &mut self,
        inner: &Subnet,
        bindings: &[Link],
    ) -> CoreResult<Link> {
        debug_assert_eq!(inner.out_num(), 1);
        Ok(self.add_subnet(inner, bindings, None)?[0])
    }

    //------------------------------------------------------------------//
    // Deletion and merging
    //------------------------------------------------------------------//

    /// Deletes the cell and cascades into inputs that become dangling.
    fn delete_cell(&mut self, idx: usize) {
        let mut queue = vec![idx];
        while let Some(current) = queue.pop() {
            let links = self.links_of(current);
            self.dealloc_entry(current);
            for link in links {
                let input = link.index();
                self.del_fanout(input, current);
                self.entries[input].refcount -= 1;
                if self.entries[input].refcount == 0 && !self.entries[input].is_in() {
                    queue.push(input);
                }
            }
        }
    }

    /// Redirects all fanouts of each merged set onto its keeper, then
    /// deletes the merged entries.
    ///
    /// Precondition: a keeper must not depend on any entry merged onto it.
    pub fn merge_cells(&mut self, merge_map: &MergeMap) -> CoreResult<()> {
        let mut merge_to: HashMap<usize, usize> = HashMap::new();
        let mut remaining = 0usize;
        for (&keeper, others) in merge_map {
            for &other in others {
                debug_assert_ne!(keeper, other);
                if self.depends_on(keeper, other) {
                    return Err(CoreError::CycleDetected);
                }
                merge_to.insert(other, keeper);
                remaining += self.entries[other].refcount as usize;
            }
        }

        // Walk forward from the first merged entry, redirecting links.
        let order: Vec<usize> = self.iter().collect();
        let start = order
            .iter()
            .position(|i| merge_to.contains_key(i))
            .map(|p| p + 1)
            .unwrap_or(order.len());
        let mut redirected = Vec::new();
        for &i in &order[start..] {
            if remaining == 0 {
                break;
            }
            let links = self.links_of(i);
            let mut touched = false;
            for (j, link) in links.iter().enumerate() {
                if let Some(&keeper) = merge_to.get(&link.index()) {
                    let source = link.index();
                    self.del_fanout(source, i);
                    self.entries[source].refcount -= 1;
                    self.set_link(
                        i,
                        j,
                        Link {
                            idx: keeper as u32,
                            out: link.out,
                            inv: link.inv,
                        },
                    );
                    self.add_fanout(keeper, i);
                    self.entries[keeper].refcount += 1;
                    touched = true;
                    remaining -= 1;
                    if remaining == 0 {
                        break;
                    }
                }
            }
            if touched {
                redirected.push(i);
            }
        }

        // Redirection can change consumer depths; repair them in order.
        for &i in &redirected {
            let new_depth = self
                .links_of(i)
                .iter()
                .map(|l| self.desc[l.index()].depth + 1)
                .max()
                .unwrap_or(0);
            if new_depth == self.desc[i].depth {
                continue;
            }
            if self.entries[i].symbol() == Some(CellSymbol::Out) {
                self.desc[i].depth = new_depth;
                continue;
            }
            let old_next = self.next_entry(i as u32);
            self.delete_depth_bounds(i as u32);
            self.desc[i].depth = new_depth;
            self.add_depth_bounds(i as u32);
            self.recompute_fanout_depths(i, old_next);
        }

        let removed: Vec<usize> = merge_to.keys().copied().collect();
        for other in removed {
            debug_assert_eq!(self.entries[other].refcount, 0);
            self.delete_cell(other);
        }
        Ok(())
    }

    /// Replaces every entry of the set with a single constant-zero cell.
    pub fn replace_with_zero(&mut self, entries: &[usize]) -> CoreResult<()> {
        let zero = self.add_cell(CellSymbol::Zero, &[])?;
        self.merge_cells(&MergeMap::from([(zero.index(), entries.to_vec())]))
    }

    /// Replaces every entry of the set with a single constant-one cell.
    pub fn replace_with_one(&mut self, entries: &[usize]) -> CoreResult<()> {
        let one = self.add_cell(CellSymbol::One, &[])?;
        self.merge_cells(&MergeMap::from([(one.index(), entries.to_vec())]))
    }

    /// True if `entry` transitively depends on `target`.
    ///
    /// Depth strictly increases along edges, so the search prunes any branch
    /// at or below the target depth.
    fn depends_on(&mut self, entry: usize, target: usize) -> bool {
        if entry == target {
            return true;
        }
        let target_depth = self.desc[target].depth;
        if self.desc[entry as usize].depth <= target_depth {
            return false;
        }
        self.session += 1;
        let session = self.session;
        let mut stack = vec![entry];
        while let Some(cur) = stack.pop() {
            if self.desc[cur].session == session {
                continue;
            }
            self.desc[cur].session = session;
            for link in self.links_of(cur) {
                let src = link.index();
                if src == target {
                    return true;
                }
                if self.desc[src].depth > target_depth {
                    stack.push(src);
                }
            }
        }
        false
    }

    //------------------------------------------------------------------//
    // Cell replacement
    //------------------------------------------------------------------//

    /// Repoints the cell at `idx` to a new type and link list in place, so
    /// external fanouts remain valid.
    fn replace_cell(&mut self, idx: usize, type_id: CellTypeId, links: &[Link]) -> Link {
        debug_assert!(self.is_strashable(type_id, links.len()));
        self.destrash_entry(idx);

        let old_next = self.next_entry(idx as u32);
        let old_refcount = self.entries[idx].refcount;
        let old_links = self.links_of(idx);
        let old_depth = self.desc[idx].depth;
        let mut new_depth = 0u32;

        for link in links {
            self.add_fanout(link.index(), idx);
            self.entries[link.index()].refcount += 1;
            new_depth = new_depth.max(self.desc[link.index()].depth + 1);
        }
        for link in &old_links {
            let input = link.index();
            self.del_fanout(input, idx);
            self.entries[input].refcount -= 1;
            if self.entries[input].refcount == 0 && !self.entries[input].is_in() {
                self.delete_cell(input);
            }
        }

        self.extra.remove(&(idx as u32));
        self.entries[idx] = Cell::new(type_id, links);
        self.entries[idx].refcount = old_refcount;

        let key = self.strash_key(type_id, links);
        if !self.strash.contains_key(&key) {
            self.strash.insert(key, idx as u32);
        }
        self.desc[idx].session = 0;

        if old_depth != new_depth {
            self.delete_depth_bounds(idx as u32);
            self.desc[idx].depth = new_depth;
            self.add_depth_bounds(idx as u32);
            self.recompute_fanout_depths(idx, old_next);
        }
        Link::new(idx)
    }

    /// Propagates a depth change at `root` through its transitive fanouts.
    fn recompute_fanout_depths(&mut self, root: usize, old_root_next: u32) {
        if self.entries[root].refcount == 0 {
            return;
        }
        let mut changed: std::collections::HashSet<usize> =
            std::collections::HashSet::from([root]);
        let mut pending = self.entries[root].refcount as usize;
        let mut cur = old_root_next;
        while pending > 0 && cur != UPPER_BOUND_ID && cur != INVALID_ID {
            let cur_idx = cur as usize;
            if changed.contains(&cur_idx) {
                cur = self.next_entry(cur);
                continue;
            }
            let mut new_depth = 0u32;
            for link in self.links_of(cur_idx) {
                if changed.contains(&link.index()) {
                    pending -= 1;
                }
                new_depth = new_depth.max(self.desc[link.index()].depth + 1);
            }
            let cur_depth = self.desc[cur_idx].depth;
            let is_out = self.entries[cur_idx].symbol() == Some(CellSymbol::Out);
            if new_depth == cur_depth || is_out {
                self.desc[cur_idx].depth = new_depth;
                cur = self.next_entry(cur);
                continue;
            }
            pending += self.entries[cur_idx].refcount as usize;
            changed.insert(cur_idx);
            let next = self.next_entry(cur);
            self.delete_depth_bounds(cur);
            self.desc[cur_idx].depth = new_depth;
            self.add_depth_bounds(cur);
            cur = next;
        }
    }

    //------------------------------------------------------------------//
    // Rewriting
    //------------------------------------------------------------------//

    /// Rewrites the cell bound to the root of `rhs` with the body of `rhs`.
    ///
    /// `rhs_to_lhs` binds the indices of `rhs`'s inputs, and of its single
    /// output entry (which stands for the rewritten root), to entries of
    /// this builder. After the call it additionally maps every interior
    /// `rhs` cell to the entry that realizes it.
    pub fn replace(
        &mut self,
        rhs: &Subnet,
        rhs_to_lhs: &mut HashMap<usize, usize>,
        weight_fn: Option<&CellWeightProvider>,
        mut hooks: ReplaceHooks<'_>,
    ) -> CoreResult<()> {
        if rhs.out_num() != 1 {
            return Err(CoreError::InvalidCell(
                "replacement must have a single output".to_string(),
            ));
        }
        let out_entry = rhs.out_entry(0);
        let lhs_root = *rhs_to_lhs
            .get(&out_entry)
            .ok_or(CoreError::BadLink { idx: out_entry, size: rhs.size() })?;
        if lhs_root >= self.entries.len() || self.desc[lhs_root].depth == INVALID_ID {
            return Err(CoreError::BadLink {
                idx: lhs_root,
                size: self.entries.len(),
            });
        }
        let old_root_depth = self.desc[lhs_root].depth;

        // Validate bindings and reject mappings that would close a cycle:
        // a bound input that transitively depends on the root would become
        // part of the root's new fan-in.
        for (i, cell) in rhs.iter_cells() {
            if !cell.is_in() {
                continue;
            }
            let &bound = rhs_to_lhs
                .get(&i)
                .ok_or(CoreError::BadLink { idx: i, size: rhs.size() })?;
            if bound >= self.entries.len() || self.desc[bound].depth == INVALID_ID {
                return Err(CoreError::BadLink {
                    idx: bound,
                    size: self.entries.len(),
                });
            }
            if bound == lhs_root && rhs.out_link(0).index() != i {
                // The root would end up in its own fan-in.
                return Err(CoreError::CycleDetected);
            }
            if bound != lhs_root && self.depends_on(bound, lhs_root) {
                return Err(CoreError::CycleDetected);
            }
        }
        for (i, cell) in rhs.iter_cells() {
            if !cell.is_in() && !cell.is_out() && cell.arity as usize > IN_PLACE_LINKS {
                return Err(CoreError::InvalidCell(format!(
                    "replacement cell {i} is wider than the in-place capacity"
                )));
            }
        }

        // Always clear the root's strash slot before the walk, so the new
        // subtree can re-strash onto it.
        self.destrash_entry(lhs_root);

        let root_link = rhs.out_link(0);
        let mut root_collided = false;
        for (i, cell) in rhs.iter_cells() {
            if cell.is_in() || cell.is_out() {
                continue;
            }
            let links: Vec<Link> = rhs
                .links(i)
                .iter()
                .map(|l| Link {
                    idx: rhs_to_lhs[&l.index()] as u32,
                    out: l.out,
                    inv: l.inv,
                })
                .collect();

            let prev_len = self.entries.len();
            let prev_free = self.free.len();

            let is_root_cell = root_link.index() == i && !root_link.inv;
            let collision = self.strash_hit(cell.type_id, &links);
            let (new_idx, is_new) = if is_root_cell && collision.is_none() {
                (self.replace_cell(lhs_root, cell.type_id, &links).index(), true)
            } else {
                if is_root_cell && collision.is_some() {
                    root_collided = true;
                }
                let idx = self.alloc_entry(cell.type_id, &links);
                let fresh =
                    self.entries.len() == prev_len + 1 || self.free.len() + 1 == prev_free;
                (idx, fresh)
            };
            rhs_to_lhs.insert(i, new_idx);

            if is_new {
                if let Some(weight_fn) = weight_fn {
                    self.set_weight(new_idx, weight_fn(i));
                }
                if let Some(hook) = hooks.on_new_cell.as_mut() {
                    hook(new_idx);
                }
            } else if self.desc[new_idx].depth == old_root_depth {
                if let Some(hook) = hooks.on_equal_depth.as_mut() {
                    hook(new_idx);
                }
            } else if self.desc[new_idx].depth > old_root_depth {
                if let Some(hook) = hooks.on_greater_depth.as_mut() {
                    hook(new_idx);
                }
            }
        }

        // The root slot still needs a body when the rhs root is an input
        // pass-through, carries an inverted polarity, or collided with an
        // existing strashed node. A BUF preserves external fanouts.
        let pass_through = root_link.index() < rhs.in_num();
        if (pass_through && rhs_to_lhs[&root_link.index()] != lhs_root)
            || root_link.inv
            || root_collided
        {
            let chosen = Link {
                idx: rhs_to_lhs[&root_link.index()] as u32,
                out: root_link.out,
                inv: root_link.inv,
            };
            self.replace_cell(lhs_root, CellSymbol::Buf.into(), &[chosen]);
            if let Some(hook) = hooks.on_new_cell.as_mut() {
                hook(lhs_root);
            }
        }
        Ok(())
    }

    /// Dry-run of [`replace`](Self::replace): predicts the effect without
    /// mutating the builder.
    pub fn evaluate_replace(
        &self,
        rhs: &Subnet,
        rhs_to_lhs: &HashMap<usize, usize>,
        weight_fn: Option<&CellWeightProvider>,
        weight_modifier: Option<&CellWeightModifier>,
    ) -> CoreResult<Effect> {
        if rhs.out_num() != 1 {
            return Err(CoreError::InvalidCell(
                "replacement must have a single output".to_string(),
            ));
        }
        let mut map = rhs_to_lhs.clone();
        let mut reused: std::collections::HashSet<usize> = std::collections::HashSet::new();
        let added = self.added_entries_effect(rhs, &mut map, &mut reused, weight_fn, weight_modifier);
        let lhs_root = map[&rhs.out_entry(0)];
        let deleted = self.deleted_entries_effect(lhs_root, &reused, weight_modifier);
        Ok(deleted - added)
    }

    fn added_entries_effect(
        &self,
        rhs: &Subnet,
        rhs_to_lhs: &mut HashMap<usize, usize>,
        reused: &mut std::collections::HashSet<usize>,
        weight_fn: Option<&CellWeightProvider>,
        weight_modifier: Option<&CellWeightModifier>,
    ) -> Effect {
        let provided = |i: usize| -> f32 {
            let w = weight_fn.map_or(0.0, |f| f(i));
            weight_modifier.map_or(w, |m| m(w))
        };

        let mut added = 0i32;
        let mut added_weight = 0.0f32;
        let mut virtual_depth: HashMap<usize, i64> = HashMap::new();

        for (i, cell) in rhs.iter_cells() {
            if cell.is_out() {
                continue;
            }
            if cell.is_in() {
                if let Some(&bound) = rhs_to_lhs.get(&i) {
                    reused.insert(bound);
                    virtual_depth.insert(i, self.desc[bound].depth as i64);
                }
                continue;
            }
            let mut unbound_input = false;
            let mut links = Vec::with_capacity(cell.arity as usize);
            let mut depth = 0i64;
            for link in rhs.links(i) {
                depth = depth.max(virtual_depth.get(&link.index()).copied().unwrap_or(-1) + 1);
                match rhs_to_lhs.get(&link.index()) {
                    Some(&bound) => links.push(Link {
                        idx: bound as u32,
                        out: link.out,
                        inv: link.inv,
                    }),
                    None => unbound_input = true,
                }
            }
            virtual_depth.insert(i, depth);
            if unbound_input {
                added += 1;
                added_weight += provided(i);
                continue;
            }
            match self.strash_hit(cell.type_id, &links) {
                Some(existing) => {
                    rhs_to_lhs.insert(i, existing);
                    reused.insert(existing);
                }
                None => {
                    added += 1;
                    added_weight += provided(i);
                }
            }
        }

        let root_depth = virtual_depth
            .get(&rhs.out_link(0).index())
            .copied()
            .unwrap_or(0);
        Effect {
            cells: added,
            depth: root_depth as i32,
            weight: added_weight,
        }
    }

    fn deleted_entries_effect(
        &self,
        lhs_root: usize,
        reused: &std::collections::HashSet<usize>,
        weight_modifier: Option<&CellWeightModifier>,
    ) -> Effect {
        let old_depth = self.desc[lhs_root].depth as i32;
        if reused.contains(&lhs_root) {
            return Effect {
                cells: 0,
                depth: old_depth,
                weight: 0.0,
            };
        }

        let modified = |w: f32| weight_modifier.map_or(w, |m| m(w));
        let mut deleted = 1i32;
        let mut deleted_weight = modified(self.desc[lhs_root].weight);
        let mut virtual_refcount: HashMap<usize, u32> = HashMap::new();
        let mut queue = vec![lhs_root];
        while let Some(entry) = queue.pop() {
            for link in self.links_of(entry) {
                let src = link.index();
                if reused.contains(&src) || self.entries[src].is_in() {
                    continue;
                }
                let count = virtual_refcount
                    .entry(src)
                    .or_insert(self.entries[src].refcount);
                *count -= 1;
                if *count == 0 {
                    deleted += 1;
                    deleted_weight += modified(self.desc[src].weight);
                    queue.push(src);
                }
            }
        }
        Effect {
            cells: deleted,
            depth: old_depth,
            weight: deleted_weight,
        }
    }

    //------------------------------------------------------------------//
    // Compaction
    //------------------------------------------------------------------//

    /// Bakes the topological order into physical order.
    ///
    /// Renumbers live cells into a fresh arena, redirects links, resets
    /// refcounts from in-degrees, and recomputes depth bounds. When
    /// `elide_bufs` is set, BUF cells with exactly one fanout are bypassed,
    /// composing their polarity into the consumer link. Returns the
    /// old-index to new-index mapping (`u32::MAX` for dropped entries).
    pub fn rearrange_entries(&mut self, elide_bufs: bool) -> Vec<u32> {
        let order: Vec<usize> = self.iter().collect();
        let mut remap: Vec<u32> = vec![INVALID_ID; self.entries.len()];
        let mut relink: HashMap<usize, Link> = HashMap::new();

        let mut new_entries: Vec<Cell> = Vec::with_capacity(order.len());
        let mut new_extra: HashMap<u32, Vec<Link>> = HashMap::new();
        let mut new_desc: Vec<Descriptor> = Vec::with_capacity(order.len());

        for &i in &order {
            let cell = &self.entries[i];
            if elide_bufs && cell.is_buf() && cell.refcount == 1 {
                let source = self.link_of(i, 0);
                let target = relink.get(&source.index()).copied().unwrap_or(source);
                // A link into a BUF always reads port 0, so at most one of
                // the two port fields is set.
                relink.insert(
                    i,
                    Link {
                        idx: target.idx,
                        out: source.out.max(target.out),
                        inv: target.inv ^ source.inv,
                    },
                );
                continue;
            }

            let new_idx = new_entries.len();
            let links: Vec<Link> = self
                .links_of(i)
                .iter()
                .map(|l| {
                    let target = relink.get(&l.index()).copied().unwrap_or(*l);
                    Link {
                        idx: target.idx,
                        out: l.out.max(target.out),
                        inv: target.inv ^ l.inv,
                    }
                })
                .collect();

            let mut depth = 0;
            for link in &links {
                depth = std::cmp::max(depth, new_desc[link.index()].depth + 1);
                new_entries[link.index()].refcount += 1;
            }
            if self.entries[i].arity == 0 {
                depth = 0;
            }

            let mut new_cell = Cell::new(self.entries[i].type_id, &links);
            new_cell.more = 0;
            if links.len() > IN_PLACE_LINKS {
                new_extra.insert(new_idx as u32, links[IN_PLACE_LINKS..].to_vec());
            }
            new_entries.push(new_cell);
            new_desc.push(Descriptor {
                depth,
                weight: self.desc[i].weight,
                ..Descriptor::default()
            });
            remap[i] = new_idx as u32;
            relink.insert(
                i,
                Link {
                    idx: new_idx as u32,
                    out: 0,
                    inv: false,
                },
            );
        }

        self.entries = new_entries;
        self.extra = new_extra;
        self.desc = new_desc;
        self.rebuild_depth_bounds();
        self.clear_context();
        remap
    }

    fn rebuild_depth_bounds(&mut self) {
        self.depth_bounds.clear();
        for (i, cell) in self.entries.iter().enumerate() {
            if cell.symbol() == Some(CellSymbol::Out) {
                continue;
            }
            let depth = self.desc[i].depth as usize;
            if self.depth_bounds.len() <= depth {
                self.depth_bounds.resize(depth + 1, (INVALID_ID, INVALID_ID));
            }
            if self.depth_bounds[depth].0 == INVALID_ID {
                self.depth_bounds[depth].0 = i as u32;
            }
            self.depth_bounds[depth].1 = i as u32;
        }
    }

    fn clear_context(&mut self) {
        self.free.clear();
        self.subnet_begin = NORMAL_ORDER_ID;
        self.subnet_end = NORMAL_ORDER_ID;
        self.strash.clear();
        self.disable_fanouts();
        self.session = 0;
    }

    /// Freezes the builder into an immutable subnet and publishes it.
    pub fn make(self) -> CoreResult<SubnetId> {
        self.make_inner(false)
    }

    /// Freezes the builder, bypassing single-fanout BUF chains.
    pub fn make_eliding_bufs(self) -> CoreResult<SubnetId> {
        self.make_inner(true)
    }

    fn make_inner(mut self, elide_bufs: bool) -> CoreResult<SubnetId> {
        if self.n_out == 0 {
            return Err(CoreError::NoOutput);
        }
        self.rearrange_entries(elide_bufs);
        let mut entries: Vec<Entry> = Vec::with_capacity(self.entries.len());
        for i in 0..self.entries.len() {
            let links = self.links_of(i);
            let refcount = self.entries[i].refcount;
            let idx = push_entries(&mut entries, self.entries[i].type_id, &links);
            match &mut entries[idx] {
                Entry::Cell(cell) => cell.refcount = refcount,
                Entry::More(_) => unreachable!(),
            }
        }
        let subnet = Subnet::from_parts(entries, self.n_in, self.n_out);
        Ok(self.ctx.publish(subnet))
    }

    //------------------------------------------------------------------//
    // Validation
    //------------------------------------------------------------------//

    /// Checks the builder's structural invariants.
    ///
    /// Verifies refcounts against in-degrees, topological order, the depth
    /// recurrence, strash-table consistency, and the absence of negative
    /// cells. Intended for tests and debugging.
    pub fn validate(&self) -> CoreResult<()> {
        let order: Vec<usize> = self.iter().collect();
        let mut position: HashMap<usize, usize> = HashMap::new();
        for (pos, &i) in order.iter().enumerate() {
            position.insert(i, pos);
        }

        let mut in_degree: HashMap<usize, u32> = HashMap::new();
        for &i in &order {
            let cell = &self.entries[i];
            if let Some(sym) = cell.symbol() {
                if sym.is_negative() {
                    return Err(CoreError::InvalidCell(sym.name().to_string()));
                }
            }
            let mut depth = 0;
            for link in self.links_of(i) {
                let src = link.index();
                if position[&src] >= position[&i] {
                    return Err(CoreError::BadLink {
                        idx: src,
                        size: self.entries.len(),
                    });
                }
                *in_degree.entry(src).or_insert(0) += 1;
                depth = depth.max(self.desc[src].depth + 1);
            }
            if self.entries[i].arity == 0 {
                depth = 0;
            }
            if self.desc[i].depth != depth {
                return Err(CoreError::InvalidCell(format!(
                    "depth mismatch at entry {i}: stored {} computed {depth}",
                    self.desc[i].depth
                )));
            }
        }
        for &i in &order {
            if self.entries[i].refcount != in_degree.get(&i).copied().unwrap_or(0) {
                return Err(CoreError::InvalidCell(format!(
                    "refcount mismatch at entry {i}"
                )));
            }
        }

        let mut seen: HashMap<StrashKey, usize> = HashMap::new();
        for &i in &order {
            let cell = &self.entries[i];
            if self.is_strashable(cell.type_id, cell.arity as usize) {
                let key = self.strash_key(cell.type_id, &self.links_of(i));
                if let Some(&other) = seen.get(&key) {
                    return Err(CoreError::InvalidCell(format!(
                        "strash duplicate: entries {other} and {i}"
                    )));
                }
                seen.insert(key, i);
            }
        }
        Ok(())
    }
}
