//! K-feasible cut enumeration.
//!
//! For every entry the extractor enumerates up to a configurable number of
//! cuts with at most `k` leaves. The trivial cut `{i}` is always present.
//! Interior cuts are formed by Cartesian-merging the cut sets of the cell's
//! fan-ins, discarding oversized cuts, duplicates, and cuts dominated by a
//! smaller cut of the same root.

use tessera_model::Subnet;

/// A cut: the root entry and its sorted, deduplicated leaf set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cut {
    /// The entry the cut is rooted at.
    pub root: usize,
    /// Leaf entry indices in ascending order.
    pub leaves: Vec<usize>,
    /// 64-bit membership signature for fast subset tests.
    sig: u64,
}

impl Cut {
    /// The trivial cut `{root}`.
    pub fn trivial(root: usize) -> Self {
        Self::new(root, vec![root])
    }

    /// A cut with the given leaves (sorted and deduplicated).
    pub fn new(root: usize, mut leaves: Vec<usize>) -> Self {
        leaves.sort_unstable();
        leaves.dedup();
        let sig = leaves.iter().fold(0u64, |acc, &l| acc | (1u64 << (l % 64)));
        Self { root, leaves, sig }
    }

    /// Number of leaves.
    pub fn size(&self) -> usize {
        self.leaves.len()
    }

    /// True if the cut is the trivial cut of its root.
    pub fn is_trivial(&self) -> bool {
        self.leaves.len() == 1 && self.leaves[0] == self.root
    }

    /// True if `leaf` is one of the cut's leaves.
    pub fn contains(&self, leaf: usize) -> bool {
        self.sig & (1u64 << (leaf % 64)) != 0 && self.leaves.binary_search(&leaf).is_ok()
    }

    /// True if every leaf of `self` is a leaf of `other`.
    pub fn dominates(&self, other: &Cut) -> bool {
        if self.leaves.len() > other.leaves.len() || self.sig & other.sig != self.sig {
            return false;
        }
        self.leaves.iter().all(|&l| other.contains(l))
    }
}

/// Enumerates k-feasible cuts for every entry of a subnet.
pub struct CutExtractor {
    cuts: Vec<Vec<Cut>>,
}

/// Default bound on the number of cuts kept per entry.
const DEFAULT_CUT_LIMIT: usize = 16;

impl CutExtractor {
    /// Enumerates cuts of at most `k` leaves with the default per-entry limit.
    pub fn new(subnet: &Subnet, k: usize) -> Self {
        Self::with_limit(subnet, k, DEFAULT_CUT_LIMIT)
    }

    /// Enumerates cuts of at most `k` leaves, keeping at most `limit` cuts
    /// per entry (the trivial cut always survives).
    pub fn with_limit(subnet: &Subnet, k: usize, limit: usize) -> Self {
        let mut cuts: Vec<Vec<Cut>> = vec![Vec::new(); subnet.size()];

        for (i, cell) in subnet.iter_cells() {
            if cell.is_in() || cell.arity == 0 {
                cuts[i] = vec![Cut::trivial(i)];
                continue;
            }
            if cell.is_out() {
                cuts[i] = vec![Cut::trivial(i)];
                continue;
            }

            let mut merged: Vec<Cut> = Vec::new();
            let links = subnet.links(i);
            // Cartesian merge of the child cut sets.
            let mut partial: Vec<Vec<usize>> = vec![Vec::new()];
            for link in &links {
                let child_cuts = &cuts[link.index()];
                let mut next: Vec<Vec<usize>> = Vec::new();
                for base in &partial {
                    for child in child_cuts {
                        let mut union = base.clone();
                        for &leaf in &child.leaves {
                            if let Err(pos) = union.binary_search(&leaf) {
                                union.insert(pos, leaf);
                            }
                        }
                        if union.len() <= k {
                            next.push(union);
                        }
                    }
                }
                partial = next;
            }
            for leaves in partial {
                insert_filtered(&mut merged, Cut::new(i, leaves), limit);
            }
            insert_filtered(&mut merged, Cut::trivial(i), limit + 1);
            cuts[i] = merged;
        }

        Self { cuts }
    }

    /// The cuts enumerated for entry `i`.
    pub fn cuts(&self, i: usize) -> &[Cut] {
        &self.cuts[i]
    }
}

/// Inserts a cut unless it duplicates or is dominated by an existing one;
/// drops existing cuts the new cut dominates.
fn insert_filtered(cuts: &mut Vec<Cut>, cut: Cut, limit: usize) {
    for existing in cuts.iter() {
        if existing.dominates(&cut) {
            return;
        }
    }
    cuts.retain(|existing| !cut.dominates(existing));
    if cuts.len() < limit {
        cuts.push(cut);
    }
}
