//! Cone extraction: rebuilding the fan-in of a node over a cut.
//!
//! A cone is a fresh single-output subnet whose inputs are the cut leaves
//! in canonical (ascending) order and whose interior replicates the
//! transitive fan-in of the root restricted to those leaves.

use crate::cut::Cut;
use std::collections::HashMap;
use tessera_common::{CoreError, CoreResult};
use tessera_model::{Context, Link, Subnet, SubnetBuilder, SubnetId};

/// A reconstructed cone.
pub struct Cone {
    /// The published cone subnet.
    pub subnet: SubnetId,
    /// For every cone entry, the entry index in the original subnet.
    pub to_original: Vec<usize>,
}

/// Builds cones of a fixed subnet.
pub struct ConeBuilder<'a> {
    subnet: &'a Subnet,
    ctx: &'a Context,
}

impl<'a> ConeBuilder<'a> {
    /// Creates a cone builder over `subnet`.
    pub fn new(ctx: &'a Context, subnet: &'a Subnet) -> Self {
        Self { subnet, ctx }
    }

    /// Reconstructs the cone of `cut`.
    ///
    /// The cone's inputs correspond to `cut.leaves` in order; its single
    /// output computes the root function restricted to the leaves.
    pub fn cone(&self, cut: &Cut) -> CoreResult<Cone> {
        let mut builder = SubnetBuilder::new(self.ctx);
        let mut map: HashMap<usize, Link> = HashMap::new();
        let mut to_original = Vec::new();

        for &leaf in &cut.leaves {
            map.insert(leaf, builder.add_input());
            to_original.push(leaf);
        }

        // Interior cells between the leaves and the root, in storage order.
        let members = self.collect_interior(cut)?;
        for &i in &members {
            let links: Vec<Link> = self
                .subnet
                .links(i)
                .iter()
                .map(|l| {
                    let mapped = map[&l.index()];
                    Link {
                        idx: mapped.idx,
                        out: mapped.out,
                        inv: l.inv ^ mapped.inv,
                    }
                })
                .collect();
            let link = builder.add_cell(self.subnet.cell(i).type_id, &links)?;
            map.insert(i, link);
            to_original.push(i);
        }

        builder.add_output(map[&cut.root])?;
        to_original.push(cut.root);
        Ok(Cone {
            subnet: builder.make()?,
            to_original,
        })
    }

    /// The cone over the whole fan-in DAG of `root`, back to primary
    /// inputs and constants.
    pub fn max_cone(&self, root: usize) -> CoreResult<Cone> {
        let mut leaves = Vec::new();
        let mut stack = vec![root];
        let mut seen = vec![false; self.subnet.size()];
        while let Some(i) = stack.pop() {
            if seen[i] {
                continue;
            }
            seen[i] = true;
            let cell = self.subnet.cell(i);
            if cell.is_in() {
                leaves.push(i);
                continue;
            }
            // Constants replicate into the cone instead of becoming leaves.
            for link in self.subnet.links(i) {
                stack.push(link.index());
            }
        }
        leaves.sort_unstable();
        self.cone(&Cut::new(root, leaves))
    }

    /// Interior entries strictly between the cut leaves and the root,
    /// in ascending storage order (root included).
    fn collect_interior(&self, cut: &Cut) -> CoreResult<Vec<usize>> {
        let mut members = Vec::new();
        let mut stack = vec![cut.root];
        let mut seen = vec![false; self.subnet.size()];
        while let Some(i) = stack.pop() {
            if seen[i] || cut.contains(i) {
                continue;
            }
            seen[i] = true;
            let cell = self.subnet.cell(i);
            if cell.is_in() {
                // A path from an input escapes the cut: not a valid cut.
                return Err(CoreError::BadLink {
                    idx: i,
                    size: self.subnet.size(),
                });
            }
            members.push(i);
            for link in self.subnet.links(i) {
                stack.push(link.index());
            }
        }
        members.sort_unstable();
        Ok(members)
    }
}
