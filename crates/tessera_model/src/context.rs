//! The model context: cell-type registry and subnet intern store.
//!
//! Both tables are append-only and interior-mutable, so registration and
//! publication take `&self` and readers share [`Arc`]s. Published records
//! are never mutated afterwards; concurrent reads are safe, concurrent
//! writers must synchronize externally.

use crate::celltype::{CellType, BUILTIN_SYMBOLS};
use crate::ids::{CellTypeId, SubnetId};
use crate::subnet::Subnet;
use std::sync::{Arc, RwLock};

/// Owns the cell-type registry and the `SubnetId -> Subnet` intern table.
///
/// There are no hidden singletons: every API that resolves a type or a
/// subnet takes the context explicitly.
pub struct Context {
    types: RwLock<Vec<Arc<CellType>>>,
    subnets: RwLock<Vec<Arc<Subnet>>>,
}

impl Context {
    /// Creates a context with all builtin gate types pre-registered.
    ///
    /// Builtin registration order matches [`BUILTIN_SYMBOLS`], so converting
    /// a [`CellSymbol`](crate::celltype::CellSymbol) into a [`CellTypeId`]
    /// needs no lookup.
    pub fn new() -> Self {
        let types = BUILTIN_SYMBOLS
            .iter()
            .map(|&sym| Arc::new(CellType::gate(sym)))
            .collect();
        Self {
            types: RwLock::new(types),
            subnets: RwLock::new(Vec::new()),
        }
    }

    /// Registers a new cell type and returns its ID.
    pub fn register_type(&self, cell_type: CellType) -> CellTypeId {
        let mut types = self.types.write().expect("cell-type registry poisoned");
        let id = CellTypeId::from_raw(types.len() as u32);
        types.push(Arc::new(cell_type));
        id
    }

    /// Resolves a cell type.
    ///
    /// # Panics
    ///
    /// Panics if the ID was not issued by this context.
    pub fn cell_type(&self, id: CellTypeId) -> Arc<CellType> {
        let types = self.types.read().expect("cell-type registry poisoned");
        types
            .get(id.as_raw() as usize)
            .unwrap_or_else(|| panic!("unknown cell type id {}", id.as_raw()))
            .clone()
    }

    /// Resolves a cell type without panicking.
    pub fn try_cell_type(&self, id: CellTypeId) -> Option<Arc<CellType>> {
        let types = self.types.read().expect("cell-type registry poisoned");
        types.get(id.as_raw() as usize).cloned()
    }

    /// Number of registered cell types (builtins included).
    pub fn type_count(&self) -> usize {
        self.types.read().expect("cell-type registry poisoned").len()
    }

    /// Publishes a frozen subnet and returns its ID.
    pub fn publish(&self, subnet: Subnet) -> SubnetId {
        let mut subnets = self.subnets.write().expect("subnet store poisoned");
        let id = SubnetId::from_raw(subnets.len() as u32);
        subnets.push(Arc::new(subnet));
        id
    }

    /// Resolves a published subnet.
    ///
    /// # Panics
    ///
    /// Panics if the ID was not issued by this context.
    pub fn subnet(&self, id: SubnetId) -> Arc<Subnet> {
        let subnets = self.subnets.read().expect("subnet store poisoned");
        subnets
            .get(id.as_raw() as usize)
            .unwrap_or_else(|| panic!("unknown subnet id {}", id.as_raw()))
            .clone()
    }

    /// Number of published subnets.
    pub fn subnet_count(&self) -> usize {
        self.subnets.read().expect("subnet store poisoned").len()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SubnetBuilder;
    use crate::celltype::{CellAttr, CellKind, CellSymbol};

    #[test]
    fn builtins_preregistered() {
        let ctx = Context::new();
        assert_eq!(ctx.type_count(), BUILTIN_SYMBOLS.len());
        let and = ctx.cell_type(CellSymbol::And.into());
        assert_eq!(and.symbol, CellSymbol::And);
        assert_eq!(and.kind, CellKind::Gate);
    }

    #[test]
    fn register_and_resolve_custom_type() {
        let ctx = Context::new();
        let id = ctx.register_type(CellType::library_cell(
            "NAND2_X1",
            CellSymbol::Nand,
            2,
            None,
            CellAttr {
                area: 1.5,
                ..CellAttr::default()
            },
        ));
        assert!(id.as_raw() >= BUILTIN_SYMBOLS.len() as u32);
        assert_eq!(ctx.cell_type(id).name, "NAND2_X1");
        assert!(id.builtin_symbol().is_none());
    }

    #[test]
    fn publish_and_resolve_subnet() {
        let ctx = Context::new();
        let mut builder = SubnetBuilder::new(&ctx);
        let x = builder.add_input();
        builder.add_output(x).unwrap();
        let id = builder.make().unwrap();
        let subnet = ctx.subnet(id);
        assert_eq!(subnet.in_num(), 1);
        assert_eq!(subnet.out_num(), 1);
        assert_eq!(ctx.subnet_count(), 1);
    }

    #[test]
    fn try_cell_type_out_of_range() {
        let ctx = Context::new();
        assert!(ctx.try_cell_type(CellTypeId::from_raw(9999)).is_none());
    }
}
