//! Gate-level netlist model for the Tessera toolkit.
//!
//! The model is built around three pieces:
//!
//! 1. A [`Context`] owning the append-only cell-type registry and the
//!    `SubnetId -> Subnet` intern store.
//! 2. The frozen [`Subnet`]: an immutable, contiguously stored netlist in
//!    topological order, with inverters carried on edge polarity.
//! 3. The [`SubnetBuilder`]: the mutable working copy with structural
//!    hashing, fanout indexing, depth tracking, and bounded rewrites.

#![warn(missing_docs)]

pub mod builder;
pub mod celltype;
pub mod context;
pub mod evaluate;
pub mod ids;
pub mod subnet;

pub use builder::{
    CellWeightModifier, CellWeightProvider, Effect, MergeMap, ReplaceHooks, SubnetBuilder,
};
pub use celltype::{CellAttr, CellKind, CellSymbol, CellType, PinPower, ANY_ARITY};
pub use context::Context;
pub use evaluate::evaluate;
pub use ids::{CellTypeId, SubnetId};
pub use subnet::{Cell, Entry, Link, Subnet, IN_ENTRY_LINKS, IN_PLACE_LINKS};
