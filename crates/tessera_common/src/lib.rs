//! Shared foundational types used across the Tessera logic-synthesis toolkit.
//!
//! This crate provides the common error/result types and the dynamic truth
//! table used by the library, the mapper, and the equivalence checkers.

#![warn(missing_docs)]

pub mod result;
pub mod truth_table;

pub use result::{CoreError, CoreResult};
pub use truth_table::TruthTable;
