//! Cut-based technology mapping.
//!
//! A [`CellLibrary`] materializes library cells (and one-level supergate
//! compositions) as truth-table-keyed pattern subnets. The [`CutMapper`]
//! covers an AND/inverter network with patterns using a depth pass, global
//! area-flow recovery, and local exact-area recovery, honoring the
//! [`Sdc`] area/arrival bounds. Sequential cells map through the
//! [`SequentialMapper`].

#![warn(missing_docs)]

pub mod library;
pub mod mapper;
pub mod sdc;
pub mod seq_mapper;
mod supergate;

pub use library::{CellLibrary, PatternAttr};
pub use mapper::{CutMapper, MapReport};
pub use sdc::Sdc;
pub use seq_mapper::{SequentialMapper, Strategy};
