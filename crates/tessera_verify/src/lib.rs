//! Formal verification for the Tessera toolkit.
//!
//! Provides the SAT-solver boundary, the Tseitin CNF encoder over subnets,
//! an encode-once property verifier, miter construction, and three
//! equivalence checkers (SAT, BDD, and random/exhaustive simulation)
//! behind a common [`Checker`] contract.

#![warn(missing_docs)]

pub mod bdd_checker;
pub mod checker;
pub mod encoder;
pub mod miter;
pub mod rnd_checker;
pub mod sat_checker;
pub mod solver;
pub mod verifier;

pub use bdd_checker::BddChecker;
pub use checker::{make_checker, CheckResult, CheckStatus, Checker, LecKind};
pub use encoder::{encode, encode_equal, encode_equal_const, EncoderContext, Property};
pub use miter::{miter, MiterBinding};
pub use rnd_checker::RndChecker;
pub use sat_checker::SatChecker;
pub use solver::{Lit, Solver, Var};
pub use verifier::Verifier;
