//! Bit-parallel subnet simulation.
//!
//! A [`Simulator`] compiles a frozen subnet once into a flat program of
//! commands. Each command applies a gate kernel selected by `(symbol,
//! arity)` to 64-bit state chunks, so every simulation pass evaluates 64
//! independent input vectors at once.

#![warn(missing_docs)]

mod simulator;

pub use simulator::{Simulator, DATA_CHUNK_BITS};
