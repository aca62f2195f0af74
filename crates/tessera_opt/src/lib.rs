//! Optimization infrastructure for the Tessera toolkit.
//!
//! Provides k-feasible cut enumeration, cone extraction over cuts, the
//! area/delay/power cost model with constraint penalties, and cost
//! estimators (including a simulation-based switching-activity estimator).

#![warn(missing_docs)]

pub mod activity;
pub mod cone;
pub mod cost;
pub mod cut;
pub mod estimator;

pub use activity::{SimulationEstimator, SwitchActivity};
pub use cone::{Cone, ConeBuilder};
pub use cost::{
    Constraint, Constraints, Cost, CostVector, Criterion, Indicator, Objective, PenaltyKind,
    COST_EPS,
};
pub use cut::{Cut, CutExtractor};
pub use estimator::{CostEstimator, LogicEstimator};
