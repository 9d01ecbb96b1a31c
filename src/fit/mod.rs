//! Parameter estimation.
//!
//! Responsibilities:
//!
//! - residual definitions for least squares and orthogonal distance regression
//! - Levenberg–Marquardt minimization
//! - optional multi-start seeding (parallel)
//! - uncertainty estimates and fit diagnostics

pub mod fitter;
pub mod lm;
pub mod problem;
pub mod start_grid;

pub use fitter::*;
pub use lm::*;
pub use problem::*;
pub use start_grid::*;
