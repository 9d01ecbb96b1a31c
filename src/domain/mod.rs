//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - input data (`ChemistrySystem`, `ConditionSeries`)
//! - fit configuration (`FitStrategy`, `FitConfig`, `Precision`)
//! - fit outputs (`FitParams`, `FitResult`, `FitFile`, etc.)

pub mod types;

pub use types::*;
