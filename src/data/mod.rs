//! Data sources other than input files.

pub mod synthetic;

pub use synthetic::*;
