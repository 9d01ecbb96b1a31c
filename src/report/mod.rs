//! Reporting: formatted fit summaries, residual and sweep tables.

pub mod format;

pub use format::*;
