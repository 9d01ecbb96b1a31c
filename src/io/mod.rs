//! Input/output helpers.
//!
//! - titration input files (`input`)
//! - CSV exports (`export`)
//! - fit JSON read/write (`fitfile`)

pub mod export;
pub mod fitfile;
pub mod input;

pub use export::*;
pub use fitfile::*;
pub use input::*;
