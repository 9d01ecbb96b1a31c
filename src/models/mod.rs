//! Equilibrium chemistry.
//!
//! Models are implemented as small, pure functions so that fitting and sweep
//! code can stay generic over float width.

pub mod equilibrium;
pub mod surface;

pub use equilibrium::*;
pub use surface::*;
