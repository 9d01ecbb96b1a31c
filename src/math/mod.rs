//! Numerical building blocks: cubic roots, SVD covariance, log grids.

pub mod cubic;
pub mod ols;
pub mod spacing;

pub use cubic::*;
pub use ols::*;
pub use spacing::*;
