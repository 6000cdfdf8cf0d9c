//! Mathematical utilities: deviance scoring and (ridge) least squares.

pub mod deviance;
pub mod ols;

pub use deviance::*;
pub use ols::*;
