//! Terminal reporting for cross-validation runs.

pub mod format;

pub use format::*;
