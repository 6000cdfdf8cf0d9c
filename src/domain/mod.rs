//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - configuration enums (`Family`, `Parsimony`, `SelectionRule`, `LearnerKind`)
//! - observations and the immutable `Dataset` they live in
//! - fold splits and run configuration (`FoldSplit`, `CvConfig`)

pub mod types;

pub use types::*;
