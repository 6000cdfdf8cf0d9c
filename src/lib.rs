//! `claims-cv` library crate.
//!
//! The binary (`cv`) is a thin wrapper around this library so that:
//!
//! - the fold, grid, and selection logic is testable without spawning processes
//! - learners can be plugged in from other crates through `models::Learner`

pub mod app;
pub mod cli;
pub mod cv;
pub mod data;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
