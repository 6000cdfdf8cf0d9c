//! Input/output helpers.
//!
//! - CSV ingest + validation (`ingest`)
//! - score matrix and dataset CSV exports (`export`)
//! - run summary JSON (`report`)

pub mod export;
pub mod ingest;
pub mod report;

pub use export::*;
pub use ingest::*;
pub use report::*;
