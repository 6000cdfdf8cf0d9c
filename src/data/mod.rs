//! Data sources other than user CSVs.

pub mod sample;

pub use sample::*;

use crate::domain::Family;

/// Response and exposure column names used when writing simulated portfolios.
pub fn structural_columns(family: Family) -> (&'static str, &'static str) {
    match family {
        Family::Poisson => ("claims", "exposure"),
        Family::Gamma => ("severity", "n_claims"),
    }
}
