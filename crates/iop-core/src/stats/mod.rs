//! # Stats Module
//!
//! Probability distributions and descriptive estimates.
//!
//! Everything here is plain `f64` arithmetic with no external numeric
//! dependency. Accuracy targets are those of applied survey statistics:
//! p-values and interval bounds correct to well beyond the 4 decimals
//! that get reported.

mod descriptive;
mod distributions;

pub use descriptive::*;
pub use distributions::*;
