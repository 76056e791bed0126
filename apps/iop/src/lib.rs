//! # IOp Library
//!
//! This library exposes the `iop` command implementations for testing and
//! integration.
//!
//! The main binary uses these modules through the `main.rs` entry point.

pub mod cli;
pub mod export;

// Re-export iop_core for convenience
pub use iop_core;
