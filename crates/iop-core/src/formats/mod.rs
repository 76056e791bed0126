//! # Formats Module
//!
//! Delimited-text reading and writing for survey input and result tables.
//!
//! This module contains:
//! - The raw, untyped view of a survey export (`RawTable`)
//! - Table serialization for export
//! - Optional content hashing for export manifests
//!
//! Note: File I/O operations remain in the app layer (apps/iop).
//! This module only handles format conversion (pure transformations).

mod delimited;

pub use delimited::*;

/// Content hash of exported bytes (BLAKE3, hex), when the `crypto-hash`
/// feature is enabled.
#[cfg(feature = "crypto-hash")]
#[must_use]
pub fn checksum(bytes: &[u8]) -> Option<String> {
    Some(blake3::hash(bytes).to_hex().to_string())
}

/// Content hash of exported bytes. Always `None` without the
/// `crypto-hash` feature.
#[cfg(not(feature = "crypto-hash"))]
#[must_use]
pub fn checksum(_bytes: &[u8]) -> Option<String> {
    None
}
