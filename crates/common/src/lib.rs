//! Shared constants for the ledgerfill workspace
//!
//! This crate provides constants used across the ledgerfill engine, binary,
//! and test crates: default pool sizes, batch sizes, and other tuning knobs
//! that the engine's config layer uses as its defaults.

/// Default tuning knobs for the back-fill engine.
pub mod constants;

pub use constants::*;
