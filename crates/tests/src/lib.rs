//! Integration tests for the ledgerfill back-fill engine.
//!
//! Store-touching scenarios require `DATABASE_URL` to point at a scratch
//! Postgres instance with the engine's schema applied; they skip when it's
//! unset rather than fail the run.


#[cfg(test)]
mod rpc_pipeline_tests;
#[cfg(test)]
mod scenarios;
#[cfg(test)]
mod writer_tests;

pub use common::*;
