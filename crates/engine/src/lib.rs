//! Parallel back-fill and gap-repair engine
//!
//! This crate provides the core ingestion pipeline for ledgerfill, including:
//! - Schema reflection and the row-shaping layer
//! - The accounts dimension sideband
//! - Gap discovery and batched JSON-RPC fetching
//! - Atomic, idempotent block writes with foreign-key repair
//! - The pipeline coordinator that drives a range end to end

/// Accounts dimension sideband: preload and on-demand repair insertion.
pub mod accounts;
/// Run configuration and its CLI/env surface.
pub mod config;
/// The pipeline coordinator: drives a range, fetches, shapes, and writes.
pub mod coordinator;
/// Error taxonomy shared across components.
pub mod error;
/// Gap discovery over the `blocks` table.
pub mod gapfinder;
/// Live-tail hand-off boundary.
pub mod live_tail;
/// Batched JSON-RPC client against the upstream node.
pub mod rpc;
/// Schema registry built by reflecting the live database.
pub mod schema;
/// Pure row-shaping from raw JSON to column-value tuples.
pub mod shaping;
/// Atomic, idempotent block + operation writer.
pub mod writer;

pub use accounts::AccountsSideband;
pub use config::{BackfillConfig, ConfigError};
pub use coordinator::{PipelineCoordinator, SweepReport};
pub use error::EngineError;
pub use gapfinder::{GapFinder, RangeCounts};
pub use live_tail::{LiveTail, NoopLiveTail};
pub use rpc::{FetchedBlock, RpcBatchClient};
pub use schema::SchemaRegistry;
pub use shaping::{shape_block, shape_operation, AssetSymbol, OperationType, ShapedBlock, ShapedOperation};
pub use writer::BlockWriter;
