//! Constants used across the ledgerfill project

/// Default number of blocks per JSON-RPC batch request.
pub const DEFAULT_JSONRPC_BATCH_SIZE: usize = 300;

/// Default number of in-flight RPC batches the coordinator keeps outstanding.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Minimum and maximum size of the writer connection pool.
pub const WRITER_POOL_SIZE: u32 = 40;

/// Cap on pooled HTTP connections to the upstream node.
pub const HTTP_POOL_MAX_IDLE: usize = 100;

/// Maximum length, in bytes, of an account name.
pub const ACCOUNT_NAME_MAX_LEN: usize = 16;

/// Length in hex characters of a transaction id.
pub const TRX_ID_HEX_LEN: usize = 40;

/// Upper-bound estimate of operations per block, used to seed the progress bar
/// before any blocks have actually been written.
pub const ESTIMATED_OPS_PER_BLOCK: u64 = 50;

/// Default starting block height.
pub const DEFAULT_START_BLOCK: u64 = 1;

/// Floor for the exponential retry backoff applied to a failed RPC batch.
pub const RETRY_BACKOFF_FLOOR_MS: u64 = 200;

/// Ceiling for the exponential retry backoff applied to a failed RPC batch.
pub const RETRY_BACKOFF_CEILING_MS: u64 = 30_000;
