//! Error taxonomy for the back-fill engine.
//!
//! Each component owns a narrow error enum; [`EngineError`] is the top-level
//! type the coordinator and the binary's `main` deal in.

use thiserror::Error;

/// Errors raised while reflecting or validating the store's schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A table required by a known operation tag is absent from the store.
    #[error("table `{0}` is missing from the store")]
    MissingTable(String),
    /// A column required by a known operation tag is absent from its table.
    #[error("column `{column}` is missing from table `{table}`")]
    MissingColumn {
        /// Destination table.
        table: String,
        /// Missing column name.
        column: String,
    },
    /// Reflection query itself failed.
    #[error("schema reflection failed: {0}")]
    Reflection(#[from] sqlx::Error),
}

/// Errors raised while shaping a raw operation or block into row form.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShapingError {
    /// The operation's tag isn't in the closed, registered set.
    #[error("unknown operation type `{0}`")]
    UnknownOperationType(String),
    /// An amount-typed field failed to parse as `"<decimal> <SYMBOL>"`.
    #[error("malformed amount `{0}`")]
    MalformedAmount(String),
    /// A field the shaper expected on the raw op envelope was absent.
    #[error("operation `{tag}` missing expected field `{field}`")]
    MissingField {
        /// Operation tag being shaped.
        tag: String,
        /// Expected field name.
        field: String,
    },
}

/// Errors raised by the accounts sideband.
#[derive(Debug, Error)]
pub enum AccountsError {
    /// The preload/repair insert itself failed.
    #[error("account insert failed: {0}")]
    Insert(#[from] sqlx::Error),
}

/// Errors raised by the gap finder.
#[derive(Debug, Error)]
pub enum GapFinderError {
    /// The `generate_series`/`EXCEPT` round trip failed.
    #[error("gap query failed: {0}")]
    Query(#[from] sqlx::Error),
}

/// Errors raised by the RPC batch client.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Transport-level failure (connect, timeout, non-2xx).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// Response body wasn't valid JSON-RPC, or pairing/count was wrong.
    #[error("malformed batch response: {0}")]
    RpcShape(String),
    /// The request was cancelled before it completed.
    #[error("request cancelled")]
    Cancelled,
}

/// Errors raised by the block writer.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Row shaping failed for some operation in the block; the whole block
    /// write is abandoned.
    #[error("shaping failed for block {block_num}: {source}")]
    Shaping {
        /// Height of the block being written.
        block_num: i64,
        /// Underlying shaping failure.
        #[source]
        source: ShapingError,
    },
    /// The insert sequence failed a second time after an account repair.
    #[error("block {block_num} write failed after repair: first={first}, second={second}")]
    BlockWriteFailed {
        /// Height of the block being written.
        block_num: i64,
        /// The error that triggered the repair attempt.
        first: String,
        /// The error raised by the re-attempt after repair.
        second: String,
    },
    /// Any other store error (connection loss, serialization failure, etc.)
    /// that isn't a foreign-key violation and so isn't locally recoverable.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

/// Top-level error type returned by the pipeline coordinator.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Fatal: the store's schema doesn't match what the registry expects.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// Fatal: the gap finder's query failed.
    #[error(transparent)]
    GapFinder(#[from] GapFinderError),
    /// Fatal: the accounts preload failed at start-up.
    #[error(transparent)]
    Accounts(#[from] AccountsError),
    /// The run was cancelled (e.g. user interrupt).
    #[error("run cancelled")]
    Cancelled,
}
