//! RPC Batch Client: batched `get_block`/`get_ops_in_block` JSON-RPC calls
//! against the upstream node.
//!
//! Batch construction and response pairing are grounded in the original's
//! `fetch_blocks_and_ops_in_blocks`, which interleaves `get_block`/
//! `get_ops_in_block` requests per height and asserts the two responses for
//! a height share an `id`. Retry-with-backoff and the semaphore-bounded
//! client mirror `crates/node/src/forwarder.rs`'s `TxForwarder`.

use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tracing::{debug, warn};

use ledgerfill_common::{RETRY_BACKOFF_CEILING_MS, RETRY_BACKOFF_FLOOR_MS};

use crate::error::RpcError;

fn init_metrics() {
    metrics::describe_histogram!(
        "rpc_batch_latency_ms",
        "Latency of one upstream JSON-RPC batch round trip (ms)"
    );
    metrics::describe_counter!(
        "rpc_batch_retries_total",
        "Total retried JSON-RPC batches, by failure class"
    );
}

/// One fetched block paired with its operations envelope, keyed by height.
#[derive(Debug, Clone)]
pub struct FetchedBlock {
    /// Block height (the JSON-RPC request `id` both halves shared).
    pub block_num: i64,
    /// The raw `get_block` result.
    pub raw_block: Value,
    /// The raw `get_ops_in_block` result (a JSON array of operation
    /// envelopes).
    pub raw_ops: Value,
}

/// Issues batched JSON-RPC requests against the upstream node.
#[derive(Debug, Clone)]
pub struct RpcBatchClient {
    client: reqwest::Client,
    endpoint: reqwest::Url,
}

impl RpcBatchClient {
    /// Builds a client with the workspace-standard connection pool cap.
    pub fn new(endpoint: reqwest::Url) -> Self {
        static INIT: std::sync::Once = std::sync::Once::new();
        INIT.call_once(init_metrics);

        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(ledgerfill_common::HTTP_POOL_MAX_IDLE)
            .build()
            .expect("reqwest client builder with a pool cap never fails");
        Self { client, endpoint }
    }

    /// Fetches `heights` in a single batched POST, retrying the whole batch
    /// indefinitely with bounded exponential backoff on transport failure or
    /// shape mismatch. Safe to retry because the writes downstream are
    /// idempotent.
    pub async fn fetch_batch(&self, heights: &[i64]) -> Result<Vec<FetchedBlock>, RpcError> {
        let mut attempt: u32 = 0;
        loop {
            let start = Instant::now();
            match self.fetch_batch_once(heights).await {
                Ok(blocks) => {
                    metrics::histogram!("rpc_batch_latency_ms")
                        .record(start.elapsed().as_millis() as f64);
                    return Ok(blocks);
                }
                Err(err) => {
                    let class = match &err {
                        RpcError::Transport(_) => "transport",
                        RpcError::RpcShape(_) => "shape",
                        RpcError::Cancelled => "cancelled",
                    };
                    metrics::counter!("rpc_batch_retries_total", "class" => class);

                    let backoff = backoff_for_attempt(attempt);
                    warn!(
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        heights = heights.len(),
                        error = %err,
                        "rpc batch failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }

    async fn fetch_batch_once(&self, heights: &[i64]) -> Result<Vec<FetchedBlock>, RpcError> {
        let mut body = Vec::with_capacity(heights.len() * 2);
        for &height in heights {
            body.push(json!({
                "id": height,
                "jsonrpc": "2.0",
                "method": "get_block",
                "params": [height],
            }));
            body.push(json!({
                "id": height,
                "jsonrpc": "2.0",
                "method": "get_ops_in_block",
                "params": [height, false],
            }));
        }

        debug!(endpoint = %self.endpoint, count = heights.len(), "sending rpc batch");
        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let responses: Vec<Value> = resp.json().await?;
        if responses.len() != heights.len() * 2 {
            return Err(RpcError::RpcShape(format!(
                "expected {} responses, got {}",
                heights.len() * 2,
                responses.len()
            )));
        }

        let mut fetched = Vec::with_capacity(heights.len());
        for pair in responses.chunks(2) {
            let [first, second] = pair else {
                return Err(RpcError::RpcShape("unpaired response".to_owned()));
            };
            let id_first = response_id(first)?;
            let id_second = response_id(second)?;
            if id_first != id_second {
                return Err(RpcError::RpcShape(format!(
                    "mismatched pair ids {id_first} != {id_second}"
                )));
            }
            fetched.push(FetchedBlock {
                block_num: id_first,
                raw_block: response_result(first)?,
                raw_ops: response_result(second)?,
            });
        }

        fetched.sort_by_key(|b| b.block_num);
        Ok(fetched)
    }
}

fn response_id(value: &Value) -> Result<i64, RpcError> {
    value
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| RpcError::RpcShape("response missing integer id".to_owned()))
}

fn response_result(value: &Value) -> Result<Value, RpcError> {
    if let Some(err) = value.get("error") {
        return Err(RpcError::RpcShape(format!("upstream error: {err}")));
    }
    value
        .get("result")
        .cloned()
        .ok_or_else(|| RpcError::RpcShape("response missing result".to_owned()))
}

fn backoff_for_attempt(attempt: u32) -> Duration {
    let scaled = RETRY_BACKOFF_FLOOR_MS.saturating_mul(1u64 << attempt.min(16));
    Duration::from_millis(scaled.min(RETRY_BACKOFF_CEILING_MS))
}
