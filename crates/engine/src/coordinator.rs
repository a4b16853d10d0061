//! Pipeline Coordinator: drives a block range end-to-end — partitions it
//! into RPC batches, caps in-flight work, and routes fetched work into
//! writers.
//!
//! Chunk partitioning, the bound on in-flight chunk futures, and the
//! two-pass sweep are grounded in `sbds.storages.db.scripts.populate`'s
//! `process_blocks`/`as_completed_limit_concurrent` and the `_populate`
//! function's two back-to-back `collect_missing_block_nums` +
//! `process_blocks` calls.

use futures::stream::{FuturesUnordered, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, instrument, warn};

use ledgerfill_common::ESTIMATED_OPS_PER_BLOCK;

use crate::accounts::AccountsSideband;
use crate::error::EngineError;
use crate::gapfinder::GapFinder;
use crate::rpc::RpcBatchClient;
use crate::shaping::{shape_block, shape_operation};
use crate::writer::BlockWriter;

/// Drives the two-sweep back-fill over `[start, end]`.
#[derive(Debug, Clone)]
pub struct PipelineCoordinator {
    gap_finder: GapFinder,
    rpc: RpcBatchClient,
    writer: BlockWriter,
    accounts: AccountsSideband,
    batch_size: usize,
    concurrency: usize,
}

/// Outcome of one sweep: how many blocks landed and which, if any, were
/// skipped due to a non-retryable shaping failure.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Block heights successfully written this sweep.
    pub written: Vec<i64>,
    /// Block heights whose shaping failed; the second sweep will re-hit
    /// these rather than repair them, per the design.
    pub failed: Vec<i64>,
}

impl PipelineCoordinator {
    /// Assembles a coordinator from its already-constructed collaborators.
    pub const fn new(
        gap_finder: GapFinder,
        rpc: RpcBatchClient,
        writer: BlockWriter,
        accounts: AccountsSideband,
        batch_size: usize,
        concurrency: usize,
    ) -> Self {
        Self {
            gap_finder,
            rpc,
            writer,
            accounts,
            batch_size,
            concurrency,
        }
    }

    /// Preloads the accounts dimension with a caller-supplied list, e.g. the
    /// contents of `--accounts-file`.
    pub async fn preload_accounts(&self, names: &[String]) -> Result<(), EngineError> {
        self.accounts.preload(names).await?;
        Ok(())
    }

    /// Runs the full two-pass sweep over `[start, end]` and returns the
    /// combined report across both passes.
    #[instrument(skip(self))]
    pub async fn run(&self, start: i64, end: i64) -> Result<SweepReport, EngineError> {
        let counts = self.gap_finder.counts(start, end).await?;
        info!(
            existing = counts.existing,
            missing = counts.missing,
            total = counts.total,
            "starting first sweep"
        );

        let first = self.sweep(start, end).await?;

        info!(
            written = first.written.len(),
            failed = first.failed.len(),
            "first sweep complete, starting second sweep"
        );

        let second = self.sweep(start, end).await?;

        let mut combined = first;
        combined.written.extend(second.written);
        combined.failed = second.failed;
        Ok(combined)
    }

    /// One end-to-end pass: gap-find, fetch, shape, write over `[start,
    /// end]`.
    async fn sweep(&self, start: i64, end: i64) -> Result<SweepReport, EngineError> {
        let missing = self.gap_finder.collect_missing(start, end).await?;
        if missing.is_empty() {
            return Ok(SweepReport::default());
        }

        let blocks_bar = ProgressBar::new(missing.len() as u64);
        blocks_bar.set_style(
            ProgressStyle::with_template(
                "{spinner} blocks {bar:40.cyan/blue} {pos}/{len}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        let ops_bar = ProgressBar::new(missing.len() as u64 * ESTIMATED_OPS_PER_BLOCK);
        ops_bar.set_style(
            ProgressStyle::with_template("{spinner} ops    {bar:40.green/blue} {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut report = SweepReport::default();
        let chunks: Vec<&[i64]> = missing.chunks(self.batch_size).collect();
        let mut in_flight = FuturesUnordered::new();
        let mut next_chunk = 0usize;

        while next_chunk < chunks.len() || !in_flight.is_empty() {
            while in_flight.len() < self.concurrency && next_chunk < chunks.len() {
                let chunk = chunks[next_chunk].to_vec();
                next_chunk += 1;
                in_flight.push(self.process_chunk(chunk));
            }

            if let Some(chunk_report) = in_flight.next().await {
                for _ in &chunk_report.written {
                    blocks_bar.inc(1);
                    ops_bar.inc(ESTIMATED_OPS_PER_BLOCK);
                }
                for &height in &chunk_report.failed {
                    blocks_bar.inc(1);
                    error!(block_num = height, "block write failed, deferring");
                }
                report.written.extend(chunk_report.written);
                report.failed.extend(chunk_report.failed);
            }
        }

        blocks_bar.finish_and_clear();
        ops_bar.finish_and_clear();
        Ok(report)
    }

    /// Fetches one chunk of heights and writes every block in it
    /// concurrently, returning which heights landed and which failed.
    async fn process_chunk(&self, heights: Vec<i64>) -> SweepReport {
        let fetched = match self.rpc.fetch_batch(&heights).await {
            Ok(fetched) => fetched,
            Err(err) => {
                warn!(error = %err, "rpc batch ultimately failed, deferring whole chunk");
                return SweepReport {
                    written: Vec::new(),
                    failed: heights,
                };
            }
        };

        let mut writes = FuturesUnordered::new();
        for block in fetched {
            writes.push(self.write_one(block));
        }

        let mut report = SweepReport::default();
        while let Some((height, ok)) = writes.next().await {
            if ok {
                report.written.push(height);
            } else {
                report.failed.push(height);
            }
        }
        report
    }

    async fn write_one(&self, block: crate::rpc::FetchedBlock) -> (i64, bool) {
        let height = block.block_num;
        let ops_array = match block.raw_ops.as_array() {
            Some(ops) => ops.clone(),
            None => Vec::new(),
        };

        let mut shaped_ops = Vec::with_capacity(ops_array.len());
        for raw_op in &ops_array {
            match shape_operation(raw_op) {
                Ok(shaped) => shaped_ops.push(shaped),
                Err(err) => {
                    error!(block_num = height, error = %err, "shaping failed, block deferred");
                    return (height, false);
                }
            }
        }

        let shaped_block = match shape_block(&block.raw_block, &shaped_ops) {
            Ok(block) => block,
            Err(err) => {
                error!(block_num = height, error = %err, "block shaping failed");
                return (height, false);
            }
        };

        match self.writer.write(&shaped_block, &shaped_ops).await {
            Ok(()) => (height, true),
            Err(err) => {
                error!(block_num = height, error = %err, "block write failed");
                (height, false)
            }
        }
    }
}
