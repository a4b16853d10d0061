//! Gap Finder: discovers which block heights in a range are absent from the
//! store.
//!
//! The query text is carried over directly from
//! `sbds.storages.db.scripts.populate.collect_missing_block_nums`, which
//! uses a single `generate_series(...) EXCEPT SELECT block_num FROM
//! sbds_core_blocks WHERE block_num BETWEEN ...` round trip.

use sqlx::PgPool;

use crate::error::GapFinderError;

/// Existing/missing/total counts over a range, used to decide whether the
/// (relatively expensive) gap query is worth issuing at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeCounts {
    /// Number of block heights in `[start, end]` already present.
    pub existing: i64,
    /// Number of block heights in `[start, end]` absent.
    pub missing: i64,
    /// Total number of heights in the range.
    pub total: i64,
}

/// Reads the `blocks` table to discover gaps.
#[derive(Debug, Clone)]
pub struct GapFinder {
    pool: PgPool,
}

impl GapFinder {
    /// Wraps a pool (writer pool or a dedicated reader is fine; this is a
    /// read-only component).
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns `(existing, missing, total)` for `[start, end]`, so the
    /// caller can skip `collect_missing` entirely when `missing == 0`.
    pub async fn counts(&self, start: i64, end: i64) -> Result<RangeCounts, GapFinderError> {
        let total = end - start + 1;
        let (existing,): (i64,) = sqlx::query_as(
            "SELECT count(*) FROM blocks WHERE block_num BETWEEN $1 AND $2",
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(RangeCounts {
            existing,
            missing: total - existing,
            total,
        })
    }

    /// Returns the sorted list of block heights in `[start, end]` absent
    /// from the store. Skips the `EXCEPT` round trip entirely when the range
    /// is known to be wholly absent (`missing == total`), since there is
    /// nothing to subtract in that case.
    pub async fn collect_missing(
        &self,
        start: i64,
        end: i64,
    ) -> Result<Vec<i64>, GapFinderError> {
        let counts = self.counts(start, end).await?;
        if counts.existing == 0 {
            return Ok((start..=end).collect());
        }

        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT generate_series($1::bigint, $2::bigint) \
             EXCEPT \
             SELECT block_num FROM blocks WHERE block_num BETWEEN $3 AND $4 \
             ORDER BY 1",
        )
        .bind(start)
        .bind(end)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        let mut missing: Vec<i64> = rows.into_iter().map(|(n,)| n).collect();
        missing.sort_unstable();
        Ok(missing)
    }
}
