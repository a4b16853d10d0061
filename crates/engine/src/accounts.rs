//! Accounts Sideband: the lazily-populated accounts dimension table.
//!
//! Grounded in `sbds.storages.db.scripts.populate.STATEMENT_CACHE['account']`,
//! a single `INSERT ... ON CONFLICT (name) DO NOTHING` statement shared by
//! both preload and on-demand repair; batch construction mirrors the
//! `QueryBuilder`/`push_values` pattern used for multi-row inserts in
//! `examples/other_examples/4ba5c5b4_polkadot-evm-frontier__client-db-src-sql-mod.rs.rs`.

use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::error::AccountsError;

/// Maximum number of account names bound into a single `INSERT` statement.
const BATCH_CHUNK: usize = 1_000;

/// Maintains the `accounts` dimension table.
#[derive(Debug, Clone)]
pub struct AccountsSideband {
    pool: PgPool,
}

impl AccountsSideband {
    /// Wraps a writer pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a batch of distinct account names, skipping those already
    /// present. Idempotent: re-running with an overlapping or identical
    /// batch is a no-op for the overlapping names.
    pub async fn preload(&self, names: &[String]) -> Result<(), AccountsError> {
        self.insert_ignore(names).await
    }

    /// Inserts any subset of `names` that may be missing. Called by the
    /// block writer after a foreign-key violation; must not fail when every
    /// name already exists.
    pub async fn repair(&self, names: &[String]) -> Result<(), AccountsError> {
        self.insert_ignore(names).await
    }

    async fn insert_ignore(&self, names: &[String]) -> Result<(), AccountsError> {
        if names.is_empty() {
            return Ok(());
        }

        let mut distinct: Vec<&String> = names.iter().collect();
        distinct.sort();
        distinct.dedup();

        for chunk in distinct.chunks(BATCH_CHUNK) {
            let mut builder: QueryBuilder<'_, Postgres> =
                QueryBuilder::new("INSERT INTO accounts (name) ");
            builder.push_values(chunk, |mut b, name| {
                b.push_bind((*name).clone());
            });
            builder.push(" ON CONFLICT (name) DO NOTHING");
            builder.build().execute(&self.pool).await?;
        }

        Ok(())
    }
}
