//! Block Writer: atomically persists one block plus its operations,
//! recovering from foreign-key violations via the Accounts Sideband.
//!
//! The prepared-statement cache keyed by destination table name mirrors
//! `get_op_insert_stmt`'s `STATEMENT_CACHE` dict in
//! `sbds.storages.db.scripts.populate`. The two-phase commit-then-repair
//! sequence is grounded in the same module's `store_block_and_ops`: a first
//! transaction attempts block + operation inserts; on
//! `ForeignKeyViolationError` a second transaction inserts the block's full
//! `accounts` set then re-attempts.

use dashmap::DashMap;
use sqlx::error::DatabaseError;
use sqlx::postgres::PgDatabaseError;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use crate::accounts::AccountsSideband;
use crate::error::WriteError;
use crate::schema::SchemaRegistry;
use crate::shaping::{ColumnValue, ShapedBlock, ShapedOperation};

/// PostgreSQL SQLSTATE for a foreign-key violation.
const FOREIGN_KEY_VIOLATION: &str = "23503";

fn init_metrics() {
    metrics::describe_counter!(
        "block_writer_fk_repairs_total",
        "Total foreign-key repair cycles triggered by a block write"
    );
}

/// Cached insert shape for one destination table: the column list, in the
/// order the statement binds them.
#[derive(Debug, Clone)]
struct CachedInsert {
    columns: Vec<String>,
}

/// Persists shaped blocks and their operations, repairing the accounts
/// dimension on foreign-key failure.
#[derive(Debug, Clone)]
pub struct BlockWriter {
    pool: PgPool,
    registry: SchemaRegistry,
    accounts: AccountsSideband,
    statement_cache: DashMap<String, CachedInsert>,
}

impl BlockWriter {
    /// Builds a writer over the given pool. `registry` must already have
    /// reflected the live schema.
    pub fn new(pool: PgPool, registry: SchemaRegistry) -> Self {
        static INIT: std::sync::Once = std::sync::Once::new();
        INIT.call_once(init_metrics);

        let accounts = AccountsSideband::new(pool.clone());
        Self {
            pool,
            registry,
            accounts,
            statement_cache: DashMap::new(),
        }
    }

    /// Writes one block and its operations. Idempotent: if the block is
    /// already present, the conflict-ignore inserts make this call a no-op
    /// that still returns success.
    pub async fn write(
        &self,
        block: &ShapedBlock,
        ops: &[ShapedOperation],
    ) -> Result<(), WriteError> {
        let mut tx = self.pool.begin().await?;
        match self.insert_all(&mut tx, block, ops).await {
            Ok(()) => {
                tx.commit().await?;
                Ok(())
            }
            Err(first_err) if is_foreign_key_violation(&first_err) => {
                tx.rollback().await.ok();
                metrics::counter!("block_writer_fk_repairs_total");

                let account_names: Vec<String> = block.accounts.iter().cloned().collect();
                self.accounts.repair(&account_names).await.map_err(|e| {
                    WriteError::BlockWriteFailed {
                        block_num: block.block_num,
                        first: first_err.to_string(),
                        second: e.to_string(),
                    }
                })?;

                let mut retry_tx = self.pool.begin().await?;
                match self.insert_all(&mut retry_tx, block, ops).await {
                    Ok(()) => {
                        retry_tx.commit().await?;
                        Ok(())
                    }
                    Err(second_err) => {
                        retry_tx.rollback().await.ok();
                        Err(WriteError::BlockWriteFailed {
                            block_num: block.block_num,
                            first: first_err.to_string(),
                            second: second_err.to_string(),
                        })
                    }
                }
            }
            Err(other) => {
                tx.rollback().await.ok();
                Err(other)
            }
        }
    }

    async fn insert_all(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        block: &ShapedBlock,
        ops: &[ShapedOperation],
    ) -> Result<(), WriteError> {
        self.insert_block(tx, block).await?;
        for op in ops {
            self.insert_operation(tx, op).await?;
        }
        Ok(())
    }

    async fn insert_block(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        block: &ShapedBlock,
    ) -> Result<(), WriteError> {
        let op_types: Vec<&str> = block.op_types.iter().map(|t| t.as_str()).collect();
        let accounts: Vec<&String> = block.accounts.iter().collect();

        sqlx::query(
            "INSERT INTO blocks \
             (block_num, previous, timestamp, witness, witness_signature, \
              transaction_merkle_root, raw, accounts, op_types) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (block_num) DO NOTHING",
        )
        .bind(block.block_num)
        .bind(&block.previous)
        .bind(block.timestamp)
        .bind(&block.witness)
        .bind(&block.witness_signature)
        .bind(&block.transaction_merkle_root)
        .bind(&block.raw)
        .bind(serde_json::to_value(&accounts).unwrap_or_default())
        .bind(serde_json::to_value(&op_types).unwrap_or_default())
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn insert_operation(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        op: &ShapedOperation,
    ) -> Result<(), WriteError> {
        let cached = self.cached_insert_for(op);

        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("INSERT INTO {} (", op.table));
        for (i, column) in cached.columns.iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            builder.push(column);
        }
        builder.push(") VALUES (");
        {
            let mut separated = builder.separated(", ");
            for column in &cached.columns {
                match column.as_str() {
                    "block_num" => {
                        separated.push_bind(op.block_num);
                    }
                    "transaction_num" => {
                        separated.push_bind(op.transaction_num);
                    }
                    "operation_num" => {
                        separated.push_bind(op.operation_num);
                    }
                    "trx_id" => {
                        separated.push_bind(op.trx_id.clone());
                    }
                    "timestamp" => {
                        separated.push_bind(op.timestamp);
                    }
                    "operation_type" => {
                        separated.push_bind(op.operation_type.to_string());
                    }
                    "raw" if op.operation_type.is_virtual() => {
                        separated.push_bind(op.raw.clone().unwrap_or(serde_json::Value::Null));
                    }
                    "accounts" if op.operation_type.is_virtual() => {
                        separated.push_bind(serde_json::to_value(&op.accounts).unwrap_or_default());
                    }
                    _ => match op.columns.iter().find(|(name, _)| name == column) {
                        Some((_, ColumnValue::Text(s))) => {
                            separated.push_bind(s.clone());
                        }
                        Some((_, ColumnValue::BigInt(n))) => {
                            separated.push_bind(*n);
                        }
                        Some((_, ColumnValue::Numeric(d))) => {
                            separated.push_bind(*d);
                        }
                        Some((_, ColumnValue::Bool(b))) => {
                            separated.push_bind(*b);
                        }
                        Some((_, ColumnValue::Json(v))) => {
                            separated.push_bind(v.clone());
                        }
                        Some((_, ColumnValue::Null)) | None => {
                            separated.push_bind(Option::<String>::None);
                        }
                    },
                }
            }
        }
        builder.push(") ON CONFLICT ");
        if op.operation_type.is_virtual() {
            builder.push("(block_num, transaction_num, operation_num, raw) DO NOTHING");
        } else {
            builder.push("(block_num, transaction_num, operation_num) DO NOTHING");
        }

        builder.build().execute(&mut **tx).await?;
        Ok(())
    }

    fn cached_insert_for(&self, op: &ShapedOperation) -> CachedInsert {
        if let Some(entry) = self.statement_cache.get(&op.table) {
            return entry.clone();
        }

        let mut columns = vec![
            "block_num".to_owned(),
            "transaction_num".to_owned(),
            "operation_num".to_owned(),
            "trx_id".to_owned(),
            "timestamp".to_owned(),
            "operation_type".to_owned(),
        ];
        if op.operation_type.is_virtual() {
            columns.push("raw".to_owned());
            columns.push("accounts".to_owned());
        }
        // Dynamic columns come from the op's own fields, never from the
        // table's full reflected column list: a reflected table carries
        // columns this insert must not touch (e.g. an auto-generated
        // surrogate primary key on virtual-op tables).
        for (name, _) in &op.columns {
            if !columns.contains(name) {
                columns.push(name.clone());
            }
        }

        let cached = CachedInsert { columns };
        self.statement_cache
            .insert(op.table.clone(), cached.clone());
        cached
    }
}

fn is_foreign_key_violation(err: &WriteError) -> bool {
    let WriteError::Store(sqlx::Error::Database(db_err)) = err else {
        return false;
    };
    db_err
        .try_downcast_ref::<PgDatabaseError>()
        .map(|pg| pg.code() == FOREIGN_KEY_VIOLATION)
        .unwrap_or_else(|| db_err.code().as_deref() == Some(FOREIGN_KEY_VIOLATION))
}
