//! Schema Registry: catalogues operation tags, their destination tables, and
//! each table's column list, built once at start-up by reflecting the live
//! database.

use std::collections::HashMap;

use sqlx::PgPool;

use crate::error::SchemaError;
use crate::shaping::OperationType;

/// Fixed columns every `blocks` row carries, independent of reflection.
pub const BLOCK_COLUMNS: &[&str] = &[
    "block_num",
    "previous",
    "timestamp",
    "witness",
    "witness_signature",
    "transaction_merkle_root",
    "raw",
    "accounts",
    "op_types",
];

/// Read-mostly mapping from operation tag to destination table and from
/// table name to its reflected column list.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    tables: HashMap<&'static str, String>,
    columns: HashMap<String, Vec<String>>,
}

impl SchemaRegistry {
    /// Builds an empty registry with no reflected tables. Only meaningful in
    /// tests that exercise the writer's statement cache without a live
    /// database; the writer never needs a populated registry to compute an
    /// operation's insert column list, so an empty one is a faithful stand-in.
    #[cfg(test)]
    pub(crate) fn empty() -> Self {
        Self {
            tables: HashMap::new(),
            columns: HashMap::new(),
        }
    }

    /// Builds a registry reflecting a single table's column list, for tests
    /// that need to assert on how a reflected (as opposed to absent) schema
    /// is handled.
    #[cfg(test)]
    pub(crate) fn with_columns(table: &str, columns: Vec<String>) -> Self {
        let mut registry = Self::empty();
        registry.columns.insert(table.to_owned(), columns);
        registry
    }

    /// Reflects the live database schema and validates that every known
    /// operation tag has a matching table with, at minimum, its composite
    /// key columns.
    pub async fn reflect(pool: &PgPool) -> Result<Self, SchemaError> {
        let mut tables = HashMap::new();
        let mut columns = HashMap::new();

        columns.insert(
            "blocks".to_owned(),
            BLOCK_COLUMNS.iter().map(|s| (*s).to_owned()).collect(),
        );

        for tag in OperationType::ALL {
            let table = tag.table_name();
            let reflected = reflect_columns(pool, &table).await?;
            if reflected.is_empty() {
                return Err(SchemaError::MissingTable(table));
            }
            for required in ["block_num", "transaction_num", "operation_num", "trx_id", "timestamp"] {
                if !reflected.iter().any(|c| c == required) {
                    return Err(SchemaError::MissingColumn {
                        table: table.clone(),
                        column: required.to_owned(),
                    });
                }
            }
            tables.insert(tag.as_str(), table.clone());
            columns.insert(table, reflected);
        }

        Ok(Self { tables, columns })
    }

    /// Destination table for a given operation tag.
    pub fn table_for(&self, tag: OperationType) -> &str {
        self.tables
            .get(tag.as_str())
            .expect("every OperationType variant is registered at reflect() time")
    }

    /// Ordered column list for a given table name.
    pub fn columns_of(&self, table: &str) -> Option<&[String]> {
        self.columns.get(table).map(Vec::as_slice)
    }
}

async fn reflect_columns(pool: &PgPool, table: &str) -> Result<Vec<String>, SchemaError> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT column_name FROM information_schema.columns \
         WHERE table_schema = 'public' AND table_name = $1 \
         ORDER BY ordinal_position",
    )
    .bind(table)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(name,)| name).collect())
}
