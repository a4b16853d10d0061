//! Pure transformation from raw block/operation JSON into column-value rows.
//!
//! Grounded in `sbds.storages.db.tables.operations.{vote,account_witness_proxy,
//! reset_account}` and `.../virtual/author_reward`: each source table class
//! declares a `_fields` map (most fields copy through), an `_account_fields`
//! subset (also folded into the block's `accounts` aggregate), and amount
//! fields split via `amount_field`/`amount_symbol_field`. This module
//! generalises that into one data-driven dispatch on [`OperationType`]
//! instead of one hand-written class per tag — see `DESIGN.md` for the
//! rationale.

pub mod amount;
pub mod tags;

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde_json::Value;

pub use amount::AssetSymbol;
pub use tags::OperationType;

use crate::error::ShapingError;

/// A single column's value, typed loosely enough to cover every table's
/// column set without a compile-time schema per tag.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    /// UTF-8 text.
    Text(String),
    /// A 64-bit integer.
    BigInt(i64),
    /// A decimal quantity (the numeric half of an amount field).
    Numeric(Decimal),
    /// A boolean.
    Bool(bool),
    /// An arbitrary JSON subtree, stored as `jsonb`.
    Json(Value),
    /// SQL `NULL`.
    Null,
}

/// Field names known to carry an account name, collected across the
/// grounded operation tables plus their evident chain-wide analogues. Used to
/// both copy the field through and fold it into the block's `accounts`
/// aggregate.
const ACCOUNT_FIELD_NAMES: &[&str] = &[
    "account",
    "account_to_recover",
    "account_to_reset",
    "agent",
    "approver",
    "author",
    "beneficiary",
    "creator",
    "curator",
    "delegatee",
    "delegator",
    "from",
    "new_account_name",
    "new_owner",
    "new_recovery_account",
    "owner",
    "proxy",
    "publisher",
    "recovery_account",
    "reset_account",
    "seller",
    "to",
    "voter",
    "who",
    "witness",
];

/// One shaped operation row, ready for the block writer to bind into its
/// destination table's prepared statement.
#[derive(Debug, Clone)]
pub struct ShapedOperation {
    /// Height of the enclosing block.
    pub block_num: i64,
    /// Index of the transaction within the block (0 for virtual ops not
    /// tied to a user transaction).
    pub transaction_num: i32,
    /// Index of the operation within the transaction.
    pub operation_num: i32,
    /// 40-char hex transaction id; empty for virtual operations.
    pub trx_id: String,
    /// Copied from the enclosing block.
    pub timestamp: chrono::NaiveDateTime,
    /// The operation's tag.
    pub operation_type: OperationType,
    /// Destination table, cached alongside the tag for the writer's
    /// statement-cache lookup.
    pub table: String,
    /// Column name to value, in a stable (sorted) order so re-shaping the
    /// same input yields byte-identical output.
    pub columns: Vec<(String, ColumnValue)>,
    /// Account names referenced by this operation's account-typed fields.
    pub accounts: Vec<String>,
    /// Present only for virtual operations: the original JSON envelope,
    /// stored verbatim in the table's `raw jsonb` column.
    pub raw: Option<Value>,
}

/// One shaped block row.
#[derive(Debug, Clone)]
pub struct ShapedBlock {
    /// Block height.
    pub block_num: i64,
    /// Hex digest of the prior block.
    pub previous: String,
    /// Block production time.
    pub timestamp: chrono::NaiveDateTime,
    /// Producer account name.
    pub witness: String,
    /// Hex signature over the block.
    pub witness_signature: String,
    /// Hex merkle root over the block's transactions.
    pub transaction_merkle_root: String,
    /// The original JSON block envelope.
    pub raw: Value,
    /// Union of every account name referenced anywhere in the block,
    /// including the witness.
    pub accounts: BTreeSet<String>,
    /// Set of operation-type tags present in the block.
    pub op_types: BTreeSet<OperationType>,
}

/// Shapes a single raw operation envelope into a row.
///
/// `raw_op` is expected to carry `block_num`, `transaction_num`,
/// `operation_num`, `trx_id`, `timestamp`, and a two-element `op` array of
/// `[tag, body]`, matching the upstream's `get_ops_in_block` envelope shape.
pub fn shape_operation(raw_op: &Value) -> Result<ShapedOperation, ShapingError> {
    let block_num = expect_i64(raw_op, "block_num")?;
    let transaction_num = expect_i64(raw_op, "transaction_num")? as i32;
    let operation_num = expect_i64(raw_op, "operation_num")? as i32;
    let trx_id = raw_op
        .get("trx_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    let timestamp = expect_timestamp(raw_op, "timestamp")?;

    let op = raw_op.get("op").and_then(Value::as_array).ok_or_else(|| {
        ShapingError::MissingField {
            tag: "<unknown>".to_owned(),
            field: "op".to_owned(),
        }
    })?;
    let [tag_value, body] = op.as_slice() else {
        return Err(ShapingError::MissingField {
            tag: "<unknown>".to_owned(),
            field: "op".to_owned(),
        });
    };
    let tag_str = tag_value.as_str().ok_or_else(|| {
        ShapingError::UnknownOperationType(tag_value.to_string())
    })?;
    let operation_type: OperationType = tag_str.parse()?;
    let is_virtual = operation_type.is_virtual();

    let body_obj = body.as_object().ok_or_else(|| ShapingError::MissingField {
        tag: tag_str.to_owned(),
        field: "<body>".to_owned(),
    })?;

    let mut columns = Vec::with_capacity(body_obj.len() * 2);
    let mut accounts = Vec::new();

    for (field, value) in body_obj {
        if ACCOUNT_FIELD_NAMES.contains(&field.as_str()) {
            if let Some(name) = value.as_str() {
                if !name.is_empty() {
                    columns.push((field.clone(), ColumnValue::Text(name.to_owned())));
                    accounts.push(name.to_owned());
                    continue;
                }
            }
        }

        if let Some(s) = value.as_str() {
            if looks_like_amount(s) {
                let (numeric_amount, symbol) = amount::split_amount(s)?;
                columns.push((
                    format!("{field}_amount"),
                    ColumnValue::Numeric(numeric_amount),
                ));
                columns.push((
                    format!("{field}_symbol"),
                    ColumnValue::Text(symbol.to_string()),
                ));
                continue;
            }
        }

        if value.is_object() || value.is_array() {
            columns.push((field.clone(), ColumnValue::Json(canonicalize(value))));
            continue;
        }

        columns.push((field.clone(), json_scalar_to_column(value)));
    }

    columns.sort_by(|a, b| a.0.cmp(&b.0));
    accounts.sort();
    accounts.dedup();

    Ok(ShapedOperation {
        block_num,
        transaction_num,
        operation_num,
        trx_id,
        timestamp,
        operation_type,
        table: operation_type.table_name(),
        columns,
        accounts,
        raw: is_virtual.then(|| canonicalize(raw_op)),
    })
}

/// Shapes the enclosing block, threading already-shaped operations so the
/// `accounts` and `op_types` aggregates are computed correctly.
pub fn shape_block(
    raw_block: &Value,
    prepared_ops: &[ShapedOperation],
) -> Result<ShapedBlock, ShapingError> {
    let block_num = expect_i64(raw_block, "block_num")?;
    let previous = expect_str(raw_block, "previous")?;
    let timestamp = expect_timestamp(raw_block, "timestamp")?;
    let witness = expect_str(raw_block, "witness")?;
    let witness_signature = expect_str(raw_block, "witness_signature")?;
    let transaction_merkle_root = expect_str(raw_block, "transaction_merkle_root")?;

    let mut accounts: BTreeSet<String> = prepared_ops
        .iter()
        .flat_map(|op| op.accounts.iter().cloned())
        .collect();
    accounts.insert(witness.clone());

    let op_types = prepared_ops.iter().map(|op| op.operation_type).collect();

    Ok(ShapedBlock {
        block_num,
        previous,
        timestamp,
        witness,
        witness_signature,
        transaction_merkle_root,
        raw: canonicalize(raw_block),
        accounts,
        op_types,
    })
}

/// Re-serialises a JSON value with sorted object keys so shaping the same
/// input twice yields byte-identical text.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

fn looks_like_amount(s: &str) -> bool {
    let Some((_, symbol)) = s.trim().split_once(' ') else {
        return false;
    };
    !symbol.is_empty() && symbol.chars().all(|c| c.is_ascii_uppercase())
}

fn json_scalar_to_column(value: &Value) -> ColumnValue {
    match value {
        Value::Null => ColumnValue::Null,
        Value::Bool(b) => ColumnValue::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                ColumnValue::BigInt(i)
            } else {
                ColumnValue::Text(n.to_string())
            }
        }
        Value::String(s) => ColumnValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => ColumnValue::Json(canonicalize(value)),
    }
}

fn expect_i64(value: &Value, field: &str) -> Result<i64, ShapingError> {
    value
        .get(field)
        .and_then(Value::as_i64)
        .ok_or_else(|| ShapingError::MissingField {
            tag: "<block-or-op>".to_owned(),
            field: field.to_owned(),
        })
}

fn expect_str(value: &Value, field: &str) -> Result<String, ShapingError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| ShapingError::MissingField {
            tag: "<block-or-op>".to_owned(),
            field: field.to_owned(),
        })
}

fn expect_timestamp(
    value: &Value,
    field: &str,
) -> Result<chrono::NaiveDateTime, ShapingError> {
    let raw = expect_str(value, field)?;
    chrono::NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S").map_err(|_| {
        ShapingError::MissingField {
            tag: "<block-or-op>".to_owned(),
            field: field.to_owned(),
        }
    })
}
