//! Block Writer invariants: idempotence, atomicity, referential closure, and
//! accounts/op_types aggregation correctness.

use ledgerfill_engine::{shape_block, shape_operation, AccountsSideband, BlockWriter, SchemaRegistry};

use crate::common::{reset_store, sample_raw_block, sample_vote_envelope, test_pool};

async fn build_writer(pool: sqlx::PgPool) -> BlockWriter {
    let registry = SchemaRegistry::reflect(&pool)
        .await
        .expect("scratch database must carry the engine's schema");
    BlockWriter::new(pool, registry)
}

#[tokio::test]
async fn writing_the_same_block_twice_is_a_no_op_the_second_time() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    reset_store(&pool).await;
    let writer = build_writer(pool.clone()).await;

    let raw_block = sample_raw_block(5, "initminer");
    let raw_op = sample_vote_envelope(5, "alice", "bob");
    let op = shape_operation(&raw_op).unwrap();
    let block = shape_block(&raw_block, &[op.clone()]).unwrap();

    writer.write(&block, &[op.clone()]).await.unwrap();
    let (count_after_first,): (i64,) = sqlx::query_as("SELECT count(*) FROM blocks")
        .fetch_one(&pool)
        .await
        .unwrap();

    writer.write(&block, &[op]).await.unwrap();
    let (count_after_second,): (i64,) = sqlx::query_as("SELECT count(*) FROM blocks")
        .fetch_one(&pool)
        .await
        .unwrap();

    assert_eq!(count_after_first, 1);
    assert_eq!(count_after_second, 1);
}

#[tokio::test]
async fn fk_repair_populates_accounts_and_completes_the_write() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    reset_store(&pool).await;
    let writer = build_writer(pool.clone()).await;

    let raw_block = sample_raw_block(1, "initminer");
    let raw_op = sample_vote_envelope(1, "alice", "bob");
    let op = shape_operation(&raw_op).unwrap();
    let block = shape_block(&raw_block, &[op.clone()]).unwrap();

    writer.write(&block, &[op]).await.unwrap();

    let names: Vec<String> = sqlx::query_scalar("SELECT name FROM accounts ORDER BY name")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert!(names.contains(&"alice".to_owned()));
    assert!(names.contains(&"bob".to_owned()));
    assert!(names.contains(&"initminer".to_owned()));

    let (op_count,): (i64,) = sqlx::query_as("SELECT count(*) FROM op_vote WHERE block_num = 1")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(op_count, 1);
}

#[tokio::test]
async fn a_block_that_fails_to_write_leaves_no_trace() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    reset_store(&pool).await;
    let writer = build_writer(pool.clone()).await;

    // An op table name that doesn't exist breaks insert_operation with a
    // non-foreign-key error, which the writer does not attempt to repair.
    let raw_block = sample_raw_block(2, "initminer");
    let raw_op = sample_vote_envelope(2, "alice", "bob");
    let mut op = shape_operation(&raw_op).unwrap();
    op.table = "op_does_not_exist".to_owned();
    let block = shape_block(&raw_block, &[op.clone()]).unwrap();

    let result = writer.write(&block, &[op]).await;
    assert!(result.is_err());

    let (block_count,): (i64,) = sqlx::query_as("SELECT count(*) FROM blocks WHERE block_num = 2")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(block_count, 0);
}

#[tokio::test]
async fn accounts_aggregate_is_the_union_of_operation_accounts_plus_witness() {
    let Some(pool) = test_pool().await else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    reset_store(&pool).await;
    let accounts = AccountsSideband::new(pool.clone());
    accounts
        .preload(&["alice".to_owned(), "bob".to_owned(), "initminer".to_owned()])
        .await
        .unwrap();
    let writer = build_writer(pool.clone()).await;

    let raw_block = sample_raw_block(3, "initminer");
    let raw_op = sample_vote_envelope(3, "alice", "bob");
    let op = shape_operation(&raw_op).unwrap();
    let block = shape_block(&raw_block, &[op.clone()]).unwrap();
    writer.write(&block, &[op]).await.unwrap();

    let stored_accounts: serde_json::Value =
        sqlx::query_scalar("SELECT accounts FROM blocks WHERE block_num = 3")
            .fetch_one(&pool)
            .await
            .unwrap();
    let mut names: Vec<String> = stored_accounts
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["alice", "bob", "initminer"]);

    let stored_op_types: serde_json::Value =
        sqlx::query_scalar("SELECT op_types FROM blocks WHERE block_num = 3")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(stored_op_types.as_array().unwrap().len(), 1);
}
