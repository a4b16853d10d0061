//! End-to-end sweep scenarios, run against a scratch Postgres instance with a
//! mocked upstream.

use std::collections::HashMap;

use ledgerfill_engine::{AccountsSideband, BlockWriter, GapFinder, PipelineCoordinator, RpcBatchClient, SchemaRegistry};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{reset_store, sample_raw_block, sample_vote_envelope, test_pool, unknown_tag_envelope};

/// Mounts a `get_block`/`get_ops_in_block` responder that serves whatever is
/// in `blocks`/`ops` by height, 404-ing (as an upstream error entry) on
/// anything else.
async fn mount_upstream(blocks: HashMap<i64, Value>, ops: HashMap<i64, Vec<Value>>) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(move |req: &wiremock::Request| {
            let requests: Vec<Value> = req.body_json().unwrap();
            let responses: Vec<Value> = requests
                .iter()
                .map(|r| {
                    let id = r["id"].as_i64().unwrap();
                    let rpc_method = r["method"].as_str().unwrap();
                    let result = if rpc_method == "get_block" {
                        blocks.get(&id).cloned().unwrap_or(Value::Null)
                    } else {
                        json!(ops.get(&id).cloned().unwrap_or_default())
                    };
                    json!({"jsonrpc": "2.0", "id": id, "result": result})
                })
                .collect();
            ResponseTemplate::new(200).set_body_json(responses)
        })
        .mount(&server)
        .await;
    server
}

async fn build_coordinator(
    database_url: &str,
    upstream: &str,
) -> PipelineCoordinator {
    let pool = sqlx::PgPool::connect(database_url).await.unwrap();
    let registry = SchemaRegistry::reflect(&pool).await.unwrap();
    let gap_finder = GapFinder::new(pool.clone());
    let rpc = RpcBatchClient::new(upstream.parse().unwrap());
    let writer = BlockWriter::new(pool.clone(), registry);
    let accounts = AccountsSideband::new(pool);
    PipelineCoordinator::new(gap_finder, rpc, writer, accounts, 50, 4)
}

fn ten_blocks_fixture() -> (HashMap<i64, Value>, HashMap<i64, Vec<Value>>) {
    let mut blocks = HashMap::new();
    let mut ops = HashMap::new();
    for n in 1..=10i64 {
        blocks.insert(n, sample_raw_block(n, "initminer"));
        ops.insert(n, vec![sample_vote_envelope(n, "alice", "bob")]);
    }
    (blocks, ops)
}

#[tokio::test]
async fn e1_cold_load_writes_every_block_in_an_empty_range() {
    let Some(url) = std::env::var("DATABASE_URL").ok() else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let pool = test_pool().await.unwrap();
    reset_store(&pool).await;

    let (blocks, ops) = ten_blocks_fixture();
    let server = mount_upstream(blocks, ops).await;
    let coordinator = build_coordinator(&url, &server.uri()).await;

    let report = coordinator.run(1, 10).await.unwrap();
    assert_eq!(report.written.len(), 10);
    assert!(report.failed.is_empty());

    let (count,): (i64,) = sqlx::query_as("SELECT count(*) FROM blocks").fetch_one(&pool).await.unwrap();
    assert_eq!(count, 10);
}

#[tokio::test]
async fn e2_resume_only_fetches_the_actual_gaps() {
    let Some(url) = std::env::var("DATABASE_URL").ok() else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let pool = test_pool().await.unwrap();
    reset_store(&pool).await;

    let registry = SchemaRegistry::reflect(&pool).await.unwrap();
    let writer = BlockWriter::new(pool.clone(), registry);
    let accounts = AccountsSideband::new(pool.clone());
    accounts
        .preload(&["alice".to_owned(), "bob".to_owned(), "initminer".to_owned()])
        .await
        .unwrap();
    for present in [1i64, 2, 3, 5, 6, 9] {
        let raw_op = sample_vote_envelope(present, "alice", "bob");
        let op = ledgerfill_engine::shape_operation(&raw_op).unwrap();
        let raw_block = sample_raw_block(present, "initminer");
        let block = ledgerfill_engine::shape_block(&raw_block, &[op.clone()]).unwrap();
        writer.write(&block, &[op]).await.unwrap();
    }

    let (blocks, ops) = ten_blocks_fixture();
    let server = mount_upstream(blocks, ops).await;
    let coordinator = build_coordinator(&url, &server.uri()).await;

    let report = coordinator.run(1, 10).await.unwrap();
    let mut written = report.written;
    written.sort_unstable();
    written.dedup();
    assert_eq!(written, vec![4, 7, 8, 10]);

    let (count,): (i64,) = sqlx::query_as("SELECT count(*) FROM blocks").fetch_one(&pool).await.unwrap();
    assert_eq!(count, 10);
}

#[tokio::test]
async fn e3_fk_repair_inserts_missing_accounts_before_committing_the_block() {
    let Some(url) = std::env::var("DATABASE_URL").ok() else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let pool = test_pool().await.unwrap();
    reset_store(&pool).await;

    let mut blocks = HashMap::new();
    let mut ops = HashMap::new();
    blocks.insert(1, sample_raw_block(1, "initminer"));
    ops.insert(1, vec![sample_vote_envelope(1, "alice", "bob")]);
    let server = mount_upstream(blocks, ops).await;
    let coordinator = build_coordinator(&url, &server.uri()).await;

    let report = coordinator.run(1, 1).await.unwrap();
    assert_eq!(report.written, vec![1]);

    let names: Vec<String> = sqlx::query_scalar("SELECT name FROM accounts ORDER BY name")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert!(names.contains(&"alice".to_owned()));
    assert!(names.contains(&"bob".to_owned()));

    let (op_count,): (i64,) = sqlx::query_as("SELECT count(*) FROM op_vote WHERE block_num = 1")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(op_count, 1);
}

#[tokio::test]
async fn e5_malformed_op_defers_its_block_but_not_its_neighbours() {
    let Some(url) = std::env::var("DATABASE_URL").ok() else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let pool = test_pool().await.unwrap();
    reset_store(&pool).await;

    let mut blocks = HashMap::new();
    let mut ops = HashMap::new();
    blocks.insert(1, sample_raw_block(1, "initminer"));
    ops.insert(1, vec![sample_vote_envelope(1, "alice", "bob")]);
    blocks.insert(2, sample_raw_block(2, "initminer"));
    ops.insert(2, vec![unknown_tag_envelope(2)]);
    let server = mount_upstream(blocks, ops).await;
    let coordinator = build_coordinator(&url, &server.uri()).await;

    let report = coordinator.run(1, 2).await.unwrap();
    assert!(report.written.contains(&1));
    assert!(report.failed.contains(&2));

    let (block_one,): (i64,) = sqlx::query_as("SELECT count(*) FROM blocks WHERE block_num = 1")
        .fetch_one(&pool)
        .await
        .unwrap();
    let (block_two,): (i64,) = sqlx::query_as("SELECT count(*) FROM blocks WHERE block_num = 2")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(block_one, 1);
    assert_eq!(block_two, 0);
}

#[tokio::test]
async fn e6_distinct_virtual_ops_at_the_same_coordinates_both_land() {
    let Some(url) = std::env::var("DATABASE_URL").ok() else {
        eprintln!("skipping: DATABASE_URL not set");
        return;
    };
    let pool = test_pool().await.unwrap();
    reset_store(&pool).await;

    let first_reward = json!({
        "block_num": 1, "transaction_num": 0, "operation_num": 0,
        "trx_id": "", "timestamp": "2016-03-24T16:00:21",
        "op": ["author_reward", {
            "author": "alice", "permlink": "hello",
            "sbd_payout": "1.000 SBD", "steem_payout": "0.000 STEEM",
            "vesting_payout": "1.000000 VESTS",
        }],
    });
    let second_reward = json!({
        "block_num": 1, "transaction_num": 0, "operation_num": 0,
        "trx_id": "", "timestamp": "2016-03-24T16:00:21",
        "op": ["author_reward", {
            "author": "bob", "permlink": "world",
            "sbd_payout": "2.000 SBD", "steem_payout": "0.000 STEEM",
            "vesting_payout": "2.000000 VESTS",
        }],
    });

    let mut blocks = HashMap::new();
    let mut ops = HashMap::new();
    blocks.insert(1, sample_raw_block(1, "initminer"));
    ops.insert(1, vec![first_reward, second_reward]);
    let server = mount_upstream(blocks, ops).await;
    let coordinator = build_coordinator(&url, &server.uri()).await;

    let report = coordinator.run(1, 1).await.unwrap();
    assert_eq!(report.written, vec![1]);

    let (reward_count,): (i64,) =
        sqlx::query_as("SELECT count(*) FROM op_author_reward WHERE block_num = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(reward_count, 2);
}
