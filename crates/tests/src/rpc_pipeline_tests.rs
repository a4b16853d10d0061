//! Fetch-then-shape wiring, independent of the store: a fetched batch's
//! blocks and ops shape into rows with no extra coordination.

use ledgerfill_engine::{shape_block, shape_operation, RpcBatchClient};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{sample_raw_block, sample_vote_envelope};

#[tokio::test]
async fn fetched_batch_shapes_into_one_row_per_block_and_op() {
    let server = MockServer::start().await;
    let body = json!([
        {"jsonrpc": "2.0", "id": 1, "result": sample_raw_block(1, "initminer")},
        {"jsonrpc": "2.0", "id": 1, "result": [sample_vote_envelope(1, "alice", "bob")]},
        {"jsonrpc": "2.0", "id": 2, "result": sample_raw_block(2, "initminer")},
        {"jsonrpc": "2.0", "id": 2, "result": []},
    ]);
    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let client = RpcBatchClient::new(server.uri().parse().unwrap());
    let fetched = client.fetch_batch(&[1, 2]).await.unwrap();
    assert_eq!(fetched.len(), 2);

    for block in &fetched {
        let raw_ops: Vec<serde_json::Value> = block.raw_ops.as_array().cloned().unwrap_or_default();
        let ops: Vec<_> = raw_ops
            .iter()
            .map(|raw| shape_operation(raw).unwrap())
            .collect();
        let shaped = shape_block(&block.raw_block, &ops).unwrap();
        assert_eq!(shaped.block_num, block.block_num);
        if block.block_num == 1 {
            assert_eq!(ops.len(), 1);
            assert!(shaped.accounts.contains("alice"));
        } else {
            assert!(ops.is_empty());
            assert!(shaped.op_types.is_empty());
        }
    }
}
