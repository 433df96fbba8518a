//! Scripted JSON-RPC node for tests.

use std::sync::{Arc, Mutex};

use alloy_primitives::Address;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

pub(crate) const TX_HASH: &str =
    "0x8f5f6bb2a0d5b1f1b0a2f2d0c3e4f5a6b7c8d9e0f1a2b3c4d5e6f708192a3b4c";

pub(crate) struct NodeState {
    pub chain_id: u64,
    pub accounts: Vec<Address>,
    /// Error returned from `eth_sendTransaction`.
    pub send_error: Option<(i64, String)>,
    /// Receipt status once mined; `None` keeps the transaction pending.
    pub receipt_status: Option<u64>,
    /// Number of receipt polls answered with `null` before mining.
    pub pending_polls: usize,
    /// Fail receipt lookups with an RPC error.
    pub receipt_error: bool,
    pub sent: Vec<Value>,
    pub receipt_polls: usize,
}

impl NodeState {
    pub fn new(chain_id: u64, accounts: Vec<Address>) -> Self {
        Self {
            chain_id,
            accounts,
            send_error: None,
            receipt_status: Some(1),
            pending_polls: 0,
            receipt_error: false,
            sent: Vec::new(),
            receipt_polls: 0,
        }
    }
}

pub(crate) struct FakeNode {
    pub url: String,
    pub state: Arc<Mutex<NodeState>>,
}

pub(crate) async fn spawn_node(state: NodeState) -> FakeNode {
    let state = Arc::new(Mutex::new(state));
    let router = Router::new()
        .route("/", post(handle))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    FakeNode {
        url: format!("http://{addr}"),
        state,
    }
}

async fn handle(State(state): State<Arc<Mutex<NodeState>>>, Json(req): Json<Value>) -> Json<Value> {
    let id = req["id"].clone();
    let method = req["method"].as_str().unwrap_or_default().to_string();
    let outcome = {
        let mut node = state.lock().unwrap();
        answer(&mut node, &method, &req["params"])
    };
    Json(match outcome {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Err((code, message)) => json!({
            "jsonrpc": "2.0", "id": id, "error": { "code": code, "message": message }
        }),
    })
}

fn answer(node: &mut NodeState, method: &str, params: &Value) -> Result<Value, (i64, String)> {
    match method {
        "eth_chainId" => Ok(json!(format!("{:#x}", node.chain_id))),
        "eth_accounts" => Ok(json!(node.accounts)),
        "eth_sendTransaction" => match node.send_error.clone() {
            Some(err) => Err(err),
            None => {
                node.sent.push(params[0].clone());
                Ok(json!(TX_HASH))
            }
        },
        "eth_getTransactionReceipt" => {
            node.receipt_polls += 1;
            if node.receipt_error {
                return Err((-32603, "header not found".to_string()));
            }
            match node.receipt_status {
                Some(status) if node.receipt_polls > node.pending_polls => Ok(json!({
                    "transactionHash": TX_HASH,
                    "blockNumber": "0x1",
                    "status": format!("{status:#x}"),
                })),
                _ => Ok(Value::Null),
            }
        }
        other => Err((-32601, format!("method {other} not found"))),
    }
}
