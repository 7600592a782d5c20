//! Mock nodes for integration tests.
//!
//! Each `MockServer` stands in for one node's JSON-RPC endpoint; requests are
//! routed on the JSON-RPC method and, optionally, its first parameter.

#![allow(dead_code)]

use acctest_harness::{HarnessConfig, HarnessContext};
use alloy_core::primitives::{Address, B256};
use serde_json::{Value, json};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

/// Initialize tracing for tests (idempotent).
pub fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init()
        .ok();
}

/// Matches a JSON-RPC request by method and, if set, by its first parameter.
pub struct RpcCall {
    method: String,
    first_param: Option<Value>,
}

impl RpcCall {
    pub fn method(method: &str) -> Self {
        Self {
            method: method.to_string(),
            first_param: None,
        }
    }

    pub fn with_first_param(mut self, param: impl serde::Serialize) -> Self {
        self.first_param = Some(serde_json::to_value(param).unwrap());
        self
    }
}

impl Match for RpcCall {
    fn matches(&self, request: &Request) -> bool {
        let Ok(body) = serde_json::from_slice::<Value>(&request.body) else {
            return false;
        };
        if body["method"] != self.method.as_str() {
            return false;
        }
        match &self.first_param {
            None => true,
            Some(expected) => normalize(&body["params"][0]) == normalize(expected),
        }
    }
}

// Addresses may be sent checksummed or lowercase.
fn normalize(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.to_lowercase()),
        other => other.clone(),
    }
}

pub fn rpc_result(result: impl serde::Serialize) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": result,
    }))
}

pub fn rpc_error(code: i64, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": { "code": code, "message": message },
    }))
}

/// Always answer `method` with `result`.
pub async fn mount(server: &MockServer, method: &str, result: impl serde::Serialize) {
    Mock::given(RpcCall::method(method))
        .respond_with(rpc_result(result))
        .mount(server)
        .await;
}

/// Answer `call` with `first` once, then with `then` forever.
pub async fn mount_sequence(
    server: &MockServer,
    call: impl Fn() -> RpcCall,
    first: impl serde::Serialize,
    then: impl serde::Serialize,
) {
    Mock::given(call())
        .respond_with(rpc_result(first))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(call())
        .respond_with(rpc_result(then))
        .mount(server)
        .await;
}

pub fn quantity(n: u64) -> String {
    format!("{:#x}", n)
}

pub fn tx_hash(byte: u8) -> B256 {
    B256::repeat_byte(byte)
}

/// A mined receipt, with one log when `with_logs`.
pub fn receipt(hash: B256, block: u64, contract: Option<Address>, with_logs: bool) -> Value {
    let logs = if with_logs {
        json!([{
            "address": contract.unwrap_or(Address::with_last_byte(0xcc)),
            "topics": [B256::repeat_byte(0x14)],
            "data": format!("0x{:064x}", 1),
        }])
    } else {
        json!([])
    };
    json!({
        "transactionHash": hash,
        "blockHash": B256::repeat_byte(0xbb),
        "blockNumber": quantity(block),
        "contractAddress": contract,
        "logs": logs,
        "status": "0x1",
    })
}

/// The default cluster shrunk to one node per server, with fast polling.
pub fn cluster_config(servers: &[&MockServer]) -> HarnessConfig {
    let mut config = HarnessConfig::default();
    config.nodes.truncate(servers.len());
    for (node, server) in config.nodes.iter_mut().zip(servers) {
        node.rpc_url = server.uri();
    }
    config.timing.rpc_timeout_secs = 5;
    config.timing.finality_timeout_secs = 3;
    config.timing.poll_min_delay_ms = 10;
    config.timing.poll_max_delay_ms = 50;
    config.timing.callback_wait_secs = 2;
    config
}

pub fn context(servers: &[&MockServer]) -> HarnessContext {
    HarnessContext::new(cluster_config(servers)).unwrap()
}

pub fn account(config: &HarnessConfig, index: u32) -> Address {
    config.nodes[index as usize - 1].account
}
