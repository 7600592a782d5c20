//! Typed JSON-RPC client bound to one node.

use std::time::Duration;

use alloy_core::primitives::{Address, B256, Bytes, U256};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use url::Url;

use super::{Transaction, TransactionReceipt, TransactionRequest, json_rpc_call, parse_quantity};
use crate::{HarnessResult, registry::{NodeDescriptor, NodeId}};

/// Block parameter accepted by state queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum BlockTag {
    Latest,
    Pending,
}

/// Client for one node's JSON-RPC endpoint.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct NodeClient {
    node: NodeId,
    endpoint: Url,
    http: reqwest::Client,
}

impl NodeClient {
    pub fn new(node: NodeId, endpoint: Url, http: reqwest::Client) -> Self {
        Self {
            node,
            endpoint,
            http,
        }
    }

    pub fn for_node(descriptor: &NodeDescriptor, http: reqwest::Client) -> Self {
        Self::new(descriptor.id, descriptor.rpc_endpoint.clone(), http)
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Raw method call, for extensions the typed helpers do not cover.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Vec<Value>) -> HarnessResult<T> {
        tracing::trace!(node = %self.node, method, "JSON-RPC call");
        json_rpc_call(&self.http, self.endpoint.as_str(), method, params).await
    }

    pub async fn get_balance(&self, account: Address) -> HarnessResult<U256> {
        self.call(
            "eth_getBalance",
            vec![json!(account), json!(BlockTag::Latest.to_string())],
        )
        .await
    }

    pub async fn block_number(&self) -> HarnessResult<u64> {
        let hex: String = self.call("eth_blockNumber", vec![]).await?;
        parse_quantity("eth_blockNumber", &hex)
    }

    pub async fn chain_id(&self) -> HarnessResult<u64> {
        let hex: String = self.call("eth_chainId", vec![]).await?;
        parse_quantity("eth_chainId", &hex)
    }

    pub async fn accounts(&self) -> HarnessResult<Vec<Address>> {
        self.call("eth_accounts", vec![]).await
    }

    pub async fn get_transaction_count(&self, account: Address, block: BlockTag) -> HarnessResult<u64> {
        let hex: String = self
            .call(
                "eth_getTransactionCount",
                vec![json!(account), json!(block.to_string())],
            )
            .await?;
        parse_quantity("eth_getTransactionCount", &hex)
    }

    /// Submit a transaction signed by the node's own account.
    pub async fn send_transaction(&self, request: &TransactionRequest) -> HarnessResult<B256> {
        self.call("eth_sendTransaction", vec![json!(request)]).await
    }

    /// Submit a transaction signed by the caller.
    pub async fn send_raw_transaction(&self, raw: &Bytes) -> HarnessResult<B256> {
        self.call("eth_sendRawTransaction", vec![json!(raw)]).await
    }

    /// Submit a transaction whose outcome is posted to `request.callback_url`.
    ///
    /// The immediate result is only an acknowledgement; the transaction hash
    /// arrives through the callback.
    pub async fn send_transaction_async(&self, request: &TransactionRequest) -> HarnessResult<Value> {
        self.call("eth_sendTransactionAsync", vec![json!(request)]).await
    }

    /// `None` while the node has no receipt for `tx_hash`.
    pub async fn get_transaction_receipt(&self, tx_hash: B256) -> HarnessResult<Option<TransactionReceipt>> {
        self.call("eth_getTransactionReceipt", vec![json!(tx_hash)])
            .await
    }

    pub async fn get_transaction(&self, tx_hash: B256) -> HarnessResult<Option<Transaction>> {
        self.call("eth_getTransactionByHash", vec![json!(tx_hash)])
            .await
    }

    /// Storage root of `contract` as seen by this node's (private) state.
    pub async fn storage_root(&self, contract: Address) -> HarnessResult<B256> {
        self.call("eth_storageRoot", vec![json!(contract)]).await
    }

    /// Poll `eth_blockNumber` until the node answers.
    pub async fn wait_until_ready(&self, timeout: Duration) -> HarnessResult<()> {
        super::wait_until_ready(&self.node.to_string(), timeout, || async {
            self.block_number().await.map(|_| ())
        })
        .await
    }
}
