//! Request and response payloads of the node's JSON-RPC API.

use alloy_core::primitives::{Address, B256, Bytes, U64, U256};
use serde::{Deserialize, Serialize};

use super::{deserialize_opt_u64_from_hex, null_as_default};

/// Parameters of `eth_sendTransaction` and `eth_sendTransactionAsync`.
///
/// `private_for` turns the call into a private transaction whose payload is
/// only disclosed to the listed recipient keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub from: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Bytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<U64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_for: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

impl TransactionRequest {
    /// A value transfer between two accounts.
    pub fn transfer(from: Address, to: Address, value: U256) -> Self {
        Self {
            from,
            to: Some(to),
            value: Some(value),
            ..Default::default()
        }
    }

    /// A contract creation carrying `code` as init data.
    pub fn deploy(from: Address, code: Bytes) -> Self {
        Self {
            from,
            data: Some(code),
            ..Default::default()
        }
    }

    /// A call into an existing contract.
    pub fn call(from: Address, to: Address, data: Bytes) -> Self {
        Self {
            from,
            to: Some(to),
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn with_gas(mut self, gas: u64) -> Self {
        self.gas = Some(U64::from(gas));
        self
    }

    pub fn private_for(mut self, recipients: Vec<String>) -> Self {
        self.private_for = Some(recipients);
        self
    }

    pub fn callback_url(mut self, url: impl Into<String>) -> Self {
        self.callback_url = Some(url.into());
        self
    }

    pub fn is_private(&self) -> bool {
        self.private_for.is_some()
    }
}

/// Receipt returned by `eth_getTransactionReceipt`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: B256,
    #[serde(default)]
    pub block_hash: Option<B256>,
    #[serde(default, deserialize_with = "deserialize_opt_u64_from_hex")]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub from: Option<Address>,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub logs: Vec<Log>,
    #[serde(default, deserialize_with = "deserialize_opt_u64_from_hex")]
    pub status: Option<u64>,
}

impl TransactionReceipt {
    /// Whether the receipt belongs to a block: non-empty block hash and a
    /// block number.
    pub fn is_mined(&self) -> bool {
        matches!(self.block_hash, Some(hash) if !hash.is_zero()) && self.block_number.is_some()
    }

    pub fn has_logs(&self) -> bool {
        !self.logs.is_empty()
    }
}

/// An event log attached to a receipt.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Log {
    pub address: Address,
    #[serde(default, deserialize_with = "null_as_default")]
    pub topics: Vec<B256>,
    #[serde(default)]
    pub data: Bytes,
}

impl Log {
    /// The log data as hex with the `0x` prefix and leading zeros stripped,
    /// `"0"` when nothing is left.
    pub fn payload(&self) -> String {
        let encoded = hex::encode(&self.data);
        let trimmed = encoded.trim_start_matches('0');
        if trimmed.is_empty() {
            "0".to_string()
        } else {
            trimmed.to_string()
        }
    }
}

/// Transaction returned by `eth_getTransaction`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: B256,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub block_hash: Option<B256>,
    #[serde(default, deserialize_with = "deserialize_opt_u64_from_hex")]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub value: U256,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_private_request_serialization() {
        let from = Address::with_last_byte(1);
        let to = Address::with_last_byte(2);
        let request = TransactionRequest::transfer(from, to, U256::ZERO)
            .private_for(vec!["ROAZBWtSacxXQrOe3FGAqJDyJjFePR5ce4TSIzmJ0Bc=".to_string()]);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["value"], "0x0");
        assert_eq!(
            json["privateFor"][0],
            "ROAZBWtSacxXQrOe3FGAqJDyJjFePR5ce4TSIzmJ0Bc="
        );
        assert!(json.get("data").is_none());
        assert!(json.get("callbackUrl").is_none());
        assert!(request.is_private());
    }

    #[test]
    fn test_deploy_request_has_no_recipient() {
        let request = TransactionRequest::deploy(Address::ZERO, Bytes::from_static(&[0x60, 0x80]))
            .with_gas(4_700_000)
            .callback_url("http://127.0.0.1:5555/");

        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("to").is_none());
        assert_eq!(json["data"], "0x6080");
        assert_eq!(json["gas"], "0x47b760");
        assert_eq!(json["callbackUrl"], "http://127.0.0.1:5555/");
    }

    #[test]
    fn test_receipt_mined_and_logs() {
        let receipt: TransactionReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": format!("0x{}", "11".repeat(32)),
            "blockHash": format!("0x{}", "22".repeat(32)),
            "blockNumber": "0x1f",
            "contractAddress": null,
            "logs": [{
                "address": format!("0x{}", "33".repeat(20)),
                "topics": [],
                "data": "0x0000000000000000000000000000000000000000000000000000000000000007"
            }],
            "status": "0x1"
        }))
        .unwrap();

        assert!(receipt.is_mined());
        assert_eq!(receipt.block_number, Some(31));
        assert!(receipt.has_logs());
        assert_eq!(receipt.logs[0].payload(), "7");
    }

    #[test]
    fn test_pending_receipt_is_not_mined() {
        let receipt: TransactionReceipt = serde_json::from_value(serde_json::json!({
            "transactionHash": format!("0x{}", "11".repeat(32)),
            "blockHash": null,
            "blockNumber": null,
            "logs": null
        }))
        .unwrap();

        assert!(!receipt.is_mined());
        assert!(!receipt.has_logs());
    }

    #[test]
    fn test_zero_log_payload() {
        let log = Log {
            address: Address::ZERO,
            topics: vec![],
            data: Bytes::from(vec![0u8; 32]),
        };
        assert_eq!(log.payload(), "0");
    }
}
