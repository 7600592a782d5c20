//! Shared utilities for talking to a node's JSON-RPC endpoint.

mod client;
mod types;

use std::time::Duration;

use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::Value;

pub use client::{BlockTag, NodeClient};
pub use types::{Log, Transaction, TransactionReceipt, TransactionRequest};

use crate::{HarnessError, HarnessResult};

/// Default interval between polling attempts when waiting for readiness.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Create an HTTP client whose every request is bounded by `timeout`.
pub fn create_client(timeout: Duration) -> HarnessResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| HarnessError::config(format!("failed to create HTTP client: {}", e)))
}

/// Make a JSON-RPC call and deserialize the result.
///
/// Transport failures, non-2xx statuses and request timeouts come back as
/// infrastructure errors; an `error` object in the response becomes
/// [`HarnessError::Rpc`] with the node's message untouched so callers can
/// match expected rejections on it.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> HarnessResult<T> {
    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .map_err(|e| request_error(method, url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(HarnessError::HttpStatus {
            method: method.to_string(),
            endpoint: url.to_string(),
            status,
        });
    }

    let result: Value = response
        .json()
        .await
        .map_err(|e| request_error(method, url, e))?;

    if let Some(error) = result.get("error") {
        return Err(HarnessError::Rpc {
            method: method.to_string(),
            code: error.get("code").and_then(Value::as_i64),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
        });
    }

    let result_value = result
        .get("result")
        .cloned()
        .ok_or_else(|| HarnessError::InvalidResponse {
            method: method.to_string(),
            reason: "no result in response".to_string(),
        })?;

    serde_json::from_value(result_value).map_err(|e| HarnessError::InvalidResponse {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

fn request_error(method: &str, url: &str, err: reqwest::Error) -> HarnessError {
    if err.is_timeout() {
        HarnessError::Timeout {
            method: method.to_string(),
            endpoint: url.to_string(),
        }
    } else if err.is_decode() {
        HarnessError::InvalidResponse {
            method: method.to_string(),
            reason: err.to_string(),
        }
    } else {
        HarnessError::Transport {
            method: method.to_string(),
            endpoint: url.to_string(),
            source: err,
        }
    }
}

/// Wait for a node to answer by repeatedly calling a check function.
///
/// # Arguments
/// * `name` - Name of the node (for error messages)
/// * `timeout` - Maximum time to wait
/// * `check_fn` - Function that returns Ok(()) when the node is ready
pub async fn wait_until_ready<F, Fut>(name: &str, timeout: Duration, check_fn: F) -> HarnessResult<()>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = HarnessResult<()>>,
{
    let start = std::time::Instant::now();

    loop {
        match check_fn().await {
            Ok(()) => return Ok(()),
            Err(e) => {
                tracing::trace!(error = %e, node = %name, "Readiness check failed, retrying...");
                if start.elapsed() + DEFAULT_POLL_INTERVAL > timeout {
                    return Err(HarnessError::Timeout {
                        method: "readiness check".to_string(),
                        endpoint: name.to_string(),
                    });
                }
            }
        }

        tokio::time::sleep(DEFAULT_POLL_INTERVAL).await;
    }
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_quantity(method: &str, value: &str) -> HarnessResult<u64> {
    u64::from_str_radix(value.trim_start_matches("0x"), 16).map_err(|e| {
        HarnessError::InvalidResponse {
            method: method.to_string(),
            reason: format!("'{}' is not a hex quantity: {}", value, e),
        }
    })
}

/// Deserialize an optional hex quantity (`null` or missing becomes `None`).
pub(crate) fn deserialize_opt_u64_from_hex<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    s.map(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16))
        .transpose()
        .map_err(serde::de::Error::custom)
}

/// Deserialize `null` as the type's default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("eth_blockNumber", "0x0").unwrap(), 0);
        assert_eq!(parse_quantity("eth_blockNumber", "0x1b4").unwrap(), 436);
        assert!(parse_quantity("eth_blockNumber", "0xzz").is_err());
    }

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "deserialize_opt_u64_from_hex")]
        number: Option<u64>,
        #[serde(default, deserialize_with = "null_as_default")]
        items: Vec<u32>,
    }

    #[test]
    fn test_optional_hex_and_null_defaults() {
        let probe: Probe = serde_json::from_str(r#"{"number":"0x10","items":null}"#).unwrap();
        assert_eq!(probe.number, Some(16));
        assert!(probe.items.is_empty());

        let probe: Probe = serde_json::from_str(r#"{"number":null}"#).unwrap();
        assert_eq!(probe.number, None);

        let probe: Probe = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(probe.number, None);
    }

    #[tokio::test]
    async fn test_wait_until_ready_times_out() {
        let result = wait_until_ready("node9", Duration::from_millis(10), || async {
            Err(HarnessError::config("never ready"))
        })
        .await;
        assert!(result.unwrap_err().is_timeout());
    }

    #[tokio::test]
    async fn test_wait_until_ready_succeeds_immediately() {
        wait_until_ready("node1", Duration::from_secs(1), || async { Ok(()) })
            .await
            .unwrap();
    }
}
