//! Shared RPC utilities for interacting with Ethereum JSON-RPC endpoints.

use std::time::Duration;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON-RPC error code used by most clients for reverted execution.
const EXECUTION_REVERTED_CODE: i64 = 3;

/// An error object returned by the node.
#[derive(Debug, Clone, thiserror::Error)]
#[error("RPC error {code}: {message}")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    /// Whether the node reported reverted execution.
    pub fn is_revert(&self) -> bool {
        self.code == EXECUTION_REVERTED_CODE || self.message.contains("revert")
    }
}

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Make a JSON-RPC call and deserialize the result.
///
/// # Arguments
/// * `client` - The HTTP client to use
/// * `url` - The RPC endpoint URL
/// * `method` - The RPC method name
/// * `params` - The method parameters
///
/// # Returns
/// The deserialized result. An error object in the response is returned as
/// an [`RpcError`], which callers may downcast.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
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
        .with_context(|| format!("Failed to send {} request", method))?;

    let result: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    parse_response(method, result)
}

fn parse_response<T: DeserializeOwned>(method: &str, result: Value) -> Result<T, anyhow::Error> {
    if let Some(error) = result.get("error") {
        return Err(RpcError {
            code: error.get("code").and_then(|c| c.as_i64()).unwrap_or_default(),
            message: error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown")
                .to_string(),
        }
        .into());
    }

    let result_value = result
        .get("result")
        .context("No result in response")?
        .clone();

    serde_json::from_value(result_value)
        .with_context(|| format!("Failed to deserialize {} result", method))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_result() {
        let value: String = parse_response(
            "eth_blockNumber",
            serde_json::json!({"jsonrpc": "2.0", "id": 1, "result": "0x1b4"}),
        )
        .unwrap();

        assert_eq!(value, "0x1b4");
    }

    #[test]
    fn test_parse_error_is_downcastable() {
        let err = parse_response::<Value>(
            "eth_call",
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": 3, "message": "execution reverted"}
            }),
        )
        .unwrap_err();

        let rpc_err = err.downcast_ref::<RpcError>().expect("Should be an RpcError");
        assert!(rpc_err.is_revert());
    }

    #[test]
    fn test_non_revert_error() {
        let err = parse_response::<Value>(
            "eth_sendTransaction",
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32000, "message": "nonce too low"}
            }),
        )
        .unwrap_err();

        assert!(!err.downcast_ref::<RpcError>().unwrap().is_revert());
    }

    #[test]
    fn test_missing_result() {
        let err = parse_response::<Value>("eth_call", serde_json::json!({"jsonrpc": "2.0"}));
        assert!(err.is_err());
    }
}
