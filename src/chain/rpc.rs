//! Ethereum JSON-RPC chain source
//!
//! Uses `eth_blockNumber` and `eth_getBlockByNumber(height, true)`. Full
//! transaction objects carry the sender, so no signature recovery is needed.

use async_trait::async_trait;
use primitive_types::U256;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use super::{ChainBlock, ChainError, ChainSource, ChainTransaction};

/// JSON-RPC client for an Ethereum-compatible node
pub struct JsonRpcChain {
    client: Client,
    url: String,
    request_id: AtomicU64,
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcBlock {
    number: String,
    #[serde(default)]
    transactions: Vec<RpcTransaction>,
}

#[derive(Debug, Deserialize)]
struct RpcTransaction {
    hash: String,
    from: String,
    to: Option<String>,
    value: U256,
}

impl RpcBlock {
    fn into_chain_block(self) -> Result<ChainBlock, ChainError> {
        Ok(ChainBlock {
            height: parse_quantity(&self.number)?,
            transactions: self
                .transactions
                .into_iter()
                .map(|tx| ChainTransaction {
                    hash: tx.hash,
                    from: tx.from,
                    to: tx.to,
                    value: tx.value,
                })
                .collect(),
        })
    }
}

/// Parse a `0x`-prefixed hex quantity
fn parse_quantity(quantity: &str) -> Result<u64, ChainError> {
    let digits = quantity
        .strip_prefix("0x")
        .ok_or_else(|| ChainError::Decode(format!("quantity '{}' lacks 0x prefix", quantity)))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| ChainError::Decode(format!("quantity '{}': {}", quantity, e)))
}

impl JsonRpcChain {
    /// Create a client; `timeout` bounds every HTTP request
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ChainError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
            request_id: AtomicU64::new(0),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>, ChainError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        debug!("eth rpc call: {} id={}", method, id);

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ChainError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ChainError::Request(format!("HTTP {} - {}", status, body)));
        }

        let rpc_response: RpcResponse<T> = response
            .json()
            .await
            .map_err(|e| ChainError::Decode(e.to_string()))?;

        if let Some(error) = rpc_response.error {
            return Err(ChainError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(rpc_response.result)
    }
}

#[async_trait]
impl ChainSource for JsonRpcChain {
    async fn head_height(&self) -> Result<u64, ChainError> {
        let quantity: String = self
            .call("eth_blockNumber", serde_json::json!([]))
            .await?
            .ok_or_else(|| ChainError::Decode("empty eth_blockNumber response".to_string()))?;
        parse_quantity(&quantity)
    }

    async fn block_at(&self, height: u64) -> Result<ChainBlock, ChainError> {
        let block: RpcBlock = self
            .call(
                "eth_getBlockByNumber",
                serde_json::json!([format!("0x{:x}", height), true]),
            )
            .await?
            .ok_or(ChainError::BlockUnavailable { height })?;
        block.into_chain_block()
    }
}
