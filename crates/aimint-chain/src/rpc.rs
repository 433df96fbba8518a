use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use aimint_types::TransportError;
use alloy_primitives::{Address, Bytes, TxHash, U256, U64};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{ChainError, ChainResult};

/// Transaction fields handed to a wallet for signing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    /// Filled in by the signer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl TransactionRequest {
    /// A contract call paying `value` wei.
    pub fn call(to: Address, value: U256, data: impl Into<Bytes>) -> Self {
        Self {
            from: None,
            to,
            value,
            data: data.into(),
        }
    }
}

/// The subset of a transaction receipt the mint stage inspects.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: TxHash,
    /// `None` while the transaction sits in a pending block.
    #[serde(default)]
    pub block_number: Option<U64>,
    /// `1` for success, `0` for revert. Absent on pre-Byzantium chains.
    #[serde(default)]
    pub status: Option<U64>,
}

impl TransactionReceipt {
    pub fn is_mined(&self) -> bool {
        self.block_number.is_some()
    }

    pub fn succeeded(&self) -> bool {
        self.status.map_or(true, |s| s == U64::from(1))
    }
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Minimal Ethereum JSON-RPC client over HTTP.
pub struct JsonRpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> ChainResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ChainError::Config(e.to_string()))?;
        Ok(Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn transport(&self, err: reqwest::Error) -> ChainError {
        if err.is_timeout() {
            TransportError::timeout(&self.url, err.to_string()).into()
        } else {
            TransportError::new(&self.url, err.to_string()).into()
        }
    }

    /// Issue one call. A `null` result comes back as `None`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> ChainResult<Option<T>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(method, id, "json-rpc call");
        let request = RpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport(e))?;

        let parsed: RpcResponse = serde_json::from_str(&body).map_err(|e| {
            ChainError::Decode(format!("{method}: http {}: {e}", status.as_u16()))
        })?;
        if let Some(err) = parsed.error {
            return Err(ChainError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        match parsed.result {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| ChainError::Decode(format!("{method}: {e}"))),
        }
    }

    async fn call_required<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> ChainResult<T> {
        self.call(method, params)
            .await?
            .ok_or_else(|| ChainError::Decode(format!("{method}: null result")))
    }

    /// `eth_chainId`
    pub async fn chain_id(&self) -> ChainResult<u64> {
        let id: U64 = self.call_required("eth_chainId", json!([])).await?;
        Ok(id.to::<u64>())
    }

    /// `eth_accounts`
    pub async fn accounts(&self) -> ChainResult<Vec<Address>> {
        self.call_required("eth_accounts", json!([])).await
    }

    /// `eth_sendTransaction`: the node's wallet signs and broadcasts.
    pub async fn send_transaction(&self, tx: &TransactionRequest) -> ChainResult<TxHash> {
        self.call_required("eth_sendTransaction", json!([tx])).await
    }

    /// `eth_getTransactionReceipt`. `None` until the node knows the
    /// transaction as mined.
    pub async fn transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> ChainResult<Option<TransactionReceipt>> {
        self.call("eth_getTransactionReceipt", json!([tx_hash])).await
    }
}

impl fmt::Debug for JsonRpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonRpcClient").field("url", &self.url).finish()
    }
}
