use flight_surety_types::{Address, Bytes, H256};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, trace};

use crate::{
    BlockNumber, CallRequest, FilterOptions, Log, Receipt, Result, RpcError, RpcRequest,
    RpcResponse,
};

/// Rewrites a WebSocket endpoint to its HTTP equivalent.
///
/// Deployment configs usually carry the `ws://` form; this client speaks
/// JSON-RPC over plain HTTP.
pub fn normalize_endpoint(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("ws://") {
        format!("http://{}", rest)
    } else if let Some(rest) = url.strip_prefix("wss://") {
        format!("https://{}", rest)
    } else {
        url.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct RpcClientConfig {
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// Interval between receipt polls
    pub receipt_poll_interval: Duration,
    /// Upper bound on waiting for a receipt
    pub receipt_timeout: Duration,
    /// `User-Agent` header sent with every request
    pub user_agent: Option<String>,
}

impl Default for RpcClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            receipt_poll_interval: Duration::from_millis(250),
            receipt_timeout: Duration::from_secs(60),
            user_agent: None,
        }
    }
}

/// Minimal Ethereum JSON-RPC client over HTTP.
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    config: RpcClientConfig,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(url: &str) -> Result<Self> {
        Self::with_config(url, RpcClientConfig::default())
    }

    pub fn with_config(url: &str, config: RpcClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(config.request_timeout);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.as_str());
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            url: normalize_endpoint(url),
            config,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sends one JSON-RPC request and decodes its `result`.
    pub async fn request<R: DeserializeOwned>(&self, method: &str, params: Value) -> Result<R> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method, params);
        trace!(id, method, "Sending JSON-RPC request");

        let response = self.http.post(&self.url).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(RpcError::HttpStatus(response.status().as_u16()));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| RpcError::InvalidResponse(e.to_string()))?;

        if let Some(error) = body.error {
            debug!(method, code = error.code, message = %error.message, "JSON-RPC call failed");
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        let result = body.result.unwrap_or(Value::Null);
        serde_json::from_value(result).map_err(|e| RpcError::InvalidResponse(format!("{}: {}", method, e)))
    }

    pub async fn accounts(&self) -> Result<Vec<Address>> {
        self.request("eth_accounts", json!([])).await
    }

    pub async fn block_number(&self) -> Result<u64> {
        let number: flight_surety_types::U256 = self.request("eth_blockNumber", json!([])).await?;
        Ok(number.low_u64())
    }

    pub async fn call(&self, call: &CallRequest, block: BlockNumber) -> Result<Bytes> {
        self.request("eth_call", json!([call, block])).await
    }

    pub async fn send_transaction(&self, tx: &CallRequest) -> Result<H256> {
        self.request("eth_sendTransaction", json!([tx])).await
    }

    pub async fn transaction_receipt(&self, hash: H256) -> Result<Option<Receipt>> {
        self.request("eth_getTransactionReceipt", json!([hash])).await
    }

    pub async fn get_logs(&self, filter: &FilterOptions) -> Result<Vec<Log>> {
        self.request("eth_getLogs", json!([filter])).await
    }

    /// Polls for the receipt of `hash`; a zero status is reported as a revert.
    pub async fn wait_for_receipt(&self, hash: H256) -> Result<Receipt> {
        let deadline = Instant::now() + self.config.receipt_timeout;

        loop {
            if let Some(receipt) = self.transaction_receipt(hash).await? {
                if !receipt.succeeded() {
                    return Err(RpcError::Reverted(hash));
                }
                return Ok(receipt);
            }
            if Instant::now() >= deadline {
                return Err(RpcError::ReceiptTimeout(hash));
            }
            sleep(self.config.receipt_poll_interval).await;
        }
    }

    /// `eth_sendTransaction` followed by [`wait_for_receipt`](Self::wait_for_receipt).
    pub async fn send_and_confirm(&self, tx: &CallRequest) -> Result<Receipt> {
        let hash = self.send_transaction(tx).await?;
        self.wait_for_receipt(hash).await
    }
}
