use alloy_primitives::U256;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::chains::evm::types::{
    is_valid_tx_hash, parse_hex_u256, JsonRpcRequest, JsonRpcResponse, RpcTransaction,
    RpcTransactionReceipt,
};
use crate::chains::traits::{
    ChainClient, ChainError, ChainHealthStatus, ChainResult, PaymentReceipt, SupportedChain,
};

/// Configuration for a single EVM chain endpoint
#[derive(Debug, Clone)]
pub struct EvmChainConfig {
    pub chain: SupportedChain,
    pub rpc_url: String,
    pub request_timeout: Duration,
}

impl EvmChainConfig {
    /// Build the config for a chain, honoring its RPC override env var
    pub fn for_chain(chain: SupportedChain) -> Self {
        let rpc_url = std::env::var(chain.rpc_env_var())
            .unwrap_or_else(|_| chain.default_rpc_url().to_string());

        Self {
            chain,
            rpc_url,
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn validate(&self) -> ChainResult<()> {
        if self.rpc_url.is_empty() {
            return Err(ChainError::config_error(format!(
                "RPC URL for {} cannot be empty",
                self.chain
            )));
        }

        if !self.rpc_url.starts_with("http://") && !self.rpc_url.starts_with("https://") {
            return Err(ChainError::config_error(format!(
                "RPC URL for {} must be a valid URL",
                self.chain
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(ChainError::config_error(format!(
                "Request timeout for {} cannot be zero",
                self.chain
            )));
        }

        Ok(())
    }
}

/// JSON-RPC client for one EVM network
#[derive(Debug, Clone)]
pub struct EvmRpcClient {
    http_client: Client,
    config: EvmChainConfig,
}

impl EvmRpcClient {
    pub fn new(config: EvmChainConfig) -> ChainResult<Self> {
        config.validate()?;

        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(20)
            .user_agent("CryptoPay-Backend/1.0")
            .build()
            .map_err(|e| {
                ChainError::config_error(format!("Failed to create HTTP client: {}", e))
            })?;

        info!(
            "EVM client initialized for {} (chain id {}) with URL: {}",
            config.chain,
            config.chain.chain_id(),
            config.rpc_url
        );

        Ok(Self {
            http_client,
            config,
        })
    }

    /// Issue a JSON-RPC call, returning `None` when the node answers with a
    /// null result (unknown hash, not yet mined).
    async fn rpc_call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> ChainResult<Option<T>> {
        let request = JsonRpcRequest::new(method, params);

        let response = timeout(
            self.config.request_timeout,
            self.http_client
                .post(&self.config.rpc_url)
                .json(&request)
                .send(),
        )
        .await
        .map_err(|_| ChainError::timeout_error(self.config.request_timeout.as_secs()))?;

        let response = response.map_err(|e| {
            if e.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) {
                ChainError::RateLimitError
            } else {
                ChainError::network_error(format!("RPC request error: {}", e))
            }
        })?;

        let response = response.error_for_status().map_err(|e: reqwest::Error| {
            if e.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) {
                ChainError::RateLimitError
            } else {
                ChainError::network_error(format!("RPC request error: {}", e))
            }
        })?;

        let envelope: JsonRpcResponse<T> = response
            .json()
            .await
            .map_err(|e| ChainError::invalid_response(format!("JSON parsing error: {}", e)))?;

        if let Some(err) = envelope.error {
            return Err(ChainError::rpc_error(err.code, err.message));
        }

        Ok(envelope.result)
    }

    pub async fn get_transaction_receipt(
        &self,
        tx_hash: &str,
    ) -> ChainResult<Option<RpcTransactionReceipt>> {
        if !is_valid_tx_hash(tx_hash) {
            return Err(ChainError::invalid_hash(tx_hash));
        }

        debug!(
            "Fetching receipt for {} on {}",
            tx_hash, self.config.chain
        );

        self.rpc_call("eth_getTransactionReceipt", json!([tx_hash]))
            .await
    }

    pub async fn get_transaction(&self, tx_hash: &str) -> ChainResult<Option<RpcTransaction>> {
        if !is_valid_tx_hash(tx_hash) {
            return Err(ChainError::invalid_hash(tx_hash));
        }

        self.rpc_call("eth_getTransactionByHash", json!([tx_hash]))
            .await
    }
}

#[async_trait]
impl ChainClient for EvmRpcClient {
    fn chain_id(&self) -> u64 {
        self.config.chain.chain_id()
    }

    fn chain_name(&self) -> &str {
        self.config.chain.as_str()
    }

    async fn get_payment_receipt(&self, tx_hash: &str) -> ChainResult<Option<PaymentReceipt>> {
        let receipt = match self.get_transaction_receipt(tx_hash).await? {
            Some(receipt) => receipt,
            None => return Ok(None),
        };

        // Receipts do not carry the native value moved by the transaction,
        // so fetch the transaction body and merge it in. A failure here is
        // retried by the caller's next poll.
        let value = match self.get_transaction(tx_hash).await? {
            Some(tx) => parse_hex_u256(&tx.value)?,
            None => U256::ZERO,
        };

        debug!(
            "Receipt found for {} on {} (success: {}, logs: {})",
            tx_hash,
            self.config.chain,
            receipt.is_successful(),
            receipt.logs.len()
        );

        Ok(Some(receipt.into_payment_receipt(value)))
    }

    async fn health_check(&self) -> ChainResult<ChainHealthStatus> {
        let start_time = Instant::now();

        debug!(
            "Performing health check for {} at: {}",
            self.config.chain, self.config.rpc_url
        );

        let result = timeout(
            self.config.request_timeout,
            self.http_client
                .post(&self.config.rpc_url)
                .json(&JsonRpcRequest::new("eth_blockNumber", json!([])))
                .send(),
        )
        .await;

        let response_time = start_time.elapsed();
        let base = ChainHealthStatus {
            is_healthy: false,
            chain: self.config.chain.as_str().to_string(),
            chain_id: self.config.chain.chain_id(),
            response_time_ms: response_time.as_millis() as u64,
            last_check: chrono::Utc::now().to_rfc3339(),
            error_message: None,
        };

        match result {
            Ok(Ok(response)) if response.status().is_success() => {
                debug!(
                    "{} health check passed - Response time: {}ms",
                    self.config.chain,
                    response_time.as_millis()
                );

                Ok(ChainHealthStatus {
                    is_healthy: true,
                    ..base
                })
            }
            Ok(Ok(response)) => {
                let error_msg = format!("HTTP status: {}", response.status());
                error!("{} health check failed: {}", self.config.chain, error_msg);

                Ok(ChainHealthStatus {
                    error_message: Some(error_msg),
                    ..base
                })
            }
            Ok(Err(e)) => {
                let error_msg = format!("Request failed: {}", e);
                error!("{} health check failed: {}", self.config.chain, error_msg);

                Ok(ChainHealthStatus {
                    error_message: Some(error_msg),
                    ..base
                })
            }
            Err(_) => {
                let error_msg = format!(
                    "Timed out after {} seconds",
                    self.config.request_timeout.as_secs()
                );
                error!("{} health check failed: {}", self.config.chain, error_msg);

                Ok(ChainHealthStatus {
                    error_message: Some(error_msg),
                    ..base
                })
            }
        }
    }
}
