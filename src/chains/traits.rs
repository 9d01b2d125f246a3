use alloy_primitives::{B256, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// SupportedChain enumeration for EVM network dispatching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SupportedChain {
    /// Ethereum mainnet
    Ethereum,
    /// Polygon PoS
    Polygon,
    /// Optimism mainnet
    Optimism,
    /// Arbitrum One
    Arbitrum,
    /// Base mainnet
    Base,
}

impl SupportedChain {
    /// All chains the platform accepts payments on
    pub const ALL: [SupportedChain; 5] = [
        SupportedChain::Ethereum,
        SupportedChain::Polygon,
        SupportedChain::Optimism,
        SupportedChain::Arbitrum,
        SupportedChain::Base,
    ];

    /// Numeric EVM chain id
    pub fn chain_id(&self) -> u64 {
        match self {
            SupportedChain::Ethereum => 1,
            SupportedChain::Polygon => 137,
            SupportedChain::Optimism => 10,
            SupportedChain::Arbitrum => 42161,
            SupportedChain::Base => 8453,
        }
    }

    /// Resolve from a numeric chain id
    pub fn from_chain_id(chain_id: u64) -> Option<Self> {
        match chain_id {
            1 => Some(SupportedChain::Ethereum),
            137 => Some(SupportedChain::Polygon),
            10 => Some(SupportedChain::Optimism),
            42161 => Some(SupportedChain::Arbitrum),
            8453 => Some(SupportedChain::Base),
            _ => None,
        }
    }

    /// Get chain identifier string
    pub fn as_str(&self) -> &'static str {
        match self {
            SupportedChain::Ethereum => "ethereum",
            SupportedChain::Polygon => "polygon",
            SupportedChain::Optimism => "optimism",
            SupportedChain::Arbitrum => "arbitrum",
            SupportedChain::Base => "base",
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ethereum" | "mainnet" | "eth" => Some(SupportedChain::Ethereum),
            "polygon" | "matic" => Some(SupportedChain::Polygon),
            "optimism" | "op" => Some(SupportedChain::Optimism),
            "arbitrum" | "arb" => Some(SupportedChain::Arbitrum),
            "base" => Some(SupportedChain::Base),
            _ => None,
        }
    }

    /// Public RPC endpoint used when no override is configured
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            SupportedChain::Ethereum => "https://eth.merkle.io",
            SupportedChain::Polygon => "https://polygon-rpc.com",
            SupportedChain::Optimism => "https://mainnet.optimism.io",
            SupportedChain::Arbitrum => "https://arb1.arbitrum.io/rpc",
            SupportedChain::Base => "https://mainnet.base.org",
        }
    }

    /// Environment variable holding the RPC override for this chain
    pub fn rpc_env_var(&self) -> &'static str {
        match self {
            SupportedChain::Ethereum => "ETHEREUM_RPC_URL",
            SupportedChain::Polygon => "POLYGON_RPC_URL",
            SupportedChain::Optimism => "OPTIMISM_RPC_URL",
            SupportedChain::Arbitrum => "ARBITRUM_RPC_URL",
            SupportedChain::Base => "BASE_RPC_URL",
        }
    }
}

impl std::fmt::Display for SupportedChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Common result type for chain operations
pub type ChainResult<T> = Result<T, ChainError>;

/// Unified error type for chain client operations
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("Invalid transaction hash: {hash}")]
    InvalidHash { hash: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("RPC error {code}: {message}")]
    RpcError { code: i64, message: String },

    #[error("Rate limit exceeded. Please try again later")]
    RateLimitError,

    #[error("Invalid RPC response: {message}")]
    InvalidResponse { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Timeout error: operation timed out after {seconds} seconds")]
    TimeoutError { seconds: u64 },
}

impl ChainError {
    pub fn invalid_hash(hash: impl Into<String>) -> Self {
        Self::InvalidHash { hash: hash.into() }
    }

    pub fn network_error(message: impl Into<String>) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    pub fn rpc_error(code: i64, message: impl Into<String>) -> Self {
        Self::RpcError {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn timeout_error(seconds: u64) -> Self {
        Self::TimeoutError { seconds }
    }
}

impl From<reqwest::Error> for ChainError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChainError::timeout_error(0)
        } else {
            ChainError::network_error(format!("Request error: {}", err))
        }
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::invalid_response(format!("JSON error: {}", err))
    }
}

/// A single log entry emitted during transaction execution
#[derive(Debug, Clone)]
pub struct ReceiptLog {
    /// Contract address that emitted the log
    pub address: String,
    /// Indexed topics; topic 0 is the event signature
    pub topics: Vec<B256>,
    /// Raw ABI-encoded log data
    pub data: Vec<u8>,
}

/// Chain-reported outcome of a mined transaction.
///
/// Carries everything payment validation needs: execution status, the
/// recipient, the native value moved by the transaction, and the emitted
/// logs for token transfers.
#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    pub transaction_hash: String,
    /// True when execution succeeded, false when it reverted
    pub successful: bool,
    pub from: String,
    /// Recipient address; None for contract creations
    pub to: Option<String>,
    /// Native value carried by the transaction, in wei
    pub value: U256,
    pub logs: Vec<ReceiptLog>,
    pub block_number: Option<u64>,
}

/// Health status for a chain RPC connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainHealthStatus {
    /// Whether the chain endpoint is healthy
    pub is_healthy: bool,
    /// Chain identifier (e.g., "ethereum", "base")
    pub chain: String,
    /// Numeric EVM chain id
    pub chain_id: u64,
    /// Response time in milliseconds
    pub response_time_ms: u64,
    /// Last check timestamp
    pub last_check: String,
    /// Error message if unhealthy
    pub error_message: Option<String>,
}

/// Capability contract against a chain node
///
/// One implementation per supported network. The monitor only ever asks a
/// chain for the receipt of a submitted hash; everything else stays behind
/// this seam.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Numeric EVM chain id this client serves
    fn chain_id(&self) -> u64;

    /// Chain identifier string (e.g., "ethereum")
    fn chain_name(&self) -> &str;

    /// Fetch the mined receipt for a transaction hash.
    ///
    /// Returns `Ok(None)` while the transaction is unknown or not yet
    /// mined; errors cover transport and protocol failures only.
    async fn get_payment_receipt(&self, tx_hash: &str) -> ChainResult<Option<PaymentReceipt>>;

    /// Perform health check on the RPC connection
    async fn health_check(&self) -> ChainResult<ChainHealthStatus>;
}

/// Registry of chain clients keyed by numeric chain id
///
/// Built once at startup; the monitor resolves clients through it instead
/// of switching on chain ids itself.
pub struct ChainClientPool {
    clients: HashMap<u64, Arc<dyn ChainClient>>,
}

impl ChainClientPool {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
        }
    }

    /// Register a client for its chain id, replacing any previous one
    pub fn register(&mut self, client: Arc<dyn ChainClient>) {
        self.clients.insert(client.chain_id(), client);
    }

    /// Look up the client for a chain id
    pub fn get(&self, chain_id: u64) -> Option<Arc<dyn ChainClient>> {
        self.clients.get(&chain_id).cloned()
    }

    pub fn supports(&self, chain_id: u64) -> bool {
        self.clients.contains_key(&chain_id)
    }

    /// Chain ids with a registered client, sorted for stable output
    pub fn supported_chain_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.clients.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Check health of all registered chains (parallel)
    pub async fn health_check_all(&self) -> HashMap<String, ChainHealthStatus> {
        use futures::future::{BoxFuture, FutureExt};
        use futures::stream::{self, StreamExt};

        let probes: Vec<BoxFuture<'static, (String, ChainResult<ChainHealthStatus>)>> = self
            .clients
            .values()
            .cloned()
            .map(|client| {
                let name = client.chain_name().to_string();
                async move {
                    let status = client.health_check().await;
                    (name, status)
                }
                .boxed()
            })
            .collect();

        stream::iter(probes)
            .buffer_unordered(3) // Probe up to 3 chains concurrently
            .filter_map(|r| async move {
                match r {
                    (name, Ok(status)) => Some((name, status)),
                    _ => None,
                }
            })
            .collect()
            .await
    }
}

impl Default for ChainClientPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_chain_as_str() {
        assert_eq!(SupportedChain::Ethereum.as_str(), "ethereum");
        assert_eq!(SupportedChain::Polygon.as_str(), "polygon");
        assert_eq!(SupportedChain::Optimism.as_str(), "optimism");
        assert_eq!(SupportedChain::Arbitrum.as_str(), "arbitrum");
        assert_eq!(SupportedChain::Base.as_str(), "base");
    }

    #[test]
    fn test_supported_chain_from_str() {
        assert_eq!(
            SupportedChain::from_str("ethereum"),
            Some(SupportedChain::Ethereum)
        );
        assert_eq!(
            SupportedChain::from_str("ETHEREUM"),
            Some(SupportedChain::Ethereum)
        );
        assert_eq!(
            SupportedChain::from_str("matic"),
            Some(SupportedChain::Polygon)
        );
        assert_eq!(SupportedChain::from_str("op"), Some(SupportedChain::Optimism));
        assert_eq!(
            SupportedChain::from_str("arb"),
            Some(SupportedChain::Arbitrum)
        );
        assert_eq!(SupportedChain::from_str("base"), Some(SupportedChain::Base));
        assert_eq!(SupportedChain::from_str("invalid"), None);
    }

    #[test]
    fn test_supported_chain_ids_round_trip() {
        for chain in SupportedChain::ALL {
            assert_eq!(SupportedChain::from_chain_id(chain.chain_id()), Some(chain));
        }
        assert_eq!(SupportedChain::from_chain_id(56), None);
        assert_eq!(SupportedChain::from_chain_id(0), None);
    }

    #[test]
    fn test_supported_chain_display() {
        assert_eq!(format!("{}", SupportedChain::Ethereum), "ethereum");
        assert_eq!(format!("{}", SupportedChain::Base), "base");
    }

    #[test]
    fn test_chain_error_display() {
        let err = ChainError::invalid_hash("0x123");
        assert!(err.to_string().contains("Invalid transaction hash"));

        let err = ChainError::rpc_error(-32000, "header not found");
        assert!(err.to_string().contains("-32000"));
        assert!(err.to_string().contains("header not found"));

        let err = ChainError::timeout_error(10);
        assert!(err.to_string().contains("10 seconds"));
    }

    #[test]
    fn test_pool_register_and_lookup() {
        struct StubClient {
            id: u64,
        }

        #[async_trait]
        impl ChainClient for StubClient {
            fn chain_id(&self) -> u64 {
                self.id
            }

            fn chain_name(&self) -> &str {
                "stub"
            }

            async fn get_payment_receipt(
                &self,
                _tx_hash: &str,
            ) -> ChainResult<Option<PaymentReceipt>> {
                Ok(None)
            }

            async fn health_check(&self) -> ChainResult<ChainHealthStatus> {
                Ok(ChainHealthStatus {
                    is_healthy: true,
                    chain: "stub".to_string(),
                    chain_id: self.id,
                    response_time_ms: 0,
                    last_check: chrono::Utc::now().to_rfc3339(),
                    error_message: None,
                })
            }
        }

        let mut pool = ChainClientPool::new();
        assert!(pool.is_empty());

        pool.register(Arc::new(StubClient { id: 1 }));
        pool.register(Arc::new(StubClient { id: 137 }));

        assert_eq!(pool.len(), 2);
        assert!(pool.supports(1));
        assert!(pool.supports(137));
        assert!(!pool.supports(42));
        assert!(pool.get(1).is_some());
        assert!(pool.get(42).is_none());
        assert_eq!(pool.supported_chain_ids(), vec![1, 137]);

        // Re-registering the same chain id replaces, not duplicates
        pool.register(Arc::new(StubClient { id: 1 }));
        assert_eq!(pool.len(), 2);
    }
}
