use alloy_primitives::{B256, U256};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::chains::traits::{ChainError, ChainResult, PaymentReceipt, ReceiptLog};

/// JSON-RPC 2.0 request envelope
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub method: String,
    pub params: serde_json::Value,
    pub id: u64,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
            id: 1,
        }
    }
}

/// JSON-RPC 2.0 response envelope
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct JsonRpcResponse<T> {
    #[serde(default)]
    pub result: Option<T>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// Error object carried inside a JSON-RPC response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

/// `eth_getTransactionReceipt` result as reported by the node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransactionReceipt {
    pub transaction_hash: String,
    /// "0x1" on success, "0x0" on revert
    pub status: Option<String>,
    pub from: String,
    pub to: Option<String>,
    #[serde(default)]
    pub logs: Vec<RpcLog>,
    pub block_number: Option<String>,
}

/// `eth_getTransactionByHash` result, trimmed to the fields we read
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    pub hash: String,
    pub from: String,
    pub to: Option<String>,
    /// Native value in wei, hex-encoded
    pub value: String,
}

/// Log entry as reported by the node
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default = "default_log_data")]
    pub data: String,
}

fn default_log_data() -> String {
    "0x".to_string()
}

/// Parse a 0x-prefixed hex quantity into a U256
pub fn parse_hex_u256(value: &str) -> ChainResult<U256> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16)
        .map_err(|e| ChainError::invalid_response(format!("Bad hex quantity {}: {}", value, e)))
}

/// Parse a 0x-prefixed hex quantity into a u64
pub fn parse_hex_u64(value: &str) -> ChainResult<u64> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(digits, 16)
        .map_err(|e| ChainError::invalid_response(format!("Bad hex quantity {}: {}", value, e)))
}

/// Basic shape check for an EVM transaction hash (0x + 64 hex chars)
pub fn is_valid_tx_hash(hash: &str) -> bool {
    let digits = match hash.strip_prefix("0x") {
        Some(d) => d,
        None => return false,
    };
    digits.len() == 64 && digits.chars().all(|c| c.is_ascii_hexdigit())
}

impl RpcTransactionReceipt {
    /// True when the receipt's status field marks successful execution.
    ///
    /// Pre-Byzantium receipts have no status field; those are treated as
    /// failed rather than guessed at.
    pub fn is_successful(&self) -> bool {
        matches!(self.status.as_deref(), Some("0x1") | Some("0x01"))
    }

    /// Merge the receipt with the transaction's native value into the
    /// capability-level receipt the validator consumes.
    ///
    /// Malformed log entries (missing topics, undecodable hex) are dropped
    /// here; a log the node cannot report cleanly can never qualify a
    /// payment.
    pub fn into_payment_receipt(self, value: U256) -> PaymentReceipt {
        let successful = self.is_successful();
        let block_number = self
            .block_number
            .as_deref()
            .and_then(|raw| parse_hex_u64(raw).ok());
        let logs = self
            .logs
            .into_iter()
            .filter_map(|log| log.into_receipt_log())
            .collect();

        PaymentReceipt {
            transaction_hash: self.transaction_hash,
            successful,
            from: self.from,
            to: self.to,
            value,
            logs,
            block_number,
        }
    }
}

impl RpcLog {
    fn into_receipt_log(self) -> Option<ReceiptLog> {
        let mut topics = Vec::with_capacity(self.topics.len());
        for topic in &self.topics {
            topics.push(B256::from_str(topic).ok()?);
        }

        let data = hex::decode(self.data.strip_prefix("0x").unwrap_or(&self.data)).ok()?;

        Some(ReceiptLog {
            address: self.address,
            topics,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRANSFER_TOPIC: &str =
        "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

    #[test]
    fn test_parse_hex_u256() {
        assert_eq!(parse_hex_u256("0x0").unwrap(), U256::ZERO);
        assert_eq!(parse_hex_u256("0x").unwrap(), U256::ZERO);
        assert_eq!(parse_hex_u256("0xde0b6b3a7640000").unwrap(), U256::from(10u64.pow(18)));
        assert!(parse_hex_u256("0xzz").is_err());
    }

    #[test]
    fn test_parse_hex_u64() {
        assert_eq!(parse_hex_u64("0x12d687").unwrap(), 1234567);
        assert!(parse_hex_u64("not-hex").is_err());
    }

    #[test]
    fn test_is_valid_tx_hash() {
        assert!(is_valid_tx_hash(
            "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b"
        ));
        assert!(!is_valid_tx_hash(
            "88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b"
        ));
        assert!(!is_valid_tx_hash("0x1234"));
        assert!(!is_valid_tx_hash(
            "0xgg df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a7139"
        ));
    }

    #[test]
    fn test_receipt_status_parsing() {
        let mut receipt = sample_receipt();
        assert!(receipt.is_successful());

        receipt.status = Some("0x0".to_string());
        assert!(!receipt.is_successful());

        receipt.status = None;
        assert!(!receipt.is_successful());
    }

    #[test]
    fn test_into_payment_receipt_decodes_logs() {
        let receipt = sample_receipt();
        let payment = receipt.into_payment_receipt(U256::from(42u64));

        assert!(payment.successful);
        assert_eq!(payment.value, U256::from(42u64));
        assert_eq!(payment.block_number, Some(0x12d687));
        assert_eq!(payment.logs.len(), 1);

        let log = &payment.logs[0];
        assert_eq!(log.topics.len(), 3);
        assert_eq!(format!("0x{}", hex::encode(log.topics[0])), TRANSFER_TOPIC);
        assert_eq!(log.data.len(), 32);
    }

    #[test]
    fn test_into_payment_receipt_skips_malformed_logs() {
        let mut receipt = sample_receipt();
        receipt.logs.push(RpcLog {
            address: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".to_string(),
            topics: vec!["0xnot-a-topic".to_string()],
            data: "0x".to_string(),
        });
        receipt.logs.push(RpcLog {
            address: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".to_string(),
            topics: vec![TRANSFER_TOPIC.to_string()],
            data: "0xnothex".to_string(),
        });

        let payment = receipt.into_payment_receipt(U256::ZERO);
        assert_eq!(payment.logs.len(), 1);
    }

    #[test]
    fn test_rpc_response_deserializes_null_result() {
        let body = r#"{"jsonrpc":"2.0","id":1,"result":null}"#;
        let parsed: JsonRpcResponse<RpcTransactionReceipt> = serde_json::from_str(body).unwrap();
        assert!(parsed.result.is_none());
        assert!(parsed.error.is_none());

        let body = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"invalid argument"}}"#;
        let parsed: JsonRpcResponse<RpcTransactionReceipt> = serde_json::from_str(body).unwrap();
        assert!(parsed.result.is_none());
        assert_eq!(parsed.error.unwrap().code, -32602);
    }

    fn sample_receipt() -> RpcTransactionReceipt {
        RpcTransactionReceipt {
            transaction_hash:
                "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b".to_string(),
            status: Some("0x1".to_string()),
            from: "0x742d35cc6634c0532925a3b844bc454e4438f44e".to_string(),
            to: Some("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".to_string()),
            logs: vec![RpcLog {
                address: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48".to_string(),
                topics: vec![
                    TRANSFER_TOPIC.to_string(),
                    "0x000000000000000000000000742d35cc6634c0532925a3b844bc454e4438f44e"
                        .to_string(),
                    "0x000000000000000000000000de0b295669a9fd93d5f28d9ec85e40f4cb697bae"
                        .to_string(),
                ],
                data: "0x00000000000000000000000000000000000000000000000000000000000001f4"
                    .to_string(),
            }],
            block_number: Some("0x12d687".to_string()),
        }
    }
}
