//! Receipt validation for payment confirmation
//!
//! Pure decision logic: given a mined receipt and a payment's expected
//! terms, decide whether the payment landed. No I/O, no clock, no state.

use alloy_primitives::{b256, Address, B256, U256};

use crate::chains::traits::PaymentReceipt;

/// keccak256("Transfer(address,address,uint256)")
pub const TRANSFER_EVENT_TOPIC: B256 =
    b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");

/// Expected terms of a payment, taken from its button
#[derive(Debug, Clone)]
pub struct ExpectedPayment<'a> {
    /// Address the funds must arrive at
    pub recipient: &'a str,
    /// Minimum acceptable amount in the asset's smallest unit
    pub amount: U256,
    /// ERC-20 contract the transfer must come from; None for native asset
    pub token_address: Option<&'a str>,
}

/// Parse a base-10 smallest-unit amount string
pub fn parse_amount(raw: &str) -> Option<U256> {
    U256::from_str_radix(raw, 10).ok()
}

/// Decide whether a mined receipt satisfies the expected payment.
///
/// Over-payment is accepted; under-payment is not. A reverted receipt is
/// never valid regardless of its logs.
pub fn validate_payment(receipt: &PaymentReceipt, expected: &ExpectedPayment<'_>) -> bool {
    match expected.token_address {
        Some(token_address) => validate_token_transfer(
            receipt,
            expected.recipient,
            token_address,
            expected.amount,
        ),
        None => validate_native_transfer(receipt, expected.recipient, expected.amount),
    }
}

/// Native-asset path: success status, recipient match, value >= expected.
fn validate_native_transfer(receipt: &PaymentReceipt, recipient: &str, expected: U256) -> bool {
    if !receipt.successful {
        return false;
    }

    let to = match receipt.to.as_deref() {
        Some(to) => to,
        None => return false,
    };

    if !addresses_match(to, recipient) {
        return false;
    }

    receipt.value >= expected
}

/// Token path: scan the logs for a qualifying ERC-20 Transfer.
///
/// A log qualifies when it carries the canonical Transfer topic, was
/// emitted by the expected token contract, is addressed to the expected
/// recipient, and moves at least the expected amount. One qualifying log
/// is enough; amounts are never summed across logs.
fn validate_token_transfer(
    receipt: &PaymentReceipt,
    recipient: &str,
    token_address: &str,
    expected: U256,
) -> bool {
    if !receipt.successful {
        return false;
    }

    for log in &receipt.logs {
        // Transfer(address,address,uint256) has the signature plus two
        // indexed address topics; anything shorter cannot be decoded.
        if log.topics.len() < 3 || log.topics[0] != TRANSFER_EVENT_TOPIC {
            continue;
        }

        let to_address = format!("{:#x}", Address::from_word(log.topics[2]));
        if !addresses_match(&to_address, recipient) {
            continue;
        }

        if !addresses_match(&log.address, token_address) {
            continue;
        }

        if log.data.len() < 32 {
            continue;
        }

        let amount = U256::from_be_slice(&log.data[..32]);
        if amount >= expected {
            return true;
        }
    }

    false
}

/// Hex addresses compare equal regardless of checksum casing
fn addresses_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}
