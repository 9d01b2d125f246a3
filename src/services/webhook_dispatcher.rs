//! Webhook delivery to merchant endpoints
//!
//! Builds the event envelope for a terminal payment transition, signs it,
//! and delivers it with a single POST. Delivery is fire-and-log: the
//! outcome is reported as a boolean and never disturbs the already-written
//! terminal status. There is no retry queue; a retry worker could consume
//! the boolean result without touching the monitor.

use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::WebhookConfig;
use crate::database::button_repository::ButtonRepository;
use crate::database::merchant_repository::{Merchant, MerchantRepository};
use crate::database::payment_intent_repository::PaymentIntent;
use crate::services::webhook_verify::{sign_payload, SIGNATURE_PREFIX};

/// Header carrying `sha256=<hex digest>` over the request body
pub const SIGNATURE_HEADER: &str = "X-CryptoPay-Signature";
/// Header carrying the event kind
pub const EVENT_HEADER: &str = "X-CryptoPay-Event";

/// Terminal payment events a merchant can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookEventKind {
    PaymentConfirmed,
    PaymentFailed,
}

impl WebhookEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEventKind::PaymentConfirmed => "payment.confirmed",
            WebhookEventKind::PaymentFailed => "payment.failed",
        }
    }
}

impl std::fmt::Display for WebhookEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Event envelope delivered to the merchant.
///
/// Constructed fresh per delivery with a random id, serialized exactly
/// once; the signed bytes and the sent bytes are the same buffer.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookEvent {
    pub id: Uuid,
    pub event: String,
    pub data: WebhookEventData,
}

/// Public view of the payment intent at the moment of transition
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEventData {
    pub payment_intent_id: Uuid,
    pub button_id: Uuid,
    pub amount: String,
    pub token_address: Option<String>,
    pub chain_id: i64,
    pub merchant_address: String,
    pub customer_address: Option<String>,
    pub transaction_hash: Option<String>,
    pub created_at: String,
    pub confirmed_at: Option<String>,
}

impl WebhookEvent {
    pub fn for_intent(intent: &PaymentIntent, kind: WebhookEventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            event: kind.as_str().to_string(),
            data: WebhookEventData {
                payment_intent_id: intent.id,
                button_id: intent.button_id,
                amount: intent.amount.clone(),
                token_address: intent.token_address.clone(),
                chain_id: intent.chain_id,
                merchant_address: intent.merchant_address.clone(),
                customer_address: intent.customer_address.clone(),
                transaction_hash: intent.transaction_hash.clone(),
                created_at: intent.created_at.to_rfc3339(),
                confirmed_at: intent.confirmed_at.map(|at| at.to_rfc3339()),
            },
        }
    }
}

/// Dispatcher for signed merchant webhooks
pub struct WebhookDispatcher {
    http_client: Client,
    buttons: ButtonRepository,
    merchants: MerchantRepository,
    default_secret: String,
}

impl WebhookDispatcher {
    pub fn new(
        config: &WebhookConfig,
        buttons: ButtonRepository,
        merchants: MerchantRepository,
    ) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .pool_max_idle_per_host(10)
            .user_agent("CryptoPay-Webhook/1.0")
            .build()
            .unwrap_or_default();

        Self {
            http_client,
            buttons,
            merchants,
            default_secret: config.default_secret.clone(),
        }
    }

    /// Deliver a terminal-transition event to the intent's merchant.
    ///
    /// Returns true when the merchant's endpoint acknowledged with a 2xx,
    /// or when the merchant has no webhook URL configured (nothing to
    /// deliver is not a failure). All errors are caught and logged here;
    /// nothing propagates back into the monitor's transition.
    pub async fn dispatch(&self, intent: &PaymentIntent, kind: WebhookEventKind) -> bool {
        let merchant = match self.resolve_merchant(intent).await {
            Some(merchant) => merchant,
            None => return false,
        };

        let webhook_url = match merchant.webhook_url.as_deref() {
            Some(url) if !url.is_empty() => url,
            _ => {
                info!(
                    payment_intent_id = %intent.id,
                    merchant_id = %merchant.id,
                    event = %kind,
                    "no webhook URL configured, skipping delivery"
                );
                return true;
            }
        };

        let secret = merchant
            .webhook_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.default_secret);

        let event = WebhookEvent::for_intent(intent, kind);
        let body = match serde_json::to_vec(&event) {
            Ok(body) => body,
            Err(e) => {
                warn!(
                    payment_intent_id = %intent.id,
                    error = %e,
                    "failed to serialize webhook event"
                );
                return false;
            }
        };

        let signature = format!("{}{}", SIGNATURE_PREFIX, sign_payload(&body, secret));

        let result = self
            .http_client
            .post(webhook_url)
            .header("Content-Type", "application/json")
            .header(SIGNATURE_HEADER, signature)
            .header(EVENT_HEADER, kind.as_str())
            .body(body)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                info!(
                    payment_intent_id = %intent.id,
                    event_id = %event.id,
                    event = %kind,
                    status = response.status().as_u16(),
                    "webhook delivered"
                );
                true
            }
            Ok(response) => {
                warn!(
                    payment_intent_id = %intent.id,
                    event_id = %event.id,
                    event = %kind,
                    status = response.status().as_u16(),
                    "webhook endpoint returned non-success status"
                );
                false
            }
            Err(e) => {
                warn!(
                    payment_intent_id = %intent.id,
                    event_id = %event.id,
                    event = %kind,
                    error = %e,
                    "webhook delivery failed"
                );
                false
            }
        }
    }

    /// Walk intent -> button -> merchant to find the webhook subscriber
    async fn resolve_merchant(&self, intent: &PaymentIntent) -> Option<Merchant> {
        let button = match self.buttons.find_by_id(intent.button_id).await {
            Ok(Some(button)) => button,
            Ok(None) => {
                warn!(
                    payment_intent_id = %intent.id,
                    button_id = %intent.button_id,
                    "button not found while resolving webhook target"
                );
                return None;
            }
            Err(e) => {
                warn!(
                    payment_intent_id = %intent.id,
                    error = %e,
                    "failed to load button while resolving webhook target"
                );
                return None;
            }
        };

        match self.merchants.find_by_id(button.merchant_id).await {
            Ok(Some(merchant)) => Some(merchant),
            Ok(None) => {
                warn!(
                    payment_intent_id = %intent.id,
                    merchant_id = %button.merchant_id,
                    "merchant not found while resolving webhook target"
                );
                None
            }
            Err(e) => {
                warn!(
                    payment_intent_id = %intent.id,
                    error = %e,
                    "failed to load merchant while resolving webhook target"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::webhook_verify::verify_signature;

    #[test]
    fn event_kind_wire_names() {
        assert_eq!(WebhookEventKind::PaymentConfirmed.as_str(), "payment.confirmed");
        assert_eq!(WebhookEventKind::PaymentFailed.as_str(), "payment.failed");
    }

    #[test]
    fn envelope_mirrors_intent_fields() {
        let intent = sample_intent();
        let event = WebhookEvent::for_intent(&intent, WebhookEventKind::PaymentConfirmed);

        assert_eq!(event.event, "payment.confirmed");
        assert_eq!(event.data.payment_intent_id, intent.id);
        assert_eq!(event.data.amount, "1000000");
        assert_eq!(event.data.chain_id, 8453);
        assert_eq!(
            event.data.transaction_hash.as_deref(),
            intent.transaction_hash.as_deref()
        );
        assert!(event.data.confirmed_at.is_some());
    }

    #[test]
    fn each_envelope_gets_a_fresh_event_id() {
        let intent = sample_intent();
        let a = WebhookEvent::for_intent(&intent, WebhookEventKind::PaymentFailed);
        let b = WebhookEvent::for_intent(&intent, WebhookEventKind::PaymentFailed);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn envelope_serializes_with_camel_case_data_fields() {
        let intent = sample_intent();
        let event = WebhookEvent::for_intent(&intent, WebhookEventKind::PaymentConfirmed);
        let json = serde_json::to_value(&event).unwrap();

        assert!(json["data"]["paymentIntentId"].is_string());
        assert!(json["data"]["merchantAddress"].is_string());
        assert!(json["data"]["tokenAddress"].is_null());
        assert_eq!(json["event"], "payment.confirmed");
    }

    #[test]
    fn signed_bytes_verify_against_the_same_bytes() {
        let intent = sample_intent();
        let event = WebhookEvent::for_intent(&intent, WebhookEventKind::PaymentConfirmed);
        let body = serde_json::to_vec(&event).unwrap();
        let signature = format!("{}{}", SIGNATURE_PREFIX, sign_payload(&body, "secret"));

        assert!(verify_signature(&body, &signature, "secret"));
    }

    fn sample_intent() -> PaymentIntent {
        PaymentIntent {
            id: Uuid::new_v4(),
            button_id: Uuid::new_v4(),
            amount: "1000000".to_string(),
            token_address: None,
            chain_id: 8453,
            merchant_address: "0x742d35Cc6634C0532925a3b844Bc454e4438f44e".to_string(),
            customer_address: Some("0xde0B295669a9FD93d5F28D9Ec85E40f4cb697BAe".to_string()),
            transaction_hash: Some(
                "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b".to_string(),
            ),
            status: "confirmed".to_string(),
            created_at: chrono::Utc::now(),
            confirmed_at: Some(chrono::Utc::now()),
        }
    }
}
