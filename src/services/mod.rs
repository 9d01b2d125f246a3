//! Services module for business logic

pub mod receipt_validator;
pub mod webhook_dispatcher;
pub mod webhook_verify;

pub use receipt_validator::{parse_amount, validate_payment, ExpectedPayment};
pub use webhook_dispatcher::{WebhookDispatcher, WebhookEvent, WebhookEventKind};
pub use webhook_verify::{sign_payload, verify_signature};
