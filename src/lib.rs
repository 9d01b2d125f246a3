//! CryptoPay backend library
//!
//! Merchant-facing crypto checkout backend. The core is the payment
//! confirmation and notification engine: per-intent transaction monitoring,
//! receipt validation, terminal state transitions, and signed webhook
//! delivery.

pub mod api;
pub mod chains;
pub mod config;
pub mod database;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod services;
pub mod workers;
