//! HTTP API handlers

pub mod monitor;
pub mod payments;
pub mod transactions;
pub mod webhooks;
