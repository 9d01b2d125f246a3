//! Background task components

pub mod transaction_monitor;

pub use transaction_monitor::{MonitorError, MonitorRegistry, TransactionMonitor};
