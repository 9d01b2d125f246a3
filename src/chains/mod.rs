pub mod evm;
pub mod traits;

pub use traits::{
    ChainClient, ChainClientPool, ChainError, ChainHealthStatus, ChainResult, PaymentReceipt,
    ReceiptLog, SupportedChain,
};
