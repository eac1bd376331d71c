use flight_surety_types::H256;
use thiserror::Error;

pub mod client;
pub mod types;

pub use client::{normalize_endpoint, RpcClient, RpcClientConfig};
pub use types::*;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Transaction {0:?} reverted")]
    Reverted(H256),

    #[error("Timed out waiting for receipt of {0:?}")]
    ReceiptTimeout(H256),
}

impl RpcError {
    /// Whether the node reported an EVM revert rather than a transport or
    /// protocol failure.
    pub fn is_revert(&self) -> bool {
        match self {
            RpcError::Reverted(_) => true,
            RpcError::Rpc { message, .. } => message.to_lowercase().contains("revert"),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for RpcError {
    fn from(err: reqwest::Error) -> Self {
        RpcError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revert_detection() {
        let revert = RpcError::Rpc {
            code: -32000,
            message: "VM Exception while processing transaction: revert Flight or timestamp do not match oracle request".into(),
        };
        assert!(revert.is_revert());
        assert!(RpcError::Reverted(H256::zero()).is_revert());
        assert!(!RpcError::Transport("connection refused".into()).is_revert());
    }
}
