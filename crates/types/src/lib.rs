pub mod address;
pub mod bytes;
pub mod flight;
pub mod oracle;
pub mod status;

pub use address::Address;
pub use bytes::Bytes;
pub use flight::Flight;
pub use oracle::{LogPosition, OracleIdentity, OracleIndexes, OracleRequest};
pub use status::StatusCode;

pub use primitive_types::{H160, H256, U256};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypesError {
    #[error("Invalid hex string: {0}")]
    InvalidHex(String),

    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid address checksum")]
    InvalidChecksum,

    #[error("Unknown flight status code: {0}")]
    UnknownStatusCode(u64),
}

pub type Result<T> = std::result::Result<T, TypesError>;

/// Keccak-256 of `data`, the hash used for selectors, topics and checksums.
pub fn keccak256(data: &[u8]) -> H256 {
    use sha3::{Digest, Keccak256};

    H256::from_slice(&Keccak256::digest(data))
}
