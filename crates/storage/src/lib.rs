use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileCheckpointStore;
pub use memory::MemoryCheckpointStore;
pub use traits::CheckpointStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// The first block the relay has not yet processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub next_block: u64,
    /// Unix seconds of the last save
    pub updated_at: u64,
}

impl Checkpoint {
    pub fn new(next_block: u64) -> Self {
        let updated_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        Self {
            next_block,
            updated_at,
        }
    }
}

/// Checkpoint key for one contract on one network.
pub fn checkpoint_key(network: &str, contract: &str) -> String {
    format!("{}/{}", network, contract.to_lowercase())
}
