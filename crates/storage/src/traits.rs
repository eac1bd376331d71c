use crate::{Checkpoint, Result};

/// Persists the relay's block cursor between runs.
pub trait CheckpointStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<Checkpoint>>;

    fn save(&self, key: &str, checkpoint: Checkpoint) -> Result<()>;

    fn clear(&self, key: &str) -> Result<()>;
}
