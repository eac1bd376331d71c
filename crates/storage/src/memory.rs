use parking_lot::RwLock;
use std::collections::HashMap;

use crate::{Checkpoint, CheckpointStore, Result};

/// Process-local store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    entries: RwLock<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self, key: &str) -> Result<Option<Checkpoint>> {
        Ok(self.entries.read().get(key).copied())
    }

    fn save(&self, key: &str, checkpoint: Checkpoint) -> Result<()> {
        self.entries.write().insert(key.to_string(), checkpoint);
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load() {
        let store = MemoryCheckpointStore::new();
        assert!(store.load("localhost/0x01").unwrap().is_none());

        store.save("localhost/0x01", Checkpoint::new(42)).unwrap();
        assert_eq!(store.load("localhost/0x01").unwrap().unwrap().next_block, 42);
        assert_eq!(store.len(), 1);

        store.clear("localhost/0x01").unwrap();
        assert!(store.is_empty());
    }
}
