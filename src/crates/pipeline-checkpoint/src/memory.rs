//! In-memory checkpoint storage
//!
//! [`InMemoryCheckpointSaver`] keeps all checkpoints in a thread-safe map,
//! one append-only history per thread id. It is the default backend for the
//! pipeline: conversation state survives across turns within one process and
//! is gone on restart, which is exactly the lifecycle the chat surface needs.
//! Tests use [`InMemoryCheckpointSaver::clear`] for isolation.

use crate::checkpoint::{Checkpoint, CheckpointConfig, CheckpointMetadata};
use crate::error::{CheckpointError, Result};
use crate::traits::{CheckpointSaver, CheckpointTuple, ThreadLocks};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::OwnedMutexGuard;

#[derive(Clone)]
struct Entry {
    checkpoint: Checkpoint,
    metadata: CheckpointMetadata,
    parent_id: Option<String>,
}

/// Thread-safe in-memory checkpoint backend
#[derive(Default)]
pub struct InMemoryCheckpointSaver {
    storage: Arc<RwLock<HashMap<String, Vec<Entry>>>>,
    locks: ThreadLocks,
}

impl InMemoryCheckpointSaver {
    /// Create an empty saver
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove all stored checkpoints (test isolation)
    pub fn clear(&self) {
        self.storage
            .write()
            .expect("checkpoint storage poisoned")
            .clear();
    }

    /// Number of checkpoints stored for a thread
    pub fn len(&self, thread_id: &str) -> usize {
        self.storage
            .read()
            .expect("checkpoint storage poisoned")
            .get(thread_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Whether a thread has no checkpoints
    pub fn is_empty(&self, thread_id: &str) -> bool {
        self.len(thread_id) == 0
    }

    fn tuple_from(&self, thread_id: &str, entry: &Entry) -> CheckpointTuple {
        CheckpointTuple {
            config: CheckpointConfig::new(thread_id).with_checkpoint_id(&entry.checkpoint.id),
            checkpoint: entry.checkpoint.clone(),
            metadata: entry.metadata.clone(),
            parent_config: entry
                .parent_id
                .as_ref()
                .map(|id| CheckpointConfig::new(thread_id).with_checkpoint_id(id)),
        }
    }
}

#[async_trait]
impl CheckpointSaver for InMemoryCheckpointSaver {
    async fn put(
        &self,
        config: &CheckpointConfig,
        checkpoint: Checkpoint,
        metadata: CheckpointMetadata,
    ) -> Result<CheckpointConfig> {
        let mut storage = self.storage.write().expect("checkpoint storage poisoned");
        let history = storage.entry(config.thread_id.clone()).or_default();

        let parent_id = history.last().map(|e| e.checkpoint.id.clone());
        let checkpoint_id = checkpoint.id.clone();

        history.push(Entry {
            checkpoint,
            metadata,
            parent_id,
        });

        Ok(CheckpointConfig::new(&config.thread_id).with_checkpoint_id(checkpoint_id))
    }

    async fn get_tuple(&self, config: &CheckpointConfig) -> Result<Option<CheckpointTuple>> {
        let storage = self.storage.read().expect("checkpoint storage poisoned");

        let Some(history) = storage.get(&config.thread_id) else {
            return Ok(None);
        };

        match &config.checkpoint_id {
            None => Ok(history
                .last()
                .map(|entry| self.tuple_from(&config.thread_id, entry))),
            Some(id) => match history.iter().find(|e| &e.checkpoint.id == id) {
                Some(entry) => Ok(Some(self.tuple_from(&config.thread_id, entry))),
                None => Err(CheckpointError::CheckpointNotFound {
                    thread_id: config.thread_id.clone(),
                    checkpoint_id: id.clone(),
                }),
            },
        }
    }

    async fn list(&self, thread_id: &str) -> Result<Vec<CheckpointTuple>> {
        let storage = self.storage.read().expect("checkpoint storage poisoned");

        Ok(storage
            .get(thread_id)
            .map(|history| {
                history
                    .iter()
                    .map(|entry| self.tuple_from(thread_id, entry))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn thread_lock(&self, thread_id: &str) -> OwnedMutexGuard<()> {
        self.locks.acquire(thread_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_put_and_get_latest() {
        let saver = InMemoryCheckpointSaver::new();
        let config = CheckpointConfig::new("thread-1");

        saver
            .put(
                &config,
                Checkpoint::new(json!({"step": 0})),
                CheckpointMetadata::input(),
            )
            .await
            .unwrap();
        saver
            .put(
                &config,
                Checkpoint::new(json!({"step": 1})),
                CheckpointMetadata::step(0, vec!["intent_classifier".into()]),
            )
            .await
            .unwrap();

        let tuple = saver.get_tuple(&config).await.unwrap().unwrap();
        assert_eq!(tuple.checkpoint.channel_values["step"], 1);
        assert!(tuple.parent_config.is_some());
    }

    #[tokio::test]
    async fn test_get_by_checkpoint_id() {
        let saver = InMemoryCheckpointSaver::new();
        let config = CheckpointConfig::new("thread-1");

        let saved = saver
            .put(
                &config,
                Checkpoint::new(json!({"step": 0})),
                CheckpointMetadata::input(),
            )
            .await
            .unwrap();

        let pinned = saver.get_tuple(&saved).await.unwrap().unwrap();
        assert_eq!(pinned.checkpoint.channel_values["step"], 0);
    }

    #[tokio::test]
    async fn test_threads_are_isolated() {
        let saver = InMemoryCheckpointSaver::new();

        saver
            .put(
                &CheckpointConfig::new("a"),
                Checkpoint::new(json!({"owner": "a"})),
                CheckpointMetadata::input(),
            )
            .await
            .unwrap();

        let other = saver
            .get_tuple(&CheckpointConfig::new("b"))
            .await
            .unwrap();
        assert!(other.is_none());
        assert_eq!(saver.len("a"), 1);
        assert_eq!(saver.len("b"), 0);
    }

    #[tokio::test]
    async fn test_list_is_oldest_first() {
        let saver = InMemoryCheckpointSaver::new();
        let config = CheckpointConfig::new("t");

        for step in 0..3 {
            saver
                .put(
                    &config,
                    Checkpoint::new(json!({"step": step})),
                    CheckpointMetadata::step(step, vec![]),
                )
                .await
                .unwrap();
        }

        let all = saver.list("t").await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].checkpoint.channel_values["step"], 0);
        assert_eq!(all[2].checkpoint.channel_values["step"], 2);
    }

    #[tokio::test]
    async fn test_clear() {
        let saver = InMemoryCheckpointSaver::new();
        saver
            .put(
                &CheckpointConfig::new("t"),
                Checkpoint::new(json!({})),
                CheckpointMetadata::input(),
            )
            .await
            .unwrap();

        saver.clear();
        assert!(saver.is_empty("t"));
    }
}
