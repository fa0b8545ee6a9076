//! Checkpoint data structures
//!
//! A [`Checkpoint`] is a full snapshot of the pipeline state after one
//! superstep. [`CheckpointConfig`] addresses a snapshot (thread id plus an
//! optional checkpoint id), and [`CheckpointMetadata`] records where in the
//! run the snapshot was taken.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Where a checkpoint came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointSource {
    /// Initial state written before the first superstep
    Input,
    /// Snapshot written by the execution loop after a superstep
    Loop,
    /// State patched from outside the run (e.g. an admin correction)
    Update,
}

/// A serialized snapshot of the pipeline state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Unique id of this snapshot
    pub id: String,

    /// When the snapshot was taken
    pub ts: DateTime<Utc>,

    /// The merged channel values (the full JSON state object)
    pub channel_values: Value,
}

impl Checkpoint {
    /// Create a checkpoint from the current state
    pub fn new(channel_values: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ts: Utc::now(),
            channel_values,
        }
    }
}

/// Addresses a checkpoint: which thread, and optionally which snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Conversation thread id (opaque session key)
    pub thread_id: String,

    /// Specific checkpoint to load; `None` means "latest"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<String>,
}

impl CheckpointConfig {
    /// Create a config addressing the latest checkpoint of a thread
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            checkpoint_id: None,
        }
    }

    /// Pin the config to a specific checkpoint id
    pub fn with_checkpoint_id(mut self, checkpoint_id: impl Into<String>) -> Self {
        self.checkpoint_id = Some(checkpoint_id.into());
        self
    }
}

/// Metadata recorded alongside each checkpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Origin of the snapshot
    pub source: CheckpointSource,

    /// Superstep counter (-1 for the input snapshot)
    pub step: i64,

    /// Names of the nodes whose writes produced this snapshot
    #[serde(default)]
    pub writes: Vec<String>,
}

impl CheckpointMetadata {
    /// Metadata for the initial input snapshot
    pub fn input() -> Self {
        Self {
            source: CheckpointSource::Input,
            step: -1,
            writes: Vec::new(),
        }
    }

    /// Metadata for a superstep snapshot
    pub fn step(step: i64, writes: Vec<String>) -> Self {
        Self {
            source: CheckpointSource::Loop,
            step,
            writes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checkpoint_new_assigns_id() {
        let a = Checkpoint::new(json!({"question": "q"}));
        let b = Checkpoint::new(json!({"question": "q"}));
        assert_ne!(a.id, b.id);
        assert_eq!(a.channel_values["question"], "q");
    }

    #[test]
    fn test_config_builder() {
        let config = CheckpointConfig::new("thread-1").with_checkpoint_id("cp-9");
        assert_eq!(config.thread_id, "thread-1");
        assert_eq!(config.checkpoint_id.as_deref(), Some("cp-9"));
    }

    #[test]
    fn test_metadata_constructors() {
        let input = CheckpointMetadata::input();
        assert_eq!(input.step, -1);
        assert_eq!(input.source, CheckpointSource::Input);

        let step = CheckpointMetadata::step(3, vec!["entity_resolver".into()]);
        assert_eq!(step.step, 3);
        assert_eq!(step.writes, vec!["entity_resolver".to_string()]);
    }
}
