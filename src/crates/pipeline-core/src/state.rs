//! State schema and reducers
//!
//! Pipeline state is a JSON object. Each node returns a partial update and
//! the schema decides, field by field, how that update merges into the
//! accumulated state: [`AppendReducer`] concatenates (message history,
//! execution path), [`OverwriteReducer`] replaces (everything else). Fields
//! without an explicit reducer fall back to overwrite, which keeps the
//! schema declaration short - only the append-only channels need naming.

use serde_json::Value;
use std::collections::HashMap;

use crate::error::{PipelineError, Result};

/// Merges one field's update into its current value
pub trait Reducer: Send + Sync {
    /// Combine `current` (possibly `Null` on first write) with `update`
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value>;

    /// Short name used in error messages
    fn name(&self) -> &str;
}

/// Last write wins
#[derive(Debug, Clone)]
pub struct OverwriteReducer;

impl Reducer for OverwriteReducer {
    fn reduce(&self, _current: &Value, update: &Value) -> Result<Value> {
        Ok(update.clone())
    }

    fn name(&self) -> &str {
        "overwrite"
    }
}

/// Append-only concatenation
///
/// Arrays concatenate; a scalar update is pushed as a single element; a
/// `Null` current value initialises the list. Anything else is a type error.
#[derive(Debug, Clone)]
pub struct AppendReducer;

impl Reducer for AppendReducer {
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value> {
        match (current, update) {
            (Value::Array(curr), Value::Array(upd)) => {
                let mut merged = curr.clone();
                merged.extend_from_slice(upd);
                Ok(Value::Array(merged))
            }
            (Value::Null, Value::Array(upd)) => Ok(Value::Array(upd.clone())),
            (Value::Array(curr), single) => {
                let mut merged = curr.clone();
                merged.push(single.clone());
                Ok(Value::Array(merged))
            }
            (Value::Null, single) => Ok(Value::Array(vec![single.clone()])),
            _ => Err(PipelineError::State(
                "append reducer requires array values".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "append"
    }
}

/// Field-to-reducer mapping applied on every node update
#[derive(Default)]
pub struct StateSchema {
    fields: HashMap<String, Box<dyn Reducer>>,
}

impl StateSchema {
    /// Create an empty schema (all fields overwrite)
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reducer for a field
    pub fn add_field(&mut self, field: impl Into<String>, reducer: Box<dyn Reducer>) {
        self.fields.insert(field.into(), reducer);
    }

    /// Builder-style variant of [`add_field`](Self::add_field)
    pub fn with_field(mut self, field: impl Into<String>, reducer: Box<dyn Reducer>) -> Self {
        self.add_field(field, reducer);
        self
    }

    /// Merge a partial update into `state` in place
    ///
    /// Both values must be JSON objects. Fields present in the update but
    /// absent from the schema are overwritten.
    pub fn apply(&self, state: &mut Value, update: &Value) -> Result<()> {
        let state_obj = state
            .as_object_mut()
            .ok_or_else(|| PipelineError::State("state must be an object".to_string()))?;

        let update_obj = update
            .as_object()
            .ok_or_else(|| PipelineError::State("update must be an object".to_string()))?;

        for (field, update_value) in update_obj {
            let current = state_obj.get(field).cloned().unwrap_or(Value::Null);

            let merged = match self.fields.get(field) {
                Some(reducer) => reducer.reduce(&current, update_value)?,
                None => update_value.clone(),
            };

            state_obj.insert(field.clone(), merged);
        }

        Ok(())
    }

    /// Names of explicitly configured fields
    pub fn fields(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }
}
