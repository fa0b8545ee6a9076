//! Execution engine for the Graph-RAG query pipeline.
//!
//! This crate provides the generic state-machine layer: a JSON state object
//! threaded through a directed graph of async nodes. Nodes return *partial*
//! updates; a [`StateSchema`](state::StateSchema) merges them under per-field
//! reducer rules (append-only for message history and the execution path,
//! last-write-wins for everything else).
//!
//! # Building blocks
//!
//! - [`StateGraph`] - mutable builder: nodes, direct edges, conditional
//!   routers, entry point
//! - [`Route`] - a router's verdict: one successor, a parallel fan-out, or
//!   the end of the run
//! - [`CompiledGraph`] - validated, executable form with `invoke` /
//!   `stream` entry points and optional checkpointing
//!
//! # Execution model
//!
//! Execution proceeds in supersteps. Every node in the current frontier runs
//! concurrently; their updates are merged in completion order; the merged
//! state is checkpointed; then each finished node's outgoing edge is
//! resolved against the new state to form the next frontier. A fan-out puts
//! several nodes into one frontier, and their shared successor naturally
//! joins them: it enters the next frontier exactly once.
//!
//! Dropping the future returned by `invoke` aborts all in-flight node tasks,
//! so request cancellation propagates into every live branch.

pub mod compiled;
pub mod error;
pub mod graph;
pub mod state;

pub use compiled::{CompiledGraph, StreamEvent};
pub use error::{PipelineError, Result};
pub use graph::{Route, StateGraph, END, START};
pub use pipeline_checkpoint::{CheckpointConfig, CheckpointSaver, InMemoryCheckpointSaver};
pub use state::{AppendReducer, OverwriteReducer, Reducer, StateSchema};
