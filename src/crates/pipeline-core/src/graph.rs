//! Graph builder
//!
//! [`StateGraph`] collects nodes, edges and routers, then [`compile`]s into
//! an executable [`CompiledGraph`](crate::compiled::CompiledGraph). Each node
//! has at most one outgoing plan: either a direct edge or a conditional
//! router. Fan-in is implicit - several nodes pointing at the same successor
//! put it into the next frontier exactly once.

use crate::compiled::CompiledGraph;
use crate::error::{PipelineError, Result};
use crate::state::StateSchema;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Virtual entry marker
pub const START: &str = "__start__";

/// Virtual terminal marker
pub const END: &str = "__end__";

/// Boxed future returned by a node
pub type NodeFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// A node: async function from the full state to a partial update
pub type NodeFn = Arc<dyn Fn(Value) -> NodeFuture + Send + Sync>;

/// A conditional router's verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Continue with a single successor
    Next(String),
    /// Dispatch several successors in parallel (structured fan-out)
    Fanout(Vec<String>),
    /// Terminate the run
    End,
}

impl Route {
    /// Successor names carried by this route (empty for [`Route::End`])
    pub fn targets(&self) -> Vec<&str> {
        match self {
            Route::Next(name) => vec![name.as_str()],
            Route::Fanout(names) => names.iter().map(String::as_str).collect(),
            Route::End => Vec::new(),
        }
    }
}

/// Conditional edge: inspects the merged state, picks the next node(s)
pub type RouterFn = Arc<dyn Fn(&Value) -> Route + Send + Sync>;

/// Outgoing plan of a node
#[derive(Clone)]
pub(crate) enum EdgePlan {
    Direct(String),
    Conditional(RouterFn),
}

/// Mutable graph builder
#[derive(Default)]
pub struct StateGraph {
    pub(crate) nodes: HashMap<String, NodeFn>,
    pub(crate) edges: HashMap<String, EdgePlan>,
    pub(crate) entry_point: Option<String>,
    pub(crate) schema: StateSchema,
}

impl StateGraph {
    /// Create an empty graph with an all-overwrite schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a graph with an explicit state schema
    pub fn with_schema(schema: StateSchema) -> Self {
        Self {
            schema,
            ..Self::default()
        }
    }

    /// Register a node
    ///
    /// `f` receives a clone of the merged state and returns a partial
    /// update. Registering the same name twice replaces the earlier node.
    pub fn add_node<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(Value) -> NodeFuture + Send + Sync + 'static,
    {
        self.nodes.insert(name.into(), Arc::new(f));
        self
    }

    /// Add an unconditional edge `from -> to`
    ///
    /// `to` may be [`END`]. `from` must not already carry a conditional
    /// router; the later call wins (validated at compile time instead of
    /// panicking here).
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) -> &mut Self {
        let from = from.into();
        let to = to.into();
        if from == START {
            self.entry_point = Some(to);
        } else {
            self.edges.insert(from, EdgePlan::Direct(to));
        }
        self
    }

    /// Add a conditional edge: `router` picks the successor(s) from state
    pub fn add_conditional_edges<F>(&mut self, from: impl Into<String>, router: F) -> &mut Self
    where
        F: Fn(&Value) -> Route + Send + Sync + 'static,
    {
        self.edges
            .insert(from.into(), EdgePlan::Conditional(Arc::new(router)));
        self
    }

    /// Set the entry node (equivalent to `add_edge(START, name)`)
    pub fn set_entry_point(&mut self, name: impl Into<String>) -> &mut Self {
        self.entry_point = Some(name.into());
        self
    }

    /// Validate the structure and produce an executable graph
    ///
    /// # Errors
    ///
    /// [`PipelineError::Validation`] when the entry point is missing or any
    /// direct edge references an unknown node.
    pub fn compile(self) -> Result<CompiledGraph> {
        let entry = self
            .entry_point
            .clone()
            .ok_or_else(|| PipelineError::Validation("no entry point set".to_string()))?;

        if !self.nodes.contains_key(&entry) {
            return Err(PipelineError::Validation(format!(
                "entry point '{entry}' is not a node"
            )));
        }

        for (from, plan) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(PipelineError::Validation(format!(
                    "edge source '{from}' is not a node"
                )));
            }
            if let EdgePlan::Direct(to) = plan {
                if to != END && !self.nodes.contains_key(to) {
                    return Err(PipelineError::Validation(format!(
                        "edge target '{to}' is not a node"
                    )));
                }
            }
        }

        Ok(CompiledGraph::new(self, entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop(name: &'static str) -> impl Fn(Value) -> NodeFuture + Send + Sync {
        move |_state| Box::pin(async move { Ok(json!({ "last": name })) })
    }

    #[test]
    fn test_compile_requires_entry_point() {
        let mut graph = StateGraph::new();
        graph.add_node("a", noop("a"));
        assert!(matches!(
            graph.compile(),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn test_compile_rejects_unknown_edge_target() {
        let mut graph = StateGraph::new();
        graph.add_node("a", noop("a"));
        graph.set_entry_point("a");
        graph.add_edge("a", "missing");
        assert!(matches!(
            graph.compile(),
            Err(PipelineError::Validation(_))
        ));
    }

    #[test]
    fn test_compile_accepts_end_target() {
        let mut graph = StateGraph::new();
        graph.add_node("a", noop("a"));
        graph.set_entry_point("a");
        graph.add_edge("a", END);
        assert!(graph.compile().is_ok());
    }

    #[test]
    fn test_start_edge_sets_entry() {
        let mut graph = StateGraph::new();
        graph.add_node("a", noop("a"));
        graph.add_edge(START, "a");
        graph.add_edge("a", END);
        assert!(graph.compile().is_ok());
    }

    #[test]
    fn test_route_targets() {
        assert_eq!(Route::Next("a".into()).targets(), vec!["a"]);
        assert_eq!(
            Route::Fanout(vec!["a".into(), "b".into()]).targets(),
            vec!["a", "b"]
        );
        assert!(Route::End.targets().is_empty());
    }
}
