//! Pipeline assembly and entry points
//!
//! [`GraphRagPipeline`] wires the nodes into the execution engine's DAG
//! with the conditional edges described in the crate docs, attaches the
//! in-memory checkpointer (conversation history per thread id) and
//! exposes the two entry points: [`run`](GraphRagPipeline::run) for a
//! complete turn and [`run_streaming`](GraphRagPipeline::run_streaming)
//! for per-node progress events.

use crate::config::Settings;
use crate::intents::Intent;
use crate::nodes::{
    into_node_fn, CacheCheckerNode, ClarificationHandlerNode, CommunitySummarizerNode,
    ConceptExpanderNode, CypherGeneratorNode, EntityExtractorNode, EntityResolverNode,
    GraphExecutorNode, IntentClassifierNode, OntologyUpdateHandlerNode, QueryDecomposerNode,
    ResponseGeneratorNode, SchemaFetcherNode,
};
use crate::state::{state_schema, EntityMap, PipelineState, ResolvedEntity};
use futures::{Stream, StreamExt};
use graph_store::{GraphRepository, QueryCacheRepository, SchemaCache};
use llm::LlmGateway;
use ontology::{OntologyLearner, OntologyRegistry, OntologyService};
use pipeline_core::{CheckpointConfig, CompiledGraph, InMemoryCheckpointSaver, Route, StateGraph, END};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Metadata about one pipeline run
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineMetadata {
    /// Classified intent
    pub intent: String,
    /// Classifier certainty
    pub intent_confidence: f64,
    /// Extracted entities
    pub entities: EntityMap,
    /// Resolution outcomes
    pub resolved_entities: Vec<ResolvedEntity>,
    /// The executed query
    pub cypher_query: String,
    /// Its parameters
    pub cypher_parameters: Map<String, Value>,
    /// Result row count
    pub result_count: i64,
    /// Node traversal log
    pub execution_path: Vec<String>,
    /// Informational error, when a stage degraded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    /// Whether the engine ran to completion
    pub success: bool,
    /// The question asked
    pub question: String,
    /// The user-visible answer
    pub response: String,
    /// Run metadata
    pub metadata: PipelineMetadata,
    /// Engine-level error on catastrophic failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One streamed progress event
#[derive(Debug, Clone, Serialize)]
pub struct PipelineEvent {
    /// Node that completed (or `"error"` for a terminal engine failure)
    pub node: String,
    /// The node's partial state update
    pub output: Value,
}

/// The assembled Graph-RAG pipeline
pub struct GraphRagPipeline {
    compiled: CompiledGraph,
}

impl GraphRagPipeline {
    /// Wire the pipeline from its components
    ///
    /// `query_cache` is only consulted when `settings.vector_search_enabled`
    /// is on; `learner` is optional (None disables the background loop).
    pub fn new(
        settings: &Settings,
        gateway: LlmGateway,
        repository: GraphRepository,
        schema_cache: Arc<SchemaCache>,
        registry: Arc<OntologyRegistry>,
        service: Arc<OntologyService>,
        learner: Option<Arc<OntologyLearner>>,
        query_cache: Option<QueryCacheRepository>,
    ) -> pipeline_core::Result<Self> {
        let cache_enabled = settings.vector_search_enabled && query_cache.is_some();
        let expansion_enabled = settings.concept_expansion_enabled;

        // The resolver's suffix-stripping strategy reads its suffix list
        // through the registry, so ontology refreshes reach it too.
        let repository = repository.with_suffix_source(registry.clone());

        let mut graph = StateGraph::with_schema(state_schema());

        graph.add_node(
            "intent_classifier",
            into_node_fn(Arc::new(IntentClassifierNode::new(gateway.clone()))),
        );
        graph.add_node(
            "entity_extractor",
            into_node_fn(Arc::new(EntityExtractorNode::new(gateway.clone()))),
        );
        graph.add_node(
            "schema_fetcher",
            into_node_fn(Arc::new(SchemaFetcherNode::new(schema_cache.clone()))),
        );
        graph.add_node(
            "entity_resolver",
            into_node_fn(Arc::new(EntityResolverNode::new(
                repository.clone(),
                learner,
            ))),
        );
        graph.add_node(
            "query_decomposer",
            into_node_fn(Arc::new(QueryDecomposerNode::new(gateway.clone()))),
        );
        graph.add_node(
            "cypher_generator",
            into_node_fn(Arc::new(CypherGeneratorNode::new(
                gateway.clone(),
                schema_cache,
                settings.cypher_light_model_enabled,
            ))),
        );
        graph.add_node(
            "graph_executor",
            into_node_fn(Arc::new(GraphExecutorNode::new(repository.clone()))),
        );
        graph.add_node(
            "community_summarizer",
            into_node_fn(Arc::new(CommunitySummarizerNode::new(
                gateway.clone(),
                repository.clone(),
            ))),
        );
        graph.add_node(
            "clarification_handler",
            into_node_fn(Arc::new(ClarificationHandlerNode::new(gateway.clone()))),
        );
        graph.add_node(
            "response_generator",
            into_node_fn(Arc::new(ResponseGeneratorNode::new(gateway.clone()))),
        );
        graph.add_node(
            "ontology_update_handler",
            into_node_fn(Arc::new(OntologyUpdateHandlerNode::new(
                gateway.clone(),
                service,
            ))),
        );

        if expansion_enabled {
            graph.add_node(
                "concept_expander",
                into_node_fn(Arc::new(ConceptExpanderNode::new(
                    registry,
                    settings.expansion_strategy,
                ))),
            );
        }

        if cache_enabled {
            let cache = query_cache.expect("cache_enabled implies query_cache");
            graph.add_node(
                "cache_checker",
                into_node_fn(Arc::new(CacheCheckerNode::new(
                    gateway.clone(),
                    cache,
                    true,
                ))),
            );
        }

        graph.set_entry_point("intent_classifier");

        // 1. After classification: terminal intents exit early; the rest
        //    go through the cache (when enabled) or straight to the
        //    parallel understanding phase.
        graph.add_conditional_edges("intent_classifier", move |state: &Value| {
            match state.get("intent").and_then(Value::as_str) {
                Some("unknown") | None => Route::Next("response_generator".into()),
                Some("ontology_update") => Route::Next("ontology_update_handler".into()),
                Some("global_analysis") => Route::Next("community_summarizer".into()),
                Some(_) if cache_enabled => Route::Next("cache_checker".into()),
                Some(_) => Route::Fanout(vec![
                    "entity_extractor".into(),
                    "schema_fetcher".into(),
                ]),
            }
        });

        // 2. After the cache check: a hit skips understanding entirely.
        if cache_enabled {
            graph.add_conditional_edges("cache_checker", |state: &Value| {
                if state
                    .get("skip_generation")
                    .and_then(Value::as_bool)
                    .unwrap_or(false)
                {
                    Route::Next("cypher_generator".into())
                } else {
                    Route::Fanout(vec![
                        "entity_extractor".into(),
                        "schema_fetcher".into(),
                    ])
                }
            });
        }

        // 3. Fan-in of the parallel pair, through expansion when enabled.
        if expansion_enabled {
            graph.add_edge("entity_extractor", "concept_expander");
            graph.add_edge("schema_fetcher", "concept_expander");
            graph.add_edge("concept_expander", "entity_resolver");
        } else {
            graph.add_edge("entity_extractor", "entity_resolver");
            graph.add_edge("schema_fetcher", "entity_resolver");
        }

        // 4. After resolution: errors exit, unresolved non-aggregate
        //    questions ask for clarification, multi-hop intents decompose.
        graph.add_conditional_edges("entity_resolver", |state: &Value| {
            if state.get("error").map(|e| !e.is_null()).unwrap_or(false) {
                return Route::Next("response_generator".into());
            }

            let intent = Intent::parse(
                state.get("intent").and_then(Value::as_str).unwrap_or("unknown"),
            );

            let has_unresolved = state
                .get("resolved_entities")
                .and_then(Value::as_array)
                .map(|entities| {
                    entities
                        .iter()
                        .any(|e| e.get("id").map(Value::is_null).unwrap_or(true))
                })
                .unwrap_or(false);

            if has_unresolved && !intent.is_aggregate() {
                return Route::Next("clarification_handler".into());
            }

            if intent.is_multi_hop() {
                Route::Next("query_decomposer".into())
            } else {
                Route::Next("cypher_generator".into())
            }
        });

        graph.add_edge("query_decomposer", "cypher_generator");

        // 5. After generation: an empty query cannot execute.
        graph.add_conditional_edges("cypher_generator", |state: &Value| {
            let has_query = state
                .get("cypher_query")
                .and_then(Value::as_str)
                .map(|q| !q.trim().is_empty())
                .unwrap_or(false);
            let errored = state.get("error").map(|e| !e.is_null()).unwrap_or(false);

            if errored || !has_query {
                Route::Next("response_generator".into())
            } else {
                Route::Next("graph_executor".into())
            }
        });

        graph.add_edge("graph_executor", "response_generator");

        // 6. Exit nodes.
        graph.add_edge("response_generator", END);
        graph.add_edge("clarification_handler", END);
        graph.add_edge("community_summarizer", END);
        graph.add_edge("ontology_update_handler", END);

        let compiled = graph
            .compile()?
            .with_checkpointer(Arc::new(InMemoryCheckpointSaver::new()));

        tracing::info!(
            cache_enabled,
            expansion_enabled,
            "GraphRagPipeline initialized"
        );

        Ok(Self { compiled })
    }

    /// Run one turn to completion
    #[tracing::instrument(skip(self, question), fields(session_id = session_id.unwrap_or("default")))]
    pub async fn run(&self, question: &str, session_id: Option<&str>) -> PipelineResult {
        tracing::info!(
            question = %question.chars().take(50).collect::<String>(),
            "Running pipeline"
        );

        let thread_id = session_id.unwrap_or("default");
        let initial = PipelineState::initial(question, session_id.unwrap_or(""));

        let outcome = self
            .compiled
            .invoke_with_config(
                initial.to_value(),
                Some(CheckpointConfig::new(thread_id)),
            )
            .await;

        match outcome {
            Ok(final_value) => {
                let state = PipelineState::from_value(&final_value).unwrap_or_default();
                PipelineResult {
                    success: true,
                    question: question.to_string(),
                    response: state.response.clone(),
                    metadata: PipelineMetadata {
                        intent: state
                            .intent
                            .map(|i| i.as_str().to_string())
                            .unwrap_or_else(|| "unknown".to_string()),
                        intent_confidence: state.intent_confidence,
                        entities: state.entities,
                        resolved_entities: state.resolved_entities,
                        cypher_query: state.cypher_query,
                        cypher_parameters: state.cypher_parameters,
                        result_count: state.result_count,
                        execution_path: state.execution_path,
                        error: state.error,
                    },
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Pipeline execution failed");
                PipelineResult {
                    success: false,
                    question: question.to_string(),
                    response: format!(
                        "죄송합니다. 질문을 처리하는 중 오류가 발생했습니다: {e}"
                    ),
                    metadata: PipelineMetadata::default(),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Run one turn, yielding each node's output as it completes
    ///
    /// A catastrophic engine failure arrives as a final event with
    /// `node == "error"` rather than terminating the stream abruptly.
    pub fn run_streaming<'a>(
        &'a self,
        question: &str,
        session_id: Option<&str>,
    ) -> impl Stream<Item = PipelineEvent> + Send + 'a {
        tracing::info!(
            question = %question.chars().take(50).collect::<String>(),
            "Running pipeline (streaming)"
        );

        let thread_id = session_id.unwrap_or("default").to_string();
        let initial = PipelineState::initial(question, session_id.unwrap_or(""));

        self.compiled
            .stream_with_config(initial.to_value(), Some(CheckpointConfig::new(thread_id)))
            .map(|event| PipelineEvent {
                node: event.node,
                output: event.output,
            })
    }

    /// The latest checkpointed state of a thread, if any
    pub async fn thread_state(
        &self,
        thread_id: &str,
    ) -> pipeline_core::Result<Option<PipelineState>> {
        let value = self
            .compiled
            .get_state(&CheckpointConfig::new(thread_id))
            .await?;
        Ok(value.and_then(|v| PipelineState::from_value(&v).ok()))
    }
}
