//! Hybrid loader and ontology mode selection
//!
//! [`OntologyMode`] picks the backing store:
//!
//! - `File` - YAML only
//! - `Graph` - Concept nodes only
//! - `Hybrid` - graph first, YAML fallback when the graph errors or knows
//!   nothing about the term

use crate::lookup::OntologyLookup;
use crate::{GraphOntologyLoader, YamlOntologyLoader};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Which ontology backend is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OntologyMode {
    /// YAML files only
    #[default]
    File,
    /// Concept graph only
    Graph,
    /// Graph with file fallback
    Hybrid,
}

impl std::str::FromStr for OntologyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "file" | "yaml" => Ok(Self::File),
            "graph" | "neo4j" => Ok(Self::Graph),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(format!("unknown ontology mode '{other}'")),
        }
    }
}

/// Graph-first loader with YAML fallback
pub struct HybridOntologyLoader {
    graph: GraphOntologyLoader,
    file: YamlOntologyLoader,
}

impl HybridOntologyLoader {
    /// Combine a graph loader with a file fallback
    pub fn new(graph: GraphOntologyLoader, file: YamlOntologyLoader) -> Self {
        Self { graph, file }
    }
}

#[async_trait]
impl OntologyLookup for HybridOntologyLoader {
    async fn get_canonical(&self, term: &str, category: &str) -> String {
        let from_graph = self.graph.get_canonical(term, category).await;
        if from_graph != term {
            return from_graph;
        }
        // Identity result: the graph knows nothing; the files might.
        self.file.get_canonical(term, category).await
    }

    async fn get_synonyms(&self, term: &str, category: &str) -> Vec<String> {
        let from_graph = self.graph.get_synonyms(term, category).await;
        if from_graph.len() > 1 || from_graph.first().map(String::as_str) != Some(term) {
            return from_graph;
        }
        self.file.get_synonyms(term, category).await
    }

    async fn get_children(&self, concept: &str, category: &str) -> Vec<String> {
        let from_graph = self.graph.get_children(concept, category).await;
        if !from_graph.is_empty() {
            return from_graph;
        }
        self.file.get_children(concept, category).await
    }

    async fn list_concepts(&self, category: &str, limit: usize) -> Vec<String> {
        // The file catalogue is enumerable; the graph loader is not.
        self.file.list_concepts(category, limit).await
    }

    async fn korean_suffixes(&self) -> Vec<String> {
        // Suffixes are configured in the ontology files.
        self.file.korean_suffixes().await
    }

    async fn clear_cache(&self) {
        self.graph.clear_cache().await;
        self.file.clear_cache().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use graph_store::{QueryRunner, Result as StoreResult};
    use serde_json::Value;
    use std::sync::Arc;

    /// A graph that always errors, forcing the YAML fallback
    struct DownRunner;

    #[async_trait]
    impl QueryRunner for DownRunner {
        async fn run(&self, _cypher: &str, _params: Value) -> StoreResult<Vec<Value>> {
            Err(graph_store::GraphStoreError::Connectivity(
                "connection refused".to_string(),
            ))
        }

        async fn run_write(&self, _cypher: &str, _params: Value) -> StoreResult<Vec<Value>> {
            Err(graph_store::GraphStoreError::Connectivity(
                "connection refused".to_string(),
            ))
        }
    }

    const SYNONYMS: &str = r#"
skills:
  Python:
    canonical: Python
    aliases: [파이썬]
"#;

    fn hybrid() -> HybridOntologyLoader {
        HybridOntologyLoader::new(
            GraphOntologyLoader::new(Arc::new(DownRunner)),
            YamlOntologyLoader::from_strings("", SYNONYMS),
        )
    }

    #[tokio::test]
    async fn test_falls_back_to_file_when_graph_is_down() {
        assert_eq!(hybrid().get_canonical("파이썬", "skills").await, "Python");
    }

    #[tokio::test]
    async fn test_synonyms_fall_back() {
        let group = hybrid().get_synonyms("파이썬", "skills").await;
        assert!(group.contains(&"Python".to_string()));
    }

    #[test]
    fn test_mode_parsing() {
        use std::str::FromStr;
        assert_eq!(OntologyMode::from_str("file").unwrap(), OntologyMode::File);
        assert_eq!(OntologyMode::from_str("yaml").unwrap(), OntologyMode::File);
        assert_eq!(OntologyMode::from_str("graph").unwrap(), OntologyMode::Graph);
        assert_eq!(
            OntologyMode::from_str("HYBRID").unwrap(),
            OntologyMode::Hybrid
        );
        assert!(OntologyMode::from_str("other").is_err());
    }
}
