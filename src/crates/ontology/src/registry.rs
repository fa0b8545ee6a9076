//! Registry: loader lifecycle and cache refresh
//!
//! One [`OntologyRegistry`] per process owns the active loader. Consumers
//! call [`get_loader`](OntologyRegistry::get_loader) on every operation so
//! that a refresh - triggered when an approved proposal lands - is visible
//! on the very next lookup. Refresh is serialised by an async mutex;
//! readers never take it, the loader pointer swap is atomic behind a
//! read-write lock.
//!
//! `refresh()` never fails the caller: a failure is logged and reported as
//! `false`.

use crate::hybrid::OntologyMode;
use crate::lookup::OntologyLookup;
use crate::yaml_loader::YamlOntologyLoader;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Owns the active [`OntologyLookup`] and serialises refreshes
pub struct OntologyRegistry {
    mode: OntologyMode,
    loader: RwLock<Arc<dyn OntologyLookup>>,
    refresh_lock: Mutex<()>,
    /// Directory for rebuilding the loader in file mode
    ontology_dir: Option<PathBuf>,
}

impl OntologyRegistry {
    /// Create a registry around an already-built loader
    pub fn new(mode: OntologyMode, loader: Arc<dyn OntologyLookup>) -> Self {
        tracing::info!(?mode, "OntologyRegistry initialized");
        Self {
            mode,
            loader: RwLock::new(loader),
            refresh_lock: Mutex::new(()),
            ontology_dir: None,
        }
    }

    /// Create a file-mode registry
    ///
    /// File mode remembers the directory so that a refresh can replace the
    /// loader instance entirely, forcing a re-parse on next access.
    pub fn new_file(ontology_dir: impl Into<PathBuf>) -> Self {
        let dir = ontology_dir.into();
        let loader: Arc<dyn OntologyLookup> = Arc::new(YamlOntologyLoader::new(&dir));
        tracing::info!(mode = ?OntologyMode::File, dir = %dir.display(), "OntologyRegistry initialized");
        Self {
            mode: OntologyMode::File,
            loader: RwLock::new(loader),
            refresh_lock: Mutex::new(()),
            ontology_dir: Some(dir),
        }
    }

    /// The active mode
    pub fn mode(&self) -> OntologyMode {
        self.mode
    }

    /// The current loader
    ///
    /// Non-blocking (a read lock around a pointer clone). Do not cache the
    /// result across operations.
    pub fn get_loader(&self) -> Arc<dyn OntologyLookup> {
        self.loader.read().clone()
    }

    /// Refresh the loader cache; returns whether the refresh succeeded
    ///
    /// Concurrent refreshes serialise on an internal mutex. Idempotent: N
    /// sequential refreshes with unchanged underlying data leave the loader
    /// in the same logical state as one.
    pub async fn refresh(&self) -> bool {
        let _serialised = self.refresh_lock.lock().await;

        match self.mode {
            OntologyMode::File => match &self.ontology_dir {
                Some(dir) => {
                    let fresh: Arc<dyn OntologyLookup> =
                        Arc::new(YamlOntologyLoader::new(dir));
                    *self.loader.write() = fresh;
                    tracing::info!("File ontology cache refreshed");
                    true
                }
                None => {
                    // Built from a pre-made loader; clearing its cache is
                    // the best available refresh.
                    let loader = self.loader.read().clone();
                    loader.clear_cache().await;
                    tracing::info!("Ontology loader cache cleared");
                    true
                }
            },
            OntologyMode::Graph | OntologyMode::Hybrid => {
                let loader = self.loader.read().clone();
                loader.clear_cache().await;
                tracing::info!(mode = ?self.mode, "Ontology cache refreshed");
                true
            }
        }
    }
}

/// The registry serves the active loader's suffix list to the graph store
///
/// Fetches the loader on every call, so a refresh that changes the
/// configured suffixes is visible on the next entity lookup.
#[async_trait]
impl graph_store::SuffixSource for OntologyRegistry {
    async fn korean_suffixes(&self) -> Vec<String> {
        self.get_loader().korean_suffixes().await
    }
}
