//! Classifier registry
//!
//! Resolves classifier names to loaded, shared classifiers. Models are read
//! from `<root>/<name>` the first time a name is referenced and kept for the
//! life of the registry. Concurrent first references to the same name share
//! one load; a failed load is not remembered and the next call retries.
//!
//! Author: hephaex@gmail.com

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use moka::future::Cache;
use thiserror::Error;

use crate::gazetteer::GazetteerLoader;
use crate::{EngineError, SequenceClassifier};

/// Classifier names documented for the NER service
pub const KNOWN_CLASSIFIERS: &[&str] = &[
    "english.all.3class.distsim.crf.ser.gz",
    "english.conll.4class.distsim.crf.ser.gz",
    "english.muc.7class.distsim.crf.ser.gz",
    "english.nowiki.3class.distsim.crf.ser.gz",
];

/// Registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("No such classifier: {0}")]
    NotFound(String),

    #[error("Unable to load classifier {name}: {message}")]
    Load { name: String, message: String },
}

/// Turns a model file into a classifier
///
/// Called on the blocking thread pool; implementations may do file I/O.
pub trait ClassifierLoader: Send + Sync {
    fn load(&self, name: &str, path: &Path) -> Result<Arc<dyn SequenceClassifier>, EngineError>;
}

// ============================================================================
// Registry
// ============================================================================

/// Lazily populated name -> classifier map
#[derive(Clone)]
pub struct ClassifierRegistry {
    root: PathBuf,
    loader: Arc<dyn ClassifierLoader>,
    cache: Cache<String, Arc<dyn SequenceClassifier>>,
    load_attempts: Arc<AtomicU64>,
}

impl ClassifierRegistry {
    /// Registry reading gazetteer models from `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_loader(root, Arc::new(GazetteerLoader))
    }

    pub fn with_loader(root: impl Into<PathBuf>, loader: Arc<dyn ClassifierLoader>) -> Self {
        Self {
            root: root.into(),
            loader,
            cache: Cache::builder().build(),
            load_attempts: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Return the classifier registered under `name`, loading it if needed
    pub async fn resolve(&self, name: &str) -> Result<Arc<dyn SequenceClassifier>, RegistryError> {
        if !is_valid_name(name) {
            return Err(RegistryError::NotFound(name.to_string()));
        }

        if let Some(classifier) = self.cache.get(name).await {
            return Ok(classifier);
        }

        let key = name.to_string();
        let path = self.root.join(name);
        let loader = Arc::clone(&self.loader);
        let attempts = Arc::clone(&self.load_attempts);

        self.cache
            .try_get_with(key.clone(), async move {
                attempts.fetch_add(1, Ordering::Relaxed);
                tracing::info!(classifier = %key, path = %path.display(), "Loading classifier");

                let name = key.clone();
                let loaded =
                    tokio::task::spawn_blocking(move || load_file(&*loader, &name, &path)).await;

                match loaded {
                    Ok(Ok(classifier)) => Ok(classifier),
                    Ok(Err(e)) => {
                        tracing::warn!(classifier = %key, error = %e, "Classifier load failed");
                        Err(e)
                    }
                    Err(e) => Err(RegistryError::Load {
                        name: key,
                        message: e.to_string(),
                    }),
                }
            })
            .await
            .map_err(|e: Arc<RegistryError>| (*e).clone())
    }

    /// True if `name` has been loaded; never triggers a load
    pub fn is_loaded(&self, name: &str) -> bool {
        self.cache.contains_key(name)
    }

    /// Names of loaded classifiers, sorted
    pub fn loaded_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.cache.iter().map(|(k, _)| k.to_string()).collect();
        names.sort();
        names
    }

    /// Number of loads started, successful or not
    pub fn load_attempts(&self) -> u64 {
        self.load_attempts.load(Ordering::Relaxed)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Documented classifier names with whether a model file exists for each
    pub fn available(&self) -> Vec<(&'static str, bool)> {
        KNOWN_CLASSIFIERS
            .iter()
            .map(|name| (*name, self.root.join(name).is_file()))
            .collect()
    }
}

impl std::fmt::Debug for ClassifierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierRegistry")
            .field("root", &self.root)
            .field("loaded", &self.cache.entry_count())
            .finish()
    }
}

/// Names are single path components
fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && !name.contains("..")
}

fn load_file(
    loader: &dyn ClassifierLoader,
    name: &str,
    path: &Path,
) -> Result<Arc<dyn SequenceClassifier>, RegistryError> {
    if !path.is_file() {
        return Err(RegistryError::NotFound(name.to_string()));
    }

    loader.load(name, path).map_err(|e| RegistryError::Load {
        name: name.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gazetteer::GazetteerClassifier;
    use crate::Token;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    const MODEL: &str = r#"{ "entries": { "Karen": "PERSON", "Paris": "LOCATION" } }"#;

    fn model_root(names: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in names {
            std::fs::write(dir.path().join(name), MODEL).unwrap();
        }
        dir
    }

    /// Loader that counts calls, optionally sleeping, and fails its first `failures` calls
    struct CountingLoader {
        calls: AtomicUsize,
        delay: Duration,
        failures: usize,
    }

    impl CountingLoader {
        fn new(delay: Duration, failures: usize) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                failures,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ClassifierLoader for CountingLoader {
        fn load(&self, name: &str, path: &Path) -> Result<Arc<dyn SequenceClassifier>, EngineError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            if call < self.failures {
                return Err(EngineError::MalformedModel {
                    path: path.to_path_buf(),
                    message: "truncated".to_string(),
                });
            }
            Ok(Arc::new(GazetteerClassifier::new(name, false)))
        }
    }

    #[tokio::test]
    async fn test_resolve_loads_and_classifies() {
        let root = model_root(&["english.all.3class.distsim.crf.ser.gz"]);
        let registry = ClassifierRegistry::new(root.path());

        let classifier = registry
            .resolve("english.all.3class.distsim.crf.ser.gz")
            .await
            .unwrap();
        let tagged = classifier.classify(&[Token::new("Karen", 0, 5)]).unwrap();

        assert_eq!(tagged[0].tag(), "PERSON");
        assert!(registry.is_loaded("english.all.3class.distsim.crf.ser.gz"));
    }

    #[tokio::test]
    async fn test_resolve_is_memoized() {
        let root = model_root(&["a.model"]);
        let registry = ClassifierRegistry::new(root.path());

        let first = registry.resolve("a.model").await.unwrap();
        let second = registry.resolve("a.model").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.load_attempts(), 1);
        assert_eq!(registry.loaded_names(), vec!["a.model".to_string()]);
    }

    #[tokio::test]
    async fn test_cached_lookup_does_no_io() {
        let root = model_root(&["a.model"]);
        let registry = ClassifierRegistry::new(root.path());
        registry.resolve("a.model").await.unwrap();

        std::fs::remove_file(root.path().join("a.model")).unwrap();

        assert!(registry.resolve("a.model").await.is_ok());
        assert_eq!(registry.load_attempts(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_references_share_one_load() {
        let root = model_root(&["shared.model"]);
        let loader = CountingLoader::new(Duration::from_millis(100), 0);
        let registry = ClassifierRegistry::with_loader(root.path(), loader.clone());

        let results = futures::future::join_all((0..8).map(|_| {
            let registry = registry.clone();
            async move { registry.resolve("shared.model").await }
        }))
        .await;

        assert_eq!(loader.calls(), 1);
        let first = results[0].as_ref().unwrap();
        for result in &results {
            assert!(Arc::ptr_eq(first, result.as_ref().unwrap()));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_references_share_one_failure() {
        let root = model_root(&["broken.model"]);
        let loader = CountingLoader::new(Duration::from_millis(100), usize::MAX);
        let registry = ClassifierRegistry::with_loader(root.path(), loader.clone());

        let results = futures::future::join_all((0..8).map(|_| {
            let registry = registry.clone();
            async move { registry.resolve("broken.model").await }
        }))
        .await;

        assert_eq!(loader.calls(), 1);
        let first = results[0].as_ref().unwrap_err();
        assert!(matches!(first, RegistryError::Load { name, .. } if name == "broken.model"));
        for result in &results {
            assert_eq!(result.as_ref().unwrap_err(), first);
        }
        assert!(!registry.is_loaded("broken.model"));

        assert!(registry.resolve("broken.model").await.is_err());
        assert_eq!(loader.calls(), 2);
    }

    #[tokio::test]
    async fn test_missing_model_is_not_found() {
        let root = model_root(&[]);
        let registry = ClassifierRegistry::new(root.path());

        let err = registry.resolve("nonexistent.model").await.unwrap_err();
        assert_eq!(err, RegistryError::NotFound("nonexistent.model".to_string()));
        assert_eq!(err.to_string(), "No such classifier: nonexistent.model");
        assert!(!registry.is_loaded("nonexistent.model"));
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let root = model_root(&["flaky.model"]);
        let loader = CountingLoader::new(Duration::ZERO, 1);
        let registry = ClassifierRegistry::with_loader(root.path(), loader.clone());

        let err = registry.resolve("flaky.model").await.unwrap_err();
        assert!(matches!(err, RegistryError::Load { .. }));
        assert!(!registry.is_loaded("flaky.model"));

        assert!(registry.resolve("flaky.model").await.is_ok());
        assert_eq!(loader.calls(), 2);
    }

    #[tokio::test]
    async fn test_malformed_model_is_load_error() {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("broken.model"), "{ nope").unwrap();
        let registry = ClassifierRegistry::new(root.path());

        let err = registry.resolve("broken.model").await.unwrap_err();
        assert!(matches!(err, RegistryError::Load { ref name, .. } if name == "broken.model"));
    }

    #[tokio::test]
    async fn test_path_like_names_are_rejected() {
        let root = model_root(&["a.model"]);
        let registry = ClassifierRegistry::new(root.path().join("sub"));

        for name in ["", "../a.model", "sub/a.model", "..", "a\\b"] {
            let err = registry.resolve(name).await.unwrap_err();
            assert!(matches!(err, RegistryError::NotFound(_)), "{name:?}");
        }
        assert_eq!(registry.load_attempts(), 0);
    }

    #[test]
    fn test_available_reports_existing_files() {
        let root = model_root(&["english.muc.7class.distsim.crf.ser.gz"]);
        let registry = ClassifierRegistry::new(root.path());

        let available = registry.available();
        assert_eq!(available.len(), KNOWN_CLASSIFIERS.len());
        assert!(available.contains(&("english.muc.7class.distsim.crf.ser.gz", true)));
        assert!(available.contains(&("english.all.3class.distsim.crf.ser.gz", false)));
    }
}
