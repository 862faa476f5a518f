use crate::config::{ModelConfig, ModelVariant};
use crate::error::{AppError, Result};
use crate::metrics::ARTIFACT_LOADS_TOTAL;
use crate::ml::classifier::ClassifierArtifact;
use crate::ml::scorer::{Scorer, SequenceScorer, VectorizerScorer};
use crate::ml::onnx::OnnxSequenceModel;
use crate::ml::tokenizer::WordTokenizer;
use crate::ml::vectorizer::{TextVectorizer, VectorizerArtifact};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{error, info};

/// Loads the tokenizer and model artifacts on first use and keeps them for
/// the life of the process.
///
/// Concurrent callers during the first load wait on the same initialization.
/// A failed load leaves the cell empty so the next caller tries again.
pub struct ResourceLoader {
    config: ModelConfig,
    scorer: OnceCell<Arc<dyn Scorer>>,
}

impl ResourceLoader {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            scorer: OnceCell::new(),
        }
    }

    /// Loader that already holds a scorer and never touches the filesystem
    pub fn with_scorer(config: ModelConfig, scorer: Arc<dyn Scorer>) -> Self {
        Self {
            config,
            scorer: OnceCell::new_with(Some(scorer)),
        }
    }

    pub fn variant(&self) -> ModelVariant {
        self.config.variant
    }

    pub fn is_loaded(&self) -> bool {
        self.scorer.initialized()
    }

    /// Return the cached scorer, loading the artifacts if needed
    pub async fn ensure_loaded(&self) -> Result<Arc<dyn Scorer>> {
        self.scorer
            .get_or_try_init(|| self.load())
            .await
            .map(Arc::clone)
    }

    async fn load(&self) -> Result<Arc<dyn Scorer>> {
        let start = Instant::now();
        let config = self.config.clone();

        let outcome = tokio::task::spawn_blocking(move || build_scorer(&config))
            .await
            .map_err(|e| AppError::Internal(format!("artifact load task failed: {}", e)))
            .and_then(|result| result);

        match &outcome {
            Ok(_) => {
                ARTIFACT_LOADS_TOTAL.with_label_values(&["success"]).inc();
                info!(
                    variant = %self.config.variant,
                    tokenizer_path = %self.config.tokenizer_path.display(),
                    model_path = %self.config.model_path.display(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Artifacts loaded"
                );
            }
            Err(e) => {
                ARTIFACT_LOADS_TOTAL.with_label_values(&["failure"]).inc();
                error!(
                    variant = %self.config.variant,
                    error = %e,
                    "Failed to load artifacts"
                );
            }
        }

        outcome
    }
}

/// Read both artifacts and assemble the configured scorer
pub fn build_scorer(config: &ModelConfig) -> Result<Arc<dyn Scorer>> {
    let tokenizer_path = config.tokenizer_path.as_path();
    let model_path = config.model_path.as_path();

    match config.variant {
        ModelVariant::Vectorizer => {
            let artifact: VectorizerArtifact = read_artifact(tokenizer_path)?;
            let vectorizer =
                TextVectorizer::from_artifact(artifact).map_err(incompatible(tokenizer_path))?;

            let artifact: ClassifierArtifact = read_artifact(model_path)?;
            let classifier = artifact.build().map_err(incompatible(model_path))?;

            let scorer =
                VectorizerScorer::new(vectorizer, classifier).map_err(incompatible(model_path))?;
            Ok(Arc::new(scorer))
        }
        ModelVariant::Sequence => {
            let tokenizer: WordTokenizer = read_artifact(tokenizer_path)?;
            tokenizer.validate().map_err(incompatible(tokenizer_path))?;

            let model = OnnxSequenceModel::from_file(model_path, config.intra_threads)?;

            let scorer =
                SequenceScorer::new(tokenizer, Box::new(model), config.max_len, config.threshold)
                    .map_err(incompatible(model_path))?;
            Ok(Arc::new(scorer))
        }
    }
}

fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path).map_err(|e| AppError::artifact(path, e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| AppError::artifact(path, e.to_string()))
}

/// Attribute a validation failure to the artifact that caused it
fn incompatible(path: &Path) -> impl FnOnce(AppError) -> AppError + '_ {
    move |err| match err {
        AppError::Inference(message) => AppError::artifact(path, message),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_vectorizer_artifacts(dir: &TempDir) -> ModelConfig {
        let tokenizer_path = dir.path().join("tokenizer.json");
        let model_path = dir.path().join("model.json");
        fs::write(&tokenizer_path, r#"{"vocabulary": {"free": 0, "meeting": 1}}"#).unwrap();
        fs::write(
            &model_path,
            r#"{
                "kind": "multinomial_nb",
                "classes": ["ham", "spam"],
                "class_log_prior": [-0.6931, -0.6931],
                "feature_log_prob": [[-2.3, -0.1], [-0.1, -2.3]]
            }"#,
        )
        .unwrap();

        ModelConfig {
            tokenizer_path,
            model_path,
            ..ModelConfig::default()
        }
    }

    #[tokio::test]
    async fn test_lazy_load_and_cache() {
        let dir = TempDir::new().unwrap();
        let config = write_vectorizer_artifacts(&dir);
        let loader = ResourceLoader::new(config.clone());
        assert!(!loader.is_loaded());

        let first = loader.ensure_loaded().await.unwrap();
        assert!(loader.is_loaded());

        // Removing the files must not matter once loaded
        fs::remove_file(&config.tokenizer_path).unwrap();
        let second = loader.ensure_loaded().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.score("free").unwrap().label(), "spam");
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let dir = TempDir::new().unwrap();
        let config = ModelConfig {
            tokenizer_path: dir.path().join("tokenizer.json"),
            model_path: dir.path().join("model.json"),
            ..ModelConfig::default()
        };
        let loader = ResourceLoader::new(config);

        let err = loader.ensure_loaded().await.err().unwrap();
        assert!(matches!(err, AppError::ArtifactLoad { .. }));
        assert!(!loader.is_loaded());

        write_vectorizer_artifacts(&dir);
        assert!(loader.ensure_loaded().await.is_ok());
        assert!(loader.is_loaded());
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_share_one_scorer() {
        let dir = TempDir::new().unwrap();
        let loader = Arc::new(ResourceLoader::new(write_vectorizer_artifacts(&dir)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let loader = Arc::clone(&loader);
                tokio::spawn(async move { loader.ensure_loaded().await.unwrap() })
            })
            .collect();

        let mut scorers = Vec::new();
        for handle in handles {
            scorers.push(handle.await.unwrap());
        }
        assert!(scorers.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }

    #[test]
    fn test_corrupt_artifact_names_path() {
        let dir = TempDir::new().unwrap();
        let config = write_vectorizer_artifacts(&dir);
        fs::write(&config.model_path, "not json").unwrap();

        match build_scorer(&config) {
            Err(AppError::ArtifactLoad { path, .. }) => {
                assert!(path.ends_with("model.json"));
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("corrupt artifact loaded"),
        }
    }

    #[test]
    fn test_incompatible_shapes_are_load_errors() {
        let dir = TempDir::new().unwrap();
        let config = write_vectorizer_artifacts(&dir);
        fs::write(
            &config.model_path,
            r#"{"kind": "logistic_regression", "classes": [0, 1], "coef": [[1.0, 2.0, 3.0]], "intercept": [0.0]}"#,
        )
        .unwrap();

        assert!(matches!(
            build_scorer(&config),
            Err(AppError::ArtifactLoad { .. })
        ));
    }
}
