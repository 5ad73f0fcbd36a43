//! Embedding generation for article titles.
//!
//! Provides the trait and implementations for turning headline text into
//! fixed-length dense vectors. The production implementation uses
//! fastembed with a multilingual sentence-encoder model; tests substitute
//! a deterministic mock through the same trait.
//!
//! The loaded model is process-wide state with init-once semantics: the
//! first call to [`shared_generator`] pays the one-time load cost, every
//! later call reuses the cached instance.

use std::sync::{Arc, Mutex, OnceLock};

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use thiserror::Error;

use crate::config::EmbeddingConfig;
use crate::types::{VECTOR_DIMENSION_384, VectorDimension, VectorError};

/// Errors raised by embedding generation.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Cannot embed empty or whitespace-only text")]
    EmptyInput,

    #[error(
        "Embedding backend unavailable: {0}\nSuggestion: First-time model download needs network access"
    )]
    Backend(String),

    #[error("Unknown embedding model '{0}'\nSuggestion: Supported models: {supported}", supported = SUPPORTED_MODELS.join(", "))]
    UnknownModel(String),

    #[error("Embedding model lock poisoned, likely due to a panic in another thread")]
    ModelLock,

    #[error(transparent)]
    Vector(#[from] VectorError),
}

/// Model names accepted in configuration.
pub const SUPPORTED_MODELS: &[&str] = &[
    "ParaphraseMLMiniLML12V2",
    "MultilingualE5Small",
    "AllMiniLML6V2",
];

/// Maps a configured model name to a fastembed model.
///
/// All supported models produce 384-dimensional embeddings, so a model
/// switch never invalidates the persisted vector table layout (it does
/// invalidate the vectors themselves, which is caught by the model name
/// recorded in partition metadata).
pub fn parse_embedding_model(name: &str) -> Result<EmbeddingModel, EmbeddingError> {
    match name {
        "ParaphraseMLMiniLML12V2" => Ok(EmbeddingModel::ParaphraseMLMiniLML12V2),
        "MultilingualE5Small" => Ok(EmbeddingModel::MultilingualE5Small),
        "AllMiniLML6V2" => Ok(EmbeddingModel::AllMiniLML6V2),
        other => Err(EmbeddingError::UnknownModel(other.to_string())),
    }
}

/// Trait for generating embeddings from text.
///
/// Implementations must be thread-safe and deterministic for identical
/// input and model version. Returned vectors are L2-normalized so cosine
/// similarity reduces to a dot product.
pub trait EmbeddingGenerator: Send + Sync {
    /// Generate embeddings for multiple texts, one vector per input.
    ///
    /// Rejects empty or whitespace-only entries with
    /// [`EmbeddingError::EmptyInput`] rather than silently producing a
    /// zero vector.
    fn embed_many(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Generate an embedding for a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_many(&[text])?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::Backend("model returned no embedding".to_string()))
    }

    /// Dimension of embeddings produced by this generator.
    #[must_use]
    fn dimension(&self) -> VectorDimension;
}

/// FastEmbed implementation over a multilingual sentence encoder.
///
/// The model handle lives behind a `Mutex` because fastembed's `embed`
/// takes `&mut self`; the generator itself is shared via `Arc`.
pub struct FastEmbedGenerator {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimension: VectorDimension,
}

impl std::fmt::Debug for FastEmbedGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedGenerator")
            .field("model", &self.model_name)
            .field("dimension", &self.dimension.get())
            .finish()
    }
}

impl FastEmbedGenerator {
    /// Create a generator, loading (and on first use downloading) the
    /// configured model.
    ///
    /// # Errors
    /// Returns [`EmbeddingError::Backend`] if the model cannot be
    /// initialized. This is fatal for the run; retrying is a deployment
    /// concern, not this component's.
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let model_kind = parse_embedding_model(&config.model)?;
        let model = TextEmbedding::try_new(
            InitOptions::new(model_kind)
                .with_cache_dir(crate::init::models_dir())
                .with_show_download_progress(false),
        )
        .map_err(|e| EmbeddingError::Backend(format!("failed to initialize model: {e}")))?;

        Ok(Self {
            model: Mutex::new(model),
            model_name: config.model.clone(),
            dimension: VectorDimension::dimension_384(),
        })
    }

    /// Name of the loaded model, as configured.
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

impl EmbeddingGenerator for FastEmbedGenerator {
    fn embed_many(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::EmptyInput);
        }

        let text_strings: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();

        let mut embeddings = self
            .model
            .lock()
            .map_err(|_| EmbeddingError::ModelLock)?
            .embed(text_strings, None)
            .map_err(|e| EmbeddingError::Backend(format!("failed to generate embeddings: {e}")))?;

        for embedding in embeddings.iter_mut() {
            if embedding.len() != VECTOR_DIMENSION_384 {
                return Err(VectorError::DimensionMismatch {
                    expected: VECTOR_DIMENSION_384,
                    actual: embedding.len(),
                }
                .into());
            }
            normalize(embedding);
        }

        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }
}

static SHARED_GENERATOR: OnceLock<Arc<FastEmbedGenerator>> = OnceLock::new();

/// Process-wide generator instance with init-once semantics.
///
/// The first caller's configuration wins; later calls with a different
/// model name receive the already-initialized instance. Runs are
/// single-partition processes, so this never mixes models in practice.
pub fn shared_generator(config: &EmbeddingConfig) -> Result<Arc<FastEmbedGenerator>, EmbeddingError> {
    if let Some(generator) = SHARED_GENERATOR.get() {
        return Ok(Arc::clone(generator));
    }
    let generator = Arc::new(FastEmbedGenerator::new(config)?);
    Ok(Arc::clone(SHARED_GENERATOR.get_or_init(|| generator)))
}

/// Normalizes a vector in-place to unit length.
pub(crate) fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-10 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
    // A degenerate zero vector stays as-is rather than dividing by ~0.
}

/// Mock embedding generator for unit tests.
///
/// Produces deterministic embeddings from keyword buckets so tests can
/// steer similarity without a model download.
#[cfg(test)]
pub struct MockEmbeddingGenerator {
    dimension: VectorDimension,
}

#[cfg(test)]
impl Default for MockEmbeddingGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl MockEmbeddingGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            dimension: VectorDimension::dimension_384(),
        }
    }
}

#[cfg(test)]
impl EmbeddingGenerator for MockEmbeddingGenerator {
    fn embed_many(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(EmbeddingError::EmptyInput);
        }

        let dim = self.dimension.get();
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            let mut embedding = vec![0.05; dim];
            let lower = text.to_lowercase();
            if lower.contains("earthquake") || lower.contains("quake") {
                embedding[0] = 0.9;
                embedding[1] = 0.8;
            }
            if lower.contains("election") || lower.contains("vote") {
                embedding[2] = 0.9;
                embedding[3] = 0.8;
            }
            if lower.contains("market") || lower.contains("stocks") {
                embedding[4] = 0.9;
                embedding[5] = 0.8;
            }
            normalize(&mut embedding);
            embeddings.push(embedding);
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_embeddings_are_normalized() {
        let generator = MockEmbeddingGenerator::new();
        let embeddings = generator
            .embed_many(&["Earthquake strikes northern coast"])
            .unwrap();
        assert_eq!(embeddings.len(), 1);
        assert_eq!(embeddings[0].len(), VECTOR_DIMENSION_384);

        let magnitude: f32 = embeddings[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_mock_is_deterministic() {
        let generator = MockEmbeddingGenerator::new();
        let a = generator.embed("Votes counted in election").unwrap();
        let b = generator.embed("Votes counted in election").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_input_rejected() {
        let generator = MockEmbeddingGenerator::new();
        assert!(matches!(
            generator.embed_many(&["ok", "   "]),
            Err(EmbeddingError::EmptyInput)
        ));
        assert!(matches!(
            generator.embed(""),
            Err(EmbeddingError::EmptyInput)
        ));
    }

    #[test]
    fn test_parse_embedding_model() {
        assert!(parse_embedding_model("ParaphraseMLMiniLML12V2").is_ok());
        assert!(parse_embedding_model("MultilingualE5Small").is_ok());
        assert!(matches!(
            parse_embedding_model("nonsense"),
            Err(EmbeddingError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_normalize_vector() {
        let mut vector = vec![3.0, 4.0];
        normalize(&mut vector);
        assert!((vector[0] - 0.6).abs() < f32::EPSILON);
        assert!((vector[1] - 0.8).abs() < f32::EPSILON);
    }
}
