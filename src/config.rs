//! Configuration module for the clustering engine.
//!
//! Layered configuration: defaults, then a TOML file, then environment
//! variable overrides.
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `HEADLINER_` and use
//! double underscores to separate nested levels:
//! - `HEADLINER_CLUSTERING__SIMILARITY_THRESHOLD=0.85`
//! - `HEADLINER_EMBEDDING__MODEL=MultilingualE5Small`
//! - `HEADLINER_CLUSTERING__ADAPTIVE_THRESHOLD=false`

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Base directory for persisted partition state
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Clustering algorithm settings
    #[serde(default)]
    pub clustering: ClusteringConfig,

    /// Embedding backend settings
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Hashtag labeling settings
    #[serde(default)]
    pub hashtag: HashtagConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClusteringConfig {
    /// Base similarity threshold; also the ceiling for the adaptive
    /// per-cluster threshold
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Enable the per-cluster adaptive threshold (τ = μ - k·σ)
    #[serde(default = "default_true")]
    pub adaptive_threshold: bool,

    /// Multiplier k applied to the running standard deviation
    #[serde(default = "default_adaptive_k")]
    pub adaptive_k: f32,

    /// Hard floor the adaptive threshold never drops below
    #[serde(default = "default_threshold_floor")]
    pub threshold_floor: f32,

    /// Minimum cluster size for inclusion in the final report
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// Embedding model identifier (fastembed model name)
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Batch size for model inference
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HashtagConfig {
    /// Number of representative (earliest) titles sent to the labeler
    #[serde(default = "default_max_titles")]
    pub max_titles: usize,

    /// Retries on malformed labeler responses before falling back
    #[serde(default = "default_label_retries")]
    pub retries: u32,

    /// Maximum label length; longer responses are truncated
    #[serde(default = "default_max_label_len")]
    pub max_len: usize,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_data_dir() -> PathBuf {
    PathBuf::from(".headliner/partitions")
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_similarity_threshold() -> f32 {
    0.88
}
fn default_adaptive_k() -> f32 {
    0.8
}
fn default_threshold_floor() -> f32 {
    0.6
}
fn default_min_cluster_size() -> usize {
    2
}
fn default_embedding_model() -> String {
    "ParaphraseMLMiniLML12V2".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_titles() -> usize {
    5
}
fn default_label_retries() -> u32 {
    2
}
fn default_max_label_len() -> usize {
    48
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            data_dir: default_data_dir(),
            debug: false,
            clustering: ClusteringConfig::default(),
            embedding: EmbeddingConfig::default(),
            hashtag: HashtagConfig::default(),
        }
    }
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            adaptive_threshold: true,
            adaptive_k: default_adaptive_k(),
            threshold_floor: default_threshold_floor(),
            min_cluster_size: default_min_cluster_size(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for HashtagConfig {
    fn default() -> Self {
        Self {
            max_titles: default_max_titles(),
            retries: default_label_retries(),
            max_len: default_max_label_len(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources.
    ///
    /// Precedence (lowest to highest): defaults, `settings.toml` (or the
    /// given path), `HEADLINER_`-prefixed environment variables.
    pub fn load(config_path: Option<&Path>) -> EngineResult<Self> {
        let toml_path = config_path.unwrap_or(Path::new("settings.toml"));

        let settings: Settings = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(toml_path))
            .merge(Env::prefixed("HEADLINER_").split("__"))
            .extract()
            .map_err(|e| EngineError::Config {
                reason: e.to_string(),
            })?;

        settings.validate()?;
        Ok(settings)
    }

    /// Sanity checks that figment cannot express.
    pub fn validate(&self) -> EngineResult<()> {
        let c = &self.clustering;
        if !(0.0..=1.0).contains(&c.similarity_threshold) {
            return Err(EngineError::Config {
                reason: format!(
                    "clustering.similarity_threshold must be in [0, 1], got {}",
                    c.similarity_threshold
                ),
            });
        }
        if !(0.0..=1.0).contains(&c.threshold_floor) {
            return Err(EngineError::Config {
                reason: format!(
                    "clustering.threshold_floor must be in [0, 1], got {}",
                    c.threshold_floor
                ),
            });
        }
        if c.threshold_floor > c.similarity_threshold {
            return Err(EngineError::Config {
                reason: format!(
                    "clustering.threshold_floor ({}) must not exceed similarity_threshold ({})",
                    c.threshold_floor, c.similarity_threshold
                ),
            });
        }
        if c.adaptive_k < 0.0 {
            return Err(EngineError::Config {
                reason: format!("clustering.adaptive_k must be non-negative, got {}", c.adaptive_k),
            });
        }
        if self.embedding.batch_size == 0 {
            return Err(EngineError::Config {
                reason: "embedding.batch_size must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
