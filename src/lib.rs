//! Incremental semantic clustering of news headlines.
//!
//! Headlines covering the same real-world event are grouped into named
//! clusters by an online nearest-neighbor pass over sentence embeddings,
//! gated by a per-cluster adaptive threshold. State persists per
//! (date, category) partition so repeated runs extend clusters
//! incrementally.

pub mod article;
pub mod cluster;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod hashtag;
pub mod index;
pub mod init;
pub mod report;
pub mod storage;
pub mod types;

// Explicit exports for better API clarity
pub use article::{Article, ArticleRecord, RecordError};
pub use cluster::{Admission, Cluster, ClusterManager, ClusterStore, SimilarityStats, ThresholdPolicy};
pub use config::Settings;
pub use embedding::{EmbeddingError, EmbeddingGenerator, FastEmbedGenerator, shared_generator};
pub use engine::ClusteringEngine;
pub use error::{EngineError, EngineResult, ErrorContext};
pub use hashtag::{HashtagGenerator, LabelAdapter, LabelError, TruncatedTitleGenerator};
pub use index::SimilarityIndex;
pub use report::{ClusterReport, IngestCounts};
pub use storage::{PartitionStorage, StorageError};
pub use types::{ArticleId, ClusterId, Partition, Score, VectorDimension, VectorError};
