//! Partitioned persistence for the similarity index and cluster store.
//!
//! Each (date, category) partition owns one directory:
//! - `meta.json`    — schema version, model name, dimension, counts
//! - `vectors.bin`  — the embedding table in a raw little-endian format
//! - `clusters.json` — cluster membership and running statistics
//!
//! # Vector file format
//!
//! A 16-byte header (magic, format version, dimension, vector count)
//! followed by contiguous records of article id + f32 values, all
//! little-endian. Reads go through a memory map so reloads stay cheap
//! even when the OS page cache is cold.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use memmap2::{Mmap, MmapOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::cluster::{Cluster, ClusterManager, ClusterStore, ThresholdPolicy};
use crate::error::EngineResult;
use crate::index::SimilarityIndex;
use crate::types::{ArticleId, Partition, VectorDimension, VectorError};

/// Version tag shared by all files in a partition bundle.
pub const SCHEMA_VERSION: u32 = 1;

/// Magic bytes identifying a vector table file.
const VECTOR_MAGIC: &[u8; 4] = b"HVEC";

/// Size of the vector file header in bytes.
const HEADER_SIZE: usize = 16;

const BYTES_PER_F32: usize = 4;
const BYTES_PER_ID: usize = 4;

const META_FILE: &str = "meta.json";
const VECTORS_FILE: &str = "vectors.bin";
const CLUSTERS_FILE: &str = "clusters.json";

/// Errors specific to partition persistence.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(
        "Persisted partition state is corrupt: {0}\nSuggestion: Delete the partition directory and re-run to rebuild from raw articles"
    )]
    Corrupt(String),

    #[error(
        "Persisted schema version mismatch: expected {expected}, got {actual}\nSuggestion: Rebuild the partition with the current version"
    )]
    VersionMismatch { expected: u32, actual: u32 },

    #[error(transparent)]
    Vector(#[from] VectorError),
}

/// Partition metadata, written beside the vector table.
#[derive(Debug, Serialize, Deserialize)]
struct PartitionMeta {
    schema_version: u32,
    model: String,
    dimension: usize,
    article_count: usize,
    cluster_count: usize,
    saved_at: DateTime<Utc>,
}

/// Serialized cluster registry.
#[derive(Debug, Serialize, Deserialize)]
struct ClusterSnapshot {
    schema_version: u32,
    clusters: Vec<Cluster>,
}

/// Saves and loads engine state, one directory per partition.
#[derive(Debug, Clone)]
pub struct PartitionStorage {
    base: PathBuf,
}

impl PartitionStorage {
    pub fn new(base: impl AsRef<Path>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
        }
    }

    /// Directory holding a partition's persisted bundle.
    #[must_use]
    pub fn partition_dir(&self, partition: &Partition) -> PathBuf {
        self.base.join(partition.dir_name())
    }

    #[must_use]
    pub fn exists(&self, partition: &Partition) -> bool {
        self.partition_dir(partition).join(META_FILE).exists()
    }

    /// Serializes the manager's index and cluster store for a partition.
    pub fn save(
        &self,
        partition: &Partition,
        manager: &ClusterManager,
        model: &str,
    ) -> Result<(), StorageError> {
        let dir = self.partition_dir(partition);
        std::fs::create_dir_all(&dir)?;

        let meta = PartitionMeta {
            schema_version: SCHEMA_VERSION,
            model: model.to_string(),
            dimension: manager.index().dimension().get(),
            article_count: manager.index().len(),
            cluster_count: manager.store().len(),
            saved_at: Utc::now(),
        };
        write_json(&dir.join(META_FILE), &meta)?;

        write_vectors(&dir.join(VECTORS_FILE), manager.index())?;

        let snapshot = ClusterSnapshot {
            schema_version: SCHEMA_VERSION,
            clusters: manager.store().clusters().to_vec(),
        };
        write_json(&dir.join(CLUSTERS_FILE), &snapshot)?;

        info!(
            partition = %partition,
            articles = meta.article_count,
            clusters = meta.cluster_count,
            "saved partition state"
        );
        Ok(())
    }

    /// Loads a partition's state, if any.
    ///
    /// Returns `Ok(None)` for a partition that was never saved — the
    /// normal first-run case. Unreadable or version-mismatched state is
    /// an error; the caller must rebuild rather than continue partially
    /// loaded.
    pub fn load(
        &self,
        partition: &Partition,
        policy: ThresholdPolicy,
        dimension: VectorDimension,
        model: &str,
    ) -> EngineResult<Option<ClusterManager>> {
        let dir = self.partition_dir(partition);
        let meta_path = dir.join(META_FILE);
        if !meta_path.exists() {
            return Ok(None);
        }

        let meta: PartitionMeta = read_json(&meta_path)?;
        if meta.schema_version != SCHEMA_VERSION {
            return Err(StorageError::VersionMismatch {
                expected: SCHEMA_VERSION,
                actual: meta.schema_version,
            }
            .into());
        }
        if meta.model != model {
            return Err(StorageError::Corrupt(format!(
                "partition was embedded with model '{}' but '{model}' is configured",
                meta.model
            ))
            .into());
        }
        if meta.dimension != dimension.get() {
            return Err(StorageError::Corrupt(format!(
                "partition dimension {} does not match configured {}",
                meta.dimension,
                dimension.get()
            ))
            .into());
        }

        let index = read_vectors(&dir.join(VECTORS_FILE), dimension)?;
        if index.len() != meta.article_count {
            return Err(StorageError::Corrupt(format!(
                "vector table has {} entries, metadata claims {}",
                index.len(),
                meta.article_count
            ))
            .into());
        }

        let snapshot: ClusterSnapshot = read_json(&dir.join(CLUSTERS_FILE))?;
        if snapshot.schema_version != SCHEMA_VERSION {
            return Err(StorageError::VersionMismatch {
                expected: SCHEMA_VERSION,
                actual: snapshot.schema_version,
            }
            .into());
        }
        if snapshot.clusters.len() != meta.cluster_count {
            return Err(StorageError::Corrupt(format!(
                "cluster snapshot has {} clusters, metadata claims {}",
                snapshot.clusters.len(),
                meta.cluster_count
            ))
            .into());
        }

        let store = ClusterStore::from_parts(policy, snapshot.clusters)?;
        let manager = ClusterManager::from_parts(index, store)?;
        info!(
            partition = %partition,
            articles = manager.article_count(),
            clusters = manager.store().len(),
            saved_at = %meta.saved_at,
            "loaded partition state"
        );
        Ok(Some(manager))
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| StorageError::Corrupt(format!("failed to serialize {path:?}: {e}")))?;
    std::fs::write(path, json)?;
    Ok(())
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, StorageError> {
    let json = std::fs::read_to_string(path)?;
    serde_json::from_str(&json)
        .map_err(|e| StorageError::Corrupt(format!("failed to parse {path:?}: {e}")))
}

fn write_vectors(path: &Path, index: &SimilarityIndex) -> Result<(), StorageError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writer.write_all(VECTOR_MAGIC)?;
    writer.write_all(&SCHEMA_VERSION.to_le_bytes())?;
    writer.write_all(&(index.dimension().get() as u32).to_le_bytes())?;
    writer.write_all(&(index.len() as u32).to_le_bytes())?;

    for (id, vector) in index.entries() {
        writer.write_all(&id.to_bytes())?;
        for &value in vector {
            writer.write_all(&value.to_le_bytes())?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn read_vectors(path: &Path, dimension: VectorDimension) -> Result<SimilarityIndex, StorageError> {
    let file = File::open(path)?;
    let mmap = unsafe { MmapOptions::new().map(&file)? };

    let (version, file_dimension, count) = read_header(&mmap)?;
    if version != SCHEMA_VERSION {
        return Err(StorageError::VersionMismatch {
            expected: SCHEMA_VERSION,
            actual: version,
        });
    }
    if file_dimension.get() != dimension.get() {
        return Err(StorageError::Corrupt(format!(
            "vector table dimension {} does not match expected {}",
            file_dimension.get(),
            dimension.get()
        )));
    }

    let dim = dimension.get();
    let record_size = BYTES_PER_ID + dim * BYTES_PER_F32;
    let expected_len = HEADER_SIZE + count * record_size;
    if mmap.len() != expected_len {
        return Err(StorageError::Corrupt(format!(
            "vector table is {} bytes, expected {expected_len} for {count} vectors",
            mmap.len()
        )));
    }

    let mut index = SimilarityIndex::new(dimension);
    let mut offset = HEADER_SIZE;
    while offset + record_size <= mmap.len() {
        let id_bytes = [
            mmap[offset],
            mmap[offset + 1],
            mmap[offset + 2],
            mmap[offset + 3],
        ];
        let id = ArticleId::from_bytes(id_bytes)
            .ok_or_else(|| StorageError::Corrupt("vector table holds a zero article id".to_string()))?;

        let mut vector = Vec::with_capacity(dim);
        let data_offset = offset + BYTES_PER_ID;
        for i in 0..dim {
            let byte_offset = data_offset + i * BYTES_PER_F32;
            vector.push(f32::from_le_bytes([
                mmap[byte_offset],
                mmap[byte_offset + 1],
                mmap[byte_offset + 2],
                mmap[byte_offset + 3],
            ]));
        }

        index.insert(id, vector)?;
        offset += record_size;
    }

    Ok(index)
}

fn read_header(mmap: &Mmap) -> Result<(u32, VectorDimension, usize), StorageError> {
    if mmap.len() < HEADER_SIZE {
        return Err(StorageError::Corrupt(
            "vector table too small to contain header".to_string(),
        ));
    }
    if &mmap[0..4] != VECTOR_MAGIC {
        return Err(StorageError::Corrupt(
            "vector table has invalid magic bytes".to_string(),
        ));
    }

    let version = u32::from_le_bytes([mmap[4], mmap[5], mmap[6], mmap[7]]);
    let dim_value = u32::from_le_bytes([mmap[8], mmap[9], mmap[10], mmap[11]]);
    let dimension = VectorDimension::new(dim_value as usize)?;
    let count = u32::from_le_bytes([mmap[12], mmap[13], mmap[14], mmap[15]]) as usize;

    Ok((version, dimension, count))
}
