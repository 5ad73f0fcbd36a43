//! Cluster registry and the adaptive acceptance threshold.
//!
//! Clusters live in an arena (`Vec` indexed by [`ClusterId`]); articles
//! refer to clusters by id only, never by object reference, so the
//! incremental merge structure stays an acyclic index graph.

use serde::{Deserialize, Serialize};

use crate::cluster::stats::SimilarityStats;
use crate::config::ClusteringConfig;
use crate::error::{EngineError, EngineResult};
use crate::types::{ArticleId, ClusterId};

/// One event cluster.
///
/// `members` is admission order, which under chronological processing is
/// also chronological order. The anchor is the first member and never
/// rotates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,
    pub anchor: ArticleId,
    pub members: Vec<ArticleId>,
    pub stats: SimilarityStats,
    pub hashtag: Option<String>,
}

impl Cluster {
    fn seeded(id: ClusterId, seed: ArticleId) -> Self {
        Self {
            id,
            anchor: seed,
            members: vec![seed],
            stats: SimilarityStats::new(),
            hashtag: None,
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// A cluster with a single member, excluded from reports but kept
    /// for cross-run continuity.
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }

    /// Mean admission similarity; `None` for singletons.
    #[must_use]
    pub fn mean_similarity(&self) -> Option<f64> {
        (self.stats.count() > 0).then(|| self.stats.mean())
    }
}

/// Per-cluster acceptance threshold policy.
///
/// Dense clusters (low σ) gate strictly, diffuse clusters stay more
/// permissive — but τ never exceeds the base threshold (no cluster gets
/// easier to join than the global floor) and never drops below the
/// configured floor (one early outlier pair must not make a cluster
/// swallow everything).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    pub base: f32,
    pub floor: f32,
    pub k: f32,
    pub adaptive: bool,
}

impl ThresholdPolicy {
    #[must_use]
    pub fn from_config(config: &ClusteringConfig) -> Self {
        Self {
            base: config.similarity_threshold,
            floor: config.threshold_floor,
            k: config.adaptive_k,
            adaptive: config.adaptive_threshold,
        }
    }

    /// τ for a cluster with the given admission statistics.
    ///
    /// Below two samples σ is undefined, so the base threshold applies.
    #[must_use]
    pub fn acceptance(&self, stats: &SimilarityStats) -> f32 {
        if !self.adaptive || stats.count() < 2 {
            return self.base;
        }
        let tau = (stats.mean() - f64::from(self.k) * stats.std_dev()) as f32;
        // min-then-max instead of clamp: an inverted floor/base pair
        // (possible when the policy is built from unvalidated settings)
        // must degrade to the base ceiling, not panic.
        tau.min(self.base).max(self.floor.min(self.base))
    }
}

/// In-memory registry of all clusters in a partition.
#[derive(Debug, Clone)]
pub struct ClusterStore {
    policy: ThresholdPolicy,
    clusters: Vec<Cluster>,
}

impl ClusterStore {
    #[must_use]
    pub fn new(policy: ThresholdPolicy) -> Self {
        Self {
            policy,
            clusters: Vec::new(),
        }
    }

    /// Rebuilds a store from persisted clusters.
    ///
    /// # Errors
    /// Fails if cluster ids do not form the contiguous 1-based sequence
    /// the arena layout requires.
    pub fn from_parts(policy: ThresholdPolicy, clusters: Vec<Cluster>) -> EngineResult<Self> {
        for (slot, cluster) in clusters.iter().enumerate() {
            if cluster.id.index() != slot {
                return Err(EngineError::StateCorrupted {
                    reason: format!(
                        "cluster id {} found at arena slot {slot}",
                        cluster.id
                    ),
                });
            }
            if cluster.members.first() != Some(&cluster.anchor) {
                return Err(EngineError::StateCorrupted {
                    reason: format!("cluster {} anchor is not its first member", cluster.id),
                });
            }
        }
        Ok(Self { policy, clusters })
    }

    /// Creates a new singleton cluster seeded by `seed`.
    pub fn create_cluster(&mut self, seed: ArticleId) -> ClusterId {
        let id = ClusterId::new_unchecked(self.clusters.len() as u32 + 1);
        self.clusters.push(Cluster::seeded(id, seed));
        id
    }

    /// Admits an article into a cluster, folding the admission
    /// similarity into the running statistics.
    pub fn add_member(
        &mut self,
        cluster_id: ClusterId,
        article: ArticleId,
        similarity: f32,
    ) -> EngineResult<()> {
        let cluster = self.get_mut(cluster_id)?;
        cluster.members.push(article);
        cluster.stats.push(f64::from(similarity));
        Ok(())
    }

    /// Current acceptance threshold τ for a cluster.
    pub fn acceptance_threshold(&self, cluster_id: ClusterId) -> EngineResult<f32> {
        Ok(self.policy.acceptance(&self.get(cluster_id)?.stats))
    }

    pub fn get(&self, id: ClusterId) -> EngineResult<&Cluster> {
        self.clusters
            .get(id.index())
            .ok_or_else(|| EngineError::StateCorrupted {
                reason: format!("unknown cluster id {id}"),
            })
    }

    pub fn get_mut(&mut self, id: ClusterId) -> EngineResult<&mut Cluster> {
        self.clusters
            .get_mut(id.index())
            .ok_or_else(|| EngineError::StateCorrupted {
                reason: format!("unknown cluster id {id}"),
            })
    }

    /// Sets the generated hashtag for a cluster.
    pub fn set_hashtag(&mut self, id: ClusterId, hashtag: String) -> EngineResult<()> {
        self.get_mut(id)?.hashtag = Some(hashtag);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    #[must_use]
    pub fn policy(&self) -> ThresholdPolicy {
        self.policy
    }

    /// Clusters in a snapshot-ready form (persistence path).
    #[must_use]
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }
}
