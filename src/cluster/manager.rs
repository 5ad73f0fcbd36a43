//! The core online clustering algorithm.
//!
//! Articles are consumed one at a time in chronological order. Each new
//! embedding is compared against the nearest previously indexed
//! *article* (not a cluster centroid), which keeps the algorithm a true
//! single-link online variant: the earliest coverage of a breaking story
//! becomes the cluster anchor and later headlines chain onto whichever
//! member they most resemble, gated by that cluster's adaptive
//! threshold.

use std::collections::BTreeMap;

use tracing::debug;

use crate::cluster::store::{ClusterStore, ThresholdPolicy};
use crate::error::{EngineError, EngineResult};
use crate::index::SimilarityIndex;
use crate::types::{ArticleId, ClusterId, Score, VectorDimension};

/// Outcome of observing one article.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    /// No acceptable neighbor; the article seeded a new singleton.
    Seeded { cluster: ClusterId },
    /// Admitted into the nearest neighbor's cluster. If that neighbor
    /// was a singleton, its cluster was promoted in place to size 2.
    Joined {
        cluster: ClusterId,
        similarity: Score,
    },
    /// The article was already assigned in a previous (crash-restarted
    /// or incremental) run; nothing changed.
    AlreadyAssigned { cluster: ClusterId },
}

impl Admission {
    #[must_use]
    pub fn cluster(&self) -> ClusterId {
        match self {
            Self::Seeded { cluster }
            | Self::Joined { cluster, .. }
            | Self::AlreadyAssigned { cluster } => *cluster,
        }
    }
}

/// Owns the similarity index, the cluster store, and the article→cluster
/// mapping for one partition.
#[derive(Debug, Clone)]
pub struct ClusterManager {
    index: SimilarityIndex,
    store: ClusterStore,
    assignments: BTreeMap<ArticleId, ClusterId>,
}

impl ClusterManager {
    #[must_use]
    pub fn new(dimension: VectorDimension, policy: ThresholdPolicy) -> Self {
        Self {
            index: SimilarityIndex::new(dimension),
            store: ClusterStore::new(policy),
            assignments: BTreeMap::new(),
        }
    }

    /// Rebuilds a manager from persisted parts (reload path).
    ///
    /// The article→cluster mapping is derived from cluster membership;
    /// an indexed article that belongs to no cluster means the persisted
    /// state is inconsistent.
    pub fn from_parts(index: SimilarityIndex, store: ClusterStore) -> EngineResult<Self> {
        let mut assignments = BTreeMap::new();
        for cluster in store.iter() {
            for member in &cluster.members {
                if assignments.insert(*member, cluster.id).is_some() {
                    return Err(EngineError::StateCorrupted {
                        reason: format!("article {member} belongs to more than one cluster"),
                    });
                }
            }
        }
        for (id, _) in index.entries() {
            if !assignments.contains_key(&id) {
                return Err(EngineError::StateCorrupted {
                    reason: format!("indexed article {id} has no cluster assignment"),
                });
            }
        }
        Ok(Self {
            index,
            store,
            assignments,
        })
    }

    /// Consumes one embedded article and decides merge-vs-new-cluster.
    ///
    /// The embedding must be L2-normalized (the embedder guarantees
    /// this). Near-duplicate headlines (similarity ≈ 1.0) are admitted
    /// normally; duplicate suppression is an upstream concern.
    pub fn observe(&mut self, article: ArticleId, embedding: Vec<f32>) -> EngineResult<Admission> {
        if let Some(&cluster) = self.assignments.get(&article) {
            // Crash-restart reprocessing: refresh the vector, keep the
            // admission decision that was already made.
            self.index.insert(article, embedding)?;
            debug!(article = %article, cluster = %cluster, "article already assigned, skipping");
            return Ok(Admission::AlreadyAssigned { cluster });
        }

        let neighbor = self.index.nearest(&embedding, 1)?.into_iter().next();

        let admission = match neighbor {
            None => self.seed(article),
            Some((neighbor_id, similarity)) => {
                let neighbor_cluster = *self.assignments.get(&neighbor_id).ok_or_else(|| {
                    EngineError::StateCorrupted {
                        reason: format!("indexed article {neighbor_id} has no cluster assignment"),
                    }
                })?;
                let tau = self.store.acceptance_threshold(neighbor_cluster)?;

                if similarity.get() >= tau {
                    self.store
                        .add_member(neighbor_cluster, article, similarity.get())?;
                    debug!(
                        article = %article,
                        cluster = %neighbor_cluster,
                        similarity = similarity.get(),
                        threshold = tau,
                        "admitted into existing cluster"
                    );
                    Admission::Joined {
                        cluster: neighbor_cluster,
                        similarity,
                    }
                } else {
                    debug!(
                        article = %article,
                        nearest = %neighbor_id,
                        similarity = similarity.get(),
                        threshold = tau,
                        "below threshold, seeding new cluster"
                    );
                    self.seed(article)
                }
            }
        };

        self.index.insert(article, embedding)?;
        self.assignments.insert(article, admission.cluster());
        Ok(admission)
    }

    fn seed(&mut self, article: ArticleId) -> Admission {
        let cluster = self.store.create_cluster(article);
        Admission::Seeded { cluster }
    }

    #[must_use]
    pub fn is_assigned(&self, article: ArticleId) -> bool {
        self.assignments.contains_key(&article)
    }

    #[must_use]
    pub fn assignment(&self, article: ArticleId) -> Option<ClusterId> {
        self.assignments.get(&article).copied()
    }

    #[must_use]
    pub fn article_count(&self) -> usize {
        self.assignments.len()
    }

    #[must_use]
    pub fn index(&self) -> &SimilarityIndex {
        &self.index
    }

    #[must_use]
    pub fn store(&self) -> &ClusterStore {
        &self.store
    }

    #[must_use]
    pub fn store_mut(&mut self) -> &mut ClusterStore {
        &mut self.store
    }
}
