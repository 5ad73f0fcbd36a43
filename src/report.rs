//! Structured run reports.
//!
//! The report is the engine's only user-facing output: the clusters that
//! met the reporting size, a summary with auditable skip counts, and a
//! snapshot of the configuration that produced the run. Serializes to
//! JSON for pipelines; `render_text` covers terminal use.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::article::Article;
use crate::cluster::ClusterManager;
use crate::config::Settings;
use crate::types::{ArticleId, Partition};

/// Ingestion counters carried into the report summary.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestCounts {
    /// Records received in the input batch.
    pub total: usize,
    /// Records that validated and were processed.
    pub analyzed: usize,
    /// Records rejected during validation.
    pub skipped: usize,
}

/// Full report for one engine run over one partition.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterReport {
    pub partition: Partition,
    pub summary: ReportSummary,
    pub clusters: Vec<ClusterEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub total_articles: usize,
    pub analyzed_articles: usize,
    pub skipped_articles: usize,
    /// Clusters that met `min_cluster_size`.
    pub total_clusters: usize,
    /// Articles belonging to a reported cluster.
    pub clustered_articles: usize,
    /// Articles in no reported cluster (singletons and small clusters).
    pub unique_articles: usize,
    pub size_histogram: Vec<HistogramBucket>,
    pub elapsed_ms: u64,
    pub config: ConfigSnapshot,
}

/// The configuration that shaped this run, for reproducibility.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSnapshot {
    pub embedding_model: String,
    pub similarity_threshold: f32,
    pub adaptive_threshold: bool,
    pub adaptive_k: f32,
    pub threshold_floor: f32,
    pub min_cluster_size: usize,
}

impl ConfigSnapshot {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            embedding_model: settings.embedding.model.clone(),
            similarity_threshold: settings.clustering.similarity_threshold,
            adaptive_threshold: settings.clustering.adaptive_threshold,
            adaptive_k: settings.clustering.adaptive_k,
            threshold_floor: settings.clustering.threshold_floor,
            min_cluster_size: settings.clustering.min_cluster_size,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterEntry {
    pub id: u32,
    pub hashtag: Option<String>,
    pub size: usize,
    /// Mean admission similarity to the anchor; `None` for singletons.
    pub mean_similarity: Option<f64>,
    pub members: Vec<MemberEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberEntry {
    pub id: u32,
    pub title: String,
    pub source: String,
    pub url: String,
    pub extracted_at: DateTime<Utc>,
}

/// One bar of the cluster-size distribution, over all clusters
/// including those below the reporting size.
#[derive(Debug, Clone, Serialize)]
pub struct HistogramBucket {
    pub size: usize,
    pub clusters: usize,
}

impl ClusterReport {
    /// Assembles the report from the manager's final state.
    ///
    /// Member details come from `articles`, keyed by id over the current
    /// batch. A persisted member absent from the batch is reported by id
    /// only through the counts; feed the engine the partition's full
    /// article set to get complete member listings.
    pub fn build(
        partition: &Partition,
        manager: &ClusterManager,
        articles: &BTreeMap<ArticleId, Article>,
        counts: IngestCounts,
        settings: &Settings,
        elapsed_ms: u64,
    ) -> Self {
        let min_size = settings.clustering.min_cluster_size;

        let mut histogram: BTreeMap<usize, usize> = BTreeMap::new();
        for cluster in manager.store().iter() {
            *histogram.entry(cluster.size()).or_default() += 1;
        }

        let mut clusters = Vec::new();
        let mut clustered_articles = 0;
        for cluster in manager.store().iter() {
            if cluster.size() < min_size {
                continue;
            }
            clustered_articles += cluster.size();

            let mut members = Vec::with_capacity(cluster.size());
            for &member in &cluster.members {
                match articles.get(&member) {
                    Some(article) => members.push(MemberEntry {
                        id: article.id.get(),
                        title: article.title.clone(),
                        source: article.source.clone(),
                        url: article.url.clone(),
                        extracted_at: article.extracted_at,
                    }),
                    None => warn!(
                        article_id = member.get(),
                        cluster_id = cluster.id.get(),
                        "cluster member not in current batch, omitting details"
                    ),
                }
            }

            clusters.push(ClusterEntry {
                id: cluster.id.get(),
                hashtag: cluster.hashtag.clone(),
                size: cluster.size(),
                mean_similarity: cluster.mean_similarity(),
                members,
            });
        }

        // Largest stories first; id breaks ties so output order is stable.
        clusters.sort_by(|a, b| b.size.cmp(&a.size).then(a.id.cmp(&b.id)));

        let total_members: usize = manager.article_count();
        let summary = ReportSummary {
            total_articles: counts.total,
            analyzed_articles: counts.analyzed,
            skipped_articles: counts.skipped,
            total_clusters: clusters.len(),
            clustered_articles,
            unique_articles: total_members.saturating_sub(clustered_articles),
            size_histogram: histogram
                .into_iter()
                .map(|(size, count)| HistogramBucket {
                    size,
                    clusters: count,
                })
                .collect(),
            elapsed_ms,
            config: ConfigSnapshot::from_settings(settings),
        };

        Self {
            partition: partition.clone(),
            summary,
            clusters,
        }
    }

    /// Human-readable rendering for terminal output.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let s = &self.summary;

        out.push_str(&format!("Partition {}\n", self.partition));
        out.push_str(&format!(
            "Articles: {} analyzed, {} skipped ({} total)\n",
            s.analyzed_articles, s.skipped_articles, s.total_articles
        ));
        out.push_str(&format!(
            "Clusters: {} (>= {} members), {} articles clustered, {} unique\n",
            s.total_clusters, s.config.min_cluster_size, s.clustered_articles, s.unique_articles
        ));
        out.push_str(&format!(
            "Model {} | base {} | adaptive {} (k={}) | {}ms\n",
            s.config.embedding_model,
            s.config.similarity_threshold,
            s.config.adaptive_threshold,
            s.config.adaptive_k,
            s.elapsed_ms
        ));

        for cluster in &self.clusters {
            let tag = cluster.hashtag.as_deref().unwrap_or("(unlabeled)");
            let mean = cluster
                .mean_similarity
                .map(|m| format!("{m:.3}"))
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!(
                "\n{} [{} members, mean sim {}]\n",
                tag, cluster.size, mean
            ));
            for member in &cluster.members {
                out.push_str(&format!(
                    "  {} | {} | {}\n",
                    member.extracted_at.format("%H:%M"),
                    member.source,
                    member.title
                ));
            }
        }

        out
    }
}
