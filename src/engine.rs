//! The run orchestrator: validate, embed, cluster, label, persist.
//!
//! One `run` covers one partition: records are validated and sorted
//! chronologically, previously persisted state for the partition is
//! loaded, new articles are embedded in batches and observed one at a
//! time, reported clusters get labels, and the updated state is saved
//! before the report is returned.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::article::{Article, ArticleRecord};
use crate::cluster::{ClusterManager, ThresholdPolicy};
use crate::config::Settings;
use crate::embedding::{EmbeddingGenerator, shared_generator};
use crate::error::EngineResult;
use crate::hashtag::{HashtagGenerator, LabelAdapter, TruncatedTitleGenerator};
use crate::report::{ClusterReport, IngestCounts};
use crate::storage::PartitionStorage;
use crate::types::{ArticleId, ClusterId, Partition};

pub struct ClusteringEngine {
    settings: Settings,
    embedder: Arc<dyn EmbeddingGenerator>,
    labeler: LabelAdapter,
    storage: PartitionStorage,
}

impl ClusteringEngine {
    /// Creates an engine with the process-wide fastembed model and the
    /// offline truncated-title labeler.
    ///
    /// Settings are re-validated here: callers constructing them by hand
    /// (rather than through `Settings::load`) get a config error instead
    /// of surprise behavior mid-run.
    pub fn new(settings: Settings) -> EngineResult<Self> {
        settings.validate()?;
        let embedder = shared_generator(&settings.embedding)?;
        let labeler = Box::new(TruncatedTitleGenerator::new(settings.hashtag.max_len));
        Ok(Self::with_parts(settings, embedder, labeler))
    }

    /// Creates an engine from explicit collaborators. Tests inject a
    /// deterministic embedder here; callers with an LLM-backed labeler
    /// plug it in the same way.
    pub fn with_parts(
        settings: Settings,
        embedder: Arc<dyn EmbeddingGenerator>,
        labeler: Box<dyn HashtagGenerator>,
    ) -> Self {
        let storage = PartitionStorage::new(&settings.data_dir);
        let labeler = LabelAdapter::new(labeler, settings.hashtag.clone());
        Self {
            settings,
            embedder,
            labeler,
            storage,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Processes one batch of records for a partition and returns the
    /// resulting report. Incremental: persisted state for the partition
    /// is extended, never recomputed.
    pub fn run(
        &self,
        partition: &Partition,
        records: Vec<ArticleRecord>,
    ) -> EngineResult<ClusterReport> {
        let started = Instant::now();
        let mut counts = IngestCounts {
            total: records.len(),
            ..IngestCounts::default()
        };

        let mut articles = Vec::with_capacity(records.len());
        for record in records {
            match Article::from_record(record) {
                Ok(article) => articles.push(article),
                Err(error) => {
                    counts.skipped += 1;
                    warn!(%error, "skipping invalid article record");
                }
            }
        }
        counts.analyzed = articles.len();

        // Chronological processing keeps cluster formation, and thus the
        // whole run, deterministic for a fixed input.
        articles.sort_by(|a, b| {
            a.extracted_at
                .cmp(&b.extracted_at)
                .then(a.id.get().cmp(&b.id.get()))
        });

        let policy = ThresholdPolicy::from_config(&self.settings.clustering);
        let dimension = self.embedder.dimension();
        let mut manager = match self.storage.load(
            partition,
            policy,
            dimension,
            &self.settings.embedding.model,
        )? {
            Some(manager) => manager,
            None => {
                debug!(partition = %partition, "no persisted state, starting fresh");
                ClusterManager::new(dimension, policy)
            }
        };

        let new_articles: Vec<&Article> = articles
            .iter()
            .filter(|a| !manager.is_assigned(a.id))
            .collect();
        info!(
            partition = %partition,
            total = counts.total,
            analyzed = counts.analyzed,
            new = new_articles.len(),
            "processing batch"
        );

        for chunk in new_articles.chunks(self.settings.embedding.batch_size.max(1)) {
            let texts: Vec<&str> = chunk.iter().map(|a| a.embedding_text()).collect();
            let embeddings = self.embedder.embed_many(&texts)?;
            for (article, embedding) in chunk.iter().zip(embeddings) {
                let admission = manager.observe(article.id, embedding)?;
                debug!(
                    article_id = article.id.get(),
                    cluster_id = admission.cluster().get(),
                    "article admitted"
                );
            }
        }

        let metadata: BTreeMap<ArticleId, Article> =
            articles.into_iter().map(|a| (a.id, a)).collect();
        self.label_clusters(&mut manager, &metadata)?;

        let report = ClusterReport::build(
            partition,
            &manager,
            &metadata,
            counts,
            &self.settings,
            started.elapsed().as_millis() as u64,
        );

        self.storage
            .save(partition, &manager, &self.settings.embedding.model)?;

        Ok(report)
    }

    /// Labels reportable clusters that do not yet carry a hashtag.
    /// Labeling never fails a run; the adapter falls back internally.
    fn label_clusters(
        &self,
        manager: &mut ClusterManager,
        metadata: &BTreeMap<ArticleId, Article>,
    ) -> EngineResult<()> {
        let min_size = self.settings.clustering.min_cluster_size;
        let max_titles = self.labeler.max_titles();

        let mut pending: Vec<(ClusterId, Vec<String>)> = Vec::new();
        for cluster in manager.store().iter() {
            if cluster.size() < min_size || cluster.hashtag.is_some() {
                continue;
            }
            let titles: Vec<String> = cluster
                .members
                .iter()
                .filter_map(|id| metadata.get(id))
                .map(|article| article.title.clone())
                .take(max_titles)
                .collect();
            pending.push((cluster.id, titles));
        }

        for (cluster_id, titles) in pending {
            let title_refs: Vec<&str> = titles.iter().map(String::as_str).collect();
            let hashtag = self.labeler.label_cluster(&title_refs);
            debug!(cluster_id = cluster_id.get(), hashtag = %hashtag, "labeled cluster");
            manager.store_mut().set_hashtag(cluster_id, hashtag)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbeddingGenerator;
    use chrono::{NaiveDate, TimeZone, Utc};
    use tempfile::TempDir;

    fn record(id: u32, title: &str, minute: u32) -> ArticleRecord {
        ArticleRecord {
            id,
            url: format!("https://example.com/{id}"),
            title: Some(title.to_string()),
            source: "example.com".to_string(),
            category: "world".to_string(),
            extracted_at: Utc.with_ymd_and_hms(2026, 8, 29, 6, minute, 0).unwrap(),
        }
    }

    fn engine(data_dir: &std::path::Path) -> ClusteringEngine {
        let mut settings = Settings::default();
        settings.data_dir = data_dir.to_path_buf();
        settings.clustering.similarity_threshold = 0.8;
        ClusteringEngine::with_parts(
            settings.clone(),
            Arc::new(MockEmbeddingGenerator::new()),
            Box::new(TruncatedTitleGenerator::new(settings.hashtag.max_len)),
        )
    }

    fn partition() -> Partition {
        Partition::new(NaiveDate::from_ymd_opt(2026, 8, 29).unwrap(), "world")
    }

    #[test]
    fn test_run_clusters_similar_headlines() {
        let dir = TempDir::new().unwrap();
        let report = engine(dir.path())
            .run(
                &partition(),
                vec![
                    record(1, "Earthquake strikes coastal region", 0),
                    record(2, "Major quake hits coast", 5),
                    record(3, "Markets rally on rate cut", 10),
                    record(4, "Earthquake aftershocks continue", 15),
                ],
            )
            .unwrap();

        assert_eq!(report.summary.analyzed_articles, 4);
        assert_eq!(report.summary.total_clusters, 1);
        assert_eq!(report.clusters[0].size, 3);
        assert!(report.clusters[0].hashtag.is_some());
        assert_eq!(report.summary.unique_articles, 1);
    }

    #[test]
    fn test_invalid_records_skipped_and_counted() {
        let dir = TempDir::new().unwrap();
        let mut bad = record(5, "ignored", 0);
        bad.title = None;

        let report = engine(dir.path())
            .run(
                &partition(),
                vec![bad, record(1, "Election results announced", 1)],
            )
            .unwrap();

        assert_eq!(report.summary.total_articles, 2);
        assert_eq!(report.summary.analyzed_articles, 1);
        assert_eq!(report.summary.skipped_articles, 1);
        assert_eq!(report.summary.total_clusters, 0);
    }

    #[test]
    fn test_empty_input_yields_empty_report() {
        let dir = TempDir::new().unwrap();
        let report = engine(dir.path()).run(&partition(), vec![]).unwrap();
        assert_eq!(report.summary.total_articles, 0);
        assert_eq!(report.summary.total_clusters, 0);
        assert!(report.clusters.is_empty());
    }

    #[test]
    fn test_new_rejects_invalid_settings() {
        let mut settings = Settings::default();
        settings.embedding.batch_size = 0;
        // Validation runs before any model load, so this fails fast.
        assert!(matches!(
            ClusteringEngine::new(settings),
            Err(crate::error::EngineError::Config { .. })
        ));
    }

    #[test]
    fn test_inverted_floor_settings_run_without_panic() {
        let dir = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.data_dir = dir.path().to_path_buf();
        settings.clustering.similarity_threshold = 0.8;
        settings.clustering.threshold_floor = 0.9;

        let engine = ClusteringEngine::with_parts(
            settings.clone(),
            Arc::new(MockEmbeddingGenerator::new()),
            Box::new(TruncatedTitleGenerator::new(settings.hashtag.max_len)),
        );

        // The fourth quake headline evaluates an adaptive threshold with
        // two samples on the books, which is where an inverted pair
        // would otherwise blow up.
        let report = engine
            .run(
                &partition(),
                vec![
                    record(1, "Earthquake strikes coastal region", 0),
                    record(2, "Major quake hits coast", 5),
                    record(3, "Quake aftershocks continue", 10),
                    record(4, "Quake relief effort begins", 15),
                ],
            )
            .unwrap();
        assert_eq!(report.clusters[0].size, 4);
    }

    #[test]
    fn test_second_run_is_incremental() {
        let dir = TempDir::new().unwrap();
        let engine = engine(dir.path());

        engine
            .run(
                &partition(),
                vec![
                    record(1, "Earthquake strikes coastal region", 0),
                    record(2, "Major quake hits coast", 5),
                ],
            )
            .unwrap();

        // Second batch re-sends the first two records plus one new one.
        let report = engine
            .run(
                &partition(),
                vec![
                    record(1, "Earthquake strikes coastal region", 0),
                    record(2, "Major quake hits coast", 5),
                    record(3, "Quake damage assessment begins", 10),
                ],
            )
            .unwrap();

        assert_eq!(report.summary.total_clusters, 1);
        assert_eq!(report.clusters[0].size, 3);
        let ids: Vec<u32> = report.clusters[0].members.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
