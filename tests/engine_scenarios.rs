//! End-to-end engine scenarios with a deterministic embedding backend.

use std::path::Path;
use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use tempfile::TempDir;

use headliner::{
    ArticleRecord, ClusteringEngine, EmbeddingError, EmbeddingGenerator, Partition, Settings,
    TruncatedTitleGenerator, VectorDimension,
};

/// Maps each known topic keyword to its own axis, so headlines about the
/// same topic embed identically and unrelated headlines are orthogonal.
struct TopicEmbedder;

const TOPICS: &[(&str, usize)] = &[
    ("quake", 0),
    ("election", 1),
    ("market", 2),
    ("storm", 3),
    ("launch", 4),
    ("merger", 5),
];

impl EmbeddingGenerator for TopicEmbedder {
    fn embed_many(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            let lower = text.to_lowercase();
            let mut vector = vec![0.0f32; 384];
            let axis = TOPICS
                .iter()
                .find(|(keyword, _)| lower.contains(keyword))
                .map(|&(_, axis)| axis)
                .unwrap_or_else(|| {
                    // Unknown topics land on a text-derived axis.
                    10 + lower.bytes().map(usize::from).sum::<usize>() % 300
                });
            vector[axis] = 1.0;
            embeddings.push(vector);
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        VectorDimension::dimension_384()
    }
}

fn record(id: u32, title: Option<&str>, minute: u32) -> ArticleRecord {
    ArticleRecord {
        id,
        url: format!("https://example.com/articles/{id}"),
        title: title.map(String::from),
        source: "example.com".to_string(),
        category: "world".to_string(),
        extracted_at: Utc.with_ymd_and_hms(2026, 8, 29, 7, minute, 0).unwrap(),
    }
}

fn engine(data_dir: &Path, min_cluster_size: usize) -> ClusteringEngine {
    let mut settings = Settings::default();
    settings.data_dir = data_dir.to_path_buf();
    settings.clustering.min_cluster_size = min_cluster_size;
    ClusteringEngine::with_parts(
        settings.clone(),
        Arc::new(TopicEmbedder),
        Box::new(TruncatedTitleGenerator::new(settings.hashtag.max_len)),
    )
}

fn partition() -> Partition {
    Partition::new(NaiveDate::from_ymd_opt(2026, 8, 29).unwrap(), "world")
}

#[test]
fn near_duplicates_form_one_cluster_with_outlier_unique() {
    let dir = TempDir::new().unwrap();
    let report = engine(dir.path(), 2)
        .run(
            &partition(),
            vec![
                record(1, Some("Quake strikes coastal region"), 0),
                record(2, Some("Powerful quake hits coast"), 3),
                record(3, Some("Storm approaches gulf states"), 6),
                record(4, Some("Coastal quake aftershocks reported"), 9),
            ],
        )
        .unwrap();

    assert_eq!(report.summary.total_clusters, 1);
    assert_eq!(report.clusters[0].size, 3);
    let ids: Vec<u32> = report.clusters[0].members.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![1, 2, 4]);
    assert_eq!(report.summary.unique_articles, 1);
}

#[test]
fn identical_input_yields_identical_reports() {
    let records = || {
        vec![
            record(1, Some("Quake strikes coastal region"), 0),
            record(2, Some("Election results contested"), 2),
            record(3, Some("Quake damage spreads inland"), 4),
            record(4, Some("Markets open higher"), 6),
            record(5, Some("Election recount ordered"), 8),
        ]
    };

    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();
    let report_a = engine(dir_a.path(), 2).run(&partition(), records()).unwrap();
    let report_b = engine(dir_b.path(), 2).run(&partition(), records()).unwrap();

    assert_eq!(
        serde_json::to_string(&report_a.clusters).unwrap(),
        serde_json::to_string(&report_b.clusters).unwrap()
    );
    assert_eq!(
        report_a.summary.total_clusters,
        report_b.summary.total_clusters
    );
    assert_eq!(
        report_a.summary.size_histogram.len(),
        report_b.summary.size_histogram.len()
    );
}

#[test]
fn empty_input_yields_empty_report() {
    let dir = TempDir::new().unwrap();
    let report = engine(dir.path(), 2).run(&partition(), vec![]).unwrap();

    assert_eq!(report.summary.total_articles, 0);
    assert_eq!(report.summary.analyzed_articles, 0);
    assert_eq!(report.summary.total_clusters, 0);
    assert!(report.clusters.is_empty());
    assert!(report.summary.size_histogram.is_empty());
}

#[test]
fn malformed_record_skipped_dissimilar_rest_stay_unique() {
    let dir = TempDir::new().unwrap();
    let report = engine(dir.path(), 2)
        .run(
            &partition(),
            vec![
                record(1, None, 0),
                record(2, Some("Quake strikes coastal region"), 1),
                record(3, Some("Election results contested"), 2),
                record(4, Some("Markets open higher"), 3),
                record(5, Some("Storm approaches gulf states"), 4),
                record(6, Some("Rocket launch scrubbed again"), 5),
            ],
        )
        .unwrap();

    assert_eq!(report.summary.total_articles, 6);
    assert_eq!(report.summary.analyzed_articles, 5);
    assert_eq!(report.summary.skipped_articles, 1);
    assert_eq!(report.summary.total_clusters, 0);
    assert_eq!(report.summary.unique_articles, 5);
}

#[test]
fn min_cluster_size_gates_reporting() {
    let records = vec![
        record(1, Some("Quake strikes coastal region"), 0),
        record(2, Some("Powerful quake hits coast"), 2),
        record(3, Some("Election results contested"), 4),
        record(4, Some("Election recount ordered"), 6),
        record(5, Some("Election audit demanded"), 8),
    ];

    // With the default size the pair and the triple both report.
    let dir = TempDir::new().unwrap();
    let report = engine(dir.path(), 2)
        .run(&partition(), records.clone())
        .unwrap();
    assert_eq!(report.summary.total_clusters, 2);

    // Raising the bar to 3 hides the pair but keeps it in the store.
    let dir = TempDir::new().unwrap();
    let report = engine(dir.path(), 3).run(&partition(), records).unwrap();
    assert_eq!(report.summary.total_clusters, 1);
    assert_eq!(report.clusters[0].size, 3);
    assert_eq!(report.summary.unique_articles, 2);
    assert!(
        report
            .summary
            .size_histogram
            .iter()
            .any(|bucket| bucket.size == 2 && bucket.clusters == 1)
    );
}

#[test]
fn persisted_partition_resumes_across_engine_instances() {
    let dir = TempDir::new().unwrap();

    let first = engine(dir.path(), 2)
        .run(
            &partition(),
            vec![
                record(1, Some("Quake strikes coastal region"), 0),
                record(2, Some("Powerful quake hits coast"), 5),
            ],
        )
        .unwrap();
    assert_eq!(first.summary.total_clusters, 1);
    let first_tag = first.clusters[0].hashtag.clone();

    // A fresh engine over the same data directory extends the cluster.
    let second = engine(dir.path(), 2)
        .run(
            &partition(),
            vec![
                record(1, Some("Quake strikes coastal region"), 0),
                record(2, Some("Powerful quake hits coast"), 5),
                record(3, Some("Quake relief effort begins"), 10),
            ],
        )
        .unwrap();

    assert_eq!(second.summary.total_clusters, 1);
    assert_eq!(second.clusters[0].size, 3);
    // The hashtag assigned in the first run survives the reload.
    assert_eq!(second.clusters[0].hashtag, first_tag);

    let ids: Vec<u32> = second.clusters[0].members.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn partitions_do_not_share_state() {
    let dir = TempDir::new().unwrap();
    let other = Partition::new(NaiveDate::from_ymd_opt(2026, 8, 29).unwrap(), "business");

    engine(dir.path(), 2)
        .run(
            &partition(),
            vec![
                record(1, Some("Quake strikes coastal region"), 0),
                record(2, Some("Powerful quake hits coast"), 5),
            ],
        )
        .unwrap();

    let report = engine(dir.path(), 2)
        .run(
            &other,
            vec![record(10, Some("Merger talks collapse"), 0)],
        )
        .unwrap();

    // The business partition starts empty; nothing leaks from "world".
    assert_eq!(report.summary.total_clusters, 0);
    assert_eq!(report.summary.unique_articles, 1);
}
