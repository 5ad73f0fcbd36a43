//! Article input records and ingestion validation.
//!
//! The engine consumes article records produced by the upstream
//! scraping/classification pipeline. Records are validated once at
//! ingestion; a validated [`Article`] is immutable from then on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ArticleId;

/// Raw article record as delivered by the upstream pipeline.
///
/// `title` is optional on the wire; records without one are rejected at
/// ingestion rather than embedded as empty text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: u32,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    pub source: String,
    pub category: String,
    pub extracted_at: DateTime<Utc>,
}

/// A validated, immutable article ready for embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub id: ArticleId,
    pub url: String,
    pub title: String,
    pub source: String,
    pub category: String,
    pub extracted_at: DateTime<Utc>,
}

/// Errors raised while validating an incoming record.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Article record {id} has no title and cannot be embedded")]
    MissingTitle { id: u32 },

    #[error("Article record has invalid id 0")]
    InvalidId,
}

impl Article {
    /// Validates a raw record into an [`Article`].
    ///
    /// Rejects a zero id and a missing/whitespace-only title.
    pub fn from_record(record: ArticleRecord) -> Result<Self, RecordError> {
        let id = ArticleId::new(record.id).ok_or(RecordError::InvalidId)?;
        let title = record
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(RecordError::MissingTitle { id: record.id })?
            .to_string();

        Ok(Self {
            id,
            url: record.url,
            title,
            source: record.source,
            category: record.category,
            extracted_at: record.extracted_at,
        })
    }

    /// Text fed to the embedding model for this article.
    ///
    /// Headlines only for now; upstream does not deliver article bodies
    /// at clustering time.
    #[must_use]
    pub fn embedding_text(&self) -> &str {
        &self.title
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: u32, title: Option<&str>) -> ArticleRecord {
        ArticleRecord {
            id,
            url: format!("https://example.com/{id}"),
            title: title.map(String::from),
            source: "example.com".to_string(),
            category: "world".to_string(),
            extracted_at: Utc::now(),
        }
    }

    #[test]
    fn test_valid_record() {
        let article = Article::from_record(record(1, Some("  Quake hits coast  "))).unwrap();
        assert_eq!(article.id.get(), 1);
        assert_eq!(article.title, "Quake hits coast");
        assert_eq!(article.embedding_text(), "Quake hits coast");
    }

    #[test]
    fn test_missing_title_rejected() {
        assert!(matches!(
            Article::from_record(record(2, None)),
            Err(RecordError::MissingTitle { id: 2 })
        ));
        assert!(matches!(
            Article::from_record(record(3, Some("   "))),
            Err(RecordError::MissingTitle { id: 3 })
        ));
    }

    #[test]
    fn test_zero_id_rejected() {
        assert!(matches!(
            Article::from_record(record(0, Some("title"))),
            Err(RecordError::InvalidId)
        ));
    }

    #[test]
    fn test_record_deserializes_without_title() {
        let json = r#"{
            "id": 7,
            "url": "https://example.com/7",
            "source": "example.com",
            "category": "tech",
            "extracted_at": "2026-08-29T06:00:00Z"
        }"#;
        let rec: ArticleRecord = serde_json::from_str(json).unwrap();
        assert!(rec.title.is_none());
    }
}
