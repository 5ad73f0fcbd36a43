//! Cluster labeling boundary.
//!
//! Label generation is an external collaborator: a generator receives a
//! handful of representative titles and returns a short hashtag. The
//! engine never lets labeling block or invalidate cluster formation, so
//! the adapter retries malformed responses and falls back to a
//! deterministic placeholder when the generator keeps failing.

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::HashtagConfig;
use crate::types::slugify;

/// Errors from a label generator.
#[derive(Error, Debug)]
pub enum LabelError {
    #[error("Label generator received no titles")]
    NoTitles,

    #[error("Label generator returned malformed output: {reason}")]
    Malformed { reason: String },

    #[error("Label backend error: {0}")]
    Backend(String),
}

/// Produces a short descriptive label for a cluster.
///
/// Implementations receive up to `max_titles` member titles, earliest
/// first. A returned label need not carry the `#` prefix; the adapter
/// normalizes it.
pub trait HashtagGenerator: Send + Sync {
    fn label(&self, titles: &[&str]) -> Result<String, LabelError>;
}

/// Deterministic generator: the earliest title, slugged and truncated.
///
/// Serves both as the default offline generator and as the fallback
/// shape used when a richer generator fails.
pub struct TruncatedTitleGenerator {
    max_len: usize,
}

impl TruncatedTitleGenerator {
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }
}

impl HashtagGenerator for TruncatedTitleGenerator {
    fn label(&self, titles: &[&str]) -> Result<String, LabelError> {
        let first = titles.first().ok_or(LabelError::NoTitles)?;
        Ok(truncated_slug(first, self.max_len))
    }
}

/// Wraps a generator with retry, validation, and placeholder fallback.
pub struct LabelAdapter {
    generator: Box<dyn HashtagGenerator>,
    config: HashtagConfig,
}

impl LabelAdapter {
    pub fn new(generator: Box<dyn HashtagGenerator>, config: HashtagConfig) -> Self {
        Self { generator, config }
    }

    /// Maximum number of titles a generator should be offered.
    pub fn max_titles(&self) -> usize {
        self.config.max_titles
    }

    /// Labels a cluster from its earliest member titles. Infallible:
    /// after the configured retries are exhausted the earliest title is
    /// truncated into a placeholder instead.
    pub fn label_cluster(&self, titles: &[&str]) -> String {
        let offered = &titles[..titles.len().min(self.config.max_titles)];

        for attempt in 0..=self.config.retries {
            match self.generator.label(offered) {
                Ok(raw) => match self.validate(&raw) {
                    Ok(tag) => return tag,
                    Err(error) => {
                        debug!(attempt, %error, "rejected malformed label");
                    }
                },
                Err(error) => {
                    debug!(attempt, %error, "label generation attempt failed");
                }
            }
        }

        let fallback = self.fallback_label(offered);
        warn!(label = %fallback, "label generation exhausted retries, using placeholder");
        fallback
    }

    /// Normalizes a raw generator response into `#slug` form, rejecting
    /// responses that carry no usable text.
    fn validate(&self, raw: &str) -> Result<String, LabelError> {
        let trimmed = raw.trim().trim_start_matches('#');
        if trimmed.is_empty() {
            return Err(LabelError::Malformed {
                reason: "empty label".to_string(),
            });
        }
        if trimmed.lines().count() > 1 {
            return Err(LabelError::Malformed {
                reason: "label spans multiple lines".to_string(),
            });
        }

        let tag = truncated_slug(trimmed, self.config.max_len);
        if tag == "#" {
            return Err(LabelError::Malformed {
                reason: "label has no alphanumeric content".to_string(),
            });
        }
        Ok(tag)
    }

    fn fallback_label(&self, titles: &[&str]) -> String {
        titles
            .first()
            .map(|title| truncated_slug(title, self.config.max_len))
            .filter(|tag| tag != "#")
            .unwrap_or_else(|| "#unlabeled".to_string())
    }
}

/// `#slug-of-text`, cut at a dash boundary where possible.
fn truncated_slug(text: &str, max_len: usize) -> String {
    let slug = slugify(text);
    let mut body: &str = &slug;
    if body.len() > max_len {
        let mut boundary = max_len;
        while !body.is_char_boundary(boundary) {
            boundary -= 1;
        }
        // Prefer cutting at the last full word inside the limit.
        let cut = body[..boundary].rfind('-').unwrap_or(boundary);
        body = &body[..cut];
    }
    format!("#{}", body.trim_end_matches('-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingGenerator;

    impl HashtagGenerator for FailingGenerator {
        fn label(&self, _titles: &[&str]) -> Result<String, LabelError> {
            Err(LabelError::Backend("service unavailable".to_string()))
        }
    }

    struct CountingGenerator {
        calls: std::sync::atomic::AtomicUsize,
        succeed_on: usize,
    }

    impl HashtagGenerator for CountingGenerator {
        fn label(&self, _titles: &[&str]) -> Result<String, LabelError> {
            let call = self
                .calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if call + 1 >= self.succeed_on {
                Ok("Quake Relief".to_string())
            } else {
                Ok("   ".to_string())
            }
        }
    }

    fn config() -> HashtagConfig {
        HashtagConfig {
            max_titles: 5,
            retries: 2,
            max_len: 48,
        }
    }

    #[test]
    fn test_truncated_title_generator() {
        let generator = TruncatedTitleGenerator::new(48);
        let label = generator
            .label(&["Earthquake Strikes Coastal Region, Thousands Flee"])
            .unwrap();
        assert_eq!(label, "#earthquake-strikes-coastal-region-thousands-flee");

        let short = TruncatedTitleGenerator::new(20);
        let label = short
            .label(&["Earthquake Strikes Coastal Region, Thousands Flee"])
            .unwrap();
        assert_eq!(label, "#earthquake-strikes");
    }

    #[test]
    fn test_adapter_normalizes_raw_labels() {
        let adapter = LabelAdapter::new(Box::new(TruncatedTitleGenerator::new(48)), config());
        assert_eq!(adapter.validate("  #Quake Relief ").unwrap(), "#quake-relief");
        assert!(adapter.validate("###").is_err());
        assert!(adapter.validate("a\nb").is_err());
    }

    #[test]
    fn test_adapter_retries_then_succeeds() {
        let generator = CountingGenerator {
            calls: std::sync::atomic::AtomicUsize::new(0),
            succeed_on: 2,
        };
        let adapter = LabelAdapter::new(Box::new(generator), config());
        let label = adapter.label_cluster(&["Earthquake strikes", "Quake aftermath"]);
        assert_eq!(label, "#quake-relief");
    }

    #[test]
    fn test_adapter_falls_back_after_exhausted_retries() {
        let adapter = LabelAdapter::new(Box::new(FailingGenerator), config());
        let label = adapter.label_cluster(&["Earthquake strikes coast", "Quake aftermath"]);
        assert_eq!(label, "#earthquake-strikes-coast");
    }

    #[test]
    fn test_adapter_fallback_with_no_titles() {
        let adapter = LabelAdapter::new(Box::new(FailingGenerator), config());
        assert_eq!(adapter.label_cluster(&[]), "#unlabeled");
    }

    #[test]
    fn test_truncation_cuts_at_word_boundary() {
        let tag = truncated_slug("alpha beta gamma delta", 12);
        assert_eq!(tag, "#alpha-beta");
        assert!(tag.len() <= 13);
    }
}
