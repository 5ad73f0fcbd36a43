//! Directory resolution for persistent engine state.

use std::path::PathBuf;

/// Cache directory for downloaded embedding models.
///
/// Models are shared across projects, so they live under the user cache
/// directory rather than inside any partition's data dir.
#[must_use]
pub fn models_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("headliner")
        .join("models")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_models_dir_ends_with_models() {
        assert!(models_dir().ends_with("headliner/models"));
    }
}
