use marketnav_core::{FeedConfig, Result, SearchConfig};
use marketnav_similarity::{ExtractorConfig, SimilarityConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Every tuning knob of the engine in one JSON document.
///
/// Missing sections and fields take their defaults, so `{}` is a valid
/// configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    pub search: SearchConfig,
    pub feed: FeedConfig,
    pub similarity: SimilarityConfig,
    pub extractor: ExtractorConfig,
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        info!(path = %path.display(), "loaded engine config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.search.validate()?;
        self.feed.validate()?;
        self.similarity.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_is_default() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "feed": {{ "plan": {{ "maxDominantRatio": 0.3, "headWindow": 8 }} }},
                "similarity": {{ "maxResults": 5 }},
                "extractor": {{ "cacheCapacity": 64 }}
            }}"#
        )
        .unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.feed.plan.max_dominant_ratio, 0.3);
        assert_eq!(config.feed.plan.head_window, 8);
        assert_eq!(config.feed.plan.max_dominant_in_head, 3);
        assert_eq!(config.similarity.max_results, 5);
        assert_eq!(config.similarity.max_in_flight, 10);
        assert_eq!(config.extractor.cache_capacity, Some(64));
    }

    #[test]
    fn test_load_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "search": {{ "plan": {{ "maxDominantRatio": 0 }} }} }}"#).unwrap();
        assert!(EngineConfig::load(file.path()).is_err());

        assert!(EngineConfig::load(Path::new("/nonexistent/marketnav.json")).is_err());
    }
}
