//! Analyzer configuration, persisted as TOML.
//!
//! Every field carries a serde default so a partial (or empty) `config.toml`
//! is always valid; a missing file means "all defaults".

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::signal::SentimentLabel;

/// Top-level configuration recognized by the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodConfig {
    /// Keywords used to query the news collaborator when the caller gives none.
    #[serde(default = "default_keywords")]
    pub keywords: Vec<String>,
    /// Upper bound on retrieved articles per aggregation pass.
    #[serde(default = "default_max_articles")]
    pub max_articles: usize,
    /// Cache time-to-live in hours.
    #[serde(default = "default_cache_expiry_hours")]
    pub cache_expiry_hours: u64,
    /// Weight articles by the credibility of their source domain.
    #[serde(default = "default_true")]
    pub source_weighting_enabled: bool,
    /// Apply the 2-day half-life decay to older articles.
    #[serde(default = "default_true")]
    pub time_weighting_enabled: bool,
    /// Language code passed to the news collaborator.
    #[serde(default = "default_language")]
    pub language: String,
    /// Entity tried only when no other entity matches a document.
    #[serde(default = "default_fallback_entity")]
    pub fallback_entity: Option<String>,
    /// Hosted label classifiers to register as signal providers.
    #[serde(default)]
    pub providers: Vec<RemoteProviderConfig>,
}

/// A hosted text-classification endpoint used as a signal provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteProviderConfig {
    /// Signal identifier; must match a key in the ensemble weight table to contribute.
    pub id: String,
    /// Full URL the text is POSTed to.
    pub endpoint: String,
    /// Environment variable holding a bearer token, if the endpoint needs one.
    #[serde(default)]
    pub token_env: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra raw-label mappings (e.g. `LABEL_0 = "negative"`).
    #[serde(default)]
    pub labels: BTreeMap<String, SentimentLabel>,
}

fn default_keywords() -> Vec<String> {
    vec!["bitcoin".into(), "crypto".into(), "cryptocurrency".into()]
}
fn default_max_articles() -> usize {
    100
}
fn default_cache_expiry_hours() -> u64 {
    3
}
fn default_true() -> bool {
    true
}
fn default_language() -> String {
    "en".into()
}
fn default_fallback_entity() -> Option<String> {
    Some("crypto".into())
}
fn default_provider_timeout_secs() -> u64 {
    30
}

impl Default for MoodConfig {
    fn default() -> Self {
        Self {
            keywords: default_keywords(),
            max_articles: default_max_articles(),
            cache_expiry_hours: default_cache_expiry_hours(),
            source_weighting_enabled: true,
            time_weighting_enabled: true,
            language: default_language(),
            fallback_entity: default_fallback_entity(),
            providers: Vec::new(),
        }
    }
}

impl MoodConfig {
    /// Reject values the analyzer cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_articles == 0 {
            return Err(ConfigError::Invalid {
                message: "max_articles must be at least 1".into(),
            });
        }
        if self.language.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "language must not be empty".into(),
            });
        }
        for provider in &self.providers {
            if provider.id.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    message: "every provider needs a non-empty id".into(),
                });
            }
            if provider.timeout_secs == 0 {
                return Err(ConfigError::Invalid {
                    message: format!("provider \"{}\" has a zero timeout", provider.id),
                });
            }
        }
        Ok(())
    }

    /// Cache TTL as a chrono duration.
    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.cache_expiry_hours as i64)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file, or return defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Save to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
        std::fs::write(path, content).map_err(|e| ConfigError::Write {
            path: path.display().to_string(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_surface() {
        let cfg = MoodConfig::default();
        assert_eq!(cfg.max_articles, 100);
        assert_eq!(cfg.cache_expiry_hours, 3);
        assert!(cfg.source_weighting_enabled);
        assert!(cfg.time_weighting_enabled);
        assert_eq!(cfg.fallback_entity.as_deref(), Some("crypto"));
        assert!(cfg.keywords.contains(&"bitcoin".to_string()));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: MoodConfig = toml::from_str(
            r#"
            keywords = ["ethereum"]
            time_weighting_enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.keywords, vec!["ethereum".to_string()]);
        assert!(!cfg.time_weighting_enabled);
        assert!(cfg.source_weighting_enabled);
        assert_eq!(cfg.max_articles, 100);
    }

    #[test]
    fn provider_labels_parse() {
        let cfg: MoodConfig = toml::from_str(
            r#"
            [[providers]]
            id = "cardiffnlp/twitter-roberta-base-sentiment-latest"
            endpoint = "http://localhost:8080/classify"

            [providers.labels]
            LABEL_0 = "negative"
            LABEL_2 = "positive"
            "#,
        )
        .unwrap();
        let provider = &cfg.providers[0];
        assert_eq!(provider.timeout_secs, 30);
        assert_eq!(provider.labels["LABEL_0"], SentimentLabel::Negative);
        assert_eq!(provider.labels["LABEL_2"], SentimentLabel::Positive);
    }

    #[test]
    fn config_roundtrip_toml() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");

        let cfg = MoodConfig {
            keywords: vec!["solana".into()],
            max_articles: 40,
            ..Default::default()
        };
        cfg.save(&path).unwrap();

        let loaded = MoodConfig::load(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn missing_file_means_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = MoodConfig::load_or_default(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, MoodConfig::default());
    }

    #[test]
    fn zero_max_articles_rejected() {
        let cfg = MoodConfig {
            max_articles: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid { .. })));
    }
}
