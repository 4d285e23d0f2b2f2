//! Per-article contribution multipliers: source credibility and time decay.
//!
//! - **Source weight**: the credibility of the article's domain, looked up in
//!   a [`CredibilityTable`] with a configurable fallback.
//! - **Time weight**: exponential decay with a 2-day half-life,
//!   `w = exp(-ln 2 / 2 × age_days)`, floored at 0.1.
//!
//! Both collapse to 1.0 when disabled in the configuration, and the combined
//! weight is their product.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::MoodConfig;
use crate::error::{ConfigError, ConfigResult};

/// Half-life of the time decay, in days.
pub const HALF_LIFE_DAYS: f64 = 2.0;

/// Lower bound of the time weight.
pub const MIN_TIME_WEIGHT: f64 = 0.1;

fn default_credibility() -> f64 {
    0.6
}

// ---------------------------------------------------------------------------
// Credibility table
// ---------------------------------------------------------------------------

/// Source domain → credibility in `[0, 1]`, plus a fallback for unknown domains.
///
/// Stored as one flat JSON object; the `default` key holds the fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredibilityTable {
    #[serde(default = "default_credibility")]
    default: f64,
    #[serde(flatten)]
    domains: BTreeMap<String, f64>,
}

impl Default for CredibilityTable {
    fn default() -> Self {
        let domains = [
            ("bloomberg.com", 0.9),
            ("wsj.com", 0.9),
            ("reuters.com", 0.9),
            ("ft.com", 0.9),
            ("cnbc.com", 0.8),
            ("forbes.com", 0.8),
            ("cointelegraph.com", 0.7),
            ("coindesk.com", 0.7),
            ("theblockcrypto.com", 0.7),
            ("medium.com", 0.5),
            ("reddit.com", 0.5),
            ("twitter.com", 0.4),
        ]
        .into_iter()
        .map(|(d, w)| (d.to_string(), w))
        .collect();
        Self {
            default: default_credibility(),
            domains,
        }
    }
}

impl CredibilityTable {
    pub fn new(default: f64, domains: BTreeMap<String, f64>) -> Self {
        Self { default, domains }
    }

    /// Fallback weight for unknown domains.
    pub fn default_weight(&self) -> f64 {
        self.default
    }

    /// Credibility of `domain`, trying parent domains before the fallback.
    pub fn lookup(&self, domain: &str) -> f64 {
        let mut candidate = domain;
        loop {
            if let Some(&w) = self.domains.get(candidate) {
                return w;
            }
            match candidate.split_once('.') {
                Some((_, parent)) if parent.contains('.') => candidate = parent,
                _ => return self.default,
            }
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let out_of_range = std::iter::once(("default", self.default))
            .chain(self.domains.iter().map(|(d, w)| (d.as_str(), *w)))
            .find(|(_, w)| !(0.0..=1.0).contains(w));
        match out_of_range {
            Some((domain, w)) => Err(ConfigError::Invalid {
                message: format!("credibility of \"{domain}\" is {w}, expected [0, 1]"),
            }),
            None => Ok(()),
        }
    }

    /// Load from JSON, writing the defaults there first if the file is absent.
    pub fn load_or_create(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            let table = Self::default();
            table.save(path)?;
            return Ok(table);
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let table: Self = serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        table.validate()?;
        Ok(table)
    }

    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse {
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

/// Lower-cased host of `url` without scheme, credentials, port or a leading `www.`.
pub fn extract_domain(url: &str) -> Option<String> {
    let rest = url.trim();
    let rest = rest.split_once("://").map_or(rest, |(_, r)| r);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    let host = host.split(':').next().unwrap_or_default().to_lowercase();
    let host = host.strip_prefix("www.").map(str::to_string).unwrap_or(host);
    if host.is_empty() { None } else { Some(host) }
}

// ---------------------------------------------------------------------------
// Time decay
// ---------------------------------------------------------------------------

/// Decay for an article `age_days` old. Future timestamps count as fresh.
pub fn decay(age_days: f64) -> f64 {
    if age_days <= 0.0 {
        return 1.0;
    }
    (-(std::f64::consts::LN_2 / HALF_LIFE_DAYS) * age_days)
        .exp()
        .max(MIN_TIME_WEIGHT)
}

/// Parse RFC 3339, then a naive datetime (taken as UTC), then a bare date.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The three multipliers applied to one article.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArticleWeight {
    pub source: f64,
    pub time: f64,
    pub combined: f64,
}

/// Computes source and time weights under the configured switches.
#[derive(Debug, Clone)]
pub struct WeightingEngine {
    credibility: CredibilityTable,
    source_weighting: bool,
    time_weighting: bool,
}

impl WeightingEngine {
    pub fn new(credibility: CredibilityTable, source_weighting: bool, time_weighting: bool) -> Self {
        Self {
            credibility,
            source_weighting,
            time_weighting,
        }
    }

    pub fn from_config(credibility: CredibilityTable, config: &MoodConfig) -> Self {
        Self::new(
            credibility,
            config.source_weighting_enabled,
            config.time_weighting_enabled,
        )
    }

    pub fn credibility(&self) -> &CredibilityTable {
        &self.credibility
    }

    /// Credibility of the article's domain; 1.0 when source weighting is off.
    pub fn source_weight(&self, url: &str) -> f64 {
        if !self.source_weighting {
            return 1.0;
        }
        match extract_domain(url) {
            Some(domain) => self.credibility.lookup(&domain),
            None => self.credibility.default_weight(),
        }
    }

    /// Time weight relative to the current time.
    pub fn time_weight(&self, published_at: Option<&str>) -> f64 {
        self.time_weight_at(published_at, Utc::now())
    }

    /// Time weight relative to `now`. Missing or unparseable timestamps get 1.0.
    pub fn time_weight_at(&self, published_at: Option<&str>, now: DateTime<Utc>) -> f64 {
        if !self.time_weighting {
            return 1.0;
        }
        let Some(raw) = published_at else {
            return 1.0;
        };
        match parse_timestamp(raw) {
            Some(published) => {
                let age_days = (now - published).num_milliseconds() as f64 / 86_400_000.0;
                decay(age_days)
            }
            None => {
                tracing::debug!(timestamp = raw, "unparseable timestamp, full time weight");
                1.0
            }
        }
    }

    pub fn article_weight(&self, url: &str, published_at: Option<&str>) -> ArticleWeight {
        self.article_weight_at(url, published_at, Utc::now())
    }

    pub fn article_weight_at(
        &self,
        url: &str,
        published_at: Option<&str>,
        now: DateTime<Utc>,
    ) -> ArticleWeight {
        let source = self.source_weight(url);
        let time = self.time_weight_at(published_at, now);
        ArticleWeight {
            source,
            time,
            combined: source * time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn engine() -> WeightingEngine {
        WeightingEngine::new(CredibilityTable::default(), true, true)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn days_ago(days: i64) -> String {
        (now() - Duration::days(days)).to_rfc3339()
    }

    #[test]
    fn fresh_article_full_weight() {
        let w = engine().time_weight_at(Some(&days_ago(0)), now());
        assert_eq!(w, 1.0);
    }

    #[test]
    fn two_days_is_half() {
        let w = engine().time_weight_at(Some(&days_ago(2)), now());
        assert!((w - 0.5).abs() < 1e-9, "w = {w}");
    }

    #[test]
    fn thirty_days_hits_floor() {
        let w = engine().time_weight_at(Some(&days_ago(30)), now());
        assert_eq!(w, 0.1);
    }

    #[test]
    fn disabled_time_weighting_is_always_one() {
        let e = WeightingEngine::new(CredibilityTable::default(), true, false);
        for days in [0, 2, 30, 365] {
            assert_eq!(e.time_weight_at(Some(&days_ago(days)), now()), 1.0);
        }
    }

    #[test]
    fn malformed_or_missing_timestamp_is_one() {
        let e = engine();
        assert_eq!(e.time_weight_at(Some("last tuesday"), now()), 1.0);
        assert_eq!(e.time_weight_at(Some(""), now()), 1.0);
        assert_eq!(e.time_weight_at(None, now()), 1.0);
    }

    #[test]
    fn future_timestamp_is_one() {
        let future = (now() + Duration::hours(5)).to_rfc3339();
        assert_eq!(engine().time_weight_at(Some(&future), now()), 1.0);
    }

    #[test]
    fn timestamp_formats() {
        assert!(parse_timestamp("2024-03-08T12:00:00Z").is_some());
        assert!(parse_timestamp("2024-03-08T12:00:00+02:00").is_some());
        assert!(parse_timestamp("2024-03-08T12:00:00").is_some());
        assert!(parse_timestamp("2024-03-08 12:00:00").is_some());
        assert!(parse_timestamp("2024-03-08").is_some());
        assert!(parse_timestamp("08/03/2024").is_none());

        let w = engine().time_weight_at(Some("2024-03-08T12:00:00Z"), now());
        assert!((w - 0.5).abs() < 1e-9);
    }

    #[test]
    fn known_domains_and_subdomains() {
        let e = engine();
        assert_eq!(e.source_weight("https://www.bloomberg.com/news/x"), 0.9);
        assert_eq!(e.source_weight("https://markets.reuters.com/a?b=c"), 0.9);
        assert_eq!(e.source_weight("http://twitter.com:443/status/1"), 0.4);
    }

    #[test]
    fn unknown_domain_uses_fallback() {
        let e = engine();
        assert_eq!(e.source_weight("https://example.org/post"), 0.6);
        assert_eq!(e.source_weight(""), 0.6);
    }

    #[test]
    fn disabled_source_weighting_is_one() {
        let e = WeightingEngine::new(CredibilityTable::default(), false, true);
        assert_eq!(e.source_weight("https://twitter.com/x"), 1.0);
    }

    #[test]
    fn combined_is_product() {
        let w = engine().article_weight_at(
            "https://coindesk.com/markets",
            Some(&days_ago(2)),
            now(),
        );
        assert_eq!(w.source, 0.7);
        assert!((w.combined - 0.35).abs() < 1e-9);
    }

    #[test]
    fn domain_extraction() {
        assert_eq!(
            extract_domain("https://WWW.CoinDesk.com/x").as_deref(),
            Some("coindesk.com")
        );
        assert_eq!(
            extract_domain("user:pw@ft.com:8080/path").as_deref(),
            Some("ft.com")
        );
        assert_eq!(extract_domain("reddit.com").as_deref(), Some("reddit.com"));
        assert_eq!(extract_domain("https:///nohost"), None);
    }

    #[test]
    fn credibility_file_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("credibility.json");
        let table = CredibilityTable::load_or_create(&path).unwrap();
        assert_eq!(table, CredibilityTable::default());

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["default"], 0.6);
        assert_eq!(raw["wsj.com"], 0.9);

        std::fs::write(&path, r#"{"example.com": 0.2}"#).unwrap();
        let custom = CredibilityTable::load_or_create(&path).unwrap();
        assert_eq!(custom.default_weight(), 0.6);
        assert_eq!(custom.lookup("example.com"), 0.2);
    }

    #[test]
    fn out_of_range_credibility_rejected() {
        let table = CredibilityTable::new(0.6, [("x.com".to_string(), 1.5)].into());
        assert!(table.validate().is_err());
    }
}
