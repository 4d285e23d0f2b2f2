//! Analyzer facade: top-level API for coinmood.
//!
//! The `SentimentAnalyzer` owns every subsystem (lexicon matcher, ensemble,
//! weighting, cache, news source) and exposes the entry points used by the
//! CLI. The analysis entry points never fail: retrieval errors, provider
//! errors and cache problems all degrade to neutral or empty results.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::{CacheEntry, CacheLookup, CacheManager};
use crate::config::MoodConfig;
use crate::ensemble::{EnsembleCombiner, SignalWeightTable};
use crate::error::MoodResult;
use crate::lexicon::{AspectLexicon, EntityLexicon, LexiconMatcher};
use crate::news::{NewsQuery, NewsSource};
use crate::paths::MoodPaths;
use crate::rollup::{
    Aggregator, ArticleRecord, AspectSummary, CorpusResult, SentimentCategory, category,
};
use crate::signal::{ProviderRegistry, RemoteLabelProvider, SignalProvider, ValenceLexiconProvider};
use crate::trainer::{CorrelationImportance, TrainingSet, WeightTrainer};
use crate::weighting::{CredibilityTable, WeightingEngine};

/// Importance reported for entities missing from the lexicon.
const DEFAULT_IMPORTANCE: f64 = 0.5;

/// Look-back window used when a request does not name one.
pub const DEFAULT_DAYS: u32 = 3;

/// Register the built-in lexicon signal and every configured remote provider.
///
/// Remote providers that fail to construct are logged and left out.
pub fn default_registry(config: &MoodConfig) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();
    registry.register(Box::new(ValenceLexiconProvider::new()));
    for provider in &config.providers {
        registry.try_register(
            RemoteLabelProvider::new(provider).map(|p| Box::new(p) as Box<dyn SignalProvider>),
        );
    }
    registry
}

/// Write every default file that does not exist yet. Idempotent.
pub fn init_files(paths: &MoodPaths, config: &MoodConfig) -> MoodResult<()> {
    paths.ensure_dirs()?;
    if !paths.config_file().exists() {
        config.save(&paths.config_file())?;
    }
    EntityLexicon::load_or_create(&paths.entities_file())?;
    AspectLexicon::load_or_create(&paths.aspects_file())?;
    CredibilityTable::load_or_create(&paths.credibility_file())?;
    if !paths.weights_file().exists() {
        SignalWeightTable::default().save(&paths.weights_file())?;
    }
    tracing::info!(data_dir = %paths.data_dir.display(), "initialized coinmood files");
    Ok(())
}

// ---------------------------------------------------------------------------
// Requests and reports
// ---------------------------------------------------------------------------

/// Parameters of one market analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    /// `None` uses the configured keywords.
    pub keywords: Option<Vec<String>>,
    /// Look-back window in days.
    pub days: u32,
    /// Skip the cache and recompute.
    pub refresh: bool,
    /// Entity (id or alias) to report on in detail.
    pub focus: Option<String>,
}

impl Default for AnalysisRequest {
    fn default() -> Self {
        Self {
            keywords: None,
            days: DEFAULT_DAYS,
            refresh: false,
            focus: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectReport {
    pub compound: f64,
    pub category: SentimentCategory,
    pub article_count: usize,
}

impl From<&AspectSummary> for AspectReport {
    fn from(s: &AspectSummary) -> Self {
        Self {
            compound: s.compound,
            category: category(s.compound),
            article_count: s.article_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityReport {
    pub compound: f64,
    pub category: SentimentCategory,
    /// Lexicon importance, or 0.5 for entities the lexicon does not know.
    pub importance: f64,
    pub article_count: usize,
    pub aspects: BTreeMap<String, AspectReport>,
}

/// One article mentioning a focus entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityArticle {
    pub title: String,
    pub url: String,
    pub source: String,
    pub published_at: Option<String>,
    /// The entity's compound within this article.
    pub compound: f64,
}

/// Detailed view of one entity in a corpus result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySentiment {
    pub entity: String,
    pub compound: f64,
    pub category: SentimentCategory,
    pub article_count: usize,
    pub aspects: BTreeMap<String, AspectSummary>,
    pub articles: Vec<EntityArticle>,
}

/// The requested focus entity and what was found for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocusReport {
    pub requested: String,
    /// `None` when the entity is unknown or absent from the corpus.
    pub sentiment: Option<EntitySentiment>,
}

/// Result of [`SentimentAnalyzer::analyze`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketReport {
    pub timestamp: DateTime<Utc>,
    pub keywords: Vec<String>,
    pub days: u32,
    pub overall_sentiment: f64,
    pub category: SentimentCategory,
    pub article_count: usize,
    pub entities: BTreeMap<String, EntityReport>,
    pub aspects: BTreeMap<String, AspectReport>,
    pub signals: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<FocusReport>,
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

/// Everything a [`SentimentAnalyzer`] is built from.
pub struct AnalyzerParts {
    pub config: MoodConfig,
    pub entities: EntityLexicon,
    pub aspects: AspectLexicon,
    pub credibility: CredibilityTable,
    pub registry: ProviderRegistry,
    pub weights: SignalWeightTable,
    pub cache: CacheManager,
    pub news: Box<dyn NewsSource>,
    /// Where trained or updated weights are persisted. `None` keeps them in memory.
    pub weights_path: Option<PathBuf>,
}

/// The coinmood sentiment analyzer.
pub struct SentimentAnalyzer {
    config: MoodConfig,
    entities: EntityLexicon,
    matcher: LexiconMatcher,
    combiner: EnsembleCombiner,
    weighting: WeightingEngine,
    cache: CacheManager,
    news: Box<dyn NewsSource>,
    weights_path: Option<PathBuf>,
}

impl SentimentAnalyzer {
    /// Assemble an analyzer from explicit parts.
    pub fn new(parts: AnalyzerParts) -> MoodResult<Self> {
        parts.config.validate()?;
        parts.entities.validate()?;
        let matcher = LexiconMatcher::new(
            &parts.entities,
            &parts.aspects,
            parts.config.fallback_entity.as_deref(),
        )?;
        let weighting = WeightingEngine::from_config(parts.credibility, &parts.config);
        let combiner = EnsembleCombiner::new(parts.registry, parts.weights);

        tracing::info!(
            entities = parts.entities.len(),
            aspects = parts.aspects.len(),
            signals = ?combiner.active_signals(),
            "initializing coinmood analyzer"
        );

        Ok(Self {
            config: parts.config,
            entities: parts.entities,
            matcher,
            combiner,
            weighting,
            cache: parts.cache,
            news: parts.news,
            weights_path: parts.weights_path,
        })
    }

    /// Open with files under `paths`, creating default lexicons where missing.
    pub fn open(paths: &MoodPaths, config: MoodConfig, news: Box<dyn NewsSource>) -> MoodResult<Self> {
        paths.ensure_dirs()?;
        let parts = AnalyzerParts {
            entities: EntityLexicon::load_or_create(&paths.entities_file())?,
            aspects: AspectLexicon::load_or_create(&paths.aspects_file())?,
            credibility: CredibilityTable::load_or_create(&paths.credibility_file())?,
            registry: default_registry(&config),
            weights: SignalWeightTable::load_or_default(&paths.weights_file())?,
            cache: CacheManager::new(paths.cache_file(), config.cache_ttl()),
            news,
            weights_path: Some(paths.weights_file()),
            config,
        };
        Self::new(parts)
    }

    pub fn config(&self) -> &MoodConfig {
        &self.config
    }

    pub fn entities(&self) -> &EntityLexicon {
        &self.entities
    }

    pub fn combiner(&self) -> &EnsembleCombiner {
        &self.combiner
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    fn aggregator(&self) -> Aggregator<'_> {
        Aggregator::new(&self.matcher, &self.combiner, &self.weighting)
    }

    /// Aggregate a given batch of articles, bypassing retrieval and cache.
    pub fn analyze_articles(&self, articles: &[ArticleRecord]) -> CorpusResult {
        self.aggregator().aggregate(articles)
    }

    /// Cached or fresh corpus result for the request.
    pub fn market_sentiment(&self, keywords: Option<&[String]>, days: u32, refresh: bool) -> CacheEntry {
        self.market_sentiment_at(keywords, days, refresh, Utc::now())
    }

    /// [`market_sentiment`](Self::market_sentiment) relative to `now`.
    pub fn market_sentiment_at(
        &self,
        keywords: Option<&[String]>,
        days: u32,
        refresh: bool,
        now: DateTime<Utc>,
    ) -> CacheEntry {
        let keywords = keywords
            .map(<[String]>::to_vec)
            .unwrap_or_else(|| self.config.keywords.clone());

        if !refresh {
            match self.cache.read_at(&keywords, days, now) {
                CacheLookup::Hit(entry) => {
                    tracing::info!(articles = entry.result.article_count, "using cached sentiment");
                    return entry;
                }
                CacheLookup::Miss(reason) => {
                    tracing::debug!(?reason, "sentiment cache miss");
                }
            }
        }

        let query = NewsQuery::last_days(
            keywords.clone(),
            days,
            self.config.language.clone(),
            self.config.max_articles,
            now,
        );
        let articles = self.news.fetch_or_empty(&query);
        let result = self.aggregator().aggregate_at(&articles, now);

        let entry = CacheEntry::new(now, keywords, days, result);
        self.cache.write(&entry);
        entry
    }

    /// Full market report, with an optional focus entity.
    pub fn analyze(&self, request: &AnalysisRequest) -> MarketReport {
        self.analyze_at(request, Utc::now())
    }

    /// [`analyze`](Self::analyze) relative to `now`.
    pub fn analyze_at(&self, request: &AnalysisRequest, now: DateTime<Utc>) -> MarketReport {
        let entry =
            self.market_sentiment_at(request.keywords.as_deref(), request.days, request.refresh, now);
        self.report(entry, request.focus.as_deref())
    }

    /// Shape a cache entry into a report.
    pub fn report(&self, entry: CacheEntry, focus: Option<&str>) -> MarketReport {
        let result = &entry.result;
        let entities: BTreeMap<String, EntityReport> = result
            .entity_sentiments
            .iter()
            .map(|(id, summary)| {
                let report = EntityReport {
                    compound: summary.compound,
                    category: category(summary.compound),
                    importance: self.entities.importance(id).unwrap_or(DEFAULT_IMPORTANCE),
                    article_count: summary.article_count,
                    aspects: summary
                        .aspects
                        .iter()
                        .map(|(a, s)| (a.clone(), AspectReport::from(s)))
                        .collect(),
                };
                (id.clone(), report)
            })
            .collect();

        let focus = focus.map(|name| FocusReport {
            requested: name.to_string(),
            sentiment: self.entity_sentiment(name, result),
        });

        MarketReport {
            timestamp: entry.timestamp,
            keywords: entry.keywords.clone(),
            days: entry.days,
            overall_sentiment: result.overall_sentiment,
            category: result.category(),
            article_count: result.article_count,
            entities,
            aspects: result
                .aspect_sentiments
                .iter()
                .map(|(a, s)| (a.clone(), AspectReport::from(s)))
                .collect(),
            signals: result.signal_sentiments.clone(),
            focus,
        }
    }

    /// Detailed sentiment of one entity, found by id or (case-insensitive) alias.
    pub fn entity_sentiment(&self, name: &str, corpus: &CorpusResult) -> Option<EntitySentiment> {
        let id = if corpus.entity_sentiments.contains_key(name) {
            name.to_string()
        } else {
            self.entities.resolve(name)?.to_string()
        };
        let Some(summary) = corpus.entity_sentiments.get(&id) else {
            tracing::info!(entity = %id, "entity not found in corpus");
            return None;
        };

        let articles = corpus
            .article_results
            .iter()
            .filter_map(|article| {
                article.entities.get(&id).map(|breakdown| EntityArticle {
                    title: article.title.clone(),
                    url: article.url.clone(),
                    source: article.source.clone(),
                    published_at: article.published_at.clone(),
                    compound: breakdown.compound,
                })
            })
            .collect();

        Some(EntitySentiment {
            compound: summary.compound,
            category: category(summary.compound),
            article_count: summary.article_count,
            aspects: summary.aspects.clone(),
            articles,
            entity: id,
        })
    }

    /// Merge new ensemble weights and persist the table.
    pub fn update_weights(&self, weights: &BTreeMap<String, f64>) -> MoodResult<()> {
        self.combiner.update_weights(weights)?;
        self.persist_weights()
    }

    /// Learn weights from a training set and persist the table.
    pub fn train(&self, set: &TrainingSet) -> MoodResult<BTreeMap<String, f64>> {
        let fitted = WeightTrainer::new(CorrelationImportance).train(
            &self.combiner,
            &set.observations,
            &set.outcomes,
        )?;
        self.persist_weights()?;
        Ok(fitted)
    }

    fn persist_weights(&self) -> MoodResult<()> {
        if let Some(path) = &self.weights_path {
            self.combiner.weights().save(path)?;
            tracing::debug!(path = %path.display(), "weight table saved");
        }
        Ok(())
    }
}

impl std::fmt::Debug for SentimentAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentimentAnalyzer")
            .field("entities", &self.entities.len())
            .field("combiner", &self.combiner)
            .field("cache", &self.cache.path())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news::{NewsError, NewsResult, StaticNewsSource};
    use crate::signal::{SentimentVector, SignalResult};
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// +0.8 for "up", -0.8 for "down".
    struct Keyword;
    impl SignalProvider for Keyword {
        fn id(&self) -> &str {
            "kw"
        }
        fn analyze(&self, text: &str) -> SignalResult<SentimentVector> {
            let compound = match (text.contains(" up"), text.contains(" down")) {
                (true, false) => 0.8,
                (false, true) => -0.8,
                _ => 0.0,
            };
            Ok(SentimentVector {
                compound,
                positive: compound.max(0.0),
                negative: (-compound).max(0.0),
                neutral: 1.0 - compound.abs(),
            })
        }
    }

    /// Counts fetches so tests can tell cache hits from recomputation.
    struct Counting {
        inner: StaticNewsSource,
        calls: Arc<AtomicUsize>,
    }
    impl NewsSource for Counting {
        fn fetch(&self, query: &NewsQuery) -> NewsResult<Vec<ArticleRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch(query)
        }
    }

    struct Offline;
    impl NewsSource for Offline {
        fn fetch(&self, _query: &NewsQuery) -> NewsResult<Vec<ArticleRecord>> {
            Err(NewsError::Request {
                message: "offline".into(),
            })
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn articles() -> Vec<ArticleRecord> {
        vec![
            ArticleRecord {
                title: "Bitcoin price goes up".into(),
                description: "BTC price is up on ETF demand".into(),
                url: "https://www.reuters.com/markets/btc".into(),
                source: "Reuters".into(),
                published_at: Some("2024-03-10T10:00:00Z".into()),
                ..Default::default()
            },
            ArticleRecord {
                title: "Ethereum regulation worries".into(),
                description: "Ethereum sentiment turns down after regulation news".into(),
                url: "https://coindesk.com/policy/eth".into(),
                source: "CoinDesk".into(),
                published_at: Some("2024-03-09T12:00:00Z".into()),
                ..Default::default()
            },
        ]
    }

    fn analyzer(dir: &tempfile::TempDir, news: Box<dyn NewsSource>) -> SentimentAnalyzer {
        let mut registry = ProviderRegistry::new();
        registry.register(Box::new(Keyword));
        SentimentAnalyzer::new(AnalyzerParts {
            config: MoodConfig::default(),
            entities: EntityLexicon::default(),
            aspects: AspectLexicon::default(),
            credibility: CredibilityTable::default(),
            registry,
            weights: SignalWeightTable::from_weights([("kw".to_string(), 1.0)].into()).unwrap(),
            cache: CacheManager::new(dir.path().join("cache.json"), Duration::hours(3)),
            news,
            weights_path: Some(dir.path().join("weights.json")),
        })
        .unwrap()
    }

    fn counting() -> (Box<dyn NewsSource>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = Counting {
            inner: StaticNewsSource::new(articles()),
            calls: Arc::clone(&calls),
        };
        (Box::new(source), calls)
    }

    #[test]
    fn analyze_builds_a_categorized_report() {
        let dir = tempfile::TempDir::new().unwrap();
        let (news, _) = counting();
        let a = analyzer(&dir, news);
        let report = a.analyze_at(
            &AnalysisRequest {
                focus: Some("BTC".into()),
                ..Default::default()
            },
            now(),
        );

        assert_eq!(report.article_count, 2);
        assert_eq!(report.keywords, MoodConfig::default().keywords);
        let btc = &report.entities["bitcoin"];
        assert_eq!(btc.category, SentimentCategory::VeryBullish);
        assert_eq!(btc.importance, 1.0);
        let eth = &report.entities["ethereum"];
        assert_eq!(eth.importance, 0.9);
        assert!(eth.compound < 0.0);

        let focus = report.focus.unwrap();
        assert_eq!(focus.requested, "BTC");
        let detail = focus.sentiment.unwrap();
        assert_eq!(detail.entity, "bitcoin");
        assert_eq!(detail.articles.len(), 1);
        assert_eq!(detail.articles[0].source, "Reuters");
    }

    #[test]
    fn default_request_covers_three_days() {
        let request = AnalysisRequest::default();
        assert_eq!(request.days, 3);
        assert!(!request.refresh);

        let dir = tempfile::TempDir::new().unwrap();
        let (news, _) = counting();
        let report = analyzer(&dir, news).analyze_at(&request, now());
        assert_eq!(report.days, 3);
    }

    #[test]
    fn second_call_within_ttl_uses_cache() {
        let dir = tempfile::TempDir::new().unwrap();
        let (news, calls) = counting();
        let a = analyzer(&dir, news);

        let first = a.market_sentiment_at(None, 1, false, now());
        let second = a.market_sentiment_at(None, 1, false, now() + Duration::hours(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);

        a.market_sentiment_at(None, 1, true, now() + Duration::hours(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2, "refresh must bypass the cache");

        a.market_sentiment_at(None, 1, false, now() + Duration::hours(5));
        assert_eq!(calls.load(Ordering::SeqCst), 3, "expired entry must be recomputed");
    }

    #[test]
    fn different_keywords_bypass_cache() {
        let dir = tempfile::TempDir::new().unwrap();
        let (news, calls) = counting();
        let a = analyzer(&dir, news);
        a.market_sentiment_at(None, 1, false, now());
        let other = vec!["ethereum".to_string()];
        let entry = a.market_sentiment_at(Some(&other), 1, false, now());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(entry.keywords, other);
    }

    #[test]
    fn retrieval_failure_yields_zeroed_report() {
        let dir = tempfile::TempDir::new().unwrap();
        let a = analyzer(&dir, Box::new(Offline));
        let report = a.analyze_at(&AnalysisRequest::default(), now());
        assert_eq!(report.article_count, 0);
        assert_eq!(report.overall_sentiment, 0.0);
        assert_eq!(report.category, SentimentCategory::Neutral);
        assert!(report.entities.is_empty());
        assert!(report.aspects.is_empty());
    }

    #[test]
    fn unknown_focus_is_not_found() {
        let dir = tempfile::TempDir::new().unwrap();
        let (news, _) = counting();
        let a = analyzer(&dir, news);
        let report = a.analyze_at(
            &AnalysisRequest {
                focus: Some("dogecoin".into()),
                ..Default::default()
            },
            now(),
        );
        let focus = report.focus.unwrap();
        assert!(focus.sentiment.is_none());

        // Known to the lexicon but not in this corpus.
        let corpus = a.analyze_articles(&articles());
        assert!(a.entity_sentiment("cardano", &corpus).is_none());
        assert!(a.entity_sentiment("ether", &corpus).is_some());
    }

    #[test]
    fn weight_updates_are_persisted() {
        let dir = tempfile::TempDir::new().unwrap();
        let (news, _) = counting();
        let a = analyzer(&dir, news);
        a.update_weights(&[("kw".to_string(), 2.0), ("other".to_string(), 2.0)].into())
            .unwrap();
        let saved = SignalWeightTable::load(&dir.path().join("weights.json")).unwrap();
        assert_eq!(saved.get("kw"), Some(0.5));

        assert!(a.update_weights(&[("kw".to_string(), 0.0)].into()).is_err());
        assert_eq!(a.combiner().weights(), saved);
    }

    #[test]
    fn default_registry_has_lexicon_and_skips_broken_remotes() {
        let config = MoodConfig {
            providers: vec![crate::config::RemoteProviderConfig {
                id: "broken".into(),
                endpoint: String::new(),
                token_env: None,
                timeout_secs: 5,
                labels: Default::default(),
            }],
            ..Default::default()
        };
        let registry = default_registry(&config);
        assert!(registry.contains("lexicon"));
        assert!(!registry.contains("broken"));
    }
}
