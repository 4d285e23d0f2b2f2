//! Hierarchical aggregation: sentence → aspect → entity → article → corpus.
//!
//! For each article the [`Aggregator`]:
//!
//! 1. scores the whole document with the ensemble;
//! 2. finds entities and (document-global) aspects with the lexicon matcher;
//! 3. scores every (entity, aspect) pair on the sentences mentioning both,
//!    falling back to the whole-document score when no sentence qualifies;
//! 4. scores each entity as the unweighted mean of its aspects, or, when it
//!    has none, on the sentences mentioning it (again falling back to the
//!    whole document);
//! 5. attaches the article's source × time weight.
//!
//! Articles are analysed in parallel and folded in input order, so a corpus
//! result is deterministic.

pub mod accumulator;
pub mod article;
pub mod corpus;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rayon::prelude::*;

use crate::ensemble::{CombinedSentiment, EnsembleCombiner};
use crate::lexicon::{EntityMatch, LexiconMatcher};
use crate::weighting::WeightingEngine;

pub use accumulator::WeightedAccumulator;
pub use article::{
    ArticleRecord, ArticleResult, AspectBreakdown, EntityBreakdown, ScopedSentiment, TextScope,
};
pub use corpus::{
    AspectSummary, CorpusFold, CorpusResult, EntitySummary, SentimentCategory, category,
};

/// Entity breakdowns and whole-document sentiment of one text.
#[derive(Debug, Clone)]
pub struct DocumentAnalysis {
    pub sentiment: CombinedSentiment,
    pub entities: BTreeMap<String, EntityBreakdown>,
}

/// Runs the rollup over borrowed lexicon, ensemble and weighting state.
#[derive(Debug, Clone, Copy)]
pub struct Aggregator<'a> {
    matcher: &'a LexiconMatcher,
    combiner: &'a EnsembleCombiner,
    weighting: &'a WeightingEngine,
}

impl<'a> Aggregator<'a> {
    pub fn new(
        matcher: &'a LexiconMatcher,
        combiner: &'a EnsembleCombiner,
        weighting: &'a WeightingEngine,
    ) -> Self {
        Self {
            matcher,
            combiner,
            weighting,
        }
    }

    /// Whole-document and per-entity sentiment of `text`.
    pub fn analyze_text(&self, text: &str) -> DocumentAnalysis {
        let overall = self.combiner.combine(text);
        let entities = self
            .matcher
            .identify(text)
            .into_iter()
            .map(|(id, found)| {
                let breakdown = self.entity_breakdown(text, found, &overall);
                (id, breakdown)
            })
            .collect();
        DocumentAnalysis {
            sentiment: overall,
            entities,
        }
    }

    /// Analyse one article against `now`; `None` if it has no text at all.
    pub fn analyze_article_at(
        &self,
        article: &ArticleRecord,
        now: DateTime<Utc>,
    ) -> Option<ArticleResult> {
        let text = article.analysis_text()?;
        let analysis = self.analyze_text(&text);
        let weight =
            self.weighting
                .article_weight_at(&article.url, article.published_at.as_deref(), now);

        Some(ArticleResult {
            title: article.title.clone(),
            url: article.url.clone(),
            source: article.source.clone(),
            published_at: article.published_at.clone(),
            sentiment: analysis.sentiment.vector,
            signals: analysis.sentiment.signal_compounds(),
            degraded: analysis.sentiment.is_degraded(),
            entities: analysis.entities,
            weight,
        })
    }

    /// Aggregate a batch relative to the current time.
    pub fn aggregate(&self, articles: &[ArticleRecord]) -> CorpusResult {
        self.aggregate_at(articles, Utc::now())
    }

    /// Aggregate a batch relative to `now`. An empty batch yields [`CorpusResult::empty`].
    pub fn aggregate_at(&self, articles: &[ArticleRecord], now: DateTime<Utc>) -> CorpusResult {
        if articles.is_empty() {
            tracing::info!("no articles to aggregate");
            return CorpusResult::empty();
        }

        let analysed: Vec<Option<ArticleResult>> = articles
            .par_iter()
            .map(|article| self.analyze_article_at(article, now))
            .collect();

        let mut fold = CorpusFold::new();
        let mut skipped = 0usize;
        for result in analysed {
            match result {
                Some(result) => fold.add(result),
                None => skipped += 1,
            }
        }
        let corpus = fold.finish();

        tracing::info!(
            articles = corpus.article_count,
            skipped,
            entities = corpus.entity_sentiments.len(),
            overall = corpus.overall_sentiment,
            "corpus aggregated"
        );
        corpus
    }

    fn entity_breakdown(
        &self,
        text: &str,
        found: EntityMatch,
        overall: &CombinedSentiment,
    ) -> EntityBreakdown {
        if found.aspects.is_empty() {
            let sentences = self.matcher.relevant_sentences(text, &found.aliases, None);
            let direct = self.score_span(&sentences, TextScope::EntitySentences, overall);
            return EntityBreakdown {
                compound: direct.sentiment.compound,
                aliases: found.aliases,
                aspects: BTreeMap::new(),
                direct: Some(direct),
            };
        }

        let aspects: BTreeMap<String, AspectBreakdown> = found
            .aspects
            .into_iter()
            .map(|(aspect, terms)| {
                let sentences = self
                    .matcher
                    .relevant_sentences(text, &found.aliases, Some(&terms));
                let scored = self.score_span(&sentences, TextScope::RelevantSentences, overall);
                (aspect, AspectBreakdown { terms, scored })
            })
            .collect();

        // Uniform aspect weights.
        let compound =
            aspects.values().map(AspectBreakdown::compound).sum::<f64>() / aspects.len() as f64;

        EntityBreakdown {
            compound,
            aliases: found.aliases,
            aspects,
            direct: None,
        }
    }

    fn score_span(
        &self,
        sentences: &[String],
        scope: TextScope,
        overall: &CombinedSentiment,
    ) -> ScopedSentiment {
        if sentences.is_empty() {
            return ScopedSentiment {
                sentiment: overall.vector,
                scope: TextScope::WholeDocument,
                degraded: overall.is_degraded(),
            };
        }
        let combined = self.combiner.combine(&sentences.join(" "));
        ScopedSentiment {
            sentiment: combined.vector,
            scope,
            degraded: combined.is_degraded(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::SignalWeightTable;
    use crate::lexicon::{AspectLexicon, EntityLexicon, EntitySpec};
    use crate::signal::{ProviderRegistry, SentimentVector, SignalProvider, SignalResult};
    use crate::weighting::CredibilityTable;
    use chrono::TimeZone;

    /// +0.8 if the text says "up", -0.8 if it says "down", else 0.
    struct Keyword;
    impl SignalProvider for Keyword {
        fn id(&self) -> &str {
            "kw"
        }
        fn analyze(&self, text: &str) -> SignalResult<SentimentVector> {
            let up = text.contains("up");
            let down = text.contains("down");
            let compound = match (up, down) {
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

    struct Fixture {
        matcher: LexiconMatcher,
        combiner: EnsembleCombiner,
        weighting: WeightingEngine,
    }

    impl Fixture {
        fn new() -> Self {
            let mut registry = ProviderRegistry::new();
            registry.register(Box::new(Keyword));
            let weights =
                SignalWeightTable::from_weights([("kw".to_string(), 1.0)].into()).unwrap();
            Self {
                matcher: LexiconMatcher::new(
                    &EntityLexicon::default(),
                    &AspectLexicon::default(),
                    Some("crypto"),
                )
                .unwrap(),
                combiner: EnsembleCombiner::new(registry, weights),
                weighting: WeightingEngine::new(CredibilityTable::default(), true, true),
            }
        }

        fn aggregator(&self) -> Aggregator<'_> {
            Aggregator::new(&self.matcher, &self.combiner, &self.weighting)
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn article(title: &str, description: &str, url: &str, published: &str) -> ArticleRecord {
        ArticleRecord {
            title: title.into(),
            description: description.into(),
            url: url.into(),
            published_at: Some(published.into()),
            ..Default::default()
        }
    }

    #[test]
    fn aspect_scored_on_cooccurring_sentences() {
        let f = Fixture::new();
        let text = "Bitcoin price is up. Ethereum regulation is bringing the mood down.";
        let analysis = f.aggregator().analyze_text(text);

        let btc = &analysis.entities["bitcoin"];
        let price = &btc.aspects["price"];
        assert_eq!(price.scored.scope, TextScope::RelevantSentences);
        assert!((price.compound() - 0.8).abs() < 1e-12);

        // Aspects are document-global: bitcoin carries "regulation" too, but no
        // sentence mentions both, so it falls back to the whole document.
        let regulation = &btc.aspects["regulation"];
        assert_eq!(regulation.scored.scope, TextScope::WholeDocument);
        assert_eq!(regulation.scored.sentiment, analysis.sentiment.vector);

        // Entity compound is the plain mean of its aspects.
        let mean = (price.compound() + regulation.compound()) / 2.0;
        assert!((btc.compound - mean).abs() < 1e-12);
        assert!(btc.direct.is_none());
    }

    /// Records every text it is asked to score.
    struct Recorder(std::sync::Arc<std::sync::Mutex<Vec<String>>>);
    impl SignalProvider for Recorder {
        fn id(&self) -> &str {
            "kw"
        }
        fn analyze(&self, text: &str) -> SignalResult<SentimentVector> {
            self.0.lock().unwrap().push(text.to_string());
            Ok(SentimentVector::NEUTRAL)
        }
    }

    #[test]
    fn relevant_sentences_joined_with_spaces() {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut registry = ProviderRegistry::new();
        registry.register(Box::new(Recorder(std::sync::Arc::clone(&seen))));
        let mut f = Fixture::new();
        f.combiner = EnsembleCombiner::new(
            registry,
            SignalWeightTable::from_weights([("kw".to_string(), 1.0)].into()).unwrap(),
        );

        f.aggregator()
            .analyze_text("Bitcoin price is up. Bitcoin price holds!");
        let seen = seen.lock().unwrap();
        assert!(
            seen.iter().any(|t| t == "bitcoin price is up bitcoin price holds"),
            "span texts: {seen:?}"
        );
    }

    #[test]
    fn entity_without_aspects_uses_entity_sentences() {
        let f = Fixture::new();
        let text = "Markets are down today. Cardano holders are up beat.";
        let analysis = f.aggregator().analyze_text(text);
        let ada = &analysis.entities["cardano"];
        assert!(ada.aspects.is_empty());
        let direct = ada.direct.as_ref().unwrap();
        assert_eq!(direct.scope, TextScope::EntitySentences);
        assert!((ada.compound - 0.8).abs() < 1e-12);
    }

    #[test]
    fn whole_document_fallback_without_sentences() {
        let mut f = Fixture::new();
        // An alias containing a sentence terminator matches the document but
        // can never match a single sentence.
        let entities = EntityLexicon::from_entries([(
            "coinio".to_string(),
            EntitySpec {
                aliases: vec!["coin.io".into()],
                importance: 0.5,
            },
        )]);
        f.matcher =
            LexiconMatcher::new(&entities, &AspectLexicon::from_entries(Vec::new()), None)
                .unwrap();

        let analysis = f.aggregator().analyze_text("Coin.io is up");
        let entity = &analysis.entities["coinio"];
        let direct = entity.direct.as_ref().unwrap();
        assert_eq!(direct.scope, TextScope::WholeDocument);
        assert_eq!(direct.sentiment, analysis.sentiment.vector);
        assert!((entity.compound - 0.8).abs() < 1e-12);
    }

    #[test]
    fn empty_batch_is_zeroed() {
        let f = Fixture::new();
        let result = f.aggregator().aggregate_at(&[], now());
        assert_eq!(result, CorpusResult::empty());
    }

    #[test]
    fn blank_articles_are_skipped() {
        let f = Fixture::new();
        let articles = vec![
            ArticleRecord::default(),
            article("Bitcoin is up", "", "https://coindesk.com/a", "2024-03-10T12:00:00Z"),
        ];
        let result = f.aggregator().aggregate_at(&articles, now());
        assert_eq!(result.article_count, 1);
        assert_eq!(result.article_results[0].title, "Bitcoin is up");
    }

    #[test]
    fn corpus_weights_by_source_and_time() {
        let f = Fixture::new();
        let articles = vec![
            // fresh, credibility 0.9
            article(
                "Bitcoin is up",
                "Bitcoin price is up",
                "https://www.reuters.com/x",
                "2024-03-10T12:00:00Z",
            ),
            // two days old, credibility 0.4 => weight 0.2
            article(
                "Bitcoin is down",
                "Bitcoin price is down",
                "https://twitter.com/x",
                "2024-03-08T12:00:00Z",
            ),
        ];
        let result = f.aggregator().aggregate_at(&articles, now());
        assert_eq!(result.article_count, 2);

        let w1 = result.article_results[0].weight.combined;
        let w2 = result.article_results[1].weight.combined;
        assert!((w1 - 0.9).abs() < 1e-9);
        assert!((w2 - 0.2).abs() < 1e-9);

        let expected = (0.8 * w1 - 0.8 * w2) / (w1 + w2);
        assert!((result.overall_sentiment - expected).abs() < 1e-9);

        let btc = &result.entity_sentiments["bitcoin"];
        assert_eq!(btc.article_count, 2);
        assert!((btc.compound - expected).abs() < 1e-9);
        assert!((result.aspect_sentiments["price"].compound - expected).abs() < 1e-9);
        assert!((result.signal_sentiments["kw"] - expected).abs() < 1e-9);
    }

    #[test]
    fn aggregation_is_deterministic() {
        let f = Fixture::new();
        let articles: Vec<ArticleRecord> = (0..64)
            .map(|i| {
                let mood = if i % 3 == 0 { "down" } else { "up" };
                article(
                    &format!("Bitcoin price {mood} {i}"),
                    "Ethereum adoption grows",
                    "https://coindesk.com/a",
                    &format!("2024-03-0{}T00:00:00Z", 1 + i % 9),
                )
            })
            .collect();
        let a = f.aggregator().aggregate_at(&articles, now());
        let b = f.aggregator().aggregate_at(&articles, now());
        assert_eq!(a, b);
        assert_eq!(a.article_count, 64);
        assert_eq!(a.article_results[5].title, "Bitcoin price up 5");
    }

    #[test]
    fn article_without_entities_still_counts_overall() {
        let f = Fixture::new();
        let articles = vec![article(
            "Stocks are up",
            "",
            "https://example.org",
            "2024-03-10T12:00:00Z",
        )];
        let result = f.aggregator().aggregate_at(&articles, now());
        assert_eq!(result.article_count, 1);
        assert!(result.entity_sentiments.is_empty());
        assert!((result.overall_sentiment - 0.8).abs() < 1e-9);
    }
}
