//! Corpus-level fold of article results, and the sentiment categories.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::accumulator::WeightedAccumulator;
use super::article::ArticleResult;

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// Five-bucket reading of a compound score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentCategory {
    #[serde(rename = "very bullish")]
    VeryBullish,
    #[serde(rename = "bullish")]
    Bullish,
    #[serde(rename = "neutral")]
    Neutral,
    #[serde(rename = "bearish")]
    Bearish,
    #[serde(rename = "very bearish")]
    VeryBearish,
}

impl SentimentCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VeryBullish => "very bullish",
            Self::Bullish => "bullish",
            Self::Neutral => "neutral",
            Self::Bearish => "bearish",
            Self::VeryBearish => "very bearish",
        }
    }
}

impl std::fmt::Display for SentimentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upper edges are inclusive except for the lowest bucket.
pub fn category(score: f64) -> SentimentCategory {
    if score >= 0.6 {
        SentimentCategory::VeryBullish
    } else if score >= 0.2 {
        SentimentCategory::Bullish
    } else if score > -0.2 {
        SentimentCategory::Neutral
    } else if score > -0.6 {
        SentimentCategory::Bearish
    } else {
        SentimentCategory::VeryBearish
    }
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

/// Weighted score of one aspect, across the corpus or within one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectSummary {
    pub compound: f64,
    pub article_count: usize,
    pub weight_sum: f64,
}

impl From<&WeightedAccumulator> for AspectSummary {
    fn from(acc: &WeightedAccumulator) -> Self {
        Self {
            compound: acc.score(),
            article_count: acc.count,
            weight_sum: acc.weight_sum,
        }
    }
}

/// Weighted score of one entity, with its per-aspect breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySummary {
    pub compound: f64,
    pub article_count: usize,
    pub weight_sum: f64,
    #[serde(default)]
    pub aspects: BTreeMap<String, AspectSummary>,
}

/// Result of one aggregation pass.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CorpusResult {
    pub overall_sentiment: f64,
    pub entity_sentiments: BTreeMap<String, EntitySummary>,
    pub aspect_sentiments: BTreeMap<String, AspectSummary>,
    /// Weighted whole-document compound per signal.
    #[serde(default)]
    pub signal_sentiments: BTreeMap<String, f64>,
    pub article_results: Vec<ArticleResult>,
    pub article_count: usize,
}

impl CorpusResult {
    /// The defined result of aggregating nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn category(&self) -> SentimentCategory {
        category(self.overall_sentiment)
    }
}

// ---------------------------------------------------------------------------
// Fold
// ---------------------------------------------------------------------------

/// Ordered fold of article results into a [`CorpusResult`].
///
/// Every contribution is `compound × article weight`. Aspect accumulators
/// receive one contribution per (entity, aspect) occurrence.
#[derive(Debug, Default)]
pub struct CorpusFold {
    overall: WeightedAccumulator,
    entities: BTreeMap<String, WeightedAccumulator>,
    entity_aspects: BTreeMap<String, BTreeMap<String, WeightedAccumulator>>,
    aspects: BTreeMap<String, WeightedAccumulator>,
    signals: BTreeMap<String, WeightedAccumulator>,
    results: Vec<ArticleResult>,
}

impl CorpusFold {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, article: ArticleResult) {
        let weight = article.weight.combined;
        self.overall.add(article.sentiment.compound, weight);

        for (id, compound) in &article.signals {
            self.signals.entry(id.clone()).or_default().add(*compound, weight);
        }

        for (entity, breakdown) in &article.entities {
            self.entities
                .entry(entity.clone())
                .or_default()
                .add(breakdown.compound, weight);

            let per_entity = self.entity_aspects.entry(entity.clone()).or_default();
            for (aspect, scored) in &breakdown.aspects {
                let compound = scored.compound();
                per_entity
                    .entry(aspect.clone())
                    .or_default()
                    .add(compound, weight);
                self.aspects
                    .entry(aspect.clone())
                    .or_default()
                    .add(compound, weight);
            }
        }

        self.results.push(article);
    }

    pub fn finish(self) -> CorpusResult {
        let entity_sentiments = self
            .entities
            .iter()
            .map(|(id, acc)| {
                let aspects: BTreeMap<String, AspectSummary> = self
                    .entity_aspects
                    .get(id)
                    .map(|m| m.iter().map(|(a, acc)| (a.clone(), acc.into())).collect())
                    .unwrap_or_default();
                let summary = EntitySummary {
                    compound: acc.score(),
                    article_count: acc.count,
                    weight_sum: acc.weight_sum,
                    aspects,
                };
                (id.clone(), summary)
            })
            .collect();

        CorpusResult {
            overall_sentiment: self.overall.score(),
            entity_sentiments,
            aspect_sentiments: self
                .aspects
                .iter()
                .map(|(a, acc)| (a.clone(), acc.into()))
                .collect(),
            signal_sentiments: self
                .signals
                .iter()
                .map(|(id, acc)| (id.clone(), acc.score()))
                .collect(),
            article_count: self.results.len(),
            article_results: self.results,
        }
    }
}
