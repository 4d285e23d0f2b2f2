//! Per-article analysis: span → aspect → entity → article.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::signal::SentimentVector;
use crate::weighting::ArticleWeight;

/// One retrieved article, as handed to the aggregator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub url: String,
    /// Source name or domain as reported by the news collaborator.
    #[serde(default)]
    pub source: String,
    #[serde(default, alias = "publishedAt")]
    pub published_at: Option<String>,
}

impl ArticleRecord {
    /// Text the article is analysed on.
    ///
    /// The title is joined with whichever of content and description is
    /// longer (description on a tie). `None` when all three are blank.
    pub fn analysis_text(&self) -> Option<String> {
        let title = self.title.trim();
        let description = self.description.trim();
        let content = self.content.trim();
        if title.is_empty() && description.is_empty() && content.is_empty() {
            return None;
        }
        let body = if content.chars().count() > description.chars().count() {
            content
        } else {
            description
        };
        Some(format!("{title}. {body}"))
    }
}

/// Which text a score was computed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextScope {
    /// Sentences mentioning the entity and the aspect (or just the entity).
    RelevantSentences,
    /// Sentences mentioning the entity; used when it has no aspects.
    EntitySentences,
    /// No qualifying sentence: the whole-document sentiment.
    WholeDocument,
}

/// A sentiment together with the text it was computed on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopedSentiment {
    pub sentiment: SentimentVector,
    pub scope: TextScope,
    /// Some signal fell back to neutral while scoring this text.
    #[serde(default)]
    pub degraded: bool,
}

/// One aspect of one entity within an article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectBreakdown {
    /// Aspect terms found in the document.
    pub terms: BTreeSet<String>,
    #[serde(flatten)]
    pub scored: ScopedSentiment,
}

impl AspectBreakdown {
    pub fn compound(&self) -> f64 {
        self.scored.sentiment.compound
    }
}

/// One entity within an article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityBreakdown {
    /// Mean of the aspect compounds, or the direct score when there are no aspects.
    pub compound: f64,
    pub aliases: BTreeSet<String>,
    pub aspects: BTreeMap<String, AspectBreakdown>,
    /// Entity-level score; present only when no aspect matched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct: Option<ScopedSentiment>,
}

/// Everything one article contributes to the corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleResult {
    pub title: String,
    pub url: String,
    pub source: String,
    #[serde(default)]
    pub published_at: Option<String>,
    /// Whole-document sentiment.
    pub sentiment: SentimentVector,
    /// Whole-document compound per signal.
    #[serde(default)]
    pub signals: BTreeMap<String, f64>,
    #[serde(default)]
    pub degraded: bool,
    pub entities: BTreeMap<String, EntityBreakdown>,
    pub weight: ArticleWeight,
}
