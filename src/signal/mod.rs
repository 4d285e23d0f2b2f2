//! Signal providers: anything that turns a text into a [`SentimentVector`].
//!
//! Providers implement [`SignalProvider`] and are registered in a
//! [`ProviderRegistry`]. The registry is the failure boundary: a provider
//! error never escapes [`ProviderRegistry::score`], it becomes the neutral
//! vector tagged [`SignalStatus::Degraded`] so callers can tell an exact
//! zero apart from a failed call.

pub mod remote;
pub mod valence;

use std::collections::{BTreeMap, HashMap};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use remote::RemoteLabelProvider;
pub use valence::ValenceLexiconProvider;

/// Texts are truncated to this many characters before reaching a provider.
pub const MAX_TEXT_CHARS: usize = 512;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised inside signal providers.
#[derive(Debug, Error, Diagnostic)]
pub enum SignalError {
    #[error("signal provider \"{provider}\" failed to initialize: {message}")]
    #[diagnostic(
        code(coinmood::signal::init),
        help("The provider is left out of the active set; its ensemble weight contributes nothing.")
    )]
    Init { provider: String, message: String },

    #[error("environment variable {var} is not set for provider \"{provider}\"")]
    #[diagnostic(
        code(coinmood::signal::missing_token),
        help("Export the token variable, or remove `token_env` from the provider config.")
    )]
    MissingToken { provider: String, var: String },

    #[error("request to provider \"{provider}\" failed: {message}")]
    #[diagnostic(
        code(coinmood::signal::request),
        help("Check that the endpoint is reachable and the token is valid.")
    )]
    Request { provider: String, message: String },

    #[error("unexpected response from provider \"{provider}\": {message}")]
    #[diagnostic(
        code(coinmood::signal::response),
        help("The endpoint must return [{{\"label\": .., \"score\": ..}}] or a nested list of those.")
    )]
    Response { provider: String, message: String },

    #[error("provider \"{provider}\" returned unknown label \"{label}\"")]
    #[diagnostic(
        code(coinmood::signal::unknown_label),
        help("Map the raw label in the provider's `labels` table, e.g. LABEL_0 = \"negative\".")
    )]
    UnknownLabel { provider: String, label: String },
}

pub type SignalResult<T> = std::result::Result<T, SignalError>;

// ---------------------------------------------------------------------------
// Sentiment vector
// ---------------------------------------------------------------------------

/// Normalized sentiment of one text according to one signal (or a blend).
///
/// `positive + negative + neutral` is 1 whenever any of them is nonzero;
/// all-zero is the valid "unset" state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SentimentVector {
    /// Scalar sentiment in `[-1, 1]`; positive is bullish.
    pub compound: f64,
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
}

impl SentimentVector {
    /// What a provider reports when it cannot say anything.
    pub const NEUTRAL: Self = Self {
        compound: 0.0,
        positive: 0.0,
        negative: 0.0,
        neutral: 1.0,
    };

    /// All components zero.
    pub const UNSET: Self = Self {
        compound: 0.0,
        positive: 0.0,
        negative: 0.0,
        neutral: 0.0,
    };

    /// Map a classifier label and its confidence onto a vector.
    ///
    /// A neutral label keeps only `neutral = score`; the ensemble's
    /// renormalization restores the unit sum.
    pub fn from_label(label: SentimentLabel, score: f64) -> Self {
        let s = if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 };
        match label {
            SentimentLabel::Positive => Self {
                compound: s,
                positive: s,
                negative: 0.0,
                neutral: 1.0 - s,
            },
            SentimentLabel::Negative => Self {
                compound: -s,
                positive: 0.0,
                negative: s,
                neutral: 1.0 - s,
            },
            SentimentLabel::Neutral => Self {
                compound: 0.0,
                positive: 0.0,
                negative: 0.0,
                neutral: s,
            },
        }
    }

    pub fn is_unset(&self) -> bool {
        self.compound == 0.0 && self.positive == 0.0 && self.negative == 0.0 && self.neutral == 0.0
    }

    /// Rescale the three shares to sum to 1. A zero sum leaves them at zero.
    pub fn normalized(self) -> Self {
        let total = self.positive + self.negative + self.neutral;
        if total > 0.0 {
            Self {
                compound: self.compound,
                positive: self.positive / total,
                negative: self.negative / total,
                neutral: self.neutral / total,
            }
        } else {
            Self {
                compound: self.compound,
                positive: 0.0,
                negative: 0.0,
                neutral: 0.0,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Labels
// ---------------------------------------------------------------------------

/// The three labels every backend vocabulary is folded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

/// Case-insensitive raw label → [`SentimentLabel`] table for one backend.
#[derive(Debug, Clone)]
pub struct LabelVocabulary {
    labels: HashMap<String, SentimentLabel>,
}

impl Default for LabelVocabulary {
    fn default() -> Self {
        let mut labels = HashMap::new();
        for (raw, label) in [
            ("positive", SentimentLabel::Positive),
            ("pos", SentimentLabel::Positive),
            ("negative", SentimentLabel::Negative),
            ("neg", SentimentLabel::Negative),
            ("neutral", SentimentLabel::Neutral),
            ("neu", SentimentLabel::Neutral),
        ] {
            labels.insert(raw.to_string(), label);
        }
        Self { labels }
    }
}

impl LabelVocabulary {
    /// Add (or override) a raw label mapping.
    pub fn with(mut self, raw: &str, label: SentimentLabel) -> Self {
        self.labels.insert(raw.to_lowercase(), label);
        self
    }

    pub fn resolve(&self, raw: &str) -> Option<SentimentLabel> {
        self.labels.get(&raw.trim().to_lowercase()).copied()
    }
}

// ---------------------------------------------------------------------------
// Provider trait and registry
// ---------------------------------------------------------------------------

/// A source of per-text sentiment.
///
/// Implementations may fail; the registry turns failures into the neutral
/// vector. Calls must be pure in `(text, id)` so they can run in parallel.
pub trait SignalProvider: Send + Sync {
    /// Identifier matched against the ensemble weight table.
    fn id(&self) -> &str;

    /// Score a text already truncated to [`MAX_TEXT_CHARS`].
    fn analyze(&self, text: &str) -> SignalResult<SentimentVector>;
}

/// Whether a reading came from the provider or from the failure fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SignalStatus {
    Ok,
    Degraded { reason: String },
}

/// One provider's answer for one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalReading {
    pub vector: SentimentVector,
    pub status: SignalStatus,
}

impl SignalReading {
    pub fn is_degraded(&self) -> bool {
        matches!(self.status, SignalStatus::Degraded { .. })
    }
}

/// The active provider set, keyed by provider id.
pub struct ProviderRegistry {
    providers: BTreeMap<String, Box<dyn SignalProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: BTreeMap::new(),
        }
    }

    /// Register a provider. A provider with the same id is replaced.
    pub fn register(&mut self, provider: Box<dyn SignalProvider>) {
        self.providers.insert(provider.id().to_string(), provider);
    }

    /// Register the outcome of a provider's construction.
    ///
    /// A failed construction is logged and the provider stays absent.
    /// Returns whether the provider was registered.
    pub fn try_register(&mut self, outcome: SignalResult<Box<dyn SignalProvider>>) -> bool {
        match outcome {
            Ok(provider) => {
                tracing::debug!(provider = provider.id(), "signal provider registered");
                self.register(provider);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "signal provider unavailable");
                false
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&dyn SignalProvider> {
        self.providers.get(id).map(|p| p.as_ref())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.providers.contains_key(id)
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Score `text` with provider `id`; `None` if no such provider is active.
    pub fn score(&self, id: &str, text: &str) -> Option<SignalReading> {
        let provider = self.get(id)?;
        let reading = match provider.analyze(truncate_text(text)) {
            Ok(vector) => SignalReading {
                vector,
                status: SignalStatus::Ok,
            },
            Err(e) => {
                tracing::warn!(provider = id, error = %e, "signal degraded to neutral");
                SignalReading {
                    vector: SentimentVector::NEUTRAL,
                    status: SignalStatus::Degraded {
                        reason: e.to_string(),
                    },
                }
            }
        };
        Some(reading)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The first [`MAX_TEXT_CHARS`] characters of `text`.
pub fn truncate_text(text: &str) -> &str {
    match text.char_indices().nth(MAX_TEXT_CHARS) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
