//! Built-in valence-lexicon signal (`lexicon`).
//!
//! A small, deterministic scorer in the VADER tradition, tuned to market
//! vocabulary. Each word carries a valence on roughly `[-4, 4]`. A preceding
//! intensifier boosts it, and a negator within three tokens flips and
//! dampens it. The summed valence is squashed to a compound in `[-1, 1]`.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::{SentimentVector, SignalProvider, SignalResult};

/// Identifier of the built-in provider in the weight table.
pub const LEXICON_SIGNAL_ID: &str = "lexicon";

const NEGATION_FACTOR: f64 = -0.74;
const NEGATION_WINDOW: usize = 3;
const BOOST: f64 = 0.293;
const NORMALIZATION_ALPHA: f64 = 15.0;

static RE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z0-9]+(?:['-][a-z0-9]+)*").unwrap());

const NEGATORS: &[&str] = &[
    "not", "no", "never", "none", "nobody", "nothing", "neither", "nor", "without", "cannot",
    "can't", "don't", "doesn't", "didn't", "isn't", "aren't", "wasn't", "weren't", "won't",
    "wouldn't", "shouldn't", "hardly", "barely",
];

const INTENSIFIERS: &[(&str, f64)] = &[
    ("very", BOOST),
    ("extremely", BOOST),
    ("highly", BOOST),
    ("hugely", BOOST),
    ("massively", BOOST),
    ("sharply", BOOST),
    ("strongly", BOOST),
    ("significantly", BOOST),
    ("really", BOOST),
    ("slightly", -BOOST),
    ("somewhat", -BOOST),
    ("marginally", -BOOST),
    ("barely", -BOOST),
];

const VALENCES: &[(&str, f64)] = &[
    // market up
    ("bullish", 2.6),
    ("bull", 1.8),
    ("rally", 2.2),
    ("rallies", 2.2),
    ("rallied", 2.2),
    ("surge", 2.3),
    ("surges", 2.3),
    ("surged", 2.3),
    ("soar", 2.5),
    ("soars", 2.5),
    ("soared", 2.5),
    ("gain", 1.8),
    ("gains", 1.8),
    ("gained", 1.8),
    ("rise", 1.4),
    ("rises", 1.4),
    ("rose", 1.4),
    ("jump", 1.6),
    ("jumped", 1.6),
    ("moon", 2.0),
    ("breakout", 1.9),
    ("record", 1.2),
    ("recovery", 1.7),
    ("recover", 1.5),
    ("rebound", 1.6),
    ("profit", 1.9),
    ("profits", 1.9),
    ("growth", 1.8),
    ("adoption", 1.3),
    ("approve", 1.7),
    ("approved", 1.8),
    ("approval", 1.8),
    ("upgrade", 1.5),
    ("partnership", 1.4),
    ("optimism", 2.1),
    ("optimistic", 2.1),
    ("confidence", 1.8),
    ("strong", 1.7),
    ("positive", 2.0),
    ("good", 1.9),
    ("great", 3.1),
    ("success", 2.7),
    ("win", 2.8),
    ("boom", 2.0),
    ("secure", 1.4),
    ("happy", 2.7),
    // market down
    ("bearish", -2.6),
    ("bear", -1.8),
    ("crash", -3.0),
    ("crashes", -3.0),
    ("crashed", -3.0),
    ("plunge", -2.6),
    ("plunges", -2.6),
    ("plunged", -2.6),
    ("dump", -2.0),
    ("dumped", -2.0),
    ("slump", -2.2),
    ("fall", -1.4),
    ("falls", -1.4),
    ("fell", -1.4),
    ("drop", -1.5),
    ("drops", -1.5),
    ("dropped", -1.5),
    ("decline", -1.6),
    ("declines", -1.6),
    ("loss", -2.0),
    ("losses", -2.0),
    ("selloff", -2.2),
    ("sell-off", -2.2),
    ("liquidation", -2.0),
    ("liquidations", -2.0),
    ("fear", -2.2),
    ("panic", -2.8),
    ("risk", -1.1),
    ("risky", -1.6),
    ("volatile", -1.2),
    ("volatility", -1.0),
    ("weak", -1.9),
    ("negative", -2.0),
    ("bad", -2.5),
    ("ban", -2.4),
    ("banned", -2.5),
    ("crackdown", -2.4),
    ("lawsuit", -2.0),
    ("fraud", -3.0),
    ("scam", -3.1),
    ("hack", -2.8),
    ("hacked", -2.9),
    ("exploit", -2.4),
    ("stolen", -2.8),
    ("bankrupt", -3.0),
    ("bankruptcy", -3.0),
    ("collapse", -3.0),
    ("collapsed", -3.0),
    ("reject", -2.0),
    ("rejected", -2.1),
    ("concern", -1.4),
    ("concerns", -1.4),
    ("worry", -1.9),
    ("worries", -1.9),
    ("uncertainty", -1.5),
];

/// Deterministic lexicon scorer registered under [`LEXICON_SIGNAL_ID`].
#[derive(Debug, Clone)]
pub struct ValenceLexiconProvider {
    valences: HashMap<&'static str, f64>,
    intensifiers: HashMap<&'static str, f64>,
}

impl Default for ValenceLexiconProvider {
    fn default() -> Self {
        Self {
            valences: VALENCES.iter().copied().collect(),
            intensifiers: INTENSIFIERS.iter().copied().collect(),
        }
    }
}

impl ValenceLexiconProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Valence of one token after intensifier and negation adjustment.
    fn adjusted_valence(&self, tokens: &[&str], i: usize) -> Option<f64> {
        let mut valence = *self.valences.get(tokens[i])?;

        if i > 0 {
            if let Some(&boost) = self.intensifiers.get(tokens[i - 1]) {
                valence += boost * valence.signum();
            }
        }

        let window_start = i.saturating_sub(NEGATION_WINDOW);
        if tokens[window_start..i].iter().any(|t| NEGATORS.contains(t)) {
            valence *= NEGATION_FACTOR;
        }
        Some(valence)
    }

    /// Score without going through the registry.
    pub fn score(&self, text: &str) -> SentimentVector {
        let lower = text.to_lowercase();
        let tokens: Vec<&str> = RE_TOKEN.find_iter(&lower).map(|m| m.as_str()).collect();
        if tokens.is_empty() {
            return SentimentVector::NEUTRAL;
        }

        let mut sum = 0.0;
        let mut positive_mass = 0.0;
        let mut negative_mass = 0.0;
        let mut neutral_count = 0.0;
        let mut scored = false;

        for i in 0..tokens.len() {
            match self.adjusted_valence(&tokens, i) {
                Some(v) if v > 0.0 => {
                    sum += v;
                    positive_mass += v + 1.0;
                    scored = true;
                }
                Some(v) if v < 0.0 => {
                    sum += v;
                    negative_mass += -v + 1.0;
                    scored = true;
                }
                _ => neutral_count += 1.0,
            }
        }

        if !scored {
            return SentimentVector::NEUTRAL;
        }

        let compound = (sum / (sum * sum + NORMALIZATION_ALPHA).sqrt()).clamp(-1.0, 1.0);
        SentimentVector {
            compound,
            positive: positive_mass,
            negative: negative_mass,
            neutral: neutral_count,
        }
        .normalized()
    }
}

impl SignalProvider for ValenceLexiconProvider {
    fn id(&self) -> &str {
        LEXICON_SIGNAL_ID
    }

    fn analyze(&self, text: &str) -> SignalResult<SentimentVector> {
        Ok(self.score(text))
    }
}
