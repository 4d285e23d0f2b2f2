//! Entity and aspect lexicons, and the literal whole-word matcher over them.
//!
//! Matching is deliberately shallow: every alias and aspect term is compiled
//! to a case-insensitive `\b...\b` pattern and tested against lower-cased
//! text. There is no tokenization or disambiguation beyond that.
//!
//! - **Entities** are matched alias by alias; only the aliases that actually
//!   occur are recorded.
//! - The **fallback entity** (a generic catch-all such as `crypto`) is an
//!   ordinary entry in that pass, so it is reported next to specific coins.
//!   It gets one more try on its own when the pass found nothing.
//! - **Aspects** are detected against the whole document and attached to every
//!   matched entity; sentence co-occurrence narrows them later.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{LexiconError, LexiconResult};

static RE_SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]+").unwrap());

// ---------------------------------------------------------------------------
// Lexicon files
// ---------------------------------------------------------------------------

/// One entity as stored in the entity lexicon file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySpec {
    /// Case-insensitive surface forms.
    pub aliases: Vec<String>,
    /// Relative importance in `[0, 1]`.
    #[serde(default = "default_importance")]
    pub importance: f64,
}

fn default_importance() -> f64 {
    0.5
}

impl EntitySpec {
    fn new(aliases: &[&str], importance: f64) -> Self {
        Self {
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            importance,
        }
    }
}

/// Entity id → aliases and importance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityLexicon {
    entities: BTreeMap<String, EntitySpec>,
}

impl Default for EntityLexicon {
    fn default() -> Self {
        let mut entities = BTreeMap::new();
        entities.insert(
            "bitcoin".into(),
            EntitySpec::new(&["btc", "bitcoin", "xbt", "satoshi"], 1.0),
        );
        entities.insert(
            "ethereum".into(),
            EntitySpec::new(&["eth", "ethereum", "ether"], 0.9),
        );
        entities.insert("ripple".into(), EntitySpec::new(&["xrp", "ripple"], 0.7));
        entities.insert("litecoin".into(), EntitySpec::new(&["ltc", "litecoin"], 0.6));
        entities.insert("cardano".into(), EntitySpec::new(&["ada", "cardano"], 0.6));
        entities.insert(
            "crypto".into(),
            EntitySpec::new(
                &["cryptocurrency", "crypto", "cryptocurrencies", "digital currency"],
                0.8,
            ),
        );
        Self { entities }
    }
}

impl EntityLexicon {
    /// Build a lexicon from explicit entries.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, EntitySpec)>) -> Self {
        Self {
            entities: entries.into_iter().collect(),
        }
    }

    /// Check importances are within `[0, 1]`.
    pub fn validate(&self) -> LexiconResult<()> {
        for (id, spec) in &self.entities {
            if !(0.0..=1.0).contains(&spec.importance) {
                return Err(LexiconError::InvalidImportance {
                    entity: id.clone(),
                    importance: spec.importance,
                });
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&EntitySpec> {
        self.entities.get(id)
    }

    /// Configured importance of an entity, if it is known.
    pub fn importance(&self, id: &str) -> Option<f64> {
        self.entities.get(id).map(|spec| spec.importance)
    }

    /// Find the entity id whose id or alias equals `name` (case-insensitive).
    pub fn resolve(&self, name: &str) -> Option<&str> {
        if let Some((id, _)) = self.entities.get_key_value(name) {
            return Some(id.as_str());
        }
        let lower = name.to_lowercase();
        self.entities
            .iter()
            .find(|(id, spec)| {
                id.to_lowercase() == lower || spec.aliases.iter().any(|a| a.to_lowercase() == lower)
            })
            .map(|(id, _)| id.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &EntitySpec)> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Load the lexicon from JSON, writing the defaults there first if the file is absent.
    pub fn load_or_create(path: &Path) -> LexiconResult<Self> {
        let lexicon: Self = load_or_create_json(path)?;
        lexicon.validate()?;
        Ok(lexicon)
    }

    /// Like [`load_or_create`](Self::load_or_create), but an unusable file
    /// is logged and replaced in memory by the defaults.
    pub fn load_or_default(path: &Path) -> Self {
        or_default(path, Self::load_or_create(path))
    }

    pub fn save(&self, path: &Path) -> LexiconResult<()> {
        save_json(self, path)
    }
}

/// Aspect category → terms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AspectLexicon {
    aspects: BTreeMap<String, Vec<String>>,
}

fn terms(list: &[&str]) -> Vec<String> {
    list.iter().map(|t| t.to_string()).collect()
}

impl Default for AspectLexicon {
    fn default() -> Self {
        let mut aspects = BTreeMap::new();
        aspects.insert(
            "price".into(),
            terms(&[
                "price", "value", "cost", "worth", "expensive", "cheap", "bull", "bear",
                "bullish", "bearish", "moon", "dump", "pump", "surge", "plunge", "rise", "fall",
                "increase", "decrease", "all-time high", "ath", "all-time low", "crash",
            ]),
        );
        aspects.insert(
            "technology".into(),
            terms(&[
                "blockchain", "protocol", "algorithm", "mining", "miner", "hash", "node",
                "wallet", "transaction", "scalability", "layer", "smart contract", "token",
                "network", "fork", "consensus", "decentralized", "distributed", "security",
            ]),
        );
        aspects.insert(
            "adoption".into(),
            terms(&[
                "adoption", "mainstream", "institutional", "retail", "investor", "investment",
                "fund", "exchange", "trading", "payment", "merchant", "accept", "partnership",
                "integration", "user", "utility", "use case", "application", "dapp",
            ]),
        );
        aspects.insert(
            "regulation".into(),
            terms(&[
                "regulation", "regulatory", "law", "legal", "illegal", "compliance", "sec",
                "cftc", "congress", "legislature", "govern", "policy", "ban", "approve",
                "restrict", "tax", "kyc", "aml", "fraud", "crime", "hack",
            ]),
        );
        Self { aspects }
    }
}

impl AspectLexicon {
    pub fn from_entries(entries: impl IntoIterator<Item = (String, Vec<String>)>) -> Self {
        Self {
            aspects: entries.into_iter().collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.aspects.iter()
    }

    pub fn len(&self) -> usize {
        self.aspects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aspects.is_empty()
    }

    /// Load the lexicon from JSON, writing the defaults there first if the file is absent.
    pub fn load_or_create(path: &Path) -> LexiconResult<Self> {
        load_or_create_json(path)
    }

    pub fn load_or_default(path: &Path) -> Self {
        or_default(path, Self::load_or_create(path))
    }

    pub fn save(&self, path: &Path) -> LexiconResult<()> {
        save_json(self, path)
    }
}

fn load_or_create_json<T>(path: &Path) -> LexiconResult<T>
where
    T: Default + Serialize + for<'de> Deserialize<'de>,
{
    if !path.exists() {
        let defaults = T::default();
        save_json(&defaults, path)?;
        tracing::info!(path = %path.display(), "wrote default lexicon");
        return Ok(defaults);
    }
    let content = std::fs::read_to_string(path).map_err(|e| LexiconError::Read {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_json::from_str(&content).map_err(|e| LexiconError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn or_default<T: Default>(path: &Path, loaded: LexiconResult<T>) -> T {
    loaded.unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "using default lexicon");
        T::default()
    })
}

fn save_json<T: Serialize>(value: &T, path: &Path) -> LexiconResult<()> {
    let content = serde_json::to_string_pretty(value).map_err(|e| LexiconError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LexiconError::Write {
            path: parent.display().to_string(),
            source: e,
        })?;
    }
    std::fs::write(path, content).map_err(|e| LexiconError::Write {
        path: path.display().to_string(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// What the matcher found for one entity in one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityMatch {
    /// The aliases that occurred (lower-cased), not the full alias set.
    pub aliases: BTreeSet<String>,
    /// Aspect category → terms that occurred anywhere in the document.
    pub aspects: BTreeMap<String, BTreeSet<String>>,
}

/// Entity id → match details for one document.
pub type DocumentMatches = BTreeMap<String, EntityMatch>;

/// A lexicon entry compiled to whole-word patterns.
#[derive(Debug, Clone)]
struct CompiledEntry {
    name: String,
    terms: Vec<String>,
}

/// Whole-word, case-insensitive matcher over an entity and an aspect lexicon.
#[derive(Debug, Clone)]
pub struct LexiconMatcher {
    entities: Vec<CompiledEntry>,
    fallback: Option<CompiledEntry>,
    aspects: Vec<CompiledEntry>,
    /// Lower-cased term → `\bterm\b` pattern, shared by every entry.
    patterns: HashMap<String, Regex>,
}

impl LexiconMatcher {
    /// Compile both lexicons.
    ///
    /// `fallback` names the generic catch-all entity. It is matched like every
    /// other entity, and tried once more on its own when nothing matched.
    pub fn new(
        entities: &EntityLexicon,
        aspects: &AspectLexicon,
        fallback: Option<&str>,
    ) -> LexiconResult<Self> {
        let mut patterns = HashMap::new();
        let mut compile = |name: &str, raw: &[String]| -> LexiconResult<CompiledEntry> {
            let mut terms = Vec::with_capacity(raw.len());
            for term in raw {
                let lower = term.trim().to_lowercase();
                if lower.is_empty() || terms.contains(&lower) {
                    continue;
                }
                if !patterns.contains_key(&lower) {
                    patterns.insert(lower.clone(), word_pattern(&lower)?);
                }
                terms.push(lower);
            }
            Ok(CompiledEntry {
                name: name.to_string(),
                terms,
            })
        };

        let mut primary = Vec::new();
        let mut fallback_entry = None;
        for (id, spec) in entities.iter() {
            let entry = compile(id, &spec.aliases)?;
            if fallback == Some(id.as_str()) {
                fallback_entry = Some(entry.clone());
            }
            primary.push(entry);
        }
        let mut aspect_entries = Vec::new();
        for (name, list) in aspects.iter() {
            aspect_entries.push(compile(name, list)?);
        }

        if let Some(id) = fallback {
            if fallback_entry.is_none() {
                tracing::warn!(entity = id, "fallback entity is not in the entity lexicon");
            }
        }

        Ok(Self {
            entities: primary,
            fallback: fallback_entry,
            aspects: aspect_entries,
            patterns,
        })
    }

    /// Find entities and document-global aspects in `text`.
    pub fn identify(&self, text: &str) -> DocumentMatches {
        let text = text.to_lowercase();
        let mut found = DocumentMatches::new();

        for entry in &self.entities {
            let aliases = self.matching_terms(entry, &text);
            if !aliases.is_empty() {
                found.insert(
                    entry.name.clone(),
                    EntityMatch {
                        aliases,
                        aspects: BTreeMap::new(),
                    },
                );
            }
        }

        if found.is_empty() {
            if let Some(entry) = &self.fallback {
                let aliases = self.matching_terms(entry, &text);
                if !aliases.is_empty() {
                    found.insert(
                        entry.name.clone(),
                        EntityMatch {
                            aliases,
                            aspects: BTreeMap::new(),
                        },
                    );
                }
            }
        }

        if found.is_empty() {
            return found;
        }

        let mut aspects = BTreeMap::new();
        for entry in &self.aspects {
            let hits = self.matching_terms(entry, &text);
            if !hits.is_empty() {
                aspects.insert(entry.name.clone(), hits);
            }
        }
        for entity in found.values_mut() {
            entity.aspects = aspects.clone();
        }
        found
    }

    /// Sentences of `text` mentioning any of `aliases` and, when given, any of `terms`.
    ///
    /// Sentences are returned lower-cased and trimmed, in document order.
    pub fn relevant_sentences(
        &self,
        text: &str,
        aliases: &BTreeSet<String>,
        terms: Option<&BTreeSet<String>>,
    ) -> Vec<String> {
        split_sentences(text)
            .into_iter()
            .filter(|sentence| {
                self.contains_any(sentence, aliases)
                    && terms.is_none_or(|terms| self.contains_any(sentence, terms))
            })
            .collect()
    }

    fn matching_terms(&self, entry: &CompiledEntry, lower_text: &str) -> BTreeSet<String> {
        entry
            .terms
            .iter()
            .filter(|term| self.is_match(term, lower_text))
            .cloned()
            .collect()
    }

    fn contains_any(&self, lower_text: &str, terms: &BTreeSet<String>) -> bool {
        terms.iter().any(|term| self.is_match(term, lower_text))
    }

    fn is_match(&self, term: &str, lower_text: &str) -> bool {
        match self.patterns.get(term) {
            Some(re) => re.is_match(lower_text),
            // Terms handed back by `identify` are always compiled; anything
            // else is compiled on the spot.
            None => word_pattern(term)
                .map(|re| re.is_match(lower_text))
                .unwrap_or(false),
        }
    }
}

fn word_pattern(term: &str) -> LexiconResult<Regex> {
    Regex::new(&format!(r"\b{}\b", regex::escape(term))).map_err(|e| LexiconError::Pattern {
        term: term.to_string(),
        message: e.to_string(),
    })
}

/// Split on runs of `.`, `!` and `?`; returns trimmed, lower-cased, non-empty sentences.
pub fn split_sentences(text: &str) -> Vec<String> {
    RE_SENTENCE_END
        .split(text)
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
