// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # coinmood
//!
//! Entity- and aspect-aware sentiment analysis of crypto market news.
//!
//! ## Architecture
//!
//! - **Lexicons** (`lexicon`): entity aliases with importance, aspect term lists, whole-word matching
//! - **Signals** (`signal`): pluggable sentiment providers (built-in valence lexicon, remote label classifiers)
//! - **Ensemble** (`ensemble`): weighted combination of signals with an updatable weight table
//! - **Weighting** (`weighting`): source credibility and exponential time decay per article
//! - **Rollup** (`rollup`): per-article entity/aspect breakdown folded into corpus scores
//! - **Cache** (`cache`): single-slot, TTL-gated result cache
//! - **News** (`news`): NewsAPI retrieval and static article sources
//! - **Trainer** (`trainer`): learn ensemble weights from historical outcomes
//!
//! ## Library usage
//!
//! ```no_run
//! use coinmood::analyzer::{AnalysisRequest, SentimentAnalyzer};
//! use coinmood::config::MoodConfig;
//! use coinmood::news::NewsApiClient;
//! use coinmood::paths::MoodPaths;
//!
//! let paths = MoodPaths::resolve().unwrap();
//! let news = NewsApiClient::from_env().unwrap();
//! let analyzer = SentimentAnalyzer::open(&paths, MoodConfig::default(), Box::new(news)).unwrap();
//! let report = analyzer.analyze(&AnalysisRequest::default());
//! println!("{} ({})", report.overall_sentiment, report.category);
//! ```

pub mod analyzer;
pub mod cache;
pub mod config;
pub mod ensemble;
pub mod error;
pub mod lexicon;
pub mod news;
pub mod paths;
pub mod rollup;
pub mod signal;
pub mod trainer;
pub mod weighting;
