//! Rich diagnostic error types for coinmood.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it. Subsystems that own I/O (`signal`, `news`,
//! `cache`, `paths`) keep their error enums next to the code that raises them.

use miette::Diagnostic;
use thiserror::Error;

use crate::cache::CacheError;
use crate::news::NewsError;
use crate::paths::PathError;
use crate::signal::SignalError;

/// Top-level error type for coinmood.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum MoodError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Lexicon(#[from] LexiconError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Signal(#[from] SignalError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Ensemble(#[from] EnsembleError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Train(#[from] TrainError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    News(#[from] NewsError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Path(#[from] PathError),
}

// ---------------------------------------------------------------------------
// Lexicon errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum LexiconError {
    #[error("failed to read lexicon file: {path}")]
    #[diagnostic(
        code(coinmood::lexicon::read),
        help("Ensure the file exists and is readable, or delete it to regenerate the defaults.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse lexicon file {path}: {message}")]
    #[diagnostic(
        code(coinmood::lexicon::parse),
        help(
            "Entity files map an id to {{\"aliases\": [..], \"importance\": 0.0..1.0}}. \
             Aspect files map a category to a list of terms. Check the JSON syntax."
        )
    )]
    Parse { path: String, message: String },

    #[error("failed to write lexicon file: {path}")]
    #[diagnostic(
        code(coinmood::lexicon::write),
        help("Ensure you have write permissions to the data directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("entity \"{entity}\" has importance {importance}, expected a value in [0, 1]")]
    #[diagnostic(
        code(coinmood::lexicon::importance),
        help("Importance is a relative weight between 0.0 and 1.0.")
    )]
    InvalidImportance { entity: String, importance: f64 },

    #[error("invalid match pattern for term \"{term}\": {message}")]
    #[diagnostic(
        code(coinmood::lexicon::pattern),
        help("Aliases and terms are matched literally as whole words; remove control characters.")
    )]
    Pattern { term: String, message: String },
}

pub type LexiconResult<T> = std::result::Result<T, LexiconError>;

// ---------------------------------------------------------------------------
// Ensemble errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EnsembleError {
    #[error("invalid signal weights: sum is zero")]
    #[diagnostic(
        code(coinmood::ensemble::zero_sum),
        help(
            "At least one signal must receive a positive weight. \
             The previous weight table has been kept unchanged."
        )
    )]
    ZeroSum,

    #[error("invalid weight {weight} for signal \"{signal}\"")]
    #[diagnostic(
        code(coinmood::ensemble::invalid_weight),
        help("Signal weights must be finite and non-negative.")
    )]
    InvalidWeight { signal: String, weight: f64 },

    #[error("failed to read weight table: {path}")]
    #[diagnostic(
        code(coinmood::ensemble::read),
        help("Ensure the weights file is readable, or delete it to restore the default weights.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse weight table {path}: {message}")]
    #[diagnostic(
        code(coinmood::ensemble::parse),
        help("The weights file is a JSON object mapping signal ids to non-negative numbers.")
    )]
    Parse { path: String, message: String },

    #[error("failed to write weight table: {path}")]
    #[diagnostic(
        code(coinmood::ensemble::write),
        help("Ensure you have write permissions to the data directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type EnsembleResult<T> = std::result::Result<T, EnsembleError>;

// ---------------------------------------------------------------------------
// Training errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum TrainError {
    #[error("no training data provided")]
    #[diagnostic(
        code(coinmood::train::empty),
        help("Provide at least one (signal observation, outcome) pair.")
    )]
    Empty,

    #[error("observations and outcomes differ in length: {observations} vs {outcomes}")]
    #[diagnostic(
        code(coinmood::train::length_mismatch),
        help("Every observation needs exactly one outcome, in the same order.")
    )]
    LengthMismatch { observations: usize, outcomes: usize },

    #[error("regressor returned {actual} importances for {expected} features")]
    #[diagnostic(
        code(coinmood::train::importance_shape),
        help("The regression procedure must return one importance per feature position.")
    )]
    ImportanceShape { expected: usize, actual: usize },

    #[error("regression fit failed: {message}")]
    #[diagnostic(
        code(coinmood::train::fit),
        help("Check the training data for non-finite values or constant columns.")
    )]
    Fit { message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Update(#[from] EnsembleError),
}

pub type TrainResult<T> = std::result::Result<T, TrainError>;

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(coinmood::config::read),
        help("Ensure the config file exists and is valid TOML.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}")]
    #[diagnostic(
        code(coinmood::config::parse),
        help("Check the TOML syntax in the config file. {message}")
    )]
    Parse { path: String, message: String },

    #[error("failed to write config: {path}")]
    #[diagnostic(
        code(coinmood::config::write),
        help("Ensure you have write permissions to the config directory.")
    )]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(coinmood::config::invalid), help("Check the config fields. {message}"))]
    Invalid { message: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Convenience result type using [`MoodError`].
pub type MoodResult<T> = std::result::Result<T, MoodError>;
