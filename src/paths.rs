//! XDG-compliant path resolution for coinmood.
//!
//! `MoodPaths` names every file the analyzer reads or writes: the TOML config,
//! the entity/aspect lexicons, the credibility table, the persisted ensemble
//! weights and the single-slot sentiment cache.

use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

/// Errors from path resolution.
#[derive(Debug, Error, Diagnostic)]
pub enum PathError {
    #[error("cannot determine home directory")]
    #[diagnostic(
        code(coinmood::paths::no_home),
        help("Set the HOME environment variable, or pass --data-dir explicitly.")
    )]
    NoHome,

    #[error("failed to create directory: {path}")]
    #[diagnostic(
        code(coinmood::paths::create_dir),
        help("Check that the parent directory exists and you have write permissions.")
    )]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PathResult<T> = std::result::Result<T, PathError>;

/// Directories used by coinmood.
#[derive(Debug, Clone)]
pub struct MoodPaths {
    /// `$XDG_CONFIG_HOME/coinmood/`
    pub config_dir: PathBuf,
    /// `$XDG_DATA_HOME/coinmood/`: lexicons, credibility table, weights.
    pub data_dir: PathBuf,
    /// `$XDG_CACHE_HOME/coinmood/`: the sentiment cache slot.
    pub cache_dir: PathBuf,
}

impl MoodPaths {
    /// Resolve XDG directories from environment variables with standard fallbacks.
    pub fn resolve() -> PathResult<Self> {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .map_err(|_| PathError::NoHome)?;

        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".config"))
            .join("coinmood");

        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".local/share"))
            .join("coinmood");

        let cache_dir = std::env::var("XDG_CACHE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join(".cache"))
            .join("coinmood");

        Ok(Self {
            config_dir,
            data_dir,
            cache_dir,
        })
    }

    /// Put everything under one root directory (`--data-dir`).
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            config_dir: root.to_path_buf(),
            data_dir: root.join("data"),
            cache_dir: root.join("cache"),
        }
    }

    /// Create all base directories. Idempotent.
    pub fn ensure_dirs(&self) -> PathResult<()> {
        for dir in [&self.config_dir, &self.data_dir, &self.cache_dir] {
            std::fs::create_dir_all(dir).map_err(|e| PathError::CreateDir {
                path: dir.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn entities_file(&self) -> PathBuf {
        self.data_dir.join("entities.json")
    }

    pub fn aspects_file(&self) -> PathBuf {
        self.data_dir.join("aspects.json")
    }

    pub fn credibility_file(&self) -> PathBuf {
        self.data_dir.join("credibility.json")
    }

    pub fn weights_file(&self) -> PathBuf {
        self.data_dir.join("weights.json")
    }

    pub fn cache_file(&self) -> PathBuf {
        self.cache_dir.join("sentiment_cache.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolved_paths_use_xdg_layout() {
        // Avoid mutating env vars (unsafe in edition 2024); only check the suffix.
        let paths = MoodPaths::resolve().unwrap();
        assert!(
            paths.config_dir.ends_with("coinmood"),
            "config_dir should end with 'coinmood': {}",
            paths.config_dir.display()
        );
        assert!(paths.data_dir.ends_with("coinmood"));
        assert!(paths.cache_dir.ends_with("coinmood"));
    }

    #[test]
    fn root_layout_names_every_file() {
        let paths = MoodPaths::with_root("/tmp/mood");
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/mood/config.toml"));
        assert_eq!(
            paths.entities_file(),
            PathBuf::from("/tmp/mood/data/entities.json")
        );
        assert_eq!(
            paths.aspects_file(),
            PathBuf::from("/tmp/mood/data/aspects.json")
        );
        assert_eq!(
            paths.weights_file(),
            PathBuf::from("/tmp/mood/data/weights.json")
        );
        assert_eq!(
            paths.cache_file(),
            PathBuf::from("/tmp/mood/cache/sentiment_cache.json")
        );
    }

    #[test]
    fn ensure_dirs_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = MoodPaths::with_root(dir.path().join("root"));
        paths.ensure_dirs().unwrap();
        paths.ensure_dirs().unwrap();
        assert!(paths.data_dir.is_dir());
        assert!(paths.cache_dir.is_dir());
    }
}
