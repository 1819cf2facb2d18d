//! Configuration file parser for `episode-feed.toml`.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos.
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Channel metadata used when a feed has to be created from scratch.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub title: String,
    pub link: String,
    pub description: String,
    pub language: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "TechNewsDaily".to_string(),
            link: "/".to_string(),
            description: "Tech news and summaries — generated RSS feed".to_string(),
            language: "en-us".to_string(),
        }
    }
}

/// Where the feed lives and where episode documents are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Feed document that is read and rewritten on every run.
    pub feed: PathBuf,
    /// Directory scanned for episode documents.
    pub data_dir: PathBuf,
    /// File name prefix of episode documents (`<prefix><unix-timestamp>.xml`).
    pub episode_prefix: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            feed: PathBuf::from("docs/feed.xml"),
            data_dir: PathBuf::from("data"),
            episode_prefix: "episode-".to_string(),
        }
    }
}

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub paths: PathsConfig,

    /// Rewrite ISO-8601 `pubDate` values of new items as RFC 2822.
    pub normalize_pub_dates: bool,
}

impl Config {
    /// Larger files are rejected rather than read.
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Default file name looked up in the working directory.
    pub const DEFAULT_FILE: &'static str = "episode-feed.toml";

    /// Loads `path`, falling back to defaults when the file is missing or
    /// blank. Unknown keys are logged and ignored.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let Some(content) = read_bounded(path, Self::MAX_FILE_SIZE)? else {
            tracing::debug!(path = %path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        };
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        let raw: toml::Table = content.parse()?;
        warn_unknown_keys(&raw);
        let config: Config = toml::Value::Table(raw).try_into()?;

        tracing::info!(
            path = %path.display(),
            feed = %config.paths.feed.display(),
            data_dir = %config.paths.data_dir.display(),
            "Loaded configuration"
        );
        Ok(config)
    }
}

/// Reads at most `limit` bytes of `path`; `None` if the file does not exist.
fn read_bounded(path: &Path, limit: u64) -> Result<Option<String>, ConfigError> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut content = String::new();
    file.take(limit + 1).read_to_string(&mut content)?;
    if content.len() as u64 > limit {
        return Err(ConfigError::TooLarge(format!(
            "'{}' exceeds {limit} bytes",
            path.display()
        )));
    }
    Ok(Some(content))
}

fn warn_unknown_keys(raw: &toml::Table) {
    const TOP: &[&str] = &["site", "paths", "normalize_pub_dates"];
    const SITE: &[&str] = &["title", "link", "description", "language"];
    const PATHS: &[&str] = &["feed", "data_dir", "episode_prefix"];

    for (key, value) in raw {
        let nested = match key.as_str() {
            "site" => SITE,
            "paths" => PATHS,
            k if TOP.contains(&k) => continue,
            _ => {
                tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                continue;
            }
        };
        if let Some(table) = value.as_table() {
            for inner in table.keys() {
                if !nested.contains(&inner.as_str()) {
                    tracing::warn!(key = %format!("{key}.{inner}"), "Unknown key in config file, ignoring");
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
