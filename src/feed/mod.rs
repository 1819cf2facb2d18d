//! Feed merge: fold one episode document into an accumulating RSS 2.0 feed.
//!
//! A run is a one-way pipeline with no state carried between invocations:
//!
//! - [`loader`] - existing feed (or a fresh skeleton) plus its namespace table
//! - [`episode`] - episode document, with the narrow `<link>` ampersand repair
//! - [`reconcile`] - candidate extraction, identity keys, duplicate filtering
//! - [`serialize`] - namespace fix-up, literal links, indented output
//! - [`merge`] - the orchestration tying the stages together
//!
//! # Example
//!
//! ```
//! use episode_feed::config::SiteConfig;
//! use episode_feed::feed::{merge_episode_into_feed, MergeOptions};
//!
//! let episode = "<item><title>First</title><guid>ep-1</guid></item>";
//! let options = MergeOptions::new(SiteConfig::default());
//! let bytes = merge_episode_into_feed(None, episode, &options).unwrap();
//! let xml = String::from_utf8(bytes).unwrap();
//! assert!(xml.contains("<guid>ep-1</guid>"));
//! ```

pub mod dates;
pub mod episode;
pub mod loader;
pub mod merge;
pub mod reconcile;
pub mod serialize;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::{Config, SiteConfig};
use crate::xml::XmlError;

pub use merge::{merge, merge_episode_into_feed, merge_files, MergeOutcome};
pub use reconcile::IdentityKey;

/// Errors that can occur while merging an episode into a feed.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Reading an input file failed.
    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The existing feed is not well-formed. Never repaired.
    #[error("Existing feed is malformed: {0}")]
    MalformedFeed(#[source] XmlError),

    /// The episode is malformed beyond the `<link>` ampersand repair.
    #[error("Episode document is malformed: {0}")]
    MalformedEpisode(#[source] XmlError),

    /// The existing feed has no `<channel>` element.
    #[error("Feed document has no <channel> element")]
    MissingChannel,

    /// Rendering the merged feed failed.
    #[error("Failed to serialize feed: {0}")]
    Serialize(#[source] XmlError),
}

/// Inputs to a merge besides the two documents.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Channel metadata for a feed created from scratch.
    pub site: SiteConfig,
    /// Value written to `lastBuildDate`.
    pub build_date: DateTime<Utc>,
    /// Rewrite ISO-8601 `pubDate` values of new items as RFC 2822.
    pub normalize_pub_dates: bool,
}

impl MergeOptions {
    /// Options stamped with the current time.
    pub fn new(site: SiteConfig) -> Self {
        Self {
            site,
            build_date: Utc::now(),
            normalize_pub_dates: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            normalize_pub_dates: config.normalize_pub_dates,
            ..Self::new(config.site.clone())
        }
    }

    /// Overrides the build timestamp.
    pub fn at(mut self, build_date: DateTime<Utc>) -> Self {
        self.build_date = build_date;
        self
    }
}
