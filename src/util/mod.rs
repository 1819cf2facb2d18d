//! File-system helpers around the merge.
//!
//! - **Discovery**: pick the newest timestamped episode document
//! - **Atomic write**: replace the feed without leaving a partial file
//!
//! # Examples
//!
//! ```no_run
//! use std::path::Path;
//! use episode_feed::util::{atomic_write, latest_episode};
//!
//! if let Some(episode) = latest_episode(Path::new("data"), "episode-").unwrap() {
//!     println!("newest episode: {}", episode.display());
//! }
//! atomic_write(Path::new("docs/feed.xml"), b"<rss/>").unwrap();
//! ```

mod discovery;
mod fs;

pub use discovery::{episode_timestamp, latest_episode, DiscoveryError};
pub use fs::atomic_write;
