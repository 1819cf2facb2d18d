use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Failed to read episode directory '{}': {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Extracts the unix timestamp from an episode file name.
///
/// Names look like `<prefix>...-<timestamp>.xml`; the timestamp is the last
/// `-`-separated segment of the stem. Returns `None` for names that don't
/// start with `prefix`, aren't `.xml`, or end in something non-numeric.
///
/// # Examples
///
/// ```
/// use episode_feed::util::episode_timestamp;
///
/// assert_eq!(episode_timestamp("episode-1730880000.xml", "episode-"), Some(1730880000));
/// assert_eq!(episode_timestamp("episode-draft.xml", "episode-"), None);
/// ```
pub fn episode_timestamp(file_name: &str, prefix: &str) -> Option<u64> {
    let stem = file_name.strip_prefix(prefix)?.strip_suffix(".xml")?;
    stem.rsplit('-').next()?.parse().ok()
}

/// Finds the episode document with the highest timestamp in `data_dir`.
///
/// A missing directory is treated like an empty one. Files matching the
/// prefix but without a numeric timestamp are skipped with a warning.
pub fn latest_episode(data_dir: &Path, prefix: &str) -> Result<Option<PathBuf>, DiscoveryError> {
    let entries = match std::fs::read_dir(data_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %data_dir.display(), "Episode directory does not exist");
            return Ok(None);
        }
        Err(source) => {
            return Err(DiscoveryError::ReadDir {
                path: data_dir.to_path_buf(),
                source,
            })
        }
    };

    let mut latest: Option<(u64, PathBuf)> = None;
    for entry in entries {
        let entry = entry.map_err(|source| DiscoveryError::ReadDir {
            path: data_dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with(prefix) || !name.ends_with(".xml") {
            continue;
        }

        match episode_timestamp(name, prefix) {
            Some(ts) if latest.as_ref().map_or(true, |(best, _)| ts > *best) => {
                latest = Some((ts, path));
            }
            Some(_) => {}
            None => {
                tracing::warn!(file = %name, "Episode file name has no numeric timestamp, skipping");
            }
        }
    }

    Ok(latest.map(|(_, path)| path))
}
