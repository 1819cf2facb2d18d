use std::path::Path;

use crate::xml::{Element, Node};

use super::dates::{build_date, normalize_pub_date};
use super::episode::load_episode;
use super::loader::{load_feed, LoadedFeed};
use super::reconcile::{extract_candidates, reconcile, ChannelParts};
use super::serialize::serialize_feed;
use super::{MergeError, MergeOptions};

/// Serialized feed plus what the merge did.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub bytes: Vec<u8>,
    /// New items placed at the top of the channel.
    pub added: usize,
    /// Candidates dropped as duplicates.
    pub skipped: usize,
}

/// Merges one episode document into a feed and returns the new feed bytes.
///
/// `feed` is `None` when there is no feed yet. Nothing is written anywhere;
/// on error the caller must leave the existing feed untouched.
pub fn merge_episode_into_feed(
    feed: Option<&str>,
    episode: &str,
    options: &MergeOptions,
) -> Result<Vec<u8>, MergeError> {
    merge(feed, episode, options).map(|outcome| outcome.bytes)
}

/// Like [`merge_episode_into_feed`], but also reports item counts.
pub fn merge(
    feed: Option<&str>,
    episode: &str,
    options: &MergeOptions,
) -> Result<MergeOutcome, MergeError> {
    let LoadedFeed {
        mut document,
        namespaces,
    } = load_feed(feed, &options.site)?;
    let episode = load_episode(episode)?;

    let mut candidates = extract_candidates(&episode.root);
    if options.normalize_pub_dates {
        candidates.iter_mut().for_each(normalize_pub_date);
    }
    tracing::debug!(candidates = candidates.len(), "Extracted episode items");

    let channel = document
        .root
        .child_mut("channel")
        .ok_or(MergeError::MissingChannel)?;
    let mut parts = ChannelParts::split(std::mem::take(&mut channel.children));
    set_build_date(&mut parts, &build_date(options.build_date));

    let existing = std::mem::take(&mut parts.items);
    let reconciled = reconcile(existing, candidates);
    channel.children = parts.assemble(reconciled.items);

    tracing::info!(
        added = reconciled.added,
        skipped = reconciled.skipped,
        "Merged episode into feed"
    );

    let serialized = serialize_feed(document, namespaces)?;
    Ok(MergeOutcome {
        bytes: serialized.bytes,
        added: reconciled.added,
        skipped: reconciled.skipped,
    })
}

/// Reads both files and merges them. A missing feed file starts a new feed.
pub fn merge_files(
    feed_path: &Path,
    episode_path: &Path,
    options: &MergeOptions,
) -> Result<MergeOutcome, MergeError> {
    let feed = match std::fs::read_to_string(feed_path) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(source) => {
            return Err(MergeError::Io {
                path: feed_path.to_path_buf(),
                source,
            })
        }
    };
    let episode = std::fs::read_to_string(episode_path).map_err(|source| MergeError::Io {
        path: episode_path.to_path_buf(),
        source,
    })?;

    tracing::debug!(
        feed = %feed_path.display(),
        episode = %episode_path.display(),
        "Merging files"
    );
    merge(feed.as_deref(), &episode, options)
}

/// Overwrites `lastBuildDate`, or adds it just before the items.
fn set_build_date(parts: &mut ChannelParts, value: &str) {
    let existing = parts
        .head
        .iter_mut()
        .chain(parts.tail.iter_mut())
        .find_map(|node| match node {
            Node::Element(e) if e.name == "lastBuildDate" => Some(e),
            _ => None,
        });

    match existing {
        Some(element) => element.set_text(value),
        None => parts
            .head
            .push(Node::Element(Element::with_text("lastBuildDate", value))),
    }
}
