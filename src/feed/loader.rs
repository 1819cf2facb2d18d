use crate::config::SiteConfig;
use crate::xml::{Document, Element, NamespaceBindings, Node};

use super::MergeError;

/// A feed ready for merging, with the namespace bindings of its root.
#[derive(Debug, Clone)]
pub struct LoadedFeed {
    pub document: Document,
    pub namespaces: NamespaceBindings,
}

/// Builds an empty `rss`/`channel` document from the site defaults.
pub fn skeleton(site: &SiteConfig) -> Document {
    let mut channel = Element::new("channel");
    for (name, value) in [
        ("title", &site.title),
        ("link", &site.link),
        ("description", &site.description),
        ("language", &site.language),
    ] {
        channel
            .children
            .push(Node::Element(Element::with_text(name, value.as_str())));
    }

    let mut rss = Element::new("rss");
    rss.set_attribute("version", "2.0");
    rss.children.push(Node::Element(channel));
    Document::new(rss)
}

/// Loads the current feed.
///
/// `content` is `None` when no feed file exists yet, in which case a
/// skeleton is synthesized. An existing feed that fails to parse is fatal:
/// the feed is our own output, so it is never repaired.
pub fn load_feed(content: Option<&str>, site: &SiteConfig) -> Result<LoadedFeed, MergeError> {
    let document = match content {
        None => {
            tracing::info!(title = %site.title, "No existing feed, starting from skeleton");
            skeleton(site)
        }
        Some(text) => Document::parse(text).map_err(MergeError::MalformedFeed)?,
    };

    if document.root.name != "rss" {
        tracing::warn!(root = %document.root.name, "Feed root element is not <rss>");
    }
    if document.root.child("channel").is_none() {
        return Err(MergeError::MissingChannel);
    }

    let namespaces = NamespaceBindings::from_root(&document.root);
    tracing::debug!(namespaces = namespaces.len(), "Loaded feed document");
    Ok(LoadedFeed {
        document,
        namespaces,
    })
}
