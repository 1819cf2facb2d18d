use std::collections::HashSet;

use crate::xml::namespace::undeclared_prefixes;
use crate::xml::{Element, NamespaceBindings, Node};

const ITEM: &str = "item";

/// What makes two items the same entry.
///
/// The `guid` takes precedence; `link` is only consulted when an item has no
/// non-empty `guid`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    Guid(String),
    Link(String),
}

impl IdentityKey {
    /// Key for an `item` element, or `None` if it has neither a guid nor a link.
    pub fn of(item: &Element) -> Option<Self> {
        item.child_text("guid")
            .map(IdentityKey::Guid)
            .or_else(|| item.child_text("link").map(IdentityKey::Link))
    }
}

/// Guids and links of every item accepted so far.
#[derive(Debug, Default)]
pub struct SeenIdentities {
    guids: HashSet<String>,
    links: HashSet<String>,
}

impl SeenIdentities {
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a Element>) -> Self {
        let mut seen = Self::default();
        for item in items {
            seen.register(item);
        }
        seen
    }

    /// Records both the guid and the link of `item`, when present.
    pub fn register(&mut self, item: &Element) {
        if let Some(guid) = item.child_text("guid") {
            self.guids.insert(guid);
        }
        if let Some(link) = item.child_text("link") {
            self.links.insert(link);
        }
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        match key {
            IdentityKey::Guid(guid) => self.guids.contains(guid),
            IdentityKey::Link(link) => self.links.contains(link),
        }
    }
}

/// Collects the `item` elements an episode document offers, in document order.
///
/// A document whose root is itself an `item` contributes the root first,
/// followed by any `item` elements nested below it. Each candidate is made
/// self-contained: prefixes it relies on from its ancestors are declared on
/// the candidate itself, so it can be moved into another document.
pub fn extract_candidates(root: &Element) -> Vec<Element> {
    let mut candidates = Vec::new();
    collect_candidates(root, &NamespaceBindings::new(), &mut candidates);
    candidates
}

fn collect_candidates(element: &Element, outer: &NamespaceBindings, found: &mut Vec<Element>) {
    let scope = outer.overlay(element);
    if element.name == ITEM {
        let mut candidate = element.clone();
        for prefix in undeclared_prefixes(&candidate, &[]) {
            if let Some(uri) = scope.get(&prefix) {
                candidate.set_attribute(format!("xmlns:{prefix}"), uri);
            }
        }
        found.push(candidate);
    }
    for child in element.elements() {
        collect_candidates(child, &scope, found);
    }
}

/// Result of folding candidates into the existing item list.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    /// Kept candidates followed by every existing item.
    pub items: Vec<Element>,
    pub added: usize,
    pub skipped: usize,
}

/// Prepends the candidates that are not already known.
///
/// A candidate is dropped when its identity key matches an existing item or a
/// candidate accepted earlier in the same batch. Candidates without any
/// identity are always kept. Existing items are never dropped or reordered.
pub fn reconcile(existing: Vec<Element>, candidates: Vec<Element>) -> Reconciled {
    let mut seen = SeenIdentities::from_items(&existing);
    let mut kept = Vec::with_capacity(candidates.len() + existing.len());
    let mut skipped = 0;

    for candidate in candidates {
        match IdentityKey::of(&candidate) {
            Some(key) if seen.contains(&key) => {
                tracing::debug!(key = ?key, "Skipping duplicate item");
                skipped += 1;
            }
            Some(_) => {
                seen.register(&candidate);
                kept.push(candidate);
            }
            None => {
                tracing::warn!("Item has neither guid nor link, keeping it unconditionally");
                kept.push(candidate);
            }
        }
    }

    let added = kept.len();
    kept.extend(existing);
    Reconciled {
        items: kept,
        added,
        skipped,
    }
}

/// A channel's children split around its items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelParts {
    /// Everything before the first item.
    pub head: Vec<Node>,
    pub items: Vec<Element>,
    /// Non-item nodes that followed the first item.
    pub tail: Vec<Node>,
}

impl ChannelParts {
    pub fn split(children: Vec<Node>) -> Self {
        let mut parts = Self::default();
        for node in children {
            match node {
                Node::Element(e) if e.name == ITEM => parts.items.push(e),
                other if parts.items.is_empty() => parts.head.push(other),
                other => parts.tail.push(other),
            }
        }
        parts
    }

    /// Reassembles the channel children with `items` in place of the old ones.
    pub fn assemble(self, items: Vec<Element>) -> Vec<Node> {
        let mut children = self.head;
        children.extend(items.into_iter().map(Node::Element));
        children.extend(self.tail);
        children
    }
}
