//! Minimal owned XML tree on top of `quick-xml`.
//!
//! The feed merge needs structural edits (moving items between documents,
//! rebuilding a channel), which the streaming reader/writer cannot do on its
//! own. This module provides:
//!
//! - [`tree`] - [`Document`]/[`Element`]/[`Node`] and the event-driven parser
//! - [`namespace`] - per-run `xmlns:` binding table and prefix scope checks
//! - [`writer`] - compact and indented rendering

pub mod namespace;
pub mod tree;
pub mod writer;

pub use namespace::NamespaceBindings;
pub use tree::{Document, Element, Node, XmlError};
pub use writer::{render_compact, render_indented};
