use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Errors produced while turning XML text into a [`Document`].
#[derive(Debug, Error)]
pub enum XmlError {
    /// quick-xml rejected the markup itself.
    #[error("XML syntax error at byte {position}: {message}")]
    Syntax { position: u64, message: String },

    /// Text or attribute content could not be decoded (e.g. a bare `&`).
    #[error("Invalid character data at byte {position}: {message}")]
    Content { position: u64, message: String },

    /// An end tag closed an element that was never opened.
    #[error("Unexpected closing tag </{0}>")]
    UnexpectedEnd(String),

    /// Input ended while elements were still open.
    #[error("Element <{0}> is never closed")]
    Unclosed(String),

    #[error("Document has no root element")]
    MissingRoot,

    #[error("Document has more than one root element (found <{0}>)")]
    MultipleRoots(String),

    #[error("Text outside the root element")]
    TextOutsideRoot,

    /// A `prefix:` is used without an `xmlns:prefix` declaration in scope.
    #[error("Namespace prefix '{prefix}' on <{element}> is not bound")]
    UnboundPrefix { prefix: String, element: String },

    /// Rendering the tree failed.
    #[error("Failed to write XML: {0}")]
    Write(String),
}

/// A single node in an element's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Decoded character data.
    Text(String),
    /// Literal content of a `<![CDATA[...]]>` section.
    CData(String),
    /// Raw comment body, without the `<!--`/`-->` delimiters.
    Comment(String),
}

/// An owned XML element.
///
/// Names are kept exactly as written in the source (`prefix:local`), so a
/// parse/render cycle never renames a namespace prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Element holding a single text node.
    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut element = Self::new(name);
        element.children.push(Node::Text(text.into()));
        element
    }

    /// The `prefix` part of a qualified name, if any.
    pub fn prefix(&self) -> Option<&str> {
        split_prefix(&self.name).0
    }

    pub fn local_name(&self) -> &str {
        split_prefix(&self.name).1
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Sets an attribute, replacing any existing value for `key`.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Direct child elements, in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// First direct child element with the given name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.name == name)
    }

    /// Concatenated text and CDATA content of the direct children.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            match node {
                Node::Text(t) | Node::CData(t) => out.push_str(t),
                _ => {}
            }
        }
        out
    }

    /// Text of the first child element named `name`, trimmed.
    ///
    /// Returns `None` when the child is missing or has no non-whitespace text.
    pub fn child_text(&self, name: &str) -> Option<String> {
        let text = self.child(name)?.text();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Replaces all content with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![Node::Text(text.into())];
    }
}

/// Splits `prefix:local` into its parts. Names without a colon have no prefix.
pub fn split_prefix(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

/// A parsed XML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Comments that precede the root element.
    pub prolog: Vec<Node>,
    pub root: Element,
}

impl Document {
    pub fn new(root: Element) -> Self {
        Self {
            prolog: Vec::new(),
            root,
        }
    }

    /// Parses XML text into an owned tree.
    ///
    /// Whitespace is normalized per element when it closes: see
    /// [`normalize_whitespace`]. The XML declaration and any DOCTYPE are
    /// consumed but not kept. Processing instructions are skipped.
    pub fn parse(content: &str) -> Result<Self, XmlError> {
        let mut reader = Reader::from_str(content);

        let mut prolog = Vec::new();
        let mut root: Option<Element> = None;
        let mut stack: Vec<Element> = Vec::new();
        let mut scopes = ScopeStack::default();

        loop {
            let event = reader.read_event().map_err(|e| XmlError::Syntax {
                position: reader.error_position() as u64,
                message: e.to_string(),
            })?;

            match event {
                Event::Start(e) => {
                    let element = start_element(&e, &reader)?;
                    scopes.enter(&element)?;
                    stack.push(element);
                }
                Event::Empty(e) => {
                    let element = start_element(&e, &reader)?;
                    scopes.enter(&element)?;
                    scopes.leave();
                    attach(Node::Element(element), &mut stack, &mut root, &mut prolog)?;
                }
                Event::End(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    let mut element = stack.pop().ok_or(XmlError::UnexpectedEnd(name))?;
                    scopes.leave();
                    normalize_whitespace(&mut element);
                    attach(Node::Element(element), &mut stack, &mut root, &mut prolog)?;
                }
                Event::Text(e) => {
                    let text = e.unescape().map_err(|err| XmlError::Content {
                        position: reader.buffer_position() as u64,
                        message: err.to_string(),
                    })?;
                    if stack.is_empty() && text.trim().is_empty() {
                        continue;
                    }
                    attach(
                        Node::Text(text.into_owned()),
                        &mut stack,
                        &mut root,
                        &mut prolog,
                    )?;
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e).into_owned();
                    attach(Node::CData(text), &mut stack, &mut root, &mut prolog)?;
                }
                Event::Comment(e) => {
                    let text = String::from_utf8_lossy(&e).into_owned();
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Comment(text)),
                        // Comments after the root are rare and carry no feed data
                        None if root.is_some() => {
                            tracing::debug!("Dropping comment after the root element");
                        }
                        None => prolog.push(Node::Comment(text)),
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.pop() {
            return Err(XmlError::Unclosed(open.name));
        }

        let root = root.ok_or(XmlError::MissingRoot)?;
        Ok(Self { prolog, root })
    }
}

/// Drops indentation from a just-closed element.
///
/// Whitespace-only text is removed unless the element has mixed content
/// (elements next to non-blank text), where it separates words. Leading
/// whitespace of the first child and trailing whitespace of the last child
/// are trimmed. Text between inline elements is kept as written.
fn normalize_whitespace(element: &mut Element) {
    let blank = |node: &Node| matches!(node, Node::Text(t) if t.trim().is_empty());
    let has_elements = element.children.iter().any(|n| matches!(n, Node::Element(_)));
    let has_text = element
        .children
        .iter()
        .any(|n| matches!(n, Node::Text(_)) && !blank(n));

    if !(has_elements && has_text) {
        element.children.retain(|n| !blank(n));
    }

    if let Some(Node::Text(first)) = element.children.first_mut() {
        *first = first.trim_start().to_string();
    }
    if let Some(Node::Text(last)) = element.children.last_mut() {
        last.truncate(last.trim_end().len());
    }
    element.children.retain(|n| !matches!(n, Node::Text(t) if t.is_empty()));
}

/// Attaches a finished node to the open parent, or makes it the root.
fn attach(
    node: Node,
    stack: &mut [Element],
    root: &mut Option<Element>,
    prolog: &mut Vec<Node>,
) -> Result<(), XmlError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
        return Ok(());
    }

    match node {
        Node::Element(element) => {
            if root.is_some() {
                return Err(XmlError::MultipleRoots(element.name));
            }
            *root = Some(element);
            Ok(())
        }
        Node::Comment(_) => {
            prolog.push(node);
            Ok(())
        }
        Node::Text(_) | Node::CData(_) => Err(XmlError::TextOutsideRoot),
    }
}

fn start_element(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Element, XmlError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut element = Element::new(name);

    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|err| XmlError::Syntax {
            position: reader.buffer_position() as u64,
            message: err.to_string(),
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|err| XmlError::Content {
                position: reader.buffer_position() as u64,
                message: err.to_string(),
            })?;
        element.attributes.push((key, value.into_owned()));
    }

    Ok(element)
}

/// Tracks which namespace prefixes are declared at each open element.
#[derive(Default)]
struct ScopeStack {
    frames: Vec<Vec<String>>,
}

impl ScopeStack {
    fn enter(&mut self, element: &Element) -> Result<(), XmlError> {
        let declared: Vec<String> = element
            .attributes
            .iter()
            .filter_map(|(k, _)| k.strip_prefix("xmlns:").map(str::to_string))
            .collect();
        self.frames.push(declared);

        if let Some(prefix) = element.prefix() {
            self.require(prefix, &element.name)?;
        }
        for (key, _) in &element.attributes {
            if let (Some(prefix), _) = split_prefix(key) {
                if prefix != "xmlns" {
                    self.require(prefix, &element.name)?;
                }
            }
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.frames.pop();
    }

    fn require(&self, prefix: &str, element: &str) -> Result<(), XmlError> {
        if prefix == "xml" || self.frames.iter().flatten().any(|p| p == prefix) {
            return Ok(());
        }
        Err(XmlError::UnboundPrefix {
            prefix: prefix.to_string(),
            element: element.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_elements() {
        let doc = Document::parse(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Example</title>
    <item><title>One</title></item>
    <item><title>Two</title></item>
  </channel>
</rss>"#,
        )
        .expect("well-formed feed should parse");

        assert_eq!(doc.root.name, "rss");
        assert_eq!(doc.root.attribute("version"), Some("2.0"));
        let channel = doc.root.child("channel").unwrap();
        assert_eq!(channel.child_text("title").as_deref(), Some("Example"));
        assert_eq!(channel.elements().filter(|e| e.name == "item").count(), 2);
    }

    #[test]
    fn test_parse_without_declaration() {
        let doc = Document::parse("<item><guid>a</guid></item>").unwrap();
        assert_eq!(doc.root.name, "item");
        assert_eq!(doc.root.child_text("guid").as_deref(), Some("a"));
    }

    #[test]
    fn test_entities_are_decoded() {
        let doc = Document::parse("<link>https://example.com/?a=1&amp;b=2</link>").unwrap();
        assert_eq!(doc.root.text(), "https://example.com/?a=1&b=2");
    }

    #[test]
    fn test_bare_ampersand_is_rejected() {
        let err = Document::parse("<link>https://example.com/a&b=1</link>").unwrap_err();
        assert!(matches!(err, XmlError::Content { .. }), "got {err:?}");
    }

    #[test]
    fn test_cdata_is_kept_literal() {
        let doc = Document::parse("<link><![CDATA[https://example.com/a&b=1]]></link>").unwrap();
        assert_eq!(
            doc.root.children,
            vec![Node::CData("https://example.com/a&b=1".to_string())]
        );
    }

    #[test]
    fn test_comments_are_preserved() {
        let doc = Document::parse("<!-- top --><rss><!-- inner --><channel/></rss>").unwrap();
        assert_eq!(doc.prolog, vec![Node::Comment(" top ".to_string())]);
        assert_eq!(doc.root.children[0], Node::Comment(" inner ".to_string()));
    }

    #[test]
    fn test_unclosed_element_is_rejected() {
        let err = Document::parse("<rss><channel><title>x</title>").unwrap_err();
        assert!(matches!(err, XmlError::Unclosed(_)), "got {err:?}");
    }

    #[test]
    fn test_mismatched_end_tag_is_rejected() {
        assert!(Document::parse("<rss><channel></rss>").is_err());
    }

    #[test]
    fn test_multiple_roots_are_rejected() {
        let err = Document::parse("<item/><item/>").unwrap_err();
        assert!(matches!(err, XmlError::MultipleRoots(_)), "got {err:?}");
    }

    #[test]
    fn test_empty_input_has_no_root() {
        let err = Document::parse("   ").unwrap_err();
        assert!(matches!(err, XmlError::MissingRoot));
    }

    #[test]
    fn test_unbound_prefix_is_rejected() {
        let err = Document::parse("<item><itunes:duration>10</itunes:duration></item>")
            .unwrap_err();
        assert!(
            matches!(err, XmlError::UnboundPrefix { ref prefix, .. } if prefix == "itunes"),
            "got {err:?}"
        );
    }

    #[test]
    fn test_prefix_bound_on_ancestor() {
        let doc = Document::parse(
            r#"<rss xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd"><item><itunes:duration>10</itunes:duration></item></rss>"#,
        )
        .unwrap();
        let item = doc.root.child("item").unwrap();
        let duration = item.child("itunes:duration").unwrap();
        assert_eq!(duration.prefix(), Some("itunes"));
        assert_eq!(duration.local_name(), "duration");
    }

    #[test]
    fn test_mixed_content_keeps_inner_spaces() {
        let doc = Document::parse("<description>Read <b>this</b> now</description>").unwrap();
        assert_eq!(
            doc.root.children,
            vec![
                Node::Text("Read ".to_string()),
                Node::Element(Element::with_text("b", "this")),
                Node::Text(" now".to_string()),
            ]
        );
    }

    #[test]
    fn test_space_between_inline_elements_is_kept() {
        let doc = Document::parse("<p>\n  <b>a</b> <i>b</i>!\n</p>").unwrap();
        assert_eq!(doc.root.children.len(), 4);
        assert_eq!(doc.root.children[1], Node::Text(" ".to_string()));
        assert_eq!(doc.root.children[3], Node::Text("!".to_string()));
    }

    #[test]
    fn test_indentation_is_dropped() {
        let doc = Document::parse("<item>\n  <title>\n    Padded\n  </title>\n  <guid>g</guid>\n</item>")
            .unwrap();
        assert_eq!(doc.root.children.len(), 2);
        assert_eq!(doc.root.child("title").unwrap().children, vec![Node::Text("Padded".to_string())]);
    }

    #[test]
    fn test_child_text_ignores_blank() {
        let doc = Document::parse("<item><guid>  </guid><link> /a </link></item>").unwrap();
        assert_eq!(doc.root.child_text("guid"), None);
        assert_eq!(doc.root.child_text("link").as_deref(), Some("/a"));
    }
}
