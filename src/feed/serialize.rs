use crate::xml::namespace::undeclared_prefixes;
use crate::xml::{render_compact, render_indented, Document, Element, NamespaceBindings, Node, XmlError};

use super::MergeError;

const INDENT: usize = 2;

/// Output of [`serialize_feed`].
#[derive(Debug, Clone)]
pub struct SerializedFeed {
    /// UTF-8 XML with declaration, two-space indentation and no blank lines.
    pub bytes: Vec<u8>,
    /// Bindings declared on the feed root after the fix-up pass.
    pub namespaces: NamespaceBindings,
}

/// Renders a merged feed.
///
/// 1. Namespace fix-up: `xmlns:` declarations carried by items are hoisted
///    to the root when the root does not bind that prefix yet, dropped when
///    the root binds it to the same URI, and kept on the item otherwise.
/// 2. Compact render and re-parse, so the output is checked to be
///    well-formed before any formatting happens.
/// 3. Every `link` directly under an `item` becomes a CDATA section holding
///    the literal URL.
/// 4. Indented render, with empty and whitespace-only lines removed.
pub fn serialize_feed(
    mut doc: Document,
    mut namespaces: NamespaceBindings,
) -> Result<SerializedFeed, MergeError> {
    fix_namespaces(&mut doc.root, &mut namespaces).map_err(MergeError::Serialize)?;

    let compact = render_compact(&doc).map_err(MergeError::Serialize)?;
    let compact = String::from_utf8(compact)
        .map_err(|e| MergeError::Serialize(XmlError::Write(e.to_string())))?;
    let mut pretty = Document::parse(&compact).map_err(MergeError::Serialize)?;

    literalize_item_links(&mut pretty.root);

    let indented = render_indented(&pretty, INDENT).map_err(MergeError::Serialize)?;
    let text = String::from_utf8(indented)
        .map_err(|e| MergeError::Serialize(XmlError::Write(e.to_string())))?;

    Ok(SerializedFeed {
        bytes: strip_blank_lines(&text).into_bytes(),
        namespaces,
    })
}

/// Moves item-level namespace declarations onto the root where possible and
/// makes sure every prefix in the tree is declared.
///
/// An item declaration is compared with the binding in scope at the item,
/// which includes declarations on `channel`, not just the root.
fn fix_namespaces(root: &mut Element, namespaces: &mut NamespaceBindings) -> Result<(), XmlError> {
    let mut hoisted = Vec::new();

    if let Some(channel) = root.child_mut("channel") {
        let mut in_scope = namespaces.overlay(channel);
        for item in channel.elements_mut().filter(|e| e.name == "item") {
            item.attributes.retain(|(key, uri)| {
                let Some(prefix) = key.strip_prefix("xmlns:") else {
                    return true;
                };
                match in_scope.get(prefix) {
                    Some(bound) if bound == uri.as_str() => false,
                    Some(_) => true,
                    None => {
                        namespaces.insert(prefix, uri);
                        in_scope.insert(prefix, uri);
                        hoisted.push((prefix.to_string(), uri.clone()));
                        false
                    }
                }
            });
        }
    }

    for (prefix, uri) in hoisted {
        tracing::debug!(prefix = %prefix, uri = %uri, "Declaring namespace on feed root");
        root.set_attribute(format!("xmlns:{prefix}"), uri);
    }

    for prefix in undeclared_prefixes(root, &[]) {
        let uri = namespaces
            .get(&prefix)
            .ok_or_else(|| XmlError::UnboundPrefix {
                prefix: prefix.clone(),
                element: root.name.clone(),
            })?
            .to_string();
        root.set_attribute(format!("xmlns:{prefix}"), uri);
    }
    Ok(())
}

/// Replaces the content of each `item`'s `link` children with CDATA.
fn literalize_item_links(element: &mut Element) {
    let is_item = element.name == "item";
    for child in element.elements_mut() {
        if is_item && child.name == "link" {
            let url = child.text();
            if !url.is_empty() {
                child.children = vec![Node::CData(url)];
            }
        } else {
            literalize_item_links(child);
        }
    }
}

fn strip_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines().filter(|line| !line.trim().is_empty()) {
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn serialize_str(xml: &str) -> String {
        let doc = Document::parse(xml).unwrap();
        let namespaces = NamespaceBindings::from_root(&doc.root);
        let out = serialize_feed(doc, namespaces).unwrap();
        String::from_utf8(out.bytes).unwrap()
    }

    #[test]
    fn test_pretty_output_shape() {
        let out = serialize_str(
            "<rss version=\"2.0\"><channel><title>T</title>\
             <item><title>A</title><link>https://example.com/a?x=1&amp;y=2</link></item>\
             </channel></rss>",
        );
        assert_eq!(
            out,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <rss version=\"2.0\">\n\
             \x20 <channel>\n\
             \x20   <title>T</title>\n\
             \x20   <item>\n\
             \x20     <title>A</title>\n\
             \x20     <link><![CDATA[https://example.com/a?x=1&y=2]]></link>\n\
             \x20   </item>\n\
             \x20 </channel>\n\
             </rss>\n"
        );
    }

    #[test]
    fn test_channel_link_stays_text() {
        let out = serialize_str(
            "<rss><channel><link>/?a=1&amp;b=2</link><item><link>/x</link></item></channel></rss>",
        );
        assert!(out.contains("    <link>/?a=1&amp;b=2</link>\n"), "{out}");
        assert!(out.contains("<link><![CDATA[/x]]></link>"), "{out}");
    }

    #[test]
    fn test_no_blank_lines() {
        let out = serialize_str(
            "<rss><channel>\n\n<title>T</title>\n\n\n<item><guid>a</guid></item>\n</channel></rss>",
        );
        assert!(out.lines().all(|l| !l.trim().is_empty()), "{out}");
    }

    #[test]
    fn test_item_namespace_hoisted_to_root() {
        let out = serialize_str(
            r#"<rss><channel><item xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd"><itunes:duration>60</itunes:duration></item></channel></rss>"#,
        );
        assert!(
            out.contains(r#"<rss xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">"#),
            "{out}"
        );
        assert!(out.contains("<item>\n"), "{out}");
        assert!(out.contains("<itunes:duration>60</itunes:duration>"), "{out}");
    }

    #[test]
    fn test_conflicting_item_namespace_stays_local() {
        let out = serialize_str(
            r#"<rss xmlns:media="http://search.yahoo.com/mrss/"><channel><item xmlns:media="urn:other"><media:x/></item></channel></rss>"#,
        );
        assert!(out.contains(r#"<item xmlns:media="urn:other">"#), "{out}");
        assert!(
            out.contains(r#"<rss xmlns:media="http://search.yahoo.com/mrss/">"#),
            "{out}"
        );
    }

    #[test]
    fn test_item_namespace_checked_against_channel_scope() {
        let out = serialize_str(
            r#"<rss><channel xmlns:dc="urn:X"><item xmlns:dc="urn:Y"><guid>new</guid><dc:creator>B</dc:creator></item><item><dc:creator>A</dc:creator></item></channel></rss>"#,
        );
        assert!(out.contains(r#"<item xmlns:dc="urn:Y">"#), "{out}");
        assert!(out.contains("<rss>\n"), "{out}");
        assert_eq!(out.matches("xmlns:dc").count(), 2, "{out}");
    }

    #[test]
    fn test_item_namespace_matching_channel_dropped() {
        let out = serialize_str(
            r#"<rss><channel xmlns:dc="urn:X"><item xmlns:dc="urn:X"><dc:creator>B</dc:creator></item></channel></rss>"#,
        );
        assert_eq!(out.matches("xmlns:dc").count(), 1, "{out}");
        assert!(out.contains(r#"<channel xmlns:dc="urn:X">"#), "{out}");
    }

    #[test]
    fn test_redundant_item_namespace_dropped() {
        let out = serialize_str(
            r#"<rss xmlns:media="http://search.yahoo.com/mrss/"><channel><item xmlns:media="http://search.yahoo.com/mrss/"><media:x/></item></channel></rss>"#,
        );
        assert!(out.contains("<item>\n"), "{out}");
        assert_eq!(out.matches("xmlns:media").count(), 1, "{out}");
    }

    #[test]
    fn test_returns_updated_bindings() {
        let doc = Document::parse(
            r#"<rss><channel><item xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:creator>A</dc:creator></item></channel></rss>"#,
        )
        .unwrap();
        let out = serialize_feed(doc, NamespaceBindings::new()).unwrap();
        assert_eq!(
            out.namespaces.get("dc"),
            Some("http://purl.org/dc/elements/1.1/")
        );
    }

    #[test]
    fn test_link_with_cdata_terminator_round_trips() {
        let out = serialize_str("<rss><channel><item><link>/a]]&gt;b</link></item></channel></rss>");
        assert!(out.contains("<link><![CDATA[/a]]]]><![CDATA[>b]]></link>"), "{out}");
        let reparsed = Document::parse(&out).unwrap();
        let link = reparsed.root.child("channel").unwrap().child("item").unwrap().child("link").unwrap();
        assert_eq!(link.text(), "/a]]>b");
    }

    #[test]
    fn test_strip_blank_lines() {
        assert_eq!(strip_blank_lines("a\n\n  \nb\n\t\n"), "a\nb\n");
    }
}
