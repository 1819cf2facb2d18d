use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::tree::{Document, Element, Node, XmlError};

/// Renders a document without any added whitespace.
pub fn render_compact(doc: &Document) -> Result<Vec<u8>, XmlError> {
    let mut writer = Writer::new(Vec::new());
    write_document(&mut writer, doc)?;
    Ok(writer.into_inner())
}

/// Renders a document with `indent` spaces per nesting level.
///
/// Elements whose content is text or CDATA stay on one line.
pub fn render_indented(doc: &Document, indent: usize) -> Result<Vec<u8>, XmlError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', indent);
    write_document(&mut writer, doc)?;
    Ok(writer.into_inner())
}

fn write_document(writer: &mut Writer<Vec<u8>>, doc: &Document) -> Result<(), XmlError> {
    emit(
        writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;
    for node in &doc.prolog {
        write_node(writer, node)?;
    }
    write_element(writer, &doc.root)
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), XmlError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        return emit(writer, Event::Empty(start));
    }

    emit(writer, Event::Start(start))?;
    for child in &element.children {
        write_node(writer, child)?;
    }
    emit(writer, Event::End(BytesEnd::new(element.name.as_str())))
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &Node) -> Result<(), XmlError> {
    match node {
        Node::Element(e) => write_element(writer, e),
        Node::Text(text) => emit(writer, Event::Text(BytesText::from_escaped(partial_escape(text)))),
        Node::CData(text) => {
            for segment in cdata_segments(text) {
                emit(writer, Event::CData(BytesCData::new(segment)))?;
            }
            Ok(())
        }
        Node::Comment(text) => emit(writer, Event::Comment(BytesText::from_escaped(text.as_str()))),
    }
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), XmlError> {
    writer
        .write_event(event)
        .map_err(|e| XmlError::Write(e.to_string()))
}

/// Splits text so that no segment contains the `]]>` terminator.
///
/// Adjacent CDATA sections concatenate back to the original text.
pub fn cdata_segments(text: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find("]]>") {
        // Cut between "]]" and ">" so neither half closes the section
        segments.push(&rest[..pos + 2]);
        rest = &rest[pos + 2..];
    }
    segments.push(rest);
    segments
}
