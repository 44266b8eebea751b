//! XML text parsing into [`Element`] trees

use crate::element::{Attributes, Element};
use crate::error::SprigError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;

/// Read and parse an XML file.
///
/// Fails with [`SprigError::FileNotFound`] when `path` is not an existing
/// regular file.
pub fn parse_file(path: &Path) -> crate::Result<Element> {
    if !path.is_file() {
        return Err(SprigError::FileNotFound(path.to_path_buf()));
    }
    let source = std::fs::read_to_string(path)?;
    tracing::debug!(path = %path.display(), bytes = source.len(), "parsing xml file");
    parse_str(&source)
}

/// Parse an XML document string and return its root element.
///
/// Whitespace-only text is dropped and text is trimmed. Text that follows a
/// child element is appended to the parent's text, separated by a space.
/// Declarations, comments, processing instructions and DOCTYPEs are skipped.
pub fn parse_str(xml: &str) -> crate::Result<Element> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => return Err(parse_error(&reader, e)),
        };

        match event {
            Event::Start(start) => {
                ensure_single_root(&reader, &root)?;
                stack.push(start_element(&reader, &start)?);
            }
            Event::Empty(start) => {
                ensure_single_root(&reader, &root)?;
                let element = start_element(&reader, &start)?;
                close_element(element, &mut stack, &mut root);
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| parse_error(&reader, "unmatched closing tag"))?;
                close_element(element, &mut stack, &mut root);
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| parse_error(&reader, e))?;
                push_text(&reader, &mut stack, &text)?;
            }
            Event::CData(data) => {
                let text = String::from_utf8(data.into_inner().into_owned())
                    .map_err(|e| parse_error(&reader, e))?;
                push_text(&reader, &mut stack, &text)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(parse_error(
            &reader,
            format!("unclosed element <{}>", open.tag),
        ));
    }

    root.ok_or_else(|| parse_error(&reader, "document has no root element"))
}

fn start_element(reader: &Reader<&[u8]>, start: &BytesStart<'_>) -> crate::Result<Element> {
    let tag = utf8(reader, start.name().as_ref())?.to_string();

    let mut attributes = Attributes::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| parse_error(reader, e))?;
        let key = utf8(reader, attr.key.as_ref())?.to_string();
        let value = attr.unescape_value().map_err(|e| parse_error(reader, e))?;
        attributes.insert(key, value.into_owned());
    }

    Ok(Element {
        tag,
        attributes,
        ..Default::default()
    })
}

fn close_element(element: Element, stack: &mut Vec<Element>, root: &mut Option<Element>) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => *root = Some(element),
    }
}

fn push_text(reader: &Reader<&[u8]>, stack: &mut [Element], text: &str) -> crate::Result<()> {
    if text.is_empty() {
        return Ok(());
    }
    let current = stack
        .last_mut()
        .ok_or_else(|| parse_error(reader, "text outside of the root element"))?;
    if !current.text.is_empty() {
        current.text.push(' ');
    }
    current.text.push_str(text);
    Ok(())
}

fn ensure_single_root(reader: &Reader<&[u8]>, root: &Option<Element>) -> crate::Result<()> {
    match root {
        Some(_) => Err(parse_error(reader, "multiple root elements")),
        None => Ok(()),
    }
}

fn utf8<'a>(reader: &Reader<&[u8]>, bytes: &'a [u8]) -> crate::Result<&'a str> {
    std::str::from_utf8(bytes).map_err(|e| parse_error(reader, e))
}

fn parse_error(reader: &Reader<&[u8]>, message: impl ToString) -> SprigError {
    SprigError::Parse {
        position: reader.buffer_position() as u64,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested() {
        let root = parse_str(r#"<root><a x="1"/><b><a x="2">two</a></b></root>"#).unwrap();

        assert_eq!(root.tag, "root");
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].attributes.get("x"), Some("1"));
        assert_eq!(root.children[1].children[0].text, "two");
    }

    #[test]
    fn test_parse_skips_declaration_and_comments() {
        let xml = "<?xml version=\"1.0\"?>\n<!-- note -->\n<root>\n  <a/>\n</root>\n";
        let root = parse_str(xml).unwrap();
        assert_eq!(root.tag, "root");
        assert_eq!(root.text, "");
        assert_eq!(root.children.len(), 1);
    }

    #[test]
    fn test_parse_unescapes_entities() {
        let root = parse_str(r#"<root k="a &amp; b">1 &lt; 2</root>"#).unwrap();
        assert_eq!(root.attributes.get("k"), Some("a & b"));
        assert_eq!(root.text, "1 < 2");
    }

    #[test]
    fn test_parse_cdata() {
        let root = parse_str("<root><![CDATA[<raw>]]></root>").unwrap();
        assert_eq!(root.text, "<raw>");
    }

    #[test]
    fn test_parse_tail_text_joins_parent_text() {
        let root = parse_str("<p>hello <b>big</b> world</p>").unwrap();
        assert_eq!(root.text, "hello world");
        assert_eq!(root.children[0].text, "big");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_str("<root>"), Err(SprigError::Parse { .. })));
        assert!(matches!(parse_str("<a></b>"), Err(SprigError::Parse { .. })));
        assert!(matches!(parse_str("<a/><b/>"), Err(SprigError::Parse { .. })));
        assert!(matches!(parse_str(""), Err(SprigError::Parse { .. })));
        assert!(matches!(parse_str("<a x='1' x='2'/>"), Err(SprigError::Parse { .. })));
    }

    #[test]
    fn test_parse_file_missing() {
        let err = parse_file(Path::new("/definitely/not/here.xml")).unwrap_err();
        assert!(matches!(err, SprigError::FileNotFound(_)));
    }
}
