//! XML serializer.
//!
//! Renders element trees as XML text, either pretty-printed (one element
//! per line, indented per depth) or compact (a single line with no added
//! whitespace). No XML declaration is emitted.

use crate::element::{Attributes, Element};
use quick_xml::escape::{escape, partial_escape};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Indentation used per nesting level when pretty-printing.
///
/// Built from a literal string (`Indent::from("\t")`) or a number of spaces
/// (`Indent::from(2)`); both spellings of the same whitespace are equal.
/// In TOML config it may be written either way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "IndentRepr", into = "String")]
pub struct Indent(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum IndentRepr {
    Spaces(usize),
    Literal(String),
}

impl From<IndentRepr> for Indent {
    fn from(repr: IndentRepr) -> Self {
        match repr {
            IndentRepr::Spaces(n) => Indent::from(n),
            IndentRepr::Literal(s) => Indent(s),
        }
    }
}

impl Indent {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Indent {
    fn default() -> Self {
        Indent("  ".to_string())
    }
}

impl From<usize> for Indent {
    fn from(spaces: usize) -> Self {
        Indent(" ".repeat(spaces))
    }
}

impl From<&str> for Indent {
    fn from(s: &str) -> Self {
        Indent(s.to_string())
    }
}

impl From<String> for Indent {
    fn from(s: String) -> Self {
        Indent(s)
    }
}

impl From<Indent> for String {
    fn from(indent: Indent) -> Self {
        indent.0
    }
}

impl fmt::Display for Indent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Options controlling serialization output.
#[derive(Debug, Clone, Default)]
pub struct SerializeOptions {
    /// Pretty-print with one element per line. Defaults to `false`.
    pub pretty: bool,
    /// Indentation per nesting level when `pretty` is set.
    pub indent: Indent,
}

impl SerializeOptions {
    pub fn pretty(indent: impl Into<Indent>) -> Self {
        Self {
            pretty: true,
            indent: indent.into(),
        }
    }

    pub fn compact() -> Self {
        Self::default()
    }
}

/// Read access to a tree the serializer can walk.
///
/// Implemented for owned [`Element`] trees and for live document views
/// ([`ElementRef`](crate::ElementRef)), so both serialize identically.
pub trait XmlNode: Copy {
    type Children: Iterator<Item = Self>;

    fn tag(&self) -> &str;
    fn text(&self) -> &str;
    fn attributes(&self) -> &Attributes;
    fn children(&self) -> Self::Children;
}

impl<'a> XmlNode for &'a Element {
    type Children = std::slice::Iter<'a, Element>;

    fn tag(&self) -> &str {
        &self.tag
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    fn children(&self) -> Self::Children {
        self.children.iter()
    }
}

/// Serialize a tree with the given options
pub fn serialize<N: XmlNode>(node: N, options: &SerializeOptions) -> String {
    let mut out = String::new();
    if options.pretty {
        write_pretty(&mut out, node, options.indent.as_str());
    } else {
        write_compact(&mut out, node);
    }
    out
}

/// Source accepted by [`prettify`]: a built element or raw XML text
#[derive(Debug, Clone, Copy)]
pub enum PrettifySource<'a> {
    Element(&'a Element),
    Xml(&'a str),
}

impl<'a> From<&'a Element> for PrettifySource<'a> {
    fn from(element: &'a Element) -> Self {
        Self::Element(element)
    }
}

impl<'a> From<&'a str> for PrettifySource<'a> {
    fn from(xml: &'a str) -> Self {
        Self::Xml(xml)
    }
}

impl<'a> From<&'a String> for PrettifySource<'a> {
    fn from(xml: &'a String) -> Self {
        Self::Xml(xml)
    }
}

/// Pretty-print an element or an XML string.
///
/// Any declaration header in string input is dropped.
///
/// ```
/// use sprig_core::prettify;
///
/// let pretty = prettify("<root><sub_elem></sub_elem></root>", 2).unwrap();
/// assert_eq!(pretty, "<root>\n  <sub_elem/>\n</root>\n");
/// ```
pub fn prettify<'a>(
    source: impl Into<PrettifySource<'a>>,
    indent: impl Into<Indent>,
) -> crate::Result<String> {
    let options = SerializeOptions::pretty(indent);
    match source.into() {
        PrettifySource::Element(element) => Ok(serialize(element, &options)),
        PrettifySource::Xml(xml) => {
            let element = crate::parse::parse_str(xml)?;
            Ok(serialize(&element, &options))
        }
    }
}

fn write_open_tag<N: XmlNode>(out: &mut String, node: N) {
    out.push('<');
    out.push_str(node.tag());
    for (key, value) in node.attributes().iter() {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(value));
        out.push('"');
    }
}

enum Step<N> {
    Open(N, usize),
    Close(N, usize),
}

/// Push `node`'s children so that they pop in document order
fn push_children<N: XmlNode>(stack: &mut Vec<Step<N>>, children: Vec<N>, depth: usize) {
    stack.extend(children.into_iter().rev().map(|child| Step::Open(child, depth)));
}

fn write_pretty<N: XmlNode>(out: &mut String, node: N, indent: &str) {
    let mut stack = vec![Step::Open(node, 0)];

    while let Some(step) = stack.pop() {
        match step {
            Step::Open(node, depth) => {
                let pad = indent.repeat(depth);
                out.push_str(&pad);
                write_open_tag(out, node);

                let children: Vec<N> = node.children().collect();
                let text = node.text();

                if children.is_empty() {
                    if text.is_empty() {
                        out.push_str("/>\n");
                    } else {
                        out.push('>');
                        out.push_str(&partial_escape(text));
                        write_close_tag(out, node);
                        out.push('\n');
                    }
                    continue;
                }

                out.push_str(">\n");
                if !text.is_empty() {
                    out.push_str(&pad);
                    out.push_str(indent);
                    out.push_str(&partial_escape(text));
                    out.push('\n');
                }
                stack.push(Step::Close(node, depth));
                push_children(&mut stack, children, depth + 1);
            }
            Step::Close(node, depth) => {
                out.push_str(&indent.repeat(depth));
                write_close_tag(out, node);
                out.push('\n');
            }
        }
    }
}

fn write_compact<N: XmlNode>(out: &mut String, node: N) {
    let mut stack = vec![Step::Open(node, 0)];

    while let Some(step) = stack.pop() {
        match step {
            Step::Open(node, depth) => {
                write_open_tag(out, node);

                let children: Vec<N> = node.children().collect();
                let text = node.text();
                if children.is_empty() && text.is_empty() {
                    out.push_str("/>");
                    continue;
                }

                out.push('>');
                out.push_str(&partial_escape(text));
                stack.push(Step::Close(node, depth));
                push_children(&mut stack, children, depth + 1);
            }
            Step::Close(node, _) => write_close_tag(out, node),
        }
    }
}

fn write_close_tag<N: XmlNode>(out: &mut String, node: N) {
    out.push_str("</");
    out.push_str(node.tag());
    out.push('>');
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Element {
        Element::new("root")
            .with_attribute("version", "1")
            .with_child(Element::new("empty"))
            .with_child(Element::new("leaf").with_text("a < b & c"))
            .with_child(
                Element::new("branch")
                    .with_text("intro")
                    .with_child(Element::new("item").with_attribute("q", "\"x\"")),
            )
    }

    #[test]
    fn test_pretty() {
        let xml = serialize(&sample(), &SerializeOptions::pretty(2));
        let expected = "<root version=\"1\">\n  <empty/>\n  <leaf>a &lt; b &amp; c</leaf>\n  <branch>\n    intro\n    <item q=\"&quot;x&quot;\"/>\n  </branch>\n</root>\n";
        assert_eq!(xml, expected);
    }

    #[test]
    fn test_compact() {
        let xml = serialize(&sample(), &SerializeOptions::compact());
        let expected = "<root version=\"1\"><empty/><leaf>a &lt; b &amp; c</leaf><branch>intro<item q=\"&quot;x&quot;\"/></branch></root>";
        assert_eq!(xml, expected);
    }

    #[test]
    fn test_integer_indent_matches_string_indent() {
        let element = sample();
        assert_eq!(Indent::from(2), Indent::from("  "));
        assert_eq!(
            serialize(&element, &SerializeOptions::pretty(2)),
            serialize(&element, &SerializeOptions::pretty("  "))
        );
    }

    #[test]
    fn test_custom_indent() {
        let element = Element::new("a").with_child(Element::new("b"));
        assert_eq!(
            serialize(&element, &SerializeOptions::pretty("\t")),
            "<a>\n\t<b/>\n</a>\n"
        );
        assert_eq!(
            serialize(&element, &SerializeOptions::pretty(0)),
            "<a>\n<b/>\n</a>\n"
        );
    }

    #[test]
    fn test_prettify_string_strips_declaration() {
        let xml = "<?xml version=\"1.0\" encoding=\"UTF-8\"?><root><sub_elem></sub_elem></root>";
        assert_eq!(prettify(xml, "  ").unwrap(), "<root>\n  <sub_elem/>\n</root>\n");
    }

    #[test]
    fn test_prettify_element() {
        let element = Element::new("root").with_child(Element::new("x").with_text("1"));
        assert_eq!(prettify(&element, 4).unwrap(), "<root>\n    <x>1</x>\n</root>\n");
    }

    #[test]
    fn test_prettify_deep_nesting() {
        let depth = 10_000;
        let xml = format!("{}{}", "<d>".repeat(depth), "</d>".repeat(depth));

        let pretty = prettify(xml.as_str(), 0).unwrap();
        assert_eq!(pretty.lines().count(), 2 * depth - 1);
        assert!(pretty.starts_with("<d>\n<d>\n"));
        assert!(pretty.ends_with("<d/>\n</d>\n</d>\n"));

        let element = Element::parse(&xml).unwrap();
        let compact = serialize(&element, &SerializeOptions::compact());
        assert_eq!(compact.len(), 7 * (depth - 1) + 4);
    }

    #[test]
    fn test_prettify_malformed() {
        assert!(prettify("<root>", 2).is_err());
    }

    #[test]
    fn test_indent_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            indent: Indent,
        }
        let from_int: Wrapper = toml::from_str("indent = 3").unwrap();
        let from_str: Wrapper = toml::from_str("indent = \"   \"").unwrap();
        assert_eq!(from_int.indent, from_str.indent);
        assert_eq!(from_int.indent.as_str(), "   ");
    }
}
