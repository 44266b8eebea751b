//! Handle-indexed document tree.
//!
//! A [`Manipulator`] owns one document: its elements live in an arena and
//! are addressed from the outside only through [`Handle`]s, which stay
//! valid while the tree around them is mutated. Reads hand out borrowed
//! [`ElementRef`] views; every structural change goes through `&mut self`.

use crate::config::{Config, MatchPolicy, RemovalPolicy};
use crate::element::{validate_name, Attributes, Element};
use crate::handle::{Handle, HandleRegistry};
use crate::serial::{serialize, SerializeOptions, XmlNode};
use crate::SprigError;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct NodeKey(usize);

#[derive(Debug, Clone, Default)]
struct NodeData {
    tag: String,
    text: String,
    attributes: Attributes,
    parent: Option<NodeKey>,
    children: Vec<NodeKey>,
}

/// The stateful engine owning one document tree and its handle registry.
///
/// ```
/// use sprig_core::{Attributes, Handle, Manipulator, Search};
///
/// let mut doc = Manipulator::new_document("root").unwrap();
/// let c = doc.add(Handle::ROOT, "c", "hi", Attributes::new()).unwrap();
/// assert_eq!(doc.get_id(&Search::tag("c")).unwrap(), c);
/// assert_eq!(doc.get_string(false), "<root><c>hi</c></root>");
/// ```
pub struct Manipulator {
    nodes: Vec<NodeData>,
    free: Vec<NodeKey>,
    root: NodeKey,
    registry: HandleRegistry<NodeKey>,
    config: Config,
}

/// Field changes applied by [`Manipulator::update`].
///
/// Empty values count as "not provided": an empty tag, empty text or an
/// empty attribute mapping leaves the field as it is. Use
/// [`Manipulator::clear_text`] to blank out text.
#[derive(Debug, Clone, Default)]
pub struct ElementUpdate {
    pub tag: Option<String>,
    pub text: Option<String>,
    pub attributes: Option<Attributes>,
}

impl ElementUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn attributes(mut self, attributes: impl Into<Attributes>) -> Self {
        self.attributes = Some(attributes.into());
        self
    }
}

/// Element filter used by [`Manipulator::get_id`] and
/// [`Manipulator::get_infos`].
///
/// Attribute filters compare the whole mapping: `{"x": "1"}` does not match
/// an element carrying `x="1" y="2"`. Parent filters look at the direct
/// parent only.
#[derive(Debug, Clone, Default)]
pub struct Search {
    pub tag: String,
    pub attributes: Option<Attributes>,
    pub parent_tag: Option<String>,
    pub parent_attributes: Option<Attributes>,
}

impl Search {
    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn attributes(mut self, attributes: impl Into<Attributes>) -> Self {
        self.attributes = Some(attributes.into());
        self
    }

    pub fn parent_tag(mut self, tag: impl Into<String>) -> Self {
        self.parent_tag = Some(tag.into());
        self
    }

    pub fn parent_attributes(mut self, attributes: impl Into<Attributes>) -> Self {
        self.parent_attributes = Some(attributes.into());
        self
    }

    fn has_parent_filter(&self) -> bool {
        self.parent_tag.is_some() || self.parent_attributes.is_some()
    }
}

/// A search hit: the element and its direct parent (`None` for the root)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match<'a> {
    pub element: ElementRef<'a>,
    pub parent: Option<ElementRef<'a>>,
}

/// Result of [`Manipulator::get_infos`]
#[derive(Debug, Clone, PartialEq)]
pub enum Infos<'a> {
    First(Match<'a>),
    All(Vec<Match<'a>>),
}

impl<'a> Infos<'a> {
    /// All matches as a list; `First` yields a single entry
    pub fn into_vec(self) -> Vec<Match<'a>> {
        match self {
            Self::First(m) => vec![m],
            Self::All(all) => all,
        }
    }
}

impl Manipulator {
    /// Build a document around an existing root element
    pub fn from_element(root: Element) -> crate::Result<Self> {
        Self::from_element_with_config(root, Config::default())
    }

    pub fn from_element_with_config(root: Element, config: Config) -> crate::Result<Self> {
        root.validate()?;

        let Element {
            tag,
            text,
            attributes,
            children,
        } = root;
        let root_key = NodeKey(0);
        let mut doc = Self {
            nodes: vec![NodeData {
                tag,
                text,
                attributes,
                parent: None,
                children: Vec::new(),
            }],
            free: Vec::new(),
            root: root_key,
            registry: HandleRegistry::new(root_key, config.handles.allocation),
            config,
        };
        for child in children {
            doc.attach(root_key, child);
        }

        tracing::debug!(
            root = %doc.node(root_key).tag,
            handles = doc.registry.len(),
            "document built"
        );
        Ok(doc)
    }

    /// Parse the XML file at `path`.
    ///
    /// Fails with [`SprigError::FileNotFound`] when `path` is not an
    /// existing file.
    pub fn from_path(path: impl AsRef<Path>) -> crate::Result<Self> {
        Self::from_path_with_config(path, Config::default())
    }

    pub fn from_path_with_config(path: impl AsRef<Path>, config: Config) -> crate::Result<Self> {
        let root = crate::parse::parse_file(path.as_ref())?;
        Self::from_element_with_config(root, config)
    }

    pub fn parse_str(xml: &str) -> crate::Result<Self> {
        Self::parse_str_with_config(xml, Config::default())
    }

    pub fn parse_str_with_config(xml: &str, config: Config) -> crate::Result<Self> {
        Self::from_element_with_config(crate::parse::parse_str(xml)?, config)
    }

    /// Start an empty document whose root element is `root_tag`
    pub fn new_document(root_tag: &str) -> crate::Result<Self> {
        Self::from_element(Element::new(root_tag))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Append a new element as the last child of `parent`.
    ///
    /// `Handle::ROOT` appends directly under the document root.
    pub fn add(
        &mut self,
        parent: Handle,
        tag: &str,
        text: &str,
        attributes: Attributes,
    ) -> crate::Result<Handle> {
        let element = Element {
            tag: tag.to_string(),
            text: text.to_string(),
            attributes,
            children: Vec::new(),
        };
        self.append(parent, element)
    }

    /// Append a whole subtree under `parent`.
    ///
    /// Every element of the subtree gets a handle; the handle of its top
    /// element is returned.
    pub fn append(&mut self, parent: Handle, element: Element) -> crate::Result<Handle> {
        let parent_key = self
            .registry
            .resolve(parent)
            .ok_or_else(|| SprigError::NotFound(format!("parent element {} does not exist", parent)))?;
        element.validate()?;

        let tag = element.tag.clone();
        let key = self.attach(parent_key, element);
        let handle = self.handle_for(key)?;
        tracing::debug!(%parent, %handle, %tag, "element added");
        Ok(handle)
    }

    /// Detach the element behind `handle` from its parent and return it.
    ///
    /// Descendant handles follow the configured [`RemovalPolicy`]. The root
    /// cannot be removed.
    pub fn remove(&mut self, handle: Handle) -> crate::Result<Element> {
        if handle.is_root() {
            return Err(SprigError::InvalidArgument(
                "the document root cannot be removed".to_string(),
            ));
        }
        let key = self.resolve(handle)?;

        if let Some(parent) = self.nodes[key.0].parent.take() {
            self.nodes[parent.0].children.retain(|&child| child != key);
        }
        self.registry.release(handle);

        let removed = match self.config.handles.removal {
            RemovalPolicy::Detach => self.snapshot(key),
            RemovalPolicy::Cascade => {
                let subtree = self.preorder(key);
                for &descendant in &subtree[1..] {
                    self.registry.release_key(descendant);
                }
                let element = self.snapshot(key);
                for descendant in subtree {
                    self.nodes[descendant.0] = NodeData::default();
                    self.free.push(descendant);
                }
                element
            }
        };

        tracing::debug!(%handle, tag = %removed.tag, policy = ?self.config.handles.removal, "element removed");
        Ok(removed)
    }

    /// Overwrite tag, text and/or attributes of an element in place
    pub fn update(&mut self, handle: Handle, changes: ElementUpdate) -> crate::Result<()> {
        let key = self.resolve(handle)?;

        let tag = changes.tag.filter(|t| !t.is_empty());
        let text = changes.text.filter(|t| !t.is_empty());
        let attributes = changes.attributes.filter(|a| !a.is_empty());

        if let Some(tag) = &tag {
            validate_name("tag", tag)?;
        }
        if let Some(attributes) = &attributes {
            for name in attributes.keys() {
                validate_name("attribute", name)?;
            }
        }

        let node = &mut self.nodes[key.0];
        if let Some(tag) = tag {
            node.tag = tag;
        }
        if let Some(text) = text {
            node.text = text;
        }
        if let Some(attributes) = attributes {
            node.attributes = attributes;
        }
        tracing::debug!(%handle, "element updated");
        Ok(())
    }

    /// Set an element's text to the empty string
    pub fn clear_text(&mut self, handle: Handle) -> crate::Result<()> {
        let key = self.resolve(handle)?;
        self.nodes[key.0].text.clear();
        Ok(())
    }

    pub fn get_element(&self, handle: Handle) -> crate::Result<ElementRef<'_>> {
        let key = self.resolve(handle)?;
        Ok(self.element_ref(key))
    }

    /// The document root
    pub fn root(&self) -> ElementRef<'_> {
        self.element_ref(self.root)
    }

    /// Handle of the first element in document order matching `search`
    pub fn get_id(&self, search: &Search) -> crate::Result<Handle> {
        self.preorder(self.root)
            .into_iter()
            .find(|&key| self.is_match(key, search))
            .and_then(|key| self.registry.handle_of(key))
            .ok_or_else(|| not_found(search))
    }

    /// Find the first match, or every match when `stop_at_first` is false.
    ///
    /// The root is checked first. With [`MatchPolicy::Legacy`] the walk then
    /// tests each node, the root included, followed by each of its children,
    /// so every match is reported twice and the first match may be a later
    /// child of the root rather than a deeper element of an earlier subtree.
    pub fn get_infos(&self, search: &Search, stop_at_first: bool) -> crate::Result<Infos<'_>> {
        let keys = match self.config.search.matches {
            MatchPolicy::Dedupe => self.dedupe_matches(search, stop_at_first),
            MatchPolicy::Legacy => self.legacy_matches(search, stop_at_first),
        };

        let mut matches = keys.into_iter().map(|key| Match {
            element: self.element_ref(key),
            parent: self.nodes[key.0].parent.map(|p| self.element_ref(p)),
        });

        if stop_at_first {
            matches.next().map(Infos::First).ok_or_else(|| not_found(search))
        } else {
            Ok(Infos::All(matches.collect()))
        }
    }

    /// Serialize the whole document with the configured indentation
    pub fn get_string(&self, pretty_print: bool) -> String {
        let options = if pretty_print {
            SerializeOptions::pretty(self.config.output.indent.clone())
        } else {
            SerializeOptions::compact()
        };
        self.to_string_with(&options)
    }

    pub fn to_string_with(&self, options: &SerializeOptions) -> String {
        serialize(self.root(), options)
    }

    /// Write the serialized document to `path`.
    ///
    /// Text is trimmed when a document is parsed, so leading and trailing
    /// whitespace of text values does not survive reloading the file.
    pub fn write_to(&self, path: impl AsRef<Path>, pretty_print: bool) -> crate::Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.get_string(pretty_print))?;
        tracing::debug!(path = %path.display(), "document written");
        Ok(())
    }

    /// Owned copy of the whole document tree
    pub fn to_element(&self) -> Element {
        self.snapshot(self.root)
    }

    /// Whether `handle` is currently registered
    pub fn contains(&self, handle: Handle) -> bool {
        self.registry.contains(handle)
    }

    /// Number of registered handles, the root's included
    pub fn handle_count(&self) -> usize {
        self.registry.len()
    }

    /// Registered handles, in no particular order
    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.registry.handles()
    }

    fn resolve(&self, handle: Handle) -> crate::Result<NodeKey> {
        self.registry
            .resolve(handle)
            .ok_or(SprigError::HandleNotFound(handle))
    }

    fn handle_for(&self, key: NodeKey) -> crate::Result<Handle> {
        self.registry
            .handle_of(key)
            .ok_or_else(|| SprigError::NotFound(format!("no handle for node {}", key.0)))
    }

    fn node(&self, key: NodeKey) -> &NodeData {
        &self.nodes[key.0]
    }

    fn element_ref(&self, key: NodeKey) -> ElementRef<'_> {
        ElementRef { doc: self, key }
    }

    fn alloc(&mut self, data: NodeData) -> NodeKey {
        match self.free.pop() {
            Some(key) => {
                self.nodes[key.0] = data;
                key
            }
            None => {
                self.nodes.push(data);
                NodeKey(self.nodes.len() - 1)
            }
        }
    }

    /// Move `element` into the arena under `parent`, registering a handle
    /// for each of its elements in pre-order.
    fn attach(&mut self, parent: NodeKey, element: Element) -> NodeKey {
        let mut top = None;
        let mut stack = vec![(parent, element)];

        while let Some((parent, element)) = stack.pop() {
            let Element {
                tag,
                text,
                attributes,
                children,
            } = element;
            let key = self.alloc(NodeData {
                tag,
                text,
                attributes,
                parent: Some(parent),
                children: Vec::with_capacity(children.len()),
            });
            self.nodes[parent.0].children.push(key);
            self.registry.register(key);
            top.get_or_insert(key);

            // reversed so siblings pop, and get handles, in document order
            stack.extend(children.into_iter().rev().map(|child| (key, child)));
        }
        top.unwrap_or(parent)
    }

    fn snapshot(&self, key: NodeKey) -> Element {
        // Reverse pre-order finishes every subtree before its parent, and
        // leaves the finished children on the stack first child on top.
        let mut done: Vec<Element> = Vec::new();
        for node_key in self.preorder(key).into_iter().rev() {
            let node = self.node(node_key);
            let split = done.len() - node.children.len();
            let mut children = done.split_off(split);
            children.reverse();
            done.push(Element {
                tag: node.tag.clone(),
                text: node.text.clone(),
                attributes: node.attributes.clone(),
                children,
            });
        }
        done.pop().unwrap_or_default()
    }

    fn preorder(&self, start: NodeKey) -> Vec<NodeKey> {
        let mut order = Vec::new();
        let mut stack = vec![start];
        while let Some(key) = stack.pop() {
            order.push(key);
            stack.extend(self.node(key).children.iter().rev());
        }
        order
    }

    fn is_match(&self, key: NodeKey, search: &Search) -> bool {
        let node = self.node(key);
        if node.tag != search.tag {
            return false;
        }
        if let Some(attributes) = &search.attributes {
            if node.attributes != *attributes {
                return false;
            }
        }
        if !search.has_parent_filter() {
            return true;
        }

        let parent = match node.parent {
            Some(parent) => self.node(parent),
            None => return false,
        };
        if let Some(tag) = &search.parent_tag {
            if parent.tag != *tag {
                return false;
            }
        }
        if let Some(attributes) = &search.parent_attributes {
            if parent.attributes != *attributes {
                return false;
            }
        }
        true
    }

    fn dedupe_matches(&self, search: &Search, stop_at_first: bool) -> Vec<NodeKey> {
        let mut found = Vec::new();
        for key in self.preorder(self.root) {
            if self.is_match(key, search) {
                found.push(key);
                if stop_at_first {
                    break;
                }
            }
        }
        found
    }

    fn legacy_matches(&self, search: &Search, stop_at_first: bool) -> Vec<NodeKey> {
        let mut found = Vec::new();
        if self.is_match(self.root, search) {
            found.push(self.root);
        }

        for key in self.preorder(self.root) {
            if stop_at_first && !found.is_empty() {
                break;
            }
            if self.is_match(key, search) {
                found.push(key);
            }
            for &child in &self.node(key).children {
                if stop_at_first && !found.is_empty() {
                    break;
                }
                if self.is_match(child, search) {
                    found.push(child);
                }
            }
        }
        found
    }
}

impl fmt::Debug for Manipulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manipulator")
            .field("root", &self.node(self.root).tag)
            .field("handles", &self.registry.len())
            .field("config", &self.config)
            .finish()
    }
}

fn not_found(search: &Search) -> SprigError {
    SprigError::NotFound(format!("the element '{}' could not be found", search.tag))
}

/// Borrowed, read-only view of one element of a [`Manipulator`]
#[derive(Clone, Copy)]
pub struct ElementRef<'a> {
    doc: &'a Manipulator,
    key: NodeKey,
}

impl<'a> ElementRef<'a> {
    fn data(&self) -> &'a NodeData {
        self.doc.node(self.key)
    }

    pub fn tag(&self) -> &'a str {
        &self.data().tag
    }

    pub fn text(&self) -> &'a str {
        &self.data().text
    }

    pub fn attributes(&self) -> &'a Attributes {
        &self.data().attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&'a str> {
        self.data().attributes.get(key)
    }

    /// Direct parent; `None` for the root and for detached elements
    pub fn parent(&self) -> Option<ElementRef<'a>> {
        self.data().parent.map(|key| self.doc.element_ref(key))
    }

    pub fn children(&self) -> Children<'a> {
        Children {
            doc: self.doc,
            keys: self.data().children.iter(),
        }
    }

    /// The handle currently registered for this element, if any
    pub fn handle(&self) -> Option<Handle> {
        self.doc.registry.handle_of(self.key)
    }

    pub fn is_root(&self) -> bool {
        self.key == self.doc.root
    }

    /// Owned copy of this element and its subtree
    pub fn to_element(&self) -> Element {
        self.doc.snapshot(self.key)
    }
}

impl PartialEq for ElementRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.key == other.key
    }
}

impl fmt::Debug for ElementRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementRef")
            .field("handle", &self.handle())
            .field("tag", &self.tag())
            .field("attributes", self.attributes())
            .field("text", &self.text())
            .finish()
    }
}

/// Iterator over an element's children, in document order
pub struct Children<'a> {
    doc: &'a Manipulator,
    keys: std::slice::Iter<'a, NodeKey>,
}

impl<'a> Iterator for Children<'a> {
    type Item = ElementRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.keys.next().map(|&key| self.doc.element_ref(key))
    }
}

impl<'a> XmlNode for ElementRef<'a> {
    type Children = Children<'a>;

    fn tag(&self) -> &str {
        &self.data().tag
    }

    fn text(&self) -> &str {
        &self.data().text
    }

    fn attributes(&self) -> &Attributes {
        &self.data().attributes
    }

    fn children(&self) -> Self::Children {
        ElementRef::children(self)
    }
}
