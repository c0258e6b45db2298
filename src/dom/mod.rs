//! Owned document tree.
//!
//! `scraper` hands out an immutable arena tree, which is the wrong shape for
//! the repair passes: they splice, absorb and remove siblings. Every parsed
//! document is therefore copied into this plain value tree, where a
//! container's children are a `Vec<Node>` addressed by index.
//!
//! # Example
//!
//! ```rust
//! use readorder::dom::{Document, Node};
//!
//! let doc = Document::parse("<html><body><p>Hello <b>world</b></p></body></html>");
//! let body = doc.body().unwrap();
//! assert_eq!(body.text(), "Hello world");
//! ```

mod parse;
mod serialize;

pub use serialize::{serialize_nodes, to_markup};

/// Class used for visually hidden content that stays exposed to assistive
/// technology.
pub const HIDDEN_CLASS: &str = "text-hidden";

/// A node in the owned tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

/// An element with its attributes in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

/// A parsed document: the raw prologue (XML declaration, doctype) plus the
/// root nodes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub prologue: String,
    pub nodes: Vec<Node>,
}

impl Node {
    pub fn text(s: impl Into<String>) -> Self {
        Node::Text(s.into())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    /// `true` when this node is an element with the given tag name.
    pub fn is(&self, name: &str) -> bool {
        self.as_element().is_some_and(|el| el.name == name)
    }

    /// Concatenated descendant text.
    pub fn raw_text(&self) -> String {
        let mut out = String::new();
        collect_text(std::slice::from_ref(self), &mut out);
        out
    }

    /// Descendant text with whitespace collapsed.
    pub fn text_content(&self) -> String {
        normalize_ws(&self.raw_text())
    }

    /// Whitespace-only text nodes and comments carry nothing for the reader.
    pub fn is_blank(&self) -> bool {
        match self {
            Node::Text(t) => t.trim().is_empty(),
            Node::Comment(_) => true,
            Node::Element(_) => false,
        }
    }

    /// Whitespace, comments, and containers that hold only media.
    pub fn is_ignorable(&self) -> bool {
        match self {
            Node::Element(el) => el.is_media_only(),
            _ => self.is_blank(),
        }
    }
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    #[must_use]
    pub fn with_text(self, text: &str) -> Self {
        self.with_child(Node::text(text))
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self
            .attrs
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some((_, v)) => *v = value.to_string(),
            None => self.attrs.push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let idx = self
            .attrs
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(self.attrs.remove(idx).1)
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let joined = match self.attr("class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim()),
            _ => class.to_string(),
        };
        self.set_attr("class", &joined);
    }

    pub fn raw_text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    pub fn text(&self) -> String {
        normalize_ws(&self.raw_text())
    }

    pub fn is_heading(&self) -> bool {
        heading_level(&self.name).is_some()
    }

    /// Child elements in order.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Depth-first search for the first element matching `pred`.
    pub fn find(&self, pred: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        find_in(&self.children, pred)
    }

    /// `true` when the subtree holds media and nothing readable.
    pub fn is_media_only(&self) -> bool {
        if is_media_tag(&self.name) {
            return true;
        }
        if matches!(self.name.as_str(), "p" | "li" | "td" | "th" | "aside" | "table") {
            return false;
        }
        let mut saw_media = false;
        for child in &self.children {
            match child {
                Node::Element(el) if el.is_media_only() => saw_media = true,
                Node::Element(_) => return false,
                other if other.is_blank() => {}
                _ => return false,
            }
        }
        saw_media
    }
}

/// Depth-first search over a node list.
pub fn find_in<'a>(nodes: &'a [Node], pred: &dyn Fn(&Element) -> bool) -> Option<&'a Element> {
    for node in nodes {
        if let Node::Element(el) = node {
            if pred(el) {
                return Some(el);
            }
            if let Some(found) = find_in(&el.children, pred) {
                return Some(found);
            }
        }
    }
    None
}

/// Mutable depth-first search over a node list.
pub fn find_in_mut<'a>(
    nodes: &'a mut [Node],
    pred: &dyn Fn(&Element) -> bool,
) -> Option<&'a mut Element> {
    for node in nodes {
        if let Node::Element(el) = node {
            if pred(el) {
                return Some(el);
            }
            if let Some(found) = find_in_mut(&mut el.children, pred) {
                return Some(found);
            }
        }
    }
    None
}

/// Visit every element in document order.
pub fn walk_elements_mut(nodes: &mut [Node], f: &mut dyn FnMut(&mut Element)) {
    for node in nodes {
        if let Node::Element(el) = node {
            f(el);
            walk_elements_mut(&mut el.children, f);
        }
    }
}

fn collect_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Element(el) if el.name == "script" || el.name == "style" => {}
            Node::Element(el) => collect_text(&el.children, out),
            Node::Comment(_) => {}
        }
    }
}

const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "br", "cite", "code", "dfn", "em", "i", "kbd", "mark", "q",
    "s", "samp", "small", "span", "strong", "sub", "sup", "time", "u", "var", "wbr", "font",
];

/// Phrasing-level tags that never start a block of their own.
pub fn is_inline_tag(name: &str) -> bool {
    INLINE_TAGS.contains(&name)
}

fn is_media_tag(name: &str) -> bool {
    matches!(
        name,
        "img" | "svg" | "picture" | "video" | "audio" | "canvas" | "object" | "embed" | "br" | "hr"
    )
}

/// Heading level for `h1`..`h6`.
pub fn heading_level(name: &str) -> Option<u8> {
    let rest = name.strip_prefix('h')?;
    match rest.parse::<u8>() {
        Ok(level @ 1..=6) if rest.len() == 1 => Some(level),
        _ => None,
    }
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace-normalized, case-folded key for exact title matching.
pub fn match_key(s: &str) -> String {
    normalize_ws(s).to_lowercase()
}

impl Document {
    /// Parse markup into an owned tree.
    ///
    /// Never fails: html5ever repairs whatever it is given.
    pub fn parse(source: &str) -> Self {
        parse::parse_document(source)
    }

    pub fn to_markup(&self) -> String {
        let mut out = self.prologue.clone();
        out.push_str(&serialize_nodes(&self.nodes));
        out
    }

    pub fn html(&self) -> Option<&Element> {
        self.nodes.iter().filter_map(Node::as_element).find(|el| el.name == "html")
    }

    pub fn body(&self) -> Option<&Element> {
        self.html()?.child_elements().find(|el| el.name == "body")
    }

    pub fn body_mut(&mut self) -> Option<&mut Element> {
        self.nodes
            .iter_mut()
            .filter_map(Node::as_element_mut)
            .find(|el| el.name == "html")?
            .children
            .iter_mut()
            .filter_map(Node::as_element_mut)
            .find(|el| el.name == "body")
    }

    pub fn head(&self) -> Option<&Element> {
        self.html()?.child_elements().find(|el| el.name == "head")
    }

    pub fn find(&self, pred: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        find_in(&self.nodes, pred)
    }

    pub fn find_mut(&mut self, pred: &dyn Fn(&Element) -> bool) -> Option<&mut Element> {
        find_in_mut(&mut self.nodes, pred)
    }
}
