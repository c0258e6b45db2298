//! Structural extraction from the existing tag tree.
//!
//! Walks the content container depth-first and emits a flat candidate
//! stream: headings (including short all-caps paragraphs), paragraphs,
//! figures, asides for "feature" callouts (titled, or wrapped in a feature
//! container), existing lists, and page-number containers (left intact for
//! the footer pass). Tables are never flattened here; they belong to
//! [`super::dom_table`].

use std::collections::{HashMap, HashSet};

use super::lists::parse_marker;
use crate::config::StructureConfig;
use crate::dom::{is_inline_tag, match_key, Document, Element, Node, HIDDEN_CLASS};

/// Paragraphs shorter than this (in visible characters) may be promoted to
/// headings by class.
const SHORT_PARAGRAPH_CHARS: usize = 50;

/// Inline attributes worth keeping once positioning is discarded.
const KEPT_INLINE_ATTRS: &[&str] = &["href", "lang", "xml:lang", "title", "dir"];

/// Content container: the first element whose id is listed in the config,
/// else `<body>`.
pub fn content_root<'a>(doc: &'a Document, config: &StructureConfig) -> &'a [Node] {
    for id in &config.container_ids {
        if let Some(el) = doc.find(&|el| el.id() == Some(id.as_str())) {
            return &el.children;
        }
    }
    match doc.body() {
        Some(body) => &body.children,
        None => &doc.nodes,
    }
}

/// Walk the content container and emit semantic candidates in document
/// order.
pub fn extract_structure(doc: &Document, config: &StructureConfig, feature_titles: &[String]) -> Vec<Node> {
    let mut walker = Walker {
        config,
        features: feature_titles.iter().map(|t| match_key(t)).collect(),
        aside_ids: HashMap::new(),
        out: Vec::new(),
    };
    walker.walk(content_root(doc, config));
    walker.out
}

struct Walker<'a> {
    config: &'a StructureConfig,
    features: HashSet<String>,
    aside_ids: HashMap<String, usize>,
    out: Vec<Node>,
}

impl Walker<'_> {
    fn walk(&mut self, nodes: &[Node]) {
        let mut i = 0;
        while i < nodes.len() {
            match &nodes[i] {
                Node::Text(t) if !t.trim().is_empty() => {
                    self.out.push(Node::Element(Element::new("p").with_text(t.trim())));
                }
                Node::Element(el) => {
                    i = self.visit(nodes, i, el);
                    continue;
                }
                _ => {}
            }
            i += 1;
        }
    }

    /// Handle the element at `nodes[i]`; returns the next index to visit.
    fn visit(&mut self, nodes: &[Node], i: usize, el: &Element) -> usize {
        if self.is_page_number(el) {
            self.out.push(Node::Element(el.clone()));
            return i + 1;
        }
        if matches!(el.name.as_str(), "div" | "section") && self.is_feature_block(el) {
            let aside = self.feature_block(el);
            self.out.push(Node::Element(aside));
            return i + 1;
        }

        match el.name.as_str() {
            "script" | "style" | "template" | "noscript" | "head" | "table" | "br" | "hr" => i + 1,
            "img" => {
                self.out.push(figure_for(el));
                i + 1
            }
            "figure" | "aside" => {
                self.out.push(Node::Element(clean_block(el)));
                i + 1
            }
            "ul" | "ol" | "dl" => {
                self.out.push(Node::Element(clean_block(el)));
                i + 1
            }
            "p" => self.visit_text_block(nodes, i, el),
            _ if el.is_heading() => self.visit_text_block(nodes, i, el),
            _ if is_leaf_block(el) => self.visit_text_block(nodes, i, el),
            _ => {
                self.walk(&el.children);
                i + 1
            }
        }
    }

    fn visit_text_block(&mut self, nodes: &[Node], i: usize, el: &Element) -> usize {
        let text = el.text();
        if text.is_empty() {
            // Image-only paragraphs still carry figures.
            self.walk_images(&el.children);
            return i + 1;
        }

        if self.features.contains(&match_key(&text)) {
            let next = next_sibling_paragraph(nodes, i);
            let body = next
                .map(|(_, p)| {
                    let mut para = Element::new("p");
                    para.children = clean_inline(&p.children);
                    vec![Node::Element(para)]
                })
                .unwrap_or_default();
            let aside = self.aside(Some(&text), body);
            self.out.push(Node::Element(aside));
            return next.map_or(i + 1, |(j, _)| j + 1);
        }

        if el.is_heading() {
            let mut h = Element::new(&el.name);
            if let Some(id) = el.id() {
                h.set_attr("id", id);
            }
            h.children = clean_inline(&el.children);
            self.out.push(Node::Element(h));
        } else if (text.chars().count() < SHORT_PARAGRAPH_CHARS && self.has_heading_class(el))
            || (self.config.uppercase_headings
                && is_shouted(&text, self.config.uppercase_heading_max_words))
        {
            self.out.push(Node::Element(Element::new("h2").with_text(&text)));
        } else {
            let mut p = Element::new("p");
            p.children = clean_inline(&el.children);
            self.out.push(Node::Element(p));
        }
        i + 1
    }

    fn walk_images(&mut self, nodes: &[Node]) {
        for node in nodes {
            if let Node::Element(el) = node {
                if el.name == "img" {
                    self.out.push(figure_for(el));
                } else {
                    self.walk_images(&el.children);
                }
            }
        }
    }

    /// Aside for a callout. Untitled callouts get a bare `feature` id.
    fn aside(&mut self, title: Option<&str>, body: Vec<Node>) -> Element {
        let base = match title {
            Some(title) => format!("feature-{}", slugify(title)),
            None => "feature".to_string(),
        };
        let seen = self.aside_ids.entry(base.clone()).or_insert(0);
        *seen += 1;
        let id = if *seen == 1 {
            base
        } else {
            format!("{base}-{seen}")
        };

        let mut aside = Element::new("aside").with_attr("id", &id);
        if let Some(title) = title {
            aside.set_attr("aria-label", title);
            aside
                .children
                .push(Node::Element(Element::new("h3").with_text(title)));
        }
        aside.children.extend(body);
        aside
    }

    fn is_feature_block(&self, el: &Element) -> bool {
        el.classes()
            .any(|c| self.config.feature_classes.iter().any(|f| f == c))
    }

    /// Callout wrapped in its own container: a leading heading becomes the
    /// title, everything else the body.
    fn feature_block(&mut self, el: &Element) -> Element {
        let mut inner = Walker {
            config: self.config,
            features: HashSet::new(),
            aside_ids: HashMap::new(),
            out: Vec::new(),
        };
        inner.walk(&el.children);
        let mut body = inner.out;

        let title = match body.first().and_then(Node::as_element) {
            Some(h) if h.is_heading() => Some(h.text()),
            _ => None,
        };
        if title.is_some() {
            body.remove(0);
        }
        self.aside(title.as_deref(), body)
    }

    fn is_page_number(&self, el: &Element) -> bool {
        el.classes()
            .any(|c| self.config.page_number_classes.iter().any(|p| p == c))
    }

    fn has_heading_class(&self, el: &Element) -> bool {
        el.classes().any(|c| {
            let c = c.to_lowercase();
            self.config
                .heading_class_hints
                .iter()
                .any(|hint| c.contains(&hint.to_lowercase()))
        })
    }
}

/// Short text whose cased letters are all uppercase, like "SAFETY FIRST".
fn is_shouted(text: &str, max_words: usize) -> bool {
    if text.split_whitespace().count() > max_words {
        return false;
    }
    if parse_marker(text).is_some() {
        return false;
    }
    let mut cased = text.chars().filter(|c| c.is_lowercase() || c.is_uppercase()).peekable();
    cased.peek().is_some() && cased.all(char::is_uppercase)
}

/// Next paragraph sibling after `i`, skipping whitespace-only nodes.
fn next_sibling_paragraph(nodes: &[Node], i: usize) -> Option<(usize, &Element)> {
    let j = (i + 1..nodes.len()).find(|&k| !nodes[k].is_blank())?;
    nodes[j]
        .as_element()
        .filter(|el| el.name == "p")
        .map(|el| (j, el))
}

/// An element with text but no block-level descendants.
fn is_leaf_block(el: &Element) -> bool {
    !is_inline_tag(&el.name)
        && el.children.iter().all(|child| match child {
            Node::Element(c) => is_inline_tag(&c.name) && is_inline_subtree(c),
            _ => true,
        })
        && !el.text().is_empty()
}

fn is_inline_subtree(el: &Element) -> bool {
    el.child_elements()
        .all(|c| is_inline_tag(&c.name) && is_inline_subtree(c))
}

/// Figure with the image and its alt text mirrored into a hidden caption.
fn figure_for(img: &Element) -> Node {
    let alt = img
        .attr("alt")
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or("Image");
    let mut image = Element::new("img");
    for (k, v) in &img.attrs {
        if !matches!(k.as_str(), "style" | "class" | "id") {
            image.attrs.push((k.clone(), v.clone()));
        }
    }
    image.set_attr("alt", alt);

    let caption = Element::new("figcaption").with_child(Node::Element(
        Element::new("p").with_attr("class", HIDDEN_CLASS).with_text(alt),
    ));
    Node::Element(
        Element::new("figure")
            .with_child(Node::Element(image))
            .with_child(Node::Element(caption)),
    )
}

/// Copy inline content, unwrapping `span`s and dropping positioning
/// attributes.
pub fn clean_inline(nodes: &[Node]) -> Vec<Node> {
    let mut out = Vec::new();
    for node in nodes {
        match node {
            Node::Text(t) => out.push(Node::Text(t.clone())),
            Node::Comment(_) => {}
            Node::Element(el) if el.name == "span" || el.name == "font" => {
                out.extend(clean_inline(&el.children));
            }
            Node::Element(el) if el.name == "script" || el.name == "style" => {}
            Node::Element(el) => {
                let mut copy = Element::new(&el.name);
                for (k, v) in &el.attrs {
                    if KEPT_INLINE_ATTRS.contains(&k.as_str()) || (el.name == "img" && k != "style") {
                        copy.attrs.push((k.clone(), v.clone()));
                    }
                }
                copy.children = clean_inline(&el.children);
                out.push(Node::Element(copy));
            }
        }
    }
    out
}

/// Copy a block, keeping its structure but dropping style/class noise and
/// unwrapping spans.
fn clean_block(el: &Element) -> Element {
    let mut copy = Element::new(&el.name);
    for (k, v) in &el.attrs {
        if !matches!(k.as_str(), "style" | "class") {
            copy.attrs.push((k.clone(), v.clone()));
        }
    }
    for child in &el.children {
        match child {
            Node::Element(c) if c.name == "span" || c.name == "font" => {
                copy.children.extend(clean_inline(&c.children));
            }
            Node::Element(c) => copy.children.push(Node::Element(clean_block(c))),
            Node::Text(t) => copy.children.push(Node::Text(t.clone())),
            Node::Comment(_) => {}
        }
    }
    copy
}

/// Lowercase ASCII slug for element ids.
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-').to_string();
    if slug.is_empty() {
        "feature".to_string()
    } else {
        slug
    }
}
