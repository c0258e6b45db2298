//! Copy a `scraper` parse into the owned tree.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use scraper::{ElementRef, Html};

use super::serialize::VOID_ELEMENTS;
use super::{Document, Element, Node};

/// Leading XML declaration, comments, and doctype, kept verbatim.
static PROLOGUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*(?:<\?xml[^>]*\?>\s*)?(?:<!--.*?-->\s*)*(?:<!DOCTYPE[^>]*>\s*)?")
        .expect("static regex")
});

/// Comments and CDATA (left alone) or an XML self-closing start tag.
static SELF_CLOSING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)<!--.*?-->|<!\[CDATA\[.*?\]\]>|<([A-Za-z][\w:.-]*)((?:\s+[^\s"'>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'>]+))?)*)\s*/>"#,
    )
    .expect("static regex")
});

/// Rewrite `<span .../>` as `<span ...></span>`.
///
/// EPUB content documents are XHTML, but html5ever applies HTML rules and
/// treats a self-closed non-void element as an open tag that swallows every
/// following sibling.
pub(super) fn expand_self_closing(source: &str) -> Cow<'_, str> {
    if !source.contains("/>") {
        return Cow::Borrowed(source);
    }
    SELF_CLOSING_RE.replace_all(source, |caps: &Captures<'_>| {
        let Some(name) = caps.get(1) else {
            return caps[0].to_string();
        };
        let name = name.as_str();
        if VOID_ELEMENTS.contains(&name.to_ascii_lowercase().as_str()) {
            return caps[0].to_string();
        }
        format!("<{name}{}></{name}>", &caps[2])
    })
}

pub(super) fn parse_document(source: &str) -> Document {
    let source = source.trim_start_matches('\u{feff}');
    let prologue = PROLOGUE_RE
        .find(source)
        .map(|m| m.as_str().trim_end().to_string())
        .map(|p| if p.is_empty() { p } else { p + "\n" })
        .unwrap_or_default();

    let html = Html::parse_document(&expand_self_closing(source));
    let root = convert_element(html.root_element());

    Document {
        prologue,
        nodes: vec![Node::Element(root)],
    }
}

fn convert_element(el: ElementRef<'_>) -> Element {
    let value = el.value();
    let attrs = value
        .attrs()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    let mut children = Vec::new();
    for child in el.children() {
        match child.value() {
            scraper::Node::Text(text) => children.push(Node::Text(text.text.to_string())),
            scraper::Node::Comment(comment) => {
                children.push(Node::Comment(comment.comment.to_string()));
            }
            scraper::Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    children.push(Node::Element(convert_element(child_el)));
                }
            }
            _ => {}
        }
    }

    Element {
        name: value.name().to_string(),
        attrs,
        children,
    }
}
