//! Token extraction from positioned markup.
//!
//! Only two coordinates are read from the stylesheet: `left`, and `top` or
//! `bottom`. `bottom` is negated so that both forms grow downward the page.
//! Rules that do not parse contribute nothing.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::Token;
use crate::config::DetectorConfig;
use crate::dom::{normalize_ws, Document, Element, Node};

static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("static regex"));

static RULE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^{}]+)\{([^{}]*)\}").expect("static regex"));

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(-?(?:\d+(?:\.\d*)?|\.\d+))").expect("static regex"));

static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("static regex"));

static COMPOUND_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[#.]([A-Za-z_][A-Za-z0-9_-]*)").expect("static regex"));

/// A resolved `(x, y)` pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Map selector keys (ids and class names, without prefix) to positions.
///
/// Later rules override earlier ones for the same key.
pub fn parse_positions(css: &str) -> HashMap<String, Position> {
    let css = COMMENT_RE.replace_all(css, " ");
    let mut positions = HashMap::new();

    for rule in RULE_RE.captures_iter(&css) {
        let Some(position) = rule_position(&rule[2]) else {
            continue;
        };
        for selector in rule[1].split(',') {
            if let Some(key) = selector_key(selector) {
                positions.insert(key, position);
            }
        }
    }

    positions
}

fn rule_position(body: &str) -> Option<Position> {
    let mut left = None;
    let mut top = None;
    let mut bottom = None;

    for decl in body.split(';') {
        let Some((prop, value)) = decl.split_once(':') else {
            continue;
        };
        let slot = match prop.trim().to_ascii_lowercase().as_str() {
            "left" => &mut left,
            "top" => &mut top,
            "bottom" => &mut bottom,
            _ => continue,
        };
        if let Some(n) = parse_length(value) {
            *slot = Some(n);
        }
    }

    let x = left?;
    let y = top.or(bottom.map(|b: f64| -b))?;
    Some(Position { x, y })
}

fn parse_length(value: &str) -> Option<f64> {
    NUMBER_RE
        .captures(value)
        .and_then(|c| c[1].parse::<f64>().ok())
        .filter(|n| n.is_finite())
}

/// Key a selector contributes: the first token when it is a bare `#id` or
/// `.class`, otherwise the first id/class fragment of a compound selector.
fn selector_key(selector: &str) -> Option<String> {
    let selector = selector.trim();
    let first = selector.split_whitespace().next()?;
    if let Some(rest) = first.strip_prefix('#').or_else(|| first.strip_prefix('.')) {
        if IDENT_RE.is_match(rest) {
            return Some(rest.to_string());
        }
    }
    COMPOUND_KEY_RE
        .captures(selector)
        .map(|c| c[1].to_string())
}

/// Inline `<style>` contents of a document, in order.
pub fn inline_stylesheets(doc: &Document) -> String {
    let mut css = String::new();
    collect_styles(&doc.nodes, &mut css);
    css
}

fn collect_styles(nodes: &[Node], out: &mut String) {
    for node in nodes {
        if let Node::Element(el) = node {
            if el.name == "style" {
                out.push_str(&el.raw_text());
                out.push('\n');
            } else {
                collect_styles(&el.children, out);
            }
        }
    }
}

/// `href`s of `<link rel="stylesheet">` elements.
pub fn linked_stylesheets(doc: &Document) -> Vec<String> {
    let mut hrefs = Vec::new();
    collect_links(&doc.nodes, &mut hrefs);
    hrefs
}

fn collect_links(nodes: &[Node], out: &mut Vec<String>) {
    for node in nodes {
        if let Node::Element(el) = node {
            let is_stylesheet = el.name == "link"
                && el
                    .attr("rel")
                    .is_some_and(|rel| rel.split_whitespace().any(|r| r.eq_ignore_ascii_case("stylesheet")));
            if is_stylesheet {
                if let Some(href) = el.attr("href") {
                    out.push(href.to_string());
                }
            }
            collect_links(&el.children, out);
        }
    }
}

/// Extract positioned tokens, sorted by `(y, x)` and re-indexed.
///
/// A text node is kept only when its parent element resolves to a position
/// through its id, else its first class with a position entry. Unresolved
/// text is dropped.
pub fn extract_tokens(doc: &Document, css: &str, config: &DetectorConfig) -> Vec<Token> {
    let positions = parse_positions(css);
    if positions.is_empty() {
        return Vec::new();
    }

    let root: &[Node] = match doc.body() {
        Some(body) => &body.children,
        None => &doc.nodes,
    };

    let mut raw = Vec::new();
    let mut dropped = 0usize;
    walk(root, None, &positions, config, &mut raw, &mut dropped);
    if dropped > 0 {
        debug!(dropped, "text runs without a position key");
    }

    // Stable: equal (y, x) keeps document order.
    raw.sort_by(|a: &Token, b: &Token| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));
    for (i, token) in raw.iter_mut().enumerate() {
        token.index = i;
    }
    raw
}

fn walk(
    nodes: &[Node],
    parent: Option<&Element>,
    positions: &HashMap<String, Position>,
    config: &DetectorConfig,
    out: &mut Vec<Token>,
    dropped: &mut usize,
) {
    for node in nodes {
        match node {
            Node::Element(el) if matches!(el.name.as_str(), "script" | "style" | "head") => {}
            Node::Element(el) => walk(&el.children, Some(el), positions, config, out, dropped),
            Node::Text(text) => {
                let text = normalize_ws(text);
                if text.is_empty() {
                    continue;
                }
                let Some(owner) = parent else {
                    *dropped += 1;
                    continue;
                };
                let Some(position) = resolve_position(owner, positions) else {
                    *dropped += 1;
                    continue;
                };
                let style_class = owner.classes().next().unwrap_or("").to_string();
                if !config.allowed_classes.is_empty() && !config.allowed_classes.contains(&style_class) {
                    continue;
                }
                out.push(Token {
                    text,
                    x: position.x,
                    y: position.y,
                    style_class,
                    index: 0,
                });
            }
            Node::Comment(_) => {}
        }
    }
}

fn resolve_position(el: &Element, positions: &HashMap<String, Position>) -> Option<Position> {
    el.id()
        .and_then(|id| positions.get(id))
        .or_else(|| el.classes().find_map(|c| positions.get(c)))
        .copied()
}
