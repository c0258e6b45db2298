//! Geometric reconstruction for absolutely positioned pages.
//!
//! Authoring tools that export fixed-layout EPUB place every text run with
//! `left`/`top` declarations, so a "table" is only a grid of coordinates. The
//! pipeline here is:
//!
//! 1. [`tokens::extract_tokens`] resolves each text run to an `(x, y)` pair
//! 2. [`table::detect_fact`] and [`table::detect_comparison`] cluster tokens
//!    into candidate blocks
//! 3. [`resolve::resolve_overlaps`] keeps the best non-conflicting set
//! 4. [`resolve::interleave`] emits blocks and left-over lines in y order

pub mod resolve;
pub mod table;
pub mod tokens;

use std::cmp::Ordering;
use std::collections::BTreeSet;

use tracing::debug;

use crate::config::DetectorConfig;
use crate::dom::{Element, Node};

pub use tokens::{extract_tokens, parse_positions, Position};

/// A positioned text run.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text: String,
    pub x: f64,
    pub y: f64,
    /// First class of the owning element, or empty.
    pub style_class: String,
    /// Position in the global `(y, x)` order.
    pub index: usize,
}

impl Token {
    /// Total order: y, then x, then index.
    pub fn reading_cmp(&self, other: &Self) -> Ordering {
        self.y
            .total_cmp(&other.y)
            .then(self.x.total_cmp(&other.x))
            .then(self.index.cmp(&other.index))
    }
}

/// Tokens whose y falls within the tolerance band of the line's first token.
#[derive(Debug, Clone)]
pub struct Line<'a> {
    pub y: f64,
    /// x-ordered.
    pub tokens: Vec<&'a Token>,
}

impl Line<'_> {
    pub fn text(&self) -> String {
        join_texts(self.tokens.iter().map(|t| t.text.as_str()))
    }

    pub fn min_x(&self) -> f64 {
        self.tokens.first().map_or(0.0, |t| t.x)
    }
}

/// Group tokens into lines.
///
/// A token opens a new line when it sits more than `tolerance` below the
/// current line's first token. Output is deterministic for any input order.
pub fn group_lines<'a>(tokens: impl IntoIterator<Item = &'a Token>, tolerance: f64) -> Vec<Line<'a>> {
    let mut sorted: Vec<&Token> = tokens.into_iter().collect();
    sorted.sort_by(|a, b| a.reading_cmp(b));

    let mut lines: Vec<Line<'a>> = Vec::new();
    for token in sorted {
        match lines.last_mut() {
            Some(line) if token.y - line.y <= tolerance => line.tokens.push(token),
            _ => lines.push(Line {
                y: token.y,
                tokens: vec![token],
            }),
        }
    }

    for line in &mut lines {
        line.tokens
            .sort_by(|a, b| a.x.total_cmp(&b.x).then(a.index.cmp(&b.index)));
    }
    lines
}

/// Horizontal extent of a token set.
pub fn horizontal_span(tokens: &[Token]) -> f64 {
    let (min, max) = tokens.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| {
        (lo.min(t.x), hi.max(t.x))
    });
    if min.is_finite() {
        max - min
    } else {
        0.0
    }
}

pub(crate) fn join_texts<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .filter(|s| !s.trim().is_empty())
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Which detector produced a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// Two-column label/value table.
    FactTable,
    /// Three-column table under a header line.
    ComparisonTable,
    /// Fact table whose labels were a contiguous integer run.
    OrderedList,
}

/// A block claimed by one of the detectors.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedBlock {
    pub kind: BlockKind,
    pub header: Option<Vec<String>>,
    pub rows: Vec<Vec<String>>,
    /// First ordinal for [`BlockKind::OrderedList`].
    pub start: Option<u32>,
    /// Provenance for overlap arbitration.
    pub used: BTreeSet<usize>,
    pub y_min: f64,
    pub y_max: f64,
}

impl DetectedBlock {
    pub fn mid_y(&self) -> f64 {
        (self.y_min + self.y_max) / 2.0
    }

    /// Render as accessible markup.
    pub fn render(&self) -> Element {
        match self.kind {
            BlockKind::OrderedList => {
                let mut ol = Element::new("ol").with_attr("start", &self.start.unwrap_or(1).to_string());
                for row in &self.rows {
                    let value = row.get(1).map_or("", String::as_str);
                    ol.children.push(Node::Element(Element::new("li").with_text(value)));
                }
                ol
            }
            BlockKind::FactTable => {
                let mut tbody = Element::new("tbody");
                for row in &self.rows {
                    let mut tr = Element::new("tr");
                    let label = row.first().map_or("", String::as_str);
                    let value = row.get(1).map_or("", String::as_str);
                    tr.children.push(Node::Element(
                        Element::new("th").with_attr("scope", "row").with_text(label),
                    ));
                    tr.children.push(Node::Element(Element::new("td").with_text(value)));
                    tbody.children.push(Node::Element(tr));
                }
                Element::new("table")
                    .with_attr("class", "fact-table")
                    .with_child(Node::Element(tbody))
            }
            BlockKind::ComparisonTable => {
                let mut table = Element::new("table").with_attr("class", "comparison-table");
                if let Some(header) = &self.header {
                    let mut tr = Element::new("tr");
                    for cell in header {
                        tr.children.push(Node::Element(
                            Element::new("th").with_attr("scope", "col").with_text(cell),
                        ));
                    }
                    table
                        .children
                        .push(Node::Element(Element::new("thead").with_child(Node::Element(tr))));
                }
                let mut tbody = Element::new("tbody");
                for row in &self.rows {
                    let mut tr = Element::new("tr");
                    for (col, cell) in row.iter().enumerate() {
                        let td = if col == 0 {
                            Element::new("th").with_attr("scope", "row")
                        } else {
                            Element::new("td")
                        };
                        tr.children.push(Node::Element(td.with_text(cell)));
                    }
                    tbody.children.push(Node::Element(tr));
                }
                table.children.push(Node::Element(tbody));
                table
            }
        }
    }

    /// Rendered markup string.
    pub fn markup(&self) -> String {
        crate::dom::to_markup(&self.render())
    }
}

/// Result of the geometric pass over one file.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    /// Accepted blocks, largest first.
    pub blocks: Vec<DetectedBlock>,
    /// Blocks and left-over lines interleaved by y. Empty when no block was
    /// accepted.
    pub nodes: Vec<Node>,
}

impl Detection {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Run both detectors, arbitrate overlaps, and build the table/list stream.
pub fn detect(tokens: &[Token], config: &DetectorConfig) -> Detection {
    if tokens.is_empty() {
        debug!("no geometric content");
        return Detection::default();
    }

    let candidates: Vec<DetectedBlock> = [
        table::detect_comparison(tokens, config),
        table::detect_fact(tokens, config).map(table::collapse_numbered),
    ]
    .into_iter()
    .flatten()
    .collect();

    let blocks = resolve::resolve_overlaps(candidates);
    if blocks.is_empty() {
        debug!(tokens = tokens.len(), "no geometric block accepted");
        return Detection::default();
    }

    let nodes = resolve::interleave(&blocks, tokens, config.line_tolerance);
    Detection { blocks, nodes }
}


#[cfg(test)]
mod tests {
    use super::test_support::tokens;
    use super::*;

    #[test]
    fn group_lines_is_x_ordered_and_deterministic() {
        let toks = tokens(&[
            ("b", 50.0, 100.0, ""),
            ("a", 10.0, 103.0, ""),
            ("c", 10.0, 130.0, ""),
        ]);
        let lines = group_lines(&toks, 8.0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "a b");
        assert_eq!(lines[1].text(), "c");

        let reversed: Vec<&Token> = toks.iter().rev().collect();
        let again = group_lines(reversed, 8.0);
        let texts: Vec<String> = again.iter().map(Line::text).collect();
        assert_eq!(texts, vec!["a b".to_string(), "c".to_string()]);
    }

    #[test]
    fn span_of_empty_is_zero() {
        assert!(horizontal_span(&[]).abs() < f64::EPSILON);
    }

    #[test]
    fn detect_without_tokens_is_empty() {
        let detection = detect(&[], &DetectorConfig::default());
        assert!(detection.is_empty());
        assert!(detection.blocks.is_empty());
    }

    #[test]
    fn ordered_list_renders_start() {
        let block = DetectedBlock {
            kind: BlockKind::OrderedList,
            header: None,
            rows: vec![
                vec!["4".into(), "Four".into()],
                vec!["5".into(), "Five".into()],
            ],
            start: Some(4),
            used: BTreeSet::new(),
            y_min: 0.0,
            y_max: 10.0,
        };
        assert_eq!(block.markup(), r#"<ol start="4"><li>Four</li><li>Five</li></ol>"#);
    }
}
