//! Table detection from positioned tokens.
//!
//! Two detectors compete for the same tokens:
//!
//! - **Comparison table**: a header line of 3+ header-styled tokens sets three
//!   column anchors. Row-label lines below it cut the page into bands at the
//!   midpoints between labels; each token in a band goes to the nearest
//!   anchor.
//! - **Fact table**: label-styled lines form a left column. Each label owns a
//!   band that reaches `fudge` of the way toward the next label, so wrapped
//!   value text stays with its label.
//!
//! Both reject candidates that look like two independent text columns. A fact
//! table whose labels are `1, 2, 3…` collapses into an ordered list.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::{group_lines, horizontal_span, BlockKind, DetectedBlock, Token};
use crate::config::DetectorConfig;

/// Minimum gap between adjacent header anchors, as a fraction of the span.
const MIN_ANCHOR_GAP: f64 = 0.10;

/// Maximum horizontal spread of fact labels, as a fraction of the span.
const MAX_LABEL_SPREAD: f64 = 0.07;

/// Minimum offset of the value column from the label column.
const MIN_VALUE_OFFSET: f64 = 0.15;

/// Fraction of rows that must have their value cells filled.
const MIN_FILLED_RATIO: f64 = 0.60;

static NUMBER_LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)[.)]?$").expect("static regex"));

/// Detect a three-column comparison table.
pub fn detect_comparison(tokens: &[Token], config: &DetectorConfig) -> Option<DetectedBlock> {
    let span = horizontal_span(tokens);
    if span <= 0.0 {
        return None;
    }

    let headers = tokens.iter().filter(|t| t.style_class == config.header_class);
    let header_line = group_lines(headers, config.line_tolerance)
        .into_iter()
        .find(|line| line.tokens.len() >= 3)?;

    let anchors = [
        header_line.tokens[0].x,
        header_line.tokens[1].x,
        header_line.tokens[2].x,
    ];
    let min_gap = anchors
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold(f64::INFINITY, f64::min);
    if min_gap < MIN_ANCHOR_GAP * span {
        debug!(min_gap, span, "comparison header rejected: anchors too close");
        return None;
    }

    let mut used = BTreeSet::new();
    let mut header = vec![String::new(), String::new(), String::new()];
    for token in &header_line.tokens {
        push_text(&mut header[nearest_anchor(&anchors, token.x)], &token.text);
        used.insert(token.index);
    }
    let header_bottom = header_line
        .tokens
        .iter()
        .map(|t| t.y)
        .fold(f64::NEG_INFINITY, f64::max);

    let label_ys: Vec<f64> = group_lines(
        tokens
            .iter()
            .filter(|t| t.style_class == config.label_class && t.y > header_bottom),
        config.line_tolerance,
    )
    .iter()
    .map(|line| line.y)
    .collect();
    if label_ys.len() < config.min_rows {
        return None;
    }

    let mut rows = Vec::with_capacity(label_ys.len());
    let mut y_max = header_bottom;
    for (i, &y) in label_ys.iter().enumerate() {
        let lower = if i == 0 {
            (header_bottom + y) / 2.0
        } else {
            (label_ys[i - 1] + y) / 2.0
        };
        let upper = match label_ys.get(i + 1) {
            Some(&next) => (y + next) / 2.0,
            None => y + (y - lower).max(config.line_tolerance),
        };

        let mut cells = vec![String::new(), String::new(), String::new()];
        // Tokens arrive in (y, x) order, so each column is already merged
        // in reading order.
        for token in tokens {
            if token.y < lower || token.y >= upper || token.y <= header_bottom || used.contains(&token.index) {
                continue;
            }
            push_text(&mut cells[nearest_anchor(&anchors, token.x)], &token.text);
            used.insert(token.index);
            y_max = y_max.max(token.y);
        }
        rows.push(cells);
    }

    let filled = rows
        .iter()
        .filter(|r| !r[1].is_empty() && !r[2].is_empty())
        .count();
    if !accepts(rows.len(), filled, config.min_rows) {
        debug!(rows = rows.len(), filled, "comparison candidate rejected");
        return None;
    }

    Some(DetectedBlock {
        kind: BlockKind::ComparisonTable,
        header: Some(header),
        rows,
        start: None,
        used,
        y_min: header_line.y,
        y_max,
    })
}

/// Detect a two-column label/value table.
pub fn detect_fact(tokens: &[Token], config: &DetectorConfig) -> Option<DetectedBlock> {
    let span = horizontal_span(tokens);
    if span <= 0.0 {
        return None;
    }

    let label_lines = group_lines(
        tokens.iter().filter(|t| t.style_class == config.label_class),
        config.line_tolerance,
    );
    if label_lines.len() < config.min_rows {
        return None;
    }

    let label_xs: Vec<f64> = label_lines.iter().map(super::Line::min_x).collect();
    let spread = label_xs.iter().copied().fold(f64::NEG_INFINITY, f64::max)
        - label_xs.iter().copied().fold(f64::INFINITY, f64::min);
    if spread > MAX_LABEL_SPREAD * span {
        debug!(spread, span, "fact candidate rejected: labels not aligned");
        return None;
    }

    let mut used: BTreeSet<usize> = label_lines
        .iter()
        .flat_map(|line| line.tokens.iter().map(|t| t.index))
        .collect();
    let first_y = label_lines[0].y;
    let last_y = label_lines[label_lines.len() - 1].y;
    let mean_gap = (last_y - first_y) / (label_lines.len() - 1).max(1) as f64;

    let mut rows = Vec::with_capacity(label_lines.len());
    let mut value_xs = Vec::new();
    let mut y_max = last_y;
    for (i, line) in label_lines.iter().enumerate() {
        let next_y = label_lines.get(i + 1).map_or(line.y + mean_gap, |l| l.y);
        let lower = line.y - config.line_tolerance;
        let upper = (line.y + (next_y - line.y) * config.fudge).max(line.y + config.line_tolerance);
        let label_x = label_xs[i];

        let mut value = String::new();
        for token in tokens {
            if token.y < lower || token.y >= upper || token.x <= label_x || used.contains(&token.index) {
                continue;
            }
            push_text(&mut value, &token.text);
            used.insert(token.index);
            value_xs.push(token.x);
            y_max = y_max.max(token.y);
        }
        for token in &line.tokens {
            y_max = y_max.max(token.y);
        }
        rows.push(vec![line.text(), value]);
    }

    let filled = rows.iter().filter(|r| !r[1].is_empty()).count();
    if !accepts(rows.len(), filled, config.min_rows) {
        debug!(rows = rows.len(), filled, "fact candidate rejected");
        return None;
    }

    let offset = median(&mut value_xs)? - median(&mut label_xs.clone())?;
    if offset < MIN_VALUE_OFFSET * span {
        debug!(offset, span, "fact candidate rejected: values overlap labels");
        return None;
    }

    Some(DetectedBlock {
        kind: BlockKind::FactTable,
        header: None,
        rows,
        start: None,
        used,
        y_min: first_y,
        y_max,
    })
}

/// Replace a fact table with an ordered list when every label is the next
/// integer of a contiguous run and every value is filled.
///
/// All-or-nothing: one non-numeric label, gap, or empty value keeps the
/// table.
pub fn collapse_numbered(block: DetectedBlock) -> DetectedBlock {
    if block.kind != BlockKind::FactTable {
        return block;
    }
    if block.rows.iter().any(|r| r.get(1).is_none_or(String::is_empty)) {
        return block;
    }
    let labels: Vec<&str> = block.rows.iter().map(|r| r[0].as_str()).collect();
    match numbered_sequence_start(&labels) {
        Some(start) => DetectedBlock {
            kind: BlockKind::OrderedList,
            start: Some(start),
            ..block
        },
        None => block,
    }
}

/// First value of a contiguous ascending run of bare integers (`3`, `4.`,
/// `5)`), or `None` if any label breaks the pattern.
pub fn numbered_sequence_start(labels: &[&str]) -> Option<u32> {
    let mut numbers = Vec::with_capacity(labels.len());
    for label in labels {
        let caps = NUMBER_LABEL_RE.captures(label.trim())?;
        numbers.push(caps[1].parse::<u32>().ok()?);
    }
    let first = *numbers.first()?;
    let contiguous = numbers
        .windows(2)
        .all(|w| w[0].checked_add(1) == Some(w[1]));
    contiguous.then_some(first)
}

fn accepts(rows: usize, filled: usize, min_rows: usize) -> bool {
    rows >= min_rows && rows > 0 && (filled as f64) / (rows as f64) >= MIN_FILLED_RATIO
}

fn nearest_anchor(anchors: &[f64; 3], x: f64) -> usize {
    let mut best = 0;
    for (i, anchor) in anchors.iter().enumerate() {
        if (x - anchor).abs() < (x - anchors[best]).abs() {
            best = i;
        }
    }
    best
}

fn push_text(cell: &mut String, text: &str) {
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    if !cell.is_empty() {
        cell.push(' ');
    }
    cell.push_str(text);
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}
