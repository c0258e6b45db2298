//! List detection over marked paragraphs.
//!
//! Two scans run on every container, top-down, each to a fixed point:
//!
//! - the nested scan turns `1.` / `2)` paragraphs into an ordered list, each
//!   item optionally followed by an `a.` / `b)` sub-list;
//! - the simple scan turns homogeneous numeric, alphabetic, or bulleted runs
//!   into lists.
//!
//! Ordinals must ascend by exactly one within a run.

use std::sync::LazyLock;

use regex::Regex;

use super::{next_non_blank, strip_leading, trim_start_text};
use crate::dom::{Element, Node};

static NUMBER_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d{1,3})[.)]\s+").expect("static regex"));

static ALPHA_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([A-Za-z])[.)]\s+").expect("static regex"));

static BULLET_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[•◦▪▫‣⁃●○■□·►▸✓✔]\s*|[-*–—]\s+)").expect("static regex")
});

/// A paragraph's leading list marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Number(u32),
    Alpha { ordinal: u32, upper: bool },
    Bullet,
}

impl Marker {
    fn ordinal(self) -> Option<u32> {
        match self {
            Marker::Number(n) | Marker::Alpha { ordinal: n, .. } => Some(n),
            Marker::Bullet => None,
        }
    }

    /// Same family: numeric, uppercase alpha, lowercase alpha, or bullet.
    fn same_kind(self, other: Marker) -> bool {
        match (self, other) {
            (Marker::Number(_), Marker::Number(_)) | (Marker::Bullet, Marker::Bullet) => true,
            (Marker::Alpha { upper: a, .. }, Marker::Alpha { upper: b, .. }) => a == b,
            _ => false,
        }
    }
}

/// Parse the marker at the start of `text`, returning it with the byte
/// length of the prefix to strip. Marker-only text has no marker.
pub fn parse_marker(text: &str) -> Option<(Marker, usize)> {
    let (marker, len) = if let Some(c) = NUMBER_MARKER_RE.captures(text) {
        (Marker::Number(c[1].parse().ok()?), c[0].len())
    } else if let Some(c) = ALPHA_MARKER_RE.captures(text) {
        let ch = c[1].chars().next()?;
        let ordinal = u32::from(ch.to_ascii_lowercase()) - u32::from('a') + 1;
        (
            Marker::Alpha {
                ordinal,
                upper: ch.is_ascii_uppercase(),
            },
            c[0].len(),
        )
    } else {
        let m = BULLET_MARKER_RE.find(text)?;
        (Marker::Bullet, m.end())
    };
    if text[len..].trim().is_empty() {
        return None;
    }
    Some((marker, len))
}

/// Marker of a paragraph node, if any.
pub fn paragraph_marker(node: &Node) -> Option<Marker> {
    let el = node.as_element().filter(|el| el.name == "p")?;
    parse_marker(&el.raw_text()).map(|(m, _)| m)
}

/// Run both scans over the tree. Returns the number of lists created.
pub fn detect_lists(nodes: &mut Vec<Node>, min_items: usize) -> usize {
    let min_items = min_items.max(1);
    let mut created = 0;
    while let Some(n) = nested_numbered_pass(nodes, min_items) {
        created += n;
    }
    while let Some(n) = simple_run_pass(nodes, min_items) {
        created += n;
    }
    for node in nodes.iter_mut() {
        if let Node::Element(el) = node {
            created += detect_lists(&mut el.children, min_items);
        }
    }
    created
}

struct NumberedItem {
    index: usize,
    subs: Vec<usize>,
    sub_upper: bool,
}

/// One sweep of the nested scan; `None` when nothing changed.
fn nested_numbered_pass(nodes: &mut Vec<Node>, min_items: usize) -> Option<usize> {
    let mut created = 0;
    let mut i = 0;
    while i < nodes.len() {
        let Some(Marker::Number(first)) = paragraph_marker(&nodes[i]) else {
            i += 1;
            continue;
        };

        let mut items: Vec<NumberedItem> = Vec::new();
        let mut expected = first;
        let mut pos = Some(i);
        let mut end = i;
        while let Some(p) = pos {
            if paragraph_marker(&nodes[p]) != Some(Marker::Number(expected)) {
                break;
            }
            let mut item = NumberedItem {
                index: p,
                subs: Vec::new(),
                sub_upper: false,
            };
            end = p;
            let mut next = next_non_blank(nodes, p);
            let mut sub_expected = 1;
            while let Some(j) = next {
                match paragraph_marker(&nodes[j]) {
                    Some(Marker::Alpha { ordinal, upper })
                        if ordinal == sub_expected && (item.subs.is_empty() || upper == item.sub_upper) =>
                    {
                        item.sub_upper = upper;
                        item.subs.push(j);
                        sub_expected += 1;
                        end = j;
                        next = next_non_blank(nodes, j);
                    }
                    _ => break,
                }
            }
            items.push(item);
            expected += 1;
            pos = next;
        }

        if items.len() < min_items {
            i += 1;
            continue;
        }

        let mut ol = Element::new("ol").with_attr("start", &first.to_string());
        for item in &items {
            let mut li = list_item(&nodes[item.index]);
            if !item.subs.is_empty() {
                let kind = if item.sub_upper { "A" } else { "a" };
                let mut sub = Element::new("ol").with_attr("type", kind).with_attr("start", "1");
                for &s in &item.subs {
                    sub.children.push(Node::Element(list_item(&nodes[s])));
                }
                li.children.push(Node::Element(sub));
            }
            ol.children.push(Node::Element(li));
        }
        nodes.splice(i..=end, std::iter::once(Node::Element(ol)));
        created += 1;
        i += 1;
    }
    (created > 0).then_some(created)
}

/// One sweep of the simple scan; `None` when nothing changed.
fn simple_run_pass(nodes: &mut Vec<Node>, min_items: usize) -> Option<usize> {
    let mut created = 0;
    let mut i = 0;
    while i < nodes.len() {
        let Some(first) = paragraph_marker(&nodes[i]) else {
            i += 1;
            continue;
        };

        let mut run = vec![i];
        let mut prev = first;
        let mut next = next_non_blank(nodes, i);
        while let Some(j) = next {
            let Some(marker) = paragraph_marker(&nodes[j]) else {
                break;
            };
            let follows = match (prev.ordinal(), marker.ordinal()) {
                (Some(a), Some(b)) => b == a + 1,
                _ => true,
            };
            if !marker.same_kind(first) || !follows {
                break;
            }
            run.push(j);
            prev = marker;
            next = next_non_blank(nodes, j);
        }

        if run.len() < min_items {
            i += 1;
            continue;
        }

        let mut list = match first {
            Marker::Bullet => Element::new("ul"),
            Marker::Number(n) => Element::new("ol").with_attr("start", &n.to_string()),
            Marker::Alpha { ordinal, upper } => Element::new("ol")
                .with_attr("type", if upper { "A" } else { "a" })
                .with_attr("start", &ordinal.to_string()),
        };
        for &k in &run {
            list.children.push(Node::Element(list_item(&nodes[k])));
        }
        let end = run[run.len() - 1];
        nodes.splice(i..=end, std::iter::once(Node::Element(list)));
        created += 1;
        i += 1;
    }
    (created > 0).then_some(created)
}

/// `<li>` holding the paragraph's content minus its marker.
fn list_item(node: &Node) -> Element {
    let mut li = Element::new("li");
    let Some(p) = node.as_element() else {
        return li;
    };
    li.children = p.children.clone();
    if let Some((_, mut len)) = parse_marker(&p.raw_text()) {
        strip_leading(&mut li.children, &mut len);
    }
    trim_start_text(&mut li.children);
    li
}
