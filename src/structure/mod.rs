//! Semantic reconstruction over the owned tree.
//!
//! The structural walk produces one candidate stream, the table converters
//! another; [`repair::merge_streams`] combines them and the repair passes
//! fix fragmentation left by the authoring tool. The footer and heading
//! passes then finish the fragment.

pub mod dom_table;
pub mod extract;
pub mod footer;
pub mod heading;
pub mod lists;
pub mod repair;

use crate::dom::{Element, Node};

/// `true` when the text ends in `.`, `!` or `?`.
pub fn ends_sentence(text: &str) -> bool {
    text.trim_end().ends_with(['.', '!', '?'])
}

/// Index of the next sibling after `i` that is not whitespace, a comment,
/// or a media-only container.
pub(crate) fn next_significant(nodes: &[Node], i: usize) -> Option<usize> {
    (i + 1..nodes.len()).find(|&k| !nodes[k].is_ignorable())
}

/// Index of the next sibling after `i` that is not whitespace or a comment.
pub(crate) fn next_non_blank(nodes: &[Node], i: usize) -> Option<usize> {
    (i + 1..nodes.len()).find(|&k| !nodes[k].is_blank())
}

/// Append `other`'s content to `target` with exactly one space between.
pub(crate) fn splice_paragraph(target: &mut Element, other: Element) {
    trim_end_text(&mut target.children);
    let mut incoming = other.children;
    trim_start_text(&mut incoming);
    if incoming.is_empty() {
        return;
    }
    target.children.push(Node::text(" "));
    target.children.extend(incoming);
}

/// Drop `n` bytes of text from the front of a node list.
pub(crate) fn strip_leading(nodes: &mut Vec<Node>, n: &mut usize) {
    for node in nodes.iter_mut() {
        if *n == 0 {
            break;
        }
        match node {
            Node::Text(t) if *n >= t.len() => {
                *n -= t.len();
                t.clear();
            }
            Node::Text(t) => {
                t.replace_range(..*n, "");
                *n = 0;
            }
            Node::Element(el) if is_raw_text(el) => {}
            Node::Element(el) => strip_leading(&mut el.children, n),
            Node::Comment(_) => {}
        }
    }
    prune_empty_text(nodes);
}

/// Drop `n` bytes of text from the back of a node list.
pub(crate) fn strip_trailing(nodes: &mut Vec<Node>, n: &mut usize) {
    for node in nodes.iter_mut().rev() {
        if *n == 0 {
            break;
        }
        match node {
            Node::Text(t) if *n >= t.len() => {
                *n -= t.len();
                t.clear();
            }
            Node::Text(t) => {
                t.truncate(t.len() - *n);
                *n = 0;
            }
            Node::Element(el) if is_raw_text(el) => {}
            Node::Element(el) => strip_trailing(&mut el.children, n),
            Node::Comment(_) => {}
        }
    }
    prune_empty_text(nodes);
}

pub(crate) fn trim_start_text(nodes: &mut Vec<Node>) {
    prune_empty_text(nodes);
    match nodes.first_mut() {
        Some(Node::Text(t)) => {
            let trimmed = t.trim_start().to_string();
            *t = trimmed;
        }
        Some(Node::Element(el)) if !is_raw_text(el) => trim_start_text(&mut el.children),
        _ => {}
    }
    prune_empty_text(nodes);
}

pub(crate) fn trim_end_text(nodes: &mut Vec<Node>) {
    prune_empty_text(nodes);
    match nodes.last_mut() {
        Some(Node::Text(t)) => {
            let trimmed = t.trim_end().to_string();
            *t = trimmed;
        }
        Some(Node::Element(el)) if !is_raw_text(el) => trim_end_text(&mut el.children),
        _ => {}
    }
    prune_empty_text(nodes);
}

fn prune_empty_text(nodes: &mut Vec<Node>) {
    nodes.retain(|n| !matches!(n, Node::Text(t) if t.is_empty()));
}

fn is_raw_text(el: &Element) -> bool {
    el.name == "script" || el.name == "style"
}
