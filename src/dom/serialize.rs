//! XHTML-friendly serializer for the owned tree.
//!
//! Void elements are self-closed (`<img ... />`) so the output stays
//! well-formed when written back into `.xhtml` content documents.

use super::{Element, Node};

pub(super) const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Serialize a node list.
pub fn serialize_nodes(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(node, false, &mut out);
    }
    out
}

/// Serialize a single element.
pub fn to_markup(el: &Element) -> String {
    let mut out = String::new();
    write_element(el, &mut out);
    out
}

fn write_node(node: &Node, raw: bool, out: &mut String) {
    match node {
        Node::Text(t) if raw => out.push_str(t),
        Node::Text(t) => escape_text(t, out),
        Node::Comment(c) => {
            out.push_str("<!--");
            out.push_str(c);
            out.push_str("-->");
        }
        Node::Element(el) => write_element(el, out),
    }
}

fn write_element(el: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&el.name);
    for (name, value) in &el.attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_attr(value, out);
        out.push('"');
    }

    if VOID_ELEMENTS.contains(&el.name.as_str()) {
        out.push_str(" />");
        return;
    }
    out.push('>');

    let raw = matches!(el.name.as_str(), "script" | "style");
    for child in &el.children {
        write_node(child, raw, out);
    }

    out.push_str("</");
    out.push_str(&el.name);
    out.push('>');
}

fn escape_text(s: &str, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&#160;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr(s: &str, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            _ => out.push(ch),
        }
    }
}
