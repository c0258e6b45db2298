//! Conversion of literal `<table>` markup.
//!
//! Files that already carry table markup skip geometric detection. Each
//! table either collapses into an ordered list (header-free rows whose first
//! cells count `1, 2, 3…`) or is kept with its presentation stripped.

use tracing::debug;

use super::extract::clean_inline;
use crate::dom::{normalize_ws, Element, Node, HIDDEN_CLASS};
use crate::layout::table::numbered_sequence_start;

/// Attributes that only mattered to the visual layout.
const PRESENTATION_ATTRS: &[&str] = &[
    "style", "class", "width", "height", "border", "cellpadding", "cellspacing", "bgcolor",
    "align", "valign", "background", "frame", "rules",
];

/// `true` when the node list contains table markup.
pub fn has_tables(nodes: &[Node]) -> bool {
    crate::dom::find_in(nodes, &|el| el.name == "table").is_some()
}

/// Convert every outermost table, in document order.
pub fn convert_tables(nodes: &[Node]) -> Vec<Node> {
    let mut out = Vec::new();
    collect(nodes, &mut out);
    out
}

fn collect(nodes: &[Node], out: &mut Vec<Node>) {
    for node in nodes {
        if let Node::Element(el) = node {
            if el.name == "table" {
                out.push(Node::Element(convert_table(el)));
            } else {
                collect(&el.children, out);
            }
        }
    }
}

/// Convert one table.
pub fn convert_table(table: &Element) -> Element {
    if let Some(list) = numbered_list(table) {
        debug!("numbered table collapsed to ordered list");
        return list;
    }
    let mut clean = sanitize(table);
    clean.add_class(HIDDEN_CLASS);
    clean
}

fn numbered_list(table: &Element) -> Option<Element> {
    if table.find(&|el| el.name == "th" || el.name == "thead").is_some() {
        return None;
    }
    let mut rows = Vec::new();
    collect_rows(&table.children, &mut rows);
    if rows.is_empty() {
        return None;
    }

    let mut cells_per_row = Vec::with_capacity(rows.len());
    for row in &rows {
        let cells: Vec<&Element> = row.child_elements().filter(|c| c.name == "td").collect();
        if cells.len() < 2 {
            return None;
        }
        cells_per_row.push(cells);
    }

    let labels: Vec<String> = cells_per_row.iter().map(|cells| cells[0].text()).collect();
    let label_refs: Vec<&str> = labels.iter().map(String::as_str).collect();
    let start = numbered_sequence_start(&label_refs)?;

    let mut ol = Element::new("ol").with_attr("start", &start.to_string());
    for cells in cells_per_row {
        let text = normalize_ws(
            &cells[1..]
                .iter()
                .map(|c| c.text())
                .collect::<Vec<_>>()
                .join(" "),
        );
        ol.children.push(Node::Element(Element::new("li").with_text(&text)));
    }
    Some(ol)
}

/// Rows of this table, not of nested tables.
fn collect_rows<'a>(nodes: &'a [Node], out: &mut Vec<&'a Element>) {
    for node in nodes {
        if let Node::Element(el) = node {
            match el.name.as_str() {
                "tr" => out.push(el),
                "table" => {}
                _ => collect_rows(&el.children, out),
            }
        }
    }
}

fn sanitize(el: &Element) -> Element {
    let mut copy = Element::new(&el.name);
    for (k, v) in &el.attrs {
        if !PRESENTATION_ATTRS.contains(&k.to_ascii_lowercase().as_str()) {
            copy.attrs.push((k.clone(), v.clone()));
        }
    }
    for child in &el.children {
        match child {
            Node::Element(c) if matches!(c.name.as_str(), "span" | "font" | "p") && in_cell(&el.name) => {
                copy.children.extend(clean_inline(&c.children));
            }
            Node::Element(c) => copy.children.push(Node::Element(sanitize(c))),
            Node::Text(t) => copy.children.push(Node::Text(t.clone())),
            Node::Comment(_) => {}
        }
    }
    copy
}

fn in_cell(name: &str) -> bool {
    name == "td" || name == "th"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{serialize_nodes, Document};

    fn tables(html: &str) -> Vec<Node> {
        let doc = Document::parse(html);
        convert_tables(&doc.nodes)
    }

    #[test]
    fn numbered_table_becomes_list() {
        let out = tables(
            "<table><tr><td>1.</td><td>Red</td></tr><tr><td>2.</td><td>Green</td><td>dark</td></tr></table>",
        );
        assert_eq!(
            serialize_nodes(&out),
            r#"<ol start="1"><li>Red</li><li>Green dark</li></ol>"#
        );
    }

    #[test]
    fn header_row_blocks_collapse() {
        let out = tables(
            "<table><tr><th>#</th><th>Item</th></tr><tr><td>1</td><td>Red</td></tr></table>",
        );
        assert!(out[0].is("table"));
    }

    #[test]
    fn single_cell_rows_block_collapse() {
        let out = tables("<table><tr><td>1</td></tr><tr><td>2</td></tr></table>");
        assert!(out[0].is("table"));
    }

    #[test]
    fn kept_table_is_sanitized() {
        let out = tables(
            r#"<table style="width:100%" border="1" summary="s"><tr><td class="c" width="20"><span>A</span></td><td>B</td></tr></table>"#,
        );
        let table = out[0].as_element().unwrap();
        assert_eq!(table.attr("border"), None);
        assert_eq!(table.attr("style"), None);
        assert_eq!(table.attr("summary"), Some("s"));
        assert!(table.has_class(HIDDEN_CLASS));
        let td = table.find(&|el| el.name == "td").unwrap();
        assert!(td.attrs.is_empty());
        assert_eq!(serialize_nodes(&td.children), "A");
    }

    #[test]
    fn tables_in_document_order() {
        let out = tables(
            "<div><table><tr><td>x</td><td>y</td></tr></table></div>\
             <table><tr><td>3</td><td>c</td></tr><tr><td>4</td><td>d</td></tr></table>",
        );
        assert_eq!(out.len(), 2);
        assert!(out[0].is("table"));
        assert!(out[1].is("ol"));
        assert_eq!(out[1].as_element().unwrap().attr("start"), Some("3"));
    }

    #[test]
    fn detects_table_presence() {
        let doc = Document::parse("<p>no tables</p>");
        assert!(!has_tables(&doc.nodes));
    }
}
