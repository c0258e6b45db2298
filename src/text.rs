//! Plain-text rendition of a reconstructed fragment.
//!
//! Every readable leaf (paragraph, heading, list item, table row, callout,
//! figure caption, footer line) becomes exactly one non-empty line, and
//! blocks are separated by a blank line. [`leaf_count`] counts the same
//! leaves from the tree side.
//!
//! ```rust
//! use readorder::dom::Document;
//! use readorder::text::linearize;
//!
//! let doc = Document::parse("<ol start=\"3\"><li>Red</li><li>Green</li></ol><p>Done.</p>");
//! let body = doc.body().unwrap();
//! assert_eq!(linearize(&body.children), "3. Red\n4. Green\n\nDone.");
//! ```

use crate::dom::{is_inline_tag, Element, Node};

const BULLET: &str = "•";
const INDENT: usize = 2;

/// Linearize a fragment's top-level nodes.
pub fn linearize(nodes: &[Node]) -> String {
    let mut blocks = Vec::new();
    collect_blocks(nodes, &mut blocks);
    blocks.join("\n\n")
}

/// Number of readable leaves in the fragment; equals the number of
/// non-empty lines [`linearize`] produces.
pub fn leaf_count(nodes: &[Node]) -> usize {
    nodes.iter().map(count_node).sum()
}

fn collect_blocks(nodes: &[Node], blocks: &mut Vec<String>) {
    for node in nodes {
        match node {
            Node::Text(t) => push_nonempty(blocks, node_text(t)),
            Node::Element(el) => element_block(el, blocks),
            Node::Comment(_) => {}
        }
    }
}

fn element_block(el: &Element, blocks: &mut Vec<String>) {
    match el.name.as_str() {
        "script" | "style" | "head" | "template" => {}
        "p" => push_nonempty(blocks, el.text()),
        _ if el.is_heading() => push_nonempty(blocks, el.text()),
        "ul" | "ol" => {
            let mut lines = Vec::new();
            list_lines(el, 0, &mut lines);
            push_nonempty(blocks, lines.join("\n"));
        }
        "table" => push_nonempty(blocks, table_rows(el).join("\n")),
        "aside" => push_nonempty(blocks, aside_text(el)),
        "figure" => push_nonempty(blocks, caption_text(el)),
        "footer" => {
            let lines: Vec<String> = el
                .child_elements()
                .filter(|c| c.name == "p")
                .map(Element::text)
                .filter(|t| !t.is_empty())
                .collect();
            push_nonempty(blocks, lines.join("\n"));
        }
        _ if has_block_child(el) => collect_blocks(&el.children, blocks),
        _ => push_nonempty(blocks, el.text()),
    }
}

fn count_node(node: &Node) -> usize {
    let el = match node {
        Node::Text(t) => return usize::from(!node_text(t).is_empty()),
        Node::Comment(_) => return 0,
        Node::Element(el) => el,
    };
    match el.name.as_str() {
        "script" | "style" | "head" | "template" => 0,
        "ul" | "ol" => list_leaves(el),
        "table" => rows_of(el)
            .iter()
            .filter(|row| row_cells(row).iter().any(|c| !c.is_empty()))
            .count(),
        "aside" => usize::from(!aside_text(el).is_empty()),
        "figure" => usize::from(!caption_text(el).is_empty()),
        "footer" => el
            .child_elements()
            .filter(|c| c.name == "p" && !c.text().is_empty())
            .count(),
        "p" => usize::from(!el.text().is_empty()),
        _ if el.is_heading() => usize::from(!el.text().is_empty()),
        _ if has_block_child(el) => leaf_count(&el.children),
        _ => usize::from(!el.text().is_empty()),
    }
}

fn push_nonempty(blocks: &mut Vec<String>, text: String) {
    if !text.trim().is_empty() {
        blocks.push(text);
    }
}

fn node_text(t: &str) -> String {
    crate::dom::normalize_ws(t)
}

fn has_block_child(el: &Element) -> bool {
    el.child_elements().any(|c| !is_inline_tag(&c.name))
}

// Lists

fn list_lines(list: &Element, depth: usize, lines: &mut Vec<String>) {
    let ordered = list.name == "ol";
    let style = list.attr("type").unwrap_or("1");
    let start = list
        .attr("start")
        .and_then(|s| s.trim().parse::<i64>().ok())
        .unwrap_or(1);

    for (k, li) in list.child_elements().filter(|c| c.name == "li").enumerate() {
        let own = item_text(li);
        if !own.is_empty() {
            let marker = if ordered {
                ordinal_marker(start + k as i64, style)
            } else {
                BULLET.to_string()
            };
            lines.push(format!("{}{marker} {own}", " ".repeat(depth * INDENT)));
        }
        for nested in nested_lists(li) {
            list_lines(nested, depth + 1, lines);
        }
    }
}

fn list_leaves(list: &Element) -> usize {
    list.child_elements()
        .filter(|c| c.name == "li")
        .map(|li| {
            usize::from(!item_text(li).is_empty())
                + nested_lists(li).into_iter().map(list_leaves).sum::<usize>()
        })
        .sum()
}

/// Item text without nested lists.
fn item_text(li: &Element) -> String {
    let mut out = String::new();
    own_text(&li.children, &mut out);
    crate::dom::normalize_ws(&out)
}

fn own_text(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Element(el) if matches!(el.name.as_str(), "ul" | "ol" | "script" | "style") => {
                out.push(' ');
            }
            Node::Element(el) => own_text(&el.children, out),
            Node::Comment(_) => {}
        }
    }
}

fn nested_lists(li: &Element) -> Vec<&Element> {
    fn walk<'a>(nodes: &'a [Node], out: &mut Vec<&'a Element>) {
        for el in nodes.iter().filter_map(Node::as_element) {
            if el.name == "ul" || el.name == "ol" {
                out.push(el);
            } else {
                walk(&el.children, out);
            }
        }
    }
    let mut out = Vec::new();
    walk(&li.children, &mut out);
    out
}

/// `3.`, `c.`, `C.`; alphabetic ordinals past 26 continue `aa`, `ab`, …
pub fn ordinal_marker(n: i64, style: &str) -> String {
    let upper = match style {
        "a" => false,
        "A" => true,
        _ => return format!("{n}."),
    };
    if n < 1 {
        return format!("{n}.");
    }
    let mut n = n;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        let base = if upper { b'A' } else { b'a' };
        letters.push(char::from(base + (n % 26) as u8));
        n /= 26;
    }
    letters.iter().rev().collect::<String>() + "."
}

// Tables, callouts, figures

fn table_rows(table: &Element) -> Vec<String> {
    rows_of(table)
        .iter()
        .map(|row| row_cells(row))
        .filter(|cells| cells.iter().any(|c| !c.is_empty()))
        .map(|cells| cells.join(" | "))
        .collect()
}

fn rows_of(table: &Element) -> Vec<&Element> {
    fn walk<'a>(nodes: &'a [Node], out: &mut Vec<&'a Element>) {
        for el in nodes.iter().filter_map(Node::as_element) {
            match el.name.as_str() {
                "tr" => out.push(el),
                "table" => {}
                _ => walk(&el.children, out),
            }
        }
    }
    let mut out = Vec::new();
    walk(&table.children, &mut out);
    out
}

fn row_cells(row: &Element) -> Vec<String> {
    row.child_elements()
        .filter(|c| c.name == "td" || c.name == "th")
        .map(Element::text)
        .collect()
}

fn aside_text(aside: &Element) -> String {
    aside
        .child_elements()
        .find(|c| c.name == "p")
        .map_or_else(|| aside.text(), Element::text)
}

fn caption_text(figure: &Element) -> String {
    figure
        .find(&|el| el.name == "figcaption")
        .map(Element::text)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    fn body_nodes(html: &str) -> Vec<Node> {
        let doc = Document::parse(&format!("<html><body>{html}</body></html>"));
        doc.body().unwrap().children.clone()
    }

    fn nonempty_lines(text: &str) -> usize {
        text.lines().filter(|l| !l.trim().is_empty()).count()
    }

    #[test]
    fn paragraphs_collapse_whitespace() {
        let nodes = body_nodes("<h1>Title</h1><p>  Hello\n   <em>world</em> </p><p> </p>");
        assert_eq!(linearize(&nodes), "Title\n\nHello world");
    }

    #[test]
    fn nested_lists_are_indented() {
        let nodes = body_nodes(
            r#"<ol start="1"><li>Fruit<ol type="a" start="1"><li>Apple</li><li>Pear</li></ol></li><li>Veg</li></ol><ul><li>loose</li></ul>"#,
        );
        assert_eq!(
            linearize(&nodes),
            "1. Fruit\n  a. Apple\n  b. Pear\n2. Veg\n\n• loose"
        );
    }

    #[test]
    fn list_start_offsets_markers() {
        let nodes = body_nodes(r#"<ol type="A" start="3"><li>x</li><li>y</li></ol>"#);
        assert_eq!(linearize(&nodes), "C. x\nD. y");
    }

    #[test]
    fn ordinal_markers() {
        assert_eq!(ordinal_marker(4, "1"), "4.");
        assert_eq!(ordinal_marker(2, "a"), "b.");
        assert_eq!(ordinal_marker(27, "a"), "aa.");
        assert_eq!(ordinal_marker(26, "A"), "Z.");
        assert_eq!(ordinal_marker(0, "a"), "0.");
    }

    #[test]
    fn tables_emit_one_line_per_row() {
        let nodes = body_nodes(
            "<table><thead><tr><th>Name</th><th>Age</th></tr></thead>\
             <tbody><tr><th>Ann</th><td>7</td></tr><tr><td></td><td></td></tr></tbody></table>",
        );
        assert_eq!(linearize(&nodes), "Name | Age\nAnn | 7");
    }

    #[test]
    fn asides_emit_first_paragraph() {
        let nodes = body_nodes(
            "<aside aria-label=\"Tip\"><h3>Tip</h3><p>Drink water.</p><p>Also sleep.</p></aside>",
        );
        assert_eq!(linearize(&nodes), "Drink water.");
    }

    #[test]
    fn figures_and_footer() {
        let nodes = body_nodes(
            "<figure><img src=\"a.png\" alt=\"Cat\"/><figcaption><p class=\"text-hidden\">Cat</p></figcaption></figure>\
             <footer role=\"contentinfo\"><p class=\"text-hidden\">Page Number 4</p></footer>",
        );
        assert_eq!(linearize(&nodes), "Cat\n\nPage Number 4");
    }

    #[test]
    fn line_count_matches_leaf_count() {
        let nodes = body_nodes(
            "<h1>Rivers</h1><p>Intro text.</p>\
             <div><p>Nested one.</p>loose text<p>Nested two.</p></div>\
             <ol start=\"2\"><li>Two<ul><li>sub</li><li></li></ul></li><li>Three</li></ol>\
             <table class=\"text-hidden\"><tr><td>a</td><td>b</td></tr><tr><td>c</td><td></td></tr></table>\
             <aside><h3>Tip</h3><p>Body.</p></aside>\
             <figure><figcaption>Map</figcaption></figure>\
             <footer><p class=\"text-hidden\">Page Number 9</p></footer>",
        );
        let text = linearize(&nodes);
        assert_eq!(nonempty_lines(&text), leaf_count(&nodes));
        assert_eq!(leaf_count(&nodes), 13);
    }

    #[test]
    fn reconstructed_pages_keep_line_and_leaf_counts_equal() {
        let mut config = crate::Config::default();
        config.feature_titles = vec!["Did You Know?".to_string()];
        let processor = crate::Processor::new(config);

        let fact_css = "\
            #l1 { left: 10px; top: 100px; } #v1 { left: 200px; top: 100px; } \
            #l2 { left: 10px; top: 130px; } #v2 { left: 200px; top: 130px; } \
            #l3 { left: 10px; top: 160px; } #v3 { left: 200px; top: 160px; } \
            #intro { left: 10px; top: 20px; }";
        let pages = [
            (
                "<p>Pick one</p><p>1. Red</p><p>2. Green</p><p>a. light</p><p>b. dark</p><p>3. Blue 12</p>",
                "",
            ),
            (
                "<h2>Did you know?</h2><p>The Nile is</p><p>very long.</p><p>Next part.</p>\
                 <div class=\"epub-page-number\">4</div>",
                "",
            ),
            (
                "<p>The river bends.</p><img src=\"a.png\" alt=\"Figure 2\"/><p>7</p>",
                "",
            ),
            (
                "<p id=\"intro\">Quick facts</p>\
                 <p id=\"l1\" class=\"label\">Capital</p><p id=\"v1\" class=\"value\">Paris</p>\
                 <p id=\"l2\" class=\"label\">Area</p><p id=\"v2\" class=\"value\">Large</p>\
                 <p id=\"l3\" class=\"label\">River</p><p id=\"v3\" class=\"value\">Seine</p>",
                fact_css,
            ),
            (
                "<table><tr><th>Name</th><th>Age</th></tr><tr><td>Ann</td><td>4</td></tr></table>",
                "",
            ),
        ];

        for (body, css) in pages {
            let out = processor.reconstruct(&format!("<html><body>{body}</body></html>"), css);
            assert!(!out.text.is_empty(), "{body}");
            assert_eq!(
                nonempty_lines(&out.text),
                leaf_count(&out.fragment),
                "{body}\n---\n{}",
                out.text
            );
        }
    }
}
