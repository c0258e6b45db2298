//! Stream merge and fragmentation repair.
//!
//! Authoring tools split one sentence across several positioned boxes, and
//! a callout's body across the callout and the next paragraph. The passes
//! here rejoin those pieces, then hand the result to list detection.

use std::collections::HashSet;

use tracing::debug;

use super::lists::{detect_lists, paragraph_marker};
use super::{ends_sentence, next_non_blank, next_significant, splice_paragraph};
use crate::config::StructureConfig;
use crate::dom::{match_key, Element, Node};

/// Candidate stream produced from table evidence.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TableStream {
    /// Nothing detected; the structural stream stands alone.
    #[default]
    Empty,
    /// Accepted geometric blocks interleaved with leftover token lines.
    Geometric(Vec<Node>),
    /// Converted literal `<table>` markup.
    Literal(Vec<Node>),
}

impl TableStream {
    pub fn label(&self) -> &'static str {
        match self {
            TableStream::Empty => "none",
            TableStream::Geometric(_) => "geometric",
            TableStream::Literal(_) => "literal",
        }
    }
}

/// Counts from one [`repair`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairStats {
    pub aside_merges: usize,
    pub sentence_merges: usize,
    pub lists: usize,
}

/// Combine the structural stream with the table stream.
///
/// With table evidence, the structural stream keeps only headings, asides,
/// figures, existing lists and page-number containers; its paragraphs are
/// already represented in the table stream. Table-stream paragraphs that
/// repeat a kept heading or callout are dropped.
pub fn merge_streams(structural: Vec<Node>, stream: TableStream, config: &StructureConfig) -> Vec<Node> {
    let label = stream.label();
    let table_nodes = match stream {
        TableStream::Empty => return structural,
        TableStream::Geometric(nodes) | TableStream::Literal(nodes) if nodes.is_empty() => {
            return structural;
        }
        TableStream::Geometric(nodes) | TableStream::Literal(nodes) => nodes,
    };

    let mut cell_keys: HashSet<String> = HashSet::new();
    for node in &table_nodes {
        collect_cell_keys(node, &mut cell_keys);
    }

    let mut merged: Vec<Node> = structural
        .into_iter()
        .filter(|node| {
            node.as_element().is_some_and(|el| {
                keeps_alongside_tables(el, config)
                    && !(el.is_heading() && cell_keys.contains(&match_key(&el.raw_text())))
            })
        })
        .collect();

    let mut seen: HashSet<String> = HashSet::new();
    for node in &merged {
        collect_keys(node, &mut seen);
    }

    let before = table_nodes.len();
    merged.extend(
        table_nodes
            .into_iter()
            .filter(|node| !(node.is("p") && seen.contains(&match_key(&node.raw_text())))),
    );
    debug!(
        source = label,
        kept = merged.len(),
        table_nodes = before,
        "streams merged"
    );
    merged
}

fn keeps_alongside_tables(el: &Element, config: &StructureConfig) -> bool {
    el.is_heading()
        || matches!(el.name.as_str(), "aside" | "figure" | "ul" | "ol" | "dl")
        || el
            .classes()
            .any(|c| config.page_number_classes.iter().any(|p| p == c))
}

/// Keys of table cells and list items; headings repeating them were
/// positioned column headers, not document headings.
fn collect_cell_keys(node: &Node, keys: &mut HashSet<String>) {
    let Some(el) = node.as_element() else {
        return;
    };
    if matches!(el.name.as_str(), "th" | "td" | "li") {
        keys.insert(match_key(&el.raw_text()));
    }
    for child in &el.children {
        collect_cell_keys(child, keys);
    }
}

fn collect_keys(node: &Node, seen: &mut HashSet<String>) {
    let Some(el) = node.as_element() else {
        return;
    };
    if el.is_heading() {
        seen.insert(match_key(&el.raw_text()));
    } else if el.name == "aside" {
        for child in el.child_elements() {
            if child.is_heading() || child.name == "p" {
                seen.insert(match_key(&child.raw_text()));
            }
        }
    }
}

/// Run the three repair passes over the fragment.
pub fn repair(nodes: &mut Vec<Node>, config: &StructureConfig) -> RepairStats {
    let aside_merges = merge_aside_trailing(nodes);
    let sentence_merges = merge_sentences(nodes);
    let lists = detect_lists(nodes, config.min_list_items);
    let stats = RepairStats {
        aside_merges,
        sentence_merges,
        lists,
    };
    debug!(?stats, "repair passes finished");
    stats
}

/// Pull paragraphs that continue a callout's unfinished last sentence into
/// the callout.
pub fn merge_aside_trailing(nodes: &mut Vec<Node>) -> usize {
    let mut merged = 0;
    let mut i = 0;
    while i < nodes.len() {
        if nodes[i].is("aside") {
            while let Some(j) = absorbable_after_aside(nodes, i) {
                let Node::Element(para) = nodes.remove(j) else {
                    break;
                };
                if let Some(last) = nodes[i].as_element_mut().and_then(last_paragraph_mut) {
                    splice_paragraph(last, para);
                    merged += 1;
                }
            }
        }
        if let Node::Element(el) = &mut nodes[i] {
            merged += merge_aside_trailing(&mut el.children);
        }
        i += 1;
    }
    merged
}

fn absorbable_after_aside(nodes: &[Node], i: usize) -> Option<usize> {
    let aside = nodes[i].as_element()?;
    let last = aside.child_elements().filter(|el| el.name == "p").last()?;
    let text = last.text();
    if text.is_empty() || ends_sentence(&text) {
        return None;
    }
    let j = next_significant(nodes, i)?;
    nodes[j].is("p").then_some(j)
}

fn last_paragraph_mut(aside: &mut Element) -> Option<&mut Element> {
    aside
        .children
        .iter_mut()
        .rev()
        .filter_map(Node::as_element_mut)
        .find(|el| el.name == "p")
}

/// Join a paragraph with the next when the first stops mid-sentence and the
/// second does not open with a capital letter.
pub fn merge_sentences(nodes: &mut Vec<Node>) -> usize {
    let mut merged = 0;
    let mut i = 0;
    while i < nodes.len() {
        while let Some(j) = sentence_continuation(nodes, i) {
            let Node::Element(next) = nodes.remove(j) else {
                break;
            };
            if let Some(p) = nodes[i].as_element_mut() {
                splice_paragraph(p, next);
                merged += 1;
            }
        }
        if let Node::Element(el) = &mut nodes[i] {
            merged += merge_sentences(&mut el.children);
        }
        i += 1;
    }
    merged
}

fn sentence_continuation(nodes: &[Node], i: usize) -> Option<usize> {
    if !nodes[i].is("p") || paragraph_marker(&nodes[i]).is_some() {
        return None;
    }
    let text = nodes[i].text_content();
    if text.is_empty() || ends_sentence(&text) {
        return None;
    }
    let j = next_non_blank(nodes, i)?;
    if !nodes[j].is("p") || paragraph_marker(&nodes[j]).is_some() {
        return None;
    }
    let first = nodes[j].text_content().chars().next()?;
    (!first.is_uppercase()).then_some(j)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::serialize_nodes;

    fn p(text: &str) -> Node {
        Node::Element(Element::new("p").with_text(text))
    }

    fn aside(title: &str, body: &str) -> Node {
        Node::Element(
            Element::new("aside")
                .with_child(Node::Element(Element::new("h3").with_text(title)))
                .with_child(p(body)),
        )
    }

    #[test]
    fn aside_absorbs_unfinished_sentence() {
        let mut nodes = vec![
            aside("Tip", "Water the plants"),
            Node::text("\n"),
            Node::Comment("x".into()),
            p("every morning."),
            p("Next."),
        ];
        assert_eq!(merge_aside_trailing(&mut nodes), 1);
        let aside = nodes[0].as_element().unwrap();
        assert_eq!(
            serialize_nodes(&aside.children),
            "<h3>Tip</h3><p>Water the plants every morning.</p>"
        );
        assert_eq!(nodes.last().unwrap().text_content(), "Next.");
    }

    #[test]
    fn aside_ending_in_exclamation_stays_closed() {
        let mut nodes = vec![aside("Tip", "Look out!"), p("and more")];
        assert_eq!(merge_aside_trailing(&mut nodes), 0);
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn aside_skips_media_only_siblings() {
        let figure = Node::Element(
            Element::new("div").with_child(Node::Element(Element::new("img").with_attr("src", "a.png"))),
        );
        let mut nodes = vec![aside("Tip", "Keep going"), figure, p("until done.")];
        assert_eq!(merge_aside_trailing(&mut nodes), 1);
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn aside_does_not_absorb_headings() {
        let mut nodes = vec![
            aside("Tip", "Keep going"),
            Node::Element(Element::new("h2").with_text("Chapter")),
        ];
        assert_eq!(merge_aside_trailing(&mut nodes), 0);
    }

    #[test]
    fn sentence_merge_respects_capitals() {
        let mut nodes = vec![p("The cat sat on"), p("the mat"), p("and slept."), p("Then it woke")];
        assert_eq!(merge_sentences(&mut nodes), 2);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].text_content(), "The cat sat on the mat and slept.");

        let mut blocked = vec![p("The dog barked"), p("Then it ran.")];
        assert_eq!(merge_sentences(&mut blocked), 0);
    }

    #[test]
    fn sentence_merge_leaves_list_markers() {
        let mut nodes = vec![p("1. Red"), p("2. Green")];
        assert_eq!(merge_sentences(&mut nodes), 0);
        let mut nodes = vec![p("Colours include"), p("• red")];
        assert_eq!(merge_sentences(&mut nodes), 0);
    }

    #[test]
    fn repair_builds_lists_after_merges() {
        let mut nodes = vec![p("Pick one"), p("1. Red"), p("2. Green"), p("3. Blue")];
        let stats = repair(&mut nodes, &StructureConfig::default());
        assert_eq!(stats.lists, 1);
        assert_eq!(nodes.len(), 2);
        assert!(nodes[1].is("ol"));
    }

    #[test]
    fn empty_table_stream_keeps_structure() {
        let structural = vec![p("a"), p("b")];
        let out = merge_streams(structural.clone(), TableStream::Geometric(vec![]), &StructureConfig::default());
        assert_eq!(out, structural);
    }

    #[test]
    fn table_stream_replaces_paragraphs() {
        let structural = vec![
            Node::Element(Element::new("h2").with_text("Facts")),
            p("Population 12"),
            Node::Element(Element::new("div").with_attr("class", "epub-page-number").with_text("4")),
        ];
        let table = Node::Element(Element::new("table"));
        let out = merge_streams(
            structural,
            TableStream::Geometric(vec![p("Facts"), table, p("Closing line")]),
            &StructureConfig::default(),
        );
        let names: Vec<String> = out
            .iter()
            .map(|n| n.as_element().unwrap().name.clone())
            .collect();
        assert_eq!(names, vec!["h2", "div", "table", "p"]);
        assert_eq!(out[3].text_content(), "Closing line");
    }

    #[test]
    fn headings_repeating_cells_are_dropped() {
        let structural = vec![
            Node::Element(Element::new("h2").with_text("Animal")),
            Node::Element(Element::new("h2").with_text("Zoo guide")),
        ];
        let th = Element::new("th").with_text("Animal");
        let table = Node::Element(
            Element::new("table").with_child(Node::Element(Element::new("tr").with_child(Node::Element(th)))),
        );
        let out = merge_streams(structural, TableStream::Geometric(vec![table]), &StructureConfig::default());
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text_content(), "Zoo guide");
        assert!(out[1].is("table"));
    }
}
