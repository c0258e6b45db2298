//! Page-number extraction.
//!
//! Print-derived pages carry their folio as a dedicated container, a bare
//! trailing paragraph, or digits glued to the end of the last paragraph.
//! All three are removed from the fragment and replaced by a single
//! landmark footer.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::{strip_trailing, trim_end_text};
use crate::config::StructureConfig;
use crate::dom::{serialize_nodes, Element, Node, HIDDEN_CLASS};

static TRAILING_DIGITS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*$").expect("static regex"));

static ALL_DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+$").expect("static regex"));

static INLINE_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[^\d])(\d{1,6})\s*$").expect("static regex"));

/// Result of [`extract_footer`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Footer {
    pub page_number: Option<String>,
    pub node: Option<Node>,
}

impl Footer {
    pub fn found(&self) -> bool {
        self.page_number.is_some()
    }

    /// Footer markup, or an empty string when no page number was found.
    pub fn markup(&self) -> String {
        self.node
            .as_ref()
            .map(|n| serialize_nodes(std::slice::from_ref(n)))
            .unwrap_or_default()
    }
}

/// Remove page-number artifacts from `nodes` and build the footer.
///
/// Precedence: the last page-number container, then a trailing all-digit
/// paragraph, then a digit suffix on the last paragraph. Lower-precedence
/// artifacts are still removed when a page number is already known.
pub fn extract_footer(nodes: &mut Vec<Node>, config: &StructureConfig) -> Footer {
    let mut page: Option<String> = None;

    let mut containers = Vec::new();
    take_page_containers(nodes, &config.page_number_classes, &mut containers);
    if let Some(last) = containers.last() {
        page = TRAILING_DIGITS_RE
            .captures(last.trim())
            .map(|c| c[1].to_string());
        debug!(count = containers.len(), ?page, "page-number containers removed");
    }

    if let Some(digits) = take_trailing_digit_paragraph(nodes) {
        debug!(%digits, "trailing page-number paragraph removed");
        page = page.or(Some(digits));
    }

    if let Some(digits) = strip_inline_suffix(nodes) {
        debug!(%digits, "inline page-number suffix stripped");
        page = page.or(Some(digits));
    }

    let page_number = page.map(|p| normalize_page_number(&p));
    let node = page_number.as_deref().map(footer_node);
    Footer { page_number, node }
}

/// Strip leading zeros; an all-zero value stays `"0"`.
pub fn normalize_page_number(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn footer_node(page: &str) -> Node {
    Node::Element(
        Element::new("footer")
            .with_attr("role", "contentinfo")
            .with_attr("aria-label", "Page footer")
            .with_child(Node::Element(
                Element::new("p")
                    .with_attr("class", HIDDEN_CLASS)
                    .with_text(&format!("Page Number {page}")),
            )),
    )
}

fn take_page_containers(nodes: &mut Vec<Node>, classes: &[String], out: &mut Vec<String>) {
    let mut i = 0;
    while i < nodes.len() {
        let is_container = nodes[i]
            .as_element()
            .is_some_and(|el| el.classes().any(|c| classes.iter().any(|p| p == c)));
        if is_container {
            out.push(nodes.remove(i).text_content());
            continue;
        }
        if let Node::Element(el) = &mut nodes[i] {
            take_page_containers(&mut el.children, classes, out);
        }
        i += 1;
    }
}

fn take_trailing_digit_paragraph(nodes: &mut Vec<Node>) -> Option<String> {
    let last = nodes.iter().rposition(|n| !n.is_ignorable())?;
    if !nodes[last].is("p") {
        return None;
    }
    let text = nodes[last].text_content();
    if !ALL_DIGITS_RE.is_match(&text) {
        return None;
    }
    nodes.remove(last);
    Some(text)
}

/// Strip a digit suffix from the last paragraph in document order.
fn strip_inline_suffix(nodes: &mut Vec<Node>) -> Option<String> {
    let para = last_paragraph_mut(nodes)?;
    let raw = para.raw_text();
    let caps = INLINE_SUFFIX_RE.captures(&raw)?;
    if caps[1].is_empty() {
        return None;
    }
    let digits = caps.get(2)?;
    let mut n = raw.len() - digits.start();
    strip_trailing(&mut para.children, &mut n);
    trim_end_text(&mut para.children);
    let emptied = para.children.iter().all(Node::is_blank);
    if emptied {
        remove_blank_paragraphs(nodes);
    }
    Some(digits.as_str().to_string())
}

/// Captions and footers hold mirrored alt text or landmarks, never body
/// text carrying a folio.
fn last_paragraph_mut(nodes: &mut [Node]) -> Option<&mut Element> {
    for node in nodes.iter_mut().rev() {
        if let Node::Element(el) = node {
            if matches!(el.name.as_str(), "figure" | "figcaption" | "footer") {
                continue;
            }
            if el.name == "p" {
                return Some(el);
            }
            if let Some(found) = last_paragraph_mut(&mut el.children) {
                return Some(found);
            }
        }
    }
    None
}

fn remove_blank_paragraphs(nodes: &mut Vec<Node>) {
    nodes.retain(|n| {
        !n.as_element()
            .is_some_and(|el| el.name == "p" && el.children.iter().all(Node::is_blank))
    });
    for node in nodes.iter_mut() {
        if let Node::Element(el) = node {
            remove_blank_paragraphs(&mut el.children);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(text: &str) -> Node {
        Node::Element(Element::new("p").with_text(text))
    }

    fn container(text: &str) -> Node {
        Node::Element(
            Element::new("div")
                .with_attr("class", "epub-page-number")
                .with_text(text),
        )
    }

    fn run(mut nodes: Vec<Node>) -> (Footer, Vec<Node>) {
        let footer = extract_footer(&mut nodes, &StructureConfig::default());
        (footer, nodes)
    }

    #[test]
    fn container_beats_trailing_paragraph() {
        let (footer, rest) = run(vec![p("Body text."), container("Page 5"), p("9")]);
        assert_eq!(footer.page_number.as_deref(), Some("5"));
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].text_content(), "Body text.");
    }

    #[test]
    fn last_container_wins() {
        let section = Node::Element(Element::new("section").with_child(container("3")));
        let (footer, rest) = run(vec![container("2"), section, p("Body.")]);
        assert_eq!(footer.page_number.as_deref(), Some("3"));
        assert!(rest[0].as_element().unwrap().children.is_empty());
    }

    #[test]
    fn leading_zeros_are_stripped() {
        assert_eq!(normalize_page_number("007"), "7");
        assert_eq!(normalize_page_number("000"), "0");
        assert_eq!(normalize_page_number("120"), "120");
        let (footer, _) = run(vec![p("Text."), p("007")]);
        assert_eq!(footer.page_number.as_deref(), Some("7"));
    }

    #[test]
    fn trailing_paragraph_must_be_last() {
        let (footer, rest) = run(vec![p("12"), p("Body text.")]);
        assert_eq!(footer.page_number, None);
        assert_eq!(rest.len(), 2);
    }

    #[test]
    fn inline_suffix_is_stripped() {
        let (footer, rest) = run(vec![p("First."), p("The end of the chapter 42")]);
        assert_eq!(footer.page_number.as_deref(), Some("42"));
        assert_eq!(rest[1].text_content(), "The end of the chapter");
    }

    #[test]
    fn inline_suffix_stripped_even_when_page_known() {
        let (footer, rest) = run(vec![p("Closing words 17"), container("16")]);
        assert_eq!(footer.page_number.as_deref(), Some("16"));
        assert_eq!(rest[0].text_content(), "Closing words");
    }

    #[test]
    fn only_the_last_paragraph_is_checked() {
        let aside = Node::Element(Element::new("aside").with_child(p("Closing note.")));
        let (footer, rest) = run(vec![p("Chapter 3"), aside]);
        assert!(!footer.found());
        assert_eq!(rest[0].text_content(), "Chapter 3");
    }

    #[test]
    fn emptied_paragraph_is_removed() {
        let section = Node::Element(Element::new("section").with_child(p(" 23")));
        let (footer, rest) = run(vec![p("Body."), section]);
        assert_eq!(footer.page_number.as_deref(), Some("23"));
        assert!(rest[1].as_element().unwrap().children.is_empty());
    }

    #[test]
    fn captions_are_not_searched_for_suffixes() {
        let figure = || {
            Node::Element(
                Element::new("figure")
                    .with_child(Node::Element(Element::new("img").with_attr("alt", "Figure 2")))
                    .with_child(Node::Element(
                        Element::new("figcaption").with_child(p("Figure 2")),
                    )),
            )
        };
        let (footer, rest) = run(vec![p("The river bends."), figure()]);
        assert!(!footer.found());
        assert_eq!(rest[1].text_content(), "Figure 2");

        let (footer, rest) = run(vec![p("The river bends 9"), figure()]);
        assert_eq!(footer.page_number.as_deref(), Some("9"));
        assert_eq!(rest[0].text_content(), "The river bends");
        assert_eq!(rest[1].text_content(), "Figure 2");
    }

    #[test]
    fn long_digit_runs_are_not_page_numbers() {
        let (footer, rest) = run(vec![p("Call 1234567")]);
        assert!(!footer.found());
        assert_eq!(rest[0].text_content(), "Call 1234567");
    }

    #[test]
    fn footer_markup_shape() {
        let (footer, _) = run(vec![p("Text."), container("8")]);
        assert_eq!(
            footer.markup(),
            r#"<footer role="contentinfo" aria-label="Page footer"><p class="text-hidden">Page Number 8</p></footer>"#
        );
        let (empty, _) = run(vec![p("Text.")]);
        assert_eq!(empty.markup(), "");
    }
}
