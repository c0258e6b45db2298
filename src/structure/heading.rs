//! Top-level title promotion.

use tracing::debug;

use crate::dom::{match_key, Element, Node};

/// Remove the first heading whose text matches a candidate and return its
/// display text. Callout titles inside `<aside>` are not eligible.
pub fn take_title(nodes: &mut Vec<Node>, candidates: &[String]) -> Option<String> {
    if candidates.is_empty() {
        return None;
    }
    let keys: Vec<String> = candidates.iter().map(|c| match_key(c)).collect();
    take_matching(nodes, &keys)
}

fn take_matching(nodes: &mut Vec<Node>, keys: &[String]) -> Option<String> {
    for i in 0..nodes.len() {
        let Node::Element(el) = &mut nodes[i] else {
            continue;
        };
        if el.is_heading() {
            let text = el.text();
            if keys.contains(&match_key(&text)) {
                nodes.remove(i);
                debug!(title = %text, "heading promoted to title");
                return Some(text);
            }
        } else if el.name != "aside" {
            if let Some(found) = take_matching(&mut el.children, keys) {
                return Some(found);
            }
        }
    }
    None
}

/// Put the title as `<h1>` at the head of the fragment.
pub fn inject_title(nodes: &mut Vec<Node>, title: &str) {
    nodes.insert(0, Node::Element(Element::new("h1").with_text(title)));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(level: &str, text: &str) -> Node {
        Node::Element(Element::new(level).with_text(text))
    }

    #[test]
    fn first_match_in_document_order_wins() {
        let mut nodes = vec![
            h("h2", "Intro"),
            Node::Element(Element::new("section").with_child(h("h3", "The  Water Cycle"))),
            h("h2", "Summary"),
        ];
        let candidates = vec!["summary".to_string(), "the water cycle".to_string()];
        let title = take_title(&mut nodes, &candidates);
        assert_eq!(title.as_deref(), Some("The Water Cycle"));
        assert!(nodes[1].as_element().unwrap().children.is_empty());
        assert_eq!(nodes.len(), 3);
    }

    #[test]
    fn paragraphs_and_asides_are_not_titles() {
        let aside = Node::Element(Element::new("aside").with_child(h("h3", "Summary")));
        let mut nodes = vec![h("p", "Summary"), aside];
        assert_eq!(take_title(&mut nodes, &["Summary".to_string()]), None);
        assert_eq!(nodes.len(), 2);
    }

    #[test]
    fn injected_title_leads() {
        let mut nodes = vec![h("p", "Body.")];
        inject_title(&mut nodes, "Rivers");
        assert!(nodes[0].is("h1"));
        assert_eq!(nodes[0].text_content(), "Rivers");
    }
}
