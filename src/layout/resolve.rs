//! Overlap arbitration between detector candidates.

use std::collections::BTreeSet;

use tracing::debug;

use super::{group_lines, DetectedBlock, Token};
use crate::dom::{Element, Node};

/// A candidate is dropped when this share of its tokens is already claimed.
const MAX_CLAIMED_SHARE: f64 = 0.30;

/// Keep the largest non-conflicting candidates.
///
/// Candidates are visited by descending token count; a candidate whose
/// tokens are 30% or more claimed by an accepted block is discarded whole.
pub fn resolve_overlaps(mut candidates: Vec<DetectedBlock>) -> Vec<DetectedBlock> {
    candidates.sort_by(|a, b| b.used.len().cmp(&a.used.len()));

    let mut claimed: BTreeSet<usize> = BTreeSet::new();
    let mut accepted = Vec::new();
    for block in candidates {
        if block.used.is_empty() {
            continue;
        }
        let overlap = block.used.intersection(&claimed).count();
        let share = overlap as f64 / block.used.len() as f64;
        if share >= MAX_CLAIMED_SHARE {
            debug!(kind = ?block.kind, share, "candidate discarded on overlap");
            continue;
        }
        claimed.extend(block.used.iter().copied());
        accepted.push(block);
    }
    accepted
}

/// Emit accepted blocks and the remaining tokens as paragraphs, ordered by
/// y. Blocks sit at the midpoint of their vertical extent.
pub fn interleave(blocks: &[DetectedBlock], tokens: &[Token], tolerance: f64) -> Vec<Node> {
    let claimed: BTreeSet<usize> = blocks.iter().flat_map(|b| b.used.iter().copied()).collect();

    let mut placed: Vec<(f64, Node)> = group_lines(
        tokens.iter().filter(|t| !claimed.contains(&t.index)),
        tolerance,
    )
    .into_iter()
    .map(|line| {
        let p = Element::new("p").with_text(&line.text());
        (line.y, Node::Element(p))
    })
    .collect();

    placed.extend(blocks.iter().map(|b| (b.mid_y(), Node::Element(b.render()))));
    // Stable: a line and a block at the same y keep line-first order.
    placed.sort_by(|a, b| a.0.total_cmp(&b.0));

    placed.into_iter().map(|(_, node)| node).collect()
}
