//! Document to block sequence.
//!
//! A block is a block-level element holding text of its own, that is text
//! that is not inside a nested block element.
use crate::budget::Budget;
use crate::dom::{heading_level, is_block, Document, Edge, NodeId};
use crate::error::Skip;
use crate::types::normalize_whitespace;

/// Inline elements whose leading occurrence makes an emphasized lead.
const LEAD_ELEMENTS: &[&str] = &["strong", "b", "em"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Heading(u8),
    Paragraph,
    ListItem,
    Term,
    Definition,
    /// table cell, `first` if it is the first cell of its row
    Cell { first: bool },
    Summary,
    Caption,
    Other,
}

impl BlockKind {
    fn from_name(name: &str, first_cell: bool) -> Self {
        if let Some(rank) = heading_level(name) {
            return BlockKind::Heading(rank);
        }
        match name {
            "p" => BlockKind::Paragraph,
            "li" => BlockKind::ListItem,
            "dt" => BlockKind::Term,
            "dd" => BlockKind::Definition,
            "td" | "th" => BlockKind::Cell { first: first_cell },
            "summary" => BlockKind::Summary,
            "caption" | "figcaption" => BlockKind::Caption,
            _ => BlockKind::Other,
        }
    }

    /// Heading rank, if any.
    pub fn rank(&self) -> Option<u8> {
        match self {
            BlockKind::Heading(rank) => Some(*rank),
            _ => None,
        }
    }

    /// Blocks where a question is expected.
    pub fn is_cue(&self) -> bool {
        matches!(
            self,
            BlockKind::Heading(_)
                | BlockKind::Term
                | BlockKind::Summary
                | BlockKind::Cell { first: true }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub node: NodeId,
    pub kind: BlockKind,
    /// number of ancestors of the element
    pub depth: usize,
    /// normalized own text
    pub text: String,
    /// text of a leading `strong`/`b`/`em`
    pub lead: Option<String>,
    /// text following the lead
    pub rest: String,
}

impl Block {
    /// Whether a question is expected here: cue kind, or a block that is entirely emphasized.
    pub fn is_cue(&self) -> bool {
        self.kind.is_cue() || (self.lead.is_some() && self.rest.is_empty())
    }
}

/// Block being built during the walk.
struct Pending {
    slot: usize,
    node: NodeId,
    kind: BlockKind,
    depth: usize,
    raw: String,
    lead_node: Option<NodeId>,
    lead_end: Option<usize>,
}

impl Pending {
    fn finish(self) -> Option<Block> {
        let text = normalize_whitespace(&self.raw);
        if text.is_empty() {
            return None;
        }
        let (lead, rest) = match self.lead_end {
            Some(end) => {
                let lead = normalize_whitespace(&self.raw[..end]);
                let rest = normalize_whitespace(&self.raw[end..]);
                (Some(lead).filter(|l| !l.is_empty()), rest)
            }
            None => (None, String::new()),
        };
        let rest = if lead.is_some() { rest } else { String::new() };
        Some(Block {
            node: self.node,
            kind: self.kind,
            depth: self.depth,
            text,
            lead,
            rest,
        })
    }
}

/// Whether `id` is the first element among its siblings.
fn is_first_element(doc: &Document, id: NodeId) -> bool {
    let mut current = doc.prev_sibling(id);
    while let Some(prev) = current {
        if doc.get(prev).element().is_some() {
            return false;
        }
        current = doc.prev_sibling(prev);
    }
    true
}

/// Split a document into blocks, in document order.
pub fn blocks(doc: &Document, budget: &Budget) -> Result<Vec<Block>, Skip> {
    let mut slots: Vec<Option<Block>> = Vec::new();
    let mut stack: Vec<Pending> = Vec::new();

    for edge in doc.traverse(doc.root()) {
        match edge {
            Edge::Open(id) => {
                budget.check()?;
                let node = doc.get(id);
                if let Some(text) = node.text() {
                    if let Some(top) = stack.last_mut() {
                        top.raw.push_str(text);
                    }
                    continue;
                }
                let name = match node.name() {
                    Some(name) => name,
                    None => continue,
                };

                if is_block(name) {
                    let first_cell = doc
                        .parent(id)
                        .and_then(|p| doc.get(p).name())
                        .map_or(false, |p| p == "tr")
                        && is_first_element(doc, id);
                    slots.push(None);
                    stack.push(Pending {
                        slot: slots.len() - 1,
                        node: id,
                        kind: BlockKind::from_name(name, first_cell),
                        depth: doc.depth(id),
                        raw: String::new(),
                        lead_node: None,
                        lead_end: None,
                    });
                } else if let Some(top) = stack.last_mut() {
                    if name == "br" {
                        top.raw.push(' ');
                    } else if LEAD_ELEMENTS.contains(&name)
                        && top.lead_node.is_none()
                        && doc.parent(id) == Some(top.node)
                        && top.raw.trim().is_empty()
                    {
                        top.lead_node = Some(id);
                    }
                }
            }
            Edge::Close(id) => {
                let top = match stack.last_mut() {
                    Some(top) => top,
                    None => continue,
                };
                if top.node == id {
                    if let Some(pending) = stack.pop() {
                        let slot = pending.slot;
                        slots[slot] = pending.finish();
                    }
                } else if top.lead_node == Some(id) && top.lead_end.is_none() {
                    top.lead_end = Some(top.raw.len());
                }
            }
        }
    }

    Ok(slots.into_iter().flatten().collect())
}
