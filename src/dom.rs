/*! Arena-backed document tree.

Nodes live in a single [Vec] and reference each other through [NodeId] indices
(parent, first/last child, previous/next sibling). There are no owning pointers
between nodes, so a [Document] is plain data: `Send + Sync`, cheap to traverse
from several threads, and free of reference cycles.

Parsing goes through `scraper` (html5ever), which applies the standard HTML
error recovery rules, and is then copied into the arena. Comments, doctypes and
processing instructions are not kept.

Every traversal here is iterative: web pages can be nested deeply enough
to overflow the stack with naive recursion.
!*/
use std::collections::HashMap;

use ego_tree::iter::Edge as SourceEdge;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::Html;

use crate::error::Skip;

lazy_static! {
    static ref TAG_RE: Regex = Regex::new(r"<(?:(/?)([A-Za-z][A-Za-z0-9-]*)|!--)").unwrap();
}

/// Index of a node inside its [Document].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attrs: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeData {
    Root,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub data: NodeData,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
        }
    }

    pub fn element(&self) -> Option<&Element> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Element name, if the node is an element.
    pub fn name(&self) -> Option<&str> {
        self.element().map(|e| e.name.as_str())
    }
}

/// Traversal event, see [Document::traverse].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Open(NodeId),
    Close(NodeId),
}

/// Elements without content or closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements that start a new line of text when rendered.
pub const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "caption", "center", "dd", "details",
    "dir", "div", "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2",
    "h3", "h4", "h5", "h6", "header", "hgroup", "hr", "html", "li", "listing", "main", "menu",
    "nav", "ol", "p", "pre", "search", "section", "summary", "table", "tbody", "td", "tfoot",
    "th", "thead", "tr", "ul",
];

pub fn is_block(name: &str) -> bool {
    BLOCK_ELEMENTS.contains(&name)
}

/// Heading rank (1 for `h1`...), [None] for anything else.
pub fn heading_level(name: &str) -> Option<u8> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

/// Upper bound on the elements a page may leave open at once, see [max_open_elements].
pub const MAX_OPEN_ELEMENTS: usize = 4096;

/// Elements whose end tag may be left out, or that are implied by the parser.
const OPTIONAL_END: &[&str] = &[
    "body", "caption", "colgroup", "dd", "dt", "head", "html", "li", "optgroup", "option", "p",
    "rb", "rp", "rt", "rtc", "tbody", "td", "tfoot", "th", "thead", "tr",
];

/// Elements holding raw text, in which tags are not markup.
const RAW_TEXT: &[&str] = &[
    "iframe", "noembed", "noframes", "noscript", "plaintext", "script", "style", "textarea",
    "title", "xmp",
];

/// Position of the `</name` that closes a raw text element, if any.
fn raw_text_end(html: &str, from: usize, name: &str) -> Option<usize> {
    let bytes = html.as_bytes();
    let len = name.len() + 2;
    (from..bytes.len().saturating_sub(len - 1)).find(|&i| {
        bytes[i] == b'<'
            && bytes[i + 1] == b'/'
            && bytes[i + 2..i + len].eq_ignore_ascii_case(name.as_bytes())
    })
}

/// Peak number of elements left open by the markup, from a lexical scan.
///
/// Void elements and elements with an optional end tag are not counted.
/// An end tag closes one open element of the same name, if there is one.
/// The scan stops as soon as the count goes over `limit`.
///
/// html5ever spends super-linear time on deeply nested or unclosed markup
/// (`<a><div>` repeated), so this runs before any parsing.
pub fn max_open_elements(html: &str, limit: usize) -> usize {
    let mut by_name: HashMap<String, usize> = HashMap::new();
    let (mut open, mut peak) = (0usize, 0usize);
    let mut pos = 0;
    while let Some(caps) = TAG_RE.captures(&html[pos..]) {
        let whole = match caps.get(0) {
            Some(m) => m,
            None => break,
        };
        pos += whole.end();
        let name = match caps.get(2) {
            Some(name) => name.as_str().to_ascii_lowercase(),
            None => {
                // comment
                match html[pos..].find("-->") {
                    Some(end) => pos += end + 3,
                    None => break,
                }
                continue;
            }
        };
        if VOID_ELEMENTS.contains(&name.as_str()) || OPTIONAL_END.contains(&name.as_str()) {
            continue;
        }
        let closing = caps.get(1).map_or(false, |c| !c.as_str().is_empty());
        if closing {
            if let Some(count) = by_name.get_mut(&name).filter(|c| **c > 0) {
                *count -= 1;
                open -= 1;
            }
            continue;
        }
        if RAW_TEXT.contains(&name.as_str()) {
            match raw_text_end(html, pos, &name) {
                Some(end) => pos = end,
                None => break,
            }
        }
        *by_name.entry(name).or_default() += 1;
        open += 1;
        peak = peak.max(open);
        if peak > limit {
            break;
        }
    }
    peak
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document, only holding the root node.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeData::Root)],
        }
    }

    /// Parse an HTML document, recovering from any markup error.
    pub fn parse(html: &str) -> Self {
        let source = Html::parse_document(html);
        let mut doc = Document::new();

        // None entries stand for skipped source nodes (comments, doctypes...)
        let mut stack: Vec<Option<NodeId>> = Vec::new();
        for edge in source.tree.root().traverse() {
            match edge {
                SourceEdge::Open(node) => {
                    let parent = stack.iter().rev().flatten().next().copied();
                    let id = match node.value() {
                        scraper::Node::Document | scraper::Node::Fragment => Some(doc.root()),
                        scraper::Node::Element(el) => parent.map(|p| {
                            let element = Element {
                                name: el.name().to_string(),
                                attrs: el
                                    .attrs()
                                    .map(|(k, v)| (k.to_string(), v.to_string()))
                                    .collect(),
                            };
                            doc.append(p, NodeData::Element(element))
                        }),
                        scraper::Node::Text(t) => {
                            if let Some(p) = parent {
                                doc.append_text(p, &**t);
                            }
                            None
                        }
                        _ => None,
                    };
                    stack.push(id);
                }
                SourceEdge::Close(_) => {
                    stack.pop();
                }
            }
        }
        doc
    }

    /// Parse an HTML document, refusing markup nested deeper than [MAX_OPEN_ELEMENTS].
    pub fn parse_bounded(html: &str) -> Result<Self, Skip> {
        if max_open_elements(html, MAX_OPEN_ELEMENTS) > MAX_OPEN_ELEMENTS {
            return Err(Skip::TooLarge);
        }
        Ok(Self::parse(html))
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.first_child(self.root()).is_none()
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].first_child
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].last_child
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].next_sibling
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].prev_sibling
    }

    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.first_child(id),
        }
    }

    /// Append a new last child to `parent`.
    pub fn append(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        let mut node = Node::new(data);
        node.parent = Some(parent);
        node.prev_sibling = self.nodes[parent.0].last_child;
        self.nodes.push(node);

        match self.nodes[parent.0].last_child {
            Some(last) => self.nodes[last.0].next_sibling = Some(id),
            None => self.nodes[parent.0].first_child = Some(id),
        }
        self.nodes[parent.0].last_child = Some(id);
        id
    }

    /// Append text to `parent`, merging with a trailing text child.
    ///
    /// Adjacent text nodes would be merged by any re-parse,
    /// so they are never created in the first place.
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> Option<NodeId> {
        if text.is_empty() {
            return None;
        }
        if let Some(last) = self.last_child(parent) {
            if let NodeData::Text(existing) = &mut self.nodes[last.0].data {
                existing.push_str(text);
                return Some(last);
            }
        }
        Some(self.append(parent, NodeData::Text(text.to_string())))
    }

    /// Unlink a node (and its subtree) from the tree.
    ///
    /// The arena slot is kept but becomes unreachable.
    pub fn detach(&mut self, id: NodeId) {
        let (parent, prev, next) = {
            let node = &self.nodes[id.0];
            (node.parent, node.prev_sibling, node.next_sibling)
        };
        if let Some(p) = prev {
            self.nodes[p.0].next_sibling = next;
        } else if let Some(parent) = parent {
            self.nodes[parent.0].first_child = next;
        }
        if let Some(n) = next {
            self.nodes[n.0].prev_sibling = prev;
        } else if let Some(parent) = parent {
            self.nodes[parent.0].last_child = prev;
        }
        let node = &mut self.nodes[id.0];
        node.parent = None;
        node.prev_sibling = None;
        node.next_sibling = None;
    }

    pub fn text_mut(&mut self, id: NodeId) -> Option<&mut String> {
        match &mut self.nodes[id.0].data {
            NodeData::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Depth-first open/close events below (and including) `id`.
    pub fn traverse(&self, id: NodeId) -> Traverse<'_> {
        Traverse {
            doc: self,
            root: id,
            next: Some(Edge::Open(id)),
        }
    }

    /// Nodes below (and including) `id`, in document order.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.traverse(id).filter_map(|edge| match edge {
            Edge::Open(id) => Some(id),
            Edge::Close(_) => None,
        })
    }

    /// Number of ancestors, root included.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = self.parent(id);
        while let Some(p) = current {
            depth += 1;
            current = self.parent(p);
        }
        depth
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.parent(c);
        }
        false
    }

    /// Whitespace-normalized text content of a subtree.
    ///
    /// Block boundaries and `<br>` count as whitespace.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut raw = String::new();
        for edge in self.traverse(id) {
            match edge {
                Edge::Open(n) => match &self.get(n).data {
                    NodeData::Text(t) => raw.push_str(t),
                    NodeData::Element(e) if e.name == "br" || is_block(&e.name) => {
                        raw.push(' ')
                    }
                    _ => (),
                },
                Edge::Close(n) => {
                    if self.get(n).name().map_or(false, is_block) {
                        raw.push(' ');
                    }
                }
            }
        }
        crate::types::normalize_whitespace(&raw)
    }

    /// Serialize the document back to HTML.
    ///
    /// Block elements are put on their own lines, which has no effect on content
    /// once whitespace is collapsed.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for edge in self.traverse(self.root()) {
            match edge {
                Edge::Open(id) => match &self.get(id).data {
                    NodeData::Root => (),
                    NodeData::Text(t) => out.push_str(&html_escape::encode_text(t)),
                    NodeData::Element(e) => {
                        if is_block(&e.name) && !out.is_empty() && !out.ends_with('\n') {
                            out.push('\n');
                        }
                        out.push('<');
                        out.push_str(&e.name);
                        for (k, v) in &e.attrs {
                            out.push(' ');
                            out.push_str(k);
                            out.push_str("=\"");
                            out.push_str(&html_escape::encode_double_quoted_attribute(v));
                            out.push('"');
                        }
                        out.push('>');
                    }
                },
                Edge::Close(id) => {
                    if let Some(e) = self.get(id).element() {
                        if !VOID_ELEMENTS.contains(&e.name.as_str()) {
                            out.push_str("</");
                            out.push_str(&e.name);
                            out.push('>');
                        }
                        if is_block(&e.name) {
                            out.push('\n');
                        }
                    }
                }
            }
        }
        out.trim_end().to_string()
    }
}

pub struct Children<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl<'a> Iterator for Children<'a> {
    type Item = NodeId;
    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.next_sibling(current);
        Some(current)
    }
}

pub struct Traverse<'a> {
    doc: &'a Document,
    root: NodeId,
    next: Option<Edge>,
}

impl<'a> Iterator for Traverse<'a> {
    type Item = Edge;
    fn next(&mut self) -> Option<Edge> {
        let current = self.next?;
        self.next = match current {
            Edge::Open(id) => match self.doc.first_child(id) {
                Some(child) => Some(Edge::Open(child)),
                None => Some(Edge::Close(id)),
            },
            Edge::Close(id) if id == self.root => None,
            Edge::Close(id) => match self.doc.next_sibling(id) {
                Some(sibling) => Some(Edge::Open(sibling)),
                None => self.doc.parent(id).map(Edge::Close),
            },
        };
        Some(current)
    }
}
