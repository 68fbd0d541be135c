//! Markup minification.
//!
//! Three passes over the arena:
//! 1. mark subtrees holding visible text (post-order),
//! 2. rebuild a clean tree, dropping non-content subtrees, unwrapping unknown elements and
//!    stripping attributes,
//! 3. trim whitespace at block boundaries and collapse `<br>` runs.
//!
//! The output is parsed and minified again until it no longer changes.
use log::debug;

use crate::budget::Budget;
use crate::dom::{is_block, Document, Edge, Element, NodeData, NodeId};
use crate::error::Skip;
use crate::minify::encoding;
use crate::types::{MinifiedPage, RawCapture};

/// Elements removed together with their whole subtree.
const DROPPED: &[&str] = &[
    "applet", "area", "audio", "button", "canvas", "col", "colgroup", "datalist", "embed",
    "frame", "frameset", "head", "iframe", "img", "input", "link", "map", "math", "meta",
    "noscript", "object", "optgroup", "option", "param", "picture", "script", "select",
    "source", "style", "svg", "template", "textarea", "title", "track", "video",
];

/// Elements kept as-is (minus attributes). Anything else is unwrapped.
///
/// `address`, `dir`, `fieldset`, `form`, `menu`... bound the list items, definitions
/// and headings nested in them: once unwrapped, a re-parse would close those early.
const KEPT: &[&str] = &[
    "a", "abbr", "address", "article", "aside", "b", "blockquote", "br", "caption", "center",
    "cite", "code", "dd", "details", "dir", "div", "dl", "dt", "em", "fieldset", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hgroup", "i",
    "li", "listing", "main", "mark", "marquee", "menu", "nav", "ol", "p", "pre", "q", "search",
    "section", "small", "span", "strong", "sub", "summary", "sup", "table", "tbody", "td",
    "tfoot", "th", "thead", "time", "tr", "u", "ul",
];

/// Microdata attributes, kept on any element.
const MICRODATA_ATTRS: &[&str] = &["itemscope", "itemtype", "itemprop", "content", "datetime"];

/// Default upper bound on body size.
pub const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Max number of minification rounds on a page.
const MAX_ROUNDS: usize = 3;

/// Minification output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Minified {
    pub page: MinifiedPage,
    /// the body had to be decoded with replacement characters
    pub decode_fallback: bool,
}

pub struct Minifier {
    max_body_bytes: usize,
}

impl Default for Minifier {
    fn default() -> Self {
        Self {
            max_body_bytes: MAX_BODY_BYTES,
        }
    }
}

impl Minifier {
    pub fn new(max_body_bytes: usize) -> Self {
        Self { max_body_bytes }
    }

    /// Minify a single capture.
    pub fn minify(&self, capture: &RawCapture, budget: &Budget) -> Result<Minified, Skip> {
        if !(200..300).contains(&capture.status) {
            return Err(Skip::NotOk(capture.status));
        }

        let content_type = capture.header("content-type");
        if let Some(ct) = content_type {
            if !is_html_content_type(ct) {
                return Err(Skip::NotHtml);
            }
        }

        if capture.body.len() > self.max_body_bytes {
            debug!("{}: body too large ({}B)", capture.url, capture.body.len());
            return Err(Skip::TooLarge);
        }

        let decoded = encoding::decode(&capture.body, content_type);
        if decoded.fallback {
            debug!("{}: decode fallback ({})", capture.url, decoded.encoding);
        }

        let source = Document::parse_bounded(&decoded.text).map_err(|skip| {
            debug!("{}: markup nested too deeply", capture.url);
            skip
        })?;
        budget.check()?;
        let html = minify_document(&source, budget)?;
        Ok(Minified {
            page: MinifiedPage {
                url: capture.url.clone(),
                ip_address: capture.ip_address.clone(),
                lang: declared_lang(&source),
                html,
            },
            decode_fallback: decoded.fallback,
        })
    }
}

fn is_html_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml" || mime.is_empty()
}

/// `lang` attribute of the `<html>` element.
fn declared_lang(doc: &Document) -> Option<String> {
    doc.descendants(doc.root())
        .filter_map(|id| doc.get(id).element())
        .find(|e| e.name == "html")
        .and_then(|e| e.attr("lang"))
        .map(str::trim)
        .filter(|lang| !lang.is_empty())
        .map(str::to_string)
}

/// Minify an HTML string.
///
/// Fails with [Skip::Empty] when no text survives, and with [Skip::TooLarge]
/// on markup nested too deeply to be parsed in reasonable time.
/// The output is stable: minifying it again yields the same string.
pub fn minify_html(html: &str, budget: &Budget) -> Result<String, Skip> {
    let source = Document::parse_bounded(html)?;
    budget.check()?;
    minify_document(&source, budget)
}

/// Minify a parsed document, then its output, until a round changes nothing.
fn minify_document(source: &Document, budget: &Budget) -> Result<String, Skip> {
    let mut html = minify_once(source, budget)?;
    for _ in 1..MAX_ROUNDS {
        let reparsed = Document::parse_bounded(&html)?;
        budget.check()?;
        let again = minify_once(&reparsed, budget)?;
        if again == html {
            return Ok(html);
        }
        html = again;
    }
    debug!("minified markup still changing after {} rounds", MAX_ROUNDS);
    Ok(html)
}

fn minify_once(source: &Document, budget: &Budget) -> Result<String, Skip> {
    let has_text = mark_text(source, budget)?;
    if !has_text[source.root().index()] {
        return Err(Skip::Empty);
    }
    let mut clean = rebuild(source, &has_text, budget)?;
    trim_whitespace(&mut clean);
    collapse_breaks(&mut clean);
    Ok(clean.to_html())
}

/// Whether an element holds a microdata value in its `content` attribute.
fn has_content_value(e: &Element) -> bool {
    e.attr("itemprop").is_some() && e.attr("content").map_or(false, |c| !c.trim().is_empty())
}

/// Dropped elements, except `<meta itemprop content>`.
fn is_dropped(e: &Element) -> bool {
    DROPPED.contains(&e.name.as_str()) && !(e.name == "meta" && has_content_value(e))
}

/// For each node, whether its subtree holds non-whitespace text that will be kept.
fn mark_text(doc: &Document, budget: &Budget) -> Result<Vec<bool>, Skip> {
    let mut has_text = vec![false; doc.len()];
    for edge in doc.traverse(doc.root()) {
        if let Edge::Close(id) = edge {
            budget.check()?;
            let node = doc.get(id);
            has_text[id.index()] = match &node.data {
                NodeData::Text(t) => t.chars().any(|c| !c.is_whitespace()),
                NodeData::Element(e) if is_dropped(e) => false,
                NodeData::Element(e) if has_content_value(e) => true,
                _ => doc.children(id).any(|c| has_text[c.index()]),
            };
        }
    }
    Ok(has_text)
}

/// Keep the allowed attributes of a kept element.
fn clean_element(source: &Element) -> Element {
    let mut element = Element::new(&source.name);
    for (k, v) in &source.attrs {
        let keep = match k.as_str() {
            "href" => source.name == "a" && !v.trim_start().starts_with("javascript:"),
            "colspan" | "rowspan" => source.name == "td" || source.name == "th",
            other => MICRODATA_ATTRS.contains(&other),
        };
        if keep {
            element.attrs.push((k.clone(), v.clone()));
        }
    }
    // source attribute order is not guaranteed by the parser
    element.attrs.sort();
    element
}

/// Collapse whitespace runs to one space, keeping a leading/trailing one.
fn collapse(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !previous_space {
                out.push(' ');
            }
            previous_space = true;
        } else {
            out.push(c);
            previous_space = false;
        }
    }
    out
}

fn rebuild(source: &Document, has_text: &[bool], budget: &Budget) -> Result<Document, Skip> {
    let mut clean = Document::new();
    let mut parents: Vec<NodeId> = vec![clean.root()];
    let mut skipping: Option<NodeId> = None;

    for edge in source.traverse(source.root()) {
        match (edge, skipping) {
            (Edge::Close(id), Some(skipped)) if id == skipped => skipping = None,
            (_, Some(_)) => (),
            (Edge::Open(id), None) => {
                budget.check()?;
                let top = *parents.last().unwrap_or(&clean.root());
                match &source.get(id).data {
                    NodeData::Root => (),
                    NodeData::Text(t) => {
                        clean.append_text(top, &collapse(t));
                    }
                    NodeData::Element(e) => {
                        let name = e.name.as_str();
                        if name == "br" {
                            // runs are collapsed later, once whitespace is gone
                            clean.append(top, NodeData::Element(Element::new("br")));
                            skipping = Some(id);
                        } else if is_dropped(e) || !has_text[id.index()] {
                            skipping = Some(id);
                        } else if KEPT.contains(&name) || has_content_value(e) {
                            let kept = clean.append(top, NodeData::Element(clean_element(e)));
                            parents.push(kept);
                        } else {
                            parents.push(top);
                        }
                    }
                }
            }
            (Edge::Close(id), None) => {
                if source.get(id).element().is_some() {
                    parents.pop();
                }
            }
        }
    }
    Ok(clean)
}

/// Whether a node acts as a line boundary for whitespace purposes.
fn is_boundary(doc: &Document, id: NodeId) -> bool {
    match &doc.get(id).data {
        NodeData::Root => true,
        NodeData::Element(e) => e.name == "br" || is_block(&e.name),
        NodeData::Text(_) => false,
    }
}

/// Whether the start (or end) of `id` touches a line boundary.
fn touches_boundary(doc: &Document, id: NodeId, start: bool) -> bool {
    let neighbour = if start {
        doc.prev_sibling(id)
    } else {
        doc.next_sibling(id)
    };
    match neighbour {
        Some(n) => is_boundary(doc, n),
        None => doc.parent(id).map_or(true, |p| is_boundary(doc, p)),
    }
}

fn trim_whitespace(doc: &mut Document) {
    let texts: Vec<NodeId> = doc
        .descendants(doc.root())
        .filter(|id| doc.get(*id).text().is_some())
        .collect();

    for id in texts {
        let trim_start = touches_boundary(doc, id, true);
        let trim_end = touches_boundary(doc, id, false);
        let now_empty = match doc.text_mut(id) {
            Some(text) => {
                if trim_end {
                    text.truncate(text.trim_end_matches(' ').len());
                }
                if trim_start {
                    let leading = text.len() - text.trim_start_matches(' ').len();
                    text.drain(..leading);
                }
                text.is_empty()
            }
            None => false,
        };
        if now_empty {
            doc.detach(id);
        }
    }
}

/// Remove `<br>` that are redundant: repeated or next to a line boundary.
fn collapse_breaks(doc: &mut Document) {
    loop {
        let breaks: Vec<NodeId> = doc
            .descendants(doc.root())
            .filter(|id| doc.get(*id).name() == Some("br"))
            .collect();

        let mut changed = false;
        for id in breaks {
            if touches_boundary(doc, id, true) || touches_boundary(doc, id, false) {
                doc.detach(id);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}
