//! schema.org `Question` microdata.
//!
//! ```html
//! <div itemscope itemtype="https://schema.org/Question">
//!   <h3 itemprop="name">What is X?</h3>
//!   <div itemprop="acceptedAnswer" itemscope itemtype="https://schema.org/Answer">
//!     <div itemprop="text">X is Y.</div>
//!   </div>
//! </div>
//! ```
use crate::dom::{Document, NodeId};
use crate::types::normalize_whitespace;

const QUESTION_TYPE: &str = "schema.org/question";
const ANSWER_PROPS: &[&str] = &["acceptedAnswer", "suggestedAnswer"];

/// A microdata question and its answers, prior to any filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicrodataQuestion {
    /// the element carrying `itemscope`
    pub node: NodeId,
    pub question: String,
    pub answers: Vec<String>,
}

fn has_itemscope(doc: &Document, id: NodeId) -> bool {
    doc.get(id)
        .element()
        .map_or(false, |e| e.attr("itemscope").is_some())
}

/// Properties of an item: (property name, element) pairs.
///
/// Nested items are reported with their property but not descended into.
fn properties(doc: &Document, item: NodeId) -> Vec<(String, NodeId)> {
    let mut props = Vec::new();
    let mut stack: Vec<NodeId> = doc.children(item).collect();
    stack.reverse();

    while let Some(id) = stack.pop() {
        let element = match doc.get(id).element() {
            Some(e) => e,
            None => continue,
        };
        if let Some(names) = element.attr("itemprop") {
            for name in names.split_whitespace() {
                props.push((name.to_string(), id));
            }
        }
        if !has_itemscope(doc, id) {
            let mut children: Vec<NodeId> = doc.children(id).collect();
            children.reverse();
            stack.extend(children);
        }
    }
    props
}

/// Value of a property element: its `content` attribute or its text.
fn value(doc: &Document, id: NodeId) -> String {
    match doc.get(id).element().and_then(|e| e.attr("content")) {
        Some(content) => normalize_whitespace(content),
        None => doc.text_content(id),
    }
}

fn first_value(doc: &Document, props: &[(String, NodeId)], name: &str) -> Option<String> {
    props
        .iter()
        .filter(|(prop, _)| prop == name)
        .map(|(_, id)| value(doc, *id))
        .find(|v| !v.is_empty())
}

/// Find every `Question` item in the document.
pub fn questions(doc: &Document) -> Vec<MicrodataQuestion> {
    let items = doc.descendants(doc.root()).filter(|id| {
        doc.get(*id).element().map_or(false, |e| {
            e.attr("itemscope").is_some()
                && e.attr("itemtype")
                    .map_or(false, |t| t.to_lowercase().contains(QUESTION_TYPE))
        })
    });

    items
        .filter_map(|item| {
            let props = properties(doc, item);
            let question =
                first_value(doc, &props, "name").or_else(|| first_value(doc, &props, "text"))?;

            let answers = props
                .iter()
                .filter(|(prop, _)| ANSWER_PROPS.contains(&prop.as_str()))
                .filter_map(|(_, answer)| {
                    let text = if has_itemscope(doc, *answer) {
                        first_value(doc, &properties(doc, *answer), "text")
                    } else {
                        Some(value(doc, *answer))
                    };
                    text.filter(|t| !t.is_empty())
                })
                .collect();

            Some(MicrodataQuestion {
                node: item,
                question,
                answers,
            })
        })
        .collect()
}
