//! Structural question/answer extraction.
//!
//! Pairs come from two sources, in that order:
//! 1. schema.org `Question` microdata,
//! 2. the block sequence: question blocks paired with a following answer block,
//!    and inline `<strong>Question?</strong> answer` leads.
pub mod blocks;
pub mod microdata;
pub mod patterns;

use std::collections::HashSet;

use itertools::Itertools;
use log::{debug, warn};

use crate::budget::Budget;
use crate::dom::Document;
use crate::error::Skip;
use crate::identifiers::Identify;
use crate::types::{MinifiedPage, QaPair, QaRecord, UNKNOWN_LANGUAGE};

use self::blocks::{Block, BlockKind};
pub use self::patterns::is_question;

/// Max number of blocks scanned after a question for its answer.
pub const LOOKAHEAD: usize = 4;
/// Minimum identifier confidence for a language to be recorded.
pub const LANGUAGE_THRESHOLD: f32 = 0.6;
/// Max context length, in chars.
pub const MAX_CONTEXT_CHARS: usize = 200;

/// Last non-question heading of each rank, as seen before a given block.
#[derive(Debug, Clone, Copy, Default)]
struct Outline {
    last: [Option<usize>; 7],
}

impl Outline {
    fn update(&mut self, index: usize, rank: u8) {
        let rank = rank as usize;
        self.last[rank] = Some(index);
        for lower in self.last.iter_mut().skip(rank + 1) {
            *lower = None;
        }
    }

    /// Nearest heading of rank strictly higher (lower number) than `rank`.
    fn above(&self, rank: u8) -> Option<usize> {
        self.last[1..rank as usize].iter().flatten().max().copied()
    }
}

pub struct Extractor {
    lookahead: usize,
    language_threshold: f32,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            lookahead: LOOKAHEAD,
            language_threshold: LANGUAGE_THRESHOLD,
        }
    }
}

impl Extractor {
    pub fn new(lookahead: usize, language_threshold: f32) -> Self {
        Self {
            lookahead,
            language_threshold,
        }
    }

    /// Extract a [QaRecord] from a minified page.
    ///
    /// Pages without candidates still get a record, with no pairs.
    pub fn extract(
        &self,
        page: &MinifiedPage,
        identifier: &dyn Identify,
        budget: &Budget,
    ) -> Result<QaRecord, Skip> {
        let doc = Document::parse_bounded(&page.html)?;
        budget.check()?;
        let pairs = self.pairs(&doc, budget)?;
        let language = if pairs.is_empty() {
            UNKNOWN_LANGUAGE.to_string()
        } else {
            self.language(&page.url, &pairs, identifier)
        };
        budget.check()?;
        debug!("{}: {} pairs ({})", page.url, pairs.len(), language);

        Ok(QaRecord {
            url: page.url.clone(),
            language,
            declared_language: page.lang.clone(),
            qa_pairs: pairs,
        })
    }

    /// Extract question/answer pairs from a document.
    pub fn pairs(&self, doc: &Document, budget: &Budget) -> Result<Vec<QaPair>, Skip> {
        let blocks = blocks::blocks(doc, budget)?;
        let outlines = outlines(&blocks);
        let mut pairs = Pairs::default();

        // microdata first, its blocks are not re-used
        let mut used = vec![false; blocks.len()];
        for item in microdata::questions(doc) {
            budget.check()?;
            let inside: Vec<usize> = (0..blocks.len())
                .filter(|i| doc.is_ancestor(item.node, blocks[*i].node))
                .collect();
            for i in &inside {
                used[*i] = true;
            }
            if !is_question(&item.question, true) {
                continue;
            }
            let context = inside
                .first()
                .and_then(|i| context(&blocks, &outlines, *i));
            for answer in item.answers {
                pairs.push(QaPair::new(item.question.clone(), answer, context.clone()));
            }
        }

        for i in 0..blocks.len() {
            budget.check()?;
            if used[i] {
                continue;
            }
            let block = &blocks[i];

            if is_question(&block.text, block.is_cue()) {
                if let Some(j) = self.answer(doc, &blocks, &used, i) {
                    used[i] = true;
                    used[j] = true;
                    pairs.push(QaPair::new(
                        block.text.clone(),
                        blocks[j].text.clone(),
                        context(&blocks, &outlines, i),
                    ));
                }
            } else if let Some(lead) = &block.lead {
                if !block.rest.is_empty() && is_question(lead, true) {
                    used[i] = true;
                    pairs.push(QaPair::new(
                        lead.clone(),
                        block.rest.clone(),
                        context(&blocks, &outlines, i),
                    ));
                }
            }
        }

        Ok(pairs.into_inner())
    }

    /// Index of the answer block for question block `q`.
    fn answer(&self, doc: &Document, blocks: &[Block], used: &[bool], q: usize) -> Option<usize> {
        let question = &blocks[q];

        // <details><summary>Q?</summary>A</details>: the answer is the own text of details
        if question.kind == BlockKind::Summary {
            let details = doc.parent(question.node)?;
            if let Some(d) = blocks[..q].iter().rposition(|b| b.node == details) {
                if !used[d] {
                    return Some(d);
                }
            }
        }

        for j in (q + 1..blocks.len()).take(self.lookahead) {
            let candidate = &blocks[j];
            if candidate.depth < question.depth {
                break;
            }
            if let Some(rank) = candidate.kind.rank() {
                match question.kind.rank() {
                    Some(q_rank) if rank > q_rank => continue,
                    _ => break,
                }
            }
            if is_question(&candidate.text, candidate.is_cue()) {
                if candidate.depth <= question.depth {
                    break;
                }
                continue;
            }
            if used[j] {
                continue;
            }
            return Some(j);
        }
        None
    }

    /// Language of the extracted text, or "unknown".
    fn language(&self, url: &str, pairs: &[QaPair], identifier: &dyn Identify) -> String {
        let text = pairs
            .iter()
            .flat_map(|p| [p.question.as_str(), p.answer.as_str()])
            .join(" ");

        match identifier.identify(&text) {
            Ok(Some(id)) if *id.prob() >= self.language_threshold => id.label().to_string(),
            Ok(_) => UNKNOWN_LANGUAGE.to_string(),
            Err(e) => {
                warn!("{url}: language identification failed: {e}");
                UNKNOWN_LANGUAGE.to_string()
            }
        }
    }
}

/// Outline snapshot taken before each block.
fn outlines(blocks: &[Block]) -> Vec<Outline> {
    let mut current = Outline::default();
    blocks
        .iter()
        .enumerate()
        .map(|(i, block)| {
            let snapshot = current;
            if let Some(rank) = block.kind.rank() {
                if !is_question(&block.text, true) {
                    current.update(i, rank);
                }
            }
            snapshot
        })
        .collect()
}

/// Context of block `i`: the nearest enclosing section heading.
fn context(blocks: &[Block], outlines: &[Outline], i: usize) -> Option<String> {
    let rank = blocks[i].kind.rank().unwrap_or(7);
    let heading = outlines[i].above(rank)?;
    Some(blocks[heading].text.chars().take(MAX_CONTEXT_CHARS).collect())
}

/// Pairs of a page, without duplicates.
#[derive(Default)]
struct Pairs {
    seen: HashSet<QaPair>,
    pairs: Vec<QaPair>,
}

impl Pairs {
    fn push(&mut self, pair: QaPair) {
        let pair = pair.normalized();
        if pair.question.is_empty() || pair.answer.is_empty() {
            return;
        }
        if self.seen.insert(pair.clone()) {
            self.pairs.push(pair);
        }
    }

    fn into_inner(self) -> Vec<QaPair> {
        self.pairs
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use oxilangtag::LanguageTag;

    use super::*;
    use crate::error::Error;
    use crate::identifiers::Identification;

    /// Identifier answering a fixed language, recording its inputs.
    struct Fixed {
        lang: &'static str,
        prob: f32,
        calls: AtomicUsize,
        last: Mutex<String>,
    }

    impl Fixed {
        fn new(lang: &'static str, prob: f32) -> Self {
            Self {
                lang,
                prob,
                calls: AtomicUsize::new(0),
                last: Mutex::new(String::new()),
            }
        }
    }

    impl Identify for Fixed {
        fn identify(&self, text: &str) -> Result<Option<Identification>, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = text.to_string();
            let tag = LanguageTag::parse_and_normalize(self.lang)?;
            Ok(Some(Identification::new(tag, self.prob)))
        }
    }

    struct Failing;
    impl Identify for Failing {
        fn identify(&self, _: &str) -> Result<Option<Identification>, Error> {
            Err(Error::FastText("boom".to_string()))
        }
    }

    fn page(html: &str) -> MinifiedPage {
        MinifiedPage::new("http://a.example/p".to_string(), html.to_string())
    }

    fn extract(html: &str) -> Vec<(String, String, Option<String>)> {
        let ex = Extractor::default();
        ex.extract(&page(html), &Fixed::new("en", 0.9), &Budget::unlimited())
            .unwrap()
            .qa_pairs
            .into_iter()
            .map(|p| (p.question, p.answer, p.context))
            .collect()
    }

    fn qa(q: &str, a: &str) -> (String, String, Option<String>) {
        (q.to_string(), a.to_string(), None)
    }

    #[test]
    fn heading_question() {
        let id = Fixed::new("en", 0.9);
        let record = Extractor::default()
            .extract(
                &page("<h2>What is X?</h2>\n<p>X is Y.</p>"),
                &id,
                &Budget::unlimited(),
            )
            .unwrap();
        assert_eq!(record.url, "http://a.example/p");
        assert_eq!(record.language, "en");
        assert_eq!(
            record.qa_pairs,
            vec![QaPair::new("What is X?".into(), "X is Y.".into(), None)]
        );
        assert_eq!(*id.last.lock().unwrap(), "What is X? X is Y.");
    }

    #[test]
    fn declared_language_is_kept_next_to_identified_one() {
        let mut p = page("<h2>Was ist X?</h2><p>X ist Y.</p>");
        p.lang = Some("de-DE".to_string());
        let record = Extractor::default()
            .extract(&p, &Fixed::new("de", 0.9), &Budget::unlimited())
            .unwrap();
        assert_eq!(record.language, "de");
        assert_eq!(record.declared_language.as_deref(), Some("de-DE"));
    }

    #[test]
    fn microdata_content_attributes() {
        let html = r#"<div itemscope="" itemtype="https://schema.org/Question"><meta content="What is the meta question?" itemprop="name">
<div itemprop="acceptedAnswer" itemscope="" itemtype="https://schema.org/Answer"><meta content="Meta answer." itemprop="text"></div>
</div>"#;
        assert_eq!(extract(html), vec![qa("What is the meta question?", "Meta answer.")]);
    }

    #[test]
    fn no_candidates() {
        let id = Fixed::new("en", 0.9);
        let record = Extractor::default()
            .extract(
                &page("<h2>About us</h2><p>We sell things.</p>"),
                &id,
                &Budget::unlimited(),
            )
            .unwrap();
        assert!(record.qa_pairs.is_empty());
        assert_eq!(record.language, UNKNOWN_LANGUAGE);
        assert_eq!(id.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn low_confidence_is_unknown() {
        let record = Extractor::default()
            .extract(
                &page("<h2>What is X?</h2><p>X is Y.</p>"),
                &Fixed::new("fr", 0.3),
                &Budget::unlimited(),
            )
            .unwrap();
        assert_eq!(record.language, UNKNOWN_LANGUAGE);
        assert_eq!(record.qa_pairs.len(), 1);
    }

    #[test]
    fn identifier_error_is_unknown() {
        let record = Extractor::default()
            .extract(
                &page("<h2>What is X?</h2><p>X is Y.</p>"),
                &Failing,
                &Budget::unlimited(),
            )
            .unwrap();
        assert_eq!(record.language, UNKNOWN_LANGUAGE);
    }

    #[test]
    fn definition_lists_and_tables() {
        assert_eq!(
            extract("<dl><dt>Why?</dt><dd>Because.</dd><dt>How</dt><dd>Like so.</dd></dl>"),
            vec![qa("Why?", "Because."), qa("How", "Like so.")]
        );
        assert_eq!(
            extract("<table><tr><td>How much?</td><td>Ten.</td></tr><tr><td>Where?</td><td>Here.</td></tr></table>"),
            vec![qa("How much?", "Ten."), qa("Where?", "Here.")]
        );
    }

    #[test]
    fn inline_leads() {
        assert_eq!(
            extract("<p><strong>How?</strong> Because.</p><p><b>Note</b> nothing.</p>"),
            vec![qa("How?", "Because.")]
        );
    }

    #[test]
    fn details_summary() {
        assert_eq!(
            extract("<details><summary>Why?</summary>Because.</details>"),
            vec![qa("Why?", "Because.")]
        );
    }

    #[test]
    fn nested_answer() {
        assert_eq!(
            extract("<div><h3>Can I pay later?</h3><div><p>Yes, within 30 days.</p></div></div>"),
            vec![qa("Can I pay later?", "Yes, within 30 days.")]
        );
    }

    #[test]
    fn unpaired_questions_are_discarded() {
        // followed by another question
        assert!(extract("<h3>Why?</h3><h3>How?</h3>").is_empty());
        // answer too far
        let far = extract(
            "<div><p>Why?</p><div><p>One?</p><p>Two?</p><p>Three?</p><p>Four?</p><p>Answer.</p></div></div>",
        );
        assert_eq!(far, vec![qa("Four?", "Answer.")]);
        // answer outside the question container
        assert!(extract("<div><p>Why?</p></div><p>Unrelated.</p>").is_empty());
        // section ends
        assert!(extract("<h2>What now?</h2><h2>Next section</h2><p>Text.</p>").is_empty());
    }

    #[test]
    fn context_from_section_heading() {
        let pairs = extract("<h1>Shipping FAQ</h1><h3>How long?</h3><p>Two days.</p><p><b>Cost?</b> Free.</p>");
        assert_eq!(
            pairs,
            vec![
                (
                    "How long?".to_string(),
                    "Two days.".to_string(),
                    Some("Shipping FAQ".to_string())
                ),
                (
                    "Cost?".to_string(),
                    "Free.".to_string(),
                    Some("Shipping FAQ".to_string())
                ),
            ]
        );

        let long = "A".repeat(400);
        let pairs = extract(&format!("<h1>{long}</h1><h2>Why?</h2><p>Because.</p>"));
        assert_eq!(pairs[0].2.as_ref().map(|c| c.chars().count()), Some(200));
    }

    #[test]
    fn microdata_pairs_first() {
        let html = r#"<h2>Is it free?</h2><p>Yes.</p>
        <div itemscope itemtype="https://schema.org/Question">
          <h3 itemprop="name">What is X?</h3>
          <div itemprop="acceptedAnswer" itemscope itemtype="https://schema.org/Answer">
            <p itemprop="text">X is Y.</p>
          </div>
        </div>"#;
        assert_eq!(
            extract(html),
            vec![qa("What is X?", "X is Y."), qa("Is it free?", "Yes.")]
        );
    }

    #[test]
    fn duplicates_within_page() {
        assert_eq!(
            extract("<h3>Why?</h3><p>Because.</p><h3>Why?</h3><p>Because.</p>"),
            vec![qa("Why?", "Because.")]
        );
    }

    #[test]
    fn every_question_is_accepted() {
        let html = "<h1>FAQ</h1><h2>Returns</h2><p>Is this a question</p><p>No.</p>\
                    <dl><dt>When do you ship</dt><dd>Daily.</dd></dl>\
                    <p><i>Where?</i> Paris.</p><ul><li>Who?</li><li>Us.</li></ul>";
        for (q, _, _) in extract(html) {
            assert!(is_question(&q, true), "{q}");
        }
    }

    #[test]
    fn timeout() {
        let res = Extractor::default().extract(
            &page("<h2>What is X?</h2><p>X is Y.</p>"),
            &Fixed::new("en", 0.9),
            &Budget::new(Some(std::time::Duration::ZERO)),
        );
        assert_eq!(res, Err(Skip::Timeout));
    }
}
