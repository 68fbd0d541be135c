//! Lexical question acceptance.
use lazy_static::lazy_static;
use regex::Regex;

pub const MIN_QUESTION_CHARS: usize = 3;
pub const MAX_QUESTION_CHARS: usize = 300;

lazy_static! {
    /// Question words and auxiliaries that start a question in
    /// en, fr, de, es, pt, it and nl.
    static ref INTERROGATIVE_RE: Regex = Regex::new(
        r"(?ix)^[¿¡]?(
            what|why|how|when|where|which|who|whom|whose
            |is|are|can|could|do|does|did|should|will|would|may|has|have
            |qu'est-ce|est-ce|pourquoi|comment|quand|quel|quelle|quels|quelles|qui|quoi|combien|où
            |was|warum|wieso|weshalb|wie|wann|wo|woher|wohin|welche|welcher|welches|wer|kann|gibt
            |qué|que|por\s+qué|cómo|cuándo|dónde|cuál|cuáles|quién|quiénes|cuánto|cuánta
            |o\s+que|por\s+que|como|quando|onde|qual|quais|quem|quanto
            |cosa|perché|come|dove|quale|quali|chi|quanto
            |wat|waarom|hoe|wanneer|waar|welke|wie|kan|kunnen
        )\b"
    )
    .unwrap();

    /// Openings that are as common in statements as in questions: words shared with
    /// another language ("come", "como", "que") and wh-clauses without inversion
    /// ("how it works", "who we are"). These need a question mark.
    static ref STATEMENT_RE: Regex = Regex::new(
        r"(?ix)^[¿¡]?(
            come|como|que
            |(how|what|who|where|when|why|which)\s+(i|we|you|it|they|he|she|our|your|their|us)
        )\b"
    )
    .unwrap();
}

/// Question marks, including full-width and Arabic ones.
const QUESTION_MARKS: &[char] = &['?', '？', '؟'];

/// Punctuation allowed after the final question mark.
const CLOSING: &[char] = &[')', ']', '}', '"', '\'', '»', '”', '’', '」', '』', '*'];

/// Whether the text ends with a question mark, ignoring closing punctuation.
pub fn ends_with_question_mark(text: &str) -> bool {
    text.trim_end_matches(|c: char| c.is_whitespace() || CLOSING.contains(&c))
        .ends_with(QUESTION_MARKS)
}

/// Whether the text starts with a known interrogative word.
///
/// Openings that often start statements as well are not counted.
pub fn starts_with_interrogative(text: &str) -> bool {
    let text = text.trim_start();
    INTERROGATIVE_RE.is_match(text) && !STATEMENT_RE.is_match(text)
}

/// Question acceptance.
///
/// Interrogative words are only trusted on cue blocks (headings, terms, emphasized leads...),
/// anything else has to end with a question mark.
/// This favors precision: an Italian "Come funziona" heading without
/// question mark is not a question here.
pub fn is_question(text: &str, cue: bool) -> bool {
    let text = text.trim();
    let len = text.chars().count();
    if !(MIN_QUESTION_CHARS..=MAX_QUESTION_CHARS).contains(&len) {
        return false;
    }
    ends_with_question_mark(text) || (cue && starts_with_interrogative(text))
}
