use std::path::Path;
use std::sync::Mutex;

use ccqa::error::Error;
use ccqa::identifiers::{Identification, Identify};
use ccqa::io::JsonlReader;
use ccqa::pipelines::{
    AggregatePipeline, ExtractPipeline, FullPipeline, MinifyPipeline, Pipeline, PipelineConfig,
    CORPUS_FILE, MINIFIED_FILE, QA_FILE,
};
use ccqa::sources::archive::warc_response;
use ccqa::types::{AggregatedRecord, MinifiedPage, QaRecord};
use oxilangtag::LanguageTag;
use serde::de::DeserializeOwned;

/// Always answers `en`, and remembers what it was asked.
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<String>>,
}

impl Identify for Recorder {
    fn identify(&self, text: &str) -> Result<Option<Identification>, Error> {
        self.seen.lock().unwrap().push(text.to_string());
        Ok(Some(Identification::new(
            LanguageTag::parse("en".to_string())?,
            0.95,
        )))
    }
}

fn html(body: &str) -> String {
    format!("HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\n\r\n{body}")
}

fn read<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    JsonlReader::from_path(path)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}

fn config() -> PipelineConfig {
    PipelineConfig {
        workers: 2,
        queue_depth: 8,
        ..Default::default()
    }
}

#[test_log::test]
fn heading_question_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("in.warc");
    let dst = dir.path().join("out");
    std::fs::write(
        &src,
        warc_response(
            "http://a.example/faq",
            &html("<html><body><h2>What is X?</h2><p>X is Y.</p></body></html>"),
        ),
    )
    .unwrap();

    let identifier = Recorder::default();
    let stats = FullPipeline::new(src, dst.clone(), "unused".into(), config())
        .run_with(&identifier)
        .unwrap();

    let pages: Vec<MinifiedPage> = read(&dst.join(MINIFIED_FILE));
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].html, "<h2>What is X?</h2>\n<p>X is Y.</p>");

    let records: Vec<QaRecord> = read(&dst.join(QA_FILE));
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].language, "en");
    assert_eq!(records[0].qa_pairs.len(), 1);
    assert_eq!(records[0].qa_pairs[0].question, "What is X?");
    assert_eq!(records[0].qa_pairs[0].answer, "X is Y.");
    assert_eq!(
        *identifier.seen.lock().unwrap(),
        vec!["What is X? X is Y.".to_string()]
    );

    let corpus: Vec<AggregatedRecord> = read(&dst.join(CORPUS_FILE));
    assert_eq!(corpus.len(), 1);
    assert_eq!(corpus[0].url, "http://a.example/faq");

    assert_eq!(stats.minified, 1);
    assert_eq!(stats.records_with_pairs, 1);
    assert_eq!(stats.aggregate.unwrap().urls, 1);
}

#[test_log::test]
fn captures_of_a_same_url_are_merged() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("in.warc");
    let dst = dir.path().join("out");
    let archive = [
        warc_response(
            "http://a.example/p",
            &html("<h2>What is X?</h2><p>X is Y.</p>"),
        ),
        warc_response(
            "http://a.example/p",
            &html("<h2>What  is\n X?</h2><p>X is   Y.</p><h2>Why?</h2><p>Because.</p>"),
        ),
    ]
    .concat();
    std::fs::write(&src, archive).unwrap();

    FullPipeline::new(src, dst.clone(), "unused".into(), config())
        .run_with(&Recorder::default())
        .unwrap();

    let corpus: Vec<AggregatedRecord> = read(&dst.join(CORPUS_FILE));
    assert_eq!(corpus.len(), 1);
    let pairs: Vec<_> = corpus[0]
        .qa_pairs
        .iter()
        .map(|p| (p.question.as_str(), p.answer.as_str()))
        .collect();
    assert_eq!(pairs, vec![("What is X?", "X is Y."), ("Why?", "Because.")]);
}

#[test]
fn whitespace_variants_merge_in_aggregate_stage() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("qa.jsonl");
    let dst = dir.path().join("corpus.jsonl");
    std::fs::write(
        &src,
        concat!(
            r#"{"url":"http://a.example/p","language":"en","qa_pairs":[{"question":"What is X?","answer":"X is Y."}]}"#,
            "\n",
            r#"{"url":"http://a.example/p","language":"en","qa_pairs":[{"question":"What  is X?","answer":"X is\tY. "},{"question":"Why?","answer":"Because."}]}"#,
            "\n",
        ),
    )
    .unwrap();

    let stats = AggregatePipeline::new(src, dst.clone(), config())
        .run()
        .unwrap();
    let corpus: Vec<AggregatedRecord> = read(&dst);
    assert_eq!(corpus.len(), 1);
    assert_eq!(corpus[0].qa_pairs.len(), 2);
    assert_eq!(stats.aggregate.unwrap().duplicate_pairs, 1);
}

#[test]
fn bogus_charset_still_produces_a_page() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("in.warc");
    let dst = dir.path().join("min.jsonl");
    std::fs::write(
        &src,
        warc_response(
            "http://bogus.example/",
            "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=x-no-such-charset\r\n\r\n<p>Still readable.</p>",
        ),
    )
    .unwrap();

    let stats = MinifyPipeline::new(src, dst.clone(), config())
        .run()
        .unwrap();
    let pages: Vec<MinifiedPage> = read(&dst);
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].html, "<p>Still readable.</p>");
    assert_eq!(stats.decode_fallbacks, 1);
}

#[test]
fn pages_without_candidates_are_not_in_the_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("in.warc");
    let dst = dir.path().join("out");
    let archive = [
        warc_response(
            "http://plain.example/",
            &html("<h1>About us</h1><p>We sell things.</p>"),
        ),
        warc_response(
            "http://faq.example/",
            &html("<dl><dt>How do I pay?</dt><dd>By card.</dd></dl>"),
        ),
    ]
    .concat();
    std::fs::write(&src, archive).unwrap();

    let identifier = Recorder::default();
    FullPipeline::new(src, dst.clone(), "unused".into(), config())
        .run_with(&identifier)
        .unwrap();

    let records: Vec<QaRecord> = read(&dst.join(QA_FILE));
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].url, "http://plain.example/");
    assert!(records[0].qa_pairs.is_empty());
    assert_eq!(records[0].language, "unknown");
    // only the page with pairs was identified
    assert_eq!(identifier.seen.lock().unwrap().len(), 1);

    let corpus: Vec<AggregatedRecord> = read(&dst.join(CORPUS_FILE));
    let urls: Vec<_> = corpus.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(urls, vec!["http://faq.example/"]);
}

#[test]
fn corrupt_entry_does_not_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("in.warc");
    let dst = dir.path().join("out");
    let archive = [
        warc_response("http://a.example/", &html("<h3>Who?</h3><p>Me.</p>")),
        warc_response("http://broken.example/", "garbage without status line"),
        warc_response("http://b.example/", &html("<h3>When?</h3><p>Now.</p>")),
    ]
    .concat();
    std::fs::write(&src, archive).unwrap();

    let stats = FullPipeline::new(src, dst.clone(), "unused".into(), config())
        .run_with(&Recorder::default())
        .unwrap();
    let corpus: Vec<AggregatedRecord> = read(&dst.join(CORPUS_FILE));
    let urls: Vec<_> = corpus.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(urls, vec!["http://a.example/", "http://b.example/"]);
    assert_eq!(stats.skipped.corrupt, 1);
}

#[test]
fn not_an_archive_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("in.warc");
    std::fs::write(&src, "<html>not a warc</html>").unwrap();

    let res = MinifyPipeline::new(src, dir.path().join("min.jsonl"), config()).run();
    assert!(matches!(res, Err(Error::FatalInput(_))));
}

#[test]
fn stages_match_the_chained_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("in.warc");
    let archive: String = (0..30)
        .map(|i| {
            warc_response(
                &format!("http://{}.example/", i % 7),
                &html(&format!(
                    "<h2>What is item {}?</h2><p>Item {} is fine.</p><h2>Why?</h2><p>Because {}.</p>",
                    i % 5,
                    i % 5,
                    i % 2
                )),
            )
        })
        .collect();
    std::fs::write(&src, archive).unwrap();

    let full = dir.path().join("full");
    FullPipeline::new(src.clone(), full.clone(), "unused".into(), config())
        .run_with(&Recorder::default())
        .unwrap();

    let minified = dir.path().join("minified.jsonl");
    let qa = dir.path().join("qa.jsonl");
    let corpus = dir.path().join("corpus.jsonl");
    MinifyPipeline::new(src, minified.clone(), config())
        .run()
        .unwrap();
    ExtractPipeline::new(minified.clone(), qa.clone(), "unused".into(), config())
        .run_with(&Recorder::default())
        .unwrap();
    let sharded = PipelineConfig {
        shards: 3,
        ..config()
    };
    AggregatePipeline::new(qa.clone(), corpus.clone(), sharded)
        .run()
        .unwrap();

    assert_eq!(
        read::<MinifiedPage>(&minified),
        read::<MinifiedPage>(&full.join(MINIFIED_FILE))
    );
    assert_eq!(
        read::<QaRecord>(&qa),
        read::<QaRecord>(&full.join(QA_FILE))
    );
    let staged: Vec<AggregatedRecord> = read(&corpus);
    assert_eq!(staged, read::<AggregatedRecord>(&full.join(CORPUS_FILE)));
    assert_eq!(staged.len(), 7);
}

#[test]
fn microdata_in_meta_content_reaches_the_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("in.warc");
    let dst = dir.path().join("out");
    std::fs::write(
        &src,
        warc_response(
            "http://meta.example/",
            &html(concat!(
                r#"<html lang="en"><body><div itemscope itemtype="https://schema.org/Question">"#,
                r#"<meta itemprop="name" content="What is the meta question?">"#,
                r#"<div itemprop="acceptedAnswer" itemscope itemtype="https://schema.org/Answer">"#,
                r#"<meta itemprop="text" content="Meta answer."></div></div></body></html>"#,
            )),
        ),
    )
    .unwrap();

    FullPipeline::new(src, dst.clone(), "unused".into(), config())
        .run_with(&Recorder::default())
        .unwrap();

    let pages: Vec<MinifiedPage> = read(&dst.join(MINIFIED_FILE));
    assert_eq!(pages[0].lang.as_deref(), Some("en"));
    assert_eq!(pages[0].ip_address.as_deref(), Some("192.0.2.1"));

    let records: Vec<QaRecord> = read(&dst.join(QA_FILE));
    assert_eq!(records[0].declared_language.as_deref(), Some("en"));

    let corpus: Vec<AggregatedRecord> = read(&dst.join(CORPUS_FILE));
    assert_eq!(corpus.len(), 1);
    assert_eq!(corpus[0].qa_pairs.len(), 1);
    assert_eq!(corpus[0].qa_pairs[0].question, "What is the meta question?");
    assert_eq!(corpus[0].qa_pairs[0].answer, "Meta answer.");
}

#[test]
fn pathological_markup_does_not_hold_back_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("in.warc");
    let dst = dir.path().join("out");
    let archive = [
        warc_response("http://nested.example/", &html(&"<a><div>".repeat(40_000))),
        warc_response("http://fine.example/", &html("<h3>Who?</h3><p>Me.</p>")),
    ]
    .concat();
    std::fs::write(&src, archive).unwrap();

    let config = PipelineConfig {
        timeout: Some(std::time::Duration::from_millis(200)),
        ..config()
    };
    let stats = FullPipeline::new(src, dst.clone(), "unused".into(), config)
        .run_with(&Recorder::default())
        .unwrap();
    assert_eq!(stats.skipped.too_large, 1);

    let corpus: Vec<AggregatedRecord> = read(&dst.join(CORPUS_FILE));
    let urls: Vec<_> = corpus.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(urls, vec!["http://fine.example/"]);
}

#[test]
fn utf16_meta_declaration_is_read_as_utf8() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("in.warc");
    let dst = dir.path().join("min.jsonl");
    std::fs::write(
        &src,
        warc_response(
            "http://utf16.example/",
            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n<html><head><meta charset=\"utf-16\"></head><body><h2>What is X?</h2><p>X is Y.</p></body></html>",
        ),
    )
    .unwrap();

    MinifyPipeline::new(src, dst.clone(), config()).run().unwrap();
    let pages: Vec<MinifiedPage> = read(&dst);
    assert_eq!(pages[0].html, "<h2>What is X?</h2>\n<p>X is Y.</p>");
}
