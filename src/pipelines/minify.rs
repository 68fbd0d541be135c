//! Archive → minified pages.
use std::path::PathBuf;
use std::time::Instant;

use log::{debug, info};

use crate::budget::Budget;
use crate::error::{Error, Skip};
use crate::io::{JsonlWriter, WriterTrait};
use crate::minify::{Minified, Minifier};
use crate::pipelines::ordered::ordered_map;
use crate::pipelines::{guarded, Pipeline, PipelineConfig, RunStats};
use crate::sources::ArchiveReader;
use crate::types::{MinifiedPage, RawCapture};

pub struct MinifyPipeline {
    src: PathBuf,
    dst: PathBuf,
    config: PipelineConfig,
}

impl MinifyPipeline {
    pub fn new(src: PathBuf, dst: PathBuf, config: PipelineConfig) -> Self {
        Self { src, dst, config }
    }
}

/// Minify a capture. Gives back the url for logging.
pub(crate) fn minify_capture(
    minifier: &Minifier,
    budget: &Budget,
    capture: RawCapture,
) -> (String, Result<Minified, Skip>) {
    let res = guarded(&capture.url, || minifier.minify(&capture, budget));
    if let Err(skip) = &res {
        debug!("entry {} ({}): skipped ({})", capture.offset, capture.url, skip);
    }
    (capture.url, res)
}

/// Count a minification outcome. Returns the page if there is one.
pub(crate) fn tally(stats: &mut RunStats, res: Result<Minified, Skip>) -> Option<MinifiedPage> {
    stats.pages_in += 1;
    match res {
        Ok(minified) => {
            stats.minified += 1;
            if minified.decode_fallback {
                stats.decode_fallbacks += 1;
            }
            Some(minified.page)
        }
        Err(skip) => {
            stats.skip(&skip);
            None
        }
    }
}

impl Pipeline<RunStats> for MinifyPipeline {
    fn run(&self) -> Result<RunStats, Error> {
        let start = Instant::now();
        info!("minifying {:?} into {:?}", self.src, self.dst);

        let reader = ArchiveReader::from_path(&self.src)?;
        let mut writer = JsonlWriter::<MinifiedPage>::create(&self.dst)?;
        let minifier = Minifier::new(self.config.max_body_bytes);
        let mut stats = RunStats::default();

        let reader = ordered_map(
            reader,
            self.config.workers,
            self.config.queue_depth,
            |capture| minify_capture(&minifier, &self.config.budget(), capture),
            |(_, res): (String, Result<Minified, Skip>)| match tally(&mut stats, res) {
                Some(page) => writer.write_single(&page),
                None => Ok(()),
            },
        )?;
        writer.flush()?;

        let reader_stats = reader.stats();
        stats.skip_corrupt(reader_stats.corrupt);
        stats.reader = Some(reader_stats);
        stats.set_elapsed(start.elapsed());
        stats.log();
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::JsonlReader;
    use crate::sources::archive::{warc_record, warc_response};

    #[test]
    fn minifies_in_archive_order() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.warc");
        let dst = dir.path().join("min.jsonl");

        let mut archive = warc_record("request", "http://0.example/", "GET / HTTP/1.1\r\n");
        for i in 0..20 {
            archive += &warc_response(
                &format!("http://{i}.example/"),
                &format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n<p>page {i}</p><script>x()</script>"
                ),
            );
        }
        archive += &warc_response(
            "http://missing.example/",
            "HTTP/1.1 404 Not Found\r\nContent-Type: text/html\r\n\r\n<p>gone</p>",
        );
        archive += &warc_response(
            "http://image.example/",
            "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\n\r\nPNG",
        );
        std::fs::write(&src, archive).unwrap();

        let config = PipelineConfig {
            workers: 3,
            queue_depth: 4,
            ..Default::default()
        };
        let stats = MinifyPipeline::new(src, dst.clone(), config).run().unwrap();

        let pages: Vec<MinifiedPage> = JsonlReader::from_path(&dst)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(pages.len(), 20);
        for (i, page) in pages.iter().enumerate() {
            assert_eq!(page.url, format!("http://{i}.example/"));
            assert_eq!(page.html, format!("<p>page {i}</p>"));
            assert_eq!(page.ip_address.as_deref(), Some("192.0.2.1"));
        }

        assert_eq!(stats.pages_in, 22);
        assert_eq!(stats.minified, 20);
        assert_eq!(stats.skipped.not_ok, 1);
        assert_eq!(stats.skipped.not_html, 1);
        let reader = stats.reader.unwrap();
        assert_eq!(reader.non_response, 1);
        assert_eq!(reader.responses, 22);
    }

    #[test]
    fn timeouts_are_skips() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.warc");
        let dst = dir.path().join("min.jsonl");
        std::fs::write(
            &src,
            warc_response(
                "http://slow.example/",
                "HTTP/1.1 200 OK\r\n\r\n<p>anything</p>",
            ),
        )
        .unwrap();

        let config = PipelineConfig {
            timeout: Some(std::time::Duration::ZERO),
            ..Default::default()
        };
        let stats = MinifyPipeline::new(src, dst.clone(), config).run().unwrap();
        assert_eq!(stats.skipped.timeout, 1);
        assert_eq!(std::fs::read_to_string(&dst).unwrap(), "");
    }
}
