use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ccqa::budget::Budget;
use ccqa::dom::Document;
use ccqa::extract::Extractor;
use ccqa::minify::minify_html;
use ccqa::pipelines::ordered::ordered_map;

fn faq_page(questions: usize) -> String {
    let mut page = String::from(
        "<html><head><title>FAQ</title><script>var tracking = 1;</script></head><body>\
         <nav><a href=\"/\">Home</a></nav><h1>Frequently asked questions</h1>",
    );
    for i in 0..questions {
        page += &format!(
            "<div class=\"faq-item\" onclick=\"toggle({i})\">\
             <h3>How do I reset password number {i}?</h3>\
             <p style=\"color: red\">Go to   settings, then <b>security</b>, then press reset {i}.</p>\
             </div>"
        );
    }
    page += "<footer><p>Contact us.</p></footer></body></html>";
    page
}

fn extract_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Extraction");
    let extractor = Extractor::default();
    for n in [10, 100, 1000] {
        let raw = faq_page(n);
        let minified = minify_html(&raw, &Budget::unlimited()).unwrap();

        group.bench_with_input(BenchmarkId::new("minify", n), &raw, |b, raw| {
            b.iter(|| minify_html(black_box(raw), &Budget::unlimited()))
        });
        group.bench_with_input(BenchmarkId::new("pairs", n), &minified, |b, html| {
            b.iter(|| {
                let doc = Document::parse(black_box(html));
                extractor.pairs(&doc, &Budget::unlimited())
            })
        });
    }
    group.finish();
}

fn ordered_map_benchmark(c: &mut Criterion) {
    let pages: Vec<String> = (0..64).map(|_| faq_page(20)).collect();
    let mut group = c.benchmark_group("Ordered map");
    for workers in [1, 4] {
        group.bench_with_input(BenchmarkId::new("minify", workers), &workers, |b, &w| {
            b.iter(|| {
                let mut total = 0;
                ordered_map(
                    pages.iter(),
                    w,
                    16,
                    |page| minify_html(page, &Budget::unlimited()).map(|h| h.len()),
                    |len| {
                        total += len.unwrap_or(0);
                        Ok(())
                    },
                )
                .unwrap();
                total
            })
        });
    }
    group.finish();
}

criterion_group!(benches, extract_benchmark, ordered_map_benchmark);
criterion_main!(benches);
