//! # ccqa
//!
//! Question/answer mining pipeline for web archive captures.
//!
//! ```sh
//! USAGE:
//!     ccqa <SUBCOMMAND>
//!
//! SUBCOMMANDS:
//!     aggregate    Merge QA records by url
//!     extract      Extract question/answer pairs from minified pages
//!     help         Prints this message or the help of the given subcommand(s)
//!     minify       Minify the HTML responses of a WARC file
//!     pipeline     Run minify, extract and aggregate in one pass
//! ```
//!
//! Set `RUST_LOG=info` to get run summaries.
use ccqa::cli::Ccqa;
use ccqa::error::Error;
use ccqa::pipelines::{
    AggregatePipeline, ExtractPipeline, FullPipeline, MinifyPipeline, Pipeline,
};
use log::debug;
use structopt::StructOpt;

fn main() -> Result<(), Error> {
    env_logger::init();

    let opt = Ccqa::from_args();
    debug!("cli args\n{:#?}", opt);

    let config = opt.common().config();
    let stats_path = opt.common().stats.clone();

    let stats = match opt {
        Ccqa::Minify(m) => MinifyPipeline::new(m.src, m.dst, config).run()?,
        Ccqa::Extract(e) => ExtractPipeline::new(e.src, e.dst, e.lid_path, config).run()?,
        Ccqa::Aggregate(a) => AggregatePipeline::new(a.src, a.dst, config).run()?,
        Ccqa::Pipeline(p) => FullPipeline::new(p.src, p.dst, p.lid_path, config).run()?,
    };

    if let Some(path) = stats_path {
        stats.save(&path)?;
    }
    Ok(())
}
