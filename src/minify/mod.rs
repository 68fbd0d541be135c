//! Markup minification: raw captures to compact, content-only HTML.
pub mod encoding;
mod minifier;

pub use minifier::{minify_html, Minified, Minifier, MAX_BODY_BYTES};
