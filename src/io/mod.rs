/*!
# IO utilities

JSON lines loading and saving, used for both intermediate artifacts and the final corpus.
!*/
mod reader;
mod writer;

pub use reader::JsonlReader;
pub use writer::{JsonlWriter, WriterTrait};
