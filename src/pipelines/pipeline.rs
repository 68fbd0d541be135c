//! Pipeline trait.
use crate::error::Error;

/// Implemented by every stage runner (and by the chained pipeline).
///
/// Generic over the return type so that a pipeline can hand back
/// whatever summary it produces.
pub trait Pipeline<T> {
    fn run(&self) -> Result<T, Error>;
}
