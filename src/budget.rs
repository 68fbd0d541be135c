//! Per-page processing budget.
//!
//! Tree walks in the minifier and the extractor call [Budget::check] as they go,
//! so a pathological page is dropped with [Skip::Timeout] instead of stalling a worker.
//! Parsing itself cannot be interrupted: markup is bounded before it is parsed,
//! see [crate::dom::max_open_elements].
use std::time::{Duration, Instant};

use crate::error::Skip;

#[derive(Debug, Clone, Copy)]
pub struct Budget {
    deadline: Option<Instant>,
}

impl Budget {
    /// Budget expiring `timeout` from now. [None] never expires.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            deadline: timeout.map(|t| Instant::now() + t),
        }
    }

    pub fn unlimited() -> Self {
        Self { deadline: None }
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    pub fn check(&self) -> Result<(), Skip> {
        if self.is_expired() {
            Err(Skip::Timeout)
        } else {
            Ok(())
        }
    }
}
