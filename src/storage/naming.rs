//! Generated names
//!
//! Stored assets are named `<fieldName>-<millis>.<origExt>`. The millisecond
//! component comes from a per-process monotonic clock so two uploads handled
//! by the same server never share a timestamp.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::storage::validation::extension_of;

/// Build the stored name for an upload at a given millisecond
pub fn generated_name(field_name: &str, original_name: &str, millis: u64) -> String {
    match extension_of(original_name).filter(|ext| is_plain_extension(ext)) {
        Some(ext) => format!("{field_name}-{millis}.{ext}"),
        None => format!("{field_name}-{millis}"),
    }
}

fn is_plain_extension(ext: &str) -> bool {
    !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Milliseconds since the Unix epoch
pub fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Hands out strictly increasing millisecond stamps, tracking wall-clock time
#[derive(Debug, Default)]
pub struct NameClock {
    last: AtomicU64,
}

impl NameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time in millis, or one past the previous stamp if the clock hasn't moved
    pub fn next_millis(&self) -> u64 {
        self.advance_to(current_millis())
    }

    fn advance_to(&self, now: u64) -> u64 {
        let mut previous = self.last.load(Ordering::Relaxed);
        loop {
            let next = now.max(previous + 1);
            match self
                .last
                .compare_exchange_weak(previous, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => previous = actual,
            }
        }
    }
}
