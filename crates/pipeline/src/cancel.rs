//! Cancellation signals.
//!
//! A shared, time-limited marker keyed by job id. The cancel action sets
//! it; the running dispatch job polls it between emitted chunks. Signals
//! expire after a bounded interval so an unread signal cannot leak forever.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How long a cancellation signal stays readable.
pub const CANCELLATION_TTL: Duration = Duration::from_secs(600);

/// Key derivation for a job's signal.
fn signal_key(job_id: &str) -> String {
    format!("cancel-answer-{}", job_id)
}

/// Shared key-value store of cancellation signals.
///
/// Safe for concurrent use from the cancelling request and the running
/// dispatch job. Expiry is enforced on read; expired entries are removed
/// when observed.
pub struct CancellationStore {
    entries: Mutex<HashMap<String, Instant>>,
}

impl CancellationStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Set the signal for a job.
    pub fn set(&self, job_id: &str) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(signal_key(job_id), Instant::now());
        tracing::debug!("Cancellation signal set for job {}", job_id);
    }

    /// Check whether the signal is set for a job.
    pub fn is_set(&self, job_id: &str) -> bool {
        self.is_set_at(job_id, Instant::now())
    }

    fn is_set_at(&self, job_id: &str, now: Instant) -> bool {
        let key = signal_key(job_id);
        let mut entries = self.entries.lock().unwrap();

        match entries.get(&key) {
            Some(set_at) if now.duration_since(*set_at) < CANCELLATION_TTL => true,
            Some(_) => {
                entries.remove(&key);
                false
            }
            None => false,
        }
    }
}

impl Default for CancellationStore {
    fn default() -> Self {
        Self::new()
    }
}
