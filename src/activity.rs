//! Time-windowed membership tracking.
//!
//! [`ActivitySet`] remembers member ids for a fixed window after their last
//! refresh. Expiry is lazy: entries are pruned as a side effect of reads,
//! never by a background sweep. Correctness only requires that an expired
//! entry is never *observed*, not that it is removed eagerly.
//!
//! The same type backs both the "recently active" window and the short
//! invite-spam cooldown lock; the two are separate instances with separate
//! timeouts.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Set of member ids whose presence expires `ttl` after the last refresh.
///
/// Presence is a half-open interval: an id added at `t` is present for
/// queries in `[t, t + ttl)` and absent from `t + ttl` onwards.
#[derive(Debug)]
pub struct ActivitySet {
    entries: HashMap<String, Instant>,
    ttl: Duration,
}

impl ActivitySet {
    /// Create an empty set with the given time-to-live.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Record or refresh presence of `id` as of now.
    pub fn add(&mut self, id: &str) {
        self.add_at(id, Instant::now());
    }

    /// Whether `id` is present and unexpired. Prunes expired entries.
    pub fn has(&mut self, id: &str) -> bool {
        self.has_at(id, Instant::now())
    }

    /// Force absence of `id`. Returns whether an entry existed.
    pub fn remove(&mut self, id: &str) -> bool {
        self.entries.remove(id).is_some()
    }

    /// Ids currently present, pruning first. Order is not meaningful.
    pub fn snapshot(&mut self) -> Vec<String> {
        self.snapshot_at(Instant::now())
    }

    /// Number of unexpired entries, pruning first.
    pub fn len(&mut self) -> usize {
        self.prune(Instant::now());
        self.entries.len()
    }

    /// Whether no unexpired entries remain.
    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    pub(crate) fn add_at(&mut self, id: &str, now: Instant) {
        self.entries.insert(id.to_owned(), now);
    }

    pub(crate) fn has_at(&mut self, id: &str, now: Instant) -> bool {
        self.prune(now);
        self.entries.contains_key(id)
    }

    pub(crate) fn snapshot_at(&mut self, now: Instant) -> Vec<String> {
        self.prune(now);
        self.entries.keys().cloned().collect()
    }

    fn prune(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, inserted| now.saturating_duration_since(*inserted) < ttl);
    }
}
