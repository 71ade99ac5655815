//! Stale-write guard applied to every registration.
//!
//! Timestamps accepted by one registration never decrease. A notification
//! whose timestamp does not exceed the last accepted one is stale and is
//! dropped. Optionally, a notification with a newer timestamp but identical
//! bytes is dropped as unchanged; its timestamp still advances the guard.

use sha2::{Digest, Sha256};

/// Outcome of offering a notification to the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    /// Timestamp not newer than the last accepted one.
    Stale,
    /// Newer timestamp, same content as the last delivery.
    Unchanged,
}

#[derive(Debug, Default)]
pub struct StaleGuard {
    last_accepted: Option<u64>,
    last_digest: Option<[u8; 32]>,
    skip_unchanged: bool,
}

impl StaleGuard {
    pub fn new(skip_unchanged: bool) -> Self {
        Self {
            last_accepted: None,
            last_digest: None,
            skip_unchanged,
        }
    }

    /// Record a baseline timestamp without delivering anything.
    pub fn seed(&mut self, last_modified: u64) {
        self.last_accepted = Some(self.last_accepted.map_or(last_modified, |last| {
            last.max(last_modified)
        }));
    }

    /// Whether `last_modified` would pass the timestamp check.
    pub fn is_newer(&self, last_modified: u64) -> bool {
        self.last_accepted.is_none_or(|last| last_modified > last)
    }

    pub fn last_accepted(&self) -> Option<u64> {
        self.last_accepted
    }

    /// Offer a notification. Updates state on `Accepted` and `Unchanged`.
    pub fn admit(&mut self, last_modified: u64, content: &str) -> Admission {
        if !self.is_newer(last_modified) {
            return Admission::Stale;
        }
        self.last_accepted = Some(last_modified);

        let digest: [u8; 32] = Sha256::digest(content.as_bytes()).into();
        if self.skip_unchanged && self.last_digest == Some(digest) {
            return Admission::Unchanged;
        }
        self.last_digest = Some(digest);
        Admission::Accepted
    }

    /// A timestamp for sources without their own clock (editor buffers).
    ///
    /// Strictly greater than the last accepted value so it always passes.
    pub fn next_stamp(&self, now: u64) -> u64 {
        match self.last_accepted {
            Some(last) if now <= last => last + 1,
            _ => now,
        }
    }
}
