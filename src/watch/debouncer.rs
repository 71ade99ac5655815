//! Keyed coalescing timer for raw change signals.
//!
//! A single logical save can produce several raw events in quick
//! succession. Each new signal for a key pushes that key's deadline out;
//! the key becomes ready once it has been quiet for its window. Keys are
//! independent: a signal for one never delays another.

use std::collections::HashMap;
use std::hash::Hash;

use tokio::time::{Duration, Instant, sleep_until};

use crate::types::MAX_WATCH_WINDOW;

/// Debounces change signals by key.
#[derive(Debug)]
pub struct Debouncer<K> {
    /// Pending keys: key -> deadline at which it becomes ready.
    pending: HashMap<K, Instant>,
    /// Window used by `record`.
    window: Duration,
}

impl<K: Hash + Eq + Clone> Debouncer<K> {
    /// Create a debouncer with the given default window.
    pub fn new(window: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            window,
        }
    }

    /// Create a debouncer with a window in milliseconds.
    pub fn from_millis(window_ms: u64) -> Self {
        Self::new(Duration::from_millis(window_ms))
    }

    /// Record a raw signal using the default window.
    ///
    /// Resets the timer for this key.
    pub fn record(&mut self, key: K) {
        let window = self.window;
        self.record_for(key, window);
    }

    /// Record a raw signal with a per-key window, capped at `MAX_WATCH_WINDOW`.
    pub fn record_for(&mut self, key: K, window: Duration) {
        self.pending
            .insert(key, Instant::now() + window.min(MAX_WATCH_WINDOW));
    }

    /// Drop a pending key (e.g., file deleted or watch stopped).
    pub fn remove(&mut self, key: &K) {
        self.pending.remove(key);
    }

    /// Take all keys whose window has elapsed.
    pub fn take_ready(&mut self) -> Vec<K> {
        let now = Instant::now();
        let mut ready = Vec::new();

        self.pending.retain(|key, deadline| {
            if now >= *deadline {
                ready.push(key.clone());
                false
            } else {
                true
            }
        });

        ready
    }

    /// Earliest pending deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Sleep until the earliest key is ready. Never completes when idle.
    ///
    /// Intended as a `tokio::select!` arm; re-evaluate after every event.
    pub async fn wait_ready(&self) {
        match self.next_deadline() {
            Some(deadline) => sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_basic() {
        let mut debouncer = Debouncer::from_millis(50);

        let path = PathBuf::from("/docs/notes.md");
        debouncer.record(path.clone());

        // Immediately after, nothing should be ready
        assert!(debouncer.take_ready().is_empty());
        assert!(debouncer.has_pending());

        advance(Duration::from_millis(60)).await;

        let ready = debouncer.take_ready();
        assert_eq!(ready, vec![path]);
        assert!(!debouncer.has_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_resets_on_new_signal() {
        let mut debouncer = Debouncer::from_millis(50);

        let path = PathBuf::from("/docs/notes.md");
        debouncer.record(path.clone());

        advance(Duration::from_millis(30)).await;
        debouncer.record(path.clone());

        // 60ms since the first signal, only 30ms since the second
        advance(Duration::from_millis(30)).await;
        assert!(debouncer.take_ready().is_empty());

        advance(Duration::from_millis(30)).await;
        assert_eq!(debouncer.take_ready().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_keys_are_independent() {
        let mut debouncer = Debouncer::from_millis(50);

        let first = PathBuf::from("/docs/a.md");
        let second = PathBuf::from("/docs/b.md");

        debouncer.record(first.clone());
        advance(Duration::from_millis(30)).await;
        debouncer.record(second.clone());

        advance(Duration::from_millis(25)).await;
        assert_eq!(debouncer.take_ready(), vec![first]);
        assert!(debouncer.has_pending());

        advance(Duration::from_millis(30)).await;
        assert_eq!(debouncer.take_ready(), vec![second]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_per_key_window() {
        let mut debouncer = Debouncer::from_millis(300);

        debouncer.record_for("settle", Duration::from_millis(100));
        debouncer.record("debounce");

        assert_eq!(
            debouncer.next_deadline(),
            Some(Instant::now() + Duration::from_millis(100))
        );

        advance(Duration::from_millis(100)).await;
        assert_eq!(debouncer.take_ready(), vec!["settle"]);
        assert_eq!(debouncer.pending_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_ready_sleeps_until_deadline() {
        let mut debouncer = Debouncer::from_millis(40);
        debouncer.record(1u32);

        let started = Instant::now();
        debouncer.wait_ready().await;
        assert!(started.elapsed() >= Duration::from_millis(40));
        assert_eq!(debouncer.take_ready(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_window_is_capped() {
        let mut debouncer = Debouncer::new(Duration::MAX);
        debouncer.record("huge");
        debouncer.record_for("also huge", Duration::from_secs(u64::MAX));

        assert_eq!(
            debouncer.next_deadline(),
            Some(Instant::now() + MAX_WATCH_WINDOW)
        );
        advance(MAX_WATCH_WINDOW).await;
        assert_eq!(debouncer.take_ready().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_remove() {
        let mut debouncer = Debouncer::from_millis(50);

        let path = PathBuf::from("/docs/notes.md");
        debouncer.record(path.clone());
        assert!(debouncer.has_pending());

        debouncer.remove(&path);
        assert!(!debouncer.has_pending());
        assert_eq!(debouncer.next_deadline(), None);
    }
}
