//! Debounced Change Watching
//!
//! One single-shot deadline per watched field. Arming again before expiry
//! restarts the timer, so only the trailing value of a burst of edits is
//! ever evaluated. Everything runs on the caller's thread; `poll` with the
//! current instant drives expiry.

use serde_json::Value;
use std::time::{Duration, Instant};

use crate::validators::ErrorSet;

/// Quiet period applied to watched fields unless a watch says otherwise.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

/// Emitted by [`crate::FormEngine::poll`] once a watched field's quiet
/// period has elapsed: the trailing value and the errors it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEvent {
    pub path: String,
    pub value: Value,
    pub errors: ErrorSet,
}

struct WatchState {
    path: String,
    window: Duration,
    deadline: Option<Instant>,
}

/// Bookkeeping for all registered watches. Owned by the engine.
#[derive(Default)]
pub(crate) struct WatchRegistry {
    watches: Vec<WatchState>,
}

impl WatchRegistry {
    pub(crate) fn register(&mut self, path: &str, window: Duration) {
        // Re-registering a path replaces its window and drops any pending
        // deadline.
        self.watches.retain(|w| w.path != path);
        self.watches.push(WatchState {
            path: path.to_string(),
            window,
            deadline: None,
        });
    }

    pub(crate) fn is_watched(&self, path: &str) -> bool {
        self.watches.iter().any(|w| w.path == path)
    }

    /// (Re)arm the watch for `path`. A pending deadline is superseded.
    pub(crate) fn arm(&mut self, path: &str, now: Instant) {
        if let Some(w) = self.watches.iter_mut().find(|w| w.path == path) {
            w.deadline = Some(now + w.window);
        }
    }

    /// Paths whose quiet period has elapsed, in registration order.
    /// Returned deadlines are cleared; a path fires at most once per burst.
    pub(crate) fn due(&mut self, now: Instant) -> Vec<String> {
        let mut fired = Vec::new();
        for w in &mut self.watches {
            if let Some(deadline) = w.deadline {
                if deadline <= now {
                    w.deadline = None;
                    fired.push(w.path.clone());
                }
            }
        }
        fired
    }

    pub(crate) fn clear_pending(&mut self) {
        for w in &mut self.watches {
            w.deadline = None;
        }
    }
}
