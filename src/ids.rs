//! Fresh-id generation (§5: "Atomic counters provide fresh ids").
//!
//! One counter per component rather than a single process-global, per the
//! design note in §9: assertion ids (`fact-N`), input-preview ids
//! (`input-N`), and rule ids (`rule-N`) each get their own sequence so
//! that, e.g., clearing and recreating an `Engine` in the same process
//! doesn't make one component's ids depend on another's activity.

use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter, scoped to one id namespace.
#[derive(Default)]
pub struct IdGenerator {
    counter: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next value in this generator's sequence, starting at 0.
    pub fn fresh(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }

    /// `"{prefix}-{n}"` for the next value in this generator's sequence.
    pub fn fresh_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.fresh())
    }
}
