//! The priority inference queue and the pause monitor (§5).
//!
//! The inference queue is a max-heap by task priority, "bounded by
//! available memory; submit is non-blocking" (§5) — a plain
//! `Mutex<BinaryHeap<_>>` plus a `Condvar` for blocking `pop`, rather than
//! the bounded `crossbeam_channel` used for the commit queue.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};

use parking_lot::{Condvar, Mutex};

use super::task::InferenceTask;

struct QueueEntry {
    priority: f64,
    seq: u64,
    task: InferenceTask,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Ties among equal priorities are unspecified (§3 `InferenceTask`);
        // break on insertion order purely so behavior is deterministic
        // under test.
        self.priority
            .partial_cmp(&other.priority)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Max-priority blocking queue of [`InferenceTask`]s.
pub struct InferenceQueue {
    heap: Mutex<BinaryHeap<QueueEntry>>,
    not_empty: Condvar,
    shutdown: AtomicBool,
    seq: AtomicU64,
}

impl Default for InferenceQueue {
    fn default() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            not_empty: Condvar::new(),
            shutdown: AtomicBool::new(false),
            seq: AtomicU64::new(0),
        }
    }
}

impl InferenceQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, task: InferenceTask) {
        let seq = self.seq.fetch_add(1, AtomicOrdering::Relaxed);
        let mut heap = self.heap.lock();
        heap.push(QueueEntry {
            priority: task.priority,
            seq,
            task,
        });
        drop(heap);
        self.not_empty.notify_one();
    }

    /// Block until the highest-priority task is available, or `None` once
    /// [`InferenceQueue::shutdown`] has been called and the queue has
    /// drained.
    pub fn pop(&self) -> Option<InferenceTask> {
        let mut heap = self.heap.lock();
        loop {
            if let Some(entry) = heap.pop() {
                return Some(entry.task);
            }
            if self.shutdown.load(AtomicOrdering::Acquire) {
                return None;
            }
            self.not_empty.wait(&mut heap);
        }
    }

    /// Wake every blocked `pop` so workers can observe shutdown and exit.
    pub fn shutdown(&self) {
        self.shutdown.store(true, AtomicOrdering::Release);
        self.not_empty.notify_all();
    }

    /// Discard all pending tasks (§6.1 `clear_all`).
    pub fn drain(&self) {
        self.heap.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.heap.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.lock().is_empty()
    }
}

/// Lets workers suspend on a pause flag without busy-waiting (§5
/// suspension point (b): "a pause monitor").
pub struct PauseMonitor {
    paused: Mutex<bool>,
    cv: Condvar,
}

impl Default for PauseMonitor {
    fn default() -> Self {
        Self {
            paused: Mutex::new(false),
            cv: Condvar::new(),
        }
    }
}

impl PauseMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_paused(&self, paused: bool) {
        *self.paused.lock() = paused;
        if !paused {
            self.cv.notify_all();
        }
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.lock()
    }

    /// Block while paused. A spurious wake with the flag still set just
    /// loops; `set_paused(false)` is what actually releases waiters.
    pub fn wait_while_paused(&self) {
        let mut guard = self.paused.lock();
        while *guard {
            self.cv.wait(&mut guard);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::task::TaskKind;
    use crate::kb::{Assertion, PotentialAssertion};
    use crate::term::Term;
    use crate::unify::Bindings;
    use crate::rules::Rule;

    fn dummy_assertion(id: &str) -> Assertion {
        Assertion::from_potential(
            id.to_string(),
            PotentialAssertion::input(Term::atom("x"), 1.0, None),
            0,
        )
    }

    fn dummy_rule() -> Rule {
        Rule {
            id: "rule-0".into(),
            rule_form: Term::atom("x"),
            antecedent: Term::atom("x"),
            consequent: Term::atom("x"),
            priority: 1.0,
            antecedent_clauses: vec![],
        }
    }

    #[test]
    fn pop_returns_highest_priority_first() {
        let q = InferenceQueue::new();
        for p in [1.0, 5.0, 3.0] {
            q.push(InferenceTask {
                priority: p,
                kind: TaskKind::MatchAntecedent {
                    rule: dummy_rule(),
                    trigger: dummy_assertion("a"),
                    matched_clause_index: 0,
                    bindings: Bindings::new(),
                },
            });
        }
        assert_eq!(q.pop().unwrap().priority, 5.0);
        assert_eq!(q.pop().unwrap().priority, 3.0);
        assert_eq!(q.pop().unwrap().priority, 1.0);
    }

    #[test]
    fn shutdown_unblocks_pop() {
        let q = InferenceQueue::new();
        q.shutdown();
        assert!(q.pop().is_none());
    }

    #[test]
    fn pause_monitor_blocks_then_releases() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::thread;

        let monitor = Arc::new(PauseMonitor::new());
        monitor.set_paused(true);
        let released = Arc::new(AtomicBool::new(false));

        let m2 = Arc::clone(&monitor);
        let r2 = Arc::clone(&released);
        let handle = thread::spawn(move || {
            m2.wait_while_paused();
            r2.store(true, Ordering::SeqCst);
        });

        std::thread::sleep(std::time::Duration::from_millis(20));
        assert!(!released.load(Ordering::SeqCst));
        monitor.set_paused(false);
        handle.join().unwrap();
        assert!(released.load(Ordering::SeqCst));
    }
}
