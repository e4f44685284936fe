//! Shared harness for the engine scenario tests: a channel-based event sink
//! that collects emitted events for inspection, plus small polling helpers
//! since derivation happens on background worker threads.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

use kif_reasoner::{EngineConfig, Event, EventSink, Term};

pub fn atom(s: &str) -> Term {
    Term::atom(s)
}
pub fn var(s: &str) -> Term {
    Term::variable(s)
}
pub fn list(items: Vec<Term>) -> Term {
    Term::list(items)
}

/// Shared default config fixture, built once and cloned by scenario tests
/// that don't need their own tuning (e.g. the eviction test, which needs a
/// small `max_kb_size`, builds its own instead).
pub static DEFAULT_CONFIG: Lazy<EngineConfig> = Lazy::new(EngineConfig::default);

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

/// Initializes a process-wide `tracing_subscriber` the first time it's
/// called, so `tracing::debug!`/`warn!` from dropped or evicted assertions
/// show up under `cargo test -- --nocapture`. Safe to call from every test.
pub fn init_tracing() {
    Lazy::force(&TRACING_INIT);
}

#[derive(Default)]
pub struct CollectingSink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink(&self) -> EventSink {
        let events = Arc::clone(&self.events);
        Arc::new(move |e: Event| {
            events.lock().unwrap().push(e);
        })
    }

    pub fn snapshot(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn added_kif_strings(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .filter_map(|e| match e {
                Event::Added(a) => Some(a.kif.kif_string()),
                _ => None,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

/// Poll `predicate` until it's true or `timeout` elapses, sleeping briefly
/// between attempts. Background workers derive asynchronously, so tests
/// can't assert on event counts immediately after a submission.
pub fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if predicate() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
}
