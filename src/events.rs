//! The event sink and pattern-matched callback registry (§4's Event sink,
//! §6.2, and SPEC_FULL.md's supplemented `register_callback` surface).
//!
//! The core commits to no wire format (§6.2: "the core makes no commitment
//! to such wire format") — consumers get a closure-based sink, not a
//! serialized channel. A conforming transport (out of scope here) renders
//! these events however it likes.

use std::sync::Arc;

use crate::kb::Assertion;
use crate::unify::{self, Bindings};

/// One emitted event (§6.2).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Event {
    /// Derived or input assertion, after commit.
    Added(Assertion),
    /// Pre-commit notification for a note-tagged ground input; carries a
    /// temporary `input-…` id not present in the KB.
    Input(Assertion),
    /// Explicit retraction.
    Retracted(Assertion),
    /// Capacity eviction.
    Evict(Assertion),
}

impl Event {
    pub fn assertion(&self) -> &Assertion {
        match self {
            Event::Added(a) | Event::Input(a) | Event::Retracted(a) | Event::Evict(a) => a,
        }
    }
}

/// An abstract notifier receiving every emitted [`Event`] (§6.2). Boxed so
/// an `Engine` can hold a heterogeneous sink (a channel sender, a logger, a
/// test collector) without a generic parameter leaking into its own type.
pub type EventSink = Arc<dyn Fn(Event) + Send + Sync>;

/// A pattern plus a handler, invoked when `match(pattern, assertion.kif)`
/// succeeds (§6.1 `register_callback`).
pub struct Callback {
    pattern: crate::term::Term,
    handler: Box<dyn Fn(&Event, &Bindings) + Send + Sync>,
}

/// The set of registered [`Callback`]s, dispatched once per emitted event
/// (SPEC_FULL.md's `CallbackRegistry`).
#[derive(Default)]
pub struct CallbackRegistry {
    callbacks: parking_lot::RwLock<Vec<Callback>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, pattern: crate::term::Term, handler: impl Fn(&Event, &Bindings) + Send + Sync + 'static) {
        self.callbacks.write().push(Callback {
            pattern,
            handler: Box::new(handler),
        });
    }

    /// Dispatch `event` to every registered callback whose pattern matches
    /// the event's assertion `kif` (§6.1: "fn receives `(event_kind,
    /// assertion, bindings)` when `match(pattern, assertion.kif) != none`").
    pub fn dispatch(&self, event: &Event) {
        let callbacks = self.callbacks.read();
        for cb in callbacks.iter() {
            if let Some(bindings) = unify::match_term(&cb.pattern, &event.assertion().kif, Bindings::new()) {
                (cb.handler)(event, &bindings);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::PotentialAssertion;
    use crate::term::Term;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn make_assertion(kif: Term) -> Assertion {
        Assertion::from_potential("fact-0".into(), PotentialAssertion::input(kif, 1.0, None), 0)
    }

    #[test]
    fn dispatch_invokes_matching_callback_only() {
        let registry = CallbackRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        registry.register(
            Term::list(vec![Term::atom("instance"), Term::variable("?x"), Term::atom("Dog")]),
            move |_event, bindings| {
                assert_eq!(bindings.get("?x"), Some(&Term::atom("Rex")));
                hits_clone.fetch_add(1, Ordering::SeqCst);
            },
        );

        let matching = make_assertion(Term::list(vec![Term::atom("instance"), Term::atom("Rex"), Term::atom("Dog")]));
        registry.dispatch(&Event::Added(matching));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let non_matching = make_assertion(Term::list(vec![Term::atom("instance"), Term::atom("Tom"), Term::atom("Cat")]));
        registry.dispatch(&Event::Added(non_matching));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
