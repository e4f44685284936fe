//! The knowledge base: assertion store, path index, and eviction heap
//! behind a single read-write lock (§4.4).
//!
//! Grounded in the teacher's `AnalysisHost`/`Analysis` split
//! (`ide::analysis`): one structure owns all mutable state and serializes
//! writers against readers, while read-only operations work from a
//! consistent snapshot. Here the "snapshot" discipline is per-call rather
//! than a long-lived borrow (§5: "Reads never hold the lock while
//! consumers iterate results: they snapshot ids under the lock then
//! resolve outside") — `find_*` queries collect matching ids while
//! holding the read lock, then clone the corresponding `Assertion`s and
//! release the lock before returning.

pub mod assertion;
pub mod eviction;
pub mod path_index;

pub use assertion::{Assertion, PotentialAssertion, DEFAULT_REFLEXIVE_PREDICATES};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::error::DropReason;
use crate::term::Term;
use crate::unify::{self, Bindings};
use eviction::EvictionHeap;
use path_index::PathIndex;

/// Called after an assertion is evicted for capacity (§4.4 step 3). Must
/// not call back into the `KnowledgeBase` — it runs while the write lock
/// is held.
pub type EvictionNotifier = Box<dyn Fn(&Assertion) + Send + Sync>;

struct KbState {
    assertions: FxHashMap<String, Assertion>,
    index: PathIndex,
    heap: EvictionHeap,
}

/// Assertion store, path index, and eviction heap, serialized by one
/// read-write lock (§4.4, §5).
pub struct KnowledgeBase {
    state: RwLock<KbState>,
    max_size: usize,
    on_evict: EvictionNotifier,
}

impl KnowledgeBase {
    pub fn new(max_size: usize, on_evict: EvictionNotifier) -> Self {
        Self {
            state: RwLock::new(KbState {
                assertions: FxHashMap::default(),
                index: PathIndex::new(),
                heap: EvictionHeap::new(),
            }),
            max_size,
            on_evict,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Commit `pa` as a new assertion with id `new_id`, enforcing
    /// triviality, duplicate, subsumption-adjacent capacity, and eviction
    /// rules (§4.4 `commit`). Triviality and subsumption are checked by
    /// the caller (commit worker, §4.6) before this is invoked; this is
    /// the write-locked core: duplicate check, capacity enforcement, and
    /// insertion.
    pub fn commit(&self, pa: PotentialAssertion, new_id: String, timestamp: u64) -> Option<Assertion> {
        let mut state = self.state.write();

        // Step 2: exact-duplicate rejection for ground assertions.
        if !pa.kif.contains_variable() {
            let candidates = state.index.find_instances(&pa.kif);
            for id in &candidates {
                if let Some(existing) = state.assertions.get(id) {
                    if existing.kif == pa.kif {
                        debug!(kind = %DropReason::Duplicate, existing = %existing.id, "dropping duplicate commit");
                        return None;
                    }
                }
            }
        }

        // Steps 3-4: enforce capacity by evicting the lowest-priority
        // assertion until there's room, or give up.
        while state.assertions.len() >= self.max_size {
            let Some(candidate_id) = state.heap.pop() else {
                break;
            };
            // The heap may hold stale entries for ids already retracted;
            // only a still-present id counts as a real eviction.
            if let Some(evicted) = state.assertions.remove(&candidate_id) {
                state.index.remove(&evicted.kif, &evicted.id);
                (self.on_evict)(&evicted);
                debug!(id = %evicted.id, priority = evicted.priority, "evicted assertion for capacity");
            }
        }
        if state.assertions.len() >= self.max_size {
            warn!(kind = %DropReason::KbFull, "knowledge base full after eviction attempt");
            return None;
        }

        if state.assertions.contains_key(&new_id) {
            warn!(kind = %DropReason::IdCollision, id = %new_id, "id collision on commit");
            return None;
        }

        let assertion = Assertion::from_potential(new_id.clone(), pa, timestamp);
        state.index.insert(&assertion.kif, &assertion.id);
        state.heap.push(&assertion.id, assertion.priority, assertion.timestamp);
        state.assertions.insert(new_id, assertion.clone());
        Some(assertion)
    }

    /// Remove an assertion by id from the store, index, and heap (§4.4 `retract`).
    /// The heap entry is left in place and skipped lazily on pop.
    pub fn retract(&self, id: &str) -> Option<Assertion> {
        let mut state = self.state.write();
        let removed = state.assertions.remove(id)?;
        state.index.remove(&removed.kif, &removed.id);
        Some(removed)
    }

    /// `true` iff a stored generalization already matches `pa.kif` (§4.4
    /// `is_subsumed`, I5 forward subsumption).
    pub fn is_subsumed(&self, pa: &PotentialAssertion) -> bool {
        let state = self.state.read();
        let candidates = state.index.find_generalizations(&pa.kif);
        candidates.iter().any(|id| {
            state
                .assertions
                .get(id)
                .is_some_and(|a| unify::match_term(&a.kif, &pa.kif, Bindings::new()).is_some())
        })
    }

    /// Candidate assertions whose `kif` could unify with `q`, verified
    /// precisely before being returned (§4.4 `find_unifiable_assertions`).
    pub fn find_unifiable_assertions(&self, q: &Term) -> Vec<Assertion> {
        let state = self.state.read();
        state
            .index
            .find_unifiable(q)
            .into_iter()
            .filter_map(|id| state.assertions.get(&id))
            .cloned()
            .collect()
    }

    /// Candidate assertions that are instances of `p`, verified precisely
    /// (§4.4 `find_instances_of`).
    pub fn find_instances_of(&self, p: &Term) -> Vec<Assertion> {
        let state = self.state.read();
        state
            .index
            .find_instances(p)
            .into_iter()
            .filter_map(|id| state.assertions.get(&id))
            .filter(|a| unify::match_term(p, &a.kif, Bindings::new()).is_some())
            .cloned()
            .collect()
    }

    /// The stored assertion whose `kif` equals `ground_kif` exactly, if any
    /// (§4.4 `find_exact`).
    pub fn find_exact(&self, ground_kif: &Term) -> Option<Assertion> {
        let state = self.state.read();
        state
            .index
            .find_instances(ground_kif)
            .into_iter()
            .filter_map(|id| state.assertions.get(&id))
            .find(|a| &a.kif == ground_kif)
            .cloned()
    }

    pub fn get_assertion(&self, id: &str) -> Option<Assertion> {
        self.state.read().assertions.get(id).cloned()
    }

    /// All oriented equalities currently stored (used by rewrite-firing,
    /// §4.8 step 2's "else" branch).
    pub fn oriented_equalities(&self) -> Vec<Assertion> {
        self.state
            .read()
            .assertions
            .values()
            .filter(|a| a.is_oriented_equality)
            .cloned()
            .collect()
    }

    pub fn get_all(&self) -> Vec<Assertion> {
        self.state.read().assertions.values().cloned().collect()
    }

    pub fn size(&self) -> usize {
        self.state.read().assertions.len()
    }

    /// Drop every assertion, reset the index and eviction heap (§6.1 `clear_all`).
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.assertions.clear();
        state.index = PathIndex::new();
        state.heap = EvictionHeap::new();
    }
}
