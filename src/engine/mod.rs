//! The scheduler/engine: commit worker, inference worker pool, and the
//! control interface that ties the knowledge base, rule store, and event
//! sink together (§4.6, §4.7, §4.10, §6.1).

pub mod queue;
pub mod state;
pub mod task;

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, error, warn};

use crate::config::EngineConfig;
use crate::error::{DropReason, RuleError};
use crate::events::{CallbackRegistry, Event, EventSink};
use crate::ids::IdGenerator;
use crate::kb::assertion::is_trivial;
use crate::kb::{Assertion, KnowledgeBase, PotentialAssertion};
use crate::rules::{parse_rule, RuleStore};
use crate::term::Term;
use crate::unify::Bindings;

use queue::{InferenceQueue, PauseMonitor};
use state::{EngineState, EngineStatus};

type NoteIndex = Arc<RwLock<FxHashMap<String, FxHashSet<String>>>>;

/// The reasoner's control handle (§6.1). Cloning is cheap — every field is
/// an `Arc` — and clones refer to the same running engine, the way the
/// teacher's `AnalysisHost` hands out cheap `Analysis` snapshots.
#[derive(Clone)]
pub struct Engine {
    config: Arc<EngineConfig>,
    kb: Arc<KnowledgeBase>,
    rules: Arc<RuleStore>,
    commit_tx: Sender<PotentialAssertion>,
    commit_rx: Receiver<PotentialAssertion>,
    inference_queue: Arc<InferenceQueue>,
    pause_monitor: Arc<PauseMonitor>,
    running: Arc<AtomicBool>,
    state: Arc<Mutex<EngineState>>,
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
    event_sink: EventSink,
    callbacks: Arc<CallbackRegistry>,
    note_index: NoteIndex,
    fact_ids: Arc<IdGenerator>,
    input_ids: Arc<IdGenerator>,
    rule_ids: Arc<IdGenerator>,
    clock: Arc<AtomicU64>,
}

impl Engine {
    pub fn new(config: EngineConfig, event_sink: EventSink) -> Self {
        let config = config.normalized();
        let note_index: NoteIndex = Arc::new(RwLock::new(FxHashMap::default()));
        let callbacks = Arc::new(CallbackRegistry::new());

        let kb_sink = event_sink.clone();
        let kb_callbacks = Arc::clone(&callbacks);
        let kb_note_index = Arc::clone(&note_index);
        let kb = Arc::new(KnowledgeBase::new(
            config.max_kb_size,
            Box::new(move |evicted: &Assertion| {
                if let Some(note_id) = &evicted.source_note_id {
                    if let Some(ids) = kb_note_index.write().get_mut(note_id) {
                        ids.remove(&evicted.id);
                    }
                }
                kb_sink(Event::Evict(evicted.clone()));
                kb_callbacks.dispatch(&Event::Evict(evicted.clone()));
            }),
        ));

        let (commit_tx, commit_rx) = crossbeam_channel::bounded(config.commit_queue_capacity);

        Self {
            config: Arc::new(config),
            kb,
            rules: Arc::new(RuleStore::new()),
            commit_tx,
            commit_rx,
            inference_queue: Arc::new(InferenceQueue::new()),
            pause_monitor: Arc::new(PauseMonitor::new()),
            running: Arc::new(AtomicBool::new(false)),
            state: Arc::new(Mutex::new(EngineState::Idle)),
            handles: Arc::new(Mutex::new(Vec::new())),
            event_sink,
            callbacks,
            note_index,
            fact_ids: Arc::new(IdGenerator::new()),
            input_ids: Arc::new(IdGenerator::new()),
            rule_ids: Arc::new(IdGenerator::new()),
            clock: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn kb(&self) -> &KnowledgeBase {
        &self.kb
    }

    pub fn rules(&self) -> &RuleStore {
        &self.rules
    }

    // ---- lifecycle (§4.10, §6.1) ----------------------------------------

    /// Spawn the commit worker and the inference worker pool, moving
    /// `Idle -> Starting -> Running`.
    pub fn start(&self) {
        *self.state.lock() = EngineState::Starting;
        self.running.store(true, Ordering::SeqCst);
        self.pause_monitor.set_paused(false);

        let mut handles = self.handles.lock();

        let commit_handle = {
            let commit_rx = self.commit_rx.clone();
            let kb = Arc::clone(&self.kb);
            let rules = Arc::clone(&self.rules);
            let inference_queue = Arc::clone(&self.inference_queue);
            let event_sink = self.event_sink.clone();
            let callbacks = Arc::clone(&self.callbacks);
            let note_index = Arc::clone(&self.note_index);
            let pause_monitor = Arc::clone(&self.pause_monitor);
            let running = Arc::clone(&self.running);
            let fact_ids = Arc::clone(&self.fact_ids);
            let clock = Arc::clone(&self.clock);
            let reflexive = self.config.reflexive_predicates.clone();
            let state = Arc::clone(&self.state);
            std::thread::spawn(move || {
                commit_worker_loop(
                    commit_rx,
                    kb,
                    rules,
                    inference_queue,
                    event_sink,
                    callbacks,
                    note_index,
                    pause_monitor,
                    running,
                    fact_ids,
                    clock,
                    reflexive,
                    state,
                )
            })
        };
        handles.push(commit_handle);

        for _ in 0..self.config.inference_workers {
            let inference_queue = Arc::clone(&self.inference_queue);
            let kb = Arc::clone(&self.kb);
            let commit_tx = self.commit_tx.clone();
            let pause_monitor = Arc::clone(&self.pause_monitor);
            let running = Arc::clone(&self.running);
            let reflexive = self.config.reflexive_predicates.clone();
            let state = Arc::clone(&self.state);
            let subst_max_depth = self.config.subst_max_depth;
            handles.push(std::thread::spawn(move || {
                inference_worker_loop(
                    inference_queue,
                    kb,
                    commit_tx,
                    pause_monitor,
                    running,
                    reflexive,
                    state,
                    subst_max_depth,
                )
            }));
        }
        drop(handles);

        *self.state.lock() = EngineState::Running;
    }

    /// `Running | Paused -> Stopping -> Stopped`. Joins all worker threads
    /// with a short grace period; workers that don't observe `running` in
    /// time are simply detached (there is no forced-kill primitive for
    /// native threads, matching §5's "forced-cancel fallback" only in
    /// spirit).
    pub fn stop(&self) {
        *self.state.lock() = EngineState::Stopping;
        self.running.store(false, Ordering::SeqCst);
        self.pause_monitor.set_paused(false);
        self.inference_queue.shutdown();

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut self.handles.lock());
        for handle in handles {
            let _ = handle.join();
        }
        *self.state.lock() = EngineState::Stopped;
    }

    pub fn pause(&self, paused: bool) {
        self.pause_monitor.set_paused(paused);
        let mut state = self.state.lock();
        if *state == EngineState::Running || *state == EngineState::Paused {
            *state = if paused { EngineState::Paused } else { EngineState::Running };
        }
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            state: *self.state.lock(),
            kb_size: self.kb.size(),
            rule_count: self.rules.len(),
            commit_queue_len: self.commit_rx.len(),
            inference_queue_len: self.inference_queue.len(),
        }
    }

    // ---- submission (§6.1) -----------------------------------------------

    /// Enqueue `pa` on the commit queue, blocking if it is full (§5).
    /// Rejects (with a log) trivial or non-ground non-equality submissions
    /// before they ever reach the queue.
    pub fn submit_potential_assertion(&self, pa: PotentialAssertion) {
        if is_trivial(&pa.kif, &self.config.reflexive_predicates) {
            warn!(kind = %DropReason::Trivial, kif = %pa.kif, "rejecting trivial assertion at submission");
            return;
        }
        if !pa.is_equality && pa.kif.contains_variable() {
            warn!(kind = %DropReason::NonGround, kif = %pa.kif, "rejecting non-ground non-equality assertion");
            return;
        }

        if let Some(note_id) = pa.source_note_id.clone() {
            if !pa.is_equality && !pa.kif.contains_variable() {
                let preview = Assertion {
                    id: self.input_ids.fresh_id("input"),
                    kif: pa.kif.clone(),
                    priority: pa.priority,
                    timestamp: 0,
                    source_note_id: Some(note_id),
                    support: pa.support.clone(),
                    is_equality: pa.is_equality,
                    is_oriented_equality: pa.is_oriented_equality,
                };
                (self.event_sink)(Event::Input(preview.clone()));
                self.callbacks.dispatch(&Event::Input(preview));
            }
        }

        if let Err(err) = self.commit_tx.send(pa) {
            warn!(error = %err, "commit queue closed; dropping submission");
        }
    }

    /// Parse and insert `rule_form` (§4.5), deduping by `rule_form`. On a
    /// genuine insertion, matches the new rule against every existing
    /// assertion (§4.8 step 3, B4).
    pub fn submit_rule(&self, rule_form: Term, priority: f64) -> Result<bool, RuleError> {
        let id_prefix = self.rule_ids.fresh_id("rule");
        let parsed = parse_rule(&rule_form, priority, &id_prefix)?;
        let inserted = self.rules.insert_group(parsed.clone());
        if inserted {
            for rule in &parsed {
                for task in task::generate_tasks_for_new_rule(rule, &self.kb) {
                    self.inference_queue.push(task);
                }
            }
        }
        Ok(inserted)
    }

    pub fn retract_by_id(&self, id: &str) {
        if let Some(removed) = self.kb.retract(id) {
            self.detach_note(&removed);
            (self.event_sink)(Event::Retracted(removed.clone()));
            self.callbacks.dispatch(&Event::Retracted(removed));
        }
    }

    /// Atomically removes the note's id-set from the multimap and retracts
    /// each of its assertions (§6.1).
    pub fn retract_by_note_id(&self, note_id: &str) {
        let ids: Vec<String> = self
            .note_index
            .write()
            .remove(note_id)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        for id in ids {
            if let Some(removed) = self.kb.retract(&id) {
                (self.event_sink)(Event::Retracted(removed.clone()));
                self.callbacks.dispatch(&Event::Retracted(removed));
            }
        }
    }

    /// Removes every rule whose form equals `rule_form`, returning how many
    /// were removed (a `<=>` submission yields two).
    pub fn retract_rule(&self, rule_form: &Term) -> usize {
        self.rules.remove_by_form(rule_form).len()
    }

    /// Pause, snapshot and clear the KB, rule store, and both queues, emit
    /// `retracted` for every snapshotted assertion, then resume (§6.1).
    pub fn clear_all(&self) {
        self.pause(true);
        let snapshot = self.kb.get_all();
        self.kb.clear();
        self.rules.clear();
        self.inference_queue.drain();
        while self.commit_rx.try_recv().is_ok() {}
        self.note_index.write().clear();
        for assertion in snapshot {
            (self.event_sink)(Event::Retracted(assertion.clone()));
            self.callbacks.dispatch(&Event::Retracted(assertion));
        }
        self.pause(false);
    }

    pub fn register_callback(&self, pattern: Term, handler: impl Fn(&Event, &Bindings) + Send + Sync + 'static) {
        self.callbacks.register(pattern, handler);
    }

    fn detach_note(&self, assertion: &Assertion) {
        if let Some(note_id) = &assertion.source_note_id {
            if let Some(ids) = self.note_index.write().get_mut(note_id) {
                ids.remove(&assertion.id);
            }
        }
    }
}

fn enter_error_and_recover(state: &Mutex<EngineState>) {
    *state.lock() = EngineState::Error;
    std::thread::sleep(Duration::from_millis(50));
    let mut guard = state.lock();
    if *guard == EngineState::Error {
        *guard = EngineState::Running;
    }
}

#[allow(clippy::too_many_arguments)]
fn commit_worker_loop(
    commit_rx: Receiver<PotentialAssertion>,
    kb: Arc<KnowledgeBase>,
    rules: Arc<RuleStore>,
    inference_queue: Arc<InferenceQueue>,
    event_sink: EventSink,
    callbacks: Arc<CallbackRegistry>,
    note_index: NoteIndex,
    pause_monitor: Arc<PauseMonitor>,
    running: Arc<AtomicBool>,
    fact_ids: Arc<IdGenerator>,
    clock: Arc<AtomicU64>,
    reflexive: FxHashSet<String>,
    state: Arc<Mutex<EngineState>>,
) {
    while running.load(Ordering::Acquire) {
        pause_monitor.wait_while_paused();
        if !running.load(Ordering::Acquire) {
            break;
        }

        let pa = match commit_rx.recv_timeout(Duration::from_millis(200)) {
            Ok(pa) => pa,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        };

        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            process_one_commit(&pa, &kb, &rules, &inference_queue, &event_sink, &callbacks, &note_index, &fact_ids, &clock, &reflexive)
        }));
        if outcome.is_err() {
            error!(kind = "worker-exception", "commit worker panicked while processing an item");
            enter_error_and_recover(&state);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn process_one_commit(
    pa: &PotentialAssertion,
    kb: &KnowledgeBase,
    rules: &RuleStore,
    inference_queue: &InferenceQueue,
    event_sink: &EventSink,
    callbacks: &CallbackRegistry,
    note_index: &NoteIndex,
    fact_ids: &IdGenerator,
    clock: &AtomicU64,
    reflexive: &FxHashSet<String>,
) {
    if is_trivial(&pa.kif, reflexive) {
        debug!(kind = %DropReason::Trivial, "dropping trivial potential assertion at commit");
        return;
    }
    if kb.is_subsumed(pa) {
        debug!(kind = %DropReason::Subsumed, "dropping subsumed potential assertion");
        return;
    }

    let new_id = fact_ids.fresh_id("fact");
    let timestamp = clock.fetch_add(1, Ordering::Relaxed);
    let source_note_id = pa.source_note_id.clone();

    match kb.commit(pa.clone(), new_id, timestamp) {
        Some(assertion) => {
            if let Some(note_id) = source_note_id {
                note_index.write().entry(note_id).or_default().insert(assertion.id.clone());
            }
            event_sink(Event::Added(assertion.clone()));
            callbacks.dispatch(&Event::Added(assertion.clone()));
            for task in task::generate_tasks_for_assertion(&assertion, kb, rules) {
                inference_queue.push(task);
            }
        }
        None => debug!("commit rejected (duplicate, capacity exhausted, or id collision)"),
    }
}

fn inference_worker_loop(
    inference_queue: Arc<InferenceQueue>,
    kb: Arc<KnowledgeBase>,
    commit_tx: Sender<PotentialAssertion>,
    pause_monitor: Arc<PauseMonitor>,
    running: Arc<AtomicBool>,
    reflexive: FxHashSet<String>,
    state: Arc<Mutex<EngineState>>,
    subst_max_depth: usize,
) {
    while running.load(Ordering::Acquire) {
        pause_monitor.wait_while_paused();
        if !running.load(Ordering::Acquire) {
            break;
        }
        let Some(t) = inference_queue.pop() else {
            break;
        };

        let outcome =
            std::panic::catch_unwind(AssertUnwindSafe(|| task::run_task(t, &kb, &reflexive, subst_max_depth)));
        match outcome {
            Ok(potentials) => {
                for pa in potentials {
                    if commit_tx.send(pa).is_err() {
                        break;
                    }
                }
            }
            Err(_) => {
                error!(kind = "worker-exception", "inference worker panicked while running a task");
                enter_error_and_recover(&state);
            }
        }
    }
}
