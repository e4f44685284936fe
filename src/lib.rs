//! # kif-reasoner
//!
//! A priority-driven, concurrent forward-chaining reasoner over a
//! Lisp-like knowledge representation language (KIF): symbols, `?`-prefixed
//! variables, and nested lists. Ingests ground facts, equality axioms, and
//! implication/biconditional rules; derives new facts by matching rule
//! antecedents against stored assertions and by applying oriented
//! equalities as left-to-right rewrite rules (ordered paramodulation).
//! Derived knowledge streams out through an abstract event sink.
//!
//! ## Module structure (dependency order)
//!
//! ```text
//! engine    → scheduler, worker pool, control interface
//!   ↓
//! rules     → rule parsing and the rule store
//! kb        → assertion store, path index, eviction heap
//!   ↓
//! unify     → unification, matching, substitution, rewriting
//!   ↓
//! term      → atoms, variables, lists
//! ```
//!
//! `events`, `config`, `ids`, and `error` are cross-cutting: every layer
//! above `term` depends on them.

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod ids;
pub mod kb;
pub mod rules;
pub mod term;
pub mod unify;

pub use config::EngineConfig;
pub use engine::state::{EngineState, EngineStatus};
pub use engine::Engine;
pub use events::{CallbackRegistry, Event, EventSink};
pub use kb::{Assertion, KnowledgeBase, PotentialAssertion};
pub use rules::{Rule, RuleStore};
pub use term::Term;
