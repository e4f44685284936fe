//! Error and diagnostic taxonomy (§7).
//!
//! Two different shapes here, mirroring the teacher's split between
//! `ParseError`/`ParseResult` (real `Result`s, returned to a caller) and
//! `Severity`/`Diagnostic` (values that accompany a result rather than
//! abort it):
//!
//! - [`RuleError`] and [`TermError`] are `thiserror` types returned by
//!   construction helpers that can genuinely fail at a trust boundary.
//! - [`DropReason`] is *not* an error type. It is attached to a dropped
//!   submission purely for logging/introspection (§7's propagation
//!   policy: recoverable conditions are logged and confined to the
//!   offending unit of work, the engine keeps running).

use thiserror::Error;

/// A rule submission whose shape doesn't match §4.5.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("rule form must be a list, got: {0}")]
    NotAList(String),

    #[error("expected (=>/<=> antecedent consequent), got operator {0:?}")]
    UnknownOperator(Option<String>),

    #[error("rule form has {0} top-level elements, expected 3")]
    WrongArity(usize),

    #[error("(forall vars body) vars must be a list of variables")]
    BadForallVars,

    #[error("antecedent clause is not a list: {0}")]
    AntecedentClauseNotList(String),
}

/// A term construction that violates a data-model invariant (§3).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TermError {
    #[error("variable name {0:?} must start with '?' and have length >= 2")]
    InvalidVariable(String),
}

/// Why a [`crate::kb::PotentialAssertion`] never became an [`crate::kb::Assertion`],
/// or why a rule/retraction request was ignored. Logged, never propagated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// `(= x x)` or `(p x x)` for a reflexive predicate (§4.4 step 1).
    Trivial,
    /// A non-equality assertion carried a free variable at submission (§7).
    NonGround,
    /// An identical ground `kif` already exists in the KB (§4.4 step 2).
    Duplicate,
    /// A stored generalization already matches this assertion (§4.4 `is_subsumed`).
    Subsumed,
    /// The KB is at `max_kb_size` and eviction could not make room (§4.4 step 4).
    KbFull,
    /// The freshly-minted id already existed in the store (practically unreachable).
    IdCollision,
}

impl DropReason {
    /// A short machine-stable tag, used in `tracing::warn!` fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::Trivial => "trivial-assertion",
            DropReason::NonGround => "non-ground-assertion",
            DropReason::Duplicate => "duplicate",
            DropReason::Subsumed => "subsumed",
            DropReason::KbFull => "kb-full",
            DropReason::IdCollision => "id-collision",
        }
    }
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
