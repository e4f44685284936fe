//! Assertion and PotentialAssertion records (§3).

use rustc_hash::FxHashSet;

use crate::term::Term;

/// The reflexive predicates used for the triviality check (§4.4 step 1,
/// §6.3 `reflexive_predicates`).
pub const DEFAULT_REFLEXIVE_PREDICATES: &[&str] = &[
    "instance",
    "subclass",
    "subrelation",
    "equivalent",
    "same",
    "equal",
    "domain",
    "range",
];

/// `true` iff `kif` is a 3-element list `(op a b)` where `op` is `=` or one
/// of `reflexive_predicates`, and `a` and `b` are structurally equal (§4.4
/// step 1, glossary "Trivial assertion").
pub fn is_trivial(kif: &Term, reflexive_predicates: &FxHashSet<String>) -> bool {
    let Some(items) = kif.as_list() else {
        return false;
    };
    if items.len() != 3 {
        return false;
    }
    let Some(op) = items[0].as_atom() else {
        return false;
    };
    let reflexive = op == "=" || reflexive_predicates.contains(op);
    reflexive && items[1] == items[2]
}

/// `true` iff `kif` is `(= lhs rhs)` (top operator `=`, arity 3).
pub fn is_equality(kif: &Term) -> bool {
    matches!(kif.as_list(), Some(items) if items.len() == 3 && items[0].as_atom() == Some("="))
}

/// `true` iff `kif` is an equality and `weight(lhs) > weight(rhs)` — used
/// left-to-right as a rewrite rule (glossary "Oriented equality").
pub fn is_oriented_equality(kif: &Term) -> bool {
    match kif.as_list() {
        Some(items) if items.len() == 3 && items[0].as_atom() == Some("=") => {
            items[1].weight() > items[2].weight()
        }
        _ => false,
    }
}

/// A candidate fact submitted to the commit queue, not yet an
/// [`Assertion`] (§3 `PotentialAssertion`).
#[derive(Debug, Clone)]
pub struct PotentialAssertion {
    pub kif: Term,
    pub priority: f64,
    pub support: FxHashSet<String>,
    /// Provenance only: the rule or equality id that derived this
    /// potential assertion, if any.
    pub source_id: Option<String>,
    pub is_equality: bool,
    pub is_oriented_equality: bool,
    pub source_note_id: Option<String>,
}

impl PotentialAssertion {
    /// Build a `PotentialAssertion` for a ground input fact, computing the
    /// equality flags from `kif` itself.
    pub fn input(kif: Term, priority: f64, source_note_id: Option<String>) -> Self {
        let is_equality = is_equality(&kif);
        let is_oriented_equality = is_oriented_equality(&kif);
        Self {
            kif,
            priority,
            support: FxHashSet::default(),
            source_id: None,
            is_equality,
            is_oriented_equality,
            source_note_id,
        }
    }

    /// Build a `PotentialAssertion` derived from inference, with support
    /// and provenance already known.
    pub fn derived(
        kif: Term,
        priority: f64,
        support: FxHashSet<String>,
        source_id: Option<String>,
        source_note_id: Option<String>,
    ) -> Self {
        let is_equality = is_equality(&kif);
        let is_oriented_equality = is_oriented_equality(&kif);
        Self {
            kif,
            priority,
            support,
            source_id,
            is_equality,
            is_oriented_equality,
            source_note_id,
        }
    }
}

/// A committed fact in the knowledge base (§3 `Assertion`).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Assertion {
    pub id: String,
    pub kif: Term,
    pub priority: f64,
    pub timestamp: u64,
    pub source_note_id: Option<String>,
    pub support: FxHashSet<String>,
    pub is_equality: bool,
    pub is_oriented_equality: bool,
}

impl Assertion {
    pub fn from_potential(id: String, pa: PotentialAssertion, timestamp: u64) -> Self {
        Self {
            id,
            kif: pa.kif,
            priority: pa.priority,
            timestamp,
            source_note_id: pa.source_note_id,
            support: pa.support,
            is_equality: pa.is_equality,
            is_oriented_equality: pa.is_oriented_equality,
        }
    }

    /// The left-hand side of an oriented equality; panics if this
    /// assertion isn't one. Callers must check [`Assertion::is_oriented_equality`] first.
    pub fn lhs(&self) -> &Term {
        &self.kif.as_list().expect("equality kif is a list")[1]
    }

    pub fn rhs(&self) -> &Term {
        &self.kif.as_list().expect("equality kif is a list")[2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Term;

    fn atom(s: &str) -> Term {
        Term::atom(s)
    }
    fn list(items: Vec<Term>) -> Term {
        Term::list(items)
    }
    fn reflexive_set() -> FxHashSet<String> {
        DEFAULT_REFLEXIVE_PREDICATES.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn reflexive_predicate_with_identical_args_is_trivial() {
        // B2
        let t = list(vec![atom("instance"), atom("X"), atom("X")]);
        assert!(is_trivial(&t, &reflexive_set()));
    }

    #[test]
    fn equality_with_identical_args_is_trivial() {
        let t = list(vec![atom("="), atom("y"), atom("y")]);
        assert!(is_trivial(&t, &reflexive_set()));
    }

    #[test]
    fn non_reflexive_predicate_is_not_trivial() {
        let t = list(vec![atom("likes"), atom("X"), atom("X")]);
        assert!(!is_trivial(&t, &reflexive_set()));
    }

    #[test]
    fn oriented_equality_requires_heavier_lhs() {
        let t = list(vec![atom("="), list(vec![atom("double"), atom("2")]), atom("4")]);
        assert!(is_equality(&t));
        assert!(is_oriented_equality(&t));

        let reversed = list(vec![atom("="), atom("4"), list(vec![atom("double"), atom("2")])]);
        assert!(!is_oriented_equality(&reversed));
    }
}
