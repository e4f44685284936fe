//! The KIF term model: atoms, variables, and lists.
//!
//! Terms are immutable and value-equal. Each term caches its structural
//! hash, syntactic weight, and free-variable set at construction time —
//! they are read far more often (unification, indexing, rewriting) than
//! they are built, so we pay the bookkeeping cost once.
//!
//! Shape mirrors the teacher's rowan green-tree idiom: an `Arc`-backed
//! immutable node that can be cloned (and shared across worker threads)
//! for the cost of a refcount bump.

#[cfg(any(test, feature = "kif-text", feature = "serde"))]
pub mod reader;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::{FxHashSet, FxHasher};
use smol_str::SmolStr;

/// The three term shapes in the KIF language.
#[derive(Debug)]
enum TermKind {
    Atom(SmolStr),
    Variable(SmolStr),
    List(Vec<Term>),
}

struct TermNode {
    kind: TermKind,
    weight: u32,
    variables: Arc<FxHashSet<SmolStr>>,
    hash: u64,
}

/// An immutable KIF term: an atom, a `?`-prefixed variable, or a list.
///
/// Cloning a `Term` is an `Arc` refcount bump, not a deep copy.
#[derive(Clone)]
pub struct Term(Arc<TermNode>);

fn structural_hash(kind: &TermKind) -> u64 {
    let mut hasher = FxHasher::default();
    match kind {
        TermKind::Atom(s) => {
            0u8.hash(&mut hasher);
            s.hash(&mut hasher);
        }
        TermKind::Variable(s) => {
            1u8.hash(&mut hasher);
            s.hash(&mut hasher);
        }
        TermKind::List(items) => {
            2u8.hash(&mut hasher);
            items.len().hash(&mut hasher);
            for item in items {
                item.0.hash.hash(&mut hasher);
            }
        }
    }
    hasher.finish()
}

impl Term {
    /// Construct an atom term. Panics are never used here — any text is a
    /// valid atom; quoting is decided purely at `kif_string` time.
    pub fn atom(text: impl Into<SmolStr>) -> Term {
        let kind = TermKind::Atom(text.into());
        Self::from_kind(kind)
    }

    /// Construct a variable term.
    ///
    /// Does not validate the `?`-prefix/length invariant (§3) — use
    /// [`crate::error::TermError`]-returning [`Term::variable_checked`]
    /// at trust boundaries; internal construction (substitution, rewriting)
    /// always starts from already-valid variables and skips the check.
    pub fn variable(name: impl Into<SmolStr>) -> Term {
        let kind = TermKind::Variable(name.into());
        Self::from_kind(kind)
    }

    /// Construct a variable term, validating the `?name`, length >= 2 invariant.
    pub fn variable_checked(name: impl Into<SmolStr>) -> Result<Term, crate::error::TermError> {
        let name = name.into();
        if !name.starts_with('?') || name.chars().count() < 2 {
            return Err(crate::error::TermError::InvalidVariable(name.to_string()));
        }
        Ok(Self::variable(name))
    }

    /// Construct a list term from its children.
    pub fn list(items: impl Into<Vec<Term>>) -> Term {
        Self::from_kind(TermKind::List(items.into()))
    }

    fn from_kind(kind: TermKind) -> Term {
        let weight = match &kind {
            TermKind::Atom(_) | TermKind::Variable(_) => 1,
            TermKind::List(items) => 1 + items.iter().map(Term::weight).sum::<u32>(),
        };
        let variables = match &kind {
            TermKind::Atom(_) => Arc::new(FxHashSet::default()),
            TermKind::Variable(name) => {
                let mut set = FxHashSet::default();
                set.insert(name.clone());
                Arc::new(set)
            }
            TermKind::List(items) => {
                let mut set = FxHashSet::default();
                for item in items {
                    set.extend(item.variables().iter().cloned());
                }
                Arc::new(set)
            }
        };
        let hash = structural_hash(&kind);
        Term(Arc::new(TermNode {
            kind,
            weight,
            variables,
            hash,
        }))
    }

    /// `1` for atoms/variables, `1 + sum(weight(children))` for lists (§4.1).
    pub fn weight(&self) -> u32 {
        self.0.weight
    }

    /// The set of variable names appearing anywhere in this term.
    pub fn variables(&self) -> &FxHashSet<SmolStr> {
        &self.0.variables
    }

    /// `true` iff `variables()` is non-empty.
    pub fn contains_variable(&self) -> bool {
        !self.0.variables.is_empty()
    }

    pub fn is_atom(&self) -> bool {
        matches!(self.0.kind, TermKind::Atom(_))
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.0.kind, TermKind::Variable(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self.0.kind, TermKind::List(_))
    }

    pub fn as_atom(&self) -> Option<&str> {
        match &self.0.kind {
            TermKind::Atom(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<&str> {
        match &self.0.kind {
            TermKind::Variable(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Term]> {
        match &self.0.kind {
            TermKind::List(items) => Some(items),
            _ => None,
        }
    }

    /// The text of the first child, when it is an atom (§3).
    pub fn operator(&self) -> Option<&str> {
        self.as_list()?.first()?.as_atom()
    }

    /// Structural hash (precomputed, agrees with [`PartialEq`] — L5).
    pub fn struct_hash(&self) -> u64 {
        self.0.hash
    }

    /// `true` iff this is a ground term (no free variables) and a list.
    pub fn is_ground_list(&self) -> bool {
        self.is_list() && !self.contains_variable()
    }

    /// Canonical textual form (§4.1). Atoms are quoted iff they contain
    /// whitespace, `(`, `)`, `"`, `;`, `?`, or are empty.
    pub fn kif_string(&self) -> String {
        let mut out = String::new();
        self.write_kif(&mut out);
        out
    }

    fn write_kif(&self, out: &mut String) {
        match &self.0.kind {
            TermKind::Atom(s) => {
                if needs_quoting(s) {
                    out.push('"');
                    for c in s.chars() {
                        if c == '"' {
                            out.push('\\');
                        }
                        out.push(c);
                    }
                    out.push('"');
                } else {
                    out.push_str(s);
                }
            }
            TermKind::Variable(s) => out.push_str(s),
            TermKind::List(items) => {
                out.push('(');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    item.write_kif(out);
                }
                out.push(')');
            }
        }
    }
}

fn needs_quoting(s: &str) -> bool {
    s.is_empty()
        || s.chars()
            .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '"' | ';' | '?'))
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        if self.0.hash != other.0.hash {
            return false;
        }
        match (&self.0.kind, &other.0.kind) {
            (TermKind::Atom(a), TermKind::Atom(b)) => a == b,
            (TermKind::Variable(a), TermKind::Variable(b)) => a == b,
            (TermKind::List(a), TermKind::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash.hash(state);
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kif_string())
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kif_string())
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Term {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.kif_string())
    }
}

/// Round-trips through `kif_string()`'s text form via [`reader::try_read_kif`].
#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Term {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = <String as serde::Deserialize>::deserialize(deserializer)?;
        reader::try_read_kif(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: Vec<Term>) -> Term {
        Term::list(items)
    }

    #[test]
    fn atom_and_variable_weight_one() {
        assert_eq!(Term::atom("Dog").weight(), 1);
        assert_eq!(Term::variable("?x").weight(), 1);
    }

    #[test]
    fn list_weight_is_one_plus_children() {
        let t = list(vec![Term::atom("instance"), Term::atom("Rex"), Term::atom("Dog")]);
        assert_eq!(t.weight(), 4);
    }

    #[test]
    fn variables_collects_nested_vars() {
        let t = list(vec![
            Term::atom("p"),
            Term::variable("?x"),
            list(vec![Term::atom("q"), Term::variable("?y"), Term::variable("?x")]),
        ]);
        let vars = t.variables();
        assert_eq!(vars.len(), 2);
        assert!(vars.contains("?x"));
        assert!(vars.contains("?y"));
        assert!(t.contains_variable());
    }

    #[test]
    fn ground_list_has_no_variables() {
        let t = list(vec![Term::atom("instance"), Term::atom("Rex"), Term::atom("Dog")]);
        assert!(!t.contains_variable());
        assert!(t.is_ground_list());
    }

    #[test]
    fn operator_is_first_atom_child() {
        let t = list(vec![Term::atom("instance"), Term::atom("Rex"), Term::atom("Dog")]);
        assert_eq!(t.operator(), Some("instance"));

        let nested_head = list(vec![list(vec![Term::atom("f")]), Term::atom("x")]);
        assert_eq!(nested_head.operator(), None);
    }

    #[test]
    fn structural_equality_ignores_identity() {
        let a = list(vec![Term::atom("p"), Term::variable("?x")]);
        let b = list(vec![Term::atom("p"), Term::variable("?x")]);
        assert_eq!(a, b);
        assert_eq!(a.struct_hash(), b.struct_hash());
    }

    #[test]
    fn kif_string_quotes_special_atoms() {
        assert_eq!(Term::atom("Rex").kif_string(), "Rex");
        assert_eq!(Term::atom("has space").kif_string(), "\"has space\"");
        assert_eq!(Term::atom("").kif_string(), "\"\"");
        let t = list(vec![Term::atom("instance"), Term::atom("Rex"), Term::atom("Dog")]);
        assert_eq!(t.kif_string(), "(instance Rex Dog)");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_round_trips_through_kif_string() {
        use serde::de::IntoDeserializer;
        use serde::Deserialize;

        let t = list(vec![
            Term::atom("instance"),
            Term::variable("?x"),
            list(vec![Term::atom("Dog")]),
        ]);
        let text = t.kif_string();
        let deserializer: serde::de::value::StrDeserializer<serde::de::value::Error> = text.as_str().into_deserializer();
        let round_tripped = Term::deserialize(deserializer).unwrap();
        assert_eq!(round_tripped, t);
    }
}
