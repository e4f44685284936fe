//! Path index: an approximate trie over term structure (§4.3).
//!
//! Terms are flattened into a sequence of positional keys — an atom's
//! text, a distinguished `Var` marker for a variable, or (for a list) the
//! operator text or `Var` if the list has none, followed immediately by
//! the keys of its remaining children — and that sequence is walked as a
//! single path through the trie. This is the "one canonical simple
//! scheme" spec.md §4.3 asks for; it deliberately does not attempt to be
//! exact (§9 "do not attempt to make the index exact"). Every query here
//! returns candidate ids that callers re-check with precise
//! [`crate::unify::unify`]/[`crate::unify::match_term`].
//!
//! `find_unifiable` and `find_generalizations` end up sharing a traversal
//! (always follow the `Var` branch, and follow the exact operator/atom
//! branch when present): the trie doesn't distinguish "could unify with"
//! from "could be a generalization of a ground term" any more precisely
//! than that — direction-specific precision is the verification pass's
//! job, not the index's.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

use crate::term::Term;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Key {
    Var,
    Sym(SmolStr),
}

fn key_for_head(items: &[Term]) -> Key {
    match items.first().and_then(Term::as_atom) {
        Some(op) => Key::Sym(SmolStr::new(op)),
        None => Key::Var,
    }
}

/// One node of the trie: a concurrent key → child map, plus the set of
/// assertion ids whose flattened key path ends exactly here.
#[derive(Default)]
struct Node {
    children: RwLock<FxHashMap<Key, Arc<Node>>>,
    ids: RwLock<FxHashSet<String>>,
}

impl Node {
    fn child(&self, key: &Key) -> Option<Arc<Node>> {
        self.children.read().get(key).cloned()
    }

    fn child_or_insert(&self, key: Key) -> Arc<Node> {
        if let Some(existing) = self.children.read().get(&key) {
            return Arc::clone(existing);
        }
        let mut guard = self.children.write();
        Arc::clone(guard.entry(key).or_insert_with(|| Arc::new(Node::default())))
    }

    fn collect_all_ids(&self, out: &mut FxHashSet<String>) {
        out.extend(self.ids.read().iter().cloned());
        for child in self.children.read().values() {
            child.collect_all_ids(out);
        }
    }
}

/// Flatten a term into its positional key sequence (§4.3 keying scheme).
fn flatten(t: &Term, out: &mut Vec<Key>) {
    if let Some(a) = t.as_atom() {
        out.push(Key::Sym(SmolStr::new(a)));
        return;
    }
    if t.is_variable() {
        out.push(Key::Var);
        return;
    }
    let items = t.as_list().expect("term is atom, variable, or list");
    out.push(key_for_head(items));
    let rest: &[Term] = if items.first().is_some_and(Term::is_atom) {
        &items[1..]
    } else {
        items
    };
    for child in rest {
        flatten(child, out);
    }
}

/// A trie-backed index from term structure to candidate assertion ids.
#[derive(Default)]
pub struct PathIndex {
    root: Node,
}

impl PathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `id` under `term`'s flattened key path, creating nodes as needed.
    pub fn insert(&self, term: &Term, id: &str) {
        let mut keys = Vec::new();
        flatten(term, &mut keys);
        insert_rec(&self.root, &keys, id);
    }

    /// Remove `id` from the node reached by `term`'s flattened key path, if present.
    pub fn remove(&self, term: &Term, id: &str) {
        let mut keys = Vec::new();
        flatten(term, &mut keys);
        remove_rec(&self.root, &keys, id);
    }

    /// Candidate ids whose stored term could unify with `q` (§4.3).
    pub fn find_unifiable(&self, q: &Term) -> FxHashSet<String> {
        let mut out = FxHashSet::default();
        collect(&self.root, &[q.clone()], true, &mut out);
        out
    }

    /// Candidate ids whose stored terms are instances of `p` (§4.3).
    pub fn find_instances(&self, p: &Term) -> FxHashSet<String> {
        let mut out = FxHashSet::default();
        collect(&self.root, &[p.clone()], false, &mut out);
        out
    }

    /// Candidate ids whose stored terms are generalizations of ground `q` (§4.3).
    pub fn find_generalizations(&self, q: &Term) -> FxHashSet<String> {
        let mut out = FxHashSet::default();
        collect(&self.root, &[q.clone()], true, &mut out);
        out
    }
}

/// Walk `queue` (a sequence of still-to-be-matched term positions) from
/// `node`, accumulating candidate ids.
///
/// `always_follow_var` distinguishes the `find_instances` traversal
/// (constants in the query must match constants in the stored term
/// exactly — no automatic `Var` bypass) from `find_unifiable`/
/// `find_generalizations` (a stored variable always matches, so the
/// `Var` branch is always explored in addition to the exact branch).
fn collect(node: &Node, queue: &[Term], always_follow_var: bool, out: &mut FxHashSet<String>) {
    let Some((head, rest)) = queue.split_first() else {
        out.extend(node.ids.read().iter().cloned());
        return;
    };

    if head.is_variable() {
        // This slot could be anything; the stored subtree under any
        // branch here is a candidate regardless of its shape.
        node.collect_all_ids(out);
        return;
    }

    if always_follow_var {
        if let Some(var_child) = node.child(&Key::Var) {
            collect(&var_child, rest, always_follow_var, out);
        }
    }

    if let Some(a) = head.as_atom() {
        if let Some(child) = node.child(&Key::Sym(SmolStr::new(a))) {
            collect(&child, rest, always_follow_var, out);
        }
        return;
    }

    let items = head.as_list().expect("head is atom, variable, or list");
    let key = key_for_head(items);
    if let Some(child) = node.child(&key) {
        let sub: &[Term] = if items.first().is_some_and(Term::is_atom) {
            &items[1..]
        } else {
            items
        };
        let mut new_queue = sub.to_vec();
        new_queue.extend_from_slice(rest);
        collect(&child, &new_queue, always_follow_var, out);
    }
}

fn insert_rec(node: &Node, keys: &[Key], id: &str) {
    match keys.split_first() {
        None => {
            node.ids.write().insert(id.to_string());
        }
        Some((key, rest)) => {
            let child = node.child_or_insert(key.clone());
            insert_rec(&child, rest, id);
        }
    }
}

fn remove_rec(node: &Node, keys: &[Key], id: &str) {
    match keys.split_first() {
        None => {
            node.ids.write().remove(id);
        }
        Some((key, rest)) => {
            if let Some(child) = node.child(key) {
                remove_rec(&child, rest, id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Term;

    fn atom(s: &str) -> Term {
        Term::atom(s)
    }
    fn var(s: &str) -> Term {
        Term::variable(s)
    }
    fn list(items: Vec<Term>) -> Term {
        Term::list(items)
    }

    #[test]
    fn exact_ground_term_is_found_by_all_three_queries() {
        let idx = PathIndex::new();
        let t = list(vec![atom("instance"), atom("Rex"), atom("Dog")]);
        idx.insert(&t, "fact-1");

        assert!(idx.find_unifiable(&t).contains("fact-1"));
        assert!(idx.find_instances(&t).contains("fact-1"));
        assert!(idx.find_generalizations(&t).contains("fact-1"));
    }

    #[test]
    fn generalization_query_follows_stored_variable_branch() {
        let idx = PathIndex::new();
        let pattern = list(vec![atom("instance"), var("?x"), atom("Dog")]);
        idx.insert(&pattern, "rule-1");

        let ground = list(vec![atom("instance"), atom("Rex"), atom("Dog")]);
        let candidates = idx.find_generalizations(&ground);
        assert!(candidates.contains("rule-1"));
    }

    #[test]
    fn instances_query_does_not_cross_unrelated_atoms() {
        let idx = PathIndex::new();
        idx.insert(&list(vec![atom("instance"), atom("Rex"), atom("Dog")]), "fact-1");
        idx.insert(&list(vec![atom("instance"), atom("Tom"), atom("Cat")]), "fact-2");

        let pattern = list(vec![atom("instance"), var("?x"), atom("Dog")]);
        let candidates = idx.find_instances(&pattern);
        assert!(candidates.contains("fact-1"));
        // fact-2 has a different constant ("Cat" vs "Dog") and cannot be an
        // instance of this pattern, so a well-behaved index should exclude it
        // even as an over-approximation along this branch.
        assert!(!candidates.contains("fact-2"));
    }

    #[test]
    fn remove_drops_id_from_exact_node() {
        let idx = PathIndex::new();
        let t = list(vec![atom("instance"), atom("Rex"), atom("Dog")]);
        idx.insert(&t, "fact-1");
        idx.remove(&t, "fact-1");
        assert!(!idx.find_instances(&t).contains("fact-1"));
    }
}
