//! Unification, matching, substitution, and rewriting (§4.2).
//!
//! All four operations share one binding representation, [`Bindings`]: a
//! map from variable name to term. `unify` and `match_term` both thread a
//! `Bindings` through recursive calls and fail by returning `None`;
//! `substitute` and `rewrite` build on top of them.

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::term::Term;

/// Maximum number of fixpoint iterations [`substitute`] will perform
/// before giving up and returning the term as-is (§4.2, §6.3 `subst_max_depth`).
pub const DEFAULT_MAX_SUBST_DEPTH: usize = 50;

/// A variable → term environment, threaded through unification and matching.
///
/// `IndexMap` rather than `HashMap`/`FxHashMap`: insertion order is
/// preserved, which keeps `substitute`'s fixpoint iteration deterministic
/// and is handy when debugging a derivation's binding trail.
pub type Bindings = IndexMap<SmolStr, Term>;

/// Follow a chain of variable bindings to its end: if `t` is a bound
/// variable, look up what it's bound to, and repeat.
fn resolve<'a>(t: &'a Term, env: &'a Bindings) -> &'a Term {
    let mut current = t;
    while let Some(name) = current.as_variable() {
        match env.get(name) {
            Some(next) if next != current => current = next,
            _ => break,
        }
    }
    current
}

/// `true` iff `var` occurs anywhere in `t` once `env`'s bindings are
/// followed (L3: the occurs check).
fn occurs(var: &str, t: &Term, env: &Bindings) -> bool {
    let t = resolve(t, env);
    match t.as_variable() {
        Some(name) => name == var,
        None => match t.as_list() {
            Some(items) => items.iter().any(|child| occurs(var, child, env)),
            None => false,
        },
    }
}

fn bind(var: &str, value: &Term, mut env: Bindings) -> Option<Bindings> {
    if occurs(var, value, &env) {
        return None;
    }
    env.insert(SmolStr::new(var), value.clone());
    Some(env)
}

/// Full two-way unification with occurs check (§4.2 "Unification").
///
/// Both `x` and `y` may contain variables to be bound. Returns an updated
/// environment on success.
pub fn unify(x: &Term, y: &Term, env: Bindings) -> Option<Bindings> {
    let x = resolve(x, &env).clone();
    let y = resolve(y, &env).clone();

    if let (Some(a), Some(b)) = (x.as_variable(), y.as_variable()) {
        if a == b {
            return Some(env);
        }
    }
    if let Some(vx) = x.as_variable() {
        return bind(vx, &y, env);
    }
    if let Some(vy) = y.as_variable() {
        return bind(vy, &x, env);
    }
    match (x.as_atom(), y.as_atom()) {
        (Some(a), Some(b)) => return (a == b).then_some(env),
        _ => {}
    }
    match (x.as_list(), y.as_list()) {
        (Some(xs), Some(ys)) => {
            if xs.len() != ys.len() {
                return None;
            }
            let mut env = env;
            for (a, b) in xs.iter().zip(ys.iter()) {
                env = unify(a, b, env)?;
            }
            Some(env)
        }
        _ => None,
    }
}

/// One-way matching: only variables in `pattern` may be bound (§4.2
/// "Matching"). No occurs check — `pattern` and `term` are assumed
/// disjoint in variable scope at the call sites this crate uses
/// (rule antecedents vs. ground/partially-ground KB terms).
pub fn match_term(pattern: &Term, term: &Term, env: Bindings) -> Option<Bindings> {
    if let Some(name) = pattern.as_variable() {
        if let Some(bound) = env.get(name).cloned() {
            return match_term(&bound, term, env);
        }
        let mut env = env;
        env.insert(SmolStr::new(name), term.clone());
        return Some(env);
    }
    match (pattern.as_atom(), term.as_atom()) {
        (Some(a), Some(b)) => return (a == b).then_some(env),
        _ => {}
    }
    match (pattern.as_list(), term.as_list()) {
        (Some(ps), Some(ts)) => {
            if ps.len() != ts.len() {
                return None;
            }
            let mut env = env;
            for (p, t) in ps.iter().zip(ts.iter()) {
                env = match_term(p, t, env)?;
            }
            Some(env)
        }
        _ => None,
    }
}

/// Apply `env` to `t` once.
fn substitute_once(t: &Term, env: &Bindings) -> Term {
    if let Some(name) = t.as_variable() {
        if let Some(bound) = env.get(name) {
            return bound.clone();
        }
        return t.clone();
    }
    if let Some(items) = t.as_list() {
        let new_items: Vec<Term> = items.iter().map(|c| substitute_once(c, env)).collect();
        // Avoid rebuilding (and re-hashing) a list whose children are
        // all pointer-identical to the originals.
        if new_items.iter().zip(items.iter()).all(|(a, b)| a == b) {
            return t.clone();
        }
        return Term::list(new_items);
    }
    t.clone()
}

/// Apply `env` to `t`, re-applying up to [`DEFAULT_MAX_SUBST_DEPTH`] times
/// until a fixpoint is reached (§4.2 "Substitution"). If the depth cap is
/// hit without converging, logs a warning and returns the last term
/// produced (§7 `substitution-depth-exceeded`).
pub fn substitute(t: &Term, env: &Bindings) -> Term {
    substitute_bounded(t, env, DEFAULT_MAX_SUBST_DEPTH)
}

/// As [`substitute`], with an explicit depth bound (§6.3 `subst_max_depth`).
pub fn substitute_bounded(t: &Term, env: &Bindings, max_depth: usize) -> Term {
    let mut current = t.clone();
    for _ in 0..max_depth {
        let next = substitute_once(&current, env);
        if next == current {
            return next;
        }
        current = next;
    }
    tracing::warn!(
        kind = "substitution-depth-exceeded",
        max_depth,
        "substitution did not reach a fixpoint; returning current term"
    );
    current
}

/// Find the first leftmost-outermost subterm of `target` matching `lhs`,
/// and replace it with `rhs` under the discovered bindings (§4.2
/// "Rewriting"). Returns `None` if no subterm matches.
pub fn rewrite(target: &Term, lhs: &Term, rhs: &Term) -> Option<Term> {
    rewrite_bounded(target, lhs, rhs, DEFAULT_MAX_SUBST_DEPTH)
}

/// As [`rewrite`], with an explicit substitution depth bound (§6.3 `subst_max_depth`).
pub fn rewrite_bounded(target: &Term, lhs: &Term, rhs: &Term, max_depth: usize) -> Option<Term> {
    if let Some(env) = match_term(lhs, target, Bindings::new()) {
        return Some(substitute_bounded(rhs, &env, max_depth));
    }
    let items = target.as_list()?;
    for (i, child) in items.iter().enumerate() {
        if let Some(rewritten_child) = rewrite_bounded(child, lhs, rhs, max_depth) {
            let mut new_items = items.to_vec();
            new_items[i] = rewritten_child;
            return Some(Term::list(new_items));
        }
    }
    None
}
