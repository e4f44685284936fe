//! Rule parsing and the rule store (§4.5).
//!
//! Accepted input forms: `(=> A C)`, `(<=> A C)`, `(forall vars (=> A C))`,
//! `(forall vars (<=> A C))`. `forall` is unwrapped to its body; `<=>`
//! expands to a forward and a reverse `=>` rule (B5).

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::warn;

use crate::error::RuleError;
use crate::term::Term;

/// A parsed forward-chaining rule (§3 `Rule`).
#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    /// The original `(=> A C)` (or `<=>`-expanded) list, used for
    /// structural dedup (§4.5).
    pub rule_form: Term,
    pub antecedent: Term,
    pub consequent: Term,
    pub priority: f64,
    /// `antecedent` split on a top-level `and`, in declared order (§4.5).
    pub antecedent_clauses: Vec<Term>,
}

fn strip_forall(t: &Term) -> &Term {
    if let Some(items) = t.as_list() {
        if items.len() == 3 && items[0].as_atom() == Some("forall") {
            return &items[2];
        }
    }
    t
}

/// Split an antecedent into its ordered clause list (§4.5): `(and c1 … cn)`
/// splits into `[c1, …, cn]`; anything else is a single clause `[A]`. Every
/// clause must itself be a list.
fn split_antecedent_clauses(antecedent: &Term) -> Result<Vec<Term>, RuleError> {
    if let Some(items) = antecedent.as_list() {
        if items.first().and_then(Term::as_atom) == Some("and") {
            let clauses = &items[1..];
            for c in clauses {
                if !c.is_list() {
                    return Err(RuleError::AntecedentClauseNotList(c.kif_string()));
                }
            }
            return Ok(clauses.to_vec());
        }
    }
    if !antecedent.is_list() {
        return Err(RuleError::AntecedentClauseNotList(antecedent.kif_string()));
    }
    Ok(vec![antecedent.clone()])
}

/// `true` iff every variable free in `consequent` is bound somewhere in
/// `antecedent` (§4.5's non-fatal consequent-variable warning). Variables
/// locally quantified by an inner `exists`/`forall` inside the consequent
/// are excluded from the check, since they are not expected to come from
/// the antecedent.
fn unbound_consequent_vars(antecedent: &Term, consequent: &Term) -> Vec<String> {
    let bound = antecedent.variables();
    let locally_quantified = locally_quantified_vars(consequent);
    consequent
        .variables()
        .iter()
        .filter(|v| !bound.contains(*v) && !locally_quantified.contains(*v))
        .map(|v| v.to_string())
        .collect()
}

fn locally_quantified_vars(t: &Term) -> rustc_hash::FxHashSet<smol_str::SmolStr> {
    let mut out = rustc_hash::FxHashSet::default();
    collect_quantified(t, &mut out);
    out
}

fn collect_quantified(t: &Term, out: &mut rustc_hash::FxHashSet<smol_str::SmolStr>) {
    let Some(items) = t.as_list() else { return };
    if items.len() == 3 && matches!(items[0].as_atom(), Some("exists") | Some("forall")) {
        if let Some(vars) = items[1].as_list() {
            for v in vars {
                if let Some(name) = v.as_variable() {
                    out.insert(name.into());
                }
            }
        }
    }
    for item in items {
        collect_quantified(item, out);
    }
}

/// Parse one `=>` form (after `forall`-unwrapping) into a `Rule`. `rule_form`
/// is the form as submitted by the caller (before any `forall` unwrapping),
/// so two rules that differ only by `forall` wrapping still dedup distinctly
/// — `rule_form` equality is purely structural per §3.
fn parse_implication(rule_form: &Term, body: &Term, priority: f64, id: String) -> Result<Rule, RuleError> {
    let items = body.as_list().ok_or_else(|| RuleError::NotAList(body.kif_string()))?;
    if items.len() != 3 || items[0].as_atom() != Some("=>") {
        return Err(RuleError::WrongArity(items.len()));
    }
    let antecedent = items[1].clone();
    let consequent = items[2].clone();
    let antecedent_clauses = split_antecedent_clauses(&antecedent)?;

    let unbound = unbound_consequent_vars(&antecedent, &consequent);
    if !unbound.is_empty() {
        warn!(
            kind = "unbound-consequent-variable",
            rule_id = %id,
            vars = ?unbound,
            "rule consequent has variables not bound by the antecedent"
        );
    }

    Ok(Rule {
        id,
        rule_form: rule_form.clone(),
        antecedent,
        consequent,
        priority,
        antecedent_clauses,
    })
}

/// Parse a submitted rule form into one or two [`Rule`]s (§4.5). `<=>`
/// expands to a forward and reverse `=>`; `forall` is unwrapped first.
/// `id_prefix` is combined with `-fwd`/`-rev` for a `<=>` expansion, and
/// used as-is for a plain `=>`.
pub fn parse_rule(rule_form: &Term, priority: f64, id_prefix: &str) -> Result<Vec<Rule>, RuleError> {
    let body = strip_forall(rule_form);
    let items = body.as_list().ok_or_else(|| RuleError::NotAList(body.kif_string()))?;
    if items.len() != 3 {
        return Err(RuleError::WrongArity(items.len()));
    }
    match items[0].as_atom() {
        Some("=>") => {
            let rule = parse_implication(rule_form, body, priority, id_prefix.to_string())?;
            Ok(vec![rule])
        }
        Some("<=>") => {
            let a = &items[1];
            let b = &items[2];
            let fwd_body = Term::list(vec![Term::atom("=>"), a.clone(), b.clone()]);
            let rev_body = Term::list(vec![Term::atom("=>"), b.clone(), a.clone()]);
            let fwd = parse_implication(rule_form, &fwd_body, priority, format!("{id_prefix}-fwd"))?;
            let rev = parse_implication(rule_form, &rev_body, priority, format!("{id_prefix}-rev"))?;
            Ok(vec![fwd, rev])
        }
        Some("forall") => Err(RuleError::BadForallVars),
        other => Err(RuleError::UnknownOperator(other.map(str::to_string))),
    }
}

/// A concurrent, structurally-deduplicated set of rules (§4.5, §5: "Rule
/// set... lock-free concurrent sets/maps; single-writer semantics are not
/// required").
#[derive(Default)]
pub struct RuleStore {
    rules: RwLock<FxHashMap<String, Rule>>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `rule`, deduplicating by `rule_form`. Returns `true` iff a
    /// new rule was actually inserted (§4.5: "adding returns whether
    /// insertion happened").
    pub fn insert(&self, rule: Rule) -> bool {
        self.insert_group(vec![rule])
    }

    /// Insert every rule in `group` as a single dedup unit, keyed by the
    /// first rule's `rule_form`. A `<=>` submission parses into two `Rule`s
    /// that deliberately share one `rule_form` (§4.5 "`<=>` expands to two
    /// `=>` rules"); deduping rule-by-rule would reject the second half as
    /// a false duplicate of the first, so the whole group is checked and
    /// inserted atomically. Returns `true` iff the group was new.
    pub fn insert_group(&self, group: Vec<Rule>) -> bool {
        let mut rules = self.rules.write();
        let Some(first) = group.first() else {
            return false;
        };
        if rules.values().any(|r| r.rule_form == first.rule_form) {
            return false;
        }
        for rule in group {
            rules.insert(rule.id.clone(), rule);
        }
        true
    }

    /// Remove every rule whose `rule_form` equals `rule_form` (a `<=>`
    /// submission expands to two stored rules sharing one `rule_form`,
    /// so both are removed together).
    pub fn remove_by_form(&self, rule_form: &Term) -> Vec<Rule> {
        let mut rules = self.rules.write();
        let ids: Vec<String> = rules
            .iter()
            .filter(|(_, r)| &r.rule_form == rule_form)
            .map(|(id, _)| id.clone())
            .collect();
        ids.iter().filter_map(|id| rules.remove(id)).collect()
    }

    pub fn get_all(&self) -> Vec<Rule> {
        self.rules.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }

    pub fn clear(&self) {
        self.rules.write().clear();
    }
}
