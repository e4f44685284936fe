//! Inference tasks and task generation (§4.7, §4.8, §4.9).

use std::collections::VecDeque;

use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::kb::assertion::is_trivial;
use crate::kb::{Assertion, KnowledgeBase, PotentialAssertion};
use crate::rules::{Rule, RuleStore};
use crate::unify::{self, Bindings};

/// One item of work for an inference worker (§3 `InferenceTask`).
pub struct InferenceTask {
    pub priority: f64,
    pub kind: TaskKind,
}

pub enum TaskKind {
    /// Continue matching a rule's remaining antecedent clauses after clause
    /// `matched_clause_index` unified with `trigger` under `bindings` (§4.7).
    MatchAntecedent {
        rule: Rule,
        trigger: Assertion,
        matched_clause_index: usize,
        bindings: Bindings,
    },
    /// Rewrite `target.kif` using `rewrite_rule` as an oriented equality (§4.7).
    ApplyOrderedRewrite { rewrite_rule: Assertion, target: Assertion },
}

/// `0.95 x min{priority(a) | a in support, resolvable in KB}`, or `base` if
/// `support` is empty or nothing in it resolves (§4.9).
pub fn derived_priority(support: &FxHashSet<String>, base: f64, kb: &KnowledgeBase) -> f64 {
    if support.is_empty() {
        return base;
    }
    let min = support
        .iter()
        .filter_map(|id| kb.get_assertion(id))
        .map(|a| a.priority)
        .fold(None, |acc: Option<f64>, p| Some(acc.map_or(p, |m| m.min(p))));
    match min {
        Some(m) => 0.95 * m,
        None => base,
    }
}

/// BFS over `support` looking for one consistently-inherited
/// `source_note_id` (§4.9). Returns `None` if the search is inconsistent,
/// empty, or hits a support id missing from the KB.
pub fn common_note_id(support: &FxHashSet<String>, kb: &KnowledgeBase) -> Option<String> {
    let mut queue: VecDeque<String> = support.iter().cloned().collect();
    let mut visited: FxHashSet<String> = FxHashSet::default();
    let mut found: Option<String> = None;
    while let Some(id) = queue.pop_front() {
        if !visited.insert(id.clone()) {
            continue;
        }
        let assertion = kb.get_assertion(&id)?;
        match &assertion.source_note_id {
            Some(note) => match &found {
                None => found = Some(note.clone()),
                Some(existing) if existing != note => return None,
                _ => {}
            },
            None => queue.extend(assertion.support.iter().cloned()),
        }
    }
    found
}

/// Rule-firing and rewrite-firing task generation for a newly committed
/// assertion `n` (§4.8 steps 1-2).
pub fn generate_tasks_for_assertion(n: &Assertion, kb: &KnowledgeBase, rules: &RuleStore) -> Vec<InferenceTask> {
    let mut tasks = Vec::new();
    let n_op = n.kif.operator();

    for rule in rules.get_all() {
        for (i, clause) in rule.antecedent_clauses.iter().enumerate() {
            let clause_op = clause.operator();
            if clause_op.is_some() && clause_op != n_op {
                continue;
            }
            if let Some(bindings) = unify::unify(clause, &n.kif, Bindings::new()) {
                let priority = (rule.priority + n.priority) / 2.0;
                tasks.push(InferenceTask {
                    priority,
                    kind: TaskKind::MatchAntecedent {
                        rule: rule.clone(),
                        trigger: n.clone(),
                        matched_clause_index: i,
                        bindings,
                    },
                });
            }
        }
    }

    if n.is_oriented_equality {
        let lhs = n.lhs().clone();
        for m in kb.find_instances_of(&lhs) {
            if m.id != n.id {
                let priority = (n.priority + m.priority) / 2.0;
                tasks.push(InferenceTask {
                    priority,
                    kind: TaskKind::ApplyOrderedRewrite {
                        rewrite_rule: n.clone(),
                        target: m,
                    },
                });
            }
        }
    } else {
        for e in kb.oriented_equalities() {
            if unify::match_term(e.lhs(), &n.kif, Bindings::new()).is_some() {
                let priority = (e.priority + n.priority) / 2.0;
                tasks.push(InferenceTask {
                    priority,
                    kind: TaskKind::ApplyOrderedRewrite {
                        rewrite_rule: e.clone(),
                        target: n.clone(),
                    },
                });
            }
        }
    }

    tasks
}

/// Match a newly added rule against every existing assertion (§4.8 step
/// 3). Parallelized over the KB snapshot with `rayon`: independent
/// unification attempts, no shared mutable state.
pub fn generate_tasks_for_new_rule(rule: &Rule, kb: &KnowledgeBase) -> Vec<InferenceTask> {
    kb.get_all()
        .into_par_iter()
        .flat_map_iter(|a| {
            let rule = rule.clone();
            let a_op = a.kif.operator().map(str::to_string);
            (0..rule.antecedent_clauses.len()).filter_map(move |i| {
                let clause = &rule.antecedent_clauses[i];
                let clause_op = clause.operator();
                if clause_op.is_some() && clause_op != a_op.as_deref() {
                    return None;
                }
                let bindings = unify::unify(clause, &a.kif, Bindings::new())?;
                let priority = (rule.priority + a.priority) / 2.0;
                Some(InferenceTask {
                    priority,
                    kind: TaskKind::MatchAntecedent {
                        rule: rule.clone(),
                        trigger: a.clone(),
                        matched_clause_index: i,
                        bindings,
                    },
                })
            })
        })
        .collect()
}

fn match_remaining(
    rule: &Rule,
    remaining: &[usize],
    env: Bindings,
    support: FxHashSet<String>,
    kb: &KnowledgeBase,
    reflexive: &FxHashSet<String>,
    max_depth: usize,
) -> Vec<PotentialAssertion> {
    let Some((&idx, rest)) = remaining.split_first() else {
        let derived = unify::substitute_bounded(&rule.consequent, &env, max_depth);
        if derived.is_ground_list() && !is_trivial(&derived, reflexive) {
            let priority = derived_priority(&support, rule.priority, kb);
            let note_id = common_note_id(&support, kb);
            return vec![PotentialAssertion::derived(
                derived,
                priority,
                support,
                Some(rule.id.clone()),
                note_id,
            )];
        }
        return Vec::new();
    };

    let clause = &rule.antecedent_clauses[idx];
    let clause_prime = unify::substitute_bounded(clause, &env, max_depth);
    let mut out = Vec::new();
    for candidate in kb.find_unifiable_assertions(&clause_prime) {
        if let Some(env_prime) = unify::unify(&clause_prime, &candidate.kif, env.clone()) {
            let mut support_prime = support.clone();
            support_prime.insert(candidate.id.clone());
            out.extend(match_remaining(
                rule,
                rest,
                env_prime,
                support_prime,
                kb,
                reflexive,
                max_depth,
            ));
        }
    }
    out
}

/// Run a `MATCH_ANTECEDENT` task to completion, producing zero or more
/// derived potential assertions (§4.7).
pub fn run_match_antecedent(
    rule: &Rule,
    trigger: &Assertion,
    matched_clause_index: usize,
    bindings: Bindings,
    kb: &KnowledgeBase,
    reflexive: &FxHashSet<String>,
    max_depth: usize,
) -> Vec<PotentialAssertion> {
    let mut support = FxHashSet::default();
    support.insert(trigger.id.clone());
    let remaining: Vec<usize> = (0..rule.antecedent_clauses.len())
        .filter(|&i| i != matched_clause_index)
        .collect();
    match_remaining(rule, &remaining, bindings, support, kb, reflexive, max_depth)
}

/// Run an `APPLY_ORDERED_REWRITE` task (§4.7). `PotentialAssertion::derived`
/// recomputes `is_equality`/`is_oriented_equality` from the rewritten
/// term's own operands, satisfying the "recompute if itself an equality"
/// rule automatically.
pub fn run_apply_ordered_rewrite(
    rewrite_rule: &Assertion,
    target: &Assertion,
    reflexive: &FxHashSet<String>,
    max_depth: usize,
) -> Option<PotentialAssertion> {
    if !(rewrite_rule.is_equality && rewrite_rule.is_oriented_equality) {
        return None;
    }
    let lhs = rewrite_rule.lhs();
    let rhs = rewrite_rule.rhs();
    let rewritten = unify::rewrite_bounded(&target.kif, lhs, rhs, max_depth)?;
    if rewritten == target.kif || !rewritten.is_list() {
        return None;
    }
    if is_trivial(&rewritten, reflexive) {
        return None;
    }

    let mut support = target.support.clone();
    support.insert(target.id.clone());
    support.insert(rewrite_rule.id.clone());

    Some(PotentialAssertion::derived(
        rewritten,
        0.0, // overwritten by caller via derived_priority below
        support,
        Some(rewrite_rule.id.clone()),
        None,
    ))
}

/// Dispatch one [`InferenceTask`] to completion, returning the potential
/// assertions it derived.
pub fn run_task(
    task: InferenceTask,
    kb: &KnowledgeBase,
    reflexive: &FxHashSet<String>,
    max_depth: usize,
) -> Vec<PotentialAssertion> {
    match task.kind {
        TaskKind::MatchAntecedent {
            rule,
            trigger,
            matched_clause_index,
            bindings,
        } => run_match_antecedent(&rule, &trigger, matched_clause_index, bindings, kb, reflexive, max_depth),
        TaskKind::ApplyOrderedRewrite { rewrite_rule, target } => {
            match run_apply_ordered_rewrite(&rewrite_rule, &target, reflexive, max_depth) {
                Some(mut pa) => {
                    pa.priority = derived_priority(&pa.support, task.priority, kb);
                    pa.source_note_id = common_note_id(&pa.support, kb);
                    vec![pa]
                }
                None => Vec::new(),
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
    fn reflexive() -> FxHashSet<String> {
        crate::kb::DEFAULT_REFLEXIVE_PREDICATES.iter().map(|s| s.to_string()).collect()
    }

    fn kb_with(facts: Vec<Term>) -> KnowledgeBase {
        let kb = KnowledgeBase::new(100, Box::new(|_| {}));
        for (i, f) in facts.into_iter().enumerate() {
            kb.commit(PotentialAssertion::input(f, 1.0, None), format!("fact-{i}"), i as u64);
        }
        kb
    }

    #[test]
    fn derived_priority_decays_from_minimum_support_priority() {
        let kb = KnowledgeBase::new(100, Box::new(|_| {}));
        kb.commit(PotentialAssertion::input(atom("a"), 2.0, None), "fact-0".into(), 0);
        kb.commit(PotentialAssertion::input(atom("b"), 4.0, None), "fact-1".into(), 1);
        let mut support = FxHashSet::default();
        support.insert("fact-0".to_string());
        support.insert("fact-1".to_string());
        assert_eq!(derived_priority(&support, 1.0, &kb), 0.95 * 2.0);
    }

    #[test]
    fn derived_priority_falls_back_to_base_when_support_empty() {
        let kb = KnowledgeBase::new(100, Box::new(|_| {}));
        assert_eq!(derived_priority(&FxHashSet::default(), 3.0, &kb), 3.0);
    }

    #[test]
    fn common_note_id_adopts_consistent_note() {
        let kb = KnowledgeBase::new(100, Box::new(|_| {}));
        kb.commit(
            PotentialAssertion::input(atom("a"), 1.0, Some("note-1".into())),
            "fact-0".into(),
            0,
        );
        let mut support = FxHashSet::default();
        support.insert("fact-0".to_string());
        assert_eq!(common_note_id(&support, &kb), Some("note-1".to_string()));
    }

    #[test]
    fn common_note_id_rejects_inconsistent_notes() {
        let kb = KnowledgeBase::new(100, Box::new(|_| {}));
        kb.commit(
            PotentialAssertion::input(atom("a"), 1.0, Some("note-1".into())),
            "fact-0".into(),
            0,
        );
        kb.commit(
            PotentialAssertion::input(atom("b"), 1.0, Some("note-2".into())),
            "fact-1".into(),
            1,
        );
        let mut support = FxHashSet::default();
        support.insert("fact-0".to_string());
        support.insert("fact-1".to_string());
        assert_eq!(common_note_id(&support, &kb), None);
    }

    #[test]
    fn run_match_antecedent_derives_modus_ponens_consequent() {
        // S1: (=> (instance ?x Dog) (mammal ?x)), fact (instance Rex Dog).
        let rule = Rule {
            id: "rule-0".into(),
            rule_form: list(vec![
                atom("=>"),
                list(vec![atom("instance"), var("?x"), atom("Dog")]),
                list(vec![atom("mammal"), var("?x")]),
            ]),
            antecedent: list(vec![atom("instance"), var("?x"), atom("Dog")]),
            consequent: list(vec![atom("mammal"), var("?x")]),
            priority: 1.0,
            antecedent_clauses: vec![list(vec![atom("instance"), var("?x"), atom("Dog")])],
        };
        let kb = kb_with(vec![]);
        let trigger = Assertion::from_potential(
            "fact-0".into(),
            PotentialAssertion::input(list(vec![atom("instance"), atom("Rex"), atom("Dog")]), 1.0, None),
            0,
        );
        let mut bindings = Bindings::new();
        bindings.insert("?x".into(), atom("Rex"));
        let derived = run_match_antecedent(&rule, &trigger, 0, bindings, &kb, &reflexive(), unify::DEFAULT_MAX_SUBST_DEPTH);
        assert_eq!(derived.len(), 1);
        assert_eq!(derived[0].kif, list(vec![atom("mammal"), atom("Rex")]));
        assert!(derived[0].support.contains("fact-0"));
    }

    #[test]
    fn run_apply_ordered_rewrite_rewrites_target_once() {
        // S3
        let reflexive = reflexive();
        let rewrite_rule = Assertion::from_potential(
            "eq-0".into(),
            PotentialAssertion::input(
                list(vec![atom("="), list(vec![atom("double"), atom("2")]), atom("4")]),
                1.0,
                None,
            ),
            0,
        );
        let target = Assertion::from_potential(
            "fact-0".into(),
            PotentialAssertion::input(
                list(vec![atom("likes"), atom("Sam"), list(vec![atom("double"), atom("2")])]),
                1.0,
                None,
            ),
            0,
        );
        let result =
            run_apply_ordered_rewrite(&rewrite_rule, &target, &reflexive, unify::DEFAULT_MAX_SUBST_DEPTH).unwrap();
        assert_eq!(result.kif, list(vec![atom("likes"), atom("Sam"), atom("4")]));
        assert!(result.support.contains("fact-0"));
        assert!(result.support.contains("eq-0"));
    }
}
