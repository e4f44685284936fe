//! Engine Tests - Ordered Rewrite
//!
//! Phase 1: Rewrite-firing layer.
//! An oriented equality `(= (father-of Ada) Bob)` (heavier lhs, §4.4
//! "oriented equality") rewrites any stored assertion containing
//! `(father-of Ada)` into one with `Bob` substituted in its place.

#[path = "common/mod.rs"]
mod common;

use std::time::Duration;

use kif_reasoner::{Engine, PotentialAssertion};

use common::{atom, list, wait_until, CollectingSink};

#[test]
fn oriented_equality_rewrites_matching_fact() {
    common::init_tracing();
    let sink = CollectingSink::new();
    let engine = Engine::new(common::DEFAULT_CONFIG.clone(), sink.sink());
    engine.start();

    engine.submit_potential_assertion(PotentialAssertion::input(
        list(vec![atom("parent"), list(vec![atom("father-of"), atom("Ada")]), atom("Carol")]),
        1.0,
        None,
    ));
    assert!(wait_until(Duration::from_secs(2), || sink.len() >= 1));

    engine.submit_potential_assertion(PotentialAssertion::input(
        list(vec![atom("="), list(vec![atom("father-of"), atom("Ada")]), atom("Bob")]),
        1.0,
        None,
    ));

    assert!(wait_until(Duration::from_secs(2), || sink
        .added_kif_strings()
        .contains(&"(parent Bob Carol)".to_string())));
    engine.stop();
}

#[test]
fn oriented_equality_rewrites_existing_equality_first() {
    common::init_tracing();
    // Submitting the equality before the fact it would rewrite still fires
    // once the fact arrives (rewrite-firing triggers from either side).
    let sink = CollectingSink::new();
    let engine = Engine::new(common::DEFAULT_CONFIG.clone(), sink.sink());
    engine.start();

    engine.submit_potential_assertion(PotentialAssertion::input(
        list(vec![atom("="), list(vec![atom("capital-of"), atom("France")]), atom("Paris")]),
        1.0,
        None,
    ));
    assert!(wait_until(Duration::from_secs(2), || sink.len() >= 1));

    engine.submit_potential_assertion(PotentialAssertion::input(
        list(vec![
            atom("located-in"),
            list(vec![atom("capital-of"), atom("France")]),
            atom("Europe"),
        ]),
        1.0,
        None,
    ));

    assert!(wait_until(Duration::from_secs(2), || sink
        .added_kif_strings()
        .contains(&"(located-in Paris Europe)".to_string())));
    engine.stop();
}
