//! End-to-end pipeline tests: parse rule text, build a query, run the
//! orchestrator to completion, and check the outcome. Each test seeds one
//! concrete scenario the core is expected to handle.

use std::collections::HashMap;

use sarsaparilla::{
    make_query_engine, parse_message, parse_rule, Attack, HornClause, Message, Nession,
    OrchestratorConfig, QueryCallbacks, QueryOutcome, QueryStatus,
};

struct RecordingCallbacks {
    level_starts: usize,
    assessed: usize,
    completed: bool,
}

impl RecordingCallbacks {
    fn new() -> Self {
        RecordingCallbacks { level_starts: 0, assessed: 0, completed: false }
    }
}

impl QueryCallbacks for RecordingCallbacks {
    fn on_level_start(&mut self, _depth: usize) {
        self.level_starts += 1;
    }

    fn on_nession_assessed(&mut self, _nession: &Nession, _clauses: &[HornClause], _attack: Option<&Attack>) {
        self.assessed += 1;
    }

    fn on_complete(&mut self, _outcome: &QueryOutcome) {
        self.completed = true;
    }
}

#[test]
fn s1_trivial_knowledge_closure() {
    let rules = vec![
        parse_rule("-[]->k(a[])").unwrap(),
        parse_rule("-[]->k(b[])").unwrap(),
        parse_rule("k(x),k(y)-[]->k(pair(x,y))").unwrap(),
    ];
    let query = parse_message("pair(a[], b[])").unwrap();
    let engine = make_query_engine(rules, HashMap::new(), vec![query], OrchestratorConfig::default());

    let mut callbacks = RecordingCallbacks::new();
    let outcome = engine.execute(&mut callbacks);

    assert_eq!(outcome.status, QueryStatus::AttackFound { depth: None });
    assert!(outcome.attack.is_some());
    assert!(callbacks.completed);
}

#[test]
fn s2_public_key_decryption() {
    let rules = vec![
        parse_rule("k(sk)-[]->k(pk(sk))").unwrap(),
        parse_rule("k(m),k(pub)-[]->k(enc_a(m,pub))").unwrap(),
        parse_rule("k(enc_a(m,pk(sk))),k(sk)-[]->k(m)").unwrap(),
    ];
    let facts = vec![
        parse_rule("-[]->k(sksd[])").unwrap(),
        parse_rule("-[]->k(enc_a(secret[],pk(sksd[])))").unwrap(),
    ];
    let mut all_rules = rules;
    all_rules.extend(facts);

    let query = parse_message("secret[]").unwrap();
    let engine = make_query_engine(all_rules, HashMap::new(), vec![query], OrchestratorConfig::default());

    let mut callbacks = RecordingCallbacks::new();
    let outcome = engine.execute(&mut callbacks);

    assert_eq!(outcome.status, QueryStatus::AttackFound { depth: None });
    assert!(outcome.attack.is_some());
}

#[test]
fn s3_stateful_disclosure_at_depth_two() {
    let rules = vec![
        parse_rule("k(x)-[(SD(m),a)]-><a:SD(h(m,x))>").unwrap(),
        parse_rule("-[(SD(init[]),a0),(SD(m),a1):{a0=<a1}]->k(m)").unwrap(),
        parse_rule("-[]->k(left[])").unwrap(),
    ];
    let mut initial = HashMap::new();
    initial.insert("SD".to_string(), Message::name("init"));

    let query = parse_message("h(init[],left[])").unwrap();
    let engine = make_query_engine(rules, initial, vec![query], OrchestratorConfig::default());

    let mut callbacks = RecordingCallbacks::new();
    let outcome = engine.execute(&mut callbacks);

    assert_eq!(outcome.status, QueryStatus::AttackFound { depth: Some(2) });
    assert!(outcome.attack.is_some());
}

#[test]
fn s3_disclosure_rejects_a_witness_the_adversary_never_learned() {
    let rules = vec![
        parse_rule("k(x)-[(SD(m),a)]-><a:SD(h(m,x))>").unwrap(),
        parse_rule("-[(SD(init[]),a0),(SD(m),a1):{a0=<a1}]->k(m)").unwrap(),
        parse_rule("-[]->k(left[])").unwrap(),
    ];
    let mut initial = HashMap::new();
    initial.insert("SD".to_string(), Message::name("init"));

    // `notknown[]` is never asserted as known anywhere in `rules`, so the
    // transfer's `x` can never be bound to it; the cell's committed value
    // (`h(init, x)` with `x` free) must not let this query unify for free.
    let query = parse_message("h(init[],notknown[])").unwrap();
    let engine = make_query_engine(rules, initial, vec![query], OrchestratorConfig::default());

    let mut callbacks = RecordingCallbacks::new();
    let outcome = engine.execute(&mut callbacks);

    assert_eq!(outcome.status, QueryStatus::Exhausted);
    assert!(outcome.attack.is_none());
}

#[test]
fn s4_guard_prevents_attack() {
    let rules = vec![
        parse_rule("[x~/>secret[]]k(x)-[]->k(leak(x))").unwrap(),
        parse_rule("-[]->k(secret[])").unwrap(),
    ];
    let query = parse_message("leak(secret[])").unwrap();
    let engine = make_query_engine(rules, HashMap::new(), vec![query], OrchestratorConfig::default());

    let mut callbacks = RecordingCallbacks::new();
    let outcome = engine.execute(&mut callbacks);

    assert_eq!(outcome.status, QueryStatus::Exhausted);
    assert!(outcome.attack.is_none());
}

#[test]
fn s5_cancellation_stops_further_assessment() {
    let rules = vec![
        parse_rule("k(x)-[(SD(m),a)]-><a:SD(h(m,x))>").unwrap(),
        parse_rule("-[(SD(init[]),a0),(SD(m),a1):{a0=<a1}]->k(m)").unwrap(),
        parse_rule("-[]->k(left[])").unwrap(),
    ];
    let mut initial = HashMap::new();
    initial.insert("SD".to_string(), Message::name("init"));

    let query = parse_message("unreachable_secret[]").unwrap();
    let config = OrchestratorConfig { max_nession_depth: 20, ..OrchestratorConfig::default() };
    let engine = make_query_engine(rules, initial, vec![query], config);

    engine.cancel();
    let mut callbacks = RecordingCallbacks::new();
    let outcome = engine.execute(&mut callbacks);

    assert_eq!(outcome.status, QueryStatus::Cancelled);
    assert_eq!(callbacks.assessed, 0);
    assert!(callbacks.completed);
}

#[test]
fn s6_round_trip_over_a_rule_corpus() {
    let corpus = [
        "-[]->k(a[])",
        "k(x),k(y)-[]->k(pair(x,y))",
        "k(x)-[(SD(m),a)]-><a:SD(h(m,x))>",
        "-[(SD(init[]),a0),(SD(m),a1):{a0=<a1}]->k(m)",
        "[x~/>secret[]]k(x)-[]->k(leak(x))",
    ];

    for text in corpus {
        let rule = parse_rule(text).unwrap();
        let rendered = sarsaparilla::print_rule(&rule);
        let reparsed = parse_rule(&rendered).unwrap();
        assert!(
            rule.structurally_equivalent(&reparsed),
            "round trip failed for {text}: rendered as {rendered}"
        );
    }
}
