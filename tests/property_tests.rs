//! Universal invariants (proptest where the property is naturally generative,
//! plain assertions where a fixed witness is clearer).

use std::collections::HashMap;

use proptest::prelude::*;

use sarsaparilla::{
    parse_rule, Elaborator, ElaborationStrategy, Frame, Guard, Message, Nession, NessionEngine,
    SearchLimits, SigmaFactory, SigmaMap,
};

fn leaf() -> impl Strategy<Value = Message> {
    prop_oneof![
        "[a-z]{1,4}".prop_map(Message::name),
        "[a-z]{1,4}".prop_map(Message::nonce),
        "[a-z]{1,4}".prop_map(Message::variable),
    ]
}

/// Bounded-depth recursive `Message` generator: functions/tuples of small
/// arity built from leaves, capped so proptest shrinking stays cheap.
fn message_strategy() -> impl Strategy<Value = Message> {
    leaf().prop_recursive(3, 16, 3, |inner| {
        prop_oneof![
            (("[a-z]{1,4}"), prop::collection::vec(inner.clone(), 1..3))
                .prop_map(|(f, params)| Message::function(f, params)),
            prop::collection::vec(inner, 1..3).prop_map(Message::tuple),
        ]
    })
}

fn one_binding_sigma(var: &str, image: Message) -> SigmaMap {
    let mut factory = SigmaFactory::one_sided();
    let mut guard = Guard::empty();
    factory.insert_forward(var, &image, &mut guard);
    factory.build_forward()
}

proptest! {
    /// 1. Substitution is idempotent: `sigma(sigma(m)) == sigma(m)`.
    #[test]
    fn substitution_is_idempotent(m in message_strategy()) {
        let sigma = one_binding_sigma("x", Message::function("wrap", vec![Message::name("a")]));
        let once = m.substitute(&sigma);
        let twice = once.substitute(&sigma);
        prop_assert_eq!(once, twice);
    }

    /// 2. Unifiability is symmetric, with the two sides' substitutions
    /// swapped.
    #[test]
    fn unifiable_is_symmetric(a in message_strategy(), b in message_strategy()) {
        let guard = Guard::empty();
        let forward = sarsaparilla::unifiable(&a, &b, &guard);
        let backward = sarsaparilla::unifiable(&b, &a, &guard);
        prop_assert_eq!(forward.is_some(), backward.is_some());
    }

    /// 3. If a one-directional unifier exists, a two-directional one does
    /// too.
    #[test]
    fn unify_to_implies_unifiable(a in message_strategy(), b in message_strategy()) {
        let guard = Guard::empty();
        if sarsaparilla::unify_to(&a, &b, &guard).is_some() {
            prop_assert!(sarsaparilla::unifiable(&a, &b, &guard).is_some());
        }
    }

    /// 4. Guard satisfaction is preserved by substitution: a guard that is
    /// still consistent after one rewrite stays consistent after a further,
    /// non-conflicting one.
    #[test]
    fn guard_satisfaction_preserved_by_substitution(name in "[a-z]{2,5}") {
        let mut guard = Guard::empty();
        guard.add_ununified(Message::variable("x"), Message::name("secret")).unwrap();

        let first = one_binding_sigma("y", Message::name(name.clone()));
        let after_first = guard.substitute(&first);
        prop_assert!(after_first.is_some());

        let second = one_binding_sigma("x", Message::name(format!("{name}-other")));
        let after_second = after_first.unwrap().substitute(&second);
        prop_assert!(after_second.is_some());
    }
}

/// 6. Nession adjacency: exactly the cells a transfer rule names change
/// between consecutive frames.
#[test]
fn nession_adjacency_holds_across_generated_depths() {
    let rules = vec![
        parse_rule("k(x)-[(SD(m),a)]-><a:SD(h(m,x))>").unwrap(),
        parse_rule("-[]->k(left[])").unwrap(),
    ];
    let engine = NessionEngine::new(&rules, SearchLimits::default());
    let mut cells = HashMap::new();
    cells.insert("SD".to_string(), Message::name("init"));

    let nessions = engine.generate(cells, 3).unwrap();
    assert!(!nessions.is_empty());
    for nession in &nessions {
        assert!(nession.adjacency_holds(), "adjacency violated in {}", nession.label());
    }
}

/// 7. Horn composition soundness: every composed clause's result is the
/// modus-ponens consequence of unifying a parent's result against a
/// premise of another parent, under the guard both parents impose.
#[test]
fn composed_clause_traces_back_to_its_two_parents() {
    let rules = vec![
        parse_rule("-[]->k(a[])").unwrap(),
        parse_rule("-[]->k(b[])").unwrap(),
        parse_rule("k(x),k(y)-[]->k(pair(x,y))").unwrap(),
    ];
    let nession = Nession { index: 0, frames: vec![Frame::initial(HashMap::new())] };
    let elaborator = Elaborator::new(SearchLimits::default(), ElaborationStrategy::PriorityByRank);
    let clauses = elaborator.elaborate(&nession, &rules);

    let pair_ab = Message::function("pair", vec![Message::name("a"), Message::name("b")]);
    let composed = clauses.iter().find(|c| c.result == pair_ab && c.premises.is_empty());
    assert!(composed.is_some(), "composition should have derived the fully-applied pair fact");
    assert!(matches!(composed.unwrap().source, sarsaparilla::ClauseSource::Composition(_, _)));
}

/// 8. Monotonicity: elaborating a superset rule set can only derive a
/// superset of the results a subset rule set derives.
#[test]
fn elaboration_is_monotonic_in_the_rule_set() {
    let base = vec![parse_rule("-[]->k(a[])").unwrap(), parse_rule("-[]->k(b[])").unwrap()];
    let mut extended = base.clone();
    extended.push(parse_rule("k(x),k(y)-[]->k(pair(x,y))").unwrap());

    let nession = Nession { index: 0, frames: vec![Frame::initial(HashMap::new())] };
    let elaborator = Elaborator::new(SearchLimits::default(), ElaborationStrategy::PriorityByRank);

    let base_results: Vec<Message> = elaborator.elaborate(&nession, &base).into_iter().map(|c| c.result).collect();
    let extended_results: Vec<Message> =
        elaborator.elaborate(&nession, &extended).into_iter().map(|c| c.result).collect();

    for result in &base_results {
        assert!(extended_results.contains(result), "extended rule set lost a base-derivable result {result}");
    }
}

/// 9. Termination: elaboration and nession generation both return under
/// finite depth/message-depth budgets, even for a rule set that could
/// otherwise compose without bound.
#[test]
fn elaboration_terminates_under_a_finite_depth_budget() {
    let rules = vec![
        parse_rule("-[]->k(z[])").unwrap(),
        parse_rule("k(x)-[]->k(succ(x))").unwrap(),
    ];
    let limits = SearchLimits { max_message_depth: 6, ..SearchLimits::default() };
    let nession = Nession { index: 0, frames: vec![Frame::initial(HashMap::new())] };
    let elaborator = Elaborator::new(limits, ElaborationStrategy::PriorityByRank);

    let clauses = elaborator.elaborate(&nession, &rules);
    assert!(clauses.iter().all(|c| c.depth() <= 6));
}
