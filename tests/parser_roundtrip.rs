//! Round-trip law: `parse(print(x)) = x` (mod alpha) for messages, events,
//! states, and rules.

use proptest::prelude::*;

use sarsaparilla::{
    parse_event, parse_message, parse_rule, parse_state, print_event, print_message, print_rule,
    print_state, Event, EventKind, Message, State,
};

fn leaf() -> impl Strategy<Value = Message> {
    prop_oneof![
        "[a-z]{1,5}".prop_map(Message::name),
        "[a-z]{1,5}".prop_map(Message::nonce),
        "[a-z]{1,5}".prop_map(Message::variable),
    ]
}

fn message_strategy() -> impl Strategy<Value = Message> {
    leaf().prop_recursive(3, 12, 3, |inner| {
        prop_oneof![
            ("[a-z]{1,5}", prop::collection::vec(inner.clone(), 1..3))
                .prop_map(|(f, params)| Message::function(f, params)),
            prop::collection::vec(inner, 1..3).prop_map(Message::tuple),
        ]
    })
}

proptest! {
    #[test]
    fn message_round_trips(m in message_strategy()) {
        let rendered = print_message(&m);
        let reparsed = parse_message(&rendered).unwrap();
        prop_assert_eq!(m, reparsed);
    }

    #[test]
    fn state_round_trips(cell in "[A-Z]{1,4}", value in message_strategy()) {
        let state = State::new(cell, value);
        let rendered = print_state(&state);
        let reparsed = parse_state(&rendered).unwrap();
        prop_assert_eq!(state, reparsed);
    }

    #[test]
    fn know_event_round_trips(m in message_strategy()) {
        let event = Event { kind: EventKind::Know, message: m, label: None };
        let rendered = print_event(&event);
        let reparsed = parse_event(&rendered).unwrap();
        prop_assert_eq!(event, reparsed);
    }
}

#[test]
fn rule_corpus_round_trips_structurally() {
    let corpus = [
        "-[]->k(a[])",
        "k(x)-[]->k(leak(x))",
        "k(x),k(y)-[]->k(pair(x,y))",
        "k(x)-[(SD(m),a)]-><a:SD(h(m,x))>",
        "-[(SD(init[]),a0),(SD(m),a1):{a0=<a1}]->k(m)",
        "[x~/>secret[],y=/=z]k(x),k(y)-[]->k(wrap(x,y))",
        "-[]->k(<>)",
    ];

    for text in corpus {
        let rule = parse_rule(text).unwrap();
        let rendered = print_rule(&rule);
        let reparsed = parse_rule(&rendered).unwrap();
        assert!(
            rule.structurally_equivalent(&reparsed),
            "round trip failed for {text}: rendered as {rendered}"
        );
    }
}
