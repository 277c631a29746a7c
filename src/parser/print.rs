//! Pretty-printer: the inverse of [`super::parse_rule`] (and its sibling
//! `parse_*` entry points), following the same concrete syntax so
//! `parse(print(x)) == x` up to the variable renaming `structurally_equivalent`
//! already accounts for.

use std::fmt::Write as _;

use crate::event::Event;
use crate::rule::{Rule, RuleSource};
use crate::state::{State, SnapshotId};
use crate::term::Message;

pub fn print_message(message: &Message) -> String {
    message.to_string()
}

pub fn print_event(event: &Event) -> String {
    event.to_string()
}

pub fn print_state(state: &State) -> String {
    state.to_string()
}

/// Render a rule back to text. Snapshots print under their own declared
/// label (the arena keeps it, `state.rs`'s `Snapshot::label`), so premise
/// references and ordering constraints round-trip without remapping.
pub fn print_rule(rule: &Rule) -> String {
    let mut out = String::new();

    if let Some(label) = &rule.core().label {
        let _ = write!(out, "{label} = ");
    }

    if !rule.guard().is_empty() {
        let mut terms = Vec::new();
        for (a, b) in rule.guard().ununified_terms() {
            terms.push(format!("{a} ~/> {b}"));
        }
        for (a, b) in rule.guard().ununifiable_terms() {
            terms.push(format!("{a} =/= {b}"));
        }
        let _ = write!(out, "[{}] ", terms.join(", "));
    }

    let premises: Vec<String> = rule.premises().iter().map(|e| e.to_string()).collect();
    out.push_str(&premises.join(", "));

    out.push_str("-[");
    let arena = rule.snapshots();
    let ids: Vec<SnapshotId> = arena.ids().collect();
    let snapshot_text: Vec<String> = ids
        .iter()
        .map(|id| format!("({}, {})", arena.get(*id).condition, arena.get(*id).label))
        .collect();
    out.push_str(&snapshot_text.join(", "));

    let mut orderings = Vec::new();
    for id in &ids {
        let snapshot = arena.get(*id);
        for before in &snapshot.later_than {
            orderings.push(format!("{} =< {}", arena.get(*before).label, snapshot.label));
        }
        for before in &snapshot.modified_later_than {
            orderings.push(format!("{} <@ {}", arena.get(*before).label, snapshot.label));
        }
    }
    if !orderings.is_empty() {
        let _ = write!(out, " : {{{}}}", orderings.join(", "));
    }
    out.push_str("]->");

    match rule {
        Rule::StateConsistent(r) => {
            out.push_str(&r.result.to_string());
        }
        Rule::StateTransferring(r) => {
            let transfer_text: Vec<String> = r
                .transfers
                .iter()
                .map(|(id, state)| format!("<{}:{state}>", arena.get(*id).label))
                .collect();
            out.push_str(&transfer_text.join(""));
        }
    }

    out
}

/// Render a rule's original parsed text when available, falling back to
/// re-rendering its structure (e.g. for rules synthesized by elaboration).
pub fn print_rule_source(rule: &Rule) -> String {
    match rule.source() {
        RuleSource::Parsed { text } => text.clone(),
        RuleSource::Generated { .. } => print_rule(rule),
    }
}
