//! Rules: the product of parsing, built through a transactional construction
//! pipeline: parse → build the snapshot graph → resolve premise labels →
//! validate safety and acyclicity → immutable `Rule` with an integer id and
//! a provenance tag.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::error::RuleConstructionError;
use crate::event::{Event, EventKind};
use crate::guard::Guard;
use crate::state::{Snapshot, SnapshotArena, SnapshotId, State};
use crate::term::Message;

static NEXT_RULE_ID: AtomicU32 = AtomicU32::new(0);

fn next_rule_id() -> u32 {
    NEXT_RULE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Where a rule came from, for diagnostics and for the pretty-printer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSource {
    /// Parsed from rule-text (see `parse_rule`).
    Parsed { text: String },
    /// Synthesized by the elaborator (composition, Anify/Detuple/Scrub).
    Generated { description: String },
}

impl std::fmt::Display for RuleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleSource::Parsed { text } => write!(f, "parsed({text})"),
            RuleSource::Generated { description } => write!(f, "generated({description})"),
        }
    }
}

/// Fields common to both rule shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleCore {
    pub id: u32,
    pub label: Option<String>,
    pub source: RuleSource,
    pub guard: Guard,
    pub premises: Vec<Event>,
    pub snapshots: SnapshotArena,
}

/// A rule whose result is a `Know`/`New`/`Make` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateConsistentRule {
    pub core: RuleCore,
    pub result: Event,
}

/// A rule whose result transfers one or more cells to new states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateTransferringRule {
    pub core: RuleCore,
    pub transfers: Vec<(SnapshotId, State)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    StateConsistent(StateConsistentRule),
    StateTransferring(StateTransferringRule),
}

impl Rule {
    pub fn id(&self) -> u32 {
        self.core().id
    }

    pub fn core(&self) -> &RuleCore {
        match self {
            Rule::StateConsistent(r) => &r.core,
            Rule::StateTransferring(r) => &r.core,
        }
    }

    pub fn guard(&self) -> &Guard {
        &self.core().guard
    }

    pub fn premises(&self) -> &[Event] {
        &self.core().premises
    }

    pub fn snapshots(&self) -> &SnapshotArena {
        &self.core().snapshots
    }

    pub fn source(&self) -> &RuleSource {
        &self.core().source
    }

    pub fn is_state_transferring(&self) -> bool {
        matches!(self, Rule::StateTransferring(_))
    }

    /// Whether this rule's premises are satisfiable against an empty
    /// nession history, i.e. it declares no snapshots at all.
    pub fn has_no_snapshots(&self) -> bool {
        self.core().snapshots.is_empty()
    }

    /// Structural equivalence up to variable renaming: two rules describe
    /// the same reasoning step if, after consistently renaming variables in
    /// first-occurrence order, their premises/guard/snapshots/result match.
    pub fn structurally_equivalent(&self, other: &Rule) -> bool {
        self.canonical_form() == other.canonical_form()
    }

    fn canonical_form(&self) -> CanonicalRule {
        let mut map = HashMap::new();
        let mut counter = 0usize;

        let premises: Vec<(EventKind, Message)> = self
            .premises()
            .iter()
            .map(|e| (e.kind, canonicalize(&e.message, &mut map, &mut counter)))
            .collect();

        let guard_ununified: Vec<(Message, Message)> = self
            .guard()
            .ununified_terms()
            .iter()
            .map(|(a, b)| {
                (
                    canonicalize(a, &mut map, &mut counter),
                    canonicalize(b, &mut map, &mut counter),
                )
            })
            .collect();
        let guard_ununifiable: Vec<(Message, Message)> = self
            .guard()
            .ununifiable_terms()
            .iter()
            .map(|(a, b)| {
                (
                    canonicalize(a, &mut map, &mut counter),
                    canonicalize(b, &mut map, &mut counter),
                )
            })
            .collect();

        let ids: Vec<SnapshotId> = self.snapshots().ids().collect();
        let position_of = |id: SnapshotId| ids.iter().position(|candidate| *candidate == id).unwrap_or(usize::MAX);

        let snapshots: Vec<(String, Message)> = ids
            .iter()
            .map(|id| {
                let s = self.snapshots().get(*id);
                (s.condition.cell.clone(), canonicalize(&s.condition.value, &mut map, &mut counter))
            })
            .collect();

        let mut orderings: Vec<(usize, usize, bool)> = Vec::new();
        for id in &ids {
            let s = self.snapshots().get(*id);
            for before in &s.later_than {
                orderings.push((position_of(*before), position_of(*id), false));
            }
            for before in &s.modified_later_than {
                orderings.push((position_of(*before), position_of(*id), true));
            }
        }
        orderings.sort_unstable();

        let result = match self {
            Rule::StateConsistent(r) => CanonicalResult::Event(
                r.result.kind,
                canonicalize(&r.result.message, &mut map, &mut counter),
            ),
            Rule::StateTransferring(r) => CanonicalResult::Transfers(
                r.transfers
                    .iter()
                    .map(|(_, s)| (s.cell.clone(), canonicalize(&s.value, &mut map, &mut counter)))
                    .collect(),
            ),
        };

        CanonicalRule { premises, guard_ununified, guard_ununifiable, snapshots, orderings, result }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum CanonicalResult {
    Event(EventKind, Message),
    Transfers(Vec<(String, Message)>),
}

#[derive(Debug, PartialEq, Eq)]
struct CanonicalRule {
    premises: Vec<(EventKind, Message)>,
    guard_ununified: Vec<(Message, Message)>,
    guard_ununifiable: Vec<(Message, Message)>,
    snapshots: Vec<(String, Message)>,
    orderings: Vec<(usize, usize, bool)>,
    result: CanonicalResult,
}

fn canonicalize(m: &Message, map: &mut HashMap<Arc<str>, Arc<str>>, counter: &mut usize) -> Message {
    match m {
        Message::Name(_) | Message::Nonce(_) => m.clone(),
        Message::Variable(v) => {
            let canonical = map.entry(Arc::clone(v)).or_insert_with(|| {
                let name: Arc<str> = Arc::from(format!("V{counter}"));
                *counter += 1;
                name
            });
            Message::Variable(Arc::clone(canonical))
        }
        Message::Function(f, params) => {
            let new_params = params.iter().map(|p| canonicalize(p, map, counter)).collect();
            Message::Function(Arc::clone(f), Arc::new(crate::term::Params::new(new_params)))
        }
        Message::Tuple(members) => {
            let new_members = members.iter().map(|x| canonicalize(x, map, counter)).collect();
            Message::Tuple(Arc::new(crate::term::Params::new(new_members)))
        }
    }
}

/// Declaration gathered while parsing a rule, before the snapshot graph and
/// label resolution have happened.
#[derive(Debug, Clone)]
pub struct SnapshotDecl {
    pub condition: State,
    pub label: String,
}

#[derive(Debug, Clone, Copy)]
pub enum OrderKind {
    LaterThan,
    ModifiedLaterThan,
}

#[derive(Debug, Clone)]
pub enum PendingResult {
    Event(Event),
    Transfers(Vec<(String, State)>),
}

/// Accumulates a rule's pieces during parsing, then validates and freezes
/// them into a [`Rule`] in one transactional step.
#[derive(Debug, Clone, Default)]
pub struct RuleBuilder {
    pub label: Option<String>,
    pub guard: Guard,
    pub premises: Vec<Event>,
    pub snapshot_decls: Vec<SnapshotDecl>,
    pub ordering: Vec<(String, String, OrderKind)>,
    pub result: Option<PendingResult>,
}

impl RuleBuilder {
    pub fn new() -> Self {
        RuleBuilder::default()
    }

    pub fn build(self, source: RuleSource) -> Result<Rule, RuleConstructionError> {
        for premise in &self.premises {
            if premise.kind == EventKind::Accept {
                return Err(RuleConstructionError::AcceptInPremise {
                    event: premise.to_string(),
                });
            }
        }

        let mut seen_labels = HashSet::new();
        for decl in &self.snapshot_decls {
            if !seen_labels.insert(decl.label.clone()) {
                return Err(RuleConstructionError::DuplicateLabel { label: decl.label.clone() });
            }
        }

        let mut arena = SnapshotArena::new();
        let mut label_to_id = HashMap::new();
        for decl in &self.snapshot_decls {
            let id = arena.insert(Snapshot::new(decl.condition.clone(), decl.label.clone()));
            label_to_id.insert(decl.label.clone(), id);
        }

        for (before, after, kind) in &self.ordering {
            let before_id = label_to_id
                .get(before)
                .copied()
                .ok_or_else(|| RuleConstructionError::UnresolvedOrderingLabel { label: before.clone() })?;
            let after_id = label_to_id
                .get(after)
                .copied()
                .ok_or_else(|| RuleConstructionError::UnresolvedOrderingLabel { label: after.clone() })?;
            match kind {
                OrderKind::LaterThan => arena.get_mut(after_id).later_than.push(before_id),
                OrderKind::ModifiedLaterThan => {
                    arena.get_mut(after_id).modified_later_than.push(before_id)
                }
            }
        }

        for premise in &self.premises {
            if let Some(label) = &premise.label {
                if !label_to_id.contains_key(label) {
                    return Err(RuleConstructionError::UnresolvedPremiseLabel { label: label.clone() });
                }
            }
        }

        if let Some(cycle) = arena.find_cycle() {
            return Err(RuleConstructionError::CyclicSnapshotOrdering { labels: cycle });
        }

        let mut scope: HashSet<Arc<str>> = HashSet::new();
        for premise in &self.premises {
            scope.extend(premise.message.variables());
        }
        for decl in &self.snapshot_decls {
            scope.extend(decl.condition.value.variables());
        }

        let result = self.result.ok_or_else(|| RuleConstructionError::UnsafeResultVariable {
            variable: "<no result>".into(),
        })?;

        let core = RuleCore {
            id: next_rule_id(),
            label: self.label,
            source,
            guard: self.guard,
            premises: self.premises,
            snapshots: arena,
        };

        match result {
            PendingResult::Event(event) => {
                for v in event.message.variables() {
                    if !scope.contains(&v) {
                        return Err(RuleConstructionError::UnsafeResultVariable {
                            variable: v.to_string(),
                        });
                    }
                }
                Ok(Rule::StateConsistent(StateConsistentRule { core, result: event }))
            }
            PendingResult::Transfers(transfers) => {
                let mut resolved = Vec::with_capacity(transfers.len());
                for (label, state) in transfers {
                    for v in state.value.variables() {
                        if !scope.contains(&v) {
                            return Err(RuleConstructionError::UnsafeResultVariable {
                                variable: v.to_string(),
                            });
                        }
                    }
                    let id = core
                        .snapshots
                        .find_by_label(&label)
                        .ok_or(RuleConstructionError::UnresolvedOrderingLabel { label: label.clone() })?;
                    resolved.push((id, state));
                }
                Ok(Rule::StateTransferring(StateTransferringRule { core, transfers: resolved }))
            }
        }
    }
}
