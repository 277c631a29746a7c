//! Nession (nonce-session) engine: bounded symbolic execution over frames of
//! committed cell state.
//!
//! Starting from one initial state per declared cell, the engine
//! iteratively extends the tail frame by state-transferring rules whose
//! snapshot graph unifies into the accumulated history, branching once per
//! valid mapping, collapsing structurally-equivalent branches, and stopping
//! at `max_nession_depth` frames. The bounded-worklist shape follows the
//! same semi-naive fixed-point loop used elsewhere in this crate.

use std::collections::HashMap;

use crate::event::Event;
use crate::execution::{BranchCounter, BudgetError, SearchLimits};
use crate::rule::{Rule, StateConsistentRule};
use crate::state::SnapshotId;
use crate::substitution::SigmaMap;
use crate::term::Message;
use crate::unify::unify_to;

/// One step of committed cell state plus the rules that applied to reach
/// it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Cell name -> committed value, for every declared cell.
    pub cells: HashMap<String, Message>,
    /// State-consistent rules applicable against this frame (carried along
    /// so the elaborator can turn them into rank-tagged Horn clauses
    /// without recomputing applicability).
    pub applicable_rules: Vec<StateConsistentRule>,
    /// The state-transferring rule (if any) that produced this frame from
    /// its predecessor. `None` for the initial frame.
    pub transfer_rule_id: Option<u32>,
    /// Which cells this frame's transfer rule changed, relative to the
    /// prior frame. Empty for the initial frame.
    pub changed_cells: Vec<String>,
    /// The transfer rule's own premises that produced this frame (message
    /// only, substituted by the alignment that fired it), carried forward
    /// cumulatively from the prior frame. A later state-consistent rule
    /// whose snapshot binds a variable introduced by the transfer (e.g. the
    /// `x` in `k(x)-[(SD(m),a)]-><a:SD(h(m,x))>`) must still discharge
    /// these as premises of its own derived clause — otherwise that
    /// variable is free in the resulting clause and any message unifies
    /// with it, reporting an attack the adversary could never mount.
    pub transfer_obligations: Vec<Message>,
}

impl Frame {
    pub fn initial(cells: HashMap<String, Message>) -> Self {
        Frame {
            cells,
            applicable_rules: Vec::new(),
            transfer_rule_id: None,
            changed_cells: Vec::new(),
            transfer_obligations: Vec::new(),
        }
    }
}

/// A finalized sequence of frames, one symbolic run of the protocol.
#[derive(Debug, Clone)]
pub struct Nession {
    pub index: usize,
    pub frames: Vec<Frame>,
}

impl Nession {
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn label(&self) -> String {
        format!("Nession {}", self.index)
    }

    /// True when exactly the cells named by the transfer rule change
    /// between consecutive frames.
    pub fn adjacency_holds(&self) -> bool {
        self.frames.windows(2).all(|pair| {
            let (prev, next) = (&pair[0], &pair[1]);
            let actually_changed: Vec<&String> = prev
                .cells
                .keys()
                .filter(|cell| prev.cells.get(*cell) != next.cells.get(*cell))
                .collect();
            let declared: std::collections::HashSet<&String> = next.changed_cells.iter().collect();
            actually_changed.len() == declared.len()
                && actually_changed.iter().all(|c| declared.contains(*c))
        })
    }
}

/// Extends nessions frame by frame, collapsing structurally-equivalent
/// branches and enforcing configured depth and branching bounds.
pub struct NessionEngine<'a> {
    rules: &'a [Rule],
    limits: SearchLimits,
}

impl<'a> NessionEngine<'a> {
    pub fn new(rules: &'a [Rule], limits: SearchLimits) -> Self {
        NessionEngine { rules, limits }
    }

    /// Generate every nession of exactly `depth` frames (`depth` >= 1),
    /// starting from `initial_cells`.
    pub fn generate(
        &self,
        initial_cells: HashMap<String, Message>,
        depth: usize,
    ) -> Result<Vec<Nession>, BudgetError> {
        self.limits.check_nession_depth(depth)?;

        let mut initial_frame = Frame::initial(initial_cells);
        initial_frame.applicable_rules = self.align_state_consistent_rules(std::slice::from_ref(&initial_frame));
        let mut worklist: Vec<Vec<Frame>> = vec![vec![initial_frame]];
        let branch_counter = BranchCounter::new();

        while worklist.iter().any(|seq| seq.len() < depth) {
            let mut next_worklist = Vec::new();
            for seq in worklist {
                if seq.len() >= depth {
                    next_worklist.push(seq);
                    continue;
                }
                let extensions = self.extend(&seq);
                self.limits.check_branching(seq.len(), extensions.len())?;
                branch_counter.record(extensions.len());
                for ext in extensions {
                    let mut new_seq = seq.clone();
                    new_seq.push(ext);
                    next_worklist.push(new_seq);
                }
            }
            next_worklist = dedup_by_equivalence(next_worklist);
            worklist = next_worklist;
        }

        let nessions = worklist
            .into_iter()
            .enumerate()
            .map(|(index, frames)| Nession { index: index + 1, frames })
            .collect();

        Ok(nessions)
    }

    /// Every way to extend `history`'s tail frame by one state-transferring
    /// rule whose snapshot conditions unify into the accumulated history.
    fn extend(&self, history: &[Frame]) -> Vec<Frame> {
        let tail = history.last().expect("history is never empty");
        let mut extensions = Vec::new();

        for rule in self.rules {
            let Rule::StateTransferring(transferring) = rule else { continue };

            if let Some((sigma, changed)) = self.try_align(transferring, tail) {
                let mut new_cells = tail.cells.clone();
                for (_, state) in &transferring.transfers {
                    let substituted = state.value.substitute(&sigma);
                    new_cells.insert(state.cell.clone(), substituted);
                }
                let mut obligations = tail.transfer_obligations.clone();
                obligations.extend(transferring.core.premises.iter().map(|e| e.message.substitute(&sigma)));

                let mut new_history: Vec<Frame> = history.to_vec();
                new_history.push(Frame {
                    cells: new_cells.clone(),
                    applicable_rules: Vec::new(),
                    transfer_rule_id: Some(rule.id()),
                    changed_cells: changed.clone(),
                    transfer_obligations: obligations.clone(),
                });
                let applicable_rules = self.align_state_consistent_rules(&new_history);
                extensions.push(Frame {
                    cells: new_cells,
                    applicable_rules,
                    transfer_rule_id: Some(rule.id()),
                    changed_cells: changed,
                    transfer_obligations: obligations,
                });
            }
        }

        extensions
    }

    /// Every state-consistent rule with at least one snapshot condition
    /// whose accumulated history admits a valid alignment, instantiated by
    /// the substitution that alignment produces. A rule with no snapshots is
    /// handled once, globally, at rank -1, and is not repeated here. An
    /// alignment is attributed to the *latest* frame index
    /// it touches, so it is returned only when `history`'s last frame is
    /// that latest frame — otherwise the same alignment would be produced
    /// again (and duplicated) at every later frame.
    fn align_state_consistent_rules(&self, history: &[Frame]) -> Vec<StateConsistentRule> {
        let mut out = Vec::new();
        let last_index = history.len() - 1;

        for rule in self.rules {
            let Rule::StateConsistent(sc) = rule else { continue };
            if sc.core.snapshots.is_empty() {
                continue;
            }
            let ids: Vec<SnapshotId> = sc.core.snapshots.ids().collect();
            let mut assignment: Vec<Option<usize>> = vec![None; ids.len()];
            self.assign_snapshot(sc, &ids, 0, &mut assignment, history, SigmaMap::empty(), &mut |sigma, assignment| {
                let max_index = assignment.iter().flatten().copied().max().unwrap_or(0);
                if max_index == last_index {
                    let obligations = &history[max_index].transfer_obligations;
                    if let Some(instantiated) = instantiate_state_consistent(sc, sigma, obligations) {
                        out.push(instantiated);
                    }
                }
            });
        }

        out
    }

    /// Backtrack over every way to assign each of `sc`'s snapshot ids to a
    /// frame index in `history`, accumulating the unifying substitution and
    /// checking `later_than`/`modified_later_than` ordering once every
    /// snapshot has an assignment.
    fn assign_snapshot(
        &self,
        sc: &StateConsistentRule,
        ids: &[SnapshotId],
        idx: usize,
        assignment: &mut Vec<Option<usize>>,
        history: &[Frame],
        sigma: SigmaMap,
        on_success: &mut dyn FnMut(&SigmaMap, &[Option<usize>]),
    ) {
        if idx == ids.len() {
            if orderings_hold(sc, ids, assignment) {
                on_success(&sigma, assignment);
            }
            return;
        }

        let id = ids[idx];
        let snapshot = sc.core.snapshots.get(id);
        for (frame_index, frame) in history.iter().enumerate() {
            let Some(current) = frame.cells.get(&snapshot.condition.cell) else { continue };
            let Some(step) = unify_to(&snapshot.condition.value, current, &sc.core.guard) else { continue };
            let combined = sigma.compose(&step);
            assignment[idx] = Some(frame_index);
            self.assign_snapshot(sc, ids, idx + 1, assignment, history, combined, on_success);
        }
        assignment[idx] = None;
    }

    /// Try to unify a state-transferring rule's snapshot conditions against
    /// the tail frame's committed cell values. A fuller implementation would
    /// walk the full snapshot ordering against the accumulated history;
    /// this aligns each snapshot condition against the tail frame only,
    /// which is sufficient for rules with a single snapshot per cell (the
    /// common case exercised by the disclosure-ordering scenarios below).
    /// Does not consult `rule.core.premises` — the caller (`extend`) is
    /// responsible for carrying those forward as the new frame's
    /// `transfer_obligations`, since the premises themselves are not part
    /// of the snapshot alignment, only a precondition on using it.
    fn try_align(
        &self,
        rule: &crate::rule::StateTransferringRule,
        tail: &Frame,
    ) -> Option<(SigmaMap, Vec<String>)> {
        let mut sigma = SigmaMap::empty();
        let mut changed = Vec::new();

        for id in rule.core.snapshots.ids() {
            let snapshot = rule.core.snapshots.get(id);
            let current = tail.cells.get(&snapshot.condition.cell)?;
            let guarded = unify_to(&snapshot.condition.value, current, &rule.core.guard)?;
            sigma = sigma.compose(&guarded);
        }

        for (_, state) in &rule.transfers {
            changed.push(state.cell.clone());
        }

        Some((sigma, changed))
    }
}

/// Check `sc`'s snapshot ordering constraints against a completed
/// `assignment` of snapshot ids (indexed as in `ids`) to frame indices.
/// `later_than` is non-strict (the arena records, on the *later* snapshot,
/// which snapshots must precede or coincide with it); `modified_later_than`
/// is strict, per `rule.rs`'s `RuleBuilder::build`.
fn orderings_hold(sc: &StateConsistentRule, ids: &[SnapshotId], assignment: &[Option<usize>]) -> bool {
    let index_of = |id: SnapshotId| ids.iter().position(|candidate| *candidate == id);

    for (pos, &id) in ids.iter().enumerate() {
        let Some(after_index) = assignment[pos] else { return false };
        let snapshot = sc.core.snapshots.get(id);

        for &before in &snapshot.later_than {
            let Some(before_pos) = index_of(before) else { continue };
            let Some(before_index) = assignment[before_pos] else { return false };
            if before_index > after_index {
                return false;
            }
        }

        for &before in &snapshot.modified_later_than {
            let Some(before_pos) = index_of(before) else { continue };
            let Some(before_index) = assignment[before_pos] else { return false };
            if before_index >= after_index {
                return false;
            }
        }
    }

    true
}

/// Substitute `sigma` through a state-consistent rule's premises, guard, and
/// result, keeping its identity (`core.id`/`label`/`source`/`snapshots`)
/// unchanged, and append `obligations` (the producing transfer rule's own
/// premises, not touched by `sigma`) as extra `Know` premises — so a
/// variable a transfer introduced into a cell's value stays tied to the
/// knowledge precondition that variable was bound under, rather than going
/// free in the derived clause. Returns `None` if the substitution renders
/// the guard inconsistent — the alignment is discarded, not the query.
fn instantiate_state_consistent(
    sc: &StateConsistentRule,
    sigma: &SigmaMap,
    obligations: &[Message],
) -> Option<StateConsistentRule> {
    let guard = sc.core.guard.substitute(sigma)?;
    let mut premises: Vec<Event> = sc.core.premises.iter().map(|p| p.substitute(sigma)).collect();
    premises.extend(obligations.iter().cloned().map(Event::know));
    let result = sc.result.substitute(sigma);

    Some(StateConsistentRule {
        core: crate::rule::RuleCore {
            id: sc.core.id,
            label: sc.core.label.clone(),
            source: sc.core.source.clone(),
            guard,
            premises,
            snapshots: sc.core.snapshots.clone(),
        },
        result,
    })
}

fn dedup_by_equivalence(sequences: Vec<Vec<Frame>>) -> Vec<Vec<Frame>> {
    let mut kept: Vec<Vec<Frame>> = Vec::new();
    'outer: for seq in sequences {
        for existing in &kept {
            if existing.len() == seq.len() && existing.iter().zip(seq.iter()).all(|(a, b)| a.cells == b.cells) {
                continue 'outer;
            }
        }
        kept.push(seq);
    }
    kept
}
