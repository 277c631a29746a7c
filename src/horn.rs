//! Horn-clause elaborator: the fixed-point loop that turns a nession's
//! aligned rules into a saturated set of derivability clauses.
//!
//! Each nession's state-consistent rules become clauses tagged with their
//! frame index as rank (or -1, "always applicable", for globally-applicable
//! rules); composition (modus ponens) and factoring (Anify/Detuple/Scrub)
//! run to a fixed point bounded by `max_message_depth` and an
//! equivalence-class dedup. The worklist-driven fixed point runs as a
//! semi-naive evaluation, popping the lowest-ranked pending clause from an
//! explicit priority queue rather than building an incremental dataflow
//! graph.

use std::collections::{BinaryHeap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::ElaborationStrategy;
use crate::execution::SearchLimits;
use crate::guard::Guard;
use crate::nession::Nession;
use crate::rule::Rule;
use crate::term::Message;
use crate::unify::unifiable;

static NEXT_CLAUSE_ID: AtomicU64 = AtomicU64::new(0);

fn next_clause_id() -> u64 {
    NEXT_CLAUSE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Provenance of a derived clause.
#[derive(Debug, Clone)]
pub enum ClauseSource {
    Rule(u32),
    Composition(u64, u64),
    Anify(u64),
    Detuple(u64),
    Scrub(u64),
}

/// `Γ -[guard, rank]-> result`.
#[derive(Debug, Clone)]
pub struct HornClause {
    pub id: u64,
    pub premises: Vec<Message>,
    pub guard: Guard,
    pub result: Message,
    /// Non-negative frame index, or -1 ("always applicable").
    pub rank: i64,
    pub source: ClauseSource,
}

impl HornClause {
    pub fn depth(&self) -> usize {
        self.premises
            .iter()
            .map(Message::max_depth)
            .chain(std::iter::once(self.result.max_depth()))
            .max()
            .unwrap_or(0)
    }

    pub fn premise_count(&self) -> usize {
        self.premises.len()
    }

    fn from_rule(frame_index: Option<usize>, rule: &Rule) -> Option<HornClause> {
        let Rule::StateConsistent(sc) = rule else { return None };
        let rank = match frame_index {
            Some(i) => i as i64,
            None => -1,
        };
        Some(HornClause {
            id: next_clause_id(),
            premises: sc.core.premises.iter().map(|e| e.message.clone()).collect(),
            guard: sc.core.guard.clone(),
            result: sc.result.message.clone(),
            rank,
            source: ClauseSource::Rule(sc.core.id),
        })
    }

    /// Structural equivalence up to a consistent variable renaming, for
    /// equivalence-class dedup during elaboration.
    fn canonical_key(&self) -> CanonicalClause {
        use std::collections::HashMap;
        use std::sync::Arc;

        fn canon(m: &Message, map: &mut HashMap<Arc<str>, Arc<str>>, counter: &mut usize) -> Message {
            match m {
                Message::Name(_) | Message::Nonce(_) => m.clone(),
                Message::Variable(v) => {
                    let name = map.entry(Arc::clone(v)).or_insert_with(|| {
                        let n: Arc<str> = Arc::from(format!("V{counter}"));
                        *counter += 1;
                        n
                    });
                    Message::Variable(Arc::clone(name))
                }
                Message::Function(f, params) => {
                    let p = params.iter().map(|x| canon(x, map, counter)).collect();
                    Message::Function(Arc::clone(f), std::sync::Arc::new(crate::term::Params::new(p)))
                }
                Message::Tuple(members) => {
                    let m2 = members.iter().map(|x| canon(x, map, counter)).collect();
                    Message::Tuple(std::sync::Arc::new(crate::term::Params::new(m2)))
                }
            }
        }

        let mut map = HashMap::new();
        let mut counter = 0usize;
        let premises: Vec<Message> = self.premises.iter().map(|p| canon(p, &mut map, &mut counter)).collect();
        let result = canon(&self.result, &mut map, &mut counter);
        CanonicalClause { premises, result, rank: self.rank }
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct CanonicalClause {
    premises: Vec<Message>,
    result: Message,
    rank: i64,
}

/// Combine two clause ranks as `max(a, b)`, which already coincides with
/// "both -1 stays -1" since `max(-1, -1) == -1`.
fn combine_rank(a: i64, b: i64) -> i64 {
    a.max(b)
}

fn clause_key(c: &HornClause) -> (i64, usize, usize) {
    (c.rank, c.depth(), c.premise_count())
}

#[derive(Debug)]
struct PriorityItem(HornClause);

impl PartialEq for PriorityItem {
    fn eq(&self, other: &Self) -> bool {
        clause_key(&self.0) == clause_key(&other.0)
    }
}
impl Eq for PriorityItem {}
impl PartialOrd for PriorityItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PriorityItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; reverse so the lowest (rank, depth,
        // premise-count) key comes out first.
        clause_key(&other.0).cmp(&clause_key(&self.0))
    }
}

/// Runs the composition/factoring fixed point for a single nession.
/// Constructed fresh per nession and owned for its duration.
pub struct Elaborator {
    limits: SearchLimits,
    strategy: ElaborationStrategy,
}

impl Elaborator {
    pub fn new(limits: SearchLimits, strategy: ElaborationStrategy) -> Self {
        Elaborator { limits, strategy }
    }

    /// Elaborate `nession` against the globally-applicable rules (rank -1,
    /// carried into every nession) and the state-consistent rules each
    /// frame assessed as applicable, to a fixed point.
    pub fn elaborate(&self, nession: &Nession, global_rules: &[Rule]) -> Vec<HornClause> {
        let mut clauses: Vec<HornClause> = Vec::new();
        let mut seen_canonical: HashSet<CanonicalClause> = HashSet::new();

        let mut seed = |clause: HornClause, clauses: &mut Vec<HornClause>| {
            if clause.depth() > self.limits.max_message_depth {
                return;
            }
            let key = clause.canonical_key();
            if seen_canonical.insert(key) {
                clauses.push(clause);
            }
        };

        for rule in global_rules {
            if let Some(c) = HornClause::from_rule(None, rule) {
                seed(c, &mut clauses);
            }
        }
        for (frame_index, frame) in nession.frames.iter().enumerate() {
            for sc in &frame.applicable_rules {
                if let Some(c) = HornClause::from_rule(Some(frame_index), &Rule::StateConsistent(sc.clone())) {
                    seed(c, &mut clauses);
                }
            }
        }

        let mut deque: VecDeque<HornClause> = VecDeque::new();
        let mut heap: BinaryHeap<PriorityItem> = BinaryHeap::new();
        match self.strategy {
            ElaborationStrategy::BreadthFirst => deque.extend(clauses.iter().cloned()),
            ElaborationStrategy::PriorityByRank => {
                heap.extend(clauses.iter().cloned().map(PriorityItem))
            }
        }

        let mut saturated: Vec<HornClause> = clauses;

        loop {
            let next = match self.strategy {
                ElaborationStrategy::BreadthFirst => deque.pop_front(),
                ElaborationStrategy::PriorityByRank => heap.pop().map(|item| item.0),
            };
            let Some(current) = next else { break };

            let mut produced = Vec::new();
            for other in &saturated {
                if let Some(c) = compose(&current, other) {
                    produced.push(c);
                }
                if let Some(c) = compose(other, &current) {
                    produced.push(c);
                }
            }
            produced.extend(scrub(&current, &saturated));
            produced.extend(detuple(&current));
            produced.extend(anify(&current));

            for c in produced {
                if c.depth() > self.limits.max_message_depth {
                    tracing::debug!(
                        clause_depth = c.depth(),
                        limit = self.limits.max_message_depth,
                        "clause_dropped_depth_budget_exceeded"
                    );
                    continue;
                }
                let key = c.canonical_key();
                if seen_canonical.insert(key) {
                    match self.strategy {
                        ElaborationStrategy::BreadthFirst => deque.push_back(c.clone()),
                        ElaborationStrategy::PriorityByRank => heap.push(PriorityItem(c.clone())),
                    }
                    saturated.push(c);
                }
            }
        }

        saturated
    }
}

/// Modus-ponens composition: `c1: Γ1 -> r`, `c2: {q}∪Γ2 -> s` where `q`
/// unifies with `r`. Produces `c3: σ(Γ1∪Γ2\{q}) -> σ(s)`.
fn compose(c1: &HornClause, c2: &HornClause) -> Option<HornClause> {
    for (idx, premise) in c2.premises.iter().enumerate() {
        let mut merged_guard = c1.guard.clone();
        for (a, b) in c2.guard.ununified_terms() {
            merged_guard.add_ununified(a.clone(), b.clone()).ok()?;
        }
        for (a, b) in c2.guard.ununifiable_terms() {
            merged_guard.add_ununifiable(a.clone(), b.clone()).ok()?;
        }

        let Some((sigma_r, sigma_q)) = unifiable(&c1.result, premise, &merged_guard) else {
            continue;
        };

        let mut new_premises: Vec<Message> = c1
            .premises
            .iter()
            .map(|p| p.substitute(&sigma_r))
            .collect();
        new_premises.extend(
            c2.premises
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != idx)
                .map(|(_, p)| p.substitute(&sigma_q)),
        );

        let new_result = c2.result.substitute(&sigma_q);

        let Some(combined_guard_a) = merged_guard.substitute(&sigma_r) else {
            tracing::debug!(c1 = c1.id, c2 = c2.id, "clause_dropped_guard_inconsistent");
            return None;
        };
        let Some(combined_guard) = combined_guard_a.substitute(&sigma_q) else {
            tracing::debug!(c1 = c1.id, c2 = c2.id, "clause_dropped_guard_inconsistent");
            return None;
        };

        return Some(HornClause {
            id: next_clause_id(),
            premises: new_premises,
            guard: combined_guard,
            result: new_result,
            rank: combine_rank(c1.rank, c2.rank),
            source: ClauseSource::Composition(c1.id, c2.id),
        });
    }
    None
}

/// Replace nonces with anonymous variables where doing so cannot change
/// derivability: a nonce that appears only in the result, never in a
/// premise, can be generalized to a fresh variable without altering when
/// the clause is applicable. Open-question decision (see `DESIGN.md`):
/// scope is limited to nonces bound within the clause's own premises, so
/// anification never introduces a premise and so never raises rank.
fn anify(clause: &HornClause) -> Vec<HornClause> {
    let mut premise_nonces: HashSet<std::sync::Arc<str>> = HashSet::new();
    collect_nonces(&clause.premises, &mut premise_nonces);

    let mut result_nonces = HashSet::new();
    collect_nonces_one(&clause.result, &mut result_nonces);

    let candidate: Vec<_> = result_nonces.difference(&premise_nonces).cloned().collect();
    if candidate.is_empty() {
        return Vec::new();
    }

    let mut result = clause.result.clone();
    for nonce in &candidate {
        result = replace_nonce_with_variable(&result, nonce);
    }

    vec![HornClause {
        id: next_clause_id(),
        premises: clause.premises.clone(),
        guard: clause.guard.clone(),
        result,
        rank: clause.rank,
        source: ClauseSource::Anify(clause.id),
    }]
}

fn collect_nonces(messages: &[Message], out: &mut HashSet<std::sync::Arc<str>>) {
    for m in messages {
        collect_nonces_one(m, out);
    }
}

fn collect_nonces_one(m: &Message, out: &mut HashSet<std::sync::Arc<str>>) {
    match m {
        Message::Nonce(n) => {
            out.insert(std::sync::Arc::clone(n));
        }
        Message::Function(_, params) => {
            for p in params.iter() {
                collect_nonces_one(p, out);
            }
        }
        Message::Tuple(members) => {
            for x in members.iter() {
                collect_nonces_one(x, out);
            }
        }
        _ => {}
    }
}

fn replace_nonce_with_variable(m: &Message, nonce: &std::sync::Arc<str>) -> Message {
    match m {
        Message::Nonce(n) if n == nonce => Message::Variable(std::sync::Arc::from(format!("Any_{nonce}"))),
        Message::Function(f, params) => {
            let new_params = params.iter().map(|p| replace_nonce_with_variable(p, nonce)).collect();
            Message::Function(std::sync::Arc::clone(f), std::sync::Arc::new(crate::term::Params::new(new_params)))
        }
        Message::Tuple(members) => {
            let new_members = members.iter().map(|x| replace_nonce_with_variable(x, nonce)).collect();
            Message::Tuple(std::sync::Arc::new(crate::term::Params::new(new_members)))
        }
        _ => m.clone(),
    }
}

/// Split a tuple-shaped premise or result into component clauses: `k(<x,y>)`
/// implies both `k(x)` and `k(y)` are separately derivable from the same
/// premises, and a tuple result can be derived component-wise.
fn detuple(clause: &HornClause) -> Vec<HornClause> {
    let mut out = Vec::new();
    if let Message::Tuple(members) = &clause.result {
        for member in members.iter() {
            out.push(HornClause {
                id: next_clause_id(),
                premises: clause.premises.clone(),
                guard: clause.guard.clone(),
                result: member.clone(),
                rank: clause.rank,
                source: ClauseSource::Detuple(clause.id),
            });
        }
    }
    out
}

/// Remove a premise from `clause` if it is derivable from `clause`'s
/// *remaining* premises via some other clause in `saturated`: `other: Γ' ->
/// r'` implies the premise when `r'` unifies with it and every one of
/// `Γ'`'s members (substituted accordingly) is itself one of the clause's
/// other premises. A fact (`Γ' = []`) is the degenerate case of this.
fn scrub(clause: &HornClause, saturated: &[HornClause]) -> Vec<HornClause> {
    if clause.premises.len() < 2 {
        return Vec::new();
    }
    let mut out = Vec::new();
    for (idx, premise) in clause.premises.iter().enumerate() {
        let remaining: Vec<Message> = clause
            .premises
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .map(|(_, p)| p.clone())
            .collect();

        let implied = saturated.iter().any(|other| {
            if other.rank > clause.rank {
                return false;
            }
            let mut merged_guard = clause.guard.clone();
            for (a, b) in other.guard.ununified_terms() {
                if merged_guard.add_ununified(a.clone(), b.clone()).is_err() {
                    return false;
                }
            }
            for (a, b) in other.guard.ununifiable_terms() {
                if merged_guard.add_ununifiable(a.clone(), b.clone()).is_err() {
                    return false;
                }
            }
            let Some((sigma_r, sigma_q)) = unifiable(&other.result, premise, &merged_guard) else {
                return false;
            };
            other.premises.iter().all(|op| {
                let op_sub = op.substitute(&sigma_r);
                remaining.iter().any(|rp| rp.substitute(&sigma_q) == op_sub)
            })
        });

        if implied {
            out.push(HornClause {
                id: next_clause_id(),
                premises: remaining.clone(),
                guard: clause.guard.clone(),
                result: clause.result.clone(),
                rank: clause.rank,
                source: ClauseSource::Scrub(clause.id),
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::rule::{PendingResult, RuleBuilder, RuleSource};

    fn fact(name: &str) -> HornClause {
        HornClause {
            id: next_clause_id(),
            premises: Vec::new(),
            guard: Guard::empty(),
            result: Message::name(name),
            rank: -1,
            source: ClauseSource::Rule(0),
        }
    }

    #[test]
    fn combine_rank_keeps_minus_one_when_both_always() {
        assert_eq!(combine_rank(-1, -1), -1);
    }

    #[test]
    fn combine_rank_takes_max_with_finite_rank() {
        assert_eq!(combine_rank(-1, 3), 3);
        assert_eq!(combine_rank(2, 5), 5);
    }

    #[test]
    fn compose_resolves_matching_premise() {
        let c1 = fact("a");
        let c2 = HornClause {
            id: next_clause_id(),
            premises: vec![Message::name("a")],
            guard: Guard::empty(),
            result: Message::name("b"),
            rank: -1,
            source: ClauseSource::Rule(1),
        };
        let composed = compose(&c1, &c2).unwrap();
        assert!(composed.premises.is_empty());
        assert_eq!(composed.result, Message::name("b"));
    }

    #[test]
    fn detuple_splits_tuple_result() {
        let clause = HornClause {
            id: next_clause_id(),
            premises: Vec::new(),
            guard: Guard::empty(),
            result: Message::tuple(vec![Message::name("a"), Message::name("b")]),
            rank: -1,
            source: ClauseSource::Rule(0),
        };
        let split = detuple(&clause);
        assert_eq!(split.len(), 2);
    }

    #[test]
    fn scrub_drops_premise_implied_by_sibling_premise() {
        // f(y) <- y, i.e. knowing y is enough to derive f(y).
        let derives_f = HornClause {
            id: next_clause_id(),
            premises: vec![Message::variable("y")],
            guard: Guard::empty(),
            result: Message::function("f", vec![Message::variable("y")]),
            rank: -1,
            source: ClauseSource::Rule(0),
        };
        // x, f(x) -> r: the f(x) premise is implied by the sibling x premise.
        let clause = HornClause {
            id: next_clause_id(),
            premises: vec![Message::variable("x"), Message::function("f", vec![Message::variable("x")])],
            guard: Guard::empty(),
            result: Message::name("r"),
            rank: -1,
            source: ClauseSource::Rule(1),
        };
        let scrubbed = scrub(&clause, &[derives_f]);
        assert_eq!(scrubbed.len(), 1);
        assert_eq!(scrubbed[0].premises, vec![Message::variable("x")]);
    }

    #[test]
    fn scrub_keeps_premise_not_implied_by_remaining_premises() {
        let unrelated_fact = fact("unrelated");
        let clause = HornClause {
            id: next_clause_id(),
            premises: vec![Message::name("a"), Message::name("b")],
            guard: Guard::empty(),
            result: Message::name("r"),
            rank: -1,
            source: ClauseSource::Rule(1),
        };
        assert!(scrub(&clause, &[unrelated_fact]).is_empty());
    }

    #[test]
    fn elaborate_reaches_fixed_point_on_trivial_knowledge() {
        let mut b1 = RuleBuilder::new();
        b1.result = Some(PendingResult::Event(Event::know(Message::name("a"))));
        let r1 = b1.build(RuleSource::Parsed { text: "-[]->k(a[])".into() }).unwrap();

        let mut b2 = RuleBuilder::new();
        b2.result = Some(PendingResult::Event(Event::know(Message::name("b"))));
        let r2 = b2.build(RuleSource::Parsed { text: "-[]->k(b[])".into() }).unwrap();

        let mut b3 = RuleBuilder::new();
        b3.premises.push(Event::know(Message::variable("x")));
        b3.premises.push(Event::know(Message::variable("y")));
        b3.result = Some(PendingResult::Event(Event::know(Message::function(
            "pair",
            vec![Message::variable("x"), Message::variable("y")],
        ))));
        let r3 = b3.build(RuleSource::Parsed { text: "k(x),k(y)-[]->k(pair(x,y))".into() }).unwrap();

        let nession = Nession { index: 1, frames: vec![crate::nession::Frame::initial(Default::default())] };
        let elaborator = Elaborator::new(SearchLimits::default(), ElaborationStrategy::PriorityByRank);
        let clauses = elaborator.elaborate(&nession, &[r1, r2, r3]);
        assert!(clauses
            .iter()
            .any(|c| c.result == Message::function("pair", vec![Message::name("a"), Message::name("b")])));
    }
}
