//! Query orchestrator: the top-level `QueryEngine`.
//!
//! Built around the `QueryTimeout`/`CancelHandle` cooperative step function,
//! with exactly two suspension points: immediately after each
//! `on_nession_assessed` callback, and immediately after each
//! `on_level_start` callback. No parallelism inside one nession's
//! elaboration; levels are generated and assessed in increasing depth
//! order, stopping once an attack is found (without interrupting in-flight
//! elaboration at that depth).

use std::collections::HashMap;
use std::time::Duration;

use crate::attack::{find_global_attack, Attack, AttackSearch};
use crate::config::OrchestratorConfig;
use crate::execution::{CancelHandle, QueryTimeout, SearchLimits};
use crate::horn::{Elaborator, HornClause};
use crate::nession::{Nession, NessionEngine};
use crate::rule::Rule;
use crate::term::Message;

/// Why `QueryEngine::execute` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryStatus {
    /// Every depth up to `max_nession_depth` was explored; no attack found.
    Exhausted,
    /// An attack was found at the given nession depth (`None` for a global
    /// attack, found before any nession was generated).
    AttackFound { depth: Option<usize> },
    /// A per-nession or per-query time budget expired.
    BudgetExpired,
    /// `QueryEngine::cancel` was called.
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub status: QueryStatus,
    pub attack: Option<Attack>,
}

/// Callback ABI. Invoked in order, never overlapping.
pub trait QueryCallbacks {
    fn on_level_start(&mut self, depth: usize);
    fn on_nession_assessed(&mut self, nession: &Nession, clauses: &[HornClause], attack: Option<&Attack>);
    fn on_complete(&mut self, outcome: &QueryOutcome);
}

/// Runs one verification query: global-attack check, then nession
/// generation/elaboration/search by increasing depth.
pub struct QueryEngine {
    rules: Vec<Rule>,
    initial_states: HashMap<String, Message>,
    queries: Vec<Message>,
    config: OrchestratorConfig,
    timeout: QueryTimeout,
}

impl QueryEngine {
    pub fn new(
        rules: Vec<Rule>,
        initial_states: HashMap<String, Message>,
        queries: Vec<Message>,
        config: OrchestratorConfig,
    ) -> Self {
        let query_budget = if config.per_query_time_budget_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(config.per_query_time_budget_ms))
        };
        QueryEngine {
            rules,
            initial_states,
            queries,
            config,
            timeout: QueryTimeout::new(query_budget),
        }
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.timeout.cancel_handle()
    }

    pub fn cancel(&self) {
        self.timeout.cancel();
    }

    fn search_limits(&self) -> SearchLimits {
        SearchLimits {
            max_nession_depth: self.config.max_nession_depth,
            max_message_depth: self.config.max_message_depth,
            max_branching_per_frame: self.config.max_branching_per_frame,
        }
    }

    fn global_rules(&self) -> Vec<Rule> {
        self.rules.iter().filter(|r| r.has_no_snapshots() && !r.is_state_transferring()).cloned().collect()
    }

    /// Run until an attack is found, every depth is exhausted, a budget
    /// expires, or `cancel` is called. Callbacks fire serially; suspension
    /// (cancellation/budget polling) happens only right after
    /// `on_nession_assessed` and right after `on_level_start`.
    pub fn execute(&self, callbacks: &mut dyn QueryCallbacks) -> QueryOutcome {
        let query_span = tracing::info_span!("query_execute", queries = self.queries.len());
        let _enter = query_span.enter();

        if self.timeout.check().is_err() {
            let outcome = QueryOutcome { status: QueryStatus::Cancelled, attack: None };
            callbacks.on_complete(&outcome);
            return outcome;
        }

        let global_rules = self.global_rules();
        let elaborator = Elaborator::new(self.search_limits(), self.config.elaboration_strategy);
        let empty_nession = Nession { index: 0, frames: vec![crate::nession::Frame::initial(self.initial_states.clone())] };
        let global_clauses = elaborator.elaborate(&empty_nession, &global_rules);

        for query in &self.queries {
            if let Some(attack) = find_global_attack(query, &global_clauses) {
                let outcome = QueryOutcome {
                    status: QueryStatus::AttackFound { depth: None },
                    attack: Some(attack),
                };
                callbacks.on_complete(&outcome);
                return outcome;
            }
        }

        let engine = NessionEngine::new(&self.rules, self.search_limits());
        let mut nession_counter = 0usize;

        for depth in 1..=self.config.max_nession_depth {
            callbacks.on_level_start(depth);

            if self.timeout.check().is_err() {
                let outcome = QueryOutcome { status: self.stop_status(), attack: None };
                callbacks.on_complete(&outcome);
                return outcome;
            }

            let nessions = match engine.generate(self.initial_states.clone(), depth) {
                Ok(n) => n,
                Err(_) => break,
            };

            for mut nession in nessions {
                nession_counter += 1;
                nession.index = nession_counter;
                let nession_span =
                    tracing::info_span!("nession_assess", depth, nession = nession.index);
                let _enter = nession_span.enter();

                let nession_timeout = if self.config.per_nession_time_budget_ms == 0 {
                    QueryTimeout::infinite()
                } else {
                    QueryTimeout::new(Some(Duration::from_millis(self.config.per_nession_time_budget_ms)))
                };

                let clauses = elaborator.elaborate(&nession, &global_rules);
                if nession_timeout.check().is_err() {
                    let outcome = QueryOutcome { status: QueryStatus::BudgetExpired, attack: None };
                    callbacks.on_complete(&outcome);
                    return outcome;
                }

                let mut search = AttackSearch::new(&clauses);
                let mut found = None;
                for query in &self.queries {
                    if let Some(attack) = search.derive(query) {
                        found = Some(attack);
                        break;
                    }
                }

                callbacks.on_nession_assessed(&nession, &clauses, found.as_ref());

                if self.timeout.check().is_err() {
                    let outcome = QueryOutcome { status: self.stop_status(), attack: found };
                    callbacks.on_complete(&outcome);
                    return outcome;
                }

                if let Some(attack) = found {
                    let outcome = QueryOutcome {
                        status: QueryStatus::AttackFound { depth: Some(depth) },
                        attack: Some(attack),
                    };
                    callbacks.on_complete(&outcome);
                    return outcome;
                }
            }
        }

        let outcome = QueryOutcome { status: QueryStatus::Exhausted, attack: None };
        callbacks.on_complete(&outcome);
        outcome
    }

    fn stop_status(&self) -> QueryStatus {
        if self.timeout.is_cancelled() {
            QueryStatus::Cancelled
        } else {
            QueryStatus::BudgetExpired
        }
    }
}

/// Builds a [`QueryEngine`] — the crate's external entry point.
pub fn make_query_engine(
    rules: Vec<Rule>,
    initial_states: HashMap<String, Message>,
    queries: Vec<Message>,
    config: OrchestratorConfig,
) -> QueryEngine {
    QueryEngine::new(rules, initial_states, queries, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::rule::{PendingResult, RuleBuilder, RuleSource};

    struct RecordingCallbacks {
        level_starts: Vec<usize>,
        assessed: usize,
        completed: bool,
    }

    impl QueryCallbacks for RecordingCallbacks {
        fn on_level_start(&mut self, depth: usize) {
            self.level_starts.push(depth);
        }
        fn on_nession_assessed(&mut self, _n: &Nession, _c: &[HornClause], _a: Option<&Attack>) {
            self.assessed += 1;
        }
        fn on_complete(&mut self, _outcome: &QueryOutcome) {
            self.completed = true;
        }
    }

    fn trivial_rules() -> Vec<Rule> {
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

        vec![r1, r2, r3]
    }

    #[test]
    fn finds_global_attack_for_trivial_knowledge_closure() {
        let rules = trivial_rules();
        let query = Message::function("pair", vec![Message::name("a"), Message::name("b")]);
        let engine = make_query_engine(rules, HashMap::new(), vec![query], OrchestratorConfig::default());

        let mut callbacks = RecordingCallbacks { level_starts: Vec::new(), assessed: 0, completed: false };
        let outcome = engine.execute(&mut callbacks);

        assert_eq!(outcome.status, QueryStatus::AttackFound { depth: None });
        assert!(callbacks.completed);
        assert!(callbacks.level_starts.is_empty());
    }

    #[test]
    fn cancel_stops_before_further_nessions() {
        let rules = trivial_rules();
        let query = Message::name("unreachable_secret");
        let engine = make_query_engine(rules, HashMap::new(), vec![query], OrchestratorConfig::default());

        engine.cancel();
        let mut callbacks = RecordingCallbacks { level_starts: Vec::new(), assessed: 0, completed: false };
        let outcome = engine.execute(&mut callbacks);

        assert_eq!(outcome.status, QueryStatus::Cancelled);
        assert!(callbacks.completed);
    }
}
