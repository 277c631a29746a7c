//! # Sarsaparilla
//!
//! A stateful Horn-clause verifier for cryptographic protocols: given a set
//! of rules describing how an adversary's knowledge and a protocol's state
//! cells evolve, explore the reachable state space (as a tree of
//! *nessions* — bounded sequences of state-transferring steps) and search
//! for an *attack*: a derivation of a queried message from the adversary's
//! accumulated knowledge.
//!
//! ## Pipeline
//!
//! ```text
//! rule text
//!     ↓
//! [parser]                → Rule (via RuleBuilder's transactional build)
//!     ↓
//! [nession]               → bounded symbolic-execution tree of Frames
//!     ↓
//! [horn]                  → Horn-clause elaboration fixed point per nession
//!     ↓
//! [attack]                → recursive derivability search per query
//!     ↓
//! [orchestrator]          → QueryEngine ties the above into one cooperative
//!                           step function, depth by depth
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sarsaparilla::{parse_rule, make_query_engine, OrchestratorConfig, QueryCallbacks};
//! use sarsaparilla::{Nession, HornClause, Attack, QueryOutcome};
//! use std::collections::HashMap;
//!
//! let rules = vec![
//!     parse_rule("-[]->k(a[])")?,
//!     parse_rule("-[]->k(b[])")?,
//!     parse_rule("k(x),k(y)-[]->k(pair(x,y))")?,
//! ];
//!
//! struct Silent;
//! impl QueryCallbacks for Silent {
//!     fn on_level_start(&mut self, _depth: usize) {}
//!     fn on_nession_assessed(&mut self, _n: &Nession, _c: &[HornClause], _a: Option<&Attack>) {}
//!     fn on_complete(&mut self, _outcome: &QueryOutcome) {}
//! }
//!
//! let query = sarsaparilla::parse_message("pair(a[], b[])")?;
//! let engine = make_query_engine(rules, HashMap::new(), vec![query], OrchestratorConfig::default());
//! let outcome = engine.execute(&mut Silent);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Module organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `term` | The `Message` term algebra |
//! | `substitution` | Idempotent substitutions and the factory that builds them |
//! | `guard` | Inequality side-conditions (`~/>`, `=/=`) |
//! | `unify` | One- and two-directional unification |
//! | `event` | `Know`/`New`/`Make`/`Accept` event tags |
//! | `state` | Cell states and the per-rule snapshot arena |
//! | `catalog` | The closed world of declared cell names |
//! | `rule` | `Rule`, `RuleBuilder`, and structural (α-) equivalence |
//! | `nession` | Bounded symbolic execution over state-transferring rules |
//! | `horn` | Horn-clause elaboration (composition, Anify, Detuple, Scrub) |
//! | `attack` | Recursive derivability / attack search |
//! | `orchestrator` | `QueryEngine`: the cooperative top-level step function |
//! | `parser` | Rule/message/state/event text parsing and pretty-printing |
//! | `config` | Layered configuration (`figment`) |
//! | `error` | The crate's error families |
//! | `execution` | Shared budget/timeout/cancellation primitives |

pub mod attack;
pub mod catalog;
pub mod config;
pub mod error;
pub mod event;
pub mod execution;
pub mod guard;
pub mod horn;
pub mod nession;
pub mod orchestrator;
pub mod parser;
pub mod rule;
pub mod state;
pub mod substitution;
pub mod term;
pub mod unify;

pub use attack::{find_global_attack, Attack, AttackSearch};
pub use catalog::Catalog;
pub use config::{Config, ElaborationStrategy, LoggingConfig, OrchestratorConfig};
pub use error::{
    CatalogError, GuardInconsistency, ParseError, Position, RuleConstructionError,
    SarsaparillaError,
};
pub use event::{Event, EventKind};
pub use execution::{BranchCounter, BudgetError, CancelHandle, QueryTimeout, SearchLimits, TimeoutError};
pub use guard::Guard;
pub use horn::{ClauseSource, Elaborator, HornClause};
pub use nession::{Frame, Nession, NessionEngine};
pub use orchestrator::{make_query_engine, QueryCallbacks, QueryEngine, QueryOutcome, QueryStatus};
pub use parser::{
    parse_event_text as parse_event, parse_message_text as parse_message, parse_rule,
    parse_state_text as parse_state, print_event, print_message, print_rule, print_rule_source,
    print_state,
};
pub use rule::{OrderKind, PendingResult, Rule, RuleBuilder, RuleSource, SnapshotDecl};
pub use state::{Snapshot, SnapshotArena, SnapshotId, State};
pub use substitution::{SigmaFactory, SigmaMap};
pub use term::{Message, Params};
pub use unify::{unifiable, unify_to};
