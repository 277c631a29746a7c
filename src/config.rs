//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - config.toml (default configuration)
//! - config.local.toml (git-ignored local overrides)
//! - Environment variables (SARSA_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # config.toml
//! [orchestrator]
//! max_nession_depth = 6
//! max_message_depth = 20
//! max_branching_per_frame = 8
//! per_nession_time_budget_ms = 0
//! per_query_time_budget_ms = 0
//! elaboration_strategy = "priority_by_rank"
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! SARSA_ORCHESTRATOR__MAX_NESSION_DEPTH=10
//! SARSA_LOGGING__LEVEL=debug
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Main configuration struct
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Strategy used by the Horn-clause elaborator's fixed-point loop to order
/// the pending-clause worklist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElaborationStrategy {
    /// Process clauses in the order they were produced, one round at a time.
    BreadthFirst,
    /// Process clauses ordered by `(rank, depth, premise-count)`.
    PriorityByRank,
}

impl Default for ElaborationStrategy {
    fn default() -> Self {
        ElaborationStrategy::PriorityByRank
    }
}

/// The knobs exposed to callers of `make_query_engine`: two depth/branching
/// bounds on the state-space search, two wall-clock budgets (0 = unbounded),
/// and the elaboration worklist ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_max_nession_depth")]
    pub max_nession_depth: usize,

    #[serde(default = "default_max_message_depth")]
    pub max_message_depth: usize,

    #[serde(default = "default_max_branching_per_frame")]
    pub max_branching_per_frame: usize,

    /// 0 means unbounded.
    #[serde(default)]
    pub per_nession_time_budget_ms: u64,

    /// 0 means unbounded.
    #[serde(default)]
    pub per_query_time_budget_ms: u64,

    #[serde(default)]
    pub elaboration_strategy: ElaborationStrategy,
}

fn default_max_nession_depth() -> usize {
    6
}
fn default_max_message_depth() -> usize {
    20
}
fn default_max_branching_per_frame() -> usize {
    8
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            max_nession_depth: default_max_nession_depth(),
            max_message_depth: default_max_message_depth(),
            max_branching_per_frame: default_max_branching_per_frame(),
            per_nession_time_budget_ms: 0,
            per_query_time_budget_ms: 0,
            elaboration_strategy: ElaborationStrategy::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Merges in order:
    /// 1. config.toml (base configuration)
    /// 2. config.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (SARSA_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(Env::prefixed("SARSA_").split("__"))
            .extract()
    }

    /// Load configuration from specific file path
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("SARSA_").split("__"))
            .extract()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            orchestrator: OrchestratorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let config = Config::default();
        assert_eq!(config.orchestrator.max_nession_depth, 6);
        assert_eq!(config.orchestrator.max_message_depth, 20);
        assert_eq!(config.orchestrator.max_branching_per_frame, 8);
        assert_eq!(config.orchestrator.per_nession_time_budget_ms, 0);
        assert_eq!(config.orchestrator.per_query_time_budget_ms, 0);
        assert_eq!(
            config.orchestrator.elaboration_strategy,
            ElaborationStrategy::PriorityByRank
        );
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();

        assert!(toml_str.contains("[orchestrator]"));
        assert!(toml_str.contains("[logging]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.orchestrator.max_nession_depth, 6);
    }
}
