//! Error types.
//!
//! Three families: parse and construction errors surface at the API
//! boundary (they never enter the engine), guard inconsistencies are
//! handled inside the elaborator by dropping the offending clause (not
//! surfaced as a query failure), and budget/cancellation are reported
//! through `QueryOutcome`, never as an exception.

use std::fmt;

/// A position within source text, for error annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(offset: usize, line: usize, column: usize) -> Self {
        Position { offset, line, column }
    }

    pub fn start() -> Self {
        Position { offset: 0, line: 1, column: 1 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Failure to parse a rule, message, state, or event from text.
#[derive(Debug, Clone, thiserror::Error)]
#[error("parse error at {position}: {message}")]
pub struct ParseError {
    pub position: Position,
    pub message: String,
}

impl ParseError {
    pub fn new(position: Position, message: impl Into<String>) -> Self {
        ParseError { position, message: message.into() }
    }

    pub fn unexpected_end(position: Position, expected: &str) -> Self {
        ParseError::new(position, format!("unexpected end of input, expected {expected}"))
    }

    pub fn unexpected_token(position: Position, found: &str, expected: &str) -> Self {
        ParseError::new(
            position,
            format!("unexpected token {found:?}, expected {expected}"),
        )
    }
}

/// Failure to build a well-formed `Rule` out of an otherwise syntactically
/// valid parse.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuleConstructionError {
    #[error("cyclic snapshot ordering involving label(s): {labels:?}")]
    CyclicSnapshotOrdering { labels: Vec<String> },

    #[error("duplicate label {label:?} within rule")]
    DuplicateLabel { label: String },

    #[error("unsafe result: variable {variable:?} does not appear in any premise or condition")]
    UnsafeResultVariable { variable: String },

    #[error("event tagged Accept may not appear as a rule premise: {event}")]
    AcceptInPremise { event: String },

    #[error("premise label {label:?} is not declared by any snapshot")]
    UnresolvedPremiseLabel { label: String },

    #[error("ordering constraint references undeclared label {label:?}")]
    UnresolvedOrderingLabel { label: String },

    #[error("cell {cell:?} is not declared in the catalog")]
    UndeclaredCell { cell: String },
}

/// A guard that can never be satisfied, e.g. `v ~/> v`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("inconsistent guard: {description}")]
pub struct GuardInconsistency {
    pub description: String,
}

impl GuardInconsistency {
    pub fn new(description: impl Into<String>) -> Self {
        GuardInconsistency { description: description.into() }
    }
}

/// Failure to load or save a [`crate::catalog::Catalog`] as JSON.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to (de)serialize catalog: {0}")]
    Json(#[from] serde_json::Error),
}

/// Umbrella error for the crate's public API, where a single `Result` must
/// carry any of the boundary-facing error families.
#[derive(Debug, thiserror::Error)]
pub enum SarsaparillaError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    RuleConstruction(#[from] RuleConstructionError),

    #[error(transparent)]
    GuardInconsistency(#[from] GuardInconsistency),

    #[error(transparent)]
    Config(#[from] figment::Error),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
