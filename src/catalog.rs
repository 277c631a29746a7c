//! Cell catalog: the closed world of declared state-cell names.
//!
//! Cell names are finite and declared by initial states. This catalog makes
//! that an explicit, checked invariant: a rule or a query may only mention a
//! cell that the catalog already knows about.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, RuleConstructionError};
use crate::rule::Rule;

/// On-disk representation of a [`Catalog`], versioned so a future format
/// change can be detected rather than silently misread.
#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    version: u32,
    cells: Vec<String>,
}

/// Registry of declared state-cell names.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    cells: HashSet<String>,
}

impl Catalog {
    pub fn new() -> Self {
        Catalog::default()
    }

    /// Declare a cell name. Idempotent.
    pub fn declare_cell(&mut self, name: impl Into<String>) {
        self.cells.insert(name.into());
    }

    pub fn has_cell(&self, name: &str) -> bool {
        self.cells.contains(name)
    }

    /// Check that every cell `rule` mentions (in a snapshot condition or a
    /// state transfer) has been declared.
    pub fn validate_rule(&self, rule: &Rule) -> Result<(), RuleConstructionError> {
        if self.is_empty() {
            // No cells declared yet (e.g. rules added before any initial
            // state) — nothing to check against.
            return Ok(());
        }
        for id in rule.snapshots().ids() {
            let cell = &rule.snapshots().get(id).condition.cell;
            if !self.has_cell(cell) {
                return Err(RuleConstructionError::UndeclaredCell { cell: cell.clone() });
            }
        }
        if let Rule::StateTransferring(transferring) = rule {
            for (_, state) in &transferring.transfers {
                if !self.has_cell(&state.cell) {
                    return Err(RuleConstructionError::UndeclaredCell { cell: state.cell.clone() });
                }
            }
        }
        Ok(())
    }

    /// All declared cell names, sorted for deterministic iteration (tests,
    /// pretty-printing diagnostics).
    pub fn cells(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.cells.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Serialize the declared cells to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, CatalogError> {
        let file = CatalogFile {
            version: 1,
            cells: self.cells().into_iter().map(String::from).collect(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Load declared cells from a JSON string previously produced by
    /// [`Catalog::to_json`].
    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(text)?;
        Ok(Catalog { cells: file.cells.into_iter().collect() })
    }

    /// Write the catalog to `path` as JSON.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), CatalogError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Read a catalog previously written by [`Catalog::save_to_file`].
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Catalog::from_json(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_and_query() {
        let mut catalog = Catalog::new();
        catalog.declare_cell("SD");
        assert!(catalog.has_cell("SD"));
        assert!(!catalog.has_cell("OTHER"));
    }

    #[test]
    fn declare_is_idempotent() {
        let mut catalog = Catalog::new();
        catalog.declare_cell("SD");
        catalog.declare_cell("SD");
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn cells_are_sorted() {
        let mut catalog = Catalog::new();
        catalog.declare_cell("Z");
        catalog.declare_cell("A");
        catalog.declare_cell("M");
        assert_eq!(catalog.cells(), vec!["A", "M", "Z"]);
    }

    #[test]
    fn empty_catalog_accepts_any_rule() {
        let catalog = Catalog::new();
        let rule = crate::parser::parse_rule("-[(SD(init[]), a0)]-><a0:SD(secret[])>").unwrap();
        assert!(catalog.validate_rule(&rule).is_ok());
    }

    #[test]
    fn rejects_rule_over_undeclared_cell() {
        let mut catalog = Catalog::new();
        catalog.declare_cell("OTHER");
        let rule = crate::parser::parse_rule("-[(SD(init[]), a0)]-><a0:SD(secret[])>").unwrap();
        assert!(matches!(
            catalog.validate_rule(&rule),
            Err(RuleConstructionError::UndeclaredCell { cell }) if cell == "SD"
        ));
    }

    #[test]
    fn accepts_rule_over_declared_cell() {
        let mut catalog = Catalog::new();
        catalog.declare_cell("SD");
        let rule = crate::parser::parse_rule("-[(SD(init[]), a0)]-><a0:SD(secret[])>").unwrap();
        assert!(catalog.validate_rule(&rule).is_ok());
    }

    #[test]
    fn json_round_trip_preserves_cells() {
        let mut catalog = Catalog::new();
        catalog.declare_cell("SD");
        catalog.declare_cell("PK");

        let json = catalog.to_json().unwrap();
        let reloaded = Catalog::from_json(&json).unwrap();
        assert_eq!(reloaded.cells(), catalog.cells());
    }

    #[test]
    fn save_and_load_file_round_trips() {
        let mut catalog = Catalog::new();
        catalog.declare_cell("SD");
        let dir = std::env::temp_dir();
        let path = dir.join(format!("sarsaparilla-catalog-test-{}.json", std::process::id()));
        catalog.save_to_file(&path).unwrap();

        let reloaded = Catalog::load_from_file(&path).unwrap();
        assert_eq!(reloaded.cells(), catalog.cells());

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn from_json_rejects_malformed_input() {
        assert!(Catalog::from_json("not json").is_err());
    }
}
