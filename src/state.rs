//! Cell state and the snapshot arena.
//!
//! A `State` pairs a cell name with the message stored there. A `Snapshot`
//! is a node in the ordered DAG a rule builds over its premises and
//! conditions — arena-allocated and keyed by a small integer id. The arena
//! is owned by the `Rule` that built it; a `Nession`'s frames reference
//! copies of the frame-owning snapshots they were extended with.

use std::fmt;

use crate::substitution::SigmaMap;
use crate::term::Message;

/// The value stored in one cell at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct State {
    pub cell: String,
    pub value: Message,
}

impl State {
    pub fn new(cell: impl Into<String>, value: Message) -> Self {
        State { cell: cell.into(), value }
    }

    pub fn substitute(&self, sigma: &SigmaMap) -> State {
        State { cell: self.cell.clone(), value: self.value.substitute(sigma) }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.cell, self.value)
    }
}

/// Index into a [`SnapshotArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotId(pub u32);

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A node in a rule's snapshot ordering DAG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// The cell-state this snapshot asserts, e.g. `(SD(m), a)`.
    pub condition: State,
    /// The rule-local label this snapshot was declared under (unique
    /// within one rule, not globally).
    pub label: String,
    /// Snapshots that must occur no later than this one (`=<`).
    pub later_than: Vec<SnapshotId>,
    /// Snapshots whose cell this one's transfer modifies no later than
    /// (`<@`) — the strict, modification-aware ordering relation.
    pub modified_later_than: Vec<SnapshotId>,
    /// If this snapshot's rule is state-transferring, the state the cell
    /// transfers to.
    pub transfers_to: Option<State>,
}

impl Snapshot {
    pub fn new(condition: State, label: impl Into<String>) -> Self {
        Snapshot {
            condition,
            label: label.into(),
            later_than: Vec::new(),
            modified_later_than: Vec::new(),
            transfers_to: None,
        }
    }
}

/// Arena of snapshot nodes belonging to a single [`crate::rule::Rule`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotArena {
    nodes: Vec<Snapshot>,
}

impl SnapshotArena {
    pub fn new() -> Self {
        SnapshotArena::default()
    }

    pub fn insert(&mut self, snapshot: Snapshot) -> SnapshotId {
        let id = SnapshotId(self.nodes.len() as u32);
        self.nodes.push(snapshot);
        id
    }

    pub fn get(&self, id: SnapshotId) -> &Snapshot {
        &self.nodes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: SnapshotId) -> &mut Snapshot {
        &mut self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = SnapshotId> {
        (0..self.nodes.len() as u32).map(SnapshotId)
    }

    pub fn find_by_label(&self, label: &str) -> Option<SnapshotId> {
        self.nodes
            .iter()
            .position(|s| s.label == label)
            .map(|i| SnapshotId(i as u32))
    }

    /// Detect a cycle in the `later_than`/`modified_later_than` ordering
    /// graph, returning the labels of every snapshot on some cycle.
    /// Iterative DFS with an explicit color array, in the same shape as a
    /// Tarjan-style cycle check over a small adjacency list.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let n = self.nodes.len();
        let mut color = vec![Color::White; n];
        let mut stack: Vec<(usize, usize)> = Vec::new();

        for start in 0..n {
            if color[start] != Color::White {
                continue;
            }
            stack.push((start, 0));
            color[start] = Color::Gray;

            while let Some(&mut (node, ref mut edge_idx)) = stack.last_mut() {
                let neighbors = self.successors(SnapshotId(node as u32));
                if *edge_idx < neighbors.len() {
                    let next = neighbors[*edge_idx].0 as usize;
                    *edge_idx += 1;
                    match color[next] {
                        Color::White => {
                            color[next] = Color::Gray;
                            stack.push((next, 0));
                        }
                        Color::Gray => {
                            let cycle_labels = stack
                                .iter()
                                .map(|(idx, _)| self.nodes[*idx].label.clone())
                                .collect();
                            return Some(cycle_labels);
                        }
                        Color::Black => {}
                    }
                } else {
                    color[node] = Color::Black;
                    stack.pop();
                }
            }
        }
        None
    }

    fn successors(&self, id: SnapshotId) -> Vec<SnapshotId> {
        let node = self.get(id);
        node.later_than
            .iter()
            .chain(node.modified_later_than.iter())
            .copied()
            .collect()
    }
}
