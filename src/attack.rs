//! Attack search: recursive derivability of a query message from a set of
//! Horn clauses.
//!
//! Seeks a clause `Γ -> r` where `r` unifies with the query under an empty
//! guard and every premise in `Γ` is itself recursively derivable; memoizes
//! `(clause, σ)` pairs visited so cyclic premise dependencies terminate. A
//! query derivable at rank -1 using only globally-applicable clauses, before
//! any nession is generated, is a "global attack" and short-circuits the
//! orchestrator.

use std::collections::HashMap;

use crate::guard::Guard;
use crate::horn::HornClause;
use crate::substitution::SigmaMap;
use crate::term::Message;
use crate::unify::unifiable;

/// A node in the derivation tree: the query message resolved at this node,
/// the more specific message actually derived, the clause that resolved
/// it, the substitution used, and one child `Attack` per premise.
#[derive(Debug, Clone)]
pub struct Attack {
    pub queried: Message,
    pub derived: Message,
    pub clause_id: u64,
    pub sigma: SigmaMap,
    pub premises: Vec<Attack>,
}

/// Searches a fixed clause set for a derivation of a query message.
/// Memoizes `(clause id, query)` pairs already explored so overlapping
/// premise subgoals don't re-expand the same derivation.
pub struct AttackSearch<'a> {
    clauses: &'a [HornClause],
    visited: HashMap<(u64, Message), Option<Attack>>,
}

impl<'a> AttackSearch<'a> {
    pub fn new(clauses: &'a [HornClause]) -> Self {
        AttackSearch { clauses, visited: HashMap::new() }
    }

    /// Attempt to derive `query`. Returns the first successful attack
    /// found; the actual derived term may be a more specific instance of
    /// `query` (e.g. querying a variable-containing open term).
    pub fn derive(&mut self, query: &Message) -> Option<Attack> {
        let attack = self.derive_with_visited_guard(query, &mut Vec::new());
        if let Some(attack) = &attack {
            tracing::info!(clause_id = attack.clause_id, query = %query, "attack_found");
        }
        attack
    }

    fn derive_with_visited_guard(&mut self, query: &Message, stack: &mut Vec<u64>) -> Option<Attack> {
        let clause_ids: Vec<u64> = self.clauses.iter().map(|c| c.id).collect();
        for id in clause_ids {
            if stack.contains(&id) {
                continue;
            }
            let clause = self.clauses.iter().find(|c| c.id == id)?.clone();
            // A clause with a non-empty guard cannot be discharged by attack
            // search directly: the result must unify under an empty guard.
            // Such clauses participate only via composition during
            // elaboration, where the guard is checked as the substitution is
            // built.
            if !clause.guard.is_empty() {
                continue;
            }
            let Some((sigma_query, sigma_result)) = unifiable(query, &clause.result, &Guard::empty()) else {
                continue;
            };

            let key = (id, query.clone());
            if let Some(cached) = self.visited.get(&key) {
                if let Some(attack) = cached {
                    return Some(attack.clone());
                }
                continue;
            }

            stack.push(id);
            let mut resolved_premises = Vec::with_capacity(clause.premises.len());
            let mut all_ok = true;
            for premise in &clause.premises {
                let substituted = premise.substitute(&sigma_result);
                match self.derive_with_visited_guard(&substituted, stack) {
                    Some(attack) => resolved_premises.push(attack),
                    None => {
                        all_ok = false;
                        break;
                    }
                }
            }
            stack.pop();

            if all_ok {
                let attack = Attack {
                    queried: query.substitute(&sigma_query),
                    derived: clause.result.substitute(&sigma_result),
                    clause_id: id,
                    sigma: sigma_result,
                    premises: resolved_premises,
                };
                self.visited.insert(key, Some(attack.clone()));
                return Some(attack);
            }
            self.visited.insert(key, None);
        }
        None
    }
}

/// Whether `query` is derivable using only rank `-1` clauses, i.e. without
/// having generated any nession yet (a "global attack").
pub fn find_global_attack(query: &Message, global_clauses: &[HornClause]) -> Option<Attack> {
    let only_global: Vec<HornClause> =
        global_clauses.iter().filter(|c| c.rank == -1).cloned().collect();
    let mut search = AttackSearch::new(&only_global);
    search.derive(query)
}
