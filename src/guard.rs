//! Guards: the inequality side-conditions carried alongside substitutions.
//!
//! Two guard-term relations:
//! - `a ~/> b` ("ununified-to"): `a` must never be narrowed, by further
//!   substitution, into exactly `b`.
//! - `a =/= b` ("ununifiable"): `a` and `b` must never become unifiable.
//!
//! Each relation is a classified set of edges (one `Vec` per relation,
//! checked and rewritten in lockstep), the same shape used elsewhere in
//! this crate for keeping two kinds of edges apart.

use crate::error::GuardInconsistency;
use crate::substitution::SigmaMap;
use crate::term::Message;

/// A conjunction of guard terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Guard {
    ununified: Vec<(Message, Message)>,
    ununifiable: Vec<(Message, Message)>,
}

impl Guard {
    pub fn empty() -> Self {
        Guard::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ununified.is_empty() && self.ununifiable.is_empty()
    }

    pub fn ununified_terms(&self) -> &[(Message, Message)] {
        &self.ununified
    }

    pub fn ununifiable_terms(&self) -> &[(Message, Message)] {
        &self.ununifiable
    }

    /// Add an `a ~/> b` constraint. Rejects the trivially self-contradictory
    /// `v ~/> v` shape (a variable guarded against narrowing to itself,
    /// which no substitution can ever satisfy).
    pub fn add_ununified(&mut self, a: Message, b: Message) -> Result<(), GuardInconsistency> {
        if a == b {
            return Err(GuardInconsistency::new(format!("{a} ~/> {b} can never be satisfied")));
        }
        self.ununified.push((a, b));
        Ok(())
    }

    /// Add an `a =/= b` constraint.
    pub fn add_ununifiable(&mut self, a: Message, b: Message) -> Result<(), GuardInconsistency> {
        if a == b {
            return Err(GuardInconsistency::new(format!("{a} =/= {b} can never be satisfied")));
        }
        self.ununifiable.push((a, b));
        Ok(())
    }

    /// Whether binding `v` to `image` is consistent with the guard terms
    /// recorded so far. Conservative: only catches constraints whose
    /// left-hand (or, for `=/=`, either) side is exactly the variable being
    /// bound; constraints over compound terms are re-checked as the
    /// substitution that eventually grounds them is applied, via
    /// `substitute`.
    pub fn can_unify(&self, v: &str, image: &Message) -> bool {
        for (a, b) in &self.ununified {
            if matches!(a, Message::Variable(name) if name.as_ref() == v) && b == image {
                return false;
            }
        }
        for (a, b) in &self.ununifiable {
            if matches!(a, Message::Variable(name) if name.as_ref() == v) && b == image {
                return false;
            }
            if matches!(b, Message::Variable(name) if name.as_ref() == v) && a == image {
                return false;
            }
        }
        true
    }

    /// Rewrite every guard term by `sigma`, dropping constraints that are
    /// now permanently satisfied and reporting `false` if any constraint
    /// has become impossible to satisfy (the clause or rule this guard
    /// belongs to must then be dropped — guard inconsistency is never
    /// surfaced as a query failure).
    pub fn substitute(&self, sigma: &SigmaMap) -> Option<Guard> {
        let mut next = Guard::empty();

        for (a, b) in &self.ununified {
            let a2 = a.substitute(sigma);
            let b2 = b.substitute(sigma);
            if a2 == b2 {
                return None;
            }
            if !a2.contains_variables() && !b2.contains_variables() {
                continue; // ground and distinct: permanently satisfied
            }
            next.ununified.push((a2, b2));
        }

        for (a, b) in &self.ununifiable {
            let a2 = a.substitute(sigma);
            let b2 = b.substitute(sigma);
            if a2 == b2 {
                return None;
            }
            if heads_clash(&a2, &b2) {
                continue; // can never unify regardless of further substitution
            }
            next.ununifiable.push((a2, b2));
        }

        Some(next)
    }

    /// In-place variant of [`Guard::substitute`] used while a `SigmaFactory`
    /// is accumulating bindings. Leaves `self` untouched if the
    /// substitution would make the guard inconsistent (the caller is
    /// expected to have already rejected the binding via `can_unify`
    /// before this point, so this is mainly a bookkeeping step).
    pub fn substitute_in_place(&mut self, sigma: &SigmaMap) {
        if let Some(next) = self.substitute(sigma) {
            *self = next;
        }
    }
}

fn heads_clash(a: &Message, b: &Message) -> bool {
    match (a, b) {
        (Message::Name(x), Message::Name(y)) => x != y,
        (Message::Nonce(x), Message::Nonce(y)) => x != y,
        (Message::Function(f, fp), Message::Function(g, gp)) => f != g || fp.len() != gp.len(),
        (Message::Tuple(xs), Message::Tuple(ys)) => xs.len() != ys.len(),
        (Message::Variable(_), _) | (_, Message::Variable(_)) => false,
        _ => std::mem::discriminant(a) != std::mem::discriminant(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_contradictory_ununified_rejected() {
        let mut guard = Guard::empty();
        let v = Message::variable("x");
        assert!(guard.add_ununified(v.clone(), v).is_err());
    }

    #[test]
    fn can_unify_rejects_direct_violation() {
        let mut guard = Guard::empty();
        guard
            .add_ununified(Message::variable("x"), Message::name("secret"))
            .unwrap();
        assert!(!guard.can_unify("x", &Message::name("secret")));
        assert!(guard.can_unify("x", &Message::name("other")));
    }

    #[test]
    fn substitute_drops_satisfied_ground_constraint() {
        let mut guard = Guard::empty();
        guard
            .add_ununified(Message::variable("x"), Message::name("secret"))
            .unwrap();

        let built = {
            let mut factory = crate::substitution::SigmaFactory::one_sided();
            let mut scratch_guard = Guard::empty();
            factory.insert_forward("x", &Message::name("other"), &mut scratch_guard);
            factory.build_forward()
        };

        let result = guard.substitute(&built).expect("still consistent");
        assert!(result.is_empty());
    }

    #[test]
    fn substitute_detects_violation() {
        let mut guard = Guard::empty();
        guard
            .add_ununified(Message::variable("x"), Message::name("secret"))
            .unwrap();

        let built = {
            let mut factory = crate::substitution::SigmaFactory::one_sided();
            let mut scratch_guard = Guard::empty();
            factory.insert_forward("x", &Message::name("secret"), &mut scratch_guard);
            factory.build_forward()
        };

        assert!(guard.substitute(&built).is_none());
    }
}
