//! Unification under inequality guards.
//!
//! Two algorithms, both built on `SigmaFactory` so that every variable
//! binding is checked against the guard and rewritten into
//! previously-accumulated images as it's made.
//!
//! - [`unify_to`]: one-directional — only the first argument may be
//!   refined, producing a single substitution that turns `a` into `b`.
//! - [`unifiable`]: two-directional — both arguments may be refined,
//!   producing a pair `(sigma1, sigma2)` such that `a.substitute(sigma1) ==
//!   b.substitute(sigma2)`.
//!
//! Both return `false`/`None` on arity or head mismatch, or the moment a
//! guard would be violated.

use crate::guard::Guard;
use crate::substitution::{SigmaFactory, SigmaMap};
use crate::term::Message;

/// Attempt to unify `a` into `b`, refining only `a`'s variables.
/// Returns the forward substitution on success.
pub fn unify_to(a: &Message, b: &Message, guard: &Guard) -> Option<SigmaMap> {
    let mut factory = SigmaFactory::one_sided();
    let mut guard = guard.clone();
    if unify_to_into(a, b, &mut factory, &mut guard) {
        Some(factory.build_forward())
    } else {
        None
    }
}

fn unify_to_into(a: &Message, b: &Message, factory: &mut SigmaFactory, guard: &mut Guard) -> bool {
    match (a, b) {
        (Message::Variable(v), _) => factory.insert_forward(v, b, guard),
        (Message::Name(x), Message::Name(y)) => x == y,
        (Message::Nonce(x), Message::Nonce(y)) => x == y,
        (Message::Function(f, fp), Message::Function(g, gp)) => {
            if f != g || fp.len() != gp.len() {
                return false;
            }
            fp.iter().zip(gp.iter()).all(|(x, y)| unify_to_into(x, y, factory, guard))
        }
        (Message::Tuple(xs), Message::Tuple(ys)) => {
            if xs.len() != ys.len() {
                return false;
            }
            xs.iter().zip(ys.iter()).all(|(x, y)| unify_to_into(x, y, factory, guard))
        }
        _ => false,
    }
}

/// Attempt to unify `a` and `b`, refining both sides independently.
/// Returns `(sigma_for_a, sigma_for_b)` on success.
pub fn unifiable(a: &Message, b: &Message, guard: &Guard) -> Option<(SigmaMap, SigmaMap)> {
    let mut factory = SigmaFactory::two_sided();
    let mut guard = guard.clone();
    if unifiable_into(a, b, &mut factory, &mut guard) {
        Some(factory.build_pair())
    } else {
        None
    }
}

fn unifiable_into(a: &Message, b: &Message, factory: &mut SigmaFactory, guard: &mut Guard) -> bool {
    match (a, b) {
        (Message::Variable(v), Message::Variable(w)) if v == w => true,
        (Message::Variable(v), _) => factory.insert_forward(v, b, guard),
        (_, Message::Variable(w)) => factory.insert_backward(w, a, guard),
        (Message::Name(x), Message::Name(y)) => x == y,
        (Message::Nonce(x), Message::Nonce(y)) => x == y,
        (Message::Function(f, fp), Message::Function(g, gp)) => {
            if f != g || fp.len() != gp.len() {
                return false;
            }
            fp.iter().zip(gp.iter()).all(|(x, y)| unifiable_into(x, y, factory, guard))
        }
        (Message::Tuple(xs), Message::Tuple(ys)) => {
            if xs.len() != ys.len() {
                return false;
            }
            xs.iter().zip(ys.iter()).all(|(x, y)| unifiable_into(x, y, factory, guard))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unify_to_binds_variable_to_ground_term() {
        let guard = Guard::empty();
        let sigma = unify_to(&Message::variable("x"), &Message::name("a"), &guard).unwrap();
        assert_eq!(sigma.get("x"), Some(&Message::name("a")));
    }

    #[test]
    fn unify_to_rejects_head_mismatch() {
        let guard = Guard::empty();
        assert!(unify_to(&Message::name("a"), &Message::name("b"), &guard).is_none());
    }

    #[test]
    fn unify_to_respects_guard() {
        let mut guard = Guard::empty();
        guard
            .add_ununified(Message::variable("x"), Message::name("secret"))
            .unwrap();
        assert!(unify_to(&Message::variable("x"), &Message::name("secret"), &guard).is_none());
        assert!(unify_to(&Message::variable("x"), &Message::name("other"), &guard).is_some());
    }

    #[test]
    fn unify_to_implies_unifiable() {
        // unify_to success implies unifiable success.
        let guard = Guard::empty();
        let a = Message::function("h", vec![Message::variable("x"), Message::name("b")]);
        let b = Message::function("h", vec![Message::name("a"), Message::name("b")]);
        assert!(unify_to(&a, &b, &guard).is_some());
        assert!(unifiable(&a, &b, &guard).is_some());
    }

    #[test]
    fn unifiable_binds_variables_on_both_sides() {
        let guard = Guard::empty();
        let a = Message::tuple(vec![Message::variable("x"), Message::name("b")]);
        let b = Message::tuple(vec![Message::name("a"), Message::variable("y")]);
        let (s1, s2) = unifiable(&a, &b, &guard).unwrap();
        assert_eq!(s1.get("x"), Some(&Message::name("a")));
        assert_eq!(s2.get("y"), Some(&Message::name("b")));
    }

    #[test]
    fn unifiable_is_symmetric() {
        let guard = Guard::empty();
        let a = Message::function("pair", vec![Message::variable("x"), Message::name("b")]);
        let b = Message::function("pair", vec![Message::name("a"), Message::variable("y")]);
        let forward = unifiable(&a, &b, &guard).is_some();
        let backward = unifiable(&b, &a, &guard).is_some();
        assert_eq!(forward, backward);
    }

    #[test]
    fn unifiable_rejects_arity_mismatch() {
        let guard = Guard::empty();
        let a = Message::tuple(vec![Message::name("a")]);
        let b = Message::tuple(vec![Message::name("a"), Message::name("b")]);
        assert!(unifiable(&a, &b, &guard).is_none());
    }
}
