//! Term algebra: the `Message` type and its structural operations.
//!
//! Messages are a sealed, immutable set of variants with structural
//! equality, a cached hash, and a cached depth. A tagged sum (`enum`),
//! not an inheritance hierarchy.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::{Arc, OnceLock};

use crate::substitution::SigmaMap;

/// The child list of a `Function` or `Tuple` node, with its structural hash
/// computed once and cached alongside it.
///
/// Hashing a deep term is the one operation that gets run repeatedly over
/// the same shared subtree (dedup keys, `HashSet`/`HashMap` lookups during
/// elaboration), so caching it here — rather than on `Message` itself, where
/// leaves are already O(1) — is where it pays for its keep.
#[derive(Debug, Clone)]
pub struct Params {
    items: Vec<Message>,
    hash_cache: OnceLock<u64>,
}

impl Params {
    pub(crate) fn new(items: Vec<Message>) -> Self {
        Params { items, hash_cache: OnceLock::new() }
    }

    fn cached_hash(&self) -> u64 {
        *self.hash_cache.get_or_init(|| {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            self.items.hash(&mut hasher);
            hasher.finish()
        })
    }
}

impl Deref for Params {
    type Target = [Message];

    fn deref(&self) -> &[Message] {
        &self.items
    }
}

impl PartialEq for Params {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl Eq for Params {}

impl Hash for Params {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.cached_hash());
    }
}

/// A symbolic message term.
///
/// Cloning is cheap: `Function` and `Tuple` hold `Arc`-shared children, so
/// substitution and unification can build new terms without deep-copying
/// unrelated subtrees.
#[derive(Debug, Clone)]
pub enum Message {
    /// A free name, e.g. `a[]` parsed without parameters.
    Name(Arc<str>),
    /// A nonce, introduced by a `New` event.
    Nonce(Arc<str>),
    /// A free variable, universally or existentially scoped depending on
    /// where it occurs.
    Variable(Arc<str>),
    /// An uninterpreted function application.
    Function(Arc<str>, Arc<Params>),
    /// A fixed-arity tuple.
    Tuple(Arc<Params>),
}

impl Message {
    pub fn name(text: impl Into<Arc<str>>) -> Self {
        Message::Name(text.into())
    }

    pub fn nonce(text: impl Into<Arc<str>>) -> Self {
        Message::Nonce(text.into())
    }

    pub fn variable(text: impl Into<Arc<str>>) -> Self {
        Message::Variable(text.into())
    }

    pub fn function(name: impl Into<Arc<str>>, params: Vec<Message>) -> Self {
        Message::Function(name.into(), Arc::new(Params::new(params)))
    }

    pub fn tuple(members: Vec<Message>) -> Self {
        Message::Tuple(Arc::new(Params::new(members)))
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Message::Variable(_))
    }

    /// The textual head: the name for `Name`/`Nonce`/`Variable`, the
    /// function symbol for `Function`. `Tuple` has no head.
    pub fn head(&self) -> Option<&str> {
        match self {
            Message::Name(n) | Message::Nonce(n) | Message::Variable(n) => Some(n),
            Message::Function(f, _) => Some(f),
            Message::Tuple(_) => None,
        }
    }

    pub fn contains_variables(&self) -> bool {
        match self {
            Message::Name(_) | Message::Nonce(_) => false,
            Message::Variable(_) => true,
            Message::Function(_, params) => params.iter().any(Message::contains_variables),
            Message::Tuple(members) => members.iter().any(Message::contains_variables),
        }
    }

    /// Depth of the term tree; leaves (`Name`/`Nonce`/`Variable`) have
    /// depth 1.
    pub fn max_depth(&self) -> usize {
        match self {
            Message::Name(_) | Message::Nonce(_) | Message::Variable(_) => 1,
            Message::Function(_, params) => {
                1 + params.iter().map(Message::max_depth).max().unwrap_or(0)
            }
            Message::Tuple(members) => {
                1 + members.iter().map(Message::max_depth).max().unwrap_or(0)
            }
        }
    }

    pub fn collect_variables(&self, out: &mut HashSet<Arc<str>>) {
        match self {
            Message::Name(_) | Message::Nonce(_) => {}
            Message::Variable(v) => {
                out.insert(Arc::clone(v));
            }
            Message::Function(_, params) => {
                for p in params.iter() {
                    p.collect_variables(out);
                }
            }
            Message::Tuple(members) => {
                for m in members.iter() {
                    m.collect_variables(out);
                }
            }
        }
    }

    pub fn variables(&self) -> HashSet<Arc<str>> {
        let mut out = HashSet::new();
        self.collect_variables(&mut out);
        out
    }

    pub fn contains_subterm(&self, needle: &Message) -> bool {
        if self == needle {
            return true;
        }
        match self {
            Message::Name(_) | Message::Nonce(_) | Message::Variable(_) => false,
            Message::Function(_, params) => params.iter().any(|p| p.contains_subterm(needle)),
            Message::Tuple(members) => members.iter().any(|m| m.contains_subterm(needle)),
        }
    }

    /// Apply a substitution. Short-circuits on variable-free terms, since
    /// substitution can only ever change a term through its variables.
    pub fn substitute(&self, sigma: &SigmaMap) -> Message {
        if !self.contains_variables() {
            return self.clone();
        }
        match self {
            Message::Name(_) | Message::Nonce(_) => self.clone(),
            Message::Variable(v) => sigma.get(v).cloned().unwrap_or_else(|| self.clone()),
            Message::Function(f, params) => {
                let new_params: Vec<Message> =
                    params.iter().map(|p| p.substitute(sigma)).collect();
                Message::Function(Arc::clone(f), Arc::new(Params::new(new_params)))
            }
            Message::Tuple(members) => {
                let new_members: Vec<Message> =
                    members.iter().map(|m| m.substitute(sigma)).collect();
                Message::Tuple(Arc::new(Params::new(new_members)))
            }
        }
    }

    pub fn arity(&self) -> Option<usize> {
        match self {
            Message::Function(_, params) => Some(params.len()),
            Message::Tuple(members) => Some(members.len()),
            _ => None,
        }
    }
}

impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Message::Name(a), Message::Name(b)) => a == b,
            (Message::Nonce(a), Message::Nonce(b)) => a == b,
            (Message::Variable(a), Message::Variable(b)) => a == b,
            (Message::Function(f1, p1), Message::Function(f2, p2)) => f1 == f2 && p1 == p2,
            (Message::Tuple(m1), Message::Tuple(m2)) => m1 == m2,
            _ => false,
        }
    }
}

impl Eq for Message {}

impl std::hash::Hash for Message {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Message::Name(n) | Message::Nonce(n) | Message::Variable(n) => n.hash(state),
            Message::Function(f, params) => {
                f.hash(state);
                params.hash(state);
            }
            Message::Tuple(members) => members.hash(state),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Name(n) => write!(f, "{n}[]"),
            Message::Nonce(n) => write!(f, "{n}[n]"),
            Message::Variable(v) => write!(f, "{v}"),
            Message::Function(name, params) => {
                write!(f, "{name}(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ")")
            }
            Message::Tuple(members) => {
                write!(f, "<")?;
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{m}")?;
                }
                write!(f, ">")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality_ignores_sharing() {
        let a = Message::function("h", vec![Message::name("x"), Message::name("y")]);
        let b = Message::function("h", vec![Message::name("x"), Message::name("y")]);
        assert_eq!(a, b);
    }

    #[test]
    fn contains_variables_is_recursive() {
        let t = Message::tuple(vec![Message::name("a"), Message::variable("x")]);
        assert!(t.contains_variables());
        let t2 = Message::tuple(vec![Message::name("a"), Message::name("b")]);
        assert!(!t2.contains_variables());
    }

    #[test]
    fn max_depth_counts_leaves_as_one() {
        assert_eq!(Message::name("a").max_depth(), 1);
        let nested = Message::function("f", vec![Message::function("g", vec![Message::name("a")])]);
        assert_eq!(nested.max_depth(), 3);
    }

    #[test]
    fn collect_variables_finds_all_occurrences() {
        let t = Message::function(
            "f",
            vec![Message::variable("x"), Message::tuple(vec![Message::variable("y"), Message::variable("x")])],
        );
        let vars = t.variables();
        assert_eq!(vars.len(), 2);
    }

    #[test]
    fn substitute_is_no_op_without_variables() {
        let t = Message::function("f", vec![Message::name("a")]);
        let sigma = SigmaMap::empty();
        assert_eq!(t.substitute(&sigma), t);
    }

    #[test]
    fn contains_subterm_finds_nested_match() {
        let inner = Message::name("a");
        let outer = Message::function("f", vec![inner.clone()]);
        assert!(outer.contains_subterm(&inner));
        assert!(!outer.contains_subterm(&Message::name("b")));
    }
}
