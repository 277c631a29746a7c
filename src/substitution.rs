//! Substitutions: `SigmaMap` (the idempotent mapping itself) and
//! `SigmaFactory` (the builder used during unification).
//!
//! A `SigmaMap` is idempotent — applying it twice gives the same result as
//! applying it once — which means that whenever a new binding `v -> t` is
//! inserted, any existing image that mentions `v` must be rewritten by the
//! new binding, and `t` itself must be rewritten by the map accumulated so
//! far (and, when building a pair of substitutions for two-directional
//! unification, by the *other* side's map too).

use std::collections::HashMap;
use std::sync::Arc;

use crate::guard::Guard;
use crate::term::Message;

/// An idempotent variable-to-message substitution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SigmaMap {
    bindings: HashMap<Arc<str>, Message>,
}

impl SigmaMap {
    pub fn empty() -> Self {
        SigmaMap::default()
    }

    pub fn get(&self, variable: &str) -> Option<&Message> {
        self.bindings.get(variable)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &Message)> {
        self.bindings.iter()
    }

    /// Compose `self` with `other`, applying `self` first then `other`.
    /// The result stays idempotent: every image carried over from `self` is
    /// rewritten through `other`.
    pub fn compose(&self, other: &SigmaMap) -> SigmaMap {
        let mut bindings: HashMap<Arc<str>, Message> = self
            .bindings
            .iter()
            .map(|(v, t)| (Arc::clone(v), t.substitute(other)))
            .collect();
        for (v, t) in &other.bindings {
            bindings.entry(Arc::clone(v)).or_insert_with(|| t.clone());
        }
        SigmaMap { bindings }
    }
}

/// Builder for one or two substitutions under construction during
/// unification. Maintains the idempotence invariant on every insert:
/// inserting `v -> t` rewrites `t` by the opposite map (for two-sided
/// construction) and then by the map being extended, and rewrites every
/// existing image in that map that mentions `v`.
#[derive(Debug, Clone, Default)]
pub struct SigmaFactory {
    forward: HashMap<Arc<str>, Message>,
    backward: Option<HashMap<Arc<str>, Message>>,
}

impl SigmaFactory {
    /// A factory building a single, one-directional substitution.
    pub fn one_sided() -> Self {
        SigmaFactory { forward: HashMap::new(), backward: None }
    }

    /// A factory building a forward/backward pair, for two-directional
    /// unification.
    pub fn two_sided() -> Self {
        SigmaFactory { forward: HashMap::new(), backward: Some(HashMap::new()) }
    }

    fn rewrite_existing(map: &mut HashMap<Arc<str>, Message>, sigma: &SigmaMap) {
        for image in map.values_mut() {
            *image = image.substitute(sigma);
        }
    }

    /// Insert `v -> t` into the forward map. Returns `false` if `v` is
    /// already bound to a different (post-rewrite) image — re-binding to an
    /// equal image is accepted as a no-op success.
    pub fn insert_forward(&mut self, v: &str, t: &Message, guard: &mut Guard) -> bool {
        self.insert_into(true, v, t, guard)
    }

    /// Insert `v -> t` into the backward map (two-sided factories only).
    pub fn insert_backward(&mut self, v: &str, t: &Message, guard: &mut Guard) -> bool {
        self.insert_into(false, v, t, guard)
    }

    fn insert_into(&mut self, forward_side: bool, v: &str, t: &Message, guard: &mut Guard) -> bool {
        let opposite_snapshot = if forward_side {
            self.backward.clone()
        } else {
            Some(self.forward.clone())
        };

        let mut image = t.clone();
        if let Some(opposite) = &opposite_snapshot {
            let opposite_sigma = SigmaMap { bindings: opposite.clone() };
            image = image.substitute(&opposite_sigma);
        }

        let self_sigma = SigmaMap {
            bindings: if forward_side { self.forward.clone() } else {
                self.backward.clone().unwrap_or_default()
            },
        };
        image = image.substitute(&self_sigma);

        if !guard.can_unify(v, &image) {
            return false;
        }

        let target = if forward_side { &mut self.forward } else {
            match &mut self.backward {
                Some(b) => b,
                None => return false,
            }
        };

        if let Some(existing) = target.get(v) {
            return existing == &image;
        }

        let new_binding_sigma = {
            let mut bindings = HashMap::new();
            bindings.insert(Arc::from(v), image.clone());
            SigmaMap { bindings }
        };
        Self::rewrite_existing(target, &new_binding_sigma);
        guard.substitute_in_place(&new_binding_sigma);

        target.insert(Arc::from(v), image);
        true
    }

    pub fn build_forward(self) -> SigmaMap {
        SigmaMap { bindings: self.forward }
    }

    pub fn build_backward(self) -> Option<SigmaMap> {
        self.backward.map(|b| SigmaMap { bindings: b })
    }

    pub fn build_pair(self) -> (SigmaMap, SigmaMap) {
        let backward = self.backward.clone().unwrap_or_default();
        (SigmaMap { bindings: self.forward }, SigmaMap { bindings: backward })
    }
}
