//! Events: the `Know`/`New`/`Make` tags a rule premise or result carries.
//!
//! `k`/`know`, `n`/`new`, `m`/`make` in the rule grammar. An `Accept`-like
//! fourth tag exists only as a rule-construction error case (an
//! Accept-tagged event may never appear as a premise) — modeled here as
//! [`EventKind::Accept`] so construction can reject it by matching on the
//! enum rather than by string comparison.

use std::fmt;

use crate::substitution::SigmaMap;
use crate::term::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// The adversary knows this message (`k`/`know`).
    Know,
    /// A nonce is freshly introduced (`n`/`new`).
    New,
    /// A message is constructed from previously-known parts (`m`/`make`).
    Make,
    /// Only ever produced by front-end collaborators outside this crate's
    /// scope; rejected if it appears in a rule premise.
    Accept,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Know => "know",
            EventKind::New => "new",
            EventKind::Make => "make",
            EventKind::Accept => "accept",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Event {
    pub kind: EventKind,
    pub message: Message,
    /// The optional rule-local label a premise event can carry, e.g.
    /// `k(m)(a)` referencing snapshot label `a`.
    pub label: Option<String>,
}

impl Event {
    pub fn new(kind: EventKind, message: Message) -> Self {
        Event { kind, message, label: None }
    }

    pub fn know(message: Message) -> Self {
        Event::new(EventKind::Know, message)
    }

    pub fn new_nonce(message: Message) -> Self {
        Event::new(EventKind::New, message)
    }

    pub fn make(message: Message) -> Self {
        Event::new(EventKind::Make, message)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn substitute(&self, sigma: &SigmaMap) -> Event {
        Event { kind: self.kind, message: self.message.substitute(sigma), label: self.label.clone() }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind, self.message)?;
        if let Some(label) = &self.label {
            write!(f, "({label})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitute_leaves_kind_and_label_unchanged() {
        let event = Event::know(Message::variable("x")).with_label("a");
        let mut bindings = std::collections::HashMap::new();
        bindings.insert(std::sync::Arc::from("x"), Message::name("secret"));
        let sigma = crate::substitution::SigmaFactory::one_sided();
        let mut guard = crate::guard::Guard::empty();
        let mut factory = sigma;
        factory.insert_forward("x", &Message::name("secret"), &mut guard);
        let sigma = factory.build_forward();

        let substituted = event.substitute(&sigma);
        assert_eq!(substituted.kind, EventKind::Know);
        assert_eq!(substituted.label, Some("a".to_string()));
        assert_eq!(substituted.message, Message::name("secret"));
    }
}
