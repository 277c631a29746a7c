//! Rule-text parser.
//!
//! Hand-rolled recursive-descent (comment-stripping helper, `Result`-returning
//! parse functions) returning this crate's [`ParseError`], implementing the
//! grammar below for rule text.
//!
//! ```text
//! rule      := [label '='] [guard] premises '-[' snapshots ']->' result
//! guard     := '[' guardTerm (',' guardTerm)* ']'
//! guardTerm := msg ('~/>'|'=/=') msg
//! premises  := event (',' event)* [':' '{' ord (',' ord)* '}']
//! event     := ('k'|'know'|'n'|'new'|'m'|'make') '(' msg ')' ['(' label ')']
//! snapshots := (state (',' state)*)? [':' '{' ord (',' ord)* '}']
//! state     := '(' stateExpr ',' label ')'
//! ord       := label ('=<'|'<@') label
//! result    := event | ('<' label ':' stateExpr '>')+
//! ```
//!
//! Message syntax (not fixed by the grammar above, chosen here so the
//! parser and [`print`] round-trip exactly): a bare identifier is a
//! `Variable`; `ident[]` is a `Name`; `ident[n]` is a `Nonce`; `f(a, b)` is
//! a `Function`; `<a, b>` is a `Tuple`.

mod print;

pub use print::{print_event, print_message, print_rule, print_rule_source, print_state};

use crate::error::{ParseError, Position};
use crate::event::{Event, EventKind};
use crate::guard::Guard;
use crate::rule::{OrderKind, PendingResult, Rule, RuleBuilder, RuleSource, SnapshotDecl};
use crate::state::State;
use crate::term::Message;

/// Strip `//` line comments and `/* ... */` block comments from rule text
/// (block comments tracked with a depth counter so nesting doesn't break).
fn strip_comments(source: &str) -> String {
    let mut result = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut block_depth = 0usize;

    while let Some(c) = chars.next() {
        if block_depth == 0 && c == '/' && chars.peek() == Some(&'/') {
            for c in chars.by_ref() {
                if c == '\n' {
                    result.push('\n');
                    break;
                }
            }
            continue;
        }
        if c == '/' && chars.peek() == Some(&'*') {
            chars.next();
            block_depth += 1;
            continue;
        }
        if c == '*' && chars.peek() == Some(&'/') && block_depth > 0 {
            chars.next();
            block_depth -= 1;
            if block_depth == 0 {
                result.push(' ');
            }
            continue;
        }
        if block_depth == 0 {
            result.push(c);
        }
    }

    result
}

struct Cursor<'a> {
    input: &'a [u8],
    text: &'a str,
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Cursor { input: text.as_bytes(), text, pos: 0, line: 1, column: 1 }
    }

    fn position(&self) -> Position {
        Position::new(self.pos, self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn peek_str(&self, s: &str) -> bool {
        self.text[self.pos..].starts_with(s)
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn eat(&mut self, literal: &str) -> Result<(), ParseError> {
        self.skip_ws();
        if self.peek_str(literal) {
            for _ in 0..literal.chars().count() {
                self.advance();
            }
            Ok(())
        } else {
            Err(ParseError::unexpected_token(
                self.position(),
                self.peek_snippet(literal.chars().count()),
                literal,
            ))
        }
    }

    /// The next `n` characters from the cursor, clamped to a char boundary
    /// (and to end-of-input) so it never slices a multibyte character in
    /// half.
    fn peek_snippet(&self, n: usize) -> &str {
        let end = self.text[self.pos..]
            .char_indices()
            .nth(n)
            .map_or(self.text.len(), |(idx, _)| self.pos + idx);
        &self.text[self.pos..end]
    }

    fn try_eat(&mut self, literal: &str) -> bool {
        self.skip_ws();
        if self.peek_str(literal) {
            for _ in 0..literal.chars().count() {
                self.advance();
            }
            true
        } else {
            false
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.pos >= self.input.len()
    }

    fn parse_identifier(&mut self) -> Result<String, ParseError> {
        self.skip_ws();
        let start = self.pos;
        let Some(c) = self.peek() else {
            return Err(ParseError::unexpected_end(self.position(), "identifier"));
        };
        if !(c.is_alphabetic() || c == '_') {
            return Err(ParseError::unexpected_token(self.position(), &c.to_string(), "identifier"));
        }
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        Ok(self.text[start..self.pos].to_string())
    }
}

fn parse_message(cursor: &mut Cursor) -> Result<Message, ParseError> {
    cursor.skip_ws();
    if cursor.try_eat("<") {
        let mut members = Vec::new();
        if !cursor.peek_str(">") {
            loop {
                members.push(parse_message(cursor)?);
                if !cursor.try_eat(",") {
                    break;
                }
            }
        }
        cursor.eat(">")?;
        return Ok(Message::tuple(members));
    }

    let name = cursor.parse_identifier()?;

    if cursor.try_eat("[") {
        if cursor.try_eat("n") {
            cursor.eat("]")?;
            return Ok(Message::nonce(name));
        }
        cursor.eat("]")?;
        return Ok(Message::name(name));
    }

    if cursor.try_eat("(") {
        let mut params = Vec::new();
        if !cursor.peek_str(")") {
            loop {
                params.push(parse_message(cursor)?);
                if !cursor.try_eat(",") {
                    break;
                }
            }
        }
        cursor.eat(")")?;
        return Ok(Message::function(name, params));
    }

    Ok(Message::variable(name))
}

fn parse_event_kind(cursor: &mut Cursor) -> Result<EventKind, ParseError> {
    cursor.skip_ws();
    for (keyword, kind) in [
        ("know", EventKind::Know),
        ("k", EventKind::Know),
        ("new", EventKind::New),
        ("n", EventKind::New),
        ("make", EventKind::Make),
        ("m", EventKind::Make),
        ("accept", EventKind::Accept),
    ] {
        if cursor.peek_str(keyword) {
            let saved = (cursor.pos, cursor.line, cursor.column);
            for _ in 0..keyword.len() {
                cursor.advance();
            }
            if cursor.peek() == Some('(') {
                return Ok(kind);
            }
            cursor.pos = saved.0;
            cursor.line = saved.1;
            cursor.column = saved.2;
        }
    }
    Err(ParseError::new(cursor.position(), "expected an event tag (k, know, n, new, m, make)"))
}

fn parse_event(cursor: &mut Cursor) -> Result<Event, ParseError> {
    let kind = parse_event_kind(cursor)?;
    cursor.eat("(")?;
    let message = parse_message(cursor)?;
    cursor.eat(")")?;
    let mut event = Event::new(kind, message);
    if cursor.try_eat("(") {
        let label = cursor.parse_identifier()?;
        cursor.eat(")")?;
        event = event.with_label(label);
    }
    Ok(event)
}

fn parse_guard_term(cursor: &mut Cursor) -> Result<(Message, Message, bool), ParseError> {
    let a = parse_message(cursor)?;
    let ununified = if cursor.try_eat("~/>") {
        true
    } else if cursor.try_eat("=/=") {
        false
    } else {
        return Err(ParseError::new(cursor.position(), "expected '~/>' or '=/=' in guard term"));
    };
    let b = parse_message(cursor)?;
    Ok((a, b, ununified))
}

fn parse_guard(cursor: &mut Cursor) -> Result<Guard, ParseError> {
    let mut guard = Guard::empty();
    cursor.eat("[")?;
    if !cursor.peek_str("]") {
        loop {
            let (a, b, ununified) = parse_guard_term(cursor)?;
            let result = if ununified { guard.add_ununified(a, b) } else { guard.add_ununifiable(a, b) };
            result.map_err(|e| ParseError::new(cursor.position(), e.to_string()))?;
            if !cursor.try_eat(",") {
                break;
            }
        }
    }
    cursor.eat("]")?;
    Ok(guard)
}

fn parse_state_expr(cursor: &mut Cursor) -> Result<State, ParseError> {
    let cell = cursor.parse_identifier()?;
    cursor.eat("(")?;
    let value = parse_message(cursor)?;
    cursor.eat(")")?;
    Ok(State::new(cell, value))
}

fn parse_ordering(cursor: &mut Cursor) -> Result<(String, String, OrderKind), ParseError> {
    let before = cursor.parse_identifier()?;
    let kind = if cursor.try_eat("=<") || cursor.try_eat("\u{2264}") {
        OrderKind::LaterThan
    } else if cursor.try_eat("<@") || cursor.try_eat("\u{22cb}") {
        OrderKind::ModifiedLaterThan
    } else {
        return Err(ParseError::new(cursor.position(), "expected '=<' or '<@' in ordering constraint"));
    };
    let after = cursor.parse_identifier()?;
    Ok((before, after, kind))
}

fn parse_ordering_block(cursor: &mut Cursor) -> Result<Vec<(String, String, OrderKind)>, ParseError> {
    let mut orderings = Vec::new();
    if cursor.try_eat(":") {
        cursor.eat("{")?;
        if !cursor.peek_str("}") {
            loop {
                orderings.push(parse_ordering(cursor)?);
                if !cursor.try_eat(",") {
                    break;
                }
            }
        }
        cursor.eat("}")?;
    }
    Ok(orderings)
}

fn parse_premises(cursor: &mut Cursor) -> Result<(Vec<Event>, Vec<(String, String, OrderKind)>), ParseError> {
    let mut events = Vec::new();
    cursor.skip_ws();
    if !cursor.peek_str("-[") {
        loop {
            events.push(parse_event(cursor)?);
            if !cursor.try_eat(",") {
                break;
            }
        }
    }
    let correspondences = parse_ordering_block(cursor)?;
    Ok((events, correspondences))
}

fn parse_snapshots(cursor: &mut Cursor) -> Result<(Vec<SnapshotDecl>, Vec<(String, String, OrderKind)>), ParseError> {
    let mut snapshots = Vec::new();
    cursor.skip_ws();
    if !cursor.peek_str("]") && !cursor.peek_str(":") {
        loop {
            cursor.eat("(")?;
            let condition = parse_state_expr(cursor)?;
            cursor.eat(",")?;
            let label = cursor.parse_identifier()?;
            cursor.eat(")")?;
            snapshots.push(SnapshotDecl { condition, label });
            if !cursor.try_eat(",") {
                break;
            }
        }
    }
    let ordering = parse_ordering_block(cursor)?;
    Ok((snapshots, ordering))
}

fn parse_result(cursor: &mut Cursor) -> Result<PendingResult, ParseError> {
    cursor.skip_ws();
    if cursor.peek_str("<") {
        let mut transfers = Vec::new();
        while cursor.try_eat("<") {
            let label = cursor.parse_identifier()?;
            cursor.eat(":")?;
            let state = parse_state_expr(cursor)?;
            cursor.eat(">")?;
            transfers.push((label, state));
            cursor.skip_ws();
            if !cursor.peek_str("<") {
                break;
            }
        }
        return Ok(PendingResult::Transfers(transfers));
    }
    Ok(PendingResult::Event(parse_event(cursor)?))
}

fn parse_rule_inner(cursor: &mut Cursor) -> Result<RuleBuilder, ParseError> {
    let mut builder = RuleBuilder::new();

    let checkpoint = (cursor.pos, cursor.line, cursor.column);
    if let Ok(label) = cursor.parse_identifier() {
        if cursor.try_eat("=") {
            builder.label = Some(label);
        } else {
            cursor.pos = checkpoint.0;
            cursor.line = checkpoint.1;
            cursor.column = checkpoint.2;
        }
    }

    cursor.skip_ws();
    if cursor.peek_str("[") {
        builder.guard = parse_guard(cursor)?;
    }

    let (premises, premise_ordering) = parse_premises(cursor)?;
    builder.premises = premises;
    builder.ordering.extend(premise_ordering);

    cursor.eat("-[")?;
    let (snapshots, snapshot_ordering) = parse_snapshots(cursor)?;
    builder.snapshot_decls = snapshots;
    builder.ordering.extend(snapshot_ordering);
    cursor.eat("]->")?;

    builder.result = Some(parse_result(cursor)?);

    Ok(builder)
}

/// Parse rule text into a [`Rule`].
pub fn parse_rule(text: &str) -> Result<Rule, ParseError> {
    let stripped = strip_comments(text);
    let mut cursor = Cursor::new(&stripped);
    let builder = parse_rule_inner(&mut cursor)?;
    if !cursor.at_end() {
        return Err(ParseError::new(cursor.position(), "unexpected trailing input after rule"));
    }
    builder
        .build(RuleSource::Parsed { text: text.to_string() })
        .map_err(|e| ParseError::new(cursor.position(), e.to_string()))
}

/// Parse message text into a [`Message`].
pub fn parse_message_text(text: &str) -> Result<Message, ParseError> {
    let stripped = strip_comments(text);
    let mut cursor = Cursor::new(&stripped);
    let message = parse_message(&mut cursor)?;
    if !cursor.at_end() {
        return Err(ParseError::new(cursor.position(), "unexpected trailing input after message"));
    }
    Ok(message)
}

/// Parse state text (e.g. `SD(m)`) into a [`State`].
pub fn parse_state_text(text: &str) -> Result<State, ParseError> {
    let stripped = strip_comments(text);
    let mut cursor = Cursor::new(&stripped);
    let state = parse_state_expr(&mut cursor)?;
    if !cursor.at_end() {
        return Err(ParseError::new(cursor.position(), "unexpected trailing input after state"));
    }
    Ok(state)
}

/// Parse event text (e.g. `k(m)`) into an [`Event`].
pub fn parse_event_text(text: &str) -> Result<Event, ParseError> {
    let stripped = strip_comments(text);
    let mut cursor = Cursor::new(&stripped);
    let event = parse_event(&mut cursor)?;
    if !cursor.at_end() {
        return Err(ParseError::new(cursor.position(), "unexpected trailing input after event"));
    }
    Ok(event)
}
