//! LDAP-style filter expressions.
//!
//! Units and requirements carry filters such as
//! `(&(osgi.os=linux)(|(osgi.arch=x86_64)(osgi.arch=aarch64)))` that are
//! evaluated against a [`SelectionContext`].

use crate::context::SelectionContext;
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error raised when a filter string cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid filter '{input}' at offset {offset}: {reason}")]
pub struct FilterError {
    /// The full filter text.
    pub input: String,
    /// Byte offset where parsing stopped.
    pub offset: usize,
    /// What the parser expected.
    pub reason: &'static str,
}

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Filter {
    /// All children must match.
    And(Vec<Filter>),
    /// At least one child must match.
    Or(Vec<Filter>),
    /// The child must not match.
    Not(Box<Filter>),
    /// `(key=value)`: exact equality.
    Equal {
        /// Context key.
        key: String,
        /// Expected value.
        value: String,
    },
    /// `(key=a*b*c)`: the literal parts must appear in order, with any run
    /// of characters where the unescaped `*`s were.
    Substring {
        /// Context key.
        key: String,
        /// Literal parts between wildcards; leading or trailing parts may be empty.
        parts: Vec<String>,
    },
    /// `(key=*)`: the key has any value.
    Present(String),
    /// `(key>=value)`.
    GreaterOrEqual {
        /// Context key.
        key: String,
        /// Lower bound.
        value: String,
    },
    /// `(key<=value)`.
    LessOrEqual {
        /// Context key.
        key: String,
        /// Upper bound.
        value: String,
    },
    /// `(key~=value)`: equality ignoring case and whitespace.
    Approx {
        /// Context key.
        key: String,
        /// Expected value.
        value: String,
    },
}

impl Filter {
    /// Parse a filter expression.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] with the failing offset on malformed input.
    pub fn parse(input: &str) -> Result<Self, FilterError> {
        let mut parser = Parser {
            input,
            bytes: input.as_bytes(),
            pos: 0,
        };
        parser.skip_whitespace();
        let filter = parser.filter()?;
        parser.skip_whitespace();
        if parser.pos != parser.bytes.len() {
            return Err(parser.error("trailing characters"));
        }
        Ok(filter)
    }

    /// Shorthand for `(key=value)`.
    pub fn equal(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Equal {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Evaluate the filter against a selection context.
    pub fn matches(&self, context: &SelectionContext) -> bool {
        match self {
            Self::And(children) => children.iter().all(|c| c.matches(context)),
            Self::Or(children) => children.iter().any(|c| c.matches(context)),
            Self::Not(child) => !child.matches(context),
            Self::Present(key) => context.get(key).is_some(),
            Self::Equal { key, value } => context.get(key) == Some(value.as_str()),
            Self::Substring { key, parts } => context
                .get(key)
                .is_some_and(|actual| substring_match(parts, actual)),
            Self::Approx { key, value } => context
                .get(key)
                .is_some_and(|actual| normalize(actual) == normalize(value)),
            Self::GreaterOrEqual { key, value } => context
                .get(key)
                .is_some_and(|actual| compare(actual, value).is_ge()),
            Self::LessOrEqual { key, value } => context
                .get(key)
                .is_some_and(|actual| compare(actual, value).is_le()),
        }
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

// Values that both look like versions compare structurally, everything else lexically.
fn compare(actual: &str, expected: &str) -> std::cmp::Ordering {
    match (Version::parse(actual), Version::parse(expected)) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => actual.cmp(expected),
    }
}

fn substring_match(parts: &[String], text: &str) -> bool {
    let Some((head, tail)) = parts.split_first() else {
        return text.is_empty();
    };
    let Some(mut rest) = text.strip_prefix(head.as_str()) else {
        return false;
    };
    let Some((last, middle)) = tail.split_last() else {
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part.as_str()) {
            Some(idx) => rest = &rest[idx + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last.as_str())
}

struct Parser<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, reason: &'static str) -> FilterError {
        FilterError {
            input: self.input.to_string(),
            offset: self.pos,
            reason,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, byte: u8, reason: &'static str) -> Result<(), FilterError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(reason))
        }
    }

    fn filter(&mut self) -> Result<Filter, FilterError> {
        self.expect(b'(', "expected '('")?;
        self.skip_whitespace();
        let filter = match self.peek() {
            Some(b'&') => {
                self.pos += 1;
                Filter::And(self.filter_list()?)
            }
            Some(b'|') => {
                self.pos += 1;
                Filter::Or(self.filter_list()?)
            }
            Some(b'!') => {
                self.pos += 1;
                self.skip_whitespace();
                Filter::Not(Box::new(self.filter()?))
            }
            Some(_) => self.item()?,
            None => return Err(self.error("unexpected end of filter")),
        };
        self.skip_whitespace();
        self.expect(b')', "expected ')'")?;
        Ok(filter)
    }

    fn filter_list(&mut self) -> Result<Vec<Filter>, FilterError> {
        let mut children = Vec::new();
        self.skip_whitespace();
        while self.peek() == Some(b'(') {
            children.push(self.filter()?);
            self.skip_whitespace();
        }
        if children.is_empty() {
            return Err(self.error("empty filter list"));
        }
        Ok(children)
    }

    fn item(&mut self) -> Result<Filter, FilterError> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| !matches!(b, b'=' | b'<' | b'>' | b'~' | b'(' | b')'))
        {
            self.pos += 1;
        }
        let key = self.input[start..self.pos].trim().to_string();
        if key.is_empty() {
            return Err(self.error("missing attribute name"));
        }

        let op = match self.peek() {
            Some(b'=') => {
                self.pos += 1;
                b'='
            }
            Some(op @ (b'<' | b'>' | b'~')) => {
                self.pos += 1;
                self.expect(b'=', "expected '=' after comparison operator")?;
                op
            }
            _ => return Err(self.error("expected operator")),
        };

        let parts = self.value()?;
        if op == b'=' && parts.len() > 1 {
            if parts.iter().all(String::is_empty) && parts.len() == 2 {
                return Ok(Filter::Present(key));
            }
            return Ok(Filter::Substring { key, parts });
        }
        // Only equality gives `*` a meaning.
        let value = parts.join("*");
        Ok(match op {
            b'=' => Filter::Equal { key, value },
            b'<' => Filter::LessOrEqual { key, value },
            b'>' => Filter::GreaterOrEqual { key, value },
            _ => Filter::Approx { key, value },
        })
    }

    /// The value up to the closing `)`, split at unescaped `*`s.
    fn value(&mut self) -> Result<Vec<String>, FilterError> {
        let mut parts = vec![String::new()];
        let mut chars = self.input[self.pos..].char_indices();
        loop {
            let Some((offset, c)) = chars.next() else {
                self.pos = self.bytes.len();
                return Err(self.error("unterminated value"));
            };
            match c {
                ')' => {
                    self.pos += offset;
                    trim_ends(&mut parts);
                    return Ok(parts);
                }
                '(' => {
                    self.pos += offset;
                    return Err(self.error("unescaped '(' in value"));
                }
                '\\' => match chars.next() {
                    Some((_, escaped)) => push(&mut parts, escaped),
                    None => {
                        self.pos = self.bytes.len();
                        return Err(self.error("dangling escape"));
                    }
                },
                '*' => parts.push(String::new()),
                _ => push(&mut parts, c),
            }
        }
    }
}

fn push(parts: &mut [String], c: char) {
    if let Some(last) = parts.last_mut() {
        last.push(c);
    }
}

fn trim_ends(parts: &mut [String]) {
    if let Some(first) = parts.first_mut() {
        *first = first.trim_start().to_string();
    }
    if let Some(last) = parts.last_mut() {
        *last = last.trim_end().to_string();
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list(f: &mut fmt::Formatter<'_>, op: char, children: &[Filter]) -> fmt::Result {
            write!(f, "({op}")?;
            for child in children {
                write!(f, "{child}")?;
            }
            write!(f, ")")
        }

        match self {
            Self::And(children) => list(f, '&', children),
            Self::Or(children) => list(f, '|', children),
            Self::Not(child) => write!(f, "(!{child})"),
            Self::Present(key) => write!(f, "({key}=*)"),
            Self::Equal { key, value } => write!(f, "({key}={})", escape(value)),
            Self::Substring { key, parts } => {
                let parts: Vec<String> = parts.iter().map(|p| escape(p)).collect();
                write!(f, "({key}={})", parts.join("*"))
            }
            Self::GreaterOrEqual { key, value } => write!(f, "({key}>={})", escape(value)),
            Self::LessOrEqual { key, value } => write!(f, "({key}<={})", escape(value)),
            Self::Approx { key, value } => write!(f, "({key}~={})", escape(value)),
        }
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '(' | ')' | '*' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

impl FromStr for Filter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Filter {
    type Error = FilterError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Filter> for String {
    fn from(f: Filter) -> Self {
        f.to_string()
    }
}
