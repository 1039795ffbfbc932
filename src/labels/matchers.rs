use crate::error::{StoreError, StoreResult};
use crate::labels::Labels;
use enquote::enquote;
use regex::Regex;
use std::fmt;
use std::fmt::{Display, Formatter};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MatchOp {
    Equal,
    NotEqual,
    RegexEqual,
    RegexNotEqual,
}

impl MatchOp {
    pub fn is_regex(&self) -> bool {
        matches!(self, MatchOp::RegexEqual | MatchOp::RegexNotEqual)
    }
}

impl Display for MatchOp {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            MatchOp::Equal => write!(f, "="),
            MatchOp::NotEqual => write!(f, "!="),
            MatchOp::RegexEqual => write!(f, "=~"),
            MatchOp::RegexNotEqual => write!(f, "!~"),
        }
    }
}

/// A predicate over one label. Regex patterns are compiled anchored, so they
/// must match the whole value.
#[derive(Clone, Debug)]
pub struct Matcher {
    pub op: MatchOp,
    pub name: String,
    pub value: String,
    re: Option<Regex>,
}

impl Matcher {
    pub fn new<S: Into<String>>(op: MatchOp, name: S, value: S) -> StoreResult<Self> {
        let value = value.into();
        let re = if op.is_regex() {
            Some(compile_anchored(&value)?)
        } else {
            None
        };
        Ok(Self {
            op,
            name: name.into(),
            value,
            re,
        })
    }

    pub fn equal<S: Into<String>>(name: S, value: S) -> Self {
        Self {
            op: MatchOp::Equal,
            name: name.into(),
            value: value.into(),
            re: None,
        }
    }

    pub fn not_equal<S: Into<String>>(name: S, value: S) -> Self {
        Self {
            op: MatchOp::NotEqual,
            name: name.into(),
            value: value.into(),
            re: None,
        }
    }

    pub fn matches_value(&self, value: &str) -> bool {
        match self.op {
            MatchOp::Equal => self.value == value,
            MatchOp::NotEqual => self.value != value,
            MatchOp::RegexEqual => self.re.as_ref().is_some_and(|re| re.is_match(value)),
            MatchOp::RegexNotEqual => !self.re.as_ref().is_some_and(|re| re.is_match(value)),
        }
    }

    /// Applies the predicate to a label set; a label absent from the set is
    /// treated as having the empty value.
    pub fn matches(&self, labels: &Labels) -> bool {
        self.matches_value(labels.get(&self.name).unwrap_or(""))
    }
}

fn compile_anchored(pattern: &str) -> StoreResult<Regex> {
    Regex::new(&format!("^(?:{pattern})$"))
        .map_err(|e| StoreError::InvalidQuery(format!("invalid matcher regex {pattern:?}: {e}")))
}

impl Display for Matcher {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}{}{}", self.name, self.op, enquote('"', &self.value))
    }
}

/// Conjunction of label predicates selecting a set of series.
#[derive(Clone, Debug, Default)]
pub struct Matchers(pub Vec<Matcher>);

impl Matchers {
    pub fn new(matchers: Vec<Matcher>) -> Self {
        Self(matchers)
    }

    pub fn matches(&self, labels: &Labels) -> bool {
        self.0.iter().all(|matcher| matcher.matches(labels))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for Matchers {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{{")?;
        let mut first = true;
        for matcher in &self.0 {
            if !first {
                write!(f, ",")?;
            }
            first = false;
            write!(f, "{matcher}")?;
        }
        write!(f, "}}")
    }
}
