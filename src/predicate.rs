//! Backend-agnostic predicate tree produced by compilation.
//!
//! Leaves hold values already coerced to the attribute's type, so a store only
//! needs to fetch the attribute and call [`Leaf::matches`]. The whole tree is
//! immutable and `Send + Sync`; one compiled predicate can be evaluated from
//! any number of threads.

use std::cmp::Ordering;
use std::fmt;

use itertools::Itertools;
use regex::{Regex, RegexBuilder};

use crate::parser::ast::write_logical;
use crate::parser::{quote_if_needed, Arity, Connective, OperatorKind};
use crate::schema::ValueType;
use crate::value::CoercedValue;

/// Dotted selector split into segments. All but the last name relations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributePath {
    segments: Vec<String>,
}

impl AttributePath {
    pub fn new(segments: Vec<String>) -> Self {
        AttributePath { segments }
    }

    pub fn parse(dotted: &str) -> Self {
        AttributePath {
            segments: dotted.split('.').map(str::to_string).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Relation hops leading to the attribute
    pub fn relations(&self) -> &[String] {
        match self.segments.split_last() {
            Some((_, init)) => init,
            None => &[],
        }
    }

    /// The scalar attribute at the end of the path
    pub fn attribute(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    pub fn is_nested(&self) -> bool {
        self.segments.len() > 1
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Upper bound on the compiled size of one LIKE pattern
pub const PATTERN_SIZE_LIMIT: usize = 1 << 20;

/// A LIKE value compiled to a regex.
///
/// With a `*` the pattern must match the whole value, each `*` standing for
/// any run of characters. Without one it matches anywhere in the value.
#[derive(Debug, Clone)]
pub struct LikePattern {
    source: String,
    case_insensitive: bool,
    regex: Regex,
}

impl LikePattern {
    pub fn new(source: &str, case_insensitive: bool) -> Result<Self, regex::Error> {
        let body = source.split('*').map(regex::escape).join(".*");
        let flags = if case_insensitive { "(?si)" } else { "(?s)" };
        let pattern = if source.contains('*') {
            format!("{}^{}$", flags, body)
        } else {
            format!("{}{}", flags, body)
        };

        Ok(LikePattern {
            source: source.to_string(),
            case_insensitive,
            regex: RegexBuilder::new(&pattern)
                .size_limit(PATTERN_SIZE_LIMIT)
                .build()?,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for LikePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.case_insensitive == other.case_insensitive
    }
}

/// One compiled comparison
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    pub path: AttributePath,
    pub operator: OperatorKind,
    /// Empty for null checks, one value for LIKE (also held in `pattern`)
    pub values: Vec<CoercedValue>,
    pub value_type: ValueType,
    /// String values were lowercased; record strings get the same treatment
    pub fold_case: bool,
    pub pattern: Option<LikePattern>,
}

impl Leaf {
    /// Test one runtime value of the attribute.
    ///
    /// `Null` only satisfies IS_NULL. Values that cannot be compared with the
    /// query values never match, under negated operators too.
    pub fn matches(&self, actual: &CoercedValue) -> bool {
        use OperatorKind::*;

        match self.operator {
            IsNull => return actual.is_null(),
            NotNull => return !actual.is_null(),
            _ if actual.is_null() => return false,
            _ => {}
        }

        let cmp = |expected: &CoercedValue| self.compare(actual, expected);
        let first = || self.values.first().and_then(|v| cmp(v));

        match self.operator {
            Eq => first() == Some(Ordering::Equal),
            Neq => matches!(first(), Some(Ordering::Less | Ordering::Greater)),
            Gt => first() == Some(Ordering::Greater),
            Ge => matches!(first(), Some(Ordering::Greater | Ordering::Equal)),
            Lt => first() == Some(Ordering::Less),
            Le => matches!(first(), Some(Ordering::Less | Ordering::Equal)),
            In => self.values.iter().any(|v| cmp(v) == Some(Ordering::Equal)),
            NotIn => self
                .values
                .iter()
                .all(|v| matches!(cmp(v), Some(Ordering::Less | Ordering::Greater))),
            Like => self.pattern_matches(actual),
            NotLike => !self.pattern_matches(actual),
            Between | NotBetween => match self.values.as_slice() {
                [low, high] => match (cmp(low), cmp(high)) {
                    (Some(lo), Some(hi)) => {
                        let inside = lo != Ordering::Less && hi != Ordering::Greater;
                        inside == (self.operator == Between)
                    }
                    _ => false,
                },
                _ => false,
            },
            IsNull | NotNull => false,
        }
    }

    fn compare(&self, actual: &CoercedValue, expected: &CoercedValue) -> Option<Ordering> {
        match actual {
            CoercedValue::String(s) if self.fold_case => {
                CoercedValue::String(s.to_lowercase()).compare_to(expected)
            }
            _ => actual.compare_to(expected),
        }
    }

    fn pattern_matches(&self, actual: &CoercedValue) -> bool {
        let Some(pattern) = &self.pattern else {
            return false;
        };
        match actual {
            CoercedValue::String(s) => pattern.is_match(s),
            other => pattern.is_match(&other.to_string()),
        }
    }
}

impl fmt::Display for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.path, self.operator)?;

        if self.operator.is_null_check() {
            return write!(f, "true");
        }
        if let Some(pattern) = &self.pattern {
            return write!(f, "{}", quote_if_needed(pattern.source()));
        }
        match (self.operator.arity(), self.values.as_slice()) {
            (Arity::Single, [value]) => write!(f, "{}", value),
            (_, values) => write!(f, "({})", values.iter().join(",")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Leaf(Leaf),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            Predicate::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    /// Leaves in source order
    pub fn leaves(&self) -> Vec<&Leaf> {
        match self {
            Predicate::Leaf(leaf) => vec![leaf],
            Predicate::And(children) | Predicate::Or(children) => {
                children.iter().flat_map(Predicate::leaves).collect()
            }
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (connective, children) = match self {
            Predicate::Leaf(leaf) => return write!(f, "{}", leaf),
            Predicate::And(children) => (Connective::And, children),
            Predicate::Or(children) => (Connective::Or, children),
        };
        write_logical(
            f,
            connective,
            children
                .iter()
                .map(|c| (c, !matches!(c, Predicate::Leaf(_)))),
        )
    }
}
