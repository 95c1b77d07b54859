use std::fmt;

use itertools::Itertools;
use miette::SourceSpan;

// ============================================================================
// Operators
// ============================================================================

/// Comparison operators understood by the query language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Eq,         // ==
    Neq,        // !=
    Gt,         // =gt=, >
    Ge,         // =ge=, >=
    Lt,         // =lt=, <
    Le,         // =le=, <=
    In,         // =in=
    NotIn,      // =out=
    Like,       // =like=
    NotLike,    // =notlike=
    IsNull,     // =isnull=, =null=
    NotNull,    // =notnull=, =nonnull=
    Between,    // =bt=
    NotBetween, // =nb=
}

/// How many arguments an operator takes and in which syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly one bare or quoted value
    Single,
    /// A parenthesised list with at least one value, or a single bare value
    List,
    /// A parenthesised list of exactly two values
    Pair,
}

impl OperatorKind {
    pub const ALL: [OperatorKind; 14] = [
        OperatorKind::Eq,
        OperatorKind::Neq,
        OperatorKind::Gt,
        OperatorKind::Ge,
        OperatorKind::Lt,
        OperatorKind::Le,
        OperatorKind::In,
        OperatorKind::NotIn,
        OperatorKind::Like,
        OperatorKind::NotLike,
        OperatorKind::IsNull,
        OperatorKind::NotNull,
        OperatorKind::Between,
        OperatorKind::NotBetween,
    ];

    /// Recognize an operator by any of its spellings
    pub fn from_symbol(s: &str) -> Option<Self> {
        let op = match s {
            "==" => OperatorKind::Eq,
            "!=" => OperatorKind::Neq,
            "=gt=" | ">" => OperatorKind::Gt,
            "=ge=" | ">=" => OperatorKind::Ge,
            "=lt=" | "<" => OperatorKind::Lt,
            "=le=" | "<=" => OperatorKind::Le,
            "=in=" => OperatorKind::In,
            "=out=" => OperatorKind::NotIn,
            "=like=" => OperatorKind::Like,
            "=notlike=" => OperatorKind::NotLike,
            "=isnull=" | "=null=" => OperatorKind::IsNull,
            "=notnull=" | "=nonnull=" => OperatorKind::NotNull,
            "=bt=" => OperatorKind::Between,
            "=nb=" => OperatorKind::NotBetween,
            _ => return None,
        };
        Some(op)
    }

    /// Canonical spelling, used when rendering queries
    pub fn symbol(&self) -> &'static str {
        match self {
            OperatorKind::Eq => "==",
            OperatorKind::Neq => "!=",
            OperatorKind::Gt => "=gt=",
            OperatorKind::Ge => "=ge=",
            OperatorKind::Lt => "=lt=",
            OperatorKind::Le => "=le=",
            OperatorKind::In => "=in=",
            OperatorKind::NotIn => "=out=",
            OperatorKind::Like => "=like=",
            OperatorKind::NotLike => "=notlike=",
            OperatorKind::IsNull => "=isnull=",
            OperatorKind::NotNull => "=notnull=",
            OperatorKind::Between => "=bt=",
            OperatorKind::NotBetween => "=nb=",
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            OperatorKind::In | OperatorKind::NotIn => Arity::List,
            OperatorKind::Between | OperatorKind::NotBetween => Arity::Pair,
            _ => Arity::Single,
        }
    }

    /// Operators that need a total order on the attribute's values
    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            OperatorKind::Gt
                | OperatorKind::Ge
                | OperatorKind::Lt
                | OperatorKind::Le
                | OperatorKind::Between
                | OperatorKind::NotBetween
        )
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, OperatorKind::Like | OperatorKind::NotLike)
    }

    /// The argument of a null check is a placeholder and is never coerced
    pub fn is_null_check(&self) -> bool {
        matches!(self, OperatorKind::IsNull | OperatorKind::NotNull)
    }

    /// Operators whose string comparison honours case-insensitive attributes
    pub fn folds_case(&self) -> bool {
        matches!(
            self,
            OperatorKind::Eq
                | OperatorKind::Neq
                | OperatorKind::In
                | OperatorKind::NotIn
                | OperatorKind::Like
                | OperatorKind::NotLike
        )
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

// ============================================================================
// Tree
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    pub fn symbol(&self) -> char {
        match self {
            Connective::And => ';',
            Connective::Or => ',',
        }
    }
}

/// A single `selector operator arguments` test as written in the query
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub selector: String,
    pub operator: OperatorKind,
    pub arguments: Vec<String>,
    // Subcomponent spans for precise error reporting
    pub selector_span: SourceSpan,
    pub operator_span: SourceSpan,
    pub argument_spans: Vec<SourceSpan>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AstNode {
    Comparison(Comparison),
    Logical {
        connective: Connective,
        children: Vec<AstNode>,
    },
}

impl AstNode {
    /// Wrap children in a logical node, collapsing a lone child to itself
    pub fn logical(connective: Connective, mut children: Vec<AstNode>) -> Self {
        if children.len() == 1 {
            if let Some(only) = children.pop() {
                return only;
            }
        }
        AstNode::Logical {
            connective,
            children,
        }
    }

    pub fn as_comparison(&self) -> Option<&Comparison> {
        match self {
            AstNode::Comparison(c) => Some(c),
            AstNode::Logical { .. } => None,
        }
    }

    /// Number of comparisons in the tree
    pub fn comparison_count(&self) -> usize {
        match self {
            AstNode::Comparison(_) => 1,
            AstNode::Logical { children, .. } => children.iter().map(Self::comparison_count).sum(),
        }
    }
}

// ============================================================================
// Rendering
// ============================================================================

const RESERVED: &[char] = &['"', '\'', '(', ')', ';', ',', '=', '!', '~', '<', '>'];

/// Render a value so that the lexer reads it back verbatim
pub fn quote_if_needed(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_ascii_whitespace() || RESERVED.contains(&c) || c == '\\');
    if needs_quotes {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{}\"", escaped)
    } else {
        value.to_string()
    }
}

/// Write children joined by the connective, parenthesising nested logical nodes
pub(crate) fn write_logical<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    connective: Connective,
    children: impl Iterator<Item = (T, bool)>,
) -> fmt::Result {
    let rendered = children
        .map(|(child, nested)| {
            if nested {
                format!("({})", child)
            } else {
                child.to_string()
            }
        })
        .join(&connective.symbol().to_string());
    write!(f, "{}", rendered)
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.selector, self.operator)?;
        match self.arguments.as_slice() {
            [single] if self.operator.arity() != Arity::Pair => {
                write!(f, "{}", quote_if_needed(single))
            }
            args => write!(
                f,
                "({})",
                args.iter().map(|a| quote_if_needed(a)).join(",")
            ),
        }
    }
}

impl fmt::Display for AstNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AstNode::Comparison(c) => write!(f, "{}", c),
            AstNode::Logical {
                connective,
                children,
            } => write_logical(
                f,
                *connective,
                children
                    .iter()
                    .map(|c| (c, matches!(c, AstNode::Logical { .. }))),
            ),
        }
    }
}
