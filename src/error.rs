use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::parser::OperatorKind;
use crate::schema::ValueType;

/// Every way a query can fail to become a predicate
#[allow(dead_code)] // Fields are used by miette's derive macros
#[derive(Debug, Clone, Diagnostic, Error)]
pub enum QueryError {
    #[error("Unexpected character '{unexpected}' at position {position}")]
    #[diagnostic(code(rsql::lex))]
    Lex {
        position: usize,
        unexpected: char,
        #[label("not valid here")]
        span: SourceSpan,
        #[help]
        help: Option<String>,
        #[source_code]
        src: String,
    },

    #[error("Syntax error at position {position}: expected {expected}, found {found}")]
    #[diagnostic(code(rsql::syntax))]
    Syntax {
        position: usize,
        expected: String,
        found: String,
        #[label("expected {expected}")]
        span: SourceSpan,
        #[source_code]
        src: String,
    },

    #[error("Unknown entity type: {type_name}")]
    #[diagnostic(
        code(rsql::unknown_type),
        help("The root type must be declared in the schema")
    )]
    UnknownType { type_name: String },

    #[error("Unknown attribute '{segment}' in selector '{path}'")]
    #[diagnostic(code(rsql::unknown_attribute))]
    UnknownAttribute {
        path: String,
        segment: String,
        reason: String,
        #[label("{reason}")]
        span: SourceSpan,
        #[help]
        help: Option<String>,
        #[source_code]
        src: String,
    },

    #[error("Operator '{operator}' is not supported for {value_type} attribute '{path}'")]
    #[diagnostic(code(rsql::unsupported_operator))]
    UnsupportedOperator {
        operator: OperatorKind,
        value_type: ValueType,
        path: String,
        #[label("unsupported operator")]
        operator_span: SourceSpan,
        #[label("{value_type} attribute")]
        selector_span: SourceSpan,
        #[help]
        help: Option<String>,
        #[source_code]
        src: String,
    },

    #[error("Cannot convert '{raw}' to {target}: {reason}")]
    #[diagnostic(code(rsql::value_coercion))]
    ValueCoercion {
        raw: String,
        target: ValueType,
        reason: String,
        #[label("expected {target}")]
        span: SourceSpan,
        #[source_code]
        src: String,
    },

    #[error("Internal error: {message}")]
    #[diagnostic(code(rsql::internal))]
    Internal {
        message: String,
        #[source_code]
        src: String,
    },
}

impl QueryError {
    pub fn internal(msg: impl Into<String>) -> Self {
        QueryError::Internal {
            message: msg.into(),
            src: String::new(),
        }
    }

    /// Attach the query text so diagnostics can render the offending span
    pub fn with_source(mut self, source: &str) -> Self {
        match &mut self {
            QueryError::Lex { src, .. }
            | QueryError::Syntax { src, .. }
            | QueryError::UnknownAttribute { src, .. }
            | QueryError::UnsupportedOperator { src, .. }
            | QueryError::ValueCoercion { src, .. }
            | QueryError::Internal { src, .. } => {
                *src = source.to_string();
            }
            QueryError::UnknownType { .. } => {}
        }
        self
    }

    /// Byte offset into the query where the failure was detected
    pub fn position(&self) -> Option<usize> {
        match self {
            QueryError::Lex { position, .. } | QueryError::Syntax { position, .. } => {
                Some(*position)
            }
            QueryError::UnknownAttribute { span, .. } | QueryError::ValueCoercion { span, .. } => {
                Some(span.offset())
            }
            QueryError::UnsupportedOperator { operator_span, .. } => Some(operator_span.offset()),
            QueryError::UnknownType { .. } | QueryError::Internal { .. } => None,
        }
    }
}
