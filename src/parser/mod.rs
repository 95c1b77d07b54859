pub mod ast;
pub mod grammar;
pub mod lexer;

// Re-exports for clean API
pub use ast::{quote_if_needed, Arity, AstNode, Comparison, Connective, OperatorKind};
pub use grammar::{Parser, MAX_GROUP_DEPTH};
pub use lexer::{tokenize, Token, TokenKind};

use crate::error::QueryError;

/// Tokenize and parse a query into its syntax tree
///
/// # Errors
/// Returns `QueryError::Lex` or `QueryError::Syntax`, with the query attached as source.
pub fn parse(input: &str) -> Result<AstNode, QueryError> {
    let tokens = tokenize(input)?;
    Parser::parse(&tokens).map_err(|e| e.with_source(input))
}
