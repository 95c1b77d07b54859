//! Parse RSQL/FIQL filter queries and compile them into schema-checked predicates.
//!
//! ```text
//! text -> tokenize -> Parser::parse -> AstNode -> compile (resolve + coerce) -> Predicate
//! ```
//!
//! The resulting [`Predicate`] is independent of any store. [`eval`] and
//! [`InMemoryStore`] show how a store executes it.

pub mod compiler;
pub mod config;
pub mod error;
pub mod eval;
pub mod parser;
pub mod predicate;
pub mod resolver;
pub mod schema;
pub mod value;

use slog::{debug, Logger};

pub use compiler::compile;
pub use config::CompileConfig;
pub use error::QueryError;
pub use eval::{eval, InMemoryStore, Record, Store};
pub use parser::{parse, tokenize, AstNode, OperatorKind, Parser, Token, TokenKind};
pub use predicate::{AttributePath, Leaf, Predicate};
pub use resolver::{resolve, Resolution};
pub use schema::{Attribute, EntityType, Schema, SchemaProvider, ValueType};
pub use value::CoercedValue;

/// Parse `query` and compile it against `root_type`.
///
/// # Errors
/// The first lexical, syntax or compilation error, with `query` attached for
/// rendering as a diagnostic.
pub fn parse_and_compile<S: SchemaProvider + ?Sized>(
    logger: &Logger,
    query: &str,
    root_type: &str,
    schema: &S,
    config: &CompileConfig,
) -> Result<Predicate, QueryError> {
    let ast = parse(query)?;
    debug!(logger, "parsed query"; "query" => query, "ast" => %ast, "comparisons" => ast.comparison_count());

    let predicate = compile(&ast, root_type, schema, config).map_err(|e| e.with_source(query))?;
    debug!(logger, "compiled predicate"; "root" => root_type, "predicate" => %predicate);

    Ok(predicate)
}
