use std::fmt;

use miette::SourceSpan;
use pest::{iterators::Pair, Parser};
use pest_derive::Parser;

use crate::error::QueryError;

#[derive(Parser)]
#[grammar = "parser/lexer.pest"]
struct QueryLexer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Selector,
    Operator,
    Value,
    OpenGroup,
    CloseGroup,
    And,
    Or,
    ValueListSeparator,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Selector => "selector",
            TokenKind::Operator => "operator",
            TokenKind::Value => "value",
            TokenKind::OpenGroup => "'('",
            TokenKind::CloseGroup => "')'",
            TokenKind::And => "';'",
            TokenKind::Or => "','",
            TokenKind::ValueListSeparator => "','",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text; quoted values are unescaped and stripped of their quotes
    pub text: String,
    /// Byte offset of the first character
    pub position: usize,
    /// Length of the token in the source, quotes included
    pub len: usize,
}

impl Token {
    pub fn span(&self) -> SourceSpan {
        (self.position, self.len).into()
    }

    pub fn end(&self) -> usize {
        self.position + self.len
    }
}

/// Where the tokenizer is relative to the comparison it is reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Expression,
    Arguments,
    ValueList,
}

/// Split a query into tokens.
///
/// pest recognises the lexical shapes; the kind of an unquoted run, a
/// parenthesis or a comma depends on what precedes it, which is tracked here.
pub fn tokenize(input: &str) -> Result<Vec<Token>, QueryError> {
    let mut pairs = QueryLexer::parse(Rule::stream, input)
        .map_err(|e| QueryError::internal(format!("lexer grammar rejected input: {}", e)))?;

    let stream = pairs
        .next()
        .ok_or_else(|| QueryError::internal("Grammar guarantees stream exists"))?;

    let mut tokens = Vec::new();
    let mut context = Context::Expression;

    for pair in stream.into_inner() {
        let span = pair.as_span();
        let (position, len) = (span.start(), span.end() - span.start());

        let (kind, text) = match pair.as_rule() {
            Rule::EOI => continue,
            Rule::operator => {
                context = Context::Arguments;
                (TokenKind::Operator, pair.as_str().to_string())
            }
            Rule::open_paren => {
                if context == Context::Arguments {
                    context = Context::ValueList;
                }
                (TokenKind::OpenGroup, pair.as_str().to_string())
            }
            Rule::close_paren => {
                context = Context::Expression;
                (TokenKind::CloseGroup, pair.as_str().to_string())
            }
            Rule::semicolon => {
                context = Context::Expression;
                (TokenKind::And, pair.as_str().to_string())
            }
            Rule::comma => {
                if context == Context::ValueList {
                    (TokenKind::ValueListSeparator, pair.as_str().to_string())
                } else {
                    context = Context::Expression;
                    (TokenKind::Or, pair.as_str().to_string())
                }
            }
            Rule::word => {
                let kind = match context {
                    Context::Expression => TokenKind::Selector,
                    Context::Arguments => {
                        context = Context::Expression;
                        TokenKind::Value
                    }
                    Context::ValueList => TokenKind::Value,
                };
                (kind, pair.as_str().to_string())
            }
            Rule::double_quoted | Rule::single_quoted => {
                if context == Context::Arguments {
                    context = Context::Expression;
                }
                (TokenKind::Value, unescape(quoted_inner(pair)?))
            }
            Rule::unterminated => {
                let quote = pair.as_str().chars().next().unwrap_or('"');
                return Err(QueryError::Lex {
                    position,
                    unexpected: quote,
                    span: (position, 1).into(),
                    help: Some(format!("Add a closing {} quote", quote)),
                    src: input.to_string(),
                });
            }
            Rule::invalid => {
                let unexpected = pair.as_str().chars().next().unwrap_or_default();
                return Err(QueryError::Lex {
                    position,
                    unexpected,
                    span: (position, len.max(1)).into(),
                    help: invalid_char_help(unexpected),
                    src: input.to_string(),
                });
            }
            rule => {
                return Err(QueryError::internal(format!(
                    "Unexpected lexer rule: {:?}",
                    rule
                ))
                .with_source(input))
            }
        };

        tokens.push(Token {
            kind,
            text,
            position,
            len,
        });
    }

    Ok(tokens)
}

fn quoted_inner(pair: Pair<'_, Rule>) -> Result<&str, QueryError> {
    pair.into_inner()
        .next()
        .map(|inner| inner.as_str())
        .ok_or_else(|| QueryError::internal("Grammar guarantees quoted value has inner content"))
}

/// Drop each escaping backslash, keeping the character it protects
fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn invalid_char_help(c: char) -> Option<String> {
    match c {
        '=' => Some("Comparison operators are ==, !=, <, <=, >, >= or =name= (e.g. =ge=, =in=)".to_string()),
        '!' => Some("Did you mean != ?".to_string()),
        '~' => Some("'~' is reserved; quote the value to use it literally".to_string()),
        _ => None,
    }
}
