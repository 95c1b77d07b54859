//! Recursive-descent parser over the token stream.
//!
//! ```text
//! or_expr    := and_expr (',' and_expr)*
//! and_expr   := group (';' group)*
//! group      := '(' or_expr ')' | comparison
//! comparison := SELECTOR OPERATOR arguments
//! arguments  := VALUE | '(' VALUE (',' VALUE)* ')'
//! ```
//!
//! AND binds tighter than OR because `and_expr` sits below `or_expr`.
//! Groups nest at most [`MAX_GROUP_DEPTH`] deep.

use miette::SourceSpan;

use super::ast::{Arity, AstNode, Comparison, Connective, OperatorKind};
use super::lexer::{Token, TokenKind};
use crate::error::QueryError;

/// Deepest `(` nesting accepted; recursion depth is bounded by it
pub const MAX_GROUP_DEPTH: usize = 128;

pub struct Parser<'t> {
    tokens: &'t [Token],
    cursor: usize,
    depth: usize,
}

impl<'t> Parser<'t> {
    /// Parse a complete token stream into a single tree
    ///
    /// # Errors
    /// Returns `QueryError::Syntax` for any grammar violation. The error does not
    /// carry the query text; callers holding it should use `with_source`.
    pub fn parse(tokens: &'t [Token]) -> Result<AstNode, QueryError> {
        let mut parser = Parser {
            tokens,
            cursor: 0,
            depth: 0,
        };
        let node = parser.or_expr()?;

        match parser.peek() {
            None => Ok(node),
            Some(token) => Err(parser.unexpected(token, "';', ',' or end of input")),
        }
    }

    fn or_expr(&mut self) -> Result<AstNode, QueryError> {
        let mut children = vec![self.and_expr()?];
        while self.eat(TokenKind::Or).is_some() {
            children.push(self.and_expr()?);
        }
        Ok(AstNode::logical(Connective::Or, children))
    }

    fn and_expr(&mut self) -> Result<AstNode, QueryError> {
        let mut children = vec![self.group()?];
        while self.eat(TokenKind::And).is_some() {
            children.push(self.group()?);
        }
        Ok(AstNode::logical(Connective::And, children))
    }

    fn group(&mut self) -> Result<AstNode, QueryError> {
        if let Some(open) = self.eat(TokenKind::OpenGroup) {
            if self.depth >= MAX_GROUP_DEPTH {
                return Err(syntax_error(
                    open.span(),
                    &format!("at most {} nested groups", MAX_GROUP_DEPTH),
                    "'('".to_string(),
                ));
            }
            self.depth += 1;
            let inner = self.or_expr()?;
            self.expect(TokenKind::CloseGroup, "')'")?;
            self.depth -= 1;
            Ok(inner)
        } else {
            self.comparison().map(AstNode::Comparison)
        }
    }

    fn comparison(&mut self) -> Result<Comparison, QueryError> {
        let selector = self.expect(TokenKind::Selector, "selector or '('")?;
        if selector.text.split('.').any(str::is_empty) {
            return Err(syntax_error(
                selector.span(),
                "attribute path (name or dotted.name)",
                format!("'{}'", selector.text),
            ));
        }

        let operator_token = self.expect(TokenKind::Operator, "comparison operator")?;
        let operator = OperatorKind::from_symbol(&operator_token.text).ok_or_else(|| {
            syntax_error(
                operator_token.span(),
                "known comparison operator",
                format!("'{}'", operator_token.text),
            )
        })?;

        let (arguments, argument_spans) = self.arguments(operator)?;

        Ok(Comparison {
            selector: selector.text.clone(),
            operator,
            arguments,
            selector_span: selector.span(),
            operator_span: operator_token.span(),
            argument_spans,
        })
    }

    fn arguments(
        &mut self,
        operator: OperatorKind,
    ) -> Result<(Vec<String>, Vec<SourceSpan>), QueryError> {
        if let Some(open) = self.eat(TokenKind::OpenGroup) {
            let mut values = Vec::new();
            loop {
                values.push(self.expect(TokenKind::Value, "value")?);
                if self.eat(TokenKind::ValueListSeparator).is_none() {
                    self.expect(TokenKind::CloseGroup, "',' or ')'")?;
                    break;
                }
            }

            let list_span: SourceSpan = (open.position, self.previous_end() - open.position).into();
            match operator.arity() {
                Arity::Single => {
                    return Err(syntax_error(
                        list_span,
                        &format!("single value for '{}'", operator),
                        "value list".to_string(),
                    ))
                }
                Arity::Pair if values.len() != 2 => {
                    return Err(syntax_error(
                        list_span,
                        &format!("exactly two values for '{}'", operator),
                        format!("{} values", values.len()),
                    ))
                }
                _ => {}
            }

            Ok(values
                .into_iter()
                .map(|t| (t.text.clone(), t.span()))
                .unzip())
        } else {
            let expected = match operator.arity() {
                Arity::Pair => "value list '(low,high)'",
                _ => "value",
            };
            let value = self.expect(TokenKind::Value, expected)?;
            if operator.arity() == Arity::Pair {
                return Err(syntax_error(
                    value.span(),
                    expected,
                    format!("value '{}'", value.text),
                ));
            }
            Ok((vec![value.text.clone()], vec![value.span()]))
        }
    }

    // ------------------------------------------------------------------------
    // Token stream helpers
    // ------------------------------------------------------------------------

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.cursor)
    }

    fn eat(&mut self, kind: TokenKind) -> Option<&'t Token> {
        match self.peek() {
            Some(token) if token.kind == kind => {
                self.cursor += 1;
                Some(token)
            }
            _ => None,
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<&'t Token, QueryError> {
        match self.peek() {
            Some(token) if token.kind == kind => {
                self.cursor += 1;
                Ok(token)
            }
            Some(token) => Err(self.unexpected(token, expected)),
            None => Err(syntax_error(
                (self.input_end(), 0).into(),
                expected,
                "end of input".to_string(),
            )),
        }
    }

    fn unexpected(&self, token: &Token, expected: &str) -> QueryError {
        let found = match token.kind {
            TokenKind::Selector | TokenKind::Operator | TokenKind::Value => {
                format!("{} '{}'", token.kind, token.text)
            }
            _ => token.kind.to_string(),
        };
        syntax_error(token.span(), expected, found)
    }

    fn previous_end(&self) -> usize {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(Token::end)
            .unwrap_or(0)
    }

    fn input_end(&self) -> usize {
        self.tokens.last().map(Token::end).unwrap_or(0)
    }
}

fn syntax_error(span: SourceSpan, expected: &str, found: String) -> QueryError {
    QueryError::Syntax {
        position: span.offset(),
        expected: expected.to_string(),
        found,
        span,
        src: String::new(),
    }
}
