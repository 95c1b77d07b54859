//! AST to predicate translation.
//!
//! Each comparison is resolved against the schema, checked for operator
//! legality and has its arguments coerced to the attribute's type. The walk is
//! depth-first and left to right, and stops at the first failure, so a caller
//! gets either a whole predicate or the first error in source order.

use itertools::Itertools;
use miette::SourceSpan;

use crate::config::CompileConfig;
use crate::error::QueryError;
use crate::parser::{AstNode, Comparison, Connective, OperatorKind};
use crate::predicate::{AttributePath, Leaf, LikePattern, Predicate};
use crate::resolver::{resolve, ResolveError, SegmentFailure};
use crate::schema::{SchemaProvider, ValueType};
use crate::value::{coerce, CoercedValue};

/// Compile a parsed query against `root_type`.
///
/// # Errors
/// `UnknownType`, `UnknownAttribute`, `UnsupportedOperator` or `ValueCoercion`
/// for the first comparison that fails. Errors carry spans but no source text;
/// attach it with [`QueryError::with_source`].
pub fn compile<S: SchemaProvider + ?Sized>(
    ast: &AstNode,
    root_type: &str,
    schema: &S,
    config: &CompileConfig,
) -> Result<Predicate, QueryError> {
    Compiler {
        schema,
        root_type,
        config,
    }
    .node(ast)
}

/// Whether `operator` may be applied to attributes of `value_type`
pub fn operator_supports(operator: OperatorKind, value_type: ValueType) -> bool {
    if operator.is_ordering() {
        value_type.is_orderable()
    } else if operator.is_pattern() {
        value_type == ValueType::String
    } else {
        true
    }
}

struct Compiler<'a, S: ?Sized> {
    schema: &'a S,
    root_type: &'a str,
    config: &'a CompileConfig,
}

impl<'a, S: SchemaProvider + ?Sized> Compiler<'a, S> {
    fn node(&self, node: &AstNode) -> Result<Predicate, QueryError> {
        match node {
            AstNode::Comparison(c) => self.comparison(c).map(Predicate::Leaf),
            AstNode::Logical {
                connective,
                children,
            } => {
                let children = children
                    .iter()
                    .map(|child| self.node(child))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(match connective {
                    Connective::And => Predicate::And(children),
                    Connective::Or => Predicate::Or(children),
                })
            }
        }
    }

    fn comparison(&self, c: &Comparison) -> Result<Leaf, QueryError> {
        let resolution = resolve(self.schema, self.root_type, &c.selector)
            .map_err(|e| self.resolve_error(e, c))?;
        let value_type = resolution.value_type;

        let operator = match c.operator {
            OperatorKind::Eq if self.is_wildcard_equality(c, value_type) => OperatorKind::Like,
            OperatorKind::Neq if self.is_wildcard_equality(c, value_type) => OperatorKind::NotLike,
            op => op,
        };

        if !operator_supports(operator, value_type) {
            let legal = OperatorKind::ALL
                .iter()
                .filter(|op| operator_supports(**op, value_type))
                .map(OperatorKind::symbol)
                .join(" ");
            return Err(QueryError::UnsupportedOperator {
                operator,
                value_type,
                path: c.selector.clone(),
                operator_span: c.operator_span,
                selector_span: c.selector_span,
                help: Some(format!("Operators for {} attributes: {}", value_type, legal)),
                src: String::new(),
            });
        }

        let fold_case = value_type == ValueType::String
            && operator.folds_case()
            && (resolution.case_insensitive || self.config.case_insensitive_strings);

        let mut leaf = Leaf {
            path: AttributePath::parse(&c.selector),
            operator,
            values: Vec::new(),
            value_type,
            fold_case,
            pattern: None,
        };

        // The argument of a null check is a placeholder
        if operator.is_null_check() {
            return Ok(leaf);
        }

        if operator.is_pattern() {
            let raw = c
                .arguments
                .first()
                .ok_or_else(|| QueryError::internal("pattern comparison without a value"))?;
            let pattern =
                LikePattern::new(raw, fold_case).map_err(|e| QueryError::ValueCoercion {
                    raw: raw.clone(),
                    target: ValueType::String,
                    reason: format!("unusable LIKE pattern: {}", e),
                    span: c.argument_spans.first().copied().unwrap_or(c.operator_span),
                    src: String::new(),
                })?;
            leaf.values.push(CoercedValue::String(raw.clone()));
            leaf.pattern = Some(pattern);
            return Ok(leaf);
        }

        for (raw, span) in c.arguments.iter().zip(&c.argument_spans) {
            let value = match coerce(raw, value_type) {
                Ok(CoercedValue::String(s)) if fold_case => CoercedValue::String(s.to_lowercase()),
                Ok(value) => value,
                Err(e) => {
                    return Err(QueryError::ValueCoercion {
                        raw: raw.clone(),
                        target: value_type,
                        reason: e.to_string(),
                        span: *span,
                        src: String::new(),
                    })
                }
            };
            leaf.values.push(value);
        }

        Ok(leaf)
    }

    fn is_wildcard_equality(&self, c: &Comparison, value_type: ValueType) -> bool {
        self.config.wildcard_equality
            && value_type == ValueType::String
            && c.arguments.iter().any(|a| a.contains('*'))
    }

    fn resolve_error(&self, e: ResolveError, c: &Comparison) -> QueryError {
        match e {
            ResolveError::UnknownType { type_name } => QueryError::UnknownType { type_name },
            ResolveError::UnknownAttribute {
                path,
                segment,
                index,
                type_name,
                failure,
                available,
            } => {
                let reason = match failure {
                    SegmentFailure::Missing => format!("not an attribute of {}", type_name),
                    SegmentFailure::NotARelation => {
                        format!("scalar attribute of {} has no attributes", type_name)
                    }
                    SegmentFailure::NotAScalar => {
                        format!("relation on {}, select one of its attributes", type_name)
                    }
                };
                let help = if available.is_empty() {
                    None
                } else {
                    Some(format!("Attributes of {}: {}", type_name, available.join(", ")))
                };

                QueryError::UnknownAttribute {
                    path,
                    span: segment_span(c.selector_span, &c.selector, index),
                    segment,
                    reason,
                    help,
                    src: String::new(),
                }
            }
        }
    }
}

/// Span of the `index`th dotted segment within a selector
fn segment_span(selector_span: SourceSpan, selector: &str, index: usize) -> SourceSpan {
    let mut offset = selector_span.offset();
    for (i, segment) in selector.split('.').enumerate() {
        if i == index {
            return (offset, segment.len()).into();
        }
        offset += segment.len() + 1;
    }
    selector_span
}
