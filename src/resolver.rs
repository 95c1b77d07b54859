use thiserror::Error;

use crate::schema::{AttributeKind, SchemaProvider, ValueType};

/// One relation hop taken while resolving a dotted path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalStep {
    pub attribute: String,
    pub target_type: String,
    pub collection: bool,
}

/// What a dotted path resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub value_type: ValueType,
    pub case_insensitive: bool,
    pub steps: Vec<TraversalStep>,
}

/// Why a segment could not be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentFailure {
    /// The type declares no attribute with this name
    Missing,
    /// A scalar was followed by further segments
    NotARelation,
    /// The path ends on a relation instead of a scalar
    NotAScalar,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("type '{type_name}' is not declared")]
    UnknownType { type_name: String },

    #[error("cannot resolve '{segment}' (segment {index}) of '{path}' on type '{type_name}'")]
    UnknownAttribute {
        path: String,
        segment: String,
        /// Zero-based index of the failing segment
        index: usize,
        type_name: String,
        failure: SegmentFailure,
        /// Attributes that do exist on `type_name`
        available: Vec<String>,
    },
}

/// Walk `path` from `root_type`, following one relation per segment until
/// the last segment, which must name a scalar.
///
/// Resolution only looks up the segments it is given, so schemas with
/// cyclic relations resolve in time proportional to the path length.
pub fn resolve<S: SchemaProvider + ?Sized>(
    schema: &S,
    root_type: &str,
    path: &str,
) -> Result<Resolution, ResolveError> {
    let segments: Vec<&str> = path.split('.').collect();
    let last = segments.len() - 1;

    let mut current_type = root_type.to_string();
    let mut steps = Vec::new();

    for (index, segment) in segments.iter().enumerate() {
        let entity =
            schema
                .attributes_of(&current_type)
                .ok_or_else(|| ResolveError::UnknownType {
                    type_name: current_type.clone(),
                })?;

        let fail = |failure| ResolveError::UnknownAttribute {
            path: path.to_string(),
            segment: segment.to_string(),
            index,
            type_name: current_type.clone(),
            failure,
            available: entity.names().map(str::to_string).collect(),
        };

        let attribute = entity.get(segment).ok_or_else(|| fail(SegmentFailure::Missing))?;

        match (&attribute.kind, index == last) {
            (AttributeKind::Scalar(value_type), true) => {
                return Ok(Resolution {
                    value_type: *value_type,
                    case_insensitive: attribute.case_insensitive,
                    steps,
                });
            }
            (AttributeKind::Scalar(_), false) => return Err(fail(SegmentFailure::NotARelation)),
            (AttributeKind::Relation { .. }, true) => return Err(fail(SegmentFailure::NotAScalar)),
            (AttributeKind::Relation { target, collection }, false) => {
                steps.push(TraversalStep {
                    attribute: segment.to_string(),
                    target_type: target.clone(),
                    collection: *collection,
                });
                current_type = target.clone();
            }
        }
    }

    // split always yields at least one segment and the last one returns above
    Err(ResolveError::UnknownType {
        type_name: current_type,
    })
}
