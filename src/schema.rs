//! Attribute metadata the compiler resolves selectors against.
//!
//! A schema maps entity type names to their attributes. Scalars carry a value
//! type; relations point at another entity type, either as a single reference
//! or as a collection of children. Relations may form cycles (a node that
//! points at its parent); resolution only ever follows the query's own path.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Integer,
    Decimal,
    Date,
    Boolean,
}

impl ValueType {
    /// Whether the type has a natural total order usable by `<`, `>`, `=bt=` and friends
    pub fn is_orderable(&self) -> bool {
        !matches!(self, ValueType::Boolean)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Integer => "integer",
            ValueType::Decimal => "decimal",
            ValueType::Date => "date",
            ValueType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeKind {
    Scalar(ValueType),
    Relation { target: String, collection: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawAttribute")]
pub struct Attribute {
    pub kind: AttributeKind,
    /// String comparisons on this attribute ignore case
    pub case_insensitive: bool,
}

impl Attribute {
    pub fn scalar(value_type: ValueType) -> Self {
        Attribute {
            kind: AttributeKind::Scalar(value_type),
            case_insensitive: false,
        }
    }

    pub fn relation(target: impl Into<String>, collection: bool) -> Self {
        Attribute {
            kind: AttributeKind::Relation {
                target: target.into(),
                collection,
            },
            case_insensitive: false,
        }
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    pub fn value_type(&self) -> Option<ValueType> {
        match self.kind {
            AttributeKind::Scalar(t) => Some(t),
            AttributeKind::Relation { .. } => None,
        }
    }
}

/// On-disk shape: `{"type": "string"}` or `{"relation": "Child", "collection": true}`
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAttribute {
    #[serde(rename = "type")]
    value_type: Option<ValueType>,
    relation: Option<String>,
    #[serde(default)]
    collection: bool,
    #[serde(default)]
    case_insensitive: bool,
}

impl TryFrom<RawAttribute> for Attribute {
    type Error = String;

    fn try_from(raw: RawAttribute) -> Result<Self, Self::Error> {
        let kind = match (raw.value_type, raw.relation) {
            (Some(value_type), None) => {
                if raw.collection {
                    return Err("'collection' only applies to relations".to_string());
                }
                AttributeKind::Scalar(value_type)
            }
            (None, Some(target)) => AttributeKind::Relation {
                target,
                collection: raw.collection,
            },
            (Some(_), Some(_)) => {
                return Err("an attribute is either a scalar 'type' or a 'relation', not both".to_string())
            }
            (None, None) => return Err("attribute needs a 'type' or a 'relation'".to_string()),
        };
        Ok(Attribute {
            kind,
            case_insensitive: raw.case_insensitive,
        })
    }
}

/// The attributes declared on one entity type, sorted by name
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct EntityType {
    attributes: BTreeMap<String, Attribute>,
}

impl EntityType {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, attribute: Attribute) -> Self {
        self.attributes.insert(name.into(), attribute);
        self
    }

    pub fn scalar(self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.with(name, Attribute::scalar(value_type))
    }

    pub fn child(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.with(name, Attribute::relation(target, false))
    }

    pub fn children(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.with(name, Attribute::relation(target, true))
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }
}

/// Read-only source of attribute metadata
pub trait SchemaProvider {
    fn attributes_of(&self, type_name: &str) -> Option<&EntityType>;
}

/// In-memory schema, buildable in code or loadable from JSON
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    types: HashMap<String, EntityType>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, name: impl Into<String>, entity: EntityType) -> Self {
        self.types.insert(name.into(), entity);
        self
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl SchemaProvider for Schema {
    fn attributes_of(&self, type_name: &str) -> Option<&EntityType> {
        self.types.get(type_name)
    }
}
