//! Reference evaluator for compiled predicates.
//!
//! A store only has to expose its records through [`Record`]: scalar lookup
//! by attribute name and relation traversal by relation name. Nested paths use
//! exists semantics: a leaf holds for a record if any record reached through
//! the relation chain satisfies it.

use serde_json::Value;
use slog::{debug, o, Logger};

use crate::predicate::{Leaf, Predicate};
use crate::value::CoercedValue;

pub trait Record {
    /// Runtime value of a scalar attribute; `Null` when absent
    fn scalar(&self, attribute: &str) -> CoercedValue;

    /// Records reached through a relation: every element of a collection, the
    /// single referenced record, or nothing
    fn related(&self, relation: &str) -> Vec<&Self>;
}

/// Evaluate `predicate` against one record. `And`/`Or` short-circuit.
pub fn eval<R: Record>(logger: &Logger, predicate: &Predicate, record: &R) -> bool {
    match predicate {
        Predicate::Leaf(leaf) => {
            let result = eval_leaf(leaf, record);
            debug!(logger, "leaf evaluated"; "leaf" => %leaf, "result" => result);
            result
        }
        Predicate::And(children) => children.iter().all(|c| eval(logger, c, record)),
        Predicate::Or(children) => children.iter().any(|c| eval(logger, c, record)),
    }
}

fn eval_leaf<R: Record>(leaf: &Leaf, record: &R) -> bool {
    let attribute = leaf.path.attribute();
    reachable(record, leaf.path.relations())
        .into_iter()
        .any(|r| leaf.matches(&r.scalar(attribute)))
}

fn reachable<'r, R: Record>(record: &'r R, relations: &[String]) -> Vec<&'r R> {
    let mut frontier = vec![record];
    for relation in relations {
        frontier = frontier
            .into_iter()
            .flat_map(|r| r.related(relation))
            .collect();
    }
    frontier
}

impl Record for Value {
    fn scalar(&self, attribute: &str) -> CoercedValue {
        match self.get(attribute) {
            Some(Value::String(s)) => CoercedValue::String(s.clone()),
            Some(Value::Bool(b)) => CoercedValue::Boolean(*b),
            Some(Value::Number(n)) => n
                .as_i64()
                .map(CoercedValue::Integer)
                .or_else(|| n.as_f64().map(CoercedValue::Decimal))
                .unwrap_or(CoercedValue::Null),
            _ => CoercedValue::Null,
        }
    }

    fn related(&self, relation: &str) -> Vec<&Self> {
        match self.get(relation) {
            Some(Value::Array(items)) => items.iter().collect(),
            Some(child @ Value::Object(_)) => vec![child],
            _ => Vec::new(),
        }
    }
}

/// Anything that can filter its records with a compiled predicate
pub trait Store {
    type Record: Record;

    fn find_all(&self, logger: &Logger, predicate: &Predicate) -> Vec<&Self::Record>;
}

/// A `Store` over an owned vector, scanned in insertion order
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore<R> {
    records: Vec<R>,
}

impl<R> InMemoryStore<R> {
    pub fn new(records: Vec<R>) -> Self {
        InMemoryStore { records }
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<R> FromIterator<R> for InMemoryStore<R> {
    fn from_iter<I: IntoIterator<Item = R>>(iter: I) -> Self {
        InMemoryStore::new(iter.into_iter().collect())
    }
}

impl<R: Record> Store for InMemoryStore<R> {
    type Record = R;

    fn find_all(&self, logger: &Logger, predicate: &Predicate) -> Vec<&R> {
        let logger = logger.new(o!("predicate" => predicate.to_string()));
        let matched: Vec<&R> = self
            .records
            .iter()
            .filter(|r| eval(&logger, predicate, *r))
            .collect();
        debug!(logger, "scan finished"; "scanned" => self.records.len(), "matched" => matched.len());
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_scalars() {
        let record = json!({"s": "x", "i": 3, "d": 1.5, "b": true, "n": null, "o": {}});
        assert_eq!(record.scalar("s"), CoercedValue::String("x".to_string()));
        assert_eq!(record.scalar("i"), CoercedValue::Integer(3));
        assert_eq!(record.scalar("d"), CoercedValue::Decimal(1.5));
        assert_eq!(record.scalar("b"), CoercedValue::Boolean(true));
        assert_eq!(record.scalar("n"), CoercedValue::Null);
        assert_eq!(record.scalar("o"), CoercedValue::Null);
        assert_eq!(record.scalar("missing"), CoercedValue::Null);
    }

    #[test]
    fn test_json_relations() {
        let record = json!({
            "children": [{"name": "a"}, {"name": "b"}],
            "parent": {"name": "p"},
            "tag": "x"
        });
        assert_eq!(record.related("children").len(), 2);
        assert_eq!(record.related("parent").len(), 1);
        assert!(record.related("tag").is_empty());
        assert!(record.related("missing").is_empty());
    }

    #[test]
    fn test_reachable_flattens_each_hop() {
        let record = json!({
            "children": [
                {"toys": [{"name": "ball"}, {"name": "kite"}]},
                {"toys": []},
                {"toys": [{"name": "yoyo"}]}
            ]
        });
        let path = ["children".to_string(), "toys".to_string()];
        let names: Vec<CoercedValue> = reachable(&record, &path)
            .into_iter()
            .map(|r| r.scalar("name"))
            .collect();
        assert_eq!(
            names,
            vec![
                CoercedValue::String("ball".into()),
                CoercedValue::String("kite".into()),
                CoercedValue::String("yoyo".into()),
            ]
        );
    }
}
