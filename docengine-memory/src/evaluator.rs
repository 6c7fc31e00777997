//! Native filter evaluation for in-memory documents.
//!
//! Evaluates store-syntax filter documents (`{ "age": { "$gt": 18 } }`) against BSON documents,
//! and orders and projects documents the way the store does.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use docengine_core::error::{StoreError, StoreResult};

use crate::codes;

/// Type-erased, comparable representation of BSON values.
///
/// Normalizes numeric types to f64 for easy comparison.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null value
    Null,
    /// Numeric value (all integers and floats normalized to f64)
    Number(f64),
    /// String value
    String(&'a str),
    /// Map/Object of comparable values
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    ObjectId(ObjectId),
    /// Boolean value
    Bool(bool),
    /// DateTime value
    DateTime(DateTime),
    /// Binary, regex, timestamp and other values only equal to an identical value
    Opaque(&'a Bson),
}

impl Comparable<'_> {
    /// Position in the store's cross-type sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::ObjectId(_) => 5,
            Comparable::Bool(_) => 6,
            Comparable::DateTime(_) => 7,
            Comparable::Opaque(_) => 8,
        }
    }

    /// Total order used for sorting: by type rank first, then by value.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        self.partial_cmp(other)
            .unwrap_or_else(|| self.rank().cmp(&other.rank()))
    }
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            Bson::Undefined => Comparable::Null,
            other => Comparable::Opaque(other),
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Opaque(a), Comparable::Opaque(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a dotted path such as `address.city` or `tags.0`.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = document.get(parts.next()?)?;

    for part in parts {
        current = match current {
            Bson::Document(doc) => doc.get(part)?,
            Bson::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Whether a projection or `$exists` operand counts as "on".
pub(crate) fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => *b,
        Bson::Int32(n) => *n != 0,
        Bson::Int64(n) => *n != 0,
        Bson::Double(n) => *n != 0.0,
        Bson::Null | Bson::Undefined => false,
        _ => true,
    }
}

fn bad_value(message: impl Into<String>) -> StoreError {
    StoreError::new(message).with_code(codes::BAD_VALUE)
}

/// Evaluates native filters against a single document.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Whether the document satisfies every clause of `filter`.
    pub fn matches(&self, filter: &Document) -> StoreResult<bool> {
        for (key, condition) in filter {
            if !self.matches_clause(key, condition)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Returns the documents matching `filter`, in their original order.
    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        filter: &Document,
    ) -> StoreResult<Vec<Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(document).matches(filter)? {
                matched.push(document.clone());
            }
        }

        Ok(matched)
    }

    fn matches_clause(&self, key: &str, condition: &Bson) -> StoreResult<bool> {
        match key {
            "$and" => {
                for filter in Self::subfilters(key, condition)? {
                    if !self.matches(filter)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            "$or" | "$nor" => {
                let mut any = false;
                for filter in Self::subfilters(key, condition)? {
                    if self.matches(filter)? {
                        any = true;
                        break;
                    }
                }
                Ok(if key == "$or" { any } else { !any })
            }
            op if op.starts_with('$') => Err(bad_value(format!("unknown top level operator: {op}"))),
            field => self.matches_field(lookup(self.document, field), condition),
        }
    }

    fn subfilters<'b>(op: &str, condition: &'b Bson) -> StoreResult<Vec<&'b Document>> {
        match condition {
            Bson::Array(items) if !items.is_empty() => items
                .iter()
                .map(|item| match item {
                    Bson::Document(filter) => Ok(filter),
                    _ => Err(bad_value(format!("{op} argument's entries must be objects"))),
                })
                .collect(),
            _ => Err(bad_value(format!("{op} must be a nonempty array"))),
        }
    }

    fn matches_field(&self, value: Option<&Bson>, condition: &Bson) -> StoreResult<bool> {
        match condition {
            Bson::Document(operators) if operators.keys().next().is_some_and(|k| k.starts_with('$')) => {
                for (op, operand) in operators {
                    if !self.apply_operator(value, op, operand)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            literal => Ok(equals(value, literal)),
        }
    }

    fn apply_operator(&self, value: Option<&Bson>, op: &str, operand: &Bson) -> StoreResult<bool> {
        match op {
            "$eq" => Ok(equals(value, operand)),
            "$ne" => Ok(!equals(value, operand)),
            "$in" => Ok(in_set(value, array_operand(op, operand)?)),
            "$nin" => Ok(!in_set(value, array_operand(op, operand)?)),
            "$gt" | "$gte" | "$lt" | "$lte" => Ok(compare(value, op, operand)),
            "$exists" => Ok(value.is_some() == truthy(operand)),
            "$not" => match operand {
                Bson::Document(_) => Ok(!self.matches_field(value, operand)?),
                _ => Err(bad_value("$not needs a regex or a document")),
            },
            other => Err(bad_value(format!("unknown operator: {other}"))),
        }
    }
}

fn array_operand<'b>(op: &str, operand: &'b Bson) -> StoreResult<&'b [Bson]> {
    match operand {
        Bson::Array(values) => Ok(values),
        _ => Err(bad_value(format!("{op} needs an array"))),
    }
}

/// Store equality: a missing field equals null, and an array field equals any of its elements.
fn equals(value: Option<&Bson>, target: &Bson) -> bool {
    let target = Comparable::from(target);

    match value {
        None => target == Comparable::Null,
        Some(value) => {
            if Comparable::from(value) == target {
                return true;
            }

            match value {
                Bson::Array(items) => items.iter().any(|item| Comparable::from(item) == target),
                _ => false,
            }
        }
    }
}

fn in_set(value: Option<&Bson>, targets: &[Bson]) -> bool {
    targets.iter().any(|target| equals(value, target))
}

fn compare(value: Option<&Bson>, op: &str, operand: &Bson) -> bool {
    let Some(value) = value else {
        return false;
    };
    let operand = Comparable::from(operand);
    let holds = |candidate: &Bson| match Comparable::from(candidate).partial_cmp(&operand) {
        Some(ordering) => match op {
            "$gt" => ordering == Ordering::Greater,
            "$gte" => ordering != Ordering::Less,
            "$lt" => ordering == Ordering::Less,
            _ => ordering != Ordering::Greater,
        },
        None => false,
    };

    match value {
        Bson::Array(items) => items.iter().any(holds),
        single => holds(single),
    }
}

/// Orders two documents by a native sort document such as `{ "age": -1, "_id": 1 }`.
pub(crate) fn compare_documents(a: &Document, b: &Document, sort: &Document) -> Ordering {
    for (field, direction) in sort {
        let left = lookup(a, field).map(Comparable::from).unwrap_or(Comparable::Null);
        let right = lookup(b, field).map(Comparable::from).unwrap_or(Comparable::Null);

        let ordering = left.sort_cmp(&right);
        let ordering = if matches!(Comparable::from(direction), Comparable::Number(n) if n < 0.0) {
            ordering.reverse()
        } else {
            ordering
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

/// Applies a top-level inclusion or exclusion projection. `_id` is kept unless excluded.
pub(crate) fn project(document: Document, projection: &Document) -> Document {
    let include_id = projection.get("_id").is_none_or(truthy);
    let inclusive = projection
        .iter()
        .any(|(key, value)| key != "_id" && truthy(value));

    document
        .into_iter()
        .filter(|(key, _)| {
            if key == "_id" {
                include_id
            } else if inclusive {
                projection.get(key).is_some_and(truthy)
            } else {
                projection.get(key).is_none_or(truthy)
            }
        })
        .collect()
}
