//! Abstract query construction for the engine.
//!
//! A [`Query`] is an ordered list of [`Clause`]s. Each clause names a field and a
//! [`Condition`] that is decided when the query is built, so translation never has to sniff
//! the shape of operator objects.
//!
//! # Query Building
//!
//! ```ignore
//! use docengine::query::{Query, Filter};
//!
//! let query = Query::builder()
//!     .clause(Filter::eq("status", "active"))
//!     .clause(Filter::any_of("_id", vec![first, second]))
//!     .build();
//! ```
//!
//! Queries can also be parsed from a store-style document; `$in`, `$nin` and `$ne` operator
//! objects become tagged conditions and any other operator object is kept verbatim:
//!
//! ```ignore
//! let query = Query::from(doc! { "_id": { "$nin": [first] }, "age": { "$gt": 18 } });
//! ```

use bson::{Bson, Document};

use crate::error::EngineError;

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// Sort specification for query results.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// The predicate a clause applies to its field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// The field equals the literal value.
    Equals(Bson),
    /// The field equals any of the values.
    In(Vec<Bson>),
    /// The field equals none of the values.
    NotIn(Vec<Bson>),
    /// The field does not equal the value.
    NotEquals(Bson),
    /// Any other operator object, forwarded to the store untouched.
    Operator(Document),
    /// A logical combination of nested queries. The clause's field is the operator name.
    Logical(LogicalOp, Vec<Query>),
}

/// Top-level logical operators whose operands are themselves queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nor,
}

impl LogicalOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOp::And => "$and",
            LogicalOp::Or => "$or",
            LogicalOp::Nor => "$nor",
        }
    }

    fn parse(field: &str) -> Option<Self> {
        match field {
            "$and" => Some(LogicalOp::And),
            "$or" => Some(LogicalOp::Or),
            "$nor" => Some(LogicalOp::Nor),
            _ => None,
        }
    }
}

/// A single field predicate of a [`Query`].
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub field: String,
    pub condition: Condition,
}

impl Clause {
    pub fn new(field: impl Into<String>, condition: Condition) -> Self {
        Clause {
            field: field.into(),
            condition,
        }
    }
}

/// An abstract query: clauses combined with logical AND, in insertion order.
///
/// An empty query matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    clauses: Vec<Clause>,
}

impl Query {
    /// Creates a query that matches every document.
    pub fn all() -> Self {
        Query::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }
}

impl From<Document> for Query {
    fn from(document: Document) -> Self {
        Query {
            clauses: document
                .into_iter()
                .map(|(field, value)| parse_clause(field, value))
                .collect(),
        }
    }
}

/// `$and`/`$or`/`$nor` over an array of documents become nested queries; anything else is a
/// field condition.
fn parse_clause(field: String, value: Bson) -> Clause {
    let Some(op) = LogicalOp::parse(&field) else {
        return Clause::new(field, Condition::from(value));
    };

    match value {
        Bson::Array(items) if items.iter().all(|item| matches!(item, Bson::Document(_))) => {
            let queries = items
                .into_iter()
                .filter_map(|item| match item {
                    Bson::Document(doc) => Some(Query::from(doc)),
                    _ => None,
                })
                .collect();

            Clause::new(field, Condition::Logical(op, queries))
        }
        other => Clause::new(field, Condition::from(other)),
    }
}

impl FromIterator<Clause> for Query {
    fn from_iter<I: IntoIterator<Item = Clause>>(iter: I) -> Self {
        Query {
            clauses: iter.into_iter().collect(),
        }
    }
}

impl From<Bson> for Condition {
    fn from(value: Bson) -> Self {
        let operator = match value {
            Bson::Document(doc) if is_operator_object(&doc) => doc,
            literal => return Condition::Equals(literal),
        };

        if operator.len() != 1 {
            return Condition::Operator(operator);
        }

        let recognized = match operator.iter().next() {
            Some((op, Bson::Array(values))) if op == "$in" => Some(Condition::In(values.clone())),
            Some((op, Bson::Array(values))) if op == "$nin" => Some(Condition::NotIn(values.clone())),
            Some((op, value)) if op == "$ne" => Some(Condition::NotEquals(value.clone())),
            _ => None,
        };

        recognized.unwrap_or_else(|| Condition::Operator(operator))
    }
}

/// A non-empty document whose keys are all `$` operators.
fn is_operator_object(doc: &Document) -> bool {
    !doc.is_empty() && doc.keys().all(|key| key.starts_with('$'))
}

/// Helper struct for constructing clauses.
///
/// All methods accept field names and values as `Into<String>` and `Into<Bson>` for ergonomics.
pub struct Filter;

impl Filter {
    /// Matches documents where the field equals the value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Clause {
        Clause::new(field, Condition::Equals(value.into()))
    }

    /// Matches documents where the field does not equal the value.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Clause {
        Clause::new(field, Condition::NotEquals(value.into()))
    }

    /// Matches documents where the field equals any of the values.
    pub fn any_of<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Clause {
        Clause::new(field, Condition::In(values.into_iter().map(Into::into).collect()))
    }

    /// Matches documents where the field equals none of the values.
    pub fn none_of<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Clause {
        Clause::new(field, Condition::NotIn(values.into_iter().map(Into::into).collect()))
    }

    /// Forwards an operator object to the store as-is, e.g. `{ "$gt": 18 }`.
    pub fn operator(field: impl Into<String>, operator: Document) -> Clause {
        Clause::new(field, Condition::Operator(operator))
    }

    /// Matches documents satisfying every query.
    pub fn and(queries: impl IntoIterator<Item = Query>) -> Clause {
        Self::logical(LogicalOp::And, queries)
    }

    /// Matches documents satisfying at least one query.
    pub fn or(queries: impl IntoIterator<Item = Query>) -> Clause {
        Self::logical(LogicalOp::Or, queries)
    }

    /// Matches documents satisfying none of the queries.
    pub fn nor(queries: impl IntoIterator<Item = Query>) -> Clause {
        Self::logical(LogicalOp::Nor, queries)
    }

    fn logical(op: LogicalOp, queries: impl IntoIterator<Item = Query>) -> Clause {
        Clause::new(op.as_str(), Condition::Logical(op, queries.into_iter().collect()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Appends a clause to the query.
    pub fn clause(mut self, clause: Clause) -> Self {
        self.query.clauses.push(clause);
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> Query {
        self.query
    }
}

/// Options controlling how matching documents are returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Sort keys, applied in order.
    pub sort: Vec<Sort>,
    /// Number of documents to skip.
    pub skip: Option<u64>,
    /// Maximum number of documents to return.
    pub limit: Option<i64>,
    /// Fields to include. The identity is always returned unless the store strips it.
    pub fields: Option<Vec<String>>,
}

impl FindOptions {
    pub fn builder() -> FindOptionsBuilder {
        FindOptionsBuilder::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FindOptionsBuilder {
    options: FindOptions,
}

impl FindOptionsBuilder {
    /// Adds a sort key. Later keys break ties of earlier ones.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.options.sort.push(Sort { field: field.into(), direction });
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.options.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.options.limit = Some(limit);
        self
    }

    /// Restricts returned documents to the given fields.
    pub fn fields<S: Into<String>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.options.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> FindOptions {
        self.options
    }
}

/// Visits the clauses of a [`Query`], one method per [`Condition`] variant.
pub trait QueryVisitor {
    type Output;
    type Error: Into<EngineError>;

    fn visit_equals(&mut self, field: &str, value: &Bson) -> Result<Self::Output, Self::Error>;
    fn visit_in(&mut self, field: &str, values: &[Bson]) -> Result<Self::Output, Self::Error>;
    fn visit_not_in(&mut self, field: &str, values: &[Bson]) -> Result<Self::Output, Self::Error>;
    fn visit_not_equals(&mut self, field: &str, value: &Bson) -> Result<Self::Output, Self::Error>;
    fn visit_operator(
        &mut self,
        field: &str,
        operator: &Document,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_logical(&mut self, op: LogicalOp, queries: &[Query]) -> Result<Self::Output, Self::Error>;

    fn visit_clause(&mut self, clause: &Clause) -> Result<Self::Output, Self::Error> {
        let field = clause.field.as_str();

        match &clause.condition {
            Condition::Equals(value) => self.visit_equals(field, value),
            Condition::In(values) => self.visit_in(field, values),
            Condition::NotIn(values) => self.visit_not_in(field, values),
            Condition::NotEquals(value) => self.visit_not_equals(field, value),
            Condition::Operator(operator) => self.visit_operator(field, operator),
            Condition::Logical(op, queries) => self.visit_logical(*op, queries),
        }
    }
}
