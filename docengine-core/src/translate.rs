//! Translation from the engine's abstract queries to the store's native syntax.
//!
//! Only the identity property is rewritten: its field name becomes `_id` and the values of
//! equality, `$in`, `$nin` and `$ne` clauses are converted through the identity codec. The
//! operands of `$and`, `$or` and `$nor` are translated as queries of their own. Every other
//! field, and every operator object the engine does not recognize, is forwarded as-is.

use std::collections::HashSet;

use bson::{Bson, Document, doc};

use crate::{
    backend::{NativeFindOptions, NativeUpdate},
    error::{EngineError, EngineResult},
    identity::{IdentityNormalizer, NATIVE_ID_FIELD},
    query::{FindOptions, LogicalOp, Query, QueryVisitor, SortDirection},
    update::Update,
};

/// Translates engine queries into native filter documents.
///
/// Implements [`QueryVisitor`] producing one `(field, value)` pair of the native filter per
/// clause.
pub struct QueryTranslator<'a> {
    normalizer: &'a IdentityNormalizer,
}

impl<'a> QueryTranslator<'a> {
    pub fn new(normalizer: &'a IdentityNormalizer) -> Self {
        Self { normalizer }
    }

    /// Translates a whole query, preserving clause order. An empty query yields `{}`.
    ///
    /// Clauses that land on the same native field cannot share one filter document, so such a
    /// query is emitted as an `$and` of single-clause filters.
    pub fn translate(&mut self, query: &Query) -> EngineResult<Document> {
        let pairs = query
            .clauses()
            .iter()
            .map(|clause| self.visit_clause(clause))
            .collect::<EngineResult<Vec<_>>>()?;

        let distinct = {
            let mut seen = HashSet::new();
            pairs.iter().all(|(field, _)| seen.insert(field.as_str()))
        };

        if distinct {
            return Ok(pairs.into_iter().collect());
        }

        let conjunction = pairs
            .into_iter()
            .map(|pair| Bson::Document(Document::from_iter([pair])))
            .collect::<Vec<_>>();

        Ok(doc! { "$and": conjunction })
    }

    /// Translates find options, renaming identity sort keys and projected fields.
    pub fn translate_options(&self, options: &FindOptions, batch_size: u32) -> NativeFindOptions {
        let sort = (!options.sort.is_empty()).then(|| {
            options
                .sort
                .iter()
                .map(|sort| {
                    (
                        self.normalizer.native_field(&sort.field).to_string(),
                        Bson::Int32(match sort.direction {
                            SortDirection::Asc => 1,
                            SortDirection::Desc => -1,
                        }),
                    )
                })
                .collect::<Document>()
        });

        let projection = options.fields.as_ref().map(|fields| {
            fields
                .iter()
                .map(|field| (self.normalizer.native_field(field).to_string(), Bson::Int32(1)))
                .collect::<Document>()
        });

        NativeFindOptions {
            sort,
            skip: options.skip,
            limit: options.limit,
            batch_size: Some(batch_size),
            projection,
        }
    }

    /// Translates an update payload. The identity property is stripped from set and replace
    /// payloads since a document's identity cannot change.
    pub fn translate_update(&self, update: Update) -> EngineResult<NativeUpdate> {
        match update {
            Update::Set(fields) => Ok(NativeUpdate::Modifiers(doc! {
                "$set": self.strip_identity(fields),
            })),
            Update::Replace(document) => {
                if document.keys().any(|key| key.starts_with('$')) {
                    return Err(EngineError::InvalidDocument(
                        "replacement document must not contain update operators".into(),
                    ));
                }

                Ok(NativeUpdate::Replacement(self.strip_identity(document)))
            }
            Update::Operators(operators) => Ok(NativeUpdate::Modifiers(operators)),
        }
    }

    fn strip_identity(&self, mut document: Document) -> Document {
        document.remove(self.normalizer.id_property());
        document.remove(NATIVE_ID_FIELD);
        document
    }

    fn field_value(&self, field: &str, value: &Bson) -> EngineResult<Bson> {
        if self.normalizer.is_identity_field(field) {
            self.normalizer.to_native(value)
        } else {
            Ok(value.clone())
        }
    }

    fn field_values(&self, field: &str, values: &[Bson]) -> EngineResult<Bson> {
        Ok(Bson::Array(
            values
                .iter()
                .map(|value| self.field_value(field, value))
                .collect::<EngineResult<Vec<_>>>()?,
        ))
    }

    fn native_field(&self, field: &str) -> String {
        self.normalizer.native_field(field).to_string()
    }
}

impl QueryVisitor for QueryTranslator<'_> {
    type Output = (String, Bson);
    type Error = EngineError;

    fn visit_equals(&mut self, field: &str, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok((self.native_field(field), self.field_value(field, value)?))
    }

    fn visit_in(&mut self, field: &str, values: &[Bson]) -> Result<Self::Output, Self::Error> {
        Ok((
            self.native_field(field),
            Bson::Document(doc! { "$in": self.field_values(field, values)? }),
        ))
    }

    fn visit_not_in(&mut self, field: &str, values: &[Bson]) -> Result<Self::Output, Self::Error> {
        Ok((
            self.native_field(field),
            Bson::Document(doc! { "$nin": self.field_values(field, values)? }),
        ))
    }

    fn visit_not_equals(&mut self, field: &str, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok((
            self.native_field(field),
            Bson::Document(doc! { "$ne": self.field_value(field, value)? }),
        ))
    }

    fn visit_operator(
        &mut self,
        field: &str,
        operator: &Document,
    ) -> Result<Self::Output, Self::Error> {
        Ok((self.native_field(field), Bson::Document(operator.clone())))
    }

    fn visit_logical(&mut self, op: LogicalOp, queries: &[Query]) -> Result<Self::Output, Self::Error> {
        let filters = queries
            .iter()
            .map(|query| self.translate(query).map(Bson::Document))
            .collect::<EngineResult<Vec<_>>>()?;

        Ok((op.as_str().to_string(), Bson::Array(filters)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        identity::ObjectIdCodec,
        query::{Filter, Query},
    };
    use bson::oid::ObjectId;
    use std::sync::Arc;

    fn normalizer(id_property: &str) -> IdentityNormalizer {
        IdentityNormalizer::new(id_property, Arc::new(ObjectIdCodec))
    }

    #[test]
    fn empty_query_matches_everything() {
        let normalizer = normalizer("_id");

        assert_eq!(QueryTranslator::new(&normalizer).translate(&Query::all()).unwrap(), doc! {});
    }

    #[test]
    fn identity_values_become_native() {
        let normalizer = normalizer("id");
        let (a, b) = (ObjectId::new(), ObjectId::new());
        let query = Query::builder()
            .clause(Filter::eq("name", "alice"))
            .clause(Filter::any_of("id", [a.to_hex(), b.to_hex()]))
            .build();

        let filter = QueryTranslator::new(&normalizer).translate(&query).unwrap();

        assert_eq!(filter, doc! { "name": "alice", "_id": { "$in": [a, b] } });
        assert_eq!(filter.keys().collect::<Vec<_>>(), ["name", "_id"]);
    }

    #[test]
    fn negations_translate_each_operand() {
        let normalizer = normalizer("_id");
        let (a, b) = (ObjectId::new(), ObjectId::new());
        let mut translator = QueryTranslator::new(&normalizer);

        let nin = translator
            .translate(&Query::from(doc! { "_id": { "$nin": [a.to_hex(), b.to_hex()] } }))
            .unwrap();
        let ne = translator
            .translate(&Query::from(doc! { "_id": { "$ne": a.to_hex() } }))
            .unwrap();

        assert_eq!(nin, doc! { "_id": { "$nin": [a, b] } });
        assert_eq!(ne, doc! { "_id": { "$ne": a } });
    }

    #[test]
    fn clauses_on_one_field_are_all_kept() {
        let normalizer = normalizer("_id");
        let query = Query::builder()
            .clause(Filter::eq("team", "red"))
            .clause(Filter::ne("n", 1))
            .clause(Filter::ne("n", 2))
            .build();

        let filter = QueryTranslator::new(&normalizer).translate(&query).unwrap();

        assert_eq!(
            filter,
            doc! { "$and": [{ "team": "red" }, { "n": { "$ne": 1 } }, { "n": { "$ne": 2 } }] }
        );
    }

    #[test]
    fn identity_property_and_native_field_do_not_collide() {
        let normalizer = normalizer("id");
        let (a, b) = (ObjectId::new(), ObjectId::new());
        let query = Query::builder()
            .clause(Filter::ne("id", a.to_hex()))
            .clause(Filter::operator("_id", doc! { "$exists": true }))
            .clause(Filter::ne("id", b.to_hex()))
            .build();

        let filter = QueryTranslator::new(&normalizer).translate(&query).unwrap();

        assert_eq!(
            filter,
            doc! { "$and": [
                { "_id": { "$ne": a } },
                { "_id": { "$exists": true } },
                { "_id": { "$ne": b } },
            ] }
        );
    }

    #[test]
    fn logical_operands_are_translated_recursively() {
        let normalizer = normalizer("id");
        let (a, b) = (ObjectId::new(), ObjectId::new());
        let query = Query::from(doc! {
            "$or": [
                { "id": a.to_hex() },
                { "$and": [{ "id": { "$in": [b.to_hex()] } }, { "age": { "$gt": 3 } }] },
            ],
        });

        let filter = QueryTranslator::new(&normalizer).translate(&query).unwrap();

        assert_eq!(
            filter,
            doc! { "$or": [
                { "_id": a },
                { "$and": [{ "_id": { "$in": [b] } }, { "age": { "$gt": 3 } }] },
            ] }
        );
    }

    #[test]
    fn malformed_identity_inside_logical_operands_fails() {
        let normalizer = normalizer("id");
        let query = Query::builder()
            .clause(Filter::nor([Query::builder().clause(Filter::eq("id", "bogus")).build()]))
            .build();

        let err = QueryTranslator::new(&normalizer).translate(&query).unwrap_err();

        assert!(matches!(err, EngineError::InvalidIdentity(_)));
    }

    #[test]
    fn non_identity_fields_pass_through() {
        let normalizer = normalizer("_id");
        let original = doc! {
            "tags": { "$in": ["x", "not-an-object-id"] },
            "age": { "$gte": 21, "$lt": 65 },
            "$or": [{ "a": 1 }, { "b": 2 }],
        };

        let filter = QueryTranslator::new(&normalizer)
            .translate(&Query::from(original.clone()))
            .unwrap();

        assert_eq!(filter, original);
    }

    #[test]
    fn unrecognized_identity_operators_are_only_renamed() {
        let normalizer = normalizer("id");
        let query = Query::from(doc! { "id": { "$exists": true } });

        let filter = QueryTranslator::new(&normalizer).translate(&query).unwrap();

        assert_eq!(filter, doc! { "_id": { "$exists": true } });
    }

    #[test]
    fn malformed_identity_fails_translation() {
        let normalizer = normalizer("_id");
        let query = Query::builder()
            .clause(Filter::none_of("_id", [ObjectId::new().to_hex(), "bogus".to_string()]))
            .build();

        let err = QueryTranslator::new(&normalizer).translate(&query).unwrap_err();

        assert!(matches!(err, EngineError::InvalidIdentity(_)));
    }

    #[test]
    fn options_rename_identity_keys() {
        let normalizer = normalizer("id");
        let options = FindOptions::builder()
            .sort("id", SortDirection::Desc)
            .sort("name", SortDirection::Asc)
            .fields(["name", "id"])
            .build();

        let native = QueryTranslator::new(&normalizer).translate_options(&options, 50);

        assert_eq!(native.sort, Some(doc! { "_id": -1, "name": 1 }));
        assert_eq!(native.projection, Some(doc! { "name": 1, "_id": 1 }));
        assert_eq!(native.batch_size, Some(50));
    }

    #[test]
    fn set_payload_drops_identity() {
        let normalizer = normalizer("id");

        let update = QueryTranslator::new(&normalizer)
            .translate_update(Update::set(doc! { "id": "x", "a": 2 }))
            .unwrap();

        assert_eq!(update, NativeUpdate::Modifiers(doc! { "$set": { "a": 2 } }));
    }
}
