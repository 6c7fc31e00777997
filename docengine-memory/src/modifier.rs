//! Update modifiers and replacements applied to in-memory documents.

use bson::{Bson, Document};

use docengine_core::{
    backend::NativeUpdate,
    error::{StoreError, StoreResult},
};

use crate::{codes, evaluator::lookup};

const SUPPORTED_MODIFIERS: [&str; 3] = ["$set", "$unset", "$inc"];

fn failed_to_parse(message: impl Into<String>) -> StoreError {
    StoreError::new(message).with_code(codes::FAILED_TO_PARSE)
}

fn immutable_id() -> StoreError {
    StoreError::new("Performing an update on the path '_id' would modify the immutable field '_id'")
        .with_code(codes::IMMUTABLE_FIELD)
}

/// Rejects malformed payloads before any document is touched.
pub(crate) fn validate(update: &NativeUpdate) -> StoreResult<()> {
    match update {
        NativeUpdate::Modifiers(modifiers) => {
            if modifiers.is_empty() {
                return Err(failed_to_parse("Update document requires atomic operators"));
            }

            for (op, fields) in modifiers {
                if !op.starts_with('$') {
                    return Err(failed_to_parse("Update document requires atomic operators"));
                }
                if !SUPPORTED_MODIFIERS.contains(&op.as_str()) {
                    return Err(failed_to_parse(format!(
                        "Unknown modifier: {op}. Expected a valid update modifier or pipeline-style update specified as an array"
                    )));
                }

                match fields {
                    Bson::Document(fields) if fields.is_empty() => {
                        return Err(failed_to_parse(format!(
                            "'{op}' is empty. You must specify a field like so: {{{op}: {{<field>: ...}}}}"
                        )));
                    }
                    Bson::Document(_) => {}
                    other => {
                        return Err(failed_to_parse(format!(
                            "Modifiers operate on fields but we found type {:?} instead",
                            other.element_type()
                        )));
                    }
                }
            }

            Ok(())
        }
        NativeUpdate::Replacement(replacement) => {
            match replacement.keys().find(|key| key.starts_with('$')) {
                Some(key) => Err(StoreError::new(format!(
                    "The dollar ($) prefixed field '{key}' is not allowed in a replacement document"
                ))
                .with_code(codes::DOLLAR_PREFIXED_FIELD_NAME)),
                None => Ok(()),
            }
        }
    }
}

/// Applies a validated update and returns the new document. `current` is left untouched on error.
pub(crate) fn apply(current: &Document, update: &NativeUpdate) -> StoreResult<Document> {
    match update {
        NativeUpdate::Modifiers(modifiers) => {
            let mut updated = current.clone();
            apply_modifiers(&mut updated, modifiers)?;
            Ok(updated)
        }
        NativeUpdate::Replacement(replacement) => replace(current, replacement),
    }
}

fn apply_modifiers(document: &mut Document, modifiers: &Document) -> StoreResult<()> {
    for (op, fields) in modifiers {
        let Bson::Document(fields) = fields else {
            continue;
        };

        for (path, operand) in fields {
            match op.as_str() {
                "$set" => {
                    if path == "_id" && document.get("_id") != Some(operand) {
                        return Err(immutable_id());
                    }
                    set_path(document, path, operand.clone())?;
                }
                "$unset" => {
                    if path == "_id" {
                        return Err(immutable_id());
                    }
                    unset_path(document, path);
                }
                "$inc" => {
                    let incremented = increment(lookup(document, path), path, operand)?;
                    set_path(document, path, incremented)?;
                }
                _ => {}
            }
        }
    }

    Ok(())
}

fn replace(current: &Document, replacement: &Document) -> StoreResult<Document> {
    let id = current.get("_id").cloned().unwrap_or(Bson::Null);

    if replacement.get("_id").is_some_and(|replacement_id| *replacement_id != id) {
        return Err(immutable_id());
    }

    let mut replaced = Document::new();
    replaced.insert("_id", id);
    for (key, value) in replacement {
        if key != "_id" {
            replaced.insert(key.clone(), value.clone());
        }
    }

    Ok(replaced)
}

fn increment(current: Option<&Bson>, path: &str, operand: &Bson) -> StoreResult<Bson> {
    let non_numeric = || {
        StoreError::new(format!("Cannot increment with non-numeric argument: {{{path}: {operand}}}"))
            .with_code(codes::TYPE_MISMATCH)
    };

    if !matches!(operand, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) {
        return Err(non_numeric());
    }

    let Some(current) = current else {
        return Ok(operand.clone());
    };

    let overflow = || {
        StoreError::new(format!(
            "Failed to apply $inc operations to current value ({current}) at '{path}': integer overflow"
        ))
        .with_code(codes::BAD_VALUE)
    };

    let sum = match (current, operand) {
        (Bson::Int32(a), Bson::Int32(b)) => a
            .checked_add(*b)
            .map(Bson::Int32)
            .unwrap_or_else(|| Bson::Int64(*a as i64 + *b as i64)),
        (Bson::Int32(a), Bson::Int64(b)) => Bson::Int64((*a as i64).checked_add(*b).ok_or_else(overflow)?),
        (Bson::Int64(a), Bson::Int32(b)) => Bson::Int64(a.checked_add(*b as i64).ok_or_else(overflow)?),
        (Bson::Int64(a), Bson::Int64(b)) => Bson::Int64(a.checked_add(*b).ok_or_else(overflow)?),
        (Bson::Double(a), Bson::Int32(b)) => Bson::Double(a + *b as f64),
        (Bson::Double(a), Bson::Int64(b)) => Bson::Double(a + *b as f64),
        (Bson::Int32(a), Bson::Double(b)) => Bson::Double(*a as f64 + b),
        (Bson::Int64(a), Bson::Double(b)) => Bson::Double(*a as f64 + b),
        (Bson::Double(a), Bson::Double(b)) => Bson::Double(a + b),
        (other, _) => {
            return Err(StoreError::new(format!(
                "Cannot apply $inc to a value of non-numeric type {:?} at '{path}'",
                other.element_type()
            ))
            .with_code(codes::TYPE_MISMATCH));
        }
    };

    Ok(sum)
}

/// Sets a dotted path, creating intermediate documents as needed.
pub(crate) fn set_path(document: &mut Document, path: &str, value: Bson) -> StoreResult<()> {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            if !document.contains_key(head) {
                document.insert(head, Document::new());
            }

            match document.get_mut(head) {
                Some(Bson::Document(inner)) => set_path(inner, rest, value),
                Some(other) => Err(StoreError::new(format!(
                    "Cannot create field '{rest}' in element {{{head}: {other}}}"
                ))
                .with_code(codes::PATH_NOT_VIABLE)),
                None => Ok(()),
            }
        }
    }
}

fn unset_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                unset_path(inner, rest);
            }
        }
    }
}

/// Builds the initial document of an upsert from the equality clauses of its filter.
pub(crate) fn seed_from_filter(filter: &Document) -> StoreResult<Document> {
    let mut seed = Document::new();

    for (key, condition) in filter {
        if key.starts_with('$') {
            continue;
        }

        let value = match condition {
            Bson::Document(operators) if operators.keys().next().is_some_and(|k| k.starts_with('$')) => {
                match operators.get("$eq") {
                    Some(value) => value.clone(),
                    None => continue,
                }
            }
            literal => literal.clone(),
        };

        set_path(&mut seed, key, value)?;
    }

    Ok(seed)
}
