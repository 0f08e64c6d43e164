//! Dotted-path access into stored documents.

use bson::{Bson, Document};

use shelterdb_core::error::{StoreError, StoreResult};

/// Reads the value at `path`, descending through embedded documents.
pub(crate) fn lookup<'d>(document: &'d Bson, path: &str) -> Option<&'d Bson> {
    path.split('.')
        .try_fold(document, |current, key| current.as_document()?.get(key))
}

/// Walks to the document holding the last segment of `path`, creating missing levels.
fn parent_mut<'d>(document: &'d mut Document, path: &str) -> StoreResult<(&'d mut Document, String)> {
    let mut segments = path.split('.').collect::<Vec<_>>();
    let last = segments.pop().unwrap_or_default().to_string();

    let mut current = document;
    for segment in segments {
        let next = current
            .entry(segment.to_string())
            .or_insert_with(|| Bson::Document(Document::new()));

        current = match next {
            Bson::Document(inner) => inner,
            other => {
                return Err(StoreError::InvalidDocument(format!(
                    "cannot descend into {path}: {segment} holds {:?}",
                    other.element_type()
                )));
            }
        };
    }

    Ok((current, last))
}

/// Assigns `value` at `path`.
pub(crate) fn set_path(document: &mut Document, path: &str, value: Bson) -> StoreResult<()> {
    let (parent, key) = parent_mut(document, path)?;
    parent.insert(key, value);
    Ok(())
}

/// Adds `delta` to the number at `path`; a missing field takes the delta as its value.
pub(crate) fn increment_path(document: &mut Document, path: &str, delta: &Bson) -> StoreResult<()> {
    let (parent, key) = parent_mut(document, path)?;

    let next = match parent.get(&key) {
        None | Some(Bson::Null) => numeric(delta, path)?.clone(),
        Some(current) => add(numeric(current, path)?, numeric(delta, path)?)
            .ok_or_else(|| StoreError::InvalidDocument(format!("increment overflows {path}")))?,
    };

    parent.insert(key, next);
    Ok(())
}

fn numeric<'v>(value: &'v Bson, path: &str) -> StoreResult<&'v Bson> {
    match value {
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => Ok(value),
        other => Err(StoreError::InvalidDocument(format!(
            "cannot increment {path}: {:?} is not a number",
            other.element_type()
        ))),
    }
}

/// Adds two numbers, widening the way the document store does; `None` when an `Int64` sum overflows.
fn add(left: &Bson, right: &Bson) -> Option<Bson> {
    match (left, right) {
        (Bson::Int32(a), Bson::Int32(b)) => Some(match a.checked_add(*b) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(*a as i64 + *b as i64),
        }),
        (Bson::Int32(a), Bson::Int64(b)) => (*a as i64).checked_add(*b).map(Bson::Int64),
        (Bson::Int64(a), Bson::Int32(b)) => a.checked_add(*b as i64).map(Bson::Int64),
        (Bson::Int64(a), Bson::Int64(b)) => a.checked_add(*b).map(Bson::Int64),
        (left, right) => Some(Bson::Double(as_f64(left) + as_f64(right))),
    }
}

pub(crate) fn as_f64(value: &Bson) -> f64 {
    match value {
        Bson::Int32(n) => *n as f64,
        Bson::Int64(n) => *n as f64,
        Bson::Double(n) => *n,
        _ => 0.0,
    }
}

/// Copies only the given paths out of `document`.
pub(crate) fn project(document: &Bson, fields: &[String]) -> StoreResult<Bson> {
    let mut projected = Document::new();

    for field in fields {
        if let Some(value) = lookup(document, field) {
            set_path(&mut projected, field, value.clone())?;
        }
    }

    Ok(Bson::Document(projected))
}

#[cfg(test)]
mod tests {
    use bson::{bson, doc};

    use super::*;

    #[test]
    fn increments_preserve_integer_types() {
        let mut document = doc! { "hours": 3, "total": 10.5 };

        increment_path(&mut document, "hours", &Bson::Int32(2)).unwrap();
        increment_path(&mut document, "total", &Bson::Int32(1)).unwrap();
        increment_path(&mut document, "stats.count", &Bson::Int64(1)).unwrap();

        assert_eq!(document, doc! { "hours": 5, "total": 11.5, "stats": { "count": 1_i64 } });
    }

    #[test]
    fn incrementing_a_string_is_rejected() {
        let mut document = doc! { "name": "Rex" };
        assert!(increment_path(&mut document, "name", &Bson::Int32(1)).is_err());
    }

    #[test]
    fn overflowing_increment_is_rejected() {
        let mut document = doc! { "total": i64::MAX };

        let error = increment_path(&mut document, "total", &Bson::Int64(1)).unwrap_err();
        assert!(matches!(error, StoreError::InvalidDocument(_)));
        assert!(increment_path(&mut document, "total", &Bson::Int32(1)).is_err());
        assert_eq!(document.get_i64("total").unwrap(), i64::MAX);

        let mut document = doc! { "total": i32::MAX };
        increment_path(&mut document, "total", &Bson::Int32(1)).unwrap();
        assert_eq!(document.get_i64("total").unwrap(), i32::MAX as i64 + 1);
    }

    #[test]
    fn projection_keeps_nested_paths() {
        let document = bson!({ "a": 1, "b": { "c": 2, "d": 3 } });
        let projected = project(&document, &["b.c".to_string(), "missing".to_string()]).unwrap();

        assert_eq!(projected, bson!({ "b": { "c": 2 } }));
    }
}
