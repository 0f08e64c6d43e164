//! Field name sanitization for MongoDB compatibility.
//!
//! MongoDB reserves dots and dollar signs in field names for path and operator syntax, so
//! stored keys containing them (free-form maps such as email templates or feature flags)
//! are escaped on the way in and restored on the way out. Values are left untouched so that
//! string predicates match what was written.

use bson::Bson;

pub(crate) struct KeySanitizer;

impl KeySanitizer {
    const REPLACEMENTS: [(&'static str, &'static str); 3] = [
        (".", "__dot__"),
        ("$", "__dollar__"),
        ("\0", "__null__"),
    ];

    /// Recursively escapes the keys of every embedded document.
    pub(crate) fn sanitize_value(value: &Bson) -> Bson {
        match value {
            Bson::Array(arr) => Bson::Array(arr.iter().map(Self::sanitize_value).collect()),
            Bson::Document(doc) => Bson::Document(
                doc.iter()
                    .map(|(k, v)| (Self::sanitize_string(k), Self::sanitize_value(v)))
                    .collect(),
            ),
            _ => value.clone(),
        }
    }

    pub(crate) fn sanitize_string(input: &str) -> String {
        Self::REPLACEMENTS
            .iter()
            .fold(input.to_string(), |sanitized, (target, replacement)| sanitized.replace(target, replacement))
    }

    /// Inverse of [`KeySanitizer::sanitize_value`].
    pub(crate) fn restore_value(value: &Bson) -> Bson {
        match value {
            Bson::Array(arr) => Bson::Array(arr.iter().map(Self::restore_value).collect()),
            Bson::Document(doc) => Bson::Document(
                doc.iter()
                    .map(|(k, v)| (Self::restore_string(k), Self::restore_value(v)))
                    .collect(),
            ),
            _ => value.clone(),
        }
    }

    pub(crate) fn restore_string(input: &str) -> String {
        Self::REPLACEMENTS
            .iter()
            .rev()
            .fold(input.to_string(), |restored, (target, replacement)| restored.replace(replacement, target))
    }
}

#[cfg(test)]
mod tests {
    use bson::bson;

    use super::*;

    #[test]
    fn keys_are_escaped_and_values_are_not() {
        let flags = bson!({ "features": { "beta.search": true, "note": "a.b $c" } });
        let sanitized = KeySanitizer::sanitize_value(&flags);

        assert_eq!(sanitized, bson!({ "features": { "beta__dot__search": true, "note": "a.b $c" } }));
        assert_eq!(KeySanitizer::restore_value(&sanitized), flags);
    }
}
