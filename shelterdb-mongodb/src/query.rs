//! Translation of predicates into MongoDB query documents.

use bson::{Bson, Document, doc};

use shelterdb_core::{
    error::StoreError,
    query::{Expr, FieldOp, QueryVisitor},
};

/// Translates predicate expressions into MongoDB's native query syntax.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    /// Translates an optional predicate; `None` matches every document.
    pub(crate) fn translate(filter: Option<&Expr>) -> Result<Document, StoreError> {
        match filter {
            Some(expr) => MongoQueryTranslator.visit_expr(expr),
            None => Ok(doc! {}),
        }
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = StoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        // `$not` only applies to field operators; `$nor` negates a whole clause.
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                FieldOp::Contains => match value {
                    Bson::String(s) => doc! { "$regex": regex::escape(s), "$options": "i" },
                    _ => return Err(StoreError::InvalidDocument(format!("contains on {field} requires a string value"))),
                },
                FieldOp::AnyOf => match value {
                    Bson::Array(values) => doc! { "$in": values },
                    single => doc! { "$in": [single] },
                },
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use shelterdb_core::query::Filter;

    use super::*;

    #[test]
    fn contains_escapes_pattern_syntax() {
        let translated = MongoQueryTranslator::translate(Some(&Filter::contains("name", "a.b+(c)"))).unwrap();
        assert_eq!(translated, doc! { "name": { "$regex": r"a\.b\+\(c\)", "$options": "i" } });
    }

    #[test]
    fn negation_uses_nor() {
        let translated = MongoQueryTranslator::translate(Some(&Filter::eq("status", "adopted").not())).unwrap();
        assert_eq!(translated, doc! { "$nor": [{ "status": { "$eq": "adopted" } }] });
    }

    #[test]
    fn absent_filter_matches_everything() {
        assert_eq!(MongoQueryTranslator::translate(None).unwrap(), doc! {});
    }

    #[test]
    fn any_of_becomes_in() {
        let translated = MongoQueryTranslator::translate(Some(&Filter::any_of("species", ["dog", "cat"]))).unwrap();
        assert_eq!(translated, doc! { "species": { "$in": ["dog", "cat"] } });
    }
}
