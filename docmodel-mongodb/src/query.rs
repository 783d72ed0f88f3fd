//! Query translation from the docmodel AST to MongoDB query syntax.

use bson::{Bson, Document, doc};

use docmodel_core::{
    error::ModelError,
    query::{Expr, FieldOp, QueryVisitor},
};

use crate::sanitizer::ValueSanitizer;

/// Translates filter expressions into MongoDB query documents.
///
/// Field names are sanitized the same way stored keys are.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    fn visit_all(&mut self, exprs: &[Expr]) -> Result<Vec<Document>, ModelError> {
        exprs.iter().map(|expr| self.visit_expr(expr)).collect()
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = ModelError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        match exprs {
            [] => Ok(doc! {}),
            exprs => Ok(doc! { "$and": self.visit_all(exprs)? }),
        }
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! { "$or": self.visit_all(exprs)? })
    }

    // `$not` only applies to field operators; `$nor` negates a whole expression.
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        let negated = self.visit_expr(expr)?;

        Ok(doc! { "$nor": [negated] })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        let field = ValueSanitizer::sanitize_string(field);

        Ok(doc! { field: { "$exists": should_exist } })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let value = &ValueSanitizer::sanitize_value(value);
        let candidates = || match value {
            Bson::Array(_) => value.clone(),
            single => Bson::Array(vec![single.clone()]),
        };

        let field = ValueSanitizer::sanitize_string(field);

        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                FieldOp::AnyOf => doc! { "$in": candidates() },
                FieldOp::NoneOf => doc! { "$nin": candidates() },
            }
        })
    }
}
