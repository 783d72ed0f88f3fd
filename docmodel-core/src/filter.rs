//! Default filters and their per-instance specialisation.
//!
//! A collection type declares a default filter as a JSON filter object and a store
//! address, both of which may contain placeholder tokens. [`FilterOptionsBuilder`]
//! resolves them against the params a collection instance is built with, producing an
//! [`EffectiveFilter`]. The effective filter is computed once and never changes.
//!
//! # Filter objects
//!
//! The accepted fragment is deliberately small:
//!
//! - `{ "field": value }` - equality
//! - `{ "field": { "$eq" | "$ne" | "$gt" | "$gte" | "$lt" | "$lte": value } }`
//! - `{ "field": { "$in" | "$nin": [values] } }`
//! - `{ "field": { "$exists": bool } }`
//! - `{ "field": { "$not": { operators } } }`
//! - `{ "$and": [filters] }` and `{ "$or": [filters] }`
//!
//! Several keys in one object are AND-ed together and `{}` matches every record.

use bson::{Bson, ser::serialize_to_bson};
use serde_json::{Map, Value};

use crate::{
    error::{ModelError, ModelResult},
    query::{Expr, FieldOp, Query},
    template::{TemplateParams, placeholder_name, resolve, resolve_path},
};

/// Combines a declared default filter and address with construction params.
#[derive(Debug, Clone)]
pub struct FilterOptionsBuilder {
    default_filter: Value,
    url_template: String,
}

impl FilterOptionsBuilder {
    /// Creates a builder for the given declared filter and address template.
    pub fn new(default_filter: Value, url_template: impl Into<String>) -> Self {
        Self {
            default_filter,
            url_template: url_template.into(),
        }
    }

    /// The declared filter, with its placeholders untouched.
    pub fn default_filter(&self) -> &Value {
        &self.default_filter
    }

    /// Resolves the declared filter and address against `params`.
    pub fn build(&self, params: &TemplateParams) -> EffectiveFilter {
        let bound = match &self.default_filter {
            Value::Object(declared) => declared
                .iter()
                .filter_map(|(key, value)| {
                    let name = placeholder_name(value.as_str()?)?;
                    params
                        .get(name)
                        .map(|bound| (key.clone(), bound.clone()))
                })
                .collect(),
            _ => Map::new(),
        };

        EffectiveFilter {
            filter: resolve(&self.default_filter, params),
            url: resolve_path(&self.url_template, params),
            params: params.clone(),
            bound,
        }
    }
}

/// The resolved filter and address of one collection instance.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveFilter {
    filter: Value,
    url: String,
    params: TemplateParams,
    bound: Map<String, Value>,
}

impl EffectiveFilter {
    /// The resolved filter expression.
    pub fn filter(&self) -> &Value {
        &self.filter
    }

    /// The resolved store address, used as the namespace of the collection's records.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The params the filter was resolved with.
    pub fn params(&self) -> &TemplateParams {
        &self.params
    }

    /// Top-level filter fields whose declared value was a bound placeholder.
    ///
    /// For a declared `{ "users": "{user_id}" }` built with `user_id = 1` this is
    /// `{ "users": 1 }`. Models created through the collection receive these values.
    pub fn bound_attributes(&self) -> &Map<String, Value> {
        &self.bound
    }

    /// Parses the resolved filter into a backend query.
    pub fn to_query(&self) -> ModelResult<Query> {
        Ok(Query::filtered(parse_filter(&self.filter)?))
    }
}

/// Parses a JSON filter object into an expression. `None` means "match everything".
pub fn parse_filter(filter: &Value) -> ModelResult<Option<Expr>> {
    match filter {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(parse_object(map)?.simplify()),
        other => Err(ModelError::InvalidFilter(format!(
            "expected a filter object, found {other}"
        ))),
    }
}

fn parse_object(map: &Map<String, Value>) -> ModelResult<Expr> {
    let mut exprs = Vec::with_capacity(map.len());

    for (key, value) in map {
        match key.as_str() {
            "$and" => exprs.push(Expr::And(parse_list(key, value)?)),
            "$or" => exprs.push(Expr::Or(parse_list(key, value)?)),
            op if op.starts_with('$') => {
                return Err(ModelError::InvalidFilter(format!(
                    "unsupported top-level operator {op}"
                )));
            }
            field => exprs.extend(parse_field(field, value)?),
        }
    }

    Ok(Expr::And(exprs))
}

fn parse_list(key: &str, value: &Value) -> ModelResult<Vec<Expr>> {
    value
        .as_array()
        .ok_or_else(|| ModelError::InvalidFilter(format!("{key} expects an array of filters")))?
        .iter()
        .map(|item| match item {
            Value::Object(map) => parse_object(map),
            other => Err(ModelError::InvalidFilter(format!(
                "{key} expects filter objects, found {other}"
            ))),
        })
        .collect()
}

fn parse_field(field: &str, value: &Value) -> ModelResult<Vec<Expr>> {
    let operators = match value {
        Value::Object(map) => match is_operator_object(map)? {
            true => map,
            false => return Ok(vec![Expr::field(field, FieldOp::Eq, to_bson(value)?)]),
        },
        literal => return Ok(vec![Expr::field(field, FieldOp::Eq, to_bson(literal)?)]),
    };

    operators
        .iter()
        .map(|(op, operand)| match op.as_str() {
            "$exists" => operand
                .as_bool()
                .map(|should_exist| Expr::Exists(field.to_string(), should_exist))
                .ok_or_else(|| ModelError::InvalidFilter(format!("$exists on {field} expects a boolean"))),
            "$not" => {
                let inner = parse_field(field, operand)?;
                Ok(Expr::And(inner).simplify().unwrap_or(Expr::And(vec![])).not())
            }
            other => FieldOp::from_operator(other)
                .ok_or_else(|| ModelError::InvalidFilter(format!("unsupported operator {other} on {field}")))
                .and_then(|op| Ok(Expr::field(field, op, to_bson(operand)?))),
        })
        .collect()
}

/// An object is an operator object when all of its keys are `$`-prefixed.
///
/// Mixing operators and plain keys is rejected; an object with no operator keys is
/// compared literally.
fn is_operator_object(map: &Map<String, Value>) -> ModelResult<bool> {
    let operators = map.keys().filter(|k| k.starts_with('$')).count();

    match operators {
        0 => Ok(false),
        n if n == map.len() => Ok(true),
        _ => Err(ModelError::InvalidFilter(
            "operator objects cannot mix operators and fields".to_string(),
        )),
    }
}

fn to_bson(value: &Value) -> ModelResult<Bson> {
    Ok(serialize_to_bson(value)?)
}
