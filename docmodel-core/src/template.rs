//! Placeholder substitution for filter expressions and store addresses.
//!
//! A placeholder token is a string value of the exact form `{identifier}`. When a
//! collection is constructed, every token whose identifier is bound in the supplied
//! [`TemplateParams`] is replaced by the bound value, keeping the value's native JSON
//! type. There is no partial-string interpolation in filters: `"user-{id}"` is left as is.
//!
//! ```ignore
//! use docmodel::template::{resolve, TemplateParams};
//! use serde_json::json;
//!
//! let params = TemplateParams::new().with("platforms", json!(["android"]));
//! let filter = resolve(&json!({ "platforms": { "$in": "{platforms}" } }), &params);
//!
//! assert_eq!(filter, json!({ "platforms": { "$in": ["android"] } }));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Named values bound to placeholder identifiers.
///
/// Params are supplied once when a collection or templated model is built and are
/// not changed afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateParams(Map<String, Value>);

impl TemplateParams {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Binds `name` to `value`, returning the extended set.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Returns the value bound to `name`, if any.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<Map<String, Value>> for TemplateParams {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for TemplateParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Returns the identifier of a placeholder token, or `None` if `value` is not one.
///
/// The whole string must be the token: braces at both ends and a non-empty
/// identifier containing no further braces.
pub fn placeholder_name(value: &str) -> Option<&str> {
    let name = value.strip_prefix('{')?.strip_suffix('}')?;

    if name.is_empty() || name.contains(['{', '}']) {
        return None;
    }

    Some(name)
}

/// Substitutes every bound placeholder in `expr`, returning a new expression.
///
/// Objects are walked value by value (keys are never substituted) and arrays element
/// by element. A placeholder whose identifier is not bound is kept verbatim.
pub fn resolve(expr: &Value, params: &TemplateParams) -> Value {
    match expr {
        Value::String(s) => match placeholder_name(s) {
            Some(name) => match params.get(name) {
                Some(bound) => bound.clone(),
                None => {
                    debug!(placeholder = name, "no value bound for placeholder, leaving token in place");
                    expr.clone()
                }
            },
            None => expr.clone(),
        },
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve(item, params))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve(v, params)))
                .collect(),
        ),
        _ => expr.clone(),
    }
}

/// Resolves `{identifier}` path segments of a store address such as `users/{user_id}`.
///
/// Only whole segments are substituted. Strings are inserted verbatim, numbers and
/// booleans through their display form. Any other bound value, a string containing
/// `/`, or an unbound identifier leaves the segment untouched.
pub fn resolve_path(template: &str, params: &TemplateParams) -> String {
    template
        .split('/')
        .map(|segment| {
            placeholder_name(segment)
                .and_then(|name| params.get(name))
                .and_then(path_segment)
                .unwrap_or_else(|| segment.to_string())
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn path_segment(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if s.contains('/') => {
            debug!(value = %s, "path value spans several segments, leaving token in place");
            None
        }
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
