//! Field-level projection of models for output.
//!
//! [`ProjectionOptions`] carries an optional allow-list (`only_fields`) and a
//! deny-list (`remove_fields`). With an allow-list, output holds exactly the listed
//! fields the model actually has, in allow-list order. A model type whose default
//! allow-list omits `id` therefore never emits its identity.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::Attributes;

/// Include/exclude rules applied when rendering a model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionOptions {
    /// Fields to include. `None` includes every attribute, `id` included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_fields: Option<IndexSet<String>>,
    /// Fields to drop after the allow-list is applied.
    #[serde(default, skip_serializing_if = "IndexSet::is_empty")]
    pub remove_fields: IndexSet<String>,
}

impl ProjectionOptions {
    /// Renders every attribute.
    pub fn include_all() -> Self {
        Self::default()
    }

    /// Renders only the given fields, in the given order.
    pub fn only<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            only_fields: Some(fields.into_iter().map(Into::into).collect()),
            remove_fields: IndexSet::new(),
        }
    }

    /// Adds fields that are never rendered.
    pub fn without<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.remove_fields
            .extend(fields.into_iter().map(Into::into));
        self
    }

    /// Whether `field` can appear in the output of these options.
    pub fn includes(&self, field: &str) -> bool {
        let allowed = self
            .only_fields
            .as_ref()
            .is_none_or(|only| only.contains(field));

        allowed && !self.remove_fields.contains(field)
    }
}

/// Renders `attributes` under `options` as a plain JSON object.
pub fn project(attributes: &Attributes, options: &ProjectionOptions) -> Value {
    let projected: Map<String, Value> = match &options.only_fields {
        Some(only) => only
            .iter()
            .filter(|field| !options.remove_fields.contains(*field))
            .filter_map(|field| {
                attributes
                    .get(field)
                    .map(|value| (field.clone(), value.clone()))
            })
            .collect(),
        None => attributes
            .iter()
            .filter(|(field, _)| !options.remove_fields.contains(*field))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect(),
    };

    Value::Object(projected)
}

/// Something that can be rendered as JSON under a projection.
///
/// Models and collections implement this; response utilities render any
/// `Projectable` resource. Passing `None` uses the resource's default projection.
pub trait Projectable: Send + Sync {
    fn project(&self, options: Option<&ProjectionOptions>) -> Value;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attributes() -> Attributes {
        json!({ "id": 1, "title": "foo", "test": "abc", "secret": "x" })
            .as_object()
            .cloned()
            .unwrap()
    }

    #[test]
    fn includes_everything_without_allow_list() {
        let out = project(&attributes(), &ProjectionOptions::include_all());
        assert_eq!(out, Value::Object(attributes()));
    }

    #[test]
    fn allow_list_orders_and_skips_missing() {
        let options = ProjectionOptions::only(["test", "missing", "title"]);
        let out = project(&attributes(), &options);

        assert_eq!(out, json!({ "test": "abc", "title": "foo" }));
        assert_eq!(
            out.as_object().unwrap().keys().collect::<Vec<_>>(),
            vec!["test", "title"]
        );
        assert!(out.get("id").is_none());
        assert!(out.get("missing").is_none());
    }

    #[test]
    fn remove_fields_apply_with_and_without_allow_list() {
        let out = project(&attributes(), &ProjectionOptions::include_all().without(["secret"]));
        assert_eq!(out, json!({ "id": 1, "title": "foo", "test": "abc" }));

        let out = project(&attributes(), &ProjectionOptions::only(["id", "title"]).without(["id"]));
        assert_eq!(out, json!({ "title": "foo" }));
    }

    #[test]
    fn projection_does_not_mutate_source() {
        let source = attributes();
        let _ = project(&source, &ProjectionOptions::only(["title"]));
        assert_eq!(source, attributes());
    }

    #[test]
    fn deserializes_camel_case_options() {
        let options: ProjectionOptions =
            serde_json::from_value(json!({ "onlyFields": ["title", "test"] })).unwrap();

        assert!(options.includes("title"));
        assert!(!options.includes("id"));
    }
}
