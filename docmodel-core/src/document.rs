//! Attribute bags and their conversion to and from store records.
//!
//! Models keep their attributes as an insertion-ordered JSON object. Backends store
//! BSON documents. The helpers here convert between the two and derive the string key
//! a record is addressed by.

use bson::{Bson, de::deserialize_from_bson, ser::serialize_to_bson};
use serde_json::{Map, Value};

use crate::{
    backend::ID_FIELD,
    error::{ModelError, ModelResult},
};

/// The attribute bag of a model.
pub type Attributes = Map<String, Value>;

/// Converts an attribute bag into a BSON record.
pub fn to_record(attributes: &Attributes) -> ModelResult<Bson> {
    match serialize_to_bson(attributes)? {
        record @ Bson::Document(_) => Ok(record),
        other => Err(ModelError::InvalidDocument(format!(
            "attributes serialized to {other} instead of a document"
        ))),
    }
}

/// Converts a BSON record into an attribute bag.
pub fn from_record(record: Bson) -> ModelResult<Attributes> {
    match deserialize_from_bson::<Value>(record)? {
        Value::Object(attributes) => Ok(attributes),
        other => Err(ModelError::InvalidDocument(format!(
            "expected a record object, found {other}"
        ))),
    }
}

/// Returns the string key of an identity value.
///
/// Strings are used as is and integers through their decimal form. Any other value
/// cannot address a record.
pub fn id_key(id: &Value) -> Option<String> {
    match id {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

/// Returns the string key of a BSON record, if it carries a usable id.
pub fn record_key(record: &Bson) -> Option<String> {
    match record.as_document()?.get(ID_FIELD)? {
        Bson::String(s) if !s.is_empty() => Some(s.clone()),
        Bson::Int32(n) => Some(n.to_string()),
        Bson::Int64(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde_json::json;

    #[test]
    fn converts_attributes_both_ways() {
        let attributes = json!({ "title": "foo", "test": "1", "users": 1, "tags": ["a"] })
            .as_object()
            .cloned()
            .unwrap();

        let record = to_record(&attributes).unwrap();
        assert_eq!(record.as_document().unwrap().get_str("title").unwrap(), "foo");

        assert_eq!(from_record(record).unwrap(), attributes);
    }

    #[test]
    fn rejects_non_document_records() {
        assert!(matches!(from_record(Bson::Int32(3)), Err(ModelError::InvalidDocument(_))));
    }

    #[test]
    fn derives_keys() {
        assert_eq!(id_key(&json!("abc")), Some("abc".to_string()));
        assert_eq!(id_key(&json!(1)), Some("1".to_string()));
        assert_eq!(id_key(&json!("")), None);
        assert_eq!(id_key(&json!(1.5)), None);
        assert_eq!(id_key(&json!(null)), None);

        assert_eq!(record_key(&Bson::Document(doc! { "id": "abc" })), Some("abc".to_string()));
        assert_eq!(record_key(&Bson::Document(doc! { "id": 7 })), Some("7".to_string()));
        assert_eq!(record_key(&Bson::Document(doc! { "name": "x" })), None);
    }
}
