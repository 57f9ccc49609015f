// src/object.rs

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A generic record fetched from a Parse class: the server-managed
/// bookkeeping fields plus a key-value map of everything else.
///
/// Typed access goes through [`ParseObject::get`], which deserializes
/// the stored JSON value on demand.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ParseObject {
    #[serde(skip_serializing_if = "Option::is_none", rename = "objectId")]
    pub object_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "createdAt")]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "updatedAt")]
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(flatten)]
    pub fields: HashMap<String, Value>,
}

impl ParseObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieves a typed field value. Logs when the key is absent or
    /// the stored value does not deserialize as `T`, mirroring the
    /// lookup-miss diagnostics callers rely on when schemas drift.
    pub fn get<T: DeserializeOwned>(&self, field_name: &str) -> Option<T> {
        let value = self
            .fields
            .get(field_name)
            .and_then(|v| serde_json::from_value(v.clone()).ok());
        if value.is_none() {
            log::warn!(
                "No property found in object {} with key={}",
                self.object_id.as_deref().unwrap_or("noObjectId"),
                field_name
            );
        }
        value
    }

    pub fn set<T: Serialize>(&mut self, field_name: &str, value: T) {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.fields.insert(field_name.to_string(), json_value);
        }
    }

    /// Textual representation of the record, the value of its `name`
    /// field by convention.
    pub fn item_description(&self) -> String {
        self.get::<String>("name").unwrap_or_default()
    }
}

impl PartialEq for ParseObject {
    /// Two records are the same record when their `objectId`s match.
    fn eq(&self, other: &Self) -> bool {
        self.object_id == other.object_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_get_and_set() {
        let mut object = ParseObject::new();
        object.set("score", 42);
        object.set("name", "first");

        assert_eq!(object.get::<i64>("score"), Some(42));
        assert_eq!(object.get::<String>("name"), Some("first".to_string()));
        assert_eq!(object.get::<String>("missing"), None);
        assert_eq!(object.item_description(), "first");
    }

    #[test]
    fn equality_is_by_object_id() {
        let mut a = ParseObject::new();
        a.object_id = Some("abc".into());
        a.set("score", 1);
        let mut b = ParseObject::new();
        b.object_id = Some("abc".into());
        b.set("score", 2);

        assert_eq!(a, b);
    }

    #[test]
    fn deserializes_server_payload() {
        let object: ParseObject = serde_json::from_value(json!({
            "objectId": "xyz",
            "createdAt": "2018-01-25T10:00:00.000Z",
            "updatedAt": "2018-01-26T10:00:00.000Z",
            "name": "test",
            "score": 7
        }))
        .expect("payload should deserialize");

        assert_eq!(object.object_id.as_deref(), Some("xyz"));
        assert!(object.created_at.is_some());
        assert_eq!(object.get::<i64>("score"), Some(7));
    }
}
