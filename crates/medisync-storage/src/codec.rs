//! Conversion between typed entities and stored JSON documents.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::StorageError;

/// Encode an entity as a document. The result must be a JSON object.
pub fn encode<T: Serialize>(entity: &T) -> Result<Value, StorageError> {
    match serde_json::to_value(entity)? {
        doc @ Value::Object(_) => Ok(doc),
        other => Err(StorageError::invalid_document(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Decode a stored document into an entity.
pub fn decode<T: DeserializeOwned>(doc: Value) -> Result<T, StorageError> {
    serde_json::from_value(doc).map_err(|e| StorageError::invalid_document(e.to_string()))
}

pub fn decode_all<T: DeserializeOwned>(docs: Vec<Value>) -> Result<Vec<T>, StorageError> {
    docs.into_iter().map(decode).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: String,
        qty: u32,
    }

    #[test]
    fn encode_requires_object() {
        assert!(encode(&Item { id: "a".into(), qty: 1 }).is_ok());
        assert!(matches!(
            encode(&42),
            Err(StorageError::InvalidDocument { .. })
        ));
    }

    #[test]
    fn decode_reports_shape_errors() {
        let item: Item = decode(json!({"id": "a", "qty": 2})).unwrap();
        assert_eq!(item.qty, 2);
        assert!(decode::<Item>(json!({"id": "a", "qty": -1})).is_err());
    }
}
