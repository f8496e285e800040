//! JSON documents stored as `jsonb`.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{quote, ColumnCodec, DecodeError, Decodable, EncodeError};
use crate::value::Value;

/// Codec for a `jsonb` column holding a `T`.
///
/// `T` may be any serde type, including collections such as `Vec<Item>`.
pub struct JsonCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonCodec<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonCodec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonCodec")
            .field("target", &std::any::type_name::<T>())
            .finish()
    }
}

fn parse<T: DeserializeOwned>(raw: &str) -> Result<T, DecodeError> {
    serde_json::from_str(raw).map_err(|e| DecodeError::Json {
        raw: raw.to_string(),
        reason: e.to_string(),
    })
}

impl<T: Serialize + DeserializeOwned> ColumnCodec for JsonCodec<T> {
    type Value = T;

    fn sql_type(&self) -> String {
        "jsonb".to_string()
    }

    fn encode(&self, value: &T) -> Result<Value, EncodeError> {
        let text = serde_json::to_string(value).map_err(|e| EncodeError::Json(e.to_string()))?;
        Ok(Value::tagged("jsonb", text))
    }

    fn decode(&self, input: Decodable<T>) -> Result<T, DecodeError> {
        match input {
            Decodable::Native(value) => Ok(value),
            Decodable::Wire(Value::Text(raw)) => parse(&raw),
            Decodable::Wire(Value::Tagged(tagged)) if is_json_tag(&tagged.type_name) => {
                parse(&tagged.value)
            }
            Decodable::Wire(Value::Bytes(bytes)) => parse(&String::from_utf8_lossy(&bytes)),
            Decodable::Wire(wire) => Err(DecodeError::invalid(&wire, "jsonb")),
        }
    }

    fn to_literal(&self, value: &T) -> Result<String, EncodeError> {
        let text = serde_json::to_string(value).map_err(|e| EncodeError::Json(e.to_string()))?;
        Ok(quote(&text))
    }
}

fn is_json_tag(type_name: &str) -> bool {
    type_name.eq_ignore_ascii_case("jsonb") || type_name.eq_ignore_ascii_case("json")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        name: String,
        value: i64,
    }

    fn item() -> Item {
        Item {
            name: "x".to_string(),
            value: 1,
        }
    }

    #[test]
    fn test_round_trip() {
        let codec = JsonCodec::<Item>::new();
        assert_eq!(codec.sql_type(), "jsonb");

        let wire = codec.encode(&item()).unwrap();
        assert_eq!(wire, Value::tagged("jsonb", r#"{"name":"x","value":1}"#));
        assert_eq!(codec.decode_wire(wire).unwrap(), item());
    }

    #[test]
    fn test_foreign_tag_rejected() {
        let codec = JsonCodec::<Item>::new();
        assert!(codec
            .decode_wire(Value::tagged("json", r#"{"name":"x","value":1}"#))
            .is_ok());
        assert!(matches!(
            codec.decode_wire(Value::tagged("geography", r#"{"name":"x","value":1}"#)),
            Err(DecodeError::Invalid { kind: "tagged", .. })
        ));
    }

    #[test]
    fn test_native_passes_through() {
        let codec = JsonCodec::<Item>::new();
        assert_eq!(codec.decode(Decodable::Native(item())).unwrap(), item());
    }

    #[test]
    fn test_malformed_json_keeps_raw_text() {
        let codec = JsonCodec::<Item>::new();
        let err = codec
            .decode_wire(Value::tagged("jsonb", "{not json"))
            .unwrap_err();

        assert!(matches!(err, DecodeError::Json { ref raw, .. } if raw == "{not json"));
        assert_eq!(err.to_string(), "cannot parse JSON: {not json");
    }

    #[test]
    fn test_collection_target() {
        let codec = JsonCodec::<Vec<Item>>::new();
        let items = vec![item(), Item { name: "y".into(), value: 2 }];
        let wire = codec.encode(&items).unwrap();
        assert_eq!(codec.decode_wire(wire).unwrap(), items);

        // SQLite hands jsonb back as plain text
        assert_eq!(
            codec.decode_wire(Value::Text(r#"[{"name":"x","value":1}]"#.into())).unwrap(),
            vec![item()]
        );
    }

    #[test]
    fn test_literal_escapes_quotes() {
        let codec = JsonCodec::<Item>::new();
        let literal = codec
            .to_literal(&Item {
                name: "it's".into(),
                value: 2,
            })
            .unwrap();
        assert_eq!(literal, r#"'{"name":"it''s","value":2}'"#);
    }
}
