//! Column codecs: mapping application values to and from [`Value`].
//!
//! Each codec pairs an SQL type name with an encoder and a decoder. Encoding
//! validates before anything reaches the wire; decoding accepts either a
//! value that is already in application form ([`Decodable::Native`]) or a
//! value read from the database ([`Decodable::Wire`]).

mod enumeration;
mod geography;
mod json;
mod temporal;

pub use enumeration::{EnumCodec, SqlEnum};
pub use geography::{GeographyCodec, GeographyPoint, DEFAULT_SRID};
pub use json::JsonCodec;
pub use temporal::{TimeCodec, TimestampCodec};

use thiserror::Error;

use crate::value::Value;

/// Failure to turn an application value into a wire value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("{value} is not a valid {target}")]
    Invalid { value: String, target: String },

    #[error("cannot serialize JSON: {0}")]
    Json(String),
}

/// Failure to turn a wire value into an application value.
///
/// Carries the offending input so the failure can be diagnosed without
/// running the query again.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("{value} is not a valid {target} (got {kind})")]
    Invalid {
        value: String,
        /// Variant of the wire value, see [`Value::kind`].
        kind: &'static str,
        target: String,
    },

    #[error("cannot parse JSON: {raw}")]
    Json { raw: String, reason: String },
}

impl DecodeError {
    pub(crate) fn invalid(value: &Value, target: impl Into<String>) -> Self {
        DecodeError::Invalid {
            value: value.to_string(),
            kind: value.kind(),
            target: target.into(),
        }
    }
}

/// Input to [`ColumnCodec::decode`].
#[derive(Debug, Clone, PartialEq)]
pub enum Decodable<T> {
    /// Already an application value, passed through unchanged.
    Native(T),
    /// As read from the database.
    Wire(Value),
}

impl<T> From<Value> for Decodable<T> {
    fn from(value: Value) -> Self {
        Decodable::Wire(value)
    }
}

pub trait ColumnCodec: Send + Sync {
    type Value;

    /// Column type used in DDL.
    fn sql_type(&self) -> String;

    fn encode(&self, value: &Self::Value) -> Result<Value, EncodeError>;

    fn decode(&self, input: Decodable<Self::Value>) -> Result<Self::Value, DecodeError>;

    fn decode_wire(&self, value: Value) -> Result<Self::Value, DecodeError> {
        self.decode(Decodable::Wire(value))
    }

    /// Render `value` as an SQL literal for embedding in statement text.
    fn to_literal(&self, value: &Self::Value) -> Result<String, EncodeError> {
        Ok(literal(&self.encode(value)?))
    }
}

/// Render a wire value as an SQL literal, doubling embedded single quotes.
pub fn literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bytes(b) => {
            let hex: String = b.iter().map(|byte| format!("{:02x}", byte)).collect();
            format!("X'{}'", hex)
        }
        other => quote(&other.to_string()),
    }
}

pub(crate) fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literals() {
        assert_eq!(literal(&Value::Null), "NULL");
        assert_eq!(literal(&Value::Int(-3)), "-3");
        assert_eq!(literal(&Value::Text("O'Brien".into())), "'O''Brien'");
        assert_eq!(literal(&Value::Bytes(vec![0xab, 0x01])), "X'ab01'");
        assert_eq!(literal(&Value::tagged("mood_enum", "SAD")), "'SAD'");
    }

    #[test]
    fn test_decode_error_names_value_and_target() {
        let err = DecodeError::invalid(&Value::Int(7), "geography point");
        assert_eq!(err.to_string(), "7 is not a valid geography point (got int)");
    }
}
