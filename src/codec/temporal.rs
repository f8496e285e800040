//! Timestamp and time-of-day columns.
//!
//! Both are naive: no timezone conversion happens in either direction.

use chrono::{NaiveDateTime, NaiveTime};

use super::{ColumnCodec, DecodeError, Decodable, EncodeError};
use crate::value::{Value, SQLITE_TIMESTAMP_FORMAT};

const TIMESTAMP_FORMATS: &[&str] = &[SQLITE_TIMESTAMP_FORMAT, "%Y-%m-%dT%H:%M:%S%.f"];

/// Codec for `TIMESTAMP` columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimestampCodec;

impl ColumnCodec for TimestampCodec {
    type Value = NaiveDateTime;

    fn sql_type(&self) -> String {
        "TIMESTAMP".to_string()
    }

    fn encode(&self, value: &NaiveDateTime) -> Result<Value, EncodeError> {
        Ok(Value::Timestamp(*value))
    }

    /// Timestamps come back natively from PostgreSQL and as text from
    /// SQLite and the simple query protocol.
    fn decode(&self, input: Decodable<NaiveDateTime>) -> Result<NaiveDateTime, DecodeError> {
        match input {
            Decodable::Native(value) | Decodable::Wire(Value::Timestamp(value)) => Ok(value),
            Decodable::Wire(wire) => wire
                .text_payload(|tag| tag.eq_ignore_ascii_case("timestamp"))
                .and_then(|text| {
                    TIMESTAMP_FORMATS
                        .iter()
                        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
                })
                .ok_or_else(|| DecodeError::invalid(&wire, "timestamp")),
        }
    }

    /// Quoted but not escaped.
    fn to_literal(&self, value: &NaiveDateTime) -> Result<String, EncodeError> {
        Ok(format!("'{}'", value))
    }
}

/// Codec for `time` columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeCodec;

impl ColumnCodec for TimeCodec {
    type Value = NaiveTime;

    fn sql_type(&self) -> String {
        "time".to_string()
    }

    fn encode(&self, value: &NaiveTime) -> Result<Value, EncodeError> {
        Ok(Value::Time(*value))
    }

    fn decode(&self, input: Decodable<NaiveTime>) -> Result<NaiveTime, DecodeError> {
        match input {
            Decodable::Native(value) | Decodable::Wire(Value::Time(value)) => Ok(value),
            Decodable::Wire(wire) => wire
                .text_payload(|tag| tag.eq_ignore_ascii_case("time"))
                .and_then(|text| NaiveTime::parse_from_str(text, "%H:%M:%S%.f").ok())
                .ok_or_else(|| DecodeError::invalid(&wire, "time")),
        }
    }
}
