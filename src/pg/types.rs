//! PostgreSQL type encoding and decoding.
//!
//! Built-in scalar types travel in binary format. Everything else (PostGIS
//! geography, user-defined enums, ...) is exchanged as text with an
//! unspecified parameter type so the server resolves it from context.
//! Reference: https://www.postgresql.org/docs/current/protocol-overview.html#PROTOCOL-FORMAT-CODES

use super::error::{PgError, PgResult};
use super::protocol::Format;

// ============================================================================
// Type OIDs
// ============================================================================

/// PostgreSQL type object identifiers (OIDs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Oid(pub i32);

impl Oid {
    /// Let the server infer the parameter type.
    pub const UNSPECIFIED: Oid = Oid(0);

    pub const BOOL: Oid = Oid(16);
    pub const BYTEA: Oid = Oid(17);
    pub const CHAR: Oid = Oid(18);
    pub const NAME: Oid = Oid(19);
    pub const INT8: Oid = Oid(20);
    pub const INT2: Oid = Oid(21);
    pub const INT4: Oid = Oid(23);
    pub const TEXT: Oid = Oid(25);
    pub const JSON: Oid = Oid(114);
    pub const FLOAT4: Oid = Oid(700);
    pub const FLOAT8: Oid = Oid(701);
    pub const BPCHAR: Oid = Oid(1042);
    pub const VARCHAR: Oid = Oid(1043);
    pub const DATE: Oid = Oid(1082);
    pub const TIME: Oid = Oid(1083);
    pub const TIMESTAMP: Oid = Oid(1114);
    pub const TIMESTAMPTZ: Oid = Oid(1184);
    pub const TIMETZ: Oid = Oid(1266);
    pub const NUMERIC: Oid = Oid(1700);
    pub const UUID: Oid = Oid(2950);
    pub const JSONB: Oid = Oid(3802);

    #[inline]
    pub fn from_i32(oid: i32) -> Self {
        Oid(oid)
    }

    #[inline]
    pub fn as_i32(self) -> i32 {
        self.0
    }

    /// Check if this is a text-like type
    pub fn is_text_like(self) -> bool {
        matches!(
            self,
            Oid::TEXT | Oid::VARCHAR | Oid::BPCHAR | Oid::CHAR | Oid::NAME
        )
    }

    /// Check if this is an integer type
    pub fn is_integer(self) -> bool {
        matches!(self, Oid::INT2 | Oid::INT4 | Oid::INT8)
    }

    /// Check if this is a floating point type
    pub fn is_float(self) -> bool {
        matches!(self, Oid::FLOAT4 | Oid::FLOAT8)
    }

    /// Whether `decode_binary` understands this type.
    ///
    /// Result columns of any other type are requested in text format.
    pub fn has_binary_decoder(self) -> bool {
        self.is_text_like()
            || self.is_integer()
            || self.is_float()
            || matches!(
                self,
                Oid::BOOL
                    | Oid::BYTEA
                    | Oid::UUID
                    | Oid::DATE
                    | Oid::TIME
                    | Oid::TIMESTAMP
                    | Oid::TIMESTAMPTZ
                    | Oid::JSON
                    | Oid::JSONB
            )
    }

    /// Wire format to request for a result column of this type.
    pub fn result_format(self) -> Format {
        if self.has_binary_decoder() {
            Format::Binary
        } else {
            Format::Text
        }
    }
}

// ============================================================================
// PostgreSQL Values
// ============================================================================

/// A PostgreSQL value with type information.
#[derive(Debug, Clone, PartialEq)]
pub enum PgValue {
    Null,
    Bool(bool),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    Text(String),
    Bytea(Vec<u8>),
    Uuid([u8; 16]),
    /// Microseconds since 2000-01-01 00:00:00
    Timestamp(i64),
    /// Days since 2000-01-01
    Date(i32),
    /// Microseconds since midnight
    Time(i64),
    Json(String),
    /// Text payload for a type the driver has no binary codec for
    /// (`geography`, enum types, ...). Sent with an unspecified OID.
    Typed { type_name: String, text: String },
    /// Binary payload of a type we don't handle specially
    Raw { oid: Oid, data: Vec<u8> },
}

impl PgValue {
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, PgValue::Null)
    }

    /// Parameter format this value is sent in.
    pub fn format(&self) -> Format {
        match self {
            PgValue::Typed { .. } => Format::Text,
            _ => Format::Binary,
        }
    }

    /// Encode this value in its wire format (see [`PgValue::format`]).
    pub fn encode(&self) -> Vec<u8> {
        match self {
            PgValue::Null => vec![],
            PgValue::Bool(v) => vec![u8::from(*v)],
            PgValue::Int2(v) => v.to_be_bytes().to_vec(),
            PgValue::Int4(v) => v.to_be_bytes().to_vec(),
            PgValue::Int8(v) => v.to_be_bytes().to_vec(),
            PgValue::Float4(v) => v.to_be_bytes().to_vec(),
            PgValue::Float8(v) => v.to_be_bytes().to_vec(),
            PgValue::Text(v) => v.as_bytes().to_vec(),
            PgValue::Bytea(v) => v.clone(),
            PgValue::Uuid(v) => v.to_vec(),
            PgValue::Timestamp(v) => v.to_be_bytes().to_vec(),
            PgValue::Date(v) => v.to_be_bytes().to_vec(),
            PgValue::Time(v) => v.to_be_bytes().to_vec(),
            PgValue::Json(v) => {
                // JSONB binary format: version byte followed by the text
                let mut buf = Vec::with_capacity(v.len() + 1);
                buf.push(1);
                buf.extend_from_slice(v.as_bytes());
                buf
            }
            PgValue::Typed { text, .. } => text.as_bytes().to_vec(),
            PgValue::Raw { data, .. } => data.clone(),
        }
    }

    /// Get the OID for this value's type
    pub fn type_oid(&self) -> Oid {
        match self {
            PgValue::Null | PgValue::Typed { .. } => Oid::UNSPECIFIED,
            PgValue::Bool(_) => Oid::BOOL,
            PgValue::Int2(_) => Oid::INT2,
            PgValue::Int4(_) => Oid::INT4,
            PgValue::Int8(_) => Oid::INT8,
            PgValue::Float4(_) => Oid::FLOAT4,
            PgValue::Float8(_) => Oid::FLOAT8,
            PgValue::Text(_) => Oid::TEXT,
            PgValue::Bytea(_) => Oid::BYTEA,
            PgValue::Uuid(_) => Oid::UUID,
            PgValue::Timestamp(_) => Oid::TIMESTAMP,
            PgValue::Date(_) => Oid::DATE,
            PgValue::Time(_) => Oid::TIME,
            PgValue::Json(_) => Oid::JSONB,
            PgValue::Raw { oid, .. } => *oid,
        }
    }

    /// Decode a column value received in `format`.
    pub fn decode(oid: Oid, format: Format, data: &[u8]) -> PgResult<Self> {
        match format {
            Format::Binary => Self::decode_binary(oid, data),
            Format::Text => Self::decode_text(oid, data),
        }
    }

    /// Decode a value from binary format.
    pub fn decode_binary(oid: Oid, data: &[u8]) -> PgResult<Self> {
        match oid {
            Oid::BOOL => match data.first() {
                Some(b) => Ok(PgValue::Bool(*b != 0)),
                None => Err(PgError::Type("Empty data for BOOL".to_string())),
            },
            Oid::INT2 => Ok(PgValue::Int2(i16::from_be_bytes(fixed(data, "INT2")?))),
            Oid::INT4 => Ok(PgValue::Int4(i32::from_be_bytes(fixed(data, "INT4")?))),
            Oid::INT8 => Ok(PgValue::Int8(i64::from_be_bytes(fixed(data, "INT8")?))),
            Oid::FLOAT4 => Ok(PgValue::Float4(f32::from_be_bytes(fixed(data, "FLOAT4")?))),
            Oid::FLOAT8 => Ok(PgValue::Float8(f64::from_be_bytes(fixed(data, "FLOAT8")?))),

            _ if oid.is_text_like() => Ok(PgValue::Text(utf8(data, "TEXT")?)),

            Oid::BYTEA => Ok(PgValue::Bytea(data.to_vec())),
            Oid::UUID => Ok(PgValue::Uuid(fixed(data, "UUID")?)),
            Oid::TIMESTAMP | Oid::TIMESTAMPTZ => Ok(PgValue::Timestamp(i64::from_be_bytes(
                fixed(data, "TIMESTAMP")?,
            ))),
            Oid::DATE => Ok(PgValue::Date(i32::from_be_bytes(fixed(data, "DATE")?))),
            Oid::TIME => Ok(PgValue::Time(i64::from_be_bytes(fixed(data, "TIME")?))),

            Oid::JSON => Ok(PgValue::Json(utf8(data, "JSON")?)),
            Oid::JSONB => {
                // JSONB has a version byte prefix
                let body = data.get(1..).unwrap_or_default();
                Ok(PgValue::Json(utf8(body, "JSONB")?))
            }

            _ => Ok(PgValue::Raw {
                oid,
                data: data.to_vec(),
            }),
        }
    }

    /// Decode from text format (simple query protocol and non-builtin types).
    pub fn decode_text(oid: Oid, data: &[u8]) -> PgResult<Self> {
        let text = utf8(data, "text value")?;

        match oid {
            Oid::BOOL => Ok(PgValue::Bool(text == "t" || text == "true" || text == "1")),

            Oid::INT2 => text
                .parse::<i16>()
                .map(PgValue::Int2)
                .map_err(|e| PgError::Type(format!("Invalid INT2: {}", e))),

            Oid::INT4 => text
                .parse::<i32>()
                .map(PgValue::Int4)
                .map_err(|e| PgError::Type(format!("Invalid INT4: {}", e))),

            Oid::INT8 => text
                .parse::<i64>()
                .map(PgValue::Int8)
                .map_err(|e| PgError::Type(format!("Invalid INT8: {}", e))),

            Oid::FLOAT4 => text
                .parse::<f32>()
                .map(PgValue::Float4)
                .map_err(|e| PgError::Type(format!("Invalid FLOAT4: {}", e))),

            Oid::FLOAT8 => text
                .parse::<f64>()
                .map(PgValue::Float8)
                .map_err(|e| PgError::Type(format!("Invalid FLOAT8: {}", e))),

            Oid::JSON | Oid::JSONB => Ok(PgValue::Json(text)),

            // Default: treat as text
            _ => Ok(PgValue::Text(text)),
        }
    }
}

/// Copy a fixed-width binary value, rejecting a length mismatch.
fn fixed<const N: usize>(data: &[u8], type_name: &str) -> PgResult<[u8; N]> {
    data.try_into()
        .map_err(|_| PgError::Type(format!("Invalid {} length: {}", type_name, data.len())))
}

fn utf8(data: &[u8], what: &str) -> PgResult<String> {
    String::from_utf8(data.to_vec())
        .map_err(|e| PgError::Type(format!("Invalid UTF-8 in {}: {}", what, e)))
}
