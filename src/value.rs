//! Driver-neutral values.
//!
//! `Value` is what crosses the driver boundary in both directions: codecs
//! encode into it, query results decode out of it. Conversions to and from
//! the per-driver value types live here so the drivers stay independent.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::pg::PgValue;
use crate::sqlite::SqliteValue;

/// A value whose SQL type is named explicitly because the driver has no
/// native representation for it (`geography`, enum types, `jsonb`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedValue {
    pub type_name: String,
    pub value: String,
}

impl TaggedValue {
    pub fn new(type_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    Tagged(TaggedValue),
}

impl Value {
    pub fn tagged(type_name: impl Into<String>, value: impl Into<String>) -> Self {
        Value::Tagged(TaggedValue::new(type_name, value))
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Uuid(_) => "uuid",
            Value::Timestamp(_) => "timestamp",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Tagged(_) => "tagged",
        }
    }

    /// Borrow the payload of a text value, or of a tagged value whose type
    /// name `accepts_tag` allows.
    pub fn text_payload(&self, accepts_tag: impl Fn(&str) -> bool) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Tagged(t) if accepts_tag(&t.type_name) => Some(&t.value),
            _ => None,
        }
    }

    // ========================================================================
    // PostgreSQL
    // ========================================================================

    pub fn from_pg(value: PgValue) -> Self {
        match value {
            PgValue::Null => Value::Null,
            PgValue::Bool(b) => Value::Bool(b),
            PgValue::Int2(i) => Value::Int(i as i64),
            PgValue::Int4(i) => Value::Int(i as i64),
            PgValue::Int8(i) => Value::Int(i),
            PgValue::Float4(f) => Value::Float(f as f64),
            PgValue::Float8(f) => Value::Float(f),
            PgValue::Text(s) => Value::Text(s),
            PgValue::Bytea(b) => Value::Bytes(b),
            PgValue::Uuid(u) => Value::Uuid(uuid::Uuid::from_bytes(u)),
            // +/-infinity fall outside chrono's range and stay raw
            PgValue::Timestamp(us) => pg_timestamp(us).map_or(Value::Int(us), Value::Timestamp),
            PgValue::Date(days) => pg_date(days).map_or(Value::Int(days as i64), Value::Date),
            PgValue::Time(us) => pg_time(us).map_or(Value::Int(us), Value::Time),
            PgValue::Json(s) => Value::tagged("jsonb", s),
            PgValue::Typed { type_name, text } => Value::tagged(type_name, text),
            PgValue::Raw { data, .. } => Value::Bytes(data),
        }
    }

    pub fn into_pg(self) -> PgValue {
        match self {
            Value::Null => PgValue::Null,
            Value::Bool(b) => PgValue::Bool(b),
            Value::Int(i) => PgValue::Int8(i),
            Value::Float(f) => PgValue::Float8(f),
            Value::Text(s) => PgValue::Text(s),
            Value::Bytes(b) => PgValue::Bytea(b),
            Value::Uuid(u) => PgValue::Uuid(*u.as_bytes()),
            Value::Timestamp(ts) => PgValue::Timestamp(micros_since_pg_epoch(ts)),
            Value::Date(d) => PgValue::Date((d - pg_epoch().date()).num_days() as i32),
            Value::Time(t) => PgValue::Time(micros_since_midnight(t)),
            Value::Tagged(TaggedValue { type_name, value }) => match type_name.as_str() {
                "json" | "jsonb" => PgValue::Json(value),
                _ => PgValue::Typed {
                    type_name,
                    text: value,
                },
            },
        }
    }

    // ========================================================================
    // SQLite
    // ========================================================================

    pub fn from_sqlite(value: SqliteValue) -> Self {
        match value {
            SqliteValue::Null => Value::Null,
            SqliteValue::Integer(i) => Value::Int(i),
            SqliteValue::Real(f) => Value::Float(f),
            SqliteValue::Text(s) => Value::Text(s),
            SqliteValue::Blob(b) => Value::Bytes(b),
        }
    }

    /// SQLite has no native temporal, uuid or tagged types; those are stored
    /// as text in the formats SQLite's date functions understand.
    pub fn into_sqlite(self) -> SqliteValue {
        match self {
            Value::Null => SqliteValue::Null,
            Value::Bool(b) => SqliteValue::Integer(if b { 1 } else { 0 }),
            Value::Int(i) => SqliteValue::Integer(i),
            Value::Float(f) => SqliteValue::Real(f),
            Value::Text(s) => SqliteValue::Text(s),
            Value::Bytes(b) => SqliteValue::Blob(b),
            Value::Uuid(u) => SqliteValue::Text(u.hyphenated().to_string()),
            Value::Timestamp(ts) => SqliteValue::Text(ts.format(SQLITE_TIMESTAMP_FORMAT).to_string()),
            Value::Date(d) => SqliteValue::Text(d.format("%Y-%m-%d").to_string()),
            Value::Time(t) => SqliteValue::Text(t.format("%H:%M:%S%.f").to_string()),
            Value::Tagged(t) => SqliteValue::Text(t.value),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Value::Uuid(u) => write!(f, "{}", u),
            Value::Timestamp(ts) => write!(f, "{}", ts),
            Value::Date(d) => write!(f, "{}", d),
            Value::Time(t) => write!(f, "{}", t),
            Value::Tagged(t) => write!(f, "{}", t.value),
        }
    }
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    i32 => Int,
    i64 => Int,
    f64 => Float,
    String => Text,
    &str => Text,
    Vec<u8> => Bytes,
    uuid::Uuid => Uuid,
    NaiveDateTime => Timestamp,
    NaiveDate => Date,
    NaiveTime => Time,
    TaggedValue => Tagged,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

// ============================================================================
// Temporal helpers
// ============================================================================

/// Format used for timestamps stored as SQLite text.
pub(crate) const SQLITE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// 2000-01-01 00:00:00, the zero point of PostgreSQL's binary temporal types.
fn pg_epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

fn pg_timestamp(micros: i64) -> Option<NaiveDateTime> {
    pg_epoch().checked_add_signed(chrono::Duration::microseconds(micros))
}

fn pg_date(days: i32) -> Option<NaiveDate> {
    pg_epoch()
        .date()
        .checked_add_signed(chrono::Duration::days(days as i64))
}

fn pg_time(micros: i64) -> Option<NaiveTime> {
    let secs = u32::try_from(micros.div_euclid(1_000_000)).ok()?;
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
}

fn micros_since_pg_epoch(ts: NaiveDateTime) -> i64 {
    let delta = ts - pg_epoch();
    delta
        .num_microseconds()
        .unwrap_or(if delta < chrono::Duration::zero() { i64::MIN } else { i64::MAX })
}

fn micros_since_midnight(t: NaiveTime) -> i64 {
    t.num_seconds_from_midnight() as i64 * 1_000_000 + (t.nanosecond() / 1_000) as i64
}
