//! Minimal table description used by codecs and upserts.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{
    ColumnCodec, DecodeError, EncodeError, EnumCodec, GeographyCodec, JsonCodec, SqlEnum,
    TimeCodec, TimestampCodec,
};
use crate::value::Value;

/// Name and SQL type of a registered column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    name: String,
    columns: Vec<ColumnDef>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Add a column and hand back its typed handle.
    ///
    /// Registering a name twice replaces the earlier definition.
    pub fn register<C: ColumnCodec>(&mut self, column: Column<C>) -> Column<C> {
        let def = ColumnDef {
            name: column.name.clone(),
            sql_type: column.codec.sql_type(),
        };
        match self.columns.iter_mut().find(|c| c.name == def.name) {
            Some(existing) => *existing = def,
            None => self.columns.push(def),
        }
        column
    }

    /// Register a column whose type needs no codec (`integer`, `text`, ...).
    pub fn plain(&mut self, name: impl Into<String>, sql_type: impl Into<String>) -> &mut Self {
        let def = ColumnDef {
            name: name.into(),
            sql_type: sql_type.into(),
        };
        self.columns.retain(|c| c.name != def.name);
        self.columns.push(def);
        self
    }

    pub fn point(&mut self, name: &str) -> Column<GeographyCodec> {
        self.register(Column::new(name, GeographyCodec::default()))
    }

    pub fn timestamp(&mut self, name: &str) -> Column<TimestampCodec> {
        self.register(Column::new(name, TimestampCodec))
    }

    pub fn time(&mut self, name: &str) -> Column<TimeCodec> {
        self.register(Column::new(name, TimeCodec))
    }

    pub fn jsonb<T: Serialize + DeserializeOwned>(&mut self, name: &str) -> Column<JsonCodec<T>> {
        self.register(Column::new(name, JsonCodec::new()))
    }

    pub fn enumeration<E: SqlEnum>(&mut self, name: &str, enum_name: &str) -> Column<EnumCodec<E>> {
        self.register(Column::new(name, EnumCodec::new(enum_name)))
    }

    /// `CREATE TABLE` statement for the registered columns.
    pub fn create_sql(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.sql_type))
            .collect();
        format!("CREATE TABLE {} ({})", self.name, columns.join(", "))
    }
}

/// Typed handle to a column: its name plus the codec for its values.
pub struct Column<C> {
    name: String,
    codec: Arc<C>,
}

impl<C> Clone for Column<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            codec: Arc::clone(&self.codec),
        }
    }
}

impl<C: std::fmt::Debug> std::fmt::Debug for Column<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name)
            .field("codec", &self.codec)
            .finish()
    }
}

impl<C: ColumnCodec> Column<C> {
    pub fn new(name: impl Into<String>, codec: C) -> Self {
        Self {
            name: name.into(),
            codec: Arc::new(codec),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Column definition as used in `CREATE TABLE`.
    pub fn definition(&self) -> String {
        format!("{} {}", self.name, self.codec.sql_type())
    }

    pub fn encode(&self, value: &C::Value) -> Result<Value, EncodeError> {
        self.codec.encode(value)
    }

    pub fn encode_nullable(&self, value: Option<&C::Value>) -> Result<Value, EncodeError> {
        value.map_or(Ok(Value::Null), |v| self.codec.encode(v))
    }

    pub fn decode(&self, value: Value) -> Result<C::Value, DecodeError> {
        self.codec.decode_wire(value)
    }

    /// Decode, mapping SQL `NULL` to `None`.
    pub fn decode_nullable(&self, value: Value) -> Result<Option<C::Value>, DecodeError> {
        if value.is_null() {
            Ok(None)
        } else {
            self.codec.decode_wire(value).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::GeographyPoint;

    crate::sql_enum! {
        enum Kind { Shop, Cafe }
    }

    #[test]
    fn test_register_and_create_sql() {
        let mut places = Table::new("places");
        places.plain("id", "integer primary key");
        let location = places.point("location");
        places.enumeration::<Kind>("kind", "place_kind");
        places.jsonb::<Vec<String>>("tags");
        places.timestamp("opened_at");

        assert_eq!(location.definition(), "location geography(Point, 4326)");
        assert!(places.has_column("kind"));
        assert_eq!(
            places.create_sql(),
            "CREATE TABLE places (id integer primary key, location geography(Point, 4326), \
             kind place_kind_enum, tags jsonb, opened_at TIMESTAMP)"
        );
    }

    #[test]
    fn test_register_replaces_same_name() {
        let mut t = Table::new("t");
        t.time("at");
        t.timestamp("at");
        assert_eq!(t.columns().len(), 1);
        assert_eq!(t.columns()[0].sql_type, "TIMESTAMP");
    }

    #[test]
    fn test_nullable_column_values() {
        let column = Column::new("location", GeographyCodec::default());
        assert_eq!(column.encode_nullable(None).unwrap(), Value::Null);
        assert_eq!(column.decode_nullable(Value::Null).unwrap(), None);

        let point = GeographyPoint::new(1.0, 2.0);
        let wire = column.encode(&point).unwrap();
        assert_eq!(column.decode_nullable(wire).unwrap(), Some(point));
        assert!(column.decode(Value::Null).is_err());
    }
}
