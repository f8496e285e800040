//! Enumerations stored in native database enum types.

use super::{ColumnCodec, DecodeError, Decodable, EncodeError};
use crate::value::Value;

/// A closed set of named values.
///
/// Usually implemented through [`sql_enum!`](crate::sql_enum).
pub trait SqlEnum: Copy + PartialEq + Send + Sync + 'static {
    const VARIANTS: &'static [Self];

    /// Name stored in the database.
    fn name(&self) -> &'static str;

    fn from_name(name: &str) -> Option<Self> {
        Self::VARIANTS.iter().copied().find(|v| v.name() == name)
    }
}

/// Declare an enum that implements [`SqlEnum`](crate::codec::SqlEnum).
///
/// The enum derives `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq` and `Hash`,
/// and each variant is stored under its own name.
///
/// ```
/// dbkit::sql_enum! {
///     pub enum Mood { Happy, Sad }
/// }
/// use dbkit::codec::SqlEnum;
/// assert_eq!(Mood::Sad.name(), "Sad");
/// ```
#[macro_export]
macro_rules! sql_enum {
    ($(#[$meta:meta])* $vis:vis enum $name:ident { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant),+
        }

        impl $crate::codec::SqlEnum for $name {
            const VARIANTS: &'static [Self] = &[$($name::$variant),+];

            fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }
    };
}

/// Codec for a column of a database enum type.
///
/// The type is named `<enum_name>_enum` unless overridden with
/// [`EnumCodec::type_name`].
#[derive(Debug, Clone)]
pub struct EnumCodec<E: SqlEnum> {
    enum_name: String,
    values: Vec<E>,
    type_name: Option<String>,
}

impl<E: SqlEnum> EnumCodec<E> {
    /// Accept every variant of `E`.
    pub fn new(enum_name: impl Into<String>) -> Self {
        Self {
            enum_name: enum_name.into(),
            values: E::VARIANTS.to_vec(),
            type_name: None,
        }
    }

    /// Restrict the column to a subset of the variants.
    pub fn with_values(mut self, values: &[E]) -> Self {
        self.values = values.to_vec();
        self
    }

    pub fn type_name(mut self, name: impl Into<String>) -> Self {
        self.type_name = Some(name.into());
        self
    }

    pub fn enum_name(&self) -> &str {
        &self.enum_name
    }

    pub fn values(&self) -> &[E] {
        &self.values
    }

    fn lookup(&self, name: &str) -> Option<E> {
        self.values.iter().copied().find(|v| v.name() == name)
    }
}

impl<E: SqlEnum> ColumnCodec for EnumCodec<E> {
    type Value = E;

    fn sql_type(&self) -> String {
        match &self.type_name {
            Some(name) => name.clone(),
            None => format!("{}_enum", self.enum_name),
        }
    }

    fn encode(&self, value: &E) -> Result<Value, EncodeError> {
        if !self.values.contains(value) {
            return Err(EncodeError::Invalid {
                value: value.name().to_string(),
                target: self.enum_name.clone(),
            });
        }
        Ok(Value::tagged(self.sql_type(), value.name()))
    }

    fn decode(&self, input: Decodable<E>) -> Result<E, DecodeError> {
        let wire = match input {
            Decodable::Native(value) => return Ok(value),
            Decodable::Wire(wire) => wire,
        };
        let sql_type = self.sql_type();
        wire.text_payload(|tag| tag == sql_type)
            .and_then(|name| self.lookup(name))
            .ok_or_else(|| DecodeError::invalid(&wire, self.enum_name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::sql_enum! {
        #[allow(non_camel_case_types)]
        enum TestEnum { ENUM_ONE, ENUM_TWO }
    }

    crate::sql_enum! {
        enum Status { Active, Suspended, Deleted, }
    }

    #[test]
    fn test_sql_type_naming() {
        assert_eq!(EnumCodec::<TestEnum>::new("test").sql_type(), "test_enum");
        assert_eq!(
            EnumCodec::<TestEnum>::new("test").type_name("kind").sql_type(),
            "kind"
        );
    }

    #[test]
    fn test_encode_tags_with_type_name() {
        let codec = EnumCodec::<TestEnum>::new("test");
        assert_eq!(
            codec.encode(&TestEnum::ENUM_TWO).unwrap(),
            Value::tagged("test_enum", "ENUM_TWO")
        );
    }

    #[test]
    fn test_decode_by_exact_name() {
        let codec = EnumCodec::<TestEnum>::new("test");
        assert_eq!(
            codec.decode_wire(Value::Text("ENUM_ONE".into())).unwrap(),
            TestEnum::ENUM_ONE
        );
        assert_eq!(
            codec.decode_wire(Value::tagged("test_enum", "ENUM_TWO")).unwrap(),
            TestEnum::ENUM_TWO
        );
        assert_eq!(
            codec.decode(Decodable::Native(TestEnum::ENUM_TWO)).unwrap(),
            TestEnum::ENUM_TWO
        );
        assert!(codec.decode_wire(Value::Text("enum_one".into())).is_err());
        assert!(codec.decode_wire(Value::tagged("other_enum", "ENUM_TWO")).is_err());
        assert!(codec.decode_wire(Value::tagged("jsonb", "ENUM_TWO")).is_err());
    }

    #[test]
    fn test_decode_unknown_names_input_and_enum() {
        let codec = EnumCodec::<TestEnum>::new("test");
        let err = codec.decode_wire(Value::Text("ENUM_THREE".into())).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("ENUM_THREE"), "{}", message);
        assert!(message.contains("test"), "{}", message);
    }

    #[test]
    fn test_subset_rejects_other_variants() {
        let codec = EnumCodec::new("status").with_values(&[Status::Active, Status::Suspended]);
        assert!(codec.encode(&Status::Active).is_ok());
        assert!(matches!(
            codec.encode(&Status::Deleted),
            Err(EncodeError::Invalid { ref value, .. }) if value == "Deleted"
        ));
        assert!(codec.decode_wire(Value::Text("Deleted".into())).is_err());
    }

    #[test]
    fn test_round_trip_all_variants() {
        let codec = EnumCodec::<Status>::new("status");
        for variant in Status::VARIANTS {
            let wire = codec.encode(variant).unwrap();
            assert_eq!(codec.decode_wire(wire).unwrap(), *variant);
        }
    }
}
