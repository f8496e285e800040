//! PostGIS geography points.

use std::fmt;
use std::str::FromStr;

use super::{ColumnCodec, DecodeError, Decodable, EncodeError};
use crate::value::Value;

/// WGS 84.
pub const DEFAULT_SRID: u32 = 4326;

const TARGET: &str = "geography point";

// EWKB type flags
const WKB_Z: u32 = 0x8000_0000;
const WKB_M: u32 = 0x4000_0000;
const WKB_SRID: u32 = 0x2000_0000;
const WKB_POINT: u32 = 1;

/// A point on the globe.
///
/// Its text form is `POINT(<lng> <lat>)`: longitude comes first, as in
/// every WKT coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeographyPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeographyPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Parse hex-encoded (E)WKB, the default text output of a geography
    /// column.
    pub fn from_ewkb_hex(hex: &str) -> Option<Self> {
        if hex.len() % 2 != 0 {
            return None;
        }
        let bytes = (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
            .collect::<Option<Vec<u8>>>()?;
        Self::from_ewkb(&bytes)
    }

    /// Parse a binary (E)WKB point.
    pub fn from_ewkb(data: &[u8]) -> Option<Self> {
        let little_endian = match data.first()? {
            0 => false,
            1 => true,
            _ => return None,
        };
        let mut cursor = WkbCursor {
            data,
            pos: 1,
            little_endian,
        };

        let geometry_type = cursor.u32()?;
        if geometry_type & !(WKB_Z | WKB_M | WKB_SRID) != WKB_POINT {
            return None;
        }
        if geometry_type & WKB_SRID != 0 {
            cursor.u32()?;
        }

        let x = cursor.f64()?;
        let y = cursor.f64()?;
        // POINT EMPTY is encoded as NaN coordinates
        if x.is_nan() || y.is_nan() {
            return None;
        }
        Some(Self { lat: y, lng: x })
    }
}

struct WkbCursor<'a> {
    data: &'a [u8],
    pos: usize,
    little_endian: bool,
}

impl WkbCursor<'_> {
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let bytes = self.data.get(self.pos..self.pos + N)?.try_into().ok()?;
        self.pos += N;
        Some(bytes)
    }

    fn u32(&mut self) -> Option<u32> {
        let bytes = self.take::<4>()?;
        Some(if self.little_endian {
            u32::from_le_bytes(bytes)
        } else {
            u32::from_be_bytes(bytes)
        })
    }

    fn f64(&mut self) -> Option<f64> {
        let bytes = self.take::<8>()?;
        Some(if self.little_endian {
            f64::from_le_bytes(bytes)
        } else {
            f64::from_be_bytes(bytes)
        })
    }
}

impl fmt::Display for GeographyPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "POINT({} {})", self.lng, self.lat)
    }
}

impl FromStr for GeographyPoint {
    type Err = DecodeError;

    /// Accepts `POINT(x y)` in any case, optionally preceded by `SRID=n;`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DecodeError::Invalid {
            value: s.to_string(),
            kind: "text",
            target: TARGET.to_string(),
        };

        let mut wkt = s.trim();
        if has_prefix(wkt, "SRID=") {
            let (_, rest) = wkt.split_once(';').ok_or_else(invalid)?;
            wkt = rest.trim_start();
        }

        if !has_prefix(wkt, "POINT") {
            return Err(invalid());
        }
        let body = wkt[5..]
            .trim_start()
            .strip_prefix('(')
            .and_then(|b| b.strip_suffix(')'))
            .ok_or_else(invalid)?;

        let mut coords = body.split_whitespace().map(str::parse::<f64>);
        match (coords.next(), coords.next(), coords.next()) {
            (Some(Ok(lng)), Some(Ok(lat)), None) => Ok(Self { lat, lng }),
            _ => Err(invalid()),
        }
    }
}

fn has_prefix(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Codec for `geography(Point, <srid>)` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeographyCodec {
    srid: u32,
}

impl Default for GeographyCodec {
    fn default() -> Self {
        Self { srid: DEFAULT_SRID }
    }
}

impl GeographyCodec {
    pub fn with_srid(srid: u32) -> Self {
        Self { srid }
    }

    pub fn srid(&self) -> u32 {
        self.srid
    }

    fn parse_text(&self, text: &str, wire: &Value) -> Result<GeographyPoint, DecodeError> {
        let looks_hex = !text.is_empty() && text.bytes().all(|b| b.is_ascii_hexdigit());
        if looks_hex {
            return GeographyPoint::from_ewkb_hex(text)
                .ok_or_else(|| DecodeError::invalid(wire, TARGET));
        }
        text.parse().map_err(|_| DecodeError::invalid(wire, TARGET))
    }
}

impl ColumnCodec for GeographyCodec {
    type Value = GeographyPoint;

    fn sql_type(&self) -> String {
        format!("geography(Point, {})", self.srid)
    }

    fn encode(&self, point: &GeographyPoint) -> Result<Value, EncodeError> {
        if !point.is_valid() {
            return Err(EncodeError::Invalid {
                value: point.to_string(),
                target: TARGET.to_string(),
            });
        }
        Ok(Value::tagged("geography", point.to_string()))
    }

    fn decode(&self, input: Decodable<GeographyPoint>) -> Result<GeographyPoint, DecodeError> {
        match input {
            Decodable::Native(point) => Ok(point),
            Decodable::Wire(wire) => match &wire {
                Value::Text(text) => self.parse_text(text, &wire),
                Value::Tagged(tagged) if is_geography_tag(&tagged.type_name) => {
                    self.parse_text(&tagged.value, &wire)
                }
                Value::Bytes(bytes) => {
                    GeographyPoint::from_ewkb(bytes).ok_or_else(|| DecodeError::invalid(&wire, TARGET))
                }
                _ => Err(DecodeError::invalid(&wire, TARGET)),
            },
        }
    }
}

/// `geography`, optionally with a type modifier such as `(Point, 4326)`.
fn is_geography_tag(type_name: &str) -> bool {
    has_prefix(type_name, "geography")
        && matches!(type_name.as_bytes().get("geography".len()), None | Some(b'('))
}
