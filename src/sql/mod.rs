//! SQL text helpers: dialects, table collaborators, upserts and a handful of
//! PostGIS and PostgreSQL expression fragments.

mod table;
mod upsert;

pub use table::{Column, ColumnDef, Table};
pub use upsert::{build_upsert, Upsert};

use std::fmt;

use crate::codec::GeographyPoint;
use crate::config::Driver;

/// SQL flavour a statement is rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
    /// Statement text only; there is no MySQL driver.
    MySql,
}

impl Dialect {
    /// Bind placeholder for the 1-based parameter `index`.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", index),
            Dialect::Sqlite => format!("?{}", index),
            Dialect::MySql => "?".to_string(),
        }
    }
}

impl From<Driver> for Dialect {
    fn from(driver: Driver) -> Self {
        match driver {
            Driver::Postgres => Dialect::Postgres,
            Driver::Sqlite => Dialect::Sqlite,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// `"ASC"` sorts ascending; anything else, including `None`, descending.
    pub fn parse(order: Option<&str>) -> Self {
        match order {
            Some("ASC") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Asc => write!(f, "ASC"),
            SortOrder::Desc => write!(f, "DESC"),
        }
    }
}

/// `ST_AsText(<column>) AS <alias>`
pub fn st_as_text(column: &str, alias: &str) -> String {
    format!("ST_AsText({}) AS {}", column, alias)
}

/// `ST_GeogFromText('POINT(<lng> <lat>)')`
pub fn geog_from_text(point: &GeographyPoint) -> String {
    format!("ST_GeogFromText('{}')", point)
}

/// Whether `column` lies within the distance held in `distance_column` (in
/// metres) of `point`.
pub fn st_dwithin(column: &str, point: &GeographyPoint, distance_column: &str) -> String {
    format!(
        "ST_DWithin({}, {}, {})",
        column,
        geog_from_text(point),
        distance_column
    )
}

/// Trigram distance (`<->`, needs the `pg_trgm` extension).
pub fn distance(lhs: &str, rhs: &str) -> String {
    format!("{} <-> {}", lhs, rhs)
}

/// Case-insensitive `LIKE`.
pub fn ilike(lhs: &str, rhs: &str) -> String {
    format!("{} ILIKE {}", lhs, rhs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(Dialect::Postgres.placeholder(3), "$3");
        assert_eq!(Dialect::Sqlite.placeholder(3), "?3");
        assert_eq!(Dialect::MySql.placeholder(3), "?");
        assert_eq!(Dialect::from(Driver::Sqlite), Dialect::Sqlite);
    }

    #[test]
    fn test_sort_order() {
        assert_eq!(SortOrder::parse(Some("ASC")), SortOrder::Asc);
        assert_eq!(SortOrder::parse(Some("asc")), SortOrder::Desc);
        assert_eq!(SortOrder::parse(None), SortOrder::Desc);
        assert_eq!(SortOrder::Asc.to_string(), "ASC");
    }

    #[test]
    fn test_postgis_fragments() {
        let point = GeographyPoint::new(40.7128, -74.006);
        assert_eq!(st_as_text("location", "loc"), "ST_AsText(location) AS loc");
        assert_eq!(
            geog_from_text(&point),
            "ST_GeogFromText('POINT(-74.006 40.7128)')"
        );
        assert_eq!(
            st_dwithin("location", &point, "radius"),
            "ST_DWithin(location, ST_GeogFromText('POINT(-74.006 40.7128)'), radius)"
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(distance("name", "$1"), "name <-> $1");
        assert_eq!(ilike("name", "$1"), "name ILIKE $1");
    }
}
