//! Prepared statement management and caching.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use super::protocol::{FieldDescription, Format};
use super::types::{Oid, PgValue};

/// Column descriptions shared between a cached statement and its results.
pub type SharedColumns = Arc<Vec<FieldDescription>>;

// ============================================================================
// Prepared Statement
// ============================================================================

/// A server-side prepared statement created by Parse + Describe.
#[derive(Debug, Clone)]
pub struct PreparedStatement {
    /// Server-side name (e.g. "__dbkit_3")
    pub name: String,
    pub query: String,
    /// Parameter type OIDs as resolved by the server
    pub param_types: Vec<Oid>,
    pub columns: SharedColumns,
    /// Per-column wire format requested in Bind, parallel to `columns`.
    pub result_formats: Vec<Format>,
}

impl PreparedStatement {
    pub fn new(name: String, query: String) -> Self {
        Self {
            name,
            query,
            param_types: Vec::new(),
            columns: Arc::new(Vec::new()),
            result_formats: Vec::new(),
        }
    }

    pub fn set_param_types(&mut self, types: Vec<Oid>) {
        self.param_types = types;
    }

    /// Record the row description and derive the result formats from it.
    ///
    /// Columns whose type has no binary decoder (enums, PostGIS types,
    /// numeric) are requested as text.
    pub fn set_columns(&mut self, columns: Vec<FieldDescription>) {
        self.result_formats = columns
            .iter()
            .map(|c| c.type_oid.result_format())
            .collect();
        self.columns = Arc::new(columns);
    }

    /// Whether `params` can be bound as this statement was prepared.
    ///
    /// NULLs and server-typed text fit any parameter. Every other value must
    /// carry the OID the server resolved for its position.
    pub fn accepts(&self, params: &[PgValue]) -> bool {
        self.param_types.len() == params.len()
            && params.iter().zip(&self.param_types).all(|(param, &resolved)| {
                let oid = param.type_oid();
                oid == Oid::UNSPECIFIED || oid == resolved
            })
    }

    pub fn returns_rows(&self) -> bool {
        !self.columns.is_empty()
    }

    /// Format of column `index`, text for anything out of range.
    pub fn column_format(&self, index: usize) -> Format {
        self.result_formats
            .get(index)
            .copied()
            .unwrap_or(Format::Text)
    }
}

// ============================================================================
// Statement Cache
// ============================================================================

/// Per-connection LRU cache of prepared statements keyed by query text.
pub struct StatementCache {
    cache: LruCache<String, Arc<PreparedStatement>>,
    next_id: u32,
}

impl StatementCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(cap),
            next_id: 0,
        }
    }

    /// Look up a statement and mark it as recently used.
    pub fn get(&mut self, query: &str) -> Option<Arc<PreparedStatement>> {
        self.cache.get(query).map(Arc::clone)
    }

    #[inline]
    pub fn contains(&self, query: &str) -> bool {
        self.cache.contains(query)
    }

    /// Insert a statement, returning the server name of the one evicted to
    /// make room, if any. The caller owns closing it on the server.
    pub fn insert(&mut self, statement: Arc<PreparedStatement>) -> Option<String> {
        let query = statement.query.clone();
        match self.cache.push(query.clone(), statement) {
            Some((evicted_query, evicted)) if evicted_query != query => Some(evicted.name.clone()),
            _ => None,
        }
    }

    pub fn remove(&mut self, query: &str) -> Option<Arc<PreparedStatement>> {
        self.cache.pop(query)
    }

    pub fn next_statement_name(&mut self) -> String {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        format!("__dbkit_{}", id)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl Default for StatementCache {
    fn default() -> Self {
        Self::new(100)
    }
}
