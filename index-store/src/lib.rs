pub mod index_writer;
pub mod query;
pub mod sqlite_store;

use std::collections::BTreeMap;

use doc_model::Document;

pub use sqlite_store::{IndexTx, SqliteStore};

/// One ranked query result: the stored payload plus its backend-derived
/// relevance. Higher rank means more relevant; term-less queries report a
/// neutral rank of zero.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub doc_type: String,
    pub document: Document,
    pub rank: f64,
}

// ------------------------------
// Query shape and field filters
// ------------------------------

/// Values accepted for one field filter. A single value is an exact-equality
/// constraint; a set of values matches when any of them equals the stored
/// attribute (OR within the field).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldMatch {
    One(String),
    AnyOf(Vec<String>),
}

impl From<&str> for FieldMatch {
    fn from(value: &str) -> Self {
        FieldMatch::One(value.to_string())
    }
}

impl From<String> for FieldMatch {
    fn from(value: String) -> Self {
        FieldMatch::One(value)
    }
}

impl From<Vec<String>> for FieldMatch {
    fn from(values: Vec<String>) -> Self {
        FieldMatch::AnyOf(values)
    }
}

impl From<Vec<&str>> for FieldMatch {
    fn from(values: Vec<&str>) -> Self {
        FieldMatch::AnyOf(values.iter().map(|v| v.to_string()).collect())
    }
}

/// A structured search request: an optional free-text term, an optional
/// restriction to a set of document types, and equality filters on
/// additional document attributes. Filters combine with AND across distinct
/// field names and OR across the values of one field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub term: Option<String>,
    pub types: Option<Vec<String>>,
    pub fields: BTreeMap<String, FieldMatch>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self
    }

    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, values: impl Into<FieldMatch>) -> Self {
        self.fields.insert(name.into(), values.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend lacks the text-search primitives the engine depends on.
    /// Raised at construction time, never mid-query.
    #[error("backend not supported: {0}")]
    UnsupportedBackend(String),
    /// Any backend failure inside a transaction. The enclosing transaction
    /// rolls back; no partial effect remains.
    #[error("backend error: {0}")]
    Backend(#[from] rusqlite::Error),
    /// Document payload could not be encoded or decoded.
    #[error("payload error: {0}")]
    Payload(#[from] serde_json::Error),
    /// The query was rejected before any backend statement was issued.
    #[error("malformed query: {0}")]
    MalformedQuery(String),
    /// `insert_documents` was called with no pending generation in this
    /// transaction. Call `prepare_insert` first.
    #[error("no pending generation: call prepare_insert before inserting")]
    MissingPrepare,
}
