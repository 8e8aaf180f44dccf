//! Shared models used across crates

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single indexable document as supplied by a collector.
///
/// Beyond `title`/`text`/`location` a document may carry arbitrary
/// string-valued attributes. They live under their own `fields` object in
/// the payload, separate from the built-in keys, so an attribute may even
/// share a name with `title` without colliding; field filters only ever
/// match against this object. Documents are immutable once submitted: the
/// store wraps them in index rows but never rewrites them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Display title of the document.
    pub title: String,
    /// Main text content.
    pub text: String,
    /// Reference back to the source (URL or path string).
    pub location: String,
    /// Additional string-valued attributes, usable as query filters.
    pub fields: BTreeMap<String, String>,
}

impl Document {
    pub fn new(
        title: impl Into<String>,
        text: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            text: text.into(),
            location: location.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Attach an additional attribute, consuming and returning the document.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Look up an additional attribute by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}
