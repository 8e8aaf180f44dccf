use doc_model::Document;
use rusqlite::params_from_iter;
use tracing::debug;

use crate::sqlite_store::IndexTx;
use crate::{FieldMatch, Query, SearchHit, StoreError};

// bm25 column weights: a term hit in the title outweighs the same hit in
// the body, so a document whose title matches the query ranks first.
const WEIGHT_TITLE: f64 = 4.0;
const WEIGHT_BODY: f64 = 1.0;

impl IndexTx<'_> {
    /// Execute a structured query within this transaction's snapshot and
    /// return hits ordered by descending rank.
    ///
    /// With a term, rows are ranked by FTS5 bm25 over the indexed title and
    /// body; non-matching rows are excluded. Without a term, rows matching
    /// the structural filters are returned with a neutral rank of zero.
    /// Equal ranks order by insertion; that tie order is not contractual.
    pub fn query(&self, query: &Query) -> Result<Vec<SearchHit>, StoreError> {
        validate(query)?;

        let match_expr = match query.term.as_deref() {
            Some(term) => match fts_match_expr(term) {
                Some(expr) => Some(expr),
                // A term of only punctuation matches nothing.
                None => return Ok(Vec::new()),
            },
            None => None,
        };

        let mut params: Vec<rusqlite::types::Value> = Vec::new();
        let mut sql = match &match_expr {
            Some(expr) => {
                params.push(expr.clone().into());
                format!(
                    "SELECT d.doc_type, d.document, -bm25(f.documents_fts, {WEIGHT_TITLE}, {WEIGHT_BODY}) AS rank \n\
                     FROM documents_fts f \n\
                     JOIN documents d ON d.rowid = f.rowid \n\
                     WHERE f.documents_fts MATCH ?1"
                )
            }
            None => String::from(
                "SELECT d.doc_type, d.document, 0.0 AS rank \n\
                 FROM documents d \n\
                 WHERE 1=1",
            ),
        };

        if let Some(types) = &query.types {
            sql.push_str(" AND d.doc_type IN (");
            for (i, t) in types.iter().enumerate() {
                if i > 0 {
                    sql.push(',');
                }
                sql.push('?');
                params.push(t.clone().into());
            }
            sql.push(')');
        }

        // AND across field names; OR (IN list) across one field's values.
        // Filters match only the additional-attributes object, never the
        // built-in title/text/location keys. Values only ever travel as
        // bound parameters.
        for (name, values) in &query.fields {
            let path = format!("$.fields.\"{name}\"");
            match values {
                FieldMatch::One(v) => {
                    sql.push_str(" AND json_extract(d.document, ?) = ?");
                    params.push(path.into());
                    params.push(v.clone().into());
                }
                FieldMatch::AnyOf(vs) => {
                    sql.push_str(" AND json_extract(d.document, ?) IN (");
                    params.push(path.into());
                    for (i, v) in vs.iter().enumerate() {
                        if i > 0 {
                            sql.push(',');
                        }
                        sql.push('?');
                        params.push(v.clone().into());
                    }
                    sql.push(')');
                }
            }
        }

        sql.push_str(" ORDER BY rank DESC, d.rowid");

        debug!(term = ?query.term, filters = query.fields.len(), "compiled search");

        let mut stmt = self.tx.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(params), |row| {
            let doc_type: String = row.get(0)?;
            let payload: String = row.get(1)?;
            let rank: f64 = row.get(2)?;
            Ok((doc_type, payload, rank))
        })?;

        let mut hits = Vec::new();
        for r in rows {
            let (doc_type, payload, rank) = r?;
            let document: Document = serde_json::from_str(&payload)?;
            hits.push(SearchHit {
                doc_type,
                document,
                rank,
            });
        }
        Ok(hits)
    }
}

/// Reject invalid filter combinations before any backend statement is
/// issued.
fn validate(query: &Query) -> Result<(), StoreError> {
    if let Some(types) = &query.types {
        if types.is_empty() {
            return Err(StoreError::MalformedQuery(
                "types filter present but empty".to_string(),
            ));
        }
    }
    for (name, values) in &query.fields {
        if name.trim().is_empty() {
            return Err(StoreError::MalformedQuery("empty field name".to_string()));
        }
        if name.contains('"') {
            return Err(StoreError::MalformedQuery(format!(
                "field name {name:?} contains a quote"
            )));
        }
        if let FieldMatch::AnyOf(vs) = values {
            if vs.is_empty() {
                return Err(StoreError::MalformedQuery(format!(
                    "field {name:?} has an empty value set"
                )));
            }
        }
    }
    Ok(())
}

/// Lower a caller-supplied term into FTS5 MATCH syntax: tokens are
/// extracted, quoted, and implicitly ANDed. Raw operator characters from
/// the caller (`&`, `-`, `:` ...) never reach FTS5. Returns None when the
/// term carries no tokens at all.
fn fts_match_expr(term: &str) -> Option<String> {
    let tokens: Vec<&str> = term
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return None;
    }
    Some(
        tokens
            .iter()
            .map(|t| format!("\"{t}\""))
            .collect::<Vec<_>>()
            .join(" "),
    )
}
