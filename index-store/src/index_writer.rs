use chrono::Utc;
use doc_model::Document;
use rusqlite::{params, params_from_iter};
use tracing::debug;

use crate::sqlite_store::IndexTx;
use crate::StoreError;

/// Documents per INSERT statement. Batches larger than this are split into
/// sub-statements transparently to bound per-statement payload size.
const INSERT_CHUNK: usize = 64;

impl IndexTx<'_> {
    /// Mint a fresh generation token and record it as the pending
    /// generation for this transaction. Returns the token.
    ///
    /// Calling again before `complete_insert` supersedes the previous
    /// pending token: rows inserted under the old token become stale and
    /// are swept by the next `complete_insert`.
    pub fn prepare_insert(&mut self) -> Result<i64, StoreError> {
        let max_in_table: i64 = self.tx.query_row(
            "SELECT COALESCE(MAX(generation), 0) FROM documents",
            [],
            |r| r.get(0),
        )?;
        // Timestamp-based token, bumped past both the table maximum and any
        // token already minted in this transaction so each prepare call is
        // unique even within one transaction.
        let generation = Utc::now()
            .timestamp_micros()
            .max(max_in_table + 1)
            .max(self.last_minted + 1);
        self.last_minted = generation;
        self.pending = Some(generation);
        debug!(generation, "prepared index generation");
        Ok(generation)
    }

    /// Append `documents` as index rows of `doc_type` tagged with the
    /// pending generation. Repeated calls accumulate into the same
    /// generation; there is no deduplication across batches.
    pub fn insert_documents(
        &mut self,
        doc_type: &str,
        documents: &[Document],
    ) -> Result<(), StoreError> {
        let generation = self.pending.ok_or(StoreError::MissingPrepare)?;
        for chunk in documents.chunks(INSERT_CHUNK) {
            let mut sql = String::from(
                "INSERT INTO documents (doc_type, generation, document, title, body) VALUES ",
            );
            let mut values: Vec<rusqlite::types::Value> = Vec::with_capacity(chunk.len() * 5);
            for (i, doc) in chunk.iter().enumerate() {
                if i > 0 {
                    sql.push(',');
                }
                sql.push_str("(?,?,?,?,?)");
                let payload = serde_json::to_string(doc)?;
                values.push(doc_type.to_string().into());
                values.push(generation.into());
                values.push(payload.into());
                values.push(doc.title.clone().into());
                values.push(doc.text.clone().into());
            }
            self.tx.execute(&sql, params_from_iter(values))?;
        }
        debug!(doc_type, generation, inserted = documents.len(), "inserted batch");
        Ok(())
    }

    /// Promote the pending generation to current for `doc_type`: every row
    /// of that type from any other generation is deleted, then the pending
    /// marker clears. Returns the number of swept rows.
    ///
    /// With no inserts since `prepare_insert` this clears the type's index
    /// entirely; that is the intended way to empty a type, not an error.
    /// Called without a preceding `prepare_insert`, no generation can
    /// match and the type is cleared as well.
    pub fn complete_insert(&mut self, doc_type: &str) -> Result<usize, StoreError> {
        // Generation 0 is never minted, so it matches no row.
        let generation = self.pending.unwrap_or(0);
        let swept = self.tx.execute(
            "DELETE FROM documents WHERE doc_type = ?1 AND generation <> ?2",
            params![doc_type, generation],
        )?;
        self.pending = None;
        debug!(doc_type, generation, swept, "promoted generation to current");
        Ok(swept)
    }
}
