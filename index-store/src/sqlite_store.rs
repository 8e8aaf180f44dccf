use std::path::Path;

use rusqlite::{params, Connection, Transaction, TransactionBehavior};

use crate::StoreError;

/// SQLite-backed index store. FTS5 provides the text-ranking primitive;
/// index maintenance is handled by triggers installed at bootstrap.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Non-throwing capability probe: true when the connected backend
    /// carries the FTS5 text-search primitives this engine depends on.
    /// No effect on the schema; safe to call repeatedly.
    pub fn supported(conn: &Connection) -> bool {
        conn.execute_batch(
            r#"
            DROP TABLE IF EXISTS temp.fts5_probe;
            CREATE VIRTUAL TABLE temp.fts5_probe USING fts5(probe);
            DROP TABLE temp.fts5_probe;
            "#,
        )
        .is_ok()
    }

    /// Verify support and bootstrap the schema on `conn`, returning a ready
    /// store. Fails fast with `UnsupportedBackend` before touching the
    /// schema when the backend lacks FTS5.
    pub fn create(conn: Connection) -> Result<Self, StoreError> {
        if !Self::supported(&conn) {
            return Err(StoreError::UnsupportedBackend(
                "sqlite connection without FTS5".to_string(),
            ));
        }
        let store = Self { conn };
        store.init()?;
        Ok(store)
    }

    /// Open a file-backed store at `path` and initialize schema if absent.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::create(Connection::open(path)?)
    }

    /// Open an in-memory store and initialize schema.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::create(Connection::open_in_memory()?)
    }

    fn init(&self) -> Result<(), StoreError> {
        // Pragmas for durability and concurrency
        self.conn.pragma_update(None, "journal_mode", &"WAL")?;
        self.conn.pragma_update(None, "synchronous", &"FULL")?;
        self.conn.pragma_update(None, "foreign_keys", &"ON")?;

        // One row per indexed document instance. `document` is the verbatim
        // JSON payload returned to callers; `title`/`body` are the derived
        // searchable text and never leave the store.
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                rowid INTEGER PRIMARY KEY,
                doc_type TEXT NOT NULL,
                generation INTEGER NOT NULL,
                document TEXT NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_type_generation
                ON documents(doc_type, generation);

            -- FTS5 virtual table linked to documents via content= and rowid
            CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
                title,
                body,
                content='documents',
                content_rowid='rowid',
                tokenize = 'unicode61'
            );

            -- Triggers to keep FTS index consistent
            CREATE TRIGGER IF NOT EXISTS documents_ai AFTER INSERT ON documents BEGIN
                INSERT INTO documents_fts(rowid, title, body)
                VALUES (new.rowid, new.title, new.body);
            END;

            CREATE TRIGGER IF NOT EXISTS documents_ad AFTER DELETE ON documents BEGIN
                INSERT INTO documents_fts(documents_fts, rowid, title, body)
                VALUES ('delete', old.rowid, old.title, old.body);
            END;

            CREATE TRIGGER IF NOT EXISTS documents_au AFTER UPDATE OF title, body ON documents BEGIN
                INSERT INTO documents_fts(documents_fts, rowid, title, body)
                VALUES ('delete', old.rowid, old.title, old.body);
                INSERT INTO documents_fts(rowid, title, body)
                VALUES (new.rowid, new.title, new.body);
            END;
            "#,
        )?;
        Ok(())
    }

    /// Run `f` inside a backend transaction. Commits when `f` returns Ok;
    /// any error rolls back every prepare/insert/complete/query issued
    /// within, leaving the store as if the transaction never ran.
    pub fn transaction<R, F>(&mut self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut IndexTx<'_>) -> Result<R, StoreError>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut itx = IndexTx {
            tx,
            pending: None,
            last_minted: 0,
        };
        // An early return drops the inner transaction, which rolls back.
        let out = f(&mut itx)?;
        itx.tx.commit()?;
        Ok(out)
    }
}

/// A transaction-scoped handle carrying the writer protocol state. The
/// pending generation lives here, never in the store or in globals, so
/// every call re-derives state from the current transactional snapshot.
///
/// Single-writer-per-type is a caller responsibility: two transactions
/// racing prepare/complete for the same type can sweep each other's
/// in-flight generation.
pub struct IndexTx<'conn> {
    pub(crate) tx: Transaction<'conn>,
    pub(crate) pending: Option<i64>,
    pub(crate) last_minted: i64,
}

impl IndexTx<'_> {
    /// Count the current index rows for one type.
    pub fn count_documents(&self, doc_type: &str) -> Result<usize, StoreError> {
        let n: i64 = self.tx.query_row(
            "SELECT count(*) FROM documents WHERE doc_type = ?1",
            params![doc_type],
            |r| r.get(0),
        )?;
        Ok(n as usize)
    }

    /// Distinct type names with at least one indexed row.
    pub fn types(&self) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .tx
            .prepare("SELECT DISTINCT doc_type FROM documents ORDER BY doc_type")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}
