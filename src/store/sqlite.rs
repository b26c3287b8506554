//! SQLite sink for imported messages.
//!
//! Schema:
//! - messages: one row per message, keyed by the hex message id
//! - bodies: decoded first text/plain and text/html leaves
//! - labels: one row per Gmail label
//! - parts: headers (JSON) and raw size of every leaf part

use std::path::Path;

use rusqlite::{params, Connection};
use tracing::debug;

use crate::error::{MboxError, Result};
use crate::model::message::GmailMessage;
use crate::store::MessageSink;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS messages (
    MessageID TEXT PRIMARY KEY,
    ThreadID TEXT NOT NULL,
    Date TEXT NOT NULL,
    FromName TEXT NOT NULL,
    FromEmail TEXT NOT NULL,
    ToLine TEXT NOT NULL,
    Subject TEXT NOT NULL,
    SizeBytes INTEGER NOT NULL,
    Parts INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS bodies (
    MessageID TEXT PRIMARY KEY,
    PlainText BLOB,
    HTML BLOB
);

CREATE TABLE IF NOT EXISTS labels (
    MessageID TEXT NOT NULL,
    Label TEXT NOT NULL,
    UNIQUE(MessageID, Label)
);

CREATE TABLE IF NOT EXISTS parts (
    MessageID TEXT NOT NULL,
    PartIdx INTEGER NOT NULL,
    Headers TEXT NOT NULL,
    ContentSize INTEGER NOT NULL,
    UNIQUE(MessageID, PartIdx)
);

CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages(ThreadID);
CREATE INDEX IF NOT EXISTS idx_labels_label ON labels(Label);
";

// Trades durability for bulk insert speed; a crashed import is simply re-run.
const FAST_INSERT_PRAGMAS: &str = "
PRAGMA journal_mode = OFF;
PRAGMA synchronous = OFF;
PRAGMA cache_size = 1000000;
PRAGMA locking_mode = EXCLUSIVE;
";

const INS_MESSAGE: &str = "INSERT OR IGNORE INTO messages
    (MessageID, ThreadID, Date, FromName, FromEmail, ToLine, Subject, SizeBytes, Parts)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)";
const INS_BODY: &str = "INSERT OR IGNORE INTO bodies (MessageID, PlainText, HTML) VALUES (?, ?, ?)";
const INS_LABEL: &str = "INSERT OR IGNORE INTO labels (MessageID, Label) VALUES (?, ?)";
const INS_PART: &str =
    "INSERT OR IGNORE INTO parts (MessageID, PartIdx, Headers, ContentSize) VALUES (?, ?, ?, ?)";

/// Message sink backed by a SQLite database.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    ///
    /// With `fast_inserts` the connection disables journaling and syncing and
    /// holds an exclusive lock for its lifetime.
    pub fn open(path: impl AsRef<Path>, fast_inserts: bool) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| MboxError::io(parent, e))?;
        }

        let conn = Connection::open(path)?;
        if fast_inserts {
            conn.execute_batch(FAST_INSERT_PRAGMAS)?;
        }
        conn.execute_batch(SCHEMA)?;
        debug!(path = %path.display(), fast_inserts, "Opened message database");
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Labels stored for a message, in insertion order.
    pub fn labels(&self, message_id: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT Label FROM labels WHERE MessageID = ? ORDER BY rowid")?;
        let rows = stmt.query_map(params![message_id], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    /// Decoded plain-text body stored for a message.
    pub fn plain_text(&self, message_id: &str) -> Result<Option<Vec<u8>>> {
        self.body_column("PlainText", message_id)
    }

    /// Decoded HTML body stored for a message.
    pub fn html(&self, message_id: &str) -> Result<Option<Vec<u8>>> {
        self.body_column("HTML", message_id)
    }

    fn body_column(&self, column: &str, message_id: &str) -> Result<Option<Vec<u8>>> {
        let sql = format!("SELECT {column} FROM bodies WHERE MessageID = ?");
        match self
            .conn
            .query_row(&sql, params![message_id], |row| row.get::<_, Option<Vec<u8>>>(0))
        {
            Ok(body) => Ok(body),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl MessageSink for SqliteStore {
    fn insert(&mut self, msg: &GmailMessage) -> Result<()> {
        // Decode before touching the database so a bad body rejects only this message.
        let plain = msg.plain_text_body()?;
        let html = msg.html_body()?;
        let part_headers = msg
            .parts
            .iter()
            .map(|p| serde_json::to_string(&p.headers))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| MboxError::HeaderParse(format!("failed to serialize part headers: {e}")))?;

        let tx = self.conn.transaction()?;
        tx.execute(
            INS_MESSAGE,
            params![
                msg.message_id,
                msg.thread_id,
                msg.date.to_rfc3339(),
                msg.from.display_name,
                msg.from.address,
                msg.to,
                msg.subject,
                msg.size as i64,
                msg.parts.len() as i64,
            ],
        )?;
        tx.execute(
            INS_BODY,
            params![msg.message_id, plain.as_deref(), html.as_deref()],
        )?;
        for label in &msg.labels {
            tx.execute(INS_LABEL, params![msg.message_id, label])?;
        }
        for (idx, (part, headers)) in msg.parts.iter().zip(&part_headers).enumerate() {
            tx.execute(
                INS_PART,
                params![msg.message_id, idx as i64, headers, part.body.len() as i64],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn count(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(n as u64)
    }
}
