//! Persistence of assembled messages.

pub mod sqlite;

use crate::error::Result;
use crate::model::message::GmailMessage;

pub use sqlite::SqliteStore;

/// Destination for assembled messages.
///
/// Inserting a message that is already stored must be a no-op so an import
/// can be re-run over the same archive.
pub trait MessageSink {
    /// Persist one message.
    fn insert(&mut self, msg: &GmailMessage) -> Result<()>;

    /// Number of messages currently stored.
    fn count(&self) -> Result<u64>;
}
