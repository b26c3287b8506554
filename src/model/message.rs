//! Raw and assembled message types.

use chrono::{DateTime, Utc};

use super::address::EmailAddress;
use super::part::BodyPart;

/// One message as cut out of the MBOX stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSpan {
    /// The `From ` line that opened the message, without line terminator.
    pub delimiter: String,
    /// Every line up to the next delimiter, each terminated by `\n`.
    pub bytes: Vec<u8>,
}

impl RawSpan {
    pub fn new(delimiter: String, bytes: Vec<u8>) -> Self {
        Self { delimiter, bytes }
    }

    /// Size of the message in bytes (delimiter line excluded).
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A Gmail message assembled from a [`RawSpan`].
///
/// Ids use Gmail's API representation (lowercase hex), not the decimal form
/// found in Takeout archives.
#[derive(Debug, Clone)]
pub struct GmailMessage {
    /// Thread id from `X-Gm-Thrid`, hex.
    pub thread_id: String,

    /// Message id from the `From ` delimiter, hex.
    pub message_id: String,

    /// `Date:` header, or the delimiter's timestamp when the header is unusable.
    pub date: DateTime<Utc>,

    /// Sender. Name-only when the `From:` header is not a valid address.
    pub from: EmailAddress,

    /// Decoded `To:` line, unparsed.
    pub to: String,

    /// Decoded subject line.
    pub subject: String,

    /// Gmail labels from `X-Gmail-Labels`, split on commas as-is.
    pub labels: Vec<String>,

    /// Size in bytes of the message in the archive.
    pub size: u64,

    /// Leaf body parts in document order.
    pub parts: Vec<BodyPart>,
}
