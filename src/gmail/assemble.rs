//! Assembly of a [`GmailMessage`] from one raw MBOX span.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{MboxError, Result};
use crate::gmail::ids::{date_from_delimiter, int_to_hex, message_id_from_delimiter};
use crate::model::address::EmailAddress;
use crate::model::message::{GmailMessage, RawSpan};
use crate::model::part::{first_matching, BodyPart};
use crate::parser::header::{decode_encoded_words, parse_date, split_message, HeaderMap};
use crate::parser::mime::{body_parts_with_depth, DEFAULT_MAX_DEPTH};

/// Header carrying Gmail's decimal thread id.
pub const THREAD_ID_HEADER: &str = "X-Gm-Thrid";

/// Header carrying Gmail's comma-separated labels.
pub const LABELS_HEADER: &str = "X-Gmail-Labels";

impl GmailMessage {
    /// Assemble a message from a raw span.
    ///
    /// Fails when the message id, thread id, date, or MIME structure cannot be
    /// recovered. An unparsable `From:` header never fails the message.
    pub fn from_span(span: &RawSpan) -> Result<Self> {
        Self::from_span_with_depth(span, DEFAULT_MAX_DEPTH)
    }

    /// [`GmailMessage::from_span`] with an explicit multipart nesting limit.
    pub fn from_span_with_depth(span: &RawSpan, max_depth: usize) -> Result<Self> {
        let message_id = message_id_from_delimiter(&span.delimiter)?;
        let (headers, body) = split_message(&span.bytes)?;

        let thread_raw = headers.get(THREAD_ID_HEADER).unwrap_or("");
        let thread_id = int_to_hex(thread_raw).map_err(|e| {
            MboxError::HeaderParse(format!(
                "failed to parse thread id from {THREAD_ID_HEADER}={thread_raw:?}: {e}"
            ))
        })?;

        let date = resolve_date(&headers, &span.delimiter)?;

        let from_raw = headers.get("From").unwrap_or("");
        let from = EmailAddress::parse_or_name(from_raw);

        let parts = body_parts_with_depth(&headers, body, max_depth)?;

        Ok(Self {
            thread_id,
            message_id,
            date,
            from,
            to: decode_encoded_words(headers.get("To").unwrap_or("")),
            subject: decode_encoded_words(headers.get("Subject").unwrap_or("")),
            labels: split_labels(headers.get(LABELS_HEADER).unwrap_or("")),
            size: span.len() as u64,
            parts,
        })
    }

    /// First leaf part with the given media type.
    pub fn first_part(&self, mime_type: &str) -> Option<&BodyPart> {
        first_matching(&self.parts, |p| p.mime_type() == mime_type)
    }

    /// Decoded body of the first `text/plain` part, if any.
    pub fn plain_text_body(&self) -> Result<Option<Cow<'_, [u8]>>> {
        self.first_part("text/plain").map(BodyPart::decode).transpose()
    }

    /// Decoded body of the first `text/html` part, if any.
    pub fn html_body(&self) -> Result<Option<Cow<'_, [u8]>>> {
        self.first_part("text/html").map(BodyPart::decode).transpose()
    }
}

/// `Date:` header first, then the timestamp embedded in the delimiter.
fn resolve_date(headers: &HeaderMap, delimiter: &str) -> Result<DateTime<Utc>> {
    if let Some(date) = headers.get("Date").and_then(parse_date) {
        return Ok(date);
    }
    debug!(delimiter, "No usable Date header, trying the delimiter timestamp");
    date_from_delimiter(delimiter).ok_or_else(|| MboxError::DateResolution {
        line: delimiter.to_string(),
    })
}

/// Split the labels header on commas, keeping empty entries.
///
/// An empty header yields a single empty label.
fn split_labels(raw: &str) -> Vec<String> {
    raw.split(',').map(String::from).collect()
}
