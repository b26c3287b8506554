//! Import driver: scan an archive, assemble each message, and persist it.

use std::io::{Read, Seek};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::model::message::GmailMessage;
use crate::parser::mbox::MboxScanner;
use crate::store::MessageSink;

/// Outcome of an import run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Delimiters counted before the run.
    pub expected: u64,
    /// Spans read from the archive.
    pub processed: u64,
    /// Spans that failed to assemble or store.
    pub rejected: u64,
    /// Messages handed to the sink successfully.
    pub inserted: u64,
    /// Messages in the sink after the run.
    pub persisted: u64,
    pub duration: Duration,
}

impl ImportSummary {
    /// Expected messages that did not end up in the sink.
    ///
    /// Negative when the sink already held messages from elsewhere.
    pub fn missing(&self) -> i64 {
        self.expected as i64 - self.persisted as i64
    }
}

/// Import every message of `scanner` into `sink`.
///
/// Messages that fail to assemble or store are logged and skipped. Stream and
/// storage failures stop the run. `progress` receives `(processed, expected)`
/// after each message.
pub fn run_import<R: Read + Seek>(
    scanner: &MboxScanner<R>,
    sink: &mut dyn MessageSink,
    max_mime_depth: usize,
    progress: Option<&dyn Fn(u64, u64)>,
) -> Result<ImportSummary> {
    info!("Calculating number of messages");
    let expected = scanner.count_messages()?;
    info!(total = expected, "Done calculating number of messages");

    let start = Instant::now();
    let mut summary = ImportSummary {
        expected,
        ..Default::default()
    };

    while let Some(span) = scanner.next_message()? {
        summary.processed += 1;

        let stored = GmailMessage::from_span_with_depth(&span, max_mime_depth)
            .and_then(|msg| sink.insert(&msg));
        match stored {
            Ok(()) => summary.inserted += 1,
            Err(e) if e.is_fatal() => {
                warn!(from = %span.delimiter, error = %e, "Failed insert");
                return Err(e);
            }
            Err(e) => {
                summary.rejected += 1;
                warn!(from = %span.delimiter, error = %e, "Bad parse, skipping message");
            }
        }

        if let Some(cb) = progress {
            cb(summary.processed, expected);
        }
    }

    summary.persisted = sink.count()?;
    summary.duration = start.elapsed();

    if summary.missing() != 0 || summary.processed != expected {
        warn!(
            expected,
            processed = summary.processed,
            persisted = summary.persisted,
            missing = summary.missing(),
            "Message count mismatch after import"
        );
    } else {
        debug!(persisted = summary.persisted, "All counted messages persisted");
    }
    info!(
        loaded = summary.persisted,
        rejected = summary.rejected,
        missing = summary.missing(),
        duration_ms = summary.duration.as_millis() as u64,
        "Import finished"
    );

    Ok(summary)
}
