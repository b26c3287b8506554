//! Streaming MBOX scanner.
//!
//! Reads an MBOX stream line by line and hands out one message at a time.
//! Never loads the whole stream into memory. A second, independent pass can
//! count the `From ` delimiters without disturbing the sequential position.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use crate::error::{MboxError, Result};
use crate::model::message::RawSpan;

/// Size of the internal read buffer (128 KB).
const READ_BUFFER_SIZE: usize = 128 * 1024;

/// Default maximum length of a single line, terminator excluded (1 MiB).
pub const DEFAULT_MAX_LINE_SIZE: usize = 1024 * 1024;

/// Prefix that marks the first line of every message.
const SEPARATOR: &[u8] = b"From ";

/// UTF-8 byte order mark.
const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Everything `next_message` and `count_messages` touch. Guarded by one lock.
struct ScanState<R> {
    reader: BufReader<R>,
    /// Delimiter seen at the end of the previous message, owed to the next one.
    pending_from: Option<String>,
    /// Reusable line buffer.
    line_buf: Vec<u8>,
    /// Lines consumed by the sequential pass, for error reporting.
    line_no: u64,
}

/// Sequential MBOX message scanner over a seekable stream.
///
/// `next_message` and `count_messages` take `&self` and serialize on an
/// internal mutex, so a scanner can be shared between threads.
///
/// The scanner is literal about the format:
///
/// - every line starting with `From ` is a delimiter, blank line or not
/// - `>From ` lines are not unescaped
/// - `\r\n` line endings are normalized to `\n`
/// - lines before the first delimiter are discarded
pub struct MboxScanner<R> {
    state: Mutex<ScanState<R>>,
    max_line_size: usize,
}

impl MboxScanner<File> {
    /// Open an MBOX file for scanning.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_max_line_size(path, DEFAULT_MAX_LINE_SIZE)
    }

    /// [`MboxScanner::open`] with an explicit line size limit.
    pub fn open_with_max_line_size(path: impl AsRef<Path>, max_line_size: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MboxError::FileNotFound(path.to_path_buf())
            } else {
                MboxError::io(path, e)
            }
        })?;
        Ok(Self::with_max_line_size(file, max_line_size))
    }
}

impl<R: Read + Seek> MboxScanner<R> {
    /// Create a scanner with the default line size limit.
    pub fn new(inner: R) -> Self {
        Self::with_max_line_size(inner, DEFAULT_MAX_LINE_SIZE)
    }

    /// Create a scanner that rejects lines longer than `max_line_size` bytes.
    pub fn with_max_line_size(inner: R, max_line_size: usize) -> Self {
        Self {
            state: Mutex::new(ScanState {
                reader: BufReader::with_capacity(READ_BUFFER_SIZE, inner),
                pending_from: None,
                line_buf: Vec::with_capacity(4096),
                line_no: 0,
            }),
            max_line_size,
        }
    }

    /// Read the next message.
    ///
    /// Returns the delimiter line that opened the message together with every
    /// line up to (not including) the next delimiter or the end of the stream.
    /// `Ok(None)` means the stream is exhausted.
    pub fn next_message(&self) -> Result<Option<RawSpan>> {
        let mut guard = self.lock()?;
        let state = &mut *guard;

        let mut from = state.pending_from.take();
        let mut bytes: Vec<u8> = Vec::new();
        let mut skipped: u64 = 0;

        loop {
            let line_no = state.line_no + 1;
            if !read_line(
                &mut state.reader,
                &mut state.line_buf,
                self.max_line_size,
                line_no,
            )? {
                break; // EOF
            }
            state.line_no = line_no;

            let line = strip_bom(trim_line_ending(&state.line_buf), line_no);
            if is_mbox_separator(line) {
                let delimiter = String::from_utf8_lossy(line).into_owned();
                if from.is_none() {
                    from = Some(delimiter);
                    continue;
                }
                state.pending_from = Some(delimiter);
                break;
            }

            if from.is_none() {
                skipped += 1;
                continue;
            }
            bytes.extend_from_slice(line);
            bytes.push(b'\n');
        }

        if skipped > 0 {
            debug!(lines = skipped, "Skipped lines before the first delimiter");
        }

        Ok(from.map(|delimiter| RawSpan::new(delimiter, bytes)))
    }

    /// Iterate over the remaining messages.
    ///
    /// Iteration stops after the first error.
    pub fn messages(&self) -> impl Iterator<Item = Result<RawSpan>> + '_ {
        let mut failed = false;
        std::iter::from_fn(move || {
            if failed {
                return None;
            }
            let item = self.next_message().transpose();
            failed = matches!(item, Some(Err(_)));
            item
        })
    }

    /// Count every delimiter line in the whole stream.
    ///
    /// Rewinds to the start, scans to the end and seeks back to the position
    /// the sequential pass had reached, even when the scan fails.
    pub fn count_messages(&self) -> Result<u64> {
        let mut guard = self.lock()?;
        let reader = &mut guard.reader;

        let return_to = reader.stream_position()?;
        reader.seek(SeekFrom::Start(0))?;

        let counted = count_separators(reader, self.max_line_size);

        reader.seek(SeekFrom::Start(return_to))?;
        counted
    }

    /// Current logical read position of the sequential pass.
    pub fn position(&self) -> Result<u64> {
        let mut guard = self.lock()?;
        Ok(guard.reader.stream_position()?)
    }

    fn lock(&self) -> Result<MutexGuard<'_, ScanState<R>>> {
        self.state
            .lock()
            .map_err(|_| MboxError::Stream(std::io::Error::other("scanner lock poisoned")))
    }
}

/// Count delimiter lines from the current position to EOF.
fn count_separators<R: BufRead>(reader: &mut R, max_line_size: usize) -> Result<u64> {
    let mut line_buf: Vec<u8> = Vec::with_capacity(4096);
    let mut line_no: u64 = 0;
    let mut count: u64 = 0;
    while read_line(reader, &mut line_buf, max_line_size, line_no + 1)? {
        line_no += 1;
        if is_mbox_separator(strip_bom(trim_line_ending(&line_buf), line_no)) {
            count += 1;
        }
    }
    Ok(count)
}

/// Read one line (terminator included) into `line`.
///
/// Returns `false` at EOF. Fails as soon as the line content grows past
/// `max_line_size`, without buffering the rest of it.
fn read_line<R: BufRead>(
    reader: &mut R,
    line: &mut Vec<u8>,
    max_line_size: usize,
    line_no: u64,
) -> Result<bool> {
    line.clear();
    loop {
        let (complete, used) = {
            let buf = reader.fill_buf()?;
            if buf.is_empty() {
                return Ok(!line.is_empty());
            }
            match memchr_newline(buf) {
                Some(pos) => {
                    line.extend_from_slice(&buf[..=pos]);
                    (true, pos + 1)
                }
                None => {
                    line.extend_from_slice(buf);
                    (false, buf.len())
                }
            }
        };
        reader.consume(used);

        if trim_line_ending(line).len() > max_line_size {
            return Err(MboxError::LineTooLong {
                line: line_no,
                limit: max_line_size,
            });
        }
        if complete {
            return Ok(true);
        }
    }
}

/// Fast newline search (equivalent to memchr for `\n`).
#[inline]
fn memchr_newline(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n')
}

/// Drop a trailing `\n` and then a trailing `\r`.
fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Drop a byte order mark from the first line of the stream only.
fn strip_bom(line: &[u8], line_no: u64) -> &[u8] {
    if line_no == 1 {
        line.strip_prefix(BOM).unwrap_or(line)
    } else {
        line
    }
}

/// Check whether a line is an MBOX separator (`From ` at the start).
fn is_mbox_separator(line: &[u8]) -> bool {
    line.starts_with(SEPARATOR)
}
