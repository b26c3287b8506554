//! MIME body decomposition: media type parsing and recursive multipart
//! flattening into leaf [`BodyPart`]s.

use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::error::{MboxError, Result};
use crate::model::part::BodyPart;
use crate::parser::header::{parse_header_block, HeaderMap};

/// Maximum depth for recursive multipart parsing (to prevent stack overflow on adversarial input).
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Media type assumed when a part has no `Content-Type`.
pub const DEFAULT_MEDIA_TYPE: &str = "text/plain";

/// A parsed `Content-Type` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    /// Lowercase `type/subtype`.
    pub mime_type: String,
    /// Parameters keyed by lowercase name.
    pub params: BTreeMap<String, String>,
}

impl MediaType {
    /// Top-level type, e.g. `"multipart"`.
    pub fn top_level(&self) -> &str {
        self.mime_type.split('/').next().unwrap_or("")
    }

    pub fn is_multipart(&self) -> bool {
        self.top_level() == "multipart"
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Parse a `Content-Type` value such as `multipart/mixed; boundary="abc"`.
///
/// Parameters come from [`mailparse::parse_content_type`], which unquotes
/// values and joins RFC 2231 continuations (`boundary*0`, `boundary*1`).
/// On top of that the type and subtype must both be RFC 2045 tokens.
pub fn parse_media_type(value: &str) -> std::result::Result<MediaType, String> {
    let type_part = value.split(';').next().unwrap_or("").trim();
    if type_part.is_empty() {
        return Err("no media type".into());
    }
    let (main, sub) = type_part
        .split_once('/')
        .ok_or_else(|| "expected slash after first token".to_string())?;
    if !is_token(main.trim()) || !is_token(sub.trim()) {
        return Err(format!("invalid media type {type_part:?}"));
    }

    let parsed = mailparse::parse_content_type(value);
    let params = parsed
        .params
        .into_iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value))
        .collect();

    Ok(MediaType {
        mime_type: format!("{}/{}", main.trim(), sub.trim()).to_ascii_lowercase(),
        params,
    })
}

/// Effective media type of a header block.
///
/// Absent `Content-Type` means `text/plain`; an unparsable one is an error.
pub fn media_type_of(headers: &HeaderMap) -> Result<MediaType> {
    let ct = headers.get("Content-Type").unwrap_or("");
    let ct = if ct.trim().is_empty() {
        DEFAULT_MEDIA_TYPE
    } else {
        ct
    };
    parse_media_type(ct)
        .map_err(|reason| MboxError::HeaderParse(format!("unknown media type {ct:?}: {reason}")))
}

/// Flatten a message body into its leaf parts.
///
/// Multipart containers are expanded recursively, in document order.
/// Anything else becomes a single part holding `headers` and the whole body.
pub fn body_parts(headers: &HeaderMap, body: &[u8]) -> Result<Vec<BodyPart>> {
    body_parts_with_depth(headers, body, DEFAULT_MAX_DEPTH)
}

/// [`body_parts`] with an explicit nesting limit.
pub fn body_parts_with_depth(
    headers: &HeaderMap,
    body: &[u8],
    max_depth: usize,
) -> Result<Vec<BodyPart>> {
    let mut out = Vec::new();
    collect_parts(headers, body, 0, max_depth, &mut out)?;
    Ok(out)
}

fn collect_parts(
    headers: &HeaderMap,
    body: &[u8],
    depth: usize,
    max_depth: usize,
    out: &mut Vec<BodyPart>,
) -> Result<()> {
    let media_type = media_type_of(headers)?;

    if !media_type.is_multipart() {
        out.push(BodyPart::new(headers.clone(), body.to_vec()));
        return Ok(());
    }

    if depth >= max_depth {
        return Err(MboxError::Mime(format!(
            "multipart nesting deeper than {max_depth} levels"
        )));
    }

    let boundary = media_type
        .param("boundary")
        .filter(|b| !b.is_empty())
        .ok_or_else(|| {
            MboxError::HeaderParse(format!(
                "{} without a boundary parameter",
                media_type.mime_type
            ))
        })?;

    for raw_part in split_multipart(body, boundary)? {
        let (mut part_headers, part_body) = parse_header_block(raw_part);
        let part_body = decode_quoted_printable(&mut part_headers, part_body)?;
        collect_parts(&part_headers, &part_body, depth + 1, max_depth, out)?;
    }
    Ok(())
}

/// Undo quoted-printable encoding of a multipart sub-part.
///
/// The `Content-Transfer-Encoding` header is dropped once the body is
/// decoded, so the stored part no longer claims an encoding. Other
/// encodings are left for [`BodyPart::decode`].
fn decode_quoted_printable<'a>(
    headers: &mut HeaderMap,
    body: &'a [u8],
) -> Result<Cow<'a, [u8]>> {
    let is_qp = headers
        .get("Content-Transfer-Encoding")
        .is_some_and(|enc| enc.trim().eq_ignore_ascii_case("quoted-printable"));
    if !is_qp {
        return Ok(Cow::Borrowed(body));
    }
    let decoded = decode_qp_lines(body)?;
    headers.remove("Content-Transfer-Encoding");
    Ok(Cow::Owned(decoded))
}

/// Decode quoted-printable text line by line.
///
/// Hard line breaks keep their stored form (`\n` or `\r\n`); a line ending
/// in `=` is a soft break and is joined to the next one.
fn decode_qp_lines(body: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(body.len());
    for line in body.split_inclusive(|&b| b == b'\n') {
        let content = line.strip_suffix(b"\n").unwrap_or(line);
        let content = content.strip_suffix(b"\r").unwrap_or(content);
        let ending = &line[content.len()..];

        let content = content.trim_ascii_end();
        let (content, soft_break) = match content.strip_suffix(b"=") {
            Some(joined) => (joined, true),
            None => (content, false),
        };
        let decoded = quoted_printable::decode(content, quoted_printable::ParseMode::Robust)
            .map_err(|err| MboxError::Mime(format!("quoted-printable body: {err}")))?;
        out.extend_from_slice(&decoded);
        if !soft_break {
            out.extend_from_slice(ending);
        }
    }
    Ok(out)
}

/// Split a multipart body into the raw bytes (headers + body) of each part.
///
/// The preamble before the first delimiter and the epilogue after the close
/// delimiter are dropped. The line break in front of a delimiter belongs to
/// the delimiter, not to the preceding part.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Result<Vec<&'a [u8]>> {
    let dash_boundary = format!("--{boundary}");
    let dash_boundary = dash_boundary.as_bytes();

    let mut parts = Vec::new();
    let mut part_start: Option<usize> = None;
    let mut pos = 0;

    while pos < body.len() {
        let line_end = body[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| pos + i + 1)
            .unwrap_or(body.len());
        let line = &body[pos..line_end];

        if let Some(kind) = delimiter_kind(line, dash_boundary) {
            if let Some(start) = part_start {
                parts.push(&body[start..strip_preceding_newline(body, start, pos)]);
            }
            match kind {
                Delimiter::Close => return Ok(parts),
                Delimiter::Part => part_start = Some(line_end),
            }
        }
        pos = line_end;
    }

    if part_start.is_none() {
        return Err(MboxError::Mime(format!(
            "no multipart delimiter for boundary {boundary:?}"
        )));
    }
    Err(MboxError::Mime(format!(
        "multipart body ended without close delimiter for boundary {boundary:?}"
    )))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    /// `--boundary`
    Part,
    /// `--boundary--`
    Close,
}

/// Classify a line as a delimiter line for `dash_boundary`, if it is one.
///
/// Trailing linear whitespace after the boundary is allowed.
fn delimiter_kind(line: &[u8], dash_boundary: &[u8]) -> Option<Delimiter> {
    let rest = line.strip_prefix(dash_boundary)?;
    let (kind, rest) = match rest.strip_prefix(b"--") {
        Some(after) => (Delimiter::Close, after),
        None => (Delimiter::Part, rest),
    };
    rest.iter()
        .all(|&b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
        .then_some(kind)
}

/// End offset of a part whose delimiter line starts at `delim_start`.
fn strip_preceding_newline(body: &[u8], part_start: usize, delim_start: usize) -> usize {
    let mut end = delim_start;
    if end > part_start && body[end - 1] == b'\n' {
        end -= 1;
        if end > part_start && body[end - 1] == b'\r' {
            end -= 1;
        }
    }
    end
}

/// RFC 2045 token characters.
fn is_token_char(c: char) -> bool {
    c.is_ascii_graphic() && !"()<>@,;:\\\"/[]?=".contains(c)
}

fn is_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_token_char)
}
