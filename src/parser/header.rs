//! RFC 5322 header handling: header/body split, folding, encoded-words
//! (RFC 2047), and date parsing.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::warn;

use crate::error::{MboxError, Result};

/// Base64 flavour for encoded-words: padding optional, sloppy tails accepted.
const ENCODED_WORD_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Ordered multimap of header fields.
///
/// Names keep their original spelling; lookups are case-insensitive.
/// Values are unfolded but otherwise raw (encoded-words are not decoded).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    fields: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, keeping any earlier fields with the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name`, in document order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Drop every field named `name`.
    pub fn remove(&mut self, name: &str) {
        self.fields.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    /// All `(name, value)` pairs in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Group values under their canonical field name, in first-seen order.
    fn grouped(&self) -> Vec<(String, Vec<&str>)> {
        let mut groups: Vec<(String, Vec<&str>)> = Vec::new();
        for (name, value) in &self.fields {
            let key = canonical_key(name);
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, values)) => values.push(value),
                None => groups.push((key, vec![value])),
            }
        }
        groups
    }
}

/// Canonical spelling of a field name: `x-gm-THRID` becomes `X-Gm-Thrid`.
///
/// The first letter and every letter after a hyphen are uppercased, the rest
/// lowercased. Names containing bytes that are not valid in a field name
/// (space, control characters, non-ASCII) are returned unchanged.
pub fn canonical_key(name: &str) -> String {
    let valid = name
        .bytes()
        .all(|b| b.is_ascii_graphic() && b != b':');
    if !valid {
        return name.to_string();
    }
    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            out
        })
        .collect()
}

/// Serialized as a JSON-style object keyed by canonical name:
/// `{"Content-Type": ["value", ...], ...}`.
impl Serialize for HeaderMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let groups = self.grouped();
        let mut map = serializer.serialize_map(Some(groups.len()))?;
        for (name, values) in &groups {
            map.serialize_entry(name, values)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = HeaderMap::new();
        for (k, v) in iter {
            map.append(k, v);
        }
        map
    }
}

/// Split a raw message into its headers and body.
///
/// The body starts after the first blank line. A message with no blank line
/// is all headers and has an empty body. Empty input is an error: there is
/// no message to identify.
pub fn split_message(raw: &[u8]) -> Result<(HeaderMap, &[u8])> {
    if raw.is_empty() {
        return Err(MboxError::HeaderParse("message is empty".into()));
    }
    Ok(parse_header_block(raw))
}

/// Parse a header block and return it with the bytes that follow it.
///
/// Used for both top-level messages and MIME sub-parts; an empty header block
/// (input starting with a blank line) is valid here.
pub fn parse_header_block(data: &[u8]) -> (HeaderMap, &[u8]) {
    let (header_end, body_start) = find_header_end(data).unwrap_or((data.len(), data.len()));
    let text = decode_header_bytes(&data[..header_end]);
    (unfold_headers(&text), &data[body_start..])
}

/// Locate the blank line that ends the header block.
///
/// Returns `(start of the blank line, first byte after it)`.
fn find_header_end(data: &[u8]) -> Option<(usize, usize)> {
    let mut pos = 0;
    while pos < data.len() {
        let end = data[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map(|i| pos + i + 1)
            .unwrap_or(data.len());
        let line = &data[pos..end];
        let line = line.strip_suffix(b"\n").unwrap_or(line);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            return Some((pos, end));
        }
        pos = end;
    }
    None
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    // Strip BOM if present
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Unfold headers: join continuation lines (starting with space or tab) with
/// the previous field, separated by a single space.
fn unfold_headers(text: &str) -> HeaderMap {
    let mut fields: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = fields.last_mut() {
                let cont = line.trim();
                if !cont.is_empty() {
                    if !last.1.is_empty() {
                        last.1.push(' ');
                    }
                    last.1.push_str(cont);
                }
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim();
            if name.is_empty() {
                continue;
            }
            let value = line[colon_pos + 1..].trim();
            fields.push((name.to_string(), value.to_string()));
        }
        // Lines without a colon and not a continuation are silently skipped
    }

    HeaderMap { fields }
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// If decoding fails for any token, the original text is preserved.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        // If the gap between two encoded words is only whitespace, skip it (RFC 2047 §6.2)
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        let after_start = &remaining[start + 2..];

        if let Some(decoded) = try_decode_one_word(after_start) {
            result.push_str(&decoded.text);
            remaining = &remaining[start + 2 + decoded.consumed..];
            last_was_encoded = true;
        } else {
            result.push_str("=?");
            remaining = after_start;
            last_was_encoded = false;
        }
    }

    result.push_str(remaining);
    result
}

struct DecodedWord {
    text: String,
    consumed: usize, // bytes consumed from the string *after* the initial "=?"
}

fn try_decode_one_word(s: &str) -> Option<DecodedWord> {
    // Format: charset?encoding?encoded_text?=
    let first_q = s.find('?')?;
    let charset = &s[..first_q];

    let rest = &s[first_q + 1..];
    let second_q = rest.find('?')?;
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let end = rest2.find("?=")?;
    let encoded_text = &rest2[..end];

    let total_consumed = first_q + 1 + second_q + 1 + end + 2;

    let bytes = match encoding.to_ascii_uppercase().as_str() {
        "B" => {
            let compact: String = encoded_text.split_whitespace().collect();
            ENCODED_WORD_BASE64.decode(compact).ok()?
        }
        "Q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    // RFC 2231 language suffix: "utf-8*en"
    let charset = charset.split('*').next().unwrap_or(charset);

    Some(DecodedWord {
        text: decode_charset(charset, &bytes),
        consumed: total_consumed,
    })
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                match std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                {
                    Some(byte) => {
                        result.push(byte);
                        i += 3;
                    }
                    None => {
                        result.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

/// Decode bytes using a named charset.
fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    match charset.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => String::from_utf8_lossy(bytes).into_owned(),
        _ => {
            if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
                let (decoded, _, _) = encoding.decode(bytes);
                decoded.into_owned()
            } else {
                warn!(
                    charset = charset,
                    "Unknown charset, falling back to UTF-8 lossy"
                );
                String::from_utf8_lossy(bytes).into_owned()
            }
        }
    }
}

/// Parse an email date string in various common formats.
///
/// Supports RFC 2822, ISO 8601, and many broken real-world variants.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    // Remove leading day-of-week and any trailing "(UTC)"-style comment
    let no_dow = strip_day_of_week(strip_trailing_comment(trimmed));

    let formats = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M %z",
        "%d %b %Y %H:%M:%S",
        "%b %d %H:%M:%S %Y",
        "%Y-%m-%dT%H:%M:%S%z",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S",
    ];

    for fmt in &formats {
        if let Ok(dt) = DateTime::parse_from_str(&no_dow, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&no_dow, fmt) {
            return Some(Utc.from_utc_datetime(&ndt));
        }
    }

    // Replace named timezones with offsets and try again
    let replaced = replace_named_tz(&no_dow);
    for fmt in &formats {
        if let Ok(dt) = DateTime::parse_from_str(&replaced, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    // Try using mail-parser's date parsing as last resort
    if let Some(dt) = mail_parser_date(trimmed) {
        return Some(dt);
    }

    warn!(date = trimmed, "Could not parse date");
    None
}

/// Attempt to parse a date using `mail-parser`'s built-in parser.
fn mail_parser_date(input: &str) -> Option<DateTime<Utc>> {
    use mail_parser::MessageParser;

    // Wrap input in a minimal RFC 5322 message so mail-parser can parse it
    let fake_msg = format!("Date: {input}\n\n");
    let parser = MessageParser::default();
    let parsed = parser.parse(fake_msg.as_bytes())?;
    let dt = parsed.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&dt)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Strip a trailing parenthesized comment, e.g. `"... +0000 (UTC)"`.
fn strip_trailing_comment(s: &str) -> &str {
    match (s.rfind('('), s.ends_with(')')) {
        (Some(open), true) => s[..open].trim_end(),
        _ => s,
    }
}

/// Strip leading day-of-week prefix (e.g. "Thu, " or "Thu ").
fn strip_day_of_week(s: &str) -> String {
    let days = [
        "Mon,", "Tue,", "Wed,", "Thu,", "Fri,", "Sat,", "Sun,", "Mon ", "Tue ", "Wed ", "Thu ",
        "Fri ", "Sat ", "Sun ",
    ];
    for day in &days {
        if let Some(rest) = s.strip_prefix(day) {
            return rest.trim().to_string();
        }
    }
    s.to_string()
}

/// Replace well-known timezone abbreviations with numeric offsets.
fn replace_named_tz(s: &str) -> String {
    let tzs = [
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("CET", "+0100"),
        ("CEST", "+0200"),
        ("JST", "+0900"),
    ];
    let mut result = s.to_string();
    for (name, offset) in &tzs {
        if result.ends_with(name) {
            let pos = result.len() - name.len();
            result.replace_range(pos.., offset);
            return result;
        }
    }
    result
}
