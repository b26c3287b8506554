//! Leaf body parts of a message.
//!
//! Base64 parts keep their encoded bytes and are decoded on demand.
//! Quoted-printable sub-parts arrive already decoded from the MIME walk.

use std::borrow::Cow;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use crate::error::Result;
use crate::parser::header::HeaderMap;
use crate::parser::mime::{parse_media_type, DEFAULT_MEDIA_TYPE};

/// Standard alphabet, padding required, non-zero trailing bits tolerated.
const BODY_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::RequireCanonical)
        .with_decode_allow_trailing_bits(true),
);

/// A single non-multipart part of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyPart {
    /// The part's own header block.
    pub headers: HeaderMap,
    /// Body bytes as stored, still base64-encoded where the part says so.
    pub body: Vec<u8>,
}

impl BodyPart {
    pub fn new(headers: HeaderMap, body: Vec<u8>) -> Self {
        Self { headers, body }
    }

    /// Effective lowercase media type, `text/plain` when absent or unparsable.
    pub fn mime_type(&self) -> String {
        self.headers
            .get("Content-Type")
            .and_then(|ct| parse_media_type(ct).ok())
            .map(|mt| mt.mime_type)
            .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string())
    }

    /// The `Content-Transfer-Encoding` header, if any.
    pub fn transfer_encoding(&self) -> Option<&str> {
        self.headers.get("Content-Transfer-Encoding").map(str::trim)
    }

    /// Body with its transfer encoding undone.
    ///
    /// Only base64 is decoded here (line breaks are ignored); every other
    /// encoding is returned as stored, without copying.
    pub fn decode(&self) -> Result<Cow<'_, [u8]>> {
        match self.transfer_encoding() {
            Some(enc) if enc.eq_ignore_ascii_case("base64") => {
                let compact: Vec<u8> = self
                    .body
                    .iter()
                    .copied()
                    .filter(|&b| b != b'\r' && b != b'\n')
                    .collect();
                Ok(Cow::Owned(BODY_BASE64.decode(compact)?))
            }
            _ => Ok(Cow::Borrowed(&self.body)),
        }
    }
}

/// First part satisfying `pred`, or `None`.
pub fn first_matching<F>(parts: &[BodyPart], mut pred: F) -> Option<&BodyPart>
where
    F: FnMut(&BodyPart) -> bool,
{
    parts.iter().find(|p| pred(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MboxError;

    fn part(headers: &[(&str, &str)], body: &[u8]) -> BodyPart {
        BodyPart::new(headers.iter().copied().collect(), body.to_vec())
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(part(&[], b"").mime_type(), "text/plain");
        assert_eq!(
            part(&[("Content-Type", "Text/HTML; charset=utf-8")], b"").mime_type(),
            "text/html"
        );
        assert_eq!(part(&[("Content-Type", "???")], b"").mime_type(), "text/plain");
    }

    #[test]
    fn test_decode_base64() {
        let p = part(
            &[("Content-Transfer-Encoding", "BASE64")],
            b"SGVsbG8s\r\nIHdvcmxk\r\nIQ==\r\n",
        );
        assert_eq!(&*p.decode().unwrap(), b"Hello, world!");
    }

    #[test]
    fn test_decode_invalid_base64() {
        let p = part(&[("Content-Transfer-Encoding", "base64")], b"not*base64!");
        assert!(matches!(p.decode(), Err(MboxError::Decode(_))));
    }

    #[test]
    fn test_decode_identity() {
        let p = part(&[], b"=E9 stays as-is\n");
        let decoded = p.decode().unwrap();
        assert!(matches!(decoded, Cow::Borrowed(_)));
        assert_eq!(&*decoded, b"=E9 stays as-is\n");

        let qp = part(&[("Content-Transfer-Encoding", "quoted-printable")], b"caf=E9");
        assert_eq!(&*qp.decode().unwrap(), b"caf=E9");
    }

    #[test]
    fn test_first_matching() {
        let parts = vec![
            part(&[("Content-Type", "text/html")], b"<b>1</b>"),
            part(&[("Content-Type", "text/plain")], b"2"),
            part(&[("Content-Type", "text/plain")], b"3"),
        ];
        let plain = first_matching(&parts, |p| p.mime_type() == "text/plain").unwrap();
        assert_eq!(plain.body, b"2");
        assert!(first_matching(&parts, |p| p.mime_type() == "image/png").is_none());
        assert!(first_matching(&[], |_| true).is_none());
    }
}
