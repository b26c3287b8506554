//! Gmail identifiers and the `From ` delimiter format of Takeout archives.
//!
//! Takeout writes delimiters like `From 1781240377215386625@xxx Sun Jun 11 20:53:34 +0000 2023`
//! where the number is the decimal message id. Gmail's APIs use the same ids
//! in lowercase hex.

use chrono::{DateTime, Utc};

use crate::error::{MboxError, Result};

/// Literal prefix of every delimiter line.
const DELIMITER_PREFIX: &str = "From ";

/// Marker that ends the id in a Takeout delimiter.
const ID_SENTINEL: &str = "@xxx";

/// Timestamp layout after the id, e.g. `Sun Jun 11 20:53:34 +0000 2023`.
pub const DELIMITER_DATE_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Re-encode a base-10 integer string as lowercase hex.
///
/// Values outside the signed 64-bit range are rejected; negative values keep
/// their sign (`-10` → `-a`).
pub fn int_to_hex(int_str: &str) -> Result<String> {
    let value: i64 = int_str.parse().map_err(|source| MboxError::InvalidId {
        value: int_str.to_string(),
        source,
    })?;
    Ok(if value < 0 {
        format!("-{:x}", value.unsigned_abs())
    } else {
        format!("{value:x}")
    })
}

/// Extract the hex message id from a delimiter line.
pub fn message_id_from_delimiter(line: &str) -> Result<String> {
    let rest = line.strip_prefix(DELIMITER_PREFIX).unwrap_or(line);
    let id = rest.split_once(ID_SENTINEL).map_or(rest, |(id, _)| id);
    int_to_hex(id.trim()).map_err(|e| MboxError::DelimiterParse {
        line: line.to_string(),
        reason: e.to_string(),
    })
}

/// Parse the timestamp that follows the id in a delimiter line.
///
/// Only lines with exactly one `@xxx ` marker are considered.
pub fn date_from_delimiter(line: &str) -> Option<DateTime<Utc>> {
    let sentinel = format!("{ID_SENTINEL} ");
    let mut pieces = line.split(sentinel.as_str());
    let (_, date, None) = (pieces.next()?, pieces.next()?, pieces.next()) else {
        return None;
    };
    DateTime::parse_from_str(date.trim(), DELIMITER_DATE_FORMAT)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_to_hex() {
        assert_eq!(int_to_hex("123").unwrap(), "7b");
        assert_eq!(int_to_hex("0").unwrap(), "0");
        assert_eq!(int_to_hex("255").unwrap(), "ff");
        assert_eq!(
            int_to_hex("1781240377215386625").unwrap(),
            "18b83caf87818401"
        );
        assert_eq!(int_to_hex("-10").unwrap(), "-a");
    }

    #[test]
    fn test_int_to_hex_round_trip() {
        for id in ["1", "124", "1500000000000000000", "9223372036854775807"] {
            let hex = int_to_hex(id).unwrap();
            assert_eq!(hex, hex.to_lowercase());
            let back = i64::from_str_radix(&hex, 16).unwrap();
            assert_eq!(back.to_string(), id);
        }
    }

    #[test]
    fn test_int_to_hex_rejects_non_integers() {
        for bad in ["", "abc", "12a", "1.5", "9223372036854775808", " 1"] {
            assert!(
                matches!(int_to_hex(bad), Err(MboxError::InvalidId { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_message_id_from_delimiter() {
        assert_eq!(
            message_id_from_delimiter("From 123@xxx Mon Jan 1 00:00:00 2001").unwrap(),
            "7b"
        );
        assert_eq!(
            message_id_from_delimiter("From 124@xxx Mon Jan 1 00:00:01 2001").unwrap(),
            "7c"
        );
        assert_eq!(message_id_from_delimiter("From 42@xxx").unwrap(), "2a");
    }

    #[test]
    fn test_message_id_from_bad_delimiter() {
        let err = message_id_from_delimiter("From user@example.com Thu Jan 04 10:00:00 2024")
            .unwrap_err();
        match err {
            MboxError::DelimiterParse { line, .. } => {
                assert!(line.starts_with("From user@example.com"))
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(message_id_from_delimiter("").is_err());
    }

    #[test]
    fn test_date_from_delimiter() {
        let dt = date_from_delimiter("From 1@xxx Sun Jun 11 20:53:34 +0000 2023").unwrap();
        assert_eq!(dt.to_rfc3339(), "2023-06-11T20:53:34+00:00");

        let shifted = date_from_delimiter("From 1@xxx Thu Jan 04 10:00:00 +0200 2024").unwrap();
        assert_eq!(shifted.format("%H:%M").to_string(), "08:00");
    }

    #[test]
    fn test_date_from_delimiter_failures() {
        assert!(date_from_delimiter("From 1@xxx Mon Jan 1 00:00:00 2001").is_none());
        assert!(date_from_delimiter("From 1 Sun Jun 11 20:53:34 +0000 2023").is_none());
        assert!(
            date_from_delimiter("From 1@xxx Sun Jun 11 20:53:34 +0000 2023@xxx again").is_none()
        );
    }
}
