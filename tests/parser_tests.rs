//! Integration tests for the MBOX scanner, MIME decomposition, and message assembly.

use std::io::Cursor;
use std::path::Path;

use gmail_mbox::error::MboxError;
use gmail_mbox::model::message::GmailMessage;
use gmail_mbox::model::part::first_matching;
use gmail_mbox::parser::header::split_message;
use gmail_mbox::parser::mbox::MboxScanner;
use gmail_mbox::parser::mime::body_parts;

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn scanner_over(data: &[u8]) -> MboxScanner<Cursor<Vec<u8>>> {
    MboxScanner::new(Cursor::new(data.to_vec()))
}

// ─── Scanner ────────────────────────────────────────────────────────

#[test]
fn test_crlf_archive_two_messages() {
    let data = b"From 123@xxx Mon Jan 1 00:00:00 2001\r\nX-Gm-Thrid: 1\r\n\r\nhello\r\n\
From 124@xxx Mon Jan 1 00:00:01 2001\r\nX-Gm-Thrid: 1\r\n\r\nworld\r\n";
    let scanner = scanner_over(data);

    let first = scanner.next_message().unwrap().unwrap();
    assert_eq!(first.delimiter, "From 123@xxx Mon Jan 1 00:00:00 2001");
    let (_, body) = split_message(&first.bytes).unwrap();
    assert_eq!(body, b"hello\n");

    let second = scanner.next_message().unwrap().unwrap();
    let (_, body) = split_message(&second.bytes).unwrap();
    assert_eq!(body, b"world\n");

    assert!(scanner.next_message().unwrap().is_none());
    assert!(scanner.next_message().unwrap().is_none());

    let ids: Vec<String> = [first, second]
        .iter()
        .map(|s| gmail_mbox::gmail::message_id_from_delimiter(&s.delimiter).unwrap())
        .collect();
    assert_eq!(ids, vec!["7b", "7c"]);
}

#[test]
fn test_count_fixture_and_keep_position() {
    let scanner = MboxScanner::open(fixture("takeout.mbox")).unwrap();
    assert_eq!(scanner.count_messages().unwrap(), 5);

    scanner.next_message().unwrap().unwrap();
    let pos = scanner.position().unwrap();
    assert_eq!(scanner.count_messages().unwrap(), 5);
    assert_eq!(scanner.count_messages().unwrap(), 5);
    assert_eq!(scanner.position().unwrap(), pos);

    assert_eq!(scanner.messages().count(), 4);
}

#[test]
fn test_open_missing_file() {
    let err = MboxScanner::open(fixture("does-not-exist.mbox"))
        .err()
        .unwrap();
    assert!(matches!(err, MboxError::FileNotFound(_)));
    assert!(err.is_fatal());
}

#[test]
fn test_line_too_long_is_fatal() {
    let mut data = b"From 1@xxx\nX-Gm-Thrid: 1\n\n".to_vec();
    data.extend(std::iter::repeat(b'a').take(2048));
    data.push(b'\n');
    let scanner = MboxScanner::with_max_line_size(Cursor::new(data), 1024);
    let err = scanner.next_message().unwrap_err();
    assert!(matches!(err, MboxError::LineTooLong { line: 4, limit: 1024 }));
    assert!(err.is_fatal());
}

// ─── Body decomposition ─────────────────────────────────────────────

#[test]
fn test_alternative_first_matching() {
    let raw = b"Content-Type: multipart/alternative; boundary=XYZ\n\
\n\
--XYZ\n\
Content-Type: text/plain\n\
\n\
plain body\n\
--XYZ\n\
Content-Type: text/html\n\
\n\
<p>html body</p>\n\
--XYZ--\n";
    let (headers, body) = split_message(raw).unwrap();
    let parts = body_parts(&headers, body).unwrap();
    assert_eq!(parts.len(), 2);

    let plain = first_matching(&parts, |p| p.mime_type() == "text/plain").unwrap();
    assert_eq!(plain.decode().unwrap().as_ref(), b"plain body");
    assert!(first_matching(&parts, |p| p.mime_type() == "application/pdf").is_none());
}

#[test]
fn test_nested_parts_flatten_in_order() {
    let scanner = MboxScanner::open(fixture("takeout.mbox")).unwrap();
    scanner.next_message().unwrap().unwrap();
    let span = scanner.next_message().unwrap().unwrap();

    let (headers, body) = split_message(&span.bytes).unwrap();
    let parts = body_parts(&headers, body).unwrap();
    let types: Vec<String> = parts.iter().map(|p| p.mime_type()).collect();
    assert_eq!(types, vec!["text/plain", "text/html", "image/png"]);
    assert!(parts.iter().all(|p| !p.mime_type().starts_with("multipart/")));

    let png = parts[2].decode().unwrap();
    assert_eq!(png.as_ref(), (0u8..48).collect::<Vec<u8>>().as_slice());
}

// ─── Assembly ───────────────────────────────────────────────────────

fn assembled_fixture() -> Vec<Result<GmailMessage, MboxError>> {
    let scanner = MboxScanner::open(fixture("takeout.mbox")).unwrap();
    scanner
        .messages()
        .map(|span| GmailMessage::from_span(&span.unwrap()))
        .collect()
}

#[test]
fn test_assemble_fixture_messages() {
    let results = assembled_fixture();
    assert_eq!(results.len(), 5);

    let first = results[0].as_ref().unwrap();
    assert_eq!(first.message_id, "18b83caf87818401");
    assert_eq!(first.thread_id, "18b83caf87818401");
    assert_eq!(first.subject, "Café tomorrow");
    assert_eq!(first.from.display_name, "Alice Example");
    assert_eq!(first.from.address, "alice@example.com");
    assert_eq!(first.to, "Bob <bob@example.com>");
    assert_eq!(first.labels, vec!["Inbox", "Important", "Opened"]);
    assert_eq!(first.date.to_rfc3339(), "2023-06-11T20:53:30+00:00");
    assert_eq!(
        first.plain_text_body().unwrap().as_deref(),
        Some("See you at the café.\n".as_bytes())
    );

    let second = results[1].as_ref().unwrap();
    assert_eq!(second.message_id, "18ccb308359f8001");
    assert_eq!(second.thread_id, first.thread_id);
    assert_eq!(second.from.display_name, "Bob");
    assert_eq!(second.parts.len(), 3);
    assert_eq!(
        second.plain_text_body().unwrap().as_deref(),
        Some(&b"Hi Bob,\nthe report is attached.\n"[..])
    );
    assert_eq!(
        second.html_body().unwrap().as_deref(),
        Some(&b"<p>Hi Bob,</p>"[..])
    );

    let third = results[2].as_ref().unwrap();
    assert_eq!(third.labels, vec![String::new()]);
    assert_eq!(third.from.display_name, "undisclosed sender");
    assert_eq!(third.from.address, "");
    assert_eq!(third.date.to_rfc3339(), "2001-01-01T00:00:00+00:00");

    assert!(matches!(results[3], Err(MboxError::DelimiterParse { .. })));

    // The malformed base64 only surfaces when the body is decoded.
    let fifth = results[4].as_ref().unwrap();
    assert!(matches!(fifth.plain_text_body(), Err(MboxError::Decode(_))));
}

#[test]
fn test_quoted_printable_text_part_in_archive() {
    let data = b"From 1781240377215386625@xxx Sun Jun 11 20:53:34 +0000 2023\n\
X-Gm-Thrid: 1781240377215386625\n\
Subject: menu\n\
Content-Type: multipart/alternative; boundary=\"qp\"\n\
\n\
--qp\n\
Content-Type: text/plain; charset=utf-8\n\
Content-Transfer-Encoding: quoted-printable\n\
\n\
Caf=C3=A9 soft=\n\
break\n\
--qp\n\
Content-Type: text/html; charset=utf-8\n\
Content-Transfer-Encoding: quoted-printable\n\
\n\
<p>Caf=C3=A9</p>\n\
--qp--\n";
    let scanner = scanner_over(data);
    let span = scanner.next_message().unwrap().unwrap();
    let msg = GmailMessage::from_span(&span).unwrap();

    assert_eq!(
        msg.plain_text_body().unwrap().as_deref(),
        Some("Café softbreak".as_bytes())
    );
    assert_eq!(
        msg.html_body().unwrap().as_deref(),
        Some("<p>Café</p>".as_bytes())
    );
    assert!(msg
        .parts
        .iter()
        .all(|p| p.transfer_encoding().is_none()));
}

#[test]
fn test_size_is_span_length() {
    let scanner = MboxScanner::open(fixture("takeout.mbox")).unwrap();
    let span = scanner.next_message().unwrap().unwrap();
    let msg = GmailMessage::from_span(&span).unwrap();
    assert_eq!(msg.size, span.bytes.len() as u64);
    assert!(!span.bytes.starts_with(b"From "));
}
