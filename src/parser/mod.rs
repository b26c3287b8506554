//! Email parsing: MBOX streaming scanner, header splitting and decoding, and MIME decomposition.

pub mod header;
pub mod mbox;
pub mod mime;
