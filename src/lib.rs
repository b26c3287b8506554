//! `gmail-mbox`: import Gmail Takeout MBOX archives into SQLite.
//!
//! This crate provides a streaming MBOX scanner, a MIME body decomposer, and
//! the assembly of Gmail-specific message records, plus an import driver that
//! persists them through a [`store::MessageSink`].

pub mod config;
pub mod error;
pub mod gmail;
pub mod import;
pub mod model;
pub mod parser;
pub mod store;
