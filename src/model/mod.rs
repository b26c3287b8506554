//! Core data model types for messages, addresses, and body parts.

pub mod address;
pub mod message;
pub mod part;
