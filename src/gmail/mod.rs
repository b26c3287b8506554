//! Gmail Takeout specifics: hex ids, the delimiter format, and message assembly.

pub mod assemble;
pub mod ids;

pub use assemble::{LABELS_HEADER, THREAD_ID_HEADER};
pub use ids::{int_to_hex, message_id_from_delimiter};
