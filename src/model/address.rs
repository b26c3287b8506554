//! Email address parsing (RFC 5322 §3.4).

use crate::parser::header::decode_encoded_words;

/// A parsed email address.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `display_name = "Juan García"`, `address = "juan@ejemplo.com"`
/// - `"user@example.com"` → `display_name = ""`, `address = "user@example.com"`
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare email address (`user@domain`).
    pub address: String,
}

impl EmailAddress {
    /// Parse a single mailbox from a header value.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"user@domain.com (Display Name)"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Display, Name\" <user@domain.com>"`
    ///
    /// Encoded-words in the display name are decoded. Returns `None` when the
    /// value does not contain exactly one well-formed `local@domain`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        // "Display Name <address>" or "<address>"
        if let Some(angle_start) = trimmed.rfind('<') {
            let angle_end = trimmed.rfind('>')?;
            if angle_end < angle_start || !trimmed[angle_end + 1..].trim().is_empty() {
                return None;
            }
            let addr = trimmed[angle_start + 1..angle_end].trim();
            if !is_addr_spec(addr) {
                return None;
            }
            let name_part = trimmed[..angle_start].trim();
            return Some(Self {
                display_name: decode_encoded_words(&strip_quotes(name_part)),
                address: addr.to_string(),
            });
        }

        // "user@domain.com (Display Name)"
        if let (Some(open), true) = (trimmed.find('('), trimmed.ends_with(')')) {
            let addr = trimmed[..open].trim();
            if !is_addr_spec(addr) {
                return None;
            }
            let comment = &trimmed[open + 1..trimmed.len() - 1];
            return Some(Self {
                display_name: decode_encoded_words(comment.trim()),
                address: addr.to_string(),
            });
        }

        // Bare address: "user@domain.com"
        is_addr_spec(trimmed).then(|| Self {
            display_name: String::new(),
            address: trimmed.to_string(),
        })
    }

    /// An address that only carries a display name.
    pub fn name_only(name: impl Into<String>) -> Self {
        Self {
            display_name: name.into(),
            address: String::new(),
        }
    }

    /// Parse `raw`, falling back to a name-only address holding the raw value.
    pub fn parse_or_name(raw: &str) -> Self {
        Self::parse(raw).unwrap_or_else(|| Self::name_only(raw))
    }

    /// Format for display: `"Display Name <address>"` or just `"address"`.
    pub fn display(&self) -> String {
        match (self.display_name.is_empty(), self.address.is_empty()) {
            (true, _) => self.address.clone(),
            (false, true) => self.display_name.clone(),
            (false, false) => format!("{} <{}>", self.display_name, self.address),
        }
    }
}

/// `local@domain` with non-empty sides and no whitespace or list separators.
fn is_addr_spec(s: &str) -> bool {
    let Some((local, domain)) = s.rsplit_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !s
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '<' | '>' | ',' | ';' | '(' | ')'))
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}
