//! Artifact checksum newtype.

use serde::{Deserialize, Serialize};

/// Sentinel checksum value meaning "verify existence only".
pub const NOCHECK: &str = "NOCHECK";

/// A declared artifact checksum: a SHA-256 hex digest, or the literal
/// [`NOCHECK`] sentinel for artifacts that are only checked for presence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    /// Wrap a raw checksum string without validation.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if this is the existence-only sentinel.
    pub fn is_nocheck(&self) -> bool {
        self.0 == NOCHECK
    }

    /// True if the value is either the sentinel or a plausible SHA-256
    /// digest (64 ASCII hex characters).
    pub fn is_well_formed(&self) -> bool {
        self.is_nocheck() || (self.0.len() == 64 && self.0.chars().all(|c| c.is_ascii_hexdigit()))
    }

    /// Case-insensitive comparison against a computed hex digest.
    pub fn matches(&self, hex_digest: &str) -> bool {
        self.0.eq_ignore_ascii_case(hex_digest)
    }
}

impl std::fmt::Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Checksum {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_well_formed() {
        assert!(Checksum::from(NOCHECK).is_well_formed());
        assert!(Checksum::from(NOCHECK).is_nocheck());
    }

    #[test]
    fn hex_digest_is_well_formed() {
        let c = Checksum::new("a".repeat(64));
        assert!(c.is_well_formed());
        assert!(!c.is_nocheck());
    }

    #[test]
    fn short_or_garbage_is_rejected() {
        assert!(!Checksum::from("abc123").is_well_formed());
        assert!(!Checksum::new("z".repeat(64)).is_well_formed());
        assert!(!Checksum::from("").is_well_formed());
    }

    #[test]
    fn matches_ignores_case() {
        let c = Checksum::new("AB".repeat(32));
        assert!(c.matches(&"ab".repeat(32)));
    }
}
