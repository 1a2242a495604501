//! ULID-based identifier generation with prefixes.
//!
//! Identifiers in storyline follow the pattern: `prefix_ulid`
//! For example: `ver_01hqxyz...` for versions.

use ulid::Ulid;

/// Known identifier prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPrefix {
    Story,
    Version,
    Snapshot,
    Merge,
}

impl IdPrefix {
    /// Get the string prefix for this identifier type.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdPrefix::Story => "sty",
            IdPrefix::Version => "ver",
            IdPrefix::Snapshot => "snp",
            IdPrefix::Merge => "mrg",
        }
    }

    /// Parse a prefix from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sty" => Some(IdPrefix::Story),
            "ver" => Some(IdPrefix::Version),
            "snp" => Some(IdPrefix::Snapshot),
            "mrg" => Some(IdPrefix::Merge),
            _ => None,
        }
    }
}

/// Identifier generation and parsing utilities.
pub struct Identifier;

impl Identifier {
    /// Generate a new ascending identifier (newer = larger).
    pub fn ascending(prefix: IdPrefix) -> String {
        Self::with_ulid(prefix, Ulid::new())
    }

    /// Generate a new descending identifier (newer = smaller).
    ///
    /// Story IDs use this so that the most recent stories sort first.
    pub fn descending(prefix: IdPrefix) -> String {
        let inverted = Ulid(!Ulid::new().0);
        Self::with_ulid(prefix, inverted)
    }

    /// Generate an identifier with a specific ULID (for testing or imports).
    pub fn with_ulid(prefix: IdPrefix, ulid: Ulid) -> String {
        format!("{}_{}", prefix.as_str(), ulid.to_string().to_lowercase())
    }

    /// Parse an identifier into its prefix and ULID parts.
    pub fn parse(id: &str) -> Option<(IdPrefix, Ulid)> {
        let (prefix, rest) = id.split_once('_')?;
        let prefix = IdPrefix::parse(prefix)?;
        let ulid = Ulid::from_string(rest).ok()?;
        Some((prefix, ulid))
    }

    /// Check if an identifier has the expected prefix.
    pub fn has_prefix(id: &str, prefix: IdPrefix) -> bool {
        id.strip_prefix(prefix.as_str())
            .is_some_and(|rest| rest.starts_with('_'))
    }

    /// Generate a story ID (descending for recency sort).
    pub fn story() -> String {
        Self::descending(IdPrefix::Story)
    }

    /// Generate a version ID.
    pub fn version() -> String {
        Self::ascending(IdPrefix::Version)
    }

    /// Generate a snapshot ID.
    pub fn snapshot() -> String {
        Self::ascending(IdPrefix::Snapshot)
    }

    /// Generate a merge session ID.
    pub fn merge() -> String {
        Self::ascending(IdPrefix::Merge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascending_id() {
        let id = Identifier::ascending(IdPrefix::Version);
        assert!(id.starts_with("ver_"));
        assert_eq!(id.len(), 30); // "ver_" (4) + ULID (26)
    }

    #[test]
    fn test_ascending_order() {
        let id1 = Identifier::snapshot();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = Identifier::snapshot();
        assert!(id1 < id2, "Ascending IDs should increase over time");
    }

    #[test]
    fn test_descending_order() {
        let id1 = Identifier::story();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = Identifier::story();
        assert!(id1 > id2, "Descending IDs should decrease over time");
    }

    #[test]
    fn test_parse_id() {
        let id = Identifier::version();
        let (prefix, _ulid) = Identifier::parse(&id).unwrap();
        assert_eq!(prefix, IdPrefix::Version);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Identifier::parse("nounderscore").is_none());
        assert!(Identifier::parse("xyz_01HQXYZ").is_none());
        assert!(Identifier::parse("snp_notaulid").is_none());
    }

    #[test]
    fn test_with_ulid_round_trips() {
        let ulid = Ulid::new();
        let id = Identifier::with_ulid(IdPrefix::Merge, ulid);
        let (prefix, parsed) = Identifier::parse(&id).unwrap();
        assert_eq!(prefix, IdPrefix::Merge);
        assert_eq!(parsed, ulid);
    }

    #[test]
    fn test_has_prefix() {
        let id = Identifier::story();
        assert!(Identifier::has_prefix(&id, IdPrefix::Story));
        assert!(!Identifier::has_prefix(&id, IdPrefix::Version));
        assert!(!Identifier::has_prefix("sty123", IdPrefix::Story));
    }

    #[test]
    fn test_prefix_parse_all_variants() {
        for prefix in [
            IdPrefix::Story,
            IdPrefix::Version,
            IdPrefix::Snapshot,
            IdPrefix::Merge,
        ] {
            assert_eq!(IdPrefix::parse(prefix.as_str()), Some(prefix));
        }
        assert_eq!(IdPrefix::parse("unknown"), None);
    }
}
