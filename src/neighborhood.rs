//! The join key shared by every source table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized neighborhood identifier.
///
/// Case-folded, with every run of whitespace, hyphens, underscores or other
/// punctuation collapsed into a single `-`. Apostrophes and periods are
/// dropped so `"St. Mary's"` and `"st-marys"` meet on the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NeighborhoodKey(String);

impl NeighborhoodKey {
    /// Normalizes a raw label. Returns `None` when nothing is left.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut key = String::with_capacity(raw.len());
        let mut pending_sep = false;

        for c in raw.trim().chars() {
            if c == '\'' || c == '.' || c == '\u{2019}' {
                continue;
            }
            if c.is_alphanumeric() {
                if pending_sep && !key.is_empty() {
                    key.push('-');
                }
                pending_sep = false;
                key.extend(c.to_lowercase());
            } else {
                pending_sep = true;
            }
        }

        if key.is_empty() { None } else { Some(Self(key)) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NeighborhoodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spelling_variants_share_a_key() {
        let variants = ["Five Points", "five-points", "FIVE_POINTS", "  five   points ", "Five - Points"];
        for v in variants {
            assert_eq!(NeighborhoodKey::parse(v).unwrap().as_str(), "five-points", "{v}");
        }
    }

    #[test]
    fn test_punctuation_is_dropped() {
        let key = NeighborhoodKey::parse("St. Mary's Hill").unwrap();
        assert_eq!(key.as_str(), "st-marys-hill");
    }

    #[test]
    fn test_empty_label_has_no_key() {
        assert!(NeighborhoodKey::parse("").is_none());
        assert!(NeighborhoodKey::parse("  -- ").is_none());
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let key = NeighborhoodKey::parse("Capitol Hill").unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"capitol-hill\"");
    }
}
