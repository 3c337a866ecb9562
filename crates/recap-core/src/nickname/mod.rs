//! Participant display names
//!
//! A participant may register a nickname override; otherwise the transport's
//! profile name is used, and as a last resort a fixed placeholder.

mod repository;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

pub use repository::{NicknameRecord, NicknameRepository};

/// Longest accepted display name, in characters
pub const MAX_DISPLAY_NAME_CHARS: usize = 32;

/// Used when neither an override nor a profile name is available
pub const PLACEHOLDER_NAME: &str = "Participant";

/// A non-empty name of at most [`MAX_DISPLAY_NAME_CHARS`] characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisplayName(String);

impl DisplayName {
    /// Pick the first usable candidate: override, then fallback, then placeholder
    pub fn resolve(override_name: Option<&str>, fallback: Option<&str>) -> Self {
        [override_name, fallback]
            .into_iter()
            .flatten()
            .find_map(Self::from_candidate)
            .unwrap_or_else(Self::placeholder)
    }

    /// The literal placeholder name
    pub fn placeholder() -> Self {
        Self(PLACEHOLDER_NAME.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_candidate(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        // Profile names are not length-checked upstream
        let clipped: String = trimmed.chars().take(MAX_DISPLAY_NAME_CHARS).collect();
        Some(Self(clipped.trim_end().to_string()))
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DisplayName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Validate a user-supplied nickname, returning the trimmed value
pub fn validate_nickname(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidInput("nickname cannot be empty".to_string()));
    }

    let len = trimmed.chars().count();
    if len > MAX_DISPLAY_NAME_CHARS {
        return Err(Error::NicknameTooLong(len, MAX_DISPLAY_NAME_CHARS));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_override_wins() {
        let name = DisplayName::resolve(Some("Alex"), Some("Alexander Smith"));
        assert_eq!(name.as_str(), "Alex");
    }

    #[test]
    fn test_blank_override_falls_back() {
        let name = DisplayName::resolve(Some("   "), Some("  Maria Ivanova "));
        assert_eq!(name.as_str(), "Maria Ivanova");
    }

    #[test]
    fn test_placeholder_when_nothing_usable() {
        assert_eq!(DisplayName::resolve(None, None).as_str(), PLACEHOLDER_NAME);
        assert_eq!(DisplayName::resolve(Some(""), Some(" ")).as_str(), PLACEHOLDER_NAME);
        assert_eq!(DisplayName::resolve(None, Some("\t")).as_str(), PLACEHOLDER_NAME);
    }

    #[test]
    fn test_never_empty() {
        let candidates = [None, Some(""), Some("  "), Some("Bo")];
        for o in candidates {
            for f in candidates {
                assert!(!DisplayName::resolve(o, f).as_str().is_empty());
            }
        }
    }

    #[test]
    fn test_long_fallback_is_clipped_by_chars() {
        let long = "Ж".repeat(40);
        let name = DisplayName::resolve(None, Some(&long));
        assert_eq!(name.as_str().chars().count(), MAX_DISPLAY_NAME_CHARS);
    }

    #[test]
    fn test_validate_nickname_length_bound() {
        let ok = "a".repeat(32);
        assert_eq!(validate_nickname(&ok).unwrap(), ok);

        let err = validate_nickname(&"a".repeat(33)).unwrap_err();
        assert!(matches!(err, Error::NicknameTooLong(33, 32)));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_validate_nickname_trims_and_rejects_blank() {
        assert_eq!(validate_nickname("  Alex ").unwrap(), "Alex");
        let err = validate_nickname("   ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
