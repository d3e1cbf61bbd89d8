/// Normalization of table identifiers into digit-only keys

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use crate::error::NotifyError;

/// Matches every run of characters outside ASCII 0-9
fn non_digit_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"[^0-9]+").unwrap())
}

/// A non-empty, digit-only table identifier.
///
/// Derived from whatever the order source calls the table (`"T-05"`,
/// `"Table 12"`, `7`) by dropping every non-digit character. Leading zeros
/// are kept, so `"05"` and `"5"` are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableKey(String);

impl TableKey {
    /// Normalize a raw table identifier.
    ///
    /// # Examples
    /// ```
    /// use tablechime_lib::TableKey;
    ///
    /// assert_eq!(TableKey::parse("Table 12").unwrap().as_str(), "12");
    /// assert!(TableKey::parse("bar").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, NotifyError> {
        let digits = non_digit_regex().replace_all(raw, "");
        if digits.is_empty() {
            return Err(NotifyError::Validation {
                input: raw.to_string(),
            });
        }
        Ok(Self(digits.into_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TableKey {
    type Error = NotifyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TableKey> for String {
    fn from(key: TableKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_digits() {
        assert_eq!(TableKey::parse("5").unwrap().as_str(), "5");
    }

    #[test]
    fn test_strips_prefix_and_spaces() {
        assert_eq!(TableKey::parse("Table 12").unwrap().as_str(), "12");
        assert_eq!(TableKey::parse("T-3").unwrap().as_str(), "3");
    }

    #[test]
    fn test_joins_split_digits() {
        assert_eq!(TableKey::parse("1a2b3").unwrap().as_str(), "123");
    }

    #[test]
    fn test_keeps_leading_zero() {
        assert_eq!(TableKey::parse("05").unwrap().as_str(), "05");
    }

    #[test]
    fn test_empty_string() {
        assert!(matches!(
            TableKey::parse(""),
            Err(NotifyError::Validation { .. })
        ));
    }

    #[test]
    fn test_letters_only() {
        match TableKey::parse("abc") {
            Err(NotifyError::Validation { input }) => assert_eq!(input, "abc"),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_deserialize_normalizes() {
        let key: TableKey = serde_json::from_str("\"Patio 4\"").unwrap();
        assert_eq!(key.as_str(), "4");
        assert!(serde_json::from_str::<TableKey>("\"--\"").is_err());
    }
}
