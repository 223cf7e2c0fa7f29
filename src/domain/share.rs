use std::fmt;
use thiserror::Error;
use time::OffsetDateTime;

/// Symbols a share code is drawn from.
pub const CODE_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Number of symbols in a share code.
pub const CODE_LENGTH: usize = 5;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("share code must be {CODE_LENGTH} characters from A-Z and 0-9")]
pub struct InvalidShareCode;

/// A validated, upper-case share code.
///
/// Client input is trimmed and upper-cased before validation, so every store
/// operation compares codes with plain equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShareCode(String);

impl ShareCode {
    /// Normalizes and validates client input.
    ///
    /// # Errors
    /// Returns `InvalidShareCode` if the input is not exactly five alphanumeric ASCII characters.
    pub fn parse(input: &str) -> Result<Self, InvalidShareCode> {
        let normalized = input.trim().to_ascii_uppercase();
        if normalized.len() == CODE_LENGTH && normalized.bytes().all(|b| CODE_ALPHABET.contains(&b)) {
            Ok(Self(normalized))
        } else {
            Err(InvalidShareCode)
        }
    }

    /// Builds a code from symbols already known to be in the alphabet.
    pub(crate) fn from_symbols(symbols: [u8; CODE_LENGTH]) -> Self {
        Self(symbols.iter().map(|&b| char::from(b)).collect())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShareCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareRecord {
    pub code: ShareCode,
    pub filename: String,
    pub file_url: String,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

impl ShareRecord {
    /// A record is expired once `now` is strictly past its expiration instant.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now > self.expires_at
    }

    #[must_use]
    pub fn is_live_at(&self, now: OffsetDateTime) -> bool {
        !self.is_expired_at(now)
    }
}

/// Result of resolving a share code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Live(ShareRecord),
    Expired,
    NotFound,
}

impl Lookup {
    #[must_use]
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::Live(_) => "live",
            Self::Expired => "expired",
            Self::NotFound => "not_found",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn record(expires_at: OffsetDateTime) -> ShareRecord {
        ShareRecord {
            code: ShareCode::parse("AB12C").unwrap(),
            filename: "a.txt".into(),
            file_url: "https://x/a.txt".into(),
            created_at: expires_at - Duration::hours(1),
            expires_at,
        }
    }

    #[test]
    fn test_parse_normalizes_case_and_whitespace() {
        let code = ShareCode::parse("  ab12c ").unwrap();
        assert_eq!(code.as_str(), "AB12C");
    }

    #[test]
    fn test_parse_rejects_malformed_codes() {
        for input in ["", "ABCD", "ABCDEF", "AB-12", "ÄBCDE", "AB 1C"] {
            assert_eq!(ShareCode::parse(input), Err(InvalidShareCode), "input {input:?}");
        }
    }

    #[test]
    fn test_expiry_boundary() {
        let expires_at = OffsetDateTime::UNIX_EPOCH + Duration::hours(1);
        let share = record(expires_at);

        assert!(share.is_live_at(expires_at - Duration::seconds(1)));
        assert!(share.is_live_at(expires_at));
        assert!(share.is_expired_at(expires_at + Duration::milliseconds(1)));
    }
}
