use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::SyncError;

macro_rules! numeric_id {
    ($name:ident, $inner:ty) => {
        #[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name($inner);

        impl $name {
            pub const fn new(raw: $inner) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> $inner {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$inner> for $name {
            fn from(raw: $inner) -> Self {
                Self(raw)
            }
        }
    };
}

numeric_id!(SessionId, u64);
numeric_id!(ConnectionIndex, usize);

impl SessionId {
    /// Parse a session id taken from a URL path segment.
    ///
    /// Only plain non-negative decimal integers are accepted.
    pub fn parse_path(raw: &str) -> Result<Self, SyncError> {
        raw.parse()
    }
}

impl FromStr for SessionId {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid_id(s));
        }
        s.parse::<u64>().map(Self).map_err(|_| invalid_id(s))
    }
}

fn invalid_id(raw: &str) -> SyncError {
    SyncError::BadRequest(format!(
        "Unable to parse session id as int: invalid integer {raw:?}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_integers() {
        assert_eq!(SessionId::parse_path("42").unwrap(), SessionId::new(42));
        assert_eq!(SessionId::parse_path("0").unwrap().get(), 0);
    }

    #[test]
    fn rejects_signed_and_non_numeric() {
        for raw in ["", "-1", "+7", "abc", "12a", " 3", "1.5"] {
            let err = SessionId::parse_path(raw).unwrap_err();
            assert!(matches!(err, SyncError::BadRequest(_)), "accepted {raw:?}");
        }
    }

    #[test]
    fn rejects_overflow() {
        let err = SessionId::parse_path("99999999999999999999999").unwrap_err();
        assert!(err.to_string().contains("invalid integer"));
    }

    #[test]
    fn display_matches_raw_value() {
        assert_eq!(SessionId::new(7).to_string(), "7");
        assert_eq!(ConnectionIndex::new(3).to_string(), "3");
    }

    #[test]
    fn serializes_transparently() {
        let json = serde_json::to_string(&SessionId::new(42)).unwrap();
        assert_eq!(json, "42");
        let idx: ConnectionIndex = serde_json::from_str("5").unwrap();
        assert_eq!(idx.get(), 5);
    }

    #[test]
    fn connection_indices_order_by_value() {
        assert!(ConnectionIndex::new(1) < ConnectionIndex::new(2));
    }
}
