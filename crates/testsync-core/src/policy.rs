use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What the connection binder does when a WebSocket registers for a
/// session id that has no data yet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachPolicy {
    /// Create an empty placeholder session and attach to it.
    #[default]
    Create,
    /// Refuse the upgrade with a not-found error.
    Reject,
}

impl fmt::Display for AttachPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

impl FromStr for AttachPolicy {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown attach policy: {other}")),
        }
    }
}
