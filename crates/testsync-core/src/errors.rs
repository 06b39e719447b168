use crate::ids::SessionId;

/// Error taxonomy shared by the HTTP surface and the WebSocket dispatcher.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("session {0} already has data")]
    Conflict(SessionId),
    #[error("session {0} not found")]
    NotFound(SessionId),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("request not authorized")]
    Unauthorized,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("decode error: {0}")]
    Decode(String),
}

impl SyncError {
    /// HTTP status code used when the error reaches a request boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Conflict(_) => 409,
            Self::NotFound(_) => 404,
            Self::Unauthorized => 401,
            Self::BadRequest(_) | Self::UnknownCommand(_) | Self::Decode(_) => 400,
        }
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::UnknownCommand(_) => "unknown_command",
            Self::Decode(_) => "decode_error",
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Decode(e.to_string())
    }
}

/// Failure to hand a frame to a connection's outbound queue.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("connection closed")]
    Closed,
    #[error("send queue full")]
    QueueFull,
    #[error("no connection at index {0}")]
    UnknownConnection(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(SyncError::Conflict(SessionId::new(1)).status_code(), 409);
        assert_eq!(SyncError::NotFound(SessionId::new(1)).status_code(), 404);
        assert_eq!(SyncError::Unauthorized.status_code(), 401);
        assert_eq!(SyncError::BadRequest("x".into()).status_code(), 400);
        assert_eq!(SyncError::Decode("x".into()).status_code(), 400);
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(SyncError::UnknownCommand("x".into()).error_kind(), "unknown_command");
        assert_eq!(SyncError::Decode("x".into()).error_kind(), "decode_error");
        assert_eq!(SyncError::Conflict(SessionId::new(2)).error_kind(), "conflict");
    }

    #[test]
    fn display_includes_session_id() {
        let err = SyncError::NotFound(SessionId::new(42));
        assert_eq!(err.to_string(), "session 42 not found");
    }

    #[test]
    fn json_errors_become_decode() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let err: SyncError = json_err.into();
        assert!(matches!(err, SyncError::Decode(_)));
    }
}
