use std::fmt;

/// Errors the hub can surface to its callers. Per-session delivery failures
/// never show up here; they are handled inside the session's own teardown.
#[derive(Debug)]
pub enum HubError {
    /// The registry no longer accepts sessions because shutdown has begun.
    RegistryClosed,
    /// The envelope could not be serialized.
    Encode(serde_json::Error),
    /// Shutdown outlived its timeout; the sessions still tearing down were
    /// dropped without finishing their close handshake.
    ShutdownTimedOut { forced: usize },
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HubError::RegistryClosed => write!(f, "registry closed"),
            HubError::Encode(e) => write!(f, "failed to encode message: {e}"),
            HubError::ShutdownTimedOut { forced } => {
                write!(f, "shutdown timed out, force-closed {forced} session(s)")
            }
        }
    }
}

impl std::error::Error for HubError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HubError::Encode(e) => Some(e),
            _ => None,
        }
    }
}
