//! Error types for the cloudnav library.

use thiserror::Error;

use crate::api::GatewayError;

/// Main error type for cloudnav operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrowserError {
    /// The storage service rejected or failed the call.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// One or more names already have an operation in flight.
    #[error("Processing these files right now, please wait: {}", names.join(", "))]
    Busy { names: Vec<String> },

    /// A batch was rejected part way through.
    ///
    /// `committed` lists the names the service persisted before the rejection.
    #[error("{source}")]
    PartialBatch {
        committed: Vec<String>,
        source: GatewayError,
    },

    /// Move target cannot be used from the current location.
    #[error("Invalid target folder: {0}")]
    InvalidTarget(String),

    /// Tried to enter something that is not a visible directory.
    #[error("Not a directory: {0}")]
    NotADirectory(String),

    /// No entry with that name in the current listing.
    #[error("No such entry: {0}")]
    NoSuchEntry(String),

    /// Confirm/cancel issued while no prompt is showing.
    #[error("No prompt is showing")]
    NoPrompt,

    /// The session was terminated by a forced logout.
    #[error("Session expired")]
    SessionExpired,

    /// The coordinator task is gone.
    #[error("Browser actor stopped")]
    ActorStopped,

    /// Invalid configuration value.
    #[error("Config error: {0}")]
    Config(String),
}

impl BrowserError {
    /// Underlying gateway error, if any.
    pub fn gateway(&self) -> Option<&GatewayError> {
        match self {
            BrowserError::Gateway(err) | BrowserError::PartialBatch { source: err, .. } => {
                Some(err)
            }
            _ => None,
        }
    }

    /// True when the failure ends the browsing session.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, BrowserError::SessionExpired)
            || matches!(self.gateway(), Some(GatewayError::SessionExpired))
    }
}

/// Result type alias for cloudnav operations.
pub type Result<T> = std::result::Result<T, BrowserError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_message_lists_names() {
        let err = BrowserError::Busy {
            names: vec!["a.txt".to_string(), "b.txt".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Processing these files right now, please wait: a.txt, b.txt"
        );
    }

    #[test]
    fn test_session_expiry_detection() {
        assert!(BrowserError::SessionExpired.is_session_expired());
        assert!(BrowserError::Gateway(GatewayError::SessionExpired).is_session_expired());
        assert!(!BrowserError::NoPrompt.is_session_expired());
    }

    #[test]
    fn test_partial_batch_exposes_source() {
        let source = GatewayError::validation("Invalid name [b.txt]");
        let err = BrowserError::PartialBatch {
            committed: vec!["a.txt".to_string()],
            source: source.clone(),
        };
        assert_eq!(err.gateway(), Some(&source));
        assert_eq!(err.to_string(), source.to_string());
    }
}
