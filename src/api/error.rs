//! Storage service errors.

use thiserror::Error;

/// Tagged failure returned by every [`StorageGateway`](super::StorageGateway) call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Request rejected by validation.
    ///
    /// For batch calls `name` identifies the first item that was refused;
    /// items before it were persisted.
    #[error("{message}")]
    Validation {
        message: String,
        name: Option<String>,
    },

    /// Target name already exists.
    #[error("File with name '{name}' already exists")]
    Conflict { name: String },

    /// Path or entry does not exist.
    #[error("Resource does not exist")]
    NotFound,

    /// Aggregate upload size over the service limit.
    #[error("Payload too large")]
    PayloadTooLarge,

    /// Transport failure, timeout or unexpected server error.
    #[error("Network error: {0}")]
    Network(String),

    /// Credentials rejected (401/403).
    #[error("Session expired")]
    SessionExpired,
}

impl GatewayError {
    /// Validation error with the offending name recovered from the message.
    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        let name = extract_name(&message);
        GatewayError::Validation { message, name }
    }

    /// Validation error for a known offending name.
    pub fn invalid_name(name: impl Into<String>, message: impl Into<String>) -> Self {
        GatewayError::Validation {
            message: message.into(),
            name: Some(name.into()),
        }
    }

    /// Map an HTTP status and optional server message.
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        match status {
            400 => GatewayError::validation(
                message.unwrap_or_else(|| "Invalid request".to_string()),
            ),
            401 | 403 => GatewayError::SessionExpired,
            404 => GatewayError::NotFound,
            409 => GatewayError::Conflict {
                name: message
                    .as_deref()
                    .and_then(extract_name)
                    .unwrap_or_default(),
            },
            413 => GatewayError::PayloadTooLarge,
            _ => GatewayError::Network(match message {
                Some(msg) => format!("HTTP error {}: {}", status, msg),
                None => format!("HTTP error {}", status),
            }),
        }
    }

    /// First rejected name of a partially applied batch.
    pub fn rejected_name(&self) -> Option<&str> {
        match self {
            GatewayError::Validation { name, .. } => name.as_deref(),
            _ => None,
        }
    }

    /// Short category description.
    pub fn description(&self) -> &'static str {
        match self {
            GatewayError::Validation { .. } => "Invalid request",
            GatewayError::Conflict { .. } => "Resource already exists",
            GatewayError::NotFound => "Resource does not exist",
            GatewayError::PayloadTooLarge => "Payload too large",
            GatewayError::Network(_) => "Network error",
            GatewayError::SessionExpired => "Session expired",
        }
    }

    /// Everything except session expiry can be shown and recovered from.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, GatewayError::SessionExpired)
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return GatewayError::from_status(status.as_u16(), None);
        }
        GatewayError::Network(err.to_string())
    }
}

/// Pull a filename out of a server message.
///
/// Tries `[name]` first, then `'name'`.
pub(crate) fn extract_name(message: &str) -> Option<String> {
    between(message, '[', ']').or_else(|| between(message, '\'', '\''))
}

fn between(message: &str, open: char, close: char) -> Option<String> {
    let start = message.find(open)? + open.len_utf8();
    let len = message[start..].find(close)?;
    let name = &message[start..start + len];
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            GatewayError::from_status(400, None),
            GatewayError::Validation { .. }
        ));
        assert_eq!(GatewayError::from_status(401, None), GatewayError::SessionExpired);
        assert_eq!(GatewayError::from_status(403, None), GatewayError::SessionExpired);
        assert_eq!(GatewayError::from_status(404, None), GatewayError::NotFound);
        assert_eq!(GatewayError::from_status(413, None), GatewayError::PayloadTooLarge);
        assert_eq!(
            GatewayError::from_status(409, Some("File with name 'x' already exists".into())),
            GatewayError::Conflict { name: "x".into() }
        );
        assert_eq!(
            GatewayError::from_status(502, None),
            GatewayError::Network("HTTP error 502".into())
        );
    }

    #[test]
    fn test_name_extraction() {
        assert_eq!(extract_name("Invalid name [b.txt]"), Some("b.txt".to_string()));
        assert_eq!(
            extract_name("File with name 'c.txt' already exists"),
            Some("c.txt".to_string())
        );
        assert_eq!(extract_name("Invalid target folder"), None);
        assert_eq!(extract_name("empty []"), None);
    }

    #[test]
    fn test_rejected_name() {
        let err = GatewayError::validation("Non-empty directory [docs] exists");
        assert_eq!(err.rejected_name(), Some("docs"));
        assert_eq!(err.to_string(), "Non-empty directory [docs] exists");
        assert_eq!(GatewayError::NotFound.rejected_name(), None);
    }

    #[test]
    fn test_descriptions() {
        assert_eq!(GatewayError::NotFound.description(), "Resource does not exist");
        assert_eq!(GatewayError::PayloadTooLarge.description(), "Payload too large");
        assert_eq!(GatewayError::SessionExpired.description(), "Session expired");
        assert!(!GatewayError::SessionExpired.is_recoverable());
        assert!(GatewayError::Network("x".into()).is_recoverable());
    }
}
