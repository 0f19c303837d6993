//! Error types module
//!
//! Every adapter operation returns [`CirrusError`]. The variants form a closed taxonomy so
//! callers can branch on the kind of failure (create-if-absent on `NotFound`, capability
//! fallback on `UnsupportedOperation`) without inspecting backend-specific error types.
//! Backend SDK errors are classified at the transport boundary and never leak through.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected outcomes such as a missing object or an empty queue
    Debug,
    /// Caller mistakes such as malformed locators
    Warn,
    /// Backend or configuration failures
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum CirrusError {
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    #[error("Configuration unavailable: {0}")]
    ConfigUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("No provider registered for scheme '{0}'")]
    NoProviderForScheme(String),

    #[error("Operation {0} is not supported")]
    UnsupportedOperation(String),

    #[error("No message available: {0}")]
    NoMessageAvailable(String),

    #[error("Handle is closed: {0}")]
    Closed(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type for cirrus operations
pub type CirrusResult<T> = Result<T, CirrusError>;

impl CirrusError {
    /// Shorthand for the error a provider returns when it declines a capability.
    pub fn unsupported(operation: &str) -> Self {
        CirrusError::UnsupportedOperation(operation.to_string())
    }

    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            CirrusError::InvalidLocator(_) => "INVALID_LOCATOR",
            CirrusError::ConfigUnavailable(_) => "CONFIG_UNAVAILABLE",
            CirrusError::NotFound(_) => "NOT_FOUND",
            CirrusError::AlreadyExists(_) => "ALREADY_EXISTS",
            CirrusError::NoProviderForScheme(_) => "NO_PROVIDER_FOR_SCHEME",
            CirrusError::UnsupportedOperation(_) => "UNSUPPORTED_OPERATION",
            CirrusError::NoMessageAvailable(_) => "NO_MESSAGE_AVAILABLE",
            CirrusError::Closed(_) => "HANDLE_CLOSED",
            CirrusError::InvalidPayload(_) => "INVALID_PAYLOAD",
            CirrusError::Transport(_) => "TRANSPORT_ERROR",
        }
    }

    /// Whether repeating the same call could succeed without the caller changing anything.
    ///
    /// Nothing in this workspace retries; the flag is for the caller's retry policy.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CirrusError::Transport(_) | CirrusError::NoMessageAvailable(_)
        )
    }

    /// Log level for this error
    pub fn log_level(&self) -> LogLevel {
        match self {
            CirrusError::NotFound(_)
            | CirrusError::AlreadyExists(_)
            | CirrusError::NoMessageAvailable(_)
            | CirrusError::UnsupportedOperation(_) => LogLevel::Debug,
            CirrusError::InvalidLocator(_)
            | CirrusError::Closed(_)
            | CirrusError::InvalidPayload(_) => LogLevel::Warn,
            CirrusError::ConfigUnavailable(_)
            | CirrusError::NoProviderForScheme(_)
            | CirrusError::Transport(_) => LogLevel::Error,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CirrusError::NotFound(_))
    }
}

impl From<url::ParseError> for CirrusError {
    fn from(err: url::ParseError) -> Self {
        CirrusError::InvalidLocator(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_metadata_not_found() {
        let err = CirrusError::NotFound("bucket/key".to_string());
        assert_eq!(err.error_code(), "NOT_FOUND");
        assert!(!err.is_recoverable());
        assert!(err.is_not_found());
        assert_eq!(err.log_level(), LogLevel::Debug);
        assert_eq!(err.to_string(), "Not found: bucket/key");
    }

    #[test]
    fn test_error_metadata_transport() {
        let err = CirrusError::Transport("connection reset".to_string());
        assert_eq!(err.error_code(), "TRANSPORT_ERROR");
        assert!(err.is_recoverable());
        assert!(!err.is_not_found());
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_unsupported_message() {
        let err = CirrusError::unsupported("receive");
        assert_eq!(err.to_string(), "Operation receive is not supported");
        assert_eq!(err.error_code(), "UNSUPPORTED_OPERATION");
    }

    #[test]
    fn test_no_provider_message() {
        let err = CirrusError::NoProviderForScheme("ftp".to_string());
        assert_eq!(err.to_string(), "No provider registered for scheme 'ftp'");
        assert_eq!(err.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_url_parse_error_conversion() {
        let err: CirrusError = url::ParseError::RelativeUrlWithoutBase.into();
        match err {
            CirrusError::InvalidLocator(ref msg) => assert!(msg.contains("relative URL")),
            other => panic!("Expected InvalidLocator, got {:?}", other),
        }
    }
}
