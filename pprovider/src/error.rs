//! Shared provider error kinds and error value helpers.
//!
//! ```rust
//! use pprovider::ProviderError;
//!
//! let auth = ProviderError::authentication("bad key");
//! assert!(!auth.retryable);
//!
//! let timeout = ProviderError::timeout("temporary timeout");
//! assert!(timeout.retryable);
//! ```

use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Invalid or missing provider identity or credential. Fatal at
    /// construction, never retried.
    Configuration,
    /// The backend's client support was compiled out of this build.
    DependencyUnavailable,
    Authentication,
    RateLimited,
    InvalidRequest,
    Timeout,
    Transport,
    Unavailable,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Configuration, message, false)
    }

    pub fn dependency_unavailable(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::DependencyUnavailable, message, false)
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Authentication, message, false)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::RateLimited, message, true)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::InvalidRequest, message, false)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message, true)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Transport, message, true)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unavailable, message, true)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Other, message, false)
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for ProviderError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helper_builders_assign_expected_retryability() {
        let configuration = ProviderError::configuration("unknown provider");
        assert!(!configuration.retryable);
        assert_eq!(configuration.kind, ProviderErrorKind::Configuration);

        let dependency = ProviderError::dependency_unavailable("feature disabled");
        assert!(!dependency.retryable);
        assert_eq!(dependency.kind, ProviderErrorKind::DependencyUnavailable);

        let rate_limited = ProviderError::rate_limited("try later");
        assert!(rate_limited.retryable);
        assert_eq!(rate_limited.kind, ProviderErrorKind::RateLimited);

        let timeout = ProviderError::timeout("request timed out");
        assert!(timeout.retryable);
        assert_eq!(timeout.kind, ProviderErrorKind::Timeout);
    }

    #[test]
    fn display_includes_kind_and_message() {
        let error = ProviderError::authentication("bad key");
        assert_eq!(error.to_string(), "Authentication: bad key");
    }
}
