//! Chat-layer errors and classification.

use std::error::Error;
use std::fmt::{Display, Formatter};

use pprovider::{ProviderError, ProviderErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatErrorKind {
    /// Bad provider identity or missing credential; surfaced at
    /// construction and never retried.
    Configuration,
    /// Backend client support compiled out of this build.
    DependencyUnavailable,
    InvalidRequest,
    /// Any backend failure during a turn (auth, rate limit, network,
    /// malformed response). The core never retries these.
    Backend,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatError {
    pub kind: ChatErrorKind,
    pub message: String,
}

impl ChatError {
    pub fn new(kind: ChatErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Configuration, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::InvalidRequest, message)
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Backend, message)
    }
}

impl Display for ChatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for ChatError {}

impl From<ProviderError> for ChatError {
    fn from(value: ProviderError) -> Self {
        let kind = match value.kind {
            ProviderErrorKind::Configuration => ChatErrorKind::Configuration,
            ProviderErrorKind::DependencyUnavailable => ChatErrorKind::DependencyUnavailable,
            ProviderErrorKind::InvalidRequest => ChatErrorKind::InvalidRequest,
            _ => ChatErrorKind::Backend,
        };

        ChatError::new(kind, value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_map_to_chat_kinds() {
        let configuration = ChatError::from(ProviderError::configuration("unknown provider"));
        assert_eq!(configuration.kind, ChatErrorKind::Configuration);

        let dependency = ChatError::from(ProviderError::dependency_unavailable("compiled out"));
        assert_eq!(dependency.kind, ChatErrorKind::DependencyUnavailable);

        let invalid = ChatError::from(ProviderError::invalid_request("empty model"));
        assert_eq!(invalid.kind, ChatErrorKind::InvalidRequest);

        for backend in [
            ProviderError::authentication("bad key"),
            ProviderError::rate_limited("slow down"),
            ProviderError::transport("reset"),
            ProviderError::timeout("deadline"),
        ] {
            assert_eq!(ChatError::from(backend).kind, ChatErrorKind::Backend);
        }
    }

    #[test]
    fn backend_messages_keep_the_provider_kind_prefix() {
        let error = ChatError::from(ProviderError::rate_limited("try later"));
        assert_eq!(error.message, "RateLimited: try later");
    }
}
