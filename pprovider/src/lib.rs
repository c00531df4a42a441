//! Provider abstraction for the parley chat core.
//!
//! One [`ModelProvider`] per backend family translates a backend-agnostic
//! message history into that backend's request shape and folds the reply
//! (complete or streamed) back into plain text. The [`create_provider`]
//! factory is the only place identities are dispatched; backend
//! differences never leak past the adapter boundary.

mod config;
mod credentials;
mod error;
mod factory;
mod model;
mod provider;
mod stream;

pub mod adapters;
pub mod prelude;

pub use config::{ChatConfig, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, DEFAULT_TIMEOUT};
pub use credentials::SecretString;
pub use error::{ProviderError, ProviderErrorKind};
pub use factory::create_provider;
pub use model::{Message, ModelReply, ModelRequest, ModelRequestBuilder, ProviderId, Role};
pub use provider::{ModelProvider, ProviderFuture};
pub use stream::{BoxedFragmentStream, FragmentStream, VecFragmentStream};
