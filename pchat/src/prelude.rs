//! Common `pchat` imports for downstream crates.

pub use crate::{ChatError, ChatErrorKind, ChatFragmentStream, ChatSession, HistoryRecord};
pub use pcommon::{GenerationOptions, MetadataMap};
pub use pprovider::{ChatConfig, Message, ModelProvider, ProviderId, Role, SecretString};
