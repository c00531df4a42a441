//! Common `pprovider` imports for downstream crates.

pub use crate::{
    BoxedFragmentStream, ChatConfig, FragmentStream, Message, ModelProvider, ModelReply,
    ModelRequest, ModelRequestBuilder, ProviderError, ProviderErrorKind, ProviderFuture,
    ProviderId, Role, SecretString, VecFragmentStream, create_provider,
};
pub use pcommon::{BoxFuture, GenerationOptions, MetadataMap};
