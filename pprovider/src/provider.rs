use std::future::Future;
use std::pin::Pin;

use crate::{BoxedFragmentStream, ModelReply, ModelRequest, ProviderError, ProviderId};

pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Capability implementing request/response translation for exactly one
/// backend family. Stateless with respect to conversation content; holds
/// only the bound configuration and a live client handle.
pub trait ModelProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    /// One-exchange completion returning the whole reply text.
    fn complete<'a>(
        &'a self,
        request: ModelRequest,
    ) -> ProviderFuture<'a, Result<ModelReply, ProviderError>>;

    /// Incremental variant of [`ModelProvider::complete`]. Fragments arrive
    /// in backend order; transport, auth, and rate-limit failures surface
    /// as stream items and are never reinterpreted here.
    fn stream<'a>(
        &'a self,
        request: ModelRequest,
    ) -> ProviderFuture<'a, Result<BoxedFragmentStream<'a>, ProviderError>>;
}

impl std::fmt::Debug for dyn ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelProvider").field("id", &self.id()).finish()
    }
}
