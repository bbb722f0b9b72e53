use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;

/// Trait for fetching whole resources from the tile server.
///
/// The tile source takes its transport as an injected dependency, so tests
/// and embedders can substitute their own fetch logic for the default
/// [`HttpTransport`](super::HttpTransport). Implementations must be
/// thread-safe: a single transport may serve several sources at once.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a single GET for `url` and return the complete body.
    ///
    /// Non-2xx responses are errors. Implementations must not retry;
    /// retrying is the caller's decision.
    async fn get(&self, url: &str) -> Result<Bytes, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn get(&self, url: &str) -> Result<Bytes, TransportError> {
        (**self).get(url).await
    }
}
