//! Upstream port: a single refresh of a remote source's state.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Why an upstream refresh did not produce a snapshot.
///
/// Every variant means "upstream unreachable" to the coalescer. The type is
/// cheaply cloneable so one failure can be handed to every waiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// The refresh did not complete within the configured bound.
    #[error("upstream refresh timed out after {0:?}")]
    Timeout(Duration),

    /// The transport (HTTP, socket, …) or the remote end reported an error.
    #[error("upstream transport error")]
    Transport(#[source] Arc<dyn std::error::Error + Send + Sync>),

    /// The refresh task ended without publishing an outcome.
    #[error("upstream refresh ended without a result")]
    Interrupted,
}

impl FetchError {
    /// Wrap any transport-level error.
    pub fn transport(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transport(Arc::new(err))
    }
}

/// Performs the actual network call that refreshes a remote source.
///
/// Implementations should not apply their own overall timeout; the
/// coalescer bounds every call.
pub trait UpstreamFetcher: Send + Sync {
    /// Data returned by one successful refresh.
    type Snapshot: Clone + Send + Sync + 'static;

    /// Fetch fresh state from the remote source.
    fn refresh(&self) -> impl Future<Output = Result<Self::Snapshot, FetchError>> + Send;
}

impl<T: UpstreamFetcher> UpstreamFetcher for Arc<T> {
    type Snapshot = T::Snapshot;

    fn refresh(&self) -> impl Future<Output = Result<Self::Snapshot, FetchError>> + Send {
        (**self).refresh()
    }
}
