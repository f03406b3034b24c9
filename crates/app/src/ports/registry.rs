//! Entity registry port: the locally-known proxies of a remote source.

use std::hash::Hash;

/// Set of device proxies kept up to date by a
/// [`RequestCoalescer`](crate::coalescer::RequestCoalescer).
///
/// The coalescer never owns the proxies. After each fetch it hands the
/// snapshot to [`reconcile`](Self::reconcile) and then asks for refresh
/// notifications on the proxies that did not wait for that fetch.
///
/// All methods are synchronous and must not block: notifications are
/// *scheduled*, not performed inline.
pub trait EntityRegistry<S>: Send + Sync {
    /// Identifier of one proxy; also used as the coalescer's caller id.
    type Id: Eq + Hash + Clone + Send + Sync + 'static;

    /// Absorb a fresh snapshot: update existing proxies and create proxies
    /// for identifiers seen for the first time.
    ///
    /// Returns the identifiers created by this call.
    fn reconcile(&self, snapshot: &S) -> Vec<Self::Id>;

    /// Identifiers of every proxy currently known.
    fn known_ids(&self) -> Vec<Self::Id>;

    /// Schedule a state re-evaluation of one proxy.
    fn notify_refresh(&self, id: &Self::Id);
}
