//! Request coalescer: single-flight refresh of a remote source.
//!
//! A remote source (e.g. a lighting bridge) answers one request with the
//! state of *all* its devices. When several proxies ask for an update at the
//! same time, only one upstream call is made and every caller that joined
//! before it resolved receives the same outcome.
//!
//! ```text
//! caller A ──┐
//! caller B ──┼──► join ──► [in flight?] ──no──► spawn fetch ──► settle ──► release all
//! caller C ──┘                 │ yes                               ▲
//!                              └────────── wait on same slot ──────┘
//! ```
//!
//! After each fetch the coalescer:
//! - flips the shared [`SourceAvailability`] flag (logging once per
//!   transition);
//! - on success, lets the registry absorb the snapshot and schedules a
//!   refresh for every known proxy that did not wait on this fetch;
//! - on the first failure, schedules a refresh for every known proxy so they
//!   all reflect the outage.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;

use crate::availability::SourceAvailability;
use crate::ports::{EntityRegistry, FetchError, UpstreamFetcher};

/// Upper bound for a single upstream refresh unless configured otherwise.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(4);

/// What every caller of one coalesced request receives.
pub type RefreshOutcome<S> = Result<S, FetchError>;

type Slot<S> = watch::Receiver<Option<RefreshOutcome<S>>>;

struct Pending<I, S> {
    in_flight: Option<Slot<S>>,
    waiters: HashSet<I>,
}

/// Collapses concurrent refresh requests into one in-flight upstream call.
///
/// Must be held in an [`Arc`]: the upstream call runs in its own task so
/// that no single caller can cancel it by dropping its future.
pub struct RequestCoalescer<F, R>
where
    F: UpstreamFetcher,
    R: EntityRegistry<F::Snapshot>,
{
    source: String,
    fetcher: F,
    registry: R,
    availability: SourceAvailability,
    timeout: Duration,
    pending: Mutex<Pending<R::Id, F::Snapshot>>,
    /// Held from the end of a fetch until its outcome is settled, so settles
    /// apply in the order their fetches started.
    settling: tokio::sync::Mutex<()>,
}

impl<F, R> RequestCoalescer<F, R>
where
    F: UpstreamFetcher + 'static,
    R: EntityRegistry<F::Snapshot> + 'static,
{
    /// Create a coalescer for the source labelled `source` (used in logs).
    pub fn new(source: impl Into<String>, fetcher: F, registry: R) -> Self {
        Self {
            source: source.into(),
            fetcher,
            registry,
            availability: SourceAvailability::new(),
            timeout: DEFAULT_FETCH_TIMEOUT,
            pending: Mutex::new(Pending {
                in_flight: None,
                waiters: HashSet::new(),
            }),
            settling: tokio::sync::Mutex::new(()),
        }
    }

    /// Bound every upstream call by `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Share an existing availability flag (e.g. one the proxies already hold).
    #[must_use]
    pub fn with_availability(mut self, availability: SourceAvailability) -> Self {
        self.availability = availability;
        self
    }

    #[must_use]
    pub fn availability(&self) -> &SourceAvailability {
        &self.availability
    }

    #[must_use]
    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Whether an upstream call is currently outstanding.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.lock_pending().in_flight.is_some()
    }

    /// Number of callers waiting on the current request.
    #[must_use]
    pub fn waiter_count(&self) -> usize {
        self.lock_pending().waiters.len()
    }

    /// Ask for fresh data on behalf of `caller`.
    ///
    /// Joins the in-flight request if there is one, otherwise starts it.
    /// `caller` is recorded in the waiter set so it is not sent a separate
    /// refresh notification when the data arrives.
    pub async fn request_update(self: &Arc<Self>, caller: R::Id) -> RefreshOutcome<F::Snapshot> {
        let slot = self.join(Some(caller));
        Self::wait(slot).await
    }

    /// Ask for fresh data without registering a waiter.
    ///
    /// Every known proxy is then notified on success.
    pub async fn request_refresh(self: &Arc<Self>) -> RefreshOutcome<F::Snapshot> {
        let slot = self.join(None);
        Self::wait(slot).await
    }

    fn join(self: &Arc<Self>, caller: Option<R::Id>) -> Slot<F::Snapshot> {
        let mut pending = self.lock_pending();
        if let Some(caller) = caller {
            pending.waiters.insert(caller);
        }
        if let Some(slot) = &pending.in_flight {
            return slot.clone();
        }

        let (sender, slot) = watch::channel(None);
        pending.in_flight = Some(slot.clone());
        drop(pending);

        tracing::trace!(source = %self.source, "starting upstream refresh");
        tokio::spawn(Arc::clone(self).run(sender));
        slot
    }

    async fn wait(mut slot: Slot<F::Snapshot>) -> RefreshOutcome<F::Snapshot> {
        let outcome = match slot.wait_for(Option::is_some).await {
            Ok(value) => (*value).clone(),
            Err(_) => None,
        };
        outcome.unwrap_or(Err(FetchError::Interrupted))
    }

    async fn run(self: Arc<Self>, sender: watch::Sender<Option<RefreshOutcome<F::Snapshot>>>) {
        let fetch = tokio::spawn({
            let this = Arc::clone(&self);
            async move { this.fetcher.refresh().await }
        });
        let abort = fetch.abort_handle();
        let outcome = match tokio::time::timeout(self.timeout, fetch).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                tracing::error!(source = %self.source, error = %err, "upstream refresh task failed");
                Err(FetchError::Interrupted)
            }
            Err(_) => {
                abort.abort();
                Err(FetchError::Timeout(self.timeout))
            }
        };

        let settling = self.settling.lock().await;
        // Cleared before anyone is released: a caller arriving from now on
        // starts a new request instead of rejoining this one.
        let waiters = {
            let mut pending = self.lock_pending();
            pending.in_flight = None;
            std::mem::take(&mut pending.waiters)
        };

        self.settle(&outcome, &waiters);
        drop(settling);
        sender.send_replace(Some(outcome));
    }

    fn settle(&self, outcome: &RefreshOutcome<F::Snapshot>, waiters: &HashSet<R::Id>) {
        match outcome {
            Ok(snapshot) => {
                if self.availability.mark_available() {
                    tracing::info!(source = %self.source, "reconnected to upstream source");
                }
                let created: HashSet<R::Id> =
                    self.registry.reconcile(snapshot).into_iter().collect();
                for id in self.registry.known_ids() {
                    if !waiters.contains(&id) && !created.contains(&id) {
                        self.registry.notify_refresh(&id);
                    }
                }
            }
            Err(err) => {
                if !self.availability.mark_unavailable() {
                    tracing::debug!(source = %self.source, %err, "upstream source still unreachable");
                    return;
                }
                tracing::error!(source = %self.source, %err, "unable to reach upstream source");
                for id in self.registry.known_ids() {
                    self.registry.notify_refresh(&id);
                }
            }
        }
    }

    fn lock_pending(&self) -> MutexGuard<'_, Pending<R::Id, F::Snapshot>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
