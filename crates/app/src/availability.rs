//! Shared "source available" flag.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Availability of an upstream source, shared between the coalescer that
/// writes it and every proxy that reads it.
///
/// Starts out available. The `mark_*` methods report whether the call was
/// an actual transition so that callers can log exactly once per change.
#[derive(Debug, Clone)]
pub struct SourceAvailability(Arc<AtomicBool>);

impl Default for SourceAvailability {
    fn default() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }
}

impl SourceAvailability {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Flag the source as reachable. Returns `true` if it was unavailable.
    pub fn mark_available(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    /// Flag the source as unreachable. Returns `true` if it was available.
    pub fn mark_unavailable(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}
