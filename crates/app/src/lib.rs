//! # hublink-app
//!
//! Application layer: use-cases, **port definitions** (traits) and the
//! request coalescer.
//!
//! ## Responsibilities
//! - Define **port traits** that adapters implement:
//!   - `UpstreamFetcher`: one network refresh of a remote source
//!   - `EntityRegistry`: the proxies a coalescer keeps up to date
//!   - `Integration` / `IntegrationContext`: device integration lifecycle
//!   - `EventPublisher`: publish domain events
//! - Provide the [`coalescer::RequestCoalescer`]: concurrent refresh requests
//!   collapse into one in-flight upstream call
//! - Provide **in-process infrastructure** (event bus, in-memory state
//!   service) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `hublink-domain` only (plus `tokio` for sync primitives and
//! task spawning). Never imports adapter crates.

pub mod availability;
pub mod coalescer;
pub mod event_bus;
pub mod ports;
pub mod services;
