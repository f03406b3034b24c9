//! # hublink-domain
//!
//! Pure domain model for the hublink integration hub.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Entities** (state holders with identity: sensors, binary sensors, …)
//! - Define **Devices** (physical things that expose one or more entities)
//! - Define **Events** (state-change records announced on the hub bus)
//! - Contain all invariant enforcement for these types
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod device;
pub mod entity;
pub mod event;
