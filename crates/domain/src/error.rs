//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`HubError`]
//! at port boundaries.

/// Top-level error crossing port boundaries.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// A domain invariant was violated.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A looked-up item does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// An integration (bridge, cloud relay, …) failed.
    #[error("integration error")]
    Integration(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Domain invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// A required name was empty.
    #[error("name must not be empty")]
    EmptyName,

    /// An entity was built without its `domain.object_id` identifier.
    #[error("entity_id must not be empty")]
    EmptyEntityId,
}

/// A lookup that found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    /// Kind of item that was looked up (e.g. `"Entity"`).
    pub entity: &'static str,
    /// The identifier that was requested.
    pub id: String,
}
