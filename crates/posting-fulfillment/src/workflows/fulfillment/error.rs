use super::domain::{ApplicationStatus, PostingStatus};
use super::repository::RepositoryError;

/// Typed failures surfaced by every fulfillment operation.
#[derive(Debug, thiserror::Error)]
pub enum FulfillmentError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("an application for this posting already exists")]
    Duplicate,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("no free slot remains on this posting")]
    CapacityExceeded,
    #[error("posting is {} and not accepting candidates", .0.label())]
    Closed(PostingStatus),
    #[error("cannot move an application from {} to {}", .from.label(), .to.label())]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl FulfillmentError {
    /// Stable machine-readable code for API payloads.
    pub const fn code(&self) -> &'static str {
        match self {
            FulfillmentError::Validation(_) => "VALIDATION",
            FulfillmentError::Duplicate => "DUPLICATE",
            FulfillmentError::Conflict(_) => "CONFLICT",
            FulfillmentError::Forbidden(_) => "FORBIDDEN",
            FulfillmentError::NotFound(_) => "NOT_FOUND",
            FulfillmentError::CapacityExceeded => "CAPACITY_EXCEEDED",
            FulfillmentError::Closed(_) => "CLOSED",
            FulfillmentError::InvalidTransition { .. } => "INVALID_TRANSITION",
            FulfillmentError::Repository(_) => "INTERNAL",
        }
    }
}
