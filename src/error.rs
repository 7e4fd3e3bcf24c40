use std::convert::Infallible;

/// Reason an [`crate::auth::check`] call refused an actor.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    #[error("actor is not the technician assigned to this order")]
    NotAssignedTechnician,
    #[error("actor role is not permitted to perform this action")]
    InsufficientRole,
    #[error("order does not exist")]
    OrderNotFound,
}

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("authorization denied: {0}")]
    AuthorizationDenied(Denial),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{operation} precondition failed: {reason}")]
    PreconditionFailed {
        operation: &'static str,
        reason: String,
    },
    #[error("order {0} not found")]
    NotFound(String),
    #[error("cannot complete while {pending} parts/service request(s) are open")]
    PendingApprovalBlock { pending: u32 },
    #[error("storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("record encoding failure: {0}")]
    Encoding(String),
    #[error("collaborator failure: {0}")]
    Collaborator(#[source] anyhow::Error),
}

impl EngineError {
    pub(crate) fn precondition(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::PreconditionFailed {
            operation,
            reason: reason.into(),
        }
    }

    /// A precondition failure usually means another actor changed the order
    /// first. Callers should reload and retry rather than give up.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PreconditionFailed { .. })
    }
}

impl From<minicbor::decode::Error> for EngineError {
    fn from(err: minicbor::decode::Error) -> Self {
        EngineError::Encoding(err.to_string())
    }
}

impl From<minicbor::encode::Error<Infallible>> for EngineError {
    fn from(err: minicbor::encode::Error<Infallible>) -> Self {
        EngineError::Encoding(err.to_string())
    }
}
