use crate::types::ExperimentId;

/// Common error taxonomy shared by the hub and node services.
///
/// `Transport` covers failures reaching a remote host; `Runtime` covers
/// container-infrastructure failures (launch, inspect, stop); a nonzero
/// exit from the user script is *not* an error here -- it is recorded on
/// the experiment itself.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{entity} {id} not found")]
    NotFound {
        entity: &'static str,
        id: ExperimentId,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Shorthand for the not-found variant.
    pub fn not_found(entity: &'static str, id: ExperimentId) -> Self {
        Self::NotFound { entity, id }
    }
}
