use thiserror::Error;

/// Failures surfaced by the recommendation engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecommendationError {
    #[error("Recommendation engine not initialized")]
    NotReady,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid input data: {0}")]
    DataError(String),

    /// Only raised by the factorization step, which recovers from it.
    #[error("Computation failed: {0}")]
    ComputationFailure(String),

    #[error("Data provider unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RecommendationError {
    pub fn upstream(err: anyhow::Error) -> Self {
        RecommendationError::UpstreamUnavailable(format!("{:#}", err))
    }
}

pub type RecommendationResult<T> = Result<T, RecommendationError>;
