//! Time-series models.

pub mod optimizer;
pub mod sarima;

/// Numerical failures raised while fitting or projecting a model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("{observations} observations, need at least {required}")]
    InsufficientData { observations: usize, required: usize },

    #[error("non-finite values: {0}")]
    NonFinite(String),

    #[error("confidence level must be in (0, 1), got {0}")]
    InvalidConfidence(f64),

    #[error("fit cancelled")]
    Cancelled,
}
