use thiserror::Error;

/// Errors surfaced by the pipeline stages.
///
/// Every stage validates its own preconditions and fails with the specific
/// kind below instead of letting a NaN or division by zero propagate
/// downstream. No stage catches or suppresses an error from an earlier stage.
#[derive(Debug, Error)]
pub enum FitError {
    /// Too few unique samples for the requested interpolation order or GP fit.
    #[error("insufficient samples: need at least {needed}, got {got}")]
    InsufficientSamples { needed: usize, got: usize },

    /// Zero-width time range; normalization has no inverse.
    #[error("degenerate time span: all sample times are equal")]
    DegenerateTimeSpan,

    /// Non-positive or sub-minimum evaluation grid request.
    #[error("invalid grid size {0}: at least 2 evaluation points are required")]
    InvalidGridSize(usize),

    /// Parallel arrays of unequal length passed across a stage boundary.
    #[error("shape mismatch: parallel arrays of length {left} and {right}")]
    ShapeMismatch { left: usize, right: usize },

    /// Optimizer non-convergence or interpolant ill-conditioning.
    #[error("numerical instability: {0}")]
    NumericalInstability(String),
}

pub type FitResult<T> = Result<T, FitError>;
