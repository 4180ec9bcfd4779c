//! Error types for the inpainting solver

use ndarray_linalg::error::LinalgError;
use thiserror::Error;

/// Result type alias using the solver's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Tensor, mask or matrix dimensions do not fit together
    Shape,
    /// Decomposition failure or non-finite values
    Numerical,
    /// Invalid parameter combination, detected before the first iteration
    Configuration,
}

/// Errors that can occur while setting up or running a solve
#[derive(Error, Debug)]
pub enum Error {
    /// Tensor does not have exactly three channels
    #[error("expected a tensor with 3 channels, got {got}")]
    ChannelCount {
        /// Number of channels found
        got: usize,
    },

    /// Two operands have incompatible shapes
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        got: Vec<usize>,
    },

    /// Matrix cannot be folded back into an H x W x 3 tensor
    #[error("matrix of shape {got:?} is not a {unfolding} unfolding of a 3-channel tensor")]
    NotAnUnfolding {
        /// Which unfolding was expected
        unfolding: &'static str,
        /// Actual matrix shape
        got: Vec<usize>,
    },

    /// NaN or infinity encountered
    #[error("non-finite value encountered{}", at_iteration(.iteration))]
    NonFinite {
        /// Iteration at which it was detected, if inside a solve
        iteration: Option<usize>,
    },

    /// Singular value decomposition did not succeed
    #[error("singular value decomposition failed{}", at_iteration(.iteration))]
    Decomposition {
        /// Iteration at which it failed, if inside a solve
        iteration: Option<usize>,
        /// Underlying LAPACK error
        #[source]
        source: LinalgError,
    },

    /// A configuration parameter is out of range
    #[error("invalid parameter '{parameter}': {reason}")]
    InvalidParameter {
        /// Parameter name
        parameter: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Configuration file could not be read
    #[error("cannot read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid JSON for a solver configuration
    #[error("cannot parse configuration: {0}")]
    Json(#[from] serde_json::Error),
}

fn at_iteration(iteration: &Option<usize>) -> String {
    match iteration {
        Some(k) => format!(" at iteration {}", k),
        None => String::new(),
    }
}

impl Error {
    /// Which branch of the error taxonomy this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ChannelCount { .. }
            | Error::ShapeMismatch { .. }
            | Error::NotAnUnfolding { .. } => ErrorKind::Shape,
            Error::NonFinite { .. } | Error::Decomposition { .. } => ErrorKind::Numerical,
            Error::InvalidParameter { .. } | Error::Io(_) | Error::Json(_) => {
                ErrorKind::Configuration
            }
        }
    }

    /// Iteration a numerical error surfaced in, if known
    pub fn iteration(&self) -> Option<usize> {
        match self {
            Error::NonFinite { iteration } | Error::Decomposition { iteration, .. } => *iteration,
            _ => None,
        }
    }

    /// Tag a numerical error with the iteration it surfaced in.
    /// Errors that already carry an iteration, and non-numerical errors, are returned as is.
    pub fn at(self, k: usize) -> Self {
        match self {
            Error::NonFinite { iteration: None } => Error::NonFinite { iteration: Some(k) },
            Error::Decomposition {
                iteration: None,
                source,
            } => Error::Decomposition {
                iteration: Some(k),
                source,
            },
            other => other,
        }
    }

    pub(crate) fn invalid(parameter: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            parameter,
            reason: reason.into(),
        }
    }
}
