//! Error types.
//!
//! `AppError` is what the binary sees: a message plus a process exit code.
//! `FitError` is the typed validation error raised by the residual builder and
//! the solver; it converts into `AppError` at the orchestration boundary.

use thiserror::Error;

use crate::domain::{Axis, ModelKind, ObservationSource};

/// Exit code for input, IO, and configuration problems.
pub const EXIT_INPUT: u8 = 2;
/// Exit code when there is not enough data to fit.
pub const EXIT_DATA: u8 = 3;
/// Exit code for numerical / solver failures.
pub const EXIT_FIT: u8 = 4;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::new(EXIT_INPUT, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Validation and numerical errors of the fitting core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("{model} expects {expected} parameters, got {got}")]
    ArityMismatch {
        model: ModelKind,
        expected: usize,
        got: usize,
    },

    #[error("{origin} {axis}: {observed} observed values but {predicted} predicted values")]
    LengthMismatch {
        origin: ObservationSource,
        axis: Axis,
        observed: usize,
        predicted: usize,
    },

    #[error("{origin} {axis}: observed values have zero spread, cannot scale residuals")]
    ZeroVariance {
        origin: ObservationSource,
        axis: Axis,
    },

    #[error("no {0} observations to fit")]
    EmptyObservations(ObservationSource),

    #[error("{0} fit produced non-finite coefficients")]
    NonFinite(ModelKind),

    #[error("solver failed: {0}")]
    SolverFailed(String),
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let exit_code = match err {
            FitError::ArityMismatch { .. } | FitError::LengthMismatch { .. } => EXIT_INPUT,
            FitError::EmptyObservations(_) => EXIT_DATA,
            FitError::ZeroVariance { .. } | FitError::NonFinite(_) | FitError::SolverFailed(_) => {
                EXIT_FIT
            }
        };
        AppError::new(exit_code, err.to_string())
    }
}
