//! Pointing-model fitting.
//!
//! Responsibilities:
//!
//! - build residual vectors for line, continuum, or joint data
//! - drive the Levenberg-Marquardt solver from an initial guess
//! - compute before/after RMS statistics

pub mod fitter;
pub mod residuals;

pub use fitter::*;
pub use residuals::*;
