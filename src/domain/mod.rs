//! Domain types used throughout the fitting workflow.
//!
//! This module defines:
//!
//! - the pointing model families (`ModelKind`)
//! - line / continuum observation sets
//! - fit outputs (`FitResult`, `RmsSummary`, `PointResidual`)
//! - run configuration (`FitConfig`)

pub mod types;

pub use types::*;
