//! Synthetic data for dry runs and tests.

pub mod synthetic;

pub use synthetic::*;
