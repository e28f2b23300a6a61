//! Instrumental pointing model implementations.
//!
//! Models are small, pure functions so that the residual builder and fitter can
//! stay generic over the model family.

pub mod model;

pub use model::*;
