//! `antenna-pointing` library crate.
//!
//! The binary (`pointing`) is a thin wrapper around this library so that:
//!
//! - the fitting core is testable without spawning processes
//! - operator prompts can be swapped for scripted answers
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
