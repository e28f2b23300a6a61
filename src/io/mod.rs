//! Input/output helpers.
//!
//! - observation file discovery + parsing (`observations`)
//! - persisted coefficients in the instrument configuration (`instrument_conf`)
//! - per-point results CSV (`export`)
//! - fit result JSON read/write (`fit_file`)

pub mod export;
pub mod fit_file;
pub mod instrument_conf;
pub mod observations;

pub use export::*;
pub use fit_file::*;
pub use instrument_conf::*;
pub use observations::*;
