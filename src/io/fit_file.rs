//! Read/write fit result JSON files.
//!
//! A fit file is the whole [`FitResult`] (model, coefficients, RMS, per-point
//! residuals) so a run can be re-reported later with `pointing show`.

use std::fs::File;
use std::path::Path;

use crate::domain::FitResult;
use crate::error::AppError;

/// Write a fit result as pretty JSON.
pub fn write_fit_json(path: &Path, fit: &FitResult) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create fit JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, fit)
        .map_err(|e| AppError::input(format!("Failed to write fit JSON: {e}")))?;
    Ok(())
}

/// Read a fit result JSON file.
pub fn read_fit_json(path: &Path) -> Result<FitResult, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open fit JSON '{}': {e}", path.display())))?;
    let fit: FitResult =
        serde_json::from_reader(file).map_err(|e| AppError::input(format!("Invalid fit JSON: {e}")))?;
    if fit.params.len() != fit.model.arity() {
        return Err(AppError::input(format!(
            "Fit JSON holds {} coefficients but {} expects {}",
            fit.params.len(),
            fit.model,
            fit.model.arity()
        )));
    }
    Ok(fit)
}
