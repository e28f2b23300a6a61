//! Reporting utilities: worst-point ranking and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::{ARCSEC_PER_DEG, PointResidual};

/// Total after-fit offset of one point, `sqrt(ΔdAZ² + ΔdEL²)`, in arcsec.
pub fn offset_error_arcsec(r: &PointResidual) -> f64 {
    r.daz_residual().hypot(r.del_residual()) * ARCSEC_PER_DEG
}

/// The `top_n` points with the largest after-fit offset error, worst first.
pub fn worst_points(residuals: &[PointResidual], top_n: usize) -> Vec<PointResidual> {
    let mut sorted = residuals.to_vec();
    sorted.sort_by(|a, b| {
        offset_error_arcsec(b)
            .partial_cmp(&offset_error_arcsec(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sorted.truncate(top_n);
    sorted
}
