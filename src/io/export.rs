//! Export per-point fit results to CSV.
//!
//! One row per observation used by the fit. Continuum rows carry both scan
//! positions; line rows repeat the same position twice.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::domain::PointResidual;
use crate::error::AppError;

pub const RESULTS_HEADER: &str = "source,az,el,az_el_scan,el_el_scan,daz_obs,del_obs,daz_fit,del_fit";

/// Write per-point results to a CSV file (six decimal places).
pub fn write_results_csv(path: &Path, residuals: &[PointResidual]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create export CSV '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);

    write_results(&mut out, residuals)
        .and_then(|()| out.flush())
        .map_err(|e| AppError::input(format!("Failed to write export CSV '{}': {e}", path.display())))
}

fn write_results<W: Write>(out: &mut W, residuals: &[PointResidual]) -> std::io::Result<()> {
    writeln!(out, "{RESULTS_HEADER}")?;
    for r in residuals {
        writeln!(
            out,
            "{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6}",
            r.source, r.az1, r.el1, r.az2, r.el2, r.daz_obs, r.del_obs, r.daz_fit, r.del_fit
        )?;
    }
    Ok(())
}
