//! Formatted terminal output for fit results.
//!
//! We keep formatting code in one place so the fitting code stays free of
//! presentation details.

use crate::domain::{ARCSEC_PER_DEG, FitResult, PointResidual};
use crate::report::{offset_error_arcsec, worst_points};

/// Format the full fit summary: model, data source, coefficients, RMS.
pub fn format_fit_summary(fit: &FitResult, target_rms_arcsec: f64) -> String {
    let mut out = String::new();

    out.push_str("=== pointing - Instrumental Pointing Model Fit ===\n");
    out.push_str(&format!("Model: {} ({})\n", fit.model.display_name(), fit.model));
    out.push_str(&format!("Data: {}\n", fit.source.label()));
    out.push_str(&format!(
        "Points: n={} | solver: {} iterations{}\n",
        fit.residuals.len(),
        fit.iterations,
        if fit.converged { "" } else { " (not converged)" }
    ));

    out.push_str("\nCoefficients:\n");
    out.push_str(&format_params(&fit.model.param_names(), &fit.initial, &fit.params));

    out.push_str("\nRMS:\n");
    out.push_str(&format!("- before fit : {:>10.3} arcsec\n", fit.rms.before_arcsec));
    out.push_str(&format!("- after fit  : {:>10.3} arcsec\n", fit.rms.after_arcsec));
    out.push_str(&format!("- target     : {:>10.3} arcsec\n", target_rms_arcsec));
    if let Some(line) = fit.rms.line {
        out.push_str(&format!(
            "- line       : dAZ={:.3} dEL={:.3} arcsec\n",
            line.daz_arcsec, line.del_arcsec
        ));
    }
    if let Some(cont) = fit.rms.continuum {
        out.push_str(&format!(
            "- continuum  : dAZ={:.3} dEL={:.3} arcsec\n",
            cont.daz_arcsec, cont.del_arcsec
        ));
    }
    let verdict = if fit.rms.after_arcsec <= target_rms_arcsec {
        "within target"
    } else {
        "ABOVE target"
    };
    out.push_str(&format!("  after-fit RMS is {verdict}\n"));

    out
}

/// Format the largest after-fit offsets.
pub fn format_worst_points(residuals: &[PointResidual], top_n: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!("Largest residuals (top {top_n}):\n"));
    out.push_str(
        format!(
            "{:<10} {:>8} {:>7} {:>10} {:>10} {:>10}\n",
            "source", "az", "el", "ddAZ\"", "ddEL\"", "total\""
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<10} {:-<8} {:-<7} {:-<10} {:-<10} {:-<10}", "", "", "", "", "", "").trim_end());
    out.push('\n');

    for r in worst_points(residuals, top_n) {
        out.push_str(
            format!(
                "{:<10} {:>8.2} {:>7.2} {:>10.2} {:>10.2} {:>10.2}",
                r.source.to_string(),
                r.az1,
                r.el1,
                r.daz_residual() * ARCSEC_PER_DEG,
                r.del_residual() * ARCSEC_PER_DEG,
                offset_error_arcsec(&r)
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

/// Configuration records about to be written, for the commit prompt.
pub fn format_records_preview(records: &[String]) -> String {
    let mut out = String::new();
    for record in records {
        out.push_str("  ");
        out.push_str(record);
        out.push('\n');
    }
    out
}

fn format_params(names: &[String], initial: &[f64], fitted: &[f64]) -> String {
    let mut out = String::new();
    out.push_str(format!("{:<5} {:>14} {:>14} {:>10}\n", "name", "initial", "fitted", "fitted\"").trim_end());
    out.push('\n');
    for ((name, p0), p) in names.iter().zip(initial.iter()).zip(fitted.iter()) {
        out.push_str(&format!("{name:<5} {p0:>14.9} {p:>14.9} {:>10.2}\n", p * ARCSEC_PER_DEG));
    }
    out
}

/// `[a, b, c]` with six decimals.
pub fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.6}")).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AxisRms, FitSource, ModelKind, ObservationSource, RmsSummary};

    fn sample_fit(after: f64) -> FitResult {
        FitResult {
            model: ModelKind::SixtyCm,
            source: FitSource::LineOnly,
            initial: vec![0.0; 6],
            params: vec![0.01, 0.02, 0.03, 0.04, 0.05, 0.06],
            rms: RmsSummary {
                before_arcsec: 250.0,
                after_arcsec: after,
                line: Some(AxisRms {
                    daz_arcsec: 1.0,
                    del_arcsec: 2.0,
                }),
                continuum: None,
            },
            residuals: vec![PointResidual {
                source: ObservationSource::Line,
                az1: 10.0,
                el1: 20.0,
                az2: 10.0,
                el2: 20.0,
                daz_obs: 0.01,
                del_obs: 0.02,
                daz_fit: 0.0105,
                del_fit: 0.0195,
            }],
            iterations: 7,
            converged: true,
            cost: 0.0,
        }
    }

    #[test]
    fn summary_lists_every_coefficient() {
        let text = format_fit_summary(&sample_fit(10.0), 54.0);
        for name in ModelKind::SixtyCm.param_names() {
            assert!(text.contains(&format!("\n{name} ")), "missing {name}:\n{text}");
        }
        assert!(text.contains("within target"));
        assert!(!text.contains("continuum  :"));
    }

    #[test]
    fn summary_flags_rms_above_target() {
        let text = format_fit_summary(&sample_fit(80.0), 54.0);
        assert!(text.contains("ABOVE target"));
    }

    #[test]
    fn fmt_vec_basic() {
        assert_eq!(fmt_vec(&[1.0, -0.5]), "[1.000000, -0.500000]");
    }
}
