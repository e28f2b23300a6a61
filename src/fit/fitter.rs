//! Pointing-model fitting for a single model family.
//!
//! Given:
//! - a model family
//! - line and/or continuum observations
//! - an initial parameter vector
//!
//! we pick the residual function from data availability, minimize its sum of
//! squares with Levenberg-Marquardt, and compute before/after RMS statistics.

use log::{debug, info, warn};

use crate::domain::{
    ARCSEC_PER_DEG, AxisRms, FitResult, FitSource, ModelKind, ObservationSet, ObservationSource,
    PointResidual, RmsSummary,
};
use crate::error::FitError;
use crate::fit::residuals::{combined_residuals, continuum_residuals, line_residuals};
use crate::math::{SolverOptions, levenberg_marquardt, rms_diff};
use crate::models::PointingModel;

/// Why a fit did not produce parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Neither line nor continuum observations were available.
    NoObservations,
    /// The operator declined to commit the fitted parameters.
    CommitDeclined,
}

impl AbortReason {
    pub fn describe(self) -> &'static str {
        match self {
            AbortReason::NoObservations => "no line or continuum observations found",
            AbortReason::CommitDeclined => "fitted parameters were not committed",
        }
    }
}

/// Result of [`fit_pointing`].
#[derive(Debug, Clone)]
pub enum FitOutcome {
    Solved(Box<FitResult>),
    Aborted(AbortReason),
}

/// Fit `model` to the available observations starting from `initial`.
///
/// Missing data on both sources is a recoverable abort. An `initial` vector of
/// the wrong length is rejected before anything else runs.
pub fn fit_pointing(
    model: ModelKind,
    observations: &ObservationSet,
    initial: &[f64],
    opts: &SolverOptions,
) -> Result<FitOutcome, FitError> {
    model.check_arity(initial)?;

    let Some(source) = observations.fit_source() else {
        warn!("No line or continuum observations; nothing to fit.");
        return Ok(FitOutcome::Aborted(AbortReason::NoObservations));
    };

    let pm = model.model();
    let line = &observations.line;
    let continuum = &observations.continuum;
    info!(
        "Fitting {model} against {} ({} line rows, {} continuum rows)",
        source.label(),
        line.len(),
        continuum.len()
    );

    let report = match source {
        FitSource::LineOnly => {
            levenberg_marquardt(|p: &[f64]| line_residuals(pm, p, line), initial, opts)?
        }
        FitSource::ContinuumOnly => {
            levenberg_marquardt(|p: &[f64]| continuum_residuals(pm, p, continuum), initial, opts)?
        }
        FitSource::Combined => levenberg_marquardt(
            |p: &[f64]| combined_residuals(pm, p, line, continuum),
            initial,
            opts,
        )?,
    };

    if report.params.iter().any(|v| !v.is_finite()) {
        return Err(FitError::NonFinite(model));
    }
    if !report.termination.converged() {
        warn!(
            "Solver stopped after {} iterations without meeting tolerances.",
            report.iterations
        );
    }
    debug!(
        "Solver finished: {:?} after {} iterations, cost={:.6e}",
        report.termination, report.iterations, report.cost
    );

    let residuals = point_residuals(pm, &report.params, observations, source);
    let rms = rms_summary(&residuals);

    Ok(FitOutcome::Solved(Box::new(FitResult {
        model,
        source,
        initial: initial.to_vec(),
        params: report.params,
        rms,
        residuals,
        iterations: report.iterations,
        converged: report.termination.converged(),
        cost: report.cost,
    })))
}

/// Observed vs fitted offsets for every row used by the fit.
///
/// Line rows come first, then continuum rows. Ragged columns stop at the
/// shortest one.
pub fn point_residuals(
    model: &PointingModel,
    params: &[f64],
    observations: &ObservationSet,
    source: FitSource,
) -> Vec<PointResidual> {
    let mut out = Vec::new();

    if matches!(source, FitSource::LineOnly | FitSource::Combined) {
        let l = &observations.line;
        let rows = l.az.iter().zip(&l.el).zip(&l.daz).zip(&l.del);
        for (((&az, &el), &daz_obs), &del_obs) in rows {
            let (daz_fit, del_fit) = model.line(params, az, el);
            out.push(PointResidual {
                source: ObservationSource::Line,
                az1: az,
                el1: el,
                az2: az,
                el2: el,
                daz_obs,
                del_obs,
                daz_fit,
                del_fit,
            });
        }
    }

    if matches!(source, FitSource::ContinuumOnly | FitSource::Combined) {
        let c = &observations.continuum;
        let rows = c
            .az1
            .iter()
            .zip(&c.el1)
            .zip(&c.daz)
            .zip(&c.az2)
            .zip(&c.el2)
            .zip(&c.del);
        for (((((&az1, &el1), &daz_obs), &az2), &el2), &del_obs) in rows {
            let (daz_fit, del_fit) = model.continuum(params, az1, el1, az2, el2);
            out.push(PointResidual {
                source: ObservationSource::Continuum,
                az1,
                el1,
                az2,
                el2,
                daz_obs,
                del_obs,
                daz_fit,
                del_fit,
            });
        }
    }

    out
}

/// Pooled before/after RMS plus per-source, per-axis after-fit RMS (arcsec).
pub fn rms_summary(residuals: &[PointResidual]) -> RmsSummary {
    let n = residuals.len().max(1) as f64;

    let before = residuals
        .iter()
        .map(|r| r.daz_obs * r.daz_obs + r.del_obs * r.del_obs)
        .sum::<f64>()
        / n;
    let after = residuals
        .iter()
        .map(|r| r.daz_residual().powi(2) + r.del_residual().powi(2))
        .sum::<f64>()
        / n;

    RmsSummary {
        before_arcsec: before.sqrt() * ARCSEC_PER_DEG,
        after_arcsec: after.sqrt() * ARCSEC_PER_DEG,
        line: axis_rms(residuals, ObservationSource::Line),
        continuum: axis_rms(residuals, ObservationSource::Continuum),
    }
}

fn axis_rms(residuals: &[PointResidual], source: ObservationSource) -> Option<AxisRms> {
    let rows: Vec<&PointResidual> = residuals.iter().filter(|r| r.source == source).collect();
    let daz_obs: Vec<f64> = rows.iter().map(|r| r.daz_obs).collect();
    let daz_fit: Vec<f64> = rows.iter().map(|r| r.daz_fit).collect();
    let del_obs: Vec<f64> = rows.iter().map(|r| r.del_obs).collect();
    let del_fit: Vec<f64> = rows.iter().map(|r| r.del_fit).collect();

    Some(AxisRms {
        daz_arcsec: rms_diff(&daz_obs, &daz_fit)? * ARCSEC_PER_DEG,
        del_arcsec: rms_diff(&del_obs, &del_fit)? * ARCSEC_PER_DEG,
    })
}
