//! Residual vectors for the nonlinear solver.
//!
//! Two residual shapes exist:
//!
//! - **single source** (line only or continuum only): `(obs - pred) / std(obs)`
//!   per axis, concatenated as `[dAZ..., dEL...]`. Dividing by the spread of the
//!   *observed* values puts azimuth and elevation on the same footing.
//! - **combined** (line + continuum, one shared parameter vector): raw degree
//!   residuals concatenated as `[cont dAZ, cont dEL, line dAZ, line dEL]`, with
//!   no scaling.
//!
//! Both shapes validate parameter arity and observed/predicted lengths on every
//! call and fail rather than truncate.

use crate::domain::{Axis, ContinuumObservations, LineObservations, ObservationSource};
use crate::error::FitError;
use crate::math::std_dev;
use crate::models::PointingModel;

/// Scaled residuals against line observations.
pub fn line_residuals(
    model: &PointingModel,
    params: &[f64],
    obs: &LineObservations,
) -> Result<Vec<f64>, FitError> {
    model.kind.check_arity(params)?;
    if obs.is_empty() {
        return Err(FitError::EmptyObservations(ObservationSource::Line));
    }

    let (daz_fit, del_fit) = model.predict_line(params, &obs.az, &obs.el);

    let mut out = scaled_differences(&obs.daz, &daz_fit, ObservationSource::Line, Axis::Az)?;
    out.extend(scaled_differences(&obs.del, &del_fit, ObservationSource::Line, Axis::El)?);
    Ok(out)
}

/// Scaled residuals against continuum observations.
pub fn continuum_residuals(
    model: &PointingModel,
    params: &[f64],
    obs: &ContinuumObservations,
) -> Result<Vec<f64>, FitError> {
    model.kind.check_arity(params)?;
    if obs.is_empty() {
        return Err(FitError::EmptyObservations(ObservationSource::Continuum));
    }

    let (daz_fit, del_fit) = model.predict_continuum(params, &obs.az1, &obs.el1, &obs.az2, &obs.el2);

    let source = ObservationSource::Continuum;
    let mut out = scaled_differences(&obs.daz, &daz_fit, source, Axis::Az)?;
    out.extend(scaled_differences(&obs.del, &del_fit, source, Axis::El)?);
    Ok(out)
}

/// Unscaled residuals against both sources at once.
///
/// Order: continuum dAZ, continuum dEL, line dAZ, line dEL.
pub fn combined_residuals(
    model: &PointingModel,
    params: &[f64],
    line: &LineObservations,
    continuum: &ContinuumObservations,
) -> Result<Vec<f64>, FitError> {
    model.kind.check_arity(params)?;

    let (daz_c, del_c) =
        model.predict_continuum(params, &continuum.az1, &continuum.el1, &continuum.az2, &continuum.el2);
    let (daz_l, del_l) = model.predict_line(params, &line.az, &line.el);

    let cont = ObservationSource::Continuum;
    let ln = ObservationSource::Line;

    let mut out = Vec::with_capacity(2 * (continuum.len() + line.len()));
    out.extend(differences(&continuum.daz, &daz_c, cont, Axis::Az)?);
    out.extend(differences(&continuum.del, &del_c, cont, Axis::El)?);
    out.extend(differences(&line.daz, &daz_l, ln, Axis::Az)?);
    out.extend(differences(&line.del, &del_l, ln, Axis::El)?);
    Ok(out)
}

/// `observed - predicted`, rejecting length mismatches.
pub fn differences(
    observed: &[f64],
    predicted: &[f64],
    origin: ObservationSource,
    axis: Axis,
) -> Result<Vec<f64>, FitError> {
    if observed.len() != predicted.len() {
        return Err(FitError::LengthMismatch {
            origin,
            axis,
            observed: observed.len(),
            predicted: predicted.len(),
        });
    }
    Ok(observed
        .iter()
        .zip(predicted.iter())
        .map(|(o, p)| o - p)
        .collect())
}

/// `(observed - predicted) / std(observed)`.
///
/// A zero or non-finite spread of the observed values is an error.
pub fn scaled_differences(
    observed: &[f64],
    predicted: &[f64],
    origin: ObservationSource,
    axis: Axis,
) -> Result<Vec<f64>, FitError> {
    let diffs = differences(observed, predicted, origin, axis)?;
    let scale = axis_scale(observed, origin, axis)?;
    Ok(diffs.into_iter().map(|d| d / scale).collect())
}

fn axis_scale(observed: &[f64], origin: ObservationSource, axis: Axis) -> Result<f64, FitError> {
    match std_dev(observed) {
        Some(s) if s.is_finite() && s > 0.0 => Ok(s),
        Some(_) => Err(FitError::ZeroVariance { origin, axis }),
        None => Err(FitError::EmptyObservations(origin)),
    }
}
