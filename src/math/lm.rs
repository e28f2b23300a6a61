//! Levenberg-Marquardt nonlinear least squares.
//!
//! Minimizes `0.5 * Σ rᵢ(x)²` over an unconstrained parameter vector `x`.
//! The Jacobian is estimated with forward differences, so callers only supply
//! the residual function. Steps are computed by [`damped_step`] with
//! Marquardt's diagonal scaling (column norms of the Jacobian).

use log::{debug, trace};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::FitError;
use crate::math::ols::damped_step;

/// Solver settings. Defaults are close to common trust-region solver defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverOptions {
    /// Maximum number of outer iterations (accepted or rejected steps).
    pub max_iterations: usize,
    /// Relative reduction of the cost below which the fit is converged.
    pub ftol: f64,
    /// Relative step size below which the fit is converged.
    pub xtol: f64,
    /// Max-norm of the scaled gradient below which the fit is converged.
    pub gtol: f64,
    /// Initial damping parameter.
    pub initial_lambda: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1e-12,
            xtol: 1e-12,
            gtol: 1e-12,
            initial_lambda: 1e-3,
        }
    }
}

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Residuals are zero to machine precision.
    ExactFit,
    CostTolerance,
    StepTolerance,
    GradientTolerance,
    MaxIterations,
    /// Every step was rejected until the damping ceiling was reached.
    DampingExhausted,
}

impl Termination {
    pub fn converged(self) -> bool {
        !matches!(self, Termination::MaxIterations | Termination::DampingExhausted)
    }
}

/// Outcome of a solver run.
#[derive(Debug, Clone)]
pub struct SolverReport {
    pub params: Vec<f64>,
    /// `0.5 * Σ r²` at `params`.
    pub cost: f64,
    pub iterations: usize,
    pub termination: Termination,
}

const LAMBDA_UP: f64 = 10.0;
const LAMBDA_DOWN: f64 = 0.1;
const LAMBDA_MAX: f64 = 1e16;
const SCALE_FLOOR: f64 = 1e-12;

/// Run Levenberg-Marquardt from `initial`.
///
/// `residuals` is called once per trial point plus once per Jacobian column;
/// any error it returns aborts the solve unchanged. Non-finite residuals at the
/// starting point or in a Jacobian column are errors; at a trial point they
/// only reject the step.
pub fn levenberg_marquardt<F>(
    residuals: F,
    initial: &[f64],
    opts: &SolverOptions,
) -> Result<SolverReport, FitError>
where
    F: Fn(&[f64]) -> Result<Vec<f64>, FitError>,
{
    if initial.is_empty() {
        return Err(FitError::SolverFailed("empty parameter vector".to_string()));
    }

    let mut x = initial.to_vec();
    let mut r = evaluate(&residuals, &x)?;
    if r.len() < x.len() {
        return Err(FitError::SolverFailed(format!(
            "underdetermined problem: {} residuals for {} parameters",
            r.len(),
            x.len()
        )));
    }
    let mut cost = half_sum_sq(&r);
    let mut lambda = opts.initial_lambda.max(0.0);

    if cost == 0.0 {
        return Ok(SolverReport {
            params: x,
            cost,
            iterations: 0,
            termination: Termination::ExactFit,
        });
    }

    let mut jacobian = forward_jacobian(&residuals, &x, &r)?;
    let mut iterations = 0;

    while iterations < opts.max_iterations {
        iterations += 1;

        let r_vec = DVector::from_column_slice(&r);
        let gradient = jacobian.transpose() * &r_vec;
        let scale = column_scale(&jacobian);

        let g_scaled = gradient
            .iter()
            .zip(scale.iter())
            .map(|(g, s)| (g / s).abs())
            .fold(0.0_f64, f64::max);
        if g_scaled <= opts.gtol * cost.sqrt().max(f64::MIN_POSITIVE) {
            debug!("LM converged on gradient after {iterations} iterations (cost={cost:.3e})");
            return Ok(report(x, cost, iterations, Termination::GradientTolerance));
        }

        let delta = damped_step(&jacobian, &r_vec, lambda, &scale)
            .ok_or_else(|| FitError::SolverFailed("singular damped step".to_string()))?;

        let x_norm = x.iter().map(|v| v * v).sum::<f64>().sqrt();
        let step_small = delta.norm() <= opts.xtol * (opts.xtol + x_norm);

        let trial: Vec<f64> = x.iter().zip(delta.iter()).map(|(a, d)| a + d).collect();
        let r_trial = residuals(&trial)?;
        let cost_trial = if r_trial.len() == r.len() {
            half_sum_sq(&r_trial)
        } else {
            f64::INFINITY
        };
        trace!("LM iter {iterations}: lambda={lambda:.3e} cost={cost:.6e} trial={cost_trial:.6e}");

        if cost_trial.is_finite() && cost_trial < cost {
            let reduction = cost - cost_trial;
            x = trial;
            r = r_trial;
            let previous = cost;
            cost = cost_trial;
            lambda *= LAMBDA_DOWN;

            if cost == 0.0 {
                return Ok(report(x, cost, iterations, Termination::ExactFit));
            }
            if reduction <= opts.ftol * previous {
                debug!("LM converged on cost after {iterations} iterations (cost={cost:.3e})");
                return Ok(report(x, cost, iterations, Termination::CostTolerance));
            }
            if step_small {
                debug!("LM converged on step after {iterations} iterations (cost={cost:.3e})");
                return Ok(report(x, cost, iterations, Termination::StepTolerance));
            }
            jacobian = forward_jacobian(&residuals, &x, &r)?;
        } else {
            // A rejected step that is already negligible means no further
            // progress is possible at this precision.
            if step_small {
                debug!("LM converged on step after {iterations} iterations (cost={cost:.3e})");
                return Ok(report(x, cost, iterations, Termination::StepTolerance));
            }
            lambda = (lambda.max(SCALE_FLOOR)) * LAMBDA_UP;
            if lambda > LAMBDA_MAX {
                debug!("LM damping exhausted after {iterations} iterations (cost={cost:.3e})");
                return Ok(report(x, cost, iterations, Termination::DampingExhausted));
            }
        }
    }

    Ok(report(x, cost, iterations, Termination::MaxIterations))
}

fn report(params: Vec<f64>, cost: f64, iterations: usize, termination: Termination) -> SolverReport {
    SolverReport {
        params,
        cost,
        iterations,
        termination,
    }
}

fn evaluate<F>(residuals: &F, x: &[f64]) -> Result<Vec<f64>, FitError>
where
    F: Fn(&[f64]) -> Result<Vec<f64>, FitError>,
{
    let r = residuals(x)?;
    if r.iter().any(|v| !v.is_finite()) {
        return Err(FitError::SolverFailed(
            "residual function returned a non-finite value".to_string(),
        ));
    }
    Ok(r)
}

fn half_sum_sq(r: &[f64]) -> f64 {
    0.5 * r.iter().map(|v| v * v).sum::<f64>()
}

/// Forward-difference Jacobian `∂rᵢ/∂xⱼ`.
fn forward_jacobian<F>(residuals: &F, x: &[f64], r0: &[f64]) -> Result<DMatrix<f64>, FitError>
where
    F: Fn(&[f64]) -> Result<Vec<f64>, FitError>,
{
    let m = r0.len();
    let n = x.len();
    let eps = f64::EPSILON.sqrt();

    let mut jac = DMatrix::<f64>::zeros(m, n);
    let mut xp = x.to_vec();
    for j in 0..n {
        let h = eps * x[j].abs().max(1.0);
        xp[j] = x[j] + h;
        let rp = evaluate(residuals, &xp)?;
        if rp.len() != m {
            return Err(FitError::SolverFailed(format!(
                "residual length changed from {m} to {}",
                rp.len()
            )));
        }
        // Use the actually representable step.
        let h_eff = xp[j] - x[j];
        for i in 0..m {
            jac[(i, j)] = (rp[i] - r0[i]) / h_eff;
        }
        xp[j] = x[j];
    }
    Ok(jac)
}

fn column_scale(jacobian: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_iterator(
        jacobian.ncols(),
        jacobian
            .column_iter()
            .map(|col| col.norm().max(SCALE_FLOOR)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn fits_exponential_decay() {
        // y = 2.5 * exp(-0.7 t)
        let t: Vec<f64> = (0..20).map(|i| i as f64 * 0.25).collect();
        let y: Vec<f64> = t.iter().map(|&ti| 2.5 * (-0.7 * ti).exp()).collect();
        let f = |p: &[f64]| -> Result<Vec<f64>, FitError> {
            Ok(t.iter()
                .zip(y.iter())
                .map(|(&ti, &yi)| p[0] * (-p[1] * ti).exp() - yi)
                .collect())
        };

        let rep = levenberg_marquardt(f, &[1.0, 0.1], &SolverOptions::default()).unwrap();
        assert!(rep.termination.converged());
        assert_abs_diff_eq!(rep.params[0], 2.5, epsilon = 1e-6);
        assert_abs_diff_eq!(rep.params[1], 0.7, epsilon = 1e-6);
    }

    #[test]
    fn exact_initial_guess_returns_immediately() {
        let f = |p: &[f64]| -> Result<Vec<f64>, FitError> { Ok(vec![p[0] - 1.0, p[0] - 1.0]) };
        let rep = levenberg_marquardt(f, &[1.0], &SolverOptions::default()).unwrap();
        assert_eq!(rep.iterations, 0);
        assert_eq!(rep.termination, Termination::ExactFit);
    }

    #[test]
    fn residual_errors_propagate() {
        let f = |_: &[f64]| -> Result<Vec<f64>, FitError> {
            Err(FitError::SolverFailed("boom".to_string()))
        };
        let err = levenberg_marquardt(f, &[0.0], &SolverOptions::default()).unwrap_err();
        assert_eq!(err, FitError::SolverFailed("boom".to_string()));
    }

    #[test]
    fn underdetermined_problem_is_rejected() {
        let f = |p: &[f64]| -> Result<Vec<f64>, FitError> { Ok(vec![p[0] + p[1]]) };
        assert!(levenberg_marquardt(f, &[0.0, 0.0], &SolverOptions::default()).is_err());
    }

    #[test]
    fn iteration_cap_is_reported() {
        let t: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let f = |p: &[f64]| -> Result<Vec<f64>, FitError> {
            Ok(t.iter().map(|&ti| p[0] * (-p[1] * ti).exp() - (3.0 * (-0.2 * ti).exp())).collect())
        };
        let opts = SolverOptions {
            max_iterations: 1,
            ..SolverOptions::default()
        };
        let rep = levenberg_marquardt(f, &[0.1, 2.0], &opts).unwrap();
        assert_eq!(rep.iterations, 1);
        assert_eq!(rep.termination, Termination::MaxIterations);
    }

    #[test]
    fn non_finite_trial_point_raises_damping() {
        // The first undamped step from 0.1 lands near 11, where residuals are NaN.
        let f = |p: &[f64]| -> Result<Vec<f64>, FitError> {
            if p[0] > 2.0 {
                return Ok(vec![f64::NAN, f64::NAN]);
            }
            let r = p[0] * p[0] - 2.25;
            Ok(vec![r, 0.5 * r])
        };
        let opts = SolverOptions {
            initial_lambda: 0.0,
            ..SolverOptions::default()
        };
        let rep = levenberg_marquardt(f, &[0.1], &opts).unwrap();
        assert!(rep.termination.converged());
        assert_abs_diff_eq!(rep.params[0], 1.5, epsilon = 1e-6);
    }

    #[test]
    fn non_finite_start_is_an_error() {
        let f = |_: &[f64]| -> Result<Vec<f64>, FitError> { Ok(vec![f64::INFINITY, 0.0]) };
        assert!(levenberg_marquardt(f, &[0.0], &SolverOptions::default()).is_err());
    }

    #[test]
    fn exhausted_damping_is_not_converged() {
        // Every step points to p < 0, where residuals are NaN.
        let f = |p: &[f64]| -> Result<Vec<f64>, FitError> {
            if p[0] < 0.0 {
                return Ok(vec![f64::NAN, f64::NAN]);
            }
            Ok(vec![1.0 + p[0], 1.0 + p[0]])
        };
        let opts = SolverOptions {
            xtol: 0.0,
            max_iterations: 1000,
            ..SolverOptions::default()
        };
        let rep = levenberg_marquardt(f, &[0.0], &opts).unwrap();
        assert_eq!(rep.termination, Termination::DampingExhausted);
        assert!(!rep.termination.converged());
        assert_eq!(rep.params, vec![0.0]);
    }
}
