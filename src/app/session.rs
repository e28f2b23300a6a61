//! One fit session, from model selection to the optional commit.
//!
//! Steps:
//!
//! 1. select the model family (flag or operator)
//! 2. load observations; none at all aborts here
//! 3. acquire the initial guess (persisted, zeros, literal, or entered)
//! 4. solve and compute RMS statistics
//! 5. report, export, and commit on confirmation
//!
//! Nothing touches the instrument configuration before step 5.

use std::io::Write;

use log::{info, warn};

use crate::cli::prompt::Operator;
use crate::domain::{CommitPolicy, FitConfig, FitResult, InitialGuess, ModelKind};
use crate::error::AppError;
use crate::fit::{AbortReason, FitOutcome, fit_pointing};
use crate::io::{commit_params, load_observations, read_params, render_records, write_fit_json, write_results_csv};
use crate::report::{format_fit_summary, format_worst_points};

/// How a session ended.
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    /// A fit was computed. `committed` tells whether it reached the
    /// configuration file.
    Solved { fit: Box<FitResult>, committed: bool },
    Aborted(AbortReason),
}

/// Run a fit session, writing the report to `out`.
pub fn run_session<O, W>(
    config: &FitConfig,
    operator: &mut O,
    out: &mut W,
    top_n: usize,
) -> Result<SessionOutcome, AppError>
where
    O: Operator + ?Sized,
    W: Write,
{
    let model = match config.model {
        Some(model) => model,
        None => operator.choose_model()?,
    };
    info!("Model: {} ({} parameters)", model.display_name(), model.arity());

    let observations = load_observations(config)?;
    if observations.fit_source().is_none() {
        warn!(
            "No observations found under {}; aborting without fitting.",
            config.data_dir.display()
        );
        return Ok(SessionOutcome::Aborted(AbortReason::NoObservations));
    }

    let initial = initial_guess(config, model, operator)?;

    let fit = match fit_pointing(model, &observations, &initial, &config.solver)? {
        FitOutcome::Solved(fit) => fit,
        FitOutcome::Aborted(reason) => return Ok(SessionOutcome::Aborted(reason)),
    };

    let report = format!(
        "{}\n{}",
        format_fit_summary(&fit, config.target_rms_arcsec),
        format_worst_points(&fit.residuals, top_n)
    );
    writeln!(out, "{report}").map_err(|e| AppError::input(format!("Failed to write report: {e}")))?;

    if let Some(path) = &config.export_results {
        write_results_csv(path, &fit.residuals)?;
        info!("Wrote per-point results to {}", path.display());
    }
    if let Some(path) = &config.export_fit {
        write_fit_json(path, &fit)?;
        info!("Wrote fit JSON to {}", path.display());
    }

    let commit = match config.commit {
        CommitPolicy::Never => false,
        CommitPolicy::Always => true,
        CommitPolicy::Ask => {
            let records = render_records(model, &fit.params)?;
            if !operator.confirm_commit(model, &records)? {
                info!("Fitted coefficients were not committed.");
                return Ok(SessionOutcome::Aborted(AbortReason::CommitDeclined));
            }
            true
        }
    };

    if commit {
        commit_params(&config.conf_path, model, &fit.params)?;
    }

    Ok(SessionOutcome::Solved { fit, committed: commit })
}

/// Resolve the starting coefficients for `model`.
///
/// Any vector that reaches the solver has been checked against the model's
/// arity here.
pub fn initial_guess<O>(config: &FitConfig, model: ModelKind, operator: &mut O) -> Result<Vec<f64>, AppError>
where
    O: Operator + ?Sized,
{
    let params = match &config.initial {
        InitialGuess::Values(values) => values.clone(),
        InitialGuess::Zero => vec![0.0; model.arity()],
        InitialGuess::Conf => match persisted(config, model) {
            Some(params) => params,
            None => {
                warn!("No persisted {model} coefficients; starting from zeros.");
                vec![0.0; model.arity()]
            }
        },
        InitialGuess::Ask => match persisted(config, model) {
            Some(params) if operator.use_persisted(model, &params)? => params,
            _ => operator.enter_params(model)?,
        },
    };

    model.check_arity(&params)?;
    Ok(params)
}

/// Persisted coefficients, or `None` if the configuration has none usable.
fn persisted(config: &FitConfig, model: ModelKind) -> Option<Vec<f64>> {
    match read_params(&config.conf_path, model) {
        Ok(Some(params)) => {
            info!("Found persisted {model} coefficients in {}", config.conf_path.display());
            Some(params)
        }
        Ok(None) => {
            info!("{} holds no usable {model} coefficients", config.conf_path.display());
            None
        }
        Err(err) => {
            warn!("{err}");
            None
        }
    }
}
