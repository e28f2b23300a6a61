//! Command-line parsing for the pointing-model fitter.
//!
//! The goal of this module is to keep **argument parsing** and **operator
//! prompts** separate from the modeling/math code.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::domain::{CommitPolicy, InitialGuess, ModelKind};
use crate::math::SolverOptions;

pub mod prompt;

pub const DEFAULT_CONF: &str = "ant30_phaseC0.conf";
pub const DEFAULT_DATA_DIR: &str = "offset_data";
pub const DEFAULT_TARGET_RMS_ARCSEC: f64 = 54.0;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "pointing", version, about = "Radio telescope pointing model fitter")]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit a pointing model to offset observations and optionally commit it.
    Fit(FitArgs),
    /// Generate synthetic offset observation files from known coefficients.
    Simulate(SimulateArgs),
    /// Print the summary of a previously exported fit.
    Show(ShowArgs),
}

/// Options for `pointing fit`.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    /// Model family (60cm_model, 60cm_model_2, optical_model or 1/2/3). Asked if omitted.
    #[arg(short = 'm', long, value_enum)]
    pub model: Option<ModelKind>,

    /// Initial coefficients: `conf`, `zero`, `ask`, or a comma-separated list.
    #[arg(long, value_parser = parse_initial, allow_hyphen_values = true)]
    pub initial: Option<InitialGuess>,

    /// Commit fitted coefficients without asking.
    #[arg(long, conflicts_with = "no_commit")]
    pub commit: bool,

    /// Never commit fitted coefficients.
    #[arg(long)]
    pub no_commit: bool,

    /// Folder searched for offset_L.txt / offset_C.txt.
    #[arg(short = 'd', long, env = "POINTING_DATA_DIR", default_value = DEFAULT_DATA_DIR)]
    pub data_dir: PathBuf,

    /// Line pointing file (overrides discovery).
    #[arg(long, value_name = "FILE")]
    pub line: Option<PathBuf>,

    /// Continuum pointing file (overrides discovery).
    #[arg(long, value_name = "FILE")]
    pub continuum: Option<PathBuf>,

    /// Instrument configuration holding the persisted coefficients.
    #[arg(short = 'c', long, env = "POINTING_CONF", default_value = DEFAULT_CONF)]
    pub conf: PathBuf,

    /// Maximum solver iterations.
    #[arg(long, default_value_t = SolverOptions::default().max_iterations)]
    pub max_iterations: usize,

    /// Relative cost-reduction tolerance.
    #[arg(long, default_value_t = SolverOptions::default().ftol)]
    pub ftol: f64,

    /// Relative step-size tolerance.
    #[arg(long, default_value_t = SolverOptions::default().xtol)]
    pub xtol: f64,

    /// Scaled-gradient tolerance.
    #[arg(long, default_value_t = SolverOptions::default().gtol)]
    pub gtol: f64,

    /// Initial Levenberg-Marquardt damping.
    #[arg(long, default_value_t = SolverOptions::default().initial_lambda)]
    pub initial_lambda: f64,

    /// Target after-fit RMS (arcsec) printed for comparison.
    #[arg(long, default_value_t = DEFAULT_TARGET_RMS_ARCSEC)]
    pub target_rms: f64,

    /// Show the N points with the largest after-fit residuals.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Export per-point results to CSV.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Export the full fit result to JSON.
    #[arg(long = "export-fit", value_name = "JSON")]
    pub export_fit: Option<PathBuf>,
}

impl FitArgs {
    pub fn commit_policy(&self) -> CommitPolicy {
        match (self.commit, self.no_commit) {
            (true, _) => CommitPolicy::Always,
            (false, true) => CommitPolicy::Never,
            (false, false) => CommitPolicy::Ask,
        }
    }

    pub fn solver_options(&self) -> SolverOptions {
        SolverOptions {
            max_iterations: self.max_iterations,
            ftol: self.ftol,
            xtol: self.xtol,
            gtol: self.gtol,
            initial_lambda: self.initial_lambda,
        }
    }
}

/// Options for `pointing simulate`.
#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Model family used to generate offsets.
    #[arg(short = 'm', long, value_enum)]
    pub model: ModelKind,

    /// Comma-separated coefficients (degrees); must match the model's arity.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    pub params: Vec<f64>,

    /// Output folder for offset_L.txt / offset_C.txt.
    #[arg(short = 'o', long, default_value = DEFAULT_DATA_DIR)]
    pub out_dir: PathBuf,

    /// Number of line pointing rows (0 disables the file).
    #[arg(long, default_value_t = 30)]
    pub line_count: usize,

    /// Number of continuum cross-scan rows (0 disables the file).
    #[arg(long, default_value_t = 30)]
    pub continuum_count: usize,

    /// Gaussian noise (arcsec, 1 sigma) added to each offset.
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    /// Lowest elevation (degrees).
    #[arg(long, default_value_t = 10.0)]
    pub el_min: f64,

    /// Highest elevation (degrees).
    #[arg(long, default_value_t = 80.0)]
    pub el_max: f64,

    /// Maximum separation (degrees) between the AZ and EL scan positions.
    #[arg(long, default_value_t = 1.0)]
    pub scan_separation: f64,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Options for `pointing show`.
#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Fit JSON produced by `pointing fit --export-fit`.
    #[arg(long, value_name = "JSON")]
    pub fit: PathBuf,

    /// Target after-fit RMS (arcsec) printed for comparison.
    #[arg(long, default_value_t = DEFAULT_TARGET_RMS_ARCSEC)]
    pub target_rms: f64,

    /// Show the N points with the largest after-fit residuals.
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

/// Parse `--initial`.
pub fn parse_initial(s: &str) -> Result<InitialGuess, String> {
    let s = s.trim();
    match s.to_ascii_lowercase().as_str() {
        "ask" => return Ok(InitialGuess::Ask),
        "conf" => return Ok(InitialGuess::Conf),
        "zero" | "zeros" => return Ok(InitialGuess::Zero),
        _ => {}
    }

    let values = parse_number_list(s)?;
    if values.is_empty() {
        return Err("expected `conf`, `zero`, `ask`, or a comma-separated list of numbers".to_string());
    }
    Ok(InitialGuess::Values(values))
}

/// Parse numbers separated by commas and/or whitespace.
pub fn parse_number_list(s: &str) -> Result<Vec<f64>, String> {
    s.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .map(|t| t.parse::<f64>().map_err(|_| format!("not a number: {t:?}")))
        .collect()
}
