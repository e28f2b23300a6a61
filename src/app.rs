//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` defaults and parses CLI arguments
//! - sets up logging
//! - dispatches to the fit session, the simulator, or the report viewer

use clap::Parser;
use log::info;

use crate::cli::prompt::ConsoleOperator;
use crate::cli::{Cli, Command, FitArgs, ShowArgs, SimulateArgs};
use crate::data::SimulationSpec;
use crate::domain::{FitConfig, InitialGuess};
use crate::error::{AppError, EXIT_DATA};
use crate::fit::AbortReason;

pub mod session;

pub use session::{SessionOutcome, initial_guess, run_session};

/// Entry point for the `pointing` binary.
pub fn run() -> Result<(), AppError> {
    // Defaults for POINTING_CONF / POINTING_DATA_DIR may live in `.env`.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Simulate(args) => handle_simulate(args),
        Command::Show(args) => handle_show(args),
    }
}

/// Log to stderr so the report on stdout stays clean. `RUST_LOG` still applies.
fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let mut builder = env_logger::Builder::from_default_env();
    builder
        .target(env_logger::Target::Stderr)
        .format_target(false)
        .filter_level(level);
    // A second init (tests) is harmless.
    builder.try_init().ok();
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args);
    let mut operator = ConsoleOperator::stdio();
    let mut stdout = std::io::stdout();

    match run_session(&config, &mut operator, &mut stdout, args.top)? {
        SessionOutcome::Solved { committed, .. } => {
            if committed {
                println!("Coefficients written to {}", config.conf_path.display());
            }
            Ok(())
        }
        SessionOutcome::Aborted(AbortReason::NoObservations) => Err(AppError::new(
            EXIT_DATA,
            format!(
                "No line or continuum observations found under '{}'.",
                config.data_dir.display()
            ),
        )),
        SessionOutcome::Aborted(reason) => {
            println!("Aborted: {}.", reason.describe());
            Ok(())
        }
    }
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let spec = SimulationSpec {
        model: args.model,
        params: args.params,
        line_count: args.line_count,
        continuum_count: args.continuum_count,
        noise_arcsec: args.noise,
        el_min: args.el_min,
        el_max: args.el_max,
        scan_separation: args.scan_separation,
        seed: args.seed,
    };
    let written = crate::data::simulate_to_dir(&spec, &args.out_dir)?;
    for path in &written {
        info!("Wrote {}", path.display());
    }
    Ok(())
}

fn handle_show(args: ShowArgs) -> Result<(), AppError> {
    let fit = crate::io::read_fit_json(&args.fit)?;
    println!("{}", crate::report::format_fit_summary(&fit, args.target_rms));
    println!("{}", crate::report::format_worst_points(&fit.residuals, args.top));
    Ok(())
}

pub fn fit_config_from_args(args: &FitArgs) -> FitConfig {
    FitConfig {
        model: args.model,
        initial: args.initial.clone().unwrap_or(InitialGuess::Ask),
        commit: args.commit_policy(),
        data_dir: args.data_dir.clone(),
        line_path: args.line.clone(),
        continuum_path: args.continuum.clone(),
        conf_path: args.conf.clone(),
        solver: args.solver_options(),
        target_rms_arcsec: args.target_rms,
        export_results: args.export.clone(),
        export_fit: args.export_fit.clone(),
    }
}
