//! Shared domain types.
//!
//! These types are kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - reloaded later for reporting

use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::math::SolverOptions;

/// Degrees to arcseconds.
pub const ARCSEC_PER_DEG: f64 = 3600.0;

/// Instrumental pointing model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum ModelKind {
    /// 60cm telescope model, 6 parameters (B0..B5).
    #[serde(rename = "60cm_model")]
    #[value(name = "60cm_model", alias = "1")]
    SixtyCm,
    /// Extended 60cm model, 10 parameters (B0..B9).
    #[serde(rename = "60cm_model_2")]
    #[value(name = "60cm_model_2", alias = "2")]
    SixtyCm2,
    /// Optical pointing model, 15 parameters (A1..A15).
    #[serde(rename = "optical_model")]
    #[value(name = "optical_model", alias = "3")]
    Optical,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [ModelKind::SixtyCm, ModelKind::SixtyCm2, ModelKind::Optical];

    /// Name used in configuration markers and file names.
    pub fn config_name(self) -> &'static str {
        match self {
            ModelKind::SixtyCm => "60cm_model",
            ModelKind::SixtyCm2 => "60cm_model_2",
            ModelKind::Optical => "optical_model",
        }
    }

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::SixtyCm => "60 cm telescope model",
            ModelKind::SixtyCm2 => "60 cm telescope model (extended)",
            ModelKind::Optical => "Optical pointing model",
        }
    }

    /// Number of coefficients in the parameter vector.
    pub fn arity(self) -> usize {
        match self {
            ModelKind::SixtyCm => 6,
            ModelKind::SixtyCm2 => 10,
            ModelKind::Optical => 15,
        }
    }

    /// Coefficient labels in vector order (`B0..` or `A1..`).
    pub fn param_names(self) -> Vec<String> {
        match self {
            ModelKind::SixtyCm | ModelKind::SixtyCm2 => {
                (0..self.arity()).map(|i| format!("B{i}")).collect()
            }
            ModelKind::Optical => (1..=self.arity()).map(|i| format!("A{i}")).collect(),
        }
    }

    /// Check that a parameter vector has exactly this model's arity.
    pub fn check_arity(self, params: &[f64]) -> Result<(), crate::error::FitError> {
        if params.len() == self.arity() {
            Ok(())
        } else {
            Err(crate::error::FitError::ArityMismatch {
                model: self,
                expected: self.arity(),
                got: params.len(),
            })
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_name())
    }
}

/// Pointing offset axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    Az,
    El,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Az => f.write_str("dAZ"),
            Axis::El => f.write_str("dEL"),
        }
    }
}

/// How a pointing offset was measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationSource {
    /// Spectral-line peak fitting.
    Line,
    /// Continuum cross-scan.
    Continuum,
}

impl fmt::Display for ObservationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObservationSource::Line => f.write_str("line"),
            ObservationSource::Continuum => f.write_str("continuum"),
        }
    }
}

/// Which residual function a fit ran against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitSource {
    LineOnly,
    ContinuumOnly,
    Combined,
}

impl FitSource {
    pub fn label(self) -> &'static str {
        match self {
            FitSource::LineOnly => "line data only",
            FitSource::ContinuumOnly => "continuum data only",
            FitSource::Combined => "line + continuum data (joint fit)",
        }
    }
}

/// Line-pointing observations: one `(AZ, EL, dAZ, dEL)` row per measurement.
///
/// All values are in degrees.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineObservations {
    pub az: Vec<f64>,
    pub el: Vec<f64>,
    pub daz: Vec<f64>,
    pub del: Vec<f64>,
}

impl LineObservations {
    /// Build from columns, rejecting unequal lengths.
    pub fn from_columns(
        az: Vec<f64>,
        el: Vec<f64>,
        daz: Vec<f64>,
        del: Vec<f64>,
    ) -> Result<Self, AppError> {
        let n = az.len();
        if el.len() != n || daz.len() != n || del.len() != n {
            return Err(AppError::input(format!(
                "Line observation columns differ in length (AZ={}, EL={}, dAZ={}, dEL={}).",
                n,
                el.len(),
                daz.len(),
                del.len()
            )));
        }
        Ok(Self { az, el, daz, del })
    }

    pub fn push(&mut self, az: f64, el: f64, daz: f64, del: f64) {
        self.az.push(az);
        self.el.push(el);
        self.daz.push(daz);
        self.del.push(del);
    }

    pub fn len(&self) -> usize {
        self.az.len()
    }

    pub fn is_empty(&self) -> bool {
        self.az.is_empty()
    }
}

/// Continuum cross-scan observations.
///
/// The azimuth-offset scan and the elevation-offset scan are taken at
/// different sky positions, so each row carries two coordinate pairs:
/// `(AZ1, EL1)` for `dAZ` and `(AZ2, EL2)` for `dEL`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContinuumObservations {
    pub az1: Vec<f64>,
    pub el1: Vec<f64>,
    pub daz: Vec<f64>,
    pub az2: Vec<f64>,
    pub el2: Vec<f64>,
    pub del: Vec<f64>,
}

impl ContinuumObservations {
    /// Build from columns, rejecting unequal lengths.
    pub fn from_columns(
        az1: Vec<f64>,
        el1: Vec<f64>,
        daz: Vec<f64>,
        az2: Vec<f64>,
        el2: Vec<f64>,
        del: Vec<f64>,
    ) -> Result<Self, AppError> {
        let n = az1.len();
        let lens = [el1.len(), daz.len(), az2.len(), el2.len(), del.len()];
        if lens.iter().any(|&l| l != n) {
            return Err(AppError::input(format!(
                "Continuum observation columns differ in length (AZ1={n}, EL1={}, dAZ={}, AZ2={}, EL2={}, dEL={}).",
                lens[0], lens[1], lens[2], lens[3], lens[4]
            )));
        }
        Ok(Self {
            az1,
            el1,
            daz,
            az2,
            el2,
            del,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn push(&mut self, az1: f64, el1: f64, daz: f64, az2: f64, el2: f64, del: f64) {
        self.az1.push(az1);
        self.el1.push(el1);
        self.daz.push(daz);
        self.az2.push(az2);
        self.el2.push(el2);
        self.del.push(del);
    }

    pub fn len(&self) -> usize {
        self.az1.len()
    }

    pub fn is_empty(&self) -> bool {
        self.az1.is_empty()
    }
}

/// Everything a fit can draw on. An empty sub-collection disables that source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationSet {
    pub line: LineObservations,
    pub continuum: ContinuumObservations,
}

impl ObservationSet {
    /// Pick the residual function from data availability.
    ///
    /// Returns `None` when neither source has data.
    pub fn fit_source(&self) -> Option<FitSource> {
        match (self.line.is_empty(), self.continuum.is_empty()) {
            (false, true) => Some(FitSource::LineOnly),
            (true, false) => Some(FitSource::ContinuumOnly),
            (false, false) => Some(FitSource::Combined),
            (true, true) => None,
        }
    }
}

/// Observed vs fitted offsets for a single measurement (degrees).
///
/// For line rows both coordinate pairs are the same point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointResidual {
    pub source: ObservationSource,
    /// Position of the azimuth-offset measurement.
    pub az1: f64,
    pub el1: f64,
    /// Position of the elevation-offset measurement.
    pub az2: f64,
    pub el2: f64,
    pub daz_obs: f64,
    pub del_obs: f64,
    pub daz_fit: f64,
    pub del_fit: f64,
}

impl PointResidual {
    /// `fit - obs` in azimuth.
    pub fn daz_residual(&self) -> f64 {
        self.daz_fit - self.daz_obs
    }

    /// `fit - obs` in elevation.
    pub fn del_residual(&self) -> f64 {
        self.del_fit - self.del_obs
    }
}

/// Per-axis after-fit RMS for one source (arcsec).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisRms {
    pub daz_arcsec: f64,
    pub del_arcsec: f64,
}

/// Before/after RMS statistics (arcsec).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RmsSummary {
    /// `sqrt(mean(dAZ_obs² + dEL_obs²))`, pooled over all sources used.
    pub before_arcsec: f64,
    /// `sqrt(mean((dAZ_fit-dAZ_obs)² + (dEL_fit-dEL_obs)²))`, pooled.
    pub after_arcsec: f64,
    pub line: Option<AxisRms>,
    pub continuum: Option<AxisRms>,
}

/// Output of a converged fit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitResult {
    pub model: ModelKind,
    pub source: FitSource,
    pub initial: Vec<f64>,
    pub params: Vec<f64>,
    pub rms: RmsSummary,
    pub residuals: Vec<PointResidual>,
    pub iterations: usize,
    pub converged: bool,
    /// Final `0.5 * Σ r²` of the solver's residual vector.
    pub cost: f64,
}

/// Where the initial parameter vector comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum InitialGuess {
    /// Ask the operator (persisted vs manual).
    Ask,
    /// Most recently persisted vector from the instrument configuration.
    Conf,
    /// All zeros.
    Zero,
    /// Literal vector.
    Values(Vec<f64>),
}

/// Whether to write a fitted vector back to the instrument configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CommitPolicy {
    /// Ask for confirmation.
    Ask,
    /// Write without asking.
    Always,
    /// Never write.
    Never,
}

/// A full run's configuration as understood by the session.
///
/// This is derived from CLI flags (plus environment defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    /// Preselected model; `None` means ask the operator.
    pub model: Option<ModelKind>,
    pub initial: InitialGuess,
    pub commit: CommitPolicy,

    /// Folder searched for `offset_L.txt` / `offset_C.txt`.
    pub data_dir: PathBuf,
    /// Explicit line-pointing file (overrides discovery).
    pub line_path: Option<PathBuf>,
    /// Explicit continuum-pointing file (overrides discovery).
    pub continuum_path: Option<PathBuf>,
    /// Instrument configuration file holding persisted coefficients.
    pub conf_path: PathBuf,

    pub solver: SolverOptions,
    pub target_rms_arcsec: f64,

    pub export_results: Option<PathBuf>,
    pub export_fit: Option<PathBuf>,
}
