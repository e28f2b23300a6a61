//! Model evaluation for the three pointing model families.
//!
//! Each family is described by two axis formulas: the azimuth offset as a
//! function of the position where the azimuth offset was measured, and the
//! elevation offset as a function of where the elevation offset was measured.
//! Line geometry evaluates both at the same `(AZ, EL)`; continuum geometry
//! evaluates `dAZ` at `(AZ1, EL1)` and `dEL` at `(AZ2, EL2)`.
//!
//! Inputs and outputs are in degrees. Angles are converted to radians here and
//! nowhere else, so callers must not pre-convert.

use crate::domain::ModelKind;

/// One axis formula: `(params, az_deg, el_deg) -> offset_deg`.
pub type AxisFn = fn(&[f64], f64, f64) -> f64;

/// A model family selected once at the start of a fit.
///
/// Carries the arity and the two axis formulas so that nothing deeper in the
/// call chain needs to branch on the model name.
#[derive(Clone, Copy)]
pub struct PointingModel {
    pub kind: ModelKind,
    pub arity: usize,
    daz: AxisFn,
    del: AxisFn,
}

impl std::fmt::Debug for PointingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PointingModel")
            .field("kind", &self.kind)
            .field("arity", &self.arity)
            .finish()
    }
}

impl PointingModel {
    /// Line geometry: both offsets at the same position.
    pub fn line(&self, params: &[f64], az: f64, el: f64) -> (f64, f64) {
        ((self.daz)(params, az, el), (self.del)(params, az, el))
    }

    /// Continuum geometry: `dAZ` at the AZ-scan position, `dEL` at the EL-scan position.
    pub fn continuum(&self, params: &[f64], az1: f64, el1: f64, az2: f64, el2: f64) -> (f64, f64) {
        ((self.daz)(params, az1, el1), (self.del)(params, az2, el2))
    }

    /// Vectorized line prediction.
    ///
    /// Output length is the shorter of `az` and `el`; equal-length inputs are
    /// the caller's responsibility (the residual builder checks the result).
    pub fn predict_line(&self, params: &[f64], az: &[f64], el: &[f64]) -> (Vec<f64>, Vec<f64>) {
        az.iter()
            .zip(el.iter())
            .map(|(&a, &e)| self.line(params, a, e))
            .unzip()
    }

    /// Vectorized continuum prediction.
    pub fn predict_continuum(
        &self,
        params: &[f64],
        az1: &[f64],
        el1: &[f64],
        az2: &[f64],
        el2: &[f64],
    ) -> (Vec<f64>, Vec<f64>) {
        let daz = az1
            .iter()
            .zip(el1.iter())
            .map(|(&a, &e)| (self.daz)(params, a, e))
            .collect();
        let del = az2
            .iter()
            .zip(el2.iter())
            .map(|(&a, &e)| (self.del)(params, a, e))
            .collect();
        (daz, del)
    }
}

const SIXTY_CM: PointingModel = PointingModel {
    kind: ModelKind::SixtyCm,
    arity: 6,
    daz: daz_60cm,
    del: del_60cm,
};

const SIXTY_CM_2: PointingModel = PointingModel {
    kind: ModelKind::SixtyCm2,
    arity: 10,
    daz: daz_60cm_2,
    del: del_60cm_2,
};

const OPTICAL: PointingModel = PointingModel {
    kind: ModelKind::Optical,
    arity: 15,
    daz: daz_optical,
    del: del_optical,
};

impl ModelKind {
    /// The model family's prediction functions.
    pub fn model(self) -> &'static PointingModel {
        match self {
            ModelKind::SixtyCm => &SIXTY_CM,
            ModelKind::SixtyCm2 => &SIXTY_CM_2,
            ModelKind::Optical => &OPTICAL,
        }
    }
}

/// Predict `(dAZ, dEL)` at a single line-pointing position.
///
/// # Panics
/// Panics if `params` is shorter than `model.arity()`. The residual builder
/// validates arity before calling into the models.
pub fn predict_line(model: ModelKind, params: &[f64], az: f64, el: f64) -> (f64, f64) {
    model.model().line(params, az, el)
}

/// Predict `(dAZ, dEL)` for a continuum cross-scan pair.
///
/// # Panics
/// Same as [`predict_line`].
pub fn predict_continuum(
    model: ModelKind,
    params: &[f64],
    az1: f64,
    el1: f64,
    az2: f64,
    el2: f64,
) -> (f64, f64) {
    model.model().continuum(params, az1, el1, az2, el2)
}

// 60cm telescope model (Nakajima et al. 2007), B0..B5.

fn daz_60cm(b: &[f64], az: f64, el: f64) -> f64 {
    let (a, e) = (az.to_radians(), el.to_radians());
    b[0] * (a - e).sin() + b[1] * (a - e).cos() + b[2] + b[4] * e.cos() - b[5] * e.sin()
}

fn del_60cm(b: &[f64], az: f64, el: f64) -> f64 {
    let (a, e) = (az.to_radians(), el.to_radians());
    b[0] * (a - e).cos() - b[1] * (a - e).sin() + b[3] + b[4] * e.sin() + b[5] * e.cos()
}

// Extended 60cm model, B0..B9. Adds AZ and (AZ+EL) harmonics.

fn daz_60cm_2(b: &[f64], az: f64, el: f64) -> f64 {
    let (a, e) = (az.to_radians(), el.to_radians());
    b[1] * (a - e).cos() - b[0] * (a - e).sin() + b[2] + b[4] * e.cos() - b[5] * e.sin()
        + b[6] * a.cos()
        - b[7] * a.sin()
        + b[8] * (a + e).cos()
        - b[9] * (a + e).sin()
}

fn del_60cm_2(b: &[f64], az: f64, el: f64) -> f64 {
    let (a, e) = (az.to_radians(), el.to_radians());
    // B1 would multiply sin(EL - EL), which is identically zero.
    b[0] * (a - e).cos() + b[3] - b[4] * e.sin() + b[5] * e.cos()
        + b[6] * a.sin()
        + b[7] * a.cos()
        + b[8] * (a + e).sin()
        + b[9] * (a + e).cos()
}

// Optical pointing model, A1..A15 stored at indices 0..14.

fn daz_optical(p: &[f64], az: f64, el: f64) -> f64 {
    let (a, e) = (az.to_radians(), el.to_radians());
    let (sa, ca) = a.sin_cos();
    let (se, ce) = e.sin_cos();
    let te = e.tan();
    p[0] + p[1] * ca * te + p[2] * sa * te + p[3] * te + p[4] / ce
        + p[7] * ca
        + p[8] * sa
        + p[11] * ca * ce
        + p[12] * ca * se
        + p[13] * sa * ce
        // A15 is a linear term in EL degrees.
        + p[14] * el
}

fn del_optical(p: &[f64], az: f64, el: f64) -> f64 {
    let (a, e) = (az.to_radians(), el.to_radians());
    let (sa, ca) = a.sin_cos();
    -p[1] * sa + p[2] * ca + p[5] + p[6] * e.cos() + p[9] * ca + p[10] * sa
}
