//! Synthetic pointing observations generated from known coefficients.
//!
//! Positions are drawn uniformly (AZ in [0, 360), EL in [el_min, el_max]).
//! Offsets come from the chosen model plus optional Gaussian noise given in
//! arcseconds. The same seed always produces the same files.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{ARCSEC_PER_DEG, ContinuumObservations, LineObservations, ModelKind, ObservationSet};
use crate::error::AppError;
use crate::io::{CONTINUUM_FILE_NAME, LINE_FILE_NAME};

/// Everything needed to generate one synthetic data set.
#[derive(Debug, Clone)]
pub struct SimulationSpec {
    pub model: ModelKind,
    pub params: Vec<f64>,
    pub line_count: usize,
    pub continuum_count: usize,
    /// 1-sigma noise per offset, arcsec.
    pub noise_arcsec: f64,
    pub el_min: f64,
    pub el_max: f64,
    /// Max distance (deg, per coordinate) between the AZ-scan and EL-scan
    /// positions of a continuum row.
    pub scan_separation: f64,
    pub seed: u64,
}

impl SimulationSpec {
    fn validate(&self) -> Result<(), AppError> {
        self.model.check_arity(&self.params)?;
        if !(self.noise_arcsec.is_finite() && self.noise_arcsec >= 0.0) {
            return Err(AppError::input("Noise must be a finite, non-negative number of arcsec."));
        }
        if !(self.el_min.is_finite() && self.el_max.is_finite() && 0.0 <= self.el_min && self.el_min < self.el_max && self.el_max < 90.0) {
            return Err(AppError::input(format!(
                "Invalid elevation range [{}, {}]; need 0 <= min < max < 90.",
                self.el_min, self.el_max
            )));
        }
        if !(self.scan_separation.is_finite() && self.scan_separation >= 0.0) {
            return Err(AppError::input("Scan separation must be finite and non-negative."));
        }
        if self.line_count == 0 && self.continuum_count == 0 {
            return Err(AppError::input("Nothing to generate: both row counts are zero."));
        }
        Ok(())
    }
}

/// Generate line and continuum observations per `spec`.
pub fn simulate_observations(spec: &SimulationSpec) -> Result<ObservationSet, AppError> {
    spec.validate()?;

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let noise = Normal::new(0.0, spec.noise_arcsec / ARCSEC_PER_DEG)
        .map_err(|e| AppError::input(format!("Noise distribution error: {e}")))?;
    let model = spec.model.model();
    let p = &spec.params;

    let mut line = LineObservations::default();
    for _ in 0..spec.line_count {
        let (az, el) = random_position(&mut rng, spec);
        let (daz, del) = model.line(p, az, el);
        line.push(az, el, daz + noise.sample(&mut rng), del + noise.sample(&mut rng));
    }

    let mut continuum = ContinuumObservations::default();
    for _ in 0..spec.continuum_count {
        let (az1, el1) = random_position(&mut rng, spec);
        let (az2, el2) = if spec.scan_separation > 0.0 {
            let s = spec.scan_separation;
            (
                (az1 + rng.gen_range(-s..=s)).rem_euclid(360.0),
                (el1 + rng.gen_range(-s..=s)).clamp(spec.el_min, spec.el_max),
            )
        } else {
            (az1, el1)
        };
        let (daz, del) = model.continuum(p, az1, el1, az2, el2);
        continuum.push(
            az1,
            el1,
            daz + noise.sample(&mut rng),
            az2,
            el2,
            del + noise.sample(&mut rng),
        );
    }

    Ok(ObservationSet { line, continuum })
}

fn random_position(rng: &mut StdRng, spec: &SimulationSpec) -> (f64, f64) {
    (rng.gen_range(0.0..360.0), rng.gen_range(spec.el_min..=spec.el_max))
}

/// Generate observations and write the non-empty files into `out_dir`.
pub fn simulate_to_dir(spec: &SimulationSpec, out_dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let set = simulate_observations(spec)?;
    fs::create_dir_all(out_dir)
        .map_err(|e| AppError::input(format!("Failed to create '{}': {e}", out_dir.display())))?;

    let mut written = Vec::new();
    if !set.line.is_empty() {
        let path = out_dir.join(LINE_FILE_NAME);
        write_line_file(&path, &set.line)?;
        written.push(path);
    }
    if !set.continuum.is_empty() {
        let path = out_dir.join(CONTINUUM_FILE_NAME);
        write_continuum_file(&path, &set.continuum)?;
        written.push(path);
    }
    Ok(written)
}

/// Write a comma-separated line pointing file.
pub fn write_line_file(path: &Path, obs: &LineObservations) -> Result<(), AppError> {
    write_file(path, |out| {
        writeln!(out, "AZ,EL,dAZ,dEL")?;
        for i in 0..obs.len() {
            writeln!(
                out,
                "{:.9},{:.9},{:.9},{:.9}",
                obs.az[i], obs.el[i], obs.daz[i], obs.del[i]
            )?;
        }
        Ok(())
    })
}

/// Write a tab-separated continuum pointing file.
pub fn write_continuum_file(path: &Path, obs: &ContinuumObservations) -> Result<(), AppError> {
    write_file(path, |out| {
        writeln!(out, "AZ1\tEL1\tdAZ\tAZ2\tEL2\tdEL")?;
        for i in 0..obs.len() {
            writeln!(
                out,
                "{:.9}\t{:.9}\t{:.9}\t{:.9}\t{:.9}\t{:.9}",
                obs.az1[i], obs.el1[i], obs.daz[i], obs.az2[i], obs.el2[i], obs.del[i]
            )?;
        }
        Ok(())
    })
}

fn write_file<F>(path: &Path, body: F) -> Result<(), AppError>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    body(&mut out)
        .and_then(|()| out.flush())
        .map_err(|e| AppError::input(format!("Failed to write '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{read_continuum_observations, read_line_observations};
    use approx::assert_abs_diff_eq;
    use tempfile::tempdir;

    fn spec() -> SimulationSpec {
        SimulationSpec {
            model: ModelKind::SixtyCm,
            params: vec![0.01, 0.02, 0.03, 0.04, 0.05, 0.06],
            line_count: 12,
            continuum_count: 8,
            noise_arcsec: 0.0,
            el_min: 15.0,
            el_max: 75.0,
            scan_separation: 1.0,
            seed: 7,
        }
    }

    #[test]
    fn same_seed_same_data() {
        let noisy = SimulationSpec {
            noise_arcsec: 5.0,
            ..spec()
        };
        assert_eq!(simulate_observations(&noisy).unwrap(), simulate_observations(&noisy).unwrap());
    }

    #[test]
    fn noiseless_offsets_match_the_model() {
        let s = spec();
        let set = simulate_observations(&s).unwrap();
        assert_eq!(set.line.len(), 12);
        assert_eq!(set.continuum.len(), 8);

        let m = s.model.model();
        for i in 0..set.line.len() {
            let (daz, del) = m.line(&s.params, set.line.az[i], set.line.el[i]);
            assert_abs_diff_eq!(daz, set.line.daz[i], epsilon = 1e-12);
            assert_abs_diff_eq!(del, set.line.del[i], epsilon = 1e-12);
            assert!((15.0..=75.0).contains(&set.line.el[i]));
        }
        for i in 0..set.continuum.len() {
            assert!((set.continuum.az1[i] - set.continuum.az2[i]).abs() <= 1.0 + 1e-9
                || (set.continuum.az1[i] - set.continuum.az2[i]).abs() >= 359.0 - 1e-9);
        }
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let bad_arity = SimulationSpec {
            params: vec![0.0; 3],
            ..spec()
        };
        assert!(simulate_observations(&bad_arity).is_err());

        let bad_el = SimulationSpec {
            el_max: 90.0,
            ..spec()
        };
        assert!(simulate_observations(&bad_el).is_err());
    }

    #[test]
    fn written_files_read_back() {
        let dir = tempdir().unwrap();
        let written = simulate_to_dir(&spec(), dir.path()).unwrap();
        assert_eq!(written.len(), 2);

        let set = simulate_observations(&spec()).unwrap();
        let line = read_line_observations(&dir.path().join(LINE_FILE_NAME)).unwrap();
        let cont = read_continuum_observations(&dir.path().join(CONTINUUM_FILE_NAME)).unwrap();
        assert_eq!(line.len(), set.line.len());
        assert_eq!(cont.len(), set.continuum.len());
        assert_abs_diff_eq!(line.daz[3], set.line.daz[3], epsilon = 1e-9);
        assert_abs_diff_eq!(cont.el2[5], set.continuum.el2[5], epsilon = 1e-9);
    }

    #[test]
    fn zero_count_skips_the_file() {
        let dir = tempdir().unwrap();
        let only_line = SimulationSpec {
            continuum_count: 0,
            ..spec()
        };
        let written = simulate_to_dir(&only_line, dir.path()).unwrap();
        assert_eq!(written, vec![dir.path().join(LINE_FILE_NAME)]);
    }
}
