//! Pointing observation files: discovery and parsing.
//!
//! Two files feed a fit:
//!
//! - `offset_L.txt`: line pointing, comma-separated `AZ,EL,dAZ,dEL`
//! - `offset_C.txt`: continuum cross-scans, tab-separated
//!   `AZ1 EL1 dAZ AZ2 EL2 dEL`
//!
//! Both carry one header row and angles in degrees. Either may be missing; a
//! missing file simply disables that source.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use csv::StringRecord;
use log::{debug, info};

use crate::domain::{ContinuumObservations, FitConfig, LineObservations, ObservationSet};
use crate::error::AppError;

pub const LINE_FILE_NAME: &str = "offset_L.txt";
pub const CONTINUUM_FILE_NAME: &str = "offset_C.txt";

/// Directory recursion depth when searching for observation files.
const DEFAULT_SEARCH_DEPTH: usize = 4;

/// Observation files located under a data folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservationFiles {
    pub line: Option<PathBuf>,
    pub continuum: Option<PathBuf>,
}

/// Search `dir` recursively for `offset_L.txt` and `offset_C.txt`.
///
/// Traversal is sorted, so the first match is deterministic. A missing or
/// unreadable directory yields no files.
pub fn discover_observation_files(dir: &Path) -> ObservationFiles {
    let mut found = ObservationFiles::default();
    discover_inner(dir, 0, DEFAULT_SEARCH_DEPTH, &mut found);
    found
}

fn discover_inner(dir: &Path, depth: usize, max_depth: usize, found: &mut ObservationFiles) {
    if depth > max_depth || (found.line.is_some() && found.continuum.is_some()) {
        return;
    }

    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    let mut paths: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
    paths.sort();

    // Files at this level take precedence over anything deeper.
    for path in paths.iter().filter(|p| p.is_file()) {
        match path.file_name().and_then(|s| s.to_str()) {
            Some(LINE_FILE_NAME) if found.line.is_none() => found.line = Some(path.clone()),
            Some(CONTINUUM_FILE_NAME) if found.continuum.is_none() => {
                found.continuum = Some(path.clone())
            }
            _ => {}
        }
    }

    for path in paths.iter().filter(|p| p.is_dir()) {
        if should_skip_dir(path) {
            continue;
        }
        discover_inner(path, depth + 1, max_depth, found);
    }
}

fn should_skip_dir(path: &Path) -> bool {
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
    matches!(name, ".git" | "target")
}

/// Read a comma-separated line pointing file.
pub fn read_line_observations(path: &Path) -> Result<LineObservations, AppError> {
    let mut obs = LineObservations::default();
    for_each_row(path, b',', 4, |v| obs.push(v[0], v[1], v[2], v[3]))?;
    Ok(obs)
}

/// Read a tab-separated continuum pointing file.
pub fn read_continuum_observations(path: &Path) -> Result<ContinuumObservations, AppError> {
    let mut obs = ContinuumObservations::default();
    for_each_row(path, b'\t', 6, |v| obs.push(v[0], v[1], v[2], v[3], v[4], v[5]))?;
    Ok(obs)
}

/// Parse every data row of `path` into `columns` floats and hand them to `f`.
fn for_each_row<F>(path: &Path, delimiter: u8, columns: usize, mut f: F) -> Result<(), AppError>
where
    F: FnMut(&[f64]),
{
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut values = Vec::with_capacity(columns);
    for (idx, result) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        let record = result.map_err(|e| {
            AppError::input(format!("{}:{line}: CSV parse error: {e}", path.display()))
        })?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }

        values.clear();
        parse_record(&record, columns, &mut values)
            .map_err(|msg| AppError::input(format!("{}:{line}: {msg}", path.display())))?;
        f(&values);
    }

    Ok(())
}

fn parse_record(record: &StringRecord, columns: usize, out: &mut Vec<f64>) -> Result<(), String> {
    if record.len() < columns {
        return Err(format!(
            "expected {columns} columns, found {}",
            record.len()
        ));
    }
    for (i, field) in record.iter().take(columns).enumerate() {
        let v = field
            .parse::<f64>()
            .map_err(|_| format!("column {}: not a number: {field:?}", i + 1))?;
        if !v.is_finite() {
            return Err(format!("column {}: non-finite value {field:?}", i + 1));
        }
        out.push(v);
    }
    Ok(())
}

/// Load whatever observations the run configuration points at.
///
/// Explicit paths must exist. Otherwise the data folder is searched and
/// missing files leave the corresponding source empty.
pub fn load_observations(config: &FitConfig) -> Result<ObservationSet, AppError> {
    let discovered = if config.line_path.is_none() || config.continuum_path.is_none() {
        discover_observation_files(&config.data_dir)
    } else {
        ObservationFiles::default()
    };

    let line_path = resolve_path(config.line_path.as_deref(), discovered.line)?;
    let continuum_path = resolve_path(config.continuum_path.as_deref(), discovered.continuum)?;

    let line = match &line_path {
        Some(path) => {
            let obs = read_line_observations(path)?;
            info!("Read {} line observations from {}", obs.len(), path.display());
            obs
        }
        None => {
            debug!("No {LINE_FILE_NAME} under {}", config.data_dir.display());
            LineObservations::default()
        }
    };

    let continuum = match &continuum_path {
        Some(path) => {
            let obs = read_continuum_observations(path)?;
            info!("Read {} continuum observations from {}", obs.len(), path.display());
            obs
        }
        None => {
            debug!("No {CONTINUUM_FILE_NAME} under {}", config.data_dir.display());
            ContinuumObservations::default()
        }
    };

    Ok(ObservationSet { line, continuum })
}

fn resolve_path(explicit: Option<&Path>, discovered: Option<PathBuf>) -> Result<Option<PathBuf>, AppError> {
    match explicit {
        Some(path) if !path.is_file() => Err(AppError::input(format!(
            "Observation file not found: {}",
            path.display()
        ))),
        Some(path) => Ok(Some(path.to_path_buf())),
        None => Ok(discovered),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write(path: &Path, body: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut f = File::create(path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn reads_line_file_with_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(LINE_FILE_NAME);
        write(&path, "AZ,EL,dAZ,dEL\n10.0, 20.0, 0.01, -0.02\n200.5,45.25,0.003,0.004\n");

        let obs = read_line_observations(&path).unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs.az, vec![10.0, 200.5]);
        assert_eq!(obs.del, vec![-0.02, 0.004]);
    }

    #[test]
    fn reads_tab_separated_continuum_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONTINUUM_FILE_NAME);
        write(
            &path,
            "AZ1\tEL1\tdAZ\tAZ2\tEL2\tdEL\n10\t20\t0.01\t11\t21\t0.02\n",
        );

        let obs = read_continuum_observations(&path).unwrap();
        assert_eq!(obs.len(), 1);
        assert_eq!(obs.az2, vec![11.0]);
        assert_eq!(obs.el2, vec![21.0]);
        assert_eq!(obs.del, vec![0.02]);
    }

    #[test]
    fn header_only_file_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(LINE_FILE_NAME);
        write(&path, "AZ,EL,dAZ,dEL\n");
        assert!(read_line_observations(&path).unwrap().is_empty());
    }

    #[test]
    fn bad_value_names_the_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(LINE_FILE_NAME);
        write(&path, "AZ,EL,dAZ,dEL\n1,2,3,4\n1,2,x,4\n");

        let err = read_line_observations(&path).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
        assert!(err.message().contains(":3:"), "{}", err.message());
    }

    #[test]
    fn short_row_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONTINUUM_FILE_NAME);
        write(&path, "AZ1\tEL1\tdAZ\tAZ2\tEL2\tdEL\n1\t2\t3\n");
        assert!(read_continuum_observations(&path).is_err());
    }

    #[test]
    fn discovery_is_recursive_and_sorted() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("b/offset_L.txt"), "h\n");
        write(&dir.path().join("a/offset_L.txt"), "h\n");
        write(&dir.path().join("a/deeper/offset_C.txt"), "h\n");
        write(&dir.path().join("target/offset_C.txt"), "h\n");

        let found = discover_observation_files(dir.path());
        assert_eq!(found.line, Some(dir.path().join("a/offset_L.txt")));
        assert_eq!(found.continuum, Some(dir.path().join("a/deeper/offset_C.txt")));
    }

    #[test]
    fn missing_folder_finds_nothing() {
        let dir = tempdir().unwrap();
        let found = discover_observation_files(&dir.path().join("does-not-exist"));
        assert_eq!(found, ObservationFiles::default());
    }

    #[test]
    fn explicit_missing_path_is_an_input_error() {
        let dir = tempdir().unwrap();
        let err = resolve_path(Some(&dir.path().join("nope.txt")), None).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
    }
}
