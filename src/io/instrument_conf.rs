//! Persisted pointing coefficients in the instrument configuration file.
//!
//! The configuration is line-oriented text. Coefficients live in three
//! records keyed `AntRadioInst0`, `AntRadioInst1`, `AntRadioInst2`, each
//! followed by whitespace-separated numbers:
//!
//! ```text
//! # 60cm_model	2024/05/01 12:00:00
//! AntRadioInst0	0.010000000	0.020000000	0.030000000	0.040000000
//! AntRadioInst1	0.050000000	0.060000000	0.000000000	0.000000000
//! AntRadioInst2	0.000000000	0.000000000	0.000000000	0.000000000
//! ```
//!
//! Committing a new vector never deletes anything: live records are commented
//! out with a leading `#` and a timestamped block is appended.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::Local;
use log::{debug, info, warn};

use crate::domain::ModelKind;
use crate::error::{AppError, FitError};

pub const RECORD_KEYS: [&str; 3] = ["AntRadioInst0", "AntRadioInst1", "AntRadioInst2"];

const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// One configuration record as a model uses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSpec {
    pub key: &'static str,
    /// Leading fields that carry coefficients.
    pub used: usize,
    /// Fields written; slots past `used` are zero.
    pub width: usize,
}

const fn rec(key: &'static str, used: usize, width: usize) -> RecordSpec {
    RecordSpec { key, used, width }
}

const SIXTY_CM_LAYOUT: [RecordSpec; 3] = [
    rec("AntRadioInst0", 4, 4),
    rec("AntRadioInst1", 2, 4),
    rec("AntRadioInst2", 0, 4),
];

const SIXTY_CM_2_LAYOUT: [RecordSpec; 3] = [
    rec("AntRadioInst0", 4, 4),
    rec("AntRadioInst1", 4, 4),
    rec("AntRadioInst2", 2, 4),
];

const OPTICAL_LAYOUT: [RecordSpec; 3] = [
    rec("AntRadioInst0", 5, 5),
    rec("AntRadioInst1", 5, 5),
    rec("AntRadioInst2", 5, 5),
];

/// Record layout for a model family. The `used` counts sum to the arity.
pub fn record_layout(model: ModelKind) -> &'static [RecordSpec; 3] {
    match model {
        ModelKind::SixtyCm => &SIXTY_CM_LAYOUT,
        ModelKind::SixtyCm2 => &SIXTY_CM_2_LAYOUT,
        ModelKind::Optical => &OPTICAL_LAYOUT,
    }
}

/// Live (uncommented) records of a configuration text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfRecords {
    /// Fields per key; a later line with the same key replaces an earlier one.
    pub records: HashMap<String, Vec<f64>>,
    /// Model named by the last `# <model> <timestamp>` marker before the first
    /// live record, if any.
    pub marker: Option<ModelKind>,
}

/// Parse the live coefficient records out of configuration text.
///
/// A record is live only when its key starts the line. Lines whose fields do
/// not all parse as numbers are ignored.
pub fn parse_records(text: &str) -> ConfRecords {
    let mut out = ConfRecords::default();
    let mut last_marker = None;
    let mut seen_record = false;

    for (idx, line) in text.lines().enumerate() {
        if let Some(comment) = line.trim_start().strip_prefix('#') {
            if !seen_record {
                if let Some(model) = parse_marker(comment) {
                    last_marker = Some(model);
                }
            }
            continue;
        }

        let Some(key) = record_key(line) else {
            continue;
        };

        let fields: Result<Vec<f64>, _> = line[key.len()..]
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect();
        match fields {
            Ok(values) => {
                if !seen_record {
                    out.marker = last_marker;
                    seen_record = true;
                }
                out.records.insert(key.to_string(), values);
            }
            Err(e) => warn!("Ignoring malformed {key} record on line {}: {e}", idx + 1),
        }
    }

    out
}

fn parse_marker(comment: &str) -> Option<ModelKind> {
    let name = comment.split_whitespace().next()?;
    ModelKind::ALL.into_iter().find(|m| m.config_name() == name)
}

/// Rebuild `model`'s parameter vector from parsed records.
///
/// `None` when a record is missing, has too few fields, or the records were
/// written for a different model.
pub fn params_from_records(records: &ConfRecords, model: ModelKind) -> Option<Vec<f64>> {
    if let Some(marker) = records.marker {
        if marker != model {
            debug!("Persisted coefficients belong to {marker}, not {model}");
            return None;
        }
    }

    let mut params = Vec::with_capacity(model.arity());
    for spec in record_layout(model).iter().filter(|s| s.used > 0) {
        let fields = records.records.get(spec.key)?;
        if fields.len() < spec.used {
            debug!(
                "{} has {} fields, {model} needs {}",
                spec.key,
                fields.len(),
                spec.used
            );
            return None;
        }
        params.extend_from_slice(&fields[..spec.used]);
    }

    (params.len() == model.arity()).then_some(params)
}

/// Read the most recently committed vector for `model` from `path`.
///
/// `Ok(None)` means the file holds no usable vector for this model.
pub fn read_params(path: &Path, model: ModelKind) -> Result<Option<Vec<f64>>, AppError> {
    let text = fs::read_to_string(path).map_err(|e| {
        AppError::input(format!(
            "Failed to read instrument configuration '{}': {e}",
            path.display()
        ))
    })?;
    Ok(params_from_records(&parse_records(&text), model))
}

/// Format `params` as `model`'s configuration records (9 decimal places).
pub fn render_records(model: ModelKind, params: &[f64]) -> Result<Vec<String>, FitError> {
    model.check_arity(params)?;

    let mut rest = params;
    let mut lines = Vec::with_capacity(3);
    for spec in record_layout(model) {
        let (used, tail) = rest.split_at(spec.used);
        rest = tail;

        let mut line = format!("{}\t", spec.key);
        let fields: Vec<String> = used
            .iter()
            .copied()
            .chain(std::iter::repeat(0.0).take(spec.width - spec.used))
            .map(|v| format!("{v:.9}"))
            .collect();
        line.push_str(&fields.join("\t"));
        lines.push(line);
    }
    Ok(lines)
}

/// Comment out live records in `text` and append a new timestamped block.
///
/// Every other line is kept verbatim.
pub fn archive_and_append(
    text: &str,
    model: ModelKind,
    params: &[f64],
    timestamp: &str,
) -> Result<String, FitError> {
    let records = render_records(model, params)?;

    let mut out = String::with_capacity(text.len() + 256);
    for line in text.lines() {
        if is_live_record(line) {
            out.push('#');
        }
        out.push_str(line);
        out.push('\n');
    }

    out.push_str(&format!("# {model}\t{timestamp}\n"));
    for record in records {
        out.push_str(&record);
        out.push('\n');
    }
    Ok(out)
}

fn is_live_record(line: &str) -> bool {
    record_key(line).is_some()
}

/// The record key that starts `line`, if any. Indented keys do not count.
fn record_key(line: &str) -> Option<&'static str> {
    let first = line.split(char::is_whitespace).next()?;
    RECORD_KEYS.iter().copied().find(|key| *key == first)
}

/// Commit `params` for `model` to the configuration file at `path`.
///
/// A missing file is created.
pub fn commit_params(path: &Path, model: ModelKind, params: &[f64]) -> Result<(), AppError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("{} does not exist; creating it", path.display());
            String::new()
        }
        Err(e) => {
            return Err(AppError::input(format!(
                "Failed to read instrument configuration '{}': {e}",
                path.display()
            )));
        }
    };

    let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
    let updated = archive_and_append(&text, model, params, &timestamp)?;

    fs::write(path, updated).map_err(|e| {
        AppError::input(format!(
            "Failed to write instrument configuration '{}': {e}",
            path.display()
        ))
    })?;
    info!("Committed {model} coefficients to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn layouts_cover_each_arity() {
        for model in ModelKind::ALL {
            let used: usize = record_layout(model).iter().map(|s| s.used).sum();
            assert_eq!(used, model.arity(), "{model}");
        }
    }

    #[test]
    fn sixty_cm_records_are_zero_padded() {
        let lines = render_records(ModelKind::SixtyCm, &[0.01, 0.02, 0.03, 0.04, 0.05, 0.06]).unwrap();
        assert_eq!(
            lines,
            vec![
                "AntRadioInst0\t0.010000000\t0.020000000\t0.030000000\t0.040000000",
                "AntRadioInst1\t0.050000000\t0.060000000\t0.000000000\t0.000000000",
                "AntRadioInst2\t0.000000000\t0.000000000\t0.000000000\t0.000000000",
            ]
        );
    }

    #[test]
    fn optical_records_have_five_fields() {
        let params: Vec<f64> = (1..=15).map(f64::from).collect();
        let lines = render_records(ModelKind::Optical, &params).unwrap();
        for line in &lines {
            assert_eq!(line.split('\t').count(), 6);
        }
        assert!(lines[2].ends_with("15.000000000"));
    }

    #[test]
    fn render_rejects_wrong_arity() {
        assert!(render_records(ModelKind::SixtyCm2, &[0.0; 6]).is_err());
    }

    #[test]
    fn archive_comments_out_old_records_and_keeps_everything_else() {
        let original = "\
ObsSite 35.94 138.47
# 60cm_model\t2023/01/01 00:00:00
AntRadioInst0\t1\t2\t3\t4
AntRadioInst1\t5\t6\t0\t0
AntRadioInst2\t0\t0\t0\t0
Receiver H22
";
        let params = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];
        let updated =
            archive_and_append(original, ModelKind::SixtyCm2, &params, "2024/05/01 12:00:00").unwrap();

        let lines: Vec<&str> = updated.lines().collect();
        assert_eq!(lines[0], "ObsSite 35.94 138.47");
        assert_eq!(lines[1], "# 60cm_model\t2023/01/01 00:00:00");
        assert_eq!(lines[2], "#AntRadioInst0\t1\t2\t3\t4");
        assert_eq!(lines[3], "#AntRadioInst1\t5\t6\t0\t0");
        assert_eq!(lines[4], "#AntRadioInst2\t0\t0\t0\t0");
        assert_eq!(lines[5], "Receiver H22");
        assert_eq!(lines[6], "# 60cm_model_2\t2024/05/01 12:00:00");
        assert!(lines[7].starts_with("AntRadioInst0\t0.100000000"));
        assert_eq!(lines.len(), 10);

        let parsed = parse_records(&updated);
        assert_eq!(parsed.marker, Some(ModelKind::SixtyCm2));
        let back = params_from_records(&parsed, ModelKind::SixtyCm2).unwrap();
        for (a, b) in back.iter().zip(params.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn repeated_commits_keep_full_history() {
        let mut text = String::new();
        for i in 0..3 {
            let params = vec![i as f64; 6];
            text = archive_and_append(&text, ModelKind::SixtyCm, &params, "2024/01/01 00:00:00").unwrap();
        }
        let live = text.lines().filter(|l| l.starts_with("AntRadioInst")).count();
        let archived = text.lines().filter(|l| l.starts_with("#AntRadioInst")).count();
        assert_eq!(live, 3);
        assert_eq!(archived, 6);

        let back = params_from_records(&parse_records(&text), ModelKind::SixtyCm).unwrap();
        assert_eq!(back, vec![2.0; 6]);
    }

    #[test]
    fn incomplete_records_mean_no_prior() {
        let text = "AntRadioInst0 1 2 3 4\n";
        assert_eq!(params_from_records(&parse_records(text), ModelKind::SixtyCm), None);

        let text = "AntRadioInst0 1 2 3 4\nAntRadioInst1 5\n";
        assert_eq!(params_from_records(&parse_records(text), ModelKind::SixtyCm), None);
    }

    #[test]
    fn unmarked_records_are_accepted() {
        let text = "AntRadioInst0 1 2 3 4\nAntRadioInst1 5 6 0 0\n";
        assert_eq!(
            params_from_records(&parse_records(text), ModelKind::SixtyCm),
            Some(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
        );
    }

    #[test]
    fn records_for_another_model_are_not_reused() {
        let text = archive_and_append("", ModelKind::Optical, &[0.5; 15], "2024/01/01 00:00:00").unwrap();
        assert_eq!(params_from_records(&parse_records(&text), ModelKind::SixtyCm), None);
        assert!(params_from_records(&parse_records(&text), ModelKind::Optical).is_some());
    }

    #[test]
    fn malformed_record_is_ignored() {
        let text = "AntRadioInst0 1 2 x 4\nAntRadioInst1 5 6 0 0\n";
        let parsed = parse_records(text);
        assert!(!parsed.records.contains_key("AntRadioInst0"));
        assert_eq!(params_from_records(&parsed, ModelKind::SixtyCm), None);
    }

    #[test]
    fn indented_records_are_neither_read_nor_archived() {
        let original = "\
# optical_model\t2023/06/01 00:00:00
  AntRadioInst0\t1\t2\t3\t4\t5
  AntRadioInst1\t6\t7\t8\t9\t10
  AntRadioInst2\t11\t12\t13\t14\t15
";
        let parsed = parse_records(original);
        assert!(parsed.records.is_empty());
        assert_eq!(params_from_records(&parsed, ModelKind::Optical), None);

        let params = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
        let updated = archive_and_append(original, ModelKind::SixtyCm, &params, "2024/05/01 12:00:00").unwrap();
        let kept: Vec<&str> = updated.lines().take(4).collect();
        assert_eq!(kept, original.lines().collect::<Vec<_>>());
        let back = params_from_records(&parse_records(&updated), ModelKind::SixtyCm).unwrap();
        for (a, b) in back.iter().zip(params.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn key_must_be_a_whole_token() {
        let text = "AntRadioInst0X 1 2 3 4\nAntRadioInst0 1 2 3 4\nAntRadioInst1 5 6 0 0\n";
        let updated = archive_and_append(text, ModelKind::SixtyCm, &[0.0; 6], "2024/01/01 00:00:00").unwrap();
        assert!(updated.starts_with("AntRadioInst0X 1 2 3 4\n#AntRadioInst0 1 2 3 4\n"));
        assert_eq!(
            params_from_records(&parse_records(text), ModelKind::SixtyCm),
            Some(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])
        );
    }
}
