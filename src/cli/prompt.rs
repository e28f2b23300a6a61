//! Operator prompts.
//!
//! The fit session never reads stdin directly; it asks an [`Operator`]. The
//! console implementation prompts on a terminal, and tests (or batch runs)
//! can supply their own.

use std::io::{self, BufRead, Write};

use crate::cli::parse_number_list;
use crate::domain::ModelKind;
use crate::error::AppError;
use crate::report::{fmt_vec, format_records_preview};

/// Decisions a fit session needs from a human.
pub trait Operator {
    /// Pick the model family to fit.
    fn choose_model(&mut self) -> Result<ModelKind, AppError>;

    /// Whether to start from the persisted coefficients shown.
    fn use_persisted(&mut self, model: ModelKind, params: &[f64]) -> Result<bool, AppError>;

    /// Enter exactly `model.arity()` initial coefficients.
    fn enter_params(&mut self, model: ModelKind) -> Result<Vec<f64>, AppError>;

    /// Confirm writing `records` to the instrument configuration.
    fn confirm_commit(&mut self, model: ModelKind, records: &[String]) -> Result<bool, AppError>;
}

/// Line-oriented prompts over any reader/writer pair.
pub struct ConsoleOperator<R, W> {
    input: R,
    output: W,
}

impl ConsoleOperator<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsoleOperator<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn say(&mut self, text: &str) -> Result<(), AppError> {
        write!(self.output, "{text}")
            .and_then(|()| self.output.flush())
            .map_err(|e| AppError::input(format!("Failed to write prompt: {e}")))
    }

    /// Print `prompt` and read one trimmed line. EOF is an error.
    fn ask(&mut self, prompt: &str) -> Result<String, AppError> {
        self.say(prompt)?;
        let mut line = String::new();
        let bytes = self
            .input
            .read_line(&mut line)
            .map_err(|e| AppError::input(format!("Failed to read input: {e}")))?;
        if bytes == 0 {
            return Err(AppError::input("No input received."));
        }
        Ok(line.trim().to_string())
    }

    fn ask_yes_no(&mut self, prompt: &str) -> Result<bool, AppError> {
        loop {
            let answer = self.ask(prompt)?;
            match answer.to_ascii_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => self.say("Please answer y or n.\n")?,
            }
        }
    }
}

impl<R: BufRead, W: Write> Operator for ConsoleOperator<R, W> {
    fn choose_model(&mut self) -> Result<ModelKind, AppError> {
        let mut menu = String::from("Pointing models:\n");
        for (idx, model) in ModelKind::ALL.iter().enumerate() {
            menu.push_str(&format!(
                "{:>3}) {:<14} {} ({} parameters)\n",
                idx + 1,
                model.config_name(),
                model.display_name(),
                model.arity()
            ));
        }
        self.say(&menu)?;

        loop {
            let input = self.ask(&format!(
                "Select a model (1-{}, q to quit): ",
                ModelKind::ALL.len()
            ))?;
            if input.eq_ignore_ascii_case("q") {
                return Err(AppError::input("Canceled."));
            }

            let by_number = input
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| ModelKind::ALL.get(i).copied());
            let by_name = ModelKind::ALL.into_iter().find(|m| m.config_name() == input);
            match by_number.or(by_name) {
                Some(model) => return Ok(model),
                None => self.say(&format!("Unknown model: {input:?}.\n"))?,
            }
        }
    }

    fn use_persisted(&mut self, model: ModelKind, params: &[f64]) -> Result<bool, AppError> {
        self.say(&format!("Persisted {model} coefficients: {}\n", fmt_vec(params)))?;
        self.ask_yes_no("Use these as the initial guess? [y/n]: ")
    }

    fn enter_params(&mut self, model: ModelKind) -> Result<Vec<f64>, AppError> {
        let names = model.param_names().join(" ");
        loop {
            let input = self.ask(&format!(
                "Enter {} initial coefficients in degrees ({names}): ",
                model.arity()
            ))?;
            match parse_number_list(&input) {
                Ok(values) if values.len() == model.arity() => return Ok(values),
                Ok(values) => self.say(&format!(
                    "{model} needs exactly {} values, got {}.\n",
                    model.arity(),
                    values.len()
                ))?,
                Err(e) => self.say(&format!("{e}\n"))?,
            }
        }
    }

    fn confirm_commit(&mut self, model: ModelKind, records: &[String]) -> Result<bool, AppError> {
        self.say(&format!(
            "New {model} records:\n{}",
            format_records_preview(records)
        ))?;
        self.ask_yes_no("Write them to the instrument configuration? [y/n]: ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn operator(input: &str) -> ConsoleOperator<Cursor<Vec<u8>>, Vec<u8>> {
        ConsoleOperator::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn model_by_number_or_name() {
        assert_eq!(operator("3\n").choose_model().unwrap(), ModelKind::Optical);
        assert_eq!(operator("60cm_model_2\n").choose_model().unwrap(), ModelKind::SixtyCm2);
        assert_eq!(operator("7\n1\n").choose_model().unwrap(), ModelKind::SixtyCm);
    }

    #[test]
    fn quit_cancels_model_choice() {
        assert!(operator("q\n").choose_model().is_err());
    }

    #[test]
    fn params_with_wrong_count_are_asked_again() {
        let mut op = operator("1 2 3\n0.1, 0.2, 0.3, 0.4, 0.5, 0.6\n");
        assert_eq!(op.enter_params(ModelKind::SixtyCm).unwrap(), vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        let shown = String::from_utf8(op.output).unwrap();
        assert!(shown.contains("needs exactly 6 values, got 3"));
    }

    #[test]
    fn yes_no_repeats_until_answered() {
        let mut op = operator("maybe\nN\n");
        assert!(!op.confirm_commit(ModelKind::SixtyCm, &["AntRadioInst0\t0".to_string()]).unwrap());
    }

    #[test]
    fn eof_is_an_error() {
        assert!(operator("").use_persisted(ModelKind::SixtyCm, &[0.0; 6]).is_err());
    }
}
