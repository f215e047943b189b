//! Console output and interactive prompts.
//!
//! Messages go to stdout, warnings and errors to stderr. Prompts read one
//! line from stdin; end of input answers with the prompt's default.

use std::io::{self, Write};

use armory_core::Reporter;
use armory_core::refresh::RefreshReport;
use crossterm::style::Stylize;

use super::theme::Theme;

/// Handle commands use to print messages and ask questions.
#[derive(Debug, Clone, Default)]
pub struct Output {
    theme: Theme,
    assume_yes: bool,
}

impl Output {
    /// Create a new output handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every yes/no prompt with yes.
    pub fn assume_yes(mut self, yes: bool) -> Self {
        self.assume_yes = yes;
        self
    }

    /// Whether yes/no prompts are skipped.
    pub fn is_assume_yes(&self) -> bool {
        self.assume_yes
    }

    /// Theme used for styling
    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    /// Print `prompt` and read one trimmed line. `None` at end of input.
    pub fn ask(&self, prompt: &str) -> Option<String> {
        print!("{} {prompt} ", self.theme.icons.prompt.with(self.theme.colors.warning));
        io::stdout().flush().ok()?;
        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(input.trim().to_string()),
        }
    }

    /// Print one line per failed fetch of a refresh.
    pub fn refresh_failures(&self, report: &RefreshReport) {
        for failure in &report.failures {
            match &failure.package {
                Some(pkg) => self.warning(&format!(
                    "{} / {pkg}: {}",
                    failure.armory, failure.error
                )),
                None => self.warning(&format!("{}: {}", failure.armory, failure.error)),
            }
        }
    }
}

impl Reporter for Output {
    fn info(&self, msg: &str) {
        println!("{} {msg}", self.theme.icons.info.with(self.theme.colors.secondary));
    }

    fn success(&self, msg: &str) {
        println!("{} {msg}", self.theme.icons.success.with(self.theme.colors.success));
    }

    fn warning(&self, msg: &str) {
        eprintln!("{} {msg}", self.theme.icons.warning.with(self.theme.colors.warning));
    }

    fn error(&self, msg: &str) {
        eprintln!("{} {msg}", self.theme.icons.error.with(self.theme.colors.error));
    }

    fn confirm(&self, prompt: &str, default: bool) -> bool {
        if self.assume_yes {
            return true;
        }
        let hint = if default { "(Y/n)" } else { "(y/N)" };
        match self.ask(&format!("{prompt} {hint}:")) {
            Some(answer) if answer.is_empty() => default,
            Some(answer) => matches!(answer.to_lowercase().as_str(), "y" | "yes"),
            None => default,
        }
    }

    fn select(&self, prompt: &str, options: &[String]) -> Option<usize> {
        println!("{prompt}:");
        for (i, option) in options.iter().enumerate() {
            println!("  [{}] {option}", i + 1);
        }
        let answer = self.ask(&format!("Choose 1-{} (empty to cancel):", options.len()))?;
        let picked = answer.parse::<usize>().ok()?;
        (1..=options.len()).contains(&picked).then(|| picked - 1)
    }
}
