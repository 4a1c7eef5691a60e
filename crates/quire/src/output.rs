//! Colored terminal output for build progress and asset error reports.

use console::{Style, Term};

/// Terminal output formatter (writes to stderr).
pub(crate) struct Output {
    term: Term,
    green: Style,
    red: Style,
    heading: Style,
    dim: Style,
}

impl Output {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            term: Term::stderr(),
            green: Style::new().green(),
            red: Style::new().red(),
            heading: Style::new().cyan().bold(),
            dim: Style::new().dim(),
        }
    }

    /// Print a plain line.
    pub(crate) fn info(&self, msg: &str) {
        let _ = self.term.write_line(msg);
    }

    /// Print a `label: value` line with a dimmed label.
    pub(crate) fn field(&self, label: &str, value: &str) {
        let _ = self
            .term
            .write_line(&format!("{} {value}", self.dim.apply_to(format!("{label}:"))));
    }

    /// Print the heading of a language pass.
    pub(crate) fn language(&self, language: &str) {
        let _ = self
            .term
            .write_line(&self.heading.apply_to(format!("[{language}]")).to_string());
    }

    /// Print a success message (green).
    pub(crate) fn success(&self, msg: &str) {
        let _ = self.term.write_line(&self.green.apply_to(msg).to_string());
    }

    /// Print an error message (red).
    pub(crate) fn error(&self, msg: &str) {
        let _ = self.term.write_line(&self.red.apply_to(msg).to_string());
    }

    /// Print collected asset errors in red between rule lines.
    pub(crate) fn asset_errors(&self, messages: &[String]) {
        let rule = "-".repeat(70);
        let _ = self.term.write_line(&self.dim.apply_to(&rule).to_string());
        for message in messages {
            self.error(message);
        }
        let _ = self.term.write_line(&self.dim.apply_to(&rule).to_string());
    }
}
