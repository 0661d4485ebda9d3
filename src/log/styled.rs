// src/log/styled.rs

//! Styled status lines for run output.
//!
//! Styles are ANSI escape sequences produced by `colored`, so whether they are
//! emitted follows `colored`'s global control (`NO_COLOR`, `CLICOLOR_FORCE`,
//! terminal detection). The buffer stores whatever comes out verbatim.

use colored::Colorize;

use super::buffer::LogBuffer;

/// Formats pipeline messages and appends them to a [`LogBuffer`].
///
/// Every method performs exactly one append, so a line is never torn by a
/// concurrent writer.
#[derive(Debug, Clone)]
pub struct PipelineLogger {
    buffer: LogBuffer,
}

impl PipelineLogger {
    pub fn new(buffer: LogBuffer) -> Self {
        Self { buffer }
    }

    pub fn buffer(&self) -> &LogBuffer {
        &self.buffer
    }

    /// Major phase header: blank line, reversed upper-case name, blank line.
    pub fn stage(&self, name: &str) {
        let header = format!(" {} ", name.to_uppercase()).bold().reversed();
        self.buffer.append(&format!("\n{header}\n\n"));
    }

    pub fn step(&self, text: &str) {
        self.line(&format!("❯ {}", text.bold()));
    }

    pub fn info(&self, text: &str) {
        self.line(&format!("ℹ {}", text.dimmed()));
    }

    pub fn success(&self, text: &str) {
        self.line(&format!("✓ {}", text.green().bold()));
    }

    pub fn warning(&self, text: &str) {
        self.line(&format!("⚠ {}", text.yellow().bold()));
    }

    pub fn error(&self, text: &str) {
        self.line(&format!("✘ {}", text.red().bold()));
    }

    /// A command about to be executed, shown as `  $ cmd`.
    pub fn command(&self, cmd: &str) {
        self.line(&format!("  {}", format!("$ {cmd}").dimmed()));
    }

    pub fn plain(&self, text: &str) {
        self.line(text);
    }

    fn line(&self, text: &str) {
        self.buffer.append_line(text);
    }
}
