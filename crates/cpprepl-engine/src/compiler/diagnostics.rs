//! Captured compiler diagnostics and their colored rendering.

use std::io::Write;
use termcolor::{Color, ColorSpec, WriteColor};

/// The diagnostic stream captured from one compiler invocation, preserved
/// byte-for-byte, plus the exit status.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    /// Process exit status (`-1` when killed by a signal).
    pub status: i32,
    /// Combined stderr/stdout text as the compiler emitted it.
    pub output: String,
}

impl Diagnostics {
    /// Whether the invocation succeeded.
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Whether the stream carries at least one hard error line.
    pub fn has_errors(&self) -> bool {
        self.output.lines().any(|l| l.contains("error:"))
    }

    /// Write the stream with the well-known clang patterns colored:
    /// `error:` red, `warning:` yellow, `note:` cyan, caret/tilde lines
    /// green. Unknown lines pass through unchanged.
    pub fn render_colored(&self, w: &mut dyn WriteColor) -> std::io::Result<()> {
        for line in self.output.lines() {
            let spec = line_color(line);
            match spec {
                Some(spec) => {
                    w.set_color(&spec)?;
                    writeln!(w, "{line}")?;
                    w.reset()?;
                }
                None => writeln!(w, "{line}")?,
            }
        }
        Ok(())
    }
}

fn line_color(line: &str) -> Option<ColorSpec> {
    if line.contains("error:") {
        let mut spec = ColorSpec::new();
        spec.set_fg(Some(Color::Red)).set_bold(true);
        return Some(spec);
    }
    if line.contains("warning:") {
        let mut spec = ColorSpec::new();
        spec.set_fg(Some(Color::Yellow)).set_bold(true);
        return Some(spec);
    }
    if line.contains("note:") {
        let mut spec = ColorSpec::new();
        spec.set_fg(Some(Color::Cyan));
        return Some(spec);
    }
    if is_caret_line(line) {
        let mut spec = ColorSpec::new();
        spec.set_fg(Some(Color::Green)).set_bold(true);
        return Some(spec);
    }
    None
}

/// A diagnostic underline line: whitespace plus `^` and `~` markers.
fn is_caret_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty()
        && trimmed.contains('^')
        && trimmed.chars().all(|c| matches!(c, '^' | '~' | ' ' | '|'))
}
