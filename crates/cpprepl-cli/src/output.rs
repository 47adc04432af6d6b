//! Shared colored output utilities for CLI commands.
//!
//! Respects the `NO_COLOR` environment variable and the `--color` flag.

use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Resolve `ColorChoice` from the CLI flag and environment.
///
/// Priority: `NO_COLOR` env > `--color` flag > auto-detect TTY.
pub fn resolve_color_choice(flag: &str) -> ColorChoice {
    if std::env::var_os("NO_COLOR").is_some() {
        return ColorChoice::Never;
    }
    match flag {
        "always" => ColorChoice::Always,
        "never" => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}

/// Red bold message to stderr.
pub fn print_error(msg: &str) {
    let mut stderr = StandardStream::stderr(ColorChoice::Auto);
    let mut spec = ColorSpec::new();
    spec.set_fg(Some(Color::Red)).set_bold(true);
    let _ = stderr.set_color(&spec);
    let _ = writeln!(stderr, "{msg}");
    let _ = stderr.reset();
}

/// Dim hint line to stdout.
pub fn print_hint(msg: &str) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let mut spec = ColorSpec::new();
    spec.set_fg(Some(Color::Cyan));
    let _ = stdout.set_color(&spec);
    let _ = writeln!(stdout, "{msg}");
    let _ = stdout.reset();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_values_map_to_choices() {
        if std::env::var_os("NO_COLOR").is_some() {
            assert_eq!(resolve_color_choice("always"), ColorChoice::Never);
            return;
        }
        assert_eq!(resolve_color_choice("always"), ColorChoice::Always);
        assert_eq!(resolve_color_choice("never"), ColorChoice::Never);
        assert_eq!(resolve_color_choice("auto"), ColorChoice::Auto);
        assert_eq!(resolve_color_choice("bogus"), ColorChoice::Auto);
    }
}
