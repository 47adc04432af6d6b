//! Platform-compiler driver.
//!
//! The REPL never parses or code-generates C++ itself: every fragment is
//! handed to the external platform compiler as a subprocess, in one of three
//! modes (shared object, JSON AST dump, precompiled header). The driver
//! captures the diagnostic byte stream verbatim for rendering.

mod diagnostics;
mod driver;

pub use diagnostics::Diagnostics;
pub use driver::{CompileOpts, Driver, Language};

use std::io;

/// Errors from driving the external compiler.
#[derive(Debug, thiserror::Error)]
pub enum CompilerError {
    /// The compiler executable could not be spawned.
    #[error("cannot spawn `{tool}`: {source}")]
    Spawn {
        /// Executable that failed to start.
        tool: String,
        /// Underlying spawn failure.
        source: io::Error,
    },

    /// The compiler ran and returned a non-zero status.
    #[error("compilation failed with status {status}")]
    Failed {
        /// Process exit status (`-1` when killed by a signal).
        status: i32,
        /// Captured diagnostic stream.
        diagnostics: Diagnostics,
    },

    /// File I/O around the invocation failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl CompilerError {
    /// The captured diagnostics, when the compiler itself produced them.
    pub fn diagnostics(&self) -> Option<&Diagnostics> {
        match self {
            CompilerError::Failed { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }
}
