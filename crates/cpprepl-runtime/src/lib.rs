//! cpprepl runtime
//!
//! Binds the engine into a persistent REPL [`Session`]: every prompt entry
//! becomes a self-contained compilation unit, compiled by the platform
//! compiler to a shared object, loaded into this process, and executed, so
//! later entries observe the side effects of earlier ones.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

mod error;
pub mod fragment;
mod guard;
pub mod printers;
mod session;

pub use error::RuntimeError;
pub use session::Session;

use std::path::PathBuf;
use termcolor::ColorChoice;

/// Session construction options.
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    /// C++ compiler executable.
    pub cxx_compiler: String,
    /// C compiler executable.
    pub c_compiler: String,
    /// C++ language standard.
    pub cxx_std: String,
    /// C language standard.
    pub c_std: String,
    /// Directory receiving all per-session artifacts. Also the working
    /// tree for harvested-include filtering.
    pub work_dir: PathBuf,
    /// Color policy for diagnostic rendering.
    pub color: ColorChoice,
    /// Echo binding and scheduling detail.
    pub verbose: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            cxx_compiler: "clang++".to_string(),
            c_compiler: "clang".to_string(),
            cxx_std: "gnu++20".to_string(),
            c_std: "c17".to_string(),
            work_dir: PathBuf::from("."),
            color: ColorChoice::Auto,
            verbose: false,
        }
    }
}
