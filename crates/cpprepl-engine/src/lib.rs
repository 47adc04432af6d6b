//! cpprepl engine
//!
//! Core machinery for an interactive C/C++ REPL that compiles every prompt
//! entry into a shared object and loads it into the running process:
//!
//! - **build**: accumulated compiler flags (`build` module)
//! - **compiler**: subprocess driver over the platform compiler
//!   (`compiler` module)
//! - **decl**: declaration records and the session-lifetime extern
//!   accumulator (`decl` module)
//! - **analysis**: harvester over the compiler's JSON AST dumps
//!   (`analysis` module)
//! - **trampoline**: naked-stub synthesis for lazy cross-fragment function
//!   binding (`trampoline` module)
//! - **dynload**: dynamic loading, symbol offsets, and the resolver
//!   callback (`dynload` module)
//!
//! The engine never parses C++ itself; the external compiler is the single
//! source of syntax and type knowledge. Fragment orchestration lives in the
//! `cpprepl-runtime` crate.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Build configuration shared by every compiler invocation.
pub mod build;

/// Platform-compiler driver.
pub mod compiler;

/// Declaration records and the session declaration store.
pub mod decl;

/// AST harvester over the compiler's JSON dump.
pub mod analysis;

/// Trampoline stub synthesis.
pub mod trampoline;

/// Dynamic loading and symbol binding.
pub mod dynload;

pub use build::BuildSettings;
pub use decl::{Decl, DeclKind, DeclarationStore};
