//! Runtime error types.

use cpprepl_engine::analysis::AstError;
use cpprepl_engine::compiler::CompilerError;
use cpprepl_engine::dynload::LoadError;

/// Errors that can occur while driving a fragment through the pipeline.
/// Per-fragment compile diagnostics are rendered in place and do not reach
/// this type; what does reach it is reported at the fragment boundary and
/// the REPL continues.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// File I/O error around artifact emission.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// The external compiler could not be driven.
    #[error("compiler error: {0}")]
    Compiler(#[from] CompilerError),

    /// The compiler's AST dump could not be analyzed.
    #[error("AST analysis failed: {0}")]
    Ast(#[from] AstError),

    /// The dynamic linker rejected a built library.
    #[error("load error: {0}")]
    Load(#[from] LoadError),

    /// A required generated symbol was absent from its library.
    #[error("symbol {0} missing from generated library")]
    MissingSymbol(String),
}
