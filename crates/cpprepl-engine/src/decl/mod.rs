//! Declaration records harvested from compiler AST dumps.
//!
//! A [`Decl`] describes one top-level entity (variable, function, method,
//! constructor, record) discovered while analyzing a fragment. The
//! [`DeclarationStore`] accumulates the textual extern redeclarations derived
//! from those records for the lifetime of the session.

mod store;

pub use store::DeclarationStore;

use std::path::PathBuf;

/// What kind of entity a [`Decl`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclKind {
    /// Namespace-scope variable.
    Variable,
    /// Free function.
    Function,
    /// Non-static member function.
    Method,
    /// Class constructor.
    Constructor,
    /// Class or struct definition.
    Record,
}

impl DeclKind {
    /// Whether this declaration names a callable with a linker symbol.
    pub fn is_callable(self) -> bool {
        matches!(
            self,
            DeclKind::Function | DeclKind::Method | DeclKind::Constructor
        )
    }
}

/// One top-level entity discovered in a fragment.
#[derive(Debug, Clone)]
pub struct Decl {
    /// Source-level identifier.
    pub name: String,
    /// Linker symbol as the compiler emits it. Empty for variables.
    pub mangled_name: String,
    /// Entity kind.
    pub kind: DeclKind,
    /// Fully qualified type as the compiler spells it, parameter list
    /// included for callables.
    pub qual_type: String,
    /// Typedef-expanded type, when the AST carries one.
    pub desugared_type: Option<String>,
    /// Absolute path of the defining source.
    pub file: PathBuf,
    /// 1-based line within `file`.
    pub line: i64,
}

impl Decl {
    /// Shorthand used by the prebuilt-library path, where only the symbol
    /// table is available and names equal mangled names.
    pub fn exported_function(symbol: &str) -> Self {
        Decl {
            name: symbol.to_string(),
            mangled_name: symbol.to_string(),
            kind: DeclKind::Function,
            qual_type: String::new(),
            desugared_type: None,
            file: PathBuf::new(),
            line: 0,
        }
    }
}
