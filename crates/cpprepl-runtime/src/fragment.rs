//! Per-entry fragment artifacts and source emission.
//!
//! Each prompt entry gets a monotonically increasing id and a family of
//! artifact paths in the session working directory: source, JSON AST dump,
//! shared object, per-unit objects for batches, and the stub library.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The amalgam header every fragment includes.
pub const AMALGAM_HEADER: &str = "decl_amalgama.hpp";
/// The precompiled-header source.
pub const PCH_HEADER: &str = "precompiledheader.hpp";
/// The generated printer-overloads header.
pub const PRINTER_HEADER: &str = "printerOutput.hpp";
/// Mangled form of the nullary `void exec()` entry point.
pub const EXEC_SYMBOL: &str = "_Z4execv";

/// Artifact naming for one fragment.
pub struct Fragment {
    /// Monotonic per-session id.
    pub id: u64,
    dir: PathBuf,
}

impl Fragment {
    /// A fragment rooted in the session working directory.
    pub fn new(id: u64, dir: impl Into<PathBuf>) -> Self {
        Self {
            id,
            dir: dir.into(),
        }
    }

    /// `repl_<id>` stem used for log lines.
    pub fn name(&self) -> String {
        format!("repl_{}", self.id)
    }

    /// `repl_<id>.<ext>` source path.
    pub fn source(&self, ext: &str) -> PathBuf {
        self.dir.join(format!("repl_{}.{ext}", self.id))
    }

    /// `repl_<id>.json` AST dump path.
    pub fn ast_json(&self) -> PathBuf {
        self.source("json")
    }

    /// `repl_<id>.so` shared-object path.
    pub fn library(&self) -> PathBuf {
        self.source("so")
    }

    /// `repl_<id>_<k>.cpp` forwarding unit for the k-th batch member.
    pub fn unit_source(&self, k: usize) -> PathBuf {
        self.dir.join(format!("repl_{}_{k}.cpp", self.id))
    }

    /// `repl_<id>_<k>.json` AST dump for the k-th batch member.
    pub fn unit_json(&self, k: usize) -> PathBuf {
        self.dir.join(format!("repl_{}_{k}.json", self.id))
    }

    /// `repl_<id>_<k>.o` object for the k-th batch member.
    pub fn unit_object(&self, k: usize) -> PathBuf {
        self.dir.join(format!("repl_{}_{k}.o", self.id))
    }

    /// `wrapper_<id>.c` stub source path.
    pub fn wrapper_source(&self) -> PathBuf {
        self.dir.join(format!("wrapper_{}.c", self.id))
    }

    /// `wrapper_<id>.so` stub library path.
    pub fn wrapper_library(&self) -> PathBuf {
        self.dir.join(format!("wrapper_{}.so", self.id))
    }
}

/// The include preamble giving a fragment sight of the session state.
pub fn preamble() -> String {
    format!("#include \"{PCH_HEADER}\"\n\n#include \"{AMALGAM_HEADER}\"\n\n")
}

/// Wrap a statement so it runs inside the fragment's entry point.
pub fn wrap_statement(line: &str) -> String {
    format!("void exec() {{ {line}; }}\n")
}

/// Wrap an expression so its value is pretty-printed on execution. The
/// empty type string makes the printer fall back to the runtime type name.
pub fn wrap_return(expr: &str) -> String {
    format!("void exec() {{ printdata((({expr})), \"custom\", \"\"); }}\n")
}

/// A forwarding unit compiling an external file against the session state
/// without modifying the file itself.
pub fn forwarding_unit(target: &Path) -> String {
    format!(
        "{}#include \"{}\"\n",
        preamble(),
        target.display()
    )
}

/// Write a fragment source, optionally prefixed with the session preamble.
pub fn write_source(path: &Path, body: &str, with_preamble: bool) -> io::Result<()> {
    let mut text = String::new();
    if with_preamble {
        text.push_str(&preamble());
    }
    text.push_str(body);
    if !text.ends_with('\n') {
        text.push('\n');
    }
    fs::write(path, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_names_follow_the_fragment_id() {
        let frag = Fragment::new(7, "/work");
        assert_eq!(frag.source("cpp"), PathBuf::from("/work/repl_7.cpp"));
        assert_eq!(frag.ast_json(), PathBuf::from("/work/repl_7.json"));
        assert_eq!(frag.library(), PathBuf::from("/work/repl_7.so"));
        assert_eq!(frag.unit_source(2), PathBuf::from("/work/repl_7_2.cpp"));
        assert_eq!(frag.unit_object(2), PathBuf::from("/work/repl_7_2.o"));
        assert_eq!(frag.wrapper_source(), PathBuf::from("/work/wrapper_7.c"));
        assert_eq!(frag.wrapper_library(), PathBuf::from("/work/wrapper_7.so"));
    }

    #[test]
    fn statement_wrapping() {
        assert_eq!(wrap_statement("x = 7"), "void exec() { x = 7; }\n");
        // A trailing semicolon in the input is tolerated by the compiler.
        assert_eq!(wrap_statement("x = 7;"), "void exec() { x = 7;; }\n");
    }

    #[test]
    fn return_wrapping_double_parenthesizes() {
        let wrapped = wrap_return("add(2,3)");
        assert_eq!(
            wrapped,
            "void exec() { printdata(((add(2,3))), \"custom\", \"\"); }\n"
        );
    }

    #[test]
    fn forwarding_unit_sees_session_state_first() {
        let unit = forwarding_unit(Path::new("/src/a.cpp"));
        let pch = unit.find(PCH_HEADER).unwrap();
        let amalgam = unit.find(AMALGAM_HEADER).unwrap();
        let target = unit.find("/src/a.cpp").unwrap();
        assert!(pch < amalgam && amalgam < target);
    }

    #[test]
    fn write_source_appends_preamble_and_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repl_1.cpp");
        write_source(&path, "int a = 5;", true).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with(&preamble()));
        assert!(text.ends_with("int a = 5;\n"));
    }
}
