//! Process-lifetime accumulator of extern redeclarations.
//!
//! The store collects `#include` lines, `#line` directives, and `extern …;`
//! redeclarations in insertion order. The accumulated text is rendered to
//! disk as the amalgam header that every fragment includes, which is how a
//! fragment sees the variables and functions declared by earlier fragments.
//!
//! The header text is monotonically non-shrinking: later fragments link
//! against the process through the externs emitted for earlier ones, so no
//! code path may discard them. [`DeclarationStore::reset_fragment_scratch`]
//! deliberately clears only the per-fragment bookkeeping.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Session-lifetime declaration accumulator. All mutators serialize on an
/// internal mutex; readers observe a consistent snapshot at return.
pub struct DeclarationStore {
    inner: Mutex<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    header_text: String,
    included_paths: HashSet<PathBuf>,
    variables_seen: HashSet<String>,
    functions_seen: HashSet<String>,
    last_queried_len: usize,
}

impl DeclarationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
        }
    }

    /// Append `#include "<path>"` if the path has not been recorded yet.
    /// Returns whether the header grew.
    pub fn add_include(&self, path: &Path) -> bool {
        let mut inner = self.inner.lock();
        if inner.included_paths.contains(path) {
            return false;
        }
        inner.included_paths.insert(path.to_path_buf());
        let line = format!("#include \"{}\"\n", path.display());
        inner.header_text.push_str(&line);
        true
    }

    /// Append one declaration line.
    pub fn add_declaration(&self, text: &str) {
        let mut inner = self.inner.lock();
        inner.header_text.push_str(text);
        inner.header_text.push('\n');
    }

    /// Append a `#line` directive pointing subsequent declarations back at
    /// their defining source.
    pub fn add_line_directive(&self, line: i64, file: &Path) {
        let mut inner = self.inner.lock();
        let directive = format!("#line {} \"{}\"\n", line, file.display());
        inner.header_text.push_str(&directive);
    }

    /// Whether the path is already represented in the header text.
    pub fn is_included(&self, path: &Path) -> bool {
        self.inner.lock().included_paths.contains(path)
    }

    /// Record a variable name. Returns `true` the first time the name is
    /// seen in the session.
    pub fn mark_variable_seen(&self, name: &str) -> bool {
        self.inner.lock().variables_seen.insert(name.to_string())
    }

    /// Whether a variable of this name was declared earlier in the session.
    pub fn is_variable_seen(&self, name: &str) -> bool {
        self.inner.lock().variables_seen.contains(name)
    }

    /// Record a function's mangled name. Returns `true` the first time the
    /// symbol is seen in the session, i.e. when a stub must be synthesized.
    pub fn mark_function_seen(&self, mangled: &str) -> bool {
        self.inner.lock().functions_seen.insert(mangled.to_string())
    }

    /// Whether a stub already exists for this mangled name.
    pub fn is_function_seen(&self, mangled: &str) -> bool {
        self.inner.lock().functions_seen.contains(mangled)
    }

    /// Report whether the header grew since the previous call.
    pub fn header_changed_since_last_query(&self) -> bool {
        let mut inner = self.inner.lock();
        let changed = inner.header_text.len() != inner.last_queried_len;
        inner.last_queried_len = inner.header_text.len();
        changed
    }

    /// Current header length in bytes.
    pub fn header_len(&self) -> usize {
        self.inner.lock().header_text.len()
    }

    /// Copy of the header text, taken under the lock.
    pub fn header_snapshot(&self) -> String {
        self.inner.lock().header_text.clone()
    }

    /// Write the header text to disk.
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        let snapshot = self.header_snapshot();
        fs::write(path, snapshot)
    }

    /// Clear the per-fragment include bookkeeping. The header text itself is
    /// never cleared: the session's correctness depends on later fragments
    /// seeing the externs emitted for earlier ones.
    pub fn reset_fragment_scratch(&self) {
        let mut inner = self.inner.lock();
        inner.included_paths.clear();
        inner.last_queried_len = 0;
    }
}

impl Default for DeclarationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn includes_are_idempotent() {
        let store = DeclarationStore::new();
        assert!(store.add_include(Path::new("/usr/include/foo.hpp")));
        assert!(!store.add_include(Path::new("/usr/include/foo.hpp")));
        assert_eq!(
            store.header_snapshot(),
            "#include \"/usr/include/foo.hpp\"\n"
        );
    }

    #[test]
    fn declarations_append_in_order() {
        let store = DeclarationStore::new();
        store.add_declaration("extern int a;");
        store.add_line_directive(3, Path::new("/tmp/repl_1.cpp"));
        store.add_declaration("extern int b[3];");
        assert_eq!(
            store.header_snapshot(),
            "extern int a;\n#line 3 \"/tmp/repl_1.cpp\"\nextern int b[3];\n"
        );
    }

    #[test]
    fn header_never_shrinks_across_scratch_reset() {
        let store = DeclarationStore::new();
        store.add_include(Path::new("/tmp/a.hpp"));
        store.add_declaration("extern int a;");
        let before = store.header_len();

        store.reset_fragment_scratch();

        assert_eq!(store.header_len(), before);
        assert!(!store.is_included(Path::new("/tmp/a.hpp")));
        // Re-adding after a reset appends again rather than failing.
        assert!(store.add_include(Path::new("/tmp/a.hpp")));
        assert!(store.header_len() > before);
    }

    #[test]
    fn change_tracking_reports_growth_once() {
        let store = DeclarationStore::new();
        assert!(!store.header_changed_since_last_query());
        store.add_declaration("extern int x;");
        assert!(store.header_changed_since_last_query());
        assert!(!store.header_changed_since_last_query());
    }

    #[test]
    fn name_sets_deduplicate() {
        let store = DeclarationStore::new();
        assert!(store.mark_variable_seen("x"));
        assert!(!store.mark_variable_seen("x"));
        assert!(store.is_variable_seen("x"));
        assert!(store.mark_function_seen("_Z3addii"));
        assert!(!store.mark_function_seen("_Z3addii"));
        assert!(store.is_function_seen("_Z3addii"));
    }

    #[test]
    fn save_writes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = DeclarationStore::new();
        store.add_declaration("#pragma once");
        store.add_declaration("extern int a;");
        let path = dir.path().join("decl_amalgama.hpp");
        store.save_to(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "#pragma once\nextern int a;\n");
    }
}
