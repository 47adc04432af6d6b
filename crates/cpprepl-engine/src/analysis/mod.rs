//! AST harvester over the compiler's JSON dump.
//!
//! One pass over the top-level `inner` array of the dumped translation unit
//! extracts variable and function declarations belonging to the fragment
//! itself, synthesizes their extern redeclarations into the
//! [`DeclarationStore`], and records headers the fragment pulled in so later
//! fragments can include them.
//!
//! The walk accumulates into local buffers and merges into the store only
//! after the whole document has been visited, so a malformed dump leaves the
//! session state untouched.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::decl::{Decl, DeclKind, DeclarationStore};

/// Errors while analyzing an AST dump.
#[derive(Debug, thiserror::Error)]
pub enum AstError {
    /// The dump file could not be read.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The dump was not valid JSON.
    #[error("malformed AST document: {0}")]
    Json(#[from] serde_json::Error),

    /// The document parsed but lacked the expected shape.
    #[error("unexpected AST shape: {0}")]
    Shape(&'static str),
}

/// Header mutation discovered during a walk, applied to the store on commit.
enum HeaderOp {
    Include(PathBuf),
    LineDirective(i64, PathBuf),
    Extern(String),
}

/// Walks AST dumps and grows the declaration store.
pub struct Harvester<'a> {
    store: &'a DeclarationStore,
    work_root: PathBuf,
}

impl<'a> Harvester<'a> {
    /// A harvester committing into `store`. Only headers below `work_root`
    /// are recorded as discovered includes.
    pub fn new(store: &'a DeclarationStore, work_root: impl Into<PathBuf>) -> Self {
        let work_root = work_root.into();
        let work_root = canonicalize_or_raw(&work_root);
        Self { store, work_root }
    }

    /// Load `json_path` and harvest the declarations belonging to `source`.
    pub fn harvest_file(&self, json_path: &Path, source: &Path) -> Result<Vec<Decl>, AstError> {
        let text = fs::read_to_string(json_path)?;
        let doc: Value = serde_json::from_str(&text)?;
        self.harvest_document(&doc, source)
    }

    /// Harvest an already-parsed AST document.
    pub fn harvest_document(&self, doc: &Value, source: &Path) -> Result<Vec<Decl>, AstError> {
        let inner = doc
            .get("inner")
            .and_then(Value::as_array)
            .ok_or(AstError::Shape("document has no top-level `inner` array"))?;

        let source_canon = canonicalize_or_raw(source);
        let mut decls = Vec::new();
        let mut ops = Vec::new();

        self.walk_inner(inner, source, &source_canon, &mut decls, &mut ops);

        // Commit phase: the store only grows after a complete walk.
        for op in ops {
            match op {
                HeaderOp::Include(path) => {
                    self.store.add_include(&path);
                }
                HeaderOp::LineDirective(line, file) => {
                    self.store.add_line_directive(line, &file);
                }
                HeaderOp::Extern(text) => {
                    self.store.add_declaration(&text);
                }
            }
        }

        Ok(decls)
    }

    fn walk_inner(
        &self,
        inner: &[Value],
        source: &Path,
        source_canon: &Path,
        decls: &mut Vec<Decl>,
        ops: &mut Vec<HeaderOp>,
    ) {
        let mut last_file = PathBuf::new();
        let mut last_line: Option<i64> = None;

        for element in inner {
            let Some(loc) = element.get("loc") else {
                continue;
            };

            // Source locations are sticky: the dump omits `file` while it is
            // unchanged from the previous element.
            if let Some(file) = loc.get("file").and_then(Value::as_str) {
                last_file = PathBuf::from(file);
            }

            if let Some(included_from) = loc
                .get("includedFrom")
                .and_then(|v| v.get("file"))
                .and_then(Value::as_str)
            {
                if self.included_by_fragment(included_from, source, source_canon) {
                    if let Some(path) = self.include_candidate(&last_file) {
                        if !self.store.is_included(&path) {
                            ops.push(HeaderOp::Include(path));
                        }
                    }
                }
            }

            // Elements spelled in transitively included headers are reached
            // through the recorded include, not as extern redeclarations.
            if !last_file.as_os_str().is_empty()
                && canonicalize_or_raw(&last_file) != source_canon
            {
                continue;
            }

            if let Some(line) = loc.get("line").and_then(Value::as_i64) {
                last_line = Some(line);
            } else if let Some(line) = loc
                .get("spellingLoc")
                .and_then(|s| s.get("line"))
                .and_then(Value::as_i64)
            {
                last_line = Some(line);
            }
            let Some(line) = last_line else {
                continue;
            };

            let Some(kind) = element.get("kind").and_then(Value::as_str) else {
                continue;
            };
            let Some(name) = element.get("name").and_then(Value::as_str) else {
                continue;
            };

            let file = if last_file.as_os_str().is_empty() {
                source.to_path_buf()
            } else {
                last_file.clone()
            };

            if kind == "CXXRecordDecl" {
                if let Some(nested) = element.get("inner").and_then(Value::as_array) {
                    decls.push(Decl {
                        name: name.to_string(),
                        mangled_name: String::new(),
                        kind: DeclKind::Record,
                        qual_type: String::new(),
                        desugared_type: None,
                        file,
                        line,
                    });
                    self.walk_inner(nested, source, source_canon, decls, ops);
                }
                continue;
            }

            let Some(qual_type) = element
                .get("type")
                .and_then(|t| t.get("qualType"))
                .and_then(Value::as_str)
            else {
                continue;
            };

            let storage_class = element
                .get("storageClass")
                .and_then(Value::as_str)
                .unwrap_or("");
            if storage_class == "extern" || storage_class == "static" {
                continue;
            }

            match kind {
                "FunctionDecl" | "CXXMethodDecl" | "CXXConstructorDecl" => {
                    if kind == "FunctionDecl" {
                        let Some(spliced) = function_declarator(name, qual_type) else {
                            continue;
                        };
                        ops.push(HeaderOp::Extern(format!("extern {spliced};")));
                    }

                    let Some(mangled) = element.get("mangledName").and_then(Value::as_str)
                    else {
                        continue;
                    };

                    let decl_kind = match kind {
                        "CXXMethodDecl" => DeclKind::Method,
                        "CXXConstructorDecl" => DeclKind::Constructor,
                        _ => DeclKind::Function,
                    };
                    decls.push(Decl {
                        name: name.to_string(),
                        mangled_name: mangled.to_string(),
                        kind: decl_kind,
                        qual_type: qual_type.to_string(),
                        desugared_type: None,
                        file,
                        line,
                    });
                }
                "VarDecl" => {
                    ops.push(HeaderOp::LineDirective(line, file.clone()));
                    let spliced = variable_declarator(name, qual_type);
                    ops.push(HeaderOp::Extern(format!("extern {spliced};")));

                    let desugared = element
                        .get("type")
                        .and_then(|t| t.get("desugaredQualType"))
                        .and_then(Value::as_str)
                        .map(str::to_string);
                    decls.push(Decl {
                        name: name.to_string(),
                        mangled_name: String::new(),
                        kind: DeclKind::Variable,
                        qual_type: qual_type.to_string(),
                        desugared_type: desugared,
                        file,
                        line,
                    });
                }
                _ => {}
            }
        }
    }

    fn included_by_fragment(&self, included_from: &str, source: &Path, source_canon: &Path) -> bool {
        Path::new(included_from) == source
            || canonicalize_or_raw(Path::new(included_from)) == source_canon
    }

    /// Decide whether a header the fragment included is worth recording:
    /// canonical, inside the working tree, not one of the generated headers,
    /// and not a translation unit pulled in via `#include`.
    fn include_candidate(&self, header: &Path) -> Option<PathBuf> {
        let canonical = fs::canonicalize(header).ok()?;
        if !canonical.is_absolute() || !canonical.starts_with(&self.work_root) {
            return None;
        }
        let name = canonical.file_name()?.to_string_lossy();
        if name == "decl_amalgama.hpp" || name == "printerOutput.hpp" {
            return None;
        }
        if let Some(ext) = canonical.extension() {
            if ext == "cpp" || ext == "cc" {
                return None;
            }
        }
        Some(canonical)
    }
}

/// Splice a function's name into its qualified type at the first `(`:
/// `int (int, int)` becomes `int add(int, int)`. Returns `None` when the
/// type carries no parameter list.
pub fn function_declarator(name: &str, qual_type: &str) -> Option<String> {
    let paren = qual_type.find('(')?;
    let mut spliced = String::with_capacity(qual_type.len() + name.len());
    spliced.push_str(&qual_type[..paren]);
    spliced.push_str(name);
    spliced.push_str(&qual_type[paren..]);
    Some(spliced)
}

/// Splice a variable's name into its qualified type. Array types take the
/// name before the first `[` (`int[3]` becomes `int a[3]`); scalar types
/// append it.
pub fn variable_declarator(name: &str, qual_type: &str) -> String {
    match qual_type.find('[') {
        Some(bracket) => {
            let mut spliced = String::with_capacity(qual_type.len() + name.len() + 1);
            spliced.push_str(&qual_type[..bracket]);
            spliced.push(' ');
            spliced.push_str(name);
            spliced.push_str(&qual_type[bracket..]);
            spliced
        }
        None => format!("{qual_type} {name}"),
    }
}

fn canonicalize_or_raw(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn harvest(doc: &Value, source: &str) -> (Vec<Decl>, DeclarationStore) {
        let store = DeclarationStore::new();
        let harvester = Harvester::new(&store, "/nonexistent-work-root");
        let decls = harvester
            .harvest_document(doc, Path::new(source))
            .expect("harvest");
        (decls, store)
    }

    #[test]
    fn missing_inner_is_a_shape_error() {
        let store = DeclarationStore::new();
        let harvester = Harvester::new(&store, "/tmp");
        let err = harvester
            .harvest_document(&json!({"kind": "TranslationUnitDecl"}), Path::new("x.cpp"))
            .unwrap_err();
        assert!(matches!(err, AstError::Shape(_)));
    }

    #[test]
    fn scalar_variable_gets_line_directive_and_extern() {
        let doc = json!({"inner": [{
            "loc": {"file": "/w/repl_1.cpp", "line": 3},
            "kind": "VarDecl",
            "name": "a",
            "type": {"qualType": "int"}
        }]});
        let (decls, store) = harvest(&doc, "/w/repl_1.cpp");

        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].kind, DeclKind::Variable);
        assert_eq!(decls[0].name, "a");
        assert_eq!(decls[0].line, 3);

        let header = store.header_snapshot();
        assert!(header.contains("#line 3 \"/w/repl_1.cpp\""));
        assert!(header.contains("extern int a;"));
    }

    #[test]
    fn array_variable_splices_before_bracket() {
        let doc = json!({"inner": [{
            "loc": {"file": "/w/repl_1.cpp", "line": 1},
            "kind": "VarDecl",
            "name": "a",
            "type": {"qualType": "int[3]", "desugaredQualType": "int[3]"}
        }]});
        let (decls, store) = harvest(&doc, "/w/repl_1.cpp");

        assert!(store.header_snapshot().contains("extern int a[3];"));
        assert_eq!(decls[0].desugared_type.as_deref(), Some("int[3]"));
    }

    #[test]
    fn function_splices_name_at_parameter_list() {
        let doc = json!({"inner": [{
            "loc": {"file": "/w/repl_1.cpp", "line": 1},
            "kind": "FunctionDecl",
            "name": "add",
            "mangledName": "_Z3addii",
            "type": {"qualType": "int (int, int)"}
        }]});
        let (decls, store) = harvest(&doc, "/w/repl_1.cpp");

        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].kind, DeclKind::Function);
        assert_eq!(decls[0].mangled_name, "_Z3addii");
        assert!(store.header_snapshot().contains("extern int add(int, int);"));
    }

    #[test]
    fn static_and_extern_storage_are_skipped() {
        let doc = json!({"inner": [
            {
                "loc": {"file": "/w/repl_1.cpp", "line": 1},
                "kind": "FunctionDecl",
                "name": "hidden",
                "mangledName": "_ZL6hiddenv",
                "storageClass": "static",
                "type": {"qualType": "void ()"}
            },
            {
                "loc": {"line": 2},
                "kind": "VarDecl",
                "name": "borrowed",
                "storageClass": "extern",
                "type": {"qualType": "int"}
            }
        ]});
        let (decls, store) = harvest(&doc, "/w/repl_1.cpp");
        assert!(decls.is_empty());
        assert_eq!(store.header_len(), 0);
    }

    #[test]
    fn foreign_file_elements_are_skipped_with_sticky_location() {
        let doc = json!({"inner": [
            {
                "loc": {"file": "/elsewhere/lib.cpp", "line": 10},
                "kind": "VarDecl",
                "name": "other",
                "type": {"qualType": "int"}
            },
            {
                // file omitted: still /elsewhere/lib.cpp
                "loc": {"line": 11},
                "kind": "VarDecl",
                "name": "other2",
                "type": {"qualType": "int"}
            },
            {
                "loc": {"file": "/w/repl_1.cpp", "line": 1},
                "kind": "VarDecl",
                "name": "mine",
                "type": {"qualType": "int"}
            }
        ]});
        let (decls, _store) = harvest(&doc, "/w/repl_1.cpp");
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].name, "mine");
    }

    #[test]
    fn records_recurse_and_methods_skip_extern_emission() {
        let doc = json!({"inner": [{
            "loc": {"file": "/w/repl_1.cpp", "line": 1},
            "kind": "CXXRecordDecl",
            "name": "Point",
            "inner": [{
                "loc": {"line": 2},
                "kind": "CXXMethodDecl",
                "name": "norm",
                "mangledName": "_ZN5Point4normEv",
                "type": {"qualType": "double ()"}
            }]
        }]});
        let (decls, store) = harvest(&doc, "/w/repl_1.cpp");

        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].kind, DeclKind::Record);
        assert_eq!(decls[1].kind, DeclKind::Method);
        // Methods are reached through the record, never extern-redeclared.
        assert!(!store.header_snapshot().contains("norm"));
    }

    #[test]
    fn spelling_loc_line_is_a_fallback() {
        let doc = json!({"inner": [{
            "loc": {"file": "/w/repl_1.cpp", "spellingLoc": {"line": 7}},
            "kind": "VarDecl",
            "name": "v",
            "type": {"qualType": "int"}
        }]});
        let (decls, _) = harvest(&doc, "/w/repl_1.cpp");
        assert_eq!(decls[0].line, 7);
    }

    #[test]
    fn include_recorded_only_for_working_tree_headers() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let source = root.join("frag.cpp");
        let header = root.join("util.hpp");
        std::fs::write(&source, "").unwrap();
        std::fs::write(&header, "").unwrap();

        let store = DeclarationStore::new();
        let harvester = Harvester::new(&store, root);
        let doc = json!({"inner": [{
            "loc": {
                "file": header.to_str().unwrap(),
                "line": 1,
                "includedFrom": {"file": source.to_str().unwrap()}
            },
            "kind": "VarDecl",
            "name": "helper",
            "type": {"qualType": "int"}
        }]});
        let decls = harvester.harvest_document(&doc, &source).unwrap();

        // The header is recorded; the declaration inside it is not
        // redeclared extern (it belongs to the header, not the fragment).
        assert!(decls.is_empty());
        let canonical = std::fs::canonicalize(&header).unwrap();
        assert!(store.is_included(&canonical));
        assert!(store.header_snapshot().starts_with("#include "));
    }

    #[test]
    fn generated_headers_and_translation_units_are_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let source = root.join("frag.cpp");
        std::fs::write(&source, "").unwrap();
        for name in ["decl_amalgama.hpp", "printerOutput.hpp", "impl.cpp"] {
            std::fs::write(root.join(name), "").unwrap();
        }

        let store = DeclarationStore::new();
        let harvester = Harvester::new(&store, root);
        for name in ["decl_amalgama.hpp", "printerOutput.hpp", "impl.cpp"] {
            let doc = json!({"inner": [{
                "loc": {
                    "file": root.join(name).to_str().unwrap(),
                    "line": 1,
                    "includedFrom": {"file": source.to_str().unwrap()}
                },
                "kind": "VarDecl",
                "name": "x",
                "type": {"qualType": "int"}
            }]});
            harvester.harvest_document(&doc, &source).unwrap();
        }
        assert_eq!(store.header_len(), 0);
    }

    #[test]
    fn declarator_splicing() {
        assert_eq!(
            function_declarator("add", "int (int, int)").as_deref(),
            Some("int add(int, int)")
        );
        assert_eq!(function_declarator("broken", "int"), None);
        assert_eq!(variable_declarator("a", "int[3]"), "int a[3]");
        assert_eq!(variable_declarator("m", "double[2][2]"), "double m[2][2]");
        assert_eq!(variable_declarator("x", "int"), "int x");
        assert_eq!(
            variable_declarator("v", "std::vector<int>"),
            "std::vector<int> v"
        );
    }
}
