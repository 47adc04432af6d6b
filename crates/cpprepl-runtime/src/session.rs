//! Persistent evaluation session: the fragment pipeline.
//!
//! [`Session::execute`] classifies each prompt entry, turns it into a
//! compilation unit, drives the engine through compile → harvest → load →
//! bind → run, and keeps every loaded library alive so resolved code
//! addresses stay valid for the rest of the process.
//!
//! State persists across entries through three channels: the declaration
//! store (extern redeclarations seen by later fragments), the wrapper
//! registry (trampoline pointers repointed as symbols are redefined), and
//! the printer registry (one callable per declared variable).

use std::collections::{HashMap, HashSet};
use std::ffi::c_void;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use termcolor::StandardStream;

use cpprepl_engine::analysis::Harvester;
use cpprepl_engine::build::BuildSettings;
use cpprepl_engine::compiler::{CompileOpts, CompilerError, Diagnostics, Driver};
use cpprepl_engine::decl::{Decl, DeclKind, DeclarationStore};
use cpprepl_engine::dynload::registry::{bind_trampolines, WrapperRegistry};
use cpprepl_engine::dynload::resolver::{install_context, ResolverContext};
use cpprepl_engine::dynload::{offsets, Library, OpenMode};
use cpprepl_engine::trampoline;

use crate::fragment::{self, Fragment, AMALGAM_HEADER, EXEC_SYMBOL, PCH_HEADER};
use crate::guard::{self, GuardFn, GUARD_LIBRARY, GUARD_SYMBOL};
use crate::printers::{self, printvar_symbol, PRINTALL_SYMBOL};
use crate::{RuntimeError, RuntimeOptions};

type PrinterFn = unsafe extern "C" fn();
type ExecFn = unsafe extern "C" fn();

/// Execution postponed until `evalall`.
struct DeferredExec {
    library: usize,
    vars: Vec<String>,
}

/// A persistent REPL session. Lives until process exit; loaded libraries
/// are intentionally never released.
pub struct Session {
    options: RuntimeOptions,
    settings: BuildSettings,
    store: DeclarationStore,
    registry: Mutex<WrapperRegistry>,
    work_root: PathBuf,
    header_includes: Vec<String>,
    header_include_set: HashSet<String>,
    pch_stale: bool,
    fragment_counter: u64,
    printer_counter: u64,
    all_vars: Vec<Decl>,
    var_printers: HashMap<String, PrinterFn>,
    deferred: Vec<DeferredExec>,
    libraries: Vec<Library>,
    guard: Option<GuardFn>,
}

impl Session {
    /// Create a session: writes the generated headers, builds the
    /// precompiled header and the exception guard. Fails when the platform
    /// toolchain is unusable, which is an unrecoverable startup error.
    pub fn new(options: RuntimeOptions) -> Result<Self, RuntimeError> {
        fs::create_dir_all(&options.work_dir)?;
        let work_root = fs::canonicalize(&options.work_dir)?;

        let mut settings = BuildSettings::new();
        settings.cxx_compiler = options.cxx_compiler.clone();
        settings.c_compiler = options.c_compiler.clone();
        settings.cxx_std = options.cxx_std.clone();
        settings.c_std = options.c_std.clone();
        settings.load_link_libraries(&work_root.join("linkLibraries.txt"));

        let mut session = Self {
            options,
            settings,
            store: DeclarationStore::new(),
            registry: Mutex::new(WrapperRegistry::new()),
            work_root,
            header_includes: Vec::new(),
            header_include_set: HashSet::new(),
            pch_stale: true,
            fragment_counter: 0,
            printer_counter: 0,
            all_vars: Vec::new(),
            var_printers: HashMap::new(),
            deferred: Vec::new(),
            libraries: Vec::new(),
            guard: None,
        };
        session.init()?;
        Ok(session)
    }

    fn init(&mut self) -> Result<(), RuntimeError> {
        printers::write_printer_header(&self.work_root)?;

        self.store.add_declaration("#pragma once");
        self.store
            .add_declaration(&format!("#include \"{PCH_HEADER}\""));
        self.store.save_to(&self.amalgam_path())?;
        self.store.header_changed_since_last_query();

        self.ensure_pch()?;
        self.build_guard()?;
        Ok(())
    }

    /// Handle one prompt entry. Returns `false` when the session should
    /// end. Per-fragment compile failures are rendered and absorbed; what
    /// escapes as `Err` is reported by the caller and the loop continues.
    pub fn execute(&mut self, line: &str) -> Result<bool, RuntimeError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(true);
        }
        if line == "exit" {
            return Ok(false);
        }

        if let Some(dir) = line.strip_prefix("#includedir ") {
            self.settings.add_include_dir(dir.trim());
            return Ok(true);
        }
        if let Some(def) = line.strip_prefix("#compilerdefine ") {
            self.settings.add_definition(def.trim());
            return Ok(true);
        }
        if let Some(lib) = line.strip_prefix("#lib ") {
            self.settings.add_link_library(lib.trim());
            return Ok(true);
        }
        if let Some(path) = line.strip_prefix("#loadprebuilt ") {
            self.load_prebuilt(path.trim())?;
            return Ok(true);
        }
        if line.starts_with("#include") {
            self.handle_include(line);
            return Ok(true);
        }

        if line == "printall" {
            self.print_all()?;
            return Ok(true);
        }
        if line == "evalall" {
            self.eval_deferred();
            return Ok(true);
        }

        if is_identifier(line) && self.store.is_variable_seen(line) {
            self.print_variable(line)?;
            return Ok(true);
        }

        if let Some(expr) = line.strip_prefix("#return ") {
            self.eval_return(expr.trim())?;
            return Ok(true);
        }
        if let Some(arg) = line.strip_prefix("#eval ") {
            self.eval_path(arg.trim(), false)?;
            return Ok(true);
        }
        if let Some(arg) = line.strip_prefix("#lazyeval ") {
            self.eval_path(arg.trim(), true)?;
            return Ok(true);
        }
        if let Some(rest) = line.strip_prefix("#batch_eval ") {
            let files: Vec<PathBuf> = rest.split_whitespace().map(PathBuf::from).collect();
            if files.is_empty() {
                eprintln!("usage: #batch_eval <file> [file…]");
            } else {
                self.eval_batch(&files, false)?;
            }
            return Ok(true);
        }

        self.eval_line(line)?;
        Ok(true)
    }

    // ── Fragment pipeline ────────────────────────────────────────────

    /// Default path: the entry is tried as namespace-scope code first (so
    /// declarations persist and are harvested), and on a front-end failure
    /// retried wrapped inside `void exec()` (so statements and expressions
    /// run). If both fail, the first diagnostic wins: the fragment is
    /// discarded and the store stays untouched.
    fn eval_line(&mut self, line: &str) -> Result<(), RuntimeError> {
        self.ensure_pch()?;
        let frag = self.next_fragment();
        let source = frag.source("cpp");
        fragment::write_source(&source, line, true)?;

        let driver = Driver::new(&self.settings, &self.work_root);
        let opts = self.cxx_opts();

        match driver.compile_ast_json(&source, &frag.ast_json(), &opts) {
            Ok(_) => {
                let harvester = Harvester::new(&self.store, &self.work_root);
                let decls = match harvester.harvest_file(&frag.ast_json(), &source) {
                    Ok(decls) => decls,
                    Err(e) => {
                        eprintln!("AST analysis failed for {}: {e}", frag.name());
                        return Ok(());
                    }
                };
                self.persist_amalgam()?;

                match self.check_compile(driver.compile_shared(
                    &[source],
                    &frag.library(),
                    &opts,
                ))? {
                    Some(_) => {}
                    None => return Ok(()),
                }
                let library = frag.library();
                self.finish_fragment(&frag, &library, decls, false)
            }
            Err(CompilerError::Failed { diagnostics, .. }) => {
                fragment::write_source(&source, &fragment::wrap_statement(line), true)?;
                match driver.compile_shared(&[source], &frag.library(), &opts) {
                    Ok(_) => {
                        let library = frag.library();
                        self.finish_fragment(&frag, &library, Vec::new(), false)
                    }
                    Err(CompilerError::Failed { .. }) => {
                        self.report_diagnostics(&diagnostics);
                        Ok(())
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    fn eval_return(&mut self, expr: &str) -> Result<(), RuntimeError> {
        self.ensure_pch()?;
        let frag = self.next_fragment();
        let source = frag.source("cpp");
        fragment::write_source(&source, &fragment::wrap_return(expr), true)?;

        let driver = Driver::new(&self.settings, &self.work_root);
        let result = driver.compile_shared(&[source], &frag.library(), &self.cxx_opts());
        if self.check_compile(result)?.is_none() {
            return Ok(());
        }
        let library = frag.library();
        self.finish_fragment(&frag, &library, Vec::new(), false)
    }

    fn eval_path(&mut self, arg: &str, lazy: bool) -> Result<(), RuntimeError> {
        let path = Path::new(arg);
        if !path.exists() {
            // Not a file: run the text as a statement.
            self.ensure_pch()?;
            let frag = self.next_fragment();
            let source = frag.source("cpp");
            fragment::write_source(&source, &fragment::wrap_statement(arg), true)?;

            let driver = Driver::new(&self.settings, &self.work_root);
            let result = driver.compile_shared(&[source], &frag.library(), &self.cxx_opts());
            if self.check_compile(result)?.is_none() {
                return Ok(());
            }
            let library = frag.library();
            return self.finish_fragment(&frag, &library, Vec::new(), lazy);
        }

        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "h" | "hpp" => {
                // Headers join the session state instead of becoming a
                // fragment.
                let resolved = canonical_string(path);
                if self.header_include_set.insert(resolved.clone()) {
                    self.header_includes.push(resolved);
                    self.pch_stale = true;
                }
                self.ensure_pch()
            }
            "c" => {
                // C toolchain: no precompiled header, no AST analysis.
                let frag = self.next_fragment();
                let driver = Driver::new(&self.settings, &self.work_root);
                let result = driver.compile_shared(
                    &[path.to_path_buf()],
                    &frag.library(),
                    &CompileOpts::c(),
                );
                if self.check_compile(result)?.is_none() {
                    return Ok(());
                }
                let library = frag.library();
                self.finish_fragment(&frag, &library, Vec::new(), lazy)
            }
            _ => self.eval_batch(&[path.to_path_buf()], lazy),
        }
    }

    /// Compile a set of sources into one shared object. AST analysis runs
    /// per file in order, so later units compile against the externs of
    /// earlier ones; object emission is fanned out across worker threads
    /// and joined before the single link step.
    fn eval_batch(&mut self, files: &[PathBuf], lazy: bool) -> Result<(), RuntimeError> {
        self.ensure_pch()?;
        let frag = self.next_fragment();
        let opts = self.cxx_opts();
        let mut decls = Vec::new();

        for (k, file) in files.iter().enumerate() {
            let target = fs::canonicalize(file).unwrap_or_else(|_| file.clone());
            fs::write(frag.unit_source(k), fragment::forwarding_unit(&target))?;

            let driver = Driver::new(&self.settings, &self.work_root);
            let result = driver.compile_ast_json(&frag.unit_source(k), &frag.unit_json(k), &opts);
            if self.check_compile(result)?.is_none() {
                return Ok(());
            }

            let harvester = Harvester::new(&self.store, &self.work_root);
            match harvester.harvest_file(&frag.unit_json(k), &target) {
                Ok(harvested) => decls.extend(harvested),
                Err(e) => {
                    eprintln!("AST analysis failed for {}: {e}", target.display());
                    return Ok(());
                }
            }
            // Persist inside the loop: the next unit's amalgam include
            // must already carry this unit's externs.
            self.persist_amalgam()?;
        }

        let unit_count = files.len();
        let driver = Driver::new(&self.settings, &self.work_root);
        let results: Vec<Mutex<Option<Result<Diagnostics, CompilerError>>>> =
            (0..unit_count).map(|_| Mutex::new(None)).collect();
        let next = AtomicUsize::new(0);
        let workers = num_cpus::get().clamp(1, unit_count);

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let driver = &driver;
                let next = &next;
                let results = &results;
                let opts = &opts;
                let frag = &frag;
                scope.spawn(move || loop {
                    let k = next.fetch_add(1, Ordering::SeqCst);
                    if k >= unit_count {
                        break;
                    }
                    let result =
                        driver.compile_object(&frag.unit_source(k), &frag.unit_object(k), opts);
                    *results[k].lock() = Some(result);
                });
            }
        });

        for cell in results {
            match cell.into_inner() {
                Some(result) => {
                    if self.check_compile(result)?.is_none() {
                        return Ok(());
                    }
                }
                None => {
                    return Err(RuntimeError::Io(io::Error::other(
                        "object emission worker did not complete",
                    )))
                }
            }
        }

        let objects: Vec<PathBuf> = (0..unit_count).map(|k| frag.unit_object(k)).collect();
        let driver = Driver::new(&self.settings, &self.work_root);
        let result = driver.link_shared(&objects, &frag.library());
        if self.check_compile(result)?.is_none() {
            return Ok(());
        }

        let library = frag.library();
        self.finish_fragment(&frag, &library, decls, lazy)
    }

    /// Steps shared by every fragment once its library exists: stub
    /// synthesis for first-sighted functions, load, trampoline binding,
    /// printer registration, then execution (now or deferred).
    fn finish_fragment(
        &mut self,
        frag: &Fragment,
        lib_path: &Path,
        decls: Vec<Decl>,
        lazy: bool,
    ) -> Result<(), RuntimeError> {
        let mut functions: HashMap<String, String> = HashMap::new();
        for d in &decls {
            if d.kind.is_callable() && !d.mangled_name.is_empty() && d.mangled_name != "main" {
                functions.insert(d.mangled_name.clone(), d.name.clone());
            }
        }

        let new_symbols: Vec<String> = functions
            .keys()
            .filter(|m| !self.store.is_function_seen(m))
            .cloned()
            .collect();

        let stub_lib = if let Some(stub_source) =
            trampoline::synthesize(new_symbols.iter().map(String::as_str))
        {
            fs::write(frag.wrapper_source(), stub_source)?;
            let driver = Driver::new(&self.settings, &self.work_root);
            let result = driver.compile_shared(
                &[frag.wrapper_source()],
                &frag.wrapper_library(),
                &CompileOpts::c(),
            );
            match self.check_compile(result)? {
                Some(_) => {
                    for symbol in &new_symbols {
                        self.store.mark_function_seen(symbol);
                    }
                    Some(Library::open(&frag.wrapper_library(), OpenMode::Eager)?)
                }
                None => None,
            }
        } else {
            None
        };

        let mode = if lazy { OpenMode::Lazy } else { OpenMode::Eager };
        let load_start = Instant::now();
        let code_lib = Library::open(lib_path, mode)?;
        println!("load time: {}us", load_start.elapsed().as_micros());

        if !functions.is_empty() {
            let of_interest: HashSet<String> = functions.keys().cloned().collect();
            let symbol_offsets = offsets::symbol_offsets(lib_path, &of_interest)?;
            install_context(ResolverContext {
                library_path: lib_path.to_path_buf(),
                symbol_offsets,
            });

            let mut registry = self.registry.lock();
            let outcome = bind_trampolines(&mut registry, stub_lib.as_ref(), &code_lib, &functions);
            if self.options.verbose {
                eprintln!(
                    "bound {} symbol(s), {} deferred to first call",
                    outcome.patched.len(),
                    outcome.deferred.len()
                );
            }
        }

        let mut new_vars = Vec::new();
        for d in decls.iter().filter(|d| d.kind == DeclKind::Variable) {
            if self.store.mark_variable_seen(&d.name) {
                new_vars.push(d.clone());
                self.all_vars.push(d.clone());
            }
        }
        if !new_vars.is_empty() {
            self.build_printers(&new_vars)?;
        }

        if let Some(stub) = stub_lib {
            self.libraries.push(stub);
        }
        self.libraries.push(code_lib);
        let lib_index = self.libraries.len() - 1;

        let var_names: Vec<String> = decls
            .iter()
            .filter(|d| d.kind == DeclKind::Variable)
            .map(|d| d.name.clone())
            .collect();

        if lazy {
            println!("deferred: {}", frag.name());
            self.deferred.push(DeferredExec {
                library: lib_index,
                vars: var_names,
            });
        } else {
            self.run_exec(lib_index);
            self.print_vars(&var_names);
        }
        Ok(())
    }

    fn run_exec(&self, lib_index: usize) {
        let lib = &self.libraries[lib_index];
        let entry = lib
            .get_ptr(EXEC_SYMBOL)
            .or_else(|| lib.get_ptr("exec"));
        let Some(entry) = entry else {
            return;
        };

        let exec: ExecFn = unsafe { std::mem::transmute::<*mut c_void, ExecFn>(entry.as_ptr()) };
        let start = Instant::now();
        match self.guard {
            // The guard reports the exception itself; a non-zero status
            // only means the fragment did not finish cleanly.
            Some(guard) => {
                let _ = unsafe { guard(exec) };
            }
            None => unsafe { exec() },
        }
        println!("exec time: {}us", start.elapsed().as_micros());
    }

    fn eval_deferred(&mut self) {
        let pending = std::mem::take(&mut self.deferred);
        for entry in pending {
            self.run_exec(entry.library);
            self.print_vars(&entry.vars);
        }
    }

    // ── Result printing ──────────────────────────────────────────────

    fn print_vars(&self, names: &[String]) {
        for name in names {
            match self.var_printers.get(name).copied() {
                Some(printer) => unsafe { printer() },
                None => println!("not found: {name}"),
            }
        }
    }

    fn print_variable(&mut self, name: &str) -> Result<(), RuntimeError> {
        if let Some(printer) = self.var_printers.get(name).copied() {
            unsafe { printer() };
            return Ok(());
        }

        // No printer registered yet (e.g. its library failed earlier):
        // build a one-off printer for this variable.
        let Some(decl) = self.all_vars.iter().find(|d| d.name == name).cloned() else {
            println!("not found: {name}");
            return Ok(());
        };
        self.build_printers(std::slice::from_ref(&decl))?;
        match self.var_printers.get(name).copied() {
            Some(printer) => unsafe { printer() },
            None => println!("not found: {name}"),
        }
        Ok(())
    }

    fn print_all(&mut self) -> Result<(), RuntimeError> {
        if self.all_vars.is_empty() {
            return Ok(());
        }
        self.ensure_pch()?;

        let index = self.printer_counter;
        self.printer_counter += 1;
        let source = self.work_root.join(format!("printerOutput{index}.cpp"));
        let library = self.work_root.join(format!("printerOutput{index}.so"));
        fs::write(&source, printers::printer_unit(&[], &self.all_vars))?;

        let driver = Driver::new(&self.settings, &self.work_root);
        let result = driver.compile_shared(&[source], &library, &self.cxx_opts());
        if self.check_compile(result)?.is_none() {
            return Ok(());
        }

        // Transient library, closed again after the print, matching the
        // per-fragment printers' lifetime only while in use here.
        let lib = Library::open(&library, OpenMode::Eager)?;
        let print_all: ExecFn = unsafe { lib.get(PRINTALL_SYMBOL)? };
        unsafe { print_all() };
        Ok(())
    }

    fn build_printers(&mut self, new_vars: &[Decl]) -> Result<(), RuntimeError> {
        self.ensure_pch()?;
        let index = self.printer_counter;
        self.printer_counter += 1;
        let source = self.work_root.join(format!("printerOutput{index}.cpp"));
        let library = self.work_root.join(format!("printerOutput{index}.so"));
        fs::write(&source, printers::printer_unit(new_vars, &self.all_vars))?;

        let driver = Driver::new(&self.settings, &self.work_root);
        let result = driver.compile_shared(&[source], &library, &self.cxx_opts());
        if self.check_compile(result)?.is_none() {
            return Ok(());
        }

        let lib = Library::open(&library, OpenMode::Eager)?;
        for var in new_vars {
            match lib.get_ptr(&printvar_symbol(&var.name)) {
                Some(ptr) => {
                    let printer: PrinterFn =
                        unsafe { std::mem::transmute::<*mut c_void, PrinterFn>(ptr.as_ptr()) };
                    self.var_printers.insert(var.name.clone(), printer);
                }
                None => eprintln!("cannot load printer for {}", var.name),
            }
        }
        self.libraries.push(lib);
        Ok(())
    }

    // ── Prebuilt libraries ───────────────────────────────────────────

    /// Open a prebuilt shared object and stub its exported functions so
    /// later fragments can call them by name.
    fn load_prebuilt(&mut self, arg: &str) -> Result<(), RuntimeError> {
        let path = fs::canonicalize(arg).unwrap_or_else(|_| PathBuf::from(arg));
        let decls = offsets::exported_functions(&path)?;
        if decls.is_empty() {
            eprintln!("no exported functions in {}", path.display());
        }
        let frag = self.next_fragment();
        self.finish_fragment(&frag, &path, decls, false)
    }

    // ── Session headers ──────────────────────────────────────────────

    fn handle_include(&mut self, line: &str) {
        static INCLUDE_RE: Lazy<Regex> =
            Lazy::new(|| Regex::new(r#"#include\s*["<]([^">]+)[">]"#).expect("include pattern"));

        let Some(capture) = INCLUDE_RE.captures(line) else {
            eprintln!("cannot parse include line: {line}");
            return;
        };
        let name = capture.get(1).map(|m| m.as_str()).unwrap_or_default();
        let resolved = canonical_string(Path::new(name));

        let file_name = Path::new(&resolved)
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        if file_name == AMALGAM_HEADER || file_name == crate::fragment::PRINTER_HEADER {
            return;
        }

        if self.header_include_set.insert(resolved.clone()) {
            self.header_includes.push(resolved);
            self.pch_stale = true;
        }
    }

    fn ensure_pch(&mut self) -> Result<(), RuntimeError> {
        if !self.pch_stale {
            return Ok(());
        }
        self.write_pch_header()?;

        let driver = Driver::new(&self.settings, &self.work_root);
        let result = driver.compile_pch(
            Path::new(PCH_HEADER),
            Path::new("precompiledheader.hpp.pch"),
        );
        match result {
            Ok(_) => {}
            Err(CompilerError::Failed { diagnostics, .. }) => {
                // A broken user include should not wedge every later
                // fragment behind the same failing rebuild.
                self.report_diagnostics(&diagnostics);
            }
            Err(e) => return Err(e.into()),
        }
        self.pch_stale = false;
        Ok(())
    }

    fn write_pch_header(&self) -> Result<(), RuntimeError> {
        let mut text = String::from("#pragma once\n\n");
        text.push_str(&format!(
            "#include \"{}\"\n\n",
            crate::fragment::PRINTER_HEADER
        ));
        for include in &self.header_includes {
            if Path::new(include).exists() {
                text.push_str(&format!("#include \"{include}\"\n"));
            } else {
                text.push_str(&format!("#include <{include}>\n"));
            }
        }
        fs::write(self.work_root.join(PCH_HEADER), text)?;
        Ok(())
    }

    fn persist_amalgam(&self) -> Result<(), RuntimeError> {
        if self.store.header_changed_since_last_query() {
            self.store.save_to(&self.amalgam_path())?;
        }
        Ok(())
    }

    // ── Infrastructure ───────────────────────────────────────────────

    fn build_guard(&mut self) -> Result<(), RuntimeError> {
        let source = guard::write_guard_source(&self.work_root)?;
        let library = self.work_root.join(GUARD_LIBRARY);

        let driver = Driver::new(&self.settings, &self.work_root);
        driver.compile_shared(&[source], &library, &CompileOpts::cxx())?;

        let lib = Library::open(&library, OpenMode::Eager)?;
        let guard: GuardFn = unsafe { lib.get(GUARD_SYMBOL)? };
        self.guard = Some(guard);
        self.libraries.push(lib);
        Ok(())
    }

    fn next_fragment(&mut self) -> Fragment {
        self.fragment_counter += 1;
        Fragment::new(self.fragment_counter, &self.work_root)
    }

    fn cxx_opts(&self) -> CompileOpts {
        CompileOpts::cxx_with_pch(PCH_HEADER)
    }

    fn amalgam_path(&self) -> PathBuf {
        self.work_root.join(AMALGAM_HEADER)
    }

    /// Absorb a per-fragment compile failure: render the diagnostics and
    /// report the fragment as discarded. Spawn and I/O failures propagate.
    fn check_compile(
        &self,
        result: Result<Diagnostics, CompilerError>,
    ) -> Result<Option<Diagnostics>, RuntimeError> {
        match result {
            Ok(diag) => {
                if !diag.output.is_empty() {
                    self.report_diagnostics(&diag);
                }
                Ok(Some(diag))
            }
            Err(CompilerError::Failed { diagnostics, .. }) => {
                self.report_diagnostics(&diagnostics);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn report_diagnostics(&self, diagnostics: &Diagnostics) {
        let mut stderr = StandardStream::stderr(self.options.color);
        let _ = diagnostics.render_colored(&mut stderr);
    }

    /// Add an include-search directory for subsequent compiles.
    pub fn add_include_dir(&mut self, dir: impl Into<PathBuf>) {
        self.settings.add_include_dir(dir);
    }

    /// Add a preprocessor definition for subsequent compiles.
    pub fn add_definition(&mut self, def: impl Into<String>) {
        self.settings.add_definition(def);
    }

    /// Link a library into every subsequent fragment.
    pub fn add_link_library(&mut self, lib: impl Into<String>) {
        self.settings.add_link_library(lib);
    }

    /// Number of fragments processed so far.
    pub fn fragment_count(&self) -> u64 {
        self.fragment_counter
    }

    /// Names of the variables declared this session, in order.
    pub fn variable_names(&self) -> Vec<String> {
        self.all_vars.iter().map(|d| d.name.clone()).collect()
    }

    /// The session's artifact directory.
    pub fn work_dir(&self) -> &Path {
        &self.work_root
    }
}

/// A bare identifier as spelled at the prompt.
fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn canonical_string(path: &Path) -> String {
    fs::canonicalize(path)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert!(is_identifier("a"));
        assert!(is_identifier("_count"));
        assert!(is_identifier("value2"));
        assert!(!is_identifier("2value"));
        assert!(!is_identifier("v.size()"));
        assert!(!is_identifier("#eval"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn canonical_string_falls_back_to_the_spelled_path() {
        assert_eq!(canonical_string(Path::new("vector")), "vector");
    }
}
