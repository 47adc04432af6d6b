//! Subprocess invocation of the platform compiler.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::build::BuildSettings;

use super::{CompilerError, Diagnostics};

/// Which toolchain front-end a fragment is compiled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    /// `clang++` with the session's C++ standard.
    Cxx,
    /// `clang` with the session's C standard. No precompiled header.
    C,
}

/// Per-invocation options.
#[derive(Debug, Clone)]
pub struct CompileOpts {
    /// Toolchain front-end selection.
    pub language: Language,
    /// Header to force-include (`-include`), which also picks up its `.pch`.
    pub include_pch: Option<PathBuf>,
}

impl CompileOpts {
    /// C++ fragment seeing the precompiled header.
    pub fn cxx_with_pch(pch_header: impl Into<PathBuf>) -> Self {
        Self {
            language: Language::Cxx,
            include_pch: Some(pch_header.into()),
        }
    }

    /// C++ translation unit without the precompiled header.
    pub fn cxx() -> Self {
        Self {
            language: Language::Cxx,
            include_pch: None,
        }
    }

    /// Plain C translation unit.
    pub fn c() -> Self {
        Self {
            language: Language::C,
            include_pch: None,
        }
    }
}

/// Drives the external compiler. Borrows the session's settings; every
/// invocation runs with the session working directory as its cwd so that
/// quoted includes and `-L./` resolve against the artifact directory.
pub struct Driver<'a> {
    settings: &'a BuildSettings,
    work_dir: &'a Path,
}

impl<'a> Driver<'a> {
    /// A driver over the given settings and working directory.
    pub fn new(settings: &'a BuildSettings, work_dir: &'a Path) -> Self {
        Self { settings, work_dir }
    }

    fn tool(&self, language: Language) -> &str {
        match language {
            Language::Cxx => &self.settings.cxx_compiler,
            Language::C => &self.settings.c_compiler,
        }
    }

    fn std_flag(&self, language: Language) -> String {
        match language {
            Language::Cxx => format!("-std={}", self.settings.cxx_std),
            Language::C => format!("-std={}", self.settings.c_std),
        }
    }

    fn push_common(&self, cmd: &mut Command, opts: &CompileOpts) {
        if let Some(pch) = &opts.include_pch {
            if opts.language == Language::Cxx {
                cmd.arg("-include").arg(pch);
            }
        }
        cmd.args(self.settings.include_flags());
        cmd.args(self.settings.definition_flags());
    }

    /// Emit a position-independent shared object with exported symbols.
    pub fn compile_shared(
        &self,
        sources: &[PathBuf],
        out: &Path,
        opts: &CompileOpts,
    ) -> Result<Diagnostics, CompilerError> {
        let mut cmd = Command::new(self.tool(opts.language));
        cmd.arg(self.std_flag(opts.language)).arg("-shared");
        self.push_common(&mut cmd, opts);
        cmd.arg("-g").arg("-Wl,--export-dynamic").arg("-fPIC");
        cmd.args(sources);
        cmd.args(self.settings.link_flags());
        cmd.arg("-o").arg(out);
        self.run(cmd, opts.language, None)
    }

    /// Emit one relocatable object, for the batch pipeline's parallel phase.
    pub fn compile_object(
        &self,
        source: &Path,
        out: &Path,
        opts: &CompileOpts,
    ) -> Result<Diagnostics, CompilerError> {
        let mut cmd = Command::new(self.tool(opts.language));
        cmd.arg(self.std_flag(opts.language));
        self.push_common(&mut cmd, opts);
        cmd.arg("-g").arg("-fPIC").arg("-c").arg(source);
        cmd.arg("-o").arg(out);
        self.run(cmd, opts.language, None)
    }

    /// Link previously emitted objects into one shared object.
    pub fn link_shared(&self, objects: &[PathBuf], out: &Path) -> Result<Diagnostics, CompilerError> {
        let mut cmd = Command::new(self.tool(Language::Cxx));
        cmd.arg("-shared")
            .arg("-g")
            .arg("-Wl,--export-dynamic")
            .arg("-fPIC");
        cmd.args(objects);
        cmd.args(self.settings.link_flags());
        cmd.arg("-o").arg(out);
        self.run(cmd, Language::Cxx, None)
    }

    /// Run the compiler in syntax-only mode, writing the JSON serialization
    /// of the translation unit's AST to `out_json`.
    pub fn compile_ast_json(
        &self,
        source: &Path,
        out_json: &Path,
        opts: &CompileOpts,
    ) -> Result<Diagnostics, CompilerError> {
        let mut cmd = Command::new(self.tool(opts.language));
        cmd.arg(self.std_flag(opts.language))
            .arg("-fPIC")
            .arg("-Xclang")
            .arg("-ast-dump=json");
        self.push_common(&mut cmd, opts);
        cmd.arg("-fsyntax-only").arg(source);
        self.run(cmd, opts.language, Some(out_json))
    }

    /// Produce the precompiled form of the amalgam header.
    pub fn compile_pch(&self, header: &Path, out: &Path) -> Result<Diagnostics, CompilerError> {
        let mut cmd = Command::new(self.tool(Language::Cxx));
        cmd.args(self.settings.definition_flags());
        cmd.args(self.settings.include_flags());
        cmd.arg("-fPIC")
            .arg("-x")
            .arg("c++-header")
            .arg(self.std_flag(Language::Cxx))
            .arg("-o")
            .arg(out)
            .arg(header);
        self.run(cmd, Language::Cxx, None)
    }

    fn run(
        &self,
        mut cmd: Command,
        language: Language,
        stdout_to: Option<&Path>,
    ) -> Result<Diagnostics, CompilerError> {
        cmd.current_dir(self.work_dir);
        cmd.stdin(Stdio::null());
        match stdout_to {
            Some(path) => {
                let file = File::create(path)?;
                cmd.stdout(Stdio::from(file));
            }
            None => {
                cmd.stdout(Stdio::piped());
            }
        }
        cmd.stderr(Stdio::piped());

        let output = cmd.output().map_err(|source| CompilerError::Spawn {
            tool: self.tool(language).to_string(),
            source,
        })?;

        let mut text = String::from_utf8_lossy(&output.stderr).into_owned();
        if stdout_to.is_none() && !output.stdout.is_empty() {
            text.push_str(&String::from_utf8_lossy(&output.stdout));
        }

        let status = output.status.code().unwrap_or(-1);
        let diagnostics = Diagnostics {
            status,
            output: text,
        };

        if status != 0 {
            return Err(CompilerError::Failed {
                status,
                diagnostics,
            });
        }
        Ok(diagnostics)
    }
}
