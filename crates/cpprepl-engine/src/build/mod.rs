//! Build configuration shared by every compiler invocation.
//!
//! Include directories, preprocessor definitions, and link libraries grow
//! over the session via prompt commands and apply to all subsequent
//! compiles. The settings are plain data owned by the session; the driver
//! borrows them per invocation.

use std::fs;
use std::path::{Path, PathBuf};

/// Compiler executables, language standards, and accumulated flags.
#[derive(Debug, Clone)]
pub struct BuildSettings {
    /// C++ compiler executable, e.g. `clang++`.
    pub cxx_compiler: String,
    /// C compiler executable, e.g. `clang`.
    pub c_compiler: String,
    /// C++ language standard, e.g. `gnu++20`.
    pub cxx_std: String,
    /// C language standard, e.g. `c17`.
    pub c_std: String,
    include_dirs: Vec<PathBuf>,
    definitions: Vec<String>,
    link_libraries: Vec<String>,
}

impl BuildSettings {
    /// Settings with the stock clang toolchain and no accumulated flags.
    pub fn new() -> Self {
        Self {
            cxx_compiler: "clang++".to_string(),
            c_compiler: "clang".to_string(),
            cxx_std: "gnu++20".to_string(),
            c_std: "c17".to_string(),
            include_dirs: Vec::new(),
            definitions: Vec::new(),
            link_libraries: Vec::new(),
        }
    }

    /// Add an include-search directory for subsequent invocations.
    pub fn add_include_dir(&mut self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        if !self.include_dirs.contains(&dir) {
            self.include_dirs.push(dir);
        }
    }

    /// Add a preprocessor definition, with optional `=value`.
    pub fn add_definition(&mut self, def: impl Into<String>) {
        let def = def.into();
        if !self.definitions.contains(&def) {
            self.definitions.push(def);
        }
    }

    /// Add a library (without the `lib` prefix) to every subsequent link.
    pub fn add_link_library(&mut self, lib: impl Into<String>) {
        let lib = lib.into();
        if !self.link_libraries.contains(&lib) {
            self.link_libraries.push(lib);
        }
    }

    /// Seed link libraries from a `linkLibraries.txt` left by an earlier
    /// session, one name per line. Missing file is not an error.
    pub fn load_link_libraries(&mut self, path: &Path) {
        if let Ok(text) = fs::read_to_string(path) {
            for line in text.lines() {
                let line = line.trim();
                if !line.is_empty() {
                    self.add_link_library(line);
                }
            }
        }
    }

    /// `-I<dir>` flags in insertion order.
    pub fn include_flags(&self) -> Vec<String> {
        self.include_dirs
            .iter()
            .map(|d| format!("-I{}", d.display()))
            .collect()
    }

    /// `-D<macro>` flags in insertion order.
    pub fn definition_flags(&self) -> Vec<String> {
        self.definitions.iter().map(|d| format!("-D{d}")).collect()
    }

    /// `-L./ -l<name>…` flags for the link step.
    pub fn link_flags(&self) -> Vec<String> {
        let mut flags = vec!["-L./".to_string()];
        flags.extend(self.link_libraries.iter().map(|l| format!("-l{l}")));
        flags
    }

    /// Libraries accumulated so far.
    pub fn link_libraries(&self) -> &[String] {
        &self.link_libraries
    }
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_render_in_insertion_order() {
        let mut settings = BuildSettings::new();
        settings.add_include_dir("/opt/inc");
        settings.add_include_dir("/usr/local/include");
        settings.add_definition("NDEBUG");
        settings.add_definition("FOO=1");
        settings.add_link_library("m");

        assert_eq!(settings.include_flags(), ["-I/opt/inc", "-I/usr/local/include"]);
        assert_eq!(settings.definition_flags(), ["-DNDEBUG", "-DFOO=1"]);
        assert_eq!(settings.link_flags(), ["-L./", "-lm"]);
    }

    #[test]
    fn duplicates_are_collapsed() {
        let mut settings = BuildSettings::new();
        settings.add_link_library("m");
        settings.add_link_library("m");
        assert_eq!(settings.link_libraries(), ["m"]);
    }

    #[test]
    fn link_library_seed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linkLibraries.txt");
        fs::write(&path, "m\npthread\n\n").unwrap();

        let mut settings = BuildSettings::new();
        settings.load_link_libraries(&path);
        assert_eq!(settings.link_libraries(), ["m", "pthread"]);

        // Absent file leaves the settings untouched.
        let mut fresh = BuildSettings::new();
        fresh.load_link_libraries(&dir.path().join("absent.txt"));
        assert!(fresh.link_libraries().is_empty());
    }
}
