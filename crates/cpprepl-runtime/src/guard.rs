//! Exception guard for fragment execution.
//!
//! Fragments may throw C++ exceptions out of `exec`, and a Rust host cannot
//! catch them. The session compiles a one-time guard shared object whose
//! single entry wraps the call in a C++ `try`/`catch`, reports the
//! exception, and returns a status. Hardware faults are out of scope; only
//! C++-level unwinding is contained here.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Guard translation-unit file name.
pub const GUARD_SOURCE: &str = "exceptionguard.cpp";
/// Guard shared-object file name.
pub const GUARD_LIBRARY: &str = "exceptionguard.so";
/// Exported guard entry point.
pub const GUARD_SYMBOL: &str = "repl_call_guarded";

/// Signature of the guard entry: runs the callee, returns 0 on clean
/// return, 1 for `std::exception`, 2 for anything else thrown.
pub type GuardFn = unsafe extern "C" fn(unsafe extern "C" fn()) -> i32;

const GUARD_UNIT: &str = r#"#include <cstdio>
#include <exception>

extern "C" int repl_call_guarded(void (*fn)()) {
    try {
        fn();
        return 0;
    } catch (const std::exception &e) {
        std::fprintf(stderr, "C++ exception on exec/eval: %s\n", e.what());
        return 1;
    } catch (...) {
        std::fprintf(stderr, "Unknown C++ exception on exec/eval\n");
        return 2;
    }
}
"#;

/// Write the guard source into the working directory, returning its path.
pub fn write_guard_source(dir: &Path) -> io::Result<PathBuf> {
    let path = dir.join(GUARD_SOURCE);
    fs::write(&path, GUARD_UNIT)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_unit_catches_both_shapes() {
        assert!(GUARD_UNIT.contains("catch (const std::exception &e)"));
        assert!(GUARD_UNIT.contains("catch (...)"));
        assert!(GUARD_UNIT.contains("extern \"C\" int repl_call_guarded"));
    }

    #[test]
    fn source_is_written_into_the_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_guard_source(dir.path()).unwrap();
        assert_eq!(path, dir.path().join(GUARD_SOURCE));
        assert!(path.exists());
    }
}
