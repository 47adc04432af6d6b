//! Symbol offsets and load addresses.
//!
//! The self-resolving thunk cannot always obtain a symbol's address through
//! ordinary lookup (the fragment may have been opened lazily). The fallback
//! computes `load base + file offset`, with offsets parsed from the platform
//! symbol-table tool and the base from the process's memory map. This module
//! only parses; it never opens libraries.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::decl::Decl;

/// Offsets of the requested dynamic symbols within a shared object, from
/// `nm -D --defined-only`. An empty request returns without spawning.
pub fn symbol_offsets(
    library: &Path,
    of_interest: &HashSet<String>,
) -> io::Result<HashMap<String, u64>> {
    let mut result = HashMap::new();
    if of_interest.is_empty() {
        return Ok(result);
    }

    let output = Command::new("nm")
        .arg("-D")
        .arg("--defined-only")
        .arg(library)
        .output()?;

    for line in String::from_utf8_lossy(&output.stdout).lines() {
        if let Some((offset, _kind, name)) = parse_nm_line(line) {
            if of_interest.contains(name) {
                result.insert(name.to_string(), offset);
            }
        }
    }

    Ok(result)
}

/// Harvest the exported text symbols of a prebuilt shared object as
/// function declarations, mangled names and all.
pub fn exported_functions(library: &Path) -> io::Result<Vec<Decl>> {
    let output = Command::new("nm")
        .arg("-D")
        .arg("--defined-only")
        .arg(library)
        .output()?;

    let mut decls = Vec::new();
    for line in String::from_utf8_lossy(&output.stdout).lines() {
        if let Some((_offset, kind, name)) = parse_nm_line(line) {
            if kind == 'T' {
                decls.push(Decl::exported_function(name));
            }
        }
    }
    Ok(decls)
}

/// One `nm` output line: `<hex-offset> <type> <name>`.
pub fn parse_nm_line(line: &str) -> Option<(u64, char, &str)> {
    let mut fields = line.split_whitespace();
    let offset = u64::from_str_radix(fields.next()?, 16).ok()?;
    let kind_field = fields.next()?;
    let kind = if kind_field.len() == 1 {
        kind_field.chars().next()?
    } else {
        return None;
    };
    let name = fields.next()?;
    Some((offset, kind, name))
}

/// Load base of an already-mapped library, from `/proc/self/maps`. Returns
/// `Ok(None)` when the library is not resident.
pub fn library_base_address(library: &Path) -> io::Result<Option<usize>> {
    let maps = fs::read_to_string("/proc/self/maps")?;
    let wanted = fs::canonicalize(library).unwrap_or_else(|_| library.to_path_buf());

    for line in maps.lines() {
        if let Some((start, path)) = parse_maps_line(line) {
            let mapped = PathBuf::from(path);
            let mapped = fs::canonicalize(&mapped).unwrap_or(mapped);
            if mapped == wanted {
                return Ok(Some(start));
            }
        }
    }
    Ok(None)
}

/// One `/proc/self/maps` line: `start-end perms offset dev inode [path]`.
/// Lines without a path field yield `None`.
pub fn parse_maps_line(line: &str) -> Option<(usize, &str)> {
    let mut fields = line.split_whitespace();
    let range = fields.next()?;
    let start_hex = range.split('-').next()?;
    let start = usize::from_str_radix(start_hex, 16).ok()?;

    // perms, offset, dev, inode
    for _ in 0..4 {
        fields.next()?;
    }
    let path = fields.next()?;
    if path.starts_with('/') {
        Some((start, path))
    } else {
        None
    }
}
