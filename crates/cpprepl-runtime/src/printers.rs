//! Result sink: per-variable printer libraries.
//!
//! Every fragment that declares variables gets a companion shared object
//! with one `printvar_<name>` entry per new variable and a `printall`
//! covering every variable known to date. The printers reference the
//! variables through the amalgam's externs, so they always observe the
//! current value of the session's storage.

use std::fs;
use std::io;
use std::path::Path;

use cpprepl_engine::decl::{Decl, DeclKind};

use crate::fragment::{AMALGAM_HEADER, PRINTER_HEADER};

/// Mangled form of the generated `void printall()`.
pub const PRINTALL_SYMBOL: &str = "_Z8printallv";

/// The printer-overloads header included by every printer unit (and, via
/// the precompiled header, by every fragment). Covers the common container
/// and scalar shapes; anything without a stream operator prints
/// `<not printable>`. An empty type string falls back to the runtime type
/// name.
const PRINTER_OVERLOADS: &str = r#"#pragma once
#include <cstddef>
#include <deque>
#include <iostream>
#include <mutex>
#include <ostream>
#include <string_view>
#include <typeinfo>
#include <unordered_map>
#include <vector>

template <class T>
concept Streamable = requires(std::ostream &os, const T &v) { os << v; };

inline void printlabel(std::string_view name, std::string_view type,
                       const char *fallback) {
    std::cout << " >> " << (type.empty() ? fallback : type)
              << (name.empty() ? "" : " ") << name << ": ";
}

template <class T>
inline void printdata(const std::vector<T> &vect, std::string_view name,
                      std::string_view type) {
    printlabel(name, type, typeid(vect).name());
    if constexpr (Streamable<T>) {
        for (const auto &v : vect) {
            std::cout << v << ' ';
        }
    } else {
        std::cout << "<not printable>";
    }
    std::cout << std::endl;
}

template <class T>
inline void printdata(const std::deque<T> &vect, std::string_view name,
                      std::string_view type) {
    printlabel(name, type, typeid(vect).name());
    if constexpr (Streamable<T>) {
        for (const auto &v : vect) {
            std::cout << v << ' ';
        }
    } else {
        std::cout << "<not printable>";
    }
    std::cout << std::endl;
}

template <class T, std::size_t N>
inline void printdata(const T (&arr)[N], std::string_view name,
                      std::string_view type) {
    printlabel(name, type, typeid(arr).name());
    if constexpr (Streamable<T>) {
        for (const auto &v : arr) {
            std::cout << v << ' ';
        }
    } else {
        std::cout << "<not printable>";
    }
    std::cout << std::endl;
}

inline void printdata(std::string_view str, std::string_view name,
                      std::string_view type) {
    printlabel(name, type, "string");
    std::cout << str << std::endl;
}

inline void printdata(const std::mutex &, std::string_view name,
                      std::string_view type) {
    printlabel(name, type, "mutex");
    std::cout << "Mutex" << std::endl;
}

template <class K, class V>
inline void printdata(const std::unordered_map<K, V> &map,
                      std::string_view name, std::string_view type) {
    printlabel(name, type, typeid(map).name());
    for (const auto &m : map) {
        if constexpr (Streamable<K>) {
            std::cout << m.first;
        } else {
            std::cout << "<not printable>";
        }
        std::cout << " : ";
        if constexpr (Streamable<V>) {
            std::cout << m.second;
        } else {
            std::cout << "<not printable>";
        }
        std::cout << ' ';
    }
    std::cout << std::endl;
}

template <class T>
inline void printdata(const T &val, std::string_view name,
                      std::string_view type) {
    printlabel(name, type, typeid(val).name());
    if constexpr (Streamable<T>) {
        std::cout << val << std::endl;
    } else {
        std::cout << "<not printable>" << std::endl;
    }
}
"#;

/// Write the printer-overloads header into the working directory.
pub fn write_printer_header(dir: &Path) -> io::Result<()> {
    fs::write(dir.join(PRINTER_HEADER), PRINTER_OVERLOADS)
}

/// Generate one printer translation unit: `printvar_<name>` for each newly
/// declared variable plus `printall` over every variable known to date.
pub fn printer_unit(new_vars: &[Decl], all_vars: &[Decl]) -> String {
    let mut source = String::new();
    source.push_str(&format!("#include \"{PRINTER_HEADER}\"\n\n"));
    source.push_str(&format!("#include \"{AMALGAM_HEADER}\"\n\n"));

    for var in new_vars.iter().filter(|v| v.kind == DeclKind::Variable) {
        source.push_str(&format!(
            "extern \"C\" void printvar_{name}() {{\n  printdata({name}, \"{name}\", \"{ty}\");\n}}\n\n",
            name = var.name,
            ty = c_escape(&var.qual_type),
        ));
    }

    source.push_str("void printall() {\n");
    for var in all_vars.iter().filter(|v| v.kind == DeclKind::Variable) {
        source.push_str(&format!(
            "  printdata({name}, \"{name}\", \"{ty}\");\n",
            name = var.name,
            ty = c_escape(&var.qual_type),
        ));
    }
    source.push_str("}\n");
    source
}

/// Symbol of the generated printer for one variable.
pub fn printvar_symbol(name: &str) -> String {
    format!("printvar_{name}")
}

/// Escape a type string for embedding in a C string literal.
fn c_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    escaped
}
