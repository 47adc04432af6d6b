//! The process-global resolver callback.
//!
//! Generated load thunks call [`repl_resolve_symbol`] with the address of
//! their pointer slot and the mangled name whose call they intercepted. The
//! resolver repoints every known slot at the current fragment library, in
//! two stages:
//!
//! 1. obtain a handle to the library without loading it (`RTLD_NOLOAD`) and
//!    `dlsym` each symbol through it;
//! 2. failing that, compute the library's load base from the process memory
//!    map and write `base + offset` using the offsets harvested at bind
//!    time.
//!
//! This is the only writer of `<sym>_ptr` slots after the initial bind, so
//! the slots are either all stale or all fresh. The write is a single
//! aligned word; racing first calls both perform the same idempotent store.

use std::collections::HashMap;
use std::ffi::{c_char, c_void, CStr, CString};
use std::path::PathBuf;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use super::offsets;
use crate::trampoline::pointer_symbol;

/// What the resolver needs to know about the most recent fragment library.
#[derive(Debug, Clone)]
pub struct ResolverContext {
    /// Path of the fragment library holding the current definitions.
    pub library_path: PathBuf,
    /// File offsets of its wrapped symbols, keyed by mangled name.
    pub symbol_offsets: HashMap<String, u64>,
}

static CONTEXT: Lazy<Mutex<Option<ResolverContext>>> = Lazy::new(|| Mutex::new(None));

/// Publish the context the next thunk-initiated resolution will use.
/// Called by the pipeline after every fragment bind.
pub fn install_context(context: ResolverContext) {
    *CONTEXT.lock() = Some(context);
}

/// Whether a context has been installed (startup diagnostics).
pub fn context_installed() -> bool {
    CONTEXT.lock().is_some()
}

/// Resolver callback referenced by every generated load thunk.
///
/// Contract: given the address of a pointer slot and the mangled name whose
/// call faulted into the thunk, compute the symbol's current address and
/// store it into the slot. On failure the slot is left unchanged and the
/// failure is reported on stderr.
///
/// # Safety
///
/// `slot` must point to a writable pointer-sized slot and `name` to a
/// NUL-terminated string; the generated stubs guarantee both.
#[no_mangle]
pub unsafe extern "C" fn repl_resolve_symbol(slot: *mut *mut c_void, name: *const c_char) {
    if slot.is_null() || name.is_null() {
        return;
    }
    let name = CStr::from_ptr(name).to_string_lossy().into_owned();

    let guard = CONTEXT.lock();
    let Some(context) = guard.as_ref() else {
        eprintln!("repl: no resolver context installed while resolving {name}");
        return;
    };

    let Ok(c_path) = CString::new(context.library_path.to_string_lossy().into_owned()) else {
        return;
    };

    // Stage 1: the library is normally already resident.
    let handle = libc::dlopen(c_path.as_ptr(), libc::RTLD_NOLOAD | libc::RTLD_NOW);
    if !handle.is_null() {
        for symbol in context.symbol_offsets.keys() {
            let Some(slot_addr) = find_slot(symbol) else {
                continue;
            };
            let Ok(c_symbol) = CString::new(symbol.as_str()) else {
                continue;
            };
            let target = libc::dlsym(handle, c_symbol.as_ptr());
            if !target.is_null() {
                *slot_addr = target;
            }
        }
        if !context.symbol_offsets.contains_key(&name) {
            if let Ok(c_name) = CString::new(name.as_str()) {
                let target = libc::dlsym(handle, c_name.as_ptr());
                if !target.is_null() {
                    *slot = target;
                }
            }
        }
        return;
    }

    // Stage 2: compute addresses from the load base and the harvested
    // file offsets.
    match offsets::library_base_address(&context.library_path) {
        Ok(Some(base)) => {
            for (symbol, offset) in &context.symbol_offsets {
                if let Some(slot_addr) = find_slot(symbol) {
                    *slot_addr = (base + *offset as usize) as *mut c_void;
                }
            }
        }
        _ => {
            eprintln!(
                "repl: cannot resolve {name}: {} is not mapped",
                context.library_path.display()
            );
        }
    }
}

/// Locate a symbol's pointer slot through the process-global namespace.
/// Stub libraries are opened `RTLD_GLOBAL`, so `RTLD_DEFAULT` sees them.
unsafe fn find_slot(symbol: &str) -> Option<*mut *mut c_void> {
    let c_name = CString::new(pointer_symbol(symbol)).ok()?;
    let addr = libc::dlsym(libc::RTLD_DEFAULT, c_name.as_ptr());
    if addr.is_null() {
        None
    } else {
        Some(addr as *mut *mut c_void)
    }
}
