//! Wrapper-pointer registry and trampoline binding.
//!
//! One [`WrapperEntry`] exists per distinct mangled name for the lifetime of
//! the session. The entry remembers the writable pointer slot inside the
//! stub library, so a later fragment that redefines the symbol can repoint
//! every existing call site at the new address.

use std::collections::HashMap;
use std::ffi::c_void;
use std::ptr;

use crate::trampoline::pointer_symbol;

use super::Library;

/// Binding state for one mangled name.
pub struct WrapperEntry {
    /// Current code address, null while unresolved.
    pub fn_ptr: *mut c_void,
    /// Address of the `<sym>_ptr` slot in the stub library, null when the
    /// slot was never located.
    pub slot: *mut *mut c_void,
}

/// Session-lifetime map {mangled name → wrapper entry}.
#[derive(Default)]
pub struct WrapperRegistry {
    entries: HashMap<String, WrapperEntry>,
}

// Raw pointers into intentionally leaked libraries; access is serialized by
// the session's mutex.
unsafe impl Send for WrapperRegistry {}
unsafe impl Sync for WrapperRegistry {}

impl WrapperRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a wrapper exists for this mangled name.
    pub fn contains(&self, mangled: &str) -> bool {
        self.entries.contains_key(mangled)
    }

    /// Number of known wrappers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no wrapper is known yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current code address for a symbol, if resolved.
    pub fn resolved_address(&self, mangled: &str) -> Option<*mut c_void> {
        self.entries
            .get(mangled)
            .filter(|e| !e.fn_ptr.is_null())
            .map(|e| e.fn_ptr)
    }
}

/// What a binding pass did.
#[derive(Debug, Default)]
pub struct BindOutcome {
    /// Symbols whose stub pointer now names the real code address.
    pub patched: Vec<String>,
    /// Symbols left at the self-resolving thunk (absent from the object,
    /// typically inlined or templated).
    pub deferred: Vec<String>,
}

/// For each function in `functions` ({mangled → source name}), look the
/// mangled name up in `code`; when found, write the address into the
/// symbol's pointer slot (located in `stubs` on first sight, remembered in
/// the registry afterwards). Symbols absent from `code` keep their
/// self-resolving thunk.
pub fn bind_trampolines(
    registry: &mut WrapperRegistry,
    stubs: Option<&Library>,
    code: &Library,
    functions: &HashMap<String, String>,
) -> BindOutcome {
    let mut outcome = BindOutcome::default();

    for mangled in functions.keys() {
        let code_addr = code.get_ptr(mangled).map(|p| p.as_ptr());

        match code_addr {
            None => {
                // Leave the pointer at the thunk; remember the slot so a
                // later definition can patch it.
                let slot = lookup_slot(stubs, mangled);
                let entry = registry
                    .entries
                    .entry(mangled.clone())
                    .or_insert(WrapperEntry {
                        fn_ptr: ptr::null_mut(),
                        slot: ptr::null_mut(),
                    });
                if entry.slot.is_null() {
                    entry.slot = slot;
                }
                outcome.deferred.push(mangled.clone());
            }
            Some(addr) => {
                if let Some(entry) = registry.entries.get_mut(mangled) {
                    entry.fn_ptr = addr;
                    if entry.slot.is_null() {
                        entry.slot = lookup_slot(stubs, mangled);
                    }
                    if !entry.slot.is_null() {
                        unsafe { *entry.slot = addr };
                        outcome.patched.push(mangled.clone());
                    }
                    continue;
                }

                let slot = lookup_slot(stubs, mangled);
                if !slot.is_null() {
                    unsafe { *slot = addr };
                    outcome.patched.push(mangled.clone());
                }
                registry.entries.insert(
                    mangled.clone(),
                    WrapperEntry {
                        fn_ptr: addr,
                        slot,
                    },
                );
            }
        }
    }

    outcome
}

fn lookup_slot(stubs: Option<&Library>, mangled: &str) -> *mut *mut c_void {
    stubs
        .and_then(|lib| lib.get_ptr(&pointer_symbol(mangled)))
        .map(|p| p.as_ptr() as *mut *mut c_void)
        .unwrap_or(ptr::null_mut())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_tracks_resolution_state() {
        let mut registry = WrapperRegistry::new();
        assert!(registry.is_empty());
        registry.entries.insert(
            "_Z1fv".to_string(),
            WrapperEntry {
                fn_ptr: ptr::null_mut(),
                slot: ptr::null_mut(),
            },
        );
        assert!(registry.contains("_Z1fv"));
        assert_eq!(registry.resolved_address("_Z1fv"), None);

        registry.entries.get_mut("_Z1fv").unwrap().fn_ptr = 0x1000 as *mut c_void;
        assert_eq!(
            registry.resolved_address("_Z1fv"),
            Some(0x1000 as *mut c_void)
        );
        assert_eq!(registry.len(), 1);
    }
}
