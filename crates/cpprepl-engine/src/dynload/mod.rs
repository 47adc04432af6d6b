//! Dynamic loading and symbol binding.
//!
//! Fragment libraries are opened with the platform dynamic linker and kept
//! resident for the lifetime of the session. After a fragment is loaded, the
//! trampoline pointers generated for its functions are patched to the real
//! addresses; symbols the compiler elided stay aimed at the self-resolving
//! thunk and bind on first call through the resolver callback.

pub mod offsets;
pub mod registry;
pub mod resolver;

use std::ffi::{c_void, CStr, CString};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// How a library is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// `RTLD_NOW | RTLD_GLOBAL`: resolve everything up front and make the
    /// symbols visible to later fragments.
    Eager,
    /// `RTLD_LAZY | RTLD_GLOBAL`: defer binding until first call.
    Lazy,
    /// `RTLD_NOLOAD`: obtain a handle only if the library is already
    /// resident.
    NoLoad,
}

impl OpenMode {
    fn flags(self) -> i32 {
        match self {
            OpenMode::Eager => libc::RTLD_NOW | libc::RTLD_GLOBAL,
            OpenMode::Lazy => libc::RTLD_LAZY | libc::RTLD_GLOBAL,
            OpenMode::NoLoad => libc::RTLD_NOLOAD | libc::RTLD_NOW,
        }
    }
}

/// Errors from the dynamic linker.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The library could not be opened.
    #[error("cannot open library {path}: {reason}")]
    Open {
        /// Path that was attempted.
        path: PathBuf,
        /// Textual reason reported by `dlerror`.
        reason: String,
    },

    /// A required symbol was absent.
    #[error("symbol {symbol} not found in {library}")]
    SymbolNotFound {
        /// Symbol name that was looked up.
        symbol: String,
        /// Library path.
        library: PathBuf,
    },

    /// The path contained an interior NUL byte.
    #[error("invalid library path: {0}")]
    InvalidPath(String),
}

/// An open shared object. Dropping the handle closes the library, so the
/// session keeps every fragment's `Library` alive until process exit:
/// resolved code addresses must stay valid across fragments.
#[derive(Debug)]
pub struct Library {
    handle: *mut c_void,
    path: PathBuf,
}

impl Library {
    /// Open a shared object.
    pub fn open(path: &Path, mode: OpenMode) -> Result<Self, LoadError> {
        let c_path = CString::new(path.to_string_lossy().into_owned())
            .map_err(|e| LoadError::InvalidPath(e.to_string()))?;

        let handle = unsafe { libc::dlopen(c_path.as_ptr(), mode.flags()) };
        if handle.is_null() {
            return Err(LoadError::Open {
                path: path.to_path_buf(),
                reason: dlerror_string(),
            });
        }

        Ok(Library {
            handle,
            path: path.to_path_buf(),
        })
    }

    /// Look up a symbol, tolerating absence.
    pub fn get_ptr(&self, symbol: &str) -> Option<NonNull<c_void>> {
        let c_name = CString::new(symbol).ok()?;
        let ptr = unsafe { libc::dlsym(self.handle, c_name.as_ptr()) };
        NonNull::new(ptr)
    }

    /// Look up a symbol and transmute it to a function type.
    ///
    /// # Safety
    ///
    /// `T` must match the symbol's actual signature, and the library must
    /// remain loaded while the value is used.
    pub unsafe fn get<T: Copy>(&self, symbol: &str) -> Result<T, LoadError> {
        match self.get_ptr(symbol) {
            Some(ptr) => Ok(std::mem::transmute_copy(&ptr.as_ptr())),
            None => Err(LoadError::SymbolNotFound {
                symbol: symbol.to_string(),
                library: self.path.clone(),
            }),
        }
    }

    /// Path this library was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        unsafe {
            libc::dlclose(self.handle);
        }
    }
}

unsafe impl Send for Library {}
unsafe impl Sync for Library {}

fn dlerror_string() -> String {
    unsafe {
        let err = libc::dlerror();
        if err.is_null() {
            "unknown error".to_string()
        } else {
            CStr::from_ptr(err).to_string_lossy().into_owned()
        }
    }
}
