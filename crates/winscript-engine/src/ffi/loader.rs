//! Native module loading
//!
//! Cross-platform loading of shared libraries (.dll, .so, .dylib) and lookup
//! of their exported symbols. Loaded modules are cached by the name they were
//! requested under; failures are reported as absent results and never cached,
//! so a later request retries the load.
//!
//! Handles are never closed. Bound functions keep raw addresses into their
//! module, so a module stays mapped for the rest of the process even after
//! the [`Library`] or [`NativeModules`] that opened it is dropped.

use rustc_hash::FxHashMap;
use std::ffi::CString;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur during library loading
#[derive(Debug, Error)]
pub enum LoadError {
    /// Library file not found or could not be loaded
    #[error("Library not found: {path}")]
    NotFound {
        /// Path that was attempted
        path: String,
    },

    /// Symbol not found in library
    #[error("Symbol not found: {symbol} in {library}")]
    SymbolNotFound {
        /// Symbol name that was not found
        symbol: String,
        /// Library path
        library: String,
    },

    /// Platform-specific error
    #[error("Platform error: {0}")]
    PlatformError(String),

    /// Invalid path encoding
    #[error("Invalid UTF-8 in path: {0}")]
    InvalidPath(String),
}

/// Source of native function addresses
///
/// Implemented by [`NativeModules`] for real libraries; hosts and tests can
/// supply their own table.
pub trait SymbolResolver {
    /// Address of `symbol` exported by `module`, or `None` if either the
    /// module or the symbol cannot be found
    fn resolve(&mut self, module: &str, symbol: &str) -> Option<usize>;
}

/// Cross-platform dynamic library handle
///
/// Dropping a `Library` does not unload the module.
pub struct Library {
    handle: LibraryHandle,
    path: String,
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library").field("path", &self.path).finish()
    }
}

impl Library {
    /// Load a dynamic library.
    ///
    /// A bare file name is looked up through the platform loader's search
    /// path.
    ///
    /// # Platform-specific behavior
    ///
    /// - **Linux/macOS**: `dlopen(RTLD_NOW | RTLD_LOCAL)`
    /// - **Windows**: `LoadLibraryW`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let path_ref = path.as_ref();
        let path_str = path_ref
            .to_str()
            .ok_or_else(|| LoadError::InvalidPath(format!("{:?}", path_ref)))?;

        let handle = LibraryHandle::load(path_str)?;

        Ok(Library {
            handle,
            path: path_str.to_string(),
        })
    }

    /// Address of an exported symbol
    pub fn symbol_address(&self, symbol: &str) -> Result<usize, LoadError> {
        self.handle.symbol(symbol, &self.path)
    }

    /// Get the path this library was loaded from
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Cache of loaded native modules
#[derive(Debug, Default)]
pub struct NativeModules {
    search_paths: Vec<PathBuf>,
    libraries: FxHashMap<String, Library>,
}

impl NativeModules {
    /// Create a cache using only the platform loader's search path
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache that searches `paths` before the platform default
    pub fn with_search_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            search_paths: paths.into_iter().map(Into::into).collect(),
            libraries: FxHashMap::default(),
        }
    }

    /// Load `name` on first reference and return the cached handle after
    pub fn resolve_module(&mut self, name: &str) -> Option<&Library> {
        if !self.libraries.contains_key(name) {
            let library = self.open(name)?;
            self.libraries.insert(name.to_string(), library);
        }
        self.libraries.get(name)
    }

    /// Address of an exported symbol of a loaded module
    pub fn resolve_symbol(library: &Library, symbol: &str) -> Option<usize> {
        match library.symbol_address(symbol) {
            Ok(address) => {
                debug!(library = library.path(), symbol, address, "resolved symbol");
                Some(address)
            }
            Err(e) => {
                warn!(error = %e, "symbol lookup failed");
                None
            }
        }
    }

    /// Check if `name` has been loaded
    pub fn is_loaded(&self, name: &str) -> bool {
        self.libraries.contains_key(name)
    }

    /// Number of loaded modules
    pub fn loaded_count(&self) -> usize {
        self.libraries.len()
    }

    fn open(&self, name: &str) -> Option<Library> {
        let mut last_error = None;
        for candidate in candidate_names(name) {
            let paths = self
                .search_paths
                .iter()
                .map(|dir| dir.join(&candidate))
                .chain(std::iter::once(PathBuf::from(&candidate)));
            for path in paths {
                match Library::open(&path) {
                    Ok(library) => {
                        debug!(module = name, path = library.path(), "loaded native module");
                        return Some(library);
                    }
                    Err(e) => last_error = Some(e),
                }
            }
        }
        if let Some(e) = last_error {
            warn!(module = name, error = %e, "failed to load native module");
        }
        None
    }
}

impl SymbolResolver for NativeModules {
    fn resolve(&mut self, module: &str, symbol: &str) -> Option<usize> {
        let library = self.resolve_module(module)?;
        Self::resolve_symbol(library, symbol)
    }
}

/// File names tried for a module name: as given, then with the platform's
/// library prefix and suffix when no extension is present
fn candidate_names(name: &str) -> Vec<String> {
    let mut names = vec![name.to_string()];
    if Path::new(name).extension().is_some() {
        return names;
    }
    if cfg!(windows) {
        names.push(format!("{}.dll", name));
    } else if cfg!(target_os = "macos") {
        names.push(format!("lib{}.dylib", name));
        names.push(format!("{}.dylib", name));
    } else {
        names.push(format!("lib{}.so", name));
        names.push(format!("{}.so", name));
    }
    names
}

// Platform-specific implementations

#[cfg(unix)]
type LibraryHandle = UnixLibrary;

#[cfg(windows)]
type LibraryHandle = WindowsLibrary;

// ============================================================================
// Unix Implementation (Linux, macOS, BSD)
// ============================================================================

#[cfg(unix)]
struct UnixLibrary {
    handle: *mut std::ffi::c_void,
}

#[cfg(unix)]
impl UnixLibrary {
    fn load(path: &str) -> Result<Self, LoadError> {
        let c_path = CString::new(path)
            .map_err(|e| LoadError::PlatformError(format!("Invalid path: {}", e)))?;

        // RTLD_NOW: Resolve all symbols immediately
        // RTLD_LOCAL: Symbols not available for subsequently loaded libraries
        let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL) };

        if handle.is_null() {
            return Err(LoadError::NotFound {
                path: format!("{}: {}", path, last_dl_error()),
            });
        }

        Ok(UnixLibrary { handle })
    }

    fn symbol(&self, name: &str, lib_path: &str) -> Result<usize, LoadError> {
        let c_name = CString::new(name)
            .map_err(|e| LoadError::PlatformError(format!("Invalid symbol name: {}", e)))?;

        let symbol = unsafe {
            // Clear any previous errors
            libc::dlerror();
            libc::dlsym(self.handle, c_name.as_ptr())
        };

        if symbol.is_null() {
            return Err(LoadError::SymbolNotFound {
                symbol: name.to_string(),
                library: format!("{}: {}", lib_path, last_dl_error()),
            });
        }

        Ok(symbol as usize)
    }
}

#[cfg(unix)]
fn last_dl_error() -> String {
    unsafe {
        let err_ptr = libc::dlerror();
        if err_ptr.is_null() {
            "Unknown error".to_string()
        } else {
            std::ffi::CStr::from_ptr(err_ptr).to_string_lossy().into_owned()
        }
    }
}

#[cfg(unix)]
unsafe impl Send for UnixLibrary {}
#[cfg(unix)]
unsafe impl Sync for UnixLibrary {}

// ============================================================================
// Windows Implementation
// ============================================================================

#[cfg(windows)]
struct WindowsLibrary {
    handle: *mut std::ffi::c_void,
}

#[cfg(windows)]
impl WindowsLibrary {
    fn load(path: &str) -> Result<Self, LoadError> {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;

        let wide: Vec<u16> = OsStr::new(path)
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        let handle = unsafe { LoadLibraryW(wide.as_ptr()) };

        if handle.is_null() {
            let error = unsafe { GetLastError() };
            return Err(LoadError::NotFound {
                path: format!("{} (error code: {})", path, error),
            });
        }

        Ok(WindowsLibrary { handle })
    }

    fn symbol(&self, name: &str, lib_path: &str) -> Result<usize, LoadError> {
        let c_name = CString::new(name)
            .map_err(|e| LoadError::PlatformError(format!("Invalid symbol name: {}", e)))?;

        let symbol = unsafe { GetProcAddress(self.handle, c_name.as_ptr()) };

        if symbol.is_null() {
            let error = unsafe { GetLastError() };
            return Err(LoadError::SymbolNotFound {
                symbol: name.to_string(),
                library: format!("{} (error code: {})", lib_path, error),
            });
        }

        Ok(symbol as usize)
    }
}

#[cfg(windows)]
unsafe impl Send for WindowsLibrary {}
#[cfg(windows)]
unsafe impl Sync for WindowsLibrary {}

#[cfg(windows)]
extern "system" {
    fn LoadLibraryW(filename: *const u16) -> *mut std::ffi::c_void;
    fn GetProcAddress(
        module: *mut std::ffi::c_void,
        procname: *const std::ffi::c_char,
    ) -> *mut std::ffi::c_void;
    fn GetLastError() -> u32;
}
