//! Opening the platform library and resolving symbols with libloading.

use crate::error::{Error, Result};
use crate::platform::{DEFAULT_LIBRARY, PlatformAbi};
use libloading::Library;
use std::ffi::OsStr;
use std::path::PathBuf;

/// Where to find the platform library and which ABI to expect from it.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Library file name (or absolute path).
    pub library: String,
    /// Directories tried before the dynamic loader's own search path.
    pub search_paths: Vec<PathBuf>,
    /// ABI expected from the library.
    pub abi: PlatformAbi,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            library: DEFAULT_LIBRARY.to_string(),
            search_paths: Vec::new(),
            abi: PlatformAbi::LEGACY,
        }
    }
}

impl LoaderConfig {
    /// Use a different library name or path.
    pub fn with_library(mut self, library: impl Into<String>) -> Self {
        self.library = library.into();
        self
    }

    /// Add a directory searched before the dynamic loader path.
    pub fn add_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    /// Expect a different platform ABI.
    pub fn with_abi(mut self, abi: PlatformAbi) -> Self {
        self.abi = abi;
        self
    }
}

/// A loaded shared library.
///
/// The library stays mapped for as long as this value lives. Entry point
/// tables hold it behind an `Arc`, so it cannot be unloaded while any
/// resolved pointer is still reachable.
pub struct LoadedLibrary {
    library: Library,
    name: String,
}

impl LoadedLibrary {
    /// Open a library by name through the dynamic loader search path.
    ///
    /// # Safety
    ///
    /// Loading runs the library's initializers. The caller must trust the
    /// library found under `name`.
    pub unsafe fn open(filename: impl AsRef<OsStr>) -> Result<LoadedLibrary> {
        let filename = filename.as_ref();
        // Display only; the loader gets the name untouched.
        let name = filename.to_string_lossy().into_owned();

        // SAFETY: Caller trusts the library.
        let library = unsafe { Library::new(filename) }.map_err(|e| Error::LibraryNotFound {
            name: name.clone(),
            reason: e.to_string(),
        })?;

        tracing::debug!(library = %name, "opened platform library");

        Ok(LoadedLibrary { library, name })
    }

    /// Open the library described by `config`.
    ///
    /// Absolute or relative paths are opened as-is. Bare names are looked up
    /// in `config.search_paths` first and then handed to the dynamic loader.
    ///
    /// # Safety
    ///
    /// See [`LoadedLibrary::open`].
    pub unsafe fn open_with(config: &LoaderConfig) -> Result<LoadedLibrary> {
        let name = config.library.as_str();

        if !name.contains(std::path::MAIN_SEPARATOR) {
            for dir in &config.search_paths {
                let candidate = dir.join(name);
                if candidate.exists() {
                    // SAFETY: Caller trusts the configured library.
                    return unsafe { Self::open(&candidate) };
                }
            }
        }

        // SAFETY: Caller trusts the configured library.
        unsafe { Self::open(name) }
    }

    /// Resolve `symbol` and copy out its value.
    ///
    /// # Safety
    ///
    /// `T` must match the real type of the exported symbol, normally an
    /// `unsafe extern "C" fn` pointer type. The returned value is only valid
    /// while this library stays loaded.
    pub unsafe fn resolve<T: Copy>(&self, symbol: &str) -> Result<T> {
        // SAFETY: Caller guarantees `T` is the symbol's real type.
        let sym = unsafe { self.library.get::<T>(symbol.as_bytes()) }.map_err(|_| {
            Error::SymbolNotFound {
                symbol: symbol.to_string(),
                library: self.name.clone(),
            }
        })?;

        tracing::trace!(library = %self.name, symbol, "resolved symbol");

        Ok(*sym)
    }

    /// Name or path the library was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for LoadedLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedLibrary")
            .field("name", &self.name)
            .finish()
    }
}
