//! Typed entry point table.
//!
//! Raw symbol addresses never leave this module: the loader resolves them
//! into [`NativeFns`], and everything above talks to an [`EntryPoints`]
//! capability table. A table can also be built from functions that live in
//! this process, which is how the software implementation behind the
//! `testing` feature plugs in.

use super::library::{LoadedLibrary, LoaderConfig};
use crate::error::Result;
use crate::native::NativeWindowBuffer;
use crate::platform::PlatformAbi;
use std::ffi::c_void;
use std::sync::Arc;

/// `GraphicBuffer::GraphicBuffer(w, h, format, usage)` with `this` first.
pub type ConstructFn =
    unsafe extern "C" fn(this: *mut c_void, width: u32, height: u32, format: i32, usage: u32);

/// `GraphicBuffer::~GraphicBuffer()`.
pub type DestructFn = unsafe extern "C" fn(this: *mut c_void);

/// `status_t GraphicBuffer::lock(uint32_t usage, void** vaddr)`.
pub type LockFn =
    unsafe extern "C" fn(this: *mut c_void, usage: u32, vaddr: *mut *mut c_void) -> i32;

/// `status_t GraphicBuffer::unlock()`.
pub type UnlockFn = unsafe extern "C" fn(this: *mut c_void) -> i32;

/// `ANativeWindowBuffer* GraphicBuffer::getNativeBuffer() const`.
pub type GetNativeBufferFn = unsafe extern "C" fn(this: *const c_void) -> *mut NativeWindowBuffer;

/// `status_t GraphicBuffer::initCheck() const`.
pub type InitCheckFn = unsafe extern "C" fn(this: *const c_void) -> i32;

/// The six native functions, already typed.
#[derive(Debug, Clone, Copy)]
pub struct NativeFns {
    /// Constructor.
    pub construct: ConstructFn,
    /// Destructor.
    pub destruct: DestructFn,
    /// Map for CPU access.
    pub lock: LockFn,
    /// Release a CPU mapping.
    pub unlock: UnlockFn,
    /// Window buffer accessor.
    pub get_native_buffer: GetNativeBufferFn,
    /// Post-construction status.
    pub init_check: InitCheckFn,
}

/// Capability table handed to every buffer.
///
/// Cloning is cheap and shares the loaded library, so many buffers can be
/// created from one resolution pass. Each buffer keeps its own clone, which
/// keeps the library mapped for as long as the buffer lives.
#[derive(Clone)]
pub struct EntryPoints {
    fns: NativeFns,
    abi: PlatformAbi,
    library: Option<Arc<LoadedLibrary>>,
}

impl EntryPoints {
    /// Open the configured library and resolve every entry point.
    ///
    /// Fails with `LibraryNotFound` or `SymbolNotFound`; a partial table is
    /// never returned.
    ///
    /// # Safety
    ///
    /// The library must implement the symbols in `config.abi` with the
    /// signatures declared in this module.
    pub unsafe fn load(config: &LoaderConfig) -> Result<EntryPoints> {
        // SAFETY: Caller trusts the configured library.
        let library = unsafe { LoadedLibrary::open_with(config) }?;
        // SAFETY: Same contract as this function.
        unsafe { Self::resolve(Arc::new(library), config.abi) }
    }

    /// Resolve every entry point of `abi` from an already loaded library.
    ///
    /// # Safety
    ///
    /// See [`EntryPoints::load`].
    pub unsafe fn resolve(library: Arc<LoadedLibrary>, abi: PlatformAbi) -> Result<EntryPoints> {
        let names = &abi.symbols;

        // SAFETY: Caller guarantees the exported symbols have these types.
        let fns = unsafe {
            NativeFns {
                construct: library.resolve(names.construct)?,
                destruct: library.resolve(names.destruct)?,
                lock: library.resolve(names.lock)?,
                unlock: library.resolve(names.unlock)?,
                get_native_buffer: library.resolve(names.get_native_buffer)?,
                init_check: library.resolve(names.init_check)?,
            }
        };

        tracing::debug!(
            library = library.name(),
            abi_revision = abi.revision,
            "resolved graphic buffer entry points"
        );

        Ok(EntryPoints {
            fns,
            abi,
            library: Some(library),
        })
    }

    /// Build a table from functions already present in this process.
    ///
    /// # Safety
    ///
    /// The functions must honor the contracts of the native implementation:
    /// construct initializes at most `abi.object_capacity` bytes, the other
    /// functions accept any object that construct initialized, and
    /// `get_native_buffer` returns a pointer that stays valid until destruct.
    pub unsafe fn from_fns(fns: NativeFns, abi: PlatformAbi) -> EntryPoints {
        EntryPoints {
            fns,
            abi,
            library: None,
        }
    }

    /// The typed function table.
    #[inline]
    pub fn fns(&self) -> &NativeFns {
        &self.fns
    }

    /// ABI this table was resolved against.
    #[inline]
    pub fn abi(&self) -> &PlatformAbi {
        &self.abi
    }

    /// Name of the backing library, if the table came from one.
    pub fn library_name(&self) -> Option<&str> {
        self.library.as_deref().map(LoadedLibrary::name)
    }
}

impl std::fmt::Debug for EntryPoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryPoints")
            .field("library", &self.library_name())
            .field("abi_revision", &self.abi.revision)
            .finish()
    }
}
