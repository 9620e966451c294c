//! Per-platform ABI constants.
//!
//! The native `GraphicBuffer` object is only partially documented. What the
//! binding relies on is bundled here and versioned together:
//!
//! - the six exported symbol names (Itanium C++ mangling),
//! - an upper bound on the object size, used to size the arena,
//! - the magic tag stamped into the native window buffer header.
//!
//! Growing [`LEGACY_OBJECT_CAPACITY`] or changing a symbol name is a breaking
//! change and must come with a new [`PlatformAbi::revision`].
//!
//! # Usage
//!
//! ```rust
//! use graphic_buffer::platform::PlatformAbi;
//!
//! let abi = PlatformAbi::LEGACY;
//! assert_eq!(abi.object_capacity, 1024);
//! assert!(abi.symbols.lock.contains("GraphicBuffer4lock"));
//! ```

/// Default shared library name, resolved through the dynamic loader.
pub const DEFAULT_LIBRARY: &str = "libui.so";

/// Bytes reserved for the native object on legacy releases.
///
/// The real object is a few hundred bytes on every known build; this bound
/// leaves headroom for vendor additions.
pub const LEGACY_OBJECT_CAPACITY: usize = 1024;

/// Minimum number of guard bytes placed after the object.
pub const GUARD_LEN: usize = 64;

/// Value the guard bytes are filled with.
pub const GUARD_BYTE: u8 = 0xa5;

/// Magic tag of a native window buffer: `'_bfr'`.
pub const NATIVE_BUFFER_MAGIC: u32 = u32::from_be_bytes(*b"_bfr");

/// Exported names of the six required entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolTable {
    /// `GraphicBuffer(uint32_t w, uint32_t h, PixelFormat format, uint32_t usage)`.
    pub construct: &'static str,
    /// `~GraphicBuffer()`.
    pub destruct: &'static str,
    /// `status_t lock(uint32_t usage, void** vaddr)`.
    pub lock: &'static str,
    /// `status_t unlock()`.
    pub unlock: &'static str,
    /// `ANativeWindowBuffer* getNativeBuffer() const`.
    pub get_native_buffer: &'static str,
    /// `status_t initCheck() const`.
    pub init_check: &'static str,
}

impl SymbolTable {
    /// Symbols exported by `libui.so` on API levels 14 through 25.
    pub const LEGACY: SymbolTable = SymbolTable {
        construct: "_ZN7android13GraphicBufferC1Ejjij",
        destruct: "_ZN7android13GraphicBufferD1Ev",
        lock: "_ZN7android13GraphicBuffer4lockEjPPv",
        unlock: "_ZN7android13GraphicBuffer6unlockEv",
        get_native_buffer: "_ZNK7android13GraphicBuffer15getNativeBufferEv",
        init_check: "_ZNK7android13GraphicBuffer9initCheckEv",
    };

    /// All names in resolution order.
    pub fn names(&self) -> [&'static str; 6] {
        [
            self.construct,
            self.destruct,
            self.lock,
            self.unlock,
            self.get_native_buffer,
            self.init_check,
        ]
    }
}

/// Versioned bundle of everything the binding assumes about the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformAbi {
    /// Revision of this bundle. Bumped on any breaking change.
    pub revision: u32,
    /// Arena bytes reserved for the native object.
    pub object_capacity: usize,
    /// Minimum guard bytes after the object.
    pub guard_len: usize,
    /// Expected header magic of the native window buffer.
    pub native_buffer_magic: u32,
    /// Entry point names.
    pub symbols: SymbolTable,
}

impl PlatformAbi {
    /// Legacy `libui.so` (API 14–25).
    pub const LEGACY: PlatformAbi = PlatformAbi {
        revision: 1,
        object_capacity: LEGACY_OBJECT_CAPACITY,
        guard_len: GUARD_LEN,
        native_buffer_magic: NATIVE_BUFFER_MAGIC,
        symbols: SymbolTable::LEGACY,
    };

    /// Same ABI with a different arena capacity.
    pub fn with_object_capacity(mut self, capacity: usize) -> Self {
        self.object_capacity = capacity;
        self
    }

    /// Same ABI with a different symbol table.
    pub fn with_symbols(mut self, symbols: SymbolTable) -> Self {
        self.symbols = symbols;
        self
    }
}

impl Default for PlatformAbi {
    fn default() -> Self {
        Self::LEGACY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_value() {
        assert_eq!(NATIVE_BUFFER_MAGIC, 0x5f62_6672);
    }

    #[test]
    fn test_symbol_names_are_unique() {
        let names = SymbolTable::LEGACY.names();
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_builders() {
        let abi = PlatformAbi::default().with_object_capacity(2048);
        assert_eq!(abi.object_capacity, 2048);
        assert_eq!(abi.revision, PlatformAbi::LEGACY.revision);
        assert_eq!(abi.symbols, SymbolTable::LEGACY);
    }
}
