//! Runtime loading of the platform graphics library.
//!
//! Nothing is linked at build time. The library is opened with the dynamic
//! loader, the six `GraphicBuffer` entry points are resolved by name, and the
//! result is packaged as an [`EntryPoints`] table that buffers hold on to.
//!
//! # Example
//!
//! ```rust,ignore
//! use graphic_buffer::loader::{EntryPoints, LoaderConfig};
//!
//! let config = LoaderConfig::default().add_search_path("/system/lib64");
//! let entry = unsafe { EntryPoints::load(&config)? };
//! ```

mod library;
mod symbols;

pub use library::{LoadedLibrary, LoaderConfig};
pub use symbols::{
    ConstructFn, DestructFn, EntryPoints, GetNativeBufferFn, InitCheckFn, LockFn, NativeFns,
    UnlockFn,
};
