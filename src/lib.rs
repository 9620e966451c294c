//! # graphic-buffer
//!
//! Allocate, map and share platform `GraphicBuffer` objects from Rust
//! without linking against the platform UI library.
//!
//! The library is opened at runtime and the six native entry points
//! (construct, destruct, lock, unlock, native buffer accessor, init check)
//! are resolved by their mangled names. The native object lives in a
//! guarded arena owned by the Rust handle, so its lifetime follows normal
//! ownership: dropping the last holder runs the native destructor exactly
//! once.
//!
//! ## Features
//!
//! - **Runtime loading**: no link-time dependency, symbol names configurable
//!   per platform revision
//! - **Guarded arena**: native object overruns are reported instead of
//!   corrupting the heap silently
//! - **RAII mapping**: [`MappedRegion`] unlocks when it goes out of scope
//! - **Sharing**: [`NativeBufferRef`] hands the ABI pointer to compositors
//!   with reference counting on both sides
//! - **Host testing**: `testing::SoftwareGralloc` implements the native
//!   contract in Rust (behind the `testing` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use graphic_buffer::prelude::*;
//!
//! # fn main() -> graphic_buffer::Result<()> {
//! let entry = unsafe { EntryPoints::load(&LoaderConfig::default())? };
//! let mut buffer = GraphicBuffer::with_entry_points(
//!     &entry,
//!     1280,
//!     720,
//!     PixelFormat::Rgba8888,
//!     UsageFlags::SW_WRITE_OFTEN | UsageFlags::HW_TEXTURE,
//! )?;
//!
//! let mut region = buffer.map(UsageFlags::SW_WRITE_OFTEN)?;
//! if let Some(pixels) = region.as_mut_slice() {
//!     pixels.fill(0xff);
//! }
//! region.unlock()?;
//!
//! let native = buffer.native_buffer();
//! println!("stride {} pixels, handle {:p}", native.stride(), native.as_ptr());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod buffer;
pub mod error;
pub mod format;
pub mod loader;
pub mod memory;
pub mod native;
pub mod platform;
pub mod status;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod usage;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::buffer::{GraphicBuffer, MappedRegion};
    pub use crate::error::{Error, Result};
    pub use crate::format::PixelFormat;
    pub use crate::loader::{EntryPoints, LoaderConfig};
    pub use crate::native::NativeBufferRef;
    pub use crate::status::StatusCode;
    pub use crate::usage::UsageFlags;
}

pub use buffer::{GraphicBuffer, MappedRegion};
pub use error::{Error, Result};
pub use format::PixelFormat;
pub use loader::{EntryPoints, LoaderConfig};
pub use native::{NativeBufferRef, NativeWindowBuffer};
pub use platform::PlatformAbi;
pub use status::StatusCode;
pub use usage::UsageFlags;
