//! ABI-compatible native window buffer and shared references to it.
//!
//! The layout below must match the platform byte for byte; it is checked at
//! compile time. Only the documented prefix is modeled. Real buffers carry
//! more fields after `usage`, which is why [`NativeWindowBuffer`] is only
//! ever used behind a pointer handed out by the native implementation.
//!
//! ```text
//! offset        field
//! 0             magic        u32
//! 4             version      u32
//! 8             reserved     [*mut c_void; 4]
//! 8 + 4p        inc_ref      fn(*mut NativeBase)
//! 8 + 5p        dec_ref      fn(*mut NativeBase)
//! 8 + 6p        width        i32
//!  +4           height       i32
//!  +8           stride       i32
//!  +12          format       i32
//!  +16          usage        i32
//! ```
//!
//! (`p` is the pointer size.)

use crate::format::PixelFormat;
use crate::memory::NativeObject;
use crate::usage::UsageFlags;
use std::ffi::c_void;
use std::mem::{offset_of, size_of};
use std::ops::Deref;
use std::sync::Arc;

/// Reference count callback stored in the header.
pub type RefCallback = unsafe extern "C" fn(base: *mut NativeBase);

/// Common header of every native window object.
#[repr(C)]
pub struct NativeBase {
    /// Object type tag.
    pub magic: u32,
    /// Size of the full native structure.
    pub version: u32,
    /// Reserved for the platform.
    pub reserved: [*mut c_void; 4],
    /// Add a holder.
    pub inc_ref: Option<RefCallback>,
    /// Remove a holder.
    pub dec_ref: Option<RefCallback>,
}

/// Known prefix of the platform's native window buffer.
#[repr(C)]
pub struct NativeWindowBuffer {
    /// Reference counted header.
    pub common: NativeBase,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
    /// Row length in pixels.
    pub stride: i32,
    /// Raw pixel format.
    pub format: i32,
    /// Raw usage word.
    pub usage: i32,
}

const PTR: usize = size_of::<*mut c_void>();
const _: () = assert!(size_of::<NativeBase>() == 8 + 6 * PTR);
const _: () = assert!(offset_of!(NativeBase, inc_ref) == 8 + 4 * PTR);
const _: () = assert!(offset_of!(NativeWindowBuffer, width) == 8 + 6 * PTR);
const _: () = assert!(offset_of!(NativeWindowBuffer, stride) == 8 + 6 * PTR + 8);
const _: () = assert!(offset_of!(NativeWindowBuffer, usage) == 8 + 6 * PTR + 16);

impl NativeWindowBuffer {
    /// Header magic.
    #[inline]
    pub fn magic(&self) -> u32 {
        self.common.magic
    }

    /// Header version (size of the full native structure).
    #[inline]
    pub fn version(&self) -> u32 {
        self.common.version
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Row length in pixels.
    #[inline]
    pub fn stride(&self) -> i32 {
        self.stride
    }

    /// Raw pixel format.
    #[inline]
    pub fn format_raw(&self) -> i32 {
        self.format
    }

    /// Pixel format, if it is one of the known values.
    pub fn format(&self) -> Option<PixelFormat> {
        PixelFormat::from_raw(self.format)
    }

    /// Usage flags.
    pub fn usage(&self) -> UsageFlags {
        UsageFlags::from_raw(self.usage as u32)
    }
}

impl std::fmt::Debug for NativeWindowBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeWindowBuffer")
            .field("magic", &format_args!("{:#010x}", self.common.magic))
            .field("version", &self.common.version)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("format", &self.format)
            .field("usage", &format_args!("{:#x}", self.usage))
            .finish()
    }
}

/// Shared reference to a native window buffer.
///
/// Every reference is one holder: creating or cloning it calls the header's
/// `inc_ref`, dropping it calls `dec_ref`. The Rust side keeps its own count
/// in an `Arc`, so the native object is only destroyed once the owning
/// [`GraphicBuffer`](crate::GraphicBuffer) and every reference are gone.
///
/// # Handing off to a compositor
///
/// [`NativeBufferRef::as_ptr`] yields the ABI pointer. A collaborator that
/// keeps it beyond the lifetime of this reference must take its own native
/// reference through `inc_ref` and release it through `dec_ref`.
pub struct NativeBufferRef {
    owner: Arc<NativeObject>,
}

impl NativeBufferRef {
    pub(crate) fn new(owner: Arc<NativeObject>) -> Self {
        owner.inc_ref();
        Self { owner }
    }

    /// ABI pointer for native consumers.
    #[inline]
    pub fn as_ptr(&self) -> *mut NativeWindowBuffer {
        self.owner.native_ptr().as_ptr()
    }

    /// Number of Rust-side holders, the owning buffer included.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.owner)
    }
}

impl Deref for NativeBufferRef {
    type Target = NativeWindowBuffer;

    fn deref(&self) -> &NativeWindowBuffer {
        self.owner.native()
    }
}

impl Clone for NativeBufferRef {
    fn clone(&self) -> Self {
        Self::new(Arc::clone(&self.owner))
    }
}

impl Drop for NativeBufferRef {
    fn drop(&mut self) {
        self.owner.dec_ref();
    }
}

impl std::fmt::Debug for NativeBufferRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeBufferRef")
            .field("buffer", self.owner.native())
            .field("holders", &self.holders())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::NATIVE_BUFFER_MAGIC;

    fn sample() -> NativeWindowBuffer {
        NativeWindowBuffer {
            common: NativeBase {
                magic: NATIVE_BUFFER_MAGIC,
                version: size_of::<NativeWindowBuffer>() as u32,
                reserved: [std::ptr::null_mut(); 4],
                inc_ref: None,
                dec_ref: None,
            },
            width: 256,
            height: 128,
            stride: 256,
            format: PixelFormat::Rgba8888.as_raw(),
            usage: (UsageFlags::SW_READ_OFTEN | UsageFlags::HW_TEXTURE).as_raw() as i32,
        }
    }

    #[test]
    fn test_view_accessors() {
        let buffer = sample();
        assert_eq!(buffer.magic(), NATIVE_BUFFER_MAGIC);
        assert_eq!(buffer.width(), 256);
        assert_eq!(buffer.height(), 128);
        assert_eq!(buffer.stride(), 256);
        assert_eq!(buffer.format(), Some(PixelFormat::Rgba8888));
        assert!(buffer.usage().contains(UsageFlags::HW_TEXTURE));
    }

    #[test]
    fn test_unknown_format() {
        let mut buffer = sample();
        buffer.format = 0x11;
        assert_eq!(buffer.format(), None);
        assert_eq!(buffer.format_raw(), 0x11);
    }

    #[test]
    fn test_prefix_size() {
        assert_eq!(size_of::<NativeWindowBuffer>() % PTR, 0);
        assert!(size_of::<NativeWindowBuffer>() >= 8 + 6 * PTR + 20);
    }

    #[test]
    fn test_debug_shows_magic_in_hex() {
        let text = format!("{:?}", sample());
        assert!(text.contains("0x5f626672"));
    }
}
