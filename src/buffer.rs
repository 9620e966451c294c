//! The public buffer handle.
//!
//! A [`GraphicBuffer`] owns one native object and the entry point table it
//! was built with (and through it, the loaded library). Mutating calls take
//! `&mut self`, which gives the one-caller-at-a-time guarantee the native
//! lock/unlock pair requires without any internal locking.

use crate::error::{Error, Result};
use crate::format::PixelFormat;
use crate::loader::{EntryPoints, LoaderConfig};
use crate::memory::NativeObject;
use crate::native::{NativeBufferRef, NativeWindowBuffer};
use crate::status::StatusCode;
use crate::usage::{SwIntent, UsageFlags};
use std::ptr::NonNull;
use std::sync::Arc;

/// A hardware-shareable pixel buffer allocated by the platform.
///
/// # Example
///
/// ```rust
/// use graphic_buffer::testing::SoftwareGralloc;
/// use graphic_buffer::{GraphicBuffer, PixelFormat, UsageFlags};
///
/// let usage = UsageFlags::SW_READ_OFTEN | UsageFlags::SW_WRITE_OFTEN;
/// let mut buffer = GraphicBuffer::with_entry_points(
///     &SoftwareGralloc::entry_points(),
///     256,
///     128,
///     PixelFormat::Rgba8888,
///     usage,
/// )
/// .unwrap();
/// assert!(buffer.stride_bytes() >= 256 * 4);
///
/// let mut region = buffer.map(UsageFlags::SW_WRITE_OFTEN).unwrap();
/// region.as_mut_slice().unwrap()[..4].copy_from_slice(&[0xff, 0, 0, 0xff]);
/// region.unlock().unwrap();
/// ```
pub struct GraphicBuffer {
    object: Arc<NativeObject>,
    width: u32,
    height: u32,
    format: PixelFormat,
    usage: UsageFlags,
    mapping: Option<NonNull<u8>>,
}

impl GraphicBuffer {
    /// Load the default platform library and allocate a buffer from it.
    ///
    /// Every call resolves the entry points again; to allocate many buffers,
    /// load an [`EntryPoints`] table once and use
    /// [`GraphicBuffer::with_entry_points`].
    ///
    /// # Safety
    ///
    /// Loads and runs code from the platform library, see
    /// [`EntryPoints::load`].
    pub unsafe fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        usage: UsageFlags,
    ) -> Result<GraphicBuffer> {
        // SAFETY: Caller trusts the default platform library.
        let entry = unsafe { EntryPoints::load(&LoaderConfig::default()) }?;
        Self::with_entry_points(&entry, width, height, format, usage)
    }

    /// Allocate a buffer through an existing entry point table.
    ///
    /// # Errors
    ///
    /// - `Status(BadValue)` if a dimension is 0 or exceeds `i32::MAX`, or
    ///   `format` is not a storage layout. No native object is created.
    /// - `Status(code)` if the native init check fails.
    /// - `AbiMismatch` if the native object does not fit the documented ABI.
    pub fn with_entry_points(
        entry: &EntryPoints,
        width: u32,
        height: u32,
        format: PixelFormat,
        usage: UsageFlags,
    ) -> Result<GraphicBuffer> {
        let max = i32::MAX as u32;
        if width == 0 || height == 0 || width > max || height > max || !format.is_concrete() {
            tracing::debug!(width, height, %format, "rejected buffer parameters");
            return Err(Error::Status(StatusCode::BadValue));
        }

        let object = NativeObject::create(entry, width, height, format, usage)?;

        Ok(GraphicBuffer {
            object: Arc::new(object),
            width,
            height,
            format,
            usage,
            mapping: None,
        })
    }

    /// Map the buffer for CPU access and return the address of the first pixel.
    ///
    /// The mapping spans [`GraphicBuffer::byte_len`] bytes and stays valid
    /// until [`GraphicBuffer::unlock`]. Transient native failures
    /// (`WouldBlock`, `TimedOut`) are returned as-is; nothing is retried.
    ///
    /// # Errors
    ///
    /// `Status(InvalidOperation)` if the buffer is already locked; the
    /// existing mapping is left untouched.
    pub fn lock(&mut self, usage: UsageFlags) -> Result<NonNull<u8>> {
        if self.mapping.is_some() {
            return Err(Error::Status(StatusCode::InvalidOperation));
        }

        let ptr = self.object.lock(usage)?;
        self.mapping = Some(ptr);
        Ok(ptr)
    }

    /// Release the mapping obtained by [`GraphicBuffer::lock`].
    ///
    /// # Errors
    ///
    /// `Status(InvalidOperation)` if the buffer is not locked.
    pub fn unlock(&mut self) -> Result<()> {
        if self.mapping.is_none() {
            return Err(Error::Status(StatusCode::InvalidOperation));
        }

        self.object.unlock()?;
        self.mapping = None;
        Ok(())
    }

    /// Lock and wrap the mapping in a guard that unlocks on drop.
    pub fn map(&mut self, usage: UsageFlags) -> Result<MappedRegion<'_>> {
        let ptr = self.lock(usage)?;
        let bpp = self.bytes_per_pixel();
        Ok(MappedRegion {
            ptr,
            len: self.byte_len(),
            stride_bytes: self.stride_bytes(),
            row_len: self.width as usize * bpp,
            writable: usage.sw_write() != SwIntent::Never,
            released: false,
            buffer: self,
        })
    }

    /// Whether a lock is outstanding.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.mapping.is_some()
    }

    /// Address of the outstanding mapping, if any.
    #[inline]
    pub fn mapping(&self) -> Option<NonNull<u8>> {
        self.mapping
    }

    /// A shared reference to the native window buffer, for compositors.
    pub fn native_buffer(&self) -> NativeBufferRef {
        NativeBufferRef::new(Arc::clone(&self.object))
    }

    /// Borrow the native window buffer without taking a reference.
    #[inline]
    pub fn native_view(&self) -> &NativeWindowBuffer {
        self.object.native()
    }

    /// Row length in pixels, as reported by the native buffer.
    ///
    /// The unit is pixels, not bytes: a 256 pixel wide RGBA buffer reports
    /// at least 256 here. Use [`GraphicBuffer::stride_bytes`] for the byte
    /// pitch (at least `width * bytes_per_pixel`).
    #[inline]
    pub fn stride(&self) -> u32 {
        self.object.native().stride().max(0) as u32
    }

    /// Row length in bytes.
    #[inline]
    pub fn stride_bytes(&self) -> usize {
        self.stride() as usize * self.bytes_per_pixel()
    }

    /// Size of a CPU mapping in bytes: `stride * height * bytes_per_pixel`.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.stride_bytes() * self.height as usize
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel format.
    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Usage requested at allocation.
    #[inline]
    pub fn usage(&self) -> UsageFlags {
        self.usage
    }

    #[inline]
    fn bytes_per_pixel(&self) -> usize {
        // Construction only accepts storage layouts.
        self.format.bytes_per_pixel().unwrap_or(0)
    }
}

impl Drop for GraphicBuffer {
    fn drop(&mut self) {
        if self.mapping.take().is_some() {
            tracing::warn!(
                width = self.width,
                height = self.height,
                "graphic buffer dropped while locked, forcing unlock"
            );
            if let Err(e) = self.object.unlock() {
                tracing::warn!(error = %e, "forced unlock failed");
            }
        }
    }
}

// SAFETY: The mapping pointer is only dereferenced by the owner through
// `&mut self`; `&self` methods read immutable native fields or adjust the
// atomic reference count.
unsafe impl Send for GraphicBuffer {}
unsafe impl Sync for GraphicBuffer {}

impl std::fmt::Debug for GraphicBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("usage", &self.usage)
            .field("stride", &self.stride())
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// CPU mapping of a [`GraphicBuffer`], unlocked on drop.
///
/// Write access is only offered when the lock was taken with a software
/// write intent.
pub struct MappedRegion<'a> {
    buffer: &'a mut GraphicBuffer,
    ptr: NonNull<u8>,
    len: usize,
    stride_bytes: usize,
    row_len: usize,
    writable: bool,
    released: bool,
}

impl MappedRegion<'_> {
    /// Address of the first pixel.
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Mapping size in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the mapping has zero length.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Row length in bytes.
    #[inline]
    pub fn stride_bytes(&self) -> usize {
        self.stride_bytes
    }

    /// The whole mapping.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: The native lock mapped `len` bytes, valid until unlock,
        // which needs the `&mut` this region holds.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// The whole mapping, writable.
    ///
    /// Returns `None` if the lock carried no software write intent.
    pub fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        if !self.writable {
            return None;
        }
        // SAFETY: As in `as_slice`, and `&mut self` makes the borrow unique.
        Some(unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) })
    }

    /// Visible pixels of row `y`, without stride padding.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.buffer.height {
            return None;
        }
        let start = y as usize * self.stride_bytes;
        self.as_slice().get(start..start + self.row_len)
    }

    /// Unlock now and report the native result.
    pub fn unlock(mut self) -> Result<()> {
        self.released = true;
        self.buffer.unlock()
    }
}

impl Drop for MappedRegion<'_> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.buffer.unlock() {
                tracing::warn!(error = %e, "unlock of mapped region failed");
            }
        }
    }
}

impl std::fmt::Debug for MappedRegion<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedRegion")
            .field("len", &self.len)
            .field("stride_bytes", &self.stride_bytes)
            .field("writable", &self.writable)
            .finish()
    }
}
