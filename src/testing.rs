//! Software implementation of the native entry points.
//!
//! [`SoftwareGralloc`] implements the six `GraphicBuffer` functions in Rust
//! with plain heap memory, so the binding can be exercised on any host. It
//! behaves like a strict gralloc:
//!
//! - zero sizes and non-storage formats fail the init check with `BAD_VALUE`
//! - allocations above [`MAX_ALLOCATION`] fail with `NO_MEMORY`
//! - rows are padded to [`STRIDE_ALIGN`] pixels
//! - nested locks, unlock without lock, and software locks on GPU-only
//!   buffers fail with `INVALID_OPERATION`
//! - a buffer marked busy (see [`set_busy`]) fails locks with `WOULD_BLOCK`
//! - the native reference count starts at [`INITIAL_STRONG_VALUE`], the
//!   first `incRef` sets it to 1, and a `decRef` that reaches zero (where
//!   the platform would `delete` the object) is recorded by
//!   [`released_at_zero`] instead
//!
//! Object and leaked-mapping counters are kept per thread so tests running
//! in parallel do not observe each other.
//!
//! # Example
//!
//! ```rust
//! use graphic_buffer::testing::SoftwareGralloc;
//! use graphic_buffer::{GraphicBuffer, PixelFormat, UsageFlags};
//!
//! let entry = SoftwareGralloc::entry_points();
//! let mut buffer = GraphicBuffer::with_entry_points(
//!     &entry,
//!     64,
//!     64,
//!     PixelFormat::Rgb565,
//!     UsageFlags::SW_WRITE_OFTEN,
//! )
//! .unwrap();
//! buffer.lock(UsageFlags::SW_WRITE_OFTEN).unwrap();
//! buffer.unlock().unwrap();
//! ```

use crate::format::PixelFormat;
use crate::loader::{EntryPoints, NativeFns};
use crate::native::{NativeBase, NativeWindowBuffer};
use crate::platform::{LEGACY_OBJECT_CAPACITY, NATIVE_BUFFER_MAGIC, PlatformAbi};
use crate::status::StatusCode;
use crate::usage::UsageFlags;
use std::cell::Cell;
use std::ffi::c_void;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

/// Row alignment in pixels.
pub const STRIDE_ALIGN: u32 = 16;

/// Largest pixel allocation the software allocator accepts.
pub const MAX_ALLOCATION: usize = 256 * 1024 * 1024;

/// Reference count of an object no holder has referenced yet.
pub const INITIAL_STRONG_VALUE: i32 = 1 << 28;

#[repr(C)]
struct SoftwareObject {
    native: NativeWindowBuffer,
    refs: AtomicI32,
    status: i32,
    busy: AtomicBool,
    locked: AtomicBool,
    pixels: *mut u8,
    len: usize,
}

const _: () = assert!(std::mem::size_of::<SoftwareObject>() <= LEGACY_OBJECT_CAPACITY);

thread_local! {
    static LIVE_OBJECTS: Cell<isize> = const { Cell::new(0) };
    static LEAKED_MAPPINGS: Cell<usize> = const { Cell::new(0) };
    static RELEASED_AT_ZERO: Cell<usize> = const { Cell::new(0) };
}

/// Entry point provider backed by the software allocator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareGralloc;

impl SoftwareGralloc {
    /// The six software functions.
    pub fn fns() -> NativeFns {
        NativeFns {
            construct: sw_construct,
            destruct: sw_destruct,
            lock: sw_lock,
            unlock: sw_unlock,
            get_native_buffer: sw_get_native_buffer,
            init_check: sw_init_check,
        }
    }

    /// ABI the software object fits in.
    pub fn abi() -> PlatformAbi {
        PlatformAbi::LEGACY
    }

    /// Ready-to-use entry point table.
    pub fn entry_points() -> EntryPoints {
        // SAFETY: The software functions honor the native contracts and the
        // object fits the legacy arena (checked at compile time).
        unsafe { EntryPoints::from_fns(Self::fns(), Self::abi()) }
    }
}

/// Software objects constructed and not yet destroyed on this thread.
pub fn live_objects() -> isize {
    LIVE_OBJECTS.with(Cell::get)
}

/// Software objects destroyed while still locked on this thread.
pub fn leaked_mappings() -> usize {
    LEAKED_MAPPINGS.with(Cell::get)
}

/// Native reference counts that dropped to zero on this thread.
///
/// The platform deletes the object at that point, so any increase while a
/// buffer is still owned means the object would have been freed under it.
pub fn released_at_zero() -> usize {
    RELEASED_AT_ZERO.with(Cell::get)
}

/// Native-side holder count of a software buffer, 0 if never referenced.
///
/// # Safety
///
/// `native` must come from an object built by [`SoftwareGralloc`].
pub unsafe fn native_ref_count(native: &NativeWindowBuffer) -> i32 {
    // SAFETY: Caller guarantees the view is the first field of a software object.
    let object = unsafe { software_object(native) };
    match object.refs.load(Ordering::Acquire) {
        INITIAL_STRONG_VALUE => 0,
        n => n,
    }
}

/// Whether the native side of a software buffer is locked.
///
/// # Safety
///
/// `native` must come from an object built by [`SoftwareGralloc`].
pub unsafe fn native_locked(native: &NativeWindowBuffer) -> bool {
    // SAFETY: Caller guarantees the view is the first field of a software object.
    let object = unsafe { software_object(native) };
    object.locked.load(Ordering::Acquire)
}

/// Make subsequent locks of a software buffer fail with `WOULD_BLOCK`,
/// as if the hardware held it.
///
/// # Safety
///
/// `native` must come from an object built by [`SoftwareGralloc`].
pub unsafe fn set_busy(native: &NativeWindowBuffer, busy: bool) {
    // SAFETY: Caller guarantees the view is the first field of a software object.
    let object = unsafe { software_object(native) };
    object.busy.store(busy, Ordering::Release);
}

unsafe fn software_object(native: &NativeWindowBuffer) -> &SoftwareObject {
    // SAFETY: `SoftwareObject` is repr(C) with the native buffer first.
    unsafe { &*(native as *const NativeWindowBuffer).cast::<SoftwareObject>() }
}

fn allocate_pixels(width: u32, height: u32, format: i32) -> Result<(u32, *mut u8, usize), StatusCode> {
    let bpp = PixelFormat::from_raw(format)
        .and_then(PixelFormat::bytes_per_pixel)
        .ok_or(StatusCode::BadValue)?;
    if width == 0 || height == 0 {
        return Err(StatusCode::BadValue);
    }

    let stride = width
        .div_ceil(STRIDE_ALIGN)
        .checked_mul(STRIDE_ALIGN)
        .filter(|&s| s <= i32::MAX as u32)
        .ok_or(StatusCode::NoMemory)?;
    let len = (stride as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(bpp))
        .filter(|&n| n <= MAX_ALLOCATION)
        .ok_or(StatusCode::NoMemory)?;

    let pixels = Box::into_raw(vec![0u8; len].into_boxed_slice()).cast::<u8>();
    Ok((stride, pixels, len))
}

unsafe extern "C" fn sw_construct(this: *mut c_void, width: u32, height: u32, format: i32, usage: u32) {
    let (status, stride, pixels, len) = match allocate_pixels(width, height, format) {
        Ok((stride, pixels, len)) => (StatusCode::Ok, stride, pixels, len),
        Err(code) => (code, 0, std::ptr::null_mut(), 0),
    };

    let object = SoftwareObject {
        native: NativeWindowBuffer {
            common: NativeBase {
                magic: NATIVE_BUFFER_MAGIC,
                version: std::mem::size_of::<NativeWindowBuffer>() as u32,
                reserved: [std::ptr::null_mut(); 4],
                inc_ref: Some(sw_inc_ref),
                dec_ref: Some(sw_dec_ref),
            },
            width: width as i32,
            height: height as i32,
            stride: stride as i32,
            format,
            usage: usage as i32,
        },
        refs: AtomicI32::new(INITIAL_STRONG_VALUE),
        status: status.as_raw(),
        busy: AtomicBool::new(false),
        locked: AtomicBool::new(false),
        pixels,
        len,
    };

    // SAFETY: The caller provides an arena large enough for the object.
    unsafe { this.cast::<SoftwareObject>().write(object) };
    LIVE_OBJECTS.with(|n| n.set(n.get() + 1));
}

unsafe extern "C" fn sw_destruct(this: *mut c_void) {
    // SAFETY: `this` was initialized by `sw_construct`; it is not used again.
    let object = unsafe { this.cast::<SoftwareObject>().read() };

    if object.locked.load(Ordering::Acquire) {
        LEAKED_MAPPINGS.with(|n| n.set(n.get() + 1));
    }
    if !object.pixels.is_null() {
        // SAFETY: Allocated in `allocate_pixels` with exactly `len` bytes.
        drop(unsafe { Box::from_raw(std::ptr::slice_from_raw_parts_mut(object.pixels, object.len)) });
    }
    LIVE_OBJECTS.with(|n| n.set(n.get() - 1));
}

unsafe extern "C" fn sw_lock(this: *mut c_void, usage: u32, vaddr: *mut *mut c_void) -> i32 {
    // SAFETY: `this` was initialized by `sw_construct`.
    let object = unsafe { &*this.cast::<SoftwareObject>() };

    if object.status != 0 {
        return StatusCode::NoInit.as_raw();
    }
    if vaddr.is_null() {
        return StatusCode::BadValue.as_raw();
    }

    let requested = UsageFlags::from_raw(usage);
    let allocated = UsageFlags::from_raw(object.native.usage as u32);
    if requested.has_software_access() && !allocated.has_software_access() {
        return StatusCode::InvalidOperation.as_raw();
    }
    if object.busy.load(Ordering::Acquire) {
        return StatusCode::WouldBlock.as_raw();
    }
    if object.locked.swap(true, Ordering::AcqRel) {
        return StatusCode::InvalidOperation.as_raw();
    }

    // SAFETY: Checked non-null above.
    unsafe { *vaddr = object.pixels.cast() };
    StatusCode::Ok.as_raw()
}

unsafe extern "C" fn sw_unlock(this: *mut c_void) -> i32 {
    // SAFETY: `this` was initialized by `sw_construct`.
    let object = unsafe { &*this.cast::<SoftwareObject>() };

    if object.status != 0 {
        return StatusCode::NoInit.as_raw();
    }
    if !object.locked.swap(false, Ordering::AcqRel) {
        return StatusCode::InvalidOperation.as_raw();
    }
    StatusCode::Ok.as_raw()
}

unsafe extern "C" fn sw_get_native_buffer(this: *const c_void) -> *mut NativeWindowBuffer {
    // The native buffer is the first field.
    this.cast_mut().cast()
}

unsafe extern "C" fn sw_init_check(this: *const c_void) -> i32 {
    // SAFETY: `this` was initialized by `sw_construct`.
    unsafe { (*this.cast::<SoftwareObject>()).status }
}

unsafe extern "C" fn sw_inc_ref(base: *mut NativeBase) {
    // SAFETY: The header is the first field of a software object.
    let object = unsafe { &*base.cast::<SoftwareObject>() };
    if object.refs.fetch_add(1, Ordering::AcqRel) == INITIAL_STRONG_VALUE {
        object.refs.fetch_sub(INITIAL_STRONG_VALUE, Ordering::AcqRel);
    }
}

unsafe extern "C" fn sw_dec_ref(base: *mut NativeBase) {
    // SAFETY: The header is the first field of a software object.
    let object = unsafe { &*base.cast::<SoftwareObject>() };
    if object.refs.fetch_sub(1, Ordering::AcqRel) == 1 {
        // The platform would `delete this` here; the arena belongs to the
        // binding, so record it instead.
        RELEASED_AT_ZERO.with(|n| n.set(n.get() + 1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ObjectArena;

    fn construct(arena: &ObjectArena, width: u32, height: u32, format: PixelFormat, usage: UsageFlags) {
        unsafe {
            sw_construct(arena.as_mut_ptr().cast(), width, height, format.as_raw(), usage.as_raw())
        };
    }

    #[test]
    fn test_stride_is_aligned() {
        let arena = ObjectArena::new(LEGACY_OBJECT_CAPACITY, 64).unwrap();
        construct(&arena, 100, 10, PixelFormat::Rgb565, UsageFlags::SW_READ_OFTEN);
        let this = arena.as_mut_ptr().cast::<c_void>();

        assert_eq!(unsafe { sw_init_check(this) }, 0);
        let native = unsafe { &*sw_get_native_buffer(this) };
        assert_eq!(native.stride(), 112);
        assert_eq!(native.width(), 100);

        unsafe { sw_destruct(this) };
    }

    #[test]
    fn test_bad_format_fails_init_check() {
        let arena = ObjectArena::new(LEGACY_OBJECT_CAPACITY, 64).unwrap();
        construct(&arena, 16, 16, PixelFormat::Opaque, UsageFlags::SW_READ_OFTEN);
        let this = arena.as_mut_ptr().cast::<c_void>();

        assert_eq!(unsafe { sw_init_check(this) }, StatusCode::BadValue.as_raw());
        let mut vaddr = std::ptr::null_mut();
        assert_eq!(unsafe { sw_lock(this, 0x3, &mut vaddr) }, StatusCode::NoInit.as_raw());

        unsafe { sw_destruct(this) };
    }

    #[test]
    fn test_nested_lock_rejected() {
        let arena = ObjectArena::new(LEGACY_OBJECT_CAPACITY, 64).unwrap();
        construct(&arena, 4, 4, PixelFormat::Rgba8888, UsageFlags::SW_READ_OFTEN);
        let this = arena.as_mut_ptr().cast::<c_void>();

        let mut vaddr = std::ptr::null_mut();
        assert_eq!(unsafe { sw_lock(this, 0x3, &mut vaddr) }, 0);
        assert!(!vaddr.is_null());
        assert_eq!(
            unsafe { sw_lock(this, 0x3, &mut vaddr) },
            StatusCode::InvalidOperation.as_raw()
        );
        assert_eq!(unsafe { sw_unlock(this) }, 0);
        assert_eq!(unsafe { sw_unlock(this) }, StatusCode::InvalidOperation.as_raw());

        unsafe { sw_destruct(this) };
    }

    #[test]
    fn test_ref_count_starts_at_placeholder() {
        let released = released_at_zero();
        let arena = ObjectArena::new(LEGACY_OBJECT_CAPACITY, 64).unwrap();
        construct(&arena, 4, 4, PixelFormat::Rgba8888, UsageFlags::SW_READ_OFTEN);
        let this = arena.as_mut_ptr().cast::<c_void>();
        let native = unsafe { &*sw_get_native_buffer(this) };
        let base = this.cast::<NativeBase>();

        assert_eq!(unsafe { native_ref_count(native) }, 0);
        unsafe { sw_inc_ref(base) };
        assert_eq!(unsafe { native_ref_count(native) }, 1);
        unsafe { sw_inc_ref(base) };
        unsafe { sw_dec_ref(base) };
        assert_eq!(released_at_zero(), released);
        unsafe { sw_dec_ref(base) };
        assert_eq!(released_at_zero(), released + 1);

        unsafe { sw_destruct(this) };
    }

    #[test]
    fn test_destroying_locked_object_counts_leak() {
        let leaked = leaked_mappings();
        let arena = ObjectArena::new(LEGACY_OBJECT_CAPACITY, 64).unwrap();
        construct(&arena, 4, 4, PixelFormat::Rgba8888, UsageFlags::SW_READ_OFTEN);
        let this = arena.as_mut_ptr().cast::<c_void>();

        let mut vaddr = std::ptr::null_mut();
        assert_eq!(unsafe { sw_lock(this, 0x3, &mut vaddr) }, 0);
        unsafe { sw_destruct(this) };
        assert_eq!(leaked_mappings(), leaked + 1);
    }
}
