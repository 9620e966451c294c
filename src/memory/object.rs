//! Lifecycle of the opaque native object.
//!
//! Construction and destruction are tied together with `Drop`: once the
//! native constructor has run, the destructor runs exactly once on every
//! exit path, including failed init checks and ABI validation errors. An
//! arena whose constructor never ran is simply unmapped.

use super::arena::ObjectArena;
use crate::error::{Error, Result};
use crate::format::PixelFormat;
use crate::loader::EntryPoints;
use crate::native::{NativeBase, NativeWindowBuffer};
use crate::status;
use crate::usage::UsageFlags;
use std::ffi::c_void;
use std::ptr::NonNull;

/// An arena on which the native constructor has run.
struct ConstructedObject {
    arena: ObjectArena,
    entry: EntryPoints,
}

impl ConstructedObject {
    #[inline]
    fn as_ptr(&self) -> *mut c_void {
        self.arena.as_mut_ptr().cast()
    }
}

impl Drop for ConstructedObject {
    fn drop(&mut self) {
        // SAFETY: The constructor ran on this arena and this is the only
        // place the destructor is invoked.
        unsafe { (self.entry.fns().destruct)(self.as_ptr()) };

        if let Err(e) = self.arena.check_guard() {
            tracing::error!(error = %e, "native object corrupted its arena");
        }
        tracing::debug!(capacity = self.arena.capacity(), "destroyed native object");
    }
}

/// A fully constructed native `GraphicBuffer`.
///
/// Owned by a buffer handle through an `Arc`; native buffer references hold
/// further clones so the object outlives every holder. The object holds one
/// native reference of its own from construction until its destructor runs.
pub struct NativeObject {
    object: ConstructedObject,
    native: NonNull<NativeWindowBuffer>,
}

impl NativeObject {
    /// Allocate an arena, run the native constructor and validate the result.
    ///
    /// Arguments are forwarded unchanged; range checks belong to the caller.
    pub fn create(
        entry: &EntryPoints,
        width: u32,
        height: u32,
        format: PixelFormat,
        usage: UsageFlags,
    ) -> Result<NativeObject> {
        let abi = *entry.abi();
        let fns = *entry.fns();
        let arena = ObjectArena::new(abi.object_capacity, abi.guard_len)?;

        // SAFETY: The arena provides `object_capacity` zeroed bytes, which the
        // entry point table guarantees is enough for the native object.
        unsafe {
            (fns.construct)(
                arena.as_mut_ptr().cast(),
                width,
                height,
                format.as_raw(),
                usage.as_raw(),
            )
        };
        let object = ConstructedObject {
            arena,
            entry: entry.clone(),
        };

        object.arena.check_guard()?;

        // SAFETY: The object was constructed above.
        status::check(unsafe { (fns.init_check)(object.as_ptr()) })?;

        // SAFETY: The object was constructed and passed its init check.
        let native = NonNull::new(unsafe { (fns.get_native_buffer)(object.as_ptr()) })
            .ok_or(Error::NullNativeBuffer)?;

        // SAFETY: A non-null native buffer stays valid until destruct.
        let view = unsafe { native.as_ref() };
        if view.magic() != abi.native_buffer_magic {
            return Err(Error::AbiMismatch(format!(
                "native buffer magic {:#010x}, expected {:#010x}",
                view.magic(),
                abi.native_buffer_magic
            )));
        }
        if (view.version() as usize) < std::mem::size_of::<NativeWindowBuffer>() {
            return Err(Error::AbiMismatch(format!(
                "native buffer version {} smaller than the known prefix ({} bytes)",
                view.version(),
                std::mem::size_of::<NativeWindowBuffer>()
            )));
        }

        tracing::debug!(
            width,
            height,
            %format,
            usage = usage.as_raw(),
            stride = view.stride(),
            "constructed native object"
        );

        let object = NativeObject { object, native };
        // The owning handle is a holder too. Its reference is never released
        // through `dec_ref`: the count must not reach zero while the arena
        // is mapped, and teardown goes through the destructor instead.
        object.inc_ref();

        Ok(object)
    }

    /// Map the buffer for CPU access.
    pub(crate) fn lock(&self, usage: UsageFlags) -> Result<NonNull<u8>> {
        let fns = self.object.entry.fns();
        let mut vaddr: *mut c_void = std::ptr::null_mut();

        // SAFETY: The object is constructed; `vaddr` is a valid out pointer.
        status::check(unsafe { (fns.lock)(self.object.as_ptr(), usage.as_raw(), &mut vaddr) })?;

        match NonNull::new(vaddr.cast::<u8>()) {
            Some(ptr) => Ok(ptr),
            None => {
                // SAFETY: The lock above succeeded, so releasing it is valid.
                if let Err(e) = status::check(unsafe { (fns.unlock)(self.object.as_ptr()) }) {
                    tracing::warn!(error = %e, "unlock after null mapping failed");
                }
                Err(Error::NullMapping)
            }
        }
    }

    /// Release the CPU mapping.
    pub(crate) fn unlock(&self) -> Result<()> {
        // SAFETY: The object is constructed.
        status::check(unsafe { (self.object.entry.fns().unlock)(self.object.as_ptr()) })
    }

    /// The native window buffer view.
    #[inline]
    pub fn native(&self) -> &NativeWindowBuffer {
        // SAFETY: Valid until destruct, which only runs when `self` drops.
        unsafe { self.native.as_ref() }
    }

    /// Raw pointer to the native window buffer.
    #[inline]
    pub fn native_ptr(&self) -> NonNull<NativeWindowBuffer> {
        self.native
    }

    /// Notify the native side of one more holder.
    pub(crate) fn inc_ref(&self) {
        let base = self.native.as_ptr().cast::<NativeBase>();
        if let Some(inc) = self.native().common.inc_ref {
            // SAFETY: The header belongs to a live native object.
            unsafe { inc(base) };
        }
    }

    /// Notify the native side that a holder went away.
    pub(crate) fn dec_ref(&self) {
        let base = self.native.as_ptr().cast::<NativeBase>();
        if let Some(dec) = self.native().common.dec_ref {
            // SAFETY: Paired with a previous `inc_ref`.
            unsafe { dec(base) };
        }
    }

    /// Bytes reserved for the object.
    pub fn capacity(&self) -> usize {
        self.object.arena.capacity()
    }
}

// SAFETY: Lock and unlock are only reachable through `&mut` on the owning
// handle. Reference count callbacks are atomic on the native side.
unsafe impl Send for NativeObject {}
unsafe impl Sync for NativeObject {}

impl std::fmt::Debug for NativeObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeObject")
            .field("capacity", &self.capacity())
            .field("native", &self.native())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusCode;
    use crate::testing::{self, SoftwareGralloc};

    fn rgba() -> (PixelFormat, UsageFlags) {
        (
            PixelFormat::Rgba8888,
            UsageFlags::SW_READ_OFTEN | UsageFlags::SW_WRITE_OFTEN,
        )
    }

    #[test]
    fn test_create_and_drop_runs_destructor() {
        let before = testing::live_objects();
        let (format, usage) = rgba();
        let object =
            NativeObject::create(&SoftwareGralloc::entry_points(), 64, 32, format, usage).unwrap();
        assert_eq!(testing::live_objects(), before + 1);
        assert_eq!(object.native().width(), 64);
        drop(object);
        assert_eq!(testing::live_objects(), before);
    }

    #[test]
    fn test_failed_init_check_destroys_object() {
        let before = testing::live_objects();
        let result = NativeObject::create(
            &SoftwareGralloc::entry_points(),
            1 << 15,
            1 << 15,
            PixelFormat::Rgba8888,
            UsageFlags::SW_READ_OFTEN,
        );
        assert_eq!(result.unwrap_err().status(), Some(StatusCode::NoMemory));
        assert_eq!(testing::live_objects(), before);
    }

    #[test]
    fn test_null_native_buffer_destroys_object() {
        unsafe extern "C" fn null_native(_this: *const c_void) -> *mut NativeWindowBuffer {
            std::ptr::null_mut()
        }
        let mut fns = SoftwareGralloc::fns();
        fns.get_native_buffer = null_native;
        let entry = unsafe { EntryPoints::from_fns(fns, SoftwareGralloc::abi()) };

        let before = testing::live_objects();
        let (format, usage) = rgba();
        let result = NativeObject::create(&entry, 16, 16, format, usage);
        assert!(matches!(result, Err(Error::NullNativeBuffer)));
        assert_eq!(testing::live_objects(), before);
    }

    #[test]
    fn test_oversized_object_is_detected() {
        unsafe extern "C" fn fat_construct(this: *mut c_void, _w: u32, _h: u32, _f: i32, _u: u32) {
            // Pretend the object is 1.5x the documented bound.
            unsafe { std::ptr::write_bytes(this.cast::<u8>(), 0, 1536) };
        }
        unsafe extern "C" fn noop_destruct(_this: *mut c_void) {}

        let mut fns = SoftwareGralloc::fns();
        fns.construct = fat_construct;
        fns.destruct = noop_destruct;
        let entry = unsafe { EntryPoints::from_fns(fns, SoftwareGralloc::abi()) };

        let (format, usage) = rgba();
        let result = NativeObject::create(&entry, 16, 16, format, usage);
        assert!(matches!(result, Err(Error::AbiMismatch(_))));
    }

    #[test]
    fn test_wrong_magic_is_detected() {
        let abi = SoftwareGralloc::abi();
        let mut bad_abi = abi;
        bad_abi.native_buffer_magic = u32::from_be_bytes(*b"_xyz");
        let entry = unsafe { EntryPoints::from_fns(SoftwareGralloc::fns(), bad_abi) };

        let (format, usage) = rgba();
        match NativeObject::create(&entry, 16, 16, format, usage) {
            Err(Error::AbiMismatch(msg)) => assert!(msg.contains("magic")),
            other => panic!("expected AbiMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_lock_unlock_roundtrip() {
        let (format, usage) = rgba();
        let object =
            NativeObject::create(&SoftwareGralloc::entry_points(), 8, 8, format, usage).unwrap();
        let ptr = object.lock(UsageFlags::SW_WRITE_OFTEN).unwrap();
        unsafe { ptr.as_ptr().write(7) };
        object.unlock().unwrap();
    }

    #[test]
    fn test_object_holds_its_own_native_reference() {
        let released = testing::released_at_zero();
        let (format, usage) = rgba();
        let object =
            NativeObject::create(&SoftwareGralloc::entry_points(), 8, 8, format, usage).unwrap();
        assert_eq!(unsafe { testing::native_ref_count(object.native()) }, 1);

        object.inc_ref();
        object.dec_ref();
        assert_eq!(unsafe { testing::native_ref_count(object.native()) }, 1);
        drop(object);
        assert_eq!(testing::released_at_zero(), released);
    }

    #[test]
    fn test_ref_callbacks_reach_native_side() {
        let (format, usage) = rgba();
        let object =
            NativeObject::create(&SoftwareGralloc::entry_points(), 8, 8, format, usage).unwrap();
        let base = unsafe { testing::native_ref_count(object.native()) };
        object.inc_ref();
        assert_eq!(unsafe { testing::native_ref_count(object.native()) }, base + 1);
        object.dec_ref();
        assert_eq!(unsafe { testing::native_ref_count(object.native()) }, base);
    }
}
