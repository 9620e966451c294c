//! Fixed-capacity arena for the opaque native object.
//!
//! The arena is an anonymous private mapping rounded up to whole pages:
//!
//! ```text
//! ┌──────────────────────────────┬──────────────────────────────────┐
//! │ object (capacity bytes)      │ guard (rest of the mapping)      │
//! │ zeroed, handed to construct  │ filled with GUARD_BYTE           │
//! └──────────────────────────────┴──────────────────────────────────┘
//! ```
//!
//! If the native object is larger than the documented bound, construct
//! writes into the guard region, which stays inside our mapping. The arena
//! detects that on [`ObjectArena::check_guard`] instead of letting the
//! overrun reach unrelated memory.

use crate::error::{Error, Result};
use crate::platform::GUARD_BYTE;
use rustix::mm::{MapFlags, ProtFlags};
use std::ptr::NonNull;

/// Page-backed memory reserved for one native object.
pub struct ObjectArena {
    ptr: NonNull<u8>,
    capacity: usize,
    mapped_len: usize,
}

impl ObjectArena {
    /// Reserve `capacity` object bytes followed by at least `guard_len`
    /// guard bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if `capacity` is 0 or the mapping fails.
    pub fn new(capacity: usize, guard_len: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::AllocationFailed(
                "arena capacity must be greater than 0".into(),
            ));
        }

        let page_size = rustix::param::page_size();
        let wanted = capacity
            .checked_add(guard_len.max(1))
            .ok_or_else(|| Error::AllocationFailed("arena size overflows".into()))?;
        let mapped_len = wanted.div_ceil(page_size) * page_size;

        // SAFETY: Fresh anonymous mapping, no existing memory is touched.
        let ptr = unsafe {
            rustix::mm::mmap_anonymous(
                std::ptr::null_mut(),
                mapped_len,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::PRIVATE,
            )?
        };

        let ptr = NonNull::new(ptr.cast::<u8>())
            .ok_or_else(|| Error::AllocationFailed("mmap returned null".into()))?;

        // Anonymous mappings are zeroed; only the guard needs filling.
        // SAFETY: [capacity, mapped_len) lies inside the mapping.
        unsafe {
            std::ptr::write_bytes(ptr.as_ptr().add(capacity), GUARD_BYTE, mapped_len - capacity);
        }

        Ok(Self {
            ptr,
            capacity,
            mapped_len,
        })
    }

    /// Start of the object region.
    #[inline]
    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Bytes available to the object.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes of guard after the object.
    #[inline]
    pub fn guard_len(&self) -> usize {
        self.mapped_len - self.capacity
    }

    /// Verify the guard region is untouched.
    ///
    /// Returns `AbiMismatch` naming the first overwritten offset.
    pub fn check_guard(&self) -> Result<()> {
        // SAFETY: The guard region lies inside the mapping and is only
        // written by `new` (and by a misbehaving native constructor).
        let guard = unsafe {
            std::slice::from_raw_parts(self.ptr.as_ptr().add(self.capacity), self.guard_len())
        };

        match guard.iter().position(|&b| b != GUARD_BYTE) {
            None => Ok(()),
            Some(pos) => Err(Error::AbiMismatch(format!(
                "native object overran its {} byte arena (guard touched at offset {})",
                self.capacity,
                self.capacity + pos
            ))),
        }
    }
}

impl Drop for ObjectArena {
    fn drop(&mut self) {
        // SAFETY: `ptr` and `mapped_len` describe the mapping created in
        // `new`; nothing borrows it once the arena is dropped.
        unsafe {
            let _ = rustix::mm::munmap(self.ptr.as_ptr().cast(), self.mapped_len);
        }
    }
}

// SAFETY: The mapping is private to this arena and not tied to any thread.
unsafe impl Send for ObjectArena {}
unsafe impl Sync for ObjectArena {}

impl std::fmt::Debug for ObjectArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectArena")
            .field("capacity", &self.capacity)
            .field("guard_len", &self.guard_len())
            .finish()
    }
}
