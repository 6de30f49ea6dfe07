//! Linear per-frame allocator.
//!
//! A single large virtual reservation that is bump-allocated into and
//! rewound at scope/frame boundaries rather than freed allocation-by-
//! allocation. Reserves a large address range with an anonymous `memmap2`
//! mapping and relies on the kernel's own demand paging to commit pages
//! lazily, so there is no separate commit step — only `decommit`, kept as
//! an explicit `madvise`-style hint.

use std::cell::Cell;

use memmap2::MmapMut;

use crate::error::{Error, Fatal, Result};

/// Default virtual reservation size for a frame arena.
const DEFAULT_RESERVE_SIZE: usize = 4 * 1024 * 1024 * 1024;

/// A bump allocator backed by one large anonymous mapping.
pub struct FrameArena {
    mapping: MmapMut,
    at: Cell<usize>,
}

/// A rewind point captured by [`FrameArena::mark`] or held implicitly by a
/// [`Scope`] guard.
#[derive(Clone, Copy, Debug)]
pub struct Marker(usize);

impl FrameArena {
    pub fn new() -> Result<Self> {
        Self::with_capacity(DEFAULT_RESERVE_SIZE)
    }

    pub fn with_capacity(size: usize) -> Result<Self> {
        let mapping = MmapMut::map_anon(size).map_err(|e| {
            Error::from(Fatal::ReservationFailed {
                size: size as u64,
                reason: e.to_string(),
            })
        })?;

        Ok(Self {
            mapping,
            at: Cell::new(0),
        })
    }

    fn align_up(offset: usize, align: usize) -> usize {
        (offset + align - 1) & !(align - 1)
    }

    /// Bump-allocates `size` bytes aligned to `align`, returning a mutable
    /// slice into the arena's backing mapping.
    ///
    /// # Safety
    /// Callers must not hold onto the returned slice past the next
    /// [`FrameArena::clear`], [`FrameArena::free_to`], or `Scope` drop that
    /// rewinds past it. The arena has no borrow checker to enforce this —
    /// a rewind silently invalidates every slice allocated past the mark.
    pub fn alloc_bytes(&self, size: usize, align: usize) -> &mut [u8] {
        let start = Self::align_up(self.at.get(), align);
        let end = start + size;
        assert!(
            end <= self.mapping.len(),
            "frame arena exhausted: requested {size} bytes at offset {start}, capacity {}",
            self.mapping.len()
        );

        self.at.set(end);

        let base = self.mapping.as_ptr() as *mut u8;
        unsafe { std::slice::from_raw_parts_mut(base.add(start), size) }
    }

    pub fn alloc<T>(&self, value: T) -> &mut T {
        let bytes = self.alloc_bytes(std::mem::size_of::<T>(), std::mem::align_of::<T>());
        let ptr = bytes.as_mut_ptr() as *mut T;
        unsafe {
            ptr.write(value);
            &mut *ptr
        }
    }

    pub fn mark(&self) -> Marker {
        Marker(self.at.get())
    }

    /// Rewinds the bump pointer to a previously captured marker; nothing
    /// is actually returned to the OS.
    pub fn free_to(&self, marker: Marker) {
        debug_assert!(marker.0 <= self.at.get());
        self.at.set(marker.0);
    }

    /// Rewinds the entire arena back to empty.
    pub fn clear(&self) {
        self.at.set(0);
    }

    /// Advises the kernel that pages beyond `keep_bytes` are no longer
    /// needed, without tearing down the reservation.
    pub fn decommit_beyond(&self, keep_bytes: usize) {
        #[cfg(unix)]
        {
            let _ = self.mapping.advise_range(
                memmap2::Advice::DontNeed,
                keep_bytes,
                self.mapping.len().saturating_sub(keep_bytes),
            );
        }
        let _ = keep_bytes;
    }

    pub fn bytes_allocated(&self) -> usize {
        self.at.get()
    }

    pub fn capacity(&self) -> usize {
        self.mapping.len()
    }

    /// Returns a scope guard that rewinds to the current marker on drop.
    pub fn scope(&self) -> Scope<'_> {
        Scope {
            arena: self,
            marker: self.mark(),
        }
    }
}

/// RAII rewind guard. Dropping it frees everything allocated since it was
/// created.
pub struct Scope<'a> {
    arena: &'a FrameArena,
    marker: Marker,
}

impl Drop for Scope<'_> {
    fn drop(&mut self) {
        self.arena.free_to(self.marker);
    }
}
