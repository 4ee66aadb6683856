use std::alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error};
use std::ptr::NonNull;

pub const REGION_ALIGN: usize = 16;

/// A zero-initialised, 16-byte aligned allocation whose address never moves.
/// Bytecode sees raw addresses into code and stack regions, so these are not
/// backed by a `Vec`.
pub struct Region {
    ptr: NonNull<u8>,
    len: usize,
    layout: Layout,
}

impl Region {
    /// Infallible form for sizes that already exist in memory, such as a
    /// loaded image.
    pub fn zeroed(len: usize) -> Self {
        let Some(layout) = Self::layout(len) else {
            panic!("region of {len} bytes exceeds the address space");
        };
        let ptr = NonNull::new(unsafe { alloc_zeroed(layout) })
            .unwrap_or_else(|| handle_alloc_error(layout));
        Self { ptr, len, layout }
    }

    /// `None` if `len` cannot be laid out or the allocator refuses it.
    pub fn try_zeroed(len: usize) -> Option<Self> {
        let layout = Self::layout(len)?;
        let ptr = NonNull::new(unsafe { alloc_zeroed(layout) })?;
        Some(Self { ptr, len, layout })
    }

    fn layout(len: usize) -> Option<Layout> {
        Layout::from_size_align(len.max(1), REGION_ALIGN).ok()
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let region = Self::zeroed(bytes.len());
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), region.ptr.as_ptr(), bytes.len());
        }
        region
    }

    #[inline(always)]
    pub fn base(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn address(&self) -> u64 {
        self.ptr.as_ptr() as u64
    }

    /// Offset of `address` if `size` bytes starting there lie inside the region.
    #[inline(always)]
    pub fn offset_of(&self, address: u64, size: usize) -> Option<usize> {
        let offset = address.checked_sub(self.address())? as usize;
        let end = offset.checked_add(size)?;
        (end <= self.len).then_some(offset)
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for Region {
    fn drop(&mut self) {
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

impl std::fmt::Debug for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Region")
            .field("base", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_is_aligned_and_copied() {
        let region = Region::from_bytes(&[1, 2, 3]);
        assert_eq!(region.address() % REGION_ALIGN as u64, 0);
        assert_eq!(region.as_slice(), &[1, 2, 3]);
    }

    #[test]
    fn offset_of_checks_the_whole_access() {
        let region = Region::zeroed(16);
        let base = region.address();
        assert_eq!(region.offset_of(base + 8, 8), Some(8));
        assert_eq!(region.offset_of(base + 9, 8), None);
        assert_eq!(region.offset_of(base.wrapping_sub(1), 1), None);
    }

    #[test]
    fn oversized_region_is_refused() {
        assert!(Region::try_zeroed(usize::MAX - 4).is_none());
        assert!(Region::try_zeroed(isize::MAX as usize).is_none());
        let region = Region::try_zeroed(0).expect("empty region should allocate");
        assert!(region.is_empty());
    }
}
