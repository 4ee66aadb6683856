//! Fixed-slot memory pool indexed by a free bitmap.
//!
//! Layout of one allocation:
//!
//! ```text
//! [Header: magic u64, count u32, slot_size u32][bitmap: count / 64 words][slots]
//! ```
//!
//! A set bitmap bit marks a free slot. The magic word is the buffer's own
//! address mixed with a per-process salt; it is zeroed on free.

use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::cell::RefCell;
use std::collections::HashSet;
use std::ptr::NonNull;
use std::sync::OnceLock;

use tracing::{trace, warn};

pub const MAX_ELEMENTS: usize = 65536;
pub const MAX_SLOT_SIZE: usize = 65536;
pub const SLOT_GRANULE: usize = 8;
pub const BITMAP_BITS: usize = 64;

const BUFFER_ALIGN: usize = 8;

#[repr(C)]
struct Header {
    magic: u64,
    count: u32,
    slot_size: u32,
}

const HEADER_SIZE: usize = std::mem::size_of::<Header>();

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementBufferError {
    InvalidBuffer,
    BufferFull,
    InvalidSlot,
    SlotNotAllocated,
}

impl std::fmt::Display for ElementBufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementBufferError::InvalidBuffer => write!(f, "invalid element buffer"),
            ElementBufferError::BufferFull => write!(f, "element buffer is full"),
            ElementBufferError::InvalidSlot => write!(f, "address is not a slot of this buffer"),
            ElementBufferError::SlotNotAllocated => write!(f, "slot is already free"),
        }
    }
}

impl std::error::Error for ElementBufferError {}

/// Sizes derived from a requested element count and size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElementBufferLayout {
    pub count: usize,
    pub slot_size: usize,
    pub bitmap_words: usize,
    pub header_size: usize,
    pub total_size: usize,
}

impl ElementBufferLayout {
    /// Zero for either argument means the maximum of 65536.
    pub fn new(count: u16, size: u16) -> Self {
        let count = if count == 0 { MAX_ELEMENTS } else { count as usize };
        let size = if size == 0 { MAX_SLOT_SIZE } else { size as usize };
        Self::rounded(
            count.next_multiple_of(BITMAP_BITS),
            size.next_multiple_of(SLOT_GRANULE),
        )
    }

    fn rounded(count: usize, slot_size: usize) -> Self {
        let bitmap_words = count / BITMAP_BITS;
        let header_size = HEADER_SIZE + bitmap_words * 8;
        Self {
            count,
            slot_size,
            bitmap_words,
            header_size,
            total_size: header_size + count * slot_size,
        }
    }

    pub fn storage_size(&self) -> usize {
        self.count * self.slot_size
    }

    fn alloc_layout(&self) -> Option<Layout> {
        Layout::from_size_align(self.total_size, BUFFER_ALIGN).ok()
    }
}

static SALT: OnceLock<u64> = OnceLock::new();

fn salt() -> u64 {
    *SALT.get_or_init(|| rand::random::<u64>() ^ (&SALT as *const OnceLock<u64> as u64))
}

fn token(address: u64) -> u64 {
    address ^ salt()
}

thread_local! {
    // Addresses of buffers allocated on this thread and not yet freed. A
    // handle is only dereferenced once it is found here.
    static LIVE: RefCell<HashSet<u64>> = RefCell::new(HashSet::new());
}

fn is_live(address: u64) -> bool {
    LIVE.with(|live| live.borrow().contains(&address))
}

/// Handle to an element buffer. Copies share the allocation; every operation
/// re-validates the handle, so a stale copy is rejected after `free`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ElementBuffer {
    ptr: NonNull<u8>,
}

impl ElementBuffer {
    /// Returns `None` only if the system allocator fails.
    pub fn allocate(count: u16, size: u16) -> Option<Self> {
        let layout = ElementBufferLayout::new(count, size);
        let ptr = NonNull::new(unsafe { alloc_zeroed(layout.alloc_layout()?) })?;
        let buffer = Self { ptr };
        unsafe {
            buffer.header().write(Header {
                magic: token(buffer.address()),
                count: layout.count as u32,
                slot_size: layout.slot_size as u32,
            });
            let bitmap = buffer.bitmap();
            for word in 0..layout.bitmap_words {
                bitmap.add(word).write(u64::MAX);
            }
        }
        LIVE.with(|live| live.borrow_mut().insert(buffer.address()));
        trace!(
            address = buffer.address(),
            count = layout.count,
            slot_size = layout.slot_size,
            "element buffer allocated"
        );
        Some(buffer)
    }

    pub fn from_address(address: u64) -> Option<Self> {
        NonNull::new(address as *mut u8).map(|ptr| Self { ptr })
    }

    pub fn address(&self) -> u64 {
        self.ptr.as_ptr() as u64
    }

    fn header(&self) -> *mut Header {
        self.ptr.as_ptr().cast::<Header>()
    }

    fn bitmap(&self) -> *mut u64 {
        self.ptr.as_ptr().wrapping_add(HEADER_SIZE).cast::<u64>()
    }

    /// Validates the handle and returns its layout.
    pub fn layout(&self) -> Result<ElementBufferLayout, ElementBufferError> {
        if !is_live(self.address()) {
            warn!(address = self.address(), "element buffer handle is not live");
            return Err(ElementBufferError::InvalidBuffer);
        }
        let header = unsafe { self.header().read() };
        if header.magic != token(self.address()) {
            warn!(address = self.address(), "element buffer magic mismatch");
            return Err(ElementBufferError::InvalidBuffer);
        }
        Ok(ElementBufferLayout::rounded(
            header.count as usize,
            header.slot_size as usize,
        ))
    }

    /// Claims the lowest-numbered free slot.
    pub fn allocate_slot(&self) -> Result<NonNull<u8>, ElementBufferError> {
        let layout = self.layout()?;
        let bitmap = self.bitmap();
        for word in 0..layout.bitmap_words {
            let bits = unsafe { bitmap.add(word).read() };
            if bits == 0 {
                continue;
            }
            let bit = bits.trailing_zeros() as usize;
            unsafe { bitmap.add(word).write(bits & !(1u64 << bit)) };
            let index = word * BITMAP_BITS + bit;
            let offset = layout.header_size + index * layout.slot_size;
            trace!(address = self.address(), index, "element slot allocated");
            let slot = self.ptr.as_ptr().wrapping_add(offset);
            return NonNull::new(slot).ok_or(ElementBufferError::InvalidSlot);
        }
        Err(ElementBufferError::BufferFull)
    }

    /// Returns a slot to the pool. The address must be one handed out by
    /// [`ElementBuffer::allocate_slot`] and not freed since.
    pub fn free_slot(&self, slot: u64) -> Result<(), ElementBufferError> {
        let layout = self.layout()?;
        let storage = self.address() + layout.header_size as u64;
        let offset = slot
            .checked_sub(storage)
            .ok_or(ElementBufferError::InvalidSlot)? as usize;
        if offset >= layout.storage_size() || offset % layout.slot_size != 0 {
            return Err(ElementBufferError::InvalidSlot);
        }
        let index = offset / layout.slot_size;
        let (word, bit) = (index / BITMAP_BITS, index % BITMAP_BITS);
        let cell = self.bitmap().wrapping_add(word);
        let bits = unsafe { cell.read() };
        if bits & (1u64 << bit) != 0 {
            return Err(ElementBufferError::SlotNotAllocated);
        }
        unsafe { cell.write(bits | (1u64 << bit)) };
        trace!(address = self.address(), index, "element slot freed");
        Ok(())
    }

    pub fn free_slots(&self) -> Result<usize, ElementBufferError> {
        let layout = self.layout()?;
        let bitmap = self.bitmap();
        Ok((0..layout.bitmap_words)
            .map(|word| unsafe { bitmap.add(word).read() }.count_ones() as usize)
            .sum())
    }

    /// Poisons the magic word and releases the allocation.
    pub fn free(self) -> Result<(), ElementBufferError> {
        let layout = self.layout()?;
        let alloc_layout = layout
            .alloc_layout()
            .ok_or(ElementBufferError::InvalidBuffer)?;
        unsafe { (*self.header()).magic = 0 };
        LIVE.with(|live| live.borrow_mut().remove(&self.address()));
        unsafe { dealloc(self.ptr.as_ptr(), alloc_layout) };
        trace!(address = self.address(), "element buffer freed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maximum_layout_matches_formula() {
        let layout = ElementBufferLayout::new(0, 0);
        assert_eq!(layout.count, 65536);
        assert_eq!(layout.slot_size, 65536);
        assert_eq!(layout.bitmap_words, 1024);
        assert_eq!(layout.header_size, 16 + 1024 * 8);
        assert_eq!(layout.total_size, 8208 + 65536 * 65536);
    }

    #[test]
    fn small_requests_round_up() {
        let layout = ElementBufferLayout::new(1, 1);
        assert_eq!((layout.count, layout.slot_size), (64, 8));
        assert_eq!((layout.header_size, layout.total_size), (24, 24 + 512));

        let layout = ElementBufferLayout::new(100, 12);
        assert_eq!((layout.count, layout.slot_size), (128, 16));
        assert_eq!(layout.bitmap_words, 2);
        assert_eq!(layout.total_size, 32 + 128 * 16);
    }

    #[test]
    fn header_is_two_words() {
        assert_eq!(HEADER_SIZE, 16);
    }

    #[test]
    fn salt_is_stable() {
        assert_eq!(salt(), salt());
        assert_ne!(token(0x1000), token(0x2000));
    }
}
