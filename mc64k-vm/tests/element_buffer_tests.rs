use std::collections::HashSet;

use mc64k::element_buffer::BITMAP_BITS;
use mc64k::host::mem::error_code;
use mc64k::{ElementBuffer, ElementBufferError, ElementBufferLayout};

#[test]
fn layout_rounds_count_and_size() {
    let layout = ElementBufferLayout::new(100, 12);
    assert_eq!(layout.count, 128);
    assert_eq!(layout.slot_size, 16);
    assert_eq!(layout.bitmap_words, 2);
    assert_eq!(layout.header_size, 16 + 2 * 8);
    assert_eq!(layout.total_size, layout.header_size + 128 * 16);
}

#[test]
fn slots_are_distinct_until_full() {
    let buffer = ElementBuffer::allocate(BITMAP_BITS as u16, 8).expect("allocation should succeed");
    let layout = buffer.layout().expect("buffer should be valid");
    let mut seen = HashSet::new();
    for _ in 0..layout.count {
        let slot = buffer.allocate_slot().expect("slot should be available");
        let address = slot.as_ptr() as u64;
        assert!(address >= buffer.address() + layout.header_size as u64);
        assert!(address < buffer.address() + layout.total_size as u64);
        assert_eq!((address - buffer.address() - layout.header_size as u64) % 8, 0);
        assert!(seen.insert(address), "slot {address:#x} handed out twice");
    }
    assert_eq!(buffer.free_slots(), Ok(0));
    assert_eq!(buffer.allocate_slot(), Err(ElementBufferError::BufferFull));
    buffer.free().expect("free should succeed");
}

#[test]
fn slots_are_writable_and_reused() {
    let buffer = ElementBuffer::allocate(2, 16).expect("allocation should succeed");
    let first = buffer.allocate_slot().expect("slot should be available");
    let second = buffer.allocate_slot().expect("slot should be available");
    assert_eq!(second.as_ptr() as u64 - first.as_ptr() as u64, 16);
    unsafe {
        first.as_ptr().cast::<u64>().write(0x1111);
        second.as_ptr().cast::<u64>().write(0x2222);
        assert_eq!(first.as_ptr().cast::<u64>().read(), 0x1111);
    }
    let before = buffer.free_slots().expect("buffer should be valid");
    buffer
        .free_slot(first.as_ptr() as u64)
        .expect("slot should be freed");
    assert_eq!(buffer.free_slots(), Ok(before + 1));
    // The lowest free slot is handed out first.
    assert_eq!(buffer.allocate_slot(), Ok(first));
    buffer.free().expect("free should succeed");
}

#[test]
fn free_slot_rejects_foreign_addresses() {
    let buffer = ElementBuffer::allocate(4, 32).expect("allocation should succeed");
    let slot = buffer.allocate_slot().expect("slot should be available").as_ptr() as u64;
    assert_eq!(
        buffer.free_slot(slot + 4),
        Err(ElementBufferError::InvalidSlot)
    );
    assert_eq!(
        buffer.free_slot(buffer.address()),
        Err(ElementBufferError::InvalidSlot)
    );
    let layout = buffer.layout().expect("buffer should be valid");
    assert_eq!(
        buffer.free_slot(buffer.address() + layout.total_size as u64),
        Err(ElementBufferError::InvalidSlot)
    );
    assert_eq!(buffer.free_slot(slot), Ok(()));
    assert_eq!(
        buffer.free_slot(slot),
        Err(ElementBufferError::SlotNotAllocated)
    );
    buffer.free().expect("free should succeed");
}

#[test]
fn freed_buffer_is_invalid() {
    let buffer = ElementBuffer::allocate(1, 8).expect("allocation should succeed");
    let stale = buffer;
    buffer.free().expect("free should succeed");
    assert_eq!(stale.layout(), Err(ElementBufferError::InvalidBuffer));
    assert_eq!(stale.allocate_slot(), Err(ElementBufferError::InvalidBuffer));
    assert_eq!(stale.free(), Err(ElementBufferError::InvalidBuffer));
}

#[test]
fn unknown_address_is_invalid() {
    let mut storage = [0u64; 8];
    let fake = ElementBuffer::from_address(storage.as_mut_ptr() as u64)
        .expect("address should be non-null");
    assert_eq!(fake.layout(), Err(ElementBufferError::InvalidBuffer));
    assert!(ElementBuffer::from_address(0).is_none());
}

#[test]
fn errors_map_to_abi_codes() {
    assert_eq!(
        error_code(ElementBufferError::InvalidBuffer),
        host_abi::ERR_INVALID_HANDLE
    );
    assert_eq!(
        error_code(ElementBufferError::BufferFull),
        host_abi::ERR_BUFFER_FULL
    );
    assert_eq!(
        error_code(ElementBufferError::SlotNotAllocated),
        host_abi::ERR_INVALID_SLOT
    );
}
