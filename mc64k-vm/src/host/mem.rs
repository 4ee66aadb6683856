//! `mem` host module: element buffer services.

use host_abi::{
    ERR_BUFFER_FULL, ERR_INVALID_HANDLE, ERR_INVALID_SLOT, ERR_NONE, ERR_NULL_PTR,
    ERR_OUT_OF_MEMORY, FN_MEM_ELEMENT_ALLOC_SLOT, FN_MEM_ELEMENT_BUFFER_ALLOC,
    FN_MEM_ELEMENT_BUFFER_FREE, FN_MEM_ELEMENT_BUFFER_INFO, FN_MEM_ELEMENT_FREE_SLOT, MODULE_MEM,
    REG_INT_0, REG_INT_1, REG_INT_2, REG_PTR_0, REG_PTR_1,
};

use crate::element_buffer::{ElementBuffer, ElementBufferError};
use crate::machine::Machine;

use super::HostModule;

pub fn module() -> HostModule {
    HostModule::new(MODULE_MEM, "mem")
        .with(FN_MEM_ELEMENT_BUFFER_ALLOC, element_buffer_alloc)
        .with(FN_MEM_ELEMENT_BUFFER_FREE, element_buffer_free)
        .with(FN_MEM_ELEMENT_ALLOC_SLOT, element_alloc_slot)
        .with(FN_MEM_ELEMENT_FREE_SLOT, element_free_slot)
        .with(FN_MEM_ELEMENT_BUFFER_INFO, element_buffer_info)
}

pub fn error_code(err: ElementBufferError) -> u64 {
    match err {
        ElementBufferError::InvalidBuffer => ERR_INVALID_HANDLE,
        ElementBufferError::BufferFull => ERR_BUFFER_FULL,
        ElementBufferError::InvalidSlot | ElementBufferError::SlotNotAllocated => ERR_INVALID_SLOT,
    }
}

fn set_error(machine: &mut Machine, code: u64) {
    machine.gpr_mut(REG_INT_0).set_u64(code);
}

/// Buffer named by the first pointer register. Null sets `ERR_NULL_PTR`.
fn buffer_arg(machine: &mut Machine) -> Option<ElementBuffer> {
    let buffer = ElementBuffer::from_address(machine.gpr(REG_PTR_0).u64());
    if buffer.is_none() {
        set_error(machine, ERR_NULL_PTR);
    }
    buffer
}

fn element_buffer_alloc(machine: &mut Machine) {
    let count = machine.gpr(REG_INT_1).u16();
    let size = machine.gpr(REG_INT_2).u16();
    match ElementBuffer::allocate(count, size) {
        Some(buffer) => {
            machine.gpr_mut(REG_PTR_0).set_u64(buffer.address());
            set_error(machine, ERR_NONE);
        }
        None => {
            machine.gpr_mut(REG_PTR_0).set_u64(0);
            set_error(machine, ERR_OUT_OF_MEMORY);
        }
    }
}

fn element_buffer_free(machine: &mut Machine) {
    let Some(buffer) = buffer_arg(machine) else {
        return;
    };
    match buffer.free() {
        Ok(()) => {
            machine.gpr_mut(REG_PTR_0).set_u64(0);
            set_error(machine, ERR_NONE);
        }
        Err(err) => set_error(machine, error_code(err)),
    }
}

fn element_alloc_slot(machine: &mut Machine) {
    let Some(buffer) = buffer_arg(machine) else {
        return;
    };
    match buffer.allocate_slot() {
        Ok(slot) => {
            machine.gpr_mut(REG_PTR_1).set_u64(slot.as_ptr() as u64);
            set_error(machine, ERR_NONE);
        }
        Err(err) => {
            machine.gpr_mut(REG_PTR_1).set_u64(0);
            set_error(machine, error_code(err));
        }
    }
}

fn element_free_slot(machine: &mut Machine) {
    let Some(buffer) = buffer_arg(machine) else {
        return;
    };
    let slot = machine.gpr(REG_PTR_1).u64();
    match buffer.free_slot(slot) {
        Ok(()) => {
            machine.gpr_mut(REG_PTR_1).set_u64(0);
            set_error(machine, ERR_NONE);
        }
        Err(err) => set_error(machine, error_code(err)),
    }
}

fn element_buffer_info(machine: &mut Machine) {
    let Some(buffer) = buffer_arg(machine) else {
        return;
    };
    match buffer.layout() {
        Ok(layout) => {
            machine.gpr_mut(REG_INT_1).set_u64(layout.count as u64);
            machine.gpr_mut(REG_INT_2).set_u64(layout.slot_size as u64);
            set_error(machine, ERR_NONE);
        }
        Err(err) => set_error(machine, error_code(err)),
    }
}
