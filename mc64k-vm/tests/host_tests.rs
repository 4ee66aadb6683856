mod common;

use common::*;
use host_abi::{
    ERR_INVALID_HANDLE, ERR_NONE, ERR_NULL_PTR, FN_MEM_ELEMENT_ALLOC_SLOT,
    FN_MEM_ELEMENT_BUFFER_ALLOC, FN_MEM_ELEMENT_BUFFER_FREE, FN_MEM_ELEMENT_BUFFER_INFO,
    FN_MEM_ELEMENT_FREE_SLOT, MODULE_MEM,
};

const MODULE_TEST: u8 = 7;

fn double_r1(machine: &mut Machine) {
    let value = machine.gpr(1).u64();
    machine.gpr_mut(1).set_u64(value * 2);
}

fn halt(machine: &mut Machine) {
    machine.set_status(MachineStatus::Completed);
}

/// Runs a nested program at the code offset held in `r1`.
fn call_back(machine: &mut Machine) {
    let entry = machine.gpr(1).u64() as usize;
    let _ = unsafe { machine.invoke(entry) };
}

fn test_module() -> HostModule {
    HostModule::new(MODULE_TEST, "test")
        .with(0, double_r1)
        .with(1, halt)
        .with(2, call_back)
}

fn select(b: &mut BytecodeBuilder, function: u64) {
    b.inst(Opcode::MoveQ, &[Ea::Gpr(0), Ea::Immediate(function)]);
}

#[test]
fn unknown_module_leaves_registers_untouched() {
    let mut m = machine(|b| {
        b.host(9);
        b.stop();
    });
    for reg in 0..15 {
        m.gpr_mut(reg).set_u64(reg as u64 * 3 + 1);
    }
    let before = m.snapshot();
    assert_eq!(m.run(), MachineStatus::UnknownHostCall);
    assert_eq!(
        fault_of(&m),
        Some(Fault::UnknownHostCall {
            module: 9,
            function: 1
        })
    );
    let after = m.snapshot();
    assert_eq!(after.gpr, before.gpr);
    assert_eq!(after.fpr, before.fpr);
}

#[test]
fn unknown_function_in_known_module_faults() {
    let m = run_with_mem(|b| {
        select(b, 0x1_0063);
        b.host(MODULE_MEM);
        b.stop();
    });
    assert_eq!(m.status(), MachineStatus::UnknownHostCall);
    // Only the low 16 bits of r0 select the function.
    assert_eq!(
        fault_of(&m),
        Some(Fault::UnknownHostCall {
            module: MODULE_MEM,
            function: 0x63
        })
    );
}

#[test]
fn vector_runs_and_execution_continues() {
    let mut m = machine(|b| {
        b.inst(Opcode::MoveQ, &[Ea::Gpr(1), Ea::Immediate(21)]);
        select(b, 0);
        b.host(MODULE_TEST);
        b.inst(Opcode::MoveQ, &[Ea::Gpr(2), Ea::Immediate(1)]);
        b.stop();
    });
    m.register_module(test_module());
    assert_eq!(m.run(), MachineStatus::Completed);
    assert_eq!(m.gpr(1).u64(), 42);
    assert_eq!(m.gpr(2).u64(), 1);
}

#[test]
fn vector_can_stop_the_run() {
    let mut m = machine(|b| {
        select(b, 1);
        b.host(MODULE_TEST);
        b.inst(Opcode::MoveQ, &[Ea::Gpr(2), Ea::Immediate(1)]);
        b.stop();
    });
    m.register_module(test_module());
    assert_eq!(m.run(), MachineStatus::Completed);
    assert_eq!(m.gpr(2).u64(), 0);
}

/// `bra main` followed by a subroutine at offset 5.
fn nested_program(b: &mut BytecodeBuilder, body: impl FnOnce(&mut BytecodeBuilder)) {
    b.bra("main");
    body(b);
    b.rts();
    b.label("main");
    b.inst(Opcode::MoveQ, &[Ea::Gpr(1), Ea::Immediate(5)]);
    select(b, 2);
    b.host(MODULE_TEST);
    b.inst(Opcode::MoveQ, &[Ea::Gpr(3), Ea::Immediate(1)]);
    b.stop();
}

#[test]
fn nested_invoke_returns_to_caller() {
    let mut m = machine(|b| {
        nested_program(b, |b| {
            b.inst(Opcode::MoveQ, &[Ea::Gpr(2), Ea::Immediate(99)]);
        });
    });
    m.register_module(test_module());
    let sp = m.registers().sp();
    assert_eq!(m.run(), MachineStatus::Completed);
    assert_eq!(m.gpr(2).u64(), 99);
    assert_eq!(m.gpr(3).u64(), 1);
    assert_eq!(m.call_depth(), 1);
    assert_eq!(m.registers().sp(), sp);
}

#[test]
fn nested_fault_stops_the_outer_run() {
    let mut m = machine(|b| {
        nested_program(b, |b| {
            b.inst(Opcode::DivsQ, &[Ea::Gpr(2), Ea::Immediate(0)]);
        });
    });
    m.register_module(test_module());
    assert_eq!(m.run(), MachineStatus::ZeroDivide);
    assert_eq!(m.gpr(3).u64(), 0);
    let record = m.fault().expect("fault should be recorded");
    assert_eq!(record.offset, 5);
    assert_eq!(record.opcode, Opcode::DivsQ.byte());
}

#[test]
fn invoke_from_the_host_side_restores_state() {
    let mut m = machine(|b| {
        nested_program(b, |b| {
            b.inst(Opcode::MoveQ, &[Ea::Gpr(2), Ea::Immediate(7)]);
        });
    });
    let status = unsafe { m.invoke(5) }.expect("entry should be valid");
    assert_eq!(status, MachineStatus::Completed);
    assert_eq!(m.status(), MachineStatus::Initialised);
    assert_eq!(m.cursor(), 0);
    assert_eq!(m.call_depth(), 1);
    assert_eq!(m.gpr(2).u64(), 7);
    assert!(unsafe { m.invoke(10_000) }.is_err());
}

#[test]
fn mem_module_round_trip() {
    let m = run_with_mem(|b| {
        select(b, FN_MEM_ELEMENT_BUFFER_ALLOC as u64);
        b.inst(Opcode::MoveQ, &[Ea::Gpr(1), Ea::Immediate(4)]);
        b.inst(Opcode::MoveQ, &[Ea::Gpr(2), Ea::Immediate(20)]);
        b.host(MODULE_MEM);
        b.inst(Opcode::MoveQ, &[Ea::Gpr(11), Ea::Gpr(0)]);

        select(b, FN_MEM_ELEMENT_ALLOC_SLOT as u64);
        b.host(MODULE_MEM);
        b.inst(Opcode::MoveQ, &[Ea::Indirect(9), Ea::Immediate(0xABCD)]);
        b.inst(Opcode::MoveQ, &[Ea::Gpr(10), Ea::Indirect(9)]);

        select(b, FN_MEM_ELEMENT_BUFFER_INFO as u64);
        b.host(MODULE_MEM);

        select(b, FN_MEM_ELEMENT_FREE_SLOT as u64);
        b.host(MODULE_MEM);
        b.inst(Opcode::MoveQ, &[Ea::Gpr(12), Ea::Gpr(0)]);

        b.inst(Opcode::MoveQ, &[Ea::Gpr(13), Ea::Gpr(8)]);
        select(b, FN_MEM_ELEMENT_BUFFER_FREE as u64);
        b.host(MODULE_MEM);
        b.inst(Opcode::MoveQ, &[Ea::Gpr(14), Ea::Gpr(0)]);

        // A second free of the same handle is rejected.
        b.inst(Opcode::MoveQ, &[Ea::Gpr(8), Ea::Gpr(13)]);
        select(b, FN_MEM_ELEMENT_BUFFER_FREE as u64);
        b.host(MODULE_MEM);
        b.stop();
    });
    assert_eq!(m.status(), MachineStatus::Completed);
    assert_eq!(m.gpr(11).u64(), ERR_NONE);
    assert_eq!(m.gpr(10).u64(), 0xABCD);
    // Count rounds up to a bitmap word, size to 8 bytes.
    assert_eq!(m.gpr(1).u64(), 64);
    assert_eq!(m.gpr(2).u64(), 24);
    assert_eq!(m.gpr(12).u64(), ERR_NONE);
    assert_eq!(m.gpr(9).u64(), 0);
    assert_eq!(m.gpr(14).u64(), ERR_NONE);
    assert_eq!(m.gpr(0).u64(), ERR_INVALID_HANDLE);
}

#[test]
fn mem_module_rejects_null_buffer() {
    let m = run_with_mem(|b| {
        select(b, FN_MEM_ELEMENT_ALLOC_SLOT as u64);
        b.host(MODULE_MEM);
        b.stop();
    });
    assert_eq!(m.status(), MachineStatus::Completed);
    assert_eq!(m.gpr(0).u64(), ERR_NULL_PTR);
}
