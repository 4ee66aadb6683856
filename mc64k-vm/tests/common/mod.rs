#![allow(dead_code, unused_imports)]

pub use mc64k::condition::{Dyadic, Monadic, OperandType, dyadic, monadic};
pub use mc64k::{
    BytecodeBuilder, Ea, Fault, HostModule, Image, Machine, MachineStatus, Opcode, host,
};

/// Builds a program with `build`, loads it and enters at offset 0.
pub fn machine(build: impl FnOnce(&mut BytecodeBuilder)) -> Machine {
    let mut builder = BytecodeBuilder::new();
    build(&mut builder);
    let code = builder.finish().expect("program should assemble");
    let mut machine = Machine::new(&Image::from_code(code));
    unsafe { machine.enter(0) }.expect("entry should be valid");
    machine
}

/// Builds and runs a program to completion or fault.
pub fn run(build: impl FnOnce(&mut BytecodeBuilder)) -> Machine {
    let mut machine = machine(build);
    machine.run();
    machine
}

/// Like [`run`] with the `mem` host module registered.
pub fn run_with_mem(build: impl FnOnce(&mut BytecodeBuilder)) -> Machine {
    let mut machine = machine(build);
    machine.register_module(host::mem::module());
    machine.run();
    machine
}

pub fn fault_of(machine: &Machine) -> Option<Fault> {
    machine.fault().map(|record| record.fault)
}
