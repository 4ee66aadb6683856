pub mod builder;
pub mod condition;
pub mod diagnostics;
pub mod disasm;
pub mod ea;
pub mod element_buffer;
pub mod host;
pub mod image;
#[cfg(feature = "cli")]
pub mod logging;
pub mod machine;
pub mod opcode;
pub mod region;
pub mod registers;
pub mod scalar;
pub mod snapshot;

pub use builder::{BuilderError, BytecodeBuilder};
pub use condition::{Dyadic, Monadic, OperandType};
pub use diagnostics::render_fault;
pub use disasm::{DisasmError, disassemble, disassemble_one};
pub use ea::{Ea, IndexWidth};
pub use element_buffer::{ElementBuffer, ElementBufferError, ElementBufferLayout};
pub use host::{HostModule, HostTable, HostVector};
pub use image::{Image, ImageError, encode_image};
#[cfg(feature = "cli")]
pub use logging::init as init_logging;
pub use machine::{
    Fault, FaultRecord, Flow, Location, Machine, MachineConfig, MachineError, MachineStatus,
};
pub use opcode::{Opcode, Shape};
pub use registers::{Register, RegisterFile};
pub use snapshot::MachineSnapshot;
