mod control;
mod data;
mod decode;
mod dispatch;
mod float;
mod integer;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::host::{HostModule, HostTable};
use crate::image::Image;
use crate::region::Region;
use crate::registers::{Register, RegisterFile};
use crate::snapshot::MachineSnapshot;

pub use decode::Location;
pub use dispatch::Flow;

pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MachineStatus {
    Uninitialised,
    Initialised,
    Running,
    Completed,
    UnimplementedOpcode,
    UnknownHostCall,
    ZeroDivide,
    CursorOutOfRange,
    StackOverflow,
}

impl MachineStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            MachineStatus::Uninitialised | MachineStatus::Initialised | MachineStatus::Running
        )
    }

    pub fn is_fault(self) -> bool {
        self.is_terminal() && self != MachineStatus::Completed
    }
}

impl std::fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            MachineStatus::Uninitialised => "uninitialised",
            MachineStatus::Initialised => "initialised",
            MachineStatus::Running => "running",
            MachineStatus::Completed => "completed",
            MachineStatus::UnimplementedOpcode => "unimplemented opcode",
            MachineStatus::UnknownHostCall => "unknown host call",
            MachineStatus::ZeroDivide => "zero divide",
            MachineStatus::CursorOutOfRange => "cursor out of range",
            MachineStatus::StackOverflow => "stack overflow",
        };
        f.write_str(text)
    }
}

/// Why a run stopped with a fault status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    InvalidOpcode(u8),
    /// An operand decoded to no address. `mode` is the offending mode byte.
    NullAddress { mode: u8 },
    BadCondition(u8),
    UnknownHostCall { module: u8, function: u16 },
    ZeroDivide,
    CursorOutOfRange(u64),
    /// A push would move `sp` below the machine's stack region.
    StackOverflow(u64),
}

impl Fault {
    pub fn status(self) -> MachineStatus {
        match self {
            Fault::InvalidOpcode(_) | Fault::NullAddress { .. } | Fault::BadCondition(_) => {
                MachineStatus::UnimplementedOpcode
            }
            Fault::UnknownHostCall { .. } => MachineStatus::UnknownHostCall,
            Fault::ZeroDivide => MachineStatus::ZeroDivide,
            Fault::CursorOutOfRange(_) => MachineStatus::CursorOutOfRange,
            Fault::StackOverflow(_) => MachineStatus::StackOverflow,
        }
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Fault::InvalidOpcode(byte) => write!(f, "invalid opcode {byte:#04x}"),
            Fault::NullAddress { mode } => {
                write!(f, "effective address mode {mode:#04x} resolved to null")
            }
            Fault::BadCondition(byte) => write!(f, "invalid condition {byte:#04x}"),
            Fault::UnknownHostCall { module, function } => {
                write!(f, "unknown host call {module}:{function}")
            }
            Fault::ZeroDivide => write!(f, "integer division by zero"),
            Fault::CursorOutOfRange(address) => {
                write!(f, "program cursor {address:#x} outside code")
            }
            Fault::StackOverflow(sp) => {
                write!(f, "push at stack pointer {sp:#x} overruns the stack base")
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaultRecord {
    pub fault: Fault,
    /// Code offset of the faulting instruction's opcode byte.
    pub offset: usize,
    pub opcode: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MachineError {
    EntryOutOfRange { entry: usize, len: usize },
    StackAllocation { size: usize },
}

impl std::fmt::Display for MachineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MachineError::EntryOutOfRange { entry, len } => {
                write!(f, "entry offset {entry} outside code of {len} bytes")
            }
            MachineError::StackAllocation { size } => {
                write!(f, "cannot allocate a stack of {size} bytes")
            }
        }
    }
}

impl std::error::Error for MachineError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MachineConfig {
    pub stack_size: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

pub struct Machine {
    registers: RegisterFile,
    code: Region,
    stack: Region,
    cursor: usize,
    call_depth: i64,
    status: MachineStatus,
    host: HostTable,
    fault: Option<FaultRecord>,
    // Per-instruction decode state.
    opcode: u8,
    opcode_offset: usize,
    mode: u8,
    dst: Option<Location>,
}

impl Machine {
    pub fn new(image: &Image) -> Self {
        Self::from_regions(
            Region::from_bytes(image.code()),
            Region::zeroed(DEFAULT_STACK_SIZE),
        )
    }

    pub fn with_config(image: &Image, config: MachineConfig) -> Result<Self, MachineError> {
        let stack = Region::try_zeroed(config.stack_size).ok_or(MachineError::StackAllocation {
            size: config.stack_size,
        })?;
        Ok(Self::from_regions(Region::from_bytes(image.code()), stack))
    }

    fn from_regions(code: Region, stack: Region) -> Self {
        let mut registers = RegisterFile::new();
        registers.set_sp(stack.address() + stack.len() as u64);
        Self {
            registers,
            code,
            stack,
            cursor: 0,
            call_depth: 0,
            status: MachineStatus::Uninitialised,
            host: HostTable::default(),
            fault: None,
            opcode: 0,
            opcode_offset: 0,
            mode: 0,
            dst: None,
        }
    }

    /// Registers a host module, returning the one it replaces.
    pub fn register_module(&mut self, module: HostModule) -> Option<HostModule> {
        self.host.register(module)
    }

    pub fn host_table(&self) -> &HostTable {
        &self.host
    }

    /// Positions the cursor at `entry` and resets the call depth.
    ///
    /// # Safety
    /// Running the program dereferences whatever addresses it computes. The
    /// caller must ensure the code reached from `entry` only accesses memory
    /// that is valid for those reads and writes.
    pub unsafe fn enter(&mut self, entry: usize) -> Result<(), MachineError> {
        self.check_entry(entry)?;
        self.cursor = entry;
        self.call_depth = 1;
        self.status = MachineStatus::Initialised;
        self.fault = None;
        debug!(entry, "machine entered");
        Ok(())
    }

    /// Runs until the program completes or faults. Returns immediately if the
    /// machine was never entered or has already stopped.
    pub fn run(&mut self) -> MachineStatus {
        if !matches!(
            self.status,
            MachineStatus::Initialised | MachineStatus::Running
        ) {
            return self.status;
        }
        self.status = MachineStatus::Running;
        self.execute();
        debug!(status = %self.status, cursor = self.cursor, "run finished");
        self.status
    }

    /// Executes a single instruction.
    pub fn step(&mut self) -> MachineStatus {
        if !matches!(
            self.status,
            MachineStatus::Initialised | MachineStatus::Running
        ) {
            return self.status;
        }
        self.status = MachineStatus::Running;
        trace!(cursor = self.cursor, "step");
        if let Err(fault) = dispatch::step(self) {
            self.raise(fault);
        }
        self.status
    }

    /// Runs a nested program from `entry` on the same register file, then
    /// restores cursor, call depth and status. A fault in the nested run is
    /// left in the status so an enclosing run stops too.
    ///
    /// # Safety
    /// Same contract as [`Machine::enter`].
    pub unsafe fn invoke(&mut self, entry: usize) -> Result<MachineStatus, MachineError> {
        self.check_entry(entry)?;
        let cursor = self.cursor;
        let call_depth = self.call_depth;
        let status = self.status;
        let (opcode, opcode_offset, mode, dst) =
            (self.opcode, self.opcode_offset, self.mode, self.dst);
        debug!(entry, depth = call_depth, "nested invoke");

        self.cursor = entry;
        self.call_depth = 1;
        self.status = MachineStatus::Running;
        self.execute();
        let result = self.status;

        self.cursor = cursor;
        self.call_depth = call_depth;
        self.opcode = opcode;
        self.opcode_offset = opcode_offset;
        self.mode = mode;
        self.dst = dst;
        if result == MachineStatus::Completed {
            self.status = status;
        }
        debug!(status = %result, "nested invoke finished");
        Ok(result)
    }

    pub fn status(&self) -> MachineStatus {
        self.status
    }

    /// Forces the status, e.g. from a host vector that wants the run to stop.
    pub fn set_status(&mut self, status: MachineStatus) {
        self.status = status;
    }

    pub fn fault(&self) -> Option<FaultRecord> {
        self.fault
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.registers
    }

    pub fn gpr(&self, index: usize) -> &Register {
        self.registers.gpr(index)
    }

    pub fn gpr_mut(&mut self, index: usize) -> &mut Register {
        self.registers.gpr_mut(index)
    }

    pub fn fpr(&self, index: usize) -> &Register {
        self.registers.fpr(index)
    }

    pub fn fpr_mut(&mut self, index: usize) -> &mut Register {
        self.registers.fpr_mut(index)
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn call_depth(&self) -> i64 {
        self.call_depth
    }

    pub fn code(&self) -> &[u8] {
        self.code.as_slice()
    }

    /// Raw address of code offset `offset`.
    pub fn code_address(&self, offset: usize) -> u64 {
        self.code.address() + offset as u64
    }

    /// Code offset of a raw address, if it lies inside the code region.
    pub fn code_offset(&self, address: u64) -> Option<usize> {
        self.code.offset_of(address, 1)
    }

    pub fn stack_base(&self) -> u64 {
        self.stack.address()
    }

    pub fn stack_top(&self) -> u64 {
        self.stack.address() + self.stack.len() as u64
    }

    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot::capture(self)
    }

    fn check_entry(&self, entry: usize) -> Result<(), MachineError> {
        if entry >= self.code.len() {
            return Err(MachineError::EntryOutOfRange {
                entry,
                len: self.code.len(),
            });
        }
        Ok(())
    }

    fn execute(&mut self) {
        dispatch::run_loop::<{ dispatch::JUMP_TABLE }, { dispatch::FAST_CONTINUE }>(self);
    }

    pub(crate) fn raise(&mut self, fault: Fault) {
        warn!(
            offset = self.opcode_offset,
            opcode = self.opcode,
            "machine fault: {fault}"
        );
        self.fault = Some(FaultRecord {
            fault,
            offset: self.opcode_offset,
            opcode: self.opcode,
        });
        self.status = fault.status();
    }
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("status", &self.status)
            .field("cursor", &self.cursor)
            .field("call_depth", &self.call_depth)
            .field("code", &self.code)
            .field("stack", &self.stack)
            .finish_non_exhaustive()
    }
}
