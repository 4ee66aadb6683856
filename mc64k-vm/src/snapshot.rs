use serde::{Deserialize, Serialize};

use crate::machine::{Machine, MachineStatus};
use crate::registers::{FPR_COUNT, GPR_COUNT};

/// Externally visible machine state with registers as raw bit patterns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSnapshot {
    pub status: MachineStatus,
    pub cursor: usize,
    pub call_depth: i64,
    pub gpr: [u64; GPR_COUNT],
    pub fpr: [u64; FPR_COUNT],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
}

impl MachineSnapshot {
    pub fn capture(machine: &Machine) -> Self {
        let registers = machine.registers();
        Self {
            status: machine.status(),
            cursor: machine.cursor(),
            call_depth: machine.call_depth(),
            gpr: registers.gprs().map(|reg| reg.bits()),
            fpr: registers.fprs().map(|reg| reg.bits()),
            fault: machine.fault().map(|record| record.fault.to_string()),
        }
    }
}
