use crate::disasm::disassemble_one;
use crate::machine::Machine;
use crate::opcode::Opcode;

/// Describes the last fault with its location and the faulting instruction.
pub fn render_fault(machine: &Machine) -> Option<String> {
    let record = machine.fault()?;
    let mut out = format!("machine fault: {} [{}]", record.fault, machine.status());
    let mnemonic = Opcode::from_byte(record.opcode)
        .map_or_else(|| format!("{:#04x}", record.opcode), |op| op.to_string());
    out.push_str(&format!("\nat offset {:#06x} ({mnemonic})", record.offset));
    if let Ok((text, _)) = disassemble_one(machine.code(), record.offset) {
        out.push_str(&format!("\n  | {text}"));
    }
    Some(out)
}
