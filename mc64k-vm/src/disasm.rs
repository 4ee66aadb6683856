use std::fmt::Write;

use crate::condition::{OperandType, decode_dyadic, decode_monadic};
use crate::ea::Ea;
use crate::opcode::{Opcode, Shape};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisasmError {
    OutOfRange(usize),
    Truncated { offset: usize, opcode: Opcode },
}

impl std::fmt::Display for DisasmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisasmError::OutOfRange(offset) => write!(f, "offset {offset:#06x} outside code"),
            DisasmError::Truncated { offset, opcode } => {
                write!(f, "truncated {opcode} instruction at offset {offset:#06x}")
            }
        }
    }
}

impl std::error::Error for DisasmError {}

/// One listing line per instruction, `offset: mnemonic operands`. Bytes that
/// are not opcodes are listed as `.byte`.
pub fn disassemble(code: &[u8]) -> Result<String, DisasmError> {
    let mut out = String::new();
    let mut offset = 0;
    while offset < code.len() {
        let (text, len) = disassemble_one(code, offset)?;
        let _ = writeln!(out, "{offset:04x}: {text}");
        offset += len;
    }
    Ok(out)
}

/// Decodes the instruction at `offset`, returning its text and length.
pub fn disassemble_one(code: &[u8], offset: usize) -> Result<(String, usize), DisasmError> {
    let byte = *code.get(offset).ok_or(DisasmError::OutOfRange(offset))?;
    let Some(opcode) = Opcode::from_byte(byte) else {
        return Ok((format!(".byte {byte:#04x}"), 1));
    };
    let mut reader = Reader {
        code,
        cursor: offset + 1,
        start: offset,
        opcode,
    };
    let operands = reader.operands()?;
    let text = if operands.is_empty() {
        opcode.mnemonic().to_string()
    } else {
        format!("{} {}", opcode.mnemonic(), operands.join(", "))
    };
    Ok((text, reader.cursor - offset))
}

struct Reader<'a> {
    code: &'a [u8],
    cursor: usize,
    start: usize,
    opcode: Opcode,
}

impl Reader<'_> {
    fn truncated(&self) -> DisasmError {
        DisasmError::Truncated {
            offset: self.start,
            opcode: self.opcode,
        }
    }

    fn take(&mut self, len: usize) -> Result<&[u8], DisasmError> {
        let end = self.cursor + len;
        if end > self.code.len() {
            return Err(self.truncated());
        }
        let bytes = &self.code[self.cursor..end];
        self.cursor = end;
        Ok(bytes)
    }

    fn byte(&mut self) -> Result<u8, DisasmError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, DisasmError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn ea(&mut self, size: usize) -> Result<String, DisasmError> {
        let (ea, len) =
            Ea::parse(&self.code[self.cursor..], size).ok_or_else(|| self.truncated())?;
        self.cursor += len;
        Ok(ea.to_string())
    }

    /// Branch displacement rendered as the absolute target offset.
    fn target(&mut self) -> Result<String, DisasmError> {
        let disp = self.u32()? as i32;
        let target = self.cursor as i64 + disp as i64;
        Ok(format!("{target:#06x}"))
    }

    fn operands(&mut self) -> Result<Vec<String>, DisasmError> {
        Ok(match self.opcode.shape() {
            Shape::None => Vec::new(),
            Shape::Module => {
                let module = self.byte()?;
                let name = host_abi::module_by_id(module).map_or("?", |m| m.name);
                vec![format!("#{module} ({name})")]
            }
            Shape::Branch => vec![self.target()?],
            Shape::Target => vec![self.ea(8)?],
            Shape::Monadic => {
                let cond = self.byte()?;
                let (text, size) = monadic(cond);
                vec![text, self.ea(size)?, self.target()?]
            }
            Shape::Dyadic => {
                let cond = self.byte()?;
                let (text, size) = dyadic(cond);
                vec![text, self.ea(size)?, self.ea(size)?, self.target()?]
            }
            Shape::Counter => vec![self.ea(4)?, self.target()?],
            Shape::SetMonadic => {
                let cond = self.byte()?;
                let (text, size) = monadic(cond);
                vec![text, self.ea(1)?, self.ea(size)?]
            }
            Shape::SetDyadic => {
                let cond = self.byte()?;
                let (text, size) = dyadic(cond);
                vec![text, self.ea(1)?, self.ea(size)?, self.ea(size)?]
            }
            Shape::Unary(size) => vec![self.ea(size)?],
            Shape::Binary(dst, src) => vec![self.ea(dst)?, self.ea(src)?],
            Shape::RegPair => {
                let pair = self.byte()?;
                let prefix = if self.opcode == Opcode::Fexg { "fp" } else { "r" };
                vec![
                    format!("{prefix}{}", pair >> 4),
                    format!("{prefix}{}", pair & 0x0F),
                ]
            }
            Shape::Mask => {
                let mask = self.u32()?;
                let size = 8 * mask.count_ones() as usize;
                vec![format!("#{mask:#010x}"), self.ea(size)?]
            }
            Shape::Link => {
                let reg = self.byte()?;
                let disp = self.u32()? as i32;
                vec![format!("r{}", reg & 0x0F), format!("#{disp}")]
            }
            Shape::Register => vec![format!("r{}", self.byte()? & 0x0F)],
        })
    }
}

fn monadic(cond: u8) -> (String, usize) {
    match decode_monadic(cond) {
        Some((ty, cc)) => (format!("{}.{}", cc.name(), ty.suffix()), ty.size()),
        None => (format!("?{cond:#04x}"), fallback_size(cond)),
    }
}

fn dyadic(cond: u8) -> (String, usize) {
    match decode_dyadic(cond) {
        Some((ty, cc)) => (format!("{}.{}", cc.name(), ty.suffix()), ty.size()),
        None => (format!("?{cond:#04x}"), fallback_size(cond)),
    }
}

fn fallback_size(cond: u8) -> usize {
    OperandType::from_nibble(cond >> 4).map_or(8, OperandType::size)
}
