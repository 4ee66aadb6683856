//! Effective-address encodings.
//!
//! A mode byte carries the addressing mode in its high nibble and a register
//! (or mode detail) in its low nibble. Some modes are followed by extension
//! bytes: a 4-byte little-endian displacement, an index descriptor byte, an
//! immediate of the operation size or an 8-byte absolute address.

pub const MODE_GPR: u8 = 0x0;
pub const MODE_INDIRECT: u8 = 0x1;
pub const MODE_POST_INC: u8 = 0x2;
pub const MODE_POST_DEC: u8 = 0x3;
pub const MODE_PRE_INC: u8 = 0x4;
pub const MODE_PRE_DEC: u8 = 0x5;
pub const MODE_DISP: u8 = 0x6;
pub const MODE_INDEX: u8 = 0x7;
pub const MODE_INDEX_DISP: u8 = 0x8;
pub const MODE_FPR: u8 = 0x9;
pub const MODE_SAME_AS_DEST: u8 = 0xA;
pub const MODE_PC_DISP: u8 = 0xB;
pub const MODE_PC_INDEX: u8 = 0xC;
pub const MODE_PC_INDEX_DISP: u8 = 0xD;
pub const MODE_RESERVED: u8 = 0xE;
pub const MODE_OTHER: u8 = 0xF;

pub const OTHER_IMMEDIATE: u8 = 0x0;
pub const OTHER_ABSOLUTE: u8 = 0x1;

pub const DISP_SIZE: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum IndexWidth {
    Byte = 0,
    Word = 1,
    Long = 2,
    Quad = 3,
}

impl IndexWidth {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0 => IndexWidth::Byte,
            1 => IndexWidth::Word,
            2 => IndexWidth::Long,
            _ => IndexWidth::Quad,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            IndexWidth::Byte => "b",
            IndexWidth::Word => "w",
            IndexWidth::Long => "l",
            IndexWidth::Quad => "q",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ea {
    Gpr(u8),
    Indirect(u8),
    PostInc(u8),
    PostDec(u8),
    PreInc(u8),
    PreDec(u8),
    Disp(u8, i32),
    Index {
        base: u8,
        index: u8,
        width: IndexWidth,
        scale: u8,
    },
    IndexDisp {
        base: u8,
        index: u8,
        width: IndexWidth,
        scale: u8,
        disp: i32,
    },
    Fpr(u8),
    SameAsDest,
    PcDisp(i32),
    /// PC-relative reference to a builder label, encoded as `PcDisp`.
    PcLabel(String),
    PcIndex {
        mode: u8,
        descriptor: u8,
        disp: Option<i32>,
    },
    Immediate(u64),
    Absolute(u64),
    Reserved(u8),
}

impl Ea {
    pub fn imm_f32(value: f32) -> Self {
        Ea::Immediate(value.to_bits() as u64)
    }

    pub fn imm_f64(value: f64) -> Self {
        Ea::Immediate(value.to_bits())
    }

    pub fn imm_i64(value: i64) -> Self {
        Ea::Immediate(value as u64)
    }

    pub fn pc_label(name: &str) -> Self {
        Ea::PcLabel(name.to_string())
    }

    /// Appends the encoding for an operand of `size` bytes.
    pub fn encode(&self, size: usize, out: &mut Vec<u8>) {
        match self {
            Ea::Gpr(reg) => out.push(mode_byte(MODE_GPR, *reg)),
            Ea::Indirect(reg) => out.push(mode_byte(MODE_INDIRECT, *reg)),
            Ea::PostInc(reg) => out.push(mode_byte(MODE_POST_INC, *reg)),
            Ea::PostDec(reg) => out.push(mode_byte(MODE_POST_DEC, *reg)),
            Ea::PreInc(reg) => out.push(mode_byte(MODE_PRE_INC, *reg)),
            Ea::PreDec(reg) => out.push(mode_byte(MODE_PRE_DEC, *reg)),
            Ea::Disp(reg, disp) => {
                out.push(mode_byte(MODE_DISP, *reg));
                out.extend_from_slice(&disp.to_le_bytes());
            }
            Ea::Index {
                base,
                index,
                width,
                scale,
            } => {
                out.push(index_mode_byte(MODE_INDEX, *width, *scale));
                out.push(index_descriptor(*base, *index));
            }
            Ea::IndexDisp {
                base,
                index,
                width,
                scale,
                disp,
            } => {
                out.push(index_mode_byte(MODE_INDEX_DISP, *width, *scale));
                out.push(index_descriptor(*base, *index));
                out.extend_from_slice(&disp.to_le_bytes());
            }
            Ea::Fpr(reg) => out.push(mode_byte(MODE_FPR, *reg)),
            Ea::SameAsDest => out.push(mode_byte(MODE_SAME_AS_DEST, 0)),
            Ea::PcDisp(disp) => {
                out.push(mode_byte(MODE_PC_DISP, 0));
                out.extend_from_slice(&disp.to_le_bytes());
            }
            Ea::PcLabel(_) => {
                out.push(mode_byte(MODE_PC_DISP, 0));
                out.extend_from_slice(&[0; DISP_SIZE]);
            }
            Ea::PcIndex {
                mode,
                descriptor,
                disp,
            } => {
                let kind = if disp.is_some() {
                    MODE_PC_INDEX_DISP
                } else {
                    MODE_PC_INDEX
                };
                out.push(mode_byte(kind, *mode));
                out.push(*descriptor);
                if let Some(disp) = disp {
                    out.extend_from_slice(&disp.to_le_bytes());
                }
            }
            Ea::Immediate(value) => {
                out.push(mode_byte(MODE_OTHER, OTHER_IMMEDIATE));
                let bytes = value.to_le_bytes();
                let len = size.min(bytes.len());
                out.extend_from_slice(&bytes[..len]);
                // Keep the stream length in step with `extension_len`.
                out.extend(std::iter::repeat_n(0u8, size - len));
            }
            Ea::Absolute(address) => {
                out.push(mode_byte(MODE_OTHER, OTHER_ABSOLUTE));
                out.extend_from_slice(&address.to_le_bytes());
            }
            Ea::Reserved(byte) => out.push(*byte),
        }
    }

    /// Parses one operand of `size` bytes from the front of `bytes`, returning
    /// the operand and the number of bytes it occupies.
    pub fn parse(bytes: &[u8], size: usize) -> Option<(Ea, usize)> {
        let mode = *bytes.first()?;
        let len = 1 + extension_len(mode, size);
        if bytes.len() < len {
            return None;
        }
        let reg = mode & 0x0F;
        let disp_at = |at: usize| i32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let ea = match mode >> 4 {
            MODE_GPR => Ea::Gpr(reg),
            MODE_INDIRECT => Ea::Indirect(reg),
            MODE_POST_INC => Ea::PostInc(reg),
            MODE_POST_DEC => Ea::PostDec(reg),
            MODE_PRE_INC => Ea::PreInc(reg),
            MODE_PRE_DEC => Ea::PreDec(reg),
            MODE_DISP => Ea::Disp(reg, disp_at(1)),
            MODE_INDEX | MODE_INDEX_DISP => {
                let descriptor = bytes[1];
                let base = descriptor & 0x0F;
                let index = descriptor >> 4;
                let width = IndexWidth::from_bits(reg);
                let scale = (reg >> 2) & 0x3;
                if mode >> 4 == MODE_INDEX {
                    Ea::Index {
                        base,
                        index,
                        width,
                        scale,
                    }
                } else {
                    Ea::IndexDisp {
                        base,
                        index,
                        width,
                        scale,
                        disp: disp_at(2),
                    }
                }
            }
            MODE_FPR => Ea::Fpr(reg),
            MODE_SAME_AS_DEST => Ea::SameAsDest,
            MODE_PC_DISP => Ea::PcDisp(disp_at(1)),
            MODE_PC_INDEX => Ea::PcIndex {
                mode: reg,
                descriptor: bytes[1],
                disp: None,
            },
            MODE_PC_INDEX_DISP => Ea::PcIndex {
                mode: reg,
                descriptor: bytes[1],
                disp: Some(disp_at(2)),
            },
            MODE_OTHER if reg == OTHER_IMMEDIATE => {
                let mut raw = [0u8; 8];
                let take = size.min(8);
                raw[..take].copy_from_slice(&bytes[1..1 + take]);
                Ea::Immediate(u64::from_le_bytes(raw))
            }
            MODE_OTHER if reg == OTHER_ABSOLUTE => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&bytes[1..9]);
                Ea::Absolute(u64::from_le_bytes(raw))
            }
            _ => Ea::Reserved(mode),
        };
        Some((ea, len))
    }
}

/// Number of bytes following `mode` for an operand of `size` bytes.
pub fn extension_len(mode: u8, size: usize) -> usize {
    match mode >> 4 {
        MODE_DISP | MODE_PC_DISP => DISP_SIZE,
        MODE_INDEX | MODE_PC_INDEX => 1,
        MODE_INDEX_DISP | MODE_PC_INDEX_DISP => 1 + DISP_SIZE,
        MODE_OTHER => match mode & 0x0F {
            OTHER_IMMEDIATE => size,
            OTHER_ABSOLUTE => 8,
            _ => 0,
        },
        _ => 0,
    }
}

fn mode_byte(mode: u8, low: u8) -> u8 {
    (mode << 4) | (low & 0x0F)
}

fn index_mode_byte(mode: u8, width: IndexWidth, scale: u8) -> u8 {
    mode_byte(mode, (width as u8) | ((scale & 0x3) << 2))
}

fn index_descriptor(base: u8, index: u8) -> u8 {
    (base & 0x0F) | ((index & 0x0F) << 4)
}

fn reg_name(reg: u8) -> String {
    if reg as usize == crate::registers::REG_SP {
        "sp".to_string()
    } else {
        format!("r{reg}")
    }
}

impl std::fmt::Display for Ea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ea::Gpr(reg) => write!(f, "{}", reg_name(*reg)),
            Ea::Indirect(reg) => write!(f, "({})", reg_name(*reg)),
            Ea::PostInc(reg) => write!(f, "({})+", reg_name(*reg)),
            Ea::PostDec(reg) => write!(f, "({})-", reg_name(*reg)),
            Ea::PreInc(reg) => write!(f, "+({})", reg_name(*reg)),
            Ea::PreDec(reg) => write!(f, "-({})", reg_name(*reg)),
            Ea::Disp(reg, disp) => write!(f, "{disp}({})", reg_name(*reg)),
            Ea::Index {
                base,
                index,
                width,
                scale,
            } => write!(
                f,
                "({}, {}.{}*{})",
                reg_name(*base),
                reg_name(*index),
                width.suffix(),
                1u8 << scale
            ),
            Ea::IndexDisp {
                base,
                index,
                width,
                scale,
                disp,
            } => write!(
                f,
                "{disp}({}, {}.{}*{})",
                reg_name(*base),
                reg_name(*index),
                width.suffix(),
                1u8 << scale
            ),
            Ea::Fpr(reg) => write!(f, "fp{reg}"),
            Ea::SameAsDest => write!(f, "="),
            Ea::PcDisp(disp) => write!(f, "{disp}(pc)"),
            Ea::PcLabel(label) => write!(f, "{label}(pc)"),
            Ea::PcIndex {
                mode,
                descriptor,
                disp,
            } => match disp {
                Some(disp) => write!(f, "<pc-index {mode:#x} {descriptor:#04x} {disp}>"),
                None => write!(f, "<pc-index {mode:#x} {descriptor:#04x}>"),
            },
            Ea::Immediate(value) => write!(f, "#{value:#x}"),
            Ea::Absolute(address) => write!(f, "[{address:#x}]"),
            Ea::Reserved(mode) => write!(f, "<reserved {mode:#04x}>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_parse_keeps_length() {
        let cases = [
            (Ea::Gpr(3), 8, 1),
            (Ea::Indirect(15), 8, 1),
            (Ea::Disp(2, -16), 4, 5),
            (
                Ea::IndexDisp {
                    base: 1,
                    index: 2,
                    width: IndexWidth::Word,
                    scale: 3,
                    disp: 40,
                },
                1,
                6,
            ),
            (Ea::Immediate(0x2A), 2, 3),
            (Ea::Absolute(0x1000), 4, 9),
        ];
        for (ea, size, len) in cases {
            let mut out = Vec::new();
            ea.encode(size, &mut out);
            assert_eq!(out.len(), len, "{ea}");
            assert_eq!(Ea::parse(&out, size), Some((ea, len)));
        }
    }

    #[test]
    fn parse_rejects_truncated_extension() {
        assert_eq!(Ea::parse(&[0x61, 0x00, 0x00], 8), None);
        assert_eq!(Ea::parse(&[], 8), None);
    }

    #[test]
    fn display_uses_assembler_syntax() {
        let ea = Ea::Index {
            base: 15,
            index: 4,
            width: IndexWidth::Long,
            scale: 2,
        };
        assert_eq!(ea.to_string(), "(sp, r4.l*4)");
        assert_eq!(Ea::PreDec(15).to_string(), "-(sp)");
        assert_eq!(Ea::Immediate(42).to_string(), "#0x2a");
    }
}
