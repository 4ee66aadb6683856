use std::collections::HashMap;

use crate::condition::OperandType;
use crate::ea::{DISP_SIZE, Ea};
use crate::image::encode_image;
use crate::opcode::{Opcode, Shape};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuilderError {
    DuplicateLabel(String),
    UnknownLabel(String),
    OperandCount {
        opcode: Opcode,
        expected: usize,
        got: usize,
    },
    WrongShape(Opcode),
    DisplacementOverflow(String),
}

impl std::fmt::Display for BuilderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuilderError::DuplicateLabel(label) => write!(f, "duplicate label '{label}'"),
            BuilderError::UnknownLabel(label) => write!(f, "unknown label '{label}'"),
            BuilderError::OperandCount {
                opcode,
                expected,
                got,
            } => write!(f, "{opcode} takes {expected} operands, got {got}"),
            BuilderError::WrongShape(opcode) => {
                write!(f, "{opcode} needs its dedicated builder method")
            }
            BuilderError::DisplacementOverflow(label) => {
                write!(f, "label '{label}' is out of displacement range")
            }
        }
    }
}

impl std::error::Error for BuilderError {}

struct Fixup {
    at: usize,
    label: String,
}

/// Programmatic encoder. Displacements to labels are patched by `finish`,
/// which also reports the first error recorded while building.
pub struct BytecodeBuilder {
    code: Vec<u8>,
    labels: HashMap<String, usize>,
    fixups: Vec<Fixup>,
    error: Option<BuilderError>,
}

impl Default for BytecodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BytecodeBuilder {
    pub fn new() -> Self {
        Self {
            code: Vec::new(),
            labels: HashMap::new(),
            fixups: Vec::new(),
            error: None,
        }
    }

    pub fn position(&self) -> usize {
        self.code.len()
    }

    pub fn label(&mut self, name: &str) -> &mut Self {
        if self.labels.contains_key(name) {
            self.fail(BuilderError::DuplicateLabel(name.to_string()));
        } else {
            self.labels.insert(name.to_string(), self.code.len());
        }
        self
    }

    pub fn finish(mut self) -> Result<Vec<u8>, BuilderError> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        for fixup in self.fixups.drain(..) {
            let target = self
                .labels
                .get(&fixup.label)
                .copied()
                .ok_or_else(|| BuilderError::UnknownLabel(fixup.label.clone()))?;
            let disp = i32::try_from(target as i64 - (fixup.at + DISP_SIZE) as i64)
                .map_err(|_| BuilderError::DisplacementOverflow(fixup.label.clone()))?;
            self.code[fixup.at..fixup.at + DISP_SIZE].copy_from_slice(&disp.to_le_bytes());
        }
        Ok(self.code)
    }

    /// Finishes and prepends the image header.
    pub fn finish_image(self) -> Result<Vec<u8>, BuilderError> {
        Ok(encode_image(&self.finish()?))
    }

    pub fn bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.code.extend_from_slice(bytes);
        self
    }

    /// Emits an instruction whose operands are all effective addresses
    /// (`Unary`, `Binary` and `Target` shapes), destination first.
    pub fn inst(&mut self, opcode: Opcode, operands: &[Ea]) -> &mut Self {
        let sizes = match opcode.shape() {
            Shape::Unary(size) => vec![size],
            Shape::Binary(dst, src) => vec![dst, src],
            Shape::Target => vec![8],
            Shape::None => Vec::new(),
            _ => {
                self.fail(BuilderError::WrongShape(opcode));
                return self;
            }
        };
        if sizes.len() != operands.len() {
            self.fail(BuilderError::OperandCount {
                opcode,
                expected: sizes.len(),
                got: operands.len(),
            });
            return self;
        }
        self.emit_opcode(opcode);
        for (ea, size) in operands.iter().zip(sizes) {
            self.emit_ea(ea, size);
        }
        self
    }

    pub fn stop(&mut self) -> &mut Self {
        self.emit_opcode(Opcode::Stop);
        self
    }

    pub fn rts(&mut self) -> &mut Self {
        self.emit_opcode(Opcode::Rts);
        self
    }

    pub fn host(&mut self, module: u8) -> &mut Self {
        self.emit_opcode(Opcode::Host);
        self.code.push(module);
        self
    }

    pub fn bra(&mut self, label: &str) -> &mut Self {
        self.emit_opcode(Opcode::Bra);
        self.emit_fixup(label);
        self
    }

    pub fn bsr(&mut self, label: &str) -> &mut Self {
        self.emit_opcode(Opcode::Bsr);
        self.emit_fixup(label);
        self
    }

    pub fn jmp(&mut self, target: Ea) -> &mut Self {
        self.inst(Opcode::Jmp, &[target])
    }

    pub fn jsr(&mut self, target: Ea) -> &mut Self {
        self.inst(Opcode::Jsr, &[target])
    }

    pub fn pea(&mut self, address: Ea) -> &mut Self {
        self.inst(Opcode::Pea, &[address])
    }

    /// Branches to `label` if `ea` passes the monadic condition `cond`.
    pub fn bmc(&mut self, cond: u8, ea: Ea, label: &str) -> &mut Self {
        let size = condition_size(cond);
        self.emit_opcode(Opcode::Bmc);
        self.code.push(cond);
        self.emit_ea(&ea, size);
        self.emit_fixup(label);
        self
    }

    /// Branches to `label` if `a cond b`.
    pub fn bdc(&mut self, cond: u8, a: Ea, b: Ea, label: &str) -> &mut Self {
        let size = condition_size(cond);
        self.emit_opcode(Opcode::Bdc);
        self.code.push(cond);
        self.emit_ea(&a, size);
        self.emit_ea(&b, size);
        self.emit_fixup(label);
        self
    }

    pub fn dbnz(&mut self, counter: Ea, label: &str) -> &mut Self {
        self.emit_opcode(Opcode::Dbnz);
        self.emit_ea(&counter, 4);
        self.emit_fixup(label);
        self
    }

    pub fn smc(&mut self, cond: u8, dst: Ea, ea: Ea) -> &mut Self {
        let size = condition_size(cond);
        self.emit_opcode(Opcode::Smc);
        self.code.push(cond);
        self.emit_ea(&dst, 1);
        self.emit_ea(&ea, size);
        self
    }

    pub fn sdc(&mut self, cond: u8, dst: Ea, a: Ea, b: Ea) -> &mut Self {
        let size = condition_size(cond);
        self.emit_opcode(Opcode::Sdc);
        self.code.push(cond);
        self.emit_ea(&dst, 1);
        self.emit_ea(&a, size);
        self.emit_ea(&b, size);
        self
    }

    pub fn exg(&mut self, a: u8, b: u8) -> &mut Self {
        self.emit_opcode(Opcode::Exg);
        self.code.push(register_pair(a, b));
        self
    }

    pub fn fexg(&mut self, a: u8, b: u8) -> &mut Self {
        self.emit_opcode(Opcode::Fexg);
        self.code.push(register_pair(a, b));
        self
    }

    pub fn savem(&mut self, mask: u32, ea: Ea) -> &mut Self {
        self.emit_opcode(Opcode::Savem);
        self.code.extend_from_slice(&mask.to_le_bytes());
        self.emit_ea(&ea, 8 * mask.count_ones() as usize);
        self
    }

    pub fn loadm(&mut self, mask: u32, ea: Ea) -> &mut Self {
        self.emit_opcode(Opcode::Loadm);
        self.code.extend_from_slice(&mask.to_le_bytes());
        self.emit_ea(&ea, 8 * mask.count_ones() as usize);
        self
    }

    pub fn link(&mut self, reg: u8, disp: i32) -> &mut Self {
        self.emit_opcode(Opcode::Link);
        self.code.push(reg & 0x0F);
        self.code.extend_from_slice(&disp.to_le_bytes());
        self
    }

    pub fn unlk(&mut self, reg: u8) -> &mut Self {
        self.emit_opcode(Opcode::Unlk);
        self.code.push(reg & 0x0F);
        self
    }

    fn fail(&mut self, err: BuilderError) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn emit_opcode(&mut self, opcode: Opcode) {
        self.code.push(opcode.byte());
    }

    fn emit_ea(&mut self, ea: &Ea, size: usize) {
        ea.encode(size, &mut self.code);
        if let Ea::PcLabel(label) = ea {
            self.fixups.push(Fixup {
                at: self.code.len() - DISP_SIZE,
                label: label.clone(),
            });
        }
    }

    fn emit_fixup(&mut self, label: &str) {
        self.fixups.push(Fixup {
            at: self.code.len(),
            label: label.to_string(),
        });
        self.code.extend_from_slice(&[0; DISP_SIZE]);
    }
}

fn condition_size(cond: u8) -> usize {
    OperandType::from_nibble(cond >> 4).map_or(8, OperandType::size)
}

fn register_pair(a: u8, b: u8) -> u8 {
    ((a & 0x0F) << 4) | (b & 0x0F)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backward_and_forward_labels_resolve() {
        let mut b = BytecodeBuilder::new();
        b.label("top");
        b.bra("end");
        b.bra("top");
        b.label("end");
        b.stop();
        let code = b.finish().expect("labels should resolve");
        assert_eq!(&code[1..5], &5i32.to_le_bytes());
        assert_eq!(&code[6..10], &(-10i32).to_le_bytes());
    }

    #[test]
    fn pc_label_is_relative_to_end_of_displacement() {
        let mut b = BytecodeBuilder::new();
        b.inst(Opcode::Lea, &[Ea::Gpr(0), Ea::pc_label("data")]);
        b.stop();
        b.label("data");
        let code = b.finish().expect("label should resolve");
        // lea(1) dst(1) mode(1) disp(4) stop(1): data at 8, disp ends at 7.
        assert_eq!(&code[3..7], &1i32.to_le_bytes());
    }

    #[test]
    fn errors_surface_at_finish() {
        let mut b = BytecodeBuilder::new();
        b.label("a").label("a");
        assert_eq!(b.finish(), Err(BuilderError::DuplicateLabel("a".to_string())));

        let mut b = BytecodeBuilder::new();
        b.bra("nowhere");
        assert_eq!(b.finish(), Err(BuilderError::UnknownLabel("nowhere".to_string())));

        let mut b = BytecodeBuilder::new();
        b.inst(Opcode::AddQ, &[Ea::Gpr(0)]);
        assert_eq!(
            b.finish(),
            Err(BuilderError::OperandCount {
                opcode: Opcode::AddQ,
                expected: 2,
                got: 1
            })
        );

        let mut b = BytecodeBuilder::new();
        b.inst(Opcode::Bra, &[]);
        assert_eq!(b.finish(), Err(BuilderError::WrongShape(Opcode::Bra)));
    }
}
