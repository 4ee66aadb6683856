/// Operand layout of an instruction, shared by the builder and disassembler.
///
/// `Unary(size)` and `Binary(dst, src)` carry operand sizes in bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    None,
    /// One module id byte.
    Module,
    /// 4-byte branch displacement.
    Branch,
    /// One quad-sized EA used for its address.
    Target,
    /// Condition byte, EA, displacement.
    Monadic,
    /// Condition byte, two EAs, displacement.
    Dyadic,
    /// Long EA, displacement.
    Counter,
    /// Condition byte, byte-sized destination EA, EA.
    SetMonadic,
    /// Condition byte, byte-sized destination EA, two EAs.
    SetDyadic,
    Unary(usize),
    Binary(usize, usize),
    /// One byte naming two registers, high nibble first.
    RegPair,
    /// 4-byte register mask, block-sized EA.
    Mask,
    /// Register byte, 4-byte displacement.
    Link,
    Register,
}

macro_rules! opcodes {
    ($($name:ident = $byte:literal, $mnemonic:literal, $shape:expr;)*) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $($name = $byte,)*
        }

        impl Opcode {
            pub const ALL: &'static [Opcode] = &[$(Opcode::$name,)*];

            pub const fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $($byte => Some(Opcode::$name),)*
                    _ => None,
                }
            }

            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$name => $mnemonic,)*
                }
            }

            pub fn shape(self) -> Shape {
                match self {
                    $(Opcode::$name => $shape,)*
                }
            }
        }
    };
}

opcodes! {
    Stop = 0x00, "stop", Shape::None;
    Host = 0x01, "host", Shape::Module;
    Bra = 0x02, "bra", Shape::Branch;
    Bsr = 0x03, "bsr", Shape::Branch;
    Jmp = 0x04, "jmp", Shape::Target;
    Jsr = 0x05, "jsr", Shape::Target;
    Rts = 0x06, "rts", Shape::None;
    Bmc = 0x07, "bmc", Shape::Monadic;
    Bdc = 0x08, "bdc", Shape::Dyadic;
    Dbnz = 0x09, "dbnz", Shape::Counter;
    Smc = 0x0a, "smc", Shape::SetMonadic;
    Sdc = 0x0b, "sdc", Shape::SetDyadic;
    MoveB = 0x0c, "move.b", Shape::Binary(1, 1);
    MoveW = 0x0d, "move.w", Shape::Binary(2, 2);
    MoveL = 0x0e, "move.l", Shape::Binary(4, 4);
    MoveQ = 0x0f, "move.q", Shape::Binary(8, 8);
    FmoveS = 0x10, "fmove.s", Shape::Binary(4, 4);
    FmoveD = 0x11, "fmove.d", Shape::Binary(8, 8);
    ClrB = 0x12, "clr.b", Shape::Unary(1);
    ClrW = 0x13, "clr.w", Shape::Unary(2);
    ClrL = 0x14, "clr.l", Shape::Unary(4);
    ClrQ = 0x15, "clr.q", Shape::Unary(8);
    Exg = 0x16, "exg", Shape::RegPair;
    Fexg = 0x17, "fexg", Shape::RegPair;
    Savem = 0x18, "savem", Shape::Mask;
    Loadm = 0x19, "loadm", Shape::Mask;
    Link = 0x1a, "link", Shape::Link;
    Unlk = 0x1b, "unlk", Shape::Register;
    Lea = 0x1c, "lea", Shape::Binary(8, 8);
    Pea = 0x1d, "pea", Shape::Target;
    ExtBW = 0x1e, "extb.w", Shape::Binary(2, 1);
    ExtBL = 0x1f, "extb.l", Shape::Binary(4, 1);
    ExtBQ = 0x20, "extb.q", Shape::Binary(8, 1);
    ExtWL = 0x21, "extw.l", Shape::Binary(4, 2);
    ExtWQ = 0x22, "extw.q", Shape::Binary(8, 2);
    ExtLQ = 0x23, "extl.q", Shape::Binary(8, 4);
    FmoveBS = 0x24, "fmoveb.s", Shape::Binary(4, 1);
    FmoveBD = 0x25, "fmoveb.d", Shape::Binary(8, 1);
    FmoveWS = 0x26, "fmovew.s", Shape::Binary(4, 2);
    FmoveWD = 0x27, "fmovew.d", Shape::Binary(8, 2);
    FmoveLS = 0x28, "fmovel.s", Shape::Binary(4, 4);
    FmoveLD = 0x29, "fmovel.d", Shape::Binary(8, 4);
    FmoveQS = 0x2a, "fmoveq.s", Shape::Binary(4, 8);
    FmoveQD = 0x2b, "fmoveq.d", Shape::Binary(8, 8);
    FmoveSB = 0x2c, "fmoves.b", Shape::Binary(1, 4);
    FmoveSW = 0x2d, "fmoves.w", Shape::Binary(2, 4);
    FmoveSL = 0x2e, "fmoves.l", Shape::Binary(4, 4);
    FmoveSQ = 0x2f, "fmoves.q", Shape::Binary(8, 4);
    FmoveDB = 0x30, "fmoved.b", Shape::Binary(1, 8);
    FmoveDW = 0x31, "fmoved.w", Shape::Binary(2, 8);
    FmoveDL = 0x32, "fmoved.l", Shape::Binary(4, 8);
    FmoveDQ = 0x33, "fmoved.q", Shape::Binary(8, 8);
    FmoveSD = 0x34, "fmoves.d", Shape::Binary(8, 4);
    FmoveDS = 0x35, "fmoved.s", Shape::Binary(4, 8);
    AndB = 0x36, "and.b", Shape::Binary(1, 1);
    AndW = 0x37, "and.w", Shape::Binary(2, 2);
    AndL = 0x38, "and.l", Shape::Binary(4, 4);
    AndQ = 0x39, "and.q", Shape::Binary(8, 8);
    OrB = 0x3a, "or.b", Shape::Binary(1, 1);
    OrW = 0x3b, "or.w", Shape::Binary(2, 2);
    OrL = 0x3c, "or.l", Shape::Binary(4, 4);
    OrQ = 0x3d, "or.q", Shape::Binary(8, 8);
    EorB = 0x3e, "eor.b", Shape::Binary(1, 1);
    EorW = 0x3f, "eor.w", Shape::Binary(2, 2);
    EorL = 0x40, "eor.l", Shape::Binary(4, 4);
    EorQ = 0x41, "eor.q", Shape::Binary(8, 8);
    NotB = 0x42, "not.b", Shape::Binary(1, 1);
    NotW = 0x43, "not.w", Shape::Binary(2, 2);
    NotL = 0x44, "not.l", Shape::Binary(4, 4);
    NotQ = 0x45, "not.q", Shape::Binary(8, 8);
    LslB = 0x46, "lsl.b", Shape::Binary(1, 1);
    LslW = 0x47, "lsl.w", Shape::Binary(2, 1);
    LslL = 0x48, "lsl.l", Shape::Binary(4, 1);
    LslQ = 0x49, "lsl.q", Shape::Binary(8, 1);
    LsrB = 0x4a, "lsr.b", Shape::Binary(1, 1);
    LsrW = 0x4b, "lsr.w", Shape::Binary(2, 1);
    LsrL = 0x4c, "lsr.l", Shape::Binary(4, 1);
    LsrQ = 0x4d, "lsr.q", Shape::Binary(8, 1);
    AsrB = 0x4e, "asr.b", Shape::Binary(1, 1);
    AsrW = 0x4f, "asr.w", Shape::Binary(2, 1);
    AsrL = 0x50, "asr.l", Shape::Binary(4, 1);
    AsrQ = 0x51, "asr.q", Shape::Binary(8, 1);
    RolB = 0x52, "rol.b", Shape::Binary(1, 1);
    RolW = 0x53, "rol.w", Shape::Binary(2, 1);
    RolL = 0x54, "rol.l", Shape::Binary(4, 1);
    RolQ = 0x55, "rol.q", Shape::Binary(8, 1);
    RorB = 0x56, "ror.b", Shape::Binary(1, 1);
    RorW = 0x57, "ror.w", Shape::Binary(2, 1);
    RorL = 0x58, "ror.l", Shape::Binary(4, 1);
    RorQ = 0x59, "ror.q", Shape::Binary(8, 1);
    BclrB = 0x5a, "bclr.b", Shape::Binary(1, 1);
    BclrW = 0x5b, "bclr.w", Shape::Binary(2, 1);
    BclrL = 0x5c, "bclr.l", Shape::Binary(4, 1);
    BclrQ = 0x5d, "bclr.q", Shape::Binary(8, 1);
    BsetB = 0x5e, "bset.b", Shape::Binary(1, 1);
    BsetW = 0x5f, "bset.w", Shape::Binary(2, 1);
    BsetL = 0x60, "bset.l", Shape::Binary(4, 1);
    BsetQ = 0x61, "bset.q", Shape::Binary(8, 1);
    AddB = 0x62, "add.b", Shape::Binary(1, 1);
    AddW = 0x63, "add.w", Shape::Binary(2, 2);
    AddL = 0x64, "add.l", Shape::Binary(4, 4);
    AddQ = 0x65, "add.q", Shape::Binary(8, 8);
    SubB = 0x66, "sub.b", Shape::Binary(1, 1);
    SubW = 0x67, "sub.w", Shape::Binary(2, 2);
    SubL = 0x68, "sub.l", Shape::Binary(4, 4);
    SubQ = 0x69, "sub.q", Shape::Binary(8, 8);
    NegB = 0x6a, "neg.b", Shape::Binary(1, 1);
    NegW = 0x6b, "neg.w", Shape::Binary(2, 2);
    NegL = 0x6c, "neg.l", Shape::Binary(4, 4);
    NegQ = 0x6d, "neg.q", Shape::Binary(8, 8);
    MulsB = 0x6e, "muls.b", Shape::Binary(1, 1);
    MulsW = 0x6f, "muls.w", Shape::Binary(2, 2);
    MulsL = 0x70, "muls.l", Shape::Binary(4, 4);
    MulsQ = 0x71, "muls.q", Shape::Binary(8, 8);
    MuluB = 0x72, "mulu.b", Shape::Binary(1, 1);
    MuluW = 0x73, "mulu.w", Shape::Binary(2, 2);
    MuluL = 0x74, "mulu.l", Shape::Binary(4, 4);
    MuluQ = 0x75, "mulu.q", Shape::Binary(8, 8);
    DivsB = 0x76, "divs.b", Shape::Binary(1, 1);
    DivsW = 0x77, "divs.w", Shape::Binary(2, 2);
    DivsL = 0x78, "divs.l", Shape::Binary(4, 4);
    DivsQ = 0x79, "divs.q", Shape::Binary(8, 8);
    DivuB = 0x7a, "divu.b", Shape::Binary(1, 1);
    DivuW = 0x7b, "divu.w", Shape::Binary(2, 2);
    DivuL = 0x7c, "divu.l", Shape::Binary(4, 4);
    DivuQ = 0x7d, "divu.q", Shape::Binary(8, 8);
    ModsB = 0x7e, "mods.b", Shape::Binary(1, 1);
    ModsW = 0x7f, "mods.w", Shape::Binary(2, 2);
    ModsL = 0x80, "mods.l", Shape::Binary(4, 4);
    ModsQ = 0x81, "mods.q", Shape::Binary(8, 8);
    ModuB = 0x82, "modu.b", Shape::Binary(1, 1);
    ModuW = 0x83, "modu.w", Shape::Binary(2, 2);
    ModuL = 0x84, "modu.l", Shape::Binary(4, 4);
    ModuQ = 0x85, "modu.q", Shape::Binary(8, 8);
    FaddS = 0x86, "fadd.s", Shape::Binary(4, 4);
    FaddD = 0x87, "fadd.d", Shape::Binary(8, 8);
    FsubS = 0x88, "fsub.s", Shape::Binary(4, 4);
    FsubD = 0x89, "fsub.d", Shape::Binary(8, 8);
    FmulS = 0x8a, "fmul.s", Shape::Binary(4, 4);
    FmulD = 0x8b, "fmul.d", Shape::Binary(8, 8);
    FdivS = 0x8c, "fdiv.s", Shape::Binary(4, 4);
    FdivD = 0x8d, "fdiv.d", Shape::Binary(8, 8);
    FmodS = 0x8e, "fmod.s", Shape::Binary(4, 4);
    FmodD = 0x8f, "fmod.d", Shape::Binary(8, 8);
    FabsS = 0x90, "fabs.s", Shape::Binary(4, 4);
    FabsD = 0x91, "fabs.d", Shape::Binary(8, 8);
    FnegS = 0x92, "fneg.s", Shape::Binary(4, 4);
    FnegD = 0x93, "fneg.d", Shape::Binary(8, 8);
    FsqrtS = 0x94, "fsqrt.s", Shape::Binary(4, 4);
    FsqrtD = 0x95, "fsqrt.d", Shape::Binary(8, 8);
    FinvS = 0x96, "finv.s", Shape::Binary(4, 4);
    FinvD = 0x97, "finv.d", Shape::Binary(8, 8);
    FacosS = 0x98, "facos.s", Shape::Binary(4, 4);
    FacosD = 0x99, "facos.d", Shape::Binary(8, 8);
    FasinS = 0x9a, "fasin.s", Shape::Binary(4, 4);
    FasinD = 0x9b, "fasin.d", Shape::Binary(8, 8);
    FatanS = 0x9c, "fatan.s", Shape::Binary(4, 4);
    FatanD = 0x9d, "fatan.d", Shape::Binary(8, 8);
    FcosS = 0x9e, "fcos.s", Shape::Binary(4, 4);
    FcosD = 0x9f, "fcos.d", Shape::Binary(8, 8);
    FsinS = 0xa0, "fsin.s", Shape::Binary(4, 4);
    FsinD = 0xa1, "fsin.d", Shape::Binary(8, 8);
    FtanS = 0xa2, "ftan.s", Shape::Binary(4, 4);
    FtanD = 0xa3, "ftan.d", Shape::Binary(8, 8);
    FcoshS = 0xa4, "fcosh.s", Shape::Binary(4, 4);
    FcoshD = 0xa5, "fcosh.d", Shape::Binary(8, 8);
    FsinhS = 0xa6, "fsinh.s", Shape::Binary(4, 4);
    FsinhD = 0xa7, "fsinh.d", Shape::Binary(8, 8);
    FtanhS = 0xa8, "ftanh.s", Shape::Binary(4, 4);
    FtanhD = 0xa9, "ftanh.d", Shape::Binary(8, 8);
    FetoxS = 0xaa, "fetox.s", Shape::Binary(4, 4);
    FetoxD = 0xab, "fetox.d", Shape::Binary(8, 8);
    FlognS = 0xac, "flogn.s", Shape::Binary(4, 4);
    FlognD = 0xad, "flogn.d", Shape::Binary(8, 8);
    Flog2S = 0xae, "flog2.s", Shape::Binary(4, 4);
    Flog2D = 0xaf, "flog2.d", Shape::Binary(8, 8);
    Flog10S = 0xb0, "flog10.s", Shape::Binary(4, 4);
    Flog10D = 0xb1, "flog10.d", Shape::Binary(8, 8);
    FtwotoxS = 0xb2, "ftwotox.s", Shape::Binary(4, 4);
    FtwotoxD = 0xb3, "ftwotox.d", Shape::Binary(8, 8);
}

impl Opcode {
    #[inline(always)]
    pub fn byte(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_bytes_are_dense_and_ordered() {
        for (index, opcode) in Opcode::ALL.iter().enumerate() {
            assert_eq!(opcode.byte() as usize, index, "{opcode}");
            assert_eq!(Opcode::from_byte(index as u8), Some(*opcode));
        }
        assert_eq!(Opcode::from_byte(Opcode::ALL.len() as u8), None);
        assert_eq!(Opcode::from_byte(0xFF), None);
    }

    #[test]
    fn mnemonics_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for opcode in Opcode::ALL {
            assert!(seen.insert(opcode.mnemonic()), "{opcode}");
        }
    }

    #[test]
    fn shift_counts_are_byte_sized() {
        assert_eq!(Opcode::LslQ.shape(), Shape::Binary(8, 1));
        assert_eq!(Opcode::AddQ.shape(), Shape::Binary(8, 8));
        assert_eq!(Opcode::ExtBQ.shape(), Shape::Binary(8, 1));
    }
}
