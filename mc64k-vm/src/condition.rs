//! Condition bytes for the conditional branch and set instructions.
//!
//! High nibble: operand type. Low nibble: condition code.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum OperandType {
    Byte = 0,
    Word = 1,
    Long = 2,
    Quad = 3,
    Single = 4,
    Double = 5,
}

impl OperandType {
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        Some(match nibble {
            0 => OperandType::Byte,
            1 => OperandType::Word,
            2 => OperandType::Long,
            3 => OperandType::Quad,
            4 => OperandType::Single,
            5 => OperandType::Double,
            _ => return None,
        })
    }

    pub fn size(self) -> usize {
        match self {
            OperandType::Byte => 1,
            OperandType::Word => 2,
            OperandType::Long | OperandType::Single => 4,
            OperandType::Quad | OperandType::Double => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, OperandType::Single | OperandType::Double)
    }

    pub fn suffix(self) -> &'static str {
        match self {
            OperandType::Byte => "b",
            OperandType::Word => "w",
            OperandType::Long => "l",
            OperandType::Quad => "q",
            OperandType::Single => "s",
            OperandType::Double => "d",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Monadic {
    Iz = 0,
    Nz = 1,
    Mi = 2,
    Pl = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Dyadic {
    Eq = 0,
    Ne = 1,
    Lt = 2,
    Le = 3,
    Gt = 4,
    Ge = 5,
    Lo = 6,
    Ls = 7,
    Hi = 8,
    Hs = 9,
}

impl Monadic {
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        Some(match nibble {
            0 => Monadic::Iz,
            1 => Monadic::Nz,
            2 => Monadic::Mi,
            3 => Monadic::Pl,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Monadic::Iz => "iz",
            Monadic::Nz => "nz",
            Monadic::Mi => "mi",
            Monadic::Pl => "pl",
        }
    }

    pub fn test_int(self, value: i64) -> bool {
        match self {
            Monadic::Iz => value == 0,
            Monadic::Nz => value != 0,
            Monadic::Mi => value < 0,
            Monadic::Pl => value >= 0,
        }
    }

    pub fn test_float(self, value: f64) -> bool {
        match self {
            Monadic::Iz => value == 0.0,
            Monadic::Nz => value != 0.0,
            Monadic::Mi => value < 0.0,
            Monadic::Pl => value >= 0.0,
        }
    }
}

impl Dyadic {
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        Some(match nibble {
            0 => Dyadic::Eq,
            1 => Dyadic::Ne,
            2 => Dyadic::Lt,
            3 => Dyadic::Le,
            4 => Dyadic::Gt,
            5 => Dyadic::Ge,
            6 => Dyadic::Lo,
            7 => Dyadic::Ls,
            8 => Dyadic::Hi,
            9 => Dyadic::Hs,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Dyadic::Eq => "eq",
            Dyadic::Ne => "ne",
            Dyadic::Lt => "lt",
            Dyadic::Le => "le",
            Dyadic::Gt => "gt",
            Dyadic::Ge => "ge",
            Dyadic::Lo => "lo",
            Dyadic::Ls => "ls",
            Dyadic::Hi => "hi",
            Dyadic::Hs => "hs",
        }
    }

    pub fn is_unsigned(self) -> bool {
        matches!(self, Dyadic::Lo | Dyadic::Ls | Dyadic::Hi | Dyadic::Hs)
    }

    /// Compares sign- and zero-extended views of the same two operands.
    pub fn compare_int(self, a: i64, b: i64, ua: u64, ub: u64) -> bool {
        match self {
            Dyadic::Eq => ua == ub,
            Dyadic::Ne => ua != ub,
            Dyadic::Lt => a < b,
            Dyadic::Le => a <= b,
            Dyadic::Gt => a > b,
            Dyadic::Ge => a >= b,
            Dyadic::Lo => ua < ub,
            Dyadic::Ls => ua <= ub,
            Dyadic::Hi => ua > ub,
            Dyadic::Hs => ua >= ub,
        }
    }

    /// `None` for the unsigned conditions, which have no float meaning.
    pub fn compare_float(self, a: f64, b: f64) -> Option<bool> {
        Some(match self {
            Dyadic::Eq => a == b,
            Dyadic::Ne => a != b,
            Dyadic::Lt => a < b,
            Dyadic::Le => a <= b,
            Dyadic::Gt => a > b,
            Dyadic::Ge => a >= b,
            _ => return None,
        })
    }
}

pub fn monadic(ty: OperandType, cc: Monadic) -> u8 {
    ((ty as u8) << 4) | cc as u8
}

pub fn dyadic(ty: OperandType, cc: Dyadic) -> u8 {
    ((ty as u8) << 4) | cc as u8
}

pub fn decode_monadic(byte: u8) -> Option<(OperandType, Monadic)> {
    Some((OperandType::from_nibble(byte >> 4)?, Monadic::from_nibble(byte & 0x0F)?))
}

pub fn decode_dyadic(byte: u8) -> Option<(OperandType, Dyadic)> {
    let ty = OperandType::from_nibble(byte >> 4)?;
    let cc = Dyadic::from_nibble(byte & 0x0F)?;
    if ty.is_float() && cc.is_unsigned() {
        return None;
    }
    Some((ty, cc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_conditions_reject_floats() {
        assert_eq!(decode_dyadic(dyadic(OperandType::Double, Dyadic::Hi)), None);
        assert_eq!(
            decode_dyadic(dyadic(OperandType::Quad, Dyadic::Hi)),
            Some((OperandType::Quad, Dyadic::Hi))
        );
        assert_eq!(decode_monadic(0x64), None);
    }

    #[test]
    fn signed_and_unsigned_comparisons_differ() {
        let (a, b) = (-1i64, 1i64);
        assert!(Dyadic::Lt.compare_int(a, b, a as u64, b as u64));
        assert!(Dyadic::Hi.compare_int(a, b, a as u64, b as u64));
        assert!(!Dyadic::Lo.compare_int(a, b, a as u64, b as u64));
    }
}
