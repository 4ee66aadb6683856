use serde::{Deserialize, Serialize};

use crate::scalar::Scalar;

pub const GPR_COUNT: usize = 16;
pub const FPR_COUNT: usize = 16;
pub const REG_SP: usize = 15;

/// One 8-byte register cell. Narrow views read and write a little-endian
/// prefix of the cell; the remaining bytes are left as they were.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Register([u8; 8]);

impl Register {
    pub fn from_bits(bits: u64) -> Self {
        Self(bits.to_le_bytes())
    }

    pub fn bits(&self) -> u64 {
        u64::from_le_bytes(self.0)
    }

    pub fn set_bits(&mut self, bits: u64) {
        self.0 = bits.to_le_bytes();
    }

    #[inline(always)]
    pub fn get<T: Scalar>(&self) -> T {
        T::from_le_slice(&self.0)
    }

    #[inline(always)]
    pub fn set<T: Scalar>(&mut self, value: T) {
        value.write_le_slice(&mut self.0);
    }
}

macro_rules! views {
    ($($get:ident, $set:ident: $ty:ty;)*) => {
        impl Register {
            $(
                #[inline(always)]
                pub fn $get(&self) -> $ty {
                    self.get::<$ty>()
                }

                #[inline(always)]
                pub fn $set(&mut self, value: $ty) {
                    self.set::<$ty>(value)
                }
            )*
        }
    };
}

views! {
    u8, set_u8: u8;
    i8, set_i8: i8;
    u16, set_u16: u16;
    i16, set_i16: i16;
    u32, set_u32: u32;
    i32, set_i32: i32;
    u64, set_u64: u64;
    i64, set_i64: i64;
    f32, set_f32: f32;
    f64, set_f64: f64;
}

impl std::fmt::Debug for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Register({:#018x})", self.bits())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegisterFile {
    gpr: [Register; GPR_COUNT],
    fpr: [Register; FPR_COUNT],
}

impl RegisterFile {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn gpr(&self, index: usize) -> &Register {
        &self.gpr[index % GPR_COUNT]
    }

    #[inline(always)]
    pub fn gpr_mut(&mut self, index: usize) -> &mut Register {
        &mut self.gpr[index % GPR_COUNT]
    }

    #[inline(always)]
    pub fn fpr(&self, index: usize) -> &Register {
        &self.fpr[index % FPR_COUNT]
    }

    #[inline(always)]
    pub fn fpr_mut(&mut self, index: usize) -> &mut Register {
        &mut self.fpr[index % FPR_COUNT]
    }

    pub fn sp(&self) -> u64 {
        self.gpr[REG_SP].u64()
    }

    pub fn set_sp(&mut self, value: u64) {
        self.gpr[REG_SP].set_u64(value);
    }

    pub fn gprs(&self) -> &[Register; GPR_COUNT] {
        &self.gpr
    }

    pub fn fprs(&self) -> &[Register; FPR_COUNT] {
        &self.fpr
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
