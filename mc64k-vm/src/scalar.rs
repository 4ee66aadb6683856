//! Typed views over little-endian storage.
//!
//! Every register cell and every memory operand is read and written through a
//! `Scalar` type tag, so a view always names its width explicitly.

mod sealed {
    pub trait Sealed {}
}

pub trait Scalar: sealed::Sealed + Copy + PartialEq + std::fmt::Debug + 'static {
    const SIZE: usize;

    fn from_le_slice(bytes: &[u8]) -> Self;

    fn write_le_slice(self, bytes: &mut [u8]);

    /// # Safety
    /// `ptr` must be valid for reads of `Self::SIZE` bytes.
    unsafe fn load(ptr: *const u8) -> Self;

    /// # Safety
    /// `ptr` must be valid for writes of `Self::SIZE` bytes.
    unsafe fn store(self, ptr: *mut u8);
}

macro_rules! impl_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Scalar for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                #[inline(always)]
                fn from_le_slice(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..std::mem::size_of::<$ty>()]);
                    <$ty>::from_le_bytes(raw)
                }

                #[inline(always)]
                fn write_le_slice(self, bytes: &mut [u8]) {
                    bytes[..std::mem::size_of::<$ty>()].copy_from_slice(&self.to_le_bytes());
                }

                #[inline(always)]
                unsafe fn load(ptr: *const u8) -> Self {
                    let raw = unsafe {
                        ptr.cast::<[u8; std::mem::size_of::<$ty>()]>().read_unaligned()
                    };
                    <$ty>::from_le_bytes(raw)
                }

                #[inline(always)]
                unsafe fn store(self, ptr: *mut u8) {
                    unsafe {
                        ptr.cast::<[u8; std::mem::size_of::<$ty>()]>()
                            .write_unaligned(self.to_le_bytes());
                    }
                }
            }
        )*
    };
}

impl_scalar!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Unsigned integer operand widths. Arithmetic is carried out on 64-bit
/// values and truncated on the way back, which gives wrapping semantics at
/// every width.
pub trait Integer: Scalar + Eq {
    const BITS: u32;

    fn zero_extend(self) -> u64;

    fn sign_extend(self) -> i64;

    fn truncate(value: u64) -> Self;
}

macro_rules! impl_integer {
    ($($ty:ty => $signed:ty),* $(,)?) => {
        $(
            impl Integer for $ty {
                const BITS: u32 = <$ty>::BITS;

                #[inline(always)]
                fn zero_extend(self) -> u64 {
                    self as u64
                }

                #[inline(always)]
                fn sign_extend(self) -> i64 {
                    self as $signed as i64
                }

                #[inline(always)]
                fn truncate(value: u64) -> Self {
                    value as $ty
                }
            }
        )*
    };
}

impl_integer!(u8 => i8, u16 => i16, u32 => i32, u64 => i64);

/// Floating point operand widths.
pub trait Real:
    Scalar
    + std::ops::Add<Output = Self>
    + std::ops::Sub<Output = Self>
    + std::ops::Mul<Output = Self>
    + std::ops::Div<Output = Self>
    + std::ops::Rem<Output = Self>
    + std::ops::Neg<Output = Self>
    + PartialOrd
{
    const ONE: Self;

    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
    fn from_i64(value: i64) -> Self;

    fn abs(self) -> Self;
    fn sqrt(self) -> Self;
    fn acos(self) -> Self;
    fn asin(self) -> Self;
    fn atan(self) -> Self;
    fn cos(self) -> Self;
    fn sin(self) -> Self;
    fn tan(self) -> Self;
    fn cosh(self) -> Self;
    fn sinh(self) -> Self;
    fn tanh(self) -> Self;
    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn log2(self) -> Self;
    fn log10(self) -> Self;
    fn exp2(self) -> Self;
}

macro_rules! impl_real {
    (@forward $ty:ty; $($name:ident)*) => {
        $(
            #[inline(always)]
            fn $name(self) -> Self {
                <$ty>::$name(self)
            }
        )*
    };
    ($($ty:ty),* $(,)?) => {
        $(
            impl Real for $ty {
                const ONE: Self = 1.0;

                #[inline(always)]
                fn to_f64(self) -> f64 {
                    self as f64
                }

                #[inline(always)]
                fn from_f64(value: f64) -> Self {
                    value as $ty
                }

                #[inline(always)]
                fn from_i64(value: i64) -> Self {
                    value as $ty
                }

                impl_real!(@forward $ty; abs sqrt acos asin atan cos sin tan cosh sinh tanh exp ln log2 log10 exp2);
            }
        )*
    };
}

impl_real!(f32, f64);
