//! Logical and arithmetic handlers at every integer width.
//!
//! Operands are widened to `u64`, combined, and truncated back to the width
//! on store, so every operation wraps at its own size.

use crate::scalar::Integer;

use super::{Fault, Flow, Machine};

/// `dst = op(dst, src)` with both operands of width `T`.
#[inline(always)]
fn dyadic<T: Integer>(
    machine: &mut Machine,
    op: impl FnOnce(T, T) -> Result<u64, Fault>,
) -> Result<Flow, Fault> {
    let dst = machine.ea_dst(T::SIZE)?;
    let src = machine.ea_src(T::SIZE)?;
    let (a, b) = (machine.read::<T>(dst), machine.read::<T>(src));
    let value = op(a, b)?;
    machine.write(dst, T::truncate(value));
    Ok(Flow::Next)
}

/// `dst = op(src)`.
#[inline(always)]
fn monadic<T: Integer>(machine: &mut Machine, op: impl FnOnce(T) -> u64) -> Result<Flow, Fault> {
    let dst = machine.ea_dst(T::SIZE)?;
    let src = machine.ea_src(T::SIZE)?;
    let value = op(machine.read::<T>(src));
    machine.write(dst, T::truncate(value));
    Ok(Flow::Next)
}

/// `dst = op(dst, count)` where the count is a byte operand reduced modulo
/// the width of `T`.
#[inline(always)]
fn shift<T: Integer>(machine: &mut Machine, op: impl FnOnce(T, u32) -> u64) -> Result<Flow, Fault> {
    let dst = machine.ea_dst(T::SIZE)?;
    let src = machine.ea_src(1)?;
    let count = machine.read::<u8>(src) as u32 % T::BITS;
    let value = op(machine.read::<T>(dst), count);
    machine.write(dst, T::truncate(value));
    Ok(Flow::Next)
}

fn width_mask(bits: u32) -> u64 {
    u64::MAX >> (64 - bits)
}

fn rotate_left(value: u64, count: u32, bits: u32) -> u64 {
    let value = value & width_mask(bits);
    if count == 0 {
        return value;
    }
    ((value << count) | (value >> (bits - count))) & width_mask(bits)
}

pub(super) fn and<T: Integer>(machine: &mut Machine) -> Result<Flow, Fault> {
    dyadic::<T>(machine, |a, b| Ok(a.zero_extend() & b.zero_extend()))
}

pub(super) fn or<T: Integer>(machine: &mut Machine) -> Result<Flow, Fault> {
    dyadic::<T>(machine, |a, b| Ok(a.zero_extend() | b.zero_extend()))
}

pub(super) fn eor<T: Integer>(machine: &mut Machine) -> Result<Flow, Fault> {
    dyadic::<T>(machine, |a, b| Ok(a.zero_extend() ^ b.zero_extend()))
}

pub(super) fn not<T: Integer>(machine: &mut Machine) -> Result<Flow, Fault> {
    monadic::<T>(machine, |a| !a.zero_extend())
}

pub(super) fn lsl<T: Integer>(machine: &mut Machine) -> Result<Flow, Fault> {
    shift::<T>(machine, |a, n| a.zero_extend() << n)
}

pub(super) fn lsr<T: Integer>(machine: &mut Machine) -> Result<Flow, Fault> {
    shift::<T>(machine, |a, n| a.zero_extend() >> n)
}

pub(super) fn asr<T: Integer>(machine: &mut Machine) -> Result<Flow, Fault> {
    shift::<T>(machine, |a, n| (a.sign_extend() >> n) as u64)
}

pub(super) fn rol<T: Integer>(machine: &mut Machine) -> Result<Flow, Fault> {
    shift::<T>(machine, |a, n| rotate_left(a.zero_extend(), n, T::BITS))
}

pub(super) fn ror<T: Integer>(machine: &mut Machine) -> Result<Flow, Fault> {
    shift::<T>(machine, |a, n| {
        rotate_left(a.zero_extend(), (T::BITS - n) % T::BITS, T::BITS)
    })
}

pub(super) fn bclr<T: Integer>(machine: &mut Machine) -> Result<Flow, Fault> {
    shift::<T>(machine, |a, n| a.zero_extend() & !(1u64 << n))
}

pub(super) fn bset<T: Integer>(machine: &mut Machine) -> Result<Flow, Fault> {
    shift::<T>(machine, |a, n| a.zero_extend() | (1u64 << n))
}

pub(super) fn add<T: Integer>(machine: &mut Machine) -> Result<Flow, Fault> {
    dyadic::<T>(machine, |a, b| Ok(a.zero_extend().wrapping_add(b.zero_extend())))
}

pub(super) fn sub<T: Integer>(machine: &mut Machine) -> Result<Flow, Fault> {
    dyadic::<T>(machine, |a, b| Ok(a.zero_extend().wrapping_sub(b.zero_extend())))
}

pub(super) fn neg<T: Integer>(machine: &mut Machine) -> Result<Flow, Fault> {
    monadic::<T>(machine, |a| a.zero_extend().wrapping_neg())
}

pub(super) fn muls<T: Integer>(machine: &mut Machine) -> Result<Flow, Fault> {
    dyadic::<T>(machine, |a, b| Ok(a.sign_extend().wrapping_mul(b.sign_extend()) as u64))
}

pub(super) fn mulu<T: Integer>(machine: &mut Machine) -> Result<Flow, Fault> {
    dyadic::<T>(machine, |a, b| Ok(a.zero_extend().wrapping_mul(b.zero_extend())))
}

pub(super) fn divs<T: Integer>(machine: &mut Machine) -> Result<Flow, Fault> {
    dyadic::<T>(machine, |a, b| match b.sign_extend() {
        0 => Err(Fault::ZeroDivide),
        b => Ok(a.sign_extend().wrapping_div(b) as u64),
    })
}

pub(super) fn divu<T: Integer>(machine: &mut Machine) -> Result<Flow, Fault> {
    dyadic::<T>(machine, |a, b| {
        a.zero_extend()
            .checked_div(b.zero_extend())
            .ok_or(Fault::ZeroDivide)
    })
}

pub(super) fn mods<T: Integer>(machine: &mut Machine) -> Result<Flow, Fault> {
    dyadic::<T>(machine, |a, b| match b.sign_extend() {
        0 => Err(Fault::ZeroDivide),
        b => Ok(a.sign_extend().wrapping_rem(b) as u64),
    })
}

pub(super) fn modu<T: Integer>(machine: &mut Machine) -> Result<Flow, Fault> {
    dyadic::<T>(machine, |a, b| {
        a.zero_extend()
            .checked_rem(b.zero_extend())
            .ok_or(Fault::ZeroDivide)
    })
}
