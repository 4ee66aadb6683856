use crate::registers::{FPR_COUNT, GPR_COUNT};
use crate::scalar::{Integer, Real, Scalar};

use super::{Fault, Flow, Machine};

pub(super) fn move_<T: Scalar>(machine: &mut Machine) -> Result<Flow, Fault> {
    let dst = machine.ea_dst(T::SIZE)?;
    let src = machine.ea_src(T::SIZE)?;
    let value = machine.read::<T>(src);
    machine.write(dst, value);
    Ok(Flow::Next)
}

pub(super) fn clr<T: Integer>(machine: &mut Machine) -> Result<Flow, Fault> {
    let dst = machine.ea_single(T::SIZE)?;
    machine.write(dst, T::truncate(0));
    Ok(Flow::Next)
}

pub(super) fn exg(machine: &mut Machine) -> Result<Flow, Fault> {
    let pair = machine.fetch_u8()?;
    let (a, b) = ((pair >> 4) as usize, (pair & 0x0F) as usize);
    let value = *machine.registers.gpr(a);
    *machine.registers.gpr_mut(a) = *machine.registers.gpr(b);
    *machine.registers.gpr_mut(b) = value;
    Ok(Flow::Next)
}

pub(super) fn fexg(machine: &mut Machine) -> Result<Flow, Fault> {
    let pair = machine.fetch_u8()?;
    let (a, b) = ((pair >> 4) as usize, (pair & 0x0F) as usize);
    let value = *machine.registers.fpr(a);
    *machine.registers.fpr_mut(a) = *machine.registers.fpr(b);
    *machine.registers.fpr_mut(b) = value;
    Ok(Flow::Next)
}

/// Register numbers selected by a save/load mask: GPRs from bit 0, FPRs
/// from bit 16, in ascending order.
fn masked(mask: u32) -> impl Iterator<Item = (bool, usize)> {
    (0..GPR_COUNT + FPR_COUNT)
        .filter(move |bit| mask & (1 << bit) != 0)
        .map(|bit| {
            if bit < GPR_COUNT {
                (false, bit)
            } else {
                (true, bit - GPR_COUNT)
            }
        })
}

pub(super) fn savem(machine: &mut Machine) -> Result<Flow, Fault> {
    let mask = machine.fetch_u32()?;
    let size = 8 * mask.count_ones() as usize;
    let base = machine.ea_address(size)?;
    for (slot, (float, reg)) in masked(mask).enumerate() {
        let cell = if float {
            machine.registers.fpr(reg)
        } else {
            machine.registers.gpr(reg)
        };
        let address = base.wrapping_add(8 * slot as u64);
        unsafe { cell.bits().store(address as *mut u8) };
    }
    Ok(Flow::Next)
}

pub(super) fn loadm(machine: &mut Machine) -> Result<Flow, Fault> {
    let mask = machine.fetch_u32()?;
    let size = 8 * mask.count_ones() as usize;
    let base = machine.ea_address(size)?;
    for (slot, (float, reg)) in masked(mask).enumerate() {
        let address = base.wrapping_add(8 * slot as u64);
        let bits = unsafe { u64::load(address as *const u8) };
        let cell = if float {
            machine.registers.fpr_mut(reg)
        } else {
            machine.registers.gpr_mut(reg)
        };
        cell.set_bits(bits);
    }
    Ok(Flow::Next)
}

/// Pushes the frame register, points it at the new top of stack and reserves
/// `disp` bytes (normally negative).
pub(super) fn link(machine: &mut Machine) -> Result<Flow, Fault> {
    let reg = (machine.fetch_u8()? & 0x0F) as usize;
    let disp = machine.fetch_displacement()?;
    machine.push_u64(machine.registers.gpr(reg).u64())?;
    let sp = machine.registers.sp();
    machine.registers.gpr_mut(reg).set_u64(sp);
    machine
        .registers
        .set_sp(machine.registers.sp().wrapping_add(disp as i64 as u64));
    Ok(Flow::Next)
}

pub(super) fn unlk(machine: &mut Machine) -> Result<Flow, Fault> {
    let reg = (machine.fetch_u8()? & 0x0F) as usize;
    let frame = machine.registers.gpr(reg).u64();
    machine.registers.set_sp(frame);
    let saved = machine.pop_u64()?;
    machine.registers.gpr_mut(reg).set_u64(saved);
    Ok(Flow::Next)
}

pub(super) fn lea(machine: &mut Machine) -> Result<Flow, Fault> {
    let dst = machine.ea_dst(8)?;
    let src = machine.ea_src(8)?;
    let address = src.address().ok_or(Fault::NullAddress { mode: machine.mode })?;
    machine.write(dst, address);
    Ok(Flow::Next)
}

pub(super) fn pea(machine: &mut Machine) -> Result<Flow, Fault> {
    let address = machine.ea_address(8)?;
    machine.push_u64(address)?;
    Ok(Flow::Next)
}

pub(super) fn ext<Narrow: Integer, Wide: Integer>(machine: &mut Machine) -> Result<Flow, Fault> {
    let dst = machine.ea_dst(Wide::SIZE)?;
    let src = machine.ea_src(Narrow::SIZE)?;
    let value = machine.read::<Narrow>(src).sign_extend();
    machine.write(dst, Wide::truncate(value as u64));
    Ok(Flow::Next)
}

pub(super) fn int_to_float<I: Integer, F: Real>(machine: &mut Machine) -> Result<Flow, Fault> {
    let dst = machine.ea_dst(F::SIZE)?;
    let src = machine.ea_src(I::SIZE)?;
    let value = machine.read::<I>(src).sign_extend();
    machine.write(dst, F::from_i64(value));
    Ok(Flow::Next)
}

/// Truncates toward zero, saturating at the signed range of `I`. NaN gives 0.
pub(super) fn float_to_int<F: Real, I: Integer>(machine: &mut Machine) -> Result<Flow, Fault> {
    let dst = machine.ea_dst(I::SIZE)?;
    let src = machine.ea_src(F::SIZE)?;
    let value = machine.read::<F>(src).to_f64();
    machine.write(dst, I::truncate(saturate(value, I::BITS) as u64));
    Ok(Flow::Next)
}

fn saturate(value: f64, bits: u32) -> i64 {
    let max = i64::MAX >> (64 - bits);
    (value as i64).clamp(-max - 1, max)
}

pub(super) fn float_to_float<Src: Real, Dst: Real>(machine: &mut Machine) -> Result<Flow, Fault> {
    let dst = machine.ea_dst(Dst::SIZE)?;
    let src = machine.ea_src(Src::SIZE)?;
    let value = machine.read::<Src>(src).to_f64();
    machine.write(dst, Dst::from_f64(value));
    Ok(Flow::Next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturation_clamps_to_signed_range() {
        assert_eq!(saturate(1000.0, 8), 127);
        assert_eq!(saturate(-1000.0, 8), -128);
        assert_eq!(saturate(-2.9, 16), -2);
        assert_eq!(saturate(f64::NAN, 32), 0);
        assert_eq!(saturate(1e30, 64), i64::MAX);
        assert_eq!(saturate(-1e30, 64), i64::MIN);
        assert_eq!(saturate(3.0e9, 32), i32::MAX as i64);
    }

    #[test]
    fn mask_order_is_gprs_then_fprs() {
        let regs: Vec<_> = masked(0x0001_8002).collect();
        assert_eq!(regs, vec![(false, 1), (false, 15), (true, 0)]);
    }
}
