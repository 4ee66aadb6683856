use host_abi::REG_FUNCTION;

use crate::condition::{OperandType, decode_dyadic, decode_monadic};

use super::{Fault, Flow, Location, Machine, MachineStatus};

impl Machine {
    /// Moves the cursor by `disp` bytes from its current position.
    #[inline(always)]
    fn branch(&mut self, disp: i32) -> Result<(), Fault> {
        let target = (self.cursor as i64).wrapping_add(disp as i64);
        if target < 0 || target as usize >= self.code.len() {
            return Err(Fault::CursorOutOfRange(
                self.code.address().wrapping_add(target as u64),
            ));
        }
        self.cursor = target as usize;
        Ok(())
    }

    #[inline(always)]
    fn jump_to_address(&mut self, address: u64) -> Result<(), Fault> {
        self.cursor = self
            .code_offset(address)
            .ok_or(Fault::CursorOutOfRange(address))?;
        Ok(())
    }

    fn call(&mut self, target: u64) -> Result<(), Fault> {
        let offset = self
            .code_offset(target)
            .ok_or(Fault::CursorOutOfRange(target))?;
        self.push_u64(self.code_address(self.cursor))?;
        self.call_depth += 1;
        self.cursor = offset;
        Ok(())
    }

    /// Integer operand as (signed, unsigned) 64-bit values.
    fn load_int(&self, ty: OperandType, location: Location) -> (i64, u64) {
        match ty {
            OperandType::Byte => {
                let value = self.read::<u8>(location);
                (value as i8 as i64, value as u64)
            }
            OperandType::Word => {
                let value = self.read::<u16>(location);
                (value as i16 as i64, value as u64)
            }
            OperandType::Long => {
                let value = self.read::<u32>(location);
                (value as i32 as i64, value as u64)
            }
            _ => {
                let value = self.read::<u64>(location);
                (value as i64, value)
            }
        }
    }

    fn load_float(&self, ty: OperandType, location: Location) -> f64 {
        match ty {
            OperandType::Single => self.read::<f32>(location) as f64,
            _ => self.read::<f64>(location),
        }
    }

    fn test_monadic(&mut self, cond: u8) -> Result<bool, Fault> {
        let (ty, cc) = decode_monadic(cond).ok_or(Fault::BadCondition(cond))?;
        let location = self.ea_dst(ty.size())?;
        Ok(if ty.is_float() {
            cc.test_float(self.load_float(ty, location))
        } else {
            cc.test_int(self.load_int(ty, location).0)
        })
    }

    fn test_dyadic(&mut self, cond: u8) -> Result<bool, Fault> {
        let (ty, cc) = decode_dyadic(cond).ok_or(Fault::BadCondition(cond))?;
        let a = self.ea_dst(ty.size())?;
        let b = self.ea_src(ty.size())?;
        if ty.is_float() {
            let (a, b) = (self.load_float(ty, a), self.load_float(ty, b));
            cc.compare_float(a, b).ok_or(Fault::BadCondition(cond))
        } else {
            let (sa, ua) = self.load_int(ty, a);
            let (sb, ub) = self.load_int(ty, b);
            Ok(cc.compare_int(sa, sb, ua, ub))
        }
    }
}

pub(super) fn stop(machine: &mut Machine) -> Result<Flow, Fault> {
    machine.status = MachineStatus::Completed;
    Ok(Flow::Halt)
}

pub(super) fn host(machine: &mut Machine) -> Result<Flow, Fault> {
    let module = machine.fetch_u8()?;
    let function = machine.registers.gpr(REG_FUNCTION).u16();
    let vector = machine
        .host
        .lookup(module, function)
        .ok_or(Fault::UnknownHostCall { module, function })?;
    vector(machine);
    Ok(Flow::Check)
}

pub(super) fn bra(machine: &mut Machine) -> Result<Flow, Fault> {
    let disp = machine.fetch_displacement()?;
    machine.branch(disp)?;
    Ok(Flow::Next)
}

pub(super) fn bsr(machine: &mut Machine) -> Result<Flow, Fault> {
    let disp = machine.fetch_displacement()?;
    let target = (machine.cursor as i64).wrapping_add(disp as i64) as u64;
    machine.call(machine.code.address().wrapping_add(target))?;
    Ok(Flow::Next)
}

pub(super) fn jmp(machine: &mut Machine) -> Result<Flow, Fault> {
    let address = machine.ea_address(8)?;
    machine.jump_to_address(address)?;
    Ok(Flow::Next)
}

pub(super) fn jsr(machine: &mut Machine) -> Result<Flow, Fault> {
    let address = machine.ea_address(8)?;
    machine.call(address)?;
    Ok(Flow::Next)
}

pub(super) fn rts(machine: &mut Machine) -> Result<Flow, Fault> {
    machine.call_depth -= 1;
    if machine.call_depth <= 0 {
        machine.status = MachineStatus::Completed;
        return Ok(Flow::Halt);
    }
    let address = machine.pop_u64()?;
    machine.jump_to_address(address)?;
    Ok(Flow::Next)
}

pub(super) fn bmc(machine: &mut Machine) -> Result<Flow, Fault> {
    let cond = machine.fetch_u8()?;
    let taken = machine.test_monadic(cond)?;
    let disp = machine.fetch_displacement()?;
    if taken {
        machine.branch(disp)?;
    }
    Ok(Flow::Next)
}

pub(super) fn bdc(machine: &mut Machine) -> Result<Flow, Fault> {
    let cond = machine.fetch_u8()?;
    let taken = machine.test_dyadic(cond)?;
    let disp = machine.fetch_displacement()?;
    if taken {
        machine.branch(disp)?;
    }
    Ok(Flow::Next)
}

/// Decrements a long counter and branches while it is non-zero.
pub(super) fn dbnz(machine: &mut Machine) -> Result<Flow, Fault> {
    let counter = machine.ea_single(4)?;
    let disp = machine.fetch_displacement()?;
    let value = machine.read::<u32>(counter).wrapping_sub(1);
    machine.write(counter, value);
    if value != 0 {
        machine.branch(disp)?;
    }
    Ok(Flow::Next)
}

pub(super) fn smc(machine: &mut Machine) -> Result<Flow, Fault> {
    let cond = machine.fetch_u8()?;
    let (ty, cc) = decode_monadic(cond).ok_or(Fault::BadCondition(cond))?;
    let dst = machine.ea_dst(1)?;
    let src = machine.ea_src(ty.size())?;
    let result = if ty.is_float() {
        cc.test_float(machine.load_float(ty, src))
    } else {
        cc.test_int(machine.load_int(ty, src).0)
    };
    machine.write(dst, result as u8);
    Ok(Flow::Next)
}

pub(super) fn sdc(machine: &mut Machine) -> Result<Flow, Fault> {
    let cond = machine.fetch_u8()?;
    let (ty, cc) = decode_dyadic(cond).ok_or(Fault::BadCondition(cond))?;
    let dst = machine.ea_dst(1)?;
    let a = machine.ea_src(ty.size())?;
    let b = machine.ea_src(ty.size())?;
    let result = if ty.is_float() {
        let (a, b) = (machine.load_float(ty, a), machine.load_float(ty, b));
        cc.compare_float(a, b).ok_or(Fault::BadCondition(cond))?
    } else {
        let (sa, ua) = machine.load_int(ty, a);
        let (sb, ub) = machine.load_int(ty, b);
        cc.compare_int(sa, sb, ua, ub)
    };
    machine.write(dst, result as u8);
    Ok(Flow::Next)
}
