//! Instruction stream fetches and effective-address resolution.

use crate::ea::{
    DISP_SIZE, IndexWidth, MODE_DISP, MODE_FPR, MODE_GPR, MODE_INDEX, MODE_INDEX_DISP,
    MODE_INDIRECT, MODE_OTHER, MODE_PC_DISP, MODE_PC_INDEX, MODE_PC_INDEX_DISP, MODE_POST_DEC,
    MODE_POST_INC, MODE_PRE_DEC, MODE_PRE_INC, MODE_SAME_AS_DEST, OTHER_ABSOLUTE,
    OTHER_IMMEDIATE,
};
use crate::registers::REG_SP;
use crate::scalar::Scalar;

use super::{Fault, Machine};

/// A decoded operand: a register slot or a non-null memory address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Location {
    Gpr(u8),
    Fpr(u8),
    Memory(*mut u8),
}

impl Location {
    pub fn address(self) -> Option<u64> {
        match self {
            Location::Memory(ptr) => Some(ptr as u64),
            Location::Gpr(_) | Location::Fpr(_) => None,
        }
    }
}

/// Single unaligned load of a little-endian displacement.
#[cfg_attr(feature = "strict-alignment", allow(dead_code))]
#[inline(always)]
pub(crate) fn displacement_wide(bytes: &[u8; DISP_SIZE]) -> i32 {
    i32::from_le(unsafe { bytes.as_ptr().cast::<i32>().read_unaligned() })
}

/// Four byte loads assembled in stream order.
#[cfg_attr(not(feature = "strict-alignment"), allow(dead_code))]
#[inline(always)]
pub(crate) fn displacement_bytewise(bytes: &[u8; DISP_SIZE]) -> i32 {
    let mut value = 0u32;
    for (shift, byte) in bytes.iter().enumerate() {
        value |= (*byte as u32) << (shift * 8);
    }
    value as i32
}

#[cfg(not(feature = "strict-alignment"))]
use displacement_wide as displacement;

#[cfg(feature = "strict-alignment")]
use displacement_bytewise as displacement;

impl Machine {
    #[inline(always)]
    fn code_at(&self, offset: usize) -> *mut u8 {
        self.code.base().wrapping_add(offset)
    }

    /// Reserves `len` bytes at the cursor and returns their offset.
    #[inline(always)]
    pub(crate) fn advance(&mut self, len: usize) -> Result<usize, Fault> {
        let at = self.cursor;
        let end = at + len;
        if end > self.code.len() {
            return Err(Fault::CursorOutOfRange(self.code_address(end)));
        }
        self.cursor = end;
        Ok(at)
    }

    #[inline(always)]
    fn fetch_array<const N: usize>(&mut self) -> Result<[u8; N], Fault> {
        let at = self.advance(N)?;
        Ok(unsafe { self.code_at(at).cast::<[u8; N]>().read() })
    }

    #[inline(always)]
    pub(crate) fn fetch_opcode(&mut self) -> Result<u8, Fault> {
        self.opcode_offset = self.cursor;
        let [byte] = self.fetch_array::<1>()?;
        self.opcode = byte;
        Ok(byte)
    }

    #[inline(always)]
    pub(crate) fn fetch_u8(&mut self) -> Result<u8, Fault> {
        let [byte] = self.fetch_array::<1>()?;
        Ok(byte)
    }

    #[inline(always)]
    pub(crate) fn fetch_u32(&mut self) -> Result<u32, Fault> {
        Ok(u32::from_le_bytes(self.fetch_array::<4>()?))
    }

    #[inline(always)]
    pub(crate) fn fetch_u64(&mut self) -> Result<u64, Fault> {
        Ok(u64::from_le_bytes(self.fetch_array::<8>()?))
    }

    #[inline(always)]
    pub(crate) fn fetch_displacement(&mut self) -> Result<i32, Fault> {
        Ok(displacement(&self.fetch_array::<DISP_SIZE>()?))
    }

    /// Decodes the destination operand. Same-as-destination is null here.
    #[inline(always)]
    pub(crate) fn ea_dst(&mut self, size: usize) -> Result<Location, Fault> {
        let location = self.decode_ea(size, None)?;
        self.dst = Some(location);
        Ok(location)
    }

    /// Decodes a source operand, which may refer back to the destination.
    #[inline(always)]
    pub(crate) fn ea_src(&mut self, size: usize) -> Result<Location, Fault> {
        self.decode_ea(size, self.dst)
    }

    /// Decodes the only operand of an instruction.
    #[inline(always)]
    pub(crate) fn ea_single(&mut self, size: usize) -> Result<Location, Fault> {
        self.decode_ea(size, None)
    }

    /// Decodes an operand that must name memory.
    #[inline(always)]
    pub(crate) fn ea_address(&mut self, size: usize) -> Result<u64, Fault> {
        let location = self.ea_single(size)?;
        location
            .address()
            .ok_or(Fault::NullAddress { mode: self.mode })
    }

    fn decode_ea(&mut self, size: usize, dst: Option<Location>) -> Result<Location, Fault> {
        let mode = self.fetch_u8()?;
        self.mode = mode;
        let reg = mode & 0x0F;
        let step = size as u64;
        let address = match mode >> 4 {
            MODE_GPR => return Ok(Location::Gpr(reg)),
            MODE_FPR => return Ok(Location::Fpr(reg)),
            MODE_INDIRECT => self.registers.gpr(reg as usize).u64(),
            MODE_POST_INC => {
                let cell = self.registers.gpr_mut(reg as usize);
                let address = cell.u64();
                cell.set_u64(address.wrapping_add(step));
                address
            }
            MODE_POST_DEC => {
                let cell = self.registers.gpr_mut(reg as usize);
                let address = cell.u64();
                cell.set_u64(address.wrapping_sub(step));
                address
            }
            MODE_PRE_INC => {
                let cell = self.registers.gpr_mut(reg as usize);
                let address = cell.u64().wrapping_add(step);
                cell.set_u64(address);
                address
            }
            MODE_PRE_DEC => {
                let cell = self.registers.gpr_mut(reg as usize);
                let address = cell.u64().wrapping_sub(step);
                cell.set_u64(address);
                address
            }
            MODE_DISP => {
                let disp = self.fetch_displacement()?;
                self.registers
                    .gpr(reg as usize)
                    .u64()
                    .wrapping_add(disp as i64 as u64)
            }
            MODE_INDEX | MODE_INDEX_DISP => {
                let descriptor = self.fetch_u8()?;
                let base = self.registers.gpr((descriptor & 0x0F) as usize).u64();
                let index = self.registers.gpr((descriptor >> 4) as usize);
                let index = match IndexWidth::from_bits(reg) {
                    IndexWidth::Byte => index.i8() as i64,
                    IndexWidth::Word => index.i16() as i64,
                    IndexWidth::Long => index.i32() as i64,
                    IndexWidth::Quad => index.i64(),
                };
                let scale = ((reg >> 2) & 0x3) as u32;
                let mut address = base.wrapping_add(index.wrapping_shl(scale) as u64);
                if mode >> 4 == MODE_INDEX_DISP {
                    address = address.wrapping_add(self.fetch_displacement()? as i64 as u64);
                }
                address
            }
            MODE_SAME_AS_DEST => return dst.ok_or(Fault::NullAddress { mode }),
            MODE_PC_DISP => {
                let disp = self.fetch_displacement()?;
                self.code_address(self.cursor)
                    .wrapping_add(disp as i64 as u64)
            }
            MODE_PC_INDEX => {
                self.advance(1)?;
                0
            }
            MODE_PC_INDEX_DISP => {
                self.advance(1 + DISP_SIZE)?;
                0
            }
            MODE_OTHER => match reg {
                OTHER_IMMEDIATE => {
                    let at = self.advance(size)?;
                    self.code_address(at)
                }
                OTHER_ABSOLUTE => self.fetch_u64()?,
                _ => 0,
            },
            _ => 0,
        };
        if address == 0 {
            return Err(Fault::NullAddress { mode });
        }
        Ok(Location::Memory(address as *mut u8))
    }

    #[inline(always)]
    pub(crate) fn read<T: Scalar>(&self, location: Location) -> T {
        match location {
            Location::Gpr(reg) => self.registers.gpr(reg as usize).get::<T>(),
            Location::Fpr(reg) => self.registers.fpr(reg as usize).get::<T>(),
            Location::Memory(ptr) => unsafe { T::load(ptr) },
        }
    }

    #[inline(always)]
    pub(crate) fn write<T: Scalar>(&mut self, location: Location, value: T) {
        match location {
            Location::Gpr(reg) => self.registers.gpr_mut(reg as usize).set::<T>(value),
            Location::Fpr(reg) => self.registers.fpr_mut(reg as usize).set::<T>(value),
            Location::Memory(ptr) => unsafe { value.store(ptr) },
        }
    }

    pub(crate) fn push_u64(&mut self, value: u64) -> Result<(), Fault> {
        let current = self.registers.sp();
        // An `sp` outside the owned stack region is the program's own memory.
        if let Some(offset) = self.stack.offset_of(current, 0) {
            if offset < 8 {
                return Err(Fault::StackOverflow(current));
            }
        }
        let sp = current.wrapping_sub(8);
        if sp == 0 {
            return Err(Fault::NullAddress {
                mode: (MODE_PRE_DEC << 4) | REG_SP as u8,
            });
        }
        self.registers.set_sp(sp);
        unsafe { value.store(sp as *mut u8) };
        Ok(())
    }

    pub(crate) fn pop_u64(&mut self) -> Result<u64, Fault> {
        let sp = self.registers.sp();
        if sp == 0 {
            return Err(Fault::NullAddress {
                mode: (MODE_POST_INC << 4) | REG_SP as u8,
            });
        }
        let value = unsafe { u64::load(sp as *const u8) };
        self.registers.set_sp(sp.wrapping_add(8));
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ea::Ea;
    use crate::image::Image;

    /// Builds a machine over `stream` and decodes one operand from offset 0.
    fn decode(
        stream: &[u8],
        size: usize,
        setup: impl FnOnce(&mut Machine),
    ) -> (Machine, Result<Location, Fault>) {
        let mut machine = Machine::new(&Image::from_code(stream.to_vec()));
        setup(&mut machine);
        let location = machine.ea_dst(size);
        (machine, location)
    }

    fn encoded(ea: &Ea, size: usize) -> Vec<u8> {
        let mut out = Vec::new();
        ea.encode(size, &mut out);
        out
    }

    #[test]
    fn cursor_advances_by_mode_length() {
        let cases = [
            (Ea::Gpr(1), 8, 1),
            (Ea::Fpr(2), 8, 1),
            (Ea::Indirect(1), 4, 1),
            (Ea::PostInc(1), 4, 1),
            (Ea::PreDec(1), 4, 1),
            (Ea::Disp(1, -4), 4, 5),
            (
                Ea::Index {
                    base: 1,
                    index: 2,
                    width: IndexWidth::Long,
                    scale: 2,
                },
                4,
                2,
            ),
            (
                Ea::IndexDisp {
                    base: 1,
                    index: 2,
                    width: IndexWidth::Quad,
                    scale: 0,
                    disp: 8,
                },
                2,
                6,
            ),
            (Ea::PcDisp(0), 8, 5),
            (Ea::Immediate(7), 2, 3),
            (Ea::Immediate(7), 8, 9),
            (Ea::Absolute(0x1000), 1, 9),
        ];
        for (ea, size, delta) in cases {
            let (machine, location) = decode(&encoded(&ea, size), size, |m| {
                m.gpr_mut(1).set_u64(0x1000);
                m.gpr_mut(2).set_u64(3);
            });
            assert!(location.is_ok(), "{ea}");
            assert_eq!(machine.cursor(), delta, "{ea}");
        }
    }

    #[test]
    fn reserved_modes_consume_their_bytes_and_fault() {
        let cases = [
            (
                Ea::PcIndex {
                    mode: 0,
                    descriptor: 0x21,
                    disp: None,
                },
                2,
            ),
            (
                Ea::PcIndex {
                    mode: 0,
                    descriptor: 0x21,
                    disp: Some(4),
                },
                6,
            ),
            (Ea::Reserved(0xE0), 1),
            (Ea::Reserved(0xF7), 1),
        ];
        for (ea, delta) in cases {
            let stream = encoded(&ea, 8);
            let (machine, location) = decode(&stream, 8, |_| {});
            assert_eq!(location, Err(Fault::NullAddress { mode: stream[0] }), "{ea}");
            assert_eq!(machine.cursor(), delta, "{ea}");
        }
    }

    #[test]
    fn increment_and_decrement_modes() {
        let address = 0x4000u64;
        let (machine, location) = decode(&encoded(&Ea::PostInc(3), 4), 4, |m| {
            m.gpr_mut(3).set_u64(address);
        });
        assert_eq!(location.map(Location::address), Ok(Some(address)));
        assert_eq!(machine.gpr(3).u64(), address + 4);

        let (machine, location) = decode(&encoded(&Ea::PreDec(3), 8), 8, |m| {
            m.gpr_mut(3).set_u64(address);
        });
        assert_eq!(location.map(Location::address), Ok(Some(address - 8)));
        assert_eq!(machine.gpr(3).u64(), address - 8);

        let (machine, location) = decode(&encoded(&Ea::PostDec(3), 2), 2, |m| {
            m.gpr_mut(3).set_u64(address);
        });
        assert_eq!(location.map(Location::address), Ok(Some(address)));
        assert_eq!(machine.gpr(3).u64(), address - 2);

        let (machine, location) = decode(&encoded(&Ea::PreInc(3), 1), 1, |m| {
            m.gpr_mut(3).set_u64(address);
        });
        assert_eq!(location.map(Location::address), Ok(Some(address + 1)));
        assert_eq!(machine.gpr(3).u64(), address + 1);
    }

    #[test]
    fn scaled_index_sign_extends_the_index() {
        let ea = Ea::IndexDisp {
            base: 4,
            index: 5,
            width: IndexWidth::Byte,
            scale: 3,
            disp: 0x10,
        };
        let (_, location) = decode(&encoded(&ea, 8), 8, |m| {
            m.gpr_mut(4).set_u64(0x8000);
            m.gpr_mut(5).set_u64(0x1234_56FF);
        });
        assert_eq!(location.map(Location::address), Ok(Some(0x8000 - 8 + 0x10)));
    }

    #[test]
    fn same_as_destination_is_null_as_destination() {
        let (_, location) = decode(&encoded(&Ea::SameAsDest, 8), 8, |_| {});
        assert_eq!(location, Err(Fault::NullAddress { mode: 0xA0 }));

        let mut stream = encoded(&Ea::Gpr(6), 8);
        stream.extend(encoded(&Ea::SameAsDest, 8));
        let (mut machine, location) = decode(&stream, 8, |_| {});
        assert_eq!(location, Ok(Location::Gpr(6)));
        assert_eq!(machine.ea_src(8), Ok(Location::Gpr(6)));
    }

    #[test]
    fn zero_address_is_a_fault() {
        let (_, location) = decode(&encoded(&Ea::Indirect(7), 8), 8, |_| {});
        assert_eq!(location, Err(Fault::NullAddress { mode: 0x17 }));
    }

    #[test]
    fn immediate_points_into_the_code_stream() {
        let (machine, location) = decode(&encoded(&Ea::Immediate(0x2A), 8), 8, |_| {});
        let location = location.expect("immediate should decode");
        assert_eq!(location.address(), Some(machine.code_address(1)));
        assert_eq!(machine.read::<u64>(location), 0x2A);
    }

    #[test]
    fn truncated_operand_is_out_of_range() {
        let (_, location) = decode(&[0x61, 0x00], 8, |_| {});
        assert!(matches!(location, Err(Fault::CursorOutOfRange(_))));
    }

    #[test]
    fn displacement_fetchers_agree() {
        let samples = [
            [0, 0, 0, 0],
            [0xFC, 0xFF, 0xFF, 0xFF],
            [0x78, 0x56, 0x34, 0x12],
            [0, 0, 0, 0x80],
        ];
        for bytes in samples {
            assert_eq!(displacement_wide(&bytes), displacement_bytewise(&bytes));
            assert_eq!(displacement_wide(&bytes), i32::from_le_bytes(bytes));
        }
    }
}
