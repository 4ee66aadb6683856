//! Opcode byte to handler mapping and the fetch loop.
//!
//! The same handler list builds both strategies: a 256-entry table of
//! function pointers and a `match` over [`Opcode`]. Which one runs is a
//! build-time choice.

use crate::opcode::Opcode;

use super::{Fault, Machine, MachineStatus, control, data, float, integer};

/// What the run loop does after a handler returns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// The handler set a terminal status.
    Halt,
    /// Resume after re-checking the status.
    Check,
    /// Resume with the next fetch.
    Next,
}

pub(crate) type Handler = fn(&mut Machine) -> Result<Flow, Fault>;

pub(crate) const JUMP_TABLE: bool = cfg!(feature = "jump-table");
pub(crate) const FAST_CONTINUE: bool = cfg!(feature = "fast-continue");

macro_rules! handlers {
    ($($op:ident => $handler:expr,)*) => {
        const fn handler_for(opcode: Opcode) -> Handler {
            match opcode {
                $(Opcode::$op => $handler,)*
            }
        }

        #[inline(always)]
        fn dispatch_match(machine: &mut Machine, opcode: Opcode) -> Result<Flow, Fault> {
            match opcode {
                $(Opcode::$op => ($handler)(machine),)*
            }
        }
    };
}

handlers! {
    Stop => control::stop,
    Host => control::host,
    Bra => control::bra,
    Bsr => control::bsr,
    Jmp => control::jmp,
    Jsr => control::jsr,
    Rts => control::rts,
    Bmc => control::bmc,
    Bdc => control::bdc,
    Dbnz => control::dbnz,
    Smc => control::smc,
    Sdc => control::sdc,

    MoveB => data::move_::<u8>,
    MoveW => data::move_::<u16>,
    MoveL => data::move_::<u32>,
    MoveQ => data::move_::<u64>,
    FmoveS => data::move_::<f32>,
    FmoveD => data::move_::<f64>,
    ClrB => data::clr::<u8>,
    ClrW => data::clr::<u16>,
    ClrL => data::clr::<u32>,
    ClrQ => data::clr::<u64>,
    Exg => data::exg,
    Fexg => data::fexg,
    Savem => data::savem,
    Loadm => data::loadm,
    Link => data::link,
    Unlk => data::unlk,
    Lea => data::lea,
    Pea => data::pea,
    ExtBW => data::ext::<u8, u16>,
    ExtBL => data::ext::<u8, u32>,
    ExtBQ => data::ext::<u8, u64>,
    ExtWL => data::ext::<u16, u32>,
    ExtWQ => data::ext::<u16, u64>,
    ExtLQ => data::ext::<u32, u64>,
    FmoveBS => data::int_to_float::<u8, f32>,
    FmoveBD => data::int_to_float::<u8, f64>,
    FmoveWS => data::int_to_float::<u16, f32>,
    FmoveWD => data::int_to_float::<u16, f64>,
    FmoveLS => data::int_to_float::<u32, f32>,
    FmoveLD => data::int_to_float::<u32, f64>,
    FmoveQS => data::int_to_float::<u64, f32>,
    FmoveQD => data::int_to_float::<u64, f64>,
    FmoveSB => data::float_to_int::<f32, u8>,
    FmoveSW => data::float_to_int::<f32, u16>,
    FmoveSL => data::float_to_int::<f32, u32>,
    FmoveSQ => data::float_to_int::<f32, u64>,
    FmoveDB => data::float_to_int::<f64, u8>,
    FmoveDW => data::float_to_int::<f64, u16>,
    FmoveDL => data::float_to_int::<f64, u32>,
    FmoveDQ => data::float_to_int::<f64, u64>,
    FmoveSD => data::float_to_float::<f32, f64>,
    FmoveDS => data::float_to_float::<f64, f32>,

    AndB => integer::and::<u8>,
    AndW => integer::and::<u16>,
    AndL => integer::and::<u32>,
    AndQ => integer::and::<u64>,
    OrB => integer::or::<u8>,
    OrW => integer::or::<u16>,
    OrL => integer::or::<u32>,
    OrQ => integer::or::<u64>,
    EorB => integer::eor::<u8>,
    EorW => integer::eor::<u16>,
    EorL => integer::eor::<u32>,
    EorQ => integer::eor::<u64>,
    NotB => integer::not::<u8>,
    NotW => integer::not::<u16>,
    NotL => integer::not::<u32>,
    NotQ => integer::not::<u64>,
    LslB => integer::lsl::<u8>,
    LslW => integer::lsl::<u16>,
    LslL => integer::lsl::<u32>,
    LslQ => integer::lsl::<u64>,
    LsrB => integer::lsr::<u8>,
    LsrW => integer::lsr::<u16>,
    LsrL => integer::lsr::<u32>,
    LsrQ => integer::lsr::<u64>,
    AsrB => integer::asr::<u8>,
    AsrW => integer::asr::<u16>,
    AsrL => integer::asr::<u32>,
    AsrQ => integer::asr::<u64>,
    RolB => integer::rol::<u8>,
    RolW => integer::rol::<u16>,
    RolL => integer::rol::<u32>,
    RolQ => integer::rol::<u64>,
    RorB => integer::ror::<u8>,
    RorW => integer::ror::<u16>,
    RorL => integer::ror::<u32>,
    RorQ => integer::ror::<u64>,
    BclrB => integer::bclr::<u8>,
    BclrW => integer::bclr::<u16>,
    BclrL => integer::bclr::<u32>,
    BclrQ => integer::bclr::<u64>,
    BsetB => integer::bset::<u8>,
    BsetW => integer::bset::<u16>,
    BsetL => integer::bset::<u32>,
    BsetQ => integer::bset::<u64>,

    AddB => integer::add::<u8>,
    AddW => integer::add::<u16>,
    AddL => integer::add::<u32>,
    AddQ => integer::add::<u64>,
    SubB => integer::sub::<u8>,
    SubW => integer::sub::<u16>,
    SubL => integer::sub::<u32>,
    SubQ => integer::sub::<u64>,
    NegB => integer::neg::<u8>,
    NegW => integer::neg::<u16>,
    NegL => integer::neg::<u32>,
    NegQ => integer::neg::<u64>,
    MulsB => integer::muls::<u8>,
    MulsW => integer::muls::<u16>,
    MulsL => integer::muls::<u32>,
    MulsQ => integer::muls::<u64>,
    MuluB => integer::mulu::<u8>,
    MuluW => integer::mulu::<u16>,
    MuluL => integer::mulu::<u32>,
    MuluQ => integer::mulu::<u64>,
    DivsB => integer::divs::<u8>,
    DivsW => integer::divs::<u16>,
    DivsL => integer::divs::<u32>,
    DivsQ => integer::divs::<u64>,
    DivuB => integer::divu::<u8>,
    DivuW => integer::divu::<u16>,
    DivuL => integer::divu::<u32>,
    DivuQ => integer::divu::<u64>,
    ModsB => integer::mods::<u8>,
    ModsW => integer::mods::<u16>,
    ModsL => integer::mods::<u32>,
    ModsQ => integer::mods::<u64>,
    ModuB => integer::modu::<u8>,
    ModuW => integer::modu::<u16>,
    ModuL => integer::modu::<u32>,
    ModuQ => integer::modu::<u64>,

    FaddS => float::fadd::<f32>,
    FaddD => float::fadd::<f64>,
    FsubS => float::fsub::<f32>,
    FsubD => float::fsub::<f64>,
    FmulS => float::fmul::<f32>,
    FmulD => float::fmul::<f64>,
    FdivS => float::fdiv::<f32>,
    FdivD => float::fdiv::<f64>,
    FmodS => float::fmod::<f32>,
    FmodD => float::fmod::<f64>,
    FabsS => float::fabs::<f32>,
    FabsD => float::fabs::<f64>,
    FnegS => float::fneg::<f32>,
    FnegD => float::fneg::<f64>,
    FsqrtS => float::fsqrt::<f32>,
    FsqrtD => float::fsqrt::<f64>,
    FinvS => float::finv::<f32>,
    FinvD => float::finv::<f64>,
    FacosS => float::facos::<f32>,
    FacosD => float::facos::<f64>,
    FasinS => float::fasin::<f32>,
    FasinD => float::fasin::<f64>,
    FatanS => float::fatan::<f32>,
    FatanD => float::fatan::<f64>,
    FcosS => float::fcos::<f32>,
    FcosD => float::fcos::<f64>,
    FsinS => float::fsin::<f32>,
    FsinD => float::fsin::<f64>,
    FtanS => float::ftan::<f32>,
    FtanD => float::ftan::<f64>,
    FcoshS => float::fcosh::<f32>,
    FcoshD => float::fcosh::<f64>,
    FsinhS => float::fsinh::<f32>,
    FsinhD => float::fsinh::<f64>,
    FtanhS => float::ftanh::<f32>,
    FtanhD => float::ftanh::<f64>,
    FetoxS => float::fetox::<f32>,
    FetoxD => float::fetox::<f64>,
    FlognS => float::flogn::<f32>,
    FlognD => float::flogn::<f64>,
    Flog2S => float::flog2::<f32>,
    Flog2D => float::flog2::<f64>,
    Flog10S => float::flog10::<f32>,
    Flog10D => float::flog10::<f64>,
    FtwotoxS => float::ftwotox::<f32>,
    FtwotoxD => float::ftwotox::<f64>,
}

fn unimplemented(machine: &mut Machine) -> Result<Flow, Fault> {
    Err(Fault::InvalidOpcode(machine.opcode))
}

const fn build_table() -> [Handler; 256] {
    let mut table: [Handler; 256] = [unimplemented as Handler; 256];
    let mut byte = 0;
    while byte < 256 {
        if let Some(opcode) = Opcode::from_byte(byte as u8) {
            table[byte] = handler_for(opcode);
        }
        byte += 1;
    }
    table
}

static TABLE: [Handler; 256] = build_table();

#[inline(always)]
fn execute_one<const USE_TABLE: bool>(machine: &mut Machine) -> Result<Flow, Fault> {
    let byte = machine.fetch_opcode()?;
    if USE_TABLE {
        TABLE[byte as usize](machine)
    } else {
        match Opcode::from_byte(byte) {
            Some(opcode) => dispatch_match(machine, opcode),
            None => unimplemented(machine),
        }
    }
}

pub(crate) fn step(machine: &mut Machine) -> Result<Flow, Fault> {
    execute_one::<JUMP_TABLE>(machine)
}

/// Fetch-execute loop. The outer loop re-checks the status; with
/// `FAST` set, handlers returning [`Flow::Next`] go straight to the next fetch.
pub(crate) fn run_loop<const USE_TABLE: bool, const FAST: bool>(machine: &mut Machine) {
    while machine.status == MachineStatus::Running {
        loop {
            match execute_one::<USE_TABLE>(machine) {
                Ok(Flow::Next) if FAST => continue,
                Ok(_) => break,
                Err(fault) => {
                    machine.raise(fault);
                    break;
                }
            }
        }
    }
}
