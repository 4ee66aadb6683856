use crate::scalar::Real;

use super::{Fault, Flow, Machine};

#[inline(always)]
fn dyadic<F: Real>(machine: &mut Machine, op: impl FnOnce(F, F) -> F) -> Result<Flow, Fault> {
    let dst = machine.ea_dst(F::SIZE)?;
    let src = machine.ea_src(F::SIZE)?;
    let value = op(machine.read::<F>(dst), machine.read::<F>(src));
    machine.write(dst, value);
    Ok(Flow::Next)
}

#[inline(always)]
fn monadic<F: Real>(machine: &mut Machine, op: impl FnOnce(F) -> F) -> Result<Flow, Fault> {
    let dst = machine.ea_dst(F::SIZE)?;
    let src = machine.ea_src(F::SIZE)?;
    let value = op(machine.read::<F>(src));
    machine.write(dst, value);
    Ok(Flow::Next)
}

pub(super) fn fadd<F: Real>(machine: &mut Machine) -> Result<Flow, Fault> {
    dyadic::<F>(machine, |a, b| a + b)
}

pub(super) fn fsub<F: Real>(machine: &mut Machine) -> Result<Flow, Fault> {
    dyadic::<F>(machine, |a, b| a - b)
}

pub(super) fn fmul<F: Real>(machine: &mut Machine) -> Result<Flow, Fault> {
    dyadic::<F>(machine, |a, b| a * b)
}

pub(super) fn fdiv<F: Real>(machine: &mut Machine) -> Result<Flow, Fault> {
    dyadic::<F>(machine, |a, b| a / b)
}

pub(super) fn fmod<F: Real>(machine: &mut Machine) -> Result<Flow, Fault> {
    dyadic::<F>(machine, |a, b| a % b)
}

pub(super) fn fneg<F: Real>(machine: &mut Machine) -> Result<Flow, Fault> {
    monadic::<F>(machine, |a| -a)
}

pub(super) fn finv<F: Real>(machine: &mut Machine) -> Result<Flow, Fault> {
    monadic::<F>(machine, |a| F::ONE / a)
}

macro_rules! transcendental {
    ($($handler:ident => $method:ident,)*) => {
        $(
            pub(super) fn $handler<F: Real>(machine: &mut Machine) -> Result<Flow, Fault> {
                monadic::<F>(machine, F::$method)
            }
        )*
    };
}

transcendental! {
    fabs => abs,
    fsqrt => sqrt,
    facos => acos,
    fasin => asin,
    fatan => atan,
    fcos => cos,
    fsin => sin,
    ftan => tan,
    fcosh => cosh,
    fsinh => sinh,
    ftanh => tanh,
    fetox => exp,
    flogn => ln,
    flog2 => log2,
    flog10 => log10,
    ftwotox => exp2,
}
