//! Host modules shipped with the runtime, registered through the bridge.

use crate::error::Result;
use crate::pool::Ref;
use crate::vm::Vm;

/// Register every standard module.
pub fn register_std(vm: &mut Vm) -> Result<()> {
    register_math(vm)?;
    register_values(vm)?;
    Ok(())
}

fn register_math(vm: &mut Vm) -> Result<()> {
    vm.module("math")?
        .value("pi", std::f64::consts::PI)?
        .value("e", std::f64::consts::E)?
        .func("abs", |x: f64| x.abs())?
        .func("min", |a: f64, b: f64| a.min(b))?
        .func("max", |a: f64, b: f64| a.max(b))?
        .func("floor", |x: f64| x.floor())?
        .func("ceil", |x: f64| x.ceil())?
        .func("sqrt", |x: f64| x.sqrt())?
        .func("pow", |a: f64, b: f64| a.powf(b))?
        .finish();
    Ok(())
}

/// Depth bound for `values.dump`; keeps cyclic containers printable.
const DUMP_DEPTH: usize = 4;

fn register_values(vm: &mut Vm) -> Result<()> {
    vm.module("values")?
        .func("dump", |vm: &mut Vm, v: Ref| {
            vm.pool.dump_to_string(v, DUMP_DEPTH)
        })?
        .func("type", |vm: &mut Vm, v: Ref| vm.typ(v).name().to_owned())?
        .func("copy", |vm: &mut Vm, v: Ref| vm.pool.dupe(v))?
        .finish();
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
