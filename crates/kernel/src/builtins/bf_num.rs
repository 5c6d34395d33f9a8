// Copyright (C) 2026 The grange authors. This program is free software: you
// can redistribute it and/or modify it under the terms of the GNU General
// Public License as published by the Free Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Local, TimeZone};
use rand::Rng;

use grange_compiler::offset_for_builtin;
use grange_var::Error::{E_FLOAT, E_INVARG, E_TYPE};
use grange_var::{v_float, v_int, v_str, v_string, Var, Variant};

use crate::builtins::BfRet::Ret;
use crate::builtins::{BfCallState, BfErr, BfRet, BuiltinFunction};

fn numeric(v: &Var) -> Result<f64, BfErr> {
    match v.variant() {
        Variant::Int(i) => Ok(*i as f64),
        Variant::Float(f) => Ok(*f),
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

fn finite(f: f64) -> Result<BfRet, BfErr> {
    if f.is_finite() {
        Ok(Ret(v_float(f)))
    } else {
        Err(BfErr::Code(E_FLOAT))
    }
}

fn bf_abs(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    match bf_args.args[0].variant() {
        Variant::Int(i) => Ok(Ret(v_int(i.wrapping_abs()))),
        Variant::Float(f) => Ok(Ret(v_float(f.abs()))),
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

/// `min`/`max` follow numeric ordering across Int and Float, returning the
/// winning argument unchanged.
fn extremum(bf_args: &BfCallState<'_, '_>, want_max: bool) -> Result<BfRet, BfErr> {
    let mut best = bf_args.args[0].clone();
    for arg in &bf_args.args[1..] {
        let ordering = arg.cmp_moo(&best).map_err(BfErr::Code)?;
        if (want_max && ordering.is_gt()) || (!want_max && ordering.is_lt()) {
            best = arg.clone();
        }
    }
    Ok(Ret(best))
}

fn bf_min(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    extremum(bf_args, false)
}

fn bf_max(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    extremum(bf_args, true)
}

fn bf_random(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let limit = if bf_args.args.is_empty() {
        i32::MAX as i64
    } else {
        let Variant::Int(i) = bf_args.args[0].variant() else {
            return Err(BfErr::Code(E_TYPE));
        };
        *i
    };
    if limit < 1 {
        return Err(BfErr::Code(E_INVARG));
    }
    Ok(Ret(v_int(rand::rng().random_range(1..=limit))))
}

fn bf_time(_bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch");
    Ok(Ret(v_int(now.as_secs() as i64)))
}

fn bf_ftime(_bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch");
    Ok(Ret(v_float(now.as_secs_f64())))
}

fn bf_ctime(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let when = if bf_args.args.is_empty() {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock before epoch")
            .as_secs() as i64
    } else {
        let Variant::Int(t) = bf_args.args[0].variant() else {
            return Err(BfErr::Code(E_TYPE));
        };
        *t
    };
    let Some(datetime) = Local.timestamp_opt(when, 0).single() else {
        return Err(BfErr::Code(E_INVARG));
    };
    Ok(Ret(v_string(
        datetime.format("%a %b %e %H:%M:%S %Y").to_string(),
    )))
}

fn bf_floatstr(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let Variant::Float(f) = bf_args.args[0].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let Variant::Int(precision) = bf_args.args[1].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    if *precision < 0 {
        return Err(BfErr::Code(E_INVARG));
    }
    let precision = (*precision).min(19) as usize;
    let scientific = bf_args.args.get(2).map(|v| v.is_true()).unwrap_or(false);
    let out = if scientific {
        format!("{f:.precision$e}")
    } else {
        format!("{f:.precision$}")
    };
    Ok(Ret(v_string(out)))
}

macro_rules! simple_float_fn {
    ( $name:ident, $method:ident ) => {
        fn $name(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
            let x = numeric(&bf_args.args[0])?;
            finite(x.$method())
        }
    };
}

simple_float_fn!(bf_sin, sin);
simple_float_fn!(bf_cos, cos);
simple_float_fn!(bf_tan, tan);
simple_float_fn!(bf_sinh, sinh);
simple_float_fn!(bf_cosh, cosh);
simple_float_fn!(bf_tanh, tanh);
simple_float_fn!(bf_exp, exp);
simple_float_fn!(bf_ceil, ceil);
simple_float_fn!(bf_floor, floor);
simple_float_fn!(bf_trunc, trunc);

fn bf_sqrt(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let x = numeric(&bf_args.args[0])?;
    if x < 0.0 {
        return Err(BfErr::Code(E_FLOAT));
    }
    finite(x.sqrt())
}

fn bf_asin(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let x = numeric(&bf_args.args[0])?;
    if !(-1.0..=1.0).contains(&x) {
        return Err(BfErr::Code(E_FLOAT));
    }
    finite(x.asin())
}

fn bf_acos(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let x = numeric(&bf_args.args[0])?;
    if !(-1.0..=1.0).contains(&x) {
        return Err(BfErr::Code(E_FLOAT));
    }
    finite(x.acos())
}

fn bf_atan(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let y = numeric(&bf_args.args[0])?;
    if bf_args.args.len() == 2 {
        let x = numeric(&bf_args.args[1])?;
        finite(y.atan2(x))
    } else {
        finite(y.atan())
    }
}

fn bf_log(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let x = numeric(&bf_args.args[0])?;
    if x <= 0.0 {
        return Err(BfErr::Code(E_FLOAT));
    }
    finite(x.ln())
}

fn bf_log10(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let x = numeric(&bf_args.args[0])?;
    if x <= 0.0 {
        return Err(BfErr::Code(E_FLOAT));
    }
    finite(x.log10())
}

pub(crate) fn register_bf_num(builtins: &mut [BuiltinFunction]) {
    builtins[offset_for_builtin("abs")] = bf_abs;
    builtins[offset_for_builtin("min")] = bf_min;
    builtins[offset_for_builtin("max")] = bf_max;
    builtins[offset_for_builtin("random")] = bf_random;
    builtins[offset_for_builtin("time")] = bf_time;
    builtins[offset_for_builtin("ftime")] = bf_ftime;
    builtins[offset_for_builtin("ctime")] = bf_ctime;
    builtins[offset_for_builtin("floatstr")] = bf_floatstr;
    builtins[offset_for_builtin("sqrt")] = bf_sqrt;
    builtins[offset_for_builtin("sin")] = bf_sin;
    builtins[offset_for_builtin("cos")] = bf_cos;
    builtins[offset_for_builtin("tan")] = bf_tan;
    builtins[offset_for_builtin("asin")] = bf_asin;
    builtins[offset_for_builtin("acos")] = bf_acos;
    builtins[offset_for_builtin("atan")] = bf_atan;
    builtins[offset_for_builtin("sinh")] = bf_sinh;
    builtins[offset_for_builtin("cosh")] = bf_cosh;
    builtins[offset_for_builtin("tanh")] = bf_tanh;
    builtins[offset_for_builtin("exp")] = bf_exp;
    builtins[offset_for_builtin("log")] = bf_log;
    builtins[offset_for_builtin("log10")] = bf_log10;
    builtins[offset_for_builtin("ceil")] = bf_ceil;
    builtins[offset_for_builtin("floor")] = bf_floor;
    builtins[offset_for_builtin("trunc")] = bf_trunc;
}
