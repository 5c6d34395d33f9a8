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

use md5::Digest;

use grange_compiler::offset_for_builtin;
use grange_var::Error::{E_INVARG, E_QUOTA, E_RANGE, E_TYPE};
use grange_var::{
    to_display, to_literal, v_bool, v_err, v_float, v_int, v_objid, v_str, v_string, Objid,
    Variant,
};

use crate::builtins::BfRet::Ret;
use crate::builtins::{BfCallState, BfErr, BfRet, BuiltinFunction};

fn bf_typeof(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let arg = &bf_args.args[0];
    Ok(Ret(v_int(arg.type_code() as i64)))
}

fn bf_tostr(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let mut result = String::new();
    for arg in &bf_args.args {
        result.push_str(&to_display(arg));
    }
    if result.len() > bf_args.ctx.world.options.get().max_string_concat {
        return Err(BfErr::Code(E_QUOTA));
    }
    Ok(Ret(v_string(result)))
}

fn bf_toliteral(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let literal = to_literal(&bf_args.args[0]);
    if literal.len() > bf_args.ctx.world.options.get().max_string_concat {
        return Err(BfErr::Code(E_QUOTA));
    }
    Ok(Ret(v_string(literal)))
}

fn bf_toint(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    match bf_args.args[0].variant() {
        Variant::Int(i) => Ok(Ret(v_int(*i))),
        Variant::Float(f) => Ok(Ret(v_int(*f as i64))),
        Variant::Obj(o) => Ok(Ret(v_int(o.0))),
        Variant::Err(e) => Ok(Ret(v_int(*e as i64))),
        Variant::Str(s) => {
            // Numeric prefix parse; garbage is just 0, as ever.
            let trimmed = s.as_str().trim();
            match trimmed.parse::<i64>() {
                Ok(i) => Ok(Ret(v_int(i))),
                Err(_) => match trimmed.parse::<f64>() {
                    Ok(f) => Ok(Ret(v_int(f as i64))),
                    Err(_) => Ok(Ret(v_int(0))),
                },
            }
        }
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

fn bf_tofloat(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    match bf_args.args[0].variant() {
        Variant::Int(i) => Ok(Ret(v_float(*i as f64))),
        Variant::Float(f) => Ok(Ret(v_float(*f))),
        Variant::Err(e) => Ok(Ret(v_float(*e as u8 as f64))),
        Variant::Str(s) => match s.as_str().trim().parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(Ret(v_float(f))),
            _ => Ok(Ret(v_float(0.0))),
        },
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

fn bf_toobj(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    match bf_args.args[0].variant() {
        Variant::Int(i) => Ok(Ret(v_objid(Objid(*i)))),
        Variant::Float(f) => Ok(Ret(v_objid(Objid(*f as i64)))),
        Variant::Obj(o) => Ok(Ret(v_objid(*o))),
        Variant::Str(s) => {
            let s = s.as_str().trim();
            let stripped = s.strip_prefix('#').unwrap_or(s);
            match stripped.parse::<i64>() {
                Ok(i) => Ok(Ret(v_objid(Objid(i)))),
                Err(_) => Ok(Ret(v_objid(Objid(0)))),
            }
        }
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

fn bf_equal(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let result = bf_args.args[0].eq_case_sensitive(&bf_args.args[1]);
    Ok(Ret(v_bool(result)))
}

fn bf_value_bytes(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_int(bf_args.args[0].size_bytes() as i64)))
}

fn bf_value_hash(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let literal = to_literal(&bf_args.args[0]);
    if bf_args.args.len() == 2 {
        let Variant::Str(algo) = bf_args.args[1].variant() else {
            return Err(BfErr::Code(E_TYPE));
        };
        return crate::builtins::bf_strings::hash_bytes(algo.as_str(), literal.as_bytes())
            .map(|h| Ret(v_string(h)));
    }
    let digest = md5::Md5::digest(literal.as_bytes());
    Ok(Ret(v_string(format!("{digest:x}").to_uppercase())))
}

fn bf_length(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    match bf_args.args[0].len() {
        Ok(len) => Ok(Ret(v_int(len as i64))),
        Err(e) => Err(BfErr::Code(e)),
    }
}

fn bf_error_message(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let Variant::Err(e) = bf_args.args[0].variant() else {
        return Err(BfErr::Code(E_INVARG));
    };
    Ok(Ret(v_str(e.message())))
}

fn bf_error_code(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let Variant::Err(e) = bf_args.args[0].variant() else {
        return Err(BfErr::Code(E_INVARG));
    };
    Ok(Ret(v_err(*e)))
}

/// Both `generate_json` and `parse_json` live here with the other pure
/// value transformers.
fn bf_generate_json(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let json = var_to_json(&bf_args.args[0])?;
    let out = serde_json::to_string(&json).map_err(|_| BfErr::Code(E_INVARG))?;
    Ok(Ret(v_string(out)))
}

fn var_to_json(v: &grange_var::Var) -> Result<serde_json::Value, BfErr> {
    use serde_json::Value;
    match v.variant() {
        Variant::Int(i) => Ok(Value::from(*i)),
        Variant::Float(f) => {
            if !f.is_finite() {
                return Err(BfErr::Code(grange_var::Error::E_FLOAT));
            }
            Ok(Value::from(*f))
        }
        Variant::Str(s) => Ok(Value::from(s.as_str())),
        Variant::Obj(o) => Ok(Value::from(o.to_string())),
        Variant::Err(e) => Ok(Value::from(e.name())),
        Variant::List(l) => {
            let mut arr = Vec::with_capacity(l.len());
            for e in l.iter() {
                arr.push(var_to_json(e)?);
            }
            Ok(Value::Array(arr))
        }
        Variant::Map(m) => {
            let mut obj = serde_json::Map::new();
            for (k, val) in m.iter() {
                let key = match k.variant() {
                    Variant::Str(s) => s.as_str().to_string(),
                    Variant::Int(i) => i.to_string(),
                    Variant::Float(f) => grange_var::format_float(*f),
                    Variant::Obj(o) => o.to_string(),
                    Variant::Err(e) => e.name().to_string(),
                    _ => return Err(BfErr::Code(E_INVARG)),
                };
                obj.insert(key, var_to_json(&val)?);
            }
            Ok(Value::Object(obj))
        }
        _ => Err(BfErr::Code(E_INVARG)),
    }
}

fn json_to_var(v: &serde_json::Value) -> Result<grange_var::Var, BfErr> {
    use serde_json::Value;
    match v {
        Value::Null => Ok(v_int(0)),
        Value::Bool(b) => Ok(v_bool(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(v_int(i))
            } else if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    return Err(BfErr::Code(grange_var::Error::E_FLOAT));
                }
                Ok(v_float(f))
            } else {
                Err(BfErr::Code(E_RANGE))
            }
        }
        Value::String(s) => Ok(v_string(s.clone())),
        Value::Array(arr) => {
            let mut out = Vec::with_capacity(arr.len());
            for e in arr {
                out.push(json_to_var(e)?);
            }
            Ok(grange_var::v_list(&out))
        }
        Value::Object(o) => {
            let mut m = grange_var::Map::empty();
            for (k, val) in o {
                m = m
                    .insert(&v_str(k), &json_to_var(val)?)
                    .map_err(BfErr::Code)?;
            }
            Ok(grange_var::Var::from_variant(Variant::Map(m)))
        }
    }
}

fn bf_parse_json(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let Variant::Str(s) = bf_args.args[0].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let parsed: serde_json::Value =
        serde_json::from_str(s.as_str()).map_err(|_| BfErr::Code(E_INVARG))?;
    Ok(Ret(json_to_var(&parsed)?))
}

pub(crate) fn register_bf_values(builtins: &mut [BuiltinFunction]) {
    builtins[offset_for_builtin("typeof")] = bf_typeof;
    builtins[offset_for_builtin("tostr")] = bf_tostr;
    builtins[offset_for_builtin("toliteral")] = bf_toliteral;
    builtins[offset_for_builtin("toint")] = bf_toint;
    builtins[offset_for_builtin("tonum")] = bf_toint;
    builtins[offset_for_builtin("tofloat")] = bf_tofloat;
    builtins[offset_for_builtin("toobj")] = bf_toobj;
    builtins[offset_for_builtin("equal")] = bf_equal;
    builtins[offset_for_builtin("value_bytes")] = bf_value_bytes;
    builtins[offset_for_builtin("value_hash")] = bf_value_hash;
    builtins[offset_for_builtin("length")] = bf_length;
    builtins[offset_for_builtin("error_message")] = bf_error_message;
    builtins[offset_for_builtin("error_code")] = bf_error_code;
    builtins[offset_for_builtin("generate_json")] = bf_generate_json;
    builtins[offset_for_builtin("parse_json")] = bf_parse_json;
}
