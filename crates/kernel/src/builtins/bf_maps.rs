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

use grange_compiler::offset_for_builtin;
use grange_var::Error::{E_QUOTA, E_TYPE};
use grange_var::{v_bool, v_list, Map, Var, Variant};

use crate::builtins::BfRet::Ret;
use crate::builtins::{BfCallState, BfErr, BfRet, BuiltinFunction};

fn map_arg<'a>(bf_args: &'a BfCallState<'_, '_>, n: usize) -> Result<&'a Map, BfErr> {
    match bf_args.args.get(n).map(|v| v.variant()) {
        Some(Variant::Map(m)) => Ok(m),
        Some(_) => Err(BfErr::Code(E_TYPE)),
        None => Err(BfErr::Code(grange_var::Error::E_ARGS)),
    }
}

/// Keys in canonical order.
fn bf_mapkeys(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let map = map_arg(bf_args, 0)?;
    Ok(Ret(v_list(&map.keys())))
}

/// `mapvalues(m)` is all values in key order; `mapvalues(m, k1, k2, ...)`
/// selects values in argument order, `E_RANGE` on a missing key.
fn bf_mapvalues(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let map = map_arg(bf_args, 0)?.clone();
    if bf_args.args.len() == 1 {
        return Ok(Ret(v_list(&map.values())));
    }
    let mut out = Vec::with_capacity(bf_args.args.len() - 1);
    for key in &bf_args.args[1..] {
        out.push(map.get(key).map_err(BfErr::Code)?);
    }
    Ok(Ret(v_list(&out)))
}

fn bf_mapdelete(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let map = map_arg(bf_args, 0)?;
    let key = &bf_args.args[1];
    let (new, _removed) = map.remove(key).map_err(BfErr::Code)?;
    let v = Var::from_variant(Variant::Map(new));
    if v.size_bytes() > bf_args.ctx.world.options.get().max_map_value_bytes {
        return Err(BfErr::Code(E_QUOTA));
    }
    Ok(Ret(v))
}

fn bf_maphaskey(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let map = map_arg(bf_args, 0)?;
    let key = &bf_args.args[1];
    let has = map.contains_key(key).map_err(BfErr::Code)?;
    Ok(Ret(v_bool(has)))
}

pub(crate) fn register_bf_maps(builtins: &mut [BuiltinFunction]) {
    builtins[offset_for_builtin("mapkeys")] = bf_mapkeys;
    builtins[offset_for_builtin("mapvalues")] = bf_mapvalues;
    builtins[offset_for_builtin("mapdelete")] = bf_mapdelete;
    builtins[offset_for_builtin("maphaskey")] = bf_maphaskey;
}
