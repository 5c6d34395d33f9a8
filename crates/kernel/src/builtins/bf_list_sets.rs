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
use grange_var::Error::{E_QUOTA, E_RANGE, E_TYPE};
use grange_var::{v_int, v_list, List, Var, Variant};

use crate::builtins::BfRet::Ret;
use crate::builtins::{BfCallState, BfErr, BfRet, BuiltinFunction};

fn list_arg<'a>(bf_args: &'a BfCallState<'_, '_>, n: usize) -> Result<&'a List, BfErr> {
    match bf_args.args.get(n).map(|v| v.variant()) {
        Some(Variant::List(l)) => Ok(l),
        Some(_) => Err(BfErr::Code(E_TYPE)),
        None => Err(BfErr::Code(grange_var::Error::E_ARGS)),
    }
}

/// Produced lists are bounded by the loaded `max_list_value_bytes` option.
fn checked(bf_args: &BfCallState<'_, '_>, list: List) -> Result<BfRet, BfErr> {
    let v = Var::from_variant(Variant::List(list));
    if v.size_bytes() > bf_args.ctx.world.options.get().max_list_value_bytes {
        return Err(BfErr::Code(E_QUOTA));
    }
    Ok(Ret(v))
}

fn bf_setadd(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let list = list_arg(bf_args, 0)?;
    let value = &bf_args.args[1];
    if list.contains(value, false) {
        return Ok(Ret(bf_args.args[0].clone()));
    }
    let new = list.push(value.clone());
    checked(bf_args, new)
}

fn bf_setremove(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let list = list_arg(bf_args, 0)?;
    let value = &bf_args.args[1];
    match list.index_of(value, false) {
        Some(pos) => {
            let new = list.remove_at(pos).map_err(BfErr::Code)?;
            Ok(Ret(Var::from_variant(Variant::List(new))))
        }
        None => Ok(Ret(bf_args.args[0].clone())),
    }
}

/// `listappend(list, value [, index])`: insert after `index` (default: the
/// end).
fn bf_listappend(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let list = list_arg(bf_args, 0)?;
    let value = bf_args.args[1].clone();
    let index = match bf_args.args.get(2) {
        None => list.len(),
        Some(v) => match v.variant() {
            Variant::Int(i) if *i >= 0 => (*i as usize).min(list.len()),
            Variant::Int(_) => return Err(BfErr::Code(E_RANGE)),
            _ => return Err(BfErr::Code(E_TYPE)),
        },
    };
    let new = list.insert_at(index, value).map_err(BfErr::Code)?;
    checked(bf_args, new)
}

/// `listinsert(list, value [, index])`: insert before `index` (default: the
/// front).
fn bf_listinsert(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let list = list_arg(bf_args, 0)?;
    let value = bf_args.args[1].clone();
    let index = match bf_args.args.get(2) {
        None => 0,
        Some(v) => match v.variant() {
            Variant::Int(i) if *i >= 1 => (*i as usize - 1).min(list.len()),
            Variant::Int(_) => return Err(BfErr::Code(E_RANGE)),
            _ => return Err(BfErr::Code(E_TYPE)),
        },
    };
    let new = list.insert_at(index, value).map_err(BfErr::Code)?;
    checked(bf_args, new)
}

fn one_based_index(v: &Var, len: usize) -> Result<usize, BfErr> {
    let Variant::Int(i) = v.variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    if *i < 1 || *i as usize > len {
        return Err(BfErr::Code(E_RANGE));
    }
    Ok(*i as usize - 1)
}

fn bf_listdelete(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let list = list_arg(bf_args, 0)?;
    let index = one_based_index(&bf_args.args[1], list.len())?;
    let new = list.remove_at(index).map_err(BfErr::Code)?;
    Ok(Ret(Var::from_variant(Variant::List(new))))
}

fn bf_listset(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let list = list_arg(bf_args, 0)?;
    let value = bf_args.args[1].clone();
    let index = one_based_index(&bf_args.args[2], list.len())?;
    let new = list.set(index, value).map_err(BfErr::Code)?;
    checked(bf_args, new)
}

/// Case-sensitive membership, 1-based position or 0.
fn bf_is_member(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let value = &bf_args.args[0];
    let list = list_arg(bf_args, 1)?;
    Ok(Ret(v_int(
        list.index_of(value, true).map(|p| p as i64 + 1).unwrap_or(0),
    )))
}

fn bf_all_members(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let value = &bf_args.args[0];
    let list = list_arg(bf_args, 1)?;
    let hits: Vec<Var> = list
        .iter()
        .enumerate()
        .filter(|(_, e)| *e == value)
        .map(|(i, _)| v_int(i as i64 + 1))
        .collect();
    Ok(Ret(v_list(&hits)))
}

fn bf_reverse(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    match bf_args.args[0].variant() {
        Variant::List(l) => {
            let reversed: Vec<Var> = l.iter().rev().cloned().collect();
            Ok(Ret(v_list(&reversed)))
        }
        Variant::Str(s) => Ok(Ret(grange_var::v_string(
            s.as_str().chars().rev().collect(),
        ))),
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

/// `sort(list [, keys [, natural [, reverse]]])`: stable sort by the
/// canonical scalar ordering.
fn bf_sort(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let list = list_arg(bf_args, 0)?;
    let keys = match bf_args.args.get(1) {
        None => None,
        Some(v) => match v.variant() {
            Variant::List(k) if k.is_empty() => None,
            Variant::List(k) => {
                if k.len() != list.len() {
                    return Err(BfErr::Code(grange_var::Error::E_INVARG));
                }
                Some(k.clone())
            }
            _ => return Err(BfErr::Code(E_TYPE)),
        },
    };
    let reverse = bf_args.args.get(3).map(|v| v.is_true()).unwrap_or(false);

    let mut indexed: Vec<usize> = (0..list.len()).collect();
    // Comparison failures (mixed incomparable types) must surface; probe
    // first, then sort with the now-total comparator.
    {
        let key_at = |i: usize| -> &Var {
            match &keys {
                Some(k) => k.get(i).unwrap(),
                None => list.get(i).unwrap(),
            }
        };
        for w in indexed.windows(2) {
            key_at(w[0]).cmp_moo(key_at(w[1])).map_err(BfErr::Code)?;
        }
        indexed.sort_by(|a, b| {
            key_at(*a)
                .cmp_moo(key_at(*b))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }
    if reverse {
        indexed.reverse();
    }
    let sorted: Vec<Var> = indexed
        .into_iter()
        .map(|i| list.get(i).unwrap().clone())
        .collect();
    Ok(Ret(v_list(&sorted)))
}

/// First-occurrence deduplication.
fn bf_unique(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let list = list_arg(bf_args, 0)?;
    let mut out: Vec<Var> = vec![];
    for e in list.iter() {
        if !out.iter().any(|seen| seen == e) {
            out.push(e.clone());
        }
    }
    Ok(Ret(v_list(&out)))
}

/// `slice(list-of-lists [, index])`: the `index`th element of each member.
fn bf_slice(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let list = list_arg(bf_args, 0)?;
    let index = match bf_args.args.get(1) {
        None => v_int(1),
        Some(v) => v.clone(),
    };
    let mut out = vec![];
    for member in list.iter() {
        out.push(member.index(&index).map_err(BfErr::Code)?);
    }
    checked(bf_args, out.into_iter().collect())
}

pub(crate) fn register_bf_list_sets(builtins: &mut [BuiltinFunction]) {
    builtins[offset_for_builtin("setadd")] = bf_setadd;
    builtins[offset_for_builtin("setremove")] = bf_setremove;
    builtins[offset_for_builtin("listappend")] = bf_listappend;
    builtins[offset_for_builtin("listinsert")] = bf_listinsert;
    builtins[offset_for_builtin("listdelete")] = bf_listdelete;
    builtins[offset_for_builtin("listset")] = bf_listset;
    builtins[offset_for_builtin("is_member")] = bf_is_member;
    builtins[offset_for_builtin("all_members")] = bf_all_members;
    builtins[offset_for_builtin("reverse")] = bf_reverse;
    builtins[offset_for_builtin("sort")] = bf_sort;
    builtins[offset_for_builtin("unique")] = bf_unique;
    builtins[offset_for_builtin("slice")] = bf_slice;
}
