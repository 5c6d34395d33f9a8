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
use grange_db::{is_builtin_property, parse_prop_perms, prop_perms_string, PropFlag};
use grange_var::Error::{E_INVARG, E_PERM, E_TYPE};
use grange_var::{v_bool, v_int, v_list, v_objid, v_str, v_string, Objid, Variant};

use crate::builtins::BfRet::Ret;
use crate::builtins::{BfCallState, BfErr, BfRet, BuiltinFunction};

fn obj_arg(bf_args: &BfCallState<'_, '_>, n: usize) -> Result<Objid, BfErr> {
    let id = match bf_args.args.get(n).map(|v| v.variant()) {
        Some(Variant::Obj(o)) => *o,
        Some(Variant::Anon(a)) => *a,
        Some(_) => return Err(BfErr::Code(E_TYPE)),
        None => return Err(BfErr::Code(grange_var::Error::E_ARGS)),
    };
    if !bf_args.ctx.world.store.valid(id) {
        return Err(BfErr::Code(E_INVARG));
    }
    Ok(id)
}

fn name_arg<'a>(bf_args: &'a BfCallState<'_, '_>, n: usize) -> Result<&'a str, BfErr> {
    match bf_args.args.get(n).map(|v| v.variant()) {
        Some(Variant::Str(s)) => Ok(s.as_str()),
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

fn can_read(bf_args: &BfCallState<'_, '_>, owner: Objid, readable: bool) -> bool {
    readable || bf_args.task_perms_who() == owner || bf_args.is_wizard()
}

fn can_write(bf_args: &BfCallState<'_, '_>, owner: Objid, writable: bool) -> bool {
    writable || bf_args.task_perms_who() == owner || bf_args.is_wizard()
}

/// Property names defined right on the object.
fn bf_properties(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args, 0)?;
    let o = bf_args
        .ctx
        .world
        .store
        .get(obj)
        .map_err(|e| BfErr::Code(e.into()))?;
    let names: Vec<_> = o
        .properties
        .iter()
        .filter(|p| p.defined)
        .map(|p| v_str(&p.name))
        .collect();
    Ok(Ret(v_list(&names)))
}

fn bf_property_info(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args, 0)?;
    let name = name_arg(bf_args, 1)?;
    let info = bf_args
        .ctx
        .world
        .store
        .property_info(obj, name)
        .map_err(|e| BfErr::Code(e.into()))?;
    if !can_read(bf_args, info.owner, info.perms.contains(PropFlag::Read)) {
        return Err(BfErr::Code(E_PERM));
    }
    Ok(Ret(v_list(&[
        v_objid(info.owner),
        v_string(prop_perms_string(info.perms)),
    ])))
}

fn bf_set_property_info(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args, 0)?;
    let name = name_arg(bf_args, 1)?.to_string();
    let Variant::List(info) = bf_args.args[2].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    if info.len() < 2 || info.len() > 3 {
        return Err(BfErr::Code(E_INVARG));
    }
    let Variant::Obj(new_owner) = info.get(0).unwrap().variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let Variant::Str(perms_str) = info.get(1).unwrap().variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let new_name = match info.get(2) {
        None => None,
        Some(v) => match v.variant() {
            Variant::Str(s) => Some(s.as_str().to_string()),
            _ => return Err(BfErr::Code(E_TYPE)),
        },
    };
    let Some(new_perms) = parse_prop_perms(perms_str.as_str()) else {
        return Err(BfErr::Code(E_INVARG));
    };
    let new_owner = *new_owner;
    if !bf_args.is_wizard() {
        let info = bf_args
            .ctx
            .world
            .store
            .property_info(obj, &name)
            .map_err(|e| BfErr::Code(e.into()))?;
        if info.owner != bf_args.task_perms_who() {
            return Err(BfErr::Code(E_PERM));
        }
        if new_owner != info.owner {
            return Err(BfErr::Code(E_PERM));
        }
    }
    if let Some(new_name) = &new_name {
        if is_builtin_property(new_name) {
            return Err(BfErr::Code(E_INVARG));
        }
    }

    let store = &mut bf_args.ctx.world.store;
    let o = store.get_mut(obj).map_err(|e| BfErr::Code(e.into()))?;
    let Some(slot) = o.find_property_mut(&name) else {
        return Err(BfErr::Code(grange_var::Error::E_PROPNF));
    };
    slot.owner = new_owner;
    slot.perms = new_perms;
    if let Some(new_name) = new_name {
        slot.name = new_name;
    }
    store.note_verb_change();
    Ok(Ret(v_int(0)))
}

fn bf_add_property(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args, 0)?;
    let name = name_arg(bf_args, 1)?.to_string();
    let value = bf_args.args[2].clone();
    let Variant::List(info) = bf_args.args[3].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    if info.len() != 2 {
        return Err(BfErr::Code(E_INVARG));
    }
    let Variant::Obj(owner) = info.get(0).unwrap().variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let Variant::Str(perms_str) = info.get(1).unwrap().variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let Some(perms) = parse_prop_perms(perms_str.as_str()) else {
        return Err(BfErr::Code(E_INVARG));
    };
    let owner = *owner;
    bf_args.require_controls(obj)?;
    if !bf_args.ctx.world.store.valid(owner) {
        return Err(BfErr::Code(E_INVARG));
    }
    if owner != bf_args.task_perms_who() && !bf_args.is_wizard() {
        return Err(BfErr::Code(E_PERM));
    }
    bf_args
        .ctx
        .world
        .store
        .add_property(obj, &name, value, owner, perms)
        .map_err(|e| BfErr::Code(e.into()))?;
    Ok(Ret(v_int(0)))
}

fn bf_delete_property(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args, 0)?;
    let name = name_arg(bf_args, 1)?.to_string();
    bf_args.require_controls(obj)?;
    bf_args
        .ctx
        .world
        .store
        .delete_property(obj, &name)
        .map_err(|e| BfErr::Code(e.into()))?;
    Ok(Ret(v_int(0)))
}

/// `clear_property` acts only on inherited (non-defined) slots; built-in
/// pseudo-properties are permission errors.
fn bf_clear_property(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args, 0)?;
    let name = name_arg(bf_args, 1)?.to_string();
    if is_builtin_property(&name) {
        return Err(BfErr::Code(E_PERM));
    }
    let info = bf_args
        .ctx
        .world
        .store
        .property_info(obj, &name)
        .map_err(|e| BfErr::Code(e.into()))?;
    if !can_write(bf_args, info.owner, info.perms.contains(PropFlag::Write)) {
        return Err(BfErr::Code(E_PERM));
    }
    bf_args
        .ctx
        .world
        .store
        .clear_property(obj, &name)
        .map_err(|e| BfErr::Code(e.into()))?;
    Ok(Ret(v_int(0)))
}

fn bf_is_clear_property(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args, 0)?;
    let name = name_arg(bf_args, 1)?;
    if is_builtin_property(name) {
        return Ok(Ret(v_bool(false)));
    }
    let info = bf_args
        .ctx
        .world
        .store
        .property_info(obj, name)
        .map_err(|e| BfErr::Code(e.into()))?;
    if !can_read(bf_args, info.owner, info.perms.contains(PropFlag::Read)) {
        return Err(BfErr::Code(E_PERM));
    }
    Ok(Ret(v_bool(info.clear)))
}

pub(crate) fn register_bf_properties(builtins: &mut [BuiltinFunction]) {
    builtins[offset_for_builtin("properties")] = bf_properties;
    builtins[offset_for_builtin("property_info")] = bf_property_info;
    builtins[offset_for_builtin("set_property_info")] = bf_set_property_info;
    builtins[offset_for_builtin("add_property")] = bf_add_property;
    builtins[offset_for_builtin("delete_property")] = bf_delete_property;
    builtins[offset_for_builtin("clear_property")] = bf_clear_property;
    builtins[offset_for_builtin("is_clear_property")] = bf_is_clear_property;
}
