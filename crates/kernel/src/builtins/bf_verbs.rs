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

use std::sync::Arc;

use grange_compiler::{compile, Program};
use grange_compiler::offset_for_builtin;
use grange_db::{
    parse_verb_perms, verb_perms_string, ArgSpec, Verb, VerbArgsSpec, VerbFlag,
};
use grange_var::Error::{E_INVARG, E_PERM, E_TYPE, E_VERBNF};
use grange_var::{v_bool, v_int, v_list, v_objid, v_str, v_string, Objid, Var, Variant};

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

/// Resolve a verb designator — a name or a 1-based index — against the
/// verbs defined on `obj` itself.
fn verb_index(bf_args: &BfCallState<'_, '_>, obj: Objid, n: usize) -> Result<usize, BfErr> {
    let o = bf_args
        .ctx
        .world
        .store
        .get(obj)
        .map_err(|e| BfErr::Code(e.into()))?;
    match bf_args.args.get(n).map(|v| v.variant()) {
        Some(Variant::Str(name)) => match o.find_verb(name.as_str()) {
            Some((index, _)) => Ok(index),
            None => Err(BfErr::Code(E_VERBNF)),
        },
        Some(Variant::Int(i)) => {
            if *i < 1 || *i as usize > o.verbs.len() {
                return Err(BfErr::Code(E_INVARG));
            }
            Ok(*i as usize - 1)
        }
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

fn can_read_verb(bf_args: &BfCallState<'_, '_>, verb: &Verb) -> bool {
    verb.perms.contains(VerbFlag::Read)
        || verb.owner == bf_args.task_perms_who()
        || bf_args.is_wizard()
}

fn can_write_verb(bf_args: &BfCallState<'_, '_>, verb: &Verb) -> bool {
    verb.perms.contains(VerbFlag::Write)
        || verb.owner == bf_args.task_perms_who()
        || bf_args.is_wizard()
}

fn bf_verbs(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args, 0)?;
    let o = bf_args
        .ctx
        .world
        .store
        .get(obj)
        .map_err(|e| BfErr::Code(e.into()))?;
    let names: Vec<Var> = o.verbs.iter().map(|v| v_string(v.names_string())).collect();
    Ok(Ret(v_list(&names)))
}

fn bf_verb_info(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args, 0)?;
    let index = verb_index(bf_args, obj, 1)?;
    let verb = bf_args
        .ctx
        .world
        .store
        .verb_at(obj, index)
        .map_err(|e| BfErr::Code(e.into()))?;
    if !can_read_verb(bf_args, verb) {
        return Err(BfErr::Code(E_PERM));
    }
    Ok(Ret(v_list(&[
        v_objid(verb.owner),
        v_string(verb_perms_string(verb.perms)),
        v_string(verb.names_string()),
    ])))
}

fn bf_set_verb_info(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args, 0)?;
    let index = verb_index(bf_args, obj, 1)?;
    let Variant::List(info) = bf_args.args[2].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    if info.len() != 3 {
        return Err(BfErr::Code(E_INVARG));
    }
    let Variant::Obj(new_owner) = info.get(0).unwrap().variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let Variant::Str(perms_str) = info.get(1).unwrap().variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let Variant::Str(names_str) = info.get(2).unwrap().variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let Some(new_perms) = parse_verb_perms(perms_str.as_str()) else {
        return Err(BfErr::Code(E_INVARG));
    };
    let new_names: Vec<String> = names_str
        .as_str()
        .split_whitespace()
        .map(|s| s.to_string())
        .collect();
    if new_names.is_empty() {
        return Err(BfErr::Code(E_INVARG));
    }
    let new_owner = *new_owner;
    {
        let verb = bf_args
            .ctx
            .world
            .store
            .verb_at(obj, index)
            .map_err(|e| BfErr::Code(e.into()))?;
        if !can_write_verb(bf_args, verb) {
            return Err(BfErr::Code(E_PERM));
        }
    }
    if new_owner != bf_args.task_perms_who() && !bf_args.is_wizard() {
        return Err(BfErr::Code(E_PERM));
    }

    let store = &mut bf_args.ctx.world.store;
    {
        let o = store.get_mut(obj).map_err(|e| BfErr::Code(e.into()))?;
        let verb = &mut o.verbs[index];
        verb.owner = new_owner;
        verb.perms = new_perms;
        verb.names = new_names;
    }
    store.note_verb_change();
    Ok(Ret(v_int(0)))
}

fn bf_verb_args(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args, 0)?;
    let index = verb_index(bf_args, obj, 1)?;
    let verb = bf_args
        .ctx
        .world
        .store
        .verb_at(obj, index)
        .map_err(|e| BfErr::Code(e.into()))?;
    if !can_read_verb(bf_args, verb) {
        return Err(BfErr::Code(E_PERM));
    }
    Ok(Ret(v_list(&[
        v_str(verb.args.dobj.name()),
        v_str(&verb.args.prep),
        v_str(verb.args.iobj.name()),
    ])))
}

fn parse_args_spec(spec: &grange_var::List) -> Result<VerbArgsSpec, BfErr> {
    if spec.len() != 3 {
        return Err(BfErr::Code(E_INVARG));
    }
    let part = |n: usize| -> Result<String, BfErr> {
        match spec.get(n).unwrap().variant() {
            Variant::Str(s) => Ok(s.as_str().to_string()),
            _ => Err(BfErr::Code(E_TYPE)),
        }
    };
    let dobj = ArgSpec::parse(&part(0)?).ok_or(BfErr::Code(E_INVARG))?;
    let prep = part(1)?;
    let iobj = ArgSpec::parse(&part(2)?).ok_or(BfErr::Code(E_INVARG))?;
    Ok(VerbArgsSpec { dobj, prep, iobj })
}

fn bf_set_verb_args(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args, 0)?;
    let index = verb_index(bf_args, obj, 1)?;
    let Variant::List(spec) = bf_args.args[2].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let args_spec = parse_args_spec(spec)?;
    {
        let verb = bf_args
            .ctx
            .world
            .store
            .verb_at(obj, index)
            .map_err(|e| BfErr::Code(e.into()))?;
        if !can_write_verb(bf_args, verb) {
            return Err(BfErr::Code(E_PERM));
        }
    }
    let store = &mut bf_args.ctx.world.store;
    store
        .get_mut(obj)
        .map_err(|e| BfErr::Code(e.into()))?
        .verbs[index]
        .args = args_spec;
    store.note_verb_change();
    Ok(Ret(v_int(0)))
}

fn bf_verb_code(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args, 0)?;
    let index = verb_index(bf_args, obj, 1)?;
    let verb = bf_args
        .ctx
        .world
        .store
        .verb_at(obj, index)
        .map_err(|e| BfErr::Code(e.into()))?;
    if !can_read_verb(bf_args, verb) {
        return Err(BfErr::Code(E_PERM));
    }
    let lines: Vec<Var> = verb.source.iter().map(|l| v_str(l)).collect();
    Ok(Ret(v_list(&lines)))
}

/// Recompile a verb. Compilation diagnostics come back as a list of
/// strings; an empty list is success.
fn bf_set_verb_code(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args, 0)?;
    let index = verb_index(bf_args, obj, 1)?;
    let Variant::List(lines) = bf_args.args[2].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    if !bf_args
        .ctx
        .world
        .store
        .is_programmer(bf_args.task_perms_who())
        && !bf_args.is_wizard()
    {
        return Err(BfErr::Code(E_PERM));
    }
    let mut source = Vec::with_capacity(lines.len());
    for line in lines.iter() {
        let Variant::Str(s) = line.variant() else {
            return Err(BfErr::Code(E_TYPE));
        };
        source.push(s.as_str().to_string());
    }
    {
        let verb = bf_args
            .ctx
            .world
            .store
            .verb_at(obj, index)
            .map_err(|e| BfErr::Code(e.into()))?;
        if !can_write_verb(bf_args, verb) {
            return Err(BfErr::Code(E_PERM));
        }
    }

    let text = source.join("\n");
    let program = match compile(&text) {
        Ok(program) => program,
        Err(e) => {
            return Ok(Ret(v_list(&[v_string(e.to_string())])));
        }
    };

    let store = &mut bf_args.ctx.world.store;
    {
        let o = store.get_mut(obj).map_err(|e| BfErr::Code(e.into()))?;
        let verb = &mut o.verbs[index];
        verb.source = source;
        verb.program = Arc::new(program);
    }
    store.note_verb_change();
    Ok(Ret(v_list(&[])))
}

fn bf_add_verb(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args, 0)?;
    let Variant::List(info) = bf_args.args[1].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let Variant::List(argspec) = bf_args.args[2].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    if info.len() != 3 {
        return Err(BfErr::Code(E_INVARG));
    }
    let Variant::Obj(owner) = info.get(0).unwrap().variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let Variant::Str(perms_str) = info.get(1).unwrap().variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let Variant::Str(names_str) = info.get(2).unwrap().variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let Some(perms) = parse_verb_perms(perms_str.as_str()) else {
        return Err(BfErr::Code(E_INVARG));
    };
    let names: Vec<String> = names_str
        .as_str()
        .split_whitespace()
        .map(|s| s.to_string())
        .collect();
    if names.is_empty() {
        return Err(BfErr::Code(E_INVARG));
    }
    let args_spec = parse_args_spec(argspec)?;
    let owner = *owner;

    bf_args.require_controls(obj)?;
    if !bf_args.ctx.world.store.valid(owner) {
        return Err(BfErr::Code(E_INVARG));
    }
    if owner != bf_args.task_perms_who() && !bf_args.is_wizard() {
        return Err(BfErr::Code(E_PERM));
    }

    let verb = Verb {
        names,
        owner,
        perms,
        args: args_spec,
        source: vec![],
        program: Arc::new(Program::new()),
    };
    bf_args
        .ctx
        .world
        .store
        .add_verb(obj, verb)
        .map_err(|e| BfErr::Code(e.into()))?;
    let count = bf_args
        .ctx
        .world
        .store
        .get(obj)
        .map_err(|e| BfErr::Code(e.into()))?
        .verbs
        .len();
    Ok(Ret(v_int(count as i64)))
}

fn bf_delete_verb(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args, 0)?;
    let index = verb_index(bf_args, obj, 1)?;
    bf_args.require_controls(obj)?;
    bf_args
        .ctx
        .world
        .store
        .remove_verb(obj, index)
        .map_err(|e| BfErr::Code(e.into()))?;
    Ok(Ret(v_int(0)))
}

/// Does the object (or an ancestor) define the verb at all?
fn bf_respond_to(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args, 0)?;
    let Variant::Str(name) = bf_args.args[1].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let name = name.as_str().to_string();
    let found = bf_args.ctx.world.store.find_verb(obj, &name).is_ok();
    Ok(Ret(v_bool(found)))
}

fn bf_disassemble(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let obj = obj_arg(bf_args, 0)?;
    let index = verb_index(bf_args, obj, 1)?;
    let verb = bf_args
        .ctx
        .world
        .store
        .verb_at(obj, index)
        .map_err(|e| BfErr::Code(e.into()))?;
    if !can_read_verb(bf_args, verb) {
        return Err(BfErr::Code(E_PERM));
    }
    let rendered = format!("{}", verb.program);
    let lines: Vec<Var> = rendered.lines().map(v_str).collect();
    Ok(Ret(v_list(&lines)))
}

pub(crate) fn register_bf_verbs(builtins: &mut [BuiltinFunction]) {
    builtins[offset_for_builtin("verbs")] = bf_verbs;
    builtins[offset_for_builtin("verb_info")] = bf_verb_info;
    builtins[offset_for_builtin("set_verb_info")] = bf_set_verb_info;
    builtins[offset_for_builtin("verb_args")] = bf_verb_args;
    builtins[offset_for_builtin("set_verb_args")] = bf_set_verb_args;
    builtins[offset_for_builtin("verb_code")] = bf_verb_code;
    builtins[offset_for_builtin("set_verb_code")] = bf_set_verb_code;
    builtins[offset_for_builtin("add_verb")] = bf_add_verb;
    builtins[offset_for_builtin("delete_verb")] = bf_delete_verb;
    builtins[offset_for_builtin("respond_to")] = bf_respond_to;
    builtins[offset_for_builtin("disassemble")] = bf_disassemble;
}
