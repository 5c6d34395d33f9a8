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

//! Verb resolution, property access on behalf of the evaluator, and the
//! nested evaluator runs that back hook verbs (`initialize`, `recycle`,
//! `accept`, the uncaught-error handler).

use tracing::warn;

use grange_db::{ObjFlag, PropFlag, VerbFlag, WorldStateError};
use grange_var::Error::{E_INVARG, E_INVIND, E_MAXREC, E_PERM, E_PROPNF, E_TYPE, E_VERBNF};
use grange_var::{
    v_bool, v_list_iter, v_objid, v_string, Error, Objid, Var, Variant, NOTHING,
};

use crate::tasks::{TaskContext, MAX_NESTING};
use crate::vm::activation::{Activation, ResolvedVerb};
use crate::vm::execute::run_slice;
use crate::vm::{Exception, ExecutionResult, VmExecState};
use crate::world::World;

/// Resolve a verb call receiver down to the object lookups happen on, plus
/// the `this` value the frame will carry.
fn receiver_object(world: &World, receiver: &Var) -> Result<(Objid, Var), Error> {
    match receiver.variant() {
        Variant::Obj(o) => {
            if !world.store.valid(*o) {
                return Err(E_INVIND);
            }
            Ok((*o, receiver.clone()))
        }
        Variant::Anon(a) => {
            if !world.store.valid(*a) {
                return Err(E_INVARG);
            }
            Ok((*a, receiver.clone()))
        }
        Variant::Waif(w) => {
            if !world.store.valid(w.class) {
                return Err(E_INVIND);
            }
            Ok((w.class, receiver.clone()))
        }
        _ => Err(E_TYPE),
    }
}

/// Find an executable verb for a call on `receiver`.
pub(crate) fn resolve_verb(
    world: &mut World,
    receiver: &Var,
    verb: &str,
) -> Result<(ResolvedVerb, Var), Error> {
    let (lookup_obj, this) = receiver_object(world, receiver)?;
    let (definer, index) = world
        .store
        .find_verb(lookup_obj, verb)
        .map_err(|_| E_VERBNF)?;
    let vd = world.store.verb_at(definer, index).map_err(Error::from)?;
    if !vd.perms.contains(VerbFlag::Exec) {
        return Err(E_VERBNF);
    }
    Ok((
        ResolvedVerb {
            name: verb.to_string(),
            owner: vd.owner,
            definer,
            flags: vd.perms,
            program: vd.program.clone(),
        },
        this,
    ))
}

/// Resolve the verb a `pass()` continues into: the same name, defined on
/// an ancestor of the current verb's definer.
pub(crate) fn resolve_pass(
    world: &mut World,
    definer: Objid,
    verb: &str,
) -> Result<ResolvedVerb, Error> {
    let parents = world.store.get(definer).map_err(Error::from)?.parents.clone();
    for parent in parents {
        if let Ok((found_definer, index)) = world.store.find_verb(parent, verb) {
            let vd = world.store.verb_at(found_definer, index).map_err(Error::from)?;
            if !vd.perms.contains(VerbFlag::Exec) {
                continue;
            }
            return Ok(ResolvedVerb {
                name: verb.to_string(),
                owner: vd.owner,
                definer: found_definer,
                flags: vd.perms,
                program: vd.program.clone(),
            });
        }
    }
    Err(E_VERBNF)
}

/// Read a built-in pseudo-property off an object, if `name` is one.
fn builtin_property(world: &World, obj: Objid, name: &str) -> Option<Var> {
    let o = world.store.get(obj).ok()?;
    let v = match name.to_ascii_lowercase().as_str() {
        "name" => v_string(o.name.clone()),
        "owner" => v_objid(o.owner),
        "location" => v_objid(o.location),
        "contents" => v_list_iter(o.contents.iter().map(|c| v_objid(*c))),
        "parents" => v_list_iter(o.parents.iter().map(|p| v_objid(*p))),
        "parent" => v_objid(o.parents.first().copied().unwrap_or(NOTHING)),
        "children" => v_list_iter(o.children.iter().map(|c| v_objid(*c))),
        "programmer" => v_bool(o.flags.contains(ObjFlag::Programmer)),
        "wizard" => v_bool(o.flags.contains(ObjFlag::Wizard)),
        "player" => v_bool(o.flags.contains(ObjFlag::User)),
        "r" => v_bool(o.flags.contains(ObjFlag::Read)),
        "w" => v_bool(o.flags.contains(ObjFlag::Write)),
        "f" => v_bool(o.flags.contains(ObjFlag::Fertile)),
        "a" => v_bool(o.flags.contains(ObjFlag::Anonymous)),
        _ => return None,
    };
    Some(v)
}

fn can_read_property(world: &World, who: Objid, definer_slot_owner: Objid, readable: bool) -> bool {
    readable || who == definer_slot_owner || world.store.is_wizard(who)
}

/// `obj.prop` on behalf of a frame running as `perms`.
pub(crate) fn get_property_value(
    world: &World,
    perms: Objid,
    objvar: &Var,
    name: &str,
) -> Result<Var, Error> {
    let obj = match objvar.variant() {
        Variant::Obj(o) => {
            if !world.store.valid(*o) {
                return Err(E_INVIND);
            }
            *o
        }
        Variant::Anon(a) => {
            if !world.store.valid(*a) {
                return Err(E_INVARG);
            }
            *a
        }
        Variant::Waif(w) => {
            // Waifs have no storage; reads resolve against the class, with
            // `class` and `owner` as their own pseudo-properties.
            match name.to_ascii_lowercase().as_str() {
                "class" => return Ok(v_objid(w.class)),
                "owner" => return Ok(v_objid(w.owner)),
                _ => {}
            }
            if !world.store.valid(w.class) {
                return Err(E_INVIND);
            }
            w.class
        }
        _ => return Err(E_INVIND),
    };

    if let Some(v) = builtin_property(world, obj, name) {
        return Ok(v);
    }
    let info = world
        .store
        .property_info(obj, name)
        .map_err(|_| E_PROPNF)?;
    if !can_read_property(world, perms, info.owner, info.perms.contains(PropFlag::Read)) {
        return Err(E_PERM);
    }
    world.store.resolve_property(obj, name).map_err(Error::from)
}

/// `obj.prop = value` on behalf of a frame running as `perms`.
pub(crate) fn put_property_value(
    world: &mut World,
    perms: Objid,
    objvar: &Var,
    name: &str,
    value: &Var,
) -> Result<(), Error> {
    let obj = match objvar.variant() {
        Variant::Obj(o) => {
            if !world.store.valid(*o) {
                return Err(E_INVIND);
            }
            *o
        }
        Variant::Anon(a) => {
            if !world.store.valid(*a) {
                return Err(E_INVARG);
            }
            *a
        }
        // Waifs carry no storage to write into.
        Variant::Waif(_) => return Err(E_PERM),
        _ => return Err(E_INVIND),
    };

    if grange_db::is_builtin_property(name) {
        return put_builtin_property(world, perms, obj, name, value);
    }

    let info = world.store.property_info(obj, name).map_err(|_| E_PROPNF)?;
    let writable = info.perms.contains(PropFlag::Write);
    if !(writable || perms == info.owner || world.store.is_wizard(perms)) {
        return Err(E_PERM);
    }
    world
        .store
        .set_property(obj, name, value.clone())
        .map_err(Error::from)
}

fn put_builtin_property(
    world: &mut World,
    perms: Objid,
    obj: Objid,
    name: &str,
    value: &Var,
) -> Result<(), Error> {
    let is_wizard = world.store.is_wizard(perms);
    let controls = world.store.controls(perms, obj);
    match name.to_ascii_lowercase().as_str() {
        "name" => {
            if !controls {
                return Err(E_PERM);
            }
            let Variant::Str(s) = value.variant() else {
                return Err(E_TYPE);
            };
            world.store.get_mut(obj).map_err(Error::from)?.name = s.as_str().to_string();
            Ok(())
        }
        "owner" => {
            if !is_wizard {
                return Err(E_PERM);
            }
            let Variant::Obj(new_owner) = value.variant() else {
                return Err(E_TYPE);
            };
            world.store.get_mut(obj).map_err(Error::from)?.owner = *new_owner;
            Ok(())
        }
        "programmer" | "wizard" => {
            if !is_wizard {
                return Err(E_PERM);
            }
            let flag = if name.eq_ignore_ascii_case("wizard") {
                ObjFlag::Wizard
            } else {
                ObjFlag::Programmer
            };
            world
                .store
                .get_mut(obj)
                .map_err(Error::from)?
                .flags
                .set_to(flag, value.is_true());
            Ok(())
        }
        "r" | "w" | "f" => {
            if !controls {
                return Err(E_PERM);
            }
            let flag = match name.to_ascii_lowercase().as_str() {
                "r" => ObjFlag::Read,
                "w" => ObjFlag::Write,
                _ => ObjFlag::Fertile,
            };
            world
                .store
                .get_mut(obj)
                .map_err(Error::from)?
                .flags
                .set_to(flag, value.is_true());
            Ok(())
        }
        // The player flag has its own builtin; everything else is an
        // attribute maintained by the server.
        _ => Err(E_PERM),
    }
}

/// Run a verb to completion in a nested evaluator sharing the calling
/// task's budgets. Returns `None` when the receiver has no such verb.
pub(crate) fn call_verb_nested(
    ctx: &mut TaskContext,
    player: Objid,
    receiver: &Var,
    verb: &str,
    args: Vec<Var>,
    caller: Var,
    server_initiated: bool,
) -> Option<Result<Var, Exception>> {
    let (resolved, this) = match resolve_verb(ctx.world, receiver, verb) {
        Ok(r) => r,
        Err(_) => return None,
    };
    let activation =
        Activation::for_call(&resolved, this, player, caller, args, server_initiated);
    Some(run_nested(ctx, activation))
}

/// Drive a fresh activation to completion inside the current task.
pub(crate) fn run_nested(ctx: &mut TaskContext, activation: Activation) -> Result<Var, Exception> {
    if ctx.meta.nesting >= MAX_NESTING {
        return Err(Exception::new(
            E_MAXREC,
            E_MAXREC.message().to_string(),
            grange_var::v_int(0),
        ));
    }
    ctx.meta.nesting += 1;
    let mut state = VmExecState::new(ctx.meta.id, activation);
    let result = loop {
        match run_slice(&mut state, ctx) {
            ExecutionResult::More => continue,
            ExecutionResult::Complete(v) => break Ok(v),
            ExecutionResult::Exception(e) => break Err(e),
            ExecutionResult::Suspend(_) => {
                // A nested run has no scheduler association to suspend
                // against.
                warn!("suspend() inside a nested verb call");
                break Err(Exception::new(
                    E_INVARG,
                    "Cannot suspend in this context".to_string(),
                    grange_var::v_int(0),
                ));
            }
            ExecutionResult::Aborted(_) => {
                break Err(Exception::new(
                    grange_var::Error::E_QUOTA,
                    grange_var::Error::E_QUOTA.message().to_string(),
                    grange_var::v_int(0),
                ));
            }
        }
    };
    ctx.meta.nesting -= 1;
    result
}
