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

use std::collections::HashSet;

use tracing::debug;

use grange_compiler::offset_for_builtin;
use grange_db::{ObjFlag, WorldStateError};
use grange_var::Error::{E_INVARG, E_NACC, E_PERM, E_RECMOVE, E_TYPE};
use grange_var::{
    v_anon, v_bool, v_int, v_list_iter, v_objid, v_waif, Objid, Var, Variant, NOTHING,
};

use crate::builtins::BfRet::Ret;
use crate::builtins::{BfCallState, BfErr, BfRet, BuiltinFunction};
use crate::tasks::TaskContext;
use crate::vm::dispatch::call_verb_nested;

/// An object-reference argument that may be regular or anonymous. Returns
/// the store id plus whether it was anonymous.
fn obj_arg(bf_args: &BfCallState<'_, '_>, n: usize) -> Result<(Objid, bool), BfErr> {
    match bf_args.args.get(n).map(|v| v.variant()) {
        Some(Variant::Obj(o)) => Ok((*o, false)),
        Some(Variant::Anon(a)) => Ok((*a, true)),
        Some(_) => Err(BfErr::Code(E_TYPE)),
        None => Err(BfErr::Code(grange_var::Error::E_ARGS)),
    }
}

/// Like `obj_arg` but requires validity.
fn valid_obj_arg(bf_args: &BfCallState<'_, '_>, n: usize) -> Result<(Objid, bool), BfErr> {
    let (id, anon) = obj_arg(bf_args, n)?;
    if !bf_args.ctx.world.store.valid(id) {
        return Err(BfErr::Code(E_INVARG));
    }
    Ok((id, anon))
}

/// `create(parent [, owner | anon-flag | init-args]...)`: the optional
/// arguments are recognized by shape, with owner before anon flag and init
/// args last.
fn bf_create(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let parents: Vec<Objid> = match bf_args.args[0].variant() {
        Variant::Obj(o) => {
            if *o == NOTHING {
                vec![]
            } else {
                vec![*o]
            }
        }
        Variant::List(l) => {
            let mut parents = vec![];
            for p in l.iter() {
                let Variant::Obj(p) = p.variant() else {
                    return Err(BfErr::Code(E_TYPE));
                };
                parents.push(*p);
            }
            parents
        }
        _ => Err(BfErr::Code(E_TYPE))?,
    };

    let mut owner: Option<Objid> = None;
    let mut anonymous = false;
    let mut saw_anon_flag = false;
    let mut init_args: Option<Vec<Var>> = None;
    for arg in &bf_args.args[1..] {
        match arg.variant() {
            Variant::Obj(o) => {
                if owner.is_some() || saw_anon_flag || init_args.is_some() {
                    return Err(BfErr::Code(E_INVARG));
                }
                owner = Some(*o);
            }
            Variant::Int(i) if *i < 0 => {
                if owner.is_some() || saw_anon_flag || init_args.is_some() {
                    return Err(BfErr::Code(E_INVARG));
                }
                owner = Some(Objid(*i));
            }
            Variant::Int(i) => {
                if saw_anon_flag || init_args.is_some() {
                    return Err(BfErr::Code(E_INVARG));
                }
                saw_anon_flag = true;
                anonymous = *i != 0;
            }
            Variant::List(l) => {
                if init_args.is_some() {
                    return Err(BfErr::Code(E_INVARG));
                }
                init_args = Some(l.iter().cloned().collect());
            }
            _ => return Err(BfErr::Code(E_TYPE)),
        }
    }

    let perms = bf_args.task_perms_who();
    let is_wizard = bf_args.is_wizard();

    // The reserved parse sentinels as owner force an anonymous object.
    let mut owner = owner.unwrap_or(perms);
    if owner.0 < NOTHING.0 {
        anonymous = true;
        owner = perms;
    }
    if owner != perms && owner != NOTHING && !is_wizard {
        return Err(BfErr::Code(E_PERM));
    }

    for parent in &parents {
        if !bf_args.ctx.world.store.valid(*parent) {
            return Err(BfErr::Code(E_INVARG));
        }
        if !is_wizard {
            let parent_obj = bf_args
                .ctx
                .world
                .store
                .get(*parent)
                .map_err(|e| BfErr::Code(e.into()))?;
            let permitted = parent_obj.owner == perms
                || if anonymous {
                    parent_obj.flags.contains(ObjFlag::Anonymous)
                } else {
                    parent_obj.flags.contains(ObjFlag::Fertile)
                };
            if !permitted {
                return Err(BfErr::Code(E_PERM));
            }
        }
    }

    let id = bf_args
        .ctx
        .world
        .store
        .create_object(&parents, owner, anonymous)
        .map_err(|e| BfErr::Code(e.into()))?;

    let value = if anonymous { v_anon(id) } else { v_objid(id) };

    // The new object's initialize verb runs within this task's budget;
    // failures propagate to the caller.
    let player = bf_args.exec_state.top().player;
    let caller = bf_args.exec_state.top().this.clone();
    if let Some(Err(e)) = call_verb_nested(
        bf_args.ctx,
        player,
        &value,
        "initialize",
        init_args.unwrap_or_default(),
        caller,
        false,
    ) {
        return Err(BfErr::Raise(e));
    }
    Ok(Ret(value))
}

/// Recycle one object: run its `recycle` hook (errors swallowed), cascade
/// into anonymous objects its properties reference, then tear it down.
fn recycle_cascade(
    ctx: &mut TaskContext,
    player: Objid,
    id: Objid,
    as_anon: bool,
    visited: &mut HashSet<Objid>,
) -> Result<(), WorldStateError> {
    if !visited.insert(id) {
        return Ok(());
    }
    let value = if as_anon { v_anon(id) } else { v_objid(id) };
    if let Some(Err(e)) = call_verb_nested(
        ctx,
        player,
        &value,
        "recycle",
        vec![],
        v_objid(NOTHING),
        true,
    ) {
        debug!(code = %e.code, "recycle hook failed; ignored");
    }

    // The hook may itself have recycled us.
    if ctx.world.store.get(id).is_err() {
        return Ok(());
    }

    let anon_reachable = ctx.world.store.reachable_anonymous(id)?;
    for anon in anon_reachable {
        if ctx.world.store.valid(anon) {
            let _ = recycle_cascade(ctx, player, anon, true, visited);
        }
    }
    ctx.world.store.recycle_object(id)
}

fn bf_recycle(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let (id, as_anon) = obj_arg(bf_args, 0)?;
    if bf_args.ctx.world.store.get(id).is_err() {
        return Err(BfErr::Code(E_INVARG));
    }
    bf_args.require_controls(id)?;
    let player = bf_args.exec_state.top().player;
    let mut visited = HashSet::new();
    recycle_cascade(bf_args.ctx, player, id, as_anon, &mut visited)
        .map_err(|e| BfErr::Code(e.into()))?;
    Ok(Ret(v_int(0)))
}

fn bf_valid(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let valid = match bf_args.args[0].variant() {
        Variant::Obj(o) => bf_args.ctx.world.store.valid(*o),
        Variant::Anon(a) => bf_args.ctx.world.store.valid(*a),
        // Waifs are never valid object references.
        Variant::Waif(_) => false,
        _ => return Err(BfErr::Code(E_TYPE)),
    };
    Ok(Ret(v_bool(valid)))
}

fn bf_parent(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let (id, _) = valid_obj_arg(bf_args, 0)?;
    let o = bf_args
        .ctx
        .world
        .store
        .get(id)
        .map_err(|e| BfErr::Code(e.into()))?;
    Ok(Ret(v_objid(o.parents.first().copied().unwrap_or(NOTHING))))
}

fn bf_parents(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let (id, _) = valid_obj_arg(bf_args, 0)?;
    let o = bf_args
        .ctx
        .world
        .store
        .get(id)
        .map_err(|e| BfErr::Code(e.into()))?;
    Ok(Ret(v_list_iter(o.parents.iter().map(|p| v_objid(*p)))))
}

fn bf_children(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let (id, _) = valid_obj_arg(bf_args, 0)?;
    let o = bf_args
        .ctx
        .world
        .store
        .get(id)
        .map_err(|e| BfErr::Code(e.into()))?;
    Ok(Ret(v_list_iter(o.children.iter().map(|c| v_objid(*c)))))
}

fn chparents_common(bf_args: &mut BfCallState<'_, '_>, parents: Vec<Objid>) -> Result<BfRet, BfErr> {
    let (id, _) = valid_obj_arg(bf_args, 0)?;
    bf_args.require_controls(id)?;
    let perms = bf_args.task_perms_who();
    let is_wizard = bf_args.is_wizard();
    for parent in &parents {
        if !bf_args.ctx.world.store.valid(*parent) {
            return Err(BfErr::Code(E_INVARG));
        }
        if !is_wizard {
            let p = bf_args
                .ctx
                .world
                .store
                .get(*parent)
                .map_err(|e| BfErr::Code(e.into()))?;
            if p.owner != perms && !p.flags.contains(ObjFlag::Fertile) {
                return Err(BfErr::Code(E_PERM));
            }
        }
    }
    bf_args
        .ctx
        .world
        .store
        .chparents(id, &parents)
        .map_err(|e| match e {
            WorldStateError::RecursiveParent(_, _) => BfErr::Code(E_RECMOVE),
            other => BfErr::Code(other.into()),
        })?;
    Ok(Ret(v_int(0)))
}

fn bf_chparent(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let Variant::Obj(parent) = bf_args.args[1].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let parents = if *parent == NOTHING {
        vec![]
    } else {
        vec![*parent]
    };
    chparents_common(bf_args, parents)
}

fn bf_chparents(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let Variant::List(l) = bf_args.args[1].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let mut parents = vec![];
    for p in l.iter() {
        let Variant::Obj(p) = p.variant() else {
            return Err(BfErr::Code(E_TYPE));
        };
        parents.push(*p);
    }
    chparents_common(bf_args, parents)
}

fn bf_max_object(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_objid(bf_args.ctx.world.store.max_object())))
}

/// `move(what, where)` with `accept`/`exitfunc`/`enterfunc` hooks.
fn bf_move(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let (what, _) = valid_obj_arg(bf_args, 0)?;
    let Variant::Obj(to) = bf_args.args[1].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let to = *to;
    if to != NOTHING && !bf_args.ctx.world.store.valid(to) {
        return Err(BfErr::Code(E_INVARG));
    }
    bf_args.require_controls(what)?;
    let player = bf_args.exec_state.top().player;

    // Destination consent, unless a wizard is doing the moving.
    if to != NOTHING && !bf_args.is_wizard() {
        let accepted = match call_verb_nested(
            bf_args.ctx,
            player,
            &v_objid(to),
            "accept",
            vec![v_objid(what)],
            v_objid(NOTHING),
            true,
        ) {
            Some(Ok(v)) => v.is_true(),
            Some(Err(e)) => return Err(BfErr::Raise(e)),
            None => false,
        };
        if !accepted {
            return Err(BfErr::Code(E_NACC));
        }
    }

    let old_location = bf_args
        .ctx
        .world
        .store
        .get(what)
        .map_err(|e| BfErr::Code(e.into()))?
        .location;
    if old_location == to {
        return Ok(Ret(v_int(0)));
    }

    bf_args
        .ctx
        .world
        .store
        .move_object(what, to)
        .map_err(|e| match e {
            WorldStateError::RecursiveParent(_, _) => BfErr::Code(E_RECMOVE),
            other => BfErr::Code(other.into()),
        })?;

    // Departure and arrival hooks; their errors are swallowed.
    if old_location != NOTHING && bf_args.ctx.world.store.valid(old_location) {
        let _ = call_verb_nested(
            bf_args.ctx,
            player,
            &v_objid(old_location),
            "exitfunc",
            vec![v_objid(what)],
            v_objid(NOTHING),
            true,
        );
    }
    if to != NOTHING && bf_args.ctx.world.store.valid(to) {
        let _ = call_verb_nested(
            bf_args.ctx,
            player,
            &v_objid(to),
            "enterfunc",
            vec![v_objid(what)],
            v_objid(NOTHING),
            true,
        );
    }
    Ok(Ret(v_int(0)))
}

fn bf_renumber(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.require_wizard()?;
    let (id, anon) = valid_obj_arg(bf_args, 0)?;
    if anon {
        return Err(BfErr::Code(E_INVARG));
    }
    let new_id = bf_args
        .ctx
        .world
        .store
        .renumber(id)
        .map_err(|e| BfErr::Code(e.into()))?;
    Ok(Ret(v_objid(new_id)))
}

fn bf_recreate(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.require_wizard()?;
    let Variant::Obj(id) = bf_args.args[0].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let Variant::Obj(parent) = bf_args.args[1].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let owner = match bf_args.args.get(2) {
        None => bf_args.task_perms_who(),
        Some(v) => match v.variant() {
            Variant::Obj(o) => *o,
            _ => return Err(BfErr::Code(E_TYPE)),
        },
    };
    let parents = if *parent == NOTHING {
        vec![]
    } else {
        vec![*parent]
    };
    bf_args
        .ctx
        .world
        .store
        .recreate(*id, &parents, owner)
        .map_err(|e| BfErr::Code(e.into()))?;
    Ok(Ret(v_objid(*id)))
}

fn bf_recycled_objects(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_list_iter(
        bf_args
            .ctx
            .world
            .store
            .recycled_objects()
            .into_iter()
            .map(v_objid),
    )))
}

fn bf_next_recycled_object(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let after = match bf_args.args.first() {
        None => NOTHING,
        Some(v) => match v.variant() {
            Variant::Obj(o) => *o,
            _ => return Err(BfErr::Code(E_TYPE)),
        },
    };
    let next = bf_args
        .ctx
        .world
        .store
        .recycled_objects()
        .into_iter()
        .find(|r| r.0 > after.0);
    Ok(Ret(match next {
        Some(o) => v_objid(o),
        None => v_int(0),
    }))
}

fn include_self_flag(bf_args: &BfCallState<'_, '_>, n: usize) -> bool {
    bf_args.args.get(n).map(|v| v.is_true()).unwrap_or(false)
}

fn bf_ancestors(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let (id, _) = valid_obj_arg(bf_args, 0)?;
    let include_self = include_self_flag(bf_args, 1);
    let ancestors = bf_args
        .ctx
        .world
        .store
        .ancestors(id, include_self)
        .map_err(|e| BfErr::Code(e.into()))?;
    Ok(Ret(v_list_iter(ancestors.into_iter().map(v_objid))))
}

fn bf_descendants(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let (id, _) = valid_obj_arg(bf_args, 0)?;
    let include_self = include_self_flag(bf_args, 1);
    let descendants = bf_args
        .ctx
        .world
        .store
        .descendants(id, include_self)
        .map_err(|e| BfErr::Code(e.into()))?;
    Ok(Ret(v_list_iter(descendants.into_iter().map(v_objid))))
}

fn bf_isa(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let (id, _) = valid_obj_arg(bf_args, 0)?;
    let Variant::Obj(ancestor) = bf_args.args[1].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let isa = bf_args
        .ctx
        .world
        .store
        .isa(id, *ancestor)
        .map_err(|e| BfErr::Code(e.into()))?;
    Ok(Ret(v_bool(isa)))
}

fn bf_owned_objects(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let (owner, _) = valid_obj_arg(bf_args, 0)?;
    Ok(Ret(v_list_iter(
        bf_args
            .ctx
            .world
            .store
            .owned_objects(owner)
            .into_iter()
            .map(v_objid),
    )))
}

fn bf_players(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_list_iter(
        bf_args.ctx.world.store.players().into_iter().map(v_objid),
    )))
}

fn bf_is_player(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let Variant::Obj(o) = bf_args.args[0].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    if !bf_args.ctx.world.store.valid(*o) {
        return Err(BfErr::Code(E_INVARG));
    }
    let is_player = bf_args
        .ctx
        .world
        .store
        .get(*o)
        .map_err(|e| BfErr::Code(e.into()))?
        .flags
        .contains(ObjFlag::User);
    Ok(Ret(v_bool(is_player)))
}

/// `set_player_flag(obj, value)`: wizard-only; waifs and anonymous objects
/// can never be players.
fn bf_set_player_flag(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let Variant::Obj(o) = bf_args.args[0].variant() else {
        // Anonymous objects and waifs are a type error here, not merely an
        // invalid argument.
        return Err(BfErr::Code(E_TYPE));
    };
    bf_args.require_wizard()?;
    if !bf_args.ctx.world.store.valid(*o) {
        return Err(BfErr::Code(E_INVARG));
    }
    let on = bf_args.args[1].is_true();
    bf_args
        .ctx
        .world
        .store
        .get_mut(*o)
        .map_err(|e| BfErr::Code(e.into()))?
        .flags
        .set_to(ObjFlag::User, on);
    Ok(Ret(v_int(0)))
}

fn bf_is_anonymous(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_bool(matches!(
        bf_args.args[0].variant(),
        Variant::Anon(_)
    ))))
}

/// `new_waif()`: a waif whose class is the calling verb's `this` and whose
/// owner is the task's permissions.
fn bf_new_waif(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let this = bf_args.exec_state.top().this.clone();
    let Variant::Obj(class) = this.variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    Ok(Ret(v_waif(*class, bf_args.task_perms_who())))
}

/// `occupants(objects [, class [, players-only]])`: the members of a list
/// that are valid objects, descend from `class` when one is given, and
/// carry the player flag when the third argument is true.
fn bf_occupants(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let Variant::List(candidates) = bf_args.args[0].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let classes: Vec<Objid> = match bf_args.args.get(1).map(|v| v.variant()) {
        None => vec![],
        Some(Variant::Obj(o)) => vec![*o],
        Some(Variant::List(l)) => {
            let mut classes = vec![];
            for c in l.iter() {
                let Variant::Obj(c) = c.variant() else {
                    return Err(BfErr::Code(E_TYPE));
                };
                classes.push(*c);
            }
            classes
        }
        Some(_) => return Err(BfErr::Code(E_TYPE)),
    };
    let players_only = bf_args.args.get(2).map(|v| v.is_true()).unwrap_or(false);

    let mut matched = vec![];
    for candidate in candidates.iter() {
        let Variant::Obj(o) = candidate.variant() else {
            continue;
        };
        let store = &bf_args.ctx.world.store;
        if !store.valid(*o) {
            continue;
        }
        if players_only
            && !store
                .get(*o)
                .map(|obj| obj.flags.contains(ObjFlag::User))
                .unwrap_or(false)
        {
            continue;
        }
        let is_match = if classes.is_empty() {
            true
        } else {
            let mut isa_any = false;
            for class in &classes {
                if store.isa(*o, *class).unwrap_or(false) {
                    isa_any = true;
                    break;
                }
            }
            isa_any
        };
        if is_match {
            matched.push(candidate.clone());
        }
    }
    Ok(Ret(grange_var::v_list(&matched)))
}

fn bf_object_bytes(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let (id, _) = valid_obj_arg(bf_args, 0)?;
    let o = bf_args
        .ctx
        .world
        .store
        .get(id)
        .map_err(|e| BfErr::Code(e.into()))?;
    let mut bytes = std::mem::size_of::<grange_db::Object>() + o.name.len();
    for p in &o.properties {
        bytes += p.name.len() + p.value.size_bytes();
    }
    for v in &o.verbs {
        bytes += v.names_string().len();
        bytes += v.source.iter().map(|l| l.len()).sum::<usize>();
    }
    Ok(Ret(v_int(bytes as i64)))
}

pub(crate) fn register_bf_objects(builtins: &mut [BuiltinFunction]) {
    builtins[offset_for_builtin("create")] = bf_create;
    builtins[offset_for_builtin("recycle")] = bf_recycle;
    builtins[offset_for_builtin("valid")] = bf_valid;
    builtins[offset_for_builtin("parent")] = bf_parent;
    builtins[offset_for_builtin("parents")] = bf_parents;
    builtins[offset_for_builtin("children")] = bf_children;
    builtins[offset_for_builtin("chparent")] = bf_chparent;
    builtins[offset_for_builtin("chparents")] = bf_chparents;
    builtins[offset_for_builtin("max_object")] = bf_max_object;
    builtins[offset_for_builtin("move")] = bf_move;
    builtins[offset_for_builtin("renumber")] = bf_renumber;
    builtins[offset_for_builtin("recreate")] = bf_recreate;
    builtins[offset_for_builtin("recycled_objects")] = bf_recycled_objects;
    builtins[offset_for_builtin("next_recycled_object")] = bf_next_recycled_object;
    builtins[offset_for_builtin("ancestors")] = bf_ancestors;
    builtins[offset_for_builtin("descendants")] = bf_descendants;
    builtins[offset_for_builtin("isa")] = bf_isa;
    builtins[offset_for_builtin("owned_objects")] = bf_owned_objects;
    builtins[offset_for_builtin("players")] = bf_players;
    builtins[offset_for_builtin("is_player")] = bf_is_player;
    builtins[offset_for_builtin("set_player_flag")] = bf_set_player_flag;
    builtins[offset_for_builtin("is_anonymous")] = bf_is_anonymous;
    builtins[offset_for_builtin("new_waif")] = bf_new_waif;
    builtins[offset_for_builtin("object_bytes")] = bf_object_bytes;
    builtins[offset_for_builtin("occupants")] = bf_occupants;
}
