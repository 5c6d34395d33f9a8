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

use grange_compiler::{GlobalName, Program};
use grange_db::{BitEnum, VerbFlag};
use grange_var::{
    v_empty_list, v_empty_str, v_list, v_objid, v_str, Objid, Var, VarType, NOTHING,
};

use crate::vm::frame::MooStackFrame;

/// Everything resolved about the verb a frame is running.
#[derive(Clone, Debug)]
pub struct ResolvedVerb {
    pub name: String,
    pub owner: Objid,
    pub definer: Objid,
    pub flags: BitEnum<VerbFlag>,
    pub program: Arc<Program>,
}

/// Activation frame for the call stack of verb executions: the stack frame
/// itself plus the who/what/where of this call.
#[derive(Clone, Debug)]
pub struct Activation {
    pub(crate) frame: MooStackFrame,
    /// The receiver; an object reference, or a waif/anonymous value.
    pub this: Var,
    pub player: Objid,
    pub verb_name: String,
    /// Where the running verb is defined.
    pub verb_definer: Objid,
    pub verb_owner: Objid,
    pub verb_flags: BitEnum<VerbFlag>,
    /// The permission identity this frame acts as. Starts as the verb
    /// owner; `set_task_perms` replaces it.
    pub permissions: Objid,
    pub args: Vec<Var>,
    /// Host-initiated frames are hidden from `callers()`.
    pub server_initiated: bool,
}

fn set_type_constants(frame: &mut MooStackFrame) {
    use grange_var::v_int;
    frame.set_global(GlobalName::NUM, v_int(VarType::TYPE_INT as i64));
    frame.set_global(GlobalName::INT, v_int(VarType::TYPE_INT as i64));
    frame.set_global(GlobalName::FLOAT, v_int(VarType::TYPE_FLOAT as i64));
    frame.set_global(GlobalName::OBJ, v_int(VarType::TYPE_OBJ as i64));
    frame.set_global(GlobalName::STR, v_int(VarType::TYPE_STR as i64));
    frame.set_global(GlobalName::ERR, v_int(VarType::TYPE_ERR as i64));
    frame.set_global(GlobalName::LIST, v_int(VarType::TYPE_LIST as i64));
    frame.set_global(GlobalName::MAP, v_int(VarType::TYPE_MAP as i64));
    frame.set_global(GlobalName::ANON, v_int(VarType::TYPE_ANON as i64));
    frame.set_global(GlobalName::WAIF, v_int(VarType::TYPE_WAIF as i64));
}

impl Activation {
    /// A frame for a resolved verb call.
    pub fn for_call(
        verb: &ResolvedVerb,
        this: Var,
        player: Objid,
        caller: Var,
        args: Vec<Var>,
        server_initiated: bool,
    ) -> Self {
        let mut frame = MooStackFrame::new(verb.program.clone());
        set_type_constants(&mut frame);
        frame.set_global(GlobalName::this, this.clone());
        frame.set_global(GlobalName::player, v_objid(player));
        frame.set_global(GlobalName::caller, caller);
        frame.set_global(GlobalName::verb, v_str(&verb.name));
        frame.set_global(GlobalName::args, v_list(&args));
        frame.set_global(GlobalName::argstr, v_empty_str());
        frame.set_global(GlobalName::dobj, v_objid(NOTHING));
        frame.set_global(GlobalName::dobjstr, v_empty_str());
        frame.set_global(GlobalName::prepstr, v_empty_str());
        frame.set_global(GlobalName::iobj, v_objid(NOTHING));
        frame.set_global(GlobalName::iobjstr, v_empty_str());

        Self {
            frame,
            this,
            player,
            verb_name: verb.name.clone(),
            verb_definer: verb.definer,
            verb_owner: verb.owner,
            verb_flags: verb.flags,
            permissions: verb.owner,
            args,
            server_initiated,
        }
    }

    /// A frame for an `eval` or other host-supplied program, running with
    /// explicit permissions.
    pub fn for_eval(program: Arc<Program>, permissions: Objid, player: Objid) -> Self {
        let mut frame = MooStackFrame::new(program);
        set_type_constants(&mut frame);
        frame.set_global(GlobalName::this, v_objid(NOTHING));
        frame.set_global(GlobalName::player, v_objid(player));
        frame.set_global(GlobalName::caller, v_objid(player));
        frame.set_global(GlobalName::verb, v_empty_str());
        frame.set_global(GlobalName::args, v_empty_list());
        frame.set_global(GlobalName::argstr, v_empty_str());
        frame.set_global(GlobalName::dobj, v_objid(NOTHING));
        frame.set_global(GlobalName::dobjstr, v_empty_str());
        frame.set_global(GlobalName::prepstr, v_empty_str());
        frame.set_global(GlobalName::iobj, v_objid(NOTHING));
        frame.set_global(GlobalName::iobjstr, v_empty_str());

        Self {
            frame,
            this: v_objid(NOTHING),
            player,
            verb_name: "eval".to_string(),
            verb_definer: NOTHING,
            verb_owner: permissions,
            verb_flags: VerbFlag::rxd(),
            permissions,
            args: vec![],
            server_initiated: false,
        }
    }

    pub fn line_number(&self) -> Option<usize> {
        self.frame.find_line_no()
    }

    /// The `caller` variable this frame exposes to verbs it calls.
    pub(crate) fn caller_value(&self) -> Var {
        self.this.clone()
    }

    /// One entry of a `callers()`/`task_stack()` listing:
    /// `{this, verb-name, programmer, verb-loc, player, line-number}`.
    pub fn traceback_entry(&self) -> Var {
        use grange_var::{v_int, v_none, v_string};
        let line = match self.line_number() {
            Some(l) => v_int(l as i64),
            None => v_none(),
        };
        v_list(&[
            self.this.clone(),
            v_string(self.verb_name.clone()),
            v_objid(self.permissions),
            v_objid(self.verb_definer),
            v_objid(self.player),
            line,
        ])
    }
}
