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

//! The builtin registry: one function pointer per entry in the descriptor
//! table, registered by family at startup. Lookup is by the stable
//! `BuiltinId` compiled programs carry.

pub(crate) mod bf_exec;
pub mod bf_files;
pub(crate) mod bf_list_sets;
pub(crate) mod bf_maps;
pub(crate) mod bf_num;
pub(crate) mod bf_objects;
pub(crate) mod bf_properties;
pub(crate) mod bf_server;
pub(crate) mod bf_strings;
pub(crate) mod bf_values;
pub(crate) mod bf_verbs;

use lazy_static::lazy_static;
use tracing::error;

use grange_compiler::{ArgCount, ArgType, Builtin, BuiltinId, BUILTINS};
use grange_var::Error::{E_ARGS, E_INVARG, E_PERM, E_TYPE};
use grange_var::{Error, Objid, Var, Variant};

use crate::tasks::TaskContext;
use crate::vm::{Exception, ExecutionResult, VmExecState};

lazy_static! {
    static ref REGISTRY: BuiltinRegistry = BuiltinRegistry::new();
}

pub(crate) fn registry() -> &'static BuiltinRegistry {
    &REGISTRY
}

/// The arguments and other state passed to a built-in function.
pub(crate) struct BfCallState<'a, 'b> {
    /// The name of the invoked function.
    pub(crate) name: &'static str,
    /// Arguments passed to the function.
    pub(crate) args: Vec<Var>,
    /// The current execution state of this task, so builtins can inspect
    /// the stack.
    pub(crate) exec_state: &'a mut VmExecState,
    /// The world, the other tasks, and this task's accounting.
    pub(crate) ctx: &'a mut TaskContext<'b>,
}

impl BfCallState<'_, '_> {
    pub fn caller_perms(&self) -> Objid {
        self.exec_state.caller_perms()
    }

    pub fn task_perms_who(&self) -> Objid {
        self.exec_state.task_perms()
    }

    pub fn is_wizard(&self) -> bool {
        self.ctx.world.store.is_wizard(self.task_perms_who())
    }

    /// E_PERM unless the task is running as a wizard.
    pub fn require_wizard(&self) -> Result<(), BfErr> {
        if self.is_wizard() {
            Ok(())
        } else {
            Err(BfErr::Code(E_PERM))
        }
    }

    /// E_PERM unless the task's perms control `obj`.
    pub fn require_controls(&self, obj: Objid) -> Result<(), BfErr> {
        if self.ctx.world.store.controls(self.task_perms_who(), obj) {
            Ok(())
        } else {
            Err(BfErr::Code(E_PERM))
        }
    }
}

/// Return possibilities from a built-in function.
pub(crate) enum BfRet {
    /// Successful return, with a value to be pushed to the value stack.
    Ret(Var),
    /// The builtin wants the VM to do something with control flow, like
    /// suspend the task.
    VmInstr(ExecutionResult),
}

/// Failure possibilities from a built-in function.
#[derive(Debug)]
pub(crate) enum BfErr {
    /// An error code, subject to the running verb's `d` bit.
    Code(Error),
    /// An error code with a message, subject to the `d` bit.
    CodeMsg(Error, String),
    /// An exception raised unconditionally (`raise()`).
    Raise(Exception),
}

pub(crate) type BuiltinFunction = fn(&mut BfCallState<'_, '_>) -> Result<BfRet, BfErr>;

/// Placeholder for table entries nothing has registered; calling one is a
/// bug in the registration lists, surfaced as E_INVARG.
fn bf_noop(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    error!("call to unimplemented builtin: {}", bf_args.name);
    Err(BfErr::Code(E_INVARG))
}

pub(crate) struct BuiltinRegistry {
    builtins: Vec<BuiltinFunction>,
}

impl BuiltinRegistry {
    fn new() -> Self {
        let mut builtins: Vec<BuiltinFunction> = vec![bf_noop; BUILTINS.len()];
        bf_values::register_bf_values(&mut builtins);
        bf_num::register_bf_num(&mut builtins);
        bf_strings::register_bf_strings(&mut builtins);
        bf_list_sets::register_bf_list_sets(&mut builtins);
        bf_maps::register_bf_maps(&mut builtins);
        bf_objects::register_bf_objects(&mut builtins);
        bf_properties::register_bf_properties(&mut builtins);
        bf_verbs::register_bf_verbs(&mut builtins);
        bf_server::register_bf_server(&mut builtins);
        bf_files::register_bf_files(&mut builtins);
        bf_exec::register_bf_exec(&mut builtins);
        BuiltinRegistry { builtins }
    }

    pub(crate) fn builtin_for(&self, id: BuiltinId) -> BuiltinFunction {
        self.builtins[id.0 as usize]
    }
}

/// The universal arity/type guard every builtin call passes through before
/// dispatch: wrong count is E_ARGS, wrong positional type is E_TYPE.
pub(crate) fn check_builtin_args(descriptor: &Builtin, args: &[Var]) -> Result<(), Error> {
    if let ArgCount::Q(min) = descriptor.min_args {
        if args.len() < min {
            return Err(E_ARGS);
        }
    }
    if let ArgCount::Q(max) = descriptor.max_args {
        if args.len() > max {
            return Err(E_ARGS);
        }
    }
    for (arg, expected) in args.iter().zip(descriptor.types.iter()) {
        match expected {
            ArgType::Any => {}
            ArgType::AnyNum => {
                if !matches!(arg.variant(), Variant::Int(_) | Variant::Float(_)) {
                    return Err(E_TYPE);
                }
            }
            ArgType::Typed(t) => {
                if arg.type_code() != *t {
                    return Err(E_TYPE);
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use grange_var::{v_int, v_str};

    #[test]
    fn arity_and_type_guards() {
        let desc = BUILTINS
            .description_for(BUILTINS.find_builtin("strcmp").unwrap())
            .unwrap();
        assert_eq!(
            check_builtin_args(desc, &[v_str("a")]),
            Err(E_ARGS)
        );
        assert_eq!(
            check_builtin_args(desc, &[v_str("a"), v_int(1)]),
            Err(E_TYPE)
        );
        assert_eq!(
            check_builtin_args(desc, &[v_str("a"), v_str("b")]),
            Ok(())
        );
    }
}
