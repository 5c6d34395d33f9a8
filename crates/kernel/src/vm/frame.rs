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

use grange_compiler::{GlobalName, Label, Name, Names, Op, Program};
use grange_var::{v_none, Error, Var};

use crate::vm::unwind::FinallyReason;

/// The stack-frame portion of an activation: the program, program counter,
/// variable environment, value stack, and the handler scopes live within
/// this verb call.
#[derive(Clone, Debug)]
pub(crate) struct MooStackFrame {
    pub(crate) program: Arc<Program>,
    /// Which instruction vector runs: the main vector, or one of the fork
    /// vectors for a forked task.
    pub(crate) vector: Option<usize>,
    pub(crate) pc: usize,
    /// Variable slots; `None` is an unset variable (`E_VARNF` on read).
    pub(crate) environment: Vec<Option<Var>>,
    pub(crate) valstack: Vec<Var>,
    pub(crate) scope_stack: Vec<Scope>,
    /// Scratch for `PutTemp`/`PushTemp` in indexed assignments.
    pub(crate) temp: Var,
    /// Scratch for catch handlers being assembled by `PushCatchLabel`.
    pub(crate) catch_stack: Vec<(CatchType, Label)>,
    /// Reasons awaiting their `FinallyContinue`.
    pub(crate) finally_stack: Vec<FinallyReason>,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum CatchType {
    Any,
    Errors(Vec<Error>),
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ScopeType {
    TryFinally(Label),
    TryCatch(Vec<(CatchType, Label)>),
}

/// An active handler block. `valstack_pos` is the stack depth at entry (one
/// slot below the handler's marker); exiting the scope truncates back to it.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Scope {
    pub(crate) scope_type: ScopeType,
    pub(crate) valstack_pos: usize,
}

impl MooStackFrame {
    pub(crate) fn new(program: Arc<Program>) -> Self {
        let width = program.var_names.width();
        Self {
            program,
            vector: None,
            pc: 0,
            environment: vec![None; width],
            valstack: vec![],
            scope_stack: vec![],
            temp: v_none(),
            catch_stack: vec![],
            finally_stack: vec![],
        }
    }

    pub(crate) fn opcodes(&self) -> &[Op] {
        match self.vector {
            None => &self.program.main_vector,
            Some(fv) => &self.program.fork_vectors[fv],
        }
    }

    /// Repoint this frame at a fork vector, clearing all execution state
    /// but keeping the environment (forked bodies see the parent's
    /// variables at fork time).
    pub(crate) fn switch_to_fork_vector(&mut self, fv: usize) {
        self.vector = Some(fv);
        self.pc = 0;
        self.valstack.clear();
        self.scope_stack.clear();
        self.catch_stack.clear();
        self.finally_stack.clear();
        self.temp = v_none();
    }

    pub(crate) fn find_line_no(&self) -> Option<usize> {
        if self.vector.is_some() {
            // Fork vectors have no span table of their own.
            return None;
        }
        self.program.line_for_pc(self.pc.saturating_sub(1))
    }

    #[inline]
    pub(crate) fn set_env(&mut self, id: &Name, v: Var) {
        self.environment[id.0 as usize] = Some(v);
    }

    #[inline]
    pub(crate) fn set_global(&mut self, g: GlobalName, v: Var) {
        self.environment[Names::global(g).0 as usize] = Some(v);
    }

    #[inline]
    pub(crate) fn get_env(&self, id: &Name) -> Option<&Var> {
        self.environment.get(id.0 as usize).and_then(|v| v.as_ref())
    }

    #[inline]
    pub(crate) fn get_global(&self, g: GlobalName) -> Option<&Var> {
        self.get_env(&Names::global(g))
    }

    #[inline]
    pub(crate) fn lookahead(&self) -> Option<Op> {
        self.opcodes().get(self.pc).cloned()
    }

    #[inline]
    pub(crate) fn skip(&mut self) {
        self.pc += 1;
    }

    #[inline]
    pub(crate) fn pop(&mut self) -> Var {
        self.valstack
            .pop()
            .unwrap_or_else(|| panic!("stack underflow @ PC: {}", self.pc))
    }

    #[inline]
    pub(crate) fn push(&mut self, v: Var) {
        self.valstack.push(v)
    }

    #[inline]
    pub(crate) fn peek_top(&self) -> &Var {
        self.valstack.last().expect("stack underflow")
    }

    #[inline]
    pub(crate) fn peek2(&self) -> (&Var, &Var) {
        let l = self.valstack.len();
        (&self.valstack[l - 1], &self.valstack[l - 2])
    }

    #[inline]
    pub(crate) fn peek_abs(&self, pos: usize) -> &Var {
        &self.valstack[pos]
    }

    #[inline]
    pub(crate) fn poke(&mut self, amt: usize, v: Var) {
        let l = self.valstack.len();
        self.valstack[l - amt - 1] = v;
    }

    #[inline]
    pub(crate) fn jump(&mut self, label: &Label) {
        self.pc = self.program.jump_labels[label.0 as usize].position.0 as usize;
    }

    /// Enter a handler scope; the marker slot keeps handlers at distinct
    /// depths so `Exit` can tell inside-the-loop from outside.
    pub(crate) fn enter_scope(&mut self, scope_type: ScopeType) {
        self.scope_stack.push(Scope {
            scope_type,
            valstack_pos: self.valstack.len(),
        });
        self.push(v_none());
    }

    /// Leave a scope, truncating the value stack back to its entry depth.
    pub(crate) fn pop_scope(&mut self) -> Option<Scope> {
        let scope = self.scope_stack.pop()?;
        self.valstack.truncate(scope.valstack_pos);
        Some(scope)
    }
}
