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

use grange_var::Objid;

use crate::tasks::TaskId;
use crate::vm::activation::Activation;

/// The execution state for one run of the stack machine: the activation
/// stack and nothing else. Tick and time accounting live on the task, so
/// nested evaluator runs (hook verbs) share the same budget.
#[derive(Debug)]
pub struct VmExecState {
    pub task_id: TaskId,
    pub stack: Vec<Activation>,
}

impl VmExecState {
    pub fn new(task_id: TaskId, root: Activation) -> Self {
        Self {
            task_id,
            stack: vec![root],
        }
    }

    pub fn top(&self) -> &Activation {
        self.stack.last().expect("empty activation stack")
    }

    pub fn top_mut(&mut self) -> &mut Activation {
        self.stack.last_mut().expect("empty activation stack")
    }

    /// The permissions the task currently acts under: the programmer of
    /// the top frame.
    pub fn task_perms(&self) -> Objid {
        self.top().permissions
    }

    /// The programmer of the frame beneath the current one, or the current
    /// frame's at the root.
    pub fn caller_perms(&self) -> Objid {
        let len = self.stack.len();
        if len >= 2 {
            self.stack[len - 2].permissions
        } else {
            self.stack[0].permissions
        }
    }

    /// Push a value as the result of the instruction the top frame is
    /// waiting on (a returned verb call, a resumed suspend).
    pub fn set_return_value(&mut self, v: grange_var::Var) {
        self.top_mut().frame.push(v);
    }

    /// The `callers()` listing: every frame beneath the current one, most
    /// recent first, with server-initiated frames hidden.
    pub fn callers(&self) -> Vec<grange_var::Var> {
        let len = self.stack.len();
        self.stack[..len.saturating_sub(1)]
            .iter()
            .rev()
            .filter(|a| !a.server_initiated)
            .map(|a| a.traceback_entry())
            .collect()
    }

    /// The full stack, for `task_stack()` on suspended tasks.
    pub fn full_stack(&self) -> Vec<grange_var::Var> {
        self.stack.iter().rev().map(|a| a.traceback_entry()).collect()
    }
}
