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

//! The cooperative task scheduler. One task advances at a time, a slice of
//! instructions per turn; suspension, forking, and quota enforcement all
//! surface here.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, warn};

use grange_compiler::{compile, CompileError};
use grange_var::Error::E_INVARG;
use grange_var::{v_int, v_objid, v_str, Error, Objid, Var, SYSTEM_OBJECT};

use crate::tasks::task::{FinishedTask, Task, TaskMeta, TaskResult, TaskState};
use crate::tasks::{TaskContext, TaskId};
use crate::vm::activation::Activation;
use crate::vm::dispatch::{call_verb_nested, resolve_verb};
use crate::vm::execute::run_slice;
use crate::vm::{AbortReason, ExecutionResult, VmExecState};
use crate::world::World;

/// The live task table. Builtins reach it through `TaskContext` to resume,
/// kill, and list tasks other than the one running.
#[derive(Default)]
pub struct TaskQ {
    pub(crate) tasks: HashMap<TaskId, Task>,
    pub(crate) finished: Vec<FinishedTask>,
    next_id: TaskId,
}

impl TaskQ {
    pub fn allocate_task_id(&mut self) -> TaskId {
        self.next_id += 1;
        self.next_id
    }

    /// Enqueue a forked task. Called from the VM when it executes a `fork`
    /// opcode, and shares the fork's activation snapshot.
    pub(crate) fn submit_fork(
        &mut self,
        id: TaskId,
        player: Objid,
        activation: Activation,
        delay: Option<Duration>,
    ) {
        let mut meta = TaskMeta::new(id, player);
        meta.state = match delay {
            None => TaskState::Runnable,
            Some(d) => TaskState::Suspended {
                wake: Some(Instant::now() + d),
            },
        };
        let vm = VmExecState::new(id, activation);
        self.tasks.insert(id, Task { meta, vm });
    }

    /// `resume(task_id, value)`: move a suspended task to the runnable set
    /// with `value` as its suspend result.
    pub(crate) fn resume(&mut self, id: TaskId, value: Var) -> Result<(), Error> {
        let Some(task) = self.tasks.get_mut(&id) else {
            return Err(E_INVARG);
        };
        if !matches!(task.meta.state, TaskState::Suspended { .. })
            || task.meta.pending_resume.is_none()
        {
            return Err(E_INVARG);
        }
        task.meta.pending_resume = Some(Some(value));
        task.meta.state = TaskState::Runnable;
        Ok(())
    }

    /// Kill a queued or suspended task outright. The running task kills
    /// itself through `E_INTRPT` instead.
    pub(crate) fn kill(&mut self, id: TaskId) -> Result<(), Error> {
        let Some(mut task) = self.tasks.remove(&id) else {
            return Err(E_INVARG);
        };
        task.meta.kill_requested = true;
        self.finished.push(FinishedTask {
            id,
            player: task.meta.player,
            result: TaskResult::Killed,
        });
        Ok(())
    }

    pub(crate) fn owner_of(&self, id: TaskId) -> Option<Objid> {
        self.tasks.get(&id).map(|t| t.meta.player)
    }

    /// Listing of suspended/queued tasks in the classic
    /// `{id, start-time, x, ticks-left, programmer, verb-loc, verb-name,
    /// line, this}` shape.
    pub(crate) fn queued_tasks_listing(&self) -> Vec<Var> {
        let mut entries: Vec<(TaskId, Var)> = self
            .tasks
            .iter()
            .map(|(id, task)| {
                let top = task.vm.top();
                let start = task
                    .meta
                    .start_time
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.as_secs() as i64)
                    .unwrap_or(0);
                let entry = grange_var::v_list(&[
                    v_int(*id as i64),
                    v_int(start),
                    v_int(0),
                    v_int(task.meta.max_ticks.saturating_sub(task.meta.tick_count) as i64),
                    v_objid(top.permissions),
                    v_objid(top.verb_definer),
                    v_str(&top.verb_name),
                    v_int(top.line_number().unwrap_or(0) as i64),
                    top.this.clone(),
                ]);
                (*id, entry)
            })
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries.into_iter().map(|(_, e)| e).collect()
    }

    pub(crate) fn finished_tasks_listing(&self) -> Vec<Var> {
        self.finished
            .iter()
            .map(|ft| {
                let outcome = match &ft.result {
                    TaskResult::Success(v) => {
                        grange_var::v_list(&[v_str("success"), v.clone()])
                    }
                    TaskResult::Exception(e) => {
                        grange_var::v_list(&[v_str("exception"), e.triple()])
                    }
                    TaskResult::AbortedTicks => {
                        grange_var::v_list(&[v_str("abort"), v_str("ticks")])
                    }
                    TaskResult::AbortedSeconds => {
                        grange_var::v_list(&[v_str("abort"), v_str("seconds")])
                    }
                    TaskResult::Killed => grange_var::v_list(&[v_str("killed"), v_int(0)]),
                };
                grange_var::v_list(&[v_int(ft.id as i64), v_objid(ft.player), outcome])
            })
            .collect()
    }

    /// The call stack of a suspended task, as `task_stack(id)` reports it.
    pub(crate) fn task_stack(&self, id: TaskId) -> Result<Vec<Var>, Error> {
        let Some(task) = self.tasks.get(&id) else {
            return Err(E_INVARG);
        };
        Ok(task.vm.full_stack())
    }
}

/// Owns the task queue and drives it to quiescence.
#[derive(Default)]
pub struct Scheduler {
    pub q: TaskQ,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a task that calls `obj:verb(args)` as `player`.
    pub fn submit_verb_task(
        &mut self,
        world: &mut World,
        player: Objid,
        receiver: Objid,
        verb: &str,
        args: Vec<Var>,
        server_initiated: bool,
    ) -> Result<TaskId, Error> {
        let (resolved, this) = resolve_verb(world, &v_objid(receiver), verb)?;
        let id = self.q.allocate_task_id();
        let activation = Activation::for_call(
            &resolved,
            this,
            player,
            v_objid(player),
            args,
            server_initiated,
        );
        let meta = TaskMeta::new(id, player);
        let vm = VmExecState::new(id, activation);
        self.q.tasks.insert(id, Task { meta, vm });
        Ok(id)
    }

    /// Compile and start a free-standing program, as `eval` would.
    pub fn submit_program_task(
        &mut self,
        player: Objid,
        programmer: Objid,
        source: &str,
    ) -> Result<TaskId, CompileError> {
        let program = Arc::new(compile(source)?);
        let id = self.q.allocate_task_id();
        let activation = Activation::for_eval(program, programmer, player);
        let meta = TaskMeta::new(id, player);
        let vm = VmExecState::new(id, activation);
        self.q.tasks.insert(id, Task { meta, vm });
        Ok(id)
    }

    /// The completion record of a task, if it has finished.
    pub fn result_of(&self, id: TaskId) -> Option<&TaskResult> {
        self.q
            .finished
            .iter()
            .find(|ft| ft.id == id)
            .map(|ft| &ft.result)
    }

    /// Run until every task has finished or is suspended with no wakeup
    /// time. Timed suspensions are waited out.
    pub fn run(&mut self, world: &mut World) {
        loop {
            self.promote_due_wakeups();
            let Some(tid) = self.next_runnable() else {
                // Nothing runnable; wait for a timed wakeup or stop.
                match self.earliest_wakeup() {
                    Some(wake) => {
                        let now = Instant::now();
                        if wake > now {
                            std::thread::sleep(wake - now);
                        }
                        continue;
                    }
                    None => break,
                }
            };
            self.run_task_slice(world, tid);
            if world.shutdown_requested.is_some() {
                break;
            }
        }
    }

    fn promote_due_wakeups(&mut self) {
        let now = Instant::now();
        for task in self.q.tasks.values_mut() {
            if let TaskState::Suspended { wake: Some(wake) } = task.meta.state {
                if wake <= now {
                    task.meta.state = TaskState::Runnable;
                }
            }
        }
    }

    fn next_runnable(&self) -> Option<TaskId> {
        self.q
            .tasks
            .iter()
            .filter(|(_, t)| t.meta.state == TaskState::Runnable)
            .map(|(id, _)| *id)
            .min()
    }

    fn earliest_wakeup(&self) -> Option<Instant> {
        self.q
            .tasks
            .values()
            .filter_map(|t| match t.meta.state {
                TaskState::Suspended { wake } => wake,
                _ => None,
            })
            .min()
    }

    fn run_task_slice(&mut self, world: &mut World, tid: TaskId) {
        let Some(mut task) = self.q.tasks.remove(&tid) else {
            return;
        };

        if task.meta.kill_requested {
            // No finally bodies run for a killed task.
            self.q.finished.push(FinishedTask {
                id: tid,
                player: task.meta.player,
                result: TaskResult::Killed,
            });
            return;
        }

        // A task coming back from suspend() gets fresh budgets and the
        // resume value as the result of the suspend call.
        if let Some(value) = task.meta.pending_resume.take() {
            task.meta.refresh_budgets();
            task.vm.set_return_value(value.unwrap_or(v_int(0)));
        }

        let result = {
            let mut ctx = TaskContext {
                world,
                q: &mut self.q,
                meta: &mut task.meta,
            };
            run_slice(&mut task.vm, &mut ctx)
        };

        match result {
            ExecutionResult::More => {
                self.q.tasks.insert(tid, task);
            }
            ExecutionResult::Complete(v) => {
                self.q.finished.push(FinishedTask {
                    id: tid,
                    player: task.meta.player,
                    result: TaskResult::Success(v),
                });
            }
            ExecutionResult::Exception(exception) => {
                warn!(
                    task = tid,
                    code = %exception.code,
                    msg = exception.msg,
                    "task aborted with uncaught exception"
                );
                // Give #0:handle_uncaught_error a look, permissions and
                // errors silently ignored.
                let player = task.meta.player;
                let mut ctx = TaskContext {
                    world,
                    q: &mut self.q,
                    meta: &mut task.meta,
                };
                let hook_args = vec![
                    grange_var::v_err(exception.code),
                    grange_var::v_string(exception.msg.clone()),
                    exception.value.clone(),
                    grange_var::v_list(&exception.backtrace),
                ];
                if let Some(Err(hook_err)) = call_verb_nested(
                    &mut ctx,
                    player,
                    &v_objid(SYSTEM_OBJECT),
                    "handle_uncaught_error",
                    hook_args,
                    v_objid(SYSTEM_OBJECT),
                    true,
                ) {
                    error!(code = %hook_err.code, "handle_uncaught_error itself failed");
                }
                self.q.finished.push(FinishedTask {
                    id: tid,
                    player: task.meta.player,
                    result: TaskResult::Exception(exception),
                });
            }
            ExecutionResult::Suspend(duration) => {
                task.meta.pending_resume = Some(None);
                task.meta.state = TaskState::Suspended {
                    wake: duration.map(|d| Instant::now() + d),
                };
                self.q.tasks.insert(tid, task);
            }
            ExecutionResult::Aborted(reason) => {
                warn!(task = tid, ?reason, "task blew its quota");
                let result = match reason {
                    AbortReason::Ticks => TaskResult::AbortedTicks,
                    AbortReason::Seconds => TaskResult::AbortedSeconds,
                };
                self.q.finished.push(FinishedTask {
                    id: tid,
                    player: task.meta.player,
                    result,
                });
            }
        }
    }
}
