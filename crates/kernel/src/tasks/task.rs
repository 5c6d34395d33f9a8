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

use std::time::{Duration, Instant, SystemTime};

use grange_var::{v_empty_map, Objid, Var};

use crate::tasks::{TaskId, DEFAULT_MAX_SECONDS, DEFAULT_MAX_TICKS};
use crate::vm::{Exception, VmExecState};

#[derive(Clone, Debug, PartialEq)]
pub enum TaskState {
    Runnable,
    /// Off the runnable set. `wake: None` suspends indefinitely, until
    /// `resume()` or `kill_task()`.
    Suspended { wake: Option<Instant> },
}

/// Accounting and identity for one task; the execution state itself lives
/// in `Task::vm`. Tick and second budgets are charged here so that nested
/// evaluator runs share them.
#[derive(Debug)]
pub struct TaskMeta {
    pub id: TaskId,
    pub player: Objid,
    pub state: TaskState,
    pub max_ticks: usize,
    pub tick_count: usize,
    pub deadline: Instant,
    pub max_seconds: u64,
    /// Set by `kill_task`; honored at the next slice boundary, without
    /// running `finally` bodies.
    pub kill_requested: bool,
    /// `Some` while suspended by `suspend()`: the value `resume()` filled
    /// in, pushed as the suspend call's result when we next run.
    pub pending_resume: Option<Option<Var>>,
    /// Task-local storage, private to this task.
    pub local: Var,
    pub start_time: SystemTime,
    /// Current depth of hook-driven nested evaluator runs.
    pub nesting: usize,
}

impl TaskMeta {
    pub fn new(id: TaskId, player: Objid) -> Self {
        Self {
            id,
            player,
            state: TaskState::Runnable,
            max_ticks: DEFAULT_MAX_TICKS,
            tick_count: 0,
            deadline: Instant::now() + Duration::from_secs(DEFAULT_MAX_SECONDS),
            max_seconds: DEFAULT_MAX_SECONDS,
            kill_requested: false,
            pending_resume: None,
            local: v_empty_map(),
            start_time: SystemTime::now(),
            nesting: 0,
        }
    }

    /// Fresh budgets, used when a task resumes from suspension.
    pub fn refresh_budgets(&mut self) {
        self.tick_count = 0;
        self.deadline = Instant::now() + Duration::from_secs(self.max_seconds);
    }
}

#[derive(Debug)]
pub struct Task {
    pub meta: TaskMeta,
    pub vm: VmExecState,
}

/// The completion record of a finished task, visible to `finished_tasks()`.
#[derive(Clone, Debug, PartialEq)]
pub enum TaskResult {
    Success(Var),
    Exception(Exception),
    AbortedTicks,
    AbortedSeconds,
    Killed,
}

#[derive(Debug)]
pub struct FinishedTask {
    pub id: TaskId,
    pub player: Objid,
    pub result: TaskResult,
}
