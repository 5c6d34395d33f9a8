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

pub mod scheduler;
pub mod sessions;
pub mod task;

use std::time::Instant;

use crate::tasks::scheduler::TaskQ;
use crate::tasks::task::TaskMeta;
use crate::world::World;

pub type TaskId = usize;

/// Tick budget for a fresh task.
pub const DEFAULT_MAX_TICKS: usize = 300_000;
/// Wall-clock budget, seconds.
pub const DEFAULT_MAX_SECONDS: u64 = 5;
/// How many instructions a task may run before the scheduler gets a look-in.
pub const TICK_SLICE: usize = 4096;
/// How deep hook-driven nested evaluator runs may stack.
pub const MAX_NESTING: usize = 32;

/// Everything an executing instruction may touch besides its own VM state:
/// the world, the other tasks, and the running task's own accounting.
pub struct TaskContext<'a> {
    pub world: &'a mut World,
    pub q: &'a mut TaskQ,
    pub meta: &'a mut TaskMeta,
}

impl TaskContext<'_> {
    pub fn ticks_left(&self) -> usize {
        self.meta.max_ticks.saturating_sub(self.meta.tick_count)
    }

    pub fn seconds_left(&self) -> u64 {
        self.meta
            .deadline
            .saturating_duration_since(Instant::now())
            .as_secs()
    }
}
