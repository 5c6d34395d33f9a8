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

//! Shared scaffolding for the scenario tests: a world seeded with a wizard
//! system object, and helpers to run a program to completion in it.

use std::sync::Arc;

use grange_compiler::compile;
use grange_db::{ObjFlag, Verb, VerbArgsSpec, VerbFlag};
use grange_kernel::{Scheduler, TaskResult, World};
use grange_var::{Error, Objid, Var, NOTHING, SYSTEM_OBJECT};

/// A world whose `#0` is a wizard programmer player, the way a freshly
/// seeded core has one.
pub fn wizard_world() -> World {
    let mut world = World::headless();
    let wiz = world.store.create_object(&[], NOTHING, false).unwrap();
    assert_eq!(wiz, SYSTEM_OBJECT);
    let o = world.store.get_mut(wiz).unwrap();
    o.name = "System Object".to_string();
    o.flags.set(ObjFlag::Wizard);
    o.flags.set(ObjFlag::Programmer);
    o.flags.set(ObjFlag::User);
    world
}

/// Run `source` as `#0` until the task queue drains; the task's completion
/// record.
pub fn run_program(world: &mut World, source: &str) -> TaskResult {
    let mut scheduler = Scheduler::new();
    let tid = scheduler
        .submit_program_task(SYSTEM_OBJECT, SYSTEM_OBJECT, source)
        .expect("program failed to compile");
    scheduler.run(world);
    scheduler
        .result_of(tid)
        .expect("task did not finish")
        .clone()
}

#[track_caller]
pub fn eval_ok(world: &mut World, source: &str) -> Var {
    match run_program(world, source) {
        TaskResult::Success(v) => v,
        other => panic!("task did not succeed: {other:?}"),
    }
}

#[track_caller]
pub fn eval_raises(world: &mut World, source: &str) -> Error {
    match run_program(world, source) {
        TaskResult::Exception(e) => e.code,
        other => panic!("task did not raise: {other:?}"),
    }
}

/// Attach a compiled verb to `obj`, readable/executable with the `d` bit
/// set, owned by the system object.
pub fn add_verb(world: &mut World, obj: Objid, name: &str, source: &str) {
    let program = compile(source).expect("verb failed to compile");
    world
        .store
        .add_verb(
            obj,
            Verb {
                names: vec![name.to_string()],
                owner: SYSTEM_OBJECT,
                perms: VerbFlag::rxd(),
                args: VerbArgsSpec::this_none_this(),
                source: source.lines().map(str::to_string).collect(),
                program: Arc::new(program),
            },
        )
        .unwrap();
}
