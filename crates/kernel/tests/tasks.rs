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

//! Scheduler scenarios: suspension and resumption, forked tasks, kills,
//! quota exhaustion, and the uncaught-error hook.

mod common;

use pretty_assertions::assert_eq;

use common::{add_verb, eval_ok, run_program, wizard_world};
use grange_kernel::{Scheduler, TaskId, TaskResult};
use grange_var::Error::{E_QUOTA, E_TYPE};
use grange_var::{v_int, Variant, SYSTEM_OBJECT};

#[test]
fn suspend_resume_round_trip() {
    let mut world = wizard_world();
    let mut scheduler = Scheduler::new();
    let t1 = scheduler
        .submit_program_task(SYSTEM_OBJECT, SYSTEM_OBJECT, "v = suspend(); return v * 2;")
        .unwrap();
    scheduler.run(&mut world);
    // Suspended indefinitely; not finished yet.
    assert!(scheduler.result_of(t1).is_none());

    let t2 = scheduler
        .submit_program_task(
            SYSTEM_OBJECT,
            SYSTEM_OBJECT,
            &format!("return resume({t1}, 42);"),
        )
        .unwrap();
    scheduler.run(&mut world);
    assert_eq!(scheduler.result_of(t2), Some(&TaskResult::Success(v_int(0))));
    // The suspend call returned the resume value.
    assert_eq!(
        scheduler.result_of(t1),
        Some(&TaskResult::Success(v_int(84)))
    );
}

#[test]
fn timed_suspend_wakes_on_its_own() {
    let mut world = wizard_world();
    let result = run_program(&mut world, "x = suspend(0); return x + 7;");
    // A timed wakeup resumes with 0 as the suspend result.
    assert_eq!(result, TaskResult::Success(v_int(7)));
}

#[test]
fn forked_task_runs_independently() {
    let mut world = wizard_world();
    let mut scheduler = Scheduler::new();
    let t1 = scheduler
        .submit_program_task(
            SYSTEM_OBJECT,
            SYSTEM_OBJECT,
            "fork t (0)\nreturn 7;\nendfork\nreturn t;",
        )
        .unwrap();
    scheduler.run(&mut world);
    let Some(TaskResult::Success(forked)) = scheduler.result_of(t1) else {
        panic!("forking task did not succeed");
    };
    let Variant::Int(forked) = forked.variant() else {
        panic!("fork label did not bind a task id");
    };
    let forked = *forked as TaskId;
    assert_ne!(forked, t1);
    assert_eq!(
        scheduler.result_of(forked),
        Some(&TaskResult::Success(v_int(7)))
    );
}

#[test]
fn forked_task_sees_the_forking_frame_environment() {
    let mut world = wizard_world();
    let mut scheduler = Scheduler::new();
    let t1 = scheduler
        .submit_program_task(
            SYSTEM_OBJECT,
            SYSTEM_OBJECT,
            "x = 5;\nfork t (0)\nreturn x * 2;\nendfork\nreturn t;",
        )
        .unwrap();
    scheduler.run(&mut world);
    let Some(TaskResult::Success(forked)) = scheduler.result_of(t1) else {
        panic!("forking task did not succeed");
    };
    let Variant::Int(forked) = forked.variant() else {
        panic!("fork label did not bind a task id");
    };
    assert_eq!(
        scheduler.result_of(*forked as TaskId),
        Some(&TaskResult::Success(v_int(10)))
    );
}

#[test]
fn kill_task_ends_a_suspended_task() {
    let mut world = wizard_world();
    let mut scheduler = Scheduler::new();
    let t1 = scheduler
        .submit_program_task(SYSTEM_OBJECT, SYSTEM_OBJECT, "suspend(); return 1;")
        .unwrap();
    scheduler.run(&mut world);
    assert!(scheduler.result_of(t1).is_none());

    let t2 = scheduler
        .submit_program_task(
            SYSTEM_OBJECT,
            SYSTEM_OBJECT,
            &format!("return kill_task({t1});"),
        )
        .unwrap();
    scheduler.run(&mut world);
    assert_eq!(scheduler.result_of(t2), Some(&TaskResult::Success(v_int(0))));
    assert_eq!(scheduler.result_of(t1), Some(&TaskResult::Killed));
}

#[test]
fn killing_the_current_task_is_an_interrupt() {
    let mut world = wizard_world();
    let result = run_program(&mut world, "kill_task(task_id()); return 1;");
    let TaskResult::Exception(e) = result else {
        panic!("self-kill did not raise: {result:?}");
    };
    assert_eq!(e.code, grange_var::Error::E_INTRPT);
}

#[test]
fn tick_exhaustion_raises_quota() {
    let mut world = wizard_world();
    // The eval frame carries the `d` bit, so the spin dies catchably.
    let result = run_program(&mut world, "while (1) endwhile return 0;");
    let TaskResult::Exception(e) = result else {
        panic!("spin did not raise: {result:?}");
    };
    assert_eq!(e.code, E_QUOTA);
}

#[test]
fn ticks_decrease_and_task_id_is_stable() {
    let mut world = wizard_world();
    let v = eval_ok(
        &mut world,
        r#"
        a = ticks_left();
        b = ticks_left();
        if (a <= b)
            return "ticks did not decrease";
        endif
        if (task_id() != task_id())
            return "task id moved";
        endif
        return "ok";
        "#,
    );
    assert_eq!(v, grange_var::v_str("ok"));
}

#[test]
fn uncaught_errors_reach_the_hook_and_the_record() {
    let mut world = wizard_world();
    world
        .store
        .add_property(
            SYSTEM_OBJECT,
            "crashes",
            v_int(0),
            SYSTEM_OBJECT,
            grange_db::BitEnum::new_with(grange_db::PropFlag::Read),
        )
        .unwrap();
    add_verb(
        &mut world,
        SYSTEM_OBJECT,
        "handle_uncaught_error",
        "#0.crashes = #0.crashes + 1; return 1;",
    );
    let result = run_program(&mut world, r#"return 1 + "x";"#);
    let TaskResult::Exception(e) = result else {
        panic!("type error did not surface: {result:?}");
    };
    assert_eq!(e.code, E_TYPE);
    assert_eq!(
        world.store.resolve_property(SYSTEM_OBJECT, "crashes").unwrap(),
        v_int(1)
    );
}

#[test]
fn queued_tasks_lists_suspended_tasks() {
    let mut world = wizard_world();
    let mut scheduler = Scheduler::new();
    let t1 = scheduler
        .submit_program_task(SYSTEM_OBJECT, SYSTEM_OBJECT, "suspend(); return 1;")
        .unwrap();
    scheduler.run(&mut world);

    let t2 = scheduler
        .submit_program_task(
            SYSTEM_OBJECT,
            SYSTEM_OBJECT,
            &format!("q = queued_tasks(); return {{length(q), q[1][1] == {t1}}};"),
        )
        .unwrap();
    scheduler.run(&mut world);
    assert_eq!(
        scheduler.result_of(t2),
        Some(&TaskResult::Success(grange_var::v_list(&[
            v_int(1),
            v_int(1)
        ])))
    );
}

#[test]
fn task_stack_reports_the_suspended_frame() {
    let mut world = wizard_world();
    add_verb(&mut world, SYSTEM_OBJECT, "parked", "suspend(); return 1;");
    let mut scheduler = Scheduler::new();
    let t1 = scheduler
        .submit_program_task(SYSTEM_OBJECT, SYSTEM_OBJECT, "return #0:parked();")
        .unwrap();
    scheduler.run(&mut world);

    let t2 = scheduler
        .submit_program_task(
            SYSTEM_OBJECT,
            SYSTEM_OBJECT,
            &format!("s = task_stack({t1}); return {{length(s), s[1][2]}};"),
        )
        .unwrap();
    scheduler.run(&mut world);
    assert_eq!(
        scheduler.result_of(t2),
        Some(&TaskResult::Success(grange_var::v_list(&[
            v_int(2),
            grange_var::v_str("parked")
        ])))
    );
}

#[test]
fn set_task_perms_rebinds_wizardness() {
    let mut world = wizard_world();
    let peon = world
        .store
        .create_object(&[], SYSTEM_OBJECT, false)
        .unwrap();
    // Dropping to an unprivileged identity locks wizard-only builtins out.
    let result = run_program(
        &mut world,
        &format!("set_task_perms(#{}); return dump_database();", peon.0),
    );
    let TaskResult::Exception(e) = result else {
        panic!("wizard check did not fire: {result:?}");
    };
    assert_eq!(e.code, grange_var::Error::E_PERM);
}
