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
use std::time::Duration;

use tracing::{error, info};

use grange_compiler::{compile, offset_for_builtin, BUILTINS};
use grange_var::Error::{E_INTRPT, E_INVARG, E_PERM, E_TYPE};
use grange_var::{
    v_int, v_list, v_objid, v_str, v_string, Objid, Var, Variant,
};

use crate::builtins::BfRet::{Ret, VmInstr};
use crate::builtins::{check_builtin_args, registry, BfCallState, BfErr, BfRet, BuiltinFunction};
use crate::tasks::TaskId;
use crate::vm::activation::Activation;
use crate::vm::dispatch::run_nested;
use crate::vm::{Exception, ExecutionResult};

/// `raise(code [, message [, value]])`: construct and raise the triple,
/// regardless of the `d` bit.
fn bf_raise(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let Variant::Err(code) = bf_args.args[0].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let msg = match bf_args.args.get(1) {
        None => code.message().to_string(),
        Some(v) => match v.variant() {
            Variant::Str(s) => s.as_str().to_string(),
            _ => return Err(BfErr::Code(E_TYPE)),
        },
    };
    let value = bf_args.args.get(2).cloned().unwrap_or(v_int(0));
    Err(BfErr::Raise(Exception::new(*code, msg, value)))
}

/// `call_function(name, args...)`: re-enter the registry by name.
fn bf_call_function(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let Variant::Str(name) = bf_args.args[0].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let Some(id) = BUILTINS.find_builtin(name.as_str()) else {
        return Err(BfErr::Code(E_INVARG));
    };
    let descriptor = BUILTINS.description_for(id).expect("id from lookup");
    let args: Vec<Var> = bf_args.args[1..].to_vec();
    check_builtin_args(descriptor, &args).map_err(BfErr::Code)?;
    let function = registry().builtin_for(id);
    let mut inner = BfCallState {
        name: BUILTINS.name_of(id).expect("id from lookup"),
        args,
        exec_state: bf_args.exec_state,
        ctx: bf_args.ctx,
    };
    function(&mut inner)
}

/// `function_info([name])`: `{name, id, 1}`, or the whole table.
fn bf_function_info(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let entry = |id: grange_compiler::BuiltinId, name: &str| {
        v_list(&[v_str(name), v_int(id.0 as i64), v_int(1)])
    };
    if let Some(v) = bf_args.args.first() {
        let Variant::Str(name) = v.variant() else {
            return Err(BfErr::Code(E_TYPE));
        };
        let Some(id) = BUILTINS.find_builtin(name.as_str()) else {
            return Err(BfErr::Code(E_INVARG));
        };
        let name = BUILTINS.name_of(id).expect("id from lookup");
        return Ok(Ret(entry(id, name)));
    }
    let all: Vec<Var> = BUILTINS
        .descriptions()
        .map(|(id, b)| entry(id, b.name))
        .collect();
    Ok(Ret(v_list(&all)))
}

/// `eval(source)`: programmers only. `{1, value}` on success, `{0, error
/// lines}` on compile failure; runtime exceptions propagate.
fn bf_eval(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let Variant::Str(source) = bf_args.args[0].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let perms = bf_args.task_perms_who();
    if !bf_args.ctx.world.store.is_programmer(perms) && !bf_args.is_wizard() {
        return Err(BfErr::Code(E_PERM));
    }
    let program = match compile(source.as_str()) {
        Ok(p) => Arc::new(p),
        Err(e) => {
            return Ok(Ret(v_list(&[v_int(0), v_list(&[v_string(e.to_string())])])));
        }
    };
    let player = bf_args.exec_state.top().player;
    let activation = Activation::for_eval(program, perms, player);
    match run_nested(bf_args.ctx, activation) {
        Ok(v) => Ok(Ret(v_list(&[v_int(1), v]))),
        Err(e) => Err(BfErr::Raise(e)),
    }
}

fn bf_suspend(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let delay = match bf_args.args.first() {
        None => None,
        Some(v) => {
            let seconds = match v.variant() {
                Variant::Int(i) => *i as f64,
                Variant::Float(f) => *f,
                _ => return Err(BfErr::Code(E_TYPE)),
            };
            if seconds < 0.0 {
                return Err(BfErr::Code(E_INVARG));
            }
            Some(Duration::from_secs_f64(seconds))
        }
    };
    Ok(VmInstr(ExecutionResult::Suspend(delay)))
}

fn task_id_arg(bf_args: &BfCallState<'_, '_>, n: usize) -> Result<TaskId, BfErr> {
    match bf_args.args.get(n).map(|v| v.variant()) {
        Some(Variant::Int(i)) if *i >= 0 => Ok(*i as TaskId),
        Some(Variant::Int(_)) => Err(BfErr::Code(E_INVARG)),
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

/// Owner-or-wizard guard for operations on other tasks.
fn check_task_perms(bf_args: &BfCallState<'_, '_>, id: TaskId) -> Result<(), BfErr> {
    if bf_args.is_wizard() {
        return Ok(());
    }
    match bf_args.ctx.q.owner_of(id) {
        Some(owner) if owner == bf_args.task_perms_who() => Ok(()),
        Some(_) => Err(BfErr::Code(E_PERM)),
        None => Err(BfErr::Code(E_INVARG)),
    }
}

fn bf_resume(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let id = task_id_arg(bf_args, 0)?;
    let value = bf_args.args.get(1).cloned().unwrap_or(v_int(0));
    check_task_perms(bf_args, id)?;
    bf_args.ctx.q.resume(id, value).map_err(BfErr::Code)?;
    Ok(Ret(v_int(0)))
}

fn bf_task_id(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_int(bf_args.ctx.meta.id as i64)))
}

fn bf_kill_task(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let id = task_id_arg(bf_args, 0)?;
    if id == bf_args.ctx.meta.id {
        // Killing the current task interrupts it on the spot.
        return Err(BfErr::Raise(Exception::new(
            E_INTRPT,
            E_INTRPT.message().to_string(),
            v_int(0),
        )));
    }
    check_task_perms(bf_args, id)?;
    bf_args.ctx.q.kill(id).map_err(BfErr::Code)?;
    Ok(Ret(v_int(0)))
}

fn bf_queued_tasks(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_list(&bf_args.ctx.q.queued_tasks_listing())))
}

/// Tasks run one at a time on the scheduler's own thread, so there are
/// never helper threads to report.
fn bf_threads(_bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(grange_var::v_empty_list()))
}

fn bf_finished_tasks(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_list(&bf_args.ctx.q.finished_tasks_listing())))
}

fn bf_queue_info(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    match bf_args.args.first() {
        None => {
            let mut players: Vec<Objid> = bf_args
                .ctx
                .q
                .tasks
                .values()
                .map(|t| t.meta.player)
                .collect();
            players.sort();
            players.dedup();
            Ok(Ret(v_list(
                &players.into_iter().map(v_objid).collect::<Vec<_>>(),
            )))
        }
        Some(v) => {
            let Variant::Obj(player) = v.variant() else {
                return Err(BfErr::Code(E_TYPE));
            };
            let count = bf_args
                .ctx
                .q
                .tasks
                .values()
                .filter(|t| t.meta.player == *player)
                .count();
            Ok(Ret(v_int(count as i64)))
        }
    }
}

fn bf_task_stack(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let id = task_id_arg(bf_args, 0)?;
    check_task_perms(bf_args, id)?;
    let stack = bf_args.ctx.q.task_stack(id).map_err(BfErr::Code)?;
    Ok(Ret(v_list(&stack)))
}

fn bf_callers(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_list(&bf_args.exec_state.callers())))
}

fn bf_caller_perms(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_objid(bf_args.caller_perms())))
}

/// `set_task_perms(who)`: re-identify the current frame. Non-wizards may
/// only set their own player identity.
fn bf_set_task_perms(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let Variant::Obj(who) = bf_args.args[0].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let who = *who;
    if !bf_args.is_wizard() && who != bf_args.exec_state.top().player {
        return Err(BfErr::Code(E_PERM));
    }
    bf_args.exec_state.top_mut().permissions = who;
    Ok(Ret(v_int(0)))
}

fn bf_ticks_left(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_int(bf_args.ctx.ticks_left() as i64)))
}

fn bf_seconds_left(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_int(bf_args.ctx.seconds_left() as i64)))
}

fn bf_task_local(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(bf_args.ctx.meta.local.clone()))
}

fn bf_set_task_local(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.ctx.meta.local = bf_args.args[0].clone();
    Ok(Ret(v_int(0)))
}

fn bf_server_version(_bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_str(env!("CARGO_PKG_VERSION"))))
}

fn bf_server_log(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.require_wizard()?;
    let Variant::Str(msg) = bf_args.args[0].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let is_error = bf_args.args.get(1).map(|v| v.is_true()).unwrap_or(false);
    if is_error {
        error!("> {}", msg.as_str());
    } else {
        info!("> {}", msg.as_str());
    }
    Ok(Ret(v_int(0)))
}

fn bf_memory_usage(_bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(grange_var::v_empty_list()))
}

fn bf_dump_database(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.require_wizard()?;
    match bf_args.ctx.world.store.dump_database() {
        Ok(()) => Ok(Ret(v_int(1))),
        Err(e) => Err(BfErr::CodeMsg(grange_var::Error::E_FILE, e)),
    }
}

fn bf_shutdown(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.require_wizard()?;
    let msg = match bf_args.args.first() {
        None => String::new(),
        Some(v) => match v.variant() {
            Variant::Str(s) => s.as_str().to_string(),
            _ => return Err(BfErr::Code(E_TYPE)),
        },
    };
    bf_args.ctx.world.shutdown_requested = Some(msg);
    Ok(Ret(v_int(0)))
}

fn bf_load_server_options(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.require_wizard()?;
    let world = &mut bf_args.ctx.world;
    world.options.load(&world.store);
    Ok(Ret(v_int(0)))
}

fn bf_verb_cache_stats(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let stats = bf_args.ctx.world.store.verb_cache_stats();
    Ok(Ret(v_list(&[
        v_int(stats.lookups as i64),
        v_int(stats.hits as i64),
        v_int(stats.misses as i64),
        v_int(stats.flushes as i64),
    ])))
}

fn bf_log_cache_stats(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.require_wizard()?;
    let stats = bf_args.ctx.world.store.verb_cache_stats();
    info!(
        lookups = stats.lookups,
        hits = stats.hits,
        misses = stats.misses,
        flushes = stats.flushes,
        "verb cache stats"
    );
    Ok(Ret(v_int(0)))
}

/// `notify(player, message [, no-flush])`: `1` when delivered, `0` when
/// buffered; quietly succeeds when no connection exists.
fn bf_notify(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let Variant::Obj(player) = bf_args.args[0].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let Variant::Str(msg) = bf_args.args[1].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let player = *player;
    if bf_args.task_perms_who() != player && !bf_args.is_wizard() {
        return Err(BfErr::Code(E_PERM));
    }
    let no_flush = bf_args.args.get(2).map(|v| v.is_true()).unwrap_or(false);
    let Some(connection) = bf_args.ctx.world.connections.get_connection(player) else {
        return Ok(Ret(v_int(1)));
    };
    if no_flush {
        connection.buffer(msg.as_str());
        return Ok(Ret(v_int(0)));
    }
    match connection.send(msg.as_str()) {
        Ok(()) => Ok(Ret(v_int(1))),
        Err(_) => Ok(Ret(v_int(0))),
    }
}

fn bf_connected_players(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let show_all = bf_args.args.first().map(|v| v.is_true()).unwrap_or(false);
    let players = bf_args.ctx.world.connections.connected_players(show_all);
    Ok(Ret(v_list(
        &players.into_iter().map(v_objid).collect::<Vec<_>>(),
    )))
}

fn connection_for(
    bf_args: &BfCallState<'_, '_>,
    n: usize,
) -> Result<Arc<dyn crate::tasks::sessions::Connection>, BfErr> {
    let Variant::Obj(player) = bf_args.args[n].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    bf_args
        .ctx
        .world
        .connections
        .get_connection(*player)
        .ok_or(BfErr::Code(E_INVARG))
}

fn bf_connected_seconds(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let connection = connection_for(bf_args, 0)?;
    Ok(Ret(v_int(connection.connected_seconds() as i64)))
}

fn bf_idle_seconds(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let connection = connection_for(bf_args, 0)?;
    Ok(Ret(v_int(connection.idle_seconds() as i64)))
}

fn bf_connection_name(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let connection = connection_for(bf_args, 0)?;
    Ok(Ret(v_string(connection.remote_addr())))
}

fn bf_listen_port(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_int(bf_args.ctx.world.connections.listen_port() as i64)))
}

/// `connection_info(player)`: `{name, value}` pairs describing the
/// player's connection.
fn bf_connection_info(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let connection = connection_for(bf_args, 0)?;
    let port = bf_args.ctx.world.connections.listen_port();
    Ok(Ret(v_list(&[
        v_list(&[v_str("remote_address"), v_string(connection.remote_addr())]),
        v_list(&[v_str("idle_seconds"), v_int(connection.idle_seconds() as i64)]),
        v_list(&[
            v_str("connected_seconds"),
            v_int(connection.connected_seconds() as i64),
        ]),
        v_list(&[v_str("listen_port"), v_int(port as i64)]),
    ])))
}

fn bf_boot_player(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let Variant::Obj(player) = bf_args.args[0].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let player = *player;
    if bf_args.task_perms_who() != player && !bf_args.is_wizard() {
        return Err(BfErr::Code(E_PERM));
    }
    let _ = bf_args.ctx.world.connections.boot_player(player);
    Ok(Ret(v_int(0)))
}

fn bf_force_input(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let Variant::Obj(player) = bf_args.args[0].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let Variant::Str(line) = bf_args.args[1].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let player = *player;
    if bf_args.task_perms_who() != player && !bf_args.is_wizard() {
        return Err(BfErr::Code(E_PERM));
    }
    let at_front = bf_args.args.get(2).map(|v| v.is_true()).unwrap_or(false);
    let Some(forcer) = &bf_args.ctx.world.input_forcer else {
        return Err(BfErr::Code(E_INVARG));
    };
    forcer
        .force_input(player, line.as_str(), at_front)
        .map_err(|_| BfErr::Code(E_INVARG))?;
    Ok(Ret(v_int(0)))
}

fn bf_switch_player(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.require_wizard()?;
    let (Variant::Obj(old), Variant::Obj(new)) =
        (bf_args.args[0].variant(), bf_args.args[1].variant())
    else {
        return Err(BfErr::Code(E_TYPE));
    };
    bf_args
        .ctx
        .world
        .connections
        .switch_player(*old, *new)
        .map_err(|_| BfErr::Code(E_INVARG))?;
    Ok(Ret(v_int(0)))
}

pub(crate) fn register_bf_server(builtins: &mut [BuiltinFunction]) {
    builtins[offset_for_builtin("raise")] = bf_raise;
    builtins[offset_for_builtin("call_function")] = bf_call_function;
    builtins[offset_for_builtin("function_info")] = bf_function_info;
    builtins[offset_for_builtin("eval")] = bf_eval;
    builtins[offset_for_builtin("suspend")] = bf_suspend;
    builtins[offset_for_builtin("resume")] = bf_resume;
    builtins[offset_for_builtin("task_id")] = bf_task_id;
    builtins[offset_for_builtin("kill_task")] = bf_kill_task;
    builtins[offset_for_builtin("queued_tasks")] = bf_queued_tasks;
    builtins[offset_for_builtin("threads")] = bf_threads;
    builtins[offset_for_builtin("finished_tasks")] = bf_finished_tasks;
    builtins[offset_for_builtin("queue_info")] = bf_queue_info;
    builtins[offset_for_builtin("task_stack")] = bf_task_stack;
    builtins[offset_for_builtin("callers")] = bf_callers;
    builtins[offset_for_builtin("caller_perms")] = bf_caller_perms;
    builtins[offset_for_builtin("set_task_perms")] = bf_set_task_perms;
    builtins[offset_for_builtin("ticks_left")] = bf_ticks_left;
    builtins[offset_for_builtin("seconds_left")] = bf_seconds_left;
    builtins[offset_for_builtin("task_local")] = bf_task_local;
    builtins[offset_for_builtin("set_task_local")] = bf_set_task_local;
    builtins[offset_for_builtin("server_version")] = bf_server_version;
    builtins[offset_for_builtin("server_log")] = bf_server_log;
    builtins[offset_for_builtin("memory_usage")] = bf_memory_usage;
    builtins[offset_for_builtin("dump_database")] = bf_dump_database;
    builtins[offset_for_builtin("shutdown")] = bf_shutdown;
    builtins[offset_for_builtin("load_server_options")] = bf_load_server_options;
    builtins[offset_for_builtin("verb_cache_stats")] = bf_verb_cache_stats;
    builtins[offset_for_builtin("log_cache_stats")] = bf_log_cache_stats;
    builtins[offset_for_builtin("notify")] = bf_notify;
    builtins[offset_for_builtin("connected_players")] = bf_connected_players;
    builtins[offset_for_builtin("connected_seconds")] = bf_connected_seconds;
    builtins[offset_for_builtin("idle_seconds")] = bf_idle_seconds;
    builtins[offset_for_builtin("connection_name")] = bf_connection_name;
    builtins[offset_for_builtin("connection_info")] = bf_connection_info;
    builtins[offset_for_builtin("listen_port")] = bf_listen_port;
    builtins[offset_for_builtin("boot_player")] = bf_boot_player;
    builtins[offset_for_builtin("force_input")] = bf_force_input;
    builtins[offset_for_builtin("switch_player")] = bf_switch_player;
}
