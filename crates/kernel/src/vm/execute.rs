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

//! Main opcode execution for MOO stack frames. The actual meat of the
//! virtual machine.

use std::time::{Duration, Instant};

use grange_compiler::{GlobalName, Op, ScatterLabel, BUILTINS};
use grange_db::VerbFlag;
use grange_var::Error::{E_ARGS, E_QUOTA, E_TYPE, E_VARNF};
use grange_var::{
    v_bool, v_empty_list, v_empty_map, v_err, v_float, v_int, v_list, v_none, v_obj, v_objid,
    Var, Variant,
};

use crate::builtins::{check_builtin_args, registry, BfCallState, BfErr, BfRet};
use crate::tasks::{TaskContext, TICK_SLICE};
use crate::vm::activation::Activation;
use crate::vm::dispatch::{
    get_property_value, put_property_value, resolve_pass, resolve_verb,
};
use crate::vm::frame::{CatchType, ScopeType};
use crate::vm::unwind::FinallyReason;
use crate::vm::{AbortReason, ExecutionResult, VmExecState, MAX_STACK_DEPTH};

macro_rules! binary_var_op {
    ( $f:ident, $state:ident, $op:ident ) => {{
        let rhs = $f.pop();
        let lhs = $f.peek_top();
        match lhs.$op(&rhs) {
            Ok(result) => $f.poke(0, result),
            Err(code) => {
                $f.pop();
                return $state.push_error(code);
            }
        }
    }};
}

fn quota_blown(state: &mut VmExecState, reason: AbortReason) -> ExecutionResult {
    // With the `d` bit set the task gets a catchable E_QUOTA; without it,
    // it is put down.
    if state.top().verb_flags.contains(VerbFlag::Debug) {
        state.throw_error(E_QUOTA)
    } else {
        ExecutionResult::Aborted(reason)
    }
}

/// Execute up to one slice of instructions on the top frame of `state`.
pub(crate) fn run_slice(state: &mut VmExecState, ctx: &mut TaskContext) -> ExecutionResult {
    let mut slice_ticks = 0;
    while slice_ticks < TICK_SLICE {
        if ctx.meta.tick_count >= ctx.meta.max_ticks {
            return quota_blown(state, AbortReason::Ticks);
        }
        if ctx.meta.tick_count % 64 == 0 && Instant::now() >= ctx.meta.deadline {
            return quota_blown(state, AbortReason::Seconds);
        }
        slice_ticks += 1;
        ctx.meta.tick_count += 1;

        let a = state.top_mut();
        let perms = a.permissions;
        let player = a.player;
        let f = &mut a.frame;

        // Running off the end of the vector is a compiler bug; the final
        // Done opcode always unwinds first.
        let op = f.opcodes()[f.pc].clone();
        f.pc += 1;

        match op {
            Op::If(label) | Op::Eif(label) | Op::IfQues(label) | Op::While(label) => {
                let cond = f.pop();
                if !cond.is_true() {
                    f.jump(&label);
                }
            }
            Op::WhileId { id, end_label } => {
                let v = f.pop();
                let is_true = v.is_true();
                f.set_env(&id, v);
                if !is_true {
                    f.jump(&end_label);
                }
            }
            Op::Jump { label } => {
                f.jump(&label);
            }
            Op::And(label) => {
                // Short-circuit: a false lhs is the whole expression's value.
                if !f.peek_top().is_true() {
                    f.jump(&label);
                } else {
                    f.pop();
                }
            }
            Op::Or(label) => {
                if f.peek_top().is_true() {
                    f.jump(&label);
                } else {
                    f.pop();
                }
            }
            Op::ExitId(label) => {
                f.jump(&label);
            }
            Op::ForList {
                id,
                key_id,
                end_label,
            } => {
                enum Step {
                    Done,
                    Iterate { value: Var, key: Var, next: i64 },
                    Fail,
                }
                let step = {
                    let (count, container) = f.peek2();
                    match count.variant() {
                        Variant::Int(idx) => {
                            let idx = *idx as usize;
                            match container.variant() {
                                Variant::List(l) => {
                                    if idx >= l.len() {
                                        Step::Done
                                    } else {
                                        Step::Iterate {
                                            value: l.get(idx).unwrap().clone(),
                                            key: v_int(idx as i64 + 1),
                                            next: idx as i64 + 1,
                                        }
                                    }
                                }
                                Variant::Map(m) => {
                                    if idx >= m.len() {
                                        Step::Done
                                    } else {
                                        let (k, v) = m.iter().nth(idx).unwrap();
                                        Step::Iterate {
                                            value: v,
                                            key: k,
                                            next: idx as i64 + 1,
                                        }
                                    }
                                }
                                _ => Step::Fail,
                            }
                        }
                        _ => Step::Fail,
                    }
                };
                match step {
                    Step::Done => {
                        f.pop();
                        f.pop();
                        f.jump(&end_label);
                    }
                    Step::Iterate { value, key, next } => {
                        f.set_env(&id, value);
                        if let Some(key_id) = &key_id {
                            f.set_env(key_id, key);
                        }
                        f.poke(0, v_int(next));
                    }
                    Step::Fail => {
                        f.pop();
                        f.pop();
                        // Get out of the loop before raising, for the sake
                        // of non-`d` verbs.
                        f.jump(&end_label);
                        return state.raise_error(E_TYPE);
                    }
                }
            }
            Op::ForRange { id, end_label } => {
                let (from, next_val) = {
                    let (to, from) = f.peek2();
                    let next_val = match (to.variant(), from.variant()) {
                        (Variant::Int(to_i), Variant::Int(from_i)) => {
                            if from_i > to_i {
                                f.pop();
                                f.pop();
                                f.jump(&end_label);
                                continue;
                            }
                            v_int(from_i + 1)
                        }
                        (Variant::Obj(to_o), Variant::Obj(from_o)) => {
                            if from_o.0 > to_o.0 {
                                f.pop();
                                f.pop();
                                f.jump(&end_label);
                                continue;
                            }
                            v_obj(from_o.0 + 1)
                        }
                        (_, _) => {
                            f.pop();
                            f.pop();
                            // Get out of the loop before raising, for the
                            // sake of non-`d` verbs.
                            f.jump(&end_label);
                            return state.raise_error(E_TYPE);
                        }
                    };
                    (from.clone(), next_val)
                };
                f.poke(1, next_val);
                f.set_env(&id, from);
            }
            Op::Exit { stack, label } => {
                return state.unwind_stack(FinallyReason::Exit { stack, label });
            }
            Op::Pop => {
                f.pop();
            }
            Op::ImmNone => f.push(v_none()),
            Op::ImmInt(i) => f.push(v_int(i as i64)),
            Op::ImmBigInt(i) => f.push(v_int(i)),
            Op::ImmFloat(fl) => f.push(v_float(fl)),
            Op::ImmObjid(o) => f.push(v_objid(o)),
            Op::ImmErr(e) => f.push(v_err(e)),
            Op::Imm(slot) => {
                // Avoid pointless stack traffic for literals that are
                // immediately discarded (e.g. bare string "comments").
                match f.lookahead() {
                    Some(Op::Pop) => {
                        f.skip();
                        continue;
                    }
                    _ => {
                        let value = f.program.literals[slot.0 as usize].clone();
                        f.push(value);
                    }
                }
            }
            Op::ImmEmptyList => f.push(v_empty_list()),
            Op::MakeSingletonList => {
                let v = f.peek_top().clone();
                f.poke(0, v_list(&[v]));
            }
            Op::ListAddTail => {
                let tail = f.pop();
                let list = f.peek_top();
                let Variant::List(l) = list.variant() else {
                    f.pop();
                    return state.push_error(E_TYPE);
                };
                let new = l.push(tail);
                f.poke(0, Var::from_variant(Variant::List(new)));
            }
            Op::ListAppend => {
                let tail = f.pop();
                let list = f.peek_top();
                let (Variant::List(l), Variant::List(t)) = (list.variant(), tail.variant())
                else {
                    f.pop();
                    return state.push_error(E_TYPE);
                };
                let new = l.append(t);
                f.poke(0, Var::from_variant(Variant::List(new)));
            }
            Op::CheckListForSplice => {
                if !matches!(f.peek_top().variant(), Variant::List(_)) {
                    f.pop();
                    return state.push_error(E_TYPE);
                }
            }
            Op::MakeMap => f.push(v_empty_map()),
            Op::MapInsert => {
                let value = f.pop();
                let key = f.pop();
                let map = f.peek_top();
                let result = map.index_set(&key, &value);
                match result {
                    Ok(m) => f.poke(0, m),
                    Err(e) => {
                        f.pop();
                        return state.push_error(e);
                    }
                }
            }
            Op::PutTemp => {
                f.temp = f.peek_top().clone();
            }
            Op::PushTemp => {
                let tmp = std::mem::replace(&mut f.temp, v_none());
                f.push(tmp);
            }
            Op::Eq => {
                let rhs = f.pop();
                let lhs = f.peek_top();
                let r = v_bool(*lhs == rhs);
                f.poke(0, r);
            }
            Op::Ne => {
                let rhs = f.pop();
                let lhs = f.peek_top();
                let r = v_bool(*lhs != rhs);
                f.poke(0, r);
            }
            Op::Gt | Op::Lt | Op::Ge | Op::Le => {
                let rhs = f.pop();
                let lhs = f.peek_top();
                match lhs.cmp_moo(&rhs) {
                    Ok(ordering) => {
                        let truth = match op {
                            Op::Gt => ordering.is_gt(),
                            Op::Lt => ordering.is_lt(),
                            Op::Ge => ordering.is_ge(),
                            _ => ordering.is_le(),
                        };
                        f.poke(0, v_bool(truth));
                    }
                    Err(e) => {
                        f.pop();
                        return state.push_error(e);
                    }
                }
            }
            Op::In => {
                let container = f.pop();
                let elem = f.peek_top();
                match elem.index_in(&container) {
                    Ok(r) => f.poke(0, r),
                    Err(e) => {
                        f.pop();
                        return state.push_error(e);
                    }
                }
            }
            Op::Add => {
                let rhs = f.pop();
                let lhs = f.peek_top();
                // String concatenation is bounded by the loaded option.
                if let (Variant::Str(a), Variant::Str(b)) = (lhs.variant(), rhs.variant()) {
                    let limit = ctx.world.options.get().max_string_concat;
                    if a.len() + b.len() > limit {
                        f.pop();
                        return state.push_error(E_QUOTA);
                    }
                }
                match lhs.add(&rhs) {
                    Ok(result) => f.poke(0, result),
                    Err(code) => {
                        f.pop();
                        return state.push_error(code);
                    }
                }
            }
            Op::Sub => binary_var_op!(f, state, sub),
            Op::Mul => binary_var_op!(f, state, mul),
            Op::Div => binary_var_op!(f, state, div),
            Op::Mod => binary_var_op!(f, state, modulus),
            Op::Exp => binary_var_op!(f, state, pow),
            Op::Not => {
                let v = v_bool(!f.peek_top().is_true());
                f.poke(0, v);
            }
            Op::UnaryMinus => match f.peek_top().negative() {
                Ok(v) => f.poke(0, v),
                Err(e) => {
                    f.pop();
                    return state.push_error(e);
                }
            },
            Op::Push(ident) => {
                let Some(v) = f.get_env(&ident) else {
                    return state.push_error(E_VARNF);
                };
                let v = v.clone();
                f.push(v);
            }
            Op::Put(ident) => {
                let v = f.peek_top().clone();
                f.set_env(&ident, v);
            }
            Op::Ref => {
                let index = f.pop();
                let container = f.peek_top();
                match container.index(&index) {
                    Ok(v) => f.poke(0, v),
                    Err(e) => {
                        f.pop();
                        return state.push_error(e);
                    }
                }
            }
            Op::PushRef => {
                let (index, container) = f.peek2();
                match container.index(index) {
                    Ok(v) => f.push(v),
                    Err(e) => return state.push_error(e),
                }
            }
            Op::IndexSet => {
                let rhs = f.pop();
                let index = f.pop();
                let lhs = f.peek_top();
                match lhs.index_set(&index, &rhs) {
                    Ok(v) => f.poke(0, v),
                    Err(e) => {
                        f.pop();
                        return state.push_error(e);
                    }
                }
            }
            Op::RangeRef => {
                let to = f.pop();
                let from = f.pop();
                let base = f.peek_top();
                match base.range(&from, &to) {
                    Ok(v) => f.poke(0, v),
                    Err(e) => {
                        f.pop();
                        return state.push_error(e);
                    }
                }
            }
            Op::RangeSet => {
                let value = f.pop();
                let to = f.pop();
                let from = f.pop();
                let base = f.peek_top();
                match base.range_set(&from, &to, &value) {
                    Ok(v) => f.poke(0, v),
                    Err(e) => {
                        f.pop();
                        return state.push_error(e);
                    }
                }
            }
            Op::Length(offset) => {
                let v = f.peek_abs(offset.0 as usize);
                match v.index_len() {
                    Ok(l) => f.push(v_int(l as i64)),
                    Err(e) => return state.push_error(e),
                }
            }
            Op::GetProp => {
                let propname = f.pop();
                let obj = f.peek_top().clone();
                let Variant::Str(propname) = propname.variant() else {
                    return state.push_error(E_TYPE);
                };
                match get_property_value(ctx.world, perms, &obj, propname.as_str()) {
                    Ok(v) => f.poke(0, v),
                    Err(e) => return state.push_error(e),
                }
            }
            Op::PushGetProp => {
                let (propname, obj) = f.peek2();
                let Variant::Str(propname) = propname.variant() else {
                    return state.push_error(E_TYPE);
                };
                let obj = obj.clone();
                let propname = propname.as_str().to_string();
                match get_property_value(ctx.world, perms, &obj, &propname) {
                    Ok(v) => f.push(v),
                    Err(e) => return state.push_error(e),
                }
            }
            Op::PutProp => {
                let rhs = f.pop();
                let propname = f.pop();
                let obj = f.peek_top().clone();
                let Variant::Str(propname) = propname.variant() else {
                    return state.push_error(E_TYPE);
                };
                match put_property_value(ctx.world, perms, &obj, propname.as_str(), &rhs) {
                    Ok(()) => f.poke(0, rhs),
                    Err(e) => return state.push_error(e),
                }
            }
            Op::CallVerb => {
                let args = f.pop();
                let verb = f.pop();
                let obj = f.pop();
                let (Variant::List(arglist), Variant::Str(verb)) =
                    (args.variant(), verb.variant())
                else {
                    return state.push_error(E_TYPE);
                };
                if state.stack.len() >= MAX_STACK_DEPTH {
                    return state.throw_error(grange_var::Error::E_MAXREC);
                }
                let (resolved, this) = match resolve_verb(ctx.world, &obj, verb.as_str()) {
                    Ok(r) => r,
                    Err(e) => return state.push_error(e),
                };
                let caller = state.top().caller_value();
                let activation = Activation::for_call(
                    &resolved,
                    this,
                    player,
                    caller,
                    arglist.iter().cloned().collect(),
                    false,
                );
                state.stack.push(activation);
            }
            Op::Pass => {
                let args = f.pop();
                let Variant::List(arglist) = args.variant() else {
                    return state.push_error(E_TYPE);
                };
                if state.stack.len() >= MAX_STACK_DEPTH {
                    return state.throw_error(grange_var::Error::E_MAXREC);
                }
                let (definer, verb_name, this, caller) = {
                    let a = state.top();
                    let caller = a
                        .frame
                        .get_global(GlobalName::caller)
                        .cloned()
                        .unwrap_or_else(|| v_objid(grange_var::NOTHING));
                    (a.verb_definer, a.verb_name.clone(), a.this.clone(), caller)
                };
                let resolved = match resolve_pass(ctx.world, definer, &verb_name) {
                    Ok(r) => r,
                    Err(e) => return state.push_error(e),
                };
                let activation = Activation::for_call(
                    &resolved,
                    this,
                    player,
                    caller,
                    arglist.iter().cloned().collect(),
                    false,
                );
                state.stack.push(activation);
            }
            Op::Return => {
                let ret_val = f.pop();
                return state.unwind_stack(FinallyReason::Return(ret_val));
            }
            Op::Return0 => {
                return state.unwind_stack(FinallyReason::Return(v_int(0)));
            }
            Op::Done => {
                return state.unwind_stack(FinallyReason::Return(v_int(0)));
            }
            Op::FuncCall { id } => {
                let args = f.pop();
                let Variant::List(arglist) = args.variant() else {
                    return state.push_error(E_ARGS);
                };
                let args: Vec<Var> = arglist.iter().cloned().collect();
                let Some(descriptor) = BUILTINS.description_for(id) else {
                    return state.push_error(E_ARGS);
                };
                if let Err(e) = check_builtin_args(descriptor, &args) {
                    return state.push_error(e);
                }
                let name = BUILTINS.name_of(id).expect("descriptor without a name");
                let bf = registry().builtin_for(id);
                let mut bf_args = BfCallState {
                    name,
                    args,
                    exec_state: state,
                    ctx,
                };
                match bf(&mut bf_args) {
                    Ok(BfRet::Ret(v)) => state.top_mut().frame.push(v),
                    Ok(BfRet::VmInstr(result)) => return result,
                    Err(BfErr::Code(code)) => return state.push_error(code),
                    Err(BfErr::CodeMsg(code, msg)) => return state.push_error_msg(code, msg),
                    Err(BfErr::Raise(exception)) => return state.raise_exception(exception),
                }
            }
            Op::Fork { fv_offset, id } => {
                let time = f.pop();
                let seconds = match time.variant() {
                    Variant::Int(t) => *t as f64,
                    Variant::Float(t) => *t,
                    _ => return state.push_error(E_TYPE),
                };
                if seconds < 0.0 {
                    return state.push_error(grange_var::Error::E_INVARG);
                }
                let delay = (seconds != 0.0).then(|| Duration::from_secs_f64(seconds));
                let mut activation = state.top().clone();
                activation.frame.switch_to_fork_vector(fv_offset.0 as usize);
                let tid = ctx.q.allocate_task_id();
                if let Some(name) = &id {
                    activation.frame.set_env(name, v_int(tid as i64));
                }
                ctx.q
                    .submit_fork(tid, activation.player, activation, delay);
                if let Some(name) = &id {
                    state.top_mut().frame.set_env(name, v_int(tid as i64));
                }
            }
            Op::PushCatchLabel(label) => {
                let codes = f.pop();
                match codes.variant() {
                    Variant::List(codes) => {
                        let mut errors = vec![];
                        for c in codes.iter() {
                            let Variant::Err(e) = c.variant() else {
                                return state.push_error(E_TYPE);
                            };
                            errors.push(*e);
                        }
                        f.catch_stack.push((CatchType::Errors(errors), label));
                    }
                    Variant::Int(0) => {
                        f.catch_stack.push((CatchType::Any, label));
                    }
                    _ => return state.push_error(E_TYPE),
                }
            }
            Op::TryCatch { handler_label: _ } | Op::TryExcept { num_excepts: _ } => {
                let catches = std::mem::take(&mut f.catch_stack);
                f.enter_scope(ScopeType::TryCatch(catches));
            }
            Op::EndCatch(label) | Op::EndExcept(label) => {
                let is_catch = matches!(op, Op::EndCatch(_));
                let v = is_catch.then(|| f.pop());
                let scope = f.pop_scope().expect("missing handler scope");
                let ScopeType::TryCatch(..) = scope.scope_type else {
                    panic!("handler scope is not a catch scope");
                };
                if let Some(v) = v {
                    f.push(v);
                }
                f.jump(&label);
            }
            Op::TryFinally { end_label } => {
                f.enter_scope(ScopeType::TryFinally(end_label));
            }
            Op::EndFinally => {
                let scope = f.pop_scope().expect("missing finally scope");
                let ScopeType::TryFinally(_) = scope.scope_type else {
                    panic!("handler scope is not a finally scope");
                };
                // Fall through into the handler with a fallthrough reason.
                f.finally_stack.push(FinallyReason::Fallthrough);
            }
            Op::FinallyContinue => {
                let why = f.finally_stack.pop().expect("missing finally reason");
                match why {
                    FinallyReason::Fallthrough => continue,
                    FinallyReason::Raise(_)
                    | FinallyReason::Return(_)
                    | FinallyReason::Exit { .. } => return state.unwind_stack(why),
                }
            }
            Op::Scatter(sa) => {
                let (nargs, rest, nreq) = {
                    let mut nargs = 0;
                    let mut rest = 0;
                    let mut nreq = 0;
                    for label in &sa.labels {
                        match label {
                            ScatterLabel::Rest(_) => rest += 1,
                            ScatterLabel::Required(_) => nreq += 1,
                            ScatterLabel::Optional(_, _) => {}
                        }
                        nargs += 1;
                    }
                    (nargs, rest, nreq)
                };
                let have_rest = rest > 0;
                let rhs_values = {
                    let rhs = f.peek_top();
                    let Variant::List(rhs_values) = rhs.variant() else {
                        f.pop();
                        return state.push_error(E_TYPE);
                    };
                    rhs_values.clone()
                };

                let len = rhs_values.len();
                if len < nreq || (!have_rest && len > nargs) {
                    f.pop();
                    return state.push_error(E_ARGS);
                }
                let mut nopt_avail = len - nreq;
                let nrest = if have_rest && len >= nargs {
                    len - nargs + 1
                } else {
                    0
                };
                let mut jump_where = None;
                let mut args_iter = rhs_values.iter();

                for label in &sa.labels {
                    match label {
                        ScatterLabel::Rest(id) => {
                            let mut v = vec![];
                            for _ in 0..nrest {
                                let Some(rest) = args_iter.next() else {
                                    break;
                                };
                                v.push(rest.clone());
                            }
                            f.set_env(id, v_list(&v));
                        }
                        ScatterLabel::Required(id) => {
                            let Some(arg) = args_iter.next() else {
                                return state.push_error(E_ARGS);
                            };
                            f.set_env(id, arg.clone());
                        }
                        ScatterLabel::Optional(id, jump_to) => {
                            if nopt_avail > 0 {
                                nopt_avail -= 1;
                                let Some(arg) = args_iter.next() else {
                                    return state.push_error(E_ARGS);
                                };
                                f.set_env(id, arg.clone());
                            } else if jump_where.is_none() && jump_to.is_some() {
                                jump_where = *jump_to;
                            }
                        }
                    }
                }
                match &jump_where {
                    None => f.jump(&sa.done),
                    Some(jump_where) => f.jump(jump_where),
                }
            }
        }
    }
    // The slice is used up; the scheduler decides who goes next.
    ExecutionResult::More
}
