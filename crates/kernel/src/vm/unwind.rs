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

use grange_compiler::{Label, Offset};
use grange_db::VerbFlag;
use grange_var::{v_err, v_int, v_none, v_str, v_string, Error, Var};

use crate::vm::frame::{CatchType, ScopeType};
use crate::vm::{Exception, ExecutionResult, VmExecState};

/// Why the stack is unwinding.
#[derive(Clone, Debug, PartialEq)]
pub enum FinallyReason {
    /// The protected block completed normally.
    Fallthrough,
    /// An exception is propagating.
    Raise(Exception),
    /// A `return` is propagating.
    Return(Var),
    /// A `break`/`continue` is heading for a loop boundary in the current
    /// frame. `stack` is the value-stack depth to land at.
    Exit { stack: Offset, label: Label },
}

impl VmExecState {
    /// Traceback frame list for an exception, top of stack first.
    fn make_stack_list(&self) -> Vec<Var> {
        self.stack.iter().rev().map(|a| a.traceback_entry()).collect()
    }

    /// Human-readable backtrace lines.
    fn make_backtrace(&self, raise_msg: &str) -> Vec<Var> {
        let mut backtrace = vec![];
        for (i, a) in self.stack.iter().rev().enumerate() {
            let mut pieces = vec![];
            if i != 0 {
                pieces.push("... called from ".to_string());
            }
            pieces.push(format!("{}:{}", a.verb_definer, a.verb_name));
            if let Some(line) = a.line_number() {
                pieces.push(format!(" (line {line})"));
            }
            if i == 0 {
                pieces.push(format!(": {raise_msg}"));
            }
            backtrace.push(v_string(pieces.join("")));
        }
        backtrace.push(v_str("(End of traceback)"));
        backtrace
    }

    /// Raise a fully-formed exception: attach the traceback and unwind.
    pub(crate) fn raise_exception(&mut self, mut exception: Exception) -> ExecutionResult {
        exception.stack = self.make_stack_list();
        exception.backtrace = self.make_backtrace(&exception.msg);
        self.unwind_stack(FinallyReason::Raise(exception))
    }

    /// An error from an opcode or builtin. Honors the running verb's `d`
    /// bit: with it set the error is raised; without it the error value
    /// becomes the result of the failed operation.
    pub(crate) fn push_error(&mut self, code: Error) -> ExecutionResult {
        self.push_error_msg(code, code.message().to_string())
    }

    pub(crate) fn push_error_msg(&mut self, code: Error, msg: String) -> ExecutionResult {
        if self.top().verb_flags.contains(VerbFlag::Debug) {
            return self.raise_exception(Exception::new(code, msg, v_int(0)));
        }
        self.set_return_value(v_err(code));
        ExecutionResult::More
    }

    /// Raise unconditionally, ignoring the `d` bit. `raise()` and quota
    /// enforcement come through here.
    pub(crate) fn throw_error(&mut self, code: Error) -> ExecutionResult {
        self.raise_exception(Exception::new(code, code.message().to_string(), v_int(0)))
    }

    /// Like `push_error`, but without offering the error as a value when
    /// the `d` bit is clear; used where the operands are already gone and
    /// execution has been steered past the failed construct.
    pub(crate) fn raise_error(&mut self, code: Error) -> ExecutionResult {
        if self.top().verb_flags.contains(VerbFlag::Debug) {
            return self.raise_exception(Exception::new(
                code,
                code.message().to_string(),
                v_int(0),
            ));
        }
        ExecutionResult::More
    }

    /// Unwind with the given reason: find a handler in the current or a
    /// lower frame, or finish the task.
    pub(crate) fn unwind_stack(&mut self, why: FinallyReason) -> ExecutionResult {
        while let Some(a) = self.stack.last_mut() {
            let frame = &mut a.frame;

            if let FinallyReason::Exit { stack, label } = &why {
                // A loop exit stays within this frame: dispose of handler
                // scopes opened at or above the loop's depth (running their
                // finally bodies), then land on the loop boundary.
                while let Some(scope) = frame.scope_stack.last() {
                    if scope.valstack_pos < stack.0 as usize {
                        break;
                    }
                    let scope = frame.pop_scope().expect("scope stack changed underneath us");
                    if let ScopeType::TryFinally(finally_label) = scope.scope_type {
                        frame.jump(&finally_label);
                        frame.finally_stack.push(why.clone());
                        return ExecutionResult::More;
                    }
                }
                frame.valstack.truncate(stack.0 as usize);
                frame.jump(label);
                return ExecutionResult::More;
            }

            // Return and Raise unwind through every scope in this frame.
            while let Some(scope) = frame.pop_scope() {
                match scope.scope_type {
                    ScopeType::TryFinally(finally_label) => {
                        // The finally body runs now; FinallyContinue will
                        // resume this unwind afterwards.
                        frame.jump(&finally_label);
                        frame.finally_stack.push(why.clone());
                        return ExecutionResult::More;
                    }
                    ScopeType::TryCatch(catches) => {
                        if let FinallyReason::Raise(exception) = &why {
                            for (catch_type, label) in &catches {
                                let found = match catch_type {
                                    CatchType::Any => true,
                                    CatchType::Errors(codes) => codes.contains(&exception.code),
                                };
                                if found {
                                    frame.jump(label);
                                    frame.push(exception.triple());
                                    return ExecutionResult::More;
                                }
                            }
                        }
                    }
                }
            }

            // No handler here; drop the frame.
            self.stack.pop();
            if self.stack.is_empty() {
                break;
            }
            if let FinallyReason::Return(value) = &why {
                self.set_return_value(value.clone());
                return ExecutionResult::More;
            }
        }

        match why {
            FinallyReason::Return(v) => ExecutionResult::Complete(v),
            FinallyReason::Fallthrough => ExecutionResult::Complete(v_none()),
            FinallyReason::Raise(e) => ExecutionResult::Exception(e),
            FinallyReason::Exit { .. } => ExecutionResult::Complete(v_none()),
        }
    }
}
