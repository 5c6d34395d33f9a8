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

//! Takes the AST and turns it into a list of opcodes.
//!
//! Stack discipline note: `TryCatch`/`TryExcept`/`TryFinally` each occupy
//! one value-stack slot for the life of their block. `break`/`continue`
//! compile to `Exit` with the loop's saved stack depth, and the unwinder
//! disposes of any handler whose recorded depth is at or above that mark;
//! the occupied slot is what keeps a handler just *outside* a loop
//! distinguishable from one just inside it.

use grange_var::{Var, Variant};

use crate::ast::{
    Arg, BinaryOp, CatchCodes, Expr, ScatterItem, ScatterKind, Stmt, StmtNode, UnaryOp,
};
use crate::builtins::BUILTINS;
use crate::errors::CompileError;
use crate::labels::{JumpLabel, Label, Offset};
use crate::names::{Name, Names};
use crate::opcode::{literal_eq, Op, ScatterArgs, ScatterLabel};
use crate::parse::parse_program;
use crate::program::Program;

struct Loop {
    loop_name: Option<Name>,
    top_label: Label,
    top_stack: Offset,
    bottom_label: Label,
    bottom_stack: Offset,
}

/// Code generation state.
struct CodegenState {
    ops: Vec<Op>,
    jumps: Vec<JumpLabel>,
    var_names: Names,
    literals: Vec<Var>,
    loops: Vec<Loop>,
    saved_stack: Option<Offset>,
    cur_stack: usize,
    max_stack: usize,
    fork_vectors: Vec<Vec<Op>>,
    line_number_spans: Vec<(usize, usize)>,
}

impl CodegenState {
    fn new(var_names: Names) -> Self {
        Self {
            ops: vec![],
            jumps: vec![],
            var_names,
            literals: vec![],
            loops: vec![],
            saved_stack: None,
            cur_stack: 0,
            max_stack: 0,
            fork_vectors: vec![],
            line_number_spans: vec![],
        }
    }

    // Create an anonymous jump label at the current position and return its
    // unique ID.
    fn make_jump_label(&mut self, name: Option<Name>) -> Label {
        let id = Label(self.jumps.len() as u16);
        let position = self.ops.len().into();
        self.jumps.push(JumpLabel { id, name, position });
        id
    }

    // Adjust the position of a jump label to the current position.
    fn commit_jump_label(&mut self, id: Label) {
        let position = self.ops.len();
        let jump = self
            .jumps
            .get_mut(id.0 as usize)
            .expect("Invalid jump fixup");
        jump.position = position.into();
    }

    fn add_literal(&mut self, v: &Var) -> Label {
        // Pooling compares case-sensitively so "FOO" and "foo" stay apart.
        let pos = self
            .literals
            .iter()
            .position(|lv| literal_eq(lv, v))
            .unwrap_or_else(|| {
                let idx = self.literals.len();
                self.literals.push(v.clone());
                idx
            });
        Label(pos as u16)
    }

    fn emit(&mut self, op: Op) {
        self.ops.push(op);
    }

    fn find_loop(&self, loop_label: &Name) -> Result<&Loop, CompileError> {
        match self.loops.iter().find(|l| l.loop_name == Some(*loop_label)) {
            Some(l) => Ok(l),
            None => {
                let name = self
                    .var_names
                    .name_of(loop_label)
                    .unwrap_or("<unknown>")
                    .to_string();
                Err(CompileError::UnknownLoopLabel(name))
            }
        }
    }

    fn push_stack(&mut self, n: usize) {
        self.cur_stack += n;
        if self.cur_stack > self.max_stack {
            self.max_stack = self.cur_stack;
        }
    }

    fn pop_stack(&mut self, n: usize) {
        self.cur_stack -= n;
    }

    fn saved_stack_top(&self) -> Option<Offset> {
        self.saved_stack
    }

    fn save_stack_top(&mut self) -> Option<Offset> {
        let old = self.saved_stack;
        self.saved_stack = Some((self.cur_stack - 1).into());
        old
    }

    fn restore_stack_top(&mut self, old: Option<Offset>) {
        self.saved_stack = old
    }

    fn add_fork_vector(&mut self, opcodes: Vec<Op>) -> Offset {
        let fv = self.fork_vectors.len();
        self.fork_vectors.push(opcodes);
        Offset(fv as u16)
    }

    fn generate_assign(&mut self, left: &Expr, right: &Expr) -> Result<(), CompileError> {
        self.push_lvalue(left, false)?;
        self.generate_expr(right)?;
        match left {
            Expr::Range { .. } | Expr::Index(..) => self.emit(Op::PutTemp),
            _ => {}
        }
        let mut is_indexed = false;
        let mut e = left;
        loop {
            // Figure out the form of assignment, handle correctly, then walk
            // through chained assignments.
            match e {
                Expr::Range { base, .. } => {
                    self.emit(Op::RangeSet);
                    self.pop_stack(3);
                    e = base;
                    is_indexed = true;
                }
                Expr::Index(lhs, _) => {
                    self.emit(Op::IndexSet);
                    self.pop_stack(2);
                    e = lhs;
                    is_indexed = true;
                }
                Expr::Id(name) => {
                    self.emit(Op::Put(*name));
                    break;
                }
                Expr::Prop { .. } => {
                    self.emit(Op::PutProp);
                    self.pop_stack(2);
                    break;
                }
                _ => return Err(CompileError::InvalidAssignment),
            }
        }
        if is_indexed {
            self.emit(Op::Pop);
            self.emit(Op::PushTemp);
        }
        Ok(())
    }

    fn generate_scatter_assign(
        &mut self,
        scatter: &[ScatterItem],
        right: &Expr,
    ) -> Result<(), CompileError> {
        self.generate_expr(right)?;
        let labels: Vec<(&ScatterItem, ScatterLabel)> = scatter
            .iter()
            .map(|s| {
                let kind_label = match s.kind {
                    ScatterKind::Required => ScatterLabel::Required(s.id),
                    ScatterKind::Optional => ScatterLabel::Optional(
                        s.id,
                        if s.expr.is_some() {
                            Some(self.make_jump_label(None))
                        } else {
                            None
                        },
                    ),
                    ScatterKind::Rest => ScatterLabel::Rest(s.id),
                };
                (s, kind_label)
            })
            .collect();
        let done = self.make_jump_label(None);
        self.emit(Op::Scatter(Box::new(ScatterArgs {
            labels: labels.iter().map(|(_, l)| l.clone()).collect(),
            done,
        })));
        for (s, label) in labels {
            if let ScatterLabel::Optional(_, Some(label)) = label {
                let Some(expr) = &s.expr else {
                    continue;
                };
                self.commit_jump_label(label);
                self.generate_expr(expr)?;
                self.emit(Op::Put(s.id));
                self.emit(Op::Pop);
                self.pop_stack(1);
            }
        }
        self.commit_jump_label(done);
        Ok(())
    }

    fn push_lvalue(&mut self, expr: &Expr, indexed_above: bool) -> Result<(), CompileError> {
        match expr {
            Expr::Range { base, from, to } => {
                self.push_lvalue(base.as_ref(), true)?;
                let old = self.save_stack_top();
                self.generate_expr(from.as_ref())?;
                self.generate_expr(to.as_ref())?;
                self.restore_stack_top(old);
            }
            Expr::Index(lhs, rhs) => {
                self.push_lvalue(lhs.as_ref(), true)?;
                let old = self.save_stack_top();
                self.generate_expr(rhs.as_ref())?;
                self.restore_stack_top(old);
                if indexed_above {
                    self.emit(Op::PushRef);
                    self.push_stack(1);
                }
            }
            Expr::Id(id) => {
                if indexed_above {
                    self.emit(Op::Push(*id));
                    self.push_stack(1);
                }
            }
            Expr::Prop { location, property } => {
                self.generate_expr(location.as_ref())?;
                self.generate_expr(property.as_ref())?;
                if indexed_above {
                    self.emit(Op::PushGetProp);
                    self.push_stack(1);
                }
            }
            _ => return Err(CompileError::InvalidAssignment),
        }
        Ok(())
    }

    fn generate_codes(&mut self, codes: &CatchCodes) -> Result<(), CompileError> {
        match codes {
            CatchCodes::Codes(codes) => {
                self.generate_arg_list(codes)?;
            }
            CatchCodes::Any => {
                self.emit(Op::ImmInt(0));
                self.push_stack(1);
            }
        }
        Ok(())
    }

    fn generate_expr(&mut self, expr: &Expr) -> Result<(), CompileError> {
        match expr {
            Expr::Value(v) => {
                match v.variant() {
                    Variant::None => self.emit(Op::ImmNone),
                    Variant::Obj(oid) => self.emit(Op::ImmObjid(*oid)),
                    Variant::Int(i) => match i32::try_from(*i) {
                        Ok(n) => self.emit(Op::ImmInt(n)),
                        Err(_) => self.emit(Op::ImmBigInt(*i)),
                    },
                    Variant::Float(f) => self.emit(Op::ImmFloat(*f)),
                    Variant::Err(e) => self.emit(Op::ImmErr(*e)),
                    _ => {
                        let literal = self.add_literal(v);
                        self.emit(Op::Imm(literal));
                    }
                };
                self.push_stack(1);
            }
            Expr::Id(ident) => {
                self.emit(Op::Push(*ident));
                self.push_stack(1);
            }
            Expr::And(left, right) => {
                self.generate_expr(left.as_ref())?;
                let end_label = self.make_jump_label(None);
                self.emit(Op::And(end_label));
                self.pop_stack(1);
                self.generate_expr(right.as_ref())?;
                self.commit_jump_label(end_label);
            }
            Expr::Or(left, right) => {
                self.generate_expr(left.as_ref())?;
                let end_label = self.make_jump_label(None);
                self.emit(Op::Or(end_label));
                self.pop_stack(1);
                self.generate_expr(right.as_ref())?;
                self.commit_jump_label(end_label);
            }
            Expr::Binary(op, l, r) => {
                self.generate_expr(l)?;
                self.generate_expr(r)?;
                let binop = match op {
                    BinaryOp::Add => Op::Add,
                    BinaryOp::Sub => Op::Sub,
                    BinaryOp::Mul => Op::Mul,
                    BinaryOp::Div => Op::Div,
                    BinaryOp::Mod => Op::Mod,
                    BinaryOp::Exp => Op::Exp,
                    BinaryOp::Eq => Op::Eq,
                    BinaryOp::NEq => Op::Ne,
                    BinaryOp::Gt => Op::Gt,
                    BinaryOp::GtE => Op::Ge,
                    BinaryOp::Lt => Op::Lt,
                    BinaryOp::LtE => Op::Le,
                    BinaryOp::In => Op::In,
                };
                self.emit(binop);
                self.pop_stack(1);
            }
            Expr::Index(lhs, rhs) => {
                self.generate_expr(lhs.as_ref())?;
                let old = self.save_stack_top();
                self.generate_expr(rhs.as_ref())?;
                self.restore_stack_top(old);
                self.emit(Op::Ref);
                self.pop_stack(1);
            }
            Expr::Range { base, from, to } => {
                self.generate_expr(base.as_ref())?;
                let old = self.save_stack_top();
                self.generate_expr(from.as_ref())?;
                self.generate_expr(to.as_ref())?;
                self.restore_stack_top(old);
                self.emit(Op::RangeRef);
                self.pop_stack(2);
            }
            Expr::Length => {
                let Some(saved) = self.saved_stack_top() else {
                    return Err(CompileError::DollarOutsideIndex);
                };
                self.emit(Op::Length(saved));
                self.push_stack(1);
            }
            Expr::Unary(op, expr) => {
                self.generate_expr(expr.as_ref())?;
                self.emit(match op {
                    UnaryOp::Neg => Op::UnaryMinus,
                    UnaryOp::Not => Op::Not,
                });
            }
            Expr::Prop { location, property } => {
                self.generate_expr(location.as_ref())?;
                self.generate_expr(property.as_ref())?;
                self.emit(Op::GetProp);
                self.pop_stack(1);
            }
            Expr::Pass { args } => {
                self.generate_arg_list(args)?;
                self.emit(Op::Pass);
            }
            Expr::Call { function, args } => {
                let Some(id) = BUILTINS.find_builtin(function) else {
                    return Err(CompileError::UnknownBuiltinFunction(function.clone()));
                };
                self.generate_arg_list(args)?;
                self.emit(Op::FuncCall { id });
            }
            Expr::Verb {
                location,
                verb,
                args,
            } => {
                self.generate_expr(location.as_ref())?;
                self.generate_expr(verb.as_ref())?;
                self.generate_arg_list(args)?;
                self.emit(Op::CallVerb);
                self.pop_stack(2);
            }
            Expr::Cond {
                condition,
                consequence,
                alternative,
            } => {
                self.generate_expr(condition.as_ref())?;
                let else_label = self.make_jump_label(None);
                self.emit(Op::IfQues(else_label));
                self.pop_stack(1);
                self.generate_expr(consequence.as_ref())?;
                let end_label = self.make_jump_label(None);
                self.emit(Op::Jump { label: end_label });
                self.pop_stack(1);
                self.commit_jump_label(else_label);
                self.generate_expr(alternative.as_ref())?;
                self.commit_jump_label(end_label);
            }
            Expr::TryCatch {
                trye,
                codes,
                except,
            } => {
                let handler_label = self.make_jump_label(None);
                self.generate_codes(codes)?;
                self.emit(Op::PushCatchLabel(handler_label));
                self.pop_stack(1);
                self.emit(Op::TryCatch { handler_label });
                self.push_stack(1); // handler slot
                self.generate_expr(trye.as_ref())?;
                let end_label = self.make_jump_label(None);
                self.emit(Op::EndCatch(end_label));
                self.pop_stack(1); // handler slot released
                self.commit_jump_label(handler_label);

                // After this label the stack holds the exception triple
                // instead of the expression's value.
                match except {
                    None => {
                        // No handler expression: the result is the code.
                        self.emit(Op::ImmInt(1));
                        self.emit(Op::Ref);
                    }
                    Some(except) => {
                        self.emit(Op::Pop);
                        self.pop_stack(1);
                        self.generate_expr(except.as_ref())?;
                    }
                }
                self.commit_jump_label(end_label);
            }
            Expr::List(l) => {
                self.generate_arg_list(l)?;
            }
            Expr::Map(pairs) => {
                self.emit(Op::MakeMap);
                self.push_stack(1);
                for (k, v) in pairs {
                    self.generate_expr(k)?;
                    self.generate_expr(v)?;
                    self.emit(Op::MapInsert);
                    self.pop_stack(2);
                }
            }
            Expr::Scatter(scatter, right) => self.generate_scatter_assign(scatter, right)?,
            Expr::Assign { left, right } => self.generate_assign(left, right)?,
        }
        Ok(())
    }

    fn generate_stmt(&mut self, stmt: &Stmt) -> Result<(), CompileError> {
        self.line_number_spans.push((self.ops.len(), stmt.line));
        match &stmt.node {
            StmtNode::Cond { arms, otherwise } => {
                let end_label = self.make_jump_label(None);
                let mut is_else = false;
                for arm in arms {
                    self.generate_expr(&arm.condition)?;
                    let otherwise_label = self.make_jump_label(None);
                    self.emit(if !is_else {
                        Op::If(otherwise_label)
                    } else {
                        Op::Eif(otherwise_label)
                    });
                    is_else = true;
                    self.pop_stack(1);
                    for stmt in &arm.statements {
                        self.generate_stmt(stmt)?;
                    }
                    self.emit(Op::Jump { label: end_label });
                    // Jump here if the condition was false: either the next
                    // arm, or the end of the whole statement.
                    self.commit_jump_label(otherwise_label);
                }
                for stmt in otherwise {
                    self.generate_stmt(stmt)?;
                }
                self.commit_jump_label(end_label);
            }
            StmtNode::ForList {
                id,
                key_id,
                expr,
                body,
            } => {
                self.generate_expr(expr)?;
                // The loop index; 0 here rather than MOO's 1 to keep the
                // ForList instruction simple.
                self.emit(Op::ImmInt(0));
                self.push_stack(1);
                let loop_top = self.make_jump_label(Some(*id));
                self.commit_jump_label(loop_top);
                let end_label = self.make_jump_label(Some(*id));
                self.emit(Op::ForList {
                    id: *id,
                    key_id: *key_id,
                    end_label,
                });
                self.loops.push(Loop {
                    loop_name: Some(*id),
                    top_label: loop_top,
                    top_stack: self.cur_stack.into(),
                    bottom_label: end_label,
                    bottom_stack: (self.cur_stack - 2).into(),
                });
                for stmt in body {
                    self.generate_stmt(stmt)?;
                }
                self.emit(Op::Jump { label: loop_top });
                self.commit_jump_label(end_label);
                self.pop_stack(2);
                self.loops.pop();
            }
            StmtNode::ForRange { id, from, to, body } => {
                self.generate_expr(from)?;
                self.generate_expr(to)?;
                let loop_top = self.make_jump_label(Some(*id));
                let end_label = self.make_jump_label(Some(*id));
                self.commit_jump_label(loop_top);
                self.emit(Op::ForRange {
                    id: *id,
                    end_label,
                });
                self.loops.push(Loop {
                    loop_name: Some(*id),
                    top_label: loop_top,
                    top_stack: self.cur_stack.into(),
                    bottom_label: end_label,
                    bottom_stack: (self.cur_stack - 2).into(),
                });
                for stmt in body {
                    self.generate_stmt(stmt)?;
                }
                self.emit(Op::Jump { label: loop_top });
                self.commit_jump_label(end_label);
                self.pop_stack(2);
                self.loops.pop();
            }
            StmtNode::While {
                id,
                condition,
                body,
            } => {
                let loop_start_label = self.make_jump_label(*id);
                self.commit_jump_label(loop_start_label);
                let loop_end_label = self.make_jump_label(*id);
                self.generate_expr(condition)?;
                match id {
                    None => self.emit(Op::While(loop_end_label)),
                    Some(id) => self.emit(Op::WhileId {
                        id: *id,
                        end_label: loop_end_label,
                    }),
                }
                self.pop_stack(1);
                self.loops.push(Loop {
                    loop_name: *id,
                    top_label: loop_start_label,
                    top_stack: self.cur_stack.into(),
                    bottom_label: loop_end_label,
                    bottom_stack: self.cur_stack.into(),
                });
                for s in body {
                    self.generate_stmt(s)?;
                }
                self.emit(Op::Jump {
                    label: loop_start_label,
                });
                self.commit_jump_label(loop_end_label);
                self.loops.pop();
            }
            StmtNode::Fork { id, time, body } => {
                self.generate_expr(time)?;
                // Stash the main vector, compile the fork body into a fresh
                // buffer, and turn that into a fork vector.
                let stashed_ops = std::mem::take(&mut self.ops);
                for stmt in body {
                    self.generate_stmt(stmt)?;
                }
                self.emit(Op::Done);
                let forked_ops = std::mem::take(&mut self.ops);
                let fv_id = self.add_fork_vector(forked_ops);
                self.ops = stashed_ops;
                self.emit(Op::Fork {
                    fv_offset: fv_id,
                    id: *id,
                });
                self.pop_stack(1);
            }
            StmtNode::TryExcept { body, excepts } => {
                let mut labels = vec![];
                let num_excepts = excepts.len();
                for ex in excepts {
                    self.generate_codes(&ex.codes)?;
                    let push_label = self.make_jump_label(None);
                    self.emit(Op::PushCatchLabel(push_label));
                    labels.push(push_label);
                }
                self.pop_stack(num_excepts);
                self.emit(Op::TryExcept {
                    num_excepts: num_excepts as u16,
                });
                self.push_stack(1); // handler slot
                for stmt in body {
                    self.generate_stmt(stmt)?;
                }
                let end_label = self.make_jump_label(None);
                self.emit(Op::EndExcept(end_label));
                self.pop_stack(1); // handler slot released
                for (i, ex) in excepts.iter().enumerate() {
                    self.commit_jump_label(labels[i]);
                    self.push_stack(1);
                    if let Some(id) = &ex.id {
                        self.emit(Op::Put(*id));
                    }
                    self.emit(Op::Pop);
                    self.pop_stack(1);
                    for stmt in &ex.statements {
                        self.generate_stmt(stmt)?;
                    }
                    if i + 1 < num_excepts {
                        self.emit(Op::Jump { label: end_label });
                    }
                }
                self.commit_jump_label(end_label);
            }
            StmtNode::TryFinally { body, handler } => {
                let handler_label = self.make_jump_label(None);
                self.emit(Op::TryFinally {
                    end_label: handler_label,
                });
                self.push_stack(1); // handler slot
                for stmt in body {
                    self.generate_stmt(stmt)?;
                }
                self.emit(Op::EndFinally);
                self.pop_stack(1); // handler slot released
                self.commit_jump_label(handler_label);
                for stmt in handler {
                    self.generate_stmt(stmt)?;
                }
                self.emit(Op::FinallyContinue);
            }
            StmtNode::Break { exit } => {
                let l = match exit {
                    None => self.loops.last().ok_or_else(|| {
                        CompileError::UnknownLoopLabel("break outside loop".to_string())
                    })?,
                    Some(label) => self.find_loop(label)?,
                };
                self.emit(Op::Exit {
                    stack: l.bottom_stack,
                    label: l.bottom_label,
                });
            }
            StmtNode::Continue { exit } => {
                let l = match exit {
                    None => self.loops.last().ok_or_else(|| {
                        CompileError::UnknownLoopLabel("continue outside loop".to_string())
                    })?,
                    Some(label) => self.find_loop(label)?,
                };
                self.emit(Op::Exit {
                    stack: l.top_stack,
                    label: l.top_label,
                });
            }
            StmtNode::Return(Some(expr)) => {
                self.generate_expr(expr)?;
                self.emit(Op::Return);
                self.pop_stack(1);
            }
            StmtNode::Return(None) => self.emit(Op::Return0),
            StmtNode::Let { id, expr } => {
                self.generate_expr(expr)?;
                self.emit(Op::Put(*id));
                self.emit(Op::Pop);
                self.pop_stack(1);
            }
            StmtNode::Expr(e) => {
                self.generate_expr(e)?;
                self.emit(Op::Pop);
                self.pop_stack(1);
            }
        }
        Ok(())
    }

    fn generate_arg_list(&mut self, args: &Vec<Arg>) -> Result<(), CompileError> {
        if args.is_empty() {
            self.emit(Op::ImmEmptyList);
            self.push_stack(1);
            return Ok(());
        }

        let mut normal_op = Op::MakeSingletonList;
        let mut splice_op = Op::CheckListForSplice;
        let mut pop = 0;
        for a in args {
            match a {
                Arg::Normal(a) => {
                    self.generate_expr(a)?;
                    self.emit(normal_op.clone());
                }
                Arg::Splice(s) => {
                    self.generate_expr(s)?;
                    self.emit(splice_op.clone());
                }
            }
            self.pop_stack(pop);
            pop = 1;
            normal_op = Op::ListAddTail;
            splice_op = Op::ListAppend;
        }
        Ok(())
    }
}

/// Compile verb source to a program.
pub fn compile(program_text: &str) -> Result<Program, CompileError> {
    let parse = parse_program(program_text)?;

    let mut cg_state = CodegenState::new(parse.names);
    for x in parse.stmts {
        cg_state.generate_stmt(&x)?;
    }
    cg_state.emit(Op::Done);

    assert_eq!(
        cg_state.cur_stack, 0,
        "stack not balanced after compilation"
    );
    assert!(cg_state.saved_stack.is_none());

    Ok(Program {
        literals: cg_state.literals,
        jump_labels: cg_state.jumps,
        var_names: cg_state.var_names,
        main_vector: cg_state.ops,
        fork_vectors: cg_state.fork_vectors,
        line_number_spans: cg_state.line_number_spans,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::{GlobalName, Names};

    fn opcodes(src: &str) -> Vec<Op> {
        compile(src).unwrap().main_vector
    }

    #[test]
    fn simple_return() {
        let prg = compile("return 1 + 2;").unwrap();
        assert_eq!(
            prg.main_vector,
            vec![Op::ImmInt(1), Op::ImmInt(2), Op::Add, Op::Return, Op::Done]
        );
    }

    #[test]
    fn while_loop_shape() {
        let ops = opcodes("while (1) break; endwhile");
        assert!(matches!(ops[0], Op::ImmInt(1)));
        assert!(matches!(ops[1], Op::While(_)));
        assert!(matches!(ops[2], Op::Exit { .. }));
        assert!(matches!(ops[3], Op::Jump { .. }));
    }

    #[test]
    fn for_in_loop_shape() {
        let ops = opcodes("for x in ({1, 2}) endfor");
        assert!(matches!(ops[4], Op::ImmInt(0)));
        assert!(matches!(ops[5], Op::ForList { key_id: None, .. }));
        assert!(matches!(ops[6], Op::Jump { .. }));
    }

    #[test]
    fn literals_are_pooled_case_sensitively() {
        let prg = compile(r#"x = "Foo"; y = "foo"; z = "Foo";"#).unwrap();
        assert_eq!(prg.literals.len(), 2);
    }

    #[test]
    fn globals_resolve_to_fixed_slots() {
        let prg = compile("return player;").unwrap();
        assert_eq!(
            prg.main_vector[0],
            Op::Push(Names::global(GlobalName::player))
        );
    }

    #[test]
    fn unknown_builtin_is_a_compile_error() {
        assert_eq!(
            compile("frobnicate(1);").unwrap_err(),
            CompileError::UnknownBuiltinFunction("frobnicate".to_string())
        );
    }

    #[test]
    fn bad_break_label() {
        assert!(matches!(
            compile("while (1) endwhile break;"),
            Err(CompileError::UnknownLoopLabel(_))
        ));
    }

    #[test]
    fn dollar_outside_index() {
        assert_eq!(compile("return $;"), Err(CompileError::DollarOutsideIndex));
    }

    #[test]
    fn try_except_shape() {
        let ops = opcodes("try x = 1; except e (E_TYPE) endtry");
        assert!(matches!(ops[0], Op::ImmErr(_)));
        assert!(matches!(ops[1], Op::MakeSingletonList));
        assert!(matches!(ops[2], Op::PushCatchLabel(_)));
        assert!(matches!(ops[3], Op::TryExcept { num_excepts: 1 }));
    }

    #[test]
    fn map_literal_shape() {
        let ops = opcodes("m = [1 -> \"one\"];");
        assert!(matches!(ops[0], Op::MakeMap));
        assert!(matches!(ops[2], Op::Imm(_)));
        assert!(matches!(ops[3], Op::MapInsert));
    }

    #[test]
    fn fork_compiles_to_fork_vector() {
        let prg = compile("fork (5) x = 1; endfork").unwrap();
        assert_eq!(prg.fork_vectors.len(), 1);
        assert!(matches!(prg.main_vector[1], Op::Fork { .. }));
        assert!(matches!(prg.fork_vectors[0].last(), Some(Op::Done)));
    }

    #[test]
    fn scatter_assign_shape() {
        let ops = opcodes("{a, ?b = 2, @rest} = args;");
        let scatter = ops.iter().find(|op| matches!(op, Op::Scatter(_)));
        let Some(Op::Scatter(sa)) = scatter else {
            panic!("no scatter op");
        };
        assert_eq!(sa.labels.len(), 3);
        assert!(matches!(sa.labels[0], ScatterLabel::Required(_)));
        assert!(matches!(sa.labels[1], ScatterLabel::Optional(_, Some(_))));
        assert!(matches!(sa.labels[2], ScatterLabel::Rest(_)));
    }

    #[test]
    fn break_label_resolves() {
        // Labelled break from the inner loop targets the outer loop.
        let ops = opcodes("while outer (1) while (1) break outer; endwhile endwhile");
        let exits: Vec<_> = ops
            .iter()
            .filter(|op| matches!(op, Op::Exit { .. }))
            .collect();
        assert_eq!(exits.len(), 1);
    }
}
