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

//! Kicks off the pest parser and converts its tree into our AST. This is
//! the main entry point for parsing.

use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;

use lazy_static::lazy_static;
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser as PestParser;

use grange_var::{v_err, v_float, v_int, v_objid, v_str, Error, Objid, SYSTEM_OBJECT};

use crate::ast::Arg::{Normal, Splice};
use crate::ast::{
    Arg, BinaryOp, CatchCodes, CondArm, ExceptArm, Expr, ScatterItem, ScatterKind, Stmt, StmtNode,
    UnaryOp,
};
use crate::errors::CompileError;
use crate::names::{Names, Scopes};
use crate::parse::moo::{MooParser, Rule};

pub mod moo {
    use pest_derive::Parser;

    #[derive(Parser)]
    #[grammar = "src/moo.pest"]
    pub struct MooParser;
}

lazy_static! {
    // Precedence from lowest to highest, following the C-like ordering of
    // the language's operators.
    static ref PRATT: PrattParser<Rule> = PrattParser::new()
        // Assignments are lowest precedence.
        .op(Op::postfix(Rule::assign) | Op::prefix(Rule::scatter_assign))
        // Ternary conditional.
        .op(Op::postfix(Rule::cond_expr))
        // Logical or / and.
        .op(Op::infix(Rule::lor, Assoc::Left))
        .op(Op::infix(Rule::land, Assoc::Left))
        // Equality and inequality.
        .op(Op::infix(Rule::eq, Assoc::Left) | Op::infix(Rule::neq, Assoc::Left))
        // Relational operators.
        .op(Op::infix(Rule::gt, Assoc::Left)
            | Op::infix(Rule::lt, Assoc::Left)
            | Op::infix(Rule::gte, Assoc::Left)
            | Op::infix(Rule::lte, Assoc::Left))
        // Membership.
        .op(Op::infix(Rule::in_range, Assoc::Left))
        // Additive, multiplicative, exponent.
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
        .op(Op::infix(Rule::mul, Assoc::Left)
            | Op::infix(Rule::div, Assoc::Left)
            | Op::infix(Rule::modulus, Assoc::Left))
        .op(Op::infix(Rule::pow, Assoc::Left))
        // Unary negation and logical not.
        .op(Op::prefix(Rule::neg) | Op::prefix(Rule::not))
        // Indexing/suffix operators.
        .op(Op::postfix(Rule::index_range)
            | Op::postfix(Rule::index_single)
            | Op::postfix(Rule::verb_call)
            | Op::postfix(Rule::verb_expr_call)
            | Op::postfix(Rule::prop)
            | Op::postfix(Rule::prop_expr));
}

/// Strip the quotes off a string literal and process its escapes. The only
/// meaningful escapes are `\"` and `\\`; a backslash before anything else
/// passes that character through.
fn unquote_str(s: &str) -> String {
    let inner = &s[1..s.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

pub struct Parse {
    pub stmts: Vec<Stmt>,
    pub names: Names,
}

struct TreeTransformer {
    // RefCell because the PrattParser closures make shared borrows awkward
    // otherwise; same workaround the pest docs use.
    scopes: RefCell<Scopes>,
}

impl TreeTransformer {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            scopes: RefCell::new(Scopes::new()),
        })
    }

    fn parse_atom(self: Rc<Self>, pair: Pair<Rule>) -> Result<Expr, CompileError> {
        match pair.as_rule() {
            Rule::ident => {
                let name = self.scopes.borrow_mut().find_or_add(pair.as_str().trim());
                Ok(Expr::Id(name))
            }
            Rule::object => {
                let oid = i64::from_str(&pair.as_str()[1..])
                    .map_err(|_| CompileError::IntegerOutOfRange(pair.as_str().to_string()))?;
                Ok(Expr::Value(v_objid(Objid(oid))))
            }
            Rule::integer => match pair.as_str().parse::<i64>() {
                Ok(int) => Ok(Expr::Value(v_int(int))),
                Err(_) => Err(CompileError::IntegerOutOfRange(pair.as_str().to_string())),
            },
            Rule::float => {
                let float = pair.as_str().parse::<f64>().unwrap();
                Ok(Expr::Value(v_float(float)))
            }
            Rule::string => Ok(Expr::Value(v_str(&unquote_str(pair.as_str())))),
            Rule::err => {
                let Some(e) = Error::parse(pair.as_str()) else {
                    return Err(CompileError::UnknownErrorCode(pair.as_str().to_string()));
                };
                Ok(Expr::Value(v_err(e)))
            }
            _ => {
                panic!("Unimplemented atom: {pair:?}");
            }
        }
    }

    fn parse_exprlist(self: Rc<Self>, pairs: Pairs<Rule>) -> Result<Vec<Arg>, CompileError> {
        let mut args = vec![];
        for pair in pairs {
            match pair.as_rule() {
                Rule::argument => {
                    let spliced = pair.as_str().starts_with('@');
                    let expr = self
                        .clone()
                        .parse_expr(pair.into_inner().next().unwrap().into_inner())?;
                    args.push(if spliced { Splice(expr) } else { Normal(expr) });
                }
                _ => {
                    panic!("Unimplemented exprlist: {pair:?}");
                }
            }
        }
        Ok(args)
    }

    fn parse_arglist(self: Rc<Self>, pairs: Pairs<Rule>) -> Result<Vec<Arg>, CompileError> {
        let Some(first) = pairs.peek() else {
            return Ok(vec![]);
        };
        let Rule::exprlist = first.as_rule() else {
            panic!("Unimplemented arglist: {first:?}");
        };
        self.parse_exprlist(first.into_inner())
    }

    fn parse_except_codes(self: Rc<Self>, pair: Pair<Rule>) -> Result<CatchCodes, CompileError> {
        match pair.as_rule() {
            Rule::anycode => Ok(CatchCodes::Any),
            Rule::exprlist => Ok(CatchCodes::Codes(self.parse_exprlist(pair.into_inner())?)),
            _ => {
                panic!("Unimplemented except codes: {pair:?}");
            }
        }
    }

    fn parse_expr(self: Rc<Self>, pairs: Pairs<Rule>) -> Result<Expr, CompileError> {
        let primary_self = self.clone();
        let prefix_self = self.clone();
        let postfix_self = self.clone();

        let result = PRATT
            .map_primary(|primary| match primary.as_rule() {
                Rule::atom => {
                    let mut inner = primary.into_inner();
                    primary_self.clone().parse_atom(inner.next().unwrap())
                }
                Rule::sysprop => {
                    let mut inner = primary.into_inner();
                    let property = inner.next().unwrap().as_str();
                    Ok(Expr::Prop {
                        location: Box::new(Expr::Value(v_objid(SYSTEM_OBJECT))),
                        property: Box::new(Expr::Value(v_str(property))),
                    })
                }
                Rule::sysprop_call => {
                    let mut inner = primary.into_inner();
                    let verb = inner.next().unwrap().as_str().to_string();
                    let args = primary_self
                        .clone()
                        .parse_arglist(inner.next().unwrap().into_inner())?;
                    Ok(Expr::Verb {
                        location: Box::new(Expr::Value(v_objid(SYSTEM_OBJECT))),
                        verb: Box::new(Expr::Value(v_str(&verb))),
                        args,
                    })
                }
                Rule::list => {
                    let mut inner = primary.into_inner();
                    if let Some(exprlist) = inner.next() {
                        let args = primary_self.clone().parse_exprlist(exprlist.into_inner())?;
                        Ok(Expr::List(args))
                    } else {
                        Ok(Expr::List(vec![]))
                    }
                }
                Rule::map => {
                    let mut pairs = vec![];
                    for entry in primary.into_inner() {
                        let mut kv = entry.into_inner();
                        let key = primary_self
                            .clone()
                            .parse_expr(kv.next().unwrap().into_inner())?;
                        let value = primary_self
                            .clone()
                            .parse_expr(kv.next().unwrap().into_inner())?;
                        pairs.push((key, value));
                    }
                    Ok(Expr::Map(pairs))
                }
                Rule::builtin_call => {
                    let mut inner = primary.into_inner();
                    let bf = inner.next().unwrap().as_str().to_string();
                    let args = primary_self
                        .clone()
                        .parse_arglist(inner.next().unwrap().into_inner())?;
                    Ok(Expr::Call { function: bf, args })
                }
                Rule::pass_expr => {
                    let mut inner = primary.into_inner();
                    // Skip the `pass` keyword token.
                    inner.next();
                    let args = match inner.next() {
                        Some(arglist) => {
                            primary_self.clone().parse_arglist(arglist.into_inner())?
                        }
                        None => vec![],
                    };
                    Ok(Expr::Pass { args })
                }
                Rule::range_end => Ok(Expr::Length),
                Rule::try_expr => {
                    let mut inner = primary.into_inner();
                    let trye = primary_self
                        .clone()
                        .parse_expr(inner.next().unwrap().into_inner())?;
                    let codes = primary_self
                        .clone()
                        .parse_except_codes(inner.next().unwrap().into_inner().next().unwrap())?;
                    let except = match inner.next() {
                        Some(e) => Some(Box::new(primary_self.clone().parse_expr(e.into_inner())?)),
                        None => None,
                    };
                    Ok(Expr::TryCatch {
                        trye: Box::new(trye),
                        codes,
                        except,
                    })
                }
                Rule::paren_expr => {
                    let mut inner = primary.into_inner();
                    primary_self.clone().parse_expr(inner.next().unwrap().into_inner())
                }
                _ => todo!("Unimplemented primary: {:?}", primary.as_rule()),
            })
            .map_prefix(|op, rhs| match op.as_rule() {
                Rule::scatter_assign => {
                    let inner = op.into_inner();
                    let mut items = vec![];
                    for scatter_item in inner {
                        match scatter_item.as_rule() {
                            Rule::scatter_target => {
                                let mut parts = scatter_item.into_inner();
                                let id = parts.next().unwrap().as_str();
                                let id = prefix_self.scopes.borrow_mut().find_or_add(id);
                                items.push(ScatterItem {
                                    kind: ScatterKind::Required,
                                    id,
                                    expr: None,
                                });
                            }
                            Rule::scatter_optional => {
                                let mut parts = scatter_item.into_inner();
                                let id = parts.next().unwrap().as_str();
                                let id = prefix_self.scopes.borrow_mut().find_or_add(id);
                                let expr = match parts.next() {
                                    Some(e) => Some(prefix_self.clone().parse_expr(e.into_inner())?),
                                    None => None,
                                };
                                items.push(ScatterItem {
                                    kind: ScatterKind::Optional,
                                    id,
                                    expr,
                                });
                            }
                            Rule::scatter_rest => {
                                let mut parts = scatter_item.into_inner();
                                let id = parts.next().unwrap().as_str();
                                let id = prefix_self.scopes.borrow_mut().find_or_add(id);
                                items.push(ScatterItem {
                                    kind: ScatterKind::Rest,
                                    id,
                                    expr: None,
                                });
                            }
                            _ => {
                                panic!("Unimplemented scatter item: {scatter_item:?}");
                            }
                        }
                    }
                    Ok(Expr::Scatter(items, Box::new(rhs?)))
                }
                Rule::neg => Ok(Expr::Unary(UnaryOp::Neg, Box::new(rhs?))),
                Rule::not => Ok(Expr::Unary(UnaryOp::Not, Box::new(rhs?))),
                _ => todo!("Unimplemented prefix: {:?}", op.as_rule()),
            })
            .map_infix(|lhs, op, rhs| {
                let binop = match op.as_rule() {
                    Rule::add => BinaryOp::Add,
                    Rule::sub => BinaryOp::Sub,
                    Rule::mul => BinaryOp::Mul,
                    Rule::div => BinaryOp::Div,
                    Rule::modulus => BinaryOp::Mod,
                    Rule::pow => BinaryOp::Exp,
                    Rule::eq => BinaryOp::Eq,
                    Rule::neq => BinaryOp::NEq,
                    Rule::gt => BinaryOp::Gt,
                    Rule::gte => BinaryOp::GtE,
                    Rule::lt => BinaryOp::Lt,
                    Rule::lte => BinaryOp::LtE,
                    Rule::in_range => BinaryOp::In,
                    Rule::land => return Ok(Expr::And(Box::new(lhs?), Box::new(rhs?))),
                    Rule::lor => return Ok(Expr::Or(Box::new(lhs?), Box::new(rhs?))),
                    _ => todo!("Unimplemented infix: {:?}", op.as_rule()),
                };
                Ok(Expr::Binary(binop, Box::new(lhs?), Box::new(rhs?)))
            })
            .map_postfix(|lhs, op| match op.as_rule() {
                Rule::verb_call => {
                    let mut parts = op.into_inner();
                    let ident = parts.next().unwrap().as_str();
                    let args = postfix_self
                        .clone()
                        .parse_arglist(parts.next().unwrap().into_inner())?;
                    Ok(Expr::Verb {
                        location: Box::new(lhs?),
                        verb: Box::new(Expr::Value(v_str(ident))),
                        args,
                    })
                }
                Rule::verb_expr_call => {
                    let mut parts = op.into_inner();
                    let verb = postfix_self
                        .clone()
                        .parse_expr(parts.next().unwrap().into_inner())?;
                    let args = postfix_self
                        .clone()
                        .parse_arglist(parts.next().unwrap().into_inner())?;
                    Ok(Expr::Verb {
                        location: Box::new(lhs?),
                        verb: Box::new(verb),
                        args,
                    })
                }
                Rule::prop => {
                    let mut parts = op.into_inner();
                    let ident = parts.next().unwrap().as_str();
                    Ok(Expr::Prop {
                        location: Box::new(lhs?),
                        property: Box::new(Expr::Value(v_str(ident))),
                    })
                }
                Rule::prop_expr => {
                    let mut parts = op.into_inner();
                    let expr = postfix_self
                        .clone()
                        .parse_expr(parts.next().unwrap().into_inner())?;
                    Ok(Expr::Prop {
                        location: Box::new(lhs?),
                        property: Box::new(expr),
                    })
                }
                Rule::assign => {
                    let mut parts = op.into_inner();
                    let right = postfix_self
                        .clone()
                        .parse_expr(parts.next().unwrap().into_inner())?;
                    Ok(Expr::Assign {
                        left: Box::new(lhs?),
                        right: Box::new(right),
                    })
                }
                Rule::index_single => {
                    let mut parts = op.into_inner();
                    let index = postfix_self
                        .clone()
                        .parse_expr(parts.next().unwrap().into_inner())?;
                    Ok(Expr::Index(Box::new(lhs?), Box::new(index)))
                }
                Rule::index_range => {
                    let mut parts = op.into_inner();
                    let from = postfix_self
                        .clone()
                        .parse_expr(parts.next().unwrap().into_inner())?;
                    let to = postfix_self
                        .clone()
                        .parse_expr(parts.next().unwrap().into_inner())?;
                    Ok(Expr::Range {
                        base: Box::new(lhs?),
                        from: Box::new(from),
                        to: Box::new(to),
                    })
                }
                Rule::cond_expr => {
                    let mut parts = op.into_inner();
                    let consequence = postfix_self
                        .clone()
                        .parse_expr(parts.next().unwrap().into_inner())?;
                    let alternative = postfix_self
                        .clone()
                        .parse_expr(parts.next().unwrap().into_inner())?;
                    Ok(Expr::Cond {
                        condition: Box::new(lhs?),
                        consequence: Box::new(consequence),
                        alternative: Box::new(alternative),
                    })
                }
                _ => todo!("Unimplemented postfix: {:?}", op.as_rule()),
            })
            .parse(pairs);
        result
    }

    fn enter_scope(&self) {
        self.scopes.borrow_mut().push_scope();
    }

    fn exit_scope(&self) {
        self.scopes.borrow_mut().pop_scope();
    }

    fn parse_statement(self: Rc<Self>, pair: Pair<Rule>) -> Result<Option<Stmt>, CompileError> {
        let line = pair.line_col().0;
        match pair.as_rule() {
            Rule::expr_statement => {
                let mut inner = pair.into_inner();
                if let Some(rule) = inner.next() {
                    let expr = self.parse_expr(rule.into_inner())?;
                    return Ok(Some(Stmt::new(StmtNode::Expr(expr), line)));
                }
                Ok(None)
            }
            Rule::let_statement => {
                let mut parts = pair.into_inner();
                // Skip the `let` keyword token.
                parts.next();
                let name = parts.next().unwrap().as_str();
                let expr = self
                    .clone()
                    .parse_expr(parts.next().unwrap().into_inner())?;
                // The slot is declared *after* the initializer parses, so
                // `let x = x + 1;` reads the outer x.
                let id = self.scopes.borrow_mut().declare_scoped(name);
                Ok(Some(Stmt::new(StmtNode::Let { id, expr }, line)))
            }
            Rule::while_statement => {
                let mut parts = pair.into_inner();
                parts.next(); // kw_while
                let condition = self
                    .clone()
                    .parse_expr(parts.next().unwrap().into_inner())?;
                self.enter_scope();
                let body = self
                    .clone()
                    .parse_statements(parts.next().unwrap().into_inner())?;
                self.exit_scope();
                Ok(Some(Stmt::new(
                    StmtNode::While {
                        id: None,
                        condition,
                        body,
                    },
                    line,
                )))
            }
            Rule::labelled_while_statement => {
                let mut parts = pair.into_inner();
                parts.next(); // kw_while
                let id = self
                    .scopes
                    .borrow_mut()
                    .find_or_add(parts.next().unwrap().as_str());
                let condition = self
                    .clone()
                    .parse_expr(parts.next().unwrap().into_inner())?;
                self.enter_scope();
                let body = self
                    .clone()
                    .parse_statements(parts.next().unwrap().into_inner())?;
                self.exit_scope();
                Ok(Some(Stmt::new(
                    StmtNode::While {
                        id: Some(id),
                        condition,
                        body,
                    },
                    line,
                )))
            }
            Rule::if_statement => {
                let mut parts = pair.into_inner();
                parts.next(); // kw_if
                let mut arms = vec![];
                let mut otherwise = vec![];
                let condition = self
                    .clone()
                    .parse_expr(parts.next().unwrap().into_inner())?;
                self.enter_scope();
                let body = self
                    .clone()
                    .parse_statements(parts.next().unwrap().into_inner())?;
                self.exit_scope();
                arms.push(CondArm {
                    condition,
                    statements: body,
                });
                for remainder in parts {
                    match remainder.as_rule() {
                        Rule::elseif_clause => {
                            let mut parts = remainder.into_inner();
                            parts.next(); // kw_elseif
                            let condition = self
                                .clone()
                                .parse_expr(parts.next().unwrap().into_inner())?;
                            self.enter_scope();
                            let body = self
                                .clone()
                                .parse_statements(parts.next().unwrap().into_inner())?;
                            self.exit_scope();
                            arms.push(CondArm {
                                condition,
                                statements: body,
                            });
                        }
                        Rule::else_clause => {
                            let mut parts = remainder.into_inner();
                            parts.next(); // kw_else
                            self.enter_scope();
                            otherwise = self
                                .clone()
                                .parse_statements(parts.next().unwrap().into_inner())?;
                            self.exit_scope();
                        }
                        Rule::kw_endif => {}
                        _ => panic!("Unimplemented if clause: {remainder:?}"),
                    }
                }
                Ok(Some(Stmt::new(StmtNode::Cond { arms, otherwise }, line)))
            }
            Rule::break_statement => {
                let mut parts = pair.into_inner();
                parts.next(); // kw_break
                let exit = self.parse_loop_label(parts.next())?;
                Ok(Some(Stmt::new(StmtNode::Break { exit }, line)))
            }
            Rule::continue_statement => {
                let mut parts = pair.into_inner();
                parts.next(); // kw_continue
                let exit = self.parse_loop_label(parts.next())?;
                Ok(Some(Stmt::new(StmtNode::Continue { exit }, line)))
            }
            Rule::return_statement => {
                let mut parts = pair.into_inner();
                parts.next(); // kw_return
                let expr = match parts.next() {
                    Some(e) => Some(self.parse_expr(e.into_inner())?),
                    None => None,
                };
                Ok(Some(Stmt::new(StmtNode::Return(expr), line)))
            }
            Rule::for_statement => {
                let mut parts = pair.into_inner();
                parts.next(); // kw_for
                let id = self
                    .scopes
                    .borrow_mut()
                    .find_or_add(parts.next().unwrap().as_str());
                let mut next = parts.next().unwrap();
                let key_id = if next.as_rule() == Rule::ident {
                    let key = self.scopes.borrow_mut().find_or_add(next.as_str());
                    next = parts.next().unwrap();
                    Some(key)
                } else {
                    None
                };
                // kw_in sits between the loop variables and the clause.
                if next.as_rule() == Rule::kw_in {
                    next = parts.next().unwrap();
                }
                let clause = next;
                self.enter_scope();
                let body = self
                    .clone()
                    .parse_statements(parts.next().unwrap().into_inner())?;
                self.exit_scope();
                match clause.as_rule() {
                    Rule::for_range_clause => {
                        let mut clause_inner = clause.into_inner();
                        let from = self
                            .clone()
                            .parse_expr(clause_inner.next().unwrap().into_inner())?;
                        let to = self
                            .clone()
                            .parse_expr(clause_inner.next().unwrap().into_inner())?;
                        Ok(Some(Stmt::new(
                            StmtNode::ForRange { id, from, to, body },
                            line,
                        )))
                    }
                    Rule::for_in_clause => {
                        let mut clause_inner = clause.into_inner();
                        let expr = self
                            .clone()
                            .parse_expr(clause_inner.next().unwrap().into_inner())?;
                        Ok(Some(Stmt::new(
                            StmtNode::ForList {
                                id,
                                key_id,
                                expr,
                                body,
                            },
                            line,
                        )))
                    }
                    _ => panic!("Unimplemented for clause: {clause:?}"),
                }
            }
            Rule::fork_statement => {
                let mut parts = pair.into_inner();
                parts.next(); // kw_fork
                let time = self
                    .clone()
                    .parse_expr(parts.next().unwrap().into_inner())?;
                self.enter_scope();
                let body = self
                    .clone()
                    .parse_statements(parts.next().unwrap().into_inner())?;
                self.exit_scope();
                Ok(Some(Stmt::new(StmtNode::Fork { id: None, time, body }, line)))
            }
            Rule::labelled_fork_statement => {
                let mut parts = pair.into_inner();
                parts.next(); // kw_fork
                let id = self
                    .scopes
                    .borrow_mut()
                    .find_or_add(parts.next().unwrap().as_str());
                let time = self
                    .clone()
                    .parse_expr(parts.next().unwrap().into_inner())?;
                self.enter_scope();
                let body = self
                    .clone()
                    .parse_statements(parts.next().unwrap().into_inner())?;
                self.exit_scope();
                Ok(Some(Stmt::new(
                    StmtNode::Fork {
                        id: Some(id),
                        time,
                        body,
                    },
                    line,
                )))
            }
            Rule::try_finally_statement => {
                let mut parts = pair.into_inner();
                parts.next(); // kw_try
                self.enter_scope();
                let body = self
                    .clone()
                    .parse_statements(parts.next().unwrap().into_inner())?;
                self.exit_scope();
                // Skip kw_finally.
                parts.next();
                self.enter_scope();
                let handler = self
                    .clone()
                    .parse_statements(parts.next().unwrap().into_inner())?;
                self.exit_scope();
                Ok(Some(Stmt::new(StmtNode::TryFinally { body, handler }, line)))
            }
            Rule::try_except_statement => {
                let mut parts = pair.into_inner();
                parts.next(); // kw_try
                self.enter_scope();
                let body = self
                    .clone()
                    .parse_statements(parts.next().unwrap().into_inner())?;
                self.exit_scope();
                let mut excepts = vec![];
                for except in parts {
                    match except.as_rule() {
                        Rule::except => {
                            let mut except_parts = except.into_inner();
                            except_parts.next(); // kw_except
                            let clause = except_parts.next().unwrap();
                            let (id, codes) = match clause.as_rule() {
                                Rule::labelled_except => {
                                    let mut my_parts = clause.into_inner();
                                    let id = self
                                        .scopes
                                        .borrow_mut()
                                        .find_or_add(my_parts.next().unwrap().as_str());
                                    let codes = self.clone().parse_except_codes(
                                        my_parts.next().unwrap().into_inner().next().unwrap(),
                                    )?;
                                    (Some(id), codes)
                                }
                                Rule::unlabelled_except => {
                                    let mut my_parts = clause.into_inner();
                                    let codes = self.clone().parse_except_codes(
                                        my_parts.next().unwrap().into_inner().next().unwrap(),
                                    )?;
                                    (None, codes)
                                }
                                _ => panic!("Unimplemented except clause: {clause:?}"),
                            };
                            self.enter_scope();
                            let statements = self
                                .clone()
                                .parse_statements(except_parts.next().unwrap().into_inner())?;
                            self.exit_scope();
                            excepts.push(ExceptArm {
                                id,
                                codes,
                                statements,
                            });
                        }
                        Rule::kw_endtry => {}
                        _ => panic!("Unimplemented except: {except:?}"),
                    }
                }
                Ok(Some(Stmt::new(StmtNode::TryExcept { body, excepts }, line)))
            }
            _ => {
                panic!("Unimplemented statement: {:?}", pair.as_rule());
            }
        }
    }

    fn parse_loop_label(
        self: &Rc<Self>,
        pair: Option<Pair<Rule>>,
    ) -> Result<Option<crate::names::Name>, CompileError> {
        match pair {
            None => Ok(None),
            Some(s) => {
                let label = s.as_str();
                let Some(label) = self.scopes.borrow().find(label) else {
                    return Err(CompileError::UnknownLoopLabel(label.to_string()));
                };
                Ok(Some(label))
            }
        }
    }

    fn parse_statements(self: Rc<Self>, pairs: Pairs<Rule>) -> Result<Vec<Stmt>, CompileError> {
        let mut statements = vec![];
        for pair in pairs {
            if let Some(stmt) = self.clone().parse_statement(pair)? {
                statements.push(stmt);
            }
        }
        Ok(statements)
    }
}

/// Parse a verb body into statements and its variable-name table.
pub fn parse_program(program_text: &str) -> Result<Parse, CompileError> {
    let pairs = MooParser::parse(moo::Rule::program, program_text).map_err(|e| {
        let (line, column) = match e.line_col {
            pest::error::LineColLocation::Pos((l, c)) => (l, c),
            pest::error::LineColLocation::Span((l, c), _) => (l, c),
        };
        CompileError::ParseError {
            line,
            column,
            message: e.variant.message().to_string(),
        }
    })?;

    let transformer = TreeTransformer::new();
    let mut stmts = vec![];
    for pair in pairs {
        match pair.as_rule() {
            Rule::statements => {
                stmts = transformer.clone().parse_statements(pair.into_inner())?;
            }
            Rule::EOI => {}
            _ => panic!("Unexpected top-level rule: {:?}", pair.as_rule()),
        }
    }
    let names = Rc::try_unwrap(transformer)
        .ok()
        .expect("transformer still shared")
        .scopes
        .into_inner()
        .finish();
    Ok(Parse { stmts, names })
}
