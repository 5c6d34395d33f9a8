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

use std::fmt::{Display, Formatter};

use grange_var::{to_literal, Var};

use crate::labels::JumpLabel;
use crate::names::Names;
use crate::opcode::Op;

/// The result of compilation: instruction vectors, fork vectors, variable
/// names, the literal pool, jump table, and line-number spans. Verbs hold
/// one of these behind an `Arc`; execution never mutates it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    /// All pooled literals referenced by `Imm`.
    pub literals: Vec<Var>,
    /// All jump positions used by this program.
    pub jump_labels: Vec<JumpLabel>,
    /// The variable slot table.
    pub var_names: Names,
    /// The instruction stream for the verb body.
    pub main_vector: Vec<Op>,
    /// One instruction stream per `fork` statement.
    pub fork_vectors: Vec<Vec<Op>>,
    /// `(pc offset, source line)` pairs, one per statement, in pc order.
    pub line_number_spans: Vec<(usize, usize)>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// The source line covering `pc`, from the span table.
    pub fn line_for_pc(&self, pc: usize) -> Option<usize> {
        if self.line_number_spans.is_empty() {
            return None;
        }
        let mut last_line = 1;
        for (offset, line_no) in &self.line_number_spans {
            if *offset > pc {
                break;
            }
            last_line = *line_no;
        }
        Some(last_line)
    }
}

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, l) in self.literals.iter().enumerate() {
            writeln!(f, "L{}: {}", i, to_literal(l))?;
        }
        for (i, l) in self.jump_labels.iter().enumerate() {
            write!(f, "J{}: {}", i, l.position.0)?;
            if let Some(name) = &l.name {
                if let Some(sym) = self.var_names.name_of(name) {
                    write!(f, " ({sym})")?;
                }
            }
            writeln!(f)?;
        }
        for (i, v) in self.var_names.names.iter().enumerate() {
            writeln!(f, "V{i}: {v}")?;
        }
        for (i, op) in self.main_vector.iter().enumerate() {
            writeln!(f, "{i}: {op:?}")?;
        }
        for (fv, ops) in self.fork_vectors.iter().enumerate() {
            writeln!(f, "fork vector {fv}:")?;
            for (i, op) in ops.iter().enumerate() {
                writeln!(f, "  {i}: {op:?}")?;
            }
        }
        Ok(())
    }
}
