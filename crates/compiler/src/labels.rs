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

use crate::names::Name;

/// An index into a program's jump-label table.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Label(pub u16);

/// A program-relative offset: a position in the opcode vector, a fork-vector
/// index, or a saved value-stack depth, depending on context.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Offset(pub u16);

impl From<usize> for Offset {
    fn from(value: usize) -> Self {
        Offset(value as u16)
    }
}

/// An entry in the jump table: where the label currently points, and, for
/// loop labels, the name of the loop variable it belongs to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct JumpLabel {
    pub id: Label,
    pub name: Option<Name>,
    pub position: Offset,
}
