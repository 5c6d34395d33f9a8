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

use thiserror::Error;

/// Compilation failures. These are never raised into running code; callers
/// like `set_verb_code` report them back as a list of message strings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("Line {line}, column {column}: {message}")]
    ParseError {
        line: usize,
        column: usize,
        message: String,
    },
    #[error("Unknown built-in function: {0}")]
    UnknownBuiltinFunction(String),
    #[error("Unknown error code: {0}")]
    UnknownErrorCode(String),
    #[error("Unknown loop label: {0}")]
    UnknownLoopLabel(String),
    #[error("Invalid assignment target")]
    InvalidAssignment,
    #[error("`$' used outside of an index expression")]
    DollarOutsideIndex,
    #[error("Integer literal out of range: {0}")]
    IntegerOutOfRange(String),
}
