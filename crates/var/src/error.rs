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

use strum::FromRepr;

/// The MOO error codes. These are values in the language (`E_TYPE` is a
/// perfectly good thing to put in a list) as well as what raised exceptions
/// carry. The numeric assignments match the LambdaMOO textdump encoding and
/// must not be reordered.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, FromRepr)]
#[allow(non_camel_case_types)]
pub enum Error {
    E_NONE = 0,
    E_TYPE = 1,
    E_DIV = 2,
    E_PERM = 3,
    E_PROPNF = 4,
    E_VERBNF = 5,
    E_VARNF = 6,
    E_INVIND = 7,
    E_RECMOVE = 8,
    E_MAXREC = 9,
    E_RANGE = 10,
    E_ARGS = 11,
    E_NACC = 12,
    E_INVARG = 13,
    E_QUOTA = 14,
    E_FLOAT = 15,
    E_FILE = 16,
    E_EXEC = 17,
    E_INTRPT = 18,
}

/// All codes, in tag order. Used by the registry's `function_info` and by
/// tests that sweep the whole set.
pub const ERROR_CODES: &[Error] = &[
    Error::E_NONE,
    Error::E_TYPE,
    Error::E_DIV,
    Error::E_PERM,
    Error::E_PROPNF,
    Error::E_VERBNF,
    Error::E_VARNF,
    Error::E_INVIND,
    Error::E_RECMOVE,
    Error::E_MAXREC,
    Error::E_RANGE,
    Error::E_ARGS,
    Error::E_NACC,
    Error::E_INVARG,
    Error::E_QUOTA,
    Error::E_FLOAT,
    Error::E_FILE,
    Error::E_EXEC,
    Error::E_INTRPT,
];

impl Error {
    /// The symbolic name, exactly as the literal form spells it.
    pub fn name(&self) -> &'static str {
        match self {
            Error::E_NONE => "E_NONE",
            Error::E_TYPE => "E_TYPE",
            Error::E_DIV => "E_DIV",
            Error::E_PERM => "E_PERM",
            Error::E_PROPNF => "E_PROPNF",
            Error::E_VERBNF => "E_VERBNF",
            Error::E_VARNF => "E_VARNF",
            Error::E_INVIND => "E_INVIND",
            Error::E_RECMOVE => "E_RECMOVE",
            Error::E_MAXREC => "E_MAXREC",
            Error::E_RANGE => "E_RANGE",
            Error::E_ARGS => "E_ARGS",
            Error::E_NACC => "E_NACC",
            Error::E_INVARG => "E_INVARG",
            Error::E_QUOTA => "E_QUOTA",
            Error::E_FLOAT => "E_FLOAT",
            Error::E_FILE => "E_FILE",
            Error::E_EXEC => "E_EXEC",
            Error::E_INTRPT => "E_INTRPT",
        }
    }

    /// The default message carried by an exception raised with this code and
    /// no explicit message.
    pub fn message(&self) -> &'static str {
        match self {
            Error::E_NONE => "No error",
            Error::E_TYPE => "Type mismatch",
            Error::E_DIV => "Division by zero",
            Error::E_PERM => "Permission denied",
            Error::E_PROPNF => "Property not found",
            Error::E_VERBNF => "Verb not found",
            Error::E_VARNF => "Variable not found",
            Error::E_INVIND => "Invalid indirection",
            Error::E_RECMOVE => "Recursive move",
            Error::E_MAXREC => "Too many verb calls",
            Error::E_RANGE => "Range error",
            Error::E_ARGS => "Incorrect number of arguments",
            Error::E_NACC => "Move refused by destination",
            Error::E_INVARG => "Invalid argument",
            Error::E_QUOTA => "Resource limit exceeded",
            Error::E_FLOAT => "Floating-point arithmetic error",
            Error::E_FILE => "File system error",
            Error::E_EXEC => "Exec error",
            Error::E_INTRPT => "Interrupted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "E_NONE" => Some(Error::E_NONE),
            "E_TYPE" => Some(Error::E_TYPE),
            "E_DIV" => Some(Error::E_DIV),
            "E_PERM" => Some(Error::E_PERM),
            "E_PROPNF" => Some(Error::E_PROPNF),
            "E_VERBNF" => Some(Error::E_VERBNF),
            "E_VARNF" => Some(Error::E_VARNF),
            "E_INVIND" => Some(Error::E_INVIND),
            "E_RECMOVE" => Some(Error::E_RECMOVE),
            "E_MAXREC" => Some(Error::E_MAXREC),
            "E_RANGE" => Some(Error::E_RANGE),
            "E_ARGS" => Some(Error::E_ARGS),
            "E_NACC" => Some(Error::E_NACC),
            "E_INVARG" => Some(Error::E_INVARG),
            "E_QUOTA" => Some(Error::E_QUOTA),
            "E_FLOAT" => Some(Error::E_FLOAT),
            "E_FILE" => Some(Error::E_FILE),
            "E_EXEC" => Some(Error::E_EXEC),
            "E_INTRPT" => Some(Error::E_INTRPT),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_every_code() {
        for code in ERROR_CODES {
            assert_eq!(Error::parse(code.name()), Some(*code));
        }
        assert_eq!(Error::parse("e_type"), Some(Error::E_TYPE));
        assert_eq!(Error::parse("E_BOGUS"), None);
    }

    #[test]
    fn repr_is_stable() {
        assert_eq!(Error::E_NONE as u8, 0);
        assert_eq!(Error::E_FLOAT as u8, 15);
        assert_eq!(Error::from_repr(5), Some(Error::E_VERBNF));
    }
}
