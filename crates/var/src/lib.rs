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

pub mod binary;
mod error;
mod list;
mod literal;
mod map;
mod obj;
mod scalar;
mod string;
#[allow(clippy::module_inception)]
mod var;
mod variant;
mod waif;

pub use error::{Error, ERROR_CODES};
pub use list::List;
pub use literal::{format_float, to_display, to_literal};
pub use map::Map;
pub use obj::{Objid, AMBIGUOUS, FAILED_MATCH, NOTHING, NOTHING_FAR, SYSTEM_OBJECT};
pub use string::Str;
pub use var::{
    v_anon, v_bool, v_empty_list, v_empty_map, v_empty_str, v_err, v_float, v_int, v_list,
    v_list_iter, v_map, v_none, v_obj, v_objid, v_str, v_string, v_waif, Var,
};
pub use variant::Variant;
pub use waif::Waif;

use strum::FromRepr;

/// Integer encoding of the type of a value, as reported by `typeof()`. The
/// numeric assignments are the LambdaMOO/ToastStunt ones and are stable
/// across versions; gaps are tags that exist only in other implementations'
/// disk images.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Hash, FromRepr)]
#[allow(non_camel_case_types)]
pub enum VarType {
    TYPE_INT = 0,
    TYPE_OBJ = 1,
    TYPE_STR = 2,
    TYPE_ERR = 3,
    TYPE_LIST = 4,
    _TYPE_CLEAR = 5,
    TYPE_NONE = 6,
    _TYPE_CATCH = 7,
    _TYPE_FINALLY = 8,
    TYPE_FLOAT = 9,
    TYPE_MAP = 10,
    _TYPE_ITER = 11,
    TYPE_ANON = 12,
    TYPE_WAIF = 13,
}

impl VarType {
    pub fn name(&self) -> &'static str {
        match self {
            VarType::TYPE_INT => "INT",
            VarType::TYPE_OBJ => "OBJ",
            VarType::TYPE_STR => "STR",
            VarType::TYPE_ERR => "ERR",
            VarType::TYPE_LIST => "LIST",
            VarType::TYPE_NONE => "NONE",
            VarType::TYPE_FLOAT => "FLOAT",
            VarType::TYPE_MAP => "MAP",
            VarType::TYPE_ANON => "ANON",
            VarType::TYPE_WAIF => "WAIF",
            _ => "INVALID-TYPE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "NUM" | "INT" => Some(VarType::TYPE_INT),
            "OBJ" => Some(VarType::TYPE_OBJ),
            "STR" => Some(VarType::TYPE_STR),
            "ERR" => Some(VarType::TYPE_ERR),
            "LIST" => Some(VarType::TYPE_LIST),
            "FLOAT" => Some(VarType::TYPE_FLOAT),
            "MAP" => Some(VarType::TYPE_MAP),
            "ANON" => Some(VarType::TYPE_ANON),
            "WAIF" => Some(VarType::TYPE_WAIF),
            _ => None,
        }
    }
}
