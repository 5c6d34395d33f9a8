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

//! The global registry of built-in function names. Compiled programs encode
//! builtin calls by the index of the function in this table, so entries may
//! only ever be appended, never reordered, or existing programs would call
//! the wrong functions.

use std::collections::HashMap;

use lazy_static::lazy_static;

use grange_var::VarType;
use grange_var::VarType::{TYPE_FLOAT, TYPE_INT, TYPE_LIST, TYPE_MAP, TYPE_OBJ, TYPE_STR};

use ArgCount::{Q, U};
use ArgType::{Any, AnyNum, Typed};

lazy_static! {
    static ref BUILTIN_DESCRIPTORS: Vec<Builtin> = mk_builtin_table();
    pub static ref BUILTINS: Builtins = Builtins::new();
}

/// A stable identifier for a builtin: its offset in the descriptor table.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct BuiltinId(pub u16);

pub enum ArgCount {
    Q(usize),
    U,
}

pub enum ArgType {
    Typed(VarType),
    Any,
    AnyNum,
}

pub struct Builtin {
    pub name: &'static str,
    pub min_args: ArgCount,
    pub max_args: ArgCount,
    pub types: Vec<ArgType>,
}

fn mk_builtin(
    name: &'static str,
    min_args: ArgCount,
    max_args: ArgCount,
    types: Vec<ArgType>,
) -> Builtin {
    Builtin {
        name,
        min_args,
        max_args,
        types,
    }
}

fn mk_builtin_table() -> Vec<Builtin> {
    vec![
        // Values.
        mk_builtin("typeof", Q(1), Q(1), vec![Any]),
        mk_builtin("tostr", Q(0), U, vec![]),
        mk_builtin("toliteral", Q(1), Q(1), vec![Any]),
        mk_builtin("toint", Q(1), Q(1), vec![Any]),
        mk_builtin("tonum", Q(1), Q(1), vec![Any]),
        mk_builtin("tofloat", Q(1), Q(1), vec![Any]),
        mk_builtin("toobj", Q(1), Q(1), vec![Any]),
        mk_builtin("equal", Q(2), Q(2), vec![Any, Any]),
        mk_builtin("value_bytes", Q(1), Q(1), vec![Any]),
        mk_builtin("value_hash", Q(1), Q(2), vec![Any, Typed(TYPE_STR)]),
        mk_builtin("length", Q(1), Q(1), vec![Any]),
        mk_builtin("error_message", Q(1), Q(1), vec![Any]),
        mk_builtin("error_code", Q(1), Q(1), vec![Any]),
        // Numbers.
        mk_builtin("abs", Q(1), Q(1), vec![AnyNum]),
        mk_builtin("min", Q(1), U, vec![AnyNum]),
        mk_builtin("max", Q(1), U, vec![AnyNum]),
        mk_builtin("random", Q(0), Q(1), vec![Typed(TYPE_INT)]),
        mk_builtin("time", Q(0), Q(0), vec![]),
        mk_builtin("ftime", Q(0), Q(1), vec![Typed(TYPE_INT)]),
        mk_builtin("ctime", Q(0), Q(1), vec![Typed(TYPE_INT)]),
        mk_builtin(
            "floatstr",
            Q(2),
            Q(3),
            vec![Typed(TYPE_FLOAT), Typed(TYPE_INT), Any],
        ),
        mk_builtin("sqrt", Q(1), Q(1), vec![AnyNum]),
        mk_builtin("sin", Q(1), Q(1), vec![AnyNum]),
        mk_builtin("cos", Q(1), Q(1), vec![AnyNum]),
        mk_builtin("tan", Q(1), Q(1), vec![AnyNum]),
        mk_builtin("asin", Q(1), Q(1), vec![AnyNum]),
        mk_builtin("acos", Q(1), Q(1), vec![AnyNum]),
        mk_builtin("atan", Q(1), Q(2), vec![AnyNum, AnyNum]),
        mk_builtin("sinh", Q(1), Q(1), vec![AnyNum]),
        mk_builtin("cosh", Q(1), Q(1), vec![AnyNum]),
        mk_builtin("tanh", Q(1), Q(1), vec![AnyNum]),
        mk_builtin("exp", Q(1), Q(1), vec![AnyNum]),
        mk_builtin("log", Q(1), Q(1), vec![AnyNum]),
        mk_builtin("log10", Q(1), Q(1), vec![AnyNum]),
        mk_builtin("ceil", Q(1), Q(1), vec![AnyNum]),
        mk_builtin("floor", Q(1), Q(1), vec![AnyNum]),
        mk_builtin("trunc", Q(1), Q(1), vec![AnyNum]),
        // Strings.
        mk_builtin(
            "strsub",
            Q(3),
            Q(4),
            vec![Typed(TYPE_STR), Typed(TYPE_STR), Typed(TYPE_STR), Any],
        ),
        mk_builtin(
            "index",
            Q(2),
            Q(3),
            vec![Typed(TYPE_STR), Typed(TYPE_STR), Any],
        ),
        mk_builtin(
            "rindex",
            Q(2),
            Q(3),
            vec![Typed(TYPE_STR), Typed(TYPE_STR), Any],
        ),
        mk_builtin("strcmp", Q(2), Q(2), vec![Typed(TYPE_STR), Typed(TYPE_STR)]),
        mk_builtin(
            "strtr",
            Q(3),
            Q(4),
            vec![Typed(TYPE_STR), Typed(TYPE_STR), Typed(TYPE_STR), Any],
        ),
        mk_builtin("explode", Q(1), Q(3), vec![Typed(TYPE_STR), Typed(TYPE_STR), Any]),
        mk_builtin("decode_binary", Q(1), Q(2), vec![Typed(TYPE_STR), Any]),
        mk_builtin("encode_binary", Q(0), U, vec![]),
        mk_builtin("random_bytes", Q(1), Q(1), vec![Typed(TYPE_INT)]),
        mk_builtin("encode_base64", Q(1), Q(2), vec![Typed(TYPE_STR), Any]),
        mk_builtin("decode_base64", Q(1), Q(2), vec![Typed(TYPE_STR), Any]),
        mk_builtin("salt", Q(0), Q(2), vec![Typed(TYPE_STR), Typed(TYPE_STR)]),
        mk_builtin("string_hash", Q(1), Q(3), vec![Typed(TYPE_STR), Typed(TYPE_STR), Any]),
        mk_builtin("binary_hash", Q(1), Q(3), vec![Typed(TYPE_STR), Typed(TYPE_STR), Any]),
        mk_builtin(
            "string_hmac",
            Q(2),
            Q(4),
            vec![Typed(TYPE_STR), Typed(TYPE_STR), Typed(TYPE_STR), Any],
        ),
        mk_builtin("crypt", Q(1), Q(2), vec![Typed(TYPE_STR), Typed(TYPE_STR)]),
        // Lists.
        mk_builtin("setadd", Q(2), Q(2), vec![Typed(TYPE_LIST), Any]),
        mk_builtin("setremove", Q(2), Q(2), vec![Typed(TYPE_LIST), Any]),
        mk_builtin(
            "listappend",
            Q(2),
            Q(3),
            vec![Typed(TYPE_LIST), Any, Typed(TYPE_INT)],
        ),
        mk_builtin(
            "listinsert",
            Q(2),
            Q(3),
            vec![Typed(TYPE_LIST), Any, Typed(TYPE_INT)],
        ),
        mk_builtin(
            "listdelete",
            Q(2),
            Q(2),
            vec![Typed(TYPE_LIST), Typed(TYPE_INT)],
        ),
        mk_builtin(
            "listset",
            Q(3),
            Q(3),
            vec![Typed(TYPE_LIST), Any, Typed(TYPE_INT)],
        ),
        mk_builtin("is_member", Q(2), Q(2), vec![Any, Typed(TYPE_LIST)]),
        mk_builtin("reverse", Q(1), Q(1), vec![Any]),
        mk_builtin("sort", Q(1), Q(4), vec![Typed(TYPE_LIST), Typed(TYPE_LIST), Any, Any]),
        mk_builtin("unique", Q(1), Q(1), vec![Typed(TYPE_LIST)]),
        mk_builtin("slice", Q(1), Q(3), vec![Typed(TYPE_LIST), Any, Any]),
        mk_builtin("all_members", Q(2), Q(2), vec![Any, Typed(TYPE_LIST)]),
        // Maps.
        mk_builtin("mapkeys", Q(1), Q(1), vec![Typed(TYPE_MAP)]),
        mk_builtin("mapvalues", Q(1), U, vec![Typed(TYPE_MAP)]),
        mk_builtin("mapdelete", Q(2), Q(2), vec![Typed(TYPE_MAP), Any]),
        mk_builtin("maphaskey", Q(2), Q(2), vec![Typed(TYPE_MAP), Any]),
        // Objects.
        mk_builtin("create", Q(1), U, vec![Any]),
        mk_builtin("recycle", Q(1), Q(1), vec![Any]),
        mk_builtin("valid", Q(1), Q(1), vec![Any]),
        mk_builtin("parent", Q(1), Q(1), vec![Any]),
        mk_builtin("parents", Q(1), Q(1), vec![Any]),
        mk_builtin("children", Q(1), Q(1), vec![Typed(TYPE_OBJ)]),
        mk_builtin("chparent", Q(2), Q(2), vec![Any, Typed(TYPE_OBJ)]),
        mk_builtin("chparents", Q(2), Q(2), vec![Any, Typed(TYPE_LIST)]),
        mk_builtin("max_object", Q(0), Q(0), vec![]),
        mk_builtin("move", Q(2), Q(2), vec![Typed(TYPE_OBJ), Typed(TYPE_OBJ)]),
        mk_builtin("renumber", Q(1), Q(2), vec![Typed(TYPE_OBJ), Typed(TYPE_OBJ)]),
        mk_builtin(
            "recreate",
            Q(2),
            Q(3),
            vec![Typed(TYPE_OBJ), Typed(TYPE_OBJ), Typed(TYPE_OBJ)],
        ),
        mk_builtin("recycled_objects", Q(0), Q(0), vec![]),
        mk_builtin("next_recycled_object", Q(0), Q(1), vec![Typed(TYPE_OBJ)]),
        mk_builtin("ancestors", Q(1), Q(2), vec![Any, Any]),
        mk_builtin("descendants", Q(1), Q(2), vec![Typed(TYPE_OBJ), Any]),
        mk_builtin("isa", Q(2), Q(2), vec![Any, Typed(TYPE_OBJ)]),
        mk_builtin("owned_objects", Q(1), Q(1), vec![Typed(TYPE_OBJ)]),
        mk_builtin("players", Q(0), Q(0), vec![]),
        mk_builtin("is_player", Q(1), Q(1), vec![Any]),
        mk_builtin("set_player_flag", Q(2), Q(2), vec![Any, Any]),
        mk_builtin("is_anonymous", Q(1), Q(1), vec![Any]),
        mk_builtin("new_waif", Q(0), Q(0), vec![]),
        mk_builtin("object_bytes", Q(1), Q(1), vec![Any]),
        // Properties.
        mk_builtin("properties", Q(1), Q(1), vec![Any]),
        mk_builtin("property_info", Q(2), Q(2), vec![Any, Typed(TYPE_STR)]),
        mk_builtin(
            "set_property_info",
            Q(3),
            Q(3),
            vec![Any, Typed(TYPE_STR), Typed(TYPE_LIST)],
        ),
        mk_builtin(
            "add_property",
            Q(4),
            Q(4),
            vec![Any, Typed(TYPE_STR), Any, Typed(TYPE_LIST)],
        ),
        mk_builtin("delete_property", Q(2), Q(2), vec![Any, Typed(TYPE_STR)]),
        mk_builtin("clear_property", Q(2), Q(2), vec![Any, Typed(TYPE_STR)]),
        mk_builtin("is_clear_property", Q(2), Q(2), vec![Any, Typed(TYPE_STR)]),
        // Verbs.
        mk_builtin("verbs", Q(1), Q(1), vec![Any]),
        mk_builtin("verb_info", Q(2), Q(2), vec![Any, Any]),
        mk_builtin("set_verb_info", Q(3), Q(3), vec![Any, Any, Typed(TYPE_LIST)]),
        mk_builtin("verb_args", Q(2), Q(2), vec![Any, Any]),
        mk_builtin("set_verb_args", Q(3), Q(3), vec![Any, Any, Typed(TYPE_LIST)]),
        mk_builtin("verb_code", Q(2), Q(4), vec![Any, Any, Any, Any]),
        mk_builtin("set_verb_code", Q(3), Q(3), vec![Any, Any, Typed(TYPE_LIST)]),
        mk_builtin(
            "add_verb",
            Q(3),
            Q(3),
            vec![Any, Typed(TYPE_LIST), Typed(TYPE_LIST)],
        ),
        mk_builtin("delete_verb", Q(2), Q(2), vec![Any, Any]),
        mk_builtin("respond_to", Q(2), Q(2), vec![Any, Any]),
        mk_builtin("disassemble", Q(2), Q(2), vec![Any, Any]),
        // Server, task and connection control.
        mk_builtin("raise", Q(1), Q(3), vec![Any, Typed(TYPE_STR), Any]),
        mk_builtin("call_function", Q(1), U, vec![Typed(TYPE_STR)]),
        mk_builtin("function_info", Q(0), Q(1), vec![Typed(TYPE_STR)]),
        mk_builtin("eval", Q(1), Q(1), vec![Typed(TYPE_STR)]),
        mk_builtin("suspend", Q(0), Q(1), vec![AnyNum]),
        mk_builtin("resume", Q(1), Q(2), vec![Typed(TYPE_INT), Any]),
        mk_builtin("task_id", Q(0), Q(0), vec![]),
        mk_builtin("kill_task", Q(1), Q(1), vec![Typed(TYPE_INT)]),
        mk_builtin("queued_tasks", Q(0), Q(0), vec![]),
        mk_builtin("finished_tasks", Q(0), Q(0), vec![]),
        mk_builtin("queue_info", Q(0), Q(1), vec![Typed(TYPE_OBJ)]),
        mk_builtin("task_stack", Q(1), Q(2), vec![Typed(TYPE_INT), Any]),
        mk_builtin("callers", Q(0), Q(1), vec![Any]),
        mk_builtin("caller_perms", Q(0), Q(0), vec![]),
        mk_builtin("set_task_perms", Q(1), Q(1), vec![Typed(TYPE_OBJ)]),
        mk_builtin("ticks_left", Q(0), Q(0), vec![]),
        mk_builtin("seconds_left", Q(0), Q(0), vec![]),
        mk_builtin("task_local", Q(0), Q(0), vec![]),
        mk_builtin("set_task_local", Q(1), Q(1), vec![Any]),
        mk_builtin("server_version", Q(0), Q(1), vec![Any]),
        mk_builtin("server_log", Q(1), Q(2), vec![Typed(TYPE_STR), Any]),
        mk_builtin("memory_usage", Q(0), Q(0), vec![]),
        mk_builtin("dump_database", Q(0), Q(0), vec![]),
        mk_builtin("shutdown", Q(0), Q(1), vec![Typed(TYPE_STR)]),
        mk_builtin("load_server_options", Q(0), Q(0), vec![]),
        mk_builtin("verb_cache_stats", Q(0), Q(0), vec![]),
        mk_builtin("log_cache_stats", Q(0), Q(0), vec![]),
        mk_builtin("notify", Q(2), Q(3), vec![Typed(TYPE_OBJ), Typed(TYPE_STR), Any]),
        mk_builtin("connected_players", Q(0), Q(1), vec![Any]),
        mk_builtin("connected_seconds", Q(1), Q(1), vec![Typed(TYPE_OBJ)]),
        mk_builtin("idle_seconds", Q(1), Q(1), vec![Typed(TYPE_OBJ)]),
        mk_builtin("connection_name", Q(1), Q(1), vec![Typed(TYPE_OBJ)]),
        mk_builtin("boot_player", Q(1), Q(1), vec![Typed(TYPE_OBJ)]),
        mk_builtin(
            "force_input",
            Q(2),
            Q(3),
            vec![Typed(TYPE_OBJ), Typed(TYPE_STR), Any],
        ),
        mk_builtin("switch_player", Q(2), Q(2), vec![Typed(TYPE_OBJ), Typed(TYPE_OBJ)]),
        // File I/O, sandboxed under the files/ root.
        mk_builtin("file_open", Q(2), Q(2), vec![Typed(TYPE_STR), Typed(TYPE_STR)]),
        mk_builtin("file_close", Q(1), Q(1), vec![Typed(TYPE_INT)]),
        mk_builtin("file_readline", Q(1), Q(1), vec![Typed(TYPE_INT)]),
        mk_builtin("file_read", Q(2), Q(2), vec![Typed(TYPE_INT), Typed(TYPE_INT)]),
        mk_builtin("file_write", Q(2), Q(2), vec![Typed(TYPE_INT), Typed(TYPE_STR)]),
        mk_builtin("file_size", Q(1), Q(1), vec![Typed(TYPE_STR)]),
        mk_builtin("file_eof", Q(1), Q(1), vec![Typed(TYPE_INT)]),
        mk_builtin("file_list", Q(1), Q(2), vec![Typed(TYPE_STR), Any]),
        mk_builtin("file_mkdir", Q(1), Q(1), vec![Typed(TYPE_STR)]),
        mk_builtin("file_remove", Q(1), Q(1), vec![Typed(TYPE_STR)]),
        mk_builtin("file_rename", Q(2), Q(2), vec![Typed(TYPE_STR), Typed(TYPE_STR)]),
        // Subprocess, sandboxed under the executables/ root.
        mk_builtin("exec", Q(1), Q(2), vec![Any, Typed(TYPE_STR)]),
        // JSON.
        mk_builtin("generate_json", Q(1), Q(1), vec![Any]),
        mk_builtin("parse_json", Q(1), Q(1), vec![Typed(TYPE_STR)]),
        // Connection accessors and location filtering.
        mk_builtin("listen_port", Q(0), Q(0), vec![]),
        mk_builtin("connection_info", Q(1), Q(1), vec![Typed(TYPE_OBJ)]),
        mk_builtin(
            "occupants",
            Q(1),
            Q(3),
            vec![Typed(TYPE_LIST), Any, Typed(TYPE_INT)],
        ),
        mk_builtin("threads", Q(0), Q(0), vec![]),
    ]
}

/// The dictionary of all builtins, indexed by name and by id.
pub struct Builtins {
    offsets: HashMap<&'static str, BuiltinId>,
}

impl Builtins {
    fn new() -> Self {
        let mut offsets = HashMap::new();
        for (offset, builtin) in BUILTIN_DESCRIPTORS.iter().enumerate() {
            offsets.insert(builtin.name, BuiltinId(offset as u16));
        }
        Self { offsets }
    }

    pub fn find_builtin(&self, name: &str) -> Option<BuiltinId> {
        // Names are matched case-insensitively, like everything else.
        let folded = name.to_ascii_lowercase();
        self.offsets.get(folded.as_str()).copied()
    }

    pub fn name_of(&self, id: BuiltinId) -> Option<&'static str> {
        BUILTIN_DESCRIPTORS.get(id.0 as usize).map(|b| b.name)
    }

    pub fn description_for(&self, id: BuiltinId) -> Option<&Builtin> {
        BUILTIN_DESCRIPTORS.get(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        BUILTIN_DESCRIPTORS.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn descriptions(&self) -> impl Iterator<Item = (BuiltinId, &Builtin)> {
        BUILTIN_DESCRIPTORS
            .iter()
            .enumerate()
            .map(|(i, b)| (BuiltinId(i as u16), b))
    }
}

/// Table offset of a known-present builtin; panics on a name not in the
/// table, which is a programming error in the registration lists.
pub fn offset_for_builtin(name: &str) -> usize {
    let id = BUILTINS
        .find_builtin(name)
        .unwrap_or_else(|| panic!("Unknown builtin: {name}"));
    id.0 as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_stable_offsets() {
        assert_eq!(BUILTINS.find_builtin("typeof"), Some(BuiltinId(0)));
        let id = BUILTINS.find_builtin("notify").unwrap();
        assert_eq!(BUILTINS.name_of(id), Some("notify"));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(
            BUILTINS.find_builtin("TOSTR"),
            BUILTINS.find_builtin("tostr")
        );
        assert_eq!(BUILTINS.find_builtin("no_such_builtin"), None);
    }

    #[test]
    fn no_duplicate_names() {
        assert_eq!(BUILTINS.offsets.len(), BUILTINS.len());
    }
}
