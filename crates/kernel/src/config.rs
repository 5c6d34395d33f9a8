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

//! The server-options cache: a handful of integer limits read from
//! `$server_options` and consulted by every value-producing builtin that
//! can grow a string, list, or map. Writers are rare (only
//! `load_server_options`), readers constant, hence the reader/writer lock.

use std::sync::RwLock;

use tracing::info;

use grange_db::ObjectStore;
use grange_var::{Variant, SYSTEM_OBJECT};

/// Lower clamp bound for every limit.
pub const OPTION_MIN: i64 = 1021;
/// Upper clamp bound for every limit.
pub const OPTION_MAX: i64 = i32::MAX as i64 - 1021;

const DEFAULT_LIMIT: i64 = 64 << 20; // 64 MiB

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServerOptions {
    /// Longest string `+`, `tostr`, `strsub` and friends may produce.
    pub max_string_concat: usize,
    /// Largest list, in `value_bytes` terms, a builtin may produce.
    pub max_list_value_bytes: usize,
    /// Largest map, in `value_bytes` terms, a builtin may produce.
    pub max_map_value_bytes: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        ServerOptions {
            max_string_concat: DEFAULT_LIMIT as usize,
            max_list_value_bytes: DEFAULT_LIMIT as usize,
            max_map_value_bytes: DEFAULT_LIMIT as usize,
        }
    }
}

/// Clamp one configured value: zero, negative, and out-of-range values all
/// land on the upper bound; small positive values are raised to the floor.
fn clamp(value: i64) -> usize {
    if value <= 0 || value > OPTION_MAX {
        OPTION_MAX as usize
    } else if value < OPTION_MIN {
        OPTION_MIN as usize
    } else {
        value as usize
    }
}

#[derive(Default)]
pub struct ServerOptionsCache(RwLock<ServerOptions>);

impl ServerOptionsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> ServerOptions {
        *self.0.read().expect("server options lock poisoned")
    }

    /// Re-read `$server_options` and atomically replace the cached limits.
    /// Anything missing or non-integer falls back to the default.
    pub fn load(&self, store: &ObjectStore) {
        let mut fresh = ServerOptions::default();
        if let Ok(options_ref) = store.resolve_property(SYSTEM_OBJECT, "server_options") {
            if let Variant::Obj(options_obj) = options_ref.variant() {
                let read = |name: &str, default: i64| -> i64 {
                    match store.resolve_property(*options_obj, name) {
                        Ok(v) => match v.variant() {
                            Variant::Int(i) => *i,
                            _ => default,
                        },
                        Err(_) => default,
                    }
                };
                fresh.max_string_concat = clamp(read("max_string_concat", DEFAULT_LIMIT));
                fresh.max_list_value_bytes = clamp(read("max_list_value_bytes", DEFAULT_LIMIT));
                fresh.max_map_value_bytes = clamp(read("max_map_value_bytes", DEFAULT_LIMIT));
            }
        }
        info!(
            max_string_concat = fresh.max_string_concat,
            max_list_value_bytes = fresh.max_list_value_bytes,
            max_map_value_bytes = fresh.max_map_value_bytes,
            "loaded server options"
        );
        *self.0.write().expect("server options lock poisoned") = fresh;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamping() {
        assert_eq!(clamp(0), OPTION_MAX as usize);
        assert_eq!(clamp(-5), OPTION_MAX as usize);
        assert_eq!(clamp(OPTION_MAX + 1), OPTION_MAX as usize);
        assert_eq!(clamp(5), OPTION_MIN as usize);
        assert_eq!(clamp(1021), 1021);
        assert_eq!(clamp(1 << 20), 1 << 20);
    }
}
