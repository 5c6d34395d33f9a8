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

use std::path::PathBuf;
use std::sync::Arc;

use grange_db::ObjectStore;

use crate::builtins::bf_files::FileTable;
use crate::config::ServerOptionsCache;
use crate::tasks::sessions::{ConnectionManager, InputForcer, NoopConnectionManager};

/// The mutable world a task sees: the object store, the loaded option
/// limits, the host's connection adapters, and the process-owned handle
/// tables.
pub struct World {
    pub store: ObjectStore,
    pub options: ServerOptionsCache,
    pub connections: Arc<dyn ConnectionManager>,
    pub input_forcer: Option<Arc<dyn InputForcer>>,
    pub files: FileTable,
    /// Set by `shutdown()`; the host polls it after `run()` returns.
    pub shutdown_requested: Option<String>,
    /// Root for all `file_*` paths.
    pub file_root: PathBuf,
    /// Root for all `exec()` programs.
    pub exec_root: PathBuf,
}

impl World {
    pub fn new(connections: Arc<dyn ConnectionManager>) -> Self {
        Self {
            store: ObjectStore::new(),
            options: ServerOptionsCache::new(),
            connections,
            input_forcer: None,
            files: FileTable::new(),
            shutdown_requested: None,
            file_root: PathBuf::from("files"),
            exec_root: PathBuf::from("executables"),
        }
    }

    /// A world with nobody connected; tests and headless tools.
    pub fn headless() -> Self {
        Self::new(Arc::new(NoopConnectionManager))
    }
}
