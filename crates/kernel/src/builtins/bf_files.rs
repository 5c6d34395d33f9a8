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

//! Sandboxed file I/O. Every path is interpreted relative to the `files/`
//! root after rejecting absolute paths and `..` segments; open files are
//! process-owned and addressed by opaque integer handles. All of these are
//! wizard-only.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Component, Path, PathBuf};

use grange_compiler::offset_for_builtin;
use grange_var::Error::{E_FILE, E_INVARG, E_QUOTA, E_TYPE};
use grange_var::{binary, v_int, v_list, v_str, v_string, Var, Variant};

use crate::builtins::BfRet::Ret;
use crate::builtins::{BfCallState, BfErr, BfRet, BuiltinFunction};

/// One open file. Readers get a buffer so `file_readline` and `file_eof`
/// are cheap; writers hold the raw handle.
enum FileIo {
    Read(BufReader<File>),
    Write(File),
}

struct OpenFile {
    io: FileIo,
    /// Binary-mode handles speak `~XX` strings on both read and write.
    binary: bool,
    name: String,
}

/// The process-wide table of open file handles.
#[derive(Default)]
pub struct FileTable {
    handles: HashMap<i64, OpenFile>,
    next_handle: i64,
}

impl FileTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, file: OpenFile) -> i64 {
        self.next_handle += 1;
        self.handles.insert(self.next_handle, file);
        self.next_handle
    }

    fn get_mut(&mut self, handle: i64) -> Result<&mut OpenFile, BfErr> {
        self.handles.get_mut(&handle).ok_or(BfErr::Code(E_INVARG))
    }
}

/// Resolve a user-supplied path under `root`. Absolute paths and any `..`
/// segment are rejected before the filesystem ever sees the name.
pub(crate) fn sanitize_path(root: &Path, path: &str) -> Result<PathBuf, BfErr> {
    let path = Path::new(path);
    if path.is_absolute() {
        return Err(BfErr::Code(E_INVARG));
    }
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => return Err(BfErr::Code(E_INVARG)),
        }
    }
    Ok(root.join(path))
}

fn str_arg(bf_args: &BfCallState<'_, '_>, n: usize) -> Result<String, BfErr> {
    match bf_args.args[n].variant() {
        Variant::Str(s) => Ok(s.as_str().to_string()),
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

fn handle_arg(bf_args: &BfCallState<'_, '_>, n: usize) -> Result<i64, BfErr> {
    match bf_args.args[n].variant() {
        Variant::Int(i) => Ok(*i),
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

/// `file_open(path, mode)`: mode is r/w/a plus an optional b (binary) or
/// t (text, the default), e.g. `"rb"` or `"a"`. Returns the handle.
fn bf_file_open(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.require_wizard()?;
    let name = str_arg(bf_args, 0)?;
    let mode = str_arg(bf_args, 1)?;
    let path = sanitize_path(&bf_args.ctx.world.file_root, &name)?;

    let mut chars = mode.chars();
    let direction = chars.next().ok_or(BfErr::Code(E_INVARG))?;
    let mut is_binary = false;
    for flag in chars {
        match flag {
            'b' => is_binary = true,
            't' => is_binary = false,
            // Flush-discipline flags; output is unbuffered here anyway.
            'f' | 'n' => {}
            _ => return Err(BfErr::Code(E_INVARG)),
        }
    }

    let io = match direction {
        'r' => {
            let file = File::open(&path).map_err(|e| file_error(&name, e))?;
            FileIo::Read(BufReader::new(file))
        }
        'w' => {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&path)
                .map_err(|e| file_error(&name, e))?;
            FileIo::Write(file)
        }
        'a' => {
            let file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(&path)
                .map_err(|e| file_error(&name, e))?;
            FileIo::Write(file)
        }
        _ => return Err(BfErr::Code(E_INVARG)),
    };

    let handle = bf_args.ctx.world.files.insert(OpenFile {
        io,
        binary: is_binary,
        name,
    });
    Ok(Ret(v_int(handle)))
}

fn file_error(name: &str, e: std::io::Error) -> BfErr {
    BfErr::CodeMsg(E_FILE, format!("{name}: {e}"))
}

fn bf_file_close(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.require_wizard()?;
    let handle = handle_arg(bf_args, 0)?;
    match bf_args.ctx.world.files.handles.remove(&handle) {
        Some(_) => Ok(Ret(v_int(0))),
        None => Err(BfErr::Code(E_INVARG)),
    }
}

/// `file_readline(handle)`: the next line, without its terminator. EOF is
/// `E_FILE`. A binary-mode handle yields the line `~XX`-encoded.
fn bf_file_readline(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.require_wizard()?;
    let handle = handle_arg(bf_args, 0)?;
    let max_string = bf_args.ctx.world.options.get().max_string_concat;
    let file = bf_args.ctx.world.files.get_mut(handle)?;
    let FileIo::Read(reader) = &mut file.io else {
        return Err(BfErr::Code(E_INVARG));
    };
    let mut line = Vec::new();
    let n = reader
        .read_until(b'\n', &mut line)
        .map_err(|e| file_error(&file.name, e))?;
    if n == 0 {
        return Err(BfErr::CodeMsg(E_FILE, format!("{}: end of file", file.name)));
    }
    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
    let result = if file.binary {
        binary::encode(&line)
    } else {
        String::from_utf8(line).map_err(|_| BfErr::Code(E_INVARG))?
    };
    if result.len() > max_string {
        return Err(BfErr::Code(E_QUOTA));
    }
    Ok(Ret(v_string(result)))
}

/// `file_read(handle, bytes)`: up to `bytes` raw bytes from a binary-mode
/// handle, `~XX`-encoded. EOF is `E_FILE`.
fn bf_file_read(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.require_wizard()?;
    let handle = handle_arg(bf_args, 0)?;
    let Variant::Int(count) = bf_args.args[1].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    let count = *count;
    let max_string = bf_args.ctx.world.options.get().max_string_concat;
    if count <= 0 {
        return Err(BfErr::Code(E_INVARG));
    }
    let file = bf_args.ctx.world.files.get_mut(handle)?;
    if !file.binary {
        return Err(BfErr::Code(E_INVARG));
    }
    let FileIo::Read(reader) = &mut file.io else {
        return Err(BfErr::Code(E_INVARG));
    };
    let mut buf = vec![0u8; count as usize];
    let n = reader
        .read(&mut buf)
        .map_err(|e| file_error(&file.name, e))?;
    if n == 0 {
        return Err(BfErr::CodeMsg(E_FILE, format!("{}: end of file", file.name)));
    }
    buf.truncate(n);
    let encoded = binary::encode(&buf);
    if encoded.len() > max_string {
        return Err(BfErr::Code(E_QUOTA));
    }
    Ok(Ret(v_string(encoded)))
}

/// `file_write(handle, text)`: append to a write-mode handle; a binary-mode
/// handle decodes `~XX` first. Returns the count of bytes written.
fn bf_file_write(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.require_wizard()?;
    let handle = handle_arg(bf_args, 0)?;
    let text = str_arg(bf_args, 1)?;
    let file = bf_args.ctx.world.files.get_mut(handle)?;
    let FileIo::Write(writer) = &mut file.io else {
        return Err(BfErr::Code(E_INVARG));
    };
    let bytes = if file.binary {
        binary::decode(&text).map_err(BfErr::Code)?
    } else {
        text.into_bytes()
    };
    writer
        .write_all(&bytes)
        .map_err(|e| file_error(&file.name, e))?;
    Ok(Ret(v_int(bytes.len() as i64)))
}

fn bf_file_size(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.require_wizard()?;
    let name = str_arg(bf_args, 0)?;
    let path = sanitize_path(&bf_args.ctx.world.file_root, &name)?;
    let metadata = std::fs::metadata(&path).map_err(|e| file_error(&name, e))?;
    Ok(Ret(v_int(metadata.len() as i64)))
}

fn bf_file_eof(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.require_wizard()?;
    let handle = handle_arg(bf_args, 0)?;
    let file = bf_args.ctx.world.files.get_mut(handle)?;
    match &mut file.io {
        FileIo::Read(reader) => {
            let at_eof = reader
                .fill_buf()
                .map_err(|e| file_error(&file.name, e))?
                .is_empty();
            Ok(Ret(v_int(at_eof as i64)))
        }
        // A write handle is always positioned at its own end.
        FileIo::Write(_) => Ok(Ret(v_int(1))),
    }
}

/// `file_list(path [, detailed])`: directory entries, sorted by name. The
/// detailed form is `{name, "d" | "f", size}` per entry.
fn bf_file_list(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.require_wizard()?;
    let name = str_arg(bf_args, 0)?;
    let detailed = bf_args.args.get(1).map(|v| v.is_true()).unwrap_or(false);
    let path = sanitize_path(&bf_args.ctx.world.file_root, &name)?;
    let entries = std::fs::read_dir(&path).map_err(|e| file_error(&name, e))?;
    let mut listed = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| file_error(&name, e))?;
        let entry_name = entry.file_name().to_string_lossy().to_string();
        if detailed {
            let metadata = entry.metadata().map_err(|e| file_error(&name, e))?;
            let kind = if metadata.is_dir() { "d" } else { "f" };
            listed.push((
                entry_name.clone(),
                v_list(&[
                    v_string(entry_name),
                    v_str(kind),
                    v_int(metadata.len() as i64),
                ]),
            ));
        } else {
            listed.push((entry_name.clone(), v_string(entry_name)));
        }
    }
    listed.sort_by(|(a, _), (b, _)| a.cmp(b));
    let entries: Vec<Var> = listed.into_iter().map(|(_, v)| v).collect();
    Ok(Ret(v_list(&entries)))
}

fn bf_file_mkdir(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.require_wizard()?;
    let name = str_arg(bf_args, 0)?;
    let path = sanitize_path(&bf_args.ctx.world.file_root, &name)?;
    std::fs::create_dir(&path).map_err(|e| file_error(&name, e))?;
    Ok(Ret(v_int(0)))
}

fn bf_file_remove(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.require_wizard()?;
    let name = str_arg(bf_args, 0)?;
    let path = sanitize_path(&bf_args.ctx.world.file_root, &name)?;
    let metadata = std::fs::metadata(&path).map_err(|e| file_error(&name, e))?;
    if metadata.is_dir() {
        std::fs::remove_dir(&path).map_err(|e| file_error(&name, e))?;
    } else {
        std::fs::remove_file(&path).map_err(|e| file_error(&name, e))?;
    }
    Ok(Ret(v_int(0)))
}

fn bf_file_rename(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.require_wizard()?;
    let from = str_arg(bf_args, 0)?;
    let to = str_arg(bf_args, 1)?;
    let from_path = sanitize_path(&bf_args.ctx.world.file_root, &from)?;
    let to_path = sanitize_path(&bf_args.ctx.world.file_root, &to)?;
    std::fs::rename(&from_path, &to_path).map_err(|e| file_error(&from, e))?;
    Ok(Ret(v_int(0)))
}

pub(crate) fn register_bf_files(builtins: &mut [BuiltinFunction]) {
    builtins[offset_for_builtin("file_open")] = bf_file_open;
    builtins[offset_for_builtin("file_close")] = bf_file_close;
    builtins[offset_for_builtin("file_readline")] = bf_file_readline;
    builtins[offset_for_builtin("file_read")] = bf_file_read;
    builtins[offset_for_builtin("file_write")] = bf_file_write;
    builtins[offset_for_builtin("file_size")] = bf_file_size;
    builtins[offset_for_builtin("file_eof")] = bf_file_eof;
    builtins[offset_for_builtin("file_list")] = bf_file_list;
    builtins[offset_for_builtin("file_mkdir")] = bf_file_mkdir;
    builtins[offset_for_builtin("file_remove")] = bf_file_remove;
    builtins[offset_for_builtin("file_rename")] = bf_file_rename;
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::sanitize_path;
    use crate::builtins::BfErr;
    use grange_var::Error::E_INVARG;

    fn rejected(path: &str) -> bool {
        matches!(
            sanitize_path(Path::new("files"), path),
            Err(BfErr::Code(E_INVARG))
        )
    }

    #[test]
    fn path_sanitation() {
        assert!(rejected("/etc/passwd"));
        assert!(rejected("../secrets"));
        assert!(rejected("logs/../../secrets"));
        assert_eq!(
            sanitize_path(Path::new("files"), "logs/today.txt").unwrap(),
            Path::new("files/logs/today.txt")
        );
        assert_eq!(
            sanitize_path(Path::new("files"), "./notes").unwrap(),
            Path::new("files/notes")
        );
    }
}
