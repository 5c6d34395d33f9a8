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

//! `exec()`: run a program from the `executables/` root and hand back
//! `{exit-code, stdout, stderr}`. Wizard-only, like the file builtins.

use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::warn;

use grange_compiler::offset_for_builtin;
use grange_var::Error::{E_EXEC, E_INVARG, E_TYPE};
use grange_var::{binary, v_int, v_list, v_string, Variant};

use crate::builtins::bf_files::sanitize_path;
use crate::builtins::BfRet::Ret;
use crate::builtins::{BfCallState, BfErr, BfRet, BuiltinFunction};

/// How long a spawned program may run before it is killed.
const EXEC_TIMEOUT: Duration = Duration::from_secs(30);

/// `exec(cmd [, stdin])`. A list `{"prog", "arg", ...}` becomes a direct
/// argv with the program resolved under the exec root; a bare string is
/// handed to the shell with the exec root as its working directory. The
/// optional stdin is a binary string fed to the child.
fn bf_exec(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    bf_args.require_wizard()?;

    let stdin_bytes = match bf_args.args.get(1) {
        None => None,
        Some(v) => match v.variant() {
            Variant::Str(s) => Some(binary::decode(s.as_str()).map_err(BfErr::Code)?),
            _ => return Err(BfErr::Code(E_TYPE)),
        },
    };

    let mut command = match bf_args.args[0].variant() {
        Variant::List(argv) => {
            if argv.is_empty() {
                return Err(BfErr::Code(E_INVARG));
            }
            let mut words = Vec::with_capacity(argv.len());
            for word in argv.iter() {
                match word.variant() {
                    Variant::Str(s) => words.push(s.as_str().to_string()),
                    _ => return Err(BfErr::Code(E_INVARG)),
                }
            }
            let program = sanitize_path(&bf_args.ctx.world.exec_root, &words[0])?;
            let mut command = Command::new(program);
            command.args(&words[1..]);
            command
        }
        Variant::Str(line) => {
            let mut command = Command::new("/bin/sh");
            command.arg("-c").arg(line.as_str());
            command.current_dir(&bf_args.ctx.world.exec_root);
            command
        }
        _ => return Err(BfErr::Code(E_TYPE)),
    };
    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .map_err(|e| BfErr::CodeMsg(E_EXEC, e.to_string()))?;

    // Feed stdin and close it so the child sees EOF.
    if let Some(mut pipe) = child.stdin.take() {
        if let Some(bytes) = &stdin_bytes {
            pipe.write_all(bytes)
                .map_err(|e| BfErr::CodeMsg(E_EXEC, e.to_string()))?;
        }
    }

    // Drain stdout/stderr off-thread; a full pipe would otherwise wedge
    // the child before it can exit.
    let stdout = child.stdout.take().map(spawn_reader);
    let stderr = child.stderr.take().map(spawn_reader);

    let status = wait_with_timeout(&mut child, EXEC_TIMEOUT)?;
    let stdout = collect_output(stdout);
    let stderr = collect_output(stderr);

    Ok(Ret(v_list(&[
        v_int(status as i64),
        v_string(binary::encode(&normalize_newlines(stdout))),
        v_string(binary::encode(&normalize_newlines(stderr))),
    ])))
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect_output(reader: Option<thread::JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<i32, BfErr> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status.code().unwrap_or(-1)),
            Ok(None) => {
                if Instant::now() >= deadline {
                    warn!("exec'd program overran its deadline, killing it");
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(BfErr::CodeMsg(E_EXEC, "program timed out".to_string()));
                }
                thread::sleep(Duration::from_millis(5));
            }
            Err(e) => return Err(BfErr::CodeMsg(E_EXEC, e.to_string())),
        }
    }
}

fn normalize_newlines(bytes: Vec<u8>) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\r' && bytes.get(i + 1) == Some(&b'\n') {
            i += 1;
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

pub(crate) fn register_bf_exec(builtins: &mut [BuiltinFunction]) {
    builtins[offset_for_builtin("exec")] = bf_exec;
}

#[cfg(test)]
mod tests {
    use super::normalize_newlines;

    #[test]
    fn newline_normalization() {
        assert_eq!(normalize_newlines(b"a\r\nb\r\n".to_vec()), b"a\nb\n");
        assert_eq!(normalize_newlines(b"bare\rcarriage".to_vec()), b"bare\rcarriage");
        assert_eq!(normalize_newlines(b"plain\n".to_vec()), b"plain\n");
    }
}
