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

//! Sandboxed file I/O and subprocess scenarios, each against a throwaway
//! root directory.

mod common;

use pretty_assertions::assert_eq;

use common::{eval_ok, eval_raises, wizard_world};
use grange_var::Error::{E_INVARG, E_PERM};
use grange_var::{v_int, v_list, v_str, SYSTEM_OBJECT};

#[test]
fn text_file_round_trip() {
    let mut world = wizard_world();
    let root = tempfile::tempdir().unwrap();
    world.file_root = root.path().to_path_buf();
    let v = eval_ok(
        &mut world,
        r#"
        fh = file_open("notes.txt", "w");
        file_write(fh, "alpha");
        file_close(fh);
        fh = file_open("notes.txt", "r");
        line = file_readline(fh);
        eof = file_eof(fh);
        file_close(fh);
        return {line, eof, file_size("notes.txt")};
        "#,
    );
    assert_eq!(v, v_list(&[v_str("alpha"), v_int(1), v_int(5)]));
}

#[test]
fn binary_file_round_trip() {
    let mut world = wizard_world();
    let root = tempfile::tempdir().unwrap();
    world.file_root = root.path().to_path_buf();
    let v = eval_ok(
        &mut world,
        r#"
        fh = file_open("blob.bin", "wb");
        file_write(fh, "~00~01AB");
        file_close(fh);
        fh = file_open("blob.bin", "rb");
        data = file_read(fh, 100);
        file_close(fh);
        return {data, file_size("blob.bin")};
        "#,
    );
    assert_eq!(v, v_list(&[v_str("~00~01AB"), v_int(4)]));
}

#[test]
fn directory_management() {
    let mut world = wizard_world();
    let root = tempfile::tempdir().unwrap();
    world.file_root = root.path().to_path_buf();
    let v = eval_ok(
        &mut world,
        r#"
        file_mkdir("sub");
        fh = file_open("sub/a.txt", "w");
        file_write(fh, "x");
        file_close(fh);
        file_rename("sub/a.txt", "sub/b.txt");
        names = file_list("sub");
        file_remove("sub/b.txt");
        return {names, file_list("sub")};
        "#,
    );
    assert_eq!(
        v,
        v_list(&[v_list(&[v_str("b.txt")]), v_list(&[])])
    );
}

#[test]
fn paths_cannot_escape_the_root() {
    let mut world = wizard_world();
    let root = tempfile::tempdir().unwrap();
    world.file_root = root.path().to_path_buf();
    assert_eq!(
        eval_raises(&mut world, r#"return file_open("../oops", "w");"#),
        E_INVARG
    );
    assert_eq!(
        eval_raises(&mut world, r#"return file_size("/etc/passwd");"#),
        E_INVARG
    );
}

#[test]
fn file_builtins_are_wizard_only() {
    let mut world = wizard_world();
    let root = tempfile::tempdir().unwrap();
    world.file_root = root.path().to_path_buf();
    let peon = world
        .store
        .create_object(&[], SYSTEM_OBJECT, false)
        .unwrap();
    assert_eq!(
        eval_raises(
            &mut world,
            &format!(
                r#"set_task_perms(#{}); return file_open("notes.txt", "w");"#,
                peon.0
            ),
        ),
        E_PERM
    );
}

#[test]
fn exec_shell_form_captures_output() {
    let mut world = wizard_world();
    let root = tempfile::tempdir().unwrap();
    world.exec_root = root.path().to_path_buf();
    let v = eval_ok(&mut world, r#"return exec("echo hi");"#);
    // Output comes back as a binary string, newline escaped.
    assert_eq!(v, v_list(&[v_int(0), v_str("hi~0A"), v_str("")]));
}

#[test]
fn exec_feeds_stdin() {
    let mut world = wizard_world();
    let root = tempfile::tempdir().unwrap();
    world.exec_root = root.path().to_path_buf();
    let v = eval_ok(&mut world, r#"return exec("cat", "~41~42");"#);
    assert_eq!(v, v_list(&[v_int(0), v_str("AB"), v_str("")]));
}

#[cfg(unix)]
#[test]
fn exec_argv_form_runs_from_the_exec_root() {
    use std::os::unix::fs::PermissionsExt;

    let mut world = wizard_world();
    let root = tempfile::tempdir().unwrap();
    let script = root.path().join("greet.sh");
    std::fs::write(&script, "#!/bin/sh\necho \"hello $1\"\n").unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    world.exec_root = root.path().to_path_buf();
    let v = eval_ok(&mut world, r#"return exec({"greet.sh", "world"});"#);
    assert_eq!(v, v_list(&[v_int(0), v_str("hello world~0A"), v_str("")]));
}

#[test]
fn exec_rejects_escaping_programs() {
    let mut world = wizard_world();
    let root = tempfile::tempdir().unwrap();
    world.exec_root = root.path().to_path_buf();
    assert_eq!(
        eval_raises(&mut world, r#"return exec({"../sh"});"#),
        E_INVARG
    );
    assert_eq!(
        eval_raises(&mut world, r#"return exec({"/bin/sh"});"#),
        E_INVARG
    );
}
