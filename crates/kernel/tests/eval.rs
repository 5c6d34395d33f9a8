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

//! End-to-end scenarios driven through compiled programs: the object
//! lifecycle, property inheritance, container semantics, and the builtin
//! families, observed exactly the way verb code observes them.

mod common;

use pretty_assertions::assert_eq;

use common::{add_verb, eval_ok, eval_raises, wizard_world};
use grange_var::Error::{
    E_DIV, E_INVARG, E_INVIND, E_PROPNF, E_QUOTA, E_RANGE, E_RECMOVE, E_TYPE, E_VERBNF,
};
use grange_var::{v_err, v_int, v_list, v_obj, v_str, SYSTEM_OBJECT};

#[test]
fn create_recycle_round_trip() {
    let mut world = wizard_world();
    let v = eval_ok(
        &mut world,
        r#"
        o = create(#0);
        if (!valid(o))
            return "create failed";
        endif
        if (!(o in children(#0)))
            return "not a child of its parent";
        endif
        recycle(o);
        if (valid(o))
            return "still valid after recycle";
        endif
        if (o in children(#0))
            return "still a child after recycle";
        endif
        if (!(o in recycled_objects()))
            return "not listed as recycled";
        endif
        return "ok";
        "#,
    );
    assert_eq!(v, v_str("ok"));
}

#[test]
fn property_inheritance_and_clearing() {
    let mut world = wizard_world();
    let v = eval_ok(
        &mut world,
        r#"
        a = create(#0);
        add_property(a, "x", 1, {player, "rw"});
        b = create(a);
        if (b.x != 1)
            return "did not inherit";
        endif
        b.x = 2;
        if (b.x != 2)
            return "local write missing";
        endif
        if (a.x != 1)
            return "write leaked to parent";
        endif
        clear_property(b, "x");
        if (!is_clear_property(b, "x"))
            return "not clear after clearing";
        endif
        a.x = 7;
        if (b.x != 7)
            return "clear slot is not a live view";
        endif
        return "ok";
        "#,
    );
    assert_eq!(v, v_str("ok"));
}

#[test]
fn duplicate_parent_property_rejected() {
    let mut world = wizard_world();
    let v = eval_ok(
        &mut world,
        r#"
        p1 = create(#0);
        p2 = create(#0);
        add_property(p1, "shared", 1, {player, "r"});
        add_property(p2, "shared", 2, {player, "r"});
        try
            create({p1, p2});
            return "no error";
        except e (ANY)
            return e[1];
        endtry
        "#,
    );
    assert_eq!(v, v_err(E_INVARG));
}

#[test]
fn chparent_cycle_is_recmove() {
    let mut world = wizard_world();
    let v = eval_ok(
        &mut world,
        r#"
        a = create(#0);
        b = create(a);
        try
            chparent(a, b);
            return "no error";
        except e (ANY)
            return {e[1], `chparent(a, a) ! ANY => "self"'};
        endtry
        "#,
    );
    assert_eq!(v, v_list(&[v_err(E_RECMOVE), v_str("self")]));
}

#[test]
fn map_key_canonical_ordering() {
    let mut world = wizard_world();
    let v = eval_ok(
        &mut world,
        r#"return mapkeys([#2 -> "a", 1 -> "b", "z" -> "c"]);"#,
    );
    assert_eq!(v, v_list(&[v_int(1), v_obj(2), v_str("z")]));
}

#[test]
fn map_iteration_follows_key_order() {
    let mut world = wizard_world();
    let v = eval_ok(
        &mut world,
        r#"
        keys = {};
        for v, k in ([2 -> "b", 1 -> "a"])
            keys = {@keys, k};
        endfor
        return keys;
        "#,
    );
    assert_eq!(v, v_list(&[v_int(1), v_int(2)]));
}

#[test]
fn map_errors() {
    let mut world = wizard_world();
    assert_eq!(
        eval_raises(&mut world, r#"m = [1 -> "a"]; return m[2];"#),
        E_RANGE
    );
    assert_eq!(
        eval_raises(&mut world, r#"m = [1 -> "a"]; return m[{1}];"#),
        E_TYPE
    );
}

#[test]
fn binary_hash_decodes_tilde_escapes() {
    let mut world = wizard_world();
    // sha1 over the two raw bytes 00 01, not over the six escape chars.
    let v = eval_ok(&mut world, r#"return binary_hash("~00~01", "sha1");"#);
    assert_eq!(v, v_str("3F29546453678B855931C174A97D6C0894B8F546"));
}

#[test]
fn binary_round_trip() {
    let mut world = wizard_world();
    let v = eval_ok(
        &mut world,
        r#"return encode_binary(decode_binary("~00ab ~7E", 1));"#,
    );
    assert_eq!(v, v_str("~00ab ~7E"));
    // length() counts a ~XX triple as one unit.
    let v = eval_ok(&mut world, r#"return length("~00ab");"#);
    assert_eq!(v, v_int(3));
}

#[test]
fn equality_split() {
    let mut world = wizard_world();
    let v = eval_ok(
        &mut world,
        r#"return {1 == 1.0, "Foo" == "foo", equal("Foo", "foo"), equal({1}, {1})};"#,
    );
    assert_eq!(v, v_list(&[v_int(0), v_int(1), v_int(0), v_int(1)]));
}

#[test]
fn string_and_range_semantics() {
    let mut world = wizard_world();
    let v = eval_ok(&mut world, r#"s = "hello"; return {s[1], s[2..$], s[3..2]};"#);
    assert_eq!(v, v_list(&[v_str("h"), v_str("ello"), v_str("")]));
    assert_eq!(
        eval_raises(&mut world, r#"s = "hello"; return s[0];"#),
        E_RANGE
    );
}

#[test]
fn arithmetic_error_codes() {
    let mut world = wizard_world();
    assert_eq!(eval_raises(&mut world, "return 1 / 0;"), E_DIV);
    assert_eq!(eval_raises(&mut world, "return sqrt(-1.0);"), grange_var::Error::E_FLOAT);
    assert_eq!(eval_raises(&mut world, r#"return 1 < "x";"#), E_TYPE);
}

#[test]
fn property_and_verb_lookup_errors() {
    let mut world = wizard_world();
    assert_eq!(eval_raises(&mut world, "return #-1.name;"), E_INVIND);
    assert_eq!(eval_raises(&mut world, "o = create(#0); return o.nosuch;"), E_PROPNF);
    assert_eq!(eval_raises(&mut world, "return #0:nosuch();"), E_VERBNF);
}

#[test]
fn finally_runs_during_unwind() {
    let mut world = wizard_world();
    let v = eval_ok(
        &mut world,
        r#"
        x = 0;
        try
            try
                raise(E_PERM);
            finally
                x = x + 1;
            endtry
        except e (E_PERM)
            return x;
        endtry
        return -1;
        "#,
    );
    assert_eq!(v, v_int(1));
}

#[test]
fn verb_calls_and_caller_perms() {
    let mut world = wizard_world();
    add_verb(&mut world, SYSTEM_OBJECT, "outer", "return this:inner();");
    add_verb(
        &mut world,
        SYSTEM_OBJECT,
        "inner",
        "return {caller_perms(), length(callers())};",
    );
    let v = eval_ok(&mut world, "return #0:outer();");
    // caller_perms in inner is outer's programmer; callers() sees outer
    // and the eval frame beneath it.
    assert_eq!(v, v_list(&[v_obj(0), v_int(2)]));
}

#[test]
fn pass_reaches_the_parent_verb() {
    let mut world = wizard_world();
    let parent = world
        .store
        .create_object(&[SYSTEM_OBJECT], SYSTEM_OBJECT, false)
        .unwrap();
    let child = world
        .store
        .create_object(&[parent], SYSTEM_OBJECT, false)
        .unwrap();
    add_verb(&mut world, parent, "greet", r#"return "p";"#);
    add_verb(&mut world, child, "greet", r#"return "c" + pass();"#);
    let v = eval_ok(&mut world, &format!("return #{}:greet();", child.0));
    assert_eq!(v, v_str("cp"));
}

#[test]
fn scatter_binding() {
    let mut world = wizard_world();
    add_verb(
        &mut world,
        SYSTEM_OBJECT,
        "sc",
        "{a, ?b = 5, @rest} = args; return {a, b, rest};",
    );
    let v = eval_ok(&mut world, "return #0:sc(1);");
    assert_eq!(v, v_list(&[v_int(1), v_int(5), v_list(&[])]));
    let v = eval_ok(&mut world, "return #0:sc(1, 2, 3, 4);");
    assert_eq!(
        v,
        v_list(&[v_int(1), v_int(2), v_list(&[v_int(3), v_int(4)])])
    );
}

#[test]
fn anonymous_objects_are_unlisted_and_invalidated() {
    let mut world = wizard_world();
    let v = eval_ok(
        &mut world,
        r#"
        a = create(#0, 1);
        if (typeof(a) != ANON)
            return "not anon-typed";
        endif
        if (!valid(a))
            return "not valid when fresh";
        endif
        if (length(children(#0)))
            return "listed in children";
        endif
        add_property(#0, "zzz", 1, {player, "r"});
        if (valid(a))
            return "survived a schema change";
        endif
        return "ok";
        "#,
    );
    assert_eq!(v, v_str("ok"));
}

#[test]
fn waif_property_reads_resolve_against_class() {
    let mut world = wizard_world();
    let class = world
        .store
        .create_object(&[SYSTEM_OBJECT], SYSTEM_OBJECT, false)
        .unwrap();
    world
        .store
        .add_property(
            class,
            "hp",
            v_int(10),
            SYSTEM_OBJECT,
            grange_db::BitEnum::new_with(grange_db::PropFlag::Read),
        )
        .unwrap();
    add_verb(&mut world, class, "make", "return new_waif();");
    let v = eval_ok(
        &mut world,
        &format!(
            "w = #{0}:make(); return {{typeof(w) == WAIF, w.hp, valid(w), w.class == #{0}}};",
            class.0
        ),
    );
    assert_eq!(v, v_list(&[v_int(1), v_int(10), v_int(0), v_int(1)]));
}

#[test]
fn move_updates_location_and_checks_recursion() {
    let mut world = wizard_world();
    let v = eval_ok(
        &mut world,
        r#"
        box = create(#0);
        thing = create(#0);
        move(thing, box);
        if (thing.location != box)
            return "location not updated";
        endif
        if (!(thing in box.contents))
            return "not in contents";
        endif
        try
            move(box, thing);
            return "recursive move allowed";
        except e (E_RECMOVE)
        endtry
        return "ok";
        "#,
    );
    assert_eq!(v, v_str("ok"));
}

#[test]
fn sort_and_unique_are_canonical() {
    let mut world = wizard_world();
    let v = eval_ok(&mut world, "return sort({3, 1, 2});");
    assert_eq!(v, v_list(&[v_int(1), v_int(2), v_int(3)]));
    let v = eval_ok(&mut world, "return unique({1, 2, 1, 3, 2});");
    assert_eq!(v, v_list(&[v_int(1), v_int(2), v_int(3)]));
}

#[test]
fn json_round_trip() {
    let mut world = wizard_world();
    let v = eval_ok(
        &mut world,
        r#"
        v = {1, 2.5, "x", {"nested", 3}, ["a" -> 1]};
        return equal(parse_json(generate_json(v)), v);
        "#,
    );
    assert_eq!(v, v_int(1));
}

#[test]
fn sysprop_reads_off_the_system_object() {
    let mut world = wizard_world();
    let v = eval_ok(
        &mut world,
        r#"add_property(#0, "greeting", "hi", {player, "r"}); return $greeting;"#,
    );
    assert_eq!(v, v_str("hi"));
}

#[test]
fn string_concat_quota_is_loaded_from_server_options() {
    let mut world = wizard_world();
    eval_ok(
        &mut world,
        r#"
        opts = create(#0);
        add_property(opts, "max_string_concat", 1021, {player, "r"});
        add_property(#0, "server_options", opts, {player, "r"});
        load_server_options();
        return "ok";
        "#,
    );
    let grow = r#"
        s = "";
        for i in [1..600]
            s = s + "x";
        endfor
        return length(s + s);
    "#;
    assert_eq!(eval_raises(&mut world, grow), E_QUOTA);
    // Raising the limit back up lets the same program through.
    eval_ok(
        &mut world,
        r#"$server_options.max_string_concat = 0; load_server_options(); return "ok";"#,
    );
    assert_eq!(eval_ok(&mut world, grow), v_int(1200));
}
