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

use crate::var::Var;
use crate::variant::Variant;

/// Floats print with a decimal point or exponent so they re-read as floats:
/// `1.0`, not `1`.
pub fn format_float(f: f64) -> String {
    format!("{f:?}")
}

fn quote_str(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('"');
}

/// The round-trippable source form of a value, as `toliteral()` returns it.
/// Waifs and anonymous objects have no literal syntax and print as opaque
/// markers, matching the ToastStunt behavior.
pub fn to_literal(v: &Var) -> String {
    let mut out = String::new();
    literal_into(v, &mut out);
    out
}

fn literal_into(v: &Var, out: &mut String) {
    match v.variant() {
        Variant::None => out.push_str("0"),
        Variant::Int(i) => out.push_str(&i.to_string()),
        Variant::Float(f) => out.push_str(&format_float(*f)),
        Variant::Str(s) => quote_str(s.as_str(), out),
        Variant::Obj(o) => out.push_str(&o.to_string()),
        Variant::Err(e) => out.push_str(e.name()),
        Variant::List(l) => {
            out.push('{');
            for (i, e) in l.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                literal_into(e, out);
            }
            out.push('}');
        }
        Variant::Map(m) => {
            out.push('[');
            for (i, (k, val)) in m.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                literal_into(&k, out);
                out.push_str(" -> ");
                literal_into(&val, out);
            }
            out.push(']');
        }
        Variant::Waif(w) => out.push_str(&format!("{{waif {}}}", w.class)),
        Variant::Anon(_) => out.push_str("*anonymous*"),
    }
}

/// The display form of one value, as one argument of `tostr()` renders:
/// containers collapse to `{list}`/`[map]`, strings are bare.
pub fn to_display(v: &Var) -> String {
    match v.variant() {
        Variant::None => "".to_string(),
        Variant::Int(i) => i.to_string(),
        Variant::Float(f) => format_float(*f),
        Variant::Str(s) => s.as_str().to_string(),
        Variant::Obj(o) => o.to_string(),
        Variant::Err(e) => e.name().to_string(),
        Variant::List(_) => "{list}".to_string(),
        Variant::Map(_) => "[map]".to_string(),
        Variant::Waif(_) => "{waif}".to_string(),
        Variant::Anon(_) => "*anonymous*".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{v_err, v_float, v_int, v_list, v_map, v_obj, v_str, Error};

    #[test]
    fn literal_forms() {
        assert_eq!(to_literal(&v_int(42)), "42");
        assert_eq!(to_literal(&v_float(1.0)), "1.0");
        assert_eq!(to_literal(&v_float(1.5)), "1.5");
        assert_eq!(to_literal(&v_obj(-1)), "#-1");
        assert_eq!(to_literal(&v_err(Error::E_PERM)), "E_PERM");
        assert_eq!(to_literal(&v_str("a\"b\\c")), r#""a\"b\\c""#);
        assert_eq!(
            to_literal(&v_list(&[v_int(1), v_str("x")])),
            r#"{1, "x"}"#
        );
        assert_eq!(
            to_literal(&v_map(&[(v_int(1), v_str("a")), (v_str("k"), v_int(2))])),
            r#"[1 -> "a", "k" -> 2]"#
        );
    }

    #[test]
    fn display_forms() {
        assert_eq!(to_display(&v_str("plain")), "plain");
        assert_eq!(to_display(&v_list(&[v_int(1)])), "{list}");
        assert_eq!(to_display(&v_map(&[])), "[map]");
        assert_eq!(to_display(&v_float(2.0)), "2.0");
    }
}
