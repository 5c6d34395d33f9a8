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

use base64::Engine;
use hmac::{Hmac, Mac};
use md5::Digest;
use rand::Rng;
use sha2::{Sha256, Sha512};

use grange_compiler::offset_for_builtin;
use grange_var::binary;
use grange_var::Error::{E_INVARG, E_PERM, E_QUOTA, E_TYPE};
use grange_var::{v_bool, v_int, v_list, v_str, v_string, Var, Variant};

use crate::builtins::BfRet::Ret;
use crate::builtins::{BfCallState, BfErr, BfRet, BuiltinFunction};

fn str_arg<'a>(bf_args: &'a BfCallState<'_, '_>, n: usize) -> Result<&'a str, BfErr> {
    match bf_args.args.get(n).map(|v| v.variant()) {
        Some(Variant::Str(s)) => Ok(s.as_str()),
        Some(_) => Err(BfErr::Code(E_TYPE)),
        None => Err(BfErr::Code(grange_var::Error::E_ARGS)),
    }
}

fn case_flag(bf_args: &BfCallState<'_, '_>, n: usize) -> bool {
    bf_args.args.get(n).map(|v| v.is_true()).unwrap_or(false)
}

fn check_concat_quota(bf_args: &BfCallState<'_, '_>, len: usize) -> Result<(), BfErr> {
    if len > bf_args.ctx.world.options.get().max_string_concat {
        return Err(BfErr::Code(E_QUOTA));
    }
    Ok(())
}

/// `strsub(subject, what, with [, case-matters])`
fn bf_strsub(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let subject = str_arg(bf_args, 0)?;
    let what = str_arg(bf_args, 1)?;
    let with = str_arg(bf_args, 2)?;
    let case_matters = case_flag(bf_args, 3);
    if what.is_empty() {
        return Err(BfErr::Code(E_INVARG));
    }

    let mut result = String::with_capacity(subject.len());
    let mut rest = subject;
    let folded_what = what.to_ascii_lowercase();
    while !rest.is_empty() {
        let found = if case_matters {
            rest.find(what)
        } else {
            rest.to_ascii_lowercase().find(&folded_what)
        };
        match found {
            Some(pos) => {
                result.push_str(&rest[..pos]);
                result.push_str(with);
                rest = &rest[pos + what.len()..];
            }
            None => {
                result.push_str(rest);
                break;
            }
        }
    }
    check_concat_quota(bf_args, result.len())?;
    Ok(Ret(v_string(result)))
}

/// 1-based position of `what` in `subject`, or 0.
fn bf_index(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let subject = str_arg(bf_args, 0)?;
    let what = str_arg(bf_args, 1)?;
    let case_matters = case_flag(bf_args, 2);
    let pos = if case_matters {
        subject.find(what)
    } else {
        subject
            .to_ascii_lowercase()
            .find(&what.to_ascii_lowercase())
    };
    Ok(Ret(v_int(pos.map(|p| p as i64 + 1).unwrap_or(0))))
}

fn bf_rindex(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let subject = str_arg(bf_args, 0)?;
    let what = str_arg(bf_args, 1)?;
    let case_matters = case_flag(bf_args, 2);
    let pos = if case_matters {
        subject.rfind(what)
    } else {
        subject
            .to_ascii_lowercase()
            .rfind(&what.to_ascii_lowercase())
    };
    Ok(Ret(v_int(pos.map(|p| p as i64 + 1).unwrap_or(0))))
}

fn bf_strcmp(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let a = str_arg(bf_args, 0)?;
    let b = str_arg(bf_args, 1)?;
    Ok(Ret(v_int(match a.cmp(b) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    })))
}

/// `strtr(subject, from, to [, case-matters])`: per-character translation.
fn bf_strtr(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let subject = str_arg(bf_args, 0)?;
    let from = str_arg(bf_args, 1)?;
    let to = str_arg(bf_args, 2)?;
    let case_matters = case_flag(bf_args, 3);
    let from_chars: Vec<char> = from.chars().collect();
    let to_chars: Vec<char> = to.chars().collect();

    let translate = |c: char| -> Option<char> {
        let pos = from_chars.iter().position(|fc| {
            if case_matters {
                *fc == c
            } else {
                fc.eq_ignore_ascii_case(&c)
            }
        })?;
        // A `to` shorter than `from` deletes the character.
        Some(*to_chars.get(pos)?)
    };

    let mut out = String::with_capacity(subject.len());
    for c in subject.chars() {
        let pos_in_from = from_chars.iter().any(|fc| {
            if case_matters {
                *fc == c
            } else {
                fc.eq_ignore_ascii_case(&c)
            }
        });
        if pos_in_from {
            if let Some(t) = translate(c) {
                out.push(t);
            }
        } else {
            out.push(c);
        }
    }
    Ok(Ret(v_string(out)))
}

/// `explode(subject [, separator [, include-empty]])`
fn bf_explode(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let subject = str_arg(bf_args, 0)?;
    let sep = if bf_args.args.len() >= 2 {
        str_arg(bf_args, 1)?
    } else {
        " "
    };
    if sep.is_empty() {
        return Err(BfErr::Code(E_INVARG));
    }
    let include_empty = case_flag(bf_args, 2);
    let parts: Vec<Var> = subject
        .split(sep)
        .filter(|p| include_empty || !p.is_empty())
        .map(v_str)
        .collect();
    Ok(Ret(v_list(&parts)))
}

/// Bytes of a value that may be a binary string (for `encode_binary`):
/// strings contribute their characters as bytes, ints a single byte, lists
/// their flattened contents.
fn binary_bytes(v: &Var, out: &mut Vec<u8>) -> Result<(), BfErr> {
    match v.variant() {
        Variant::Str(s) => {
            for c in s.as_str().chars() {
                out.push((c as u32 & 0xff) as u8);
            }
            Ok(())
        }
        Variant::Int(i) => {
            if !(0..=255).contains(i) {
                return Err(BfErr::Code(E_INVARG));
            }
            out.push(*i as u8);
            Ok(())
        }
        Variant::List(l) => {
            for e in l.iter() {
                binary_bytes(e, out)?;
            }
            Ok(())
        }
        _ => Err(BfErr::Code(E_TYPE)),
    }
}

fn bf_encode_binary(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let mut bytes = vec![];
    for arg in &bf_args.args {
        binary_bytes(arg, &mut bytes)?;
    }
    let encoded = binary::encode(&bytes);
    check_concat_quota(bf_args, encoded.len())?;
    Ok(Ret(v_string(encoded)))
}

fn bf_decode_binary(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let subject = str_arg(bf_args, 0)?;
    let bytes = binary::decode(subject).map_err(BfErr::Code)?;
    let fully = case_flag(bf_args, 1);
    if fully {
        // The all-string form: every byte becomes one character.
        let s: String = bytes.iter().map(|b| *b as char).collect();
        return Ok(Ret(v_string(s)));
    }
    // The mixed form: printable runs as strings, other bytes as integers.
    let mut out = vec![];
    let mut run = String::new();
    for b in bytes {
        if (0x20..0x7f).contains(&b) {
            run.push(b as char);
        } else {
            if !run.is_empty() {
                out.push(v_string(std::mem::take(&mut run)));
            }
            out.push(v_int(b as i64));
        }
    }
    if !run.is_empty() {
        out.push(v_string(run));
    }
    Ok(Ret(v_list(&out)))
}

fn bf_random_bytes(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let Variant::Int(n) = bf_args.args[0].variant() else {
        return Err(BfErr::Code(E_TYPE));
    };
    if !(1..=10000).contains(n) {
        return Err(BfErr::Code(E_INVARG));
    }
    let mut bytes = vec![0u8; *n as usize];
    rand::rng().fill(&mut bytes[..]);
    Ok(Ret(v_string(binary::encode(&bytes))))
}

fn bf_encode_base64(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let subject = str_arg(bf_args, 0)?;
    let bytes = binary::decode(subject).map_err(BfErr::Code)?;
    let url_safe = case_flag(bf_args, 1);
    let encoded = if url_safe {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&bytes)
    } else {
        base64::engine::general_purpose::STANDARD.encode(&bytes)
    };
    Ok(Ret(v_string(encoded)))
}

fn bf_decode_base64(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let subject = str_arg(bf_args, 0)?;
    let url_safe = case_flag(bf_args, 1);
    let decoded = if url_safe {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(subject)
    } else {
        base64::engine::general_purpose::STANDARD.decode(subject)
    };
    let bytes = decoded.map_err(|_| BfErr::Code(E_INVARG))?;
    Ok(Ret(v_string(binary::encode(&bytes))))
}

const SALT_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789./";

fn des_salt() -> String {
    let mut rng = rand::rng();
    (0..2)
        .map(|_| SALT_CHARS[rng.random_range(0..SALT_CHARS.len())] as char)
        .collect()
}

fn bf_salt(_bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    Ok(Ret(v_string(des_salt())))
}

/// Uppercase-hex digest of raw bytes with a named algorithm.
pub(crate) fn hash_bytes(algo: &str, bytes: &[u8]) -> Result<String, BfErr> {
    let hex = match algo.to_ascii_lowercase().as_str() {
        "md5" => format!("{:x}", md5::Md5::digest(bytes)),
        "sha1" => format!("{:x}", sha1::Sha1::digest(bytes)),
        "sha256" => format!("{:x}", Sha256::digest(bytes)),
        "sha512" => format!("{:x}", Sha512::digest(bytes)),
        _ => return Err(BfErr::Code(E_INVARG)),
    };
    Ok(hex.to_uppercase())
}

fn hash_arg_algo(bf_args: &BfCallState<'_, '_>, n: usize) -> Result<String, BfErr> {
    match bf_args.args.get(n) {
        None => Ok("sha256".to_string()),
        Some(v) => match v.variant() {
            Variant::Str(s) => Ok(s.as_str().to_string()),
            _ => Err(BfErr::Code(E_TYPE)),
        },
    }
}

fn bf_string_hash(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let subject = str_arg(bf_args, 0)?.to_string();
    let algo = hash_arg_algo(bf_args, 1)?;
    Ok(Ret(v_string(hash_bytes(&algo, subject.as_bytes())?)))
}

/// Like `string_hash`, but the subject is a binary string and its decoded
/// bytes are hashed.
fn bf_binary_hash(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let subject = str_arg(bf_args, 0)?;
    let bytes = binary::decode(subject).map_err(BfErr::Code)?;
    let algo = hash_arg_algo(bf_args, 1)?;
    Ok(Ret(v_string(hash_bytes(&algo, &bytes)?)))
}

fn bf_string_hmac(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let subject = str_arg(bf_args, 0)?.to_string();
    let key = str_arg(bf_args, 1)?.to_string();
    let algo = hash_arg_algo(bf_args, 2)?;
    let binary_subject = case_flag(bf_args, 3);
    let payload = if binary_subject {
        binary::decode(&subject).map_err(BfErr::Code)?
    } else {
        subject.into_bytes()
    };
    let hex = match algo.to_ascii_lowercase().as_str() {
        "sha1" => {
            let mut mac = Hmac::<sha1::Sha1>::new_from_slice(key.as_bytes())
                .map_err(|_| BfErr::Code(E_INVARG))?;
            mac.update(&payload);
            format!("{:x}", mac.finalize().into_bytes())
        }
        "sha256" => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes())
                .map_err(|_| BfErr::Code(E_INVARG))?;
            mac.update(&payload);
            format!("{:x}", mac.finalize().into_bytes())
        }
        _ => return Err(BfErr::Code(E_INVARG)),
    };
    Ok(Ret(v_string(hex.to_uppercase())))
}

/// `crypt(text [, salt])`: algorithm detected from the salt prefix.
/// Non-wizards are held to cost-5 bcrypt and stock rounds on the SHA
/// flavors.
fn bf_crypt(bf_args: &mut BfCallState<'_, '_>) -> Result<BfRet, BfErr> {
    let text = str_arg(bf_args, 0)?.to_string();
    let salt = if bf_args.args.len() >= 2 {
        str_arg(bf_args, 1)?.to_string()
    } else {
        des_salt()
    };

    if !bf_args.is_wizard() {
        if salt.starts_with("$2") {
            // $2a$NN$... — only the stock cost is allowed.
            let cost_ok = salt
                .split('$')
                .nth(2)
                .map(|c| c == "05")
                .unwrap_or(false);
            if !cost_ok {
                return Err(BfErr::Code(E_PERM));
            }
        }
        if (salt.starts_with("$5$") || salt.starts_with("$6$")) && salt.contains("rounds=") {
            return Err(BfErr::Code(E_PERM));
        }
    }

    match pwhash::unix::crypt(text.as_str(), salt.as_str()) {
        Ok(hash) => Ok(Ret(v_string(hash))),
        Err(_) => Err(BfErr::Code(E_INVARG)),
    }
}

pub(crate) fn register_bf_strings(builtins: &mut [BuiltinFunction]) {
    builtins[offset_for_builtin("strsub")] = bf_strsub;
    builtins[offset_for_builtin("index")] = bf_index;
    builtins[offset_for_builtin("rindex")] = bf_rindex;
    builtins[offset_for_builtin("strcmp")] = bf_strcmp;
    builtins[offset_for_builtin("strtr")] = bf_strtr;
    builtins[offset_for_builtin("explode")] = bf_explode;
    builtins[offset_for_builtin("decode_binary")] = bf_decode_binary;
    builtins[offset_for_builtin("encode_binary")] = bf_encode_binary;
    builtins[offset_for_builtin("random_bytes")] = bf_random_bytes;
    builtins[offset_for_builtin("encode_base64")] = bf_encode_base64;
    builtins[offset_for_builtin("decode_base64")] = bf_decode_base64;
    builtins[offset_for_builtin("salt")] = bf_salt;
    builtins[offset_for_builtin("string_hash")] = bf_string_hash;
    builtins[offset_for_builtin("binary_hash")] = bf_binary_hash;
    builtins[offset_for_builtin("string_hmac")] = bf_string_hmac;
    builtins[offset_for_builtin("crypt")] = bf_crypt;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_bytes_is_uppercase_hex() {
        // SHA-1 of the two bytes 00 01, the binary-string decode check.
        assert_eq!(
            hash_bytes("sha1", &[0u8, 1u8]).unwrap(),
            "1CDD5C10CD5D559BE35B70155F9D94ACA1F35A1F"
        );
    }
}
