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

use std::sync::Arc;

use grange_compiler::Program;
use grange_var::{Objid, Var, NOTHING};

use crate::bitenum::BitEnum;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ObjFlag {
    User = 0,
    Programmer = 1,
    Wizard = 2,
    Read = 3,
    Write = 4,
    Fertile = 5,
    Anonymous = 6,
    Invalid = 7,
}

impl From<ObjFlag> for u8 {
    fn from(f: ObjFlag) -> u8 {
        f as u8
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum PropFlag {
    Read = 0,
    Write = 1,
    Chown = 2,
}

impl From<PropFlag> for u8 {
    fn from(f: PropFlag) -> u8 {
        f as u8
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum VerbFlag {
    Read = 0,
    Write = 1,
    Exec = 2,
    Debug = 3,
}

impl From<VerbFlag> for u8 {
    fn from(f: VerbFlag) -> u8 {
        f as u8
    }
}

impl VerbFlag {
    /// The default flag set for programmatically added verbs.
    pub fn rxd() -> BitEnum<VerbFlag> {
        BitEnum::new_with(VerbFlag::Read) | VerbFlag::Exec | VerbFlag::Debug
    }
}

/// Parse "rwc"-style permission strings. Unknown letters are the caller's
/// E_INVARG.
pub fn parse_prop_perms(s: &str) -> Option<BitEnum<PropFlag>> {
    let mut perms = BitEnum::new();
    for c in s.chars() {
        match c.to_ascii_lowercase() {
            'r' => perms.set(PropFlag::Read),
            'w' => perms.set(PropFlag::Write),
            'c' => perms.set(PropFlag::Chown),
            _ => return None,
        }
    }
    Some(perms)
}

pub fn prop_perms_string(perms: BitEnum<PropFlag>) -> String {
    let mut s = String::new();
    if perms.contains(PropFlag::Read) {
        s.push('r');
    }
    if perms.contains(PropFlag::Write) {
        s.push('w');
    }
    if perms.contains(PropFlag::Chown) {
        s.push('c');
    }
    s
}

pub fn parse_verb_perms(s: &str) -> Option<BitEnum<VerbFlag>> {
    let mut perms = BitEnum::new();
    for c in s.chars() {
        match c.to_ascii_lowercase() {
            'r' => perms.set(VerbFlag::Read),
            'w' => perms.set(VerbFlag::Write),
            'x' => perms.set(VerbFlag::Exec),
            'd' => perms.set(VerbFlag::Debug),
            _ => return None,
        }
    }
    Some(perms)
}

pub fn verb_perms_string(perms: BitEnum<VerbFlag>) -> String {
    let mut s = String::new();
    if perms.contains(VerbFlag::Read) {
        s.push('r');
    }
    if perms.contains(VerbFlag::Write) {
        s.push('w');
    }
    if perms.contains(VerbFlag::Exec) {
        s.push('x');
    }
    if perms.contains(VerbFlag::Debug) {
        s.push('d');
    }
    s
}

/// The `this`/`that` argument specifier of a verb.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ArgSpec {
    None,
    Any,
    This,
}

impl ArgSpec {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Some(ArgSpec::None),
            "any" => Some(ArgSpec::Any),
            "this" => Some(ArgSpec::This),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ArgSpec::None => "none",
            ArgSpec::Any => "any",
            ArgSpec::This => "this",
        }
    }
}

/// A verb's argument specification. The preposition is stored as written
/// ("none", "any", or a literal preposition); command parsing lives in the
/// host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VerbArgsSpec {
    pub dobj: ArgSpec,
    pub prep: String,
    pub iobj: ArgSpec,
}

impl VerbArgsSpec {
    pub fn this_none_this() -> Self {
        VerbArgsSpec {
            dobj: ArgSpec::This,
            prep: "none".to_string(),
            iobj: ArgSpec::This,
        }
    }
}

/// A property slot on one object. A `defined` slot is the one the
/// introducing object carries; descendants carry non-defined slots that are
/// `clear` until written.
#[derive(Clone, Debug)]
pub struct Property {
    pub name: String,
    pub value: Var,
    pub owner: Objid,
    pub perms: BitEnum<PropFlag>,
    pub defined: bool,
    pub clear: bool,
}

/// A verb: aliases, ownership, permission bits, argument spec, and both the
/// stored source and the compiled program.
#[derive(Clone, Debug)]
pub struct Verb {
    pub names: Vec<String>,
    pub owner: Objid,
    pub perms: BitEnum<VerbFlag>,
    pub args: VerbArgsSpec,
    pub source: Vec<String>,
    pub program: Arc<Program>,
}

impl Verb {
    /// True when `candidate` matches any of this verb's aliases.
    pub fn matches_name(&self, candidate: &str) -> bool {
        self.names.iter().any(|n| verbname_matches(n, candidate))
    }

    pub fn names_string(&self) -> String {
        self.names.join(" ")
    }
}

/// Alias matching with `*` wildcards: `foo*bar` matches any extension of
/// "foo" along "bar" ("foo", "foob", .., "foobar"); a trailing `*` matches
/// any completion; a bare `*` matches anything.
pub fn verbname_matches(alias: &str, candidate: &str) -> bool {
    let alias = alias.to_ascii_lowercase();
    let candidate = candidate.to_ascii_lowercase();
    match alias.find('*') {
        None => alias == candidate,
        Some(star) => {
            let prefix = &alias[..star];
            let rest = &alias[star + 1..];
            let Some(remainder) = candidate.strip_prefix(prefix) else {
                return false;
            };
            if rest.is_empty() {
                // Trailing star: any completion of the prefix.
                true
            } else {
                rest.starts_with(remainder)
            }
        }
    }
}

/// One object in the store. `anonymous` marks an anonymous instance; the
/// `Anonymous` *flag* is the permission bit allowing anonymous children to
/// be created from this object.
#[derive(Clone, Debug)]
pub struct Object {
    pub id: Objid,
    pub anonymous: bool,
    pub name: String,
    pub flags: BitEnum<ObjFlag>,
    pub owner: Objid,
    pub location: Objid,
    pub contents: Vec<Objid>,
    pub parents: Vec<Objid>,
    pub children: Vec<Objid>,
    /// Anonymous descendants hang off this side list instead of `children`,
    /// so they stay out of `children()` listings but can still be
    /// invalidated when this object's schema changes.
    pub anonymous_children: Vec<Objid>,
    pub properties: Vec<Property>,
    pub verbs: Vec<Verb>,
}

impl Object {
    pub fn new(id: Objid, owner: Objid) -> Self {
        Object {
            id,
            anonymous: false,
            name: String::new(),
            flags: BitEnum::new(),
            owner,
            location: NOTHING,
            contents: vec![],
            parents: vec![],
            children: vec![],
            anonymous_children: vec![],
            properties: vec![],
            verbs: vec![],
        }
    }

    pub fn find_property(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn find_property_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// First verb matching `name`, with its insertion index.
    pub fn find_verb(&self, name: &str) -> Option<(usize, &Verb)> {
        self.verbs
            .iter()
            .enumerate()
            .find(|(_, v)| v.matches_name(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbname_wildcards() {
        assert!(verbname_matches("look", "look"));
        assert!(verbname_matches("look", "LOOK"));
        assert!(!verbname_matches("look", "loo"));
        assert!(verbname_matches("l*ook", "l"));
        assert!(verbname_matches("l*ook", "loo"));
        assert!(verbname_matches("l*ook", "look"));
        assert!(!verbname_matches("l*ook", "looks"));
        assert!(verbname_matches("foo*", "foo"));
        assert!(verbname_matches("foo*", "foobar"));
        assert!(!verbname_matches("foo*", "fo"));
        assert!(verbname_matches("*", "anything"));
    }

    #[test]
    fn perm_strings_round_trip() {
        let p = parse_prop_perms("rc").unwrap();
        assert_eq!(prop_perms_string(p), "rc");
        assert!(parse_prop_perms("rx").is_none());
        let v = parse_verb_perms("rxd").unwrap();
        assert_eq!(verb_perms_string(v), "rxd");
    }
}
