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

use std::cmp::Ordering;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};

use crate::list::List;
use crate::map::Map;
use crate::string::Str;
use crate::waif::Waif;
use crate::{Error, Objid};

/// Our series of types. `Anon` carries the store-internal identity of an
/// anonymous object; only the store can mint or resolve one.
#[derive(Clone)]
pub enum Variant {
    None,
    Int(i64),
    Float(f64),
    Str(Str),
    Obj(Objid),
    Err(Error),
    List(List),
    Map(Map),
    Waif(Box<Waif>),
    Anon(Objid),
}

impl Variant {
    /// Rank used for cross-type ordering. The scalar prefix (Int < Float <
    /// Obj < Err < Str) is the canonical map-key order; the container ranks
    /// only matter for total-order contexts like map values.
    fn rank(&self) -> u8 {
        match self {
            Variant::None => 0,
            Variant::Int(_) => 1,
            Variant::Float(_) => 2,
            Variant::Obj(_) => 3,
            Variant::Err(_) => 4,
            Variant::Str(_) => 5,
            Variant::List(_) => 6,
            Variant::Map(_) => 7,
            Variant::Waif(_) => 8,
            Variant::Anon(_) => 9,
        }
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Variant::None, Variant::None) => true,
            (Variant::Int(l), Variant::Int(r)) => l == r,
            (Variant::Float(l), Variant::Float(r)) => l == r,
            (Variant::Str(l), Variant::Str(r)) => l == r,
            (Variant::Obj(l), Variant::Obj(r)) => l == r,
            (Variant::Err(l), Variant::Err(r)) => l == r,
            (Variant::List(l), Variant::List(r)) => l == r,
            (Variant::Map(l), Variant::Map(r)) => l == r,
            (Variant::Waif(l), Variant::Waif(r)) => l == r,
            (Variant::Anon(l), Variant::Anon(r)) => l == r,
            _ => false,
        }
    }
}

impl Eq for Variant {}

impl Ord for Variant {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Variant::None, Variant::None) => Ordering::Equal,
            (Variant::Int(l), Variant::Int(r)) => l.cmp(r),
            (Variant::Float(l), Variant::Float(r)) => l.total_cmp(r),
            (Variant::Str(l), Variant::Str(r)) => l.cmp(r),
            (Variant::Obj(l), Variant::Obj(r)) => l.cmp(r),
            (Variant::Err(l), Variant::Err(r)) => l.cmp(r),
            (Variant::List(l), Variant::List(r)) => l.cmp(r),
            (Variant::Map(l), Variant::Map(r)) => l.cmp(r),
            (Variant::Waif(l), Variant::Waif(r)) => l.cmp(r),
            (Variant::Anon(l), Variant::Anon(r)) => l.cmp(r),
            (l, r) => l.rank().cmp(&r.rank()),
        }
    }
}

impl PartialOrd for Variant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for Variant {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Variant::None => {}
            Variant::Int(i) => i.hash(state),
            Variant::Float(f) => f.to_bits().hash(state),
            Variant::Str(s) => s.hash(state),
            Variant::Obj(o) => o.hash(state),
            Variant::Err(e) => e.hash(state),
            Variant::List(l) => l.hash(state),
            Variant::Map(m) => m.hash(state),
            Variant::Waif(w) => w.hash(state),
            Variant::Anon(a) => a.hash(state),
        }
    }
}

impl Debug for Variant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Variant::None => write!(f, "None"),
            Variant::Int(i) => write!(f, "Integer({i})"),
            Variant::Float(fl) => write!(f, "Float({fl})"),
            Variant::Str(s) => write!(f, "String({:?})", s.as_str()),
            Variant::Obj(o) => write!(f, "Object({o})"),
            Variant::Err(e) => write!(f, "Error({e})"),
            Variant::List(l) => {
                let items: Vec<_> = l.iter().collect();
                write!(f, "List([size = {}, items = {items:?}])", l.len())
            }
            Variant::Map(m) => {
                let items: Vec<_> = m.iter().collect();
                write!(f, "Map([size = {}, items = {items:?}])", m.len())
            }
            Variant::Waif(w) => write!(f, "Waif(class = {}, owner = {})", w.class, w.owner),
            Variant::Anon(a) => write!(f, "Anonymous({})", a.0),
        }
    }
}
