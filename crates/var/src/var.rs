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
use std::hash::Hash;

use crate::list::List;
use crate::map::Map;
use crate::string::Str;
use crate::variant::Variant;
use crate::waif::Waif;
use crate::Error::{E_RANGE, E_TYPE};
use crate::{Error, Objid, VarType};

/// A MOO value: a cheaply clonable tagged sum. All values are immutable;
/// "mutation" of containers produces new values.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Var(Variant);

impl Var {
    pub fn from_variant(variant: Variant) -> Self {
        Var(variant)
    }

    pub fn variant(&self) -> &Variant {
        &self.0
    }

    pub fn take_variant(self) -> Variant {
        self.0
    }

    pub fn type_code(&self) -> VarType {
        match self.variant() {
            Variant::None => VarType::TYPE_NONE,
            Variant::Int(_) => VarType::TYPE_INT,
            Variant::Float(_) => VarType::TYPE_FLOAT,
            Variant::Str(_) => VarType::TYPE_STR,
            Variant::Obj(_) => VarType::TYPE_OBJ,
            Variant::Err(_) => VarType::TYPE_ERR,
            Variant::List(_) => VarType::TYPE_LIST,
            Variant::Map(_) => VarType::TYPE_MAP,
            Variant::Waif(_) => VarType::TYPE_WAIF,
            Variant::Anon(_) => VarType::TYPE_ANON,
        }
    }

    pub fn is_true(&self) -> bool {
        match self.variant() {
            Variant::None => false,
            Variant::Int(i) => *i != 0,
            Variant::Float(f) => *f != 0.0,
            Variant::Str(s) => !s.is_empty(),
            Variant::Obj(_) => false,
            Variant::Err(_) => false,
            Variant::List(l) => !l.is_empty(),
            Variant::Map(m) => !m.is_empty(),
            Variant::Waif(_) => false,
            Variant::Anon(_) => false,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self.variant(),
            Variant::Int(_) | Variant::Float(_) | Variant::Str(_) | Variant::Obj(_)
                | Variant::Err(_)
        )
    }

    /// Deep equality with case-sensitive string comparison; the `equal()`
    /// builtin, and literal pooling in the compiler.
    pub fn eq_case_sensitive(&self, other: &Self) -> bool {
        match (self.variant(), other.variant()) {
            (Variant::Str(a), Variant::Str(b)) => a.eq_case_sensitive(b),
            (Variant::List(a), Variant::List(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(x, y)| x.eq_case_sensitive(y))
            }
            (Variant::Map(a), Variant::Map(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|((ka, va), (kb, vb))| {
                        ka.eq_case_sensitive(&kb) && va.eq_case_sensitive(&vb)
                    })
            }
            (a, b) => a == b,
        }
    }

    /// The `length()` result: unit count for strings (binary `~XX` triples
    /// count once), element count for lists, pair count for maps.
    pub fn len(&self) -> Result<usize, Error> {
        match self.variant() {
            Variant::Str(s) => Ok(s.moo_len()),
            Variant::List(l) => Ok(l.len()),
            Variant::Map(m) => Ok(m.len()),
            _ => Err(E_TYPE),
        }
    }

    /// Indexable (1-based) extent: characters for strings, elements for
    /// lists. This is what `$` resolves to inside an index expression.
    pub fn index_len(&self) -> Result<usize, Error> {
        match self.variant() {
            Variant::Str(s) => Ok(s.as_str().chars().count()),
            Variant::List(l) => Ok(l.len()),
            Variant::Map(m) => Ok(m.len()),
            _ => Err(E_TYPE),
        }
    }

    /// `container[index]` with the language's 1-based convention.
    pub fn index(&self, index: &Var) -> Result<Var, Error> {
        match self.variant() {
            Variant::List(l) => {
                let i = one_based(index)?;
                match l.get(i - 1) {
                    Some(v) => Ok(v.clone()),
                    None => Err(E_RANGE),
                }
            }
            Variant::Str(s) => {
                let i = one_based(index)?;
                match s.as_str().chars().nth(i - 1) {
                    Some(c) => Ok(v_string(c.to_string())),
                    None => Err(E_RANGE),
                }
            }
            Variant::Map(m) => m.get(index),
            _ => Err(E_TYPE),
        }
    }

    /// `container[index] = value`, producing the updated container.
    pub fn index_set(&self, index: &Var, value: &Var) -> Result<Var, Error> {
        match self.variant() {
            Variant::List(l) => {
                let i = one_based(index)?;
                Ok(Var::from_variant(Variant::List(l.set(i - 1, value.clone())?)))
            }
            Variant::Str(s) => {
                let i = one_based(index)?;
                let Variant::Str(r) = value.variant() else {
                    return Err(E_TYPE);
                };
                if r.as_str().chars().count() != 1 {
                    return Err(E_RANGE);
                }
                let chars: Vec<char> = s.as_str().chars().collect();
                if i > chars.len() {
                    return Err(E_RANGE);
                }
                let mut out = String::with_capacity(s.len());
                for (n, c) in chars.iter().enumerate() {
                    if n == i - 1 {
                        out.push_str(r.as_str());
                    } else {
                        out.push(*c);
                    }
                }
                Ok(v_string(out))
            }
            Variant::Map(m) => Ok(Var::from_variant(Variant::Map(m.insert(index, value)?))),
            _ => Err(E_TYPE),
        }
    }

    /// `container[from..to]`, inclusive 1-based; `to < from` is empty.
    pub fn range(&self, from: &Var, to: &Var) -> Result<Var, Error> {
        let (from, to) = (signed_index(from)?, signed_index(to)?);
        match self.variant() {
            Variant::List(l) => Ok(Var::from_variant(Variant::List(l.range(from - 1, to - 1)?))),
            Variant::Str(s) => {
                if to < from {
                    return Ok(v_empty_str());
                }
                let chars: Vec<char> = s.as_str().chars().collect();
                if from < 1 || to as usize > chars.len() {
                    return Err(E_RANGE);
                }
                Ok(v_string(
                    chars[(from - 1) as usize..=(to - 1) as usize]
                        .iter()
                        .collect(),
                ))
            }
            _ => Err(E_TYPE),
        }
    }

    /// `container[from..to] = value`, producing the updated container.
    pub fn range_set(&self, from: &Var, to: &Var, value: &Var) -> Result<Var, Error> {
        let (from, to) = (signed_index(from)?, signed_index(to)?);
        match (self.variant(), value.variant()) {
            (Variant::List(l), Variant::List(with)) => Ok(Var::from_variant(Variant::List(
                l.range_set(from - 1, to - 1, with)?,
            ))),
            (Variant::Str(s), Variant::Str(with)) => {
                let chars: Vec<char> = s.as_str().chars().collect();
                let len = chars.len() as isize;
                if from < 1 || from > len + 1 || to > len || to < from - 1 {
                    return Err(E_RANGE);
                }
                let mut out = String::with_capacity(s.len() + with.len());
                out.extend(&chars[..(from - 1) as usize]);
                out.push_str(with.as_str());
                out.extend(&chars[((to + 1) - 1) as usize..]);
                Ok(v_string(out))
            }
            (Variant::List(_), _) | (Variant::Str(_), _) => Err(E_TYPE),
            _ => Err(E_TYPE),
        }
    }

    /// The byte size `value_bytes()` reports and the size quotas measure.
    /// Pure and monotonic in substructure size; scalars count their boxed
    /// representation, containers add their elements.
    pub fn size_bytes(&self) -> usize {
        const VALUE_OVERHEAD: usize = 16;
        match self.variant() {
            Variant::None
            | Variant::Int(_)
            | Variant::Float(_)
            | Variant::Obj(_)
            | Variant::Err(_)
            | Variant::Anon(_) => VALUE_OVERHEAD,
            Variant::Str(s) => VALUE_OVERHEAD + s.len(),
            Variant::Waif(_) => VALUE_OVERHEAD * 2,
            Variant::List(l) => {
                VALUE_OVERHEAD + l.iter().map(|v| v.size_bytes()).sum::<usize>()
            }
            Variant::Map(m) => {
                VALUE_OVERHEAD
                    + m.iter()
                        .map(|(k, v)| k.size_bytes() + v.size_bytes())
                        .sum::<usize>()
            }
        }
    }

    /// The `in` operator: 1-based position of `self` in the list, or 0.
    pub fn index_in(&self, container: &Var) -> Result<Var, Error> {
        match container.variant() {
            Variant::List(l) => Ok(v_int(
                l.index_of(self, false).map(|i| i as i64 + 1).unwrap_or(0),
            )),
            _ => Err(E_TYPE),
        }
    }
}

fn one_based(index: &Var) -> Result<usize, Error> {
    let Variant::Int(i) = index.variant() else {
        return Err(E_TYPE);
    };
    if *i < 1 {
        return Err(E_RANGE);
    }
    Ok(*i as usize)
}

fn signed_index(index: &Var) -> Result<isize, Error> {
    let Variant::Int(i) = index.variant() else {
        return Err(E_TYPE);
    };
    Ok(*i as isize)
}

impl Debug for Var {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.variant())
    }
}

pub fn v_none() -> Var {
    Var(Variant::None)
}

pub fn v_int(i: i64) -> Var {
    Var(Variant::Int(i))
}

/// MOO has no boolean type; truth is the integers 1 and 0.
pub fn v_bool(b: bool) -> Var {
    v_int(if b { 1 } else { 0 })
}

pub fn v_float(f: f64) -> Var {
    Var(Variant::Float(f))
}

pub fn v_str(s: &str) -> Var {
    Var(Variant::Str(Str::mk(s)))
}

pub fn v_string(s: String) -> Var {
    Var(Variant::Str(Str::mk_string(s)))
}

pub fn v_empty_str() -> Var {
    v_str("")
}

pub fn v_obj(id: i64) -> Var {
    Var(Variant::Obj(Objid(id)))
}

pub fn v_objid(o: Objid) -> Var {
    Var(Variant::Obj(o))
}

pub fn v_err(e: Error) -> Var {
    Var(Variant::Err(e))
}

pub fn v_list(values: &[Var]) -> Var {
    Var(Variant::List(List::mk(values)))
}

pub fn v_list_iter<I: IntoIterator<Item = Var>>(values: I) -> Var {
    Var(Variant::List(values.into_iter().collect()))
}

pub fn v_empty_list() -> Var {
    Var(Variant::List(List::empty()))
}

/// Build a map from pairs. Panics on non-scalar keys; runtime-constructed
/// maps go through `Map::insert`, which reports the error instead.
pub fn v_map(pairs: &[(Var, Var)]) -> Var {
    let m = Map::build(pairs.iter()).expect("map keys must be scalar");
    Var(Variant::Map(m))
}

pub fn v_empty_map() -> Var {
    Var(Variant::Map(Map::empty()))
}

pub fn v_waif(class: Objid, owner: Objid) -> Var {
    Var(Variant::Waif(Box::new(Waif::new(class, owner))))
}

pub fn v_anon(id: Objid) -> Var {
    Var(Variant::Anon(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::v_map;

    #[test]
    fn equality_is_type_strict_and_case_folding() {
        assert_eq!(v_int(1), v_int(1));
        assert_ne!(v_int(1), v_float(1.0));
        assert_eq!(v_str("Foo"), v_str("foo"));
        assert!(!v_str("Foo").eq_case_sensitive(&v_str("foo")));
        assert_eq!(
            v_list(&[v_str("A"), v_int(2)]),
            v_list(&[v_str("a"), v_int(2)])
        );
    }

    #[test]
    fn one_based_indexing() {
        let l = v_list(&[v_int(10), v_int(20)]);
        assert_eq!(l.index(&v_int(1)).unwrap(), v_int(10));
        assert_eq!(l.index(&v_int(0)).unwrap_err(), E_RANGE);
        assert_eq!(l.index(&v_int(3)).unwrap_err(), E_RANGE);
        assert_eq!(l.index(&v_str("x")).unwrap_err(), E_TYPE);

        let s = v_str("abc");
        assert_eq!(s.index(&v_int(1)).unwrap(), v_str("a"));
        assert_eq!(s.range(&v_int(2), &v_int(3)).unwrap(), v_str("bc"));
        assert_eq!(s.range(&v_int(3), &v_int(2)).unwrap(), v_str(""));
    }

    #[test]
    fn string_index_set_single_char() {
        let s = v_str("abc");
        assert_eq!(s.index_set(&v_int(2), &v_str("X")).unwrap(), v_str("aXc"));
        assert_eq!(s.index_set(&v_int(2), &v_str("XY")).unwrap_err(), E_RANGE);
    }

    #[test]
    fn map_index() {
        let m = v_map(&[(v_str("k"), v_int(1))]);
        assert_eq!(m.index(&v_str("K")).unwrap(), v_int(1));
        assert_eq!(m.index(&v_str("nope")).unwrap_err(), E_RANGE);
        assert_eq!(m.index(&v_list(&[])).unwrap_err(), E_TYPE);
    }

    #[test]
    fn in_operator() {
        let l = v_list(&[v_str("a"), v_str("b")]);
        assert_eq!(v_str("B").index_in(&l).unwrap(), v_int(2));
        assert_eq!(v_str("c").index_in(&l).unwrap(), v_int(0));
    }
}
