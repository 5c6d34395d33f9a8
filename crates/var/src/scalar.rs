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

//! Arithmetic and ordering over `Var`. Ints widen to floats in mixed
//! expressions; float results must come out finite or the operation raises
//! `E_FLOAT`; division and modulus by zero are `E_DIV` for both numeric
//! kinds.

use std::cmp::Ordering;

use crate::var::{v_float, v_int, v_string, Var};
use crate::variant::Variant;
use crate::Error;
use crate::Error::{E_DIV, E_FLOAT, E_INVARG, E_TYPE};

fn finite(f: f64) -> Result<Var, Error> {
    if f.is_finite() {
        Ok(v_float(f))
    } else {
        Err(E_FLOAT)
    }
}

macro_rules! numeric_binop {
    ( $name:ident, $int_op:ident, $float_op:tt ) => {
        pub fn $name(&self, other: &Var) -> Result<Var, Error> {
            match (self.variant(), other.variant()) {
                (Variant::Int(l), Variant::Int(r)) => Ok(v_int(l.$int_op(*r))),
                (Variant::Float(l), Variant::Float(r)) => finite(l $float_op r),
                (Variant::Int(l), Variant::Float(r)) => finite(*l as f64 $float_op r),
                (Variant::Float(l), Variant::Int(r)) => finite(l $float_op *r as f64),
                (_, _) => Err(E_TYPE),
            }
        }
    };
}

impl Var {
    /// `+` also concatenates strings. The string-size quota is enforced by
    /// the evaluator, which knows the loaded server options.
    pub fn add(&self, other: &Var) -> Result<Var, Error> {
        match (self.variant(), other.variant()) {
            (Variant::Str(l), Variant::Str(r)) => {
                let mut s = String::with_capacity(l.len() + r.len());
                s.push_str(l.as_str());
                s.push_str(r.as_str());
                Ok(v_string(s))
            }
            (Variant::Int(l), Variant::Int(r)) => Ok(v_int(l.wrapping_add(*r))),
            (Variant::Float(l), Variant::Float(r)) => finite(l + r),
            (Variant::Int(l), Variant::Float(r)) => finite(*l as f64 + r),
            (Variant::Float(l), Variant::Int(r)) => finite(l + *r as f64),
            (_, _) => Err(E_TYPE),
        }
    }

    numeric_binop!(sub, wrapping_sub, -);
    numeric_binop!(mul, wrapping_mul, *);

    pub fn div(&self, other: &Var) -> Result<Var, Error> {
        match (self.variant(), other.variant()) {
            (_, Variant::Int(0)) => Err(E_DIV),
            (_, Variant::Float(r)) if *r == 0.0 => Err(E_DIV),
            (Variant::Int(l), Variant::Int(r)) => {
                // i64::MIN / -1 overflows; match the C server's wrap.
                Ok(v_int(l.wrapping_div(*r)))
            }
            (Variant::Float(l), Variant::Float(r)) => finite(l / r),
            (Variant::Int(l), Variant::Float(r)) => finite(*l as f64 / r),
            (Variant::Float(l), Variant::Int(r)) => finite(l / *r as f64),
            (_, _) => Err(E_TYPE),
        }
    }

    pub fn modulus(&self, other: &Var) -> Result<Var, Error> {
        match (self.variant(), other.variant()) {
            (_, Variant::Int(0)) => Err(E_DIV),
            (_, Variant::Float(r)) if *r == 0.0 => Err(E_DIV),
            (Variant::Int(l), Variant::Int(r)) => Ok(v_int(l.wrapping_rem(*r))),
            (Variant::Float(l), Variant::Float(r)) => finite(l % r),
            (Variant::Int(l), Variant::Float(r)) => finite(*l as f64 % r),
            (Variant::Float(l), Variant::Int(r)) => finite(l % *r as f64),
            (_, _) => Err(E_TYPE),
        }
    }

    pub fn pow(&self, other: &Var) -> Result<Var, Error> {
        match (self.variant(), other.variant()) {
            (Variant::Int(l), Variant::Int(r)) => {
                if *r < 0 {
                    // Integer to a negative power: only +/-1 survive.
                    return match *l {
                        1 => Ok(v_int(1)),
                        -1 => Ok(v_int(if r % 2 == 0 { 1 } else { -1 })),
                        0 => Err(E_DIV),
                        _ => Ok(v_int(0)),
                    };
                }
                let r = u32::try_from(*r).map_err(|_| E_INVARG)?;
                Ok(v_int(l.wrapping_pow(r)))
            }
            (Variant::Float(l), Variant::Float(r)) => finite(l.powf(*r)),
            (Variant::Int(l), Variant::Float(r)) => finite((*l as f64).powf(*r)),
            (Variant::Float(l), Variant::Int(r)) => finite(l.powf(*r as f64)),
            (_, _) => Err(E_TYPE),
        }
    }

    pub fn negative(&self) -> Result<Var, Error> {
        match self.variant() {
            Variant::Int(i) => Ok(v_int(i.wrapping_neg())),
            Variant::Float(f) => Ok(v_float(-f)),
            _ => Err(E_TYPE),
        }
    }

    /// The ordering used by `<`/`<=`/`>`/`>=`, `min`/`max` and `sort`:
    /// numerics compare by value across Int/Float; otherwise both sides
    /// must be the same type.
    pub fn cmp_moo(&self, other: &Var) -> Result<Ordering, Error> {
        match (self.variant(), other.variant()) {
            (Variant::Int(l), Variant::Int(r)) => Ok(l.cmp(r)),
            (Variant::Float(l), Variant::Float(r)) => Ok(l.total_cmp(r)),
            (Variant::Int(l), Variant::Float(r)) => Ok((*l as f64).total_cmp(r)),
            (Variant::Float(l), Variant::Int(r)) => Ok(l.total_cmp(&(*r as f64))),
            (Variant::Str(l), Variant::Str(r)) => Ok(l.cmp(r)),
            (Variant::Obj(l), Variant::Obj(r)) => Ok(l.cmp(r)),
            (Variant::Err(l), Variant::Err(r)) => Ok(l.cmp(r)),
            (_, _) => Err(E_TYPE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{v_err, v_str};
    use crate::Error::E_PERM;

    #[test]
    fn widening_arithmetic() {
        assert_eq!(v_int(1).add(&v_int(2)).unwrap(), v_int(3));
        assert_eq!(v_int(1).add(&v_float(0.5)).unwrap(), v_float(1.5));
        assert_eq!(v_float(3.0).mul(&v_int(2)).unwrap(), v_float(6.0));
        assert_eq!(v_str("a").add(&v_str("b")).unwrap(), v_str("ab"));
        assert_eq!(v_str("a").add(&v_int(1)).unwrap_err(), E_TYPE);
    }

    #[test]
    fn zero_division() {
        assert_eq!(v_int(1).div(&v_int(0)).unwrap_err(), E_DIV);
        assert_eq!(v_float(1.0).div(&v_float(0.0)).unwrap_err(), E_DIV);
        assert_eq!(v_int(5).modulus(&v_int(0)).unwrap_err(), E_DIV);
    }

    #[test]
    fn non_finite_results_raise() {
        assert_eq!(v_float(1e308).mul(&v_float(10.0)).unwrap_err(), E_FLOAT);
        assert_eq!(
            v_float(1e308).add(&v_float(1e308)).unwrap_err(),
            E_FLOAT
        );
    }

    #[test]
    fn integer_pow() {
        assert_eq!(v_int(2).pow(&v_int(10)).unwrap(), v_int(1024));
        assert_eq!(v_int(2).pow(&v_int(-1)).unwrap(), v_int(0));
        assert_eq!(v_int(-1).pow(&v_int(-3)).unwrap(), v_int(-1));
        assert_eq!(v_int(0).pow(&v_int(-1)).unwrap_err(), E_DIV);
    }

    #[test]
    fn moo_ordering() {
        assert_eq!(v_int(1).cmp_moo(&v_float(1.5)).unwrap(), Ordering::Less);
        assert_eq!(
            v_str("a").cmp_moo(&v_str("B")).unwrap(),
            Ordering::Less
        );
        assert_eq!(v_err(E_PERM).cmp_moo(&v_int(1)).unwrap_err(), E_TYPE);
    }
}
