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

use std::fmt::{Display, Formatter};

/// An object identity. Non-negative ids name regular objects in the store;
/// negative ids are sentinels that never resolve to storage.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Objid(pub i64);

/// "nothing": empty location, absent parent, unowned.
pub const NOTHING: Objid = Objid(-1);
/// Parse sentinel: a command matched more than one object.
pub const AMBIGUOUS: Objid = Objid(-2);
/// Parse sentinel: a command matched no object.
pub const FAILED_MATCH: Objid = Objid(-3);
/// Parse sentinel: a match against something out of reach.
pub const NOTHING_FAR: Objid = Objid(-4);
/// `#0`, the well-known system object.
pub const SYSTEM_OBJECT: Objid = Objid(0);

impl Objid {
    pub fn is_sentinel(&self) -> bool {
        self.0 < 0
    }

    /// True when an id could plausibly name stored content (it still may be
    /// recycled or never allocated).
    pub fn is_positional(&self) -> bool {
        self.0 >= 0
    }

    /// Parse the `#N` form. Accepts negative sentinels.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.strip_prefix('#')?;
        s.parse::<i64>().ok().map(Objid)
    }
}

impl Display for Objid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse() {
        assert_eq!(Objid(42).to_string(), "#42");
        assert_eq!(Objid::parse("#42"), Some(Objid(42)));
        assert_eq!(Objid::parse("#-1"), Some(NOTHING));
        assert_eq!(Objid::parse("42"), None);
    }
}
