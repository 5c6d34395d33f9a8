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

use crate::Objid;

/// A waif: a lightweight instance value carrying only its class object and
/// owner. Waifs own no storage; property and verb access re-dispatches to
/// the class object. They are never valid object references (`valid` on a
/// waif is false) and can never be players.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Waif {
    pub class: Objid,
    pub owner: Objid,
}

impl Waif {
    pub fn new(class: Objid, owner: Objid) -> Self {
        Waif { class, owner }
    }
}
