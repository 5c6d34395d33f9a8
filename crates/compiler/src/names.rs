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

use std::collections::HashMap;

use strum::{Display, EnumCount, EnumIter, IntoEnumIterator};

/// A variable slot in a frame's environment. Slots are allocated once at
/// compile time; scoping is purely a matter of which names are visible to
/// the parser at a given point.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Name(pub u16);

/// The variables every verb activation starts out with. Their slot numbers
/// are fixed: slot `i` holds global `i`, which lets the kernel seed them
/// without a name lookup.
#[repr(usize)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Display, EnumIter, EnumCount)]
#[allow(non_camel_case_types)]
pub enum GlobalName {
    player,
    this,
    caller,
    verb,
    args,
    argstr,
    dobj,
    dobjstr,
    prepstr,
    iobj,
    iobjstr,
    NUM,
    INT,
    FLOAT,
    OBJ,
    STR,
    ERR,
    LIST,
    MAP,
    ANON,
    WAIF,
}

/// The compiled name table: every slot a program uses, in slot order. The
/// parser builds this through a scope stack; the finished table is attached
/// to the `Program`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Names {
    pub names: Vec<String>,
}

impl Names {
    pub fn width(&self) -> usize {
        self.names.len()
    }

    pub fn name_of(&self, name: &Name) -> Option<&str> {
        self.names.get(name.0 as usize).map(|s| s.as_str())
    }

    /// Slot of a name, searching case-insensitively. Used by reflection
    /// (`task_stack` variable dumps) and tests.
    pub fn find_name(&self, name: &str) -> Option<Name> {
        self.names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name))
            .map(|i| Name(i as u16))
    }

    pub fn global(g: GlobalName) -> Name {
        Name(g as usize as u16)
    }
}

/// Scope-tracking name allocator used while parsing. Block scopes (`if`
/// arms, loop bodies, `try` arms) see their enclosing names; `let` introduces
/// a fresh slot visible for the rest of its block, shadowing outer names.
pub struct Scopes {
    /// All slot names ever allocated, in slot order.
    names: Vec<String>,
    /// Visibility stack; `scopes[0]` is the verb-wide scope.
    scopes: Vec<HashMap<String, Name>>,
}

impl Scopes {
    pub fn new() -> Self {
        let mut this = Self {
            names: vec![],
            scopes: vec![HashMap::new()],
        };
        for g in GlobalName::iter() {
            this.declare_global(&g.to_string());
        }
        this
    }

    fn fold(name: &str) -> String {
        name.to_ascii_lowercase()
    }

    fn alloc(&mut self, name: &str) -> Name {
        let slot = Name(self.names.len() as u16);
        self.names.push(name.to_string());
        slot
    }

    /// Find a visible binding for `name`, innermost scope first.
    pub fn find(&self, name: &str) -> Option<Name> {
        let key = Self::fold(name);
        self.scopes.iter().rev().find_map(|s| s.get(&key).copied())
    }

    /// Find `name`, or allocate it in the verb-wide scope. Unscoped MOO
    /// variables are frame-wide, as they always have been.
    pub fn find_or_add(&mut self, name: &str) -> Name {
        if let Some(existing) = self.find(name) {
            return existing;
        }
        self.declare_global(name)
    }

    fn declare_global(&mut self, name: &str) -> Name {
        let slot = self.alloc(name);
        self.scopes[0].insert(Self::fold(name), slot);
        slot
    }

    /// `let`: a fresh slot bound in the current block, shadowing any outer
    /// binding of the same name.
    pub fn declare_scoped(&mut self, name: &str) -> Name {
        let slot = self.alloc(name);
        self.scopes
            .last_mut()
            .expect("scope stack underflow")
            .insert(Self::fold(name), slot);
        slot
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop().expect("scope stack underflow");
        assert!(!self.scopes.is_empty(), "popped the verb-wide scope");
    }

    pub fn finish(self) -> Names {
        Names { names: self.names }
    }
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn globals_have_fixed_slots() {
        let names = Scopes::new().finish();
        assert_eq!(names.find_name("player"), Some(Name(0)));
        assert_eq!(names.find_name("this"), Some(Names::global(GlobalName::this)));
        assert_eq!(
            names.find_name("args"),
            Some(Names::global(GlobalName::args))
        );
    }

    #[test]
    fn let_shadows_and_unwinds() {
        let mut scopes = Scopes::new();
        let outer = scopes.find_or_add("x");
        scopes.push_scope();
        let inner = scopes.declare_scoped("x");
        assert_ne!(outer, inner);
        assert_eq!(scopes.find("X"), Some(inner));
        scopes.pop_scope();
        assert_eq!(scopes.find("x"), Some(outer));
    }
}
