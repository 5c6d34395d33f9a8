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

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use grange_var::Error::{E_INVARG, E_PERM, E_PROPNF, E_RECMOVE, E_VERBNF};
use grange_var::{v_none, Error, Objid, Var, NOTHING};

use crate::bitenum::BitEnum;
use crate::object::{ObjFlag, Object, PropFlag, Property, Verb};

use thiserror::Error as ThisError;

/// Failures out of the store. Each maps to the language-level error code the
/// builtins report.
#[derive(Debug, Clone, PartialEq, ThisError)]
pub enum WorldStateError {
    #[error("Object not found: {0}")]
    ObjectNotFound(Objid),
    #[error("Property not found: {0}.{1}")]
    PropertyNotFound(Objid, String),
    #[error("Verb not found: {0}:{1}")]
    VerbNotFound(Objid, String),
    #[error("Permission denied")]
    PermissionDenied,
    #[error("Recursive parentage: {0} within {1}")]
    RecursiveParent(Objid, Objid),
    #[error("Duplicate property definition: {0}.{1}")]
    DuplicatePropertyDefinition(Objid, String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl WorldStateError {
    pub fn to_error_code(&self) -> Error {
        match self {
            WorldStateError::ObjectNotFound(_) => E_INVARG,
            WorldStateError::PropertyNotFound(_, _) => E_PROPNF,
            WorldStateError::VerbNotFound(_, _) => E_VERBNF,
            WorldStateError::PermissionDenied => E_PERM,
            WorldStateError::RecursiveParent(_, _) => E_RECMOVE,
            WorldStateError::DuplicatePropertyDefinition(_, _) => E_INVARG,
            WorldStateError::InvalidArgument(_) => E_INVARG,
        }
    }
}

impl From<WorldStateError> for Error {
    fn from(e: WorldStateError) -> Error {
        e.to_error_code()
    }
}

/// Property names that mirror object attributes. These can never be added
/// or deleted as real properties.
pub const BUILTIN_PROPERTIES: &[&str] = &[
    "name",
    "owner",
    "location",
    "contents",
    "parents",
    "parent",
    "children",
    "programmer",
    "wizard",
    "player",
    "r",
    "w",
    "f",
    "a",
];

pub fn is_builtin_property(name: &str) -> bool {
    BUILTIN_PROPERTIES
        .iter()
        .any(|p| p.eq_ignore_ascii_case(name))
}

/// Counters over verb lookups, surfaced by `verb_cache_stats()` and cleared
/// whenever a schema-changing mutation flushes the cache.
#[derive(Clone, Copy, Debug, Default)]
pub struct VerbCacheStats {
    pub lookups: u64,
    pub hits: u64,
    pub misses: u64,
    pub flushes: u64,
}

type SnapshotHook = Box<dyn Fn(&ObjectStore) -> Result<(), String> + Send + Sync>;

/// The object store: a freelist-backed arena of objects addressed by id.
/// Anonymous objects live in the same arena (their ids are internal
/// bookkeeping only) and are kept out of every user-visible listing.
#[derive(Default)]
pub struct ObjectStore {
    arena: Vec<Option<Object>>,
    /// Recycled regular ids: listable via `recycled_objects()` and reusable
    /// by `recreate`/`renumber`, but never by plain `create`.
    recycled: Vec<Objid>,
    /// Highest regular (non-anonymous) id ever allocated.
    max_regular: i64,
    verb_cache: HashMap<(Objid, String), Option<(Objid, usize)>>,
    cache_stats: VerbCacheStats,
    snapshot_hook: Option<SnapshotHook>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self {
            arena: vec![],
            recycled: vec![],
            max_regular: -1,
            verb_cache: HashMap::new(),
            cache_stats: VerbCacheStats::default(),
            snapshot_hook: None,
        }
    }

    pub fn next_id(&self) -> Objid {
        Objid(self.arena.len() as i64)
    }

    pub fn max_object(&self) -> Objid {
        Objid(self.max_regular)
    }

    pub fn get(&self, id: Objid) -> Result<&Object, WorldStateError> {
        self.arena
            .get(id.0 as usize)
            .and_then(|slot| slot.as_ref())
            .ok_or(WorldStateError::ObjectNotFound(id))
    }

    pub fn get_mut(&mut self, id: Objid) -> Result<&mut Object, WorldStateError> {
        self.arena
            .get_mut(id.0 as usize)
            .and_then(|slot| slot.as_mut())
            .ok_or(WorldStateError::ObjectNotFound(id))
    }

    /// A live, non-invalidated object.
    pub fn valid(&self, id: Objid) -> bool {
        id.0 >= 0
            && self
                .get(id)
                .map(|o| !o.flags.contains(ObjFlag::Invalid))
                .unwrap_or(false)
    }

    pub fn recycled(&self, id: Objid) -> bool {
        self.recycled.contains(&id)
    }

    pub fn recycled_objects(&self) -> Vec<Objid> {
        let mut ids = self.recycled.clone();
        ids.sort();
        ids
    }

    pub fn is_wizard(&self, who: Objid) -> bool {
        self.get(who)
            .map(|o| o.flags.contains(ObjFlag::Wizard))
            .unwrap_or(false)
    }

    pub fn is_programmer(&self, who: Objid) -> bool {
        self.get(who)
            .map(|o| o.flags.contains(ObjFlag::Programmer))
            .unwrap_or(false)
    }

    /// Full ownership authority: wizards control everything, owners control
    /// their own objects.
    pub fn controls(&self, who: Objid, what: Objid) -> bool {
        if self.is_wizard(who) {
            return true;
        }
        self.get(what).map(|o| o.owner == who).unwrap_or(false)
    }

    fn note_schema_change(&mut self) {
        self.verb_cache.clear();
        let flushes = self.cache_stats.flushes + 1;
        self.cache_stats = VerbCacheStats {
            flushes,
            ..Default::default()
        };
    }

    pub fn verb_cache_stats(&self) -> VerbCacheStats {
        self.cache_stats
    }

    // --- Identity and lifecycle -------------------------------------------

    fn allocate(&mut self, owner: Objid, anonymous: bool) -> Objid {
        let id = Objid(self.arena.len() as i64);
        let mut obj = Object::new(id, owner);
        if anonymous {
            obj.anonymous = true;
        } else {
            self.max_regular = self.max_regular.max(id.0);
        }
        self.arena.push(Some(obj));
        id
    }

    /// All properties defined anywhere in the ancestry of `parents`,
    /// checking the no-two-ancestors-define-the-same-name invariant.
    fn inherited_properties(
        &self,
        parents: &[Objid],
    ) -> Result<Vec<Property>, WorldStateError> {
        let mut seen: HashMap<String, Objid> = HashMap::new();
        let mut inherited = vec![];
        for parent in parents {
            for ancestor in self.ancestors(*parent, true)? {
                let o = self.get(ancestor)?;
                for p in o.properties.iter().filter(|p| p.defined) {
                    let key = p.name.to_ascii_lowercase();
                    if let Some(prior) = seen.get(&key) {
                        if *prior != ancestor {
                            return Err(WorldStateError::DuplicatePropertyDefinition(
                                ancestor,
                                p.name.clone(),
                            ));
                        }
                        continue;
                    }
                    seen.insert(key, ancestor);
                    inherited.push(p.clone());
                }
            }
        }
        Ok(inherited)
    }

    /// Create an object with the given parents. Hook verbs (`initialize`)
    /// are the kernel's business; this is the structural part.
    pub fn create_object(
        &mut self,
        parents: &[Objid],
        owner: Objid,
        anonymous: bool,
    ) -> Result<Objid, WorldStateError> {
        for p in parents {
            if !self.valid(*p) {
                return Err(WorldStateError::ObjectNotFound(*p));
            }
        }
        let inherited = self.inherited_properties(parents)?;

        let id = self.allocate(owner, anonymous);
        let owner = if owner == NOTHING { id } else { owner };
        {
            let o = self.get_mut(id)?;
            o.owner = owner;
            o.parents = parents.to_vec();
            for p in inherited {
                let slot_owner = if p.perms.contains(PropFlag::Chown) {
                    owner
                } else {
                    p.owner
                };
                o.properties.push(Property {
                    name: p.name,
                    value: v_none(),
                    owner: slot_owner,
                    perms: p.perms,
                    defined: false,
                    clear: true,
                });
            }
        }
        for p in parents {
            let parent = self.get_mut(*p)?;
            if anonymous {
                parent.anonymous_children.push(id);
            } else {
                parent.children.push(id);
            }
        }
        self.note_schema_change();
        debug!(id = id.0, ?parents, anonymous, "created object");
        Ok(id)
    }

    /// Structurally destroy an object: reparent children, evacuate
    /// contents, clear schema, mark the id recycled. The recycle-hook and
    /// anonymous-cascade logic live in the kernel.
    pub fn recycle_object(&mut self, id: Objid) -> Result<(), WorldStateError> {
        let (parents, children, contents, location, anonymous) = {
            let o = self.get(id)?;
            (
                o.parents.clone(),
                o.children.clone(),
                o.contents.clone(),
                o.location,
                o.anonymous,
            )
        };

        // Detach from our parents' child lists (both flavors).
        for p in &parents {
            if let Ok(parent) = self.get_mut(*p) {
                parent.children.retain(|c| *c != id);
                parent.anonymous_children.retain(|c| *c != id);
            }
        }

        // Children are adopted by our parents, preserving order and
        // deduplicating.
        for c in &children {
            let new_parents: Vec<Objid> = {
                let child = self.get(*c)?;
                let mut np = vec![];
                for p in child.parents.iter() {
                    if *p == id {
                        for gp in &parents {
                            if !np.contains(gp) {
                                np.push(*gp);
                            }
                        }
                    } else if !np.contains(p) {
                        np.push(*p);
                    }
                }
                np
            };
            self.get_mut(*c)?.parents = new_parents;
            for gp in &parents {
                let gpo = self.get_mut(*gp)?;
                if !gpo.children.contains(c) {
                    gpo.children.push(*c);
                }
            }
        }

        // Contents evacuate to nothing.
        for content in &contents {
            if let Ok(o) = self.get_mut(*content) {
                o.location = NOTHING;
            }
        }
        if location != NOTHING {
            if let Ok(loc) = self.get_mut(location) {
                loc.contents.retain(|c| *c != id);
            }
        }

        let slot = &mut self.arena[id.0 as usize];
        *slot = None;
        if !anonymous {
            self.recycled.push(id);
        }
        self.note_schema_change();
        debug!(id = id.0, "recycled object");
        Ok(())
    }

    /// Move an object to the lowest free id below its current one,
    /// returning its (possibly unchanged) id.
    pub fn renumber(&mut self, id: Objid) -> Result<Objid, WorldStateError> {
        if !self.valid(id) {
            return Err(WorldStateError::ObjectNotFound(id));
        }
        let Some(new_id) = self
            .recycled
            .iter()
            .copied()
            .filter(|r| r.0 < id.0)
            .min()
        else {
            return Ok(id);
        };

        self.recycled.retain(|r| *r != new_id);
        let mut obj = self.arena[id.0 as usize].take().expect("validated above");
        obj.id = new_id;
        self.arena[new_id.0 as usize] = Some(obj);
        self.recycled.push(id);

        // Rewrite structural references throughout the store.
        for slot in self.arena.iter_mut().flatten() {
            for list in [
                &mut slot.parents,
                &mut slot.children,
                &mut slot.anonymous_children,
                &mut slot.contents,
            ] {
                for entry in list.iter_mut() {
                    if *entry == id {
                        *entry = new_id;
                    }
                }
            }
            if slot.location == id {
                slot.location = new_id;
            }
            if slot.owner == id {
                slot.owner = new_id;
            }
        }
        self.note_schema_change();
        Ok(new_id)
    }

    /// Rebuild an object at a previously recycled id.
    pub fn recreate(
        &mut self,
        id: Objid,
        parents: &[Objid],
        owner: Objid,
    ) -> Result<(), WorldStateError> {
        if !self.recycled(id) {
            return Err(WorldStateError::InvalidArgument(format!(
                "{id} is not a recycled object"
            )));
        }
        for p in parents {
            if !self.valid(*p) {
                return Err(WorldStateError::ObjectNotFound(*p));
            }
        }
        let inherited = self.inherited_properties(parents)?;
        self.recycled.retain(|r| *r != id);

        let mut obj = Object::new(id, owner);
        obj.parents = parents.to_vec();
        for p in inherited {
            let slot_owner = if p.perms.contains(PropFlag::Chown) {
                owner
            } else {
                p.owner
            };
            obj.properties.push(Property {
                name: p.name,
                value: v_none(),
                owner: slot_owner,
                perms: p.perms,
                defined: false,
                clear: true,
            });
        }
        self.arena[id.0 as usize] = Some(obj);
        for p in parents {
            self.get_mut(*p)?.children.push(id);
        }
        self.note_schema_change();
        Ok(())
    }

    // --- Hierarchy --------------------------------------------------------

    /// Breadth-first ancestors in discovery order, deduplicated.
    pub fn ancestors(
        &self,
        id: Objid,
        include_self: bool,
    ) -> Result<Vec<Objid>, WorldStateError> {
        let mut out = vec![];
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(id);
        seen.insert(id);
        while let Some(o) = queue.pop_front() {
            if o != id || include_self {
                out.push(o);
            }
            for p in &self.get(o)?.parents {
                if seen.insert(*p) {
                    queue.push_back(*p);
                }
            }
        }
        Ok(out)
    }

    /// Breadth-first descendants via the regular child lists.
    pub fn descendants(
        &self,
        id: Objid,
        include_self: bool,
    ) -> Result<Vec<Objid>, WorldStateError> {
        let mut out = vec![];
        let mut seen = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(id);
        seen.insert(id);
        while let Some(o) = queue.pop_front() {
            if o != id || include_self {
                out.push(o);
            }
            for c in &self.get(o)?.children {
                if seen.insert(*c) {
                    queue.push_back(*c);
                }
            }
        }
        Ok(out)
    }

    pub fn isa(&self, id: Objid, ancestor: Objid) -> Result<bool, WorldStateError> {
        Ok(self.ancestors(id, true)?.contains(&ancestor))
    }

    /// Mark every anonymous object descended from `id` invalid. Called on
    /// any schema change that could alter what those objects inherit.
    pub fn invalidate_anonymous_children(&mut self, id: Objid) -> Result<(), WorldStateError> {
        let mut affected = vec![id];
        affected.extend(self.descendants(id, false)?);
        for o in affected {
            let anon_children = self.get(o)?.anonymous_children.clone();
            for a in anon_children {
                if let Ok(anon) = self.get_mut(a) {
                    anon.flags.set(ObjFlag::Invalid);
                }
            }
        }
        Ok(())
    }

    /// Validate and apply a parent change: cycle and property-conflict
    /// invariants first, then slot rebuilding and anonymous invalidation.
    pub fn chparents(
        &mut self,
        id: Objid,
        new_parents: &[Objid],
    ) -> Result<(), WorldStateError> {
        for p in new_parents {
            if *p == id {
                return Err(WorldStateError::RecursiveParent(id, *p));
            }
            if !self.valid(*p) {
                return Err(WorldStateError::ObjectNotFound(*p));
            }
            if self.ancestors(*p, true)?.contains(&id) {
                return Err(WorldStateError::RecursiveParent(id, *p));
            }
        }

        // The new ancestry must be conflict-free in itself...
        let inherited = self.inherited_properties(new_parents)?;

        // ...and must not collide with anything defined on this object or
        // any of its descendants.
        let mut inherited_names = HashSet::new();
        for p in &inherited {
            inherited_names.insert(p.name.to_ascii_lowercase());
        }
        for member in self.descendants(id, true)? {
            let o = self.get(member)?;
            for p in o.properties.iter().filter(|p| p.defined) {
                if inherited_names.contains(&p.name.to_ascii_lowercase()) {
                    return Err(WorldStateError::DuplicatePropertyDefinition(
                        member,
                        p.name.clone(),
                    ));
                }
            }
        }

        let old_parents = self.get(id)?.parents.clone();
        for p in &old_parents {
            if let Ok(parent) = self.get_mut(*p) {
                parent.children.retain(|c| *c != id);
            }
        }
        self.get_mut(id)?.parents = new_parents.to_vec();
        for p in new_parents {
            self.get_mut(*p)?.children.push(id);
        }

        // Every member of the subtree re-derives its inherited slots: all
        // non-defined slots are dropped and fresh clear slots added for the
        // props its (new) ancestry defines.
        for member in self.descendants(id, true)? {
            let member_ancestry: Vec<Objid> = self.ancestors(member, false)?;
            let mut fresh: Vec<Property> = vec![];
            for ancestor in &member_ancestry {
                let o = self.get(*ancestor)?;
                for p in o.properties.iter().filter(|p| p.defined) {
                    fresh.push(p.clone());
                }
            }
            let member_owner = self.get(member)?.owner;
            let obj = self.get_mut(member)?;
            obj.properties.retain(|p| p.defined);
            for p in fresh {
                let slot_owner = if p.perms.contains(PropFlag::Chown) {
                    member_owner
                } else {
                    p.owner
                };
                obj.properties.push(Property {
                    name: p.name,
                    value: v_none(),
                    owner: slot_owner,
                    perms: p.perms,
                    defined: false,
                    clear: true,
                });
            }
        }

        self.invalidate_anonymous_children(id)?;
        self.note_schema_change();
        Ok(())
    }

    // --- Movement ---------------------------------------------------------

    /// Structural move with the recursive-containment check. `accept`,
    /// `enterfunc` and `exitfunc` hooks are the kernel's business.
    pub fn move_object(&mut self, what: Objid, to: Objid) -> Result<(), WorldStateError> {
        if !self.valid(what) {
            return Err(WorldStateError::ObjectNotFound(what));
        }
        if to != NOTHING && !self.valid(to) {
            return Err(WorldStateError::ObjectNotFound(to));
        }
        // Walk up from the destination; finding `what` means we'd create a
        // containment loop.
        let mut cursor = to;
        while cursor != NOTHING {
            if cursor == what {
                return Err(WorldStateError::RecursiveParent(what, to));
            }
            cursor = self.get(cursor)?.location;
        }

        let old_location = self.get(what)?.location;
        if old_location != NOTHING {
            if let Ok(old) = self.get_mut(old_location) {
                old.contents.retain(|c| *c != what);
            }
        }
        self.get_mut(what)?.location = to;
        if to != NOTHING {
            self.get_mut(to)?.contents.push(what);
        }
        Ok(())
    }

    // --- Properties -------------------------------------------------------

    /// Read a property value, honoring clear slots by walking the parent
    /// graph breadth-first.
    pub fn resolve_property(&self, id: Objid, name: &str) -> Result<Var, WorldStateError> {
        let o = self.get(id)?;
        let Some(slot) = o.find_property(name) else {
            return Err(WorldStateError::PropertyNotFound(id, name.to_string()));
        };
        if !slot.clear {
            return Ok(slot.value.clone());
        }
        // Clear: the value is a live view of the nearest ancestor holding
        // a non-clear slot.
        for ancestor in self.ancestors(id, false)? {
            if let Some(pslot) = self.get(ancestor)?.find_property(name) {
                if !pslot.clear {
                    return Ok(pslot.value.clone());
                }
            }
        }
        Err(WorldStateError::PropertyNotFound(id, name.to_string()))
    }

    /// The slot metadata as seen on this object (inherited slots included).
    pub fn property_info(&self, id: Objid, name: &str) -> Result<&Property, WorldStateError> {
        self.get(id)?
            .find_property(name)
            .ok_or_else(|| WorldStateError::PropertyNotFound(id, name.to_string()))
    }

    pub fn set_property(
        &mut self,
        id: Objid,
        name: &str,
        value: Var,
    ) -> Result<(), WorldStateError> {
        let o = self.get_mut(id)?;
        let Some(slot) = o.find_property_mut(name) else {
            return Err(WorldStateError::PropertyNotFound(id, name.to_string()));
        };
        slot.value = value;
        slot.clear = false;
        Ok(())
    }

    pub fn add_property(
        &mut self,
        id: Objid,
        name: &str,
        value: Var,
        owner: Objid,
        perms: BitEnum<PropFlag>,
    ) -> Result<(), WorldStateError> {
        if is_builtin_property(name) {
            return Err(WorldStateError::InvalidArgument(format!(
                "{name} is a built-in property"
            )));
        }
        // No ancestor or descendant may already carry the name.
        for ancestor in self.ancestors(id, true)? {
            if self.get(ancestor)?.find_property(name).is_some() {
                return Err(WorldStateError::DuplicatePropertyDefinition(
                    ancestor,
                    name.to_string(),
                ));
            }
        }
        for descendant in self.descendants(id, false)? {
            if self.get(descendant)?.find_property(name).is_some() {
                return Err(WorldStateError::DuplicatePropertyDefinition(
                    descendant,
                    name.to_string(),
                ));
            }
        }

        self.get_mut(id)?.properties.push(Property {
            name: name.to_string(),
            value,
            owner,
            perms,
            defined: true,
            clear: false,
        });
        for descendant in self.descendants(id, false)? {
            let descendant_owner = self.get(descendant)?.owner;
            let slot_owner = if perms.contains(PropFlag::Chown) {
                descendant_owner
            } else {
                owner
            };
            self.get_mut(descendant)?.properties.push(Property {
                name: name.to_string(),
                value: v_none(),
                owner: slot_owner,
                perms,
                defined: false,
                clear: true,
            });
        }
        self.invalidate_anonymous_children(id)?;
        self.note_schema_change();
        Ok(())
    }

    pub fn delete_property(&mut self, id: Objid, name: &str) -> Result<(), WorldStateError> {
        if is_builtin_property(name) {
            return Err(WorldStateError::InvalidArgument(format!(
                "{name} is a built-in property"
            )));
        }
        {
            let o = self.get(id)?;
            let Some(slot) = o.find_property(name) else {
                return Err(WorldStateError::PropertyNotFound(id, name.to_string()));
            };
            if !slot.defined {
                return Err(WorldStateError::PropertyNotFound(id, name.to_string()));
            }
        }
        for member in self.descendants(id, true)? {
            self.get_mut(member)?
                .properties
                .retain(|p| !p.name.eq_ignore_ascii_case(name));
        }
        self.invalidate_anonymous_children(id)?;
        self.note_schema_change();
        Ok(())
    }

    pub fn clear_property(&mut self, id: Objid, name: &str) -> Result<(), WorldStateError> {
        let o = self.get_mut(id)?;
        let Some(slot) = o.find_property_mut(name) else {
            return Err(WorldStateError::PropertyNotFound(id, name.to_string()));
        };
        if slot.defined {
            return Err(WorldStateError::InvalidArgument(
                "cannot clear a defined property".to_string(),
            ));
        }
        slot.value = v_none();
        slot.clear = true;
        Ok(())
    }

    // --- Verbs ------------------------------------------------------------

    /// Find a verb by name on `id` or its ancestors, breadth-first.
    /// Returns the defining object and the verb's index there.
    pub fn find_verb(
        &mut self,
        id: Objid,
        name: &str,
    ) -> Result<(Objid, usize), WorldStateError> {
        let key = (id, name.to_ascii_lowercase());
        self.cache_stats.lookups += 1;
        if let Some(cached) = self.verb_cache.get(&key) {
            self.cache_stats.hits += 1;
            return match cached {
                Some(hit) => Ok(*hit),
                None => Err(WorldStateError::VerbNotFound(id, name.to_string())),
            };
        }
        self.cache_stats.misses += 1;

        let mut found = None;
        for candidate in self.ancestors(id, true)? {
            if let Some((idx, _)) = self.get(candidate)?.find_verb(name) {
                found = Some((candidate, idx));
                break;
            }
        }
        self.verb_cache.insert(key, found);
        match found {
            Some(hit) => Ok(hit),
            None => Err(WorldStateError::VerbNotFound(id, name.to_string())),
        }
    }

    pub fn verb_at(&self, id: Objid, index: usize) -> Result<&Verb, WorldStateError> {
        self.get(id)?
            .verbs
            .get(index)
            .ok_or_else(|| WorldStateError::VerbNotFound(id, format!("#{index}")))
    }

    pub fn add_verb(&mut self, id: Objid, verb: Verb) -> Result<(), WorldStateError> {
        self.get_mut(id)?.verbs.push(verb);
        self.note_schema_change();
        Ok(())
    }

    pub fn remove_verb(&mut self, id: Objid, index: usize) -> Result<(), WorldStateError> {
        let o = self.get_mut(id)?;
        if index >= o.verbs.len() {
            return Err(WorldStateError::VerbNotFound(id, format!("#{index}")));
        }
        o.verbs.remove(index);
        self.note_schema_change();
        Ok(())
    }

    /// Invalidate the lookup cache after verb metadata mutation.
    pub fn note_verb_change(&mut self) {
        self.note_schema_change();
    }

    // --- Listings ---------------------------------------------------------

    /// Every object with the `User` flag. Anonymous objects can never be
    /// players.
    pub fn players(&self) -> Vec<Objid> {
        self.arena
            .iter()
            .flatten()
            .filter(|o| {
                o.flags.contains(ObjFlag::User) && !o.anonymous
            })
            .map(|o| o.id)
            .collect()
    }

    pub fn owned_objects(&self, owner: Objid) -> Vec<Objid> {
        self.arena
            .iter()
            .flatten()
            .filter(|o| o.owner == owner && !o.anonymous)
            .map(|o| o.id)
            .collect()
    }

    /// Anonymous object ids reachable from the property values of `id`,
    /// in ascending id order; the recycle cascade's work list.
    pub fn reachable_anonymous(&self, id: Objid) -> Result<Vec<Objid>, WorldStateError> {
        fn walk(v: &Var, acc: &mut HashSet<Objid>) {
            match v.variant() {
                grange_var::Variant::Anon(a) => {
                    acc.insert(*a);
                }
                grange_var::Variant::List(l) => {
                    for e in l.iter() {
                        walk(e, acc);
                    }
                }
                grange_var::Variant::Map(m) => {
                    for (k, val) in m.iter() {
                        walk(&k, acc);
                        walk(&val, acc);
                    }
                }
                _ => {}
            }
        }
        let mut acc = HashSet::new();
        for p in &self.get(id)?.properties {
            walk(&p.value, &mut acc);
        }
        let mut ids: Vec<Objid> = acc.into_iter().collect();
        ids.sort();
        Ok(ids)
    }

    // --- Snapshots --------------------------------------------------------

    pub fn set_snapshot_hook(&mut self, hook: SnapshotHook) {
        self.snapshot_hook = Some(hook);
    }

    /// Invoke the host's snapshot hook, if one is installed.
    pub fn dump_database(&self) -> Result<(), String> {
        match &self.snapshot_hook {
            Some(hook) => hook(self),
            None => Ok(()),
        }
    }
}
