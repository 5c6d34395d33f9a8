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

//! The in-memory object store: objects with multiple inheritance, dynamic
//! schema, owner/permission bits, and integer identities that survive
//! recycling. Persistence is an opaque snapshot hook; the network is
//! someone else's problem.

mod bitenum;
mod object;
mod store;

pub use bitenum::BitEnum;
pub use object::{
    parse_prop_perms, parse_verb_perms, prop_perms_string, verb_perms_string, verbname_matches,
    ArgSpec, ObjFlag, Object, PropFlag, Property, Verb, VerbArgsSpec, VerbFlag,
};
pub use store::{
    is_builtin_property, ObjectStore, VerbCacheStats, WorldStateError, BUILTIN_PROPERTIES,
};

#[cfg(test)]
mod tests {
    use super::*;
    use grange_var::{v_int, Objid, NOTHING};

    fn store_with_root() -> (ObjectStore, Objid) {
        let mut store = ObjectStore::new();
        let root = store.create_object(&[], NOTHING, false).unwrap();
        (store, root)
    }

    #[test]
    fn create_links_children() {
        let (mut store, root) = store_with_root();
        let kid = store.create_object(&[root], root, false).unwrap();
        assert!(store.valid(kid));
        assert!(store.get(root).unwrap().children.contains(&kid));
        assert_eq!(store.get(kid).unwrap().parents, vec![root]);
    }

    #[test]
    fn recycle_reparents_and_lists() {
        let (mut store, root) = store_with_root();
        let mid = store.create_object(&[root], root, false).unwrap();
        let leaf = store.create_object(&[mid], root, false).unwrap();
        store.recycle_object(mid).unwrap();
        assert!(!store.valid(mid));
        assert!(store.recycled(mid));
        assert_eq!(store.get(leaf).unwrap().parents, vec![root]);
        assert!(store.get(root).unwrap().children.contains(&leaf));
        assert!(!store.get(root).unwrap().children.contains(&mid));
        assert_eq!(store.recycled_objects(), vec![mid]);
    }

    #[test]
    fn create_never_reuses_recycled_ids() {
        let (mut store, root) = store_with_root();
        let a = store.create_object(&[root], root, false).unwrap();
        store.recycle_object(a).unwrap();
        let b = store.create_object(&[root], root, false).unwrap();
        assert_ne!(a, b);
        assert!(b.0 > a.0);
    }

    #[test]
    fn recreate_rebuilds_at_recycled_id() {
        let (mut store, root) = store_with_root();
        let a = store.create_object(&[root], root, false).unwrap();
        store.recycle_object(a).unwrap();
        store.recreate(a, &[root], root).unwrap();
        assert!(store.valid(a));
        assert!(!store.recycled(a));
        assert!(store.get(root).unwrap().children.contains(&a));
    }

    #[test]
    fn renumber_compacts_to_lowest_free() {
        let (mut store, root) = store_with_root();
        let a = store.create_object(&[root], root, false).unwrap();
        let b = store.create_object(&[root], root, false).unwrap();
        store.recycle_object(a).unwrap();
        let new_b = store.renumber(b).unwrap();
        assert_eq!(new_b, a);
        assert!(store.valid(new_b));
        assert!(!store.valid(b));
        assert!(store.get(root).unwrap().children.contains(&new_b));
        assert!(store.recycled(b));
    }

    #[test]
    fn property_inheritance_and_clearing() {
        let (mut store, root) = store_with_root();
        store
            .add_property(root, "x", v_int(1), root, BitEnum::new_with(PropFlag::Read))
            .unwrap();
        let kid = store.create_object(&[root], root, false).unwrap();
        // Clear slot reads through to the parent.
        assert_eq!(store.resolve_property(kid, "x").unwrap(), v_int(1));
        // Parent mutation shows through the clear slot.
        store.set_property(root, "x", v_int(5)).unwrap();
        assert_eq!(store.resolve_property(kid, "x").unwrap(), v_int(5));
        // A local write shadows; clearing re-inherits.
        store.set_property(kid, "x", v_int(2)).unwrap();
        assert_eq!(store.resolve_property(kid, "x").unwrap(), v_int(2));
        store.clear_property(kid, "x").unwrap();
        assert_eq!(store.resolve_property(kid, "x").unwrap(), v_int(5));
    }

    #[test]
    fn conflicting_ancestor_properties_rejected() {
        let mut store = ObjectStore::new();
        let p1 = store.create_object(&[], NOTHING, false).unwrap();
        let p2 = store.create_object(&[], NOTHING, false).unwrap();
        store
            .add_property(p1, "shared", v_int(1), p1, BitEnum::new())
            .unwrap();
        store
            .add_property(p2, "shared", v_int(2), p2, BitEnum::new())
            .unwrap();
        let err = store.create_object(&[p1, p2], NOTHING, false).unwrap_err();
        assert!(matches!(
            err,
            WorldStateError::DuplicatePropertyDefinition(_, _)
        ));
    }

    #[test]
    fn chparent_cycle_rejected() {
        let (mut store, root) = store_with_root();
        let kid = store.create_object(&[root], root, false).unwrap();
        let err = store.chparents(root, &[kid]).unwrap_err();
        assert!(matches!(err, WorldStateError::RecursiveParent(_, _)));
        let err = store.chparents(root, &[root]).unwrap_err();
        assert!(matches!(err, WorldStateError::RecursiveParent(_, _)));
    }

    #[test]
    fn chparent_resets_inherited_slots() {
        let mut store = ObjectStore::new();
        let a = store.create_object(&[], NOTHING, false).unwrap();
        let b = store.create_object(&[], NOTHING, false).unwrap();
        store
            .add_property(a, "x", v_int(1), a, BitEnum::new())
            .unwrap();
        store
            .add_property(b, "y", v_int(2), b, BitEnum::new())
            .unwrap();
        let kid = store.create_object(&[a], NOTHING, false).unwrap();
        store.set_property(kid, "x", v_int(10)).unwrap();
        store.chparents(kid, &[b]).unwrap();
        // Old inherited slot is gone, new one is clear.
        assert!(store.resolve_property(kid, "x").is_err());
        assert_eq!(store.resolve_property(kid, "y").unwrap(), v_int(2));
    }

    #[test]
    fn anonymous_objects_stay_out_of_listings() {
        let (mut store, root) = store_with_root();
        let anon = store.create_object(&[root], root, true).unwrap();
        assert!(store.valid(anon));
        assert!(!store.get(root).unwrap().children.contains(&anon));
        assert!(store.get(root).unwrap().anonymous_children.contains(&anon));
        assert_eq!(store.max_object(), root);
    }

    #[test]
    fn schema_change_invalidates_anonymous_children() {
        let (mut store, root) = store_with_root();
        let anon = store.create_object(&[root], root, true).unwrap();
        store
            .add_property(root, "p", v_int(1), root, BitEnum::new())
            .unwrap();
        assert!(!store.valid(anon));
    }

    #[test]
    fn verb_cache_counts_and_flushes() {
        let (mut store, root) = store_with_root();
        assert!(store.find_verb(root, "nope").is_err());
        assert!(store.find_verb(root, "nope").is_err());
        let stats = store.verb_cache_stats();
        assert_eq!(stats.lookups, 2);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        // A schema change clears the counters.
        let _ = store.create_object(&[root], root, false).unwrap();
        let stats = store.verb_cache_stats();
        assert_eq!(stats.lookups, 0);
        assert!(stats.flushes >= 1);
    }

    #[test]
    fn move_checks_recursion() {
        let (mut store, root) = store_with_root();
        let box_ = store.create_object(&[root], root, false).unwrap();
        let thing = store.create_object(&[root], root, false).unwrap();
        store.move_object(thing, box_).unwrap();
        assert_eq!(store.get(thing).unwrap().location, box_);
        assert!(store.get(box_).unwrap().contents.contains(&thing));
        let err = store.move_object(box_, thing).unwrap_err();
        assert!(matches!(err, WorldStateError::RecursiveParent(_, _)));
    }
}
