//! Identity and matching helpers shared by the diff engine.
//!
//! Every itemized record has an identity (its name) and a set of comparable
//! fields. Two records with the same identity are the same resource; they
//! differ only if a comparable field differs.

use indexmap::IndexMap;

use crate::model::{Instance, Network, Router};

use super::diff::DiffSet;

/// A record that can be matched across states.
pub trait Keyed: Clone {
    /// Returns the record's identity.
    fn identity(&self) -> &str;

    /// Returns true if every comparable field matches `other`.
    fn same_as(&self, other: &Self) -> bool;
}

impl Keyed for Router {
    fn identity(&self) -> &str {
        &self.name
    }

    // Routers are only ever created or deleted.
    fn same_as(&self, _other: &Self) -> bool {
        true
    }
}

impl Keyed for Network {
    fn identity(&self) -> &str {
        &self.name
    }

    fn same_as(&self, other: &Self) -> bool {
        self.router == other.router && self.subnet == other.subnet && self.dns == other.dns
    }
}

impl Keyed for Instance {
    fn identity(&self) -> &str {
        &self.name
    }

    fn same_as(&self, other: &Self) -> bool {
        self.image == other.image
            && self.count == other.count
            && self.cpus == other.cpus
            && self.memory == other.memory
            && self.disks == other.disks
            && self.network == other.network
            && self.ip == other.ip
    }
}

/// Insertion-ordered index of records by identity.
///
/// When two records share an identity, the later one wins and keeps the
/// position of the first.
#[derive(Debug)]
pub struct IdentityIndex<'a, T> {
    entries: IndexMap<&'a str, &'a T>,
}

impl<'a, T: Keyed> IdentityIndex<'a, T> {
    /// Indexes a collection.
    #[must_use]
    pub fn new(records: &'a [T]) -> Self {
        let mut entries = IndexMap::with_capacity(records.len());
        for record in records {
            entries.insert(record.identity(), record);
        }
        Self { entries }
    }

    /// Looks up a record by identity.
    #[must_use]
    pub fn get(&self, identity: &str) -> Option<&'a T> {
        self.entries.get(identity).copied()
    }

    /// Returns true if the identity is indexed.
    #[must_use]
    pub fn contains(&self, identity: &str) -> bool {
        self.entries.contains_key(identity)
    }

    /// Iterates over records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a T)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, *v))
    }
}

/// Merges records that would be both created and updated.
///
/// A record whose identity appears on both sides ends up in the update list
/// only, holding the later of the two records. Both lists come back free of
/// duplicate identities.
#[must_use]
pub fn fold_into_updates<T: Keyed>(to_create: Vec<T>, to_update: Vec<T>) -> (Vec<T>, Vec<T>) {
    let mut updates: IndexMap<String, T> = IndexMap::new();
    for record in to_update {
        updates.insert(record.identity().to_string(), record);
    }

    let mut creates: IndexMap<String, T> = IndexMap::new();
    for record in to_create {
        let identity = record.identity().to_string();
        if let Some(slot) = updates.get_mut(&identity) {
            *slot = record;
        } else {
            creates.insert(identity, record);
        }
    }

    (creates.into_values().collect(), updates.into_values().collect())
}

/// Partitions two collections of the same kind into a diff set.
#[must_use]
pub fn partition<T: Keyed>(previous: &[T], target: &[T]) -> DiffSet<T> {
    let before = IdentityIndex::new(previous);
    let after = IdentityIndex::new(target);

    let mut to_create = Vec::new();
    let mut to_update = Vec::new();
    for (identity, record) in after.iter() {
        match before.get(identity) {
            None => to_create.push(record.clone()),
            Some(old) if !old.same_as(record) => to_update.push(record.clone()),
            Some(_) => {}
        }
    }

    let to_delete = before
        .iter()
        .filter(|(identity, _)| !after.contains(identity))
        .map(|(_, record)| record.clone())
        .collect();

    let (to_create, to_update) = fold_into_updates(to_create, to_update);

    DiffSet {
        to_create,
        to_update,
        to_delete,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn unit(name: &str, image: &str) -> Instance {
        Instance {
            name: name.to_string(),
            group: String::from("web"),
            network: String::from("demo-web"),
            ip: String::from("10.1.0.11"),
            image: image.to_string(),
            count: 1,
            cpus: 1,
            memory: String::from("1GB"),
            disks: vec![],
        }
    }

    fn names(records: &[Instance]) -> Vec<&str> {
        records.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_partition_basic() {
        let previous = vec![unit("a", "x"), unit("b", "x"), unit("c", "x")];
        let target = vec![unit("b", "x"), unit("c", "y"), unit("d", "x")];
        let diff = partition(&previous, &target);

        assert_eq!(names(&diff.to_create), vec!["d"]);
        assert_eq!(names(&diff.to_update), vec!["c"]);
        assert_eq!(names(&diff.to_delete), vec!["a"]);
    }

    #[test]
    fn test_cosmetic_fields_do_not_update() {
        let previous = vec![unit("a", "x")];
        let mut changed = unit("a", "x");
        changed.group = String::from("renamed");
        assert!(partition(&previous, &[changed]).is_empty());

        let mut router = Router::new("gw", None);
        let previous = vec![router.clone()];
        router.ip = Some(String::from("172.16.0.1"));
        assert!(partition(&previous, &[router]).is_empty());
    }

    #[test]
    fn test_fold_into_updates_later_record_wins() {
        let creates = vec![unit("a", "new"), unit("b", "x"), unit("b", "y")];
        let updates = vec![unit("a", "old")];
        let (creates, updates) = fold_into_updates(creates, updates);

        assert_eq!(names(&creates), vec!["b"]);
        assert_eq!(creates[0].image, "y");
        assert_eq!(names(&updates), vec!["a"]);
        assert_eq!(updates[0].image, "new");
    }

    #[test]
    fn test_duplicate_target_identity_collapses() {
        let target = vec![unit("a", "x"), unit("a", "y")];
        let diff = partition(&[], &target);
        assert_eq!(diff.to_create.len(), 1);
        assert_eq!(diff.to_create[0].image, "y");
    }

    fn records() -> impl Strategy<Value = Vec<Instance>> {
        prop::collection::vec(("[a-e]", "[xy]"), 0..8)
            .prop_map(|pairs| pairs.iter().map(|(n, i)| unit(n, i)).collect())
    }

    proptest! {
        #[test]
        fn prop_partition_is_disjoint_and_complete(previous in records(), target in records()) {
            let diff = partition(&previous, &target);

            let create: HashSet<_> = diff.to_create.iter().map(|r| r.name.clone()).collect();
            let update: HashSet<_> = diff.to_update.iter().map(|r| r.name.clone()).collect();
            let delete: HashSet<_> = diff.to_delete.iter().map(|r| r.name.clone()).collect();

            prop_assert_eq!(create.len(), diff.to_create.len());
            prop_assert_eq!(update.len(), diff.to_update.len());
            prop_assert_eq!(delete.len(), diff.to_delete.len());
            prop_assert!(create.is_disjoint(&update));
            prop_assert!(create.is_disjoint(&delete));
            prop_assert!(update.is_disjoint(&delete));

            let before: HashSet<_> = previous.iter().map(|r| r.name.clone()).collect();
            let after: HashSet<_> = target.iter().map(|r| r.name.clone()).collect();
            prop_assert_eq!(&create, &after.difference(&before).cloned().collect::<HashSet<_>>());
            prop_assert_eq!(&delete, &before.difference(&after).cloned().collect::<HashSet<_>>());
            prop_assert!(update.is_subset(&before.intersection(&after).cloned().collect::<HashSet<_>>()));
        }

        #[test]
        fn prop_partition_of_identical_states_is_empty(records in records()) {
            prop_assert!(partition(&records, &records).is_empty());
        }
    }
}
