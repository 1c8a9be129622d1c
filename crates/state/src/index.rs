// Path: crates/state/src/index.rs

//! Name path reconstruction over a flat object set.
//!
//! Every addressable object gets a path built from its creator chain:
//!
//! - participants, and objects with no creator, are roots: `//<name>`;
//! - a name that already starts with `//` is taken as is;
//! - anything else is `<creator path>/<name>`.
//!
//! For the marketplace this yields `//user`, `//user/user/account`,
//! `//user/asset/currency/USD`, `//user/user/holding/currency/USD` and so on.
//! Deleted entries are skipped, and an object whose chain runs through a
//! missing, deleted, unnamed or cyclic link is left out of the index.

use mkt_types::{ObjectId, ObjectType, RawObjectEntry};
use std::collections::{BTreeMap, HashMap, HashSet};

/// An immutable path index built from one snapshot of the store.
#[derive(Debug, Default, Clone)]
pub struct NameIndex {
    by_path: BTreeMap<ObjectType, BTreeMap<String, ObjectId>>,
    by_id: HashMap<ObjectId, String>,
    objects: HashMap<ObjectId, RawObjectEntry>,
    unresolved: Vec<ObjectId>,
}

impl NameIndex {
    /// Builds an index from a raw store listing.
    pub fn build(entries: Vec<RawObjectEntry>) -> Self {
        NameIndexBuilder::new(entries).build()
    }

    /// Looks up `path` among objects tagged `object_type`.
    pub fn n2i(&self, path: &str, object_type: &ObjectType) -> Option<&ObjectId> {
        self.by_path.get(object_type)?.get(path)
    }

    /// Returns the path an identifier is indexed under.
    pub fn i2n(&self, id: &ObjectId) -> Option<&str> {
        self.by_id.get(id).map(String::as_str)
    }

    pub fn object(&self, id: &ObjectId) -> Option<&RawObjectEntry> {
        self.objects.get(id)
    }

    /// Every `(path, id)` pair of the given type, ordered by path.
    pub fn objects_of_type(&self, object_type: &ObjectType) -> Vec<(&str, &ObjectId)> {
        self.by_path
            .get(object_type)
            .map(|paths| paths.iter().map(|(p, id)| (p.as_str(), id)).collect())
            .unwrap_or_default()
    }

    /// Iterates `(type, path, id)` ordered by type then path.
    pub fn iter(&self) -> impl Iterator<Item = (&ObjectType, &str, &ObjectId)> {
        self.by_path
            .iter()
            .flat_map(|(t, paths)| paths.iter().map(move |(p, id)| (t, p.as_str(), id)))
    }

    /// Identifiers of live objects that could not be given a path.
    pub fn unresolved(&self) -> &[ObjectId] {
        &self.unresolved
    }

    /// Number of indexed paths.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

enum Link {
    Root(String),
    Child { segment: String, creator: ObjectId },
    Unnamed,
}

/// Resolves every live entry's path once, memoizing as it goes.
pub struct NameIndexBuilder {
    arena: HashMap<ObjectId, RawObjectEntry>,
    memo: HashMap<ObjectId, Option<String>>,
}

impl NameIndexBuilder {
    pub fn new(entries: Vec<RawObjectEntry>) -> Self {
        let arena = entries
            .into_iter()
            .filter(|e| !e.deleted)
            .map(|e| (e.id.clone(), e))
            .collect();
        Self {
            arena,
            memo: HashMap::new(),
        }
    }

    pub fn build(mut self) -> NameIndex {
        let mut ids: Vec<ObjectId> = self.arena.keys().cloned().collect();
        ids.sort();

        let mut index = NameIndex::default();
        for id in ids {
            let Some(path) = self.resolve(&id) else {
                index.unresolved.push(id);
                continue;
            };
            let Some(entry) = self.arena.get(&id) else {
                continue;
            };
            let paths = index.by_path.entry(entry.object_type.clone()).or_default();
            if let Some(existing) = paths.get(&path) {
                tracing::warn!(
                    target: "state",
                    "Duplicate {} path {}: keeping {}, ignoring {}",
                    entry.object_type,
                    path,
                    existing,
                    id
                );
                continue;
            }
            paths.insert(path.clone(), id.clone());
            index.by_id.insert(id, path);
        }
        index.objects = self.arena;
        index
    }

    fn link(entry: &RawObjectEntry) -> Link {
        let Some(name) = entry.name.as_deref() else {
            return Link::Unnamed;
        };
        if name.starts_with("//") {
            return Link::Root(name.to_string());
        }
        let segment = name.trim_start_matches('/');
        match (&entry.object_type, &entry.creator) {
            (ObjectType::Participant, _) | (_, None) => Link::Root(format!("//{segment}")),
            (_, Some(creator)) => Link::Child {
                segment: segment.to_string(),
                creator: creator.clone(),
            },
        }
    }

    /// Walks the creator chain from `start` with an explicit stack, then
    /// unwinds it assigning paths. Every id visited is memoized.
    fn resolve(&mut self, start: &ObjectId) -> Option<String> {
        let mut chain: Vec<(ObjectId, String)> = Vec::new();
        let mut on_chain: HashSet<ObjectId> = HashSet::new();
        let mut cursor = start.clone();

        let base = loop {
            if let Some(known) = self.memo.get(&cursor) {
                break known.clone();
            }
            if !on_chain.insert(cursor.clone()) {
                tracing::warn!(
                    target: "state",
                    "Creator chain of {} revisits {}; omitting the cycle from the index",
                    start,
                    cursor
                );
                break None;
            }
            let Some(entry) = self.arena.get(&cursor) else {
                tracing::warn!(
                    target: "state",
                    "Creator chain of {} references missing or deleted object {}",
                    start,
                    cursor
                );
                self.memo.insert(cursor, None);
                break None;
            };
            match Self::link(entry) {
                Link::Root(path) => {
                    self.memo.insert(cursor, Some(path.clone()));
                    break Some(path);
                }
                Link::Unnamed => {
                    self.memo.insert(cursor, None);
                    break None;
                }
                Link::Child { segment, creator } => {
                    chain.push((cursor, segment));
                    cursor = creator;
                }
            }
        };

        let mut current = base;
        while let Some((id, segment)) = chain.pop() {
            current = current.map(|parent| format!("{parent}/{segment}"));
            self.memo.insert(id, current.clone());
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marketplace() -> Vec<RawObjectEntry> {
        vec![
            RawObjectEntry::new("p1", ObjectType::Participant).with_name("user"),
            RawObjectEntry::new("acct", ObjectType::Account)
                .with_name("/user/account")
                .with_creator("p1"),
            RawObjectEntry::new("at-cur", ObjectType::AssetType)
                .with_name("/asset-type/currency")
                .with_creator("p1"),
            RawObjectEntry::new("a-usd", ObjectType::Asset)
                .with_name("/asset/currency/USD")
                .with_creator("p1")
                .with_reference("asset-type", "at-cur"),
            RawObjectEntry::new("h-usd", ObjectType::Holding)
                .with_name("/user/holding/currency/USD")
                .with_creator("p1")
                .with_reference("account", "acct")
                .with_reference("asset", "a-usd"),
        ]
    }

    #[test]
    fn builds_paths_from_creator_chain() {
        let index = NameIndex::build(marketplace());
        assert_eq!(index.len(), 5);
        assert_eq!(index.n2i("//user", &ObjectType::Participant), Some(&"p1".into()));
        assert_eq!(
            index.n2i("//user/user/account", &ObjectType::Account),
            Some(&"acct".into())
        );
        assert_eq!(
            index.n2i("//user/asset/currency/USD", &ObjectType::Asset),
            Some(&"a-usd".into())
        );
        assert_eq!(
            index.n2i("//user/user/holding/currency/USD", &ObjectType::Holding),
            Some(&"h-usd".into())
        );
        assert_eq!(index.i2n(&"at-cur".into()), Some("//user/asset-type/currency"));
    }

    #[test]
    fn lookup_is_qualified_by_type() {
        let mut entries = marketplace();
        // An asset type that shares the asset's path.
        entries.push(
            RawObjectEntry::new("at-shadow", ObjectType::AssetType)
                .with_name("/asset/currency/USD")
                .with_creator("p1"),
        );
        let index = NameIndex::build(entries);
        let path = "//user/asset/currency/USD";
        assert_eq!(index.n2i(path, &ObjectType::Asset), Some(&"a-usd".into()));
        assert_eq!(index.n2i(path, &ObjectType::AssetType), Some(&"at-shadow".into()));
        assert_eq!(index.n2i(path, &ObjectType::Holding), None);
    }

    #[test]
    fn deleted_objects_and_their_dependents_are_absent() {
        let mut entries = marketplace();
        entries[0] = entries[0].clone().deleted();
        let index = NameIndex::build(entries);
        assert!(index.is_empty());
        assert_eq!(index.n2i("//user", &ObjectType::Participant), None);
        assert_eq!(index.unresolved().len(), 4);
        assert!(index.object(&"p1".into()).is_none());
    }

    #[test]
    fn cycles_are_omitted_without_looping() {
        let entries = vec![
            RawObjectEntry::new("x", ObjectType::Account)
                .with_name("/x")
                .with_creator("y"),
            RawObjectEntry::new("y", ObjectType::Account)
                .with_name("/y")
                .with_creator("x"),
            RawObjectEntry::new("z", ObjectType::Holding)
                .with_name("/z")
                .with_creator("x"),
            RawObjectEntry::new("self", ObjectType::Asset)
                .with_name("/self")
                .with_creator("self"),
            RawObjectEntry::new("p", ObjectType::Participant).with_name("ok"),
        ];
        let index = NameIndex::build(entries);
        assert_eq!(index.len(), 1);
        assert_eq!(index.n2i("//ok", &ObjectType::Participant), Some(&"p".into()));
        let mut unresolved: Vec<&str> = index.unresolved().iter().map(ObjectId::as_str).collect();
        unresolved.sort();
        assert_eq!(unresolved, vec!["self", "x", "y", "z"]);
    }

    #[test]
    fn participant_with_self_creator_is_a_root() {
        let entries = vec![RawObjectEntry::new("p", ObjectType::Participant)
            .with_name("user")
            .with_creator("p")];
        let index = NameIndex::build(entries);
        assert_eq!(index.n2i("//user", &ObjectType::Participant), Some(&"p".into()));
    }

    #[test]
    fn duplicate_paths_keep_the_smallest_identifier() {
        let entries = vec![
            RawObjectEntry::new("p2", ObjectType::Participant).with_name("user"),
            RawObjectEntry::new("p1", ObjectType::Participant).with_name("user"),
        ];
        let index = NameIndex::build(entries);
        assert_eq!(index.n2i("//user", &ObjectType::Participant), Some(&"p1".into()));
        assert_eq!(index.i2n(&"p2".into()), None);
    }

    #[test]
    fn long_chains_resolve_iteratively() {
        let mut entries = vec![RawObjectEntry::new("n0", ObjectType::Participant).with_name("root")];
        for i in 1..20_000 {
            entries.push(
                RawObjectEntry::new(format!("n{i}"), ObjectType::Account)
                    .with_name("s")
                    .with_creator(format!("n{}", i - 1)),
            );
        }
        let index = NameIndex::build(entries);
        assert_eq!(index.len(), 20_000);
        let deepest = index.i2n(&"n19999".into()).unwrap();
        assert!(deepest.starts_with("//root/s/s"));
        assert_eq!(deepest.matches("/s").count(), 19_999);
    }

    #[test]
    fn listing_by_type_is_ordered_by_path() {
        let index = NameIndex::build(marketplace());
        let participants = index.objects_of_type(&ObjectType::Participant);
        assert_eq!(participants, vec![("//user", &ObjectId::from("p1"))]);
        assert_eq!(index.iter().count(), 5);
    }
}
