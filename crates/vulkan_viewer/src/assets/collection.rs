//! Id-keyed asset storage
//!
//! Each collection owns its own monotonic counter, so ids are stable for the
//! collection's lifetime and never reused. Iteration follows insertion order.

use super::{Asset, AssetError};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

/// Typed id for an asset stored in an [`AssetCollection`]
pub struct AssetId<T> {
    raw: u32,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> AssetId<T> {
    fn new(raw: u32) -> Self {
        Self {
            raw,
            _phantom: PhantomData,
        }
    }

    /// The underlying counter value
    pub fn raw(self) -> u32 {
        self.raw
    }
}

// Manual impls: derives would put bounds on `T`.
impl<T> Clone for AssetId<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for AssetId<T> {}

impl<T> PartialEq for AssetId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for AssetId<T> {}

impl<T> PartialOrd for AssetId<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for AssetId<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<T> std::hash::Hash for AssetId<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T: Asset> fmt::Debug for AssetId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", T::KIND, self.raw)
    }
}

/// Insertion-ordered map from [`AssetId`] to asset
pub struct AssetCollection<T> {
    next_id: u32,
    items: BTreeMap<AssetId<T>, T>,
}

impl<T: Asset> AssetCollection<T> {
    /// Create an empty collection
    pub fn new() -> Self {
        Self {
            next_id: 0,
            items: BTreeMap::new(),
        }
    }

    /// Insert an asset and return its new id
    pub fn insert(&mut self, asset: T) -> AssetId<T> {
        let id = AssetId::new(self.next_id);
        self.next_id += 1;
        self.items.insert(id, asset);
        log::debug!("Inserted {id:?}");
        id
    }

    /// Look up an asset by id
    pub fn get(&self, id: AssetId<T>) -> Result<&T, AssetError> {
        self.items.get(&id).ok_or(AssetError::NotFound {
            kind: T::KIND,
            id: id.raw,
        })
    }

    /// Remove an asset; its id is never handed out again
    pub fn remove(&mut self, id: AssetId<T>) -> Result<T, AssetError> {
        self.items.remove(&id).ok_or(AssetError::NotFound {
            kind: T::KIND,
            id: id.raw,
        })
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (AssetId<T>, &T)> + '_ {
        self.items.iter().map(|(id, asset)| (*id, asset))
    }

    /// Number of stored assets
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the collection is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T: Asset> Default for AssetCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Dummy(&'static str);

    impl Asset for Dummy {
        const KIND: &'static str = "dummy";
    }

    #[test]
    fn ids_are_monotonic_and_never_reused() {
        let mut collection = AssetCollection::new();
        let a = collection.insert(Dummy("a"));
        let b = collection.insert(Dummy("b"));
        collection.remove(b).unwrap();
        let c = collection.insert(Dummy("c"));
        assert!(a < b && b < c);
        assert_eq!(c.raw(), 2);
    }

    #[test]
    fn known_id_returns_inserted_object() {
        let mut collection = AssetCollection::new();
        let _ = collection.insert(Dummy("first"));
        let id = collection.insert(Dummy("second"));
        assert_eq!(collection.get(id).unwrap(), &Dummy("second"));
    }

    #[test]
    fn unknown_id_is_not_found() {
        let mut other = AssetCollection::new();
        let _ = other.insert(Dummy("x"));
        let foreign = other.insert(Dummy("y"));

        let collection: AssetCollection<Dummy> = AssetCollection::new();
        match collection.get(foreign) {
            Err(AssetError::NotFound { kind, id }) => {
                assert_eq!(kind, "dummy");
                assert_eq!(id, 1);
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn iteration_follows_insertion_order() {
        let mut collection = AssetCollection::new();
        for name in ["c", "a", "b"] {
            collection.insert(Dummy(name));
        }
        let names: Vec<_> = collection.iter().map(|(_, d)| d.0).collect();
        assert_eq!(names, ["c", "a", "b"]);
        assert_eq!(collection.len(), 3);
    }
}
