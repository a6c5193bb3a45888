// ── Object storage ──
//
// One store per controller, plus a session-wide kind index that
// enforces VID uniqueness across controllers: a VID observed once under
// a kind keeps that kind for the whole session.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use vantage_api::Vid;

use crate::model::{ObjectKind, VantageObject};

/// Session-wide VID -> kind map.
#[derive(Default)]
pub struct KindIndex {
    map: DashMap<Vid, ObjectKind>,
}

impl KindIndex {
    /// Claim `vid` for `kind`. Fails with the existing kind when the
    /// VID is already owned by a different one.
    pub(crate) fn claim(&self, vid: Vid, kind: ObjectKind) -> Result<(), ObjectKind> {
        let existing = *self.map.entry(vid).or_insert(kind);
        if existing == kind {
            Ok(())
        } else {
            Err(existing)
        }
    }

    pub(crate) fn release(&self, vid: Vid) {
        self.map.remove(&vid);
    }

    pub fn get(&self, vid: Vid) -> Option<ObjectKind> {
        self.map.get(&vid).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Insertion-order-preserving store for one object kind.
///
/// Values are immutable `Arc` snapshots; mutation is clone-modify-swap,
/// so readers always observe a consistent object.
pub(crate) struct ObjectStore<T> {
    by_vid: DashMap<Vid, Arc<T>>,
    order: Mutex<Vec<Vid>>,
}

impl<T: VantageObject> ObjectStore<T> {
    pub(crate) fn new() -> Self {
        Self {
            by_vid: DashMap::new(),
            order: Mutex::new(Vec::new()),
        }
    }

    /// Insert a new object. Returns the stored handle and whether the
    /// VID was new.
    pub(crate) fn insert(&self, object: T) -> (Arc<T>, bool) {
        let vid = object.info().vid;
        let arc = Arc::new(object);
        let is_new = self.by_vid.insert(vid, Arc::clone(&arc)).is_none();
        if is_new {
            if let Ok(mut order) = self.order.lock() {
                order.push(vid);
            }
        }
        (arc, is_new)
    }

    /// Replace the stored value wholesale, keeping the insertion slot.
    pub(crate) fn replace(&self, vid: Vid, object: T) -> Arc<T> {
        let arc = Arc::new(object);
        self.by_vid.insert(vid, Arc::clone(&arc));
        arc
    }

    /// Clone-modify-swap. Returns the new handle and whether `mutate`
    /// reported a change.
    pub(crate) fn update_with(
        &self,
        vid: Vid,
        mutate: impl FnOnce(&mut T) -> bool,
    ) -> Option<(Arc<T>, bool)> {
        let mut entry = self.by_vid.get_mut(&vid)?;
        let mut object = (**entry.value()).clone();
        let changed = mutate(&mut object);
        let arc = Arc::new(object);
        *entry.value_mut() = Arc::clone(&arc);
        Some((arc, changed))
    }

    pub(crate) fn get(&self, vid: Vid) -> Option<Arc<T>> {
        self.by_vid.get(&vid).map(|entry| Arc::clone(entry.value()))
    }

    pub(crate) fn remove(&self, vid: Vid) -> Option<Arc<T>> {
        let removed = self.by_vid.remove(&vid).map(|(_, value)| value);
        if removed.is_some() {
            if let Ok(mut order) = self.order.lock() {
                order.retain(|v| *v != vid);
            }
        }
        removed
    }

    /// All objects in insertion order.
    pub(crate) fn snapshot(&self) -> Vec<Arc<T>> {
        let order = match self.order.lock() {
            Ok(order) => order.clone(),
            Err(_) => return Vec::new(),
        };
        order
            .iter()
            .filter_map(|vid| self.get(*vid))
            .collect()
    }

    pub(crate) fn vids(&self) -> Vec<Vid> {
        self.order.lock().map(|order| order.clone()).unwrap_or_default()
    }

    pub(crate) fn contains(&self, vid: Vid) -> bool {
        self.by_vid.contains_key(&vid)
    }

    pub(crate) fn len(&self) -> usize {
        self.by_vid.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.by_vid.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{Load, LoadState, ObjectInfo};

    fn load(vid: Vid, name: &str) -> Load {
        Load {
            info: ObjectInfo {
                vid,
                name: name.into(),
                ..ObjectInfo::default()
            },
            load_type: String::new(),
            power_profile: None,
            state: LoadState::default(),
        }
    }

    #[test]
    fn snapshot_preserves_insertion_order() {
        let store: ObjectStore<Load> = ObjectStore::new();
        store.insert(load(30, "c"));
        store.insert(load(10, "a"));
        store.insert(load(20, "b"));

        let vids: Vec<Vid> = store.snapshot().iter().map(|o| o.info.vid).collect();
        assert_eq!(vids, vec![30, 10, 20]);
    }

    #[test]
    fn update_with_reports_changes() {
        let store: ObjectStore<Load> = ObjectStore::new();
        store.insert(load(1, "x"));

        let (updated, changed) = store
            .update_with(1, |obj| {
                obj.state.level = Some(50.0);
                true
            })
            .unwrap();
        assert!(changed);
        assert_eq!(updated.state.level, Some(50.0));
        assert_eq!(store.get(1).unwrap().state.level, Some(50.0));
    }

    #[test]
    fn remove_clears_order_slot() {
        let store: ObjectStore<Load> = ObjectStore::new();
        store.insert(load(1, "x"));
        store.insert(load(2, "y"));
        store.remove(1);

        let vids: Vec<Vid> = store.snapshot().iter().map(|o| o.info.vid).collect();
        assert_eq!(vids, vec![2]);
    }

    #[test]
    fn kind_index_rejects_conflicting_kind() {
        let index = KindIndex::default();
        assert!(index.claim(7, ObjectKind::Load).is_ok());
        assert!(index.claim(7, ObjectKind::Load).is_ok());
        assert_eq!(index.claim(7, ObjectKind::Button), Err(ObjectKind::Load));
        assert_eq!(index.get(7), Some(ObjectKind::Load));
    }
}
