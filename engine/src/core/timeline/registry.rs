//! Subtitle Id Registry
//!
//! Bidirectional mapping between stable item ids and subtitle start times.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use tracing::trace;

use crate::core::{GenTime, ItemId};

/// Owner of subtitle identity
///
/// Implemented by the timeline. Registering an id that is already known replaces its
/// start time (this is how moves and left-edge resizes are reported).
pub trait SubtitleRegistry: Send + Sync {
    fn register_subtitle(&self, id: ItemId, start: GenTime, temporary: bool);

    fn deregister_subtitle(&self, id: ItemId, temporary: bool);

    fn start_for_id(&self, id: ItemId) -> Option<GenTime>;

    fn id_for_start(&self, start: GenTime) -> Option<ItemId>;

    /// Whether `id` is registered as a temporary item
    fn is_temporary(&self, id: ItemId) -> bool;

    /// Allocates a fresh item id. Saturates at `ItemId::MAX`; a saturated id collides
    /// with the registered one and the insertion is rejected.
    fn next_id(&self) -> ItemId;
}

#[derive(Debug, Clone, Copy)]
struct Registration {
    start: GenTime,
    temporary: bool,
}

/// In-process timeline registry
#[derive(Debug)]
pub struct TimelineRegistry {
    items: Mutex<HashMap<ItemId, Registration>>,
    next_id: AtomicI64,
}

impl TimelineRegistry {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    fn with_items<T>(&self, f: impl FnOnce(&mut HashMap<ItemId, Registration>) -> T) -> T {
        let mut guard = self.items.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    /// All registered ids, sorted
    pub fn ids(&self) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = self.with_items(|items| items.keys().copied().collect());
        ids.sort_unstable();
        ids
    }

    /// Number of non-temporary registrations
    pub fn len(&self) -> usize {
        self.with_items(|items| items.values().filter(|r| !r.temporary).count())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TimelineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubtitleRegistry for TimelineRegistry {
    fn register_subtitle(&self, id: ItemId, start: GenTime, temporary: bool) {
        trace!(id, start = %start, temporary, "Registering subtitle");
        self.with_items(|items| {
            items.insert(id, Registration { start, temporary });
        });
        // Keep the allocator ahead of externally chosen ids.
        self.next_id.fetch_max(id.saturating_add(1), Ordering::SeqCst);
    }

    fn deregister_subtitle(&self, id: ItemId, temporary: bool) {
        trace!(id, temporary, "Deregistering subtitle");
        self.with_items(|items| {
            items.remove(&id);
        });
    }

    fn start_for_id(&self, id: ItemId) -> Option<GenTime> {
        self.with_items(|items| items.get(&id).map(|r| r.start))
    }

    fn id_for_start(&self, start: GenTime) -> Option<ItemId> {
        self.with_items(|items| {
            items
                .iter()
                .find(|(_, r)| r.start == start)
                .map(|(id, _)| *id)
        })
    }

    fn is_temporary(&self, id: ItemId) -> bool {
        self.with_items(|items| items.get(&id).is_some_and(|r| r.temporary))
    }

    fn next_id(&self) -> ItemId {
        match self
            .next_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_add(1)))
        {
            Ok(id) | Err(id) => id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_replaces_start() {
        let registry = TimelineRegistry::new();
        registry.register_subtitle(4, GenTime::from_seconds(1.0), false);
        registry.register_subtitle(4, GenTime::from_seconds(2.0), false);

        assert_eq!(registry.start_for_id(4), Some(GenTime::from_seconds(2.0)));
        assert_eq!(registry.id_for_start(GenTime::from_seconds(2.0)), Some(4));
        assert_eq!(registry.id_for_start(GenTime::from_seconds(1.0)), None);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn allocator_skips_external_ids() {
        let registry = TimelineRegistry::new();
        registry.register_subtitle(10, GenTime::ZERO, false);
        assert_eq!(registry.next_id(), 11);
        assert_eq!(registry.next_id(), 12);
    }

    #[test]
    fn allocator_saturates_at_max_id() {
        let registry = TimelineRegistry::new();
        registry.register_subtitle(ItemId::MAX, GenTime::ZERO, false);
        assert_eq!(registry.next_id(), ItemId::MAX);
        assert_eq!(registry.next_id(), ItemId::MAX);
        assert_eq!(registry.start_for_id(ItemId::MAX), Some(GenTime::ZERO));
    }

    #[test]
    fn temporary_items_are_not_counted() {
        let registry = TimelineRegistry::new();
        registry.register_subtitle(1, GenTime::ZERO, true);
        registry.register_subtitle(2, GenTime::from_seconds(1.0), false);
        assert_eq!(registry.len(), 1);
        assert!(registry.is_temporary(1));
        assert_eq!(registry.ids(), vec![1, 2]);

        registry.deregister_subtitle(1, true);
        assert_eq!(registry.ids(), vec![2]);
    }
}
