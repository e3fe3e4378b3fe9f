//! Snap Point Registry
//!
//! Snap points are frame positions the timeline gravitates toward while dragging.
//! The subtitle model keeps one point per entry boundary in every registered observer.
//!
//! Observers are held weakly: the model never keeps a timeline view alive, and dead
//! observers are dropped on the next broadcast.

use std::collections::BTreeMap;
use std::sync::{Mutex, Weak};

use tracing::debug;

use crate::core::Frame;

/// Receiver of snap point updates
pub trait SnapObserver: Send + Sync {
    /// Adds a snap point at `position`
    fn add_point(&self, position: Frame);

    /// Removes one occurrence of the snap point at `position`
    fn remove_point(&self, position: Frame);
}

// =============================================================================
// Snap Registry
// =============================================================================

/// Weakly-held fan-out list of snap observers
#[derive(Default)]
pub struct SnapRegistry {
    observers: Vec<Weak<dyn SnapObserver>>,
}

impl std::fmt::Debug for SnapRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapRegistry")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl SnapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer. Returns false if it is already dead.
    pub fn register(&mut self, observer: Weak<dyn SnapObserver>) -> bool {
        if observer.upgrade().is_none() {
            return false;
        }
        self.observers.push(observer);
        true
    }

    /// Number of registered observers, including ones not yet pruned
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Calls `f` on every live observer and prunes the dead ones
    fn broadcast(&mut self, f: impl Fn(&dyn SnapObserver)) {
        let before = self.observers.len();
        let mut alive = Vec::with_capacity(before);
        for weak in self.observers.drain(..) {
            if let Some(observer) = weak.upgrade() {
                f(observer.as_ref());
                alive.push(weak);
            }
        }
        if alive.len() != before {
            debug!(pruned = before - alive.len(), "Dropped dead snap observers");
        }
        self.observers = alive;
    }

    pub fn add_point(&mut self, position: Frame) {
        self.broadcast(|o| o.add_point(position));
    }

    pub fn remove_point(&mut self, position: Frame) {
        self.broadcast(|o| o.remove_point(position));
    }

    /// Replaces `old` by `new` in every observer
    pub fn move_point(&mut self, old: Frame, new: Frame) {
        self.broadcast(|o| {
            o.remove_point(old);
            o.add_point(new);
        });
    }
}

// =============================================================================
// Snap Model
// =============================================================================

/// Reference-counted set of snap points
///
/// Two items sharing a boundary register the same frame twice; the point only
/// disappears once both are removed.
#[derive(Debug, Default)]
pub struct SnapModel {
    points: Mutex<BTreeMap<Frame, usize>>,
}

impl SnapModel {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_points<T>(&self, f: impl FnOnce(&mut BTreeMap<Frame, usize>) -> T) -> T {
        let mut guard = self.points.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    /// Distinct snap points in ascending order
    pub fn points(&self) -> Vec<Frame> {
        self.with_points(|p| p.keys().copied().collect())
    }

    pub fn contains(&self, position: Frame) -> bool {
        self.with_points(|p| p.contains_key(&position))
    }

    /// Number of registrations at `position`
    pub fn count(&self, position: Frame) -> usize {
        self.with_points(|p| p.get(&position).copied().unwrap_or(0))
    }

    /// First point strictly after `position`
    pub fn next_point(&self, position: Frame) -> Option<Frame> {
        self.with_points(|p| p.range(position + 1..).next().map(|(k, _)| *k))
    }

    /// Last point strictly before `position`
    pub fn previous_point(&self, position: Frame) -> Option<Frame> {
        self.with_points(|p| p.range(..position).next_back().map(|(k, _)| *k))
    }

    /// Point nearest to `position`; ties resolve to the earlier point
    pub fn closest_point(&self, position: Frame) -> Option<Frame> {
        self.with_points(|p| {
            let before = p.range(..=position).next_back().map(|(k, _)| *k);
            let after = p.range(position..).next().map(|(k, _)| *k);
            match (before, after) {
                (Some(b), Some(a)) => {
                    if position - b <= a - position {
                        Some(b)
                    } else {
                        Some(a)
                    }
                }
                (b, a) => b.or(a),
            }
        })
    }

    /// Snaps `position` to the closest point within `distance` frames
    pub fn snap(&self, position: Frame, distance: Frame) -> Option<Frame> {
        self.closest_point(position)
            .filter(|point| (point - position).abs() <= distance)
    }
}

impl SnapObserver for SnapModel {
    fn add_point(&self, position: Frame) {
        self.with_points(|p| *p.entry(position).or_insert(0) += 1);
    }

    fn remove_point(&self, position: Frame) {
        self.with_points(|p| {
            if let Some(count) = p.get_mut(&position) {
                *count -= 1;
                if *count == 0 {
                    p.remove(&position);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn shared_points_are_reference_counted() {
        let snaps = SnapModel::new();
        snaps.add_point(50);
        snaps.add_point(50);
        snaps.remove_point(50);
        assert!(snaps.contains(50));
        snaps.remove_point(50);
        assert!(!snaps.contains(50));
        // Removing an absent point is a no-op
        snaps.remove_point(50);
        assert_eq!(snaps.count(50), 0);
    }

    #[test]
    fn closest_and_neighbour_queries() {
        let snaps = SnapModel::new();
        for p in [10, 20, 40] {
            snaps.add_point(p);
        }
        assert_eq!(snaps.closest_point(14), Some(10));
        assert_eq!(snaps.closest_point(15), Some(10));
        assert_eq!(snaps.closest_point(31), Some(40));
        assert_eq!(snaps.next_point(20), Some(40));
        assert_eq!(snaps.previous_point(20), Some(10));
        assert_eq!(snaps.snap(37, 2), None);
        assert_eq!(snaps.snap(38, 2), Some(40));
    }

    #[test]
    fn registry_prunes_dead_observers() {
        let live = Arc::new(SnapModel::new());
        let dead = Arc::new(SnapModel::new());

        let mut registry = SnapRegistry::new();
        let live_obs: Arc<dyn SnapObserver> = live.clone();
        let dead_obs: Arc<dyn SnapObserver> = dead.clone();
        assert!(registry.register(Arc::downgrade(&live_obs)));
        assert!(registry.register(Arc::downgrade(&dead_obs)));
        assert_eq!(registry.len(), 2);

        drop(dead_obs);
        drop(dead);
        registry.add_point(5);

        assert_eq!(registry.len(), 1);
        assert_eq!(live.points(), vec![5]);

        registry.move_point(5, 9);
        assert_eq!(live.points(), vec![9]);
    }

    #[test]
    fn registering_dead_observer_fails() {
        let mut registry = SnapRegistry::new();
        let weak = {
            let obs: Arc<dyn SnapObserver> = Arc::new(SnapModel::new());
            Arc::downgrade(&obs)
        };
        assert!(!registry.register(weak));
        assert!(registry.is_empty());
    }
}
