//! Connected viewers and where they stand.

use crate::protocol::{ViewerId, WorldId};
use dashmap::DashMap;
use glam::DVec3;

/// A connected viewer at the moment the roster was read.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerSnapshot {
    pub id: ViewerId,
    pub world: WorldId,
    pub position: DVec3,
}

impl ViewerSnapshot {
    pub fn new(id: impl Into<String>, world: WorldId, position: DVec3) -> Self {
        Self {
            id: ViewerId::new(id),
            world,
            position,
        }
    }

    pub fn distance_to(&self, point: DVec3) -> f64 {
        self.position.distance(point)
    }

    /// True when the viewer is in `world` and no further than `radius` from `point`.
    pub fn is_within(&self, world: &WorldId, point: DVec3, radius: f64) -> bool {
        &self.world == world && self.position.distance_squared(point) <= radius * radius
    }
}

/// Enumerates currently connected viewers.
pub trait ViewerRoster: Send + Sync {
    fn viewers(&self) -> Vec<ViewerSnapshot>;
}

/// In-memory roster the host keeps up to date as viewers join, move and leave.
#[derive(Debug, Default)]
pub struct ViewerDirectory {
    viewers: DashMap<ViewerId, ViewerSnapshot>,
}

impl ViewerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, id: ViewerId, world: WorldId, position: DVec3) {
        self.viewers.insert(
            id.clone(),
            ViewerSnapshot {
                id,
                world,
                position,
            },
        );
    }

    pub fn leave(&self, id: &ViewerId) -> bool {
        self.viewers.remove(id).is_some()
    }

    /// Update a viewer's position; returns false if the viewer is not connected.
    pub fn set_position(&self, id: &ViewerId, position: DVec3) -> bool {
        match self.viewers.get_mut(id) {
            Some(mut viewer) => {
                viewer.position = position;
                true
            }
            None => false,
        }
    }

    pub fn set_world(&self, id: &ViewerId, world: WorldId, position: DVec3) -> bool {
        match self.viewers.get_mut(id) {
            Some(mut viewer) => {
                viewer.world = world;
                viewer.position = position;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &ViewerId) -> Option<ViewerSnapshot> {
        self.viewers.get(id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.viewers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewers.is_empty()
    }

    /// Viewers in `world` within `radius` of `center`.
    pub fn viewers_in_radius(&self, world: &WorldId, center: DVec3, radius: f64) -> Vec<ViewerId> {
        self.viewers
            .iter()
            .filter(|entry| entry.value().is_within(world, center, radius))
            .map(|entry| entry.key().clone())
            .collect()
    }
}

impl ViewerRoster for ViewerDirectory {
    fn viewers(&self) -> Vec<ViewerSnapshot> {
        self.viewers
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}
