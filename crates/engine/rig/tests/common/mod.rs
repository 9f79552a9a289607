//! Shared fixtures for rig integration tests.
#![allow(dead_code)]

use glam::DVec3;
use marionette_rig::{
    EntityId, Item, Location, ProxyMessage, RecordingTransport, Registry, Rig, ViewerDirectory,
    ViewerId, WorldId,
};
use std::collections::HashMap;
use std::sync::Arc;

pub struct Fixture {
    pub transport: Arc<RecordingTransport>,
    pub viewers: Arc<ViewerDirectory>,
    pub registry: Registry,
}

impl Fixture {
    pub fn new() -> Self {
        let transport = Arc::new(RecordingTransport::new());
        let viewers = Arc::new(ViewerDirectory::new());
        let registry = Registry::new(transport.clone(), viewers.clone());
        Self {
            transport,
            viewers,
            registry,
        }
    }

    /// Connect a viewer in the overworld at `x` blocks east of the world origin.
    pub fn join(&self, name: &str, x: f64) -> ViewerId {
        let id = ViewerId::from(name);
        self.viewers
            .join(id.clone(), overworld(), DVec3::new(x, 0.0, 0.0));
        id
    }

    pub fn walk_to(&self, viewer: &ViewerId, x: f64) {
        assert!(self.viewers.set_position(viewer, DVec3::new(x, 0.0, 0.0)));
    }

    /// A protocol rig at the overworld origin with `segments` stacked segments.
    pub fn rig(&self, name: &str, view_distance: f64, segments: usize) -> Arc<Rig> {
        let rig = self
            .registry
            .create_rig(name, origin(), view_distance, false)
            .unwrap();
        for i in 0..segments {
            rig.add_segment(
                format!("segment-{}", i),
                DVec3::new(0.0, i as f64, 0.0),
                Some(Item::new("stone").with_model_data(i as i32)),
            )
            .unwrap();
        }
        rig
    }

    pub fn count(&self, viewer: &ViewerId, kind: &str) -> usize {
        self.transport.count(viewer, kind)
    }
}

pub fn overworld() -> WorldId {
    WorldId::new("overworld")
}

pub fn origin() -> Location {
    Location::new(overworld(), DVec3::ZERO)
}

pub fn assert_close(actual: DVec3, expected: DVec3) {
    assert!(
        actual.distance(expected) < 1e-9,
        "expected {:?}, got {:?}",
        expected,
        actual
    );
}

/// One entity as a client would hold it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientEntity {
    pub position: [f64; 3],
    pub item: Option<Item>,
}

/// Replays one viewer's messages the way a client applies them.
#[derive(Debug, Default)]
pub struct ClientView {
    pub live: HashMap<EntityId, ClientEntity>,
    /// Messages that made no sense for the client's state at the time.
    pub errors: Vec<String>,
}

impl ClientView {
    pub fn replay(messages: &[ProxyMessage]) -> Self {
        let mut view = Self::default();
        for message in messages {
            let entity = message.entity();
            match message {
                ProxyMessage::Spawn { position, .. } => {
                    let previous = view.live.insert(
                        entity,
                        ClientEntity {
                            position: *position,
                            item: None,
                        },
                    );
                    if previous.is_some() {
                        view.errors.push(format!("{} spawned twice", entity));
                    }
                }
                ProxyMessage::Destroy { .. } => {
                    if view.live.remove(&entity).is_none() {
                        view.errors.push(format!("destroy of unknown {}", entity));
                    }
                }
                other => match view.live.get_mut(&entity) {
                    Some(state) => match other {
                        ProxyMessage::Teleport { position, .. } => state.position = *position,
                        ProxyMessage::Equip { item, .. } => state.item = item.clone(),
                        _ => {}
                    },
                    None => view
                        .errors
                        .push(format!("{} before spawn of {}", other.kind_name(), entity)),
                },
            }
        }
        view
    }
}
