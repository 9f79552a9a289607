//! Message contract shared with the wire transport.
//!
//! The rig core never owns a byte layout. It builds these structured messages and hands
//! them to a [`Transport`](crate::transport::Transport), one viewer at a time. Hosts that
//! want a concrete encoding can use [`ProxyMessage::encode`], which uses bincode just like
//! the rest of the stack.

use crate::error::TransportError;
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a connected viewer (the name used by hide-lists).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewerId(pub String);

impl ViewerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ViewerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier of the world (dimension) an entity or viewer lives in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldId(pub String);

impl WorldId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A position in a specific world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub world: WorldId,
    pub position: DVec3,
}

impl Location {
    pub fn new(world: WorldId, position: DVec3) -> Self {
        Self { world, position }
    }
}

/// Protocol-level entity identifier for proxies that have no native backing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub i32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Entity type announced in the spawn message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum EntityKind {
    #[default]
    ArmorStand = 0,
}

/// Equipment slot an item is worn in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[repr(u8)]
pub enum EquipmentSlot {
    MainHand = 0,
    OffHand = 1,
    Feet = 2,
    Legs = 3,
    Chest = 4,
    #[default]
    Head = 5,
}

/// Appearance worn by a segment's proxy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    /// Material / block key, e.g. `minecraft:stone`.
    pub material: String,
    /// Optional custom model selector.
    pub model_data: Option<i32>,
}

impl Item {
    pub fn new(material: impl Into<String>) -> Self {
        Self {
            material: material.into(),
            model_data: None,
        }
    }

    pub fn with_model_data(mut self, model_data: i32) -> Self {
        self.model_data = Some(model_data);
        self
    }
}

/// Rotation triple in degrees, as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Rotations {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

/// Metadata fields describing a marker proxy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProxyMetadata {
    pub invisible: bool,
    pub no_gravity: bool,
    pub marker: bool,
    /// Secondary rotation channel driving the worn item.
    pub head_pose: Rotations,
}

impl Default for ProxyMetadata {
    fn default() -> Self {
        Self {
            invisible: true,
            no_gravity: true,
            marker: true,
            head_pose: Rotations::default(),
        }
    }
}

/// Facing of the entity body. Rigs carry orientation in the head pose, so this is zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct BodyRotation {
    pub yaw: f32,
    pub pitch: f32,
}

/// Structured message handed to the transport for one viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProxyMessage {
    Spawn {
        entity: EntityId,
        kind: EntityKind,
        position: [f64; 3],
        rotation: BodyRotation,
    },
    Metadata {
        entity: EntityId,
        metadata: ProxyMetadata,
    },
    Teleport {
        entity: EntityId,
        position: [f64; 3],
        rotation: BodyRotation,
    },
    Equip {
        entity: EntityId,
        slot: EquipmentSlot,
        item: Option<Item>,
    },
    Destroy {
        entity: EntityId,
    },
}

impl ProxyMessage {
    pub fn entity(&self) -> EntityId {
        match self {
            Self::Spawn { entity, .. }
            | Self::Metadata { entity, .. }
            | Self::Teleport { entity, .. }
            | Self::Equip { entity, .. }
            | Self::Destroy { entity } => *entity,
        }
    }

    /// Short label used in logs and metrics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Spawn { .. } => "spawn",
            Self::Metadata { .. } => "metadata",
            Self::Teleport { .. } => "teleport",
            Self::Equip { .. } => "equip",
            Self::Destroy { .. } => "destroy",
        }
    }

    /// Serialize to bytes using bincode.
    pub fn encode(&self) -> Result<Vec<u8>, TransportError> {
        bincode::serialize(self).map_err(|e| TransportError::Encoding(e.to_string()))
    }

    /// Deserialize bytes produced by [`ProxyMessage::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, TransportError> {
        bincode::deserialize(bytes).map_err(|e| TransportError::Encoding(e.to_string()))
    }
}
