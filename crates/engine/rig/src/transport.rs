//! Outbound transport and native entity capabilities.
//!
//! These traits are the only seams between the rig core and its host. The transport
//! delivers ordered, reliable messages to one viewer at a time; the native host owns
//! engine-managed entities for rigs running in native mode.

use crate::error::{NativeError, TransportError};
use crate::math::EulerAngles;
use crate::protocol::{
    BodyRotation, EntityId, EntityKind, EquipmentSlot, Item, ProxyMessage, ProxyMetadata,
    ViewerId, WorldId,
};
use dashmap::DashSet;
use glam::DVec3;
use parking_lot::Mutex;

/// Per-viewer, ordered, fire-and-forget message sink.
///
/// The provided methods build a [`ProxyMessage`] and route it through [`Transport::send`],
/// so an implementation only has to deliver one message to one viewer.
pub trait Transport: Send + Sync {
    /// Deliver one message to one viewer.
    fn send(&self, viewer: &ViewerId, message: ProxyMessage) -> Result<(), TransportError>;

    fn send_spawn(
        &self,
        viewer: &ViewerId,
        entity: EntityId,
        kind: EntityKind,
        position: DVec3,
        rotation: BodyRotation,
    ) -> Result<(), TransportError> {
        self.send(
            viewer,
            ProxyMessage::Spawn {
                entity,
                kind,
                position: position.to_array(),
                rotation,
            },
        )
    }

    fn send_metadata(
        &self,
        viewer: &ViewerId,
        entity: EntityId,
        metadata: ProxyMetadata,
    ) -> Result<(), TransportError> {
        self.send(viewer, ProxyMessage::Metadata { entity, metadata })
    }

    fn send_teleport(
        &self,
        viewer: &ViewerId,
        entity: EntityId,
        position: DVec3,
        rotation: BodyRotation,
    ) -> Result<(), TransportError> {
        self.send(
            viewer,
            ProxyMessage::Teleport {
                entity,
                position: position.to_array(),
                rotation,
            },
        )
    }

    fn send_equip(
        &self,
        viewer: &ViewerId,
        entity: EntityId,
        slot: EquipmentSlot,
        item: Option<Item>,
    ) -> Result<(), TransportError> {
        self.send(viewer, ProxyMessage::Equip { entity, slot, item })
    }

    fn send_destroy(&self, viewer: &ViewerId, entity: EntityId) -> Result<(), TransportError> {
        self.send(viewer, ProxyMessage::Destroy { entity })
    }
}

/// Handle to an entity owned by the host engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeEntityId(pub u64);

/// Host engine entity API, used only by rigs in native mode.
///
/// Calls must happen on the host's primary loop; the host performs its own per-viewer
/// visibility bookkeeping for these entities.
pub trait NativeHost: Send + Sync {
    /// Spawn an invisible, gravity-less marker entity.
    fn spawn_marker(&self, world: &WorldId, position: DVec3) -> Result<NativeEntityId, NativeError>;

    fn teleport(&self, entity: NativeEntityId, position: DVec3) -> Result<(), NativeError>;

    fn set_head_pose(&self, entity: NativeEntityId, pose: EulerAngles) -> Result<(), NativeError>;

    fn set_equipment(
        &self,
        entity: NativeEntityId,
        slot: EquipmentSlot,
        item: Option<Item>,
    ) -> Result<(), NativeError>;

    fn remove(&self, entity: NativeEntityId) -> Result<(), NativeError>;
}

/// In-memory transport that records every message in send order.
///
/// Hosts use it for dry runs; tests use it to assert on per-viewer traffic. Viewers marked
/// with [`RecordingTransport::disconnect`] fail every send with [`TransportError::ViewerGone`].
#[derive(Debug, Default)]
pub struct RecordingTransport {
    log: Mutex<Vec<(ViewerId, ProxyMessage)>>,
    unreachable: DashSet<ViewerId>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent send to `viewer` fail.
    pub fn disconnect(&self, viewer: &ViewerId) {
        self.unreachable.insert(viewer.clone());
    }

    pub fn reconnect(&self, viewer: &ViewerId) {
        self.unreachable.remove(viewer);
    }

    /// All messages delivered to `viewer`, oldest first.
    pub fn messages_for(&self, viewer: &ViewerId) -> Vec<ProxyMessage> {
        self.log
            .lock()
            .iter()
            .filter(|(to, _)| to == viewer)
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Number of messages of the given kind (see [`ProxyMessage::kind_name`]) sent to `viewer`.
    pub fn count(&self, viewer: &ViewerId, kind: &str) -> usize {
        self.log
            .lock()
            .iter()
            .filter(|(to, message)| to == viewer && message.kind_name() == kind)
            .count()
    }

    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.lock().is_empty()
    }

    /// Drain the log.
    pub fn take(&self) -> Vec<(ViewerId, ProxyMessage)> {
        std::mem::take(&mut *self.log.lock())
    }

    pub fn clear(&self) {
        self.log.lock().clear();
    }
}

impl Transport for RecordingTransport {
    fn send(&self, viewer: &ViewerId, message: ProxyMessage) -> Result<(), TransportError> {
        if self.unreachable.contains(viewer) {
            return Err(TransportError::ViewerGone(viewer.clone()));
        }
        self.log.lock().push((viewer.clone(), message));
        Ok(())
    }
}
