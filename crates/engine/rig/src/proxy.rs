//! Marker entities backing rig segments.
//!
//! A [`ProxyEntity`] is either owned by the host engine ([`ProxyHandle::Native`]) or exists
//! only as protocol messages we build ourselves ([`ProxyHandle::Protocol`]). The mode is
//! fixed at construction. Native proxies leave per-viewer bookkeeping to the host, so the
//! per-viewer operations are no-ops for them.

use crate::error::{NativeError, RigResult, TransportError};
use crate::math::EulerAngles;
use crate::protocol::{
    BodyRotation, EntityId, EntityKind, EquipmentSlot, Item, ProxyMetadata, Rotations, ViewerId,
    WorldId,
};
use crate::transport::{NativeEntityId, NativeHost, Transport};
use dashmap::DashSet;
use glam::DVec3;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Slot the segment appearance is worn in.
pub const APPEARANCE_SLOT: EquipmentSlot = EquipmentSlot::Head;

/// The viewers a protocol proxy broadcasts to, plus the transport used to reach them.
///
/// The viewer set is shared with the owning rig; the visibility scheduler writes it and
/// proxies only read it.
#[derive(Clone)]
pub struct Audience {
    transport: Arc<dyn Transport>,
    viewers: Arc<DashSet<ViewerId>>,
}

impl Audience {
    pub fn new(transport: Arc<dyn Transport>, viewers: Arc<DashSet<ViewerId>>) -> Self {
        Self { transport, viewers }
    }

    /// Stable, sorted copy of the current viewers. Sends never hold a set shard lock.
    pub fn snapshot(&self) -> Vec<ViewerId> {
        let mut viewers: Vec<ViewerId> = self.viewers.iter().map(|v| v.key().clone()).collect();
        viewers.sort_unstable();
        viewers
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    fn broadcast<F>(&self, label: &str, entity: EntityId, mut send: F) -> SendReport
    where
        F: FnMut(&dyn Transport, &ViewerId) -> Result<(), TransportError>,
    {
        let mut report = SendReport::default();
        for viewer in self.snapshot() {
            match send(self.transport.as_ref(), &viewer) {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    tracing::warn!("Skipping {} of {} for {}: {}", label, entity, viewer, error);
                    report.failures.push(SendFailure::Viewer { viewer, error });
                }
            }
        }
        report
    }
}

/// A send or native call that did not go through.
#[derive(Debug, Clone, PartialEq)]
pub enum SendFailure {
    Viewer {
        viewer: ViewerId,
        error: TransportError,
    },
    Native(NativeError),
}

/// Outcome of an operation addressed to every current viewer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendReport {
    /// Number of viewers (or native calls) that succeeded.
    pub delivered: usize,
    pub failures: Vec<SendFailure>,
}

impl SendReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn merge(&mut self, other: SendReport) {
        self.delivered += other.delivered;
        self.failures.extend(other.failures);
    }

    fn native(result: Result<(), NativeError>) -> Self {
        match result {
            Ok(()) => Self {
                delivered: 1,
                failures: Vec::new(),
            },
            Err(error) => {
                tracing::warn!("Native entity call failed: {}", error);
                Self {
                    delivered: 0,
                    failures: vec![SendFailure::Native(error)],
                }
            }
        }
    }
}

/// How a new proxy should be backed.
pub enum ProxyBacking {
    Native(Arc<dyn NativeHost>),
    Protocol { entity: EntityId, audience: Audience },
}

/// Host-owned marker entity.
pub struct NativeProxy {
    host: Arc<dyn NativeHost>,
    entity: NativeEntityId,
}

impl NativeProxy {
    pub fn entity(&self) -> NativeEntityId {
        self.entity
    }
}

/// Last state sent for a protocol proxy; replayed when a viewer spawns it.
///
/// The lock is held across each update and its broadcast, so every viewer ends on the
/// state the server holds.
#[derive(Debug, Clone)]
struct ProtocolState {
    position: DVec3,
    head_pose: Rotations,
    item: Option<Item>,
}

/// Marker entity that exists only in the messages we send.
pub struct ProtocolProxy {
    entity: EntityId,
    audience: Audience,
    state: Mutex<ProtocolState>,
}

impl ProtocolProxy {
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    fn spawn_to(
        &self,
        state: &ProtocolState,
        transport: &dyn Transport,
        viewer: &ViewerId,
    ) -> Result<(), TransportError> {
        transport.send_spawn(
            viewer,
            self.entity,
            EntityKind::ArmorStand,
            state.position,
            BodyRotation::default(),
        )?;
        transport.send_metadata(viewer, self.entity, state.metadata())
    }
}

impl ProtocolState {
    fn metadata(&self) -> ProxyMetadata {
        ProxyMetadata {
            head_pose: self.head_pose,
            ..ProxyMetadata::default()
        }
    }
}

pub enum ProxyHandle {
    Native(NativeProxy),
    Protocol(ProtocolProxy),
}

/// The marker entity behind one rig segment.
pub struct ProxyEntity {
    handle: ProxyHandle,
    destroyed: AtomicBool,
}

impl ProxyEntity {
    /// Create the proxy at `position` with its head already posed.
    ///
    /// Native proxies are spawned through the host. Protocol proxies are announced
    /// (spawn + metadata) to every viewer currently in the audience.
    pub fn create(
        backing: ProxyBacking,
        world: &WorldId,
        position: DVec3,
        head_pose: EulerAngles,
    ) -> RigResult<Self> {
        let handle = match backing {
            ProxyBacking::Native(host) => {
                let entity = host.spawn_marker(world, position)?;
                if head_pose != EulerAngles::ZERO {
                    host.set_head_pose(entity, head_pose)?;
                }
                ProxyHandle::Native(NativeProxy { host, entity })
            }
            ProxyBacking::Protocol { entity, audience } => {
                let proxy = ProtocolProxy {
                    entity,
                    audience,
                    state: Mutex::new(ProtocolState {
                        position,
                        head_pose: head_pose.to_rotations(),
                        item: None,
                    }),
                };
                let report = {
                    let state = proxy.state.lock();
                    proxy
                        .audience
                        .broadcast("spawn", entity, |transport, viewer| {
                            proxy.spawn_to(&state, transport, viewer)
                        })
                };
                tracing::trace!("Announced {} to {} viewers", entity, report.delivered);
                ProxyHandle::Protocol(proxy)
            }
        };

        Ok(Self {
            handle,
            destroyed: AtomicBool::new(false),
        })
    }

    pub fn handle(&self) -> &ProxyHandle {
        &self.handle
    }

    pub fn is_native(&self) -> bool {
        matches!(self.handle, ProxyHandle::Native(_))
    }

    /// Protocol entity id, if this proxy is protocol-managed.
    pub fn entity_id(&self) -> Option<EntityId> {
        match &self.handle {
            ProxyHandle::Protocol(proxy) => Some(proxy.entity),
            ProxyHandle::Native(_) => None,
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Last position set on a protocol proxy.
    pub fn position(&self) -> Option<DVec3> {
        match &self.handle {
            ProxyHandle::Protocol(proxy) => Some(proxy.state.lock().position),
            ProxyHandle::Native(_) => None,
        }
    }

    /// Change the worn item for everyone currently seeing the proxy.
    pub fn set_appearance(&self, item: Option<Item>) -> SendReport {
        if self.is_destroyed() {
            return SendReport::default();
        }
        match &self.handle {
            ProxyHandle::Native(native) => SendReport::native(native.host.set_equipment(
                native.entity,
                APPEARANCE_SLOT,
                item,
            )),
            ProxyHandle::Protocol(proxy) => {
                let mut state = proxy.state.lock();
                if self.is_destroyed() {
                    return SendReport::default();
                }
                state.item = item.clone();
                proxy
                    .audience
                    .broadcast("equip", proxy.entity, |transport, viewer| {
                        transport.send_equip(viewer, proxy.entity, APPEARANCE_SLOT, item.clone())
                    })
            }
        }
    }

    /// Spawn (spawn + metadata) the proxy on one viewer's client.
    pub fn send_spawn_to(&self, viewer: &ViewerId) -> Result<(), TransportError> {
        match &self.handle {
            ProxyHandle::Protocol(proxy) => {
                let state = proxy.state.lock();
                if self.is_destroyed() {
                    return Ok(());
                }
                proxy.spawn_to(&state, proxy.audience.transport(), viewer)
            }
            _ => Ok(()),
        }
    }

    /// Re-send the current worn item to one viewer. A fresh client copy has no equipment.
    pub fn send_appearance_to(&self, viewer: &ViewerId) -> Result<(), TransportError> {
        match &self.handle {
            ProxyHandle::Protocol(proxy) => {
                let state = proxy.state.lock();
                if self.is_destroyed() {
                    return Ok(());
                }
                proxy.audience.transport().send_equip(
                    viewer,
                    proxy.entity,
                    APPEARANCE_SLOT,
                    state.item.clone(),
                )
            }
            _ => Ok(()),
        }
    }

    /// Remove the proxy from one viewer's client.
    pub fn send_destroy_to(&self, viewer: &ViewerId) -> Result<(), TransportError> {
        match &self.handle {
            ProxyHandle::Protocol(proxy) => {
                let _state = proxy.state.lock();
                if self.is_destroyed() {
                    return Ok(());
                }
                proxy.audience.transport().send_destroy(viewer, proxy.entity)
            }
            _ => Ok(()),
        }
    }

    /// Move the proxy. Native proxies must only be moved from the host loop.
    pub fn teleport(&self, position: DVec3) -> SendReport {
        if self.is_destroyed() {
            return SendReport::default();
        }
        match &self.handle {
            ProxyHandle::Native(native) => {
                SendReport::native(native.host.teleport(native.entity, position))
            }
            ProxyHandle::Protocol(proxy) => {
                let mut state = proxy.state.lock();
                if self.is_destroyed() {
                    return SendReport::default();
                }
                state.position = position;
                proxy
                    .audience
                    .broadcast("teleport", proxy.entity, |transport, viewer| {
                        transport.send_teleport(
                            viewer,
                            proxy.entity,
                            position,
                            BodyRotation::default(),
                        )
                    })
            }
        }
    }

    /// Update the head rotation channel that orients the worn item.
    pub fn set_head_pose(&self, pose: EulerAngles) -> SendReport {
        if self.is_destroyed() {
            return SendReport::default();
        }
        match &self.handle {
            ProxyHandle::Native(native) => {
                SendReport::native(native.host.set_head_pose(native.entity, pose))
            }
            ProxyHandle::Protocol(proxy) => {
                let mut state = proxy.state.lock();
                if self.is_destroyed() {
                    return SendReport::default();
                }
                state.head_pose = pose.to_rotations();
                let metadata = state.metadata();
                proxy
                    .audience
                    .broadcast("metadata", proxy.entity, |transport, viewer| {
                        transport.send_metadata(viewer, proxy.entity, metadata)
                    })
            }
        }
    }

    /// Destroy the proxy for every current viewer. Calling it again does nothing.
    pub fn destroy(&self) -> SendReport {
        match &self.handle {
            ProxyHandle::Native(native) => {
                if self.destroyed.swap(true, Ordering::AcqRel) {
                    return SendReport::default();
                }
                SendReport::native(native.host.remove(native.entity))
            }
            ProxyHandle::Protocol(proxy) => {
                // Flagged under the state lock: no update can follow the destroy.
                let _state = proxy.state.lock();
                if self.destroyed.swap(true, Ordering::AcqRel) {
                    return SendReport::default();
                }
                proxy
                    .audience
                    .broadcast("destroy", proxy.entity, |transport, viewer| {
                        transport.send_destroy(viewer, proxy.entity)
                    })
            }
        }
    }
}
