//! Rig segments: one independently positioned and equipped part of a rig.

use crate::error::TransportError;
use crate::math::{Basis, EulerAngles};
use crate::protocol::{Item, ViewerId};
use crate::proxy::{ProxyEntity, SendReport};
use glam::DVec3;
use parking_lot::Mutex;

pub struct Segment {
    name: String,
    /// Offset from the rig origin in rig-local block units.
    offset: DVec3,
    item: Mutex<Option<Item>>,
    proxy: ProxyEntity,
}

impl Segment {
    pub(crate) fn new(name: String, offset: DVec3, item: Option<Item>, proxy: ProxyEntity) -> Self {
        Self {
            name,
            offset,
            item: Mutex::new(item),
            proxy,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offset(&self) -> DVec3 {
        self.offset
    }

    pub fn item(&self) -> Option<Item> {
        self.item.lock().clone()
    }

    pub fn proxy(&self) -> &ProxyEntity {
        &self.proxy
    }

    /// Where the proxy must stand so the worn item is centered on this segment.
    pub fn proxy_position(
        offset: DVec3,
        origin: DVec3,
        basis: &Basis,
        block_size: f64,
        pivot_height: f64,
    ) -> DVec3 {
        origin + basis.local_to_world(offset * block_size) - DVec3::Y * pivot_height
    }

    pub(crate) fn set_item(&self, item: Option<Item>) -> SendReport {
        // Held across the broadcast so the stored item and the proxy agree.
        let mut current = self.item.lock();
        *current = item.clone();
        self.proxy.set_appearance(item)
    }

    pub(crate) fn place(&self, position: DVec3, pose: EulerAngles) -> SendReport {
        let mut report = self.proxy.teleport(position);
        report.merge(self.proxy.set_head_pose(pose));
        report
    }

    pub(crate) fn send_spawn_to(&self, viewer: &ViewerId) -> Result<(), TransportError> {
        self.proxy.send_spawn_to(viewer)
    }

    pub(crate) fn send_appearance_to(&self, viewer: &ViewerId) -> Result<(), TransportError> {
        self.proxy.send_appearance_to(viewer)
    }

    pub(crate) fn send_destroy_to(&self, viewer: &ViewerId) -> Result<(), TransportError> {
        self.proxy.send_destroy_to(viewer)
    }

    pub(crate) fn destroy(&self) -> SendReport {
        self.proxy.destroy()
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("name", &self.name)
            .field("offset", &self.offset)
            .field("entity", &self.proxy.entity_id())
            .field("destroyed", &self.proxy.is_destroyed())
            .finish()
    }
}
