//! Articulated rigs built from invisible marker entities.
//!
//! A [`Rig`] is a named group of [`Segment`]s that share an origin and an orientation.
//! Each segment is backed by one marker entity wearing an item on its head slot; moving
//! or rotating the rig repositions every marker so the worn items line up as one body.
//!
//! Rigs run in one of two modes, fixed when they are created:
//!
//! - **Protocol** (default): markers exist only as messages sent through a
//!   [`Transport`]. A per-rig visibility task spawns and destroys them per viewer as
//!   viewers enter and leave the view distance, honoring a per-rig hide-list.
//! - **Native**: markers are engine entities created through a [`NativeHost`]. The host
//!   handles per-viewer tracking, and every mutating call must run on its primary loop.
//!
//! # Example
//!
//! ```no_run
//! use marionette_rig::{Item, Location, RecordingTransport, Registry, ViewerDirectory, WorldId};
//! use glam::DVec3;
//! use std::sync::Arc;
//!
//! # fn main() -> marionette_rig::RigResult<()> {
//! let transport = Arc::new(RecordingTransport::new());
//! let viewers = Arc::new(ViewerDirectory::new());
//! let registry = Registry::new(transport, viewers);
//!
//! let origin = Location::new(WorldId::new("overworld"), DVec3::ZERO);
//! let rig = registry.create_rig("crane", origin, 48.0, false)?;
//! rig.add_segment("base", DVec3::ZERO, Some(Item::new("iron_block")))?;
//! rig.add_segment("arm", DVec3::new(0.0, 1.0, 0.0), Some(Item::new("stone")))?;
//!
//! rig.set_orientation_by_direction(DVec3::new(1.0, 0.0, 1.0))?;
//! rig.move_segments();
//! rig.run_visibility_pass();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod math;
pub mod protocol;
pub mod proxy;
pub mod registry;
pub mod rig;
pub mod roster;
pub mod scheduler;
pub mod segment;
pub mod transport;

pub use config::{RigOptions, BLOCK_SIZE, DEFAULT_VISIBILITY_PERIOD, HALF_BLOCK_SIZE, HEAD_PIVOT_HEIGHT};
pub use error::{NativeError, RigError, RigResult, TransportError};
pub use math::{Basis, EulerAngles, Orientation};
pub use protocol::{
    BodyRotation, EntityId, EntityKind, EquipmentSlot, Item, Location, ProxyMessage,
    ProxyMetadata, Rotations, ViewerId, WorldId,
};
pub use proxy::{ProxyEntity, SendFailure, SendReport};
pub use registry::Registry;
pub use rig::Rig;
pub use roster::{ViewerDirectory, ViewerRoster, ViewerSnapshot};
pub use scheduler::VisibilityChange;
pub use segment::Segment;
pub use transport::{NativeEntityId, NativeHost, RecordingTransport, Transport};
