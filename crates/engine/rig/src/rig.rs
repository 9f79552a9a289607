//! The rig aggregate: a named set of segments sharing one origin and orientation.

use crate::config::{validate_view_distance, RigOptions};
use crate::error::{RigError, RigResult};
use crate::math::{self, Basis, EulerAngles, Orientation};
use crate::protocol::{EntityId, Item, Location, ViewerId, WorldId};
use crate::proxy::{Audience, ProxyBacking, ProxyEntity, SendReport};
use crate::roster::ViewerRoster;
use crate::scheduler::{self, VisibilityChange, VisibilityTask};
use crate::segment::Segment;
use crate::transport::{NativeHost, Transport};
use dashmap::{DashMap, DashSet};
use glam::DVec3;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

pub(crate) type RigMap = DashMap<String, Arc<Rig>>;

/// Capabilities handed to every rig by the registry that created it.
#[derive(Clone)]
pub(crate) struct Services {
    pub transport: Arc<dyn Transport>,
    pub native: Option<Arc<dyn NativeHost>>,
    pub roster: Arc<dyn ViewerRoster>,
    pub entity_ids: Arc<AtomicI32>,
    pub options: RigOptions,
}

impl Services {
    fn next_entity_id(&self) -> EntityId {
        EntityId(self.entity_ids.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy)]
struct Pose {
    origin: DVec3,
    orientation: Orientation,
}

/// A named composite of marker entities.
///
/// In protocol mode every operation may be called from any thread. In native mode the
/// proxies are host engine entities, so mutating calls must be serialized onto the host's
/// primary loop; [`Rig::spawn_move`] refuses native rigs for that reason.
pub struct Rig {
    name: String,
    world: WorldId,
    use_native_mode: bool,
    services: Services,
    registry: Weak<RigMap>,
    pose: RwLock<Pose>,
    view_distance: RwLock<f64>,
    segments: RwLock<Vec<Arc<Segment>>>,
    /// Written only by visibility passes.
    pub(crate) visible: Arc<DashSet<ViewerId>>,
    hidden: DashSet<ViewerId>,
    removed: AtomicBool,
    /// Passes hold this exclusively; broadcasts share it. A pass never interleaves with
    /// an equip or teleport, so a joining viewer always gets spawn before equip.
    pub(crate) traffic: RwLock<()>,
    task: Mutex<Option<VisibilityTask>>,
}

impl Rig {
    pub(crate) fn new(
        name: String,
        origin: Location,
        view_distance: f64,
        use_native_mode: bool,
        services: Services,
        registry: Weak<RigMap>,
    ) -> RigResult<Self> {
        validate_view_distance(view_distance)?;
        if use_native_mode && services.native.is_none() {
            return Err(RigError::NativeHostUnavailable);
        }

        Ok(Self {
            name,
            world: origin.world,
            use_native_mode,
            services,
            registry,
            pose: RwLock::new(Pose {
                origin: origin.position,
                orientation: Orientation::IDENTITY,
            }),
            view_distance: RwLock::new(view_distance),
            segments: RwLock::new(Vec::new()),
            visible: Arc::new(DashSet::new()),
            hidden: DashSet::new(),
            removed: AtomicBool::new(false),
            traffic: RwLock::new(()),
            task: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn world(&self) -> &WorldId {
        &self.world
    }

    pub fn uses_native_mode(&self) -> bool {
        self.use_native_mode
    }

    pub fn options(&self) -> &RigOptions {
        &self.services.options
    }

    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    pub(crate) fn roster(&self) -> &dyn ViewerRoster {
        self.services.roster.as_ref()
    }

    // ---- pose -------------------------------------------------------------------------

    pub fn origin(&self) -> DVec3 {
        self.pose.read().origin
    }

    pub fn location(&self) -> Location {
        Location::new(self.world.clone(), self.origin())
    }

    /// Relocate the rig. Segments follow on the next [`Rig::move_segments`].
    pub fn set_origin(&self, origin: DVec3) {
        self.pose.write().origin = origin;
    }

    pub fn orientation(&self) -> Orientation {
        self.pose.read().orientation
    }

    pub fn basis(&self) -> Basis {
        *self.pose.read().orientation.basis()
    }

    pub fn encoding(&self) -> EulerAngles {
        self.pose.read().orientation.encoding()
    }

    /// Point the rig's +Z axis along `forward` without roll.
    pub fn set_orientation_by_direction(&self, forward: DVec3) -> RigResult<()> {
        let orientation = math::basis_from_direction(forward)?;
        self.pose.write().orientation = orientation;
        Ok(())
    }

    /// Point the rig's +Z axis along `forward`, rolled by `roll_degrees` about it.
    pub fn set_orientation_by_direction_and_roll(
        &self,
        forward: DVec3,
        roll_degrees: f64,
    ) -> RigResult<()> {
        let orientation = math::basis_from_direction_and_roll(forward, roll_degrees)?;
        self.pose.write().orientation = orientation;
        Ok(())
    }

    pub fn set_orientation_by_encoding(&self, encoding: EulerAngles) {
        self.pose.write().orientation = math::basis_from_encoding(encoding);
    }

    pub fn view_distance(&self) -> f64 {
        *self.view_distance.read()
    }

    /// Change the view distance. Takes effect on the next visibility pass.
    pub fn set_view_distance(&self, view_distance: f64) {
        *self.view_distance.write() = view_distance;
    }

    // ---- segments ---------------------------------------------------------------------

    /// Add a segment at `offset` (rig-local, in block units) wearing `item`.
    ///
    /// Current viewers see the new segment immediately.
    pub fn add_segment(
        &self,
        name: impl Into<String>,
        offset: DVec3,
        item: Option<Item>,
    ) -> RigResult<Arc<Segment>> {
        let name = name.into();
        let _traffic = self.traffic.read();
        if self.is_removed() {
            return Err(RigError::RigRemoved(self.name.clone()));
        }

        let mut segments = self.segments.write();
        if segments.iter().any(|segment| segment.name() == name) {
            return Err(RigError::DuplicateSegment {
                rig: self.name.clone(),
                segment: name,
            });
        }

        let pose = *self.pose.read();
        let options = &self.services.options;
        let position = Segment::proxy_position(
            offset,
            pose.origin,
            pose.orientation.basis(),
            options.block_size,
            options.pivot_height,
        );

        let backing = match (&self.services.native, self.use_native_mode) {
            (Some(host), true) => ProxyBacking::Native(host.clone()),
            _ => ProxyBacking::Protocol {
                entity: self.services.next_entity_id(),
                audience: Audience::new(self.services.transport.clone(), self.visible.clone()),
            },
        };
        let proxy =
            ProxyEntity::create(backing, &self.world, position, pose.orientation.encoding())?;

        let segment = Arc::new(Segment::new(name, offset, None, proxy));
        if item.is_some() {
            segment.set_item(item);
        }
        segments.push(segment.clone());
        tracing::debug!("Rig '{}' gained segment '{}'", self.name, segment.name());
        Ok(segment)
    }

    /// Segments in insertion order.
    pub fn segments(&self) -> Vec<Arc<Segment>> {
        self.segments.read().clone()
    }

    pub fn segment(&self, name: &str) -> Option<Arc<Segment>> {
        self.segments
            .read()
            .iter()
            .find(|segment| segment.name() == name)
            .cloned()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.read().len()
    }

    /// Re-equip one segment for everyone currently seeing the rig.
    pub fn set_segment_item(&self, name: &str, item: Option<Item>) -> RigResult<SendReport> {
        let _traffic = self.traffic.read();
        if self.is_removed() {
            return Ok(SendReport::default());
        }
        let segment = self
            .segments
            .read()
            .iter()
            .find(|segment| segment.name() == name)
            .cloned()
            .ok_or_else(|| RigError::UnknownSegment {
                rig: self.name.clone(),
                segment: name.to_string(),
            })?;
        Ok(segment.set_item(item))
    }

    /// Push every segment's world transform to its proxy.
    ///
    /// Positions come from the origin plus the basis-rotated offset; the head pose carries
    /// the rig's rotation encoding. Native rigs must call this on the host loop.
    pub fn move_segments(&self) -> SendReport {
        let _traffic = self.traffic.read();
        if self.is_removed() {
            return SendReport::default();
        }

        let pose = *self.pose.read();
        let options = &self.services.options;
        let encoding = pose.orientation.encoding();
        let mut report = SendReport::default();
        for segment in self.segments.read().iter() {
            let position = Segment::proxy_position(
                segment.offset(),
                pose.origin,
                pose.orientation.basis(),
                options.block_size,
                options.pivot_height,
            );
            report.merge(segment.place(position, encoding));
        }

        if !report.is_clean() {
            tracing::debug!(
                "Rig '{}' moved with {} skipped sends",
                self.name,
                report.failures.len()
            );
        }
        report
    }

    /// Run [`Rig::move_segments`] on the blocking pool.
    pub fn spawn_move(self: &Arc<Self>) -> RigResult<tokio::task::JoinHandle<SendReport>> {
        if self.use_native_mode {
            return Err(RigError::NativeModeRequiresHostLoop(self.name.clone()));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| RigError::NoRuntime)?;
        let rig = self.clone();
        Ok(runtime.spawn_blocking(move || rig.move_segments()))
    }

    // ---- visibility -------------------------------------------------------------------

    /// Viewers currently holding a client-side copy, sorted.
    pub fn visible_viewers(&self) -> Vec<ViewerId> {
        let mut viewers: Vec<ViewerId> = self.visible.iter().map(|v| v.key().clone()).collect();
        viewers.sort_unstable();
        viewers
    }

    pub fn is_visible_to(&self, viewer: &ViewerId) -> bool {
        self.visible.contains(viewer)
    }

    /// Hide the rig from `viewer` regardless of distance.
    ///
    /// Only the hide-list changes here; the viewer's copy is destroyed by the next
    /// visibility pass, so the effect lags by at most one scheduler period.
    pub fn add_hidden_viewer(&self, viewer: ViewerId) -> bool {
        self.hidden.insert(viewer)
    }

    /// Undo [`Rig::add_hidden_viewer`]. The viewer re-enters on the next pass if in range.
    pub fn remove_hidden_viewer(&self, viewer: &ViewerId) -> bool {
        self.hidden.remove(viewer).is_some()
    }

    pub fn is_hidden_from(&self, viewer: &ViewerId) -> bool {
        self.hidden.contains(viewer)
    }

    pub fn hidden_viewers(&self) -> Vec<ViewerId> {
        let mut viewers: Vec<ViewerId> = self.hidden.iter().map(|v| v.key().clone()).collect();
        viewers.sort_unstable();
        viewers
    }

    /// Reconcile the visible set with the roster once, inline.
    pub fn run_visibility_pass(&self) -> VisibilityChange {
        scheduler::run_pass(self)
    }

    /// Start the periodic visibility task on the current Tokio runtime.
    pub fn start_visibility_task(self: &Arc<Self>, period: Duration) -> RigResult<()> {
        if period.is_zero() {
            return Err(RigError::InvalidPeriod);
        }
        let mut task = self.task.lock();
        if self.is_removed() {
            return Ok(());
        }
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return Err(RigError::SchedulerRunning(self.name.clone()));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| RigError::NoRuntime)?;
        *task = Some(VisibilityTask::spawn(&runtime, Arc::downgrade(self), period));
        tracing::info!("Rig '{}' visibility task started ({:?})", self.name, period);
        Ok(())
    }

    /// Stop the visibility task, if any. The visible set is left as is.
    ///
    /// Returns once any in-flight pass has finished; no pass starts afterwards.
    pub fn stop_visibility_task(&self) {
        if let Some(task) = self.task.lock().take() {
            task.cancel();
            drop(self.traffic.write());
        }
    }

    pub fn is_visibility_task_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|t| !t.is_finished())
    }

    // ---- lifecycle --------------------------------------------------------------------

    /// Despawn the rig.
    ///
    /// Cancels the visibility task, destroys every segment for every viewer currently
    /// seeing it, and with `deregister` drops the rig from its registry. No visibility
    /// pass runs once destruction has begun. Calling it again is a no-op.
    pub fn remove(&self, deregister: bool) -> SendReport {
        if self.removed.swap(true, Ordering::AcqRel) {
            return SendReport::default();
        }
        self.stop_visibility_task();

        let mut report = SendReport::default();
        {
            // Waits for an in-flight pass; later passes see `removed` and bail out.
            let _traffic = self.traffic.write();
            for segment in self.segments.read().iter() {
                report.merge(segment.destroy());
            }
        }

        if deregister {
            if let Some(rigs) = self.registry.upgrade() {
                rigs.remove_if(&self.name, |_, rig| std::ptr::eq(Arc::as_ptr(rig), self));
            }
        }

        tracing::info!(
            "Rig '{}' removed ({} destroy sends, {} skipped)",
            self.name,
            report.delivered,
            report.failures.len()
        );
        report
    }
}

impl std::fmt::Debug for Rig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rig")
            .field("name", &self.name)
            .field("world", &self.world)
            .field("native", &self.use_native_mode)
            .field("segments", &self.segment_count())
            .field("visible", &self.visible.len())
            .field("removed", &self.is_removed())
            .finish()
    }
}
