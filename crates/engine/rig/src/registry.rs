//! Name-indexed collection of live rigs.

use crate::config::{validate_view_distance, RigOptions};
use crate::error::{RigError, RigResult};
use crate::protocol::Location;
use crate::proxy::SendReport;
use crate::rig::{Rig, RigMap, Services};
use crate::roster::ViewerRoster;
use crate::transport::{NativeHost, Transport};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::AtomicI32;
use std::sync::Arc;

/// First protocol entity id handed out. Kept well above ids a host engine allocates.
const FIRST_ENTITY_ID: i32 = 1 << 28;

/// Owns every rig and the capabilities they share.
///
/// Hosts construct one registry and pass it to whatever needs to create or find rigs.
pub struct Registry {
    rigs: Arc<RigMap>,
    services: Services,
}

impl Registry {
    pub fn new(transport: Arc<dyn Transport>, roster: Arc<dyn ViewerRoster>) -> Self {
        Self {
            rigs: Arc::new(DashMap::new()),
            services: Services {
                transport,
                native: None,
                roster,
                entity_ids: Arc::new(AtomicI32::new(FIRST_ENTITY_ID)),
                options: RigOptions::default(),
            },
        }
    }

    /// Enable native mode rigs backed by `host`.
    pub fn with_native_host(mut self, host: Arc<dyn NativeHost>) -> Self {
        self.services.native = Some(host);
        self
    }

    pub fn with_options(mut self, options: RigOptions) -> RigResult<Self> {
        options.validate()?;
        self.services.options = options;
        Ok(self)
    }

    pub fn options(&self) -> &RigOptions {
        &self.services.options
    }

    pub fn has_native_host(&self) -> bool {
        self.services.native.is_some()
    }

    /// Create and register a rig.
    ///
    /// Fails on a non-finite or non-positive view distance, a name already in use, or
    /// native mode without a native host. The rig starts with no segments and no
    /// visibility task.
    pub fn create_rig(
        &self,
        name: impl Into<String>,
        origin: Location,
        view_distance: f64,
        use_native_mode: bool,
    ) -> RigResult<Arc<Rig>> {
        let name = name.into();
        validate_view_distance(view_distance)?;
        if use_native_mode && self.services.native.is_none() {
            return Err(RigError::NativeHostUnavailable);
        }

        match self.rigs.entry(name.clone()) {
            Entry::Occupied(_) => Err(RigError::DuplicateRig(name)),
            Entry::Vacant(slot) => {
                let rig = Arc::new(Rig::new(
                    name.clone(),
                    origin,
                    view_distance,
                    use_native_mode,
                    self.services.clone(),
                    Arc::downgrade(&self.rigs),
                )?);
                slot.insert(rig.clone());
                tracing::info!(
                    "Created rig '{}' in {} (view distance {}, native: {})",
                    name,
                    rig.world(),
                    view_distance,
                    use_native_mode
                );
                Ok(rig)
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Rig>> {
        self.rigs.get(name).map(|entry| entry.value().clone())
    }

    /// Deregister and despawn a rig. Returns `None` if no rig has that name.
    pub fn remove(&self, name: &str) -> Option<SendReport> {
        let (_, rig) = self.rigs.remove(name)?;
        Some(rig.remove(false))
    }

    /// Registered rig names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rigs.iter().map(|entry| entry.key().clone()).collect();
        names.sort_unstable();
        names
    }

    pub fn rigs(&self) -> Vec<Arc<Rig>> {
        self.rigs.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rigs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rigs.is_empty()
    }

    /// Remove every rig, e.g. on shutdown.
    pub fn remove_all(&self) -> SendReport {
        let mut report = SendReport::default();
        for name in self.names() {
            if let Some(removed) = self.remove(&name) {
                report.merge(removed);
            }
        }
        report
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("rigs", &self.names())
            .field("native", &self.has_native_host())
            .field("options", &self.services.options)
            .finish()
    }
}
