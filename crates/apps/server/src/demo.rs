//! A spinning windmill rig watched by viewers that wander around it.

use crate::channel::{ChannelTransport, Frame};
use crate::config::ServerConfig;
use crate::metrics::ServerMetrics;
use glam::DVec3;
use marionette_rig::{
    EntityId, Item, Location, ProxyMessage, Registry, Rig, RigOptions, ViewerDirectory, ViewerId,
    WorldId,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::f64::consts::{PI, TAU};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const RIG_NAME: &str = "windmill";
const HUB_HEIGHT: f64 = 72.0;
const WALK_SPEED: f64 = 0.35;
/// Every this many ticks the first viewer toggles whether the rig is hidden from them.
const HIDE_TOGGLE_TICKS: u64 = 200;

/// What one simulated client saw before its queue closed.
#[derive(Debug, Clone, Default)]
pub struct ClientStats {
    pub viewer: Option<ViewerId>,
    pub frames: u64,
    /// Messages for an entity the client had not been told to spawn.
    pub orphans: u64,
    /// Entities still alive on the client when it disconnected.
    pub live: usize,
}

struct Walker {
    id: ViewerId,
    position: DVec3,
    heading: f64,
}

pub struct DemoScene {
    config: ServerConfig,
    registry: Registry,
    viewers: Arc<ViewerDirectory>,
    transport: Arc<ChannelTransport>,
    metrics: Arc<ServerMetrics>,
    rig: Arc<Rig>,
    walkers: Vec<Walker>,
    clients: Vec<JoinHandle<ClientStats>>,
    rng: StdRng,
    roll: f64,
    ticks: u64,
}

impl DemoScene {
    /// Build the rig, connect the simulated viewers and start the visibility task.
    pub fn start(config: ServerConfig, metrics: Arc<ServerMetrics>) -> anyhow::Result<Self> {
        let transport = Arc::new(ChannelTransport::new(
            config.channel_capacity,
            metrics.clone(),
        ));
        let viewers = Arc::new(ViewerDirectory::new());
        let registry = Registry::new(transport.clone(), viewers.clone()).with_options(
            RigOptions {
                visibility_period: config.visibility_period(),
                ..Default::default()
            },
        )?;

        let world = WorldId::new(config.world.clone());
        let hub = DVec3::new(0.0, HUB_HEIGHT, 0.0);
        let rig = registry.create_rig(
            RIG_NAME,
            Location::new(world.clone(), hub),
            config.view_distance,
            false,
        )?;
        build_windmill(&rig, config.blade_length)?;
        rig.start_visibility_task(registry.options().visibility_period)?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut walkers = Vec::with_capacity(config.viewer_count);
        let mut clients = Vec::with_capacity(config.viewer_count);
        for i in 0..config.viewer_count {
            let id = ViewerId::new(format!("viewer-{}", i));
            let angle = rng.random_range(0.0..TAU);
            let distance = rng.random_range(0.0..config.wander_radius);
            let position = DVec3::new(angle.cos() * distance, 64.0, angle.sin() * distance);

            let receiver = transport.connect(id.clone());
            viewers.join(id.clone(), world.clone(), position);
            clients.push(tokio::spawn(run_client(
                id.clone(),
                receiver,
                metrics.clone(),
            )));
            walkers.push(Walker {
                id,
                position,
                heading: rng.random_range(0.0..TAU),
            });
        }
        metrics
            .connected_viewers
            .store(walkers.len() as u64, Ordering::Relaxed);

        tracing::info!(
            "Demo scene ready: rig '{}' with {} segments, {} viewers",
            RIG_NAME,
            rig.segment_count(),
            walkers.len()
        );

        Ok(Self {
            config,
            registry,
            viewers,
            transport,
            metrics,
            rig,
            walkers,
            clients,
            rng,
            roll: 0.0,
            ticks: 0,
        })
    }

    pub fn rig(&self) -> &Arc<Rig> {
        &self.rig
    }

    /// Advance the scene by one tick: spin the rig, push its transform, move viewers.
    pub async fn tick(&mut self) -> anyhow::Result<()> {
        self.roll = (self.roll + self.config.spin_degrees) % 360.0;
        self.rig
            .set_orientation_by_direction_and_roll(DVec3::Z, self.roll)?;

        let report = self.rig.spawn_move()?.await?;
        if !report.is_clean() {
            tracing::debug!(
                "Tick {}: {} rig sends skipped",
                self.ticks,
                report.failures.len()
            );
        }

        self.wander();
        self.ticks += 1;
        if self.ticks % HIDE_TOGGLE_TICKS == 0 {
            self.toggle_first_viewer();
        }

        self.metrics.ticks.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .visible_viewers
            .store(self.rig.visible_viewers().len() as u64, Ordering::Relaxed);
        Ok(())
    }

    fn wander(&mut self) {
        let radius = self.config.wander_radius;
        for walker in &mut self.walkers {
            walker.heading += self.rng.random_range(-0.3..0.3);
            let step = DVec3::new(walker.heading.cos(), 0.0, walker.heading.sin()) * WALK_SPEED;
            let next = walker.position + step;
            if DVec3::new(next.x, 0.0, next.z).length() > radius {
                walker.heading += PI;
                continue;
            }
            walker.position = next;
            self.viewers.set_position(&walker.id, next);
        }
    }

    fn toggle_first_viewer(&self) {
        let Some(walker) = self.walkers.first() else {
            return;
        };
        if self.rig.is_hidden_from(&walker.id) {
            self.rig.remove_hidden_viewer(&walker.id);
            tracing::info!("Rig '{}' revealed to {}", RIG_NAME, walker.id);
        } else {
            self.rig.add_hidden_viewer(walker.id.clone());
            tracing::info!("Rig '{}' hidden from {}", RIG_NAME, walker.id);
        }
    }

    /// Remove every rig, disconnect the viewers and collect what each client saw.
    pub async fn shutdown(self) -> Vec<ClientStats> {
        let report = self.registry.remove_all();
        tracing::info!(
            "Removed all rigs ({} destroys sent, {} skipped)",
            report.delivered,
            report.failures.len()
        );

        for walker in &self.walkers {
            self.viewers.leave(&walker.id);
            self.transport.disconnect(&walker.id);
        }
        self.metrics.connected_viewers.store(0, Ordering::Relaxed);

        let mut stats = Vec::with_capacity(self.clients.len());
        for result in futures::future::join_all(self.clients).await {
            match result {
                Ok(client) => stats.push(client),
                Err(e) => tracing::error!("Client task failed: {}", e),
            }
        }
        stats
    }
}

/// A hub block with four blades of `blade_length` blocks in the rig's XY plane.
fn build_windmill(rig: &Rig, blade_length: usize) -> anyhow::Result<()> {
    rig.add_segment("hub", DVec3::ZERO, Some(Item::new("oak_log")))?;
    let blades = [
        ("east", DVec3::X),
        ("north", DVec3::Y),
        ("west", DVec3::NEG_X),
        ("south", DVec3::NEG_Y),
    ];
    for (name, direction) in blades {
        for i in 1..=blade_length {
            let item = if i == blade_length {
                Item::new("white_wool").with_model_data(1)
            } else {
                Item::new("white_wool")
            };
            rig.add_segment(format!("{}-{}", name, i), direction * i as f64, Some(item))?;
        }
    }
    Ok(())
}

/// Drain one viewer's queue, tracking which entities exist on the client.
async fn run_client(
    viewer: ViewerId,
    mut receiver: mpsc::Receiver<Frame>,
    metrics: Arc<ServerMetrics>,
) -> ClientStats {
    let mut stats = ClientStats {
        viewer: Some(viewer.clone()),
        ..Default::default()
    };
    let mut live: HashSet<EntityId> = HashSet::new();

    while let Some(frame) = receiver.recv().await {
        let message = match ProxyMessage::decode(&frame) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("{} received an undecodable frame: {}", viewer, e);
                continue;
            }
        };
        stats.frames += 1;
        metrics.record_received();

        let entity = message.entity();
        match message {
            ProxyMessage::Spawn { .. } => {
                live.insert(entity);
            }
            ProxyMessage::Destroy { .. } => {
                if !live.remove(&entity) {
                    stats.orphans += 1;
                }
            }
            _ => {
                if !live.contains(&entity) {
                    stats.orphans += 1;
                }
            }
        }
    }

    stats.live = live.len();
    tracing::debug!(
        "{} disconnected after {} frames ({} orphans)",
        viewer,
        stats.frames,
        stats.orphans
    );
    stats
}
