//! Per-rig visibility reconciliation.
//!
//! Each pass compares the viewers that should see a rig (same world, within view distance,
//! not hidden) against the ones that currently do, then sends the difference: destroys to
//! viewers that left and spawn + equip to viewers that joined.

use crate::error::TransportError;
use crate::proxy::{SendFailure, SendReport};
use crate::protocol::ViewerId;
use crate::rig::Rig;
use std::collections::BTreeSet;
use std::sync::Weak;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// What one pass changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisibilityChange {
    /// Viewers that received the rig this pass, sorted.
    pub joined: Vec<ViewerId>,
    /// Viewers the rig was destroyed for this pass, sorted.
    pub left: Vec<ViewerId>,
    pub report: SendReport,
}

impl VisibilityChange {
    pub fn is_empty(&self) -> bool {
        self.joined.is_empty() && self.left.is_empty()
    }
}

pub(crate) fn run_pass(rig: &Rig) -> VisibilityChange {
    run_pass_unless(rig, None)
}

/// Runs a pass unless the rig is removed or `stop` fires before the pass takes the gate.
fn run_pass_unless(rig: &Rig, stop: Option<&CancellationToken>) -> VisibilityChange {
    let _traffic = rig.traffic.write();
    if rig.is_removed() || stop.is_some_and(|token| token.is_cancelled()) {
        return VisibilityChange::default();
    }

    let origin = rig.origin();
    let view_distance = rig.view_distance();
    let candidates: BTreeSet<ViewerId> = rig
        .roster()
        .viewers()
        .into_iter()
        .filter(|viewer| viewer.is_within(rig.world(), origin, view_distance))
        .filter(|viewer| !rig.is_hidden_from(&viewer.id))
        .map(|viewer| viewer.id)
        .collect();

    let current: BTreeSet<ViewerId> = rig.visible.iter().map(|v| v.key().clone()).collect();
    let left: Vec<ViewerId> = current.difference(&candidates).cloned().collect();
    let joined: Vec<ViewerId> = candidates.difference(&current).cloned().collect();

    let mut change = VisibilityChange::default();
    if left.is_empty() && joined.is_empty() {
        return change;
    }

    let segments = rig.segments();
    let mut record = |viewer: &ViewerId, result: Result<(), TransportError>| match result {
        Ok(()) => change.report.delivered += 1,
        Err(error) => {
            tracing::warn!("Rig '{}': skipping send to {}: {}", rig.name(), viewer, error);
            change.report.failures.push(SendFailure::Viewer {
                viewer: viewer.clone(),
                error,
            });
        }
    };

    for viewer in &left {
        for segment in &segments {
            record(viewer, segment.send_destroy_to(viewer));
        }
        rig.visible.remove(viewer);
    }

    for viewer in &joined {
        for segment in &segments {
            match segment.send_spawn_to(viewer) {
                // Equip only follows a spawn the viewer actually got.
                Ok(()) => {
                    record(viewer, Ok(()));
                    record(viewer, segment.send_appearance_to(viewer));
                }
                Err(error) => record(viewer, Err(error)),
            }
        }
        rig.visible.insert(viewer.clone());
    }

    change.joined = joined;
    change.left = left;
    tracing::debug!(
        "Rig '{}' visibility: +{} -{} ({} sends, {} skipped)",
        rig.name(),
        change.joined.len(),
        change.left.len(),
        change.report.delivered,
        change.report.failures.len()
    );
    change
}

/// Handle to a rig's periodic visibility task.
pub(crate) struct VisibilityTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl VisibilityTask {
    pub(crate) fn spawn(runtime: &tokio::runtime::Handle, rig: Weak<Rig>, period: Duration) -> Self {
        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;

                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(rig) = rig.upgrade() else { break };
                        if rig.is_removed() || cancelled.is_cancelled() {
                            break;
                        }
                        run_pass_unless(&rig, Some(&cancelled));
                    }
                }
            }
            tracing::debug!("Visibility task exited");
        });

        Self { token, handle }
    }

    pub(crate) fn cancel(self) {
        self.token.cancel();
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.token.is_cancelled() || self.handle.is_finished()
    }
}
