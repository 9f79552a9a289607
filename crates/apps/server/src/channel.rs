//! Per-viewer frame queues.
//!
//! Each connected viewer owns a bounded Tokio channel. Rig messages are encoded with
//! bincode and pushed without waiting; a full or closed queue fails that one send.

use crate::metrics::ServerMetrics;
use dashmap::DashMap;
use marionette_rig::{ProxyMessage, Transport, TransportError, ViewerId};
use std::sync::Arc;
use tokio::sync::mpsc;

pub type Frame = Vec<u8>;

pub struct ChannelTransport {
    queues: DashMap<ViewerId, mpsc::Sender<Frame>>,
    capacity: usize,
    metrics: Arc<ServerMetrics>,
}

impl ChannelTransport {
    pub fn new(capacity: usize, metrics: Arc<ServerMetrics>) -> Self {
        Self {
            queues: DashMap::new(),
            capacity,
            metrics,
        }
    }

    /// Open a queue for `viewer`, replacing any previous one.
    pub fn connect(&self, viewer: ViewerId) -> mpsc::Receiver<Frame> {
        let (sender, receiver) = mpsc::channel(self.capacity);
        self.queues.insert(viewer, sender);
        receiver
    }

    /// Drop the viewer's queue; its receiver sees the channel close.
    pub fn disconnect(&self, viewer: &ViewerId) -> bool {
        self.queues.remove(viewer).is_some()
    }

    pub fn is_connected(&self, viewer: &ViewerId) -> bool {
        self.queues.contains_key(viewer)
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}

impl Transport for ChannelTransport {
    fn send(&self, viewer: &ViewerId, message: ProxyMessage) -> Result<(), TransportError> {
        let Some(sender) = self.queues.get(viewer).map(|entry| entry.value().clone()) else {
            self.metrics.record_failure();
            return Err(TransportError::ViewerGone(viewer.clone()));
        };

        let frame = message.encode()?;
        let bytes = frame.len();
        match sender.try_send(frame) {
            Ok(()) => {
                self.metrics.record_sent(bytes);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.metrics.record_failure();
                Err(TransportError::SendFailed {
                    viewer: viewer.clone(),
                    reason: "queue full".into(),
                })
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.metrics.record_failure();
                self.queues.remove(viewer);
                Err(TransportError::ViewerGone(viewer.clone()))
            }
        }
    }
}
