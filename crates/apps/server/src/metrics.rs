use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Counters shared by the transport, the simulated clients and the tick loop.
#[derive(Debug, Default)]
pub struct ServerMetrics {
    pub connected_viewers: AtomicU64,
    pub frames_sent: AtomicU64,
    pub frames_received: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub send_failures: AtomicU64,
    pub ticks: AtomicU64,
    pub visible_viewers: AtomicU64,
}

impl ServerMetrics {
    pub fn record_sent(&self, bytes: usize) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Get Prometheus-compatible metrics as a string
    pub fn to_prometheus(&self) -> String {
        format!(
            "# HELP connected_viewers Number of connected viewers\n\
             # TYPE connected_viewers gauge\n\
             connected_viewers {}\n\
             \n\
             # HELP visible_viewers Viewers currently seeing the demo rig\n\
             # TYPE visible_viewers gauge\n\
             visible_viewers {}\n\
             \n\
             # HELP frames_sent Total proxy frames sent\n\
             # TYPE frames_sent counter\n\
             frames_sent {}\n\
             \n\
             # HELP frames_received Total proxy frames decoded by viewers\n\
             # TYPE frames_received counter\n\
             frames_received {}\n\
             \n\
             # HELP bytes_sent Total bytes sent\n\
             # TYPE bytes_sent counter\n\
             bytes_sent {}\n\
             \n\
             # HELP send_failures Total skipped sends\n\
             # TYPE send_failures counter\n\
             send_failures {}\n",
            self.connected_viewers.load(Ordering::Relaxed),
            self.visible_viewers.load(Ordering::Relaxed),
            self.frames_sent.load(Ordering::Relaxed),
            self.frames_received.load(Ordering::Relaxed),
            self.bytes_sent.load(Ordering::Relaxed),
            self.send_failures.load(Ordering::Relaxed),
        )
    }

    /// Print metrics to console
    pub fn print_stats(&self) {
        tracing::info!(
            "Ticks: {} | Viewers: {} ({} visible) | Frames Sent: {} | Frames Recv: {} | Bytes Sent: {} | Failures: {}",
            self.ticks.load(Ordering::Relaxed),
            self.connected_viewers.load(Ordering::Relaxed),
            self.visible_viewers.load(Ordering::Relaxed),
            self.frames_sent.load(Ordering::Relaxed),
            self.frames_received.load(Ordering::Relaxed),
            self.bytes_sent.load(Ordering::Relaxed),
            self.send_failures.load(Ordering::Relaxed),
        );
    }
}

/// Start metrics reporting task
pub async fn start_metrics_reporter(metrics: Arc<ServerMetrics>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    // The first tick completes immediately.
    interval.tick().await;

    loop {
        interval.tick().await;
        metrics.print_stats();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prometheus_output() {
        let metrics = ServerMetrics::default();
        metrics.record_sent(40);
        metrics.record_sent(2);
        metrics.record_failure();

        let text = metrics.to_prometheus();
        assert!(text.contains("frames_sent 2\n"));
        assert!(text.contains("bytes_sent 42\n"));
        assert!(text.contains("send_failures 1\n"));
        assert!(text.contains("# TYPE connected_viewers gauge"));
    }
}
