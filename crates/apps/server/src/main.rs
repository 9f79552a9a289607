use clap::Parser;
use marionette_server::{
    config::ServerConfig,
    demo::DemoScene,
    metrics::{start_metrics_reporter, ServerMetrics},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Stream a spinning demo rig to simulated viewers.
///
/// Every option falls back to its `MARIONETTE_*` environment variable.
#[derive(Parser, Debug)]
#[command(name = "marionette-server", version)]
struct Args {
    /// Number of simulated viewers
    #[arg(long)]
    viewers: Option<usize>,

    /// Host ticks per second
    #[arg(long)]
    tick_rate: Option<u32>,

    /// Radius within which viewers receive the rig
    #[arg(long)]
    view_distance: Option<f64>,

    /// Seed for viewer movement
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    duration: Option<u64>,
}

impl Args {
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(viewers) = self.viewers {
            config.viewer_count = viewers;
        }
        if let Some(tick_rate) = self.tick_rate {
            config.tick_rate = tick_rate;
        }
        if let Some(view_distance) = self.view_distance {
            config.view_distance = view_distance;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = ServerConfig::from_env()?;
    args.apply(&mut config);
    config.validate()?;
    tracing::info!("Starting marionette server: {:?}", config);

    let metrics = Arc::new(ServerMetrics::default());
    let reporter = tokio::spawn(start_metrics_reporter(
        metrics.clone(),
        Duration::from_secs(config.stats_interval_secs),
    ));

    let shutdown = CancellationToken::new();
    spawn_shutdown_trigger(shutdown.clone(), args.duration.map(Duration::from_secs));

    let mut ticker = tokio::time::interval(config.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut scene = DemoScene::start(config, metrics.clone())?;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = scene.tick().await {
                    tracing::error!("Tick failed: {}", e);
                    break;
                }
            }
        }
    }

    tracing::info!("Shutting down");
    let clients = scene.shutdown().await;
    let orphans: u64 = clients.iter().map(|client| client.orphans).sum();
    if orphans > 0 {
        tracing::warn!("Clients saw {} messages for entities they never spawned", orphans);
    }

    reporter.abort();
    metrics.print_stats();
    tracing::debug!("Final metrics:\n{}", metrics.to_prometheus());
    Ok(())
}

/// Cancel `token` on Ctrl-C or, if given, once `after` has elapsed.
fn spawn_shutdown_trigger(token: CancellationToken, after: Option<Duration>) {
    tokio::spawn(async move {
        let deadline = async {
            match after {
                Some(after) => tokio::time::sleep(after).await,
                None => std::future::pending().await,
            }
        };

        tokio::pin!(deadline);

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!("Failed to listen for Ctrl-C: {}", e);
                    (&mut deadline).await;
                }
            }
            _ = &mut deadline => {}
        }
        token.cancel();
    });
}
