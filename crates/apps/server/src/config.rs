use std::env;
use std::time::Duration;

/// Configuration for the marionette demo host.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// World the demo rig and its viewers live in.
    pub world: String,
    /// Host ticks per second; the rig spins and viewers wander once per tick.
    pub tick_rate: u32,
    /// Interval between visibility passes, in milliseconds.
    pub visibility_period_ms: u64,
    /// Radius within which viewers receive the rig.
    pub view_distance: f64,
    /// Number of simulated viewers.
    pub viewer_count: usize,
    /// Viewers wander inside this radius around the rig.
    pub wander_radius: f64,
    /// Blocks per blade of the demo windmill.
    pub blade_length: usize,
    /// Degrees the rig rolls per tick.
    pub spin_degrees: f64,
    /// Outbound frame queue length per viewer.
    pub channel_capacity: usize,
    /// Seconds between metrics reports.
    pub stats_interval_secs: u64,
    /// Seed for viewer movement.
    pub seed: u64,
}

impl ServerConfig {
    /// Builds a configuration from `MARIONETTE_*` environment variables, falling back to
    /// defaults suitable for a local run.
    pub fn from_env() -> anyhow::Result<Self> {
        let world = env::var("MARIONETTE_WORLD").unwrap_or_else(|_| "overworld".into());
        let tick_rate = parse_var("MARIONETTE_TICK_RATE").unwrap_or(20);
        let visibility_period_ms = parse_var("MARIONETTE_VISIBILITY_MS").unwrap_or(50);
        let view_distance = parse_var("MARIONETTE_VIEW_DISTANCE").unwrap_or(48.0);
        let viewer_count = parse_var("MARIONETTE_VIEWERS").unwrap_or(8);
        let wander_radius = parse_var("MARIONETTE_WANDER_RADIUS").unwrap_or(80.0);
        let blade_length = parse_var("MARIONETTE_BLADE_LENGTH").unwrap_or(4);
        let spin_degrees = parse_var("MARIONETTE_SPIN_DEGREES").unwrap_or(3.0);
        let channel_capacity = parse_var("MARIONETTE_CHANNEL_CAPACITY").unwrap_or(1024);
        let stats_interval_secs = parse_var("MARIONETTE_STATS_SECS").unwrap_or(10);
        let seed = parse_var("MARIONETTE_SEED").unwrap_or(0x5eed);

        let config = Self {
            world,
            tick_rate,
            visibility_period_ms,
            view_distance,
            viewer_count,
            wander_radius,
            blade_length,
            spin_degrees,
            channel_capacity,
            stats_interval_secs,
            seed,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            (1..=1000).contains(&self.tick_rate),
            "tick rate must be between 1 and 1000"
        );
        anyhow::ensure!(
            self.visibility_period_ms >= 1,
            "visibility period must be >= 1ms"
        );
        anyhow::ensure!(
            self.view_distance.is_finite() && self.view_distance > 0.0,
            "view distance must be positive"
        );
        anyhow::ensure!(self.wander_radius > 0.0, "wander radius must be positive");
        anyhow::ensure!(self.channel_capacity >= 1, "channel capacity must be >= 1");
        anyhow::ensure!(self.stats_interval_secs >= 1, "stats interval must be >= 1s");
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(1000 / self.tick_rate as u64)
    }

    pub fn visibility_period(&self) -> Duration {
        Duration::from_millis(self.visibility_period_ms)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ServerConfig {
        ServerConfig {
            world: "overworld".into(),
            tick_rate: 20,
            visibility_period_ms: 50,
            view_distance: 48.0,
            viewer_count: 4,
            wander_radius: 80.0,
            blade_length: 3,
            spin_degrees: 3.0,
            channel_capacity: 64,
            stats_interval_secs: 10,
            seed: 1,
        }
    }

    #[test]
    fn test_tick_interval() {
        assert_eq!(sample().tick_interval(), Duration::from_millis(50));
        assert_eq!(sample().visibility_period(), Duration::from_millis(50));
    }

    #[test]
    fn test_validation() {
        assert!(sample().validate().is_ok());

        let mut config = sample();
        config.tick_rate = 0;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.view_distance = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.visibility_period_ms = 0;
        assert!(config.validate().is_err());
    }
}
