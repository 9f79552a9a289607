use crate::error::{RigError, RigResult};
use std::time::Duration;

/// Edge length of a head-worn block, in world blocks.
pub const BLOCK_SIZE: f64 = 5.0 / 8.0;

/// Half of [`BLOCK_SIZE`]; the distance from a segment's center to its faces.
pub const HALF_BLOCK_SIZE: f64 = BLOCK_SIZE / 2.0;

/// Height of a marker's head pivot above its feet.
pub const HEAD_PIVOT_HEIGHT: f64 = 1.4375;

/// Default interval between visibility passes (one server tick at 20 Hz).
pub const DEFAULT_VISIBILITY_PERIOD: Duration = Duration::from_millis(50);

/// Tunables shared by every rig created through a registry.
#[derive(Debug, Clone)]
pub struct RigOptions {
    /// World size of one segment offset unit.
    pub block_size: f64,
    /// Vertical distance from proxy position to the point the worn item is centered on.
    pub pivot_height: f64,
    /// Interval used by [`Rig::start_visibility_task`](crate::Rig::start_visibility_task)
    /// callers that do not pick their own.
    pub visibility_period: Duration,
}

impl Default for RigOptions {
    fn default() -> Self {
        Self {
            block_size: BLOCK_SIZE,
            pivot_height: HEAD_PIVOT_HEIGHT,
            visibility_period: DEFAULT_VISIBILITY_PERIOD,
        }
    }
}

impl RigOptions {
    pub fn validate(&self) -> RigResult<()> {
        if self.visibility_period.is_zero() {
            return Err(RigError::InvalidPeriod);
        }
        Ok(())
    }
}

/// View distance must be finite and strictly positive.
pub fn validate_view_distance(view_distance: f64) -> RigResult<()> {
    if view_distance.is_finite() && view_distance > 0.0 {
        Ok(())
    } else {
        Err(RigError::InvalidViewDistance(view_distance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_distance_validation() {
        assert!(validate_view_distance(10.0).is_ok());
        assert!(validate_view_distance(0.0).is_err());
        assert!(validate_view_distance(-1.0).is_err());
        assert!(validate_view_distance(f64::NAN).is_err());
        assert!(validate_view_distance(f64::INFINITY).is_err());
    }

    #[test]
    fn test_zero_period_rejected() {
        let options = RigOptions {
            visibility_period: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(RigError::InvalidPeriod)));
        assert!(RigOptions::default().validate().is_ok());
    }
}
