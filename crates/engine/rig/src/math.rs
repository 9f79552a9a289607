//! Orientation math for rigs.
//!
//! A rig's orientation is an orthonormal, right-handed basis kept in lock-step with a
//! pitch/yaw/roll encoding. The encoding is what marker entities understand (their head
//! pose); the basis is what places segments in the world. All angles are radians here and
//! only become degrees in [`EulerAngles::to_rotations`].

use crate::error::{RigError, RigResult};
use crate::protocol::Rotations;
use glam::DVec3;
use std::f64::consts::TAU;

const EPSILON: f64 = 1e-12;

/// Pitch/yaw/roll triple in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EulerAngles {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

impl EulerAngles {
    pub const ZERO: Self = Self {
        pitch: 0.0,
        yaw: 0.0,
        roll: 0.0,
    };

    pub fn new(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self { pitch, yaw, roll }
    }

    pub fn from_degrees(pitch: f64, yaw: f64, roll: f64) -> Self {
        Self::new(pitch.to_radians(), yaw.to_radians(), roll.to_radians())
    }

    /// Convert to the protocol's degree-based rotation triple.
    pub fn to_rotations(self) -> Rotations {
        Rotations {
            pitch: self.pitch.to_degrees() as f32,
            yaw: self.yaw.to_degrees() as f32,
            roll: self.roll.to_degrees() as f32,
        }
    }
}

/// Three mutually perpendicular unit vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Basis {
    pub x: DVec3,
    pub y: DVec3,
    pub z: DVec3,
}

impl Basis {
    pub const IDENTITY: Self = Self {
        x: DVec3::X,
        y: DVec3::Y,
        z: DVec3::Z,
    };

    /// Map a basis-local offset into world space.
    pub fn local_to_world(&self, offset: DVec3) -> DVec3 {
        self.x * offset.x + self.y * offset.y + self.z * offset.z
    }
}

impl Default for Basis {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A basis and its rotation encoding, always describing the same rotation.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Orientation {
    basis: Basis,
    encoding: EulerAngles,
}

impl Orientation {
    pub const IDENTITY: Self = Self {
        basis: Basis::IDENTITY,
        encoding: EulerAngles::ZERO,
    };

    pub fn basis(&self) -> &Basis {
        &self.basis
    }

    pub fn encoding(&self) -> EulerAngles {
        self.encoding
    }
}

/// Rotate `v` about `axis` by `angle` radians (Rodrigues' rotation formula).
pub fn rotate_around_axis(v: DVec3, axis: DVec3, angle: f64) -> DVec3 {
    let k = axis.normalize_or_zero();
    let (sin, cos) = angle.sin_cos();
    v * cos + k.cross(v) * sin + k * k.dot(v) * (1.0 - cos)
}

fn normalized_direction(forward: DVec3) -> RigResult<DVec3> {
    if !forward.is_finite() || forward.length_squared() < EPSILON {
        return Err(RigError::InvalidDirection(forward.to_array()));
    }
    Ok(forward.normalize())
}

/// Unsigned angle between two non-zero vectors.
fn angle_between(a: DVec3, b: DVec3) -> f64 {
    a.cross(b).length().atan2(a.dot(b))
}

/// Signed angle between the horizontal projection of `forward` and world +Z.
fn horizontal_angle(forward: DVec3) -> f64 {
    let horizontal = DVec3::new(forward.x, 0.0, forward.z);
    if horizontal.length_squared() < EPSILON {
        return 0.0;
    }
    let angle = angle_between(horizontal, DVec3::Z);
    if forward.x >= 0.0 {
        angle
    } else {
        -angle
    }
}

/// Derive a basis whose +Z points along `forward`, moving like a head that never rolls.
pub fn basis_from_direction(forward: DVec3) -> RigResult<Orientation> {
    let z = normalized_direction(forward)?;
    let xz_angle = horizontal_angle(z);

    let x = rotate_around_axis(DVec3::X, DVec3::Y, xz_angle);
    let y = rotate_around_axis(z, x, 270f64.to_radians());

    let mut pitch = angle_between(y, DVec3::Y);
    if z.y >= 0.0 {
        pitch = TAU - pitch;
    }

    Ok(Orientation {
        basis: Basis { x, y, z },
        encoding: EulerAngles::new(pitch, -xz_angle, 0.0),
    })
}

/// Like [`basis_from_direction`], then roll the right and up vectors about `forward`.
pub fn basis_from_direction_and_roll(forward: DVec3, roll_degrees: f64) -> RigResult<Orientation> {
    let base = basis_from_direction(forward)?;
    let Basis { x, y, z } = base.basis;
    let roll = roll_degrees.to_radians();

    let basis = Basis {
        x: rotate_around_axis(x, z, roll),
        y: rotate_around_axis(y, z, roll),
        z,
    };
    Ok(Orientation {
        basis,
        encoding: encoding_from_basis(&basis),
    })
}

/// Rebuild the basis from an encoding. Inverse of [`encoding_from_basis`].
pub fn basis_from_encoding(encoding: EulerAngles) -> Orientation {
    let (mut x, mut y, mut z) = (DVec3::X, DVec3::Y, DVec3::Z);

    x = rotate_around_axis(x, z, -encoding.roll);
    y = rotate_around_axis(y, z, -encoding.roll);

    x = rotate_around_axis(x, y, -encoding.yaw);
    z = rotate_around_axis(z, y, -encoding.yaw);

    y = rotate_around_axis(y, x, encoding.pitch);
    z = rotate_around_axis(z, x, encoding.pitch);

    Orientation {
        basis: Basis { x, y, z },
        encoding,
    }
}

/// Recover the pitch/yaw/roll encoding of an arbitrary orthonormal basis.
///
/// The basis vectors are the columns of `Rz(-roll) * Ry(-yaw) * Rx(pitch)`. At gimbal lock
/// (forward-right plane vertical) roll is folded into pitch.
pub fn encoding_from_basis(basis: &Basis) -> EulerAngles {
    let Basis { x, y, z } = *basis;
    let b = (-x.z).atan2(x.x.hypot(x.y));

    let (a, c) = if b.cos() > 1e-9 {
        (x.y.atan2(x.x), y.z.atan2(z.z))
    } else {
        (0.0, (-z.y).atan2(y.y))
    };

    EulerAngles::new(c, -b, -a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const TOLERANCE: f64 = 1e-9;

    fn assert_vec_close(a: DVec3, b: DVec3) {
        assert!(
            (a - b).length() < TOLERANCE,
            "expected {:?} to be close to {:?}",
            a,
            b
        );
    }

    fn assert_basis_close(a: &Basis, b: &Basis) {
        assert_vec_close(a.x, b.x);
        assert_vec_close(a.y, b.y);
        assert_vec_close(a.z, b.z);
    }

    fn assert_orthonormal(basis: &Basis) {
        for v in [basis.x, basis.y, basis.z] {
            assert!((v.length() - 1.0).abs() < TOLERANCE, "not unit length: {:?}", v);
        }
        assert!(basis.x.dot(basis.y).abs() < TOLERANCE);
        assert!(basis.y.dot(basis.z).abs() < TOLERANCE);
        assert!(basis.z.dot(basis.x).abs() < TOLERANCE);
        // Right-handed
        assert_vec_close(basis.x.cross(basis.y), basis.z);
    }

    fn random_direction(rng: &mut StdRng) -> DVec3 {
        loop {
            let v = DVec3::new(
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
            );
            if v.length_squared() > 1e-3 {
                return v.normalize();
            }
        }
    }

    #[test]
    fn test_forward_along_z_is_identity() {
        let orientation = basis_from_direction(DVec3::Z).unwrap();
        assert_basis_close(orientation.basis(), &Basis::IDENTITY);
    }

    #[test]
    fn test_forward_along_x() {
        let orientation = basis_from_direction(DVec3::new(3.0, 0.0, 0.0)).unwrap();
        assert_vec_close(orientation.basis().x, DVec3::new(0.0, 0.0, -1.0));
        assert_vec_close(orientation.basis().y, DVec3::Y);
        assert_vec_close(orientation.basis().z, DVec3::X);
        assert!((orientation.encoding().yaw + 90f64.to_radians()).abs() < TOLERANCE);
    }

    #[test]
    fn test_vertical_forward_keeps_unrotated_right() {
        for forward in [DVec3::Y, DVec3::NEG_Y] {
            let orientation = basis_from_direction(forward).unwrap();
            assert_vec_close(orientation.basis().x, DVec3::X);
            assert_orthonormal(orientation.basis());
        }
    }

    #[test]
    fn test_zero_direction_rejected() {
        assert!(matches!(
            basis_from_direction(DVec3::ZERO),
            Err(RigError::InvalidDirection(_))
        ));
        assert!(basis_from_direction(DVec3::new(f64::NAN, 0.0, 1.0)).is_err());
    }

    #[test]
    fn test_direction_round_trips_through_encoding() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..200 {
            let forward = random_direction(&mut rng);
            let orientation = basis_from_direction(forward).unwrap();
            let rebuilt = basis_from_encoding(orientation.encoding());

            assert!(
                rebuilt.basis().z.dot(forward) > 1.0 - TOLERANCE,
                "forward {:?} rebuilt as {:?}",
                forward,
                rebuilt.basis().z
            );
            assert_basis_close(rebuilt.basis(), orientation.basis());
        }
    }

    #[test]
    fn test_zero_roll_matches_plain_direction() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..100 {
            let forward = random_direction(&mut rng);
            let plain = basis_from_direction(forward).unwrap();
            let rolled = basis_from_direction_and_roll(forward, 0.0).unwrap();

            assert_basis_close(rolled.basis(), plain.basis());
            // Encodings may differ by a full turn but must describe the same rotation.
            assert_basis_close(
                basis_from_encoding(rolled.encoding()).basis(),
                basis_from_encoding(plain.encoding()).basis(),
            );
        }
    }

    #[test]
    fn test_orthonormal_for_random_inputs() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..150 {
            let forward = random_direction(&mut rng);
            let roll = rng.random_range(-360.0..360.0);

            assert_orthonormal(basis_from_direction(forward).unwrap().basis());
            let rolled = basis_from_direction_and_roll(forward, roll).unwrap();
            assert_orthonormal(rolled.basis());

            let encoding = EulerAngles::new(
                rng.random_range(-TAU..TAU),
                rng.random_range(-TAU..TAU),
                rng.random_range(-TAU..TAU),
            );
            assert_orthonormal(basis_from_encoding(encoding).basis());
        }
    }

    #[test]
    fn test_rolled_encoding_reproduces_basis() {
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..100 {
            let forward = random_direction(&mut rng);
            let roll = rng.random_range(-180.0..180.0);
            let rolled = basis_from_direction_and_roll(forward, roll).unwrap();

            let rebuilt = basis_from_encoding(rolled.encoding());
            assert_basis_close(rebuilt.basis(), rolled.basis());
        }
    }

    #[test]
    fn test_roll_keeps_forward() {
        let forward = DVec3::new(0.3, -0.4, 0.8).normalize();
        let rolled = basis_from_direction_and_roll(forward, 90.0).unwrap();
        let plain = basis_from_direction(forward).unwrap();

        assert_vec_close(rolled.basis().z, forward);
        assert_vec_close(rolled.basis().x, plain.basis().y);
    }

    #[test]
    fn test_degrees_at_protocol_boundary() {
        let rotations = EulerAngles::from_degrees(90.0, -45.0, 10.0).to_rotations();
        assert!((rotations.pitch - 90.0).abs() < 1e-4);
        assert!((rotations.yaw + 45.0).abs() < 1e-4);
        assert!((rotations.roll - 10.0).abs() < 1e-4);
    }
}
