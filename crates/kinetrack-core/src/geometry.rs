//! Geometric utilities shared by the projection and analysis code.

use nalgebra::{Quaternion, SVector, UnitQuaternion, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Reference "up" direction in a 2D measurement plane.
pub const UP_2D: Vector2<f64> = Vector2::new(0.0, 1.0);

/// Reference "down" direction in a 2D measurement plane.
pub const DOWN_2D: Vector2<f64> = Vector2::new(0.0, -1.0);

/// Joint orientation in 3D space using quaternion representation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Orientation3D {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Orientation3D {
    /// Normalizing constructor. A zero quaternion, which the sensor reports
    /// for joints without an orientation estimate, becomes the identity.
    pub fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        let norm = (w * w + x * x + y * y + z * z).sqrt();
        if norm < 1e-12 || !norm.is_finite() {
            return Self::identity();
        }
        Self {
            w: w / norm,
            x: x / norm,
            y: y / norm,
            z: z / norm,
        }
    }

    /// Sensor SDKs deliver (x, y, z, w).
    pub fn from_sensor(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self::new(w, x, y, z)
    }

    pub fn identity() -> Self {
        Self {
            w: 1.0,
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }

    pub fn to_unit_quaternion(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::new_normalize(Quaternion::new(self.w, self.x, self.y, self.z))
    }
}

impl Default for Orientation3D {
    fn default() -> Self {
        Self::identity()
    }
}

/// Unsigned angle between two vectors in radians, in `[0, PI]`.
///
/// Returns 0 when either vector is (near) zero length.
pub fn angle_between<const D: usize>(v1: &SVector<f64, D>, v2: &SVector<f64, D>) -> f64 {
    let dot = v1.dot(v2);
    let norms = v1.norm() * v2.norm();
    if norms < 1e-10 {
        0.0
    } else {
        (dot / norms).clamp(-1.0, 1.0).acos()
    }
}

/// Unsigned angle between two plane vectors in radians, in `[0, PI]`.
pub fn angle_between_2d(u: &Vector2<f64>, v: &Vector2<f64>) -> f64 {
    angle_between(u, v)
}

/// Angle between two segment vectors via `acos(dot / (|v1| |v2|))`.
///
/// No zero-length guard: a degenerate segment yields NaN. The cosine is
/// clamped so that rounding noise on (anti)parallel segments stays real.
pub fn segment_angle<const D: usize>(v1: &SVector<f64, D>, v2: &SVector<f64, D>) -> f64 {
    let argument = v1.dot(v2) / (v1.norm() * v2.norm());
    argument.clamp(-1.0, 1.0).acos()
}

/// (x, y) components: frontal/coronal plane.
pub fn coronal<const D: usize>(v: &SVector<f64, D>) -> Vector2<f64> {
    Vector2::new(v[0], v[1])
}

/// (z, y) components: sagittal plane.
pub fn sagittal(v: &Vector3<f64>) -> Vector2<f64> {
    Vector2::new(v.z, v.y)
}

pub fn is_finite_point<const D: usize>(v: &SVector<f64, D>) -> bool {
    v.iter().all(|c| c.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_sensor_order_quaternion() {
        // Quarter turn about z, delivered as (x, y, z, w) and unnormalized.
        let s = (PI / 4.0).sin();
        let c = (PI / 4.0).cos();
        let ori = Orientation3D::from_sensor(0.0, 0.0, 2.0 * s, 2.0 * c);
        assert!((ori.w - c).abs() < 1e-12);
        assert!((ori.to_unit_quaternion().angle() - PI / 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_zero_quaternion_is_identity() {
        let ori = Orientation3D::from_sensor(0.0, 0.0, 0.0, 0.0);
        assert_eq!(ori, Orientation3D::identity());
    }

    #[test]
    fn test_angle_between_cases() {
        let x = Vector2::new(1.0, 0.0);
        assert!((angle_between_2d(&x, &UP_2D) - PI / 2.0).abs() < 1e-12);
        assert!(angle_between_2d(&x, &(x * 3.0)).abs() < 1e-12);
        assert!((angle_between_2d(&x, &-x) - PI).abs() < 1e-12);
        assert_eq!(angle_between_2d(&x, &Vector2::zeros()), 0.0);
    }

    #[test]
    fn test_segment_angle_degenerate_is_nan() {
        let v = Vector3::new(1.0, 0.0, 0.0);
        assert!(segment_angle(&v, &Vector3::zeros()).is_nan());
    }

    #[test]
    fn test_plane_projections() {
        let v = Vector3::new(1.0, 2.0, 3.0);
        assert_eq!(coronal(&v), Vector2::new(1.0, 2.0));
        assert_eq!(sagittal(&v), Vector2::new(3.0, 2.0));
    }
}
