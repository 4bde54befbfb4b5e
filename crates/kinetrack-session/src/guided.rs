//! Guided-motion target placement.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use kinetrack_core::JointType;

/// A target marker swinging on a circle around a pivot joint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuidedTarget {
    pub pivot: JointType,
    pub radius: f64,
}

impl GuidedTarget {
    pub fn new(pivot: JointType, radius: f64) -> Self {
        Self { pivot, radius }
    }

    /// `pivot + radius * (cos angle, sin angle, 0)`; the angle is in radians
    /// and measured in the display plane.
    pub fn position(&self, pivot: &Vector3<f64>, angle: f64) -> Vector3<f64> {
        pivot + Vector3::new(self.radius * angle.cos(), self.radius * angle.sin(), 0.0)
    }
}
