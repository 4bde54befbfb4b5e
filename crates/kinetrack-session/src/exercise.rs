//! Exercises the session can count, and the joint angle each one tracks.

use kinetrack_biomech::{AngleName, AngleUnit};
use kinetrack_core::{JointPositions, JointType, Plane, Side};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    #[default]
    ShoulderAbduction,
    ShoulderFlexion,
    ElbowFlexion,
    KneeFlexion,
    HipAbduction,
    HipFlexion,
    SpineFlexion,
}

/// An exercise bound to a body side and, for the spine, a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Exercise {
    pub kind: ExerciseKind,
    pub side: Side,
    pub plane: Plane,
}

impl Exercise {
    pub fn new(kind: ExerciseKind, side: Side) -> Self {
        Self {
            kind,
            side,
            plane: Plane::Coronal,
        }
    }

    pub fn with_plane(mut self, plane: Plane) -> Self {
        self.plane = plane;
        self
    }

    pub fn angle_name(&self) -> AngleName {
        match self.kind {
            ExerciseKind::ShoulderAbduction => AngleName::ShoulderAbduction(self.side),
            ExerciseKind::ShoulderFlexion => AngleName::ShoulderFlexion(self.side),
            ExerciseKind::ElbowFlexion => AngleName::ElbowFlexion(self.side),
            ExerciseKind::KneeFlexion => AngleName::KneeFlexion(self.side),
            ExerciseKind::HipAbduction => AngleName::HipAbduction(self.side),
            ExerciseKind::HipFlexion => AngleName::HipFlexion(self.side),
            ExerciseKind::SpineFlexion => AngleName::SpineFlexion(self.plane),
        }
    }

    /// Joint the moving segment rotates about; guided targets orbit it.
    pub fn pivot(&self) -> JointType {
        match self.kind {
            ExerciseKind::ShoulderAbduction | ExerciseKind::ShoulderFlexion => {
                JointType::shoulder(self.side)
            }
            ExerciseKind::ElbowFlexion => JointType::elbow(self.side),
            ExerciseKind::KneeFlexion => JointType::knee(self.side),
            ExerciseKind::HipAbduction | ExerciseKind::HipFlexion => JointType::hip(self.side),
            ExerciseKind::SpineFlexion => JointType::SpineBase,
        }
    }

    /// Current exercise angle in radians, `None` while the involved joints
    /// lack estimates.
    pub fn measure(&self, positions: &JointPositions<3>) -> Option<f64> {
        let name = self.angle_name();
        let value = name.measure(positions)?;
        Some(match name.unit() {
            AngleUnit::Degrees => value.to_radians(),
            AngleUnit::Radians => value,
        })
    }
}

impl Default for Exercise {
    fn default() -> Self {
        Self::new(ExerciseKind::default(), Side::Right)
    }
}
