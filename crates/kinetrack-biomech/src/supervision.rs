//! Exercise feedback derived from the biomechanical measurements: named
//! angle readouts for display and shoulder-abduction supervision.

use kinetrack_core::{JointPositions, JointType, Limb, Plane, Side};
use serde::{Deserialize, Serialize};

use crate::biomechanics::{
    abduction_angle, checked_flexion_elbow_angle, checked_flexion_knee_angle, flexion_hip_angle,
    flexion_shoulder_angle, flexion_spine_angle,
};

/// Default elbow flexion above which an abduction repetition is flagged.
pub const DEFAULT_ELBOW_BENT_THRESHOLD_DEG: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AngleUnit {
    Degrees,
    Radians,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AngleName {
    SpineFlexion(Plane),
    ShoulderFlexion(Side),
    ShoulderAbduction(Side),
    HipFlexion(Side),
    HipAbduction(Side),
    ElbowFlexion(Side),
    KneeFlexion(Side),
}

impl AngleName {
    pub fn label(&self) -> String {
        let side = |s: &Side| match s {
            Side::Left => "Left",
            Side::Right => "Right",
        };
        match self {
            AngleName::SpineFlexion(Plane::Coronal) => "Spine coronal".to_string(),
            AngleName::SpineFlexion(Plane::Sagittal) => "Spine sagittal".to_string(),
            AngleName::ShoulderFlexion(s) => format!("{} shoulder flexion", side(s)),
            AngleName::ShoulderAbduction(s) => format!("{} shoulder abduction", side(s)),
            AngleName::HipFlexion(s) => format!("{} hip flexion", side(s)),
            AngleName::HipAbduction(s) => format!("{} hip abduction", side(s)),
            AngleName::ElbowFlexion(s) => format!("{} elbow flexion", side(s)),
            AngleName::KneeFlexion(s) => format!("{} knee flexion", side(s)),
        }
    }

    /// Joints that must carry an estimate for the angle to mean anything.
    fn joints(&self) -> Vec<JointType> {
        match *self {
            AngleName::SpineFlexion(_) => vec![JointType::SpineShoulder, JointType::SpineBase],
            AngleName::ShoulderFlexion(s) => vec![JointType::shoulder(s), JointType::elbow(s)],
            AngleName::ShoulderAbduction(s) => vec![
                JointType::SpineShoulder,
                JointType::SpineBase,
                JointType::shoulder(s),
                JointType::elbow(s),
            ],
            AngleName::HipFlexion(s) => vec![JointType::hip(s), JointType::knee(s)],
            AngleName::HipAbduction(s) => vec![
                JointType::SpineShoulder,
                JointType::SpineBase,
                JointType::hip(s),
                JointType::knee(s),
            ],
            AngleName::ElbowFlexion(s) => {
                vec![JointType::shoulder(s), JointType::elbow(s), JointType::wrist(s)]
            }
            AngleName::KneeFlexion(s) => {
                vec![JointType::hip(s), JointType::knee(s), JointType::ankle(s)]
            }
        }
    }

    pub fn unit(&self) -> AngleUnit {
        match self {
            AngleName::ElbowFlexion(_) | AngleName::KneeFlexion(_) => AngleUnit::Radians,
            _ => AngleUnit::Degrees,
        }
    }

    /// Measure this angle in its native unit. `None` when an involved joint
    /// has no estimate or a segment is degenerate.
    pub fn measure(&self, positions: &JointPositions<3>) -> Option<f64> {
        let estimated = self
            .joints()
            .iter()
            .all(|jt| positions.tracking_state(*jt).has_estimate() && positions.is_usable(*jt));
        if !estimated {
            return None;
        }

        let value = match *self {
            AngleName::SpineFlexion(plane) => flexion_spine_angle(positions, plane),
            AngleName::ShoulderFlexion(s) => flexion_shoulder_angle(positions, s),
            AngleName::ShoulderAbduction(s) => abduction_angle(positions, s, Limb::Arm),
            AngleName::HipFlexion(s) => flexion_hip_angle(positions, s),
            AngleName::HipAbduction(s) => abduction_angle(positions, s, Limb::Leg),
            AngleName::ElbowFlexion(s) => checked_flexion_elbow_angle(positions, s).ok()?,
            AngleName::KneeFlexion(s) => checked_flexion_knee_angle(positions, s).ok()?,
        };
        Some(value)
    }
}

/// A measured angle with its unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NamedAngle {
    pub name: AngleName,
    pub value: f64,
    pub unit: AngleUnit,
}

impl NamedAngle {
    pub fn degrees(&self) -> f64 {
        match self.unit {
            AngleUnit::Degrees => self.value,
            AngleUnit::Radians => self.value.to_degrees(),
        }
    }

    /// Whole degrees, truncated toward zero, for text display.
    pub fn display_degrees(&self) -> i64 {
        self.degrees().trunc() as i64
    }
}

/// Every measurable angle of one body for one tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AngleReadout {
    pub angles: Vec<NamedAngle>,
}

impl AngleReadout {
    pub const NAMES: [AngleName; 14] = [
        AngleName::SpineFlexion(Plane::Coronal),
        AngleName::SpineFlexion(Plane::Sagittal),
        AngleName::ShoulderFlexion(Side::Left),
        AngleName::ShoulderFlexion(Side::Right),
        AngleName::ShoulderAbduction(Side::Left),
        AngleName::ShoulderAbduction(Side::Right),
        AngleName::HipFlexion(Side::Left),
        AngleName::HipFlexion(Side::Right),
        AngleName::HipAbduction(Side::Left),
        AngleName::HipAbduction(Side::Right),
        AngleName::ElbowFlexion(Side::Left),
        AngleName::ElbowFlexion(Side::Right),
        AngleName::KneeFlexion(Side::Left),
        AngleName::KneeFlexion(Side::Right),
    ];

    pub fn from_positions(positions: &JointPositions<3>) -> Self {
        let angles = Self::NAMES
            .iter()
            .filter_map(|name| {
                name.measure(positions).map(|value| NamedAngle {
                    name: *name,
                    value,
                    unit: name.unit(),
                })
            })
            .collect();
        Self { angles }
    }

    pub fn get(&self, name: AngleName) -> Option<&NamedAngle> {
        self.angles.iter().find(|a| a.name == name)
    }
}

/// Per-side result of shoulder-abduction supervision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArmFeedback {
    pub side: Side,
    pub shoulder_abduction_deg: f64,
    pub elbow_flexion_deg: f64,
    /// The arm must stay straight during abduction; true shows the warning marker.
    pub elbow_bent: bool,
}

impl ArmFeedback {
    pub fn label(&self) -> String {
        format!("Angle: {:.1}", self.shoulder_abduction_deg)
    }
}

/// Supervises shoulder abduction/adduction on both arms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbductionSupervisor {
    elbow_bent_threshold_deg: f64,
}

impl AbductionSupervisor {
    pub fn new(elbow_bent_threshold_deg: f64) -> Self {
        Self {
            elbow_bent_threshold_deg,
        }
    }

    pub fn threshold_deg(&self) -> f64 {
        self.elbow_bent_threshold_deg
    }

    pub fn evaluate(&self, positions: &JointPositions<3>, side: Side) -> Option<ArmFeedback> {
        let shoulder_abduction_deg = AngleName::ShoulderAbduction(side).measure(positions)?;
        let elbow_flexion_deg = AngleName::ElbowFlexion(side).measure(positions)?.to_degrees();

        Some(ArmFeedback {
            side,
            shoulder_abduction_deg,
            elbow_flexion_deg,
            elbow_bent: elbow_flexion_deg > self.elbow_bent_threshold_deg,
        })
    }

    pub fn evaluate_both(&self, positions: &JointPositions<3>) -> Vec<ArmFeedback> {
        [Side::Left, Side::Right]
            .into_iter()
            .filter_map(|side| self.evaluate(positions, side))
            .collect()
    }
}

impl Default for AbductionSupervisor {
    fn default() -> Self {
        Self::new(DEFAULT_ELBOW_BENT_THRESHOLD_DEG)
    }
}
