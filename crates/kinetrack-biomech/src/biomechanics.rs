//! Biomechanical measurements over a single joint frame.
//!
//! Functions are generic over the analysis space: `JointPositions<3>` is
//! sensor camera space (meters), `JointPositions<2>` is the projected display
//! surface. Measurements in the sagittal plane need depth and are only
//! defined for the 3D space.
//!
//! Units differ per measurement and are part of the contract:
//!
//! | Measurement | Unit |
//! |---|---|
//! | spine flexion, shoulder flexion, hip flexion, abduction | degrees |
//! | elbow flexion, knee flexion | radians |
//! | lengths, height | space units (meters in 3D) |
//!
//! Each angle follows a fixed clinical convention (reference vector and
//! plane). For example an upright spine reads 180 degrees of flexion because
//! the spine vector (base minus shoulder) points away from "up".

use kinetrack_core::{
    angle_between_2d, coronal, sagittal, segment_angle, Error, JointPositions, JointType, Limb,
    Plane, Result, Side, TrackingState, DOWN_2D, UP_2D,
};
use nalgebra::{SVector, Vector2};
use serde::{Deserialize, Serialize};

/// Added to the skeletal height to approximate foot-to-ground clearance.
pub const FOOT_CLEARANCE: f64 = 0.08;

/// Segments shorter than this are treated as degenerate by checked helpers.
pub const MIN_SEGMENT_LENGTH: f64 = 1e-6;

/// Sum of consecutive segment lengths along a limb chain.
pub fn limb_length<const D: usize>(positions: &JointPositions<D>, side: Side, limb: Limb) -> f64 {
    limb.chain(side)
        .windows(2)
        .map(|pair| positions.distance(pair[0], pair[1]))
        .sum()
}

/// Number of leg joints (hip, knee, ankle, foot) reported as fully tracked.
pub fn tracked_leg_joints<const D: usize>(positions: &JointPositions<D>, side: Side) -> usize {
    Limb::Leg
        .chain(side)
        .iter()
        .filter(|jt| positions.tracking_state(**jt) == TrackingState::Tracked)
        .count()
}

/// Leg used for the height estimate: the side with strictly more tracked
/// joints, the right leg on a tie.
pub fn height_leg_side<const D: usize>(positions: &JointPositions<D>) -> Side {
    if tracked_leg_joints(positions, Side::Left) > tracked_leg_joints(positions, Side::Right) {
        Side::Left
    } else {
        Side::Right
    }
}

/// Body height: head to neck, neck to spine-shoulder, spine-shoulder to
/// spine-base, the selected leg, plus [`FOOT_CLEARANCE`].
pub fn body_height<const D: usize>(positions: &JointPositions<D>) -> f64 {
    let torso = positions.distance(JointType::Head, JointType::Neck)
        + positions.distance(JointType::Neck, JointType::SpineShoulder)
        + positions.distance(JointType::SpineShoulder, JointType::SpineBase);
    let leg = limb_length(positions, height_leg_side(positions), Limb::Leg);

    torso + leg + FOOT_CLEARANCE
}

fn spine_vector<const D: usize>(positions: &JointPositions<D>) -> SVector<f64, D> {
    positions.segment(JointType::SpineBase, JointType::SpineShoulder)
}

/// Proximal segment of a limb: shoulder minus elbow, or hip minus knee.
fn proximal_segment<const D: usize>(
    positions: &JointPositions<D>,
    side: Side,
    limb: Limb,
) -> SVector<f64, D> {
    match limb {
        Limb::Arm => positions.segment(JointType::shoulder(side), JointType::elbow(side)),
        Limb::Leg => positions.segment(JointType::hip(side), JointType::knee(side)),
    }
}

/// Spine flexion in the coronal plane, degrees. Works in both spaces.
pub fn flexion_spine_angle_coronal<const D: usize>(positions: &JointPositions<D>) -> f64 {
    angle_between_2d(&UP_2D, &coronal(&spine_vector(positions))).to_degrees()
}

/// Angle between "up" and the spine vector projected on `plane`, degrees.
pub fn flexion_spine_angle(positions: &JointPositions<3>, plane: Plane) -> f64 {
    let spine = spine_vector(positions);
    let projected: Vector2<f64> = match plane {
        Plane::Coronal => coronal(&spine),
        Plane::Sagittal => sagittal(&spine),
    };
    angle_between_2d(&UP_2D, &projected).to_degrees()
}

/// Frontal-plane angle between the torso vector and the limb's proximal
/// segment, degrees.
pub fn abduction_angle<const D: usize>(positions: &JointPositions<D>, side: Side, limb: Limb) -> f64 {
    let torso = coronal(&spine_vector(positions));
    let segment = coronal(&proximal_segment(positions, side, limb));
    angle_between_2d(&torso, &segment).to_degrees()
}

/// Angle between "down" and the sagittal projection of the upper arm
/// (shoulder minus elbow), degrees.
pub fn flexion_shoulder_angle(positions: &JointPositions<3>, side: Side) -> f64 {
    let arm = sagittal(&proximal_segment(positions, side, Limb::Arm));
    angle_between_2d(&DOWN_2D, &arm).to_degrees()
}

/// Angle between "down" and the sagittal projection of the thigh
/// (hip minus knee), degrees.
pub fn flexion_hip_angle(positions: &JointPositions<3>, side: Side) -> f64 {
    let thigh = sagittal(&proximal_segment(positions, side, Limb::Leg));
    angle_between_2d(&DOWN_2D, &thigh).to_degrees()
}

/// Elbow flexion in radians: angle between shoulder-elbow and elbow-wrist.
///
/// Unchecked: the caller guards against untracked or coincident joints. A
/// zero-length segment yields NaN; see [`checked_flexion_elbow_angle`].
pub fn flexion_elbow_angle<const D: usize>(positions: &JointPositions<D>, side: Side) -> f64 {
    let (shoulder, elbow, wrist) = (
        JointType::shoulder(side),
        JointType::elbow(side),
        JointType::wrist(side),
    );
    segment_angle(
        &positions.segment(shoulder, elbow),
        &positions.segment(elbow, wrist),
    )
}

/// Knee flexion in radians: angle between hip-knee and knee-ankle.
///
/// Unchecked, like [`flexion_elbow_angle`].
pub fn flexion_knee_angle<const D: usize>(positions: &JointPositions<D>, side: Side) -> f64 {
    let (hip, knee, ankle) = (
        JointType::hip(side),
        JointType::knee(side),
        JointType::ankle(side),
    );
    segment_angle(
        &positions.segment(hip, knee),
        &positions.segment(knee, ankle),
    )
}

/// Fails when either end of the segment has no estimate, is not finite, or
/// the segment is shorter than [`MIN_SEGMENT_LENGTH`].
pub fn ensure_segment<const D: usize>(
    positions: &JointPositions<D>,
    from: JointType,
    to: JointType,
) -> Result<()> {
    let usable = |jt: JointType| {
        positions.tracking_state(jt).has_estimate() && positions.is_usable(jt)
    };
    if !usable(from) || !usable(to) || positions.distance(from, to) < MIN_SEGMENT_LENGTH {
        return Err(Error::DegenerateSegment { from, to });
    }
    Ok(())
}

pub fn checked_flexion_elbow_angle<const D: usize>(
    positions: &JointPositions<D>,
    side: Side,
) -> Result<f64> {
    ensure_segment(positions, JointType::shoulder(side), JointType::elbow(side))?;
    ensure_segment(positions, JointType::elbow(side), JointType::wrist(side))?;
    Ok(flexion_elbow_angle(positions, side))
}

pub fn checked_flexion_knee_angle<const D: usize>(
    positions: &JointPositions<D>,
    side: Side,
) -> Result<f64> {
    ensure_segment(positions, JointType::hip(side), JointType::knee(side))?;
    ensure_segment(positions, JointType::knee(side), JointType::ankle(side))?;
    Ok(flexion_knee_angle(positions, side))
}

/// Segment-length summary of one body, in the units of the analysis space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyMeasurements {
    pub left_arm: f64,
    pub right_arm: f64,
    pub left_leg: f64,
    pub right_leg: f64,
    pub height: f64,
    /// Leg that contributed to `height`
    pub height_leg: Side,
}

impl BodyMeasurements {
    pub fn from_positions<const D: usize>(positions: &JointPositions<D>) -> Self {
        Self {
            left_arm: limb_length(positions, Side::Left, Limb::Arm),
            right_arm: limb_length(positions, Side::Right, Limb::Arm),
            left_leg: limb_length(positions, Side::Left, Limb::Leg),
            right_leg: limb_length(positions, Side::Right, Limb::Leg),
            height: body_height(positions),
            height_leg: height_leg_side(positions),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinetrack_core::{Joint, JointFrame};
    use std::f64::consts::{FRAC_PI_2, PI};

    /// Upright T-free pose: arms hanging, legs straight, facing the sensor.
    fn upright() -> JointFrame {
        use JointType::*;
        let mut joints = [Joint::tracked(0.0, 0.0, 2.0); JointType::COUNT];
        let mut set = |jt: JointType, x: f64, y: f64| joints[jt.index()] = Joint::tracked(x, y, 2.0);

        set(Head, 0.0, 1.6);
        set(Neck, 0.0, 1.5);
        set(SpineShoulder, 0.0, 1.4);
        set(SpineMid, 0.0, 1.2);
        set(SpineBase, 0.0, 0.9);
        for (sign, side) in [(-1.0, Side::Left), (1.0, Side::Right)] {
            set(JointType::shoulder(side), 0.2 * sign, 1.4);
            set(JointType::elbow(side), 0.2 * sign, 1.1);
            set(JointType::wrist(side), 0.2 * sign, 0.85);
            set(JointType::hand(side), 0.2 * sign, 0.75);
            set(JointType::hip(side), 0.1 * sign, 0.9);
            set(JointType::knee(side), 0.1 * sign, 0.5);
            set(JointType::ankle(side), 0.1 * sign, 0.1);
        }
        set(FootLeft, -0.1, 0.05);
        set(FootRight, 0.1, 0.05);

        JointFrame::from_joints(joints)
    }

    #[test]
    fn test_limb_lengths() {
        let positions = upright().positions();
        assert!((limb_length(&positions, Side::Right, Limb::Arm) - 0.65).abs() < 1e-9);
        assert!((limb_length(&positions, Side::Left, Limb::Leg) - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_body_height_uses_right_leg_on_tie() {
        let positions = upright().positions();
        assert_eq!(height_leg_side(&positions), Side::Right);
        // 0.1 + 0.1 + 0.5 torso, 0.85 leg, clearance
        assert!((body_height(&positions) - (0.7 + 0.85 + FOOT_CLEARANCE)).abs() < 1e-9);
    }

    #[test]
    fn test_body_height_prefers_better_tracked_leg() {
        let frame = upright().with_joint(
            JointType::KneeRight,
            Joint::new(kinetrack_core::Position3D::new(0.1, 0.5, 2.0), TrackingState::Inferred),
        );
        assert_eq!(height_leg_side(&frame.positions()), Side::Left);
    }

    #[test]
    fn test_upright_angles() {
        let positions = upright().positions();

        assert!((flexion_spine_angle(&positions, Plane::Coronal) - 180.0).abs() < 1e-9);
        assert!((flexion_spine_angle(&positions, Plane::Sagittal) - 180.0).abs() < 1e-9);
        assert!((abduction_angle(&positions, Side::Right, Limb::Arm) - 180.0).abs() < 1e-9);
        assert!((flexion_shoulder_angle(&positions, Side::Left) - 180.0).abs() < 1e-9);
        assert!(flexion_elbow_angle(&positions, Side::Right).abs() < 1e-6);
        assert!(flexion_knee_angle(&positions, Side::Left).abs() < 1e-6);
    }

    #[test]
    fn test_arm_raised_sideways_reads_ninety() {
        let frame = upright()
            .with_joint(JointType::ElbowRight, Joint::tracked(0.5, 1.4, 2.0))
            .with_joint(JointType::WristRight, Joint::tracked(0.5, 1.7, 2.0));
        let positions = frame.positions();

        assert!((abduction_angle(&positions, Side::Right, Limb::Arm) - 90.0).abs() < 1e-9);
        assert!((flexion_elbow_angle(&positions, Side::Right) - FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn test_forward_reach_shoulder_flexion() {
        // Elbow straight in front of the shoulder (towards the sensor).
        let frame = upright().with_joint(JointType::ElbowLeft, Joint::tracked(-0.2, 1.4, 1.7));
        let positions = frame.positions();
        assert!((flexion_shoulder_angle(&positions, Side::Left) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_knee_folded_back() {
        let frame = upright().with_joint(JointType::AnkleRight, Joint::tracked(0.1, 0.9, 2.0));
        let positions = frame.positions();
        assert!((flexion_knee_angle(&positions, Side::Right) - PI).abs() < 1e-6);
    }

    #[test]
    fn test_checked_elbow_rejects_coincident_joints() {
        let frame = upright().with_joint(JointType::WristLeft, Joint::tracked(-0.2, 1.1, 2.0));
        let positions = frame.positions();

        assert!(flexion_elbow_angle(&positions, Side::Left).is_nan());
        assert_eq!(
            checked_flexion_elbow_angle(&positions, Side::Left),
            Err(Error::DegenerateSegment {
                from: JointType::ElbowLeft,
                to: JointType::WristLeft
            })
        );
    }

    #[test]
    fn test_checked_knee_rejects_untracked() {
        let frame = upright().with_joint(JointType::HipLeft, Joint::default());
        assert!(checked_flexion_knee_angle(&frame.positions(), Side::Left).is_err());
        assert!(checked_flexion_knee_angle(&frame.positions(), Side::Right).is_ok());
    }

    #[test]
    fn test_measurements_summary() {
        let m = BodyMeasurements::from_positions(&upright().positions());
        assert!((m.left_arm - m.right_arm).abs() < 1e-12);
        assert_eq!(m.height_leg, Side::Right);
    }
}
