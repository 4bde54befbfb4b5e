//! Fundamental types for the kinetrack engine.

use nalgebra::{SVector, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geometry::Orientation3D;

/// Sensor-assigned body tracking identifier.
///
/// Stable only while the same person stays continuously detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrackingId(pub u64);

impl std::fmt::Display for TrackingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Timestamp wrapper with nanosecond precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub fn as_nanos(&self) -> i64 {
        self.0
    }

    /// Seconds elapsed since `earlier`, never negative.
    pub fn secs_since(&self, earlier: &Timestamp) -> f64 {
        (self.0.saturating_sub(earlier.0) as f64 / 1_000_000_000.0).max(0.0)
    }
}

/// 3D position in sensor camera space (meters)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Position3D {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn origin() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    pub fn from_vector(v: Vector3<f64>) -> Self {
        Self::new(v.x, v.y, v.z)
    }

    pub fn distance_to(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Per-joint tracking confidence reported by the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TrackingState {
    #[default]
    NotTracked,
    Inferred,
    Tracked,
}

impl TrackingState {
    /// Tracked or inferred: the sensor has some position estimate.
    pub fn has_estimate(&self) -> bool {
        !matches!(self, TrackingState::NotTracked)
    }
}

/// Body side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

/// Limb chain used for length measurements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Limb {
    /// shoulder -> elbow -> wrist -> hand
    Arm,
    /// hip -> knee -> ankle -> foot
    Leg,
}

impl Limb {
    /// Joints of the limb chain, proximal first.
    pub fn chain(&self, side: Side) -> [JointType; 4] {
        use JointType::*;
        match (self, side) {
            (Limb::Arm, Side::Left) => [ShoulderLeft, ElbowLeft, WristLeft, HandLeft],
            (Limb::Arm, Side::Right) => [ShoulderRight, ElbowRight, WristRight, HandRight],
            (Limb::Leg, Side::Left) => [HipLeft, KneeLeft, AnkleLeft, FootLeft],
            (Limb::Leg, Side::Right) => [HipRight, KneeRight, AnkleRight, FootRight],
        }
    }
}

/// Anatomical measurement plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plane {
    /// (x, y) components
    Coronal,
    /// (z, y) components
    Sagittal,
}

/// 25-joint skeletal landmark set, in the sensor's native index order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum JointType {
    SpineBase = 0,
    SpineMid = 1,
    Neck = 2,
    Head = 3,
    ShoulderLeft = 4,
    ElbowLeft = 5,
    WristLeft = 6,
    HandLeft = 7,
    ShoulderRight = 8,
    ElbowRight = 9,
    WristRight = 10,
    HandRight = 11,
    HipLeft = 12,
    KneeLeft = 13,
    AnkleLeft = 14,
    FootLeft = 15,
    HipRight = 16,
    KneeRight = 17,
    AnkleRight = 18,
    FootRight = 19,
    SpineShoulder = 20,
    HandTipLeft = 21,
    ThumbLeft = 22,
    HandTipRight = 23,
    ThumbRight = 24,
}

impl JointType {
    pub const COUNT: usize = 25;

    pub const ALL: [JointType; JointType::COUNT] = [
        JointType::SpineBase,
        JointType::SpineMid,
        JointType::Neck,
        JointType::Head,
        JointType::ShoulderLeft,
        JointType::ElbowLeft,
        JointType::WristLeft,
        JointType::HandLeft,
        JointType::ShoulderRight,
        JointType::ElbowRight,
        JointType::WristRight,
        JointType::HandRight,
        JointType::HipLeft,
        JointType::KneeLeft,
        JointType::AnkleLeft,
        JointType::FootLeft,
        JointType::HipRight,
        JointType::KneeRight,
        JointType::AnkleRight,
        JointType::FootRight,
        JointType::SpineShoulder,
        JointType::HandTipLeft,
        JointType::ThumbLeft,
        JointType::HandTipRight,
        JointType::ThumbRight,
    ];

    pub fn from_index(idx: u8) -> Option<Self> {
        Self::ALL.get(idx as usize).copied()
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn shoulder(side: Side) -> Self {
        match side {
            Side::Left => JointType::ShoulderLeft,
            Side::Right => JointType::ShoulderRight,
        }
    }

    pub fn elbow(side: Side) -> Self {
        match side {
            Side::Left => JointType::ElbowLeft,
            Side::Right => JointType::ElbowRight,
        }
    }

    pub fn wrist(side: Side) -> Self {
        match side {
            Side::Left => JointType::WristLeft,
            Side::Right => JointType::WristRight,
        }
    }

    pub fn hand(side: Side) -> Self {
        match side {
            Side::Left => JointType::HandLeft,
            Side::Right => JointType::HandRight,
        }
    }

    pub fn hip(side: Side) -> Self {
        match side {
            Side::Left => JointType::HipLeft,
            Side::Right => JointType::HipRight,
        }
    }

    pub fn knee(side: Side) -> Self {
        match side {
            Side::Left => JointType::KneeLeft,
            Side::Right => JointType::KneeRight,
        }
    }

    pub fn ankle(side: Side) -> Self {
        match side {
            Side::Left => JointType::AnkleLeft,
            Side::Right => JointType::AnkleRight,
        }
    }
}

/// A single joint sample: camera-space position plus tracking confidence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    pub position: Position3D,
    pub tracking_state: TrackingState,
}

impl Joint {
    pub fn new(position: Position3D, tracking_state: TrackingState) -> Self {
        Self {
            position,
            tracking_state,
        }
    }

    pub fn tracked(x: f64, y: f64, z: f64) -> Self {
        Self::new(Position3D::new(x, y, z), TrackingState::Tracked)
    }
}

impl Default for Joint {
    fn default() -> Self {
        Self::new(Position3D::origin(), TrackingState::NotTracked)
    }
}

/// One sensor frame for one body: every joint's position, confidence and
/// orientation. Always holds exactly [`JointType::COUNT`] entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointFrame {
    joints: [Joint; JointType::COUNT],
    orientations: [Orientation3D; JointType::COUNT],
}

impl JointFrame {
    pub fn new(
        joints: [Joint; JointType::COUNT],
        orientations: [Orientation3D; JointType::COUNT],
    ) -> Self {
        Self {
            joints,
            orientations,
        }
    }

    /// Build a frame from positions only; orientations default to identity.
    pub fn from_joints(joints: [Joint; JointType::COUNT]) -> Self {
        Self::new(joints, [Orientation3D::identity(); JointType::COUNT])
    }

    /// Build a frame from keyed entries, as delivered by a sensor SDK
    /// dictionary. Every joint must be present exactly once.
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (JointType, Joint, Orientation3D)>,
    {
        let mut joints: [Option<Joint>; JointType::COUNT] = [None; JointType::COUNT];
        let mut orientations = [Orientation3D::identity(); JointType::COUNT];

        for (joint_type, joint, orientation) in entries {
            joints[joint_type.index()] = Some(joint);
            orientations[joint_type.index()] = orientation;
        }

        let mut complete = [Joint::default(); JointType::COUNT];
        for joint_type in JointType::ALL {
            complete[joint_type.index()] = joints[joint_type.index()]
                .ok_or(Error::MissingJoint { joint: joint_type })?;
        }

        Ok(Self::new(complete, orientations))
    }

    pub fn joint(&self, joint: JointType) -> &Joint {
        &self.joints[joint.index()]
    }

    pub fn position(&self, joint: JointType) -> Position3D {
        self.joints[joint.index()].position
    }

    pub fn tracking_state(&self, joint: JointType) -> TrackingState {
        self.joints[joint.index()].tracking_state
    }

    pub fn orientation(&self, joint: JointType) -> Orientation3D {
        self.orientations[joint.index()]
    }

    pub fn joints(&self) -> impl Iterator<Item = (JointType, &Joint)> {
        JointType::ALL.iter().map(move |jt| (*jt, &self.joints[jt.index()]))
    }

    /// Replace one joint, returning the modified frame.
    pub fn with_joint(mut self, joint_type: JointType, joint: Joint) -> Self {
        self.joints[joint_type.index()] = joint;
        self
    }

    pub fn with_orientation(mut self, joint_type: JointType, orientation: Orientation3D) -> Self {
        self.orientations[joint_type.index()] = orientation;
        self
    }

    /// Camera-space positions as vectors, for the 3D analysis space.
    pub fn positions(&self) -> JointPositions<3> {
        let mut points = [Vector3::zeros(); JointType::COUNT];
        let mut states = [TrackingState::NotTracked; JointType::COUNT];
        for (i, joint) in self.joints.iter().enumerate() {
            points[i] = joint.position.to_vector();
            states[i] = joint.tracking_state;
        }
        JointPositions::new(points, states)
    }
}

/// Joint positions in a D-dimensional analysis space (3 = camera space,
/// 2 = projected surface space) together with the frame's tracking states.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JointPositions<const D: usize> {
    points: [SVector<f64, D>; JointType::COUNT],
    states: [TrackingState; JointType::COUNT],
}

impl<const D: usize> JointPositions<D> {
    pub fn new(
        points: [SVector<f64, D>; JointType::COUNT],
        states: [TrackingState; JointType::COUNT],
    ) -> Self {
        Self { points, states }
    }

    pub fn point(&self, joint: JointType) -> &SVector<f64, D> {
        &self.points[joint.index()]
    }

    pub fn tracking_state(&self, joint: JointType) -> TrackingState {
        self.states[joint.index()]
    }

    /// Vector from `to` towards `from` (`from - to`).
    pub fn segment(&self, from: JointType, to: JointType) -> SVector<f64, D> {
        self.point(from) - self.point(to)
    }

    pub fn distance(&self, a: JointType, b: JointType) -> f64 {
        self.segment(a, b).norm()
    }

    /// True when every coordinate of the joint is finite.
    pub fn is_usable(&self, joint: JointType) -> bool {
        self.point(joint).iter().all(|c| c.is_finite())
    }

    pub fn iter(&self) -> impl Iterator<Item = (JointType, &SVector<f64, D>)> {
        JointType::ALL
            .iter()
            .map(move |jt| (*jt, &self.points[jt.index()]))
    }
}

/// One body as delivered by the frame source for a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyFrame {
    pub tracking_id: TrackingId,
    pub is_tracked: bool,
    pub joints: JointFrame,
}

impl BodyFrame {
    pub fn new(tracking_id: TrackingId, is_tracked: bool, joints: JointFrame) -> Self {
        Self {
            tracking_id,
            is_tracked,
            joints,
        }
    }

    pub fn tracked(tracking_id: u64, joints: JointFrame) -> Self {
        Self::new(TrackingId(tracking_id), true, joints)
    }
}

/// Everything the frame source hands over for one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorTick {
    pub timestamp: Timestamp,
    /// Seconds since the previous tick
    pub elapsed_secs: f64,
    /// Up to six body slots, in the sensor's native order
    pub bodies: Vec<BodyFrame>,
}

impl SensorTick {
    pub fn new(timestamp: Timestamp, elapsed_secs: f64, bodies: Vec<BodyFrame>) -> Self {
        Self {
            timestamp,
            elapsed_secs,
            bodies,
        }
    }

    /// Bodies flagged as currently tracked, in sensor order.
    pub fn tracked_bodies(&self) -> impl Iterator<Item = &BodyFrame> {
        self.bodies.iter().filter(|b| b.is_tracked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_distance() {
        let p1 = Position3D::new(0.0, 0.0, 0.0);
        let p2 = Position3D::new(3.0, 4.0, 0.0);
        assert!((p1.distance_to(&p2) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_joint_type_roundtrip() {
        for i in 0..JointType::COUNT as u8 {
            let joint = JointType::from_index(i).unwrap();
            assert_eq!(joint as u8, i);
        }
        assert!(JointType::from_index(25).is_none());
    }

    #[test]
    fn test_from_entries_requires_every_joint() {
        let entries: Vec<_> = JointType::ALL
            .iter()
            .filter(|jt| **jt != JointType::ThumbRight)
            .map(|jt| (*jt, Joint::tracked(0.0, 0.0, 1.0), Orientation3D::identity()))
            .collect();

        let err = JointFrame::from_entries(entries).unwrap_err();
        assert_eq!(
            err,
            Error::MissingJoint {
                joint: JointType::ThumbRight
            }
        );
    }

    #[test]
    fn test_positions_carry_tracking_states() {
        let frame = JointFrame::from_joints([Joint::default(); JointType::COUNT])
            .with_joint(JointType::Head, Joint::tracked(0.0, 1.7, 2.0));
        let positions = frame.positions();

        assert_eq!(positions.tracking_state(JointType::Head), TrackingState::Tracked);
        assert_eq!(positions.tracking_state(JointType::Neck), TrackingState::NotTracked);
        assert!((positions.point(JointType::Head).y - 1.7).abs() < 1e-12);
    }

    #[test]
    fn test_limb_chain_order() {
        assert_eq!(
            Limb::Leg.chain(Side::Right),
            [
                JointType::HipRight,
                JointType::KneeRight,
                JointType::AnkleRight,
                JointType::FootRight
            ]
        );
    }

    #[test]
    fn test_secs_since_is_non_negative() {
        let a = Timestamp::from_nanos(2_000_000_000);
        let b = Timestamp::from_nanos(500_000_000);
        assert!((a.secs_since(&b) - 1.5).abs() < 1e-12);
        assert_eq!(b.secs_since(&a), 0.0);

        // Extreme spans saturate instead of overflowing.
        let min = Timestamp::from_nanos(i64::MIN);
        let max = Timestamp::from_nanos(i64::MAX);
        assert!(max.secs_since(&min) > 0.0);
        assert_eq!(min.secs_since(&max), 0.0);
    }
}
