//! Engine configuration.
//!
//! Loaded from a file and/or `KINETRACK_*` environment variables. Nested keys
//! use a double underscore, e.g. `KINETRACK_EXERCISE__TARGET_REPETITIONS=5`.

use std::collections::BTreeSet;

use kinetrack_biomech::{SurfaceGeometry, DEFAULT_ELBOW_BENT_THRESHOLD_DEG};
use kinetrack_core::{Error, JointType, Plane, Result, Side};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::exercise::{Exercise, ExerciseKind};
use crate::registry::{closest_first, SelectionStrategy, SensorOrder};
use crate::repetition::{DriveMode, RepetitionConfig, DEFAULT_ANGULAR_STEP};

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Display surface the skeleton is projected onto
    pub surface: SurfaceConfig,

    /// Exercise to count or demonstrate; `None` runs a plain body tracker
    pub exercise: Option<ExerciseConfig>,

    /// Which tracked bodies get analyzed
    pub tracking: TrackingConfig,

    /// Shoulder-abduction supervision
    pub supervision: SupervisionConfig,

    /// Joints that receive marker updates
    pub markers: MarkerSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub width: f64,
    pub height: f64,
    pub center_x: f64,
    pub center_y: f64,

    /// Depth at which surface markers are placed
    pub marker_depth: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExerciseConfig {
    pub kind: ExerciseKind,
    pub side: Side,

    /// Measurement plane, used by spine flexion only
    pub plane: Plane,

    /// Degrees
    pub lower_bound_deg: f64,

    /// Degrees
    pub upper_bound_deg: f64,

    pub target_repetitions: u32,

    /// Radians per second
    pub angular_step: f64,

    pub speed: f64,

    /// Radius of the guided target's circle, in surface units
    pub guided_radius: f64,

    pub mode: DriveMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionKind {
    /// Sensor's native order
    #[default]
    SensorOrder,
    /// Nearest spine base first
    ClosestFirst,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub selection: SelectionKind,

    /// 1 reproduces the single-body policy
    pub max_bodies: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisionConfig {
    pub enabled: bool,
    pub elbow_bent_threshold_deg: f64,
}

/// Joints that receive marker updates
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarkerSet {
    #[default]
    AllJoints,
    Hands { left: bool, right: bool },
    Joints { joints: BTreeSet<JointType> },
}

impl MarkerSet {
    pub fn contains(&self, joint: JointType) -> bool {
        match self {
            MarkerSet::AllJoints => true,
            MarkerSet::Hands { left, right } => {
                (*left && joint == JointType::HandLeft) || (*right && joint == JointType::HandRight)
            }
            MarkerSet::Joints { joints } => joints.contains(&joint),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            surface: SurfaceConfig::default(),
            exercise: Some(ExerciseConfig::default()),
            tracking: TrackingConfig::default(),
            supervision: SupervisionConfig::default(),
            markers: MarkerSet::default(),
        }
    }
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            width: 16.0,
            height: 9.0,
            center_x: 0.0,
            center_y: 0.0,
            marker_depth: 0.0,
        }
    }
}

impl Default for ExerciseConfig {
    fn default() -> Self {
        Self {
            kind: ExerciseKind::ShoulderAbduction,
            side: Side::Right,
            plane: Plane::Coronal,
            lower_bound_deg: 0.0,
            upper_bound_deg: 90.0,
            target_repetitions: 3,
            angular_step: DEFAULT_ANGULAR_STEP,
            speed: 1.0,
            guided_radius: 1.0,
            mode: DriveMode::Guided,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            selection: SelectionKind::SensorOrder,
            max_bodies: 1,
        }
    }
}

impl Default for SupervisionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            elbow_bent_threshold_deg: DEFAULT_ELBOW_BENT_THRESHOLD_DEG,
        }
    }
}

impl SurfaceConfig {
    pub fn geometry(&self) -> Result<SurfaceGeometry> {
        SurfaceGeometry::new(
            self.width,
            self.height,
            Vector2::new(self.center_x, self.center_y),
        )
    }
}

impl ExerciseConfig {
    pub fn exercise(&self) -> Exercise {
        Exercise::new(self.kind, self.side).with_plane(self.plane)
    }

    pub fn repetition(&self) -> Result<RepetitionConfig> {
        let config = RepetitionConfig::from_degrees(
            self.lower_bound_deg,
            self.upper_bound_deg,
            self.target_repetitions,
        )?
        .with_step(self.angular_step)
        .with_speed(self.speed);
        config.validate()?;
        Ok(config)
    }
}

impl TrackingConfig {
    pub fn strategy(&self) -> Box<dyn SelectionStrategy> {
        match self.selection {
            SelectionKind::SensorOrder => Box::new(SensorOrder::up_to(self.max_bodies)),
            SelectionKind::ClosestFirst => Box::new(closest_first(self.max_bodies)),
        }
    }
}

/// `KINETRACK_` prefix, `__` between nested keys.
fn environment() -> config::Environment {
    config::Environment::with_prefix("KINETRACK")
        .prefix_separator("_")
        .separator("__")
}

impl EngineConfig {
    /// Load configuration from file, with environment overrides
    pub fn from_file(path: &str) -> std::result::Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(environment())
            .build()?;

        settings.try_deserialize()
    }

    /// Load from environment variables
    pub fn from_env() -> std::result::Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(environment())
            .build()?;

        settings.try_deserialize()
    }

    pub fn validate(&self) -> Result<()> {
        self.surface.geometry()?;
        if !self.surface.marker_depth.is_finite() {
            return Err(Error::Config("surface.marker_depth must be finite".to_string()));
        }

        if let Some(exercise) = &self.exercise {
            exercise.repetition()?;
            if !(exercise.guided_radius.is_finite() && exercise.guided_radius > 0.0) {
                return Err(Error::Config(format!(
                    "exercise.guided_radius must be positive, got {}",
                    exercise.guided_radius
                )));
            }
        }

        if self.tracking.max_bodies == 0 {
            return Err(Error::Config("tracking.max_bodies must be at least 1".to_string()));
        }

        let threshold = self.supervision.elbow_bent_threshold_deg;
        if !(threshold.is_finite() && (0.0..=180.0).contains(&threshold)) {
            return Err(Error::Config(format!(
                "supervision.elbow_bent_threshold_deg must be within [0, 180], got {threshold}"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tracking.max_bodies, 1);
        assert_eq!(config.supervision.elbow_bent_threshold_deg, 30.0);

        let exercise = config.exercise.unwrap();
        assert_eq!(exercise.target_repetitions, 3);
        let repetition = exercise.repetition().unwrap();
        assert!((repetition.upper_bound - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = EngineConfig::default();
        config.surface.width = 0.0;
        assert!(matches!(config.validate(), Err(Error::InvalidSurface { .. })));

        let mut config = EngineConfig::default();
        config.tracking.max_bodies = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = EngineConfig::default();
        if let Some(exercise) = config.exercise.as_mut() {
            exercise.lower_bound_deg = 90.0;
        }
        assert!(matches!(config.validate(), Err(Error::InvalidBounds { .. })));
    }

    #[test]
    fn test_marker_sets() {
        assert!(MarkerSet::AllJoints.contains(JointType::Head));

        let hands = MarkerSet::Hands {
            left: false,
            right: true,
        };
        assert!(hands.contains(JointType::HandRight));
        assert!(!hands.contains(JointType::HandLeft));

        let joints = MarkerSet::Joints {
            joints: [JointType::Head, JointType::Neck].into_iter().collect(),
        };
        assert!(joints.contains(JointType::Neck));
        assert!(!joints.contains(JointType::SpineBase));
    }

    #[test]
    fn test_from_env_reads_nested_overrides() {
        std::env::set_var("KINETRACK_EXERCISE__TARGET_REPETITIONS", "5");
        std::env::set_var("KINETRACK_TRACKING__MAX_BODIES", "4");

        let loaded = EngineConfig::from_env();

        std::env::remove_var("KINETRACK_EXERCISE__TARGET_REPETITIONS");
        std::env::remove_var("KINETRACK_TRACKING__MAX_BODIES");

        let config = loaded.unwrap();
        assert_eq!(config.exercise.map(|e| e.target_repetitions), Some(5));
        assert_eq!(config.tracking.max_bodies, 4);
        assert_eq!(config.surface, SurfaceConfig::default());
    }

    #[test]
    fn test_from_file_fills_missing_sections() {
        let path = std::env::temp_dir().join(format!("kinetrack-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            r#"
[surface]
width = 32.0
height = 18.0

[supervision]
elbow_bent_threshold_deg = 45.0

[markers]
kind = "hands"
left = true
right = false
"#,
        )
        .unwrap();

        let loaded = EngineConfig::from_file(path.to_str().unwrap());
        std::fs::remove_file(&path).unwrap();

        let config = loaded.unwrap();
        assert_eq!(config.surface.width, 32.0);
        assert_eq!(config.surface.height, 18.0);
        assert_eq!(config.surface.center_x, 0.0);
        assert_eq!(config.supervision.elbow_bent_threshold_deg, 45.0);
        assert!(config.supervision.enabled);
        assert!(config.markers.contains(JointType::HandLeft));
        assert!(!config.markers.contains(JointType::HandRight));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_round_trip_uses_snake_case() {
        let json = r#"{
            "exercise": { "kind": "elbow_flexion", "side": "left", "mode": "sensed" },
            "tracking": { "selection": "closest_first", "max_bodies": 2 },
            "markers": { "kind": "hands", "left": true, "right": false }
        }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();

        let exercise = config.exercise.as_ref().unwrap();
        assert_eq!(exercise.kind, ExerciseKind::ElbowFlexion);
        assert_eq!(exercise.mode, DriveMode::Sensed);
        assert_eq!(exercise.upper_bound_deg, 90.0);
        assert_eq!(config.tracking.selection, SelectionKind::ClosestFirst);
        assert!(config.markers.contains(JointType::HandLeft));
        assert!(config.validate().is_ok());
    }
}
