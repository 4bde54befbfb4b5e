//! Per-tick exercise pipeline.
//!
//! Each tick runs in two phases. The registry pass reconciles entities with
//! the incoming batch and completes before any body is analyzed. Then every
//! selected body is projected, measured and, when an exercise is configured,
//! its repetition machine is driven.
//!
//! Missing collaborators are not errors: without a frame batch or a mapper
//! the tick is skipped and no state changes.

use std::collections::BTreeMap;

use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use kinetrack_biomech::{
    AbductionSupervisor, AngleReadout, ArmFeedback, BodyMeasurements, CameraToColorMapper,
    CoordinateProjector,
};
use kinetrack_core::{
    BodyFrame, JointType, Orientation3D, Result, SensorTick, Timestamp, TrackingId,
};

use crate::config::{EngineConfig, MarkerSet};
use crate::exercise::Exercise;
use crate::guided::GuidedTarget;
use crate::registry::{EntityLifecycle, SelectionStrategy, TrackedBodyRegistry};
use crate::repetition::{DriveMode, RepetitionSnapshot};

/// Where a joint marker goes this tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarkerPose {
    /// Surface x/y at the configured marker depth
    pub position: Vector3<f64>,
    pub rotation: Orientation3D,
}

impl MarkerPose {
    pub fn rotation_quaternion(&self) -> UnitQuaternion<f64> {
        self.rotation.to_unit_quaternion()
    }
}

/// Everything the presentation layer needs for one body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyReport {
    pub tracking_id: TrackingId,
    /// Mappable joints of the configured marker set only
    pub markers: BTreeMap<JointType, MarkerPose>,
    /// Camera space, meters
    pub measurements: BodyMeasurements,
    pub angles: AngleReadout,
    pub arm_feedback: Vec<ArmFeedback>,
    pub repetition: Option<RepetitionSnapshot>,
    /// Guided target marker on the surface, when the pivot is mappable
    pub guided_target: Option<Vector3<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickReport {
    pub timestamp: Timestamp,
    /// Entities created by this tick's registry pass
    pub created: Vec<TrackingId>,
    /// Entities destroyed by this tick's registry pass
    pub removed: Vec<TrackingId>,
    /// Selected bodies, in selection order
    pub bodies: Vec<BodyReport>,
}

impl TickReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn body(&self, id: TrackingId) -> Option<&BodyReport> {
        self.bodies.iter().find(|b| b.tracking_id == id)
    }
}

/// Configured exercise with its drive mode and guided target
#[derive(Debug, Clone, Copy)]
struct ActiveExercise {
    exercise: Exercise,
    mode: DriveMode,
    target: GuidedTarget,
}

/// Tick-driven exercise session.
///
/// Single-threaded and synchronous: one `tick` call per display refresh.
pub struct ExerciseSession<L: EntityLifecycle> {
    projector: CoordinateProjector,
    registry: TrackedBodyRegistry<L::Handle>,
    lifecycle: L,
    selection: Box<dyn SelectionStrategy>,
    supervisor: Option<AbductionSupervisor>,
    exercise: Option<ActiveExercise>,
    markers: MarkerSet,
    marker_depth: f64,
    last_timestamp: Option<Timestamp>,
    ticks_processed: u64,
}

impl<L: EntityLifecycle> ExerciseSession<L> {
    pub fn new(config: EngineConfig, lifecycle: L) -> Result<Self> {
        config.validate()?;

        let mut registry = TrackedBodyRegistry::new();
        let exercise = match &config.exercise {
            Some(exercise_config) => {
                registry = registry.with_repetition(exercise_config.repetition()?);
                let exercise = exercise_config.exercise();
                Some(ActiveExercise {
                    exercise,
                    mode: exercise_config.mode,
                    target: GuidedTarget::new(exercise.pivot(), exercise_config.guided_radius),
                })
            }
            None => None,
        };

        let supervisor = config
            .supervision
            .enabled
            .then(|| AbductionSupervisor::new(config.supervision.elbow_bent_threshold_deg));

        Ok(Self {
            projector: CoordinateProjector::new(config.surface.geometry()?),
            registry,
            lifecycle,
            selection: config.tracking.strategy(),
            supervisor,
            exercise,
            markers: config.markers.clone(),
            marker_depth: config.surface.marker_depth,
            last_timestamp: None,
            ticks_processed: 0,
        })
    }

    /// Replace the configured selection strategy.
    pub fn with_selection(mut self, selection: Box<dyn SelectionStrategy>) -> Self {
        self.selection = selection;
        self
    }

    /// Process one tick. Returns `None` when a collaborator is missing.
    pub fn tick(
        &mut self,
        input: Option<&SensorTick>,
        mapper: Option<&dyn CameraToColorMapper>,
    ) -> Option<TickReport> {
        let (input, mapper) = match (input, mapper) {
            (Some(input), Some(mapper)) => (input, mapper),
            (input, mapper) => {
                tracing::debug!(
                    has_frames = input.is_some(),
                    has_mapper = mapper.is_some(),
                    "collaborator unavailable, skipping tick"
                );
                return None;
            }
        };

        let elapsed_secs = self.elapsed_secs(input);
        self.last_timestamp = Some(input.timestamp);

        let outcome = self.registry.reconcile(&input.bodies, &mut self.lifecycle);

        let tracked: Vec<&BodyFrame> = input.tracked_bodies().collect();
        let selected = self.selection.select(&tracked);

        let bodies = selected
            .into_iter()
            .map(|body| self.analyze_body(body, elapsed_secs, mapper))
            .collect();

        self.ticks_processed += 1;

        Some(TickReport {
            timestamp: input.timestamp,
            created: outcome.created,
            removed: outcome.removed,
            bodies,
        })
    }

    /// Tick duration from the source, or from consecutive timestamps when
    /// the source reports none.
    fn elapsed_secs(&self, input: &SensorTick) -> f64 {
        if input.elapsed_secs.is_finite() && input.elapsed_secs > 0.0 {
            return input.elapsed_secs;
        }
        self.last_timestamp
            .map(|previous| input.timestamp.secs_since(&previous))
            .unwrap_or(0.0)
    }

    fn analyze_body(
        &mut self,
        body: &BodyFrame,
        elapsed_secs: f64,
        mapper: &dyn CameraToColorMapper,
    ) -> BodyReport {
        let projection = self.projector.project(&body.joints, mapper);
        let positions = body.joints.positions();

        let markers = projection
            .mappable()
            .filter(|(jt, _)| self.markers.contains(*jt))
            .map(|(jt, p)| {
                let pose = MarkerPose {
                    position: Vector3::new(p.x, p.y, self.marker_depth),
                    rotation: body.joints.orientation(jt),
                };
                (jt, pose)
            })
            .collect();

        let arm_feedback = self
            .supervisor
            .map(|s| s.evaluate_both(&positions))
            .unwrap_or_default();

        let mut repetition = None;
        let mut guided_target = None;

        if let Some(active) = self.exercise {
            let machine = self
                .registry
                .get_mut(body.tracking_id)
                .and_then(|tracked| tracked.repetition.as_mut());

            if let Some(machine) = machine {
                match active.mode {
                    DriveMode::Guided => {
                        machine.advance(elapsed_secs);
                        guided_target = projection.point(active.target.pivot).map(|pivot| {
                            let pivot = Vector3::new(pivot.x, pivot.y, self.marker_depth);
                            active.target.position(&pivot, machine.angle())
                        });
                    }
                    DriveMode::Sensed => match active.exercise.measure(&positions) {
                        Some(angle) => {
                            machine.observe(angle);
                        }
                        None => {
                            tracing::trace!(tracking_id = %body.tracking_id, "exercise joints not tracked");
                        }
                    },
                }
                repetition = Some(machine.snapshot());
            }
        }

        BodyReport {
            tracking_id: body.tracking_id,
            markers,
            measurements: BodyMeasurements::from_positions(&positions),
            angles: AngleReadout::from_positions(&positions),
            arm_feedback,
            repetition,
            guided_target,
        }
    }

    pub fn registry(&self) -> &TrackedBodyRegistry<L::Handle> {
        &self.registry
    }

    pub fn lifecycle(&self) -> &L {
        &self.lifecycle
    }

    pub fn projector(&self) -> &CoordinateProjector {
        &self.projector
    }

    pub fn ticks_processed(&self) -> u64 {
        self.ticks_processed
    }

    /// Destroy every remaining entity.
    pub fn shutdown(&mut self) {
        self.registry.clear(&mut self.lifecycle);
        tracing::info!(ticks = self.ticks_processed, "session shut down");
    }
}
