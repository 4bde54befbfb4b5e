//! # Kinetrack-Session
//!
//! Stateful side of the engine, driven once per display tick:
//!
//! - **Registry**: sensor tracking ids to presentation entities, created on
//!   first sighting and destroyed the first tick they go missing
//! - **Repetition**: bound-to-bound oscillation counter, guided or sensed
//! - **Pipeline**: registry pass, body selection, projection and analysis
//! - **Config**: `config`-crate loading with `KINETRACK_*` overrides
//!
//! ## Example
//!
//! ```no_run
//! use kinetrack_session::{EngineConfig, ExerciseSession, IdentityLifecycle};
//!
//! let config = EngineConfig::default();
//! let mut session = ExerciseSession::new(config, IdentityLifecycle)?;
//! // Once per frame:
//! // let report = session.tick(Some(&sensor_tick), Some(&mapper));
//! # Ok::<(), kinetrack_core::Error>(())
//! ```

pub mod config;
pub mod exercise;
pub mod guided;
pub mod pipeline;
pub mod registry;
pub mod repetition;

pub use config::{
    EngineConfig, ExerciseConfig, MarkerSet, SelectionKind, SupervisionConfig, SurfaceConfig,
    TrackingConfig,
};
pub use exercise::{Exercise, ExerciseKind};
pub use guided::GuidedTarget;
pub use pipeline::{BodyReport, ExerciseSession, MarkerPose, TickReport};
pub use registry::{
    closest_first, ByComparator, EntityLifecycle, IdentityLifecycle, ReconcileOutcome,
    SelectionStrategy, SensorOrder, TrackedBody, TrackedBodyRegistry,
};
pub use repetition::{
    DriveInput, DriveMode, RepetitionConfig, RepetitionPhase, RepetitionSnapshot,
    RepetitionStateMachine, DEFAULT_ANGULAR_STEP,
};
