//! # Kinetrack-Biomech
//!
//! Skeletal geometry for exercise analysis.
//!
//! ## Components
//!
//! 1. **Projection**: camera-space joints to a display surface, with an
//!    infinite sentinel for joints the sensor cannot map
//! 2. **Biomechanics**: limb lengths, body height and clinical joint angles
//!    (spine/shoulder/hip flexion, abduction, elbow/knee flexion)
//! 3. **Supervision**: named angle readouts and shoulder-abduction feedback
//!
//! All functions are pure: a frame goes in, numbers come out. Nothing here
//! retains state across ticks.

pub mod biomechanics;
pub mod projection;
pub mod supervision;

pub use biomechanics::*;
pub use projection::*;
pub use supervision::*;
