//! Camera-space to display-surface projection.
//!
//! The sensor collaborator supplies a camera-to-color mapping (3D camera-space
//! point in meters, 2D color-frame pixel out). The projector rescales those
//! pixels from the sensor's native color resolution onto a display surface of
//! arbitrary size and placement:
//!
//! ```text
//! x' = x * W / 1920 - W / 2 + cx
//! y' = H / 2 - y * H / 1080 + cy
//! ```
//!
//! A joint the mapper cannot place comes back with an infinite coordinate.
//! The sentinel survives the rescale, and every consumer skips such joints
//! for the tick.

use std::collections::BTreeMap;

use kinetrack_core::{
    is_finite_point, Error, JointFrame, JointPositions, JointType, Result, TrackingState,
};
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Native color-frame width of the sensor, in pixels.
pub const REF_WIDTH: f64 = 1920.0;

/// Native color-frame height of the sensor, in pixels.
pub const REF_HEIGHT: f64 = 1080.0;

/// Camera-space to color-space mapping supplied by the sensor collaborator.
pub trait CameraToColorMapper {
    /// Map one camera-space point to color-frame pixels. Points without a
    /// valid mapping return `±inf` on at least one axis.
    fn map_camera_point(&self, point: &Vector3<f64>) -> Vector2<f64>;

    /// Batch variant, mirroring SDKs that map a whole skeleton per call.
    fn map_camera_points(&self, points: &[Vector3<f64>]) -> Vec<Vector2<f64>> {
        points.iter().map(|p| self.map_camera_point(p)).collect()
    }
}

impl<F> CameraToColorMapper for F
where
    F: Fn(&Vector3<f64>) -> Vector2<f64>,
{
    fn map_camera_point(&self, point: &Vector3<f64>) -> Vector2<f64> {
        self(point)
    }
}

/// Size and placement of the display surface receiving projected joints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceGeometry {
    pub width: f64,
    pub height: f64,
    pub center: Vector2<f64>,
}

impl SurfaceGeometry {
    pub fn new(width: f64, height: f64, center: Vector2<f64>) -> Result<Self> {
        let surface = Self {
            width,
            height,
            center,
        };
        surface.validate()?;
        Ok(surface)
    }

    /// Width and height must be finite and positive, otherwise the rescale
    /// would turn the infinite sentinel into NaN.
    pub fn validate(&self) -> Result<()> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(self.width) || !valid(self.height) {
            return Err(Error::InvalidSurface {
                width: self.width,
                height: self.height,
            });
        }
        if !is_finite_point(&self.center) {
            return Err(Error::InvalidInput(format!(
                "surface center must be finite, got ({}, {})",
                self.center.x, self.center.y
            )));
        }
        Ok(())
    }
}

impl Default for SurfaceGeometry {
    fn default() -> Self {
        Self {
            width: 16.0,
            height: 9.0,
            center: Vector2::zeros(),
        }
    }
}

/// Projects joint frames onto a display surface.
#[derive(Debug, Clone)]
pub struct CoordinateProjector {
    surface: SurfaceGeometry,
}

impl CoordinateProjector {
    pub fn new(surface: SurfaceGeometry) -> Self {
        Self { surface }
    }

    pub fn surface(&self) -> &SurfaceGeometry {
        &self.surface
    }

    /// Rescale a color-frame pixel onto the surface.
    pub fn rescale(&self, color: &Vector2<f64>) -> Vector2<f64> {
        let SurfaceGeometry {
            width,
            height,
            center,
        } = self.surface;
        Vector2::new(
            color.x * width / REF_WIDTH - width / 2.0 + center.x,
            height / 2.0 - color.y * height / REF_HEIGHT + center.y,
        )
    }

    /// Project every joint of `frame` through `mapper` onto the surface.
    pub fn project<M>(&self, frame: &JointFrame, mapper: &M) -> ScreenProjection
    where
        M: CameraToColorMapper + ?Sized,
    {
        let camera_points: Vec<Vector3<f64>> = JointType::ALL
            .iter()
            .map(|jt| frame.position(*jt).to_vector())
            .collect();
        let color_points = mapper.map_camera_points(&camera_points);

        let mut points = [Vector2::new(f64::INFINITY, f64::INFINITY); JointType::COUNT];
        let mut states = [TrackingState::NotTracked; JointType::COUNT];

        for joint in JointType::ALL {
            let idx = joint.index();
            states[idx] = frame.tracking_state(joint);
            // A short batch from the mapper leaves the sentinel in place.
            if let Some(color) = color_points.get(idx) {
                points[idx] = self.rescale(color);
            }
            if !is_finite_point(&points[idx]) {
                tracing::trace!(?joint, "joint not mappable to surface this tick");
            }
        }

        ScreenProjection {
            positions: JointPositions::new(points, states),
        }
    }
}

/// Surface-space joint positions for one body and one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenProjection {
    positions: JointPositions<2>,
}

impl ScreenProjection {
    /// Raw positions, sentinels included, for 2D analysis.
    pub fn positions(&self) -> &JointPositions<2> {
        &self.positions
    }

    /// Raw projected point, possibly carrying the infinite sentinel.
    pub fn raw(&self, joint: JointType) -> Vector2<f64> {
        *self.positions.point(joint)
    }

    pub fn is_mappable(&self, joint: JointType) -> bool {
        self.positions.is_usable(joint)
    }

    /// The projected point, or `None` when the joint is unmappable this tick.
    pub fn point(&self, joint: JointType) -> Option<Vector2<f64>> {
        self.is_mappable(joint).then(|| self.raw(joint))
    }

    /// Mappable joints only, keyed by joint.
    pub fn mappable(&self) -> impl Iterator<Item = (JointType, Vector2<f64>)> + '_ {
        self.positions
            .iter()
            .filter(|(_, p)| is_finite_point(*p))
            .map(|(jt, p)| (jt, *p))
    }
}

/// Camera-space joints multiplied by `scale`, for direct 3D skeleton
/// placement. Non-finite joints are left out.
pub fn scaled_positions(frame: &JointFrame, scale: f64) -> BTreeMap<JointType, Vector3<f64>> {
    frame
        .joints()
        .filter(|(_, joint)| joint.position.is_finite())
        .map(|(jt, joint)| (jt, joint.position.to_vector() * scale))
        .collect()
}
