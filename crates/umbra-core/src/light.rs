//! Light camera placement and light-space matrix composition.
//!
//! The light camera does not sit at the real light position. It is placed on
//! the segment from the target to the light at
//! `fraction / LIGHT_DISTANCE_FRACTION_DENOMINATOR` of the true distance so
//! that near and far planes stay numerically tractable at planetary scales.

use glam::{DMat4, DVec3, DVec4};

use crate::shadow_config::LIGHT_DISTANCE_FRACTION_DENOMINATOR;

/// Up vector used for the light view.
///
/// The light view degenerates when the light direction is (anti)parallel to
/// this vector; see [`LightCamera::is_up_degenerate`].
pub const LIGHT_UP: DVec3 = DVec3::Y;

/// Maps clip space `[-1, 1]` to texture space `[0, 1]` on all three axes.
pub const TEXTURE_BIAS_MATRIX: DMat4 = DMat4::from_cols(
    DVec4::new(0.5, 0.0, 0.0, 0.0),
    DVec4::new(0.0, 0.5, 0.0, 0.0),
    DVec4::new(0.0, 0.0, 0.5, 0.0),
    DVec4::new(0.5, 0.5, 0.5, 1.0),
);

/// Threshold on `|dot(direction, LIGHT_UP)|` above which the light view is
/// considered degenerate.
const UP_DEGENERACY_THRESHOLD: f64 = 1.0 - 1.0e-9;

/// Scales the true light distance by `fraction / 100000`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn scaled_light_distance(true_distance: f64, fraction: i64) -> f64 {
    true_distance * (fraction as f64 / LIGHT_DISTANCE_FRACTION_DENOMINATOR as f64)
}

/// Composes `TEXTURE_BIAS_MATRIX · projection · view`.
#[must_use]
pub fn light_space_matrix(projection: &DMat4, view: &DMat4) -> DMat4 {
    TEXTURE_BIAS_MATRIX * *projection * *view
}

/// Pose of the virtual camera used to render the shadow map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightCamera {
    /// Unit vector from the target toward the light.
    pub direction: DVec3,
    /// Distance between target and light.
    pub true_distance: f64,
    /// Distance between target and light camera.
    pub scaled_distance: f64,
    /// Light camera position.
    pub position: DVec3,
    /// Point the light camera looks at.
    pub focus: DVec3,
    /// World-to-light view matrix.
    pub view: DMat4,
}

impl LightCamera {
    /// Places the light camera between `target` and `light`.
    #[must_use]
    pub fn compute(light: DVec3, target: DVec3, fraction: i64) -> Self {
        let diff = light - target;
        let true_distance = diff.length();
        let direction = diff.normalize_or_zero();
        let scaled_distance = scaled_light_distance(true_distance, fraction);
        let position = target + direction * scaled_distance;
        Self {
            direction,
            true_distance,
            scaled_distance,
            position,
            focus: target,
            view: DMat4::look_at_rh(position, target, LIGHT_UP),
        }
    }

    /// Whether the direction is parallel to [`LIGHT_UP`] (or zero), in which
    /// case `view` is not a valid rigid transform.
    #[must_use]
    pub fn is_up_degenerate(&self) -> bool {
        self.direction == DVec3::ZERO
            || self.direction.dot(LIGHT_UP).abs() > UP_DEGENERACY_THRESHOLD
    }
}
