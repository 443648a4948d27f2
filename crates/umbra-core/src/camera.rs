//! Shared scene camera.

use glam::{DMat4, DQuat, DVec3};

/// The camera capability consumed by the shadow pass.
///
/// Rotation is the camera-to-world orientation; the combined view matrix is
/// `rotation⁻¹ · translate(-position)`.
pub trait SceneCamera {
    /// Camera position in world space.
    fn position(&self) -> DVec3;
    /// Moves the camera.
    fn set_position(&mut self, position: DVec3);
    /// Point of interest the camera orbits.
    fn focus(&self) -> DVec3;
    /// Sets the point of interest.
    fn set_focus(&mut self, focus: DVec3);
    /// Camera-to-world orientation.
    fn rotation(&self) -> DQuat;
    /// Sets the camera-to-world orientation.
    fn set_rotation(&mut self, rotation: DQuat);
    /// Projection matrix, OpenGL clip conventions (depth in `[-1, 1]`).
    fn projection_matrix(&self) -> DMat4;
    /// World-to-camera matrix.
    fn combined_view_matrix(&self) -> DMat4;
}

/// Saved position, focus and rotation of a [`SceneCamera`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: DVec3,
    pub focus: DVec3,
    pub rotation: DQuat,
}

impl CameraPose {
    /// Reads the pose of `camera`.
    pub fn capture(camera: &(impl SceneCamera + ?Sized)) -> Self {
        Self {
            position: camera.position(),
            focus: camera.focus(),
            rotation: camera.rotation(),
        }
    }

    /// Writes this pose back verbatim.
    pub fn apply(&self, camera: &mut (impl SceneCamera + ?Sized)) {
        camera.set_position(self.position);
        camera.set_focus(self.focus);
        camera.set_rotation(self.rotation);
    }
}

/// A perspective camera with double precision pose.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Camera position in world space.
    pub position: DVec3,
    /// Point the camera is looking at.
    pub focus: DVec3,
    /// Camera-to-world orientation.
    pub rotation: DQuat,
    /// Vertical field of view in radians.
    pub fov_y: f64,
    /// Aspect ratio (width / height).
    pub aspect_ratio: f64,
    /// Near clipping plane.
    pub near: f64,
    /// Far clipping plane.
    pub far: f64,
}

impl Camera {
    /// Creates a camera at `(0, 0, 3)` looking at the origin.
    #[must_use]
    pub fn new(aspect_ratio: f64) -> Self {
        let mut camera = Self {
            position: DVec3::new(0.0, 0.0, 3.0),
            focus: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
            fov_y: std::f64::consts::FRAC_PI_4,
            aspect_ratio,
            near: 0.01,
            far: 1.0e4,
        };
        camera.look_at(DVec3::ZERO, DVec3::Y);
        camera
    }

    /// Points the camera at `focus`, keeping its position.
    pub fn look_at(&mut self, focus: DVec3, up: DVec3) {
        self.focus = focus;
        self.rotation = rotation_from_view(&DMat4::look_at_rh(self.position, focus, up));
    }

    /// Sets the aspect ratio.
    pub fn set_aspect_ratio(&mut self, aspect_ratio: f64) {
        self.aspect_ratio = aspect_ratio;
    }

    /// Sets the near and far clipping planes, keeping `far > near > 0`.
    pub fn set_clip_planes(&mut self, near: f64, far: f64) {
        self.near = near.max(1.0e-6);
        self.far = far.max(self.near * 2.0);
    }

    /// Returns the camera's forward direction.
    #[must_use]
    pub fn forward(&self) -> DVec3 {
        self.rotation * DVec3::NEG_Z
    }

    /// Returns the camera's up direction.
    #[must_use]
    pub fn up(&self) -> DVec3 {
        self.rotation * DVec3::Y
    }

    /// Returns the combined view-projection matrix.
    #[must_use]
    pub fn view_projection_matrix(&self) -> DMat4 {
        self.projection_matrix() * self.combined_view_matrix()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(16.0 / 9.0)
    }
}

impl SceneCamera for Camera {
    fn position(&self) -> DVec3 {
        self.position
    }

    fn set_position(&mut self, position: DVec3) {
        self.position = position;
    }

    fn focus(&self) -> DVec3 {
        self.focus
    }

    fn set_focus(&mut self, focus: DVec3) {
        self.focus = focus;
    }

    fn rotation(&self) -> DQuat {
        self.rotation
    }

    fn set_rotation(&mut self, rotation: DQuat) {
        self.rotation = rotation;
    }

    fn projection_matrix(&self) -> DMat4 {
        DMat4::perspective_rh_gl(self.fov_y, self.aspect_ratio, self.near, self.far)
    }

    fn combined_view_matrix(&self) -> DMat4 {
        DMat4::from_quat(self.rotation.inverse()) * DMat4::from_translation(-self.position)
    }
}

/// Camera-to-world rotation of a rigid world-to-camera `view` matrix.
#[must_use]
pub fn rotation_from_view(view: &DMat4) -> DQuat {
    DQuat::from_mat4(view).inverse().normalize()
}
