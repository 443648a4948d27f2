//! Core abstractions for umbra.
//!
//! This crate provides the backend-independent pieces of the shadow subsystem:
//! - [`ShadowConfig`] and its field documentation
//! - the [`SceneCamera`] and [`SceneGraph`] capabilities consumed by the shadow pass
//! - light camera placement and light-space matrix composition
//! - [`SphereMeshBuilder`] for UV-sphere and ellipsoid meshes

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod camera;
pub mod error;
pub mod geometry;
pub mod light;
pub mod scene;
pub mod shadow_config;

pub use camera::{rotation_from_view, Camera, CameraPose, SceneCamera};
pub use error::{CoreError, CoreResult};
pub use geometry::{SphereMesh, SphereMeshBuilder, SphereRadii, SphereVertex};
pub use light::{
    light_space_matrix, scaled_light_distance, LightCamera, LIGHT_UP, TEXTURE_BIAS_MATRIX,
};
pub use scene::{ModelTransform, SceneGraph, SceneNodes};
pub use shadow_config::{
    validate_light_distance_fraction, FieldDoc, ShadowConfig, DEFAULT_DEPTH_TEXTURE_SIZE,
    DEFAULT_LIGHT_DISTANCE_FRACTION, DEFAULT_LIGHT_SOURCE, LIGHT_DISTANCE_FRACTION_DENOMINATOR,
};

// Re-export glam types for convenience
pub use glam::{DMat4, DQuat, DVec2, DVec3, Vec3};
