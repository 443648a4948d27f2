//! umbra: light-space shadow mapping and sphere geometry for globe rendering.
//!
//! A [`ShadowPass`] renders scene depth from a light source (by default the
//! scene node named `"Sun"`) into a shadow map, so that a planet's rings or
//! moons can cast shadows onto a rendered globe. [`SphereMeshBuilder`]
//! generates the UV-sphere or ellipsoid the globe is drawn with, and
//! [`ShadowedGlobe`] ties both together.
//!
//! # Quick Start
//!
//! ```no_run
//! use umbra::*;
//!
//! fn main() -> Result<()> {
//!     init_logging();
//!
//!     let mut ctx = create_headless_context(800, 600)?;
//!     let mut camera = Camera::new(800.0 / 600.0);
//!     let mut scene = SceneNodes::new();
//!     scene.insert("Sun", DVec3::new(1.5e11, 0.0, 0.0));
//!
//!     let mut globe = ShadowedGlobe::new(6.0e6_f32, 64, ShadowConfig::default())?;
//!     globe.initialize_gl(&mut ctx)?;
//!     globe.update(&scene, 0.0);
//!     globe.render_shadow_depth(&mut ctx, &mut camera, |_ctx, _camera, _sphere| {
//!         // draw shadow casters here
//!         Ok(())
//!     })?;
//!     let shadow = globe.shadow_data();
//!     println!("light space: {:?}", shadow.light_space_matrix);
//!
//!     globe.deinitialize_gl(&mut ctx)?;
//!     Ok(())
//! }
//! ```
//!
//! # Graphics state
//!
//! Passes never touch ambient state: they receive a [`GraphicsContext`] and
//! snapshot/restore it with [`PipelineState`]. [`WgpuContext`] drives a wgpu
//! device; [`HeadlessContext`] runs entirely on the CPU.

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

mod error;
mod globe;
mod headless;

pub use error::{Result, UmbraError};
pub use globe::ShadowedGlobe;
pub use headless::create_headless_context;

// Re-export core types
pub use umbra_core::{
    light_space_matrix, Camera, CameraPose, CoreError, DMat4, DQuat, DVec2, DVec3, FieldDoc,
    LightCamera, ModelTransform, SceneCamera, SceneGraph, SceneNodes, ShadowConfig, SphereMesh,
    SphereMeshBuilder, SphereRadii, SphereVertex, Vec3,
};

// Re-export render types
pub use umbra_render::{
    ErrorKind, GraphicsContext, HeadlessContext, LightSpaceScope, PassState, PipelineState,
    RenderError, ShadowMapData, ShadowPass, SphereBuffers, WgpuContext,
};

/// Initializes logging from `RUST_LOG`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    if env_logger::try_init().is_ok() {
        log::debug!("umbra logging initialized");
    }
}
