//! Rendering layer for umbra.
//!
//! This crate provides:
//! - the [`GraphicsContext`] abstraction over mutable pipeline state, with a
//!   wgpu implementation and an in-memory one for tests and tooling
//! - [`ShadowPass`], the light-space depth pass used for shadow mapping
//! - [`SphereBuffers`] for uploading globe meshes
//! - plain-text PPM dumps of shadow map contents

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod context;
pub mod depth_dump;
pub mod error;
pub mod headless;
pub mod shadow_pass;
pub mod sphere_render;
pub mod wgpu_context;

pub use context::{
    report_gpu_errors, BorderColor, BufferId, BufferKind, ClearTargets, ClearValues,
    CompareFunction, CullFace, CullState, FramebufferDesc, FramebufferId, GpuErrorCode,
    GraphicsContext, PipelineState, PolygonOffset, TextureDesc, TextureFilter, TextureFormat,
    TextureId, TextureWrap, Viewport,
};
pub use depth_dump::{
    dump_bound_framebuffer, write_depth_ppm, write_rgb_ppm, DepthDumpError, DEPTH_DUMP_FILE,
    POSITION_DUMP_FILE,
};
pub use error::{ErrorKind, RenderError, RenderResult};
pub use headless::{Command, HeadlessContext};
pub use shadow_pass::{
    LightSpaceScope, PassState, ShadowMapData, ShadowPass, SHADOW_POLYGON_OFFSET_FACTOR,
    SHADOW_POLYGON_OFFSET_UNITS,
};
pub use sphere_render::{sphere_vertex_layout, SphereBuffers};
pub use wgpu_context::WgpuContext;
