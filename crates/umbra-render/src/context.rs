//! Graphics context abstraction.
//!
//! [`GraphicsContext`] models the mutable pipeline state of a graphics
//! backend (bound framebuffer, viewport, face culling, polygon offset, clear
//! values) together with resource allocation and readback. Passes receive the
//! context explicitly instead of touching ambient global state, and use
//! [`PipelineState`] to snapshot and restore it.

use std::fmt;

use crate::error::RenderResult;

/// Handle of a texture owned by a [`GraphicsContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Handle of a framebuffer owned by a [`GraphicsContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferId(pub u32);

impl FramebufferId {
    /// The window-system framebuffer.
    pub const DEFAULT: FramebufferId = FramebufferId(0);

    /// Whether this is the window-system framebuffer.
    #[must_use]
    pub fn is_default(self) -> bool {
        self == Self::DEFAULT
    }
}

/// Handle of a vertex or index buffer owned by a [`GraphicsContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// Viewport rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// A viewport anchored at the origin.
    #[must_use]
    pub fn from_size(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }
}

/// Which faces are culled when culling is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullFace {
    Front,
    #[default]
    Back,
}

/// Face culling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CullState {
    pub enabled: bool,
    pub face: CullFace,
}

/// Polygon offset applied to filled polygons.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PolygonOffset {
    pub enabled: bool,
    pub factor: f32,
    pub units: f32,
}

/// Values written by [`GraphicsContext::clear`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearValues {
    pub color: [f32; 4],
    pub depth: f32,
}

impl Default for ClearValues {
    fn default() -> Self {
        Self {
            color: [0.0; 4],
            depth: 1.0,
        }
    }
}

/// Attachments cleared by [`GraphicsContext::clear`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClearTargets {
    pub color: bool,
    pub depth: bool,
}

/// Storage format of a texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    /// Single channel 32-bit float depth.
    Depth32Float,
    /// Four channel 32-bit float color; the fourth channel is unused by
    /// position targets.
    Rgba32Float,
}

/// Texel filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFilter {
    Nearest,
    Linear,
}

/// Predefined border colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorderColor {
    TransparentBlack,
    OpaqueBlack,
    OpaqueWhite,
}

impl BorderColor {
    /// The color as RGBA.
    #[must_use]
    pub fn rgba(self) -> [f32; 4] {
        match self {
            BorderColor::TransparentBlack => [0.0, 0.0, 0.0, 0.0],
            BorderColor::OpaqueBlack => [0.0, 0.0, 0.0, 1.0],
            BorderColor::OpaqueWhite => [1.0, 1.0, 1.0, 1.0],
        }
    }
}

/// Addressing outside `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureWrap {
    ClampToEdge,
    ClampToBorder(BorderColor),
}

/// Depth comparison used by comparison samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunction {
    Less,
    LessEqual,
    Greater,
    Always,
}

/// Description of a 2D texture with its sampling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub filter: TextureFilter,
    pub wrap: TextureWrap,
    /// Enables depth comparison sampling.
    pub compare: Option<CompareFunction>,
}

/// Attachments of an off-screen framebuffer.
#[derive(Debug, Clone, PartialEq)]
pub struct FramebufferDesc {
    pub label: &'static str,
    pub depth: TextureId,
    pub color: Option<TextureId>,
}

/// Usage of a static GPU buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Vertex,
    Index,
}

/// Error codes reported by [`GraphicsContext::take_error`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GpuErrorCode {
    InvalidEnum,
    InvalidValue,
    InvalidOperation,
    InvalidFramebufferOperation,
    OutOfMemory,
    /// Backend validation message.
    Validation(String),
    Unknown(u32),
}

impl fmt::Display for GpuErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuErrorCode::InvalidEnum => f.write_str("INVALID_ENUM"),
            GpuErrorCode::InvalidValue => f.write_str("INVALID_VALUE"),
            GpuErrorCode::InvalidOperation => f.write_str("INVALID_OPERATION"),
            GpuErrorCode::InvalidFramebufferOperation => {
                f.write_str("INVALID_FRAMEBUFFER_OPERATION")
            }
            GpuErrorCode::OutOfMemory => f.write_str("OUT_OF_MEMORY"),
            GpuErrorCode::Validation(message) => write!(f, "validation error: {message}"),
            GpuErrorCode::Unknown(code) => write!(f, "unknown error code {code:#x}"),
        }
    }
}

/// A graphics backend with mutable pipeline state.
///
/// Readback methods read from the currently bound framebuffer and return
/// rows top to bottom. Failed allocations are returned as errors and are not
/// also queued for [`GraphicsContext::take_error`].
pub trait GraphicsContext {
    /// Currently bound framebuffer.
    fn bound_framebuffer(&self) -> FramebufferId;
    /// Binds a framebuffer for subsequent clears, draws and readback.
    fn bind_framebuffer(&mut self, framebuffer: FramebufferId);

    /// Current viewport.
    fn viewport(&self) -> Viewport;
    /// Sets the viewport.
    fn set_viewport(&mut self, viewport: Viewport);

    /// Current face culling state.
    fn cull_state(&self) -> CullState;
    /// Sets face culling.
    fn set_cull_state(&mut self, state: CullState);

    /// Current polygon offset.
    fn polygon_offset(&self) -> PolygonOffset;
    /// Sets polygon offset.
    fn set_polygon_offset(&mut self, offset: PolygonOffset);

    /// Current clear values.
    fn clear_values(&self) -> ClearValues;
    /// Sets clear values.
    fn set_clear_values(&mut self, values: ClearValues);

    /// Clears attachments of the bound framebuffer with the current clear values.
    fn clear(&mut self, targets: ClearTargets);

    /// Submits pending commands.
    fn flush(&mut self);

    /// Whether textures of `format` can be framebuffer attachments.
    fn supports_render_target(&self, format: TextureFormat) -> bool;

    /// Allocates a texture.
    fn create_texture(&mut self, desc: &TextureDesc) -> RenderResult<TextureId>;
    /// Frees a texture. Unknown handles are ignored.
    fn delete_texture(&mut self, texture: TextureId);

    /// Creates a framebuffer, failing if it is not complete.
    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> RenderResult<FramebufferId>;
    /// Frees a framebuffer. Unknown handles are ignored.
    fn delete_framebuffer(&mut self, framebuffer: FramebufferId);

    /// Allocates a static buffer initialized with `contents`.
    fn create_buffer(
        &mut self,
        kind: BufferKind,
        label: &str,
        contents: &[u8],
    ) -> RenderResult<BufferId>;
    /// Frees a buffer. Unknown handles are ignored.
    fn delete_buffer(&mut self, buffer: BufferId);

    /// Reads the depth attachment of the bound framebuffer.
    fn read_depth_pixels(&mut self, width: u32, height: u32) -> RenderResult<Vec<f32>>;
    /// Reads RGB of the color attachment of the bound framebuffer.
    fn read_color_pixels(&mut self, width: u32, height: u32) -> RenderResult<Vec<[f32; 3]>>;

    /// Pops the oldest recorded GPU error, if any.
    fn take_error(&mut self) -> Option<GpuErrorCode>;
}

/// Snapshot of the pipeline state touched by off-screen passes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineState {
    pub framebuffer: FramebufferId,
    pub viewport: Viewport,
    pub cull: CullState,
    pub polygon_offset: PolygonOffset,
    pub clear: ClearValues,
}

impl PipelineState {
    /// Reads the current state of `ctx`.
    pub fn capture<C: GraphicsContext + ?Sized>(ctx: &C) -> Self {
        Self {
            framebuffer: ctx.bound_framebuffer(),
            viewport: ctx.viewport(),
            cull: ctx.cull_state(),
            polygon_offset: ctx.polygon_offset(),
            clear: ctx.clear_values(),
        }
    }

    /// Writes this snapshot back to `ctx`.
    pub fn apply<C: GraphicsContext + ?Sized>(&self, ctx: &mut C) {
        ctx.bind_framebuffer(self.framebuffer);
        ctx.set_viewport(self.viewport);
        ctx.set_cull_state(self.cull);
        ctx.set_polygon_offset(self.polygon_offset);
        ctx.set_clear_values(self.clear);
    }
}

/// Drains pending GPU errors, logging each with the step that preceded it.
///
/// Returns the first error found. Errors never abort the caller.
pub fn report_gpu_errors<C: GraphicsContext + ?Sized>(
    ctx: &mut C,
    step: &str,
) -> Option<GpuErrorCode> {
    let mut first = None;
    while let Some(code) = ctx.take_error() {
        log::error!(target: "umbra::gpu", "{step}: {code}");
        first.get_or_insert(code);
    }
    first
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framebuffer_default() {
        assert!(FramebufferId::DEFAULT.is_default());
        assert!(!FramebufferId(3).is_default());
    }

    #[test]
    fn test_border_color_white_reads_lit() {
        assert_eq!(BorderColor::OpaqueWhite.rgba()[0], 1.0);
    }

    #[test]
    fn test_gpu_error_display() {
        assert_eq!(GpuErrorCode::OutOfMemory.to_string(), "OUT_OF_MEMORY");
        assert_eq!(GpuErrorCode::Unknown(0x0507).to_string(), "unknown error code 0x507");
    }

    #[test]
    fn test_clear_values_default() {
        let values = ClearValues::default();
        assert_eq!(values.depth, 1.0);
        assert_eq!(values.color, [0.0; 4]);
    }
}
