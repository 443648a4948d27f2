//! In-memory graphics context.
//!
//! [`HeadlessContext`] implements [`GraphicsContext`] without a GPU. It
//! tracks pipeline state, keeps texel storage for every texture so clears,
//! depth writes and readback behave like a real backend, records the state
//! commands it receives, and can inject allocation failures and GPU errors.

use std::collections::{HashMap, VecDeque};

use crate::context::{
    BufferId, BufferKind, ClearTargets, ClearValues, CullState, FramebufferDesc, FramebufferId,
    GpuErrorCode, GraphicsContext, PolygonOffset, TextureDesc, TextureFormat, TextureId, Viewport,
};
use crate::error::{RenderError, RenderResult};

/// A state-changing call received by a [`HeadlessContext`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    BindFramebuffer(FramebufferId),
    SetViewport(Viewport),
    SetCullState(CullState),
    SetPolygonOffset(PolygonOffset),
    SetClearValues(ClearValues),
    Clear(ClearTargets),
    Flush,
}

#[derive(Debug)]
struct HeadlessTexture {
    desc: TextureDesc,
    texels: Vec<[f32; 4]>,
}

#[derive(Debug)]
struct HeadlessBuffer {
    kind: BufferKind,
    contents: Vec<u8>,
}

/// A CPU-only [`GraphicsContext`].
#[derive(Debug)]
pub struct HeadlessContext {
    framebuffer: FramebufferId,
    viewport: Viewport,
    cull: CullState,
    polygon_offset: PolygonOffset,
    clear: ClearValues,
    textures: HashMap<TextureId, HeadlessTexture>,
    framebuffers: HashMap<FramebufferId, FramebufferDesc>,
    buffers: HashMap<BufferId, HeadlessBuffer>,
    next_id: u32,
    commands: Vec<Command>,
    pending_errors: VecDeque<GpuErrorCode>,
    allocations_left: Option<usize>,
    incomplete_framebuffers: bool,
    color_targets: bool,
}

impl HeadlessContext {
    /// Creates a context whose default framebuffer has the given size.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            framebuffer: FramebufferId::DEFAULT,
            viewport: Viewport::from_size(width, height),
            cull: CullState::default(),
            polygon_offset: PolygonOffset::default(),
            clear: ClearValues::default(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            buffers: HashMap::new(),
            next_id: 1,
            commands: Vec::new(),
            pending_errors: VecDeque::new(),
            allocations_left: None,
            incomplete_framebuffers: false,
            color_targets: true,
        }
    }

    /// State commands received so far, oldest first.
    #[must_use]
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Forgets recorded commands.
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Lets `count` more allocations succeed, then fails with out-of-memory.
    /// `None` removes the limit.
    pub fn limit_allocations(&mut self, count: Option<usize>) {
        self.allocations_left = count;
    }

    /// Makes every subsequent framebuffer creation report incompleteness.
    pub fn set_framebuffers_incomplete(&mut self, incomplete: bool) {
        self.incomplete_framebuffers = incomplete;
    }

    /// Emulates a device that cannot render to float color textures.
    pub fn set_color_targets_supported(&mut self, supported: bool) {
        self.color_targets = supported;
    }

    /// Queues an error to be returned by [`GraphicsContext::take_error`].
    pub fn push_error(&mut self, code: GpuErrorCode) {
        self.pending_errors.push_back(code);
    }

    /// Number of live textures.
    #[must_use]
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Number of live framebuffers.
    #[must_use]
    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    /// Number of live buffers.
    #[must_use]
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    /// Description of a live texture.
    #[must_use]
    pub fn texture_desc(&self, texture: TextureId) -> Option<&TextureDesc> {
        self.textures.get(&texture).map(|t| &t.desc)
    }

    /// Contents of a live buffer.
    #[must_use]
    pub fn buffer_contents(&self, buffer: BufferId) -> Option<(BufferKind, &[u8])> {
        self.buffers
            .get(&buffer)
            .map(|b| (b.kind, b.contents.as_slice()))
    }

    /// Writes fragments into the bound framebuffer with a `Less` depth test,
    /// standing in for rasterization. `fragment(x, y)` returns the depth and
    /// light-space position of the fragment covering that texel, if any.
    pub fn draw_fragments(
        &mut self,
        mut fragment: impl FnMut(u32, u32) -> Option<(f32, [f32; 3])>,
    ) {
        let Some(desc) = self.framebuffers.get(&self.framebuffer).cloned() else {
            return;
        };
        let Some(depth) = self.textures.get(&desc.depth) else {
            return;
        };
        let (width, height) = (depth.desc.width, depth.desc.height);
        let viewport = self.viewport;

        for y in 0..height {
            for x in 0..width {
                if !viewport_contains(viewport, x, y) {
                    continue;
                }
                let Some((z, position)) = fragment(x, y) else {
                    continue;
                };
                let index = (y * width + x) as usize;
                let Some(depth) = self.textures.get_mut(&desc.depth) else {
                    return;
                };
                if z >= depth.texels[index][0] {
                    continue;
                }
                depth.texels[index][0] = z;
                if let Some(color) = desc.color.and_then(|id| self.textures.get_mut(&id)) {
                    color.texels[index] = [position[0], position[1], position[2], 1.0];
                }
            }
        }
    }

    fn allocate(&mut self, what: &str) -> RenderResult<u32> {
        if let Some(left) = self.allocations_left.as_mut() {
            if *left == 0 {
                return Err(RenderError::OutOfMemory(what.to_owned()));
            }
            *left -= 1;
        }
        let id = self.next_id;
        self.next_id += 1;
        Ok(id)
    }

    fn bound_attachment(&self, color: bool) -> RenderResult<&HeadlessTexture> {
        let desc = self.framebuffers.get(&self.framebuffer).ok_or_else(|| {
            RenderError::ReadbackFailed("no off-screen framebuffer bound".to_owned())
        })?;
        let id = if color {
            desc.color.ok_or_else(|| {
                RenderError::ReadbackFailed(format!(
                    "framebuffer '{}' has no color attachment",
                    desc.label
                ))
            })?
        } else {
            desc.depth
        };
        self.textures
            .get(&id)
            .ok_or_else(|| RenderError::ReadbackFailed(format!("attachment {id:?} was deleted")))
    }
}

impl Default for HeadlessContext {
    fn default() -> Self {
        Self::new(1280, 720)
    }
}

fn viewport_contains(viewport: Viewport, x: u32, y: u32) -> bool {
    let (x, y) = (i64::from(x), i64::from(y));
    x >= i64::from(viewport.x)
        && y >= i64::from(viewport.y)
        && x < i64::from(viewport.x) + i64::from(viewport.width)
        && y < i64::from(viewport.y) + i64::from(viewport.height)
}

fn read_region(
    texture: &HeadlessTexture,
    width: u32,
    height: u32,
) -> RenderResult<Vec<[f32; 4]>> {
    if width > texture.desc.width || height > texture.desc.height {
        return Err(RenderError::ReadbackFailed(format!(
            "requested {width}x{height} from a {}x{} attachment",
            texture.desc.width, texture.desc.height
        )));
    }
    let stride = texture.desc.width as usize;
    Ok((0..height as usize)
        .flat_map(|y| {
            texture.texels[y * stride..y * stride + width as usize]
                .iter()
                .copied()
        })
        .collect())
}

impl GraphicsContext for HeadlessContext {
    fn bound_framebuffer(&self) -> FramebufferId {
        self.framebuffer
    }

    fn bind_framebuffer(&mut self, framebuffer: FramebufferId) {
        if !framebuffer.is_default() && !self.framebuffers.contains_key(&framebuffer) {
            self.pending_errors.push_back(GpuErrorCode::InvalidOperation);
            return;
        }
        self.commands.push(Command::BindFramebuffer(framebuffer));
        self.framebuffer = framebuffer;
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.commands.push(Command::SetViewport(viewport));
        self.viewport = viewport;
    }

    fn cull_state(&self) -> CullState {
        self.cull
    }

    fn set_cull_state(&mut self, state: CullState) {
        self.commands.push(Command::SetCullState(state));
        self.cull = state;
    }

    fn polygon_offset(&self) -> PolygonOffset {
        self.polygon_offset
    }

    fn set_polygon_offset(&mut self, offset: PolygonOffset) {
        self.commands.push(Command::SetPolygonOffset(offset));
        self.polygon_offset = offset;
    }

    fn clear_values(&self) -> ClearValues {
        self.clear
    }

    fn set_clear_values(&mut self, values: ClearValues) {
        self.commands.push(Command::SetClearValues(values));
        self.clear = values;
    }

    fn clear(&mut self, targets: ClearTargets) {
        self.commands.push(Command::Clear(targets));
        let Some(desc) = self.framebuffers.get(&self.framebuffer).cloned() else {
            return;
        };
        let values = self.clear;
        if targets.depth {
            if let Some(depth) = self.textures.get_mut(&desc.depth) {
                depth.texels.fill([values.depth, 0.0, 0.0, 0.0]);
            }
        }
        if targets.color {
            if let Some(color) = desc.color.and_then(|id| self.textures.get_mut(&id)) {
                color.texels.fill(values.color);
            }
        }
    }

    fn flush(&mut self) {
        self.commands.push(Command::Flush);
    }

    fn supports_render_target(&self, format: TextureFormat) -> bool {
        match format {
            TextureFormat::Depth32Float => true,
            TextureFormat::Rgba32Float => self.color_targets,
        }
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> RenderResult<TextureId> {
        if desc.width == 0 || desc.height == 0 {
            return Err(RenderError::TextureCreationFailed(format!(
                "'{}' has zero size",
                desc.label
            )));
        }
        if !self.supports_render_target(desc.format) {
            return Err(RenderError::TextureCreationFailed(format!(
                "'{}': {:?} is not renderable",
                desc.label, desc.format
            )));
        }
        let id = TextureId(self.allocate(desc.label)?);
        let fill = match desc.format {
            TextureFormat::Depth32Float => [1.0, 0.0, 0.0, 0.0],
            TextureFormat::Rgba32Float => [0.0; 4],
        };
        self.textures.insert(
            id,
            HeadlessTexture {
                desc: desc.clone(),
                texels: vec![fill; (desc.width * desc.height) as usize],
            },
        );
        log::debug!("headless: created texture '{}' {id:?}", desc.label);
        Ok(id)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        self.textures.remove(&texture);
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> RenderResult<FramebufferId> {
        let depth_ok = self
            .textures
            .get(&desc.depth)
            .is_some_and(|t| t.desc.format == TextureFormat::Depth32Float);
        let color_ok = desc.color.map_or(true, |id| {
            self.textures
                .get(&id)
                .is_some_and(|t| t.desc.format == TextureFormat::Rgba32Float)
        });
        if self.incomplete_framebuffers || !depth_ok || !color_ok {
            return Err(RenderError::FramebufferIncomplete(desc.label.to_owned()));
        }
        let id = FramebufferId(self.allocate(desc.label)?);
        self.framebuffers.insert(id, desc.clone());
        Ok(id)
    }

    fn delete_framebuffer(&mut self, framebuffer: FramebufferId) {
        if self.framebuffers.remove(&framebuffer).is_some() && self.framebuffer == framebuffer {
            self.framebuffer = FramebufferId::DEFAULT;
        }
    }

    fn create_buffer(
        &mut self,
        kind: BufferKind,
        label: &str,
        contents: &[u8],
    ) -> RenderResult<BufferId> {
        let id = BufferId(self.allocate(label)?);
        self.buffers.insert(
            id,
            HeadlessBuffer {
                kind,
                contents: contents.to_vec(),
            },
        );
        Ok(id)
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
    }

    fn read_depth_pixels(&mut self, width: u32, height: u32) -> RenderResult<Vec<f32>> {
        let texture = self.bound_attachment(false)?;
        Ok(read_region(texture, width, height)?
            .into_iter()
            .map(|texel| texel[0])
            .collect())
    }

    fn read_color_pixels(&mut self, width: u32, height: u32) -> RenderResult<Vec<[f32; 3]>> {
        let texture = self.bound_attachment(true)?;
        Ok(read_region(texture, width, height)?
            .into_iter()
            .map(|texel| [texel[0], texel[1], texel[2]])
            .collect())
    }

    fn take_error(&mut self) -> Option<GpuErrorCode> {
        self.pending_errors.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{PipelineState, TextureFilter, TextureWrap};

    fn depth_desc(size: u32) -> TextureDesc {
        TextureDesc {
            label: "depth",
            width: size,
            height: size,
            format: TextureFormat::Depth32Float,
            filter: TextureFilter::Nearest,
            wrap: TextureWrap::ClampToEdge,
            compare: None,
        }
    }

    #[test]
    fn test_state_round_trip() {
        let mut ctx = HeadlessContext::new(640, 480);
        let before = PipelineState::capture(&ctx);

        ctx.set_viewport(Viewport::from_size(16, 16));
        ctx.set_cull_state(CullState {
            enabled: true,
            face: crate::context::CullFace::Front,
        });
        assert_ne!(PipelineState::capture(&ctx), before);

        before.apply(&mut ctx);
        assert_eq!(PipelineState::capture(&ctx), before);
    }

    #[test]
    fn test_clear_and_draw_depth() {
        let mut ctx = HeadlessContext::new(64, 64);
        let depth = ctx.create_texture(&depth_desc(4)).unwrap();
        let fb = ctx
            .create_framebuffer(&FramebufferDesc {
                label: "fb",
                depth,
                color: None,
            })
            .unwrap();
        ctx.bind_framebuffer(fb);
        ctx.set_viewport(Viewport::from_size(4, 4));
        ctx.set_clear_values(ClearValues {
            color: [0.0; 4],
            depth: 1.0,
        });
        ctx.clear(ClearTargets {
            color: false,
            depth: true,
        });
        ctx.draw_fragments(|x, _| (x < 2).then_some((0.25, [0.0; 3])));

        let pixels = ctx.read_depth_pixels(4, 4).unwrap();
        assert_eq!(pixels.len(), 16);
        assert_eq!(&pixels[..4], &[0.25, 0.25, 1.0, 1.0]);
    }

    #[test]
    fn test_allocation_limit() {
        let mut ctx = HeadlessContext::new(8, 8);
        ctx.limit_allocations(Some(1));
        assert!(ctx.create_texture(&depth_desc(2)).is_ok());
        assert!(matches!(
            ctx.create_texture(&depth_desc(2)),
            Err(RenderError::OutOfMemory(_))
        ));
        // Returned, not queued a second time.
        assert_eq!(ctx.take_error(), None);
    }

    #[test]
    fn test_incomplete_framebuffer() {
        let mut ctx = HeadlessContext::new(8, 8);
        let depth = ctx.create_texture(&depth_desc(2)).unwrap();
        ctx.set_framebuffers_incomplete(true);
        let result = ctx.create_framebuffer(&FramebufferDesc {
            label: "fb",
            depth,
            color: None,
        });
        assert!(matches!(result, Err(RenderError::FramebufferIncomplete(_))));
        assert_eq!(ctx.take_error(), None);
    }

    #[test]
    fn test_unsupported_color_target() {
        let mut ctx = HeadlessContext::new(8, 8);
        ctx.set_color_targets_supported(false);
        assert!(ctx.supports_render_target(TextureFormat::Depth32Float));
        assert!(!ctx.supports_render_target(TextureFormat::Rgba32Float));
        let result = ctx.create_texture(&TextureDesc {
            format: TextureFormat::Rgba32Float,
            ..depth_desc(2)
        });
        assert!(matches!(result, Err(RenderError::TextureCreationFailed(_))));
        assert_eq!(ctx.live_textures(), 0);
    }

    #[test]
    fn test_readback_requires_offscreen_target() {
        let mut ctx = HeadlessContext::new(8, 8);
        assert!(ctx.read_depth_pixels(8, 8).is_err());
    }

    #[test]
    fn test_binding_unknown_framebuffer_records_error() {
        let mut ctx = HeadlessContext::new(8, 8);
        ctx.bind_framebuffer(FramebufferId(42));
        assert_eq!(ctx.bound_framebuffer(), FramebufferId::DEFAULT);
        assert_eq!(ctx.take_error(), Some(GpuErrorCode::InvalidOperation));
    }
}
