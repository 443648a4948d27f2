//! [`GraphicsContext`] backed by a wgpu device.
//!
//! wgpu has no global pipeline state, so the state tracked here is consumed
//! by draw code: [`WgpuContext::framebuffer_pass`] opens a render pass on the
//! bound framebuffer with the current viewport, and
//! [`WgpuContext::primitive_state`] / [`WgpuContext::depth_bias`] translate
//! culling and polygon offset into pipeline descriptors.
//!
//! Commands are recorded into a lazily created encoder and submitted by
//! [`GraphicsContext::flush`]. Device errors are captured with error scopes;
//! failed allocations and readbacks return them, errors from submission are
//! surfaced through [`GraphicsContext::take_error`].
//!
//! Downlevel adapters (GL, WebGL) may not render to `Rgba32Float` or copy
//! depth textures. Color targets then fall back to `Rgba16Float`, or are
//! reported unsupported, and depth readback fails up front.

use std::collections::{HashMap, VecDeque};

use wgpu::util::DeviceExt;

use crate::context::{
    BorderColor, BufferId, BufferKind, ClearTargets, ClearValues, CompareFunction, CullFace,
    CullState, FramebufferDesc, FramebufferId, GpuErrorCode, GraphicsContext, PolygonOffset,
    TextureDesc, TextureFilter, TextureFormat, TextureId, TextureWrap, Viewport,
};
use crate::error::{RenderError, RenderResult};

/// Usages every float color target needs.
const COLOR_TARGET_USAGES: wgpu::TextureUsages = wgpu::TextureUsages::RENDER_ATTACHMENT
    .union(wgpu::TextureUsages::TEXTURE_BINDING)
    .union(wgpu::TextureUsages::COPY_SRC);

struct GpuTexture {
    desc: TextureDesc,
    format: wgpu::TextureFormat,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

/// A wgpu device with GL-style pipeline state.
pub struct WgpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    downlevel: wgpu::DownlevelCapabilities,
    color_target: Option<wgpu::TextureFormat>,
    framebuffer: FramebufferId,
    viewport: Viewport,
    cull: CullState,
    polygon_offset: PolygonOffset,
    clear: ClearValues,
    textures: HashMap<TextureId, GpuTexture>,
    framebuffers: HashMap<FramebufferId, FramebufferDesc>,
    buffers: HashMap<BufferId, wgpu::Buffer>,
    next_id: u32,
    encoder: Option<wgpu::CommandEncoder>,
    errors: VecDeque<GpuErrorCode>,
}

impl WgpuContext {
    /// Wraps an existing device. `width`/`height` size the default framebuffer viewport.
    ///
    /// The device is assumed fully capable; use
    /// [`WgpuContext::with_adapter_capabilities`] for downlevel adapters.
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, width: u32, height: u32) -> Self {
        Self {
            device,
            queue,
            downlevel: wgpu::DownlevelCapabilities::default(),
            color_target: Some(wgpu::TextureFormat::Rgba32Float),
            framebuffer: FramebufferId::DEFAULT,
            viewport: Viewport::from_size(width, height),
            cull: CullState::default(),
            polygon_offset: PolygonOffset::default(),
            clear: ClearValues::default(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            buffers: HashMap::new(),
            next_id: 1,
            encoder: None,
            errors: VecDeque::new(),
        }
    }

    /// Creates a context on a new device without a surface.
    pub async fn new_headless(width: u32, height: u32) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;

        // White-bordered shadow samplers need this; without it they clamp to edge.
        let required_features =
            adapter.features() & wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("umbra device (headless)"),
                required_features,
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
            })
            .await?;

        log::info!("headless device created on {:?}", adapter.get_info().backend);
        Ok(Self::new(device, queue, width, height).with_adapter_capabilities(&adapter))
    }

    /// Limits render targets and readback to what `adapter` supports.
    #[must_use]
    pub fn with_adapter_capabilities(mut self, adapter: &wgpu::Adapter) -> Self {
        self.downlevel = adapter.get_downlevel_capabilities();
        self.color_target = resolve_color_target(|format| {
            adapter.get_texture_format_features(format).allowed_usages
        });
        match self.color_target {
            Some(wgpu::TextureFormat::Rgba32Float) => {}
            Some(format) => log::warn!(
                "Rgba32Float is not renderable on this adapter, color targets use {format:?}"
            ),
            None => log::warn!("adapter has no renderable float color format"),
        }
        if !self.supports_depth_readback() {
            log::warn!("adapter cannot copy depth textures, depth readback is unavailable");
        }
        self
    }

    /// Downlevel capabilities of the adapter this context was created on.
    #[must_use]
    pub fn downlevel_capabilities(&self) -> &wgpu::DownlevelCapabilities {
        &self.downlevel
    }

    /// Whether depth attachments can be read back.
    #[must_use]
    pub fn supports_depth_readback(&self) -> bool {
        self.downlevel
            .flags
            .contains(wgpu::DownlevelFlags::DEPTH_TEXTURE_AND_BUFFER_COPIES)
    }

    /// Format backing `Rgba32Float` color targets, if any is renderable.
    #[must_use]
    pub fn color_target_format(&self) -> Option<wgpu::TextureFormat> {
        self.color_target
    }

    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// View of a live texture.
    #[must_use]
    pub fn texture_view(&self, texture: TextureId) -> Option<&wgpu::TextureView> {
        self.textures.get(&texture).map(|t| &t.view)
    }

    /// Sampler configured from the texture's description.
    #[must_use]
    pub fn sampler(&self, texture: TextureId) -> Option<&wgpu::Sampler> {
        self.textures.get(&texture).map(|t| &t.sampler)
    }

    /// A live vertex or index buffer.
    #[must_use]
    pub fn buffer(&self, buffer: BufferId) -> Option<&wgpu::Buffer> {
        self.buffers.get(&buffer)
    }

    /// Primitive state reflecting the current culling.
    #[must_use]
    pub fn primitive_state(&self) -> wgpu::PrimitiveState {
        let cull_mode = self.cull.enabled.then_some(match self.cull.face {
            CullFace::Front => wgpu::Face::Front,
            CullFace::Back => wgpu::Face::Back,
        });
        wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode,
            ..Default::default()
        }
    }

    /// Depth bias reflecting the current polygon offset.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn depth_bias(&self) -> wgpu::DepthBiasState {
        if !self.polygon_offset.enabled {
            return wgpu::DepthBiasState::default();
        }
        wgpu::DepthBiasState {
            constant: self.polygon_offset.units.round() as i32,
            slope_scale: self.polygon_offset.factor,
            clamp: 0.0,
        }
    }

    /// Opens a render pass that loads and stores the bound framebuffer's
    /// attachments, with the current viewport applied.
    ///
    /// Returns `None` while the default framebuffer is bound; that target
    /// belongs to the presentation layer.
    #[allow(clippy::cast_precision_loss)]
    pub fn framebuffer_pass(&mut self, label: &str) -> Option<wgpu::RenderPass<'_>> {
        let desc = self.framebuffers.get(&self.framebuffer)?;
        let depth_view = &self.textures.get(&desc.depth)?.view;
        let color_view = desc
            .color
            .and_then(|id| self.textures.get(&id))
            .map(|t| &t.view);

        let device = &self.device;
        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("umbra encoder"),
            })
        });
        let color_attachments = [color_view.map(|view| wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Load,
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })];
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: if color_view.is_some() {
                &color_attachments
            } else {
                &[]
            },
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });
        let viewport = self.viewport;
        pass.set_viewport(
            viewport.x as f32,
            viewport.y as f32,
            viewport.width as f32,
            viewport.height as f32,
            0.0,
            1.0,
        );
        Some(pass)
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn create_sampler(&self, desc: &TextureDesc) -> wgpu::Sampler {
        let filter = match desc.filter {
            TextureFilter::Nearest => wgpu::FilterMode::Nearest,
            TextureFilter::Linear => wgpu::FilterMode::Linear,
        };
        let (address_mode, border_color) = match desc.wrap {
            TextureWrap::ClampToEdge => (wgpu::AddressMode::ClampToEdge, None),
            TextureWrap::ClampToBorder(color) => {
                if self
                    .device
                    .features()
                    .contains(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER)
                {
                    (
                        wgpu::AddressMode::ClampToBorder,
                        Some(sampler_border_color(color)),
                    )
                } else {
                    log::warn!(
                        "'{}': clamp-to-border unsupported by device, clamping to edge",
                        desc.label
                    );
                    (wgpu::AddressMode::ClampToEdge, None)
                }
            }
        };
        self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(desc.label),
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mag_filter: filter,
            min_filter: filter,
            compare: desc.compare.map(compare_function),
            border_color,
            ..Default::default()
        })
    }

    /// Copies a `width`x`height` region of an attachment of the bound
    /// framebuffer into tightly packed bytes, rows top to bottom.
    fn read_attachment(
        &mut self,
        color: bool,
        width: u32,
        height: u32,
    ) -> RenderResult<(Vec<u8>, wgpu::TextureFormat)> {
        if !color && !self.supports_depth_readback() {
            return Err(RenderError::ReadbackFailed(
                "device cannot copy depth textures to buffers".to_owned(),
            ));
        }
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
        let attachment = self.textures.get(&id).ok_or_else(|| {
            RenderError::ReadbackFailed(format!("attachment {id:?} was deleted"))
        })?;
        if width > attachment.desc.width || height > attachment.desc.height {
            return Err(RenderError::ReadbackFailed(format!(
                "requested {width}x{height} from a {}x{} attachment",
                attachment.desc.width, attachment.desc.height
            )));
        }

        let format = attachment.format;
        let (bytes_per_texel, aspect) = match format {
            wgpu::TextureFormat::Rgba32Float => (16, wgpu::TextureAspect::All),
            wgpu::TextureFormat::Rgba16Float => (8, wgpu::TextureAspect::All),
            _ => (4, wgpu::TextureAspect::DepthOnly),
        };
        let row_bytes = width * bytes_per_texel;
        let bytes_per_row = aligned_bytes_per_row(row_bytes);

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("shadow readback buffer"),
            size: u64::from(bytes_per_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.encoder.take().unwrap_or_else(|| {
            self.device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("readback encoder"),
                })
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &attachment.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        let ((), code) = error_scope(&self.device, || {
            self.queue.submit(std::iter::once(encoder.finish()));
        });
        if let Some(code) = code {
            return Err(RenderError::ReadbackFailed(code.to_string()));
        }

        let buffer_slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());
        rx.recv()
            .map_err(|_| RenderError::ReadbackFailed("map callback dropped".to_owned()))?
            .map_err(|err| RenderError::ReadbackFailed(err.to_string()))?;

        let data = buffer_slice.get_mapped_range();
        let mut result = Vec::with_capacity((row_bytes * height) as usize);
        for row in 0..height {
            let start = (row * bytes_per_row) as usize;
            result.extend_from_slice(&data[start..start + row_bytes as usize]);
        }
        drop(data);
        staging.unmap();
        Ok((result, format))
    }
}

impl std::fmt::Debug for WgpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuContext")
            .field("framebuffer", &self.framebuffer)
            .field("viewport", &self.viewport)
            .field("textures", &self.textures.len())
            .field("framebuffers", &self.framebuffers.len())
            .field("buffers", &self.buffers.len())
            .finish_non_exhaustive()
    }
}

/// Runs `f` inside validation and out-of-memory error scopes.
fn error_scope<T>(
    device: &wgpu::Device,
    f: impl FnOnce() -> T,
) -> (T, Option<GpuErrorCode>) {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    let value = f();
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    let validation = pollster::block_on(device.pop_error_scope());
    (value, out_of_memory.or(validation).map(|e| gpu_error_code(&e)))
}

fn gpu_error_code(error: &wgpu::Error) -> GpuErrorCode {
    match error {
        wgpu::Error::OutOfMemory { .. } => GpuErrorCode::OutOfMemory,
        other => GpuErrorCode::Validation(other.to_string()),
    }
}

fn aligned_bytes_per_row(unaligned: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unaligned.div_ceil(align) * align
}

/// First float color format the adapter can render to, sample and copy.
fn resolve_color_target(
    allowed_usages: impl Fn(wgpu::TextureFormat) -> wgpu::TextureUsages,
) -> Option<wgpu::TextureFormat> {
    [
        wgpu::TextureFormat::Rgba32Float,
        wgpu::TextureFormat::Rgba16Float,
    ]
    .into_iter()
    .find(|&format| allowed_usages(format).contains(COLOR_TARGET_USAGES))
}

/// RGB of tightly packed color texels.
fn decode_color_texels(bytes: &[u8], format: wgpu::TextureFormat) -> Vec<[f32; 3]> {
    if format == wgpu::TextureFormat::Rgba16Float {
        return bytes
            .chunks_exact(8)
            .map(|texel| {
                let channel =
                    |i: usize| half::f16::from_ne_bytes([texel[i], texel[i + 1]]).to_f32();
                [channel(0), channel(2), channel(4)]
            })
            .collect();
    }
    bytes
        .chunks_exact(16)
        .map(|texel| {
            let channel = |i: usize| {
                f32::from_ne_bytes([texel[i], texel[i + 1], texel[i + 2], texel[i + 3]])
            };
            [channel(0), channel(4), channel(8)]
        })
        .collect()
}

fn compare_function(compare: CompareFunction) -> wgpu::CompareFunction {
    match compare {
        CompareFunction::Less => wgpu::CompareFunction::Less,
        CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunction::Greater => wgpu::CompareFunction::Greater,
        CompareFunction::Always => wgpu::CompareFunction::Always,
    }
}

fn sampler_border_color(color: BorderColor) -> wgpu::SamplerBorderColor {
    match color {
        BorderColor::TransparentBlack => wgpu::SamplerBorderColor::TransparentBlack,
        BorderColor::OpaqueBlack => wgpu::SamplerBorderColor::OpaqueBlack,
        BorderColor::OpaqueWhite => wgpu::SamplerBorderColor::OpaqueWhite,
    }
}

fn creation_error(
    code: GpuErrorCode,
    what: &str,
    fail: fn(String) -> RenderError,
) -> RenderError {
    match code {
        GpuErrorCode::OutOfMemory => RenderError::OutOfMemory(what.to_owned()),
        other => fail(format!("{what}: {other}")),
    }
}

impl GraphicsContext for WgpuContext {
    fn bound_framebuffer(&self) -> FramebufferId {
        self.framebuffer
    }

    fn bind_framebuffer(&mut self, framebuffer: FramebufferId) {
        if !framebuffer.is_default() && !self.framebuffers.contains_key(&framebuffer) {
            self.errors.push_back(GpuErrorCode::InvalidOperation);
            return;
        }
        self.framebuffer = framebuffer;
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn cull_state(&self) -> CullState {
        self.cull
    }

    fn set_cull_state(&mut self, state: CullState) {
        self.cull = state;
    }

    fn polygon_offset(&self) -> PolygonOffset {
        self.polygon_offset
    }

    fn set_polygon_offset(&mut self, offset: PolygonOffset) {
        self.polygon_offset = offset;
    }

    fn clear_values(&self) -> ClearValues {
        self.clear
    }

    fn set_clear_values(&mut self, values: ClearValues) {
        self.clear = values;
    }

    fn clear(&mut self, targets: ClearTargets) {
        let Some(desc) = self.framebuffers.get(&self.framebuffer) else {
            log::debug!("clear of the default framebuffer ignored");
            return;
        };
        let Some(depth) = self.textures.get(&desc.depth) else {
            return;
        };
        let color_view = desc
            .color
            .and_then(|id| self.textures.get(&id))
            .map(|t| &t.view);
        let values = self.clear;

        let device = &self.device;
        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("umbra encoder"),
            })
        });
        let color_load = if targets.color {
            let [r, g, b, a] = values.color.map(f64::from);
            wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a })
        } else {
            wgpu::LoadOp::Load
        };
        let depth_load = if targets.depth {
            wgpu::LoadOp::Clear(values.depth)
        } else {
            wgpu::LoadOp::Load
        };
        let color_attachments = [color_view.map(|view| wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: color_load,
                store: wgpu::StoreOp::Store,
            },
            depth_slice: None,
        })];
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear Pass"),
            color_attachments: if color_view.is_some() {
                &color_attachments
            } else {
                &[]
            },
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });
    }

    fn flush(&mut self) {
        let Some(encoder) = self.encoder.take() else {
            return;
        };
        let ((), code) = error_scope(&self.device, || {
            self.queue.submit(std::iter::once(encoder.finish()));
        });
        if let Some(code) = code {
            self.errors.push_back(code);
        }
    }

    fn supports_render_target(&self, format: TextureFormat) -> bool {
        match format {
            TextureFormat::Depth32Float => true,
            TextureFormat::Rgba32Float => self.color_target.is_some(),
        }
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> RenderResult<TextureId> {
        let (format, usage) = match desc.format {
            TextureFormat::Depth32Float => {
                let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING;
                if self.supports_depth_readback() {
                    usage |= wgpu::TextureUsages::COPY_SRC;
                }
                (wgpu::TextureFormat::Depth32Float, usage)
            }
            TextureFormat::Rgba32Float => {
                let format = self.color_target.ok_or_else(|| {
                    RenderError::TextureCreationFailed(format!(
                        "'{}': no renderable float color format",
                        desc.label
                    ))
                })?;
                (format, COLOR_TARGET_USAGES)
            }
        };
        let (texture, code) = error_scope(&self.device, || {
            self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(desc.label),
                size: wgpu::Extent3d {
                    width: desc.width,
                    height: desc.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage,
                view_formats: &[],
            })
        });
        if let Some(code) = code {
            return Err(creation_error(
                code,
                desc.label,
                RenderError::TextureCreationFailed,
            ));
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = self.create_sampler(desc);
        let id = TextureId(self.allocate_id());
        self.textures.insert(
            id,
            GpuTexture {
                desc: desc.clone(),
                format,
                texture,
                view,
                sampler,
            },
        );
        log::debug!("created texture '{}' {id:?} as {format:?}", desc.label);
        Ok(id)
    }

    fn delete_texture(&mut self, texture: TextureId) {
        if let Some(texture) = self.textures.remove(&texture) {
            texture.texture.destroy();
        }
    }

    fn create_framebuffer(&mut self, desc: &FramebufferDesc) -> RenderResult<FramebufferId> {
        let depth_ok = self
            .textures
            .get(&desc.depth)
            .is_some_and(|t| t.desc.format == TextureFormat::Depth32Float);
        let color_ok = desc.color.map_or(true, |id| {
            self.textures.get(&id).is_some_and(|t| {
                t.desc.format == TextureFormat::Rgba32Float
                    && self.textures.get(&desc.depth).is_some_and(|d| {
                        d.desc.width == t.desc.width && d.desc.height == t.desc.height
                    })
            })
        });
        if !depth_ok || !color_ok {
            return Err(RenderError::FramebufferIncomplete(desc.label.to_owned()));
        }
        let id = FramebufferId(self.allocate_id());
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
        let usage = match kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        } | wgpu::BufferUsages::COPY_DST;
        let (buffer, code) = error_scope(&self.device, || {
            self.device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents,
                    usage,
                })
        });
        if let Some(code) = code {
            return Err(creation_error(
                code,
                label,
                RenderError::BufferCreationFailed,
            ));
        }
        let id = BufferId(self.allocate_id());
        self.buffers.insert(id, buffer);
        Ok(id)
    }

    fn delete_buffer(&mut self, buffer: BufferId) {
        if let Some(buffer) = self.buffers.remove(&buffer) {
            buffer.destroy();
        }
    }

    fn read_depth_pixels(&mut self, width: u32, height: u32) -> RenderResult<Vec<f32>> {
        let (bytes, _) = self.read_attachment(false, width, height)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|b| f32::from_ne_bytes([b[0], b[1], b[2], b[3]]))
            .collect())
    }

    fn read_color_pixels(&mut self, width: u32, height: u32) -> RenderResult<Vec<[f32; 3]>> {
        let (bytes, format) = self.read_attachment(true, width, height)?;
        Ok(decode_color_texels(&bytes, format))
    }

    fn take_error(&mut self) -> Option<GpuErrorCode> {
        self.errors.pop_front()
    }
}
