//! Light-space depth pass for shadow mapping.
//!
//! A [`ShadowPass`] owns a depth texture, an optional position-in-light-space
//! texture and the framebuffer binding them. Each frame the caller refreshes
//! the light position with [`ShadowPass::update`], then renders depth between
//! [`ShadowPass::begin`] and [`ShadowPass::end`] (or inside a
//! [`LightSpaceScope`]). `begin` repoints the shared camera at the light and
//! redirects rendering into the shadow framebuffer; `end` puts the camera and
//! every piece of pipeline state it touched back exactly as they were.
//!
//! While a pass is active the shared camera describes the light, not the
//! viewer. Nothing camera dependent besides the depth draw should run between
//! `begin` and `end`.

use std::path::Path;

use glam::{DMat4, DVec3};
use umbra_core::{
    light_space_matrix, rotation_from_view, validate_light_distance_fraction, CameraPose,
    LightCamera, ModelTransform, SceneCamera, SceneGraph, ShadowConfig,
};

use crate::context::{
    report_gpu_errors, BorderColor, ClearTargets, ClearValues, CompareFunction, CullFace,
    CullState, FramebufferDesc, FramebufferId, GraphicsContext, PipelineState, PolygonOffset,
    TextureDesc, TextureFilter, TextureFormat, TextureId, TextureWrap, Viewport,
};
use crate::depth_dump::dump_bound_framebuffer;
use crate::error::{RenderError, RenderResult};

/// Polygon offset factor applied while rendering depth.
pub const SHADOW_POLYGON_OFFSET_FACTOR: f32 = 2.5;

/// Polygon offset units applied while rendering depth.
pub const SHADOW_POLYGON_OFFSET_UNITS: f32 = 10.0;

/// Lifecycle state of a [`ShadowPass`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    /// No graphics resources.
    Uninitialized,
    /// Resources allocated, no pass running.
    Idle,
    /// Between `begin` and `end`.
    InLightSpacePass,
}

/// What shading passes need to sample the shadow map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowMapData {
    /// World to shadow-map texture coordinates.
    pub light_space_matrix: DMat4,
    pub depth_texture: Option<TextureId>,
    pub position_texture: Option<TextureId>,
}

#[derive(Debug, Clone, Copy)]
struct ShadowResources {
    depth_texture: TextureId,
    position_texture: Option<TextureId>,
    framebuffer: FramebufferId,
}

#[derive(Debug, Clone, Copy)]
struct SavedState {
    pipeline: PipelineState,
    camera: CameraPose,
}

/// Renders scene depth from the light's point of view.
#[derive(Debug)]
pub struct ShadowPass {
    config: ShadowConfig,
    dump_requested: bool,
    resources: Option<ShadowResources>,
    saved: Option<SavedState>,
    sun_world_position: DVec3,
    light_space_matrix: DMat4,
    light_camera: Option<LightCamera>,
}

impl ShadowPass {
    /// Validates `config` and creates a pass without graphics resources.
    pub fn new(config: ShadowConfig) -> RenderResult<Self> {
        config.validate()?;
        let dump_requested = config.save_depth_texture;
        Ok(Self {
            config,
            dump_requested,
            resources: None,
            saved: None,
            sun_world_position: DVec3::ZERO,
            light_space_matrix: DMat4::IDENTITY,
            light_camera: None,
        })
    }

    /// The configuration this pass was created with, including runtime changes.
    #[must_use]
    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PassState {
        match (&self.resources, &self.saved) {
            (None, _) => PassState::Uninitialized,
            (Some(_), None) => PassState::Idle,
            (Some(_), Some(_)) => PassState::InLightSpacePass,
        }
    }

    /// Whether graphics resources exist.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.resources.is_some()
    }

    /// Whether shadow computation is active.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Turns shadow computation on or off.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    /// Current light distance fraction numerator.
    #[must_use]
    pub fn light_distance_fraction(&self) -> i64 {
        self.config.light_distance_fraction
    }

    /// Changes the light distance fraction; takes effect at the next `begin`.
    pub fn set_light_distance_fraction(&mut self, fraction: i64) -> RenderResult<()> {
        validate_light_distance_fraction(fraction)?;
        self.config.light_distance_fraction = fraction;
        Ok(())
    }

    /// Shadow map resolution.
    #[must_use]
    pub fn depth_texture_size(&self) -> (u32, u32) {
        let [width, height] = self.config.depth_texture_size;
        (width, height)
    }

    /// Requests a one-shot dump of the depth buffer at the next `end`.
    pub fn request_depth_dump(&mut self) {
        self.dump_requested = true;
    }

    /// Whether a depth dump is pending.
    #[must_use]
    pub fn depth_dump_pending(&self) -> bool {
        self.dump_requested
    }

    /// Last known light position.
    #[must_use]
    pub fn sun_world_position(&self) -> DVec3 {
        self.sun_world_position
    }

    /// Light camera placement computed by the most recent `begin`.
    #[must_use]
    pub fn light_camera(&self) -> Option<&LightCamera> {
        self.light_camera.as_ref()
    }

    /// Light-space matrix and texture handles for shading passes.
    #[must_use]
    pub fn light_space_data(&self) -> ShadowMapData {
        ShadowMapData {
            light_space_matrix: self.light_space_matrix,
            depth_texture: self.resources.map(|r| r.depth_texture),
            position_texture: self.resources.and_then(|r| r.position_texture),
        }
    }

    /// Refreshes the light position from the scene graph.
    ///
    /// A missing light node is logged and the previous position is kept.
    pub fn update<S: SceneGraph + ?Sized>(&mut self, scene: &S, time: f64) {
        match scene.world_position(&self.config.light_source, time) {
            Some(position) => self.sun_world_position = position,
            None => log::warn!(
                "light source '{}' not found in scene graph; keeping light at {:?}",
                self.config.light_source,
                self.sun_world_position
            ),
        }
    }

    /// Allocates the shadow textures and framebuffer.
    ///
    /// Calling this on an initialized pass is a no-op. On failure every
    /// partial allocation is released. Devices that cannot render to the
    /// position target get a depth-only shadow map.
    pub fn initialize_graphics_resources<C: GraphicsContext + ?Sized>(
        &mut self,
        ctx: &mut C,
    ) -> RenderResult<()> {
        if self.resources.is_some() {
            return Ok(());
        }
        let (width, height) = self.depth_texture_size();

        let depth_texture = ctx.create_texture(&TextureDesc {
            label: "Shadow Map Depth",
            width,
            height,
            format: TextureFormat::Depth32Float,
            filter: TextureFilter::Nearest,
            // Samples outside the map read as depth 1, i.e. lit.
            wrap: TextureWrap::ClampToBorder(BorderColor::OpaqueWhite),
            compare: Some(CompareFunction::Less),
        })?;
        report_gpu_errors(ctx, "create depth texture");

        let position_texture = if !self.config.position_texture {
            None
        } else if !ctx.supports_render_target(TextureFormat::Rgba32Float) {
            log::warn!(
                "device cannot render light-space positions; shadow map holds depth only"
            );
            None
        } else {
            let created = ctx.create_texture(&TextureDesc {
                label: "Shadow Map Light-Space Position",
                width,
                height,
                format: TextureFormat::Rgba32Float,
                filter: TextureFilter::Linear,
                wrap: TextureWrap::ClampToEdge,
                compare: None,
            });
            match created {
                Ok(texture) => Some(texture),
                Err(err) => {
                    ctx.delete_texture(depth_texture);
                    return Err(err);
                }
            }
        };
        report_gpu_errors(ctx, "create position texture");

        let previous = ctx.bound_framebuffer();
        let framebuffer = ctx.create_framebuffer(&FramebufferDesc {
            label: "Shadow Map Framebuffer",
            depth: depth_texture,
            color: position_texture,
        });
        if ctx.bound_framebuffer() != previous {
            ctx.bind_framebuffer(previous);
        }
        let framebuffer = match framebuffer {
            Ok(framebuffer) => framebuffer,
            Err(err) => {
                ctx.delete_texture(depth_texture);
                if let Some(texture) = position_texture {
                    ctx.delete_texture(texture);
                }
                return Err(err);
            }
        };
        report_gpu_errors(ctx, "create shadow framebuffer");

        log::debug!(
            "shadow map resources created: {width}x{height}, position target: {}",
            position_texture.is_some()
        );
        self.resources = Some(ShadowResources {
            depth_texture,
            position_texture,
            framebuffer,
        });
        Ok(())
    }

    /// Frees the shadow textures and framebuffer. Idempotent.
    ///
    /// # Errors
    ///
    /// Fails with [`RenderError::PassAlreadyActive`] between `begin` and `end`.
    pub fn release_graphics_resources<C: GraphicsContext + ?Sized>(
        &mut self,
        ctx: &mut C,
    ) -> RenderResult<()> {
        if self.saved.is_some() {
            return Err(RenderError::PassAlreadyActive);
        }
        if let Some(resources) = self.resources.take() {
            ctx.delete_framebuffer(resources.framebuffer);
            ctx.delete_texture(resources.depth_texture);
            if let Some(texture) = resources.position_texture {
                ctx.delete_texture(texture);
            }
            log::debug!("shadow map resources released");
        }
        Ok(())
    }

    /// Starts rendering depth from the light's point of view.
    ///
    /// Places the light camera toward the light from `target`, repoints
    /// `camera` at it, recomputes the light-space matrix, saves the pipeline
    /// state and switches to the shadow framebuffer with front-face culling
    /// and polygon offset enabled.
    ///
    /// The light view uses a fixed `+y` up vector and is degenerate when the
    /// light is straight above or below the target.
    ///
    /// # Errors
    ///
    /// [`RenderError::NotInitialized`] before resources exist,
    /// [`RenderError::PassAlreadyActive`] inside an active pass.
    pub fn begin<C, K>(
        &mut self,
        ctx: &mut C,
        camera: &mut K,
        target: &ModelTransform,
    ) -> RenderResult<()>
    where
        C: GraphicsContext + ?Sized,
        K: SceneCamera + ?Sized,
    {
        let Some(resources) = self.resources else {
            return Err(RenderError::NotInitialized);
        };
        if self.saved.is_some() {
            return Err(RenderError::PassAlreadyActive);
        }

        let light = LightCamera::compute(
            self.sun_world_position,
            target.translation,
            self.config.light_distance_fraction,
        );
        if light.is_up_degenerate() {
            log::warn!(
                "light direction {:?} is parallel to the light up vector; shadow map is undefined",
                light.direction
            );
        }

        let camera_pose = CameraPose::capture(camera);
        camera.set_position(light.position);
        camera.set_focus(light.focus);
        camera.set_rotation(rotation_from_view(&light.view));

        // The light reuses the viewer's projection.
        self.light_space_matrix =
            light_space_matrix(&camera.projection_matrix(), &camera.combined_view_matrix());
        self.light_camera = Some(light);

        self.saved = Some(SavedState {
            pipeline: PipelineState::capture(ctx),
            camera: camera_pose,
        });

        report_gpu_errors(ctx, "begin() -- before binding framebuffer");
        ctx.bind_framebuffer(resources.framebuffer);
        report_gpu_errors(ctx, "begin() -- after binding framebuffer");

        ctx.set_clear_values(ClearValues {
            color: [0.0; 4],
            depth: 1.0,
        });
        ctx.clear(ClearTargets {
            color: resources.position_texture.is_some(),
            depth: true,
        });
        report_gpu_errors(ctx, "begin() -- after clearing depth buffer");

        let (width, height) = self.depth_texture_size();
        ctx.set_viewport(Viewport::from_size(width, height));
        report_gpu_errors(ctx, "begin() -- set viewport");

        ctx.set_cull_state(CullState {
            enabled: true,
            face: CullFace::Front,
        });
        report_gpu_errors(ctx, "begin() -- enabled front face culling");

        ctx.set_polygon_offset(PolygonOffset {
            enabled: true,
            factor: SHADOW_POLYGON_OFFSET_FACTOR,
            units: SHADOW_POLYGON_OFFSET_UNITS,
        });
        report_gpu_errors(ctx, "begin() finished");
        Ok(())
    }

    /// Finishes the light-space pass and restores camera and pipeline state.
    ///
    /// A pending depth dump is written before the state is restored; a failed
    /// dump is logged and does not fail the pass.
    ///
    /// # Errors
    ///
    /// [`RenderError::PassNotActive`] without a matching `begin`.
    pub fn end<C, K>(&mut self, ctx: &mut C, camera: &mut K) -> RenderResult<()>
    where
        C: GraphicsContext + ?Sized,
        K: SceneCamera + ?Sized,
    {
        let Some(saved) = self.saved.take() else {
            return Err(RenderError::PassNotActive);
        };

        ctx.flush();
        if self.dump_requested {
            self.dump_requested = false;
            self.write_depth_dump(ctx, &self.config.dump_directory);
        }

        saved.camera.apply(camera);
        saved.pipeline.apply(ctx);
        report_gpu_errors(ctx, "end() finished");
        Ok(())
    }

    /// Begins a pass and returns a guard that ends it when dropped.
    pub fn scope<'a, C, K>(
        &'a mut self,
        ctx: &'a mut C,
        camera: &'a mut K,
        target: &ModelTransform,
    ) -> RenderResult<LightSpaceScope<'a, C, K>>
    where
        C: GraphicsContext + ?Sized,
        K: SceneCamera + ?Sized,
    {
        self.begin(ctx, camera, target)?;
        Ok(LightSpaceScope {
            pass: self,
            ctx,
            camera,
            finished: false,
        })
    }

    /// Runs `draw` inside a light-space pass.
    ///
    /// State is restored whether or not `draw` succeeds; the draw error takes
    /// precedence over an error from ending the pass.
    pub fn render_depth<C, K, F>(
        &mut self,
        ctx: &mut C,
        camera: &mut K,
        target: &ModelTransform,
        draw: F,
    ) -> RenderResult<()>
    where
        C: GraphicsContext + ?Sized,
        K: SceneCamera + ?Sized,
        F: FnOnce(&mut C, &K) -> RenderResult<()>,
    {
        let mut scope = self.scope(ctx, camera, target)?;
        let drawn = {
            let (ctx, camera) = scope.parts();
            draw(ctx, camera)
        };
        let ended = scope.finish();
        drawn.and(ended)
    }

    fn write_depth_dump<C: GraphicsContext + ?Sized>(&self, ctx: &mut C, directory: &Path) {
        let (width, height) = self.depth_texture_size();
        let with_position = self
            .resources
            .is_some_and(|r| r.position_texture.is_some());
        if let Err(err) = dump_bound_framebuffer(ctx, directory, width, height, with_position) {
            log::error!("failed to save shadow map: {err}");
        }
        report_gpu_errors(ctx, "end() -- read shadow map buffers");
    }
}

/// An active light-space pass. Dropping the guard ends the pass.
pub struct LightSpaceScope<'a, C, K>
where
    C: GraphicsContext + ?Sized,
    K: SceneCamera + ?Sized,
{
    pass: &'a mut ShadowPass,
    ctx: &'a mut C,
    camera: &'a mut K,
    finished: bool,
}

impl<C, K> LightSpaceScope<'_, C, K>
where
    C: GraphicsContext + ?Sized,
    K: SceneCamera + ?Sized,
{
    /// The graphics context, bound to the shadow framebuffer.
    pub fn context(&mut self) -> &mut C {
        &mut *self.ctx
    }

    /// The shared camera, posed at the light.
    pub fn camera(&self) -> &K {
        &*self.camera
    }

    /// Context and camera together, for draw code needing both.
    pub fn parts(&mut self) -> (&mut C, &K) {
        (&mut *self.ctx, &*self.camera)
    }

    /// Light-space matrix of this pass.
    #[must_use]
    pub fn light_space_matrix(&self) -> DMat4 {
        self.pass.light_space_matrix
    }

    /// Ends the pass, reporting errors instead of logging them.
    pub fn finish(mut self) -> RenderResult<()> {
        self.finished = true;
        self.pass.end(self.ctx, self.camera)
    }
}

impl<C, K> Drop for LightSpaceScope<'_, C, K>
where
    C: GraphicsContext + ?Sized,
    K: SceneCamera + ?Sized,
{
    fn drop(&mut self) {
        if !self.finished {
            if let Err(err) = self.pass.end(self.ctx, self.camera) {
                log::error!("failed to end light-space pass: {err}");
            }
        }
    }
}
