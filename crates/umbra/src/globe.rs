//! A globe rendered with light-space shadows.

use glam::DVec3;
use umbra_core::{
    CoreError, ModelTransform, SceneCamera, SceneGraph, ShadowConfig, SphereMeshBuilder,
    SphereRadii,
};
use umbra_render::{GraphicsContext, RenderResult, ShadowMapData, ShadowPass, SphereBuffers};

use crate::Result;

/// Sphere or ellipsoid geometry plus the shadow pass that renders its depth
/// from the light.
#[derive(Debug)]
pub struct ShadowedGlobe {
    builder: SphereMeshBuilder,
    buffers: SphereBuffers,
    transform: ModelTransform,
    shadow: ShadowPass,
    initialized: bool,
}

fn validate_geometry(radii: SphereRadii, segments: u32) -> std::result::Result<(), CoreError> {
    if segments == 0 {
        return Err(CoreError::validation("segments", "must be at least 1"));
    }
    let radii = radii.as_vec3();
    if !radii.is_finite() || radii.min_element() < 0.0 {
        return Err(CoreError::validation(
            "radii",
            format!("must be finite and non-negative, got {radii}"),
        ));
    }
    Ok(())
}

impl ShadowedGlobe {
    /// Creates a globe without graphics resources.
    pub fn new(radii: impl Into<SphereRadii>, segments: u32, config: ShadowConfig) -> Result<Self> {
        let radii = radii.into();
        validate_geometry(radii, segments)?;
        Ok(Self {
            builder: SphereMeshBuilder::new(radii, segments),
            buffers: SphereBuffers::new(),
            transform: ModelTransform::default(),
            shadow: ShadowPass::new(config)?,
            initialized: false,
        })
    }

    /// Uploads the sphere mesh and allocates the shadow map.
    ///
    /// On failure nothing this call allocated stays allocated. A shadow map
    /// that already exists is kept.
    pub fn initialize_gl<C: GraphicsContext + ?Sized>(&mut self, ctx: &mut C) -> Result<()> {
        let mesh = self.builder.build()?;
        self.buffers.upload(ctx, &mesh)?;
        if let Err(err) = self.shadow.initialize_graphics_resources(ctx) {
            self.buffers.release(ctx);
            return Err(err.into());
        }
        self.initialized = true;
        log::debug!(
            "globe initialized: {} segments, {} triangles",
            self.builder.segments(),
            mesh.triangle_count
        );
        Ok(())
    }

    /// Releases the sphere buffers and the shadow map. Idempotent.
    pub fn deinitialize_gl<C: GraphicsContext + ?Sized>(&mut self, ctx: &mut C) -> Result<()> {
        self.shadow.release_graphics_resources(ctx)?;
        self.buffers.release(ctx);
        self.initialized = false;
        Ok(())
    }

    /// Whether graphics resources exist.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Changes the radii, rebuilding the mesh when initialized.
    ///
    /// If the new mesh cannot be uploaded the globe is left uninitialized
    /// without geometry; [`ShadowedGlobe::initialize_gl`] uploads it again.
    pub fn set_radii<C: GraphicsContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        radii: impl Into<SphereRadii>,
    ) -> Result<()> {
        let radii = radii.into();
        validate_geometry(radii, self.builder.segments())?;
        self.builder = SphereMeshBuilder::new(radii, self.builder.segments());
        self.rebuild(ctx)
    }

    /// Changes the segment count, rebuilding the mesh when initialized.
    ///
    /// Failure behaves as in [`ShadowedGlobe::set_radii`].
    pub fn set_segments<C: GraphicsContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        segments: u32,
    ) -> Result<()> {
        validate_geometry(self.builder.radii(), segments)?;
        self.builder = SphereMeshBuilder::new(self.builder.radii(), segments);
        self.rebuild(ctx)
    }

    fn rebuild<C: GraphicsContext + ?Sized>(&mut self, ctx: &mut C) -> Result<()> {
        if !self.initialized {
            return Ok(());
        }
        let mesh = self.builder.build()?;
        if let Err(err) = self.buffers.upload(ctx, &mesh) {
            self.initialized = false;
            return Err(err.into());
        }
        Ok(())
    }

    #[must_use]
    pub fn radii(&self) -> SphereRadii {
        self.builder.radii()
    }

    #[must_use]
    pub fn segments(&self) -> u32 {
        self.builder.segments()
    }

    #[must_use]
    pub fn transform(&self) -> &ModelTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: ModelTransform) {
        self.transform = transform;
    }

    /// Moves the globe, keeping rotation and scale.
    pub fn set_translation(&mut self, translation: DVec3) {
        self.transform.translation = translation;
    }

    /// Refreshes the light position from the scene graph.
    pub fn update<S: SceneGraph + ?Sized>(&mut self, scene: &S, time: f64) {
        self.shadow.update(scene, time);
    }

    /// Renders depth from the light with `draw`, targeted at the globe.
    ///
    /// Returns `Ok(false)` without touching any state when shadows are disabled.
    pub fn render_shadow_depth<C, K, F>(
        &mut self,
        ctx: &mut C,
        camera: &mut K,
        draw: F,
    ) -> Result<bool>
    where
        C: GraphicsContext + ?Sized,
        K: SceneCamera + ?Sized,
        F: FnOnce(&mut C, &K, &SphereBuffers) -> RenderResult<()>,
    {
        if !self.shadow.is_enabled() {
            return Ok(false);
        }
        let buffers = &self.buffers;
        self.shadow
            .render_depth(ctx, camera, &self.transform, |ctx, camera| {
                draw(ctx, camera, buffers)
            })?;
        Ok(true)
    }

    /// Light-space matrix and shadow textures for the shading pass.
    #[must_use]
    pub fn shadow_data(&self) -> ShadowMapData {
        self.shadow.light_space_data()
    }

    #[must_use]
    pub fn shadow_pass(&self) -> &ShadowPass {
        &self.shadow
    }

    pub fn shadow_pass_mut(&mut self) -> &mut ShadowPass {
        &mut self.shadow
    }

    #[must_use]
    pub fn buffers(&self) -> &SphereBuffers {
        &self.buffers
    }
}
