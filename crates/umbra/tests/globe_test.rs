//! Globe integration tests: sphere buffers and the shadow pass together.

use umbra::*;

fn scene() -> SceneNodes {
    let mut scene = SceneNodes::new();
    scene.insert("Sun", DVec3::new(1.5e11, 2.0e10, 0.0));
    scene
}

fn config() -> ShadowConfig {
    ShadowConfig {
        depth_texture_size: [64, 64],
        ..Default::default()
    }
}

#[test]
fn initialize_and_deinitialize() {
    let mut ctx = HeadlessContext::new(640, 480);
    let mut globe = ShadowedGlobe::new(1.0_f32, 4, config()).unwrap();
    assert!(!globe.is_initialized());

    globe.initialize_gl(&mut ctx).unwrap();
    assert!(globe.is_initialized());
    assert_eq!(globe.buffers().index_count(), 96);
    assert_eq!(ctx.live_buffers(), 2);
    assert_eq!(ctx.live_textures(), 2);
    assert_eq!(ctx.live_framebuffers(), 1);
    assert_eq!(globe.shadow_pass().state(), PassState::Idle);

    globe.deinitialize_gl(&mut ctx).unwrap();
    globe.deinitialize_gl(&mut ctx).unwrap();
    assert_eq!(ctx.live_buffers(), 0);
    assert_eq!(ctx.live_textures(), 0);
    assert_eq!(ctx.live_framebuffers(), 0);
}

#[test]
fn default_config_degrades_to_depth_only() {
    let mut ctx = HeadlessContext::new(640, 480);
    ctx.set_color_targets_supported(false);
    let mut camera = Camera::new(640.0 / 480.0);
    let mut globe = ShadowedGlobe::new(1.0_f32, 8, config()).unwrap();

    globe.initialize_gl(&mut ctx).unwrap();
    assert!(globe.is_initialized());
    assert_eq!(ctx.live_buffers(), 2);
    assert_eq!(ctx.live_textures(), 1);

    globe.update(&scene(), 0.0);
    assert!(globe
        .render_shadow_depth(&mut ctx, &mut camera, |_, _, _| Ok(()))
        .unwrap());
    let data = globe.shadow_data();
    assert!(data.depth_texture.is_some());
    assert_eq!(data.position_texture, None);
}

#[test]
fn changing_radii_rebuilds_without_leaking() {
    let mut ctx = HeadlessContext::new(640, 480);
    let mut globe = ShadowedGlobe::new(1.0_f32, 8, config()).unwrap();
    globe.initialize_gl(&mut ctx).unwrap();
    let first = globe.buffers().vertex_buffer();

    for radius in [2.0_f32, 3.0, 4.0] {
        globe.set_radii(&mut ctx, radius).unwrap();
        assert_eq!(ctx.live_buffers(), 2);
    }
    globe
        .set_radii(&mut ctx, Vec3::new(6378.0, 6357.0, 6378.0))
        .unwrap();
    globe.set_segments(&mut ctx, 16).unwrap();
    assert_eq!(ctx.live_buffers(), 2);
    assert_eq!(globe.buffers().index_count(), 6 * 16 * 16);
    assert_ne!(globe.buffers().vertex_buffer(), first);

    let err = globe.set_segments(&mut ctx, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(globe.segments(), 16);
}

#[test]
fn allocation_failure_is_resource_error() {
    let mut ctx = HeadlessContext::new(640, 480);
    let mut globe = ShadowedGlobe::new(1.0_f32, 8, config()).unwrap();
    // Both sphere buffers succeed, the depth texture does not.
    ctx.limit_allocations(Some(2));
    let err = globe.initialize_gl(&mut ctx).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resource);
    assert!(matches!(err, UmbraError::Render(RenderError::OutOfMemory(_))));
    assert_eq!(ctx.live_buffers(), 0);
    assert_eq!(ctx.live_textures(), 0);
}

#[test]
fn render_shadow_depth_draws_with_sphere() {
    let mut ctx = HeadlessContext::new(640, 480);
    let mut camera = Camera::new(640.0 / 480.0);
    let mut globe = ShadowedGlobe::new(1.0_f32, 8, config()).unwrap();
    globe.initialize_gl(&mut ctx).unwrap();
    globe.set_translation(DVec3::new(1.0e3, 0.0, 0.0));
    globe.update(&scene(), 0.0);

    let before = PipelineState::capture(&ctx);
    let mut drawn_indices = 0;
    let rendered = globe
        .render_shadow_depth(&mut ctx, &mut camera, |ctx, light, sphere| {
            assert!(!ctx.bound_framebuffer().is_default());
            assert_eq!(light.focus, DVec3::new(1.0e3, 0.0, 0.0));
            drawn_indices = sphere.index_count();
            Ok(())
        })
        .unwrap();
    assert!(rendered);
    assert_eq!(drawn_indices, 6 * 8 * 8);
    assert_eq!(PipelineState::capture(&ctx), before);

    let data = globe.shadow_data();
    assert_ne!(data.light_space_matrix, DMat4::IDENTITY);
    assert!(data.depth_texture.is_some());
    assert!(data.position_texture.is_some());
}

#[test]
fn disabled_shadows_skip_the_pass() {
    let mut ctx = HeadlessContext::new(640, 480);
    let mut camera = Camera::new(1.0);
    let mut globe = ShadowedGlobe::new(
        1.0_f32,
        8,
        ShadowConfig {
            enabled: false,
            ..config()
        },
    )
    .unwrap();
    globe.initialize_gl(&mut ctx).unwrap();
    ctx.clear_commands();

    let rendered = globe
        .render_shadow_depth(&mut ctx, &mut camera, |_, _, _| {
            panic!("draw must not run while shadows are disabled")
        })
        .unwrap();
    assert!(!rendered);
    assert!(ctx.commands().is_empty());

    globe.shadow_pass_mut().set_enabled(true);
    globe.update(&scene(), 0.0);
    assert!(globe
        .render_shadow_depth(&mut ctx, &mut camera, |_, _, _| Ok(()))
        .unwrap());
}

#[test]
fn deinitialize_during_pass_is_state_error() {
    let mut ctx = HeadlessContext::new(640, 480);
    let mut camera = Camera::new(1.0);
    let mut pass = ShadowPass::new(config()).unwrap();
    pass.initialize_graphics_resources(&mut ctx).unwrap();
    pass.update(&scene(), 0.0);

    let mut scope = pass
        .scope(&mut ctx, &mut camera, &ModelTransform::default())
        .unwrap();
    assert!(!scope.context().bound_framebuffer().is_default());
    scope.finish().unwrap();

    pass.begin(&mut ctx, &mut camera, &ModelTransform::default())
        .unwrap();
    let err = pass.release_graphics_resources(&mut ctx).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    assert_eq!(ctx.live_textures(), 2);
    pass.end(&mut ctx, &mut camera).unwrap();
    pass.release_graphics_resources(&mut ctx).unwrap();
    assert_eq!(ctx.live_textures(), 0);
}

#[test]
fn field_documentation_covers_every_option() {
    let docs = ShadowConfig::documentation();
    let names: Vec<&str> = docs.iter().map(|d| d.identifier).collect();
    for name in [
        "texture",
        "size",
        "offset",
        "night_factor",
        "transparency",
        "enabled",
        "light_distance_fraction",
        "save_depth_texture",
    ] {
        assert!(names.contains(&name), "missing documentation for {name}");
    }
    assert!(docs.iter().all(|d| d.optional));
}
