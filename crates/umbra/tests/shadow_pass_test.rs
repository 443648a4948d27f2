//! Shadow pass integration tests against the in-memory graphics context.

use proptest::prelude::*;
use umbra::*;
use umbra_render::{report_gpu_errors, CullFace, CullState, PolygonOffset, Viewport};

fn setup(config: ShadowConfig) -> (ShadowPass, HeadlessContext, Camera) {
    let mut ctx = HeadlessContext::new(1280, 720);
    let mut pass = ShadowPass::new(config).unwrap();
    pass.initialize_graphics_resources(&mut ctx).unwrap();
    pass.update(&scene_with_sun(DVec3::new(1.0e6, 1.0e5, 0.0)), 0.0);
    (pass, ctx, Camera::new(1280.0 / 720.0))
}

fn small() -> ShadowConfig {
    ShadowConfig {
        depth_texture_size: [32, 32],
        ..Default::default()
    }
}

fn scene_with_sun(position: DVec3) -> SceneNodes {
    let mut scene = SceneNodes::new();
    scene.insert("Sun", position);
    scene
}

#[test]
fn begin_end_restores_pipeline_state() {
    let (mut pass, mut ctx, mut camera) = setup(small());
    pass.update(&scene_with_sun(DVec3::new(1.0e8, 3.0e7, 0.0)), 0.0);

    // Non-default state the pass must not clobber.
    ctx.set_viewport(Viewport {
        x: 10,
        y: 20,
        width: 640,
        height: 480,
    });
    ctx.set_cull_state(CullState {
        enabled: false,
        face: CullFace::Back,
    });
    ctx.set_polygon_offset(PolygonOffset {
        enabled: false,
        factor: 1.0,
        units: 1.0,
    });
    let before = PipelineState::capture(&ctx);
    let pose = CameraPose::capture(&camera);

    pass.begin(&mut ctx, &mut camera, &ModelTransform::default())
        .unwrap();
    assert_ne!(PipelineState::capture(&ctx), before);
    pass.end(&mut ctx, &mut camera).unwrap();

    assert_eq!(PipelineState::capture(&ctx), before);
    assert_eq!(CameraPose::capture(&camera), pose);
}

#[test]
fn protocol_violations_are_state_errors() {
    let (mut pass, mut ctx, mut camera) = setup(small());

    let err = pass.end(&mut ctx, &mut camera).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);

    pass.begin(&mut ctx, &mut camera, &ModelTransform::default())
        .unwrap();
    let err = pass
        .begin(&mut ctx, &mut camera, &ModelTransform::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);

    // The first pass is still intact and ends normally.
    assert_eq!(pass.state(), PassState::InLightSpacePass);
    pass.end(&mut ctx, &mut camera).unwrap();
    assert_eq!(pass.state(), PassState::Idle);
}

#[test]
fn begin_before_initialize_is_resource_error() {
    let mut ctx = HeadlessContext::default();
    let mut camera = Camera::new(1.0);
    let mut pass = ShadowPass::new(ShadowConfig::default()).unwrap();
    let err = pass
        .begin(&mut ctx, &mut camera, &ModelTransform::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resource);
    assert!(ctx.commands().is_empty());
}

#[test]
fn light_camera_placed_at_scaled_distance() {
    let (mut pass, mut ctx, mut camera) = setup(small());
    let target = ModelTransform::from_translation(DVec3::new(0.0, 0.0, 500.0));
    pass.update(&scene_with_sun(DVec3::new(1000.0, 0.0, 500.0)), 0.0);

    pass.begin(&mut ctx, &mut camera, &target).unwrap();
    let light = *pass.light_camera().unwrap();
    assert!((light.true_distance - 1000.0).abs() < 1e-9);
    assert!((light.scaled_distance - 0.1).abs() < 1e-12);
    assert!(camera
        .position
        .abs_diff_eq(DVec3::new(0.1, 0.0, 500.0), 1e-9));
    assert_eq!(camera.focus, target.translation);
    pass.end(&mut ctx, &mut camera).unwrap();
}

#[test]
fn light_space_matrix_maps_target_into_unit_cube() {
    let (mut pass, mut ctx, mut camera) = setup(small());
    pass.update(&scene_with_sun(DVec3::new(0.0, 0.0, 1.0e6)), 0.0);
    pass.set_light_distance_fraction(1).unwrap();

    pass.begin(&mut ctx, &mut camera, &ModelTransform::default())
        .unwrap();
    pass.end(&mut ctx, &mut camera).unwrap();

    // Target sits 10 units in front of the light camera.
    let data = pass.light_space_data();
    let p = data.light_space_matrix * glam::DVec4::new(0.0, 0.0, 0.0, 1.0);
    let ndc = p.truncate() / p.w;
    assert!((ndc.x - 0.5).abs() < 1e-9);
    assert!((ndc.y - 0.5).abs() < 1e-9);
    assert!(ndc.z > 0.0 && ndc.z < 1.0);
    assert!(data.depth_texture.is_some());
}

#[test]
fn missing_light_node_keeps_previous_position() {
    let (mut pass, _ctx, _camera) = setup(small());
    let sun = DVec3::new(1.0, 2.0, 3.0);
    pass.update(&scene_with_sun(sun), 0.0);

    let mut scene = scene_with_sun(sun);
    scene.remove("Sun");
    pass.update(&scene, 1.0);
    assert_eq!(pass.sun_world_position(), sun);
}

#[test]
fn custom_light_source_name() {
    let mut pass = ShadowPass::new(ShadowConfig {
        light_source: "Alpha Centauri".into(),
        ..Default::default()
    })
    .unwrap();
    let mut scene = scene_with_sun(DVec3::X);
    scene.insert("Alpha Centauri", DVec3::Y);
    pass.update(&scene, 0.0);
    assert_eq!(pass.sun_world_position(), DVec3::Y);
}

#[test]
fn gpu_errors_are_drained_and_logged() {
    let (mut pass, mut ctx, mut camera) = setup(small());
    pass.begin(&mut ctx, &mut camera, &ModelTransform::default())
        .unwrap();
    // Binding a framebuffer that does not exist records an error in the context.
    ctx.bind_framebuffer(umbra_render::FramebufferId(999));
    pass.end(&mut ctx, &mut camera).unwrap();
    assert_eq!(report_gpu_errors(&mut ctx, "after end"), None);
}

#[test]
fn depth_dump_written_once() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pass, mut ctx, mut camera) = setup(ShadowConfig {
        save_depth_texture: true,
        dump_directory: dir.path().to_path_buf(),
        depth_texture_size: [4, 2],
        ..Default::default()
    });
    pass.update(&scene_with_sun(DVec3::new(1.0e6, 0.0, 0.0)), 0.0);
    assert!(pass.depth_dump_pending());

    pass.render_depth(&mut ctx, &mut camera, &ModelTransform::default(), |ctx, _| {
        ctx.draw_fragments(|x, _| (x == 0).then_some((0.0, [0.25, 0.5, 1.0])));
        Ok(())
    })
    .unwrap();
    assert!(!pass.depth_dump_pending());

    let depth = std::fs::read_to_string(dir.path().join("depthBufferShadowMapping.ppm")).unwrap();
    let tokens: Vec<&str> = depth.split_whitespace().collect();
    assert_eq!(&tokens[..4], &["P3", "4", "2", "255"]);
    assert_eq!(&tokens[4..10], &["0", "0", "0", "255", "255", "255"]);

    let position =
        std::fs::read_to_string(dir.path().join("positionBufferShadowMapping.ppm")).unwrap();
    let tokens: Vec<&str> = position.split_whitespace().collect();
    assert_eq!(&tokens[4..7], &["64", "128", "255"]);

    // Second pass without a new request leaves the files alone.
    std::fs::remove_file(dir.path().join("depthBufferShadowMapping.ppm")).unwrap();
    pass.render_depth(&mut ctx, &mut camera, &ModelTransform::default(), |_, _| Ok(()))
        .unwrap();
    assert!(!dir.path().join("depthBufferShadowMapping.ppm").exists());
}

#[test]
fn failed_dump_does_not_fail_the_pass() {
    let dir = tempfile::tempdir().unwrap();
    let (mut pass, mut ctx, mut camera) = setup(ShadowConfig {
        dump_directory: dir.path().join("missing"),
        ..small()
    });
    pass.request_depth_dump();
    let before = PipelineState::capture(&ctx);
    pass.render_depth(&mut ctx, &mut camera, &ModelTransform::default(), |_, _| Ok(()))
        .unwrap();
    assert!(!pass.depth_dump_pending());
    assert_eq!(PipelineState::capture(&ctx), before);
}

#[test]
fn config_from_json() {
    let config = ShadowConfig::from_json(
        r#"{
            "light_distance_fraction": 250,
            "depth_texture_size": [512, 256],
            "position_texture": false
        }"#,
    )
    .unwrap();
    let (pass, ctx, _) = setup(config);
    assert_eq!(pass.light_distance_fraction(), 250);
    assert_eq!(pass.depth_texture_size(), (512, 256));
    assert_eq!(ctx.live_textures(), 1);

    let err = ShadowConfig::from_json(r#"{ "light_distance_fraction": 0 }"#)
        .and_then(|c| c.validate().map(|()| c))
        .unwrap_err();
    assert!(err.is_validation());
}

fn light_space_for(offset: DVec3, sun: DVec3, target: DVec3) -> DMat4 {
    let (mut pass, mut ctx, mut camera) = setup(small());
    pass.update(&scene_with_sun(sun + offset), 0.0);
    pass.begin(
        &mut ctx,
        &mut camera,
        &ModelTransform::from_translation(target + offset),
    )
    .unwrap();
    pass.end(&mut ctx, &mut camera).unwrap();
    pass.light_space_data().light_space_matrix
}

proptest! {
    #[test]
    fn light_space_invariant_under_translation(
        tx in -1.0e4f64..1.0e4,
        ty in -1.0e4f64..1.0e4,
        tz in -1.0e4f64..1.0e4,
        sx in 1.0e3f64..1.0e5,
        sz in -1.0e5f64..1.0e5,
    ) {
        let offset = DVec3::new(tx, ty, tz);
        let sun = DVec3::new(sx, 0.0, sz);
        let target = DVec3::new(10.0, -5.0, 3.0);

        let original = light_space_for(DVec3::ZERO, sun, target);
        let moved = light_space_for(offset, sun, target);

        // A point moved along with light and target lands on the same texel.
        let translate = DMat4::from_translation(offset);
        let diff = (moved * translate - original).to_cols_array();
        let scale = original.to_cols_array().iter().fold(1.0f64, |m, v| m.max(v.abs()));
        prop_assert!(diff.iter().all(|d| d.abs() <= 1e-6 * scale), "diff {:?}", diff);
    }
}
