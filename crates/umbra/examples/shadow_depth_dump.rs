#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
//! Renders a moon's shadow map on the CPU and dumps it as PPM.
//!
//! Run with: cargo run --example shadow_depth_dump
//!
//! Writes depthBufferShadowMapping.ppm and positionBufferShadowMapping.ppm
//! to the working directory.

use glam::DVec4;
use umbra::*;

const MAP_SIZE: u32 = 256;

fn main() -> Result<()> {
    init_logging();

    let mut ctx = HeadlessContext::new(800, 600);
    let mut camera = Camera::new(800.0 / 600.0);

    let mut scene = SceneNodes::new();
    scene.insert("Sun", DVec3::new(1.0e6, 4.0e5, 2.0e5));

    let moon_center = DVec3::new(0.0, 0.0, 0.0);
    let moon_radius = 0.5;

    let mut globe = ShadowedGlobe::new(
        1.0_f32,
        32,
        ShadowConfig {
            depth_texture_size: [MAP_SIZE, MAP_SIZE],
            light_distance_fraction: 1,
            save_depth_texture: true,
            ..Default::default()
        },
    )?;
    globe.initialize_gl(&mut ctx)?;
    globe.set_translation(moon_center);
    globe.update(&scene, 0.0);

    globe.render_shadow_depth(&mut ctx, &mut camera, |ctx, light, _sphere| {
        // Splat the moon as a disc facing the light.
        let light_space =
            light_space_matrix(&light.projection_matrix(), &light.combined_view_matrix());
        let center = light_space * moon_center.extend(1.0);
        let center = center.truncate() / center.w;
        let edge_world = moon_center + light.up() * moon_radius;
        let edge = light_space * DVec4::from((edge_world, 1.0));
        let radius = (edge.truncate() / edge.w - center).truncate().length();

        ctx.draw_fragments(|x, y| {
            let u = (f64::from(x) + 0.5) / f64::from(MAP_SIZE);
            let v = 1.0 - (f64::from(y) + 0.5) / f64::from(MAP_SIZE);
            let d = glam::DVec2::new(u - center.x, v - center.y).length();
            (d <= radius).then(|| {
                let bulge = (1.0 - (d / radius).powi(2)).sqrt() * 0.01;
                let depth = (center.z - bulge) as f32;
                (depth, [u as f32, v as f32, depth])
            })
        });
        Ok(())
    })?;

    println!(
        "light-space matrix: {:?}",
        globe.shadow_data().light_space_matrix
    );
    globe.deinitialize_gl(&mut ctx)?;
    Ok(())
}
