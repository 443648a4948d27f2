//! Debug dumps of shadow map contents as plain-text PPM images.
//!
//! The output is ASCII `P3` with a maximum value of 255. Depth values are
//! quantized to 8 bits and written as gray triples; light-space positions
//! are clamped to `[0, 1]` per channel.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding};
use image::{ExtendedColorType, ImageEncoder};

use crate::context::GraphicsContext;
use crate::error::RenderResult;

/// File name of the depth buffer dump.
pub const DEPTH_DUMP_FILE: &str = "depthBufferShadowMapping.ppm";

/// File name of the position buffer dump.
pub const POSITION_DUMP_FILE: &str = "positionBufferShadowMapping.ppm";

/// Error type for depth dump operations.
#[derive(Debug, thiserror::Error)]
pub enum DepthDumpError {
    #[error("failed to write dump: {0}")]
    IoError(#[from] std::io::Error),

    #[error("image encoding error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("pixel count {actual} does not match {width}x{height}")]
    SizeMismatch {
        width: u32,
        height: u32,
        actual: usize,
    },
}

/// Quantizes a normalized value to 8 bits.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn quantize(value: f32) -> u8 {
    if value.is_nan() {
        return 0;
    }
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn check_len(width: u32, height: u32, actual: usize) -> Result<(), DepthDumpError> {
    if (width as usize) * (height as usize) == actual {
        Ok(())
    } else {
        Err(DepthDumpError::SizeMismatch {
            width,
            height,
            actual,
        })
    }
}

fn write_ppm(path: &Path, rgb: &[u8], width: u32, height: u32) -> Result<(), DepthDumpError> {
    let writer = BufWriter::new(File::create(path)?);
    PnmEncoder::new(writer)
        .with_subtype(PnmSubtype::Pixmap(SampleEncoding::Ascii))
        .write_image(rgb, width, height, ExtendedColorType::Rgb8)?;
    Ok(())
}

/// Writes depth values as a gray `P3` image.
pub fn write_depth_ppm(
    path: &Path,
    depth: &[f32],
    width: u32,
    height: u32,
) -> Result<(), DepthDumpError> {
    check_len(width, height, depth.len())?;
    let rgb: Vec<u8> = depth
        .iter()
        .flat_map(|&d| {
            let v = quantize(d);
            [v, v, v]
        })
        .collect();
    write_ppm(path, &rgb, width, height)
}

/// Writes RGB values as a `P3` image.
pub fn write_rgb_ppm(
    path: &Path,
    pixels: &[[f32; 3]],
    width: u32,
    height: u32,
) -> Result<(), DepthDumpError> {
    check_len(width, height, pixels.len())?;
    let rgb: Vec<u8> = pixels.iter().flat_map(|p| p.map(quantize)).collect();
    write_ppm(path, &rgb, width, height)
}

/// Reads the bound framebuffer and writes its depth (and, when
/// `with_position` is set, its color attachment) into `directory`.
///
/// Returns the paths written.
pub fn dump_bound_framebuffer<C: GraphicsContext + ?Sized>(
    ctx: &mut C,
    directory: &Path,
    width: u32,
    height: u32,
    with_position: bool,
) -> RenderResult<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(2);

    let depth = ctx.read_depth_pixels(width, height)?;
    let depth_path = directory.join(DEPTH_DUMP_FILE);
    write_depth_ppm(&depth_path, &depth, width, height)?;
    log::info!("shadow map depth saved to {}", depth_path.display());
    written.push(depth_path);

    if with_position {
        let positions = ctx.read_color_pixels(width, height)?;
        let position_path = directory.join(POSITION_DUMP_FILE);
        write_rgb_ppm(&position_path, &positions, width, height)?;
        log::info!("shadow map positions saved to {}", position_path.display());
        written.push(position_path);
    }

    Ok(written)
}
