//! Headless GPU context creation.

use pollster::FutureExt;
use umbra_render::WgpuContext;

use crate::Result;

/// Creates a [`WgpuContext`] on a new device without a window.
///
/// `width`/`height` size the default framebuffer viewport, which the shadow
/// pass restores after rendering depth.
///
/// # Example
/// ```no_run
/// let mut ctx = umbra::create_headless_context(800, 600).unwrap();
/// ```
pub fn create_headless_context(width: u32, height: u32) -> Result<WgpuContext> {
    let ctx = WgpuContext::new_headless(width, height).block_on()?;
    Ok(ctx)
}
