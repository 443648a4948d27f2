//! GPU buffers for sphere and ellipsoid meshes.

use umbra_core::{SphereMesh, SphereMeshBuilder, SphereVertex};

use crate::context::{BufferId, BufferKind, GraphicsContext};
use crate::error::RenderResult;

/// Vertex buffer layout matching [`SphereVertex`]:
/// position at location 0, texture coordinate at 1, normal at 2.
#[must_use]
pub fn sphere_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<SphereVertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            // position (vec4)
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x4,
                offset: 0,
                shader_location: 0,
            },
            // tex_coord (vec2)
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x2,
                offset: 16,
                shader_location: 1,
            },
            // normal (vec3)
            wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x3,
                offset: 24,
                shader_location: 2,
            },
        ],
    }
}

/// Uploaded sphere geometry.
///
/// Holds at most one vertex/index buffer pair. Uploading new geometry frees
/// the previous pair first.
#[derive(Debug, Default)]
pub struct SphereBuffers {
    vertex_buffer: Option<BufferId>,
    index_buffer: Option<BufferId>,
    index_count: u32,
    triangle_count: u32,
}

impl SphereBuffers {
    /// Creates an empty set of buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates the mesh described by `builder` and uploads it.
    pub fn build<C: GraphicsContext + ?Sized>(
        ctx: &mut C,
        builder: &SphereMeshBuilder,
    ) -> RenderResult<Self> {
        let mesh = builder.build()?;
        let mut buffers = Self::new();
        buffers.upload(ctx, &mesh)?;
        Ok(buffers)
    }

    /// Replaces the stored geometry with `mesh`.
    ///
    /// On failure nothing is left allocated and the buffers are empty.
    pub fn upload<C: GraphicsContext + ?Sized>(
        &mut self,
        ctx: &mut C,
        mesh: &SphereMesh,
    ) -> RenderResult<()> {
        self.release(ctx);

        let vertex_buffer = ctx.create_buffer(
            BufferKind::Vertex,
            "Sphere Vertex Buffer",
            bytemuck::cast_slice(&mesh.vertices),
        )?;
        let index_buffer = match ctx.create_buffer(
            BufferKind::Index,
            "Sphere Index Buffer",
            bytemuck::cast_slice(&mesh.indices),
        ) {
            Ok(buffer) => buffer,
            Err(err) => {
                ctx.delete_buffer(vertex_buffer);
                return Err(err);
            }
        };

        self.vertex_buffer = Some(vertex_buffer);
        self.index_buffer = Some(index_buffer);
        self.index_count = u32::try_from(mesh.indices.len()).unwrap_or(u32::MAX);
        self.triangle_count = mesh.triangle_count;
        log::debug!(
            "uploaded sphere mesh: {} vertices, {} indices",
            mesh.vertices.len(),
            mesh.indices.len()
        );
        Ok(())
    }

    /// Frees both buffers. Idempotent.
    pub fn release<C: GraphicsContext + ?Sized>(&mut self, ctx: &mut C) {
        if let Some(buffer) = self.vertex_buffer.take() {
            ctx.delete_buffer(buffer);
        }
        if let Some(buffer) = self.index_buffer.take() {
            ctx.delete_buffer(buffer);
        }
        self.index_count = 0;
        self.triangle_count = 0;
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertex_buffer.is_none()
    }

    /// Number of indices to draw.
    #[must_use]
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// The triangle count reported by the mesh builder.
    #[must_use]
    pub fn triangle_count(&self) -> u32 {
        self.triangle_count
    }

    #[must_use]
    pub fn vertex_buffer(&self) -> Option<BufferId> {
        self.vertex_buffer
    }

    #[must_use]
    pub fn index_buffer(&self) -> Option<BufferId> {
        self.index_buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessContext;
    use glam::Vec3;

    #[test]
    fn test_layout_matches_vertex() {
        let layout = sphere_vertex_layout();
        assert_eq!(layout.array_stride, 36);
        assert_eq!(layout.attributes.len(), 3);
        assert_eq!(layout.attributes[2].offset, 24);
    }

    #[test]
    fn test_build_uploads_mesh() {
        let mut ctx = HeadlessContext::new(8, 8);
        let buffers = SphereBuffers::build(&mut ctx, &SphereMeshBuilder::new(1.0_f32, 4)).unwrap();
        assert_eq!(buffers.index_count(), 96);
        assert_eq!(buffers.triangle_count(), 96);

        let (kind, bytes) = ctx.buffer_contents(buffers.vertex_buffer().unwrap()).unwrap();
        assert_eq!(kind, BufferKind::Vertex);
        assert_eq!(bytes.len(), 25 * std::mem::size_of::<SphereVertex>());

        let (kind, bytes) = ctx.buffer_contents(buffers.index_buffer().unwrap()).unwrap();
        assert_eq!(kind, BufferKind::Index);
        let indices: &[u32] = bytemuck::cast_slice(bytes);
        assert_eq!(&indices[..6], &[0, 5, 6, 0, 6, 1]);
    }

    #[test]
    fn test_reupload_frees_previous() {
        let mut ctx = HeadlessContext::new(8, 8);
        let mut buffers = SphereBuffers::new();
        for segments in [4, 8, 16] {
            let mesh = SphereMeshBuilder::new(Vec3::new(2.0, 1.0, 1.0), segments)
                .build()
                .unwrap();
            buffers.upload(&mut ctx, &mesh).unwrap();
            assert_eq!(ctx.live_buffers(), 2);
        }
        buffers.release(&mut ctx);
        buffers.release(&mut ctx);
        assert_eq!(ctx.live_buffers(), 0);
        assert!(buffers.is_empty());
    }

    #[test]
    fn test_failed_upload_leaves_nothing() {
        let mut ctx = HeadlessContext::new(8, 8);
        ctx.limit_allocations(Some(1));
        let err = SphereBuffers::build(&mut ctx, &SphereMeshBuilder::new(1.0_f32, 4)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Resource);
        assert_eq!(ctx.live_buffers(), 0);
    }

    #[test]
    fn test_zero_segments_is_validation_error() {
        let mut ctx = HeadlessContext::new(8, 8);
        let err = SphereBuffers::build(&mut ctx, &SphereMeshBuilder::new(1.0_f32, 0)).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
        assert_eq!(ctx.live_buffers(), 0);
    }
}
