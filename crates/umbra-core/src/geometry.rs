//! Procedural UV-sphere and ellipsoid meshes.

use glam::Vec3;

use crate::error::{CoreError, CoreResult};

/// Vertex layout of generated spheres.
///
/// Matches the GPU attribute layout: location 0 is `position` (w is padding,
/// always 0), location 1 `tex_coord`, location 2 `normal`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SphereVertex {
    pub position: [f32; 4],
    pub tex_coord: [f32; 2],
    pub normal: [f32; 3],
}

/// Radii of the generated surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SphereRadii {
    /// Same radius along every axis.
    Uniform(f32),
    /// Per-axis radii of an ellipsoid.
    Ellipsoid(Vec3),
}

impl SphereRadii {
    /// Radii as a vector.
    #[must_use]
    pub fn as_vec3(self) -> Vec3 {
        match self {
            SphereRadii::Uniform(radius) => Vec3::splat(radius),
            SphereRadii::Ellipsoid(radii) => radii,
        }
    }
}

impl From<f32> for SphereRadii {
    fn from(radius: f32) -> Self {
        SphereRadii::Uniform(radius)
    }
}

impl From<Vec3> for SphereRadii {
    fn from(radii: Vec3) -> Self {
        SphereRadii::Ellipsoid(radii)
    }
}

/// CPU-side output of [`SphereMeshBuilder::build`].
#[derive(Debug, Clone, PartialEq)]
pub struct SphereMesh {
    pub vertices: Vec<SphereVertex>,
    pub indices: Vec<u32>,
    /// Number of index elements to draw, `6 · segments²`.
    pub triangle_count: u32,
}

/// Builds indexed UV-spheres.
///
/// Rows run from the north pole (`θ = 0`, `+y`) to the south pole, columns
/// around the `y` axis starting at `+z`. The seam column is duplicated so
/// texture coordinates reach `u = 1`, giving `(segments + 1)²` vertices.
/// The first and last rows collapse to a single point and produce
/// zero-area triangles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereMeshBuilder {
    radii: SphereRadii,
    segments: u32,
}

impl SphereMeshBuilder {
    /// Creates a builder for the given radii and segment count.
    pub fn new(radii: impl Into<SphereRadii>, segments: u32) -> Self {
        Self {
            radii: radii.into(),
            segments,
        }
    }

    /// Radii of the surface.
    #[must_use]
    pub fn radii(&self) -> SphereRadii {
        self.radii
    }

    /// Segments along both latitude and longitude.
    #[must_use]
    pub fn segments(&self) -> u32 {
        self.segments
    }

    /// Generates vertices and triangle indices.
    ///
    /// # Errors
    ///
    /// Fails with a validation error when `segments` is zero, when
    /// `(segments + 1)²` does not fit a 32-bit index, or when the `6 s²`
    /// triangle count does not fit 32 bits.
    #[allow(clippy::cast_precision_loss)]
    pub fn build(&self) -> CoreResult<SphereMesh> {
        let segments = self.segments;
        if segments == 0 {
            return Err(CoreError::validation("segments", "must be at least 1"));
        }
        let row = u64::from(segments) + 1;
        let triangle_count = u32::try_from(6 * u64::from(segments) * u64::from(segments))
            .ok()
            .filter(|_| row * row <= u64::from(u32::MAX))
            .ok_or_else(|| {
                CoreError::validation(
                    "segments",
                    format!("{segments} segments exceed the 32-bit index range"),
                )
            })?;

        let radii = self.radii.as_vec3();
        let n = segments as f32;
        let mut vertices = Vec::with_capacity((row * row) as usize);

        for i in 0..=segments {
            let fi = i as f32;
            // inclination, north to south
            let theta = fi * std::f32::consts::PI / n;
            for j in 0..=segments {
                let fj = j as f32;
                // azimuth
                let phi = fj * std::f32::consts::TAU / n;

                let position = Vec3::new(
                    radii.x * phi.sin() * theta.sin(),
                    radii.y * theta.cos(),
                    radii.z * phi.cos() * theta.sin(),
                );
                let normal = if position == Vec3::ZERO {
                    position
                } else {
                    position.normalize()
                };

                vertices.push(SphereVertex {
                    position: [position.x, position.y, position.z, 0.0],
                    tex_coord: [fj / n, 1.0 - fi / n],
                    normal: normal.to_array(),
                });
            }
        }

        let t = segments + 1;
        let mut indices = Vec::with_capacity(triangle_count as usize);
        for i in 1..=segments {
            for j in 0..segments {
                let top = t * (i - 1) + j;
                let bottom = t * i + j;
                indices.extend_from_slice(&[top, bottom, bottom + 1, top, bottom + 1, top + 1]);
            }
        }

        debug_assert_eq!(indices.len(), triangle_count as usize);

        Ok(SphereMesh {
            vertices,
            indices,
            triangle_count,
        })
    }
}
