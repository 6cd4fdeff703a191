use glam::{Mat4, Vec4};

use super::admission::{MAX_SHADOWED_DIRECTIONAL_LIGHTS, MAX_SHADOWED_OTHER_TILES};
use crate::config::MAX_CASCADES;

pub const MAX_DIRECTIONAL_CASCADE_TILES: usize = MAX_SHADOWED_DIRECTIONAL_LIGHTS * MAX_CASCADES;

/// Flat per-frame arrays consumed by the shading stage.
///
/// Reset by every `render()` and fully written before anything samples them; entries past
/// the reserved tiles keep their reset values.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowUniforms {
    pub directional_matrices: [Mat4; MAX_DIRECTIONAL_CASCADE_TILES],
    pub other_matrices: [Mat4; MAX_SHADOWED_OTHER_TILES],
    pub other_tiles: [Vec4; MAX_SHADOWED_OTHER_TILES],
    pub cascade_culling_spheres: [Vec4; MAX_CASCADES],
    pub cascade_data: [Vec4; MAX_CASCADES],
    /// Zero when no directional light casts shadows this frame.
    pub cascade_count: u32,
    pub distance_fade: Vec4,
    /// `(directionalSize, 1/directionalSize, otherSize, 1/otherSize)`.
    pub atlas_sizes: Vec4,
}

impl Default for ShadowUniforms {
    fn default() -> Self {
        Self {
            directional_matrices: [Mat4::IDENTITY; MAX_DIRECTIONAL_CASCADE_TILES],
            other_matrices: [Mat4::IDENTITY; MAX_SHADOWED_OTHER_TILES],
            other_tiles: [Vec4::ZERO; MAX_SHADOWED_OTHER_TILES],
            cascade_culling_spheres: [Vec4::ZERO; MAX_CASCADES],
            cascade_data: [Vec4::ZERO; MAX_CASCADES],
            cascade_count: 0,
            distance_fade: Vec4::ZERO,
            atlas_sizes: Vec4::ZERO,
        }
    }
}

impl ShadowUniforms {
    pub fn to_gpu(&self) -> ShadowUniformBlock {
        let mut block: ShadowUniformBlock = bytemuck::Zeroable::zeroed();
        for (dst, src) in block.directional_matrices.iter_mut().zip(self.directional_matrices.iter()) {
            *dst = src.to_cols_array_2d();
        }
        for (dst, src) in block.other_matrices.iter_mut().zip(self.other_matrices.iter()) {
            *dst = src.to_cols_array_2d();
        }
        for (dst, src) in block.other_tiles.iter_mut().zip(self.other_tiles.iter()) {
            *dst = src.to_array();
        }
        for (dst, src) in block.cascade_culling_spheres.iter_mut().zip(self.cascade_culling_spheres.iter()) {
            *dst = src.to_array();
        }
        for (dst, src) in block.cascade_data.iter_mut().zip(self.cascade_data.iter()) {
            *dst = src.to_array();
        }
        block.distance_fade = self.distance_fade.to_array();
        block.atlas_sizes = self.atlas_sizes.to_array();
        block.params = [self.cascade_count, 0, 0, 0];
        block
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadowUniformBlock {
    pub directional_matrices: [[[f32; 4]; 4]; MAX_DIRECTIONAL_CASCADE_TILES],
    pub other_matrices: [[[f32; 4]; 4]; MAX_SHADOWED_OTHER_TILES],
    pub other_tiles: [[f32; 4]; MAX_SHADOWED_OTHER_TILES],
    pub cascade_culling_spheres: [[f32; 4]; MAX_CASCADES],
    pub cascade_data: [[f32; 4]; MAX_CASCADES],
    pub distance_fade: [f32; 4],
    pub atlas_sizes: [f32; 4],
    /// `x` cascade count, rest reserved.
    pub params: [u32; 4],
}

impl ShadowUniformBlock {
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_is_tightly_packed_vec4s() {
        let size = std::mem::size_of::<ShadowUniformBlock>();
        assert_eq!(size % 16, 0);
        assert_eq!(size, (16 * 4 + 16 * 4 + 16 + 4 + 4 + 1 + 1 + 1) * 16);
    }

    #[test]
    fn packing_preserves_column_major_layout() {
        let mut uniforms = ShadowUniforms::default();
        uniforms.directional_matrices[1] = Mat4::from_cols_array(&[
            1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0,
        ]);
        uniforms.cascade_count = 3;
        uniforms.atlas_sizes = Vec4::new(2048.0, 1.0 / 2048.0, 1.0, 1.0);
        let block = uniforms.to_gpu();
        assert_eq!(block.directional_matrices[1][0], [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(block.directional_matrices[1][3], [13.0, 14.0, 15.0, 16.0]);
        assert_eq!(block.directional_matrices[0][0], [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(block.params, [3, 0, 0, 0]);
        assert_eq!(block.atlas_sizes[0], 2048.0);
        let bytes = block.as_bytes();
        let floats: &[f32] = bytemuck::cast_slice(&bytes[64..128]);
        assert_eq!(floats[0], 1.0);
        assert_eq!(floats[15], 16.0);
    }
}
