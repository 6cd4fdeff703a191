//! Shader-side lookup data derived alongside the atlas matrices.

use glam::{Vec2, Vec4};
use std::f32::consts::SQRT_2;

use crate::config::FilterMode;

/// Culling sphere and filter data of one directional cascade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeMetadata {
    /// `xyz` centre, `w` squared radius after shrinking by the filter size.
    pub culling_sphere: Vec4,
    /// `x` inverse squared radius, `y` filter size scaled by sqrt(2).
    pub data: Vec4,
}

/// Shrinks the cascade's culling sphere by the filter footprint so the PCF kernel never
/// reaches past the cascade's tile.
pub fn cascade_metadata(culling_sphere: Vec4, tile_size: u32, filter: FilterMode) -> CascadeMetadata {
    let texel_size = 2.0 * culling_sphere.w / tile_size as f32;
    let filter_size = texel_size * filter.texel_footprint();
    let radius = culling_sphere.w - filter_size;
    let radius_sq = radius * radius;
    CascadeMetadata {
        culling_sphere: culling_sphere.truncate().extend(radius_sq),
        data: Vec4::new(1.0 / radius_sq, filter_size * SQRT_2, 0.0, 0.0),
    }
}

/// Culling factor for the cascade blend region.
pub fn cascade_blend_culling_factor(cascade_fade: f32) -> f32 {
    (0.8 - cascade_fade).max(0.0)
}

/// Packs a tile's sampling bounds, shrunk by half a texel on each side, with the light's
/// normal bias.
pub fn other_tile_data(offset: Vec2, scale: f32, normal_bias: f32, atlas_texel_size: f32) -> Vec4 {
    let border = atlas_texel_size * 0.5;
    Vec4::new(offset.x * scale + border, offset.y * scale + border, scale - border - border, normal_bias)
}

/// Filter-derived biases for a point light's cube faces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointFilterBias {
    pub filter_size: f32,
    pub normal_bias: f32,
    /// Degrees added to each face's 90 degree field of view.
    pub fov_bias_degrees: f32,
}

pub fn point_filter_bias(tile_size: u32, filter: FilterMode, normal_bias_scale: f32) -> PointFilterBias {
    let texel_size = 2.0 / tile_size as f32;
    let filter_size = texel_size * filter.texel_footprint();
    let normal_bias = normal_bias_scale * filter_size * SQRT_2;
    let fov_bias_degrees = (1.0 + normal_bias + filter_size).atan().to_degrees() * 2.0 - 90.0;
    PointFilterBias { filter_size, normal_bias, fov_bias_degrees }
}

/// Normal bias of a spot light tile; `projection_m00` is the horizontal focal scale.
pub fn spot_normal_bias(tile_size: u32, projection_m00: f32, filter: FilterMode, normal_bias_scale: f32) -> f32 {
    let texel_size = 2.0 / (tile_size as f32 * projection_m00);
    let filter_size = texel_size * filter.texel_footprint();
    normal_bias_scale * filter_size * SQRT_2
}

/// `(1/maxDistance, 1/distanceFade, 1/(1 - (1 - cascadeFade)^2), 0)`.
pub fn distance_fade(max_distance: f32, distance_fade: f32, cascade_fade: f32) -> Vec4 {
    let f = 1.0 - cascade_fade;
    Vec4::new(1.0 / max_distance, 1.0 / distance_fade, 1.0 / (1.0 - f * f), 0.0)
}
