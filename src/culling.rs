//! Contract with the upstream visibility system.
//!
//! The planner never decides what a light can see. It asks a [`CullingOracle`]
//! whether a light has any shadow casters and, for every tile it renders, which
//! view/projection pair and culling primitive to use.

pub mod scene_oracle;

pub use scene_oracle::{SceneCullingOracle, ShadowCaster};

use glam::{Mat4, Vec3, Vec4};

use crate::light::VisibleLightIndex;

/// Axis-aligned box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min: min.min(max), max: min.max(max) }
    }

    pub fn from_center_half_extents(center: Vec3, half: Vec3) -> Self {
        Self::new(center - half, center + half)
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb { min: self.min.min(other.min), max: self.max.max(other.max) }
    }

    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        let closest = center.clamp(self.min, self.max);
        closest.distance_squared(center) <= radius * radius
    }
}

/// Culling primitive attached to one shadow tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSplitData {
    /// `xyz` centre, `w` radius.
    pub culling_sphere: Vec4,
    /// Fraction of the cascade overlap used when culling casters already covered by the
    /// previous cascade. Only meaningful for directional cascades.
    pub cascade_blend_culling_factor: f32,
}

impl Default for ShadowSplitData {
    fn default() -> Self {
        Self { culling_sphere: Vec4::ZERO, cascade_blend_culling_factor: 0.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowMatrices {
    pub view: Mat4,
    pub projection: Mat4,
    pub split: ShadowSplitData,
}

/// Parameters for one directional cascade query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CascadeRequest {
    pub cascade_index: usize,
    pub cascade_count: usize,
    pub ratios: Vec3,
    pub tile_size: u32,
    pub near_plane_offset: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubemapFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubemapFace {
    pub const ALL: [CubemapFace; 6] = [
        CubemapFace::PositiveX,
        CubemapFace::NegativeX,
        CubemapFace::PositiveY,
        CubemapFace::NegativeY,
        CubemapFace::PositiveZ,
        CubemapFace::NegativeZ,
    ];

    /// Looking direction and up vector of the face, in the usual cubemap convention.
    pub fn basis(self) -> (Vec3, Vec3) {
        match self {
            CubemapFace::PositiveX => (Vec3::X, Vec3::NEG_Y),
            CubemapFace::NegativeX => (Vec3::NEG_X, Vec3::NEG_Y),
            CubemapFace::PositiveY => (Vec3::Y, Vec3::Z),
            CubemapFace::NegativeY => (Vec3::NEG_Y, Vec3::NEG_Z),
            CubemapFace::PositiveZ => (Vec3::Z, Vec3::NEG_Y),
            CubemapFace::NegativeZ => (Vec3::NEG_Z, Vec3::NEG_Y),
        }
    }
}

/// Upstream visibility oracle.
///
/// Matrix queries are only issued for lights whose caster bounds were reported
/// non-empty during admission, so they are infallible.
pub trait CullingOracle {
    fn shadow_caster_bounds(&self, light: VisibleLightIndex) -> Option<Aabb>;

    fn directional_shadow_matrices(&self, light: VisibleLightIndex, request: &CascadeRequest) -> ShadowMatrices;

    fn spot_shadow_matrices(&self, light: VisibleLightIndex) -> ShadowMatrices;

    fn point_shadow_matrices(
        &self,
        light: VisibleLightIndex,
        face: CubemapFace,
        fov_bias_degrees: f32,
    ) -> ShadowMatrices;
}
