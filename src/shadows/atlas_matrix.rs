use glam::{Mat4, Vec2};

/// Depth range convention of the graphics backend the atlas is sampled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthConvention {
    /// Depth grows away from the viewer (OpenGL style).
    #[default]
    Standard,
    /// Depth is 1 at the near plane and 0 at the far plane.
    Reversed,
}

/// Atlas-space transform of one tile, as uploaded for the shading stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtlasSamplingEntry {
    pub matrix: Mat4,
    /// Column and row of the tile in the atlas grid, not a UV offset.
    pub tile_grid: Vec2,
    pub tile_scale: f32,
}

impl AtlasSamplingEntry {
    /// Lower-left corner of the tile in normalized atlas coordinates.
    pub fn uv_offset(&self) -> Vec2 {
        self.tile_grid * self.tile_scale
    }
}

/// Remaps a world-to-clip transform into the UV space of one atlas tile.
///
/// Clip X/Y in [-1, 1] land in `[offset, offset + 1] * scale`, clip Z in [-1, 1] lands
/// in [0, 1]. Rows are combined before the perspective divide, so every row gets the
/// `w` row folded in. On reversed-depth backends the Z row is negated first.
pub fn convert_to_atlas_space(world_to_clip: Mat4, offset: Vec2, scale: f32, depth: DepthConvention) -> Mat4 {
    let r0 = world_to_clip.row(0);
    let r1 = world_to_clip.row(1);
    let mut r2 = world_to_clip.row(2);
    let r3 = world_to_clip.row(3);
    if depth == DepthConvention::Reversed {
        r2 = -r2;
    }
    let x = ((r0 + r3) * 0.5 + r3 * offset.x) * scale;
    let y = ((r1 + r3) * 0.5 + r3 * offset.y) * scale;
    let z = (r2 + r3) * 0.5;
    Mat4::from_cols(x, y, z, r3).transpose()
}

pub fn atlas_sampling_entry(
    projection: Mat4,
    view: Mat4,
    offset: Vec2,
    scale: f32,
    depth: DepthConvention,
) -> AtlasSamplingEntry {
    AtlasSamplingEntry {
        matrix: convert_to_atlas_space(projection * view, offset, scale, depth),
        tile_grid: offset,
        tile_scale: scale,
    }
}

/// Cube-face views come back mirrored relative to the shadow rasterizer; negating the
/// second row (past its first element) flips them upright again.
pub fn flip_cube_face_view(view: Mat4) -> Mat4 {
    let mut flipped = view;
    flipped.y_axis.y = -flipped.y_axis.y;
    flipped.z_axis.y = -flipped.z_axis.y;
    flipped.w_axis.y = -flipped.w_axis.y;
    flipped
}
