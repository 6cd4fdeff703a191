use glam::Vec2;

/// Tiles are laid out on a square grid of at most 4x4.
pub const MAX_ATLAS_SPLIT: u32 = 4;

/// Square grid split of one shadow atlas for the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasLayout {
    /// Tiles per row/column, one of 1, 2 or 4.
    pub split: u32,
    pub tile_size: u32,
    /// Allocated atlas edge in pixels. `1` when nothing casts into this atlas.
    pub atlas_size: u32,
}

/// Pixel rectangle of one tile inside its atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileViewport {
    pub x: u32,
    pub y: u32,
    pub size: u32,
}

pub fn split_for_tiles(tile_count: usize) -> u32 {
    match tile_count {
        0 | 1 => 1,
        2..=4 => 2,
        _ => MAX_ATLAS_SPLIT,
    }
}

/// Plans the grid for `total_slots` tiles in an atlas of `atlas_size` pixels.
///
/// With zero slots the atlas degenerates to a 1x1 texture so the shading stage still
/// has something to bind.
pub fn plan_layout(total_slots: usize, atlas_size: u32) -> AtlasLayout {
    debug_assert!(
        total_slots <= (MAX_ATLAS_SPLIT * MAX_ATLAS_SPLIT) as usize,
        "{total_slots} shadow tiles exceed the 4x4 atlas grid"
    );
    if total_slots == 0 {
        return AtlasLayout { split: 1, tile_size: 1, atlas_size: 1 };
    }
    let split = split_for_tiles(total_slots);
    AtlasLayout { split, tile_size: atlas_size / split, atlas_size }
}

impl AtlasLayout {
    pub fn is_placeholder(&self) -> bool {
        self.atlas_size <= 1
    }

    /// Fraction of the atlas one tile covers along each axis.
    pub fn tile_scale(&self) -> f32 {
        1.0 / self.split as f32
    }

    /// Grid coordinates (column, row) of a tile.
    pub fn tile_offset(&self, index: usize) -> Vec2 {
        let split = self.split as usize;
        Vec2::new((index % split) as f32, (index / split) as f32)
    }

    pub fn viewport(&self, index: usize) -> TileViewport {
        let split = self.split as usize;
        TileViewport {
            x: (index % split) as u32 * self.tile_size,
            y: (index / split) as u32 * self.tile_size,
            size: self.tile_size,
        }
    }
}
