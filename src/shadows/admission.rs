//! Per-frame shadow admission: who gets atlas space, and what the shading stage is told.

use glam::Vec4;
use smallvec::SmallVec;

use crate::culling::CullingOracle;
use crate::light::{LightKind, VisibleLight, VisibleLightIndex};

pub const MAX_SHADOWED_DIRECTIONAL_LIGHTS: usize = 4;
pub const MAX_SHADOWED_OTHER_TILES: usize = 16;
pub const POINT_LIGHT_FACES: usize = 6;

/// Base index of a directional light's cascades in the flattened cascade arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct CascadeOffset(pub u32);

/// First tile of an other-light reservation in the other atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TileIndex(pub u32);

impl CascadeOffset {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl TileIndex {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalShadowCaster {
    pub visible_light: VisibleLightIndex,
    pub slope_scale_bias: f32,
    pub near_plane_offset: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OtherShadowCaster {
    pub visible_light: VisibleLightIndex,
    pub slope_scale_bias: f32,
    pub normal_bias: f32,
    pub is_point: bool,
    pub first_tile: TileIndex,
}

impl OtherShadowCaster {
    pub fn tile_count(&self) -> usize {
        if self.is_point {
            POINT_LIGHT_FACES
        } else {
            1
        }
    }
}

/// Where a light's realtime shadow lives, if anywhere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShadowSlot {
    Unassigned,
    Cascades { offset: CascadeOffset, normal_bias: f32 },
    Tile { index: TileIndex, is_point: bool },
}

/// Per-light shadow data handed to the shading stage.
///
/// Packs as `(strength, slot, extra, maskChannel)`. A negative strength means "no
/// realtime shadow, use the baked shadow mask"; a mask channel of `-1` means the light
/// has none.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowData {
    pub strength: f32,
    pub slot: ShadowSlot,
    pub mask_channel: f32,
}

impl ShadowData {
    /// The light carries no shadow information at all.
    ///
    /// Used when shadows are switched off for the light. Unlike [`ShadowData::baked_only`]
    /// the light's mask channel is dropped and reported as `-1`, so the shading stage
    /// samples neither the atlas nor the baked shadow mask.
    pub const NONE: ShadowData = ShadowData { strength: 0.0, slot: ShadowSlot::Unassigned, mask_channel: -1.0 };

    /// Realtime shadow rejected; the shading stage falls back to the baked mask.
    pub fn baked_only(strength: f32, mask_channel: f32) -> Self {
        Self { strength: -strength.abs(), slot: ShadowSlot::Unassigned, mask_channel }
    }

    pub fn cascades(strength: f32, offset: CascadeOffset, normal_bias: f32, mask_channel: f32) -> Self {
        Self { strength, slot: ShadowSlot::Cascades { offset, normal_bias }, mask_channel }
    }

    pub fn tile(strength: f32, index: TileIndex, is_point: bool, mask_channel: f32) -> Self {
        Self { strength, slot: ShadowSlot::Tile { index, is_point }, mask_channel }
    }

    pub fn has_realtime_shadow(&self) -> bool {
        !matches!(self.slot, ShadowSlot::Unassigned)
    }

    pub fn cascade_offset(&self) -> Option<CascadeOffset> {
        match self.slot {
            ShadowSlot::Cascades { offset, .. } => Some(offset),
            _ => None,
        }
    }

    pub fn tile_index(&self) -> Option<TileIndex> {
        match self.slot {
            ShadowSlot::Tile { index, .. } => Some(index),
            _ => None,
        }
    }

    pub fn to_vec4(&self) -> Vec4 {
        match self.slot {
            ShadowSlot::Unassigned => Vec4::new(self.strength, 0.0, 0.0, self.mask_channel),
            ShadowSlot::Cascades { offset, normal_bias } => {
                Vec4::new(self.strength, offset.0 as f32, normal_bias, self.mask_channel)
            }
            ShadowSlot::Tile { index, is_point } => {
                Vec4::new(self.strength, index.0 as f32, if is_point { 1.0 } else { 0.0 }, self.mask_channel)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DirectionalShadowRegistry {
    casters: SmallVec<[DirectionalShadowCaster; MAX_SHADOWED_DIRECTIONAL_LIGHTS]>,
}

impl DirectionalShadowRegistry {
    pub fn clear(&mut self) {
        self.casters.clear();
    }

    pub fn len(&self) -> usize {
        self.casters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.casters.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.casters.len() >= MAX_SHADOWED_DIRECTIONAL_LIGHTS
    }

    pub fn casters(&self) -> &[DirectionalShadowCaster] {
        &self.casters
    }

    /// Returns the slot index the caster was stored at, or `None` when full.
    fn try_push(&mut self, caster: DirectionalShadowCaster) -> Option<usize> {
        if self.is_full() {
            return None;
        }
        self.casters.push(caster);
        Some(self.casters.len() - 1)
    }
}

#[derive(Debug, Clone, Default)]
pub struct OtherShadowRegistry {
    casters: SmallVec<[OtherShadowCaster; MAX_SHADOWED_OTHER_TILES]>,
    tiles_used: usize,
}

impl OtherShadowRegistry {
    pub fn clear(&mut self) {
        self.casters.clear();
        self.tiles_used = 0;
    }

    pub fn tile_count(&self) -> usize {
        self.tiles_used
    }

    pub fn remaining_tiles(&self) -> usize {
        MAX_SHADOWED_OTHER_TILES - self.tiles_used
    }

    pub fn casters(&self) -> &[OtherShadowCaster] {
        &self.casters
    }

    pub fn has_room(&self, tiles: usize) -> bool {
        tiles <= self.remaining_tiles()
    }

    /// All-or-nothing: a point light takes six contiguous tiles or none.
    fn try_push(
        &mut self,
        visible_light: VisibleLightIndex,
        slope_scale_bias: f32,
        normal_bias: f32,
        is_point: bool,
    ) -> Option<TileIndex> {
        let tiles = if is_point { POINT_LIGHT_FACES } else { 1 };
        if !self.has_room(tiles) {
            return None;
        }
        let first_tile = TileIndex(self.tiles_used as u32);
        let caster = OtherShadowCaster { visible_light, slope_scale_bias, normal_bias, is_point, first_tile };
        self.tiles_used += caster.tile_count();
        self.casters.push(caster);
        debug_assert!(self.tiles_used <= MAX_SHADOWED_OTHER_TILES);
        Some(first_tile)
    }
}

/// Registries plus the frame's shadow-mask flag. Reset at setup.
#[derive(Debug, Clone, Default)]
pub struct ShadowAdmission {
    pub(crate) directional: DirectionalShadowRegistry,
    pub(crate) other: OtherShadowRegistry,
    pub(crate) uses_shadow_mask: bool,
}

impl ShadowAdmission {
    pub fn reset(&mut self) {
        self.directional.clear();
        self.other.clear();
        self.uses_shadow_mask = false;
    }

    pub fn directional(&self) -> &DirectionalShadowRegistry {
        &self.directional
    }

    pub fn other(&self) -> &OtherShadowRegistry {
        &self.other
    }

    pub fn uses_shadow_mask(&self) -> bool {
        self.uses_shadow_mask
    }

    fn note_shadow_mask(&mut self, light: &VisibleLight) {
        if light.baking.mask_channel().is_some() {
            self.uses_shadow_mask = true;
        }
    }

    pub fn reserve_directional<O: CullingOracle + ?Sized>(
        &mut self,
        oracle: &O,
        light: &VisibleLight,
        index: VisibleLightIndex,
        cascade_count: usize,
    ) -> ShadowData {
        if light.kind != LightKind::Directional {
            log::warn!("Light {} ({:?}) passed to directional shadow admission", index.get(), light.kind);
            return ShadowData::NONE;
        }
        if !light.casts_shadows() {
            return ShadowData::NONE;
        }
        let mask = light.mask_channel_value();
        self.note_shadow_mask(light);
        if light.shadow_strength <= 0.0 {
            return ShadowData::baked_only(light.shadow_strength, mask);
        }
        if self.directional.is_full() {
            log::debug!(
                "Directional light {} rejected: {} shadowed directional lights already reserved",
                index.get(),
                MAX_SHADOWED_DIRECTIONAL_LIGHTS
            );
            return ShadowData::baked_only(light.shadow_strength, mask);
        }
        if oracle.shadow_caster_bounds(index).is_none() {
            log::debug!("Directional light {} has no shadow casters in range", index.get());
            return ShadowData::baked_only(light.shadow_strength, mask);
        }
        let caster = DirectionalShadowCaster {
            visible_light: index,
            slope_scale_bias: light.shadow_bias,
            near_plane_offset: light.shadow_near_plane,
        };
        match self.directional.try_push(caster) {
            Some(slot) => ShadowData::cascades(
                light.shadow_strength,
                CascadeOffset((cascade_count * slot) as u32),
                light.shadow_normal_bias,
                mask,
            ),
            None => ShadowData::baked_only(light.shadow_strength, mask),
        }
    }

    pub fn reserve_other<O: CullingOracle + ?Sized>(
        &mut self,
        oracle: &O,
        light: &VisibleLight,
        index: VisibleLightIndex,
    ) -> ShadowData {
        if light.kind == LightKind::Directional {
            log::warn!("Directional light {} passed to other-light shadow admission", index.get());
            return ShadowData::NONE;
        }
        if !light.casts_shadows() {
            return ShadowData::NONE;
        }
        let mask = light.mask_channel_value();
        self.note_shadow_mask(light);
        if light.shadow_strength <= 0.0 {
            return ShadowData::baked_only(light.shadow_strength, mask);
        }
        let is_point = light.kind == LightKind::Point;
        if !self.other.has_room(light.kind.other_tile_count()) {
            log::debug!(
                "{:?} light {} rejected: {} of {} other shadow tiles left",
                light.kind,
                index.get(),
                self.other.remaining_tiles(),
                MAX_SHADOWED_OTHER_TILES
            );
            return ShadowData::baked_only(light.shadow_strength, mask);
        }
        if oracle.shadow_caster_bounds(index).is_none() {
            log::debug!("{:?} light {} has no shadow casters in range", light.kind, index.get());
            return ShadowData::baked_only(light.shadow_strength, mask);
        }
        match self.other.try_push(index, light.shadow_bias, light.shadow_normal_bias, is_point) {
            Some(tile) => ShadowData::tile(light.shadow_strength, tile, is_point, mask),
            None => ShadowData::baked_only(light.shadow_strength, mask),
        }
    }
}
