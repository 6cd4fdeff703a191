use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Position of a light in the culling results' visible-light list.
///
/// Admission must be driven in this order; the value is also what the culling
/// oracle is queried with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct VisibleLightIndex(pub usize);

impl VisibleLightIndex {
    pub fn get(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightKind {
    Directional,
    Spot,
    Point,
}

impl LightKind {
    /// Atlas tiles one reservation of this kind occupies in the other-light atlas.
    pub const fn other_tile_count(self) -> usize {
        match self {
            LightKind::Point => 6,
            LightKind::Spot => 1,
            LightKind::Directional => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShadowCasting {
    None,
    #[default]
    Hard,
    Soft,
}

/// How the light was baked, as far as shadow masks are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LightBaking {
    #[default]
    Realtime,
    /// Mixed lighting baked into a shadow mask; `channel` is the occlusion mask channel (0..=3).
    Shadowmask { channel: u8 },
    /// Mixed lighting with any other mixed mode (no mask channel).
    Mixed,
}

impl LightBaking {
    pub fn mask_channel(self) -> Option<u8> {
        match self {
            LightBaking::Shadowmask { channel } => Some(channel),
            LightBaking::Realtime | LightBaking::Mixed => None,
        }
    }
}

/// Per-light inputs the shadow planner needs, as handed over by the culling results.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleLight {
    pub kind: LightKind,
    pub shadows: ShadowCasting,
    pub shadow_strength: f32,
    /// Slope-scale depth bias applied while rasterizing the caster pass.
    pub shadow_bias: f32,
    pub shadow_normal_bias: f32,
    pub shadow_near_plane: f32,
    pub baking: LightBaking,
    pub rendering_layer_mask: u32,
    pub position: Vec3,
    pub direction: Vec3,
    pub range: f32,
    pub spot_angle_degrees: f32,
}

impl VisibleLight {
    pub fn new(kind: LightKind) -> Self {
        Self {
            kind,
            shadows: ShadowCasting::Hard,
            shadow_strength: 1.0,
            shadow_bias: 0.05,
            shadow_normal_bias: 0.4,
            shadow_near_plane: 0.2,
            baking: LightBaking::Realtime,
            rendering_layer_mask: u32::MAX,
            position: Vec3::ZERO,
            direction: Vec3::NEG_Y,
            range: 10.0,
            spot_angle_degrees: 30.0,
        }
    }

    pub fn directional(direction: Vec3) -> Self {
        Self { direction, ..Self::new(LightKind::Directional) }
    }

    pub fn spot(position: Vec3, direction: Vec3, range: f32, spot_angle_degrees: f32) -> Self {
        Self { position, direction, range, spot_angle_degrees, ..Self::new(LightKind::Spot) }
    }

    pub fn point(position: Vec3, range: f32) -> Self {
        Self { position, range, ..Self::new(LightKind::Point) }
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.shadow_strength = strength;
        self
    }

    pub fn with_shadows(mut self, shadows: ShadowCasting) -> Self {
        self.shadows = shadows;
        self
    }

    pub fn with_baking(mut self, baking: LightBaking) -> Self {
        self.baking = baking;
        self
    }

    pub fn casts_shadows(&self) -> bool {
        self.shadows != ShadowCasting::None
    }

    /// Shadow-mask channel as the shading stage expects it: the channel index, or `-1`.
    pub fn mask_channel_value(&self) -> f32 {
        self.baking.mask_channel().map_or(-1.0, f32::from)
    }
}
