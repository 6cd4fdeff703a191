use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const MAX_CASCADES: usize = 4;

/// Square shadow atlas resolution. Always a power of two so tile splits divide evenly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum AtlasSize {
    S256,
    S512,
    S1024,
    S2048,
    S4096,
    S8192,
}

impl AtlasSize {
    pub const ALL: [AtlasSize; 6] =
        [AtlasSize::S256, AtlasSize::S512, AtlasSize::S1024, AtlasSize::S2048, AtlasSize::S4096, AtlasSize::S8192];

    pub const fn pixels(self) -> u32 {
        match self {
            AtlasSize::S256 => 256,
            AtlasSize::S512 => 512,
            AtlasSize::S1024 => 1024,
            AtlasSize::S2048 => 2048,
            AtlasSize::S4096 => 4096,
            AtlasSize::S8192 => 8192,
        }
    }

    pub fn from_pixels(pixels: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|size| size.pixels() == pixels)
    }
}

impl TryFrom<u32> for AtlasSize {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_pixels(value)
            .ok_or_else(|| format!("unsupported shadow atlas size {value} (expected 256, 512, ..., 8192)"))
    }
}

impl From<AtlasSize> for u32 {
    fn from(size: AtlasSize) -> Self {
        size.pixels()
    }
}

/// Percentage-closer filter kernel used when sampling an atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    #[default]
    Pcf2x2,
    Pcf3x3,
    Pcf5x5,
    Pcf7x7,
}

impl FilterMode {
    /// Ordinal used by the filter-size math: 2x2 is 0, 7x7 is 3.
    pub const fn ordinal(self) -> u32 {
        match self {
            FilterMode::Pcf2x2 => 0,
            FilterMode::Pcf3x3 => 1,
            FilterMode::Pcf5x5 => 2,
            FilterMode::Pcf7x7 => 3,
        }
    }

    /// Filter footprint in texels, `ordinal + 1`.
    pub fn texel_footprint(self) -> f32 {
        self.ordinal() as f32 + 1.0
    }

    pub fn label(self) -> &'static str {
        match self {
            FilterMode::Pcf2x2 => "PCF 2x2",
            FilterMode::Pcf3x3 => "PCF 3x3",
            FilterMode::Pcf5x5 => "PCF 5x5",
            FilterMode::Pcf7x7 => "PCF 7x7",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CascadeBlendMode {
    #[default]
    Hard,
    Soft,
    Dither,
}

/// Host quality setting deciding how baked shadow masks combine with realtime shadows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShadowMaskMode {
    Shadowmask,
    #[default]
    DistanceShadowmask,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectionalShadowSettings {
    #[serde(default = "DirectionalShadowSettings::default_atlas_size")]
    pub atlas_size: AtlasSize,
    #[serde(default)]
    pub filter: FilterMode,
    #[serde(default)]
    pub cascade_blend: CascadeBlendMode,
    #[serde(default = "DirectionalShadowSettings::default_cascade_count")]
    pub cascade_count: u32,
    #[serde(default = "DirectionalShadowSettings::default_cascade_fade")]
    pub cascade_fade: f32,
    #[serde(default = "DirectionalShadowSettings::default_cascade_ratios")]
    pub cascade_ratios: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtherShadowSettings {
    #[serde(default = "OtherShadowSettings::default_atlas_size")]
    pub atlas_size: AtlasSize,
    #[serde(default)]
    pub filter: FilterMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowSettings {
    #[serde(default = "ShadowSettings::default_max_distance")]
    pub max_distance: f32,
    #[serde(default = "ShadowSettings::default_distance_fade")]
    pub distance_fade: f32,
    #[serde(default)]
    pub directional: DirectionalShadowSettings,
    #[serde(default)]
    pub other: OtherShadowSettings,
    #[serde(default)]
    pub shadow_mask_mode: ShadowMaskMode,
}

#[derive(Debug, Clone, Default)]
pub struct ShadowSettingsOverrides {
    pub max_distance: Option<f32>,
    pub cascade_count: Option<u32>,
    pub directional_atlas: Option<AtlasSize>,
    pub other_atlas: Option<AtlasSize>,
}

impl DirectionalShadowSettings {
    const fn default_atlas_size() -> AtlasSize {
        AtlasSize::S1024
    }

    const fn default_cascade_count() -> u32 {
        4
    }

    const fn default_cascade_fade() -> f32 {
        0.1
    }

    const fn default_cascade_ratios() -> [f32; 3] {
        [0.1, 0.25, 0.5]
    }

    /// Cascade count clamped to the supported `1..=MAX_CASCADES` range.
    pub fn clamped_cascade_count(&self) -> usize {
        (self.cascade_count as usize).clamp(1, MAX_CASCADES)
    }
}

impl Default for DirectionalShadowSettings {
    fn default() -> Self {
        Self {
            atlas_size: Self::default_atlas_size(),
            filter: FilterMode::default(),
            cascade_blend: CascadeBlendMode::default(),
            cascade_count: Self::default_cascade_count(),
            cascade_fade: Self::default_cascade_fade(),
            cascade_ratios: Self::default_cascade_ratios(),
        }
    }
}

impl OtherShadowSettings {
    const fn default_atlas_size() -> AtlasSize {
        AtlasSize::S1024
    }
}

impl Default for OtherShadowSettings {
    fn default() -> Self {
        Self { atlas_size: Self::default_atlas_size(), filter: FilterMode::default() }
    }
}

impl ShadowSettings {
    const fn default_max_distance() -> f32 {
        100.0
    }

    const fn default_distance_fade() -> f32 {
        0.1
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read shadow settings {}", path.display()))?;
        let settings: ShadowSettings = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse shadow settings {}", path.display()))?;
        settings.validate().with_context(|| format!("Invalid shadow settings {}", path.display()))?;
        Ok(settings)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(err) => {
                log::warn!("Shadow settings load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_distance.is_nan() || self.max_distance <= 0.0 {
            bail!("max_distance must be positive, got {}", self.max_distance);
        }
        if !(0.001..=1.0).contains(&self.distance_fade) {
            bail!("distance_fade must be within [0.001, 1], got {}", self.distance_fade);
        }
        let dir = &self.directional;
        if !(1..=MAX_CASCADES as u32).contains(&dir.cascade_count) {
            bail!("cascade_count must be within 1..={MAX_CASCADES}, got {}", dir.cascade_count);
        }
        if !(0.001..=1.0).contains(&dir.cascade_fade) {
            bail!("cascade_fade must be within [0.001, 1], got {}", dir.cascade_fade);
        }
        if dir.cascade_ratios.iter().any(|ratio| !(0.0..=1.0).contains(ratio)) {
            bail!("cascade_ratios must be within [0, 1], got {:?}", dir.cascade_ratios);
        }
        if dir.cascade_ratios.windows(2).any(|pair| pair[1] < pair[0]) {
            bail!("cascade_ratios must be non-decreasing, got {:?}", dir.cascade_ratios);
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &ShadowSettingsOverrides) {
        if let Some(max_distance) = overrides.max_distance {
            self.max_distance = max_distance;
        }
        if let Some(cascade_count) = overrides.cascade_count {
            self.directional.cascade_count = cascade_count;
        }
        if let Some(size) = overrides.directional_atlas {
            self.directional.atlas_size = size;
        }
        if let Some(size) = overrides.other_atlas {
            self.other.atlas_size = size;
        }
    }
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            max_distance: Self::default_max_distance(),
            distance_fade: Self::default_distance_fade(),
            directional: DirectionalShadowSettings::default(),
            other: OtherShadowSettings::default(),
            shadow_mask_mode: ShadowMaskMode::default(),
        }
    }
}

impl ShadowSettingsOverrides {
    pub fn is_empty(&self) -> bool {
        self.max_distance.is_none()
            && self.cascade_count.is_none()
            && self.directional_atlas.is_none()
            && self.other_atlas.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.max_distance.is_some() {
            fields.push("max_distance");
        }
        if self.cascade_count.is_some() {
            fields.push("cascade_count");
        }
        if self.directional_atlas.is_some() {
            fields.push("directional_atlas");
        }
        if self.other_atlas.is_some() {
            fields.push("other_atlas");
        }
        fields
    }
}
