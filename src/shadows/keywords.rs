use crate::config::{CascadeBlendMode, FilterMode, ShadowMaskMode};

pub const DIRECTIONAL_FILTER_KEYWORDS: [&str; 3] = ["_DIRECTIONAL_PCF3", "_DIRECTIONAL_PCF5", "_DIRECTIONAL_PCF7"];
pub const OTHER_FILTER_KEYWORDS: [&str; 3] = ["_OTHER_PCF3", "_OTHER_PCF5", "_OTHER_PCF7"];
pub const CASCADE_BLEND_KEYWORDS: [&str; 2] = ["_CASCADE_BLEND_SOFT", "_CASCADE_BLEND_DITHER"];
pub const SHADOW_MASK_KEYWORDS: [&str; 2] = ["_SHADOW_MASK_ALWAYS", "_SHADOW_MASK_DISTANCE"];

/// A set of mutually exclusive shader keywords with at most one enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordGroup {
    keywords: &'static [&'static str],
    enabled: Option<usize>,
}

impl KeywordGroup {
    pub fn select(keywords: &'static [&'static str], enabled: Option<usize>) -> Self {
        Self { keywords, enabled: enabled.filter(|&index| index < keywords.len()) }
    }

    pub fn enabled(&self) -> Option<&'static str> {
        self.enabled.map(|index| self.keywords[index])
    }

    pub fn disabled(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.keywords.iter().enumerate().filter(|(index, _)| Some(*index) != self.enabled).map(|(_, kw)| *kw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowKeywords {
    pub directional_filter: KeywordGroup,
    pub other_filter: KeywordGroup,
    pub cascade_blend: KeywordGroup,
    pub shadow_mask: KeywordGroup,
}

fn filter_index(filter: FilterMode) -> Option<usize> {
    // 2x2 is the shader's default variant and has no keyword.
    (filter.ordinal() as usize).checked_sub(1)
}

impl ShadowKeywords {
    pub fn new(
        directional_filter: FilterMode,
        other_filter: FilterMode,
        cascade_blend: CascadeBlendMode,
        shadow_mask: Option<ShadowMaskMode>,
    ) -> Self {
        let blend_index = match cascade_blend {
            CascadeBlendMode::Hard => None,
            CascadeBlendMode::Soft => Some(0),
            CascadeBlendMode::Dither => Some(1),
        };
        let mask_index = shadow_mask.map(|mode| match mode {
            ShadowMaskMode::Shadowmask => 0,
            ShadowMaskMode::DistanceShadowmask => 1,
        });
        Self {
            directional_filter: KeywordGroup::select(&DIRECTIONAL_FILTER_KEYWORDS, filter_index(directional_filter)),
            other_filter: KeywordGroup::select(&OTHER_FILTER_KEYWORDS, filter_index(other_filter)),
            cascade_blend: KeywordGroup::select(&CASCADE_BLEND_KEYWORDS, blend_index),
            shadow_mask: KeywordGroup::select(&SHADOW_MASK_KEYWORDS, mask_index),
        }
    }

    fn groups(&self) -> [&KeywordGroup; 4] {
        [&self.directional_filter, &self.other_filter, &self.cascade_blend, &self.shadow_mask]
    }

    pub fn enabled(&self) -> Vec<&'static str> {
        self.groups().into_iter().filter_map(KeywordGroup::enabled).collect()
    }

    pub fn disabled(&self) -> Vec<&'static str> {
        self.groups().into_iter().flat_map(|group| group.disabled()).collect()
    }
}
