//! Frame driver: feeds the visible lights of one camera through shadow admission.

use crate::culling::CullingOracle;
use crate::light::{LightKind, VisibleLight, VisibleLightIndex};
use crate::shadows::{ShadowData, ShadowFrame};

pub const MAX_DIRECTIONAL_LIGHTS: usize = 4;
pub const MAX_OTHER_LIGHTS: usize = 64;

/// Per-light shadow data in the order the shading stage indexes it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LightShadowTable {
    pub directional: Vec<ShadowData>,
    pub directional_lights: Vec<VisibleLightIndex>,
    pub other: Vec<ShadowData>,
    pub other_lights: Vec<VisibleLightIndex>,
    /// Visible light index to other-light slot, `-1` for lights without one.
    pub light_index_map: Vec<i32>,
}

impl LightShadowTable {
    pub fn shadow_for(&self, light: VisibleLightIndex) -> Option<&ShadowData> {
        if let Some(slot) = self.directional_lights.iter().position(|&index| index == light) {
            return self.directional.get(slot);
        }
        let slot = *self.light_index_map.get(light.get())?;
        usize::try_from(slot).ok().and_then(|slot| self.other.get(slot))
    }
}

/// Reserves shadows for `lights` in culling order.
///
/// Lights outside `rendering_layer_mask` are skipped, and lights past the per-kind caps
/// never reach admission.
pub fn reserve_visible_lights<O: CullingOracle + ?Sized>(
    frame: &mut ShadowFrame<'_, O>,
    lights: &[VisibleLight],
    rendering_layer_mask: u32,
) -> LightShadowTable {
    let mut table = LightShadowTable { light_index_map: vec![-1; lights.len()], ..Default::default() };
    for (i, light) in lights.iter().enumerate() {
        if light.rendering_layer_mask & rendering_layer_mask == 0 {
            log::debug!("Light {i} skipped: rendering layer mask {:#x} not visible", light.rendering_layer_mask);
            continue;
        }
        let index = VisibleLightIndex(i);
        match light.kind {
            LightKind::Directional => {
                if table.directional.len() < MAX_DIRECTIONAL_LIGHTS {
                    table.directional.push(frame.reserve_directional(light, index));
                    table.directional_lights.push(index);
                }
            }
            LightKind::Spot | LightKind::Point => {
                if table.other.len() < MAX_OTHER_LIGHTS {
                    table.light_index_map[i] = table.other.len() as i32;
                    table.other.push(frame.reserve_other(light, index));
                    table.other_lights.push(index);
                }
            }
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Camera3D;
    use crate::config::ShadowSettings;
    use crate::culling::{Aabb, SceneCullingOracle, ShadowCaster};
    use crate::shadows::{DepthConvention, ShadowAtlasPlanner};
    use glam::Vec3;

    fn oracle(lights: Vec<VisibleLight>) -> SceneCullingOracle {
        let camera = Camera3D::new(Vec3::new(0.0, 3.0, 12.0), Vec3::ZERO, 60.0_f32.to_radians(), 0.3, 200.0);
        let casters = vec![ShadowCaster::new(Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(2.0)))];
        SceneCullingOracle::new(camera, 50.0, lights, casters)
    }

    #[test]
    fn index_map_tracks_other_slots() {
        let lights = vec![
            VisibleLight::point(Vec3::new(0.0, 3.0, 0.0), 10.0),
            VisibleLight::directional(Vec3::NEG_Y),
            VisibleLight::spot(Vec3::new(1.0, 4.0, 0.0), Vec3::NEG_Y, 10.0, 50.0),
        ];
        let oracle = oracle(lights.clone());
        let mut planner = ShadowAtlasPlanner::new(ShadowSettings::default(), DepthConvention::Standard);
        let mut frame = planner.setup(&oracle).expect("setup");
        let table = reserve_visible_lights(&mut frame, &lights, u32::MAX);
        assert_eq!(table.light_index_map, vec![0, -1, 1]);
        assert_eq!(table.directional.len(), 1);
        assert_eq!(table.other[1].tile_index().map(|tile| tile.0), Some(6));
        assert!(table.shadow_for(VisibleLightIndex(1)).is_some_and(|data| data.has_realtime_shadow()));
    }

    #[test]
    fn layer_mask_filters_lights() {
        let mut hidden = VisibleLight::spot(Vec3::new(0.0, 4.0, 0.0), Vec3::NEG_Y, 10.0, 50.0);
        hidden.rendering_layer_mask = 0b10;
        let lights = vec![hidden, VisibleLight::point(Vec3::new(0.0, 3.0, 0.0), 10.0)];
        let oracle = oracle(lights.clone());
        let mut planner = ShadowAtlasPlanner::new(ShadowSettings::default(), DepthConvention::Standard);
        let mut frame = planner.setup(&oracle).expect("setup");
        let table = reserve_visible_lights(&mut frame, &lights, 0b01);
        assert_eq!(table.light_index_map, vec![-1, 0]);
        assert_eq!(frame.admission().other().tile_count(), 6);
    }

    #[test]
    fn directional_lights_cap_at_four() {
        let lights = vec![VisibleLight::directional(Vec3::NEG_Y); 6];
        let oracle = oracle(lights.clone());
        let mut planner = ShadowAtlasPlanner::new(ShadowSettings::default(), DepthConvention::Standard);
        let mut frame = planner.setup(&oracle).expect("setup");
        let table = reserve_visible_lights(&mut frame, &lights, u32::MAX);
        assert_eq!(table.directional.len(), MAX_DIRECTIONAL_LIGHTS);
        assert!(table.shadow_for(VisibleLightIndex(5)).is_none());
    }
}
