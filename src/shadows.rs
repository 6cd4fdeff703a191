//! Shadow atlas planning.
//!
//! A frame runs `setup` → `reserve_*` (once per visible light, in culling order) →
//! `render` → `cleanup`. Admission fills two bounded registries, `render` sizes the
//! atlas grids from the final tile counts and walks the reserved lights to produce
//! caster passes and the uniform arrays the shading stage samples with.

pub mod admission;
pub mod atlas_matrix;
pub mod keywords;
pub mod layout;
pub mod metadata;
pub mod uniforms;

use anyhow::{bail, Context, Result};
use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::config::ShadowSettings;
use crate::culling::{CascadeRequest, CubemapFace, CullingOracle, ShadowSplitData};
use crate::light::{VisibleLight, VisibleLightIndex};

pub use admission::{
    CascadeOffset, DirectionalShadowCaster, OtherShadowCaster, ShadowAdmission, ShadowData, ShadowSlot, TileIndex,
    MAX_SHADOWED_DIRECTIONAL_LIGHTS, MAX_SHADOWED_OTHER_TILES, POINT_LIGHT_FACES,
};
pub use atlas_matrix::{convert_to_atlas_space, AtlasSamplingEntry, DepthConvention};
pub use keywords::ShadowKeywords;
pub use layout::{plan_layout, AtlasLayout, TileViewport};
pub use uniforms::{ShadowUniformBlock, ShadowUniforms};

use atlas_matrix::{atlas_sampling_entry, flip_cube_face_view};
use metadata::{
    cascade_blend_culling_factor, cascade_metadata, distance_fade, other_tile_data, point_filter_bias,
    spot_normal_bias,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtlasKind {
    Directional,
    Other,
}

/// Square depth texture the host allocates for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasAllocation {
    pub kind: AtlasKind,
    pub size: u32,
}

impl AtlasAllocation {
    pub fn is_placeholder(&self) -> bool {
        self.size <= 1
    }
}

/// Texture bound as the other-light atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtherAtlasBinding {
    Allocated(AtlasAllocation),
    /// No spot or point shadows this frame; the directional atlas is bound in its place.
    AliasDirectional,
}

impl OtherAtlasBinding {
    pub fn allocation(&self) -> Option<AtlasAllocation> {
        match self {
            OtherAtlasBinding::Allocated(allocation) => Some(*allocation),
            OtherAtlasBinding::AliasDirectional => None,
        }
    }
}

/// One depth-only draw into one atlas tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowCasterPass {
    pub atlas: AtlasKind,
    pub visible_light: VisibleLightIndex,
    pub viewport: TileViewport,
    pub view: Mat4,
    pub projection: Mat4,
    pub split: ShadowSplitData,
    pub slope_scale_bias: f32,
    /// Clamp casters behind the near plane onto it. Orthographic cascades only.
    pub pancaking: bool,
    pub sampling: AtlasSamplingEntry,
}

#[derive(Debug, Clone)]
pub struct ShadowRenderOutput {
    pub directional_atlas: AtlasAllocation,
    pub other_atlas: OtherAtlasBinding,
    pub directional_layout: AtlasLayout,
    pub other_layout: AtlasLayout,
    pub passes: Vec<ShadowCasterPass>,
    pub uniforms: ShadowUniforms,
    pub keywords: ShadowKeywords,
    pub uses_shadow_mask: bool,
}

impl ShadowRenderOutput {
    pub fn passes_for(&self, atlas: AtlasKind) -> impl Iterator<Item = &ShadowCasterPass> + '_ {
        self.passes.iter().filter(move |pass| pass.atlas == atlas)
    }

    pub fn other_atlas_size(&self) -> u32 {
        self.other_atlas.allocation().map_or(self.directional_atlas.size, |allocation| allocation.size)
    }
}

/// Atlases the host must release at the end of the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtlasRelease {
    pub directional: AtlasAllocation,
    /// `None` when the other binding aliased the directional atlas.
    pub other: Option<AtlasAllocation>,
}

pub struct ShadowAtlasPlanner {
    settings: ShadowSettings,
    depth: DepthConvention,
    admission: ShadowAdmission,
    held: Option<AtlasRelease>,
}

impl ShadowAtlasPlanner {
    pub fn new(settings: ShadowSettings, depth: DepthConvention) -> Self {
        Self { settings, depth, admission: ShadowAdmission::default(), held: None }
    }

    pub fn settings(&self) -> &ShadowSettings {
        &self.settings
    }

    /// Takes effect at the next `setup`.
    pub fn set_settings(&mut self, settings: ShadowSettings) {
        self.settings = settings;
    }

    pub fn depth_convention(&self) -> DepthConvention {
        self.depth
    }

    pub fn held_atlases(&self) -> Option<AtlasRelease> {
        self.held
    }

    /// Starts a frame against `oracle`, clearing all per-frame state.
    pub fn setup<'a, O: CullingOracle + ?Sized>(&'a mut self, oracle: &'a O) -> Result<ShadowFrame<'a, O>> {
        if let Some(held) = self.held {
            log::warn!("Shadow setup called while atlases are still held: {held:?}");
            bail!("Shadow atlases from the previous frame were not released; call cleanup() first");
        }
        self.admission.reset();
        Ok(ShadowFrame { planner: self, oracle })
    }

    pub fn cleanup(&mut self) -> Result<AtlasRelease> {
        let release = self.held.take().context("No shadow atlases to release; render() was not called")?;
        log::debug!(
            "Releasing shadow atlases: directional {}px, other {}",
            release.directional.size,
            release.other.map_or_else(|| "aliased".to_string(), |other| format!("{}px", other.size))
        );
        Ok(release)
    }
}

/// One frame of shadow planning. Only [`ShadowAtlasPlanner::setup`] creates it and
/// [`ShadowFrame::render`] consumes it.
pub struct ShadowFrame<'a, O: CullingOracle + ?Sized> {
    planner: &'a mut ShadowAtlasPlanner,
    oracle: &'a O,
}

impl<'a, O: CullingOracle + ?Sized> ShadowFrame<'a, O> {
    pub fn settings(&self) -> &ShadowSettings {
        &self.planner.settings
    }

    pub fn admission(&self) -> &ShadowAdmission {
        &self.planner.admission
    }

    pub fn oracle(&self) -> &O {
        self.oracle
    }

    pub fn reserve_directional(&mut self, light: &VisibleLight, index: VisibleLightIndex) -> ShadowData {
        let cascade_count = self.planner.settings.directional.clamped_cascade_count();
        self.planner.admission.reserve_directional(self.oracle, light, index, cascade_count)
    }

    pub fn reserve_other(&mut self, light: &VisibleLight, index: VisibleLightIndex) -> ShadowData {
        self.planner.admission.reserve_other(self.oracle, light, index)
    }

    pub fn render(self) -> ShadowRenderOutput {
        let ShadowFrame { planner, oracle } = self;
        let settings = &planner.settings;
        let admission = &planner.admission;
        let mut uniforms = ShadowUniforms::default();
        let mut passes = Vec::new();

        let cascade_count = settings.directional.clamped_cascade_count();
        let directional = admission.directional().casters();
        let directional_layout =
            plan_layout(directional.len() * cascade_count, settings.directional.atlas_size.pixels());
        render_directional(
            oracle,
            settings,
            planner.depth,
            directional,
            directional_layout,
            &mut uniforms,
            &mut passes,
        );
        uniforms.cascade_count = if directional.is_empty() { 0 } else { cascade_count as u32 };
        uniforms.distance_fade = distance_fade(
            settings.max_distance,
            settings.distance_fade,
            settings.directional.cascade_fade,
        );

        let other = admission.other();
        let other_layout = plan_layout(other.tile_count(), settings.other.atlas_size.pixels());
        if other.tile_count() > 0 {
            render_other(oracle, settings, planner.depth, other.casters(), other_layout, &mut uniforms, &mut passes);
        }

        let directional_atlas = AtlasAllocation { kind: AtlasKind::Directional, size: directional_layout.atlas_size };
        let other_atlas = if other.tile_count() > 0 {
            OtherAtlasBinding::Allocated(AtlasAllocation { kind: AtlasKind::Other, size: other_layout.atlas_size })
        } else {
            OtherAtlasBinding::AliasDirectional
        };
        let dir_size = directional_atlas.size as f32;
        let other_size = other_atlas.allocation().map_or(dir_size, |allocation| allocation.size as f32);
        uniforms.atlas_sizes = Vec4::new(dir_size, 1.0 / dir_size, other_size, 1.0 / other_size);

        let uses_shadow_mask = admission.uses_shadow_mask();
        let keywords = ShadowKeywords::new(
            settings.directional.filter,
            settings.other.filter,
            settings.directional.cascade_blend,
            uses_shadow_mask.then_some(settings.shadow_mask_mode),
        );

        log::debug!(
            "Shadow atlases: directional {}px ({} tiles, split {}), other {} ({} tiles, split {})",
            directional_atlas.size,
            directional.len() * cascade_count,
            directional_layout.split,
            other_atlas.allocation().map_or_else(|| "aliased".to_string(), |other| format!("{}px", other.size)),
            other.tile_count(),
            other_layout.split
        );

        let release = AtlasRelease { directional: directional_atlas, other: other_atlas.allocation() };
        let output = ShadowRenderOutput {
            directional_atlas,
            other_atlas,
            directional_layout,
            other_layout,
            passes,
            uniforms,
            keywords,
            uses_shadow_mask,
        };
        planner.held = Some(release);
        output
    }
}

fn render_directional<O: CullingOracle + ?Sized>(
    oracle: &O,
    settings: &ShadowSettings,
    depth: DepthConvention,
    casters: &[DirectionalShadowCaster],
    layout: AtlasLayout,
    uniforms: &mut ShadowUniforms,
    passes: &mut Vec<ShadowCasterPass>,
) {
    let cascade_count = settings.directional.clamped_cascade_count();
    let ratios = Vec3::from_array(settings.directional.cascade_ratios);
    let culling_factor = cascade_blend_culling_factor(settings.directional.cascade_fade);
    let scale = layout.tile_scale();
    for (slot, caster) in casters.iter().enumerate() {
        let first_tile = slot * cascade_count;
        for cascade in 0..cascade_count {
            let request = CascadeRequest {
                cascade_index: cascade,
                cascade_count,
                ratios,
                tile_size: layout.tile_size,
                near_plane_offset: caster.near_plane_offset,
            };
            let mut matrices = oracle.directional_shadow_matrices(caster.visible_light, &request);
            matrices.split.cascade_blend_culling_factor = culling_factor;
            // Cascade spheres only depend on the camera, so the first light stands for all.
            if slot == 0 {
                let meta = cascade_metadata(matrices.split.culling_sphere, layout.tile_size, settings.directional.filter);
                uniforms.cascade_culling_spheres[cascade] = meta.culling_sphere;
                uniforms.cascade_data[cascade] = meta.data;
            }
            let tile = first_tile + cascade;
            let sampling =
                atlas_sampling_entry(matrices.projection, matrices.view, layout.tile_offset(tile), scale, depth);
            uniforms.directional_matrices[tile] = sampling.matrix;
            passes.push(ShadowCasterPass {
                atlas: AtlasKind::Directional,
                visible_light: caster.visible_light,
                viewport: layout.viewport(tile),
                view: matrices.view,
                projection: matrices.projection,
                split: matrices.split,
                slope_scale_bias: caster.slope_scale_bias,
                pancaking: true,
                sampling,
            });
        }
    }
}

fn render_other<O: CullingOracle + ?Sized>(
    oracle: &O,
    settings: &ShadowSettings,
    depth: DepthConvention,
    casters: &[OtherShadowCaster],
    layout: AtlasLayout,
    uniforms: &mut ShadowUniforms,
    passes: &mut Vec<ShadowCasterPass>,
) {
    let scale = layout.tile_scale();
    let texel_size = 1.0 / layout.atlas_size as f32;
    let filter = settings.other.filter;
    let mut emit = |caster: &OtherShadowCaster,
                    tile: usize,
                    view: Mat4,
                    projection: Mat4,
                    split: ShadowSplitData,
                    normal_bias: f32| {
        let offset: Vec2 = layout.tile_offset(tile);
        let sampling = atlas_sampling_entry(projection, view, offset, scale, depth);
        uniforms.other_matrices[tile] = sampling.matrix;
        uniforms.other_tiles[tile] = other_tile_data(offset, scale, normal_bias, texel_size);
        passes.push(ShadowCasterPass {
            atlas: AtlasKind::Other,
            visible_light: caster.visible_light,
            viewport: layout.viewport(tile),
            view,
            projection,
            split,
            slope_scale_bias: caster.slope_scale_bias,
            pancaking: false,
            sampling,
        });
    };

    for caster in casters {
        let first_tile = caster.first_tile.index();
        if caster.is_point {
            let bias = point_filter_bias(layout.tile_size, filter, caster.normal_bias);
            for (face_index, face) in CubemapFace::ALL.into_iter().enumerate() {
                let matrices = oracle.point_shadow_matrices(caster.visible_light, face, bias.fov_bias_degrees);
                let view = flip_cube_face_view(matrices.view);
                emit(caster, first_tile + face_index, view, matrices.projection, matrices.split, bias.normal_bias);
            }
        } else {
            let matrices = oracle.spot_shadow_matrices(caster.visible_light);
            let normal_bias = spot_normal_bias(layout.tile_size, matrices.projection.x_axis.x, filter, caster.normal_bias);
            emit(caster, first_tile, matrices.view, matrices.projection, matrices.split, normal_bias);
        }
    }
}
