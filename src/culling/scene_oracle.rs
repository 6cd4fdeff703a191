use glam::{Mat4, Vec3};

use super::{Aabb, CascadeRequest, CubemapFace, CullingOracle, ShadowMatrices, ShadowSplitData};
use crate::camera::Camera3D;
use crate::light::{LightKind, VisibleLight, VisibleLightIndex};

const CASCADE_EPS: f32 = 0.01;
const MIN_SHADOW_NEAR: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowCaster {
    pub bounds: Aabb,
    pub casts_shadows: bool,
}

impl ShadowCaster {
    pub fn new(bounds: Aabb) -> Self {
        Self { bounds, casts_shadows: true }
    }
}

/// CPU culling oracle built from a camera, the visible lights and caster boxes.
///
/// Cascades are fitted to bounding spheres of camera frustum slices, which keeps the
/// cascade footprint stable under camera rotation.
#[derive(Debug, Clone)]
pub struct SceneCullingOracle {
    camera: Camera3D,
    shadow_distance: f32,
    lights: Vec<VisibleLight>,
    casters: Vec<ShadowCaster>,
    shadow_region: (Vec3, f32),
}

impl SceneCullingOracle {
    pub fn new(
        camera: Camera3D,
        max_shadow_distance: f32,
        lights: Vec<VisibleLight>,
        casters: Vec<ShadowCaster>,
    ) -> Self {
        let near = camera.near.max(MIN_SHADOW_NEAR);
        let shadow_distance = max_shadow_distance.min(camera.far).max(near + CASCADE_EPS);
        let shadow_region = bounding_sphere(&camera.frustum_slice_corners(near, shadow_distance));
        Self { camera, shadow_distance, lights, casters, shadow_region }
    }

    pub fn shadow_distance(&self) -> f32 {
        self.shadow_distance
    }

    pub fn lights(&self) -> &[VisibleLight] {
        &self.lights
    }

    fn light(&self, index: VisibleLightIndex) -> &VisibleLight {
        &self.lights[index.get()]
    }

    /// Near/far camera distances covered by one cascade.
    pub fn cascade_range(&self, request: &CascadeRequest) -> (f32, f32) {
        let ratios = request.ratios.to_array();
        let count = request.cascade_count.max(1);
        let ratio = |cascade: usize| if cascade + 1 >= count { 1.0 } else { ratios[cascade.min(2)] };
        let camera_near = self.camera.near.max(MIN_SHADOW_NEAR);
        let start = if request.cascade_index == 0 {
            camera_near
        } else {
            (self.shadow_distance * ratio(request.cascade_index - 1)).max(camera_near)
        };
        let end = (self.shadow_distance * ratio(request.cascade_index)).max(start + CASCADE_EPS);
        (start, end)
    }
}

impl CullingOracle for SceneCullingOracle {
    fn shadow_caster_bounds(&self, index: VisibleLightIndex) -> Option<Aabb> {
        let light = self.lights.get(index.get())?;
        let (center, radius) = match light.kind {
            LightKind::Directional => self.shadow_region,
            LightKind::Spot | LightKind::Point => (light.position, light.range),
        };
        self.casters
            .iter()
            .filter(|caster| caster.casts_shadows && caster.bounds.intersects_sphere(center, radius))
            .map(|caster| caster.bounds)
            .reduce(|acc, bounds| acc.union(&bounds))
    }

    fn directional_shadow_matrices(&self, index: VisibleLightIndex, request: &CascadeRequest) -> ShadowMatrices {
        let light = self.light(index);
        let direction = safe_direction(light.direction);
        let up = light_up(direction);
        let (near, far) = self.cascade_range(request);
        let (center, radius) = bounding_sphere(&self.camera.frustum_slice_corners(near, far));
        let center = snap_to_texel_grid(center, radius, direction, up, request.tile_size);

        let pull_back = radius + request.near_plane_offset.max(0.0);
        let view = Mat4::look_at_rh(center - direction * pull_back, center, up);
        let projection = Mat4::orthographic_rh_gl(-radius, radius, -radius, radius, 0.0, pull_back + radius);
        ShadowMatrices {
            view,
            projection,
            split: ShadowSplitData { culling_sphere: center.extend(radius), cascade_blend_culling_factor: 0.0 },
        }
    }

    fn spot_shadow_matrices(&self, index: VisibleLightIndex) -> ShadowMatrices {
        let light = self.light(index);
        let direction = safe_direction(light.direction);
        let view = Mat4::look_at_rh(light.position, light.position + direction, light_up(direction));
        let fov = light.spot_angle_degrees.clamp(1.0, 179.0).to_radians();
        let near = light.shadow_near_plane.max(MIN_SHADOW_NEAR);
        let projection = Mat4::perspective_rh_gl(fov, 1.0, near, light.range.max(near + CASCADE_EPS));
        ShadowMatrices {
            view,
            projection,
            split: ShadowSplitData { culling_sphere: light.position.extend(light.range), ..Default::default() },
        }
    }

    fn point_shadow_matrices(
        &self,
        index: VisibleLightIndex,
        face: CubemapFace,
        fov_bias_degrees: f32,
    ) -> ShadowMatrices {
        let light = self.light(index);
        let (forward, up) = face.basis();
        let view = Mat4::look_at_rh(light.position, light.position + forward, up);
        let fov = (90.0 + fov_bias_degrees).clamp(1.0, 179.0).to_radians();
        let near = light.shadow_near_plane.max(MIN_SHADOW_NEAR);
        let projection = Mat4::perspective_rh_gl(fov, 1.0, near, light.range.max(near + CASCADE_EPS));
        ShadowMatrices {
            view,
            projection,
            split: ShadowSplitData { culling_sphere: light.position.extend(light.range), ..Default::default() },
        }
    }
}

fn safe_direction(direction: Vec3) -> Vec3 {
    direction.try_normalize().unwrap_or(Vec3::NEG_Y)
}

fn light_up(direction: Vec3) -> Vec3 {
    if Vec3::Y.dot(direction).abs() > 0.95 {
        Vec3::X
    } else {
        Vec3::Y
    }
}

fn bounding_sphere(corners: &[Vec3; 8]) -> (Vec3, f32) {
    let center = corners.iter().copied().sum::<Vec3>() / corners.len() as f32;
    let radius = corners.iter().map(|corner| corner.distance(center)).fold(0.0_f32, f32::max);
    (center, radius)
}

/// Moves the sphere centre onto the texel grid of the light's view plane so that camera
/// translation does not make cascade edges shimmer.
fn snap_to_texel_grid(center: Vec3, radius: f32, direction: Vec3, up: Vec3, tile_size: u32) -> Vec3 {
    if tile_size == 0 || radius <= 0.0 {
        return center;
    }
    let texel = 2.0 * radius / tile_size as f32;
    let rotation = Mat4::look_at_rh(Vec3::ZERO, direction, up);
    let local = rotation.transform_point3(center);
    let snapped = Vec3::new((local.x / texel).floor() * texel, (local.y / texel).floor() * texel, local.z);
    rotation.inverse().transform_point3(snapped)
}
