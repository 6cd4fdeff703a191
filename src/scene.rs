use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::camera::Camera3D;
use crate::culling::{Aabb, SceneCullingOracle, ShadowCaster};
use crate::light::{LightBaking, LightKind, ShadowCasting, VisibleLight};

/// A camera, its visible lights in culling order, and shadow caster boxes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadowScene {
    #[serde(default)]
    pub camera: SceneCamera,
    #[serde(default)]
    pub lights: Vec<SceneLight>,
    #[serde(default)]
    pub casters: Vec<SceneCaster>,
    #[serde(default = "default_rendering_layer_mask")]
    pub rendering_layer_mask: u32,
}

impl Default for ShadowScene {
    fn default() -> Self {
        Self {
            camera: SceneCamera::default(),
            lights: Vec::new(),
            casters: Vec::new(),
            rendering_layer_mask: default_rendering_layer_mask(),
        }
    }
}

const fn default_rendering_layer_mask() -> u32 {
    u32::MAX
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneCamera {
    #[serde(default = "SceneCamera::default_position")]
    pub position: Vec3Data,
    #[serde(default)]
    pub target: Vec3Data,
    #[serde(default = "SceneCamera::default_fov")]
    pub fov_y_degrees: f32,
    #[serde(default = "SceneCamera::default_aspect")]
    pub aspect: f32,
    #[serde(default = "SceneCamera::default_near")]
    pub near: f32,
    #[serde(default = "SceneCamera::default_far")]
    pub far: f32,
}

impl SceneCamera {
    fn default_position() -> Vec3Data {
        Vec3Data { x: 0.0, y: 5.0, z: 15.0 }
    }

    const fn default_fov() -> f32 {
        60.0
    }

    const fn default_aspect() -> f32 {
        16.0 / 9.0
    }

    const fn default_near() -> f32 {
        0.3
    }

    const fn default_far() -> f32 {
        500.0
    }

    pub fn to_camera(&self) -> Camera3D {
        Camera3D::new(
            self.position.into(),
            self.target.into(),
            self.fov_y_degrees.to_radians(),
            self.near,
            self.far,
        )
        .with_aspect(self.aspect)
    }
}

impl Default for SceneCamera {
    fn default() -> Self {
        Self {
            position: Self::default_position(),
            target: Vec3Data::default(),
            fov_y_degrees: Self::default_fov(),
            aspect: Self::default_aspect(),
            near: Self::default_near(),
            far: Self::default_far(),
        }
    }
}

fn default_light_direction() -> Vec3Data {
    Vec3Data::from(glam::Vec3::new(-0.4, -0.8, -0.35).normalize())
}

const fn default_shadow_strength() -> f32 {
    1.0
}

const fn default_shadow_bias() -> f32 {
    0.05
}

const fn default_normal_bias() -> f32 {
    0.4
}

const fn default_near_plane() -> f32 {
    0.2
}

const fn default_range() -> f32 {
    10.0
}

const fn default_spot_angle() -> f32 {
    30.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneLight {
    pub kind: LightKind,
    #[serde(default)]
    pub shadows: ShadowCasting,
    #[serde(default = "default_shadow_strength")]
    pub shadow_strength: f32,
    #[serde(default = "default_shadow_bias")]
    pub shadow_bias: f32,
    #[serde(default = "default_normal_bias")]
    pub shadow_normal_bias: f32,
    #[serde(default = "default_near_plane")]
    pub shadow_near_plane: f32,
    #[serde(default)]
    pub baking: LightBaking,
    #[serde(default = "default_rendering_layer_mask")]
    pub rendering_layer_mask: u32,
    #[serde(default)]
    pub position: Vec3Data,
    #[serde(default = "default_light_direction")]
    pub direction: Vec3Data,
    #[serde(default = "default_range")]
    pub range: f32,
    #[serde(default = "default_spot_angle")]
    pub spot_angle_degrees: f32,
}

impl SceneLight {
    pub fn to_visible_light(&self) -> VisibleLight {
        VisibleLight {
            kind: self.kind,
            shadows: self.shadows,
            shadow_strength: self.shadow_strength,
            shadow_bias: self.shadow_bias,
            shadow_normal_bias: self.shadow_normal_bias,
            shadow_near_plane: self.shadow_near_plane,
            baking: self.baking,
            rendering_layer_mask: self.rendering_layer_mask,
            position: self.position.into(),
            direction: self.direction.into(),
            range: self.range,
            spot_angle_degrees: self.spot_angle_degrees,
        }
    }
}

const fn default_casts_shadows() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneCaster {
    pub center: Vec3Data,
    pub half_extents: Vec3Data,
    #[serde(default = "default_casts_shadows")]
    pub casts_shadows: bool,
}

impl SceneCaster {
    pub fn to_caster(&self) -> ShadowCaster {
        let bounds = Aabb::from_center_half_extents(self.center.into(), self.half_extents.into());
        ShadowCaster { bounds, casts_shadows: self.casts_shadows }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3Data {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<glam::Vec3> for Vec3Data {
    fn from(value: glam::Vec3) -> Self {
        Self { x: value.x, y: value.y, z: value.z }
    }
}

impl From<Vec3Data> for glam::Vec3 {
    fn from(value: Vec3Data) -> Self {
        glam::Vec3::new(value.x, value.y, value.z)
    }
}

impl ShadowScene {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Reading shadow scene {}", path.display()))?;
        let scene = serde_json::from_slice::<ShadowScene>(&bytes)
            .with_context(|| format!("Parsing shadow scene {}", path.display()))?;
        scene.validate().with_context(|| format!("Invalid shadow scene {}", path.display()))?;
        Ok(scene)
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Creating scene directory {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json.as_bytes()).with_context(|| format!("Writing shadow scene {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let camera = &self.camera;
        if !(camera.near > 0.0 && camera.far > camera.near) {
            bail!("camera near/far must satisfy 0 < near < far, got {} / {}", camera.near, camera.far);
        }
        if !(camera.fov_y_degrees > 0.0 && camera.fov_y_degrees < 180.0) {
            bail!("camera fov_y_degrees must be within (0, 180), got {}", camera.fov_y_degrees);
        }
        for (i, light) in self.lights.iter().enumerate() {
            if let Some(channel) = light.baking.mask_channel() {
                if channel > 3 {
                    bail!("light {i}: shadow mask channel must be 0..=3, got {channel}");
                }
            }
            if light.kind != LightKind::Directional && light.range <= 0.0 {
                bail!("light {i}: range must be positive, got {}", light.range);
            }
        }
        Ok(())
    }

    pub fn visible_lights(&self) -> Vec<VisibleLight> {
        self.lights.iter().map(SceneLight::to_visible_light).collect()
    }

    pub fn shadow_casters(&self) -> Vec<ShadowCaster> {
        self.casters.iter().map(SceneCaster::to_caster).collect()
    }

    /// Builds the reference culling oracle for this scene.
    pub fn culling_oracle(&self, max_shadow_distance: f32) -> SceneCullingOracle {
        SceneCullingOracle::new(
            self.camera.to_camera(),
            max_shadow_distance,
            self.visible_lights(),
            self.shadow_casters(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_json_fills_defaults() {
        let json = r#"{
            "lights": [
                { "kind": "directional" },
                { "kind": "point", "position": { "x": 1.0, "y": 2.0, "z": 3.0 },
                  "baking": { "mode": "shadowmask", "channel": 2 } }
            ],
            "casters": [ { "center": { "x": 0.0, "y": 0.0, "z": 0.0 },
                           "half_extents": { "x": 1.0, "y": 1.0, "z": 1.0 } } ]
        }"#;
        let scene: ShadowScene = serde_json::from_str(json).expect("scene json");
        scene.validate().expect("valid");
        assert_eq!(scene.rendering_layer_mask, u32::MAX);
        let lights = scene.visible_lights();
        assert_eq!(lights[0].shadow_strength, 1.0);
        assert_eq!(lights[1].mask_channel_value(), 2.0);
        assert_eq!(lights[1].position, glam::Vec3::new(1.0, 2.0, 3.0));
        assert!(scene.shadow_casters()[0].casts_shadows);
    }

    #[test]
    fn rejects_bad_mask_channel() {
        let json = r#"{ "lights": [ { "kind": "spot", "baking": { "mode": "shadowmask", "channel": 7 } } ] }"#;
        let scene: ShadowScene = serde_json::from_str(json).expect("scene json");
        assert!(scene.validate().is_err());
    }
}
