pub mod camera;
pub mod cli;
pub mod config;
pub mod culling;
pub mod light;
pub mod lighting;
pub mod scene;
pub mod shadows;

pub use config::ShadowSettings;
pub use culling::{CullingOracle, SceneCullingOracle};
pub use light::{LightKind, VisibleLight, VisibleLightIndex};
pub use lighting::{reserve_visible_lights, LightShadowTable};
pub use shadows::{ShadowAtlasPlanner, ShadowData, ShadowFrame, ShadowRenderOutput};
