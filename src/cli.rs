use crate::config::{AtlasSize, ShadowSettingsOverrides};
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

/// Arguments of the `shadow_plan` tool.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShadowCliOverrides {
    pub scene: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub show_help: bool,
    max_distance: Option<f32>,
    cascades: Option<u32>,
    directional_atlas: Option<AtlasSize>,
    other_atlas: Option<AtlasSize>,
    reversed_z: Option<bool>,
}

impl ShadowCliOverrides {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = ShadowCliOverrides::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_arg) = iter.next() {
            let arg = raw_arg.as_ref();
            if arg == "--help" || arg == "-h" {
                overrides.show_help = true;
                continue;
            }
            let Some(key) = arg.strip_prefix("--") else {
                if overrides.scene.is_some() {
                    bail!("Unexpected argument '{arg}'. Only one scene path may be given.");
                }
                overrides.scene = Some(PathBuf::from(arg));
                continue;
            };
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{arg}'"))?.as_ref().to_string();
            match key {
                "config" => overrides.config = Some(PathBuf::from(value)),
                "max-distance" => {
                    let distance =
                        value.parse::<f32>().with_context(|| format!("Invalid max distance '{value}'"))?;
                    if distance.is_nan() || distance <= 0.0 {
                        bail!("Invalid max distance '{value}'. Must be positive.");
                    }
                    overrides.max_distance = Some(distance);
                }
                "cascades" => {
                    overrides.cascades =
                        Some(value.parse::<u32>().with_context(|| format!("Invalid cascade count '{value}'"))?);
                }
                "directional-atlas" => overrides.directional_atlas = Some(parse_atlas_size(arg, &value)?),
                "other-atlas" => overrides.other_atlas = Some(parse_atlas_size(arg, &value)?),
                "reversed-z" => overrides.reversed_z = Some(parse_bool_flag("reversed-z", &value)?),
                _ => bail!(
                    "Unknown flag '{arg}'. Supported flags: --config, --max-distance, --cascades, \
                     --directional-atlas, --other-atlas, --reversed-z."
                ),
            }
        }
        Ok(overrides)
    }

    pub fn reversed_z(&self) -> bool {
        self.reversed_z.unwrap_or(false)
    }

    pub fn into_settings_overrides(self) -> ShadowSettingsOverrides {
        ShadowSettingsOverrides {
            max_distance: self.max_distance,
            cascade_count: self.cascades,
            directional_atlas: self.directional_atlas,
            other_atlas: self.other_atlas,
        }
    }
}

fn parse_atlas_size(flag: &str, value: &str) -> Result<AtlasSize> {
    let pixels = value.parse::<u32>().with_context(|| format!("Invalid {flag} value '{value}'"))?;
    AtlasSize::from_pixels(pixels).ok_or_else(|| {
        anyhow!("Invalid {flag} value '{value}'. Use a power of two between 256 and 8192.")
    })
}

fn parse_bool_flag(flag: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => bail!("Invalid {flag} value '{other}'. Use on/off or true/false."),
    }
}
