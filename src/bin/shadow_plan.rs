use anyhow::{anyhow, Result};
use env_logger::Env;
use kestrel_shadows::cli::ShadowCliOverrides;
use kestrel_shadows::config::ShadowSettings;
use kestrel_shadows::lighting::{reserve_visible_lights, LightShadowTable};
use kestrel_shadows::scene::ShadowScene;
use kestrel_shadows::shadows::{
    AtlasKind, DepthConvention, OtherAtlasBinding, ShadowAtlasPlanner, ShadowRenderOutput, ShadowSlot,
};
use serde_json::json;
use std::process;

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("shadow_plan error: {err:?}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = ShadowCliOverrides::parse_from_env()?;
    if cli.show_help {
        print_usage();
        return Ok(());
    }
    let scene_path = cli.scene.clone().ok_or_else(|| anyhow!("missing scene path: shadow_plan <scene.json>"))?;
    let scene = ShadowScene::load_from_path(&scene_path)?;

    let mut settings = match &cli.config {
        Some(path) => ShadowSettings::load(path)?,
        None => ShadowSettings::default(),
    };
    let depth = if cli.reversed_z() { DepthConvention::Reversed } else { DepthConvention::Standard };
    let overrides = cli.into_settings_overrides();
    if !overrides.is_empty() {
        settings.apply_overrides(&overrides);
        settings.validate()?;
        log::info!("Applied overrides: {}", overrides.applied_fields().join(", "));
    }

    let oracle = scene.culling_oracle(settings.max_distance);
    let lights = scene.visible_lights();
    let mut planner = ShadowAtlasPlanner::new(settings, depth);
    let mut frame = planner.setup(&oracle)?;
    let table = reserve_visible_lights(&mut frame, &lights, scene.rendering_layer_mask);
    let output = frame.render();

    print_admissions(&table);
    print_output(&output);
    let release = planner.cleanup()?;
    log::info!(
        "Released directional atlas ({}px){}",
        release.directional.size,
        release.other.map(|other| format!(" and other atlas ({}px)", other.size)).unwrap_or_default()
    );
    Ok(())
}

fn print_usage() {
    eprintln!(
        "Shadow Plan

Usage:
  shadow_plan <scene.json> [options]

Options:
  --config <settings.json>     Shadow settings file (defaults when omitted)
  --max-distance <f>           Override max shadow distance
  --cascades <1..4>            Override directional cascade count
  --directional-atlas <px>     Override directional atlas size (256..8192)
  --other-atlas <px>           Override spot/point atlas size (256..8192)
  --reversed-z <on|off>        Target a reversed-depth backend
"
    );
}

fn describe_slot(slot: ShadowSlot) -> String {
    match slot {
        ShadowSlot::Unassigned => "no realtime shadow".to_string(),
        ShadowSlot::Cascades { offset, normal_bias } => {
            format!("cascades from {} (normal bias {normal_bias:.3})", offset.0)
        }
        ShadowSlot::Tile { index, is_point: true } => format!("cube tiles {}..{}", index.0, index.0 + 6),
        ShadowSlot::Tile { index, is_point: false } => format!("tile {}", index.0),
    }
}

fn print_admissions(table: &LightShadowTable) {
    println!("Admissions:");
    let directional = table.directional_lights.iter().zip(table.directional.iter());
    let other = table.other_lights.iter().zip(table.other.iter());
    for (light, data) in directional.chain(other) {
        let packed = data.to_vec4();
        println!(
            "  light {:>2}: {:<36} data=({:.3}, {}, {:.3}, {})",
            light.get(),
            describe_slot(data.slot),
            packed.x,
            packed.y,
            packed.z,
            packed.w
        );
    }
}

fn print_output(output: &ShadowRenderOutput) {
    let other_atlas = match output.other_atlas {
        OtherAtlasBinding::Allocated(allocation) => json!(allocation.size),
        OtherAtlasBinding::AliasDirectional => json!("alias_directional"),
    };
    let summary = json!({
        "directional_atlas": output.directional_atlas.size,
        "directional_split": output.directional_layout.split,
        "other_atlas": other_atlas,
        "other_split": output.other_layout.split,
        "directional_passes": output.passes_for(AtlasKind::Directional).count(),
        "other_passes": output.passes_for(AtlasKind::Other).count(),
        "cascade_count": output.uniforms.cascade_count,
        "distance_fade": output.uniforms.distance_fade.to_array(),
        "atlas_sizes": output.uniforms.atlas_sizes.to_array(),
        "keywords": output.keywords.enabled(),
        "uses_shadow_mask": output.uses_shadow_mask,
        "uniform_bytes": output.uniforms.to_gpu().as_bytes().len(),
    });
    println!("Passes:");
    for pass in &output.passes {
        println!(
            "  {:?} light {:>2} viewport ({:>4}, {:>4}) {}px bias {:.3}",
            pass.atlas,
            pass.visible_light.get(),
            pass.viewport.x,
            pass.viewport.y,
            pass.viewport.size,
            pass.slope_scale_bias
        );
    }
    match serde_json::to_string_pretty(&summary) {
        Ok(text) => println!("{text}"),
        Err(err) => log::warn!("Failed to format summary: {err}"),
    }
}
