use approx::assert_abs_diff_eq;
use glam::{Vec3, Vec4};
use kestrel_shadows::camera::Camera3D;
use kestrel_shadows::config::{FilterMode, ShadowSettings};
use kestrel_shadows::culling::{Aabb, SceneCullingOracle, ShadowCaster};
use kestrel_shadows::light::{LightBaking, ShadowCasting, VisibleLight, VisibleLightIndex};
use kestrel_shadows::shadows::{
    AtlasKind, CascadeOffset, DepthConvention, OtherAtlasBinding, ShadowAtlasPlanner, TileIndex,
};

fn camera() -> Camera3D {
    Camera3D::new(Vec3::new(0.0, 5.0, 15.0), Vec3::ZERO, 60.0_f32.to_radians(), 0.3, 500.0)
}

fn ground_casters() -> Vec<ShadowCaster> {
    vec![
        ShadowCaster::new(Aabb::from_center_half_extents(Vec3::ZERO, Vec3::new(10.0, 0.5, 10.0))),
        ShadowCaster::new(Aabb::from_center_half_extents(Vec3::new(2.0, 1.5, -1.0), Vec3::splat(1.0))),
    ]
}

fn oracle_for(lights: &[VisibleLight]) -> SceneCullingOracle {
    SceneCullingOracle::new(camera(), 100.0, lights.to_vec(), ground_casters())
}

#[test]
fn five_suns_fill_the_directional_atlas() {
    let lights = vec![VisibleLight::directional(Vec3::new(-0.3, -1.0, -0.2)); 5];
    let oracle = oracle_for(&lights);
    let mut planner = ShadowAtlasPlanner::new(ShadowSettings::default(), DepthConvention::Standard);
    let mut frame = planner.setup(&oracle).expect("setup");

    let results: Vec<_> =
        lights.iter().enumerate().map(|(i, light)| frame.reserve_directional(light, VisibleLightIndex(i))).collect();
    let offsets: Vec<_> = results.iter().take(4).map(|data| data.cascade_offset()).collect();
    assert_eq!(
        offsets,
        vec![Some(CascadeOffset(0)), Some(CascadeOffset(4)), Some(CascadeOffset(8)), Some(CascadeOffset(12))]
    );
    assert!(!results[4].has_realtime_shadow(), "registry full");
    assert_eq!(results[4].to_vec4(), Vec4::new(-1.0, 0.0, 0.0, -1.0));

    let output = frame.render();
    assert_eq!(output.passes_for(AtlasKind::Directional).count(), 16);
    assert_eq!(output.directional_layout.split, 4);
    assert_eq!(output.directional_layout.tile_size, 256);
    assert_eq!(output.uniforms.cascade_count, 4);
    assert_eq!(output.other_atlas, OtherAtlasBinding::AliasDirectional);
    for tile in 0..16 {
        assert_ne!(output.uniforms.directional_matrices[tile], glam::Mat4::IDENTITY, "tile {tile}");
    }
    let viewports: Vec<_> = output.passes.iter().map(|pass| (pass.viewport.x, pass.viewport.y)).collect();
    assert_eq!(viewports[0], (0, 0));
    assert_eq!(viewports[5], (256, 256));
    assert_eq!(viewports[15], (768, 768));
    planner.cleanup().expect("cleanup");
}

#[test]
fn cascade_spheres_shrink_monotonically_outward() {
    let lights = vec![VisibleLight::directional(Vec3::new(0.2, -1.0, 0.1))];
    let oracle = oracle_for(&lights);
    let mut settings = ShadowSettings::default();
    settings.directional.filter = FilterMode::Pcf5x5;
    let mut planner = ShadowAtlasPlanner::new(settings, DepthConvention::Standard);
    let mut frame = planner.setup(&oracle).expect("setup");
    frame.reserve_directional(&lights[0], VisibleLightIndex(0));
    let output = frame.render();

    let spheres = output.uniforms.cascade_culling_spheres;
    for pair in spheres.windows(2) {
        assert!(pair[1].w > pair[0].w, "{spheres:?}");
    }
    for (sphere, data) in spheres.iter().zip(output.uniforms.cascade_data.iter()) {
        assert_abs_diff_eq!(data.x * sphere.w, 1.0, epsilon = 1e-4);
        assert!(data.y > 0.0);
    }
    assert_eq!(output.keywords.enabled(), vec!["_DIRECTIONAL_PCF5"]);
}

#[test]
fn point_light_needs_six_free_tiles() {
    let lights = vec![
        VisibleLight::point(Vec3::new(0.0, 3.0, 0.0), 10.0),
        VisibleLight::point(Vec3::new(3.0, 3.0, 0.0), 10.0),
        VisibleLight::spot(Vec3::new(0.0, 6.0, 0.0), Vec3::NEG_Y, 12.0, 45.0),
        VisibleLight::spot(Vec3::new(2.0, 6.0, 0.0), Vec3::NEG_Y, 12.0, 45.0),
        VisibleLight::spot(Vec3::new(-2.0, 6.0, 0.0), Vec3::NEG_Y, 12.0, 45.0),
        VisibleLight::point(Vec3::new(-3.0, 3.0, 0.0), 10.0),
        VisibleLight::spot(Vec3::new(0.0, 6.0, 2.0), Vec3::NEG_Y, 12.0, 45.0),
    ];
    let oracle = oracle_for(&lights);
    let mut planner = ShadowAtlasPlanner::new(ShadowSettings::default(), DepthConvention::Standard);
    let mut frame = planner.setup(&oracle).expect("setup");
    let results: Vec<_> =
        lights.iter().enumerate().map(|(i, light)| frame.reserve_other(light, VisibleLightIndex(i))).collect();

    let tiles: Vec<_> = results.iter().map(|data| data.tile_index()).collect();
    assert_eq!(
        tiles,
        vec![
            Some(TileIndex(0)),
            Some(TileIndex(6)),
            Some(TileIndex(12)),
            Some(TileIndex(13)),
            Some(TileIndex(14)),
            None,
            Some(TileIndex(15)),
        ]
    );
    assert_eq!(results[5].to_vec4(), Vec4::new(-1.0, 0.0, 0.0, -1.0));
    assert_eq!(frame.admission().other().tile_count(), 16);

    let output = frame.render();
    assert_eq!(output.passes_for(AtlasKind::Other).count(), 16);
    assert!(output.passes_for(AtlasKind::Other).all(|pass| !pass.pancaking));
    assert_eq!(output.other_atlas_size(), 1024);
    let scale = 0.25;
    let border = 0.5 / 1024.0;
    let tile = output.uniforms.other_tiles[6];
    // tile 6 sits at grid (2, 1)
    assert_abs_diff_eq!(tile.x, 2.0 * scale + border);
    assert_abs_diff_eq!(tile.y, 1.0 * scale + border);
    assert_abs_diff_eq!(tile.z, scale - 2.0 * border);
    assert!(tile.w > 0.0, "point normal bias");
}

#[test]
fn disabled_and_empty_lights_return_sentinels() {
    let far_point = VisibleLight::point(Vec3::new(300.0, 0.0, 0.0), 5.0)
        .with_strength(-0.5)
        .with_baking(LightBaking::Shadowmask { channel: 2 });
    let zero = VisibleLight::spot(Vec3::new(0.0, 5.0, 0.0), Vec3::NEG_Y, 10.0, 40.0)
        .with_strength(0.0)
        .with_baking(LightBaking::Shadowmask { channel: 1 });
    let off = VisibleLight::spot(Vec3::new(0.0, 5.0, 0.0), Vec3::NEG_Y, 10.0, 40.0).with_shadows(ShadowCasting::None);
    let lonely = VisibleLight::point(Vec3::new(300.0, 0.0, 0.0), 5.0);
    let lights = vec![far_point, zero, off, lonely];
    let oracle = oracle_for(&lights);
    let mut planner = ShadowAtlasPlanner::new(ShadowSettings::default(), DepthConvention::Standard);
    let mut frame = planner.setup(&oracle).expect("setup");

    let packed: Vec<_> = lights
        .iter()
        .enumerate()
        .map(|(i, light)| frame.reserve_other(light, VisibleLightIndex(i)).to_vec4())
        .collect();
    assert_eq!(packed[0], Vec4::new(-0.5, 0.0, 0.0, 2.0));
    assert_eq!(packed[1], Vec4::new(0.0, 0.0, 0.0, 1.0));
    assert_eq!(packed[2], Vec4::new(0.0, 0.0, 0.0, -1.0));
    assert_eq!(packed[3], Vec4::new(-1.0, 0.0, 0.0, -1.0));
    assert_eq!(frame.admission().other().tile_count(), 0);
    assert!(frame.admission().uses_shadow_mask());

    let output = frame.render();
    assert!(output.passes.is_empty());
    assert_eq!(output.directional_atlas.size, 1);
    assert!(output.directional_atlas.is_placeholder());
    assert!(output.uses_shadow_mask);
    assert_eq!(output.keywords.enabled(), vec!["_SHADOW_MASK_DISTANCE"]);
}

#[test]
fn rejected_fifth_sun_keeps_its_shadow_mask() {
    let mut lights = vec![VisibleLight::directional(Vec3::new(-0.3, -1.0, -0.2)); 4];
    lights.push(
        VisibleLight::directional(Vec3::new(0.2, -1.0, 0.1)).with_baking(LightBaking::Shadowmask { channel: 2 }),
    );
    let oracle = oracle_for(&lights);
    let mut planner = ShadowAtlasPlanner::new(ShadowSettings::default(), DepthConvention::Standard);
    let mut frame = planner.setup(&oracle).expect("setup");

    let results: Vec<_> =
        lights.iter().enumerate().map(|(i, light)| frame.reserve_directional(light, VisibleLightIndex(i))).collect();
    assert!(results[..4].iter().all(|data| data.has_realtime_shadow()));
    assert_eq!(results[4].to_vec4(), Vec4::new(-1.0, 0.0, 0.0, 2.0));

    let output = frame.render();
    assert!(output.uses_shadow_mask);
    assert!(output.keywords.enabled().contains(&"_SHADOW_MASK_DISTANCE"));
    assert_eq!(output.passes_for(AtlasKind::Directional).count(), 16);
}

#[test]
fn shadow_mask_lights_enable_mask_keyword() {
    let lights = vec![VisibleLight::spot(Vec3::new(0.0, 5.0, 0.0), Vec3::NEG_Y, 10.0, 40.0)
        .with_baking(LightBaking::Shadowmask { channel: 0 })];
    let oracle = oracle_for(&lights);
    let mut planner = ShadowAtlasPlanner::new(ShadowSettings::default(), DepthConvention::Standard);
    let mut frame = planner.setup(&oracle).expect("setup");
    let data = frame.reserve_other(&lights[0], VisibleLightIndex(0));
    assert_eq!(data.to_vec4(), Vec4::new(1.0, 0.0, 0.0, 0.0));
    let output = frame.render();
    assert!(output.uses_shadow_mask);
    assert!(output.keywords.enabled().contains(&"_SHADOW_MASK_DISTANCE"));
    assert_eq!(output.uniforms.cascade_count, 0);
    assert_eq!(output.directional_atlas.size, 1);
    assert_eq!(output.uniforms.atlas_sizes, Vec4::new(1.0, 1.0, 1024.0, 1.0 / 1024.0));
}

#[test]
fn frame_lifecycle_is_enforced() {
    let lights = vec![VisibleLight::directional(Vec3::NEG_Y)];
    let oracle = oracle_for(&lights);
    let mut planner = ShadowAtlasPlanner::new(ShadowSettings::default(), DepthConvention::Standard);

    let err = planner.cleanup().unwrap_err();
    assert!(err.to_string().contains("render()"), "{err}");

    let frame = planner.setup(&oracle).expect("first setup");
    let _ = frame.render();
    assert!(planner.held_atlases().is_some());
    let err = planner.setup(&oracle).err().expect("setup while atlases held");
    assert!(err.to_string().contains("cleanup()"), "{err}");

    let release = planner.cleanup().expect("cleanup");
    assert_eq!(release.directional.size, 1);
    assert_eq!(release.other, None);
    assert!(planner.cleanup().is_err(), "double cleanup");

    let mut frame = planner.setup(&oracle).expect("setup after cleanup");
    assert!(frame.admission().directional().is_empty());
    assert!(frame.reserve_directional(&lights[0], VisibleLightIndex(0)).has_realtime_shadow());
}

#[test]
fn registries_reset_between_frames() {
    let lights = vec![VisibleLight::point(Vec3::new(0.0, 3.0, 0.0), 10.0)];
    let oracle = oracle_for(&lights);
    let mut planner = ShadowAtlasPlanner::new(ShadowSettings::default(), DepthConvention::Standard);
    for _ in 0..3 {
        let mut frame = planner.setup(&oracle).expect("setup");
        let data = frame.reserve_other(&lights[0], VisibleLightIndex(0));
        assert_eq!(data.tile_index(), Some(TileIndex(0)));
        let output = frame.render();
        assert_eq!(output.passes.len(), 6);
        let release = planner.cleanup().expect("cleanup");
        assert_eq!(release.other.map(|atlas| atlas.size), Some(1024));
    }
}

#[test]
fn reversed_depth_only_changes_the_z_row() {
    let lights = vec![VisibleLight::directional(Vec3::new(-0.3, -1.0, -0.2))];
    let oracle = oracle_for(&lights);
    let run = |depth| {
        let mut planner = ShadowAtlasPlanner::new(ShadowSettings::default(), depth);
        let mut frame = planner.setup(&oracle).expect("setup");
        frame.reserve_directional(&lights[0], VisibleLightIndex(0));
        frame.render().uniforms.directional_matrices[2]
    };
    let standard = run(DepthConvention::Standard);
    let reversed = run(DepthConvention::Reversed);
    assert_eq!(standard.row(0), reversed.row(0));
    assert_eq!(standard.row(1), reversed.row(1));
    let sum = standard.row(2) + reversed.row(2);
    let w = standard.row(3);
    assert_abs_diff_eq!(sum.x, w.x, epsilon = 1e-5);
    assert_abs_diff_eq!(sum.y, w.y, epsilon = 1e-5);
    assert_abs_diff_eq!(sum.z, w.z, epsilon = 1e-5);
    assert_abs_diff_eq!(sum.w, w.w, epsilon = 1e-5);
}
