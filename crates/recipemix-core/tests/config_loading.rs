use recipemix_core::{Clip, DurationMode, Effect, MixConfig, MixEngine, Recipe, Track};

#[test]
fn partial_config_files_keep_section_defaults() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let path = temp.path().join("recipemix.config.toml");
    std::fs::write(
        &path,
        r#"
[content]
content_dir = "/data/sounds"

[balance]
clamp_to_bounds = false

[output]
bitrate = "192k"

[wave_presets.soft]
f = [5.0]
s = 0.5
"#,
    )
    .expect("writing config should work");

    let config = MixConfig::load_from(&path).expect("config should parse");
    assert_eq!(config.content.content_dir, std::path::PathBuf::from("/data/sounds"));
    assert_eq!(config.content.mix_dir, std::path::PathBuf::from("mixes"));
    assert!(!config.balance.clamp_to_bounds);
    assert_eq!(config.balance.max_iterations, 100);
    assert_eq!(config.output.bitrate, "192k");
    assert_eq!(config.output.codec, "libmp3lame");
    assert_eq!(config.export.ffmpeg_binary, "ffmpeg");
    assert_eq!(config.diagnostics.rust_log_filter, "info,recipemix_core=debug");

    let presets = config.wave_presets();
    assert!(presets.contains_key("default"));
    assert_eq!(presets["soft"].f, vec![5.0]);
    assert_eq!(presets["soft"].s, 0.5);
}

#[test]
fn malformed_config_is_an_error() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let path = temp.path().join("broken.toml");
    std::fs::write(&path, "[balance\nmax_iterations = ").expect("writing config should work");
    assert!(MixConfig::load_from(&path).is_err());
}

#[test]
fn configured_presets_reach_wave_stages() {
    let temp = tempfile::tempdir().expect("tempdir should be creatable");
    let path = temp.path().join("recipemix.config.toml");
    std::fs::write(&path, "[wave_presets.Flat]\nf = [2.0]\na = [0.0]\ns = 0.0\nq = 0.25\n")
        .expect("writing config should work");
    let config = MixConfig::load_from(&path).expect("config should parse");

    let mut track = Track::new(0).with_clip(Clip::fixed("a.wav", 1.0));
    track.effects.push(Effect::Wave {
        preset: "flat".to_string(),
    });
    track.effects.push(Effect::MixDuration {
        mode: DurationMode::Shortest,
    });
    let mut recipe = Recipe::new("presets");
    recipe.tracks.push(track);

    let plan = MixEngine::new(config)
        .plan(&recipe, Some(0))
        .expect("plan should succeed");
    let wave = plan
        .stages
        .iter()
        .find(|stage| stage.output == "track0_wave")
        .expect("wave stage");
    assert_eq!(
        wave.params["volume"].to_string(),
        "min(1, max(0, ((cos(PI * t * 1 / 2) * 0) + -0.5) * 0 * 1 + 0.25))"
    );
}
