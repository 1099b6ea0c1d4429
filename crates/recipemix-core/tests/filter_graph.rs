use recipemix_core::{
    Clip, CompileSettings, DurationMode, Effect, FilterGraph, MixError, ParamValue, Recipe, Track,
    balance, compile,
};

fn recipe_with(tracks: Vec<Track>) -> Recipe {
    let mut recipe = Recipe::new("graph");
    recipe.tracks = tracks;
    for track in &mut recipe.tracks {
        track.refresh_envelope();
    }
    recipe
}

fn filters(graph: &recipemix_core::CompiledGraph) -> Vec<&str> {
    graph
        .stages
        .iter()
        .map(|stage| stage.filter.as_deref().unwrap_or("input"))
        .collect()
}

#[test]
fn single_fixed_clip_compiles_to_ingest_concat_mix() {
    let recipe = recipe_with(vec![Track::new(0).with_clip(Clip::fixed("rain.wav", 30.0))]);
    let graph = compile(&recipe, &CompileSettings::default()).expect("recipe should compile");

    assert_eq!(filters(&graph), vec!["input", "concat", "amix"]);
    assert_eq!(graph.stages[1].params.get("n"), Some(&ParamValue::Int(1)));
    assert_eq!(graph.stages[2].params.get("inputs"), Some(&ParamValue::Int(1)));
    assert_eq!(graph.final_label, graph.stages[2].output);
    assert_eq!(graph.final_label, "out");
    assert_eq!(graph.inputs.len(), 1);
    assert_eq!(graph.inputs[0].path, std::path::PathBuf::from("content/rain.wav"));
}

#[test]
fn non_unity_clip_volumes_emit_gain_before_each_concat() {
    let recipe = recipe_with(vec![
        Track::new(0).with_clip(Clip::fixed("a.wav", 3.0).with_volume(0.5)),
        Track::new(1).with_clip(Clip::fixed("b.wav", 3.0).with_volume(1.0)),
    ]);
    let graph = compile(&recipe, &CompileSettings::default()).expect("recipe should compile");

    assert_eq!(
        filters(&graph),
        vec!["input", "volume", "concat", "input", "volume", "concat", "amix"]
    );
    assert_eq!(graph.stages[1].output, "in_awav_volume");
    assert_eq!(graph.stages[2].inputs, vec!["in_awav_volume".to_string()]);
    assert_eq!(
        graph.stages[1].params.get("volume"),
        Some(&ParamValue::Float(0.005))
    );
    let mix = graph.stages.last().expect("mix stage");
    assert_eq!(mix.inputs.len(), 2);
    assert_eq!(mix.params.get("inputs"), Some(&ParamValue::Int(2)));
}

#[test]
fn unity_and_missing_volumes_emit_no_gain_stage() {
    let recipe = recipe_with(vec![
        Track::new(0)
            .with_clip(Clip::fixed("a.wav", 3.0).with_volume(100.0))
            .with_clip(Clip::fixed("b.wav", 3.0)),
    ]);
    let graph = compile(&recipe, &CompileSettings::default()).expect("recipe should compile");
    assert!(!filters(&graph).contains(&"volume"));
}

#[test]
fn empty_recipe_is_a_validation_error() {
    let mut recipe = Recipe::new("empty");
    let mut rng = rand_pcg::Pcg32::new(0xcafe_f00d_d15e_a5e5, 0x0a02_bdbf_7bb3_c0a7);
    let err = balance(&mut recipe, &mut rng, &Default::default())
        .expect_err("an empty recipe must not balance");
    assert!(matches!(err, MixError::EmptyRecipe));
    assert!(err.is_validation());

    let err = compile(&recipe, &CompileSettings::default()).expect_err("nor compile");
    assert!(err.is_validation());
}

#[test]
fn empty_track_is_rejected_with_its_index() {
    let recipe = recipe_with(vec![
        Track::new(0).with_clip(Clip::fixed("a.wav", 3.0)),
        Track::new(5),
    ]);
    let err = compile(&recipe, &CompileSettings::default()).expect_err("empty track");
    assert!(matches!(err, MixError::EmptyTrack { track: 5 }));
}

#[test]
fn duplicate_filenames_get_distinct_labels() {
    let recipe = recipe_with(vec![
        Track::new(0)
            .with_clip(Clip::fixed("rain.wav", 3.0))
            .with_clip(Clip::fixed("rain.wav", 3.0)),
        Track::new(1).with_clip(Clip::fixed("rain.wav", 3.0)),
    ]);
    let graph = compile(&recipe, &CompileSettings::default()).expect("recipe should compile");

    let ingest_labels: Vec<_> = graph
        .stages
        .iter()
        .filter(|stage| stage.is_ingest())
        .map(|stage| stage.output.as_str())
        .collect();
    assert_eq!(ingest_labels, vec!["in_rainwav", "in_rainwav_t0c1", "in_rainwav_t1c0"]);
    let indices: Vec<_> = graph.inputs.iter().map(|input| input.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn effects_follow_volume_in_declaration_order() {
    let mut track = Track::new(0)
        .with_clip(
            Clip::fixed("bell.wav", 3.0)
                .with_volume(50.0)
                .with_effect(Effect::Reverse)
                .with_effect(Effect::Faraway { with_volume: true }),
        )
        .with_volume(120.0);
    track.effects.push(Effect::Loop { count: 2 });
    let graph = compile(&recipe_with(vec![track]), &CompileSettings::default())
        .expect("recipe should compile");

    assert_eq!(
        filters(&graph),
        vec![
            "input", "volume", "areverse", "volume", "lowpass", "aecho", "concat", "volume",
            "aloop", "amix"
        ]
    );
    let outputs: Vec<_> = graph.stages.iter().map(|stage| stage.output.as_str()).collect();
    assert_eq!(
        outputs,
        vec![
            "in_bellwav",
            "in_bellwav_volume",
            "in_bellwav_backward",
            "in_bellwav_faraway_volume",
            "in_bellwav_faraway_lowpass",
            "in_bellwav_faraway_reverb",
            "track0_concat",
            "track0_volume",
            "track0_loop",
            "out",
        ]
    );
    assert_eq!(graph.duration_mode, DurationMode::Shortest);
}

#[test]
fn silence_and_elastic_clips_render_timed_sources() {
    let recipe = recipe_with(vec![
        Track::new(2)
            .with_clip(Clip::silence(1.5, 1.5))
            .with_clip(Clip::elastic("bed.wav", 4.0, 9.0)),
    ]);
    let graph = compile(&recipe, &CompileSettings::default()).expect("recipe should compile");

    assert_eq!(
        graph.render(),
        "aevalsrc=duration=1.5:exprs=0[silence_t2c0];\
         [0:a]anull[in_bedwav];\
         [in_bedwav]atrim=duration=4[in_bedwav_trim];\
         [silence_t2c0][in_bedwav_trim]concat=a=1:n=2:v=0[track2_concat];\
         [track2_concat]amix=duration=longest:inputs=1[out]"
    );
    FilterGraph::verify_order(&graph.stages).expect("compiled graphs are ordered");
}

#[test]
fn explicit_track_mode_overrides_loop_default() {
    let mut first = Track::new(0).with_clip(Clip::fixed("a.wav", 2.0).with_effect(Effect::Loop {
        count: -1,
    }));
    first.effects.push(Effect::MixDuration {
        mode: DurationMode::Shortest,
    });
    let mut second = Track::new(1).with_clip(Clip::fixed("b.wav", 2.0));
    second.effects.push(Effect::MixDuration {
        mode: DurationMode::First,
    });

    let graph = compile(&recipe_with(vec![first, second]), &CompileSettings::default())
        .expect("recipe should compile");
    assert_eq!(graph.duration_mode, DurationMode::First);
    assert_eq!(
        graph.stages.last().and_then(|stage| stage.params.get("duration")),
        Some(&ParamValue::Text("first".to_string()))
    );
}

#[test]
fn silence_clips_run_through_gain_and_effects_like_file_clips() {
    let track = Track::new(0)
        .with_clip(Clip::fixed("voice.wav", 4.0))
        .with_clip(
            Clip::silence(2.0, 2.0)
                .with_volume(50.0)
                .with_effect(Effect::Reverse),
        );
    let graph = compile(&recipe_with(vec![track]), &CompileSettings::default())
        .expect("recipe should compile");

    assert_eq!(
        filters(&graph),
        vec!["input", "aevalsrc", "volume", "areverse", "concat", "amix"]
    );
    assert_eq!(
        graph.stages[3].inputs,
        vec!["silence_t0c1_volume".to_string()]
    );
    assert_eq!(
        graph.stages[4].inputs,
        vec!["in_voicewav".to_string(), "silence_t0c1_backward".to_string()]
    );
    assert_eq!(graph.inputs.len(), 1);
}
