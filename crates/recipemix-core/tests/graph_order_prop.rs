use std::collections::HashSet;

use proptest::prelude::*;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use recipemix_core::{
    BalanceOptions, Clip, ClipTiming, CompileSettings, Effect, FilterGraph, Recipe, Track,
    balance, compile, persistence::load_recipe,
};

fn clip_strategy() -> impl Strategy<Value = Clip> {
    let names = prop::sample::select(vec!["rain.wav", "rain-wav", "bird.mp3", "!!!", "wind.ogg"]);
    let effect = prop::sample::select(vec![
        None,
        Some(Effect::Reverse),
        Some(Effect::Loop { count: 2 }),
        Some(Effect::Faraway { with_volume: false }),
        Some(Effect::Wave {
            preset: "main".to_string(),
        }),
    ]);
    (
        names,
        0u8..3,
        0.5f64..20.0,
        0.0f64..30.0,
        prop::option::of(0.0f64..200.0),
        effect,
    )
        .prop_map(|(name, kind, first, spread, volume, effect)| {
            let mut clip = match kind {
                0 => Clip::fixed(name, first),
                1 => Clip::elastic(name, first, first + spread),
                _ => Clip::silence(first, first + spread),
            };
            clip.volume = volume;
            clip.effects.extend(effect);
            clip
        })
}

fn recipe_strategy() -> impl Strategy<Value = Recipe> {
    prop::collection::vec(
        (prop::collection::vec(clip_strategy(), 1..5), prop::option::of(0.0f64..200.0)),
        1..5,
    )
    .prop_map(|tracks| {
        let mut recipe = Recipe::new("generated");
        for (index, (clips, volume)) in tracks.into_iter().enumerate() {
            let mut track = Track::new(index);
            track.clips = clips;
            track.volume = volume;
            track.refresh_envelope();
            recipe.tracks.push(track);
        }
        recipe
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 96,
        .. ProptestConfig::default()
    })]

    #[test]
    fn compiled_stages_only_consume_earlier_labels(recipe in recipe_strategy(), seed in any::<u64>()) {
        let mut recipe = recipe;
        balance(&mut recipe, &mut Pcg32::seed_from_u64(seed), &BalanceOptions::default())
            .expect("generated recipes are valid");
        let graph = compile(&recipe, &CompileSettings::default()).expect("compile");

        prop_assert!(FilterGraph::verify_order(&graph.stages).is_ok());
        let mut produced = HashSet::new();
        for stage in &graph.stages {
            for input in &stage.inputs {
                prop_assert!(produced.contains(input.as_str()), "{input} used before production");
            }
            prop_assert!(produced.insert(stage.output.as_str()), "{} produced twice", stage.output);
        }
        prop_assert_eq!(graph.stages.last().map(|stage| stage.output.as_str()), Some(graph.final_label.as_str()));
        prop_assert_eq!(graph.inputs.len(), recipe.file_clip_count());
    }

    #[test]
    fn balanced_elastic_clips_stay_inside_their_bounds(recipe in recipe_strategy(), seed in any::<u64>()) {
        let mut recipe = recipe;
        let options = BalanceOptions::default();
        let report = balance(&mut recipe, &mut Pcg32::seed_from_u64(seed), &options)
            .expect("generated recipes are valid");

        for track in &recipe.tracks {
            prop_assert!(track.duration <= report.mix_duration + options.tolerance);
            for clip in &track.clips {
                if let ClipTiming::Elastic { min_length, max_length, duration } = clip.timing {
                    prop_assert!(duration >= min_length - options.tolerance);
                    prop_assert!(duration <= max_length + options.tolerance);
                }
            }
        }
        prop_assert!((recipe.tracks[report.reference].duration - report.mix_duration).abs() <= options.tolerance);
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    #[test]
    fn random_recipe_bytes_do_not_panic(raw in prop::collection::vec(any::<u8>(), 0..2048)) {
        let temp = tempfile::tempdir().expect("tempdir should be creatable");
        let path = temp.path().join("random.recipe.json");
        std::fs::write(&path, raw).expect("writing random payload should work");
        let outcome = std::panic::catch_unwind(|| {
            let _ = load_recipe(&path);
        });
        prop_assert!(outcome.is_ok());
    }
}
