use crate::{
    effects::{DurationMode, Effect},
    model::{Clip, Recipe, Track},
};

/// A three-track ambience recipe touching every clip kind and effect family.
#[must_use]
pub fn demo_recipe() -> Recipe {
    let mut rain = Track::new(0)
        .with_clip(Clip::elastic("rain.wav", 20.0, 60.0).with_volume(80.0))
        .with_clip(Clip::silence(2.0, 6.0))
        .with_clip(
            Clip::fixed("thunder.wav", 8.0).with_effect(Effect::Faraway { with_volume: true }),
        );
    rain.effects.push(Effect::Wave {
        preset: "main".to_string(),
    });

    let mut birds = Track::new(1)
        .with_clip(Clip::silence(1.0, 10.0))
        .with_clip(Clip::elastic("birds.wav", 10.0, 30.0).with_effect(Effect::Reverse))
        .with_clip(Clip::fixed("wind.wav", 12.0))
        .with_volume(60.0);
    birds.effects.push(Effect::MixDuration {
        mode: DurationMode::Longest,
    });

    let drone = Track::new(2)
        .with_clip(Clip::fixed("drone.wav", 15.0).with_effect(Effect::Loop { count: 3 }));

    let mut recipe = Recipe {
        title: "Night Walk".to_string(),
        tracks: vec![rain, birds, drone],
    };
    for track in &mut recipe.tracks {
        track.refresh_envelope();
    }
    recipe
}
