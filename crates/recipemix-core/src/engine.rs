use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    balance::balance,
    compile::{CompileSettings, MixInput, compile},
    config::MixConfig,
    effects::DurationMode,
    error::MixError,
    fingerprint::plan_fingerprint,
    graph::{FilterGraph, Stage},
    model::{ClipSource, ClipTiming, Recipe},
    recipe::validate_recipe,
};

/// Everything the render step needs, plus the timing that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MixPlan {
    pub mix_id: Uuid,
    pub title: String,
    pub seed: u64,
    pub mix_duration: f64,
    pub duration_mode: DurationMode,
    pub inputs: Vec<MixInput>,
    pub stages: Vec<Stage>,
    pub final_label: String,
    pub timing: Vec<TrackTiming>,
    pub warnings: Vec<String>,
    pub fingerprint: String,
}

impl MixPlan {
    #[must_use]
    pub fn filter_graph(&self) -> String {
        FilterGraph::render(&self.stages)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackTiming {
    pub index: usize,
    pub duration: f64,
    pub min_length: f64,
    pub max_length: f64,
    pub reference: bool,
    pub clips: Vec<TimedClip>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClipKind {
    Fixed,
    Elastic,
    Silence,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimedClip {
    pub position: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub kind: ClipKind,
    pub duration: f64,
    pub min_length: f64,
    pub max_length: f64,
}

/// Stateless apart from its configuration; every plan gets a fresh
/// generator.
#[derive(Debug, Clone)]
pub struct MixEngine {
    config: MixConfig,
    settings: CompileSettings,
}

impl Default for MixEngine {
    fn default() -> Self {
        Self::new(MixConfig::default())
    }
}

impl MixEngine {
    #[must_use]
    pub fn new(config: MixConfig) -> Self {
        let settings = config.compile_settings();
        Self { config, settings }
    }

    #[must_use]
    pub fn config(&self) -> &MixConfig {
        &self.config
    }

    /// Validates, balances and compiles `recipe`. Without a seed one is drawn
    /// from OS entropy; either way it is recorded in the plan.
    #[instrument(skip(self, recipe), fields(title = %recipe.title, tracks = recipe.tracks.len()))]
    pub fn plan(&self, recipe: &Recipe, seed: Option<u64>) -> Result<MixPlan, MixError> {
        validate_recipe(recipe)?;

        let seed = seed.unwrap_or_else(rand::random);
        let mut rng = Pcg32::seed_from_u64(seed);
        let mut balanced = recipe.clone();
        let report = balance(&mut balanced, &mut rng, &self.config.balance)?;
        let graph = compile(&balanced, &self.settings)?;

        let timing = balanced
            .tracks
            .iter()
            .enumerate()
            .map(|(position, track)| TrackTiming {
                index: track.index,
                duration: track.duration,
                min_length: track.min_length,
                max_length: track.max_length,
                reference: position == report.reference,
                clips: track
                    .clips
                    .iter()
                    .enumerate()
                    .map(|(position, clip)| TimedClip {
                        position,
                        filename: clip.filename().map(str::to_string),
                        kind: match (&clip.source, clip.timing) {
                            (ClipSource::Silence, _) => ClipKind::Silence,
                            (_, ClipTiming::Fixed { .. }) => ClipKind::Fixed,
                            (_, ClipTiming::Elastic { .. }) => ClipKind::Elastic,
                        },
                        duration: clip.timing.duration(),
                        min_length: clip.timing.min_length(),
                        max_length: clip.timing.max_length(),
                    })
                    .collect(),
            })
            .collect();

        let fingerprint = plan_fingerprint(&graph.stages, &graph.inputs, &graph.final_label);
        let plan = MixPlan {
            mix_id: Uuid::new_v4(),
            title: balanced.title,
            seed,
            mix_duration: report.mix_duration,
            duration_mode: graph.duration_mode,
            inputs: graph.inputs,
            stages: graph.stages,
            final_label: graph.final_label,
            timing,
            warnings: report
                .warnings
                .iter()
                .map(ToString::to_string)
                .collect(),
            fingerprint,
        };

        info!(
            mix_id = %plan.mix_id,
            seed,
            stages = plan.stages.len(),
            mix_duration = plan.mix_duration,
            warnings = plan.warnings.len(),
            "mix planned"
        );
        Ok(plan)
    }
}
