use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    effects::{DurationMode, Effect, WavePreset, builtin_wave_presets},
    error::MixError,
    graph::{FilterGraph, ParamValue, Stage},
    labels::LabelAllocator,
    model::{Clip, ClipSource, Recipe, Track, effective_gain},
    recipe::validate_recipe,
};

pub const FINAL_LABEL: &str = "out";

#[derive(Debug, Clone)]
pub struct CompileSettings {
    pub content_dir: PathBuf,
    pub wave_presets: BTreeMap<String, WavePreset>,
}

impl Default for CompileSettings {
    fn default() -> Self {
        Self {
            content_dir: PathBuf::from("content"),
            wave_presets: builtin_wave_presets(),
        }
    }
}

/// One `-i` argument for the render engine, in input-index order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MixInput {
    pub index: usize,
    pub path: PathBuf,
    pub track: usize,
    pub clip: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompiledGraph {
    pub stages: Vec<Stage>,
    pub final_label: String,
    pub inputs: Vec<MixInput>,
    pub duration_mode: DurationMode,
}

impl CompiledGraph {
    #[must_use]
    pub fn render(&self) -> String {
        FilterGraph::render(&self.stages)
    }
}

#[instrument(skip_all, fields(title = %recipe.title, tracks = recipe.tracks.len()))]
pub fn compile(recipe: &Recipe, settings: &CompileSettings) -> Result<CompiledGraph, MixError> {
    validate_recipe(recipe)?;

    let mut compiler = Compiler {
        settings,
        graph: FilterGraph::new(),
        labels: LabelAllocator::new(),
        inputs: Vec::with_capacity(recipe.file_clip_count()),
    };

    let mut track_outputs = Vec::with_capacity(recipe.tracks.len());
    for track in &recipe.tracks {
        track_outputs.push(compiler.compile_track(track)?);
    }

    let duration_mode = mix_duration_mode(recipe);
    let final_label = compiler.labels.claim(FINAL_LABEL);
    compiler.emit(Stage::filter(
        track_outputs,
        "amix",
        BTreeMap::from([
            ("inputs".to_string(), ParamValue::from(recipe.tracks.len())),
            (
                "duration".to_string(),
                ParamValue::Text(duration_mode.as_str().to_string()),
            ),
        ]),
        final_label.clone(),
    ))?;

    let stages = compiler.graph.into_stages();
    FilterGraph::verify_order(&stages)?;
    debug!(
        stages = stages.len(),
        inputs = compiler.inputs.len(),
        mode = %duration_mode,
        "filter graph compiled"
    );

    Ok(CompiledGraph {
        stages,
        final_label,
        inputs: compiler.inputs,
        duration_mode,
    })
}

/// `longest` unless a loop appears anywhere, which forces `shortest`.
/// Explicit track modes then apply in track order; the last one wins.
#[must_use]
pub fn mix_duration_mode(recipe: &Recipe) -> DurationMode {
    let loops = recipe.tracks.iter().any(|track| {
        track
            .effects
            .iter()
            .chain(track.clips.iter().flat_map(|clip| clip.effects.iter()))
            .any(|effect| matches!(effect, Effect::Loop { .. }))
    });
    let mut mode = if loops {
        DurationMode::Shortest
    } else {
        DurationMode::Longest
    };

    for effect in recipe.tracks.iter().flat_map(|track| track.effects.iter()) {
        if let Effect::MixDuration { mode: explicit } = effect {
            mode = *explicit;
        }
    }
    mode
}

struct Compiler<'a> {
    settings: &'a CompileSettings,
    graph: FilterGraph,
    labels: LabelAllocator,
    inputs: Vec<MixInput>,
}

impl Compiler<'_> {
    fn compile_track(&mut self, track: &Track) -> Result<String, MixError> {
        let mut clip_outputs = Vec::with_capacity(track.clips.len());
        for (position, clip) in track.clips.iter().enumerate() {
            clip_outputs.push(self.compile_clip(track.index, position, clip)?);
        }

        let concat_label = self.labels.track(track.index, "concat");
        let mut label = self.emit(Stage::filter(
            clip_outputs,
            "concat",
            BTreeMap::from([
                ("n".to_string(), ParamValue::from(track.clips.len())),
                ("v".to_string(), ParamValue::Int(0)),
                ("a".to_string(), ParamValue::Int(1)),
            ]),
            concat_label,
        ))?;

        if let Some(gain) = effective_gain(track.volume) {
            let output = self.labels.track(track.index, "volume");
            label = self.emit(volume_stage(label, gain, output))?;
        }

        let base = format!("track{}", track.index);
        self.apply_effects(&base, label, &track.effects)
    }

    fn compile_clip(
        &mut self,
        track: usize,
        position: usize,
        clip: &Clip,
    ) -> Result<String, MixError> {
        let duration = clip.timing.duration();
        // Both filters read a zero duration as "unbounded".
        if duration <= 0.0 {
            return Err(MixError::clip(
                track,
                position,
                format!("clip resolved to a non-positive duration {duration}"),
            ));
        }

        let (base, mut label) = match &clip.source {
            ClipSource::Silence => {
                let base = self.labels.silence(track, position);
                let label = self.emit(Stage::filter(
                    Vec::new(),
                    "aevalsrc",
                    BTreeMap::from([
                        ("exprs".to_string(), ParamValue::Int(0)),
                        ("duration".to_string(), ParamValue::Float(duration)),
                    ]),
                    base.clone(),
                ))?;
                (base, label)
            }
            ClipSource::File { filename } => {
                let label = self.ingest(track, position, filename)?;
                let base = label.clone();
                if clip.timing.is_elastic() {
                    let output = self.labels.derived(&base, "trim");
                    let trimmed = self.emit(Stage::filter(
                        vec![label],
                        "atrim",
                        BTreeMap::from([("duration".to_string(), ParamValue::Float(duration))]),
                        output,
                    ))?;
                    (base, trimmed)
                } else {
                    (base, label)
                }
            }
        };

        if let Some(gain) = effective_gain(clip.volume) {
            let output = self.labels.derived(&base, "volume");
            label = self.emit(volume_stage(label, gain, output))?;
        }

        self.apply_effects(&base, label, &clip.effects)
    }

    fn ingest(&mut self, track: usize, position: usize, filename: &str) -> Result<String, MixError> {
        let path = resolve_content_path(&self.settings.content_dir, filename);
        let input_index = self.inputs.len();
        let output = self.labels.clip_source(filename, track, position);
        let label = self.emit(Stage::ingest(input_index, &path.to_string_lossy(), output))?;
        self.inputs.push(MixInput {
            index: input_index,
            path,
            track,
            clip: position,
        });
        Ok(label)
    }

    fn apply_effects(
        &mut self,
        base: &str,
        mut label: String,
        effects: &[Effect],
    ) -> Result<String, MixError> {
        for effect in effects {
            for stage in effect.stages(&self.settings.wave_presets) {
                let output = self.labels.derived(base, stage.suffix);
                label = self.emit(Stage::filter(
                    vec![label],
                    stage.filter,
                    stage.params,
                    output,
                ))?;
            }
        }
        Ok(label)
    }

    fn emit(&mut self, stage: Stage) -> Result<String, MixError> {
        debug!(
            filter = stage.filter.as_deref().unwrap_or("input"),
            output = %stage.output,
            "emit stage"
        );
        self.graph.push(stage).map(str::to_string)
    }
}

fn volume_stage(input: String, gain: f64, output: String) -> Stage {
    Stage::filter(
        vec![input],
        "volume",
        BTreeMap::from([("volume".to_string(), ParamValue::Float(gain))]),
        output,
    )
}

/// Absolute filenames are used as-is; relative ones resolve under the
/// content directory.
#[must_use]
pub fn resolve_content_path(content_dir: &Path, filename: &str) -> PathBuf {
    let candidate = Path::new(filename);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        content_dir.join(candidate)
    }
}
