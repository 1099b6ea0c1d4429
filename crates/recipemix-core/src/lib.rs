pub mod balance;
pub mod compile;
pub mod config;
pub mod diagnostics;
pub mod effects;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod fixtures;
pub mod graph;
pub mod labels;
pub mod model;
pub mod persistence;
pub mod recipe;
pub mod render;

pub use balance::{
    Allocation, BalanceOptions, BalanceReport, BalanceWarning, allocate_elastic, balance,
    balance_track_to, select_reference,
};
pub use compile::{CompileSettings, CompiledGraph, MixInput, compile, mix_duration_mode};
pub use config::MixConfig;
pub use diagnostics::{TelemetryGuard, init_tracing, init_tracing_from_config};
pub use effects::{DurationMode, Effect, WavePreset, builtin_wave_presets};
pub use engine::{ClipKind, MixEngine, MixPlan, TimedClip, TrackTiming};
pub use error::MixError;
pub use fingerprint::plan_fingerprint;
pub use graph::{FilterGraph, ParamValue, Stage};
pub use labels::LabelAllocator;
pub use model::{Clip, ClipSource, ClipTiming, Recipe, Track};
pub use persistence::{load_plan, load_recipe, save_plan, save_recipe};
pub use recipe::{RecipeDocument, parse_recipe, validate_recipe};
pub use render::{ffmpeg_args, mix_filename, render_mix};
