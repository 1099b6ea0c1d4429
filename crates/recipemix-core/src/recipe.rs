use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, instrument, warn};

use crate::{
    effects::Effect,
    error::MixError,
    model::{Clip, ClipSource, ClipTiming, Recipe, Track},
};

const SILENCE_CLASSIFICATION: &str = "silence";

#[derive(Debug, Clone)]
pub enum RecipeDocument {
    Object(RecipeObject),
    /// Legacy form: a bare array of records, some of which are tracks.
    Records(Vec<serde_json::Value>),
}

impl RecipeDocument {
    pub fn from_value(value: serde_json::Value) -> Result<Self, MixError> {
        match value {
            serde_json::Value::Array(records) => Ok(Self::Records(records)),
            other => serde_json::from_value(other)
                .map(Self::Object)
                .map_err(|error| MixError::recipe(format!("invalid recipe document: {error}"))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecipeObject {
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "track", deserialize_with = "one_or_many")]
    pub tracks: Vec<TrackRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    #[serde(default, alias = "clip", deserialize_with = "one_or_many")]
    pub clips: Vec<ClipRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(
        default,
        alias = "effect",
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub effects: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(
        default,
        alias = "classifications",
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub classification: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, alias = "min_length", skip_serializing_if = "Option::is_none")]
    pub min_length: Option<f64>,
    #[serde(default, alias = "max_length", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(
        default,
        alias = "effect",
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub effects: Vec<String>,
    #[serde(
        default,
        alias = "length",
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub clip_length: Vec<serde_json::Value>,
}

impl ClipRecord {
    #[must_use]
    pub fn is_silence(&self) -> bool {
        self.classification
            .iter()
            .any(|class| class.eq_ignore_ascii_case(SILENCE_CLASSIFICATION))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(match Option::<OneOrMany<T>>::deserialize(deserializer)? {
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
        None => Vec::new(),
    })
}

#[instrument(skip(bytes), fields(bytes = bytes.len()))]
pub fn parse_recipe(bytes: &[u8]) -> Result<Recipe, MixError> {
    let value: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|error| MixError::recipe(format!("invalid recipe json: {error}")))?;
    Recipe::from_document(RecipeDocument::from_value(value)?)
}

impl Recipe {
    pub fn from_document(document: RecipeDocument) -> Result<Self, MixError> {
        let object = match document {
            RecipeDocument::Object(object) => object,
            RecipeDocument::Records(records) => legacy_records(records)?,
        };

        let mut recipe = Recipe::new(object.title);
        for (position, record) in object.tracks.into_iter().enumerate() {
            recipe.tracks.push(track_from_record(position, record)?);
        }

        validate_recipe(&recipe)?;
        debug!(
            tracks = recipe.tracks.len(),
            clips = recipe.clip_count(),
            "recipe document normalized"
        );
        Ok(recipe)
    }
}

impl From<&Recipe> for RecipeObject {
    fn from(recipe: &Recipe) -> Self {
        Self {
            title: recipe.title.clone(),
            tracks: recipe.tracks.iter().map(TrackRecord::from).collect(),
        }
    }
}

impl From<&Track> for TrackRecord {
    fn from(track: &Track) -> Self {
        Self {
            track: Some(track.index),
            index: None,
            clips: track.clips.iter().map(ClipRecord::from).collect(),
            volume: track.volume,
            effects: track.effects.iter().map(ToString::to_string).collect(),
        }
    }
}

impl From<&Clip> for ClipRecord {
    fn from(clip: &Clip) -> Self {
        let (filename, classification) = match &clip.source {
            ClipSource::File { filename } => (Some(filename.clone()), Vec::new()),
            ClipSource::Silence => (None, vec![SILENCE_CLASSIFICATION.to_string()]),
        };
        let (duration, min_length, max_length) = match clip.timing {
            ClipTiming::Fixed { duration } => (Some(duration), None, None),
            ClipTiming::Elastic {
                min_length,
                max_length,
                ..
            } => (None, Some(min_length), Some(max_length)),
        };

        Self {
            filename,
            classification,
            duration,
            min_length,
            max_length,
            volume: clip.volume,
            effects: clip.effects.iter().map(ToString::to_string).collect(),
            clip_length: Vec::new(),
        }
    }
}

/// Bare arrays keep only the records that carry a `track` key.
fn legacy_records(records: Vec<serde_json::Value>) -> Result<RecipeObject, MixError> {
    let total = records.len();
    let mut tracks = Vec::new();
    for record in records {
        if record.get("track").is_none() {
            continue;
        }
        let track: TrackRecord = serde_json::from_value(record)
            .map_err(|error| MixError::recipe(format!("invalid track record: {error}")))?;
        tracks.push(track);
    }
    if tracks.len() < total {
        warn!(
            ignored = total - tracks.len(),
            "ignored recipe records without a track key"
        );
    }

    Ok(RecipeObject {
        title: String::new(),
        tracks,
    })
}

fn track_from_record(position: usize, record: TrackRecord) -> Result<Track, MixError> {
    let index = record.index.or(record.track).unwrap_or(position);
    let mut track = Track::new(index);
    track.volume = record.volume;
    track.effects = parse_effects(&record.effects)
        .map_err(|reason| MixError::track(index, reason))?;

    for (clip_position, clip) in record.clips.into_iter().enumerate() {
        track.clips.push(clip_from_record(index, clip_position, clip)?);
    }
    track.refresh_envelope();
    Ok(track)
}

fn clip_from_record(track: usize, position: usize, record: ClipRecord) -> Result<Clip, MixError> {
    let source = if record.is_silence() {
        ClipSource::Silence
    } else {
        match record.filename.as_deref().map(str::trim) {
            Some(filename) if !filename.is_empty() => ClipSource::File {
                filename: filename.to_string(),
            },
            _ => return Err(MixError::clip(track, position, "clip has no filename")),
        }
    };

    let timing = match (record.duration, record.min_length, record.max_length) {
        (Some(duration), _, _) => ClipTiming::Fixed { duration },
        (None, Some(min_length), Some(max_length)) => ClipTiming::elastic(min_length, max_length),
        (None, Some(_), None) | (None, None, Some(_)) => {
            return Err(MixError::clip(
                track,
                position,
                "elastic clip needs both minLength and maxLength",
            ));
        }
        (None, None, None) => {
            return Err(MixError::clip(
                track,
                position,
                "clip needs a duration or a minLength/maxLength pair",
            ));
        }
    };

    let effects =
        parse_effects(&record.effects).map_err(|reason| MixError::clip(track, position, reason))?;
    if effects.iter().any(Effect::is_mix_mode) {
        return Err(MixError::clip(
            track,
            position,
            "mix duration effects are only valid on tracks",
        ));
    }

    Ok(Clip {
        source,
        timing,
        volume: record.volume,
        effects,
    })
}

fn parse_effects(raw: &[String]) -> Result<Vec<Effect>, String> {
    raw.iter().map(|effect| effect.parse::<Effect>()).collect()
}

/// Structural checks shared by the document loader, the balancer and the
/// compiler.
pub fn validate_recipe(recipe: &Recipe) -> Result<(), MixError> {
    if recipe.tracks.is_empty() {
        return Err(MixError::EmptyRecipe);
    }

    let mut seen = HashSet::with_capacity(recipe.tracks.len());
    for track in &recipe.tracks {
        if !seen.insert(track.index) {
            return Err(MixError::track(track.index, "duplicate track index"));
        }
        if track.clips.is_empty() {
            return Err(MixError::EmptyTrack { track: track.index });
        }
        validate_volume(track.volume).map_err(|reason| MixError::track(track.index, reason))?;

        for (position, clip) in track.clips.iter().enumerate() {
            validate_clip(clip).map_err(|reason| MixError::clip(track.index, position, reason))?;
        }
    }
    Ok(())
}

fn validate_clip(clip: &Clip) -> Result<(), String> {
    if let ClipSource::File { filename } = &clip.source
        && filename.trim().is_empty()
    {
        return Err("clip has no filename".to_string());
    }

    match clip.timing {
        ClipTiming::Fixed { duration } => {
            if !duration.is_finite() || duration <= 0.0 {
                return Err(format!("duration must be positive, got {duration}"));
            }
        }
        ClipTiming::Elastic {
            min_length,
            max_length,
            ..
        } => {
            if !min_length.is_finite() || min_length < 0.0 {
                return Err(format!("minLength must be non-negative, got {min_length}"));
            }
            if !max_length.is_finite() || max_length < min_length {
                return Err(format!(
                    "maxLength {max_length} must not be below minLength {min_length}"
                ));
            }
            if max_length <= 0.0 {
                return Err("maxLength must be positive".to_string());
            }
        }
    }

    validate_volume(clip.volume)
}

fn validate_volume(volume: Option<f64>) -> Result<(), String> {
    match volume {
        Some(gain) if !gain.is_finite() || gain < 0.0 => {
            Err(format!("volume must be a non-negative percentage, got {gain}"))
        }
        _ => Ok(()),
    }
}
