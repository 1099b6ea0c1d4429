use serde::{Deserialize, Serialize};

use crate::effects::Effect;

/// Recipe volumes are percentages; 100 leaves the signal untouched.
pub const UNITY_VOLUME: f64 = 100.0;
const VOLUME_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recipe {
    pub title: String,
    pub tracks: Vec<Track>,
}

impl Recipe {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            tracks: Vec::new(),
        }
    }

    #[must_use]
    pub fn clip_count(&self) -> usize {
        self.tracks.iter().map(|track| track.clips.len()).sum()
    }

    #[must_use]
    pub fn file_clip_count(&self) -> usize {
        self.tracks
            .iter()
            .flat_map(|track| track.clips.iter())
            .filter(|clip| !clip.is_silence())
            .count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub index: usize,
    pub clips: Vec<Clip>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<Effect>,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub min_length: f64,
    #[serde(default)]
    pub max_length: f64,
}

impl Track {
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self {
            index,
            clips: Vec::new(),
            volume: None,
            effects: Vec::new(),
            duration: 0.0,
            min_length: 0.0,
            max_length: 0.0,
        }
    }

    #[must_use]
    pub fn with_clip(mut self, clip: Clip) -> Self {
        self.clips.push(clip);
        self
    }

    #[must_use]
    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Recomputes `duration`, `min_length` and `max_length` from the clips.
    pub fn refresh_envelope(&mut self) {
        self.duration = self.clips.iter().map(|clip| clip.timing.duration()).sum();
        self.min_length = self.clips.iter().map(|clip| clip.timing.min_length()).sum();
        self.max_length = self.clips.iter().map(|clip| clip.timing.max_length()).sum();
    }

    #[must_use]
    pub fn slack(&self) -> f64 {
        (self.max_length - self.min_length).max(0.0)
    }

    #[must_use]
    pub fn elastic_clip_count(&self) -> usize {
        self.clips
            .iter()
            .filter(|clip| clip.timing.is_elastic())
            .count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClipSource {
    File { filename: String },
    Silence,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    pub source: ClipSource,
    pub timing: ClipTiming,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<Effect>,
}

impl Clip {
    #[must_use]
    pub fn fixed(filename: impl Into<String>, duration: f64) -> Self {
        Self {
            source: ClipSource::File {
                filename: filename.into(),
            },
            timing: ClipTiming::Fixed { duration },
            volume: None,
            effects: Vec::new(),
        }
    }

    #[must_use]
    pub fn elastic(filename: impl Into<String>, min_length: f64, max_length: f64) -> Self {
        Self {
            source: ClipSource::File {
                filename: filename.into(),
            },
            timing: ClipTiming::elastic(min_length, max_length),
            volume: None,
            effects: Vec::new(),
        }
    }

    #[must_use]
    pub fn silence(min_length: f64, max_length: f64) -> Self {
        Self {
            source: ClipSource::Silence,
            timing: ClipTiming::elastic(min_length, max_length),
            volume: None,
            effects: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        match &self.source {
            ClipSource::File { filename } => Some(filename),
            ClipSource::Silence => None,
        }
    }

    #[must_use]
    pub fn is_silence(&self) -> bool {
        matches!(self.source, ClipSource::Silence)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClipTiming {
    Fixed {
        duration: f64,
    },
    #[serde(rename_all = "camelCase")]
    Elastic {
        min_length: f64,
        max_length: f64,
        duration: f64,
    },
}

impl ClipTiming {
    /// An elastic timing whose duration starts at its minimum.
    #[must_use]
    pub fn elastic(min_length: f64, max_length: f64) -> Self {
        Self::Elastic {
            min_length,
            max_length,
            duration: min_length,
        }
    }

    #[must_use]
    pub fn duration(&self) -> f64 {
        match *self {
            Self::Fixed { duration } | Self::Elastic { duration, .. } => duration,
        }
    }

    #[must_use]
    pub fn min_length(&self) -> f64 {
        match *self {
            Self::Fixed { duration } => duration,
            Self::Elastic { min_length, .. } => min_length,
        }
    }

    #[must_use]
    pub fn max_length(&self) -> f64 {
        match *self {
            Self::Fixed { duration } => duration,
            Self::Elastic { max_length, .. } => max_length,
        }
    }

    #[must_use]
    pub fn is_elastic(&self) -> bool {
        matches!(self, Self::Elastic { .. })
    }
}

/// Linear gain factor for a recipe volume, or `None` when it is neutral.
#[must_use]
pub fn effective_gain(volume: Option<f64>) -> Option<f64> {
    volume
        .filter(|volume| (volume - UNITY_VOLUME).abs() > VOLUME_EPSILON)
        .map(|volume| volume / UNITY_VOLUME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_sums_fixed_and_elastic_bounds() {
        let mut track = Track::new(0)
            .with_clip(Clip::fixed("intro.wav", 4.0))
            .with_clip(Clip::silence(1.0, 3.0))
            .with_clip(Clip::elastic("bed.wav", 2.0, 10.0));
        track.refresh_envelope();

        assert_eq!(track.min_length, 7.0);
        assert_eq!(track.max_length, 17.0);
        assert_eq!(track.duration, 7.0);
        assert_eq!(track.slack(), 10.0);
        assert_eq!(track.elastic_clip_count(), 2);
    }

    #[test]
    fn unity_and_missing_volume_are_neutral() {
        assert_eq!(effective_gain(None), None);
        assert_eq!(effective_gain(Some(100.0)), None);
        assert_eq!(effective_gain(Some(50.0)), Some(0.5));
        assert_eq!(effective_gain(Some(1.0)), Some(0.01));
    }
}
