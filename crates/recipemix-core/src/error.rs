use thiserror::Error;

#[derive(Debug, Error)]
pub enum MixError {
    #[error("recipe has no tracks")]
    EmptyRecipe,
    #[error("track {track} has no clips")]
    EmptyTrack { track: usize },
    #[error("invalid recipe at {}: {reason}", location(.track, .clip))]
    Validation {
        track: Option<usize>,
        clip: Option<usize>,
        reason: String,
    },
    #[error("label produced twice: {label}")]
    LabelCollision { label: String },
    #[error("stage {stage} consumes unknown label: {label}")]
    DanglingLabel { stage: usize, label: String },
    #[error("io error: {0}")]
    Io(String),
}

impl MixError {
    pub fn recipe(reason: impl Into<String>) -> Self {
        Self::Validation {
            track: None,
            clip: None,
            reason: reason.into(),
        }
    }

    pub fn track(track: usize, reason: impl Into<String>) -> Self {
        Self::Validation {
            track: Some(track),
            clip: None,
            reason: reason.into(),
        }
    }

    pub fn clip(track: usize, clip: usize, reason: impl Into<String>) -> Self {
        Self::Validation {
            track: Some(track),
            clip: Some(clip),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyRecipe | Self::EmptyTrack { .. } | Self::Validation { .. }
        )
    }
}

impl From<anyhow::Error> for MixError {
    fn from(value: anyhow::Error) -> Self {
        Self::Io(value.to_string())
    }
}

fn location(track: &Option<usize>, clip: &Option<usize>) -> String {
    match (track, clip) {
        (Some(track), Some(clip)) => format!("track {track}, clip {clip}"),
        (Some(track), None) => format!("track {track}"),
        (None, Some(clip)) => format!("clip {clip}"),
        (None, None) => "recipe".to_string(),
    }
}
