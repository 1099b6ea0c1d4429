use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::graph::ParamValue;

pub const DEFAULT_WAVE_PRESET: &str = "default";
const LOOP_FOREVER: i64 = -1;
const LOOP_BUFFER_SAMPLES: i64 = 2_000_000_000;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DurationMode {
    #[default]
    Longest,
    Shortest,
    First,
}

impl DurationMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Longest => "longest",
            Self::Shortest => "shortest",
            Self::First => "first",
        }
    }
}

impl fmt::Display for DurationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Effect {
    Loop { count: i64 },
    Reverse,
    Faraway { with_volume: bool },
    Wave { preset: String },
    MixDuration { mode: DurationMode },
}

impl Effect {
    /// Track-level effects that steer the final mix instead of emitting stages.
    #[must_use]
    pub fn is_mix_mode(&self) -> bool {
        matches!(self, Self::MixDuration { .. })
    }

    #[must_use]
    pub fn stages(&self, presets: &BTreeMap<String, WavePreset>) -> Vec<EffectStage> {
        match self {
            Self::Loop { count } => vec![EffectStage::new(
                "loop",
                "aloop",
                [
                    ("loop", ParamValue::Int(*count)),
                    ("size", ParamValue::Int(LOOP_BUFFER_SAMPLES)),
                ],
            )],
            Self::Reverse => vec![EffectStage::new("backward", "areverse", [])],
            Self::Faraway { with_volume } => {
                let mut stages = Vec::with_capacity(3);
                if *with_volume {
                    stages.push(EffectStage::new(
                        "faraway_volume",
                        "volume",
                        [("volume", ParamValue::Float(0.3))],
                    ));
                }
                stages.push(EffectStage::new(
                    "faraway_lowpass",
                    "lowpass",
                    [("f", ParamValue::Int(1_000)), ("p", ParamValue::Int(2))],
                ));
                stages.push(EffectStage::new(
                    "faraway_reverb",
                    "aecho",
                    [
                        ("in_gain", ParamValue::Float(0.8)),
                        ("out_gain", ParamValue::Float(0.9)),
                        ("delays", ParamValue::Int(50)),
                        ("decays", ParamValue::Float(0.2)),
                    ],
                ));
                stages
            }
            Self::Wave { preset } => {
                let expression = presets
                    .get(preset)
                    .or_else(|| presets.get(DEFAULT_WAVE_PRESET))
                    .map_or_else(
                        || WavePreset::default().expression(),
                        WavePreset::expression,
                    );
                vec![EffectStage::new(
                    "wave",
                    "volume",
                    [
                        ("volume", ParamValue::Text(expression)),
                        ("eval", ParamValue::Text("frame".to_string())),
                    ],
                )]
            }
            Self::MixDuration { .. } => Vec::new(),
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loop { count } if *count == LOOP_FOREVER => f.write_str("loop"),
            Self::Loop { count } => write!(f, "loop({count})"),
            Self::Reverse => f.write_str("reverse"),
            Self::Faraway { with_volume: true } => f.write_str("faraway(vol)"),
            Self::Faraway { with_volume: false } => f.write_str("faraway"),
            Self::Wave { preset } => write!(f, "wave({preset})"),
            Self::MixDuration { mode } => f.write_str(mode.as_str()),
        }
    }
}

impl FromStr for Effect {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        let name_end = input
            .find(|ch: char| !ch.is_ascii_alphabetic())
            .unwrap_or(input.len());
        let (name, rest) = input.split_at(name_end);
        let params = parse_params(rest).ok_or_else(|| format!("malformed effect: {input}"))?;

        match name.to_ascii_lowercase().as_str() {
            "loop" | "repeat" => {
                let count = match params.first() {
                    Some(raw) => raw
                        .parse::<i64>()
                        .map_err(|_| format!("invalid loop count in effect: {input}"))?,
                    None => LOOP_FOREVER,
                };
                Ok(Self::Loop { count })
            }
            "backward" | "reverse" => Ok(Self::Reverse),
            "faraway" | "distant" => Ok(Self::Faraway {
                with_volume: params.iter().any(|param| param.eq_ignore_ascii_case("vol")),
            }),
            "wave" | "noise" => Ok(Self::Wave {
                preset: params
                    .first()
                    .map_or_else(|| DEFAULT_WAVE_PRESET.to_string(), |p| p.to_ascii_lowercase()),
            }),
            "longest" => Ok(Self::MixDuration {
                mode: DurationMode::Longest,
            }),
            "shortest" => Ok(Self::MixDuration {
                mode: DurationMode::Shortest,
            }),
            "first" => Ok(Self::MixDuration {
                mode: DurationMode::First,
            }),
            _ => Err(format!("unknown effect: {input}")),
        }
    }
}

/// Accepts `""`, `"(a, b)"` or `"{a, b}"`.
fn parse_params(rest: &str) -> Option<Vec<String>> {
    if rest.is_empty() {
        return Some(Vec::new());
    }
    let inner = rest
        .strip_prefix('(')
        .and_then(|tail| tail.strip_suffix(')'))
        .or_else(|| rest.strip_prefix('{').and_then(|tail| tail.strip_suffix('}')))?;

    Some(
        inner
            .split(',')
            .map(str::trim)
            .filter(|param| !param.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectStage {
    pub suffix: &'static str,
    pub filter: &'static str,
    pub params: BTreeMap<String, ParamValue>,
}

impl EffectStage {
    fn new<const N: usize>(
        suffix: &'static str,
        filter: &'static str,
        params: [(&str, ParamValue); N],
    ) -> Self {
        Self {
            suffix,
            filter,
            params: params
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WavePreset {
    #[serde(alias = "genFreqFact")]
    pub f: Vec<f64>,
    #[serde(alias = "genAmpFact")]
    pub a: Vec<f64>,
    #[serde(alias = "globFreqFact")]
    pub n: f64,
    #[serde(alias = "globAmpFact")]
    pub s: f64,
    #[serde(alias = "globAmpPolarity")]
    pub p: f64,
    #[serde(alias = "globPreBias")]
    pub o: f64,
    #[serde(alias = "globPostBias")]
    pub q: f64,
}

impl Default for WavePreset {
    fn default() -> Self {
        Self {
            f: vec![13.0, 7.0, 3.0],
            a: vec![1.0, 0.5, 0.25],
            n: 1.0,
            s: 3.0,
            p: 1.0,
            o: -0.5,
            q: 0.5,
        }
    }
}

impl WavePreset {
    /// Renders the preset as an engine expression clamped to `[0, 1]`.
    #[must_use]
    pub fn expression(&self) -> String {
        let generators = self
            .f
            .iter()
            .enumerate()
            .map(|(index, frequency)| {
                let amplitude = self.a.get(index).copied().unwrap_or(1.0);
                format!("cos(PI * t * {} / {frequency}) * {amplitude}", self.n)
            })
            .collect::<Vec<_>>()
            .join(" + ");

        format!(
            "min(1, max(0, (({generators}) + {}) * {} * {} + {}))",
            self.o, self.s, self.p, self.q
        )
    }
}

#[must_use]
pub fn builtin_wave_presets() -> BTreeMap<String, WavePreset> {
    let default = WavePreset::default();
    let main = WavePreset {
        p: -1.0,
        ..WavePreset::default()
    };

    BTreeMap::from([
        (DEFAULT_WAVE_PRESET.to_string(), default.clone()),
        ("main".to_string(), main),
        ("interference".to_string(), default),
    ])
}
