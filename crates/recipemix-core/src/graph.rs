use std::{
    collections::{BTreeMap, HashSet},
    fmt,
};

use serde::{Deserialize, Serialize};

use crate::error::MixError;

pub const INPUT_PARAM: &str = "input";
pub const PATH_PARAM: &str = "path";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Text(value) => f.write_str(value),
        }
    }
}

impl From<usize> for ParamValue {
    fn from(value: usize) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stage {
    pub inputs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, ParamValue>,
    pub output: String,
}

impl Stage {
    #[must_use]
    pub fn ingest(input_index: usize, path: &str, output: String) -> Self {
        Self {
            inputs: Vec::new(),
            filter: None,
            params: BTreeMap::from([
                (INPUT_PARAM.to_string(), ParamValue::from(input_index)),
                (PATH_PARAM.to_string(), ParamValue::Text(path.to_string())),
            ]),
            output,
        }
    }

    #[must_use]
    pub fn filter(
        inputs: Vec<String>,
        filter: &str,
        params: BTreeMap<String, ParamValue>,
        output: String,
    ) -> Self {
        Self {
            inputs,
            filter: Some(filter.to_string()),
            params,
            output,
        }
    }

    #[must_use]
    pub fn is_ingest(&self) -> bool {
        self.filter.is_none()
    }

    #[must_use]
    pub fn input_index(&self) -> Option<i64> {
        match self.params.get(INPUT_PARAM) {
            Some(ParamValue::Int(index)) if self.is_ingest() => Some(*index),
            _ => None,
        }
    }

    /// Renders one filter-graph chain, e.g. `[a][b]concat=n=2:v=0:a=1[c]`.
    #[must_use]
    pub fn render(&self) -> String {
        let mut chain = String::new();
        match (&self.filter, self.input_index()) {
            (None, Some(index)) => {
                chain.push_str(&format!("[{index}:a]anull"));
            }
            (None, None) => {
                chain.push_str("anull");
            }
            (Some(filter), _) => {
                for input in &self.inputs {
                    chain.push_str(&format!("[{input}]"));
                }
                chain.push_str(filter);
                let options = self
                    .params
                    .iter()
                    .map(|(key, value)| format!("{key}={}", escape_option(&value.to_string())))
                    .collect::<Vec<_>>();
                if !options.is_empty() {
                    chain.push('=');
                    chain.push_str(&options.join(":"));
                }
            }
        }
        chain.push_str(&format!("[{}]", self.output));
        chain
    }
}

fn escape_option(value: &str) -> String {
    const META: &[char] = &[',', ';', '[', ']', ':', '=', '\'', ' ', '\\'];
    if value.contains(META) {
        format!("'{}'", value.replace('\'', r"'\''"))
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FilterGraph {
    stages: Vec<Stage>,
}

impl FilterGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a stage after checking that its output label is fresh and
    /// every input label was produced by an earlier stage.
    pub fn push(&mut self, stage: Stage) -> Result<&str, MixError> {
        if self.stages.iter().any(|existing| existing.output == stage.output) {
            return Err(MixError::LabelCollision {
                label: stage.output,
            });
        }
        if let Some(missing) = stage
            .inputs
            .iter()
            .find(|label| !self.stages.iter().any(|existing| &existing.output == *label))
        {
            return Err(MixError::DanglingLabel {
                stage: self.stages.len(),
                label: missing.clone(),
            });
        }

        self.stages.push(stage);
        Ok(self
            .stages
            .last()
            .map_or("", |stage| stage.output.as_str()))
    }

    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    #[must_use]
    pub fn into_stages(self) -> Vec<Stage> {
        self.stages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Replays the stages in order and fails on the first dangling or
    /// duplicated label.
    pub fn verify_order(stages: &[Stage]) -> Result<(), MixError> {
        let mut produced = HashSet::with_capacity(stages.len());
        for (index, stage) in stages.iter().enumerate() {
            if let Some(missing) = stage
                .inputs
                .iter()
                .find(|label| !produced.contains(label.as_str()))
            {
                return Err(MixError::DanglingLabel {
                    stage: index,
                    label: missing.clone(),
                });
            }
            if !produced.insert(stage.output.as_str()) {
                return Err(MixError::LabelCollision {
                    label: stage.output.clone(),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn render(stages: &[Stage]) -> String {
        stages
            .iter()
            .map(Stage::render)
            .collect::<Vec<_>>()
            .join(";")
    }
}
