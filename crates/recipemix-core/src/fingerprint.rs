use sha2::{Digest, Sha256};

use crate::{
    compile::MixInput,
    graph::{ParamValue, Stage},
};

const DURATION_PARAM: &str = "duration";
const FIELD_SEPARATOR: &[u8] = &[0x1f];
const RECORD_SEPARATOR: &[u8] = &[0x1e];

#[must_use]
pub fn plan_fingerprint(stages: &[Stage], inputs: &[MixInput], final_label: &str) -> String {
    let mut hasher = Sha256::new();

    for input in inputs {
        hasher.update(input.index.to_le_bytes());
        hasher.update(input.path.to_string_lossy().as_bytes());
        hasher.update(RECORD_SEPARATOR);
    }

    for stage in stages {
        hasher.update(stage.filter.as_deref().unwrap_or("").as_bytes());
        hasher.update(FIELD_SEPARATOR);
        for label in &stage.inputs {
            hasher.update(label.as_bytes());
            hasher.update(FIELD_SEPARATOR);
        }
        for (key, value) in &stage.params {
            if is_timing_param(key, value) {
                continue;
            }
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(value.to_string().as_bytes());
            hasher.update(FIELD_SEPARATOR);
        }
        hasher.update(stage.output.as_bytes());
        hasher.update(RECORD_SEPARATOR);
    }

    hasher.update(final_label.as_bytes());
    hex_digest(&hasher.finalize())
}

/// `atrim`/`aevalsrc` carry numeric durations; `amix` carries a textual mode
/// under the same key, which is structural.
fn is_timing_param(key: &str, value: &ParamValue) -> bool {
    key == DURATION_PARAM && matches!(value, ParamValue::Float(_) | ParamValue::Int(_))
}

fn hex_digest(digest: &[u8]) -> String {
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn trim(duration: f64) -> Stage {
        Stage::filter(
            vec!["in_a".to_string()],
            "atrim",
            BTreeMap::from([("duration".to_string(), ParamValue::Float(duration))]),
            "in_a_trim".to_string(),
        )
    }

    #[test]
    fn durations_do_not_change_the_fingerprint() {
        let ingest = Stage::ingest(0, "content/a.wav", "in_a".to_string());
        let short = plan_fingerprint(&[ingest.clone(), trim(2.0)], &[], "in_a_trim");
        let long = plan_fingerprint(&[ingest, trim(7.5)], &[], "in_a_trim");
        assert_eq!(short, long);
        assert_eq!(short.len(), 64);
    }

    #[test]
    fn labels_change_the_fingerprint() {
        let first = plan_fingerprint(
            &[Stage::ingest(0, "content/a.wav", "in_a".to_string())],
            &[],
            "in_a",
        );
        let second = plan_fingerprint(
            &[Stage::ingest(0, "content/a.wav", "in_b".to_string())],
            &[],
            "in_b",
        );
        assert_ne!(first, second);
    }
}
