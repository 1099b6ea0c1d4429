use std::collections::HashSet;

use tracing::debug;

/// Hands out signal labels that are unique within one compilation.
#[derive(Debug, Default)]
pub struct LabelAllocator {
    claimed: HashSet<String>,
}

impl LabelAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// When two clips sanitize to the same base, later ones get their track
    /// and position appended.
    pub fn clip_source(&mut self, filename: &str, track: usize, position: usize) -> String {
        let base = sanitize(filename);
        let base = if base.is_empty() {
            format!("in_t{track}c{position}")
        } else {
            format!("in_{base}")
        };

        if self.claimed.contains(&base) {
            let positional = format!("{base}_t{track}c{position}");
            debug!(%base, label = %positional, "disambiguated clip label");
            return self.claim(&positional);
        }
        self.claim(&base)
    }

    pub fn silence(&mut self, track: usize, position: usize) -> String {
        self.claim(&format!("silence_t{track}c{position}"))
    }

    pub fn derived(&mut self, parent: &str, suffix: &str) -> String {
        self.claim(&format!("{parent}_{suffix}"))
    }

    pub fn track(&mut self, track: usize, suffix: &str) -> String {
        self.claim(&format!("track{track}_{suffix}"))
    }

    /// Claims `requested`, or the first free `requested_<n>` after it.
    pub fn claim(&mut self, requested: &str) -> String {
        let mut label = requested.to_string();
        let mut counter = 1_usize;
        while self.claimed.contains(&label) {
            label = format!("{requested}_{counter}");
            counter += 1;
        }
        self.claimed.insert(label.clone());
        label
    }

    #[must_use]
    pub fn is_claimed(&self, label: &str) -> bool {
        self.claimed.contains(label)
    }
}

#[must_use]
pub fn sanitize(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_alphanumeric).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_everything_but_alphanumerics() {
        assert_eq!(sanitize("rain-loop_01.wav"), "rainloop01wav");
        assert_eq!(sanitize("çà et là.mp3"), "etlmp3");
        assert_eq!(sanitize("..."), "");
    }

    #[test]
    fn colliding_filenames_get_positional_suffixes() {
        let mut labels = LabelAllocator::new();
        assert_eq!(labels.clip_source("rain.wav", 0, 0), "in_rainwav");
        assert_eq!(labels.clip_source("rain.wav", 1, 2), "in_rainwav_t1c2");
        assert_eq!(labels.clip_source("rain-wav", 1, 3), "in_rainwav_t1c3");
    }

    #[test]
    fn empty_sanitized_names_fall_back_to_position() {
        let mut labels = LabelAllocator::new();
        assert_eq!(labels.clip_source("???", 2, 1), "in_t2c1");
    }

    #[test]
    fn claim_never_returns_a_label_twice() {
        let mut labels = LabelAllocator::new();
        let first = labels.claim("out");
        let second = labels.claim("out");
        let third = labels.claim("out");
        assert_eq!(first, "out");
        assert_eq!(second, "out_1");
        assert_eq!(third, "out_2");
        assert!(labels.is_claimed("out_2"));
    }
}
