use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::{
    error::MixError,
    model::{ClipTiming, Recipe, Track},
    recipe::validate_recipe,
};

pub const DEFAULT_MAX_ITERATIONS: usize = 100;
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BalanceOptions {
    pub max_iterations: usize,
    pub tolerance: f64,
    /// Keep every rescaled clip inside its own `[min, max]` envelope.
    pub clamp_to_bounds: bool,
}

impl Default for BalanceOptions {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            clamp_to_bounds: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BalanceWarning {
    NotConverged {
        track: usize,
        target: f64,
        achieved: f64,
        iterations: usize,
    },
    OutOfBounds {
        track: usize,
        clip: usize,
        duration: f64,
        min_length: f64,
        max_length: f64,
    },
}

impl fmt::Display for BalanceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConverged {
                track,
                target,
                achieved,
                iterations,
            } => write!(
                f,
                "track {track} reached {achieved:.6}s of {target:.6}s after {iterations} iterations"
            ),
            Self::OutOfBounds {
                track,
                clip,
                duration,
                min_length,
                max_length,
            } => write!(
                f,
                "track {track} clip {clip} duration {duration:.6}s is outside [{min_length}, {max_length}]"
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BalanceReport {
    pub reference: usize,
    pub mix_duration: f64,
    pub warnings: Vec<BalanceWarning>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Allocation {
    pub iterations: usize,
    pub residual: f64,
    pub converged: bool,
}

/// Balances all tracks in place and returns the reference track's maximum
/// length along with any non-fatal warnings.
#[instrument(skip(recipe, rng, options), fields(title = %recipe.title, tracks = recipe.tracks.len()))]
pub fn balance<R: Rng + ?Sized>(
    recipe: &mut Recipe,
    rng: &mut R,
    options: &BalanceOptions,
) -> Result<BalanceReport, MixError> {
    validate_recipe(recipe)?;

    for track in &mut recipe.tracks {
        reset_to_minimum(track);
        track.refresh_envelope();
    }

    let reference = select_reference(&recipe.tracks).ok_or(MixError::EmptyRecipe)?;
    let mix_duration = recipe.tracks[reference].max_length;
    info!(
        reference_track = recipe.tracks[reference].index,
        mix_duration, "reference track selected"
    );

    let mut warnings = Vec::new();
    for (position, track) in recipe.tracks.iter_mut().enumerate() {
        if position == reference {
            fill_to_maximum(track);
        } else {
            let needed_extra = mix_duration - track.min_length;
            if needed_extra <= 0.0 {
                debug!(
                    track = track.index,
                    min_length = track.min_length,
                    "track reaches reference at its minimum"
                );
            } else {
                let target_extra = needed_extra.min(track.slack());
                if let Some(warning) = adjust_track(track, target_extra, rng, options) {
                    warnings.push(warning);
                }
            }
        }

        warnings.extend(bounds_warnings(track, options.tolerance));
        track.refresh_envelope();
        debug!(
            track = track.index,
            duration = track.duration,
            min_length = track.min_length,
            max_length = track.max_length,
            "track balanced"
        );
    }

    Ok(BalanceReport {
        reference,
        mix_duration,
        warnings,
    })
}

/// Allocates elastic durations so the track totals `target_duration`,
/// limited to what its elastic clips can supply.
pub fn balance_track_to<R: Rng + ?Sized>(
    track: &mut Track,
    target_duration: f64,
    rng: &mut R,
    options: &BalanceOptions,
) -> Option<BalanceWarning> {
    reset_to_minimum(track);
    track.refresh_envelope();
    let target_extra = (target_duration - track.min_length).clamp(0.0, track.slack());
    let warning = adjust_track(track, target_extra, rng, options);
    track.refresh_envelope();
    warning
}

fn adjust_track<R: Rng + ?Sized>(
    track: &mut Track,
    target_extra: f64,
    rng: &mut R,
    options: &BalanceOptions,
) -> Option<BalanceWarning> {
    if target_extra <= 0.0 || track.elastic_clip_count() == 0 {
        return None;
    }

    let target = track.min_length + target_extra;
    let allocation = allocate_elastic(track, target_extra, rng, options);
    debug!(
        track = track.index,
        target,
        iterations = allocation.iterations,
        residual = allocation.residual,
        "elastic clips allocated"
    );
    if allocation.converged {
        return None;
    }

    let achieved = target - allocation.residual;
    warn!(
        track = track.index,
        target,
        achieved,
        iterations = allocation.iterations,
        "elastic durations did not converge"
    );
    Some(BalanceWarning::NotConverged {
        track: track.index,
        target,
        achieved,
        iterations: allocation.iterations,
    })
}

/// Position of the track with the greatest maximum length; the first one
/// wins ties.
#[must_use]
pub fn select_reference(tracks: &[Track]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (position, track) in tracks.iter().enumerate() {
        match best {
            Some((_, longest)) if track.max_length <= longest => {}
            _ => best = Some((position, track.max_length)),
        }
    }
    best.map(|(position, _)| position)
}

/// Spreads `target_extra` seconds beyond the elastic minimums over the
/// track's elastic clips.
pub fn allocate_elastic<R: Rng + ?Sized>(
    track: &mut Track,
    target_extra: f64,
    rng: &mut R,
    options: &BalanceOptions,
) -> Allocation {
    let mut elastic: Vec<ElasticSlot<'_>> = track
        .clips
        .iter_mut()
        .filter_map(|clip| match &mut clip.timing {
            ClipTiming::Elastic {
                min_length,
                max_length,
                duration,
            } => Some(ElasticSlot {
                min: *min_length,
                max: *max_length,
                duration,
            }),
            ClipTiming::Fixed { .. } => None,
        })
        .collect();

    let target: f64 = elastic.iter().map(|slot| slot.min).sum::<f64>() + target_extra;
    for slot in &mut elastic {
        *slot.duration = if slot.max > slot.min {
            rng.gen_range(slot.min..=slot.max)
        } else {
            slot.min
        };
    }

    let mut iterations = 0;
    let mut residual = target - elastic_total(&elastic);
    while residual.abs() > options.tolerance && iterations < options.max_iterations {
        iterations += 1;
        if options.clamp_to_bounds {
            rescale_free_slots(&mut elastic, target, residual);
        } else {
            rescale_all_slots(&mut elastic, target, residual);
        }
        residual = target - elastic_total(&elastic);
    }

    Allocation {
        iterations,
        residual,
        converged: residual.abs() <= options.tolerance,
    }
}

struct ElasticSlot<'a> {
    min: f64,
    max: f64,
    duration: &'a mut f64,
}

impl ElasticSlot<'_> {
    fn pinned(&self, growing: bool) -> bool {
        if growing {
            *self.duration >= self.max
        } else {
            *self.duration <= self.min
        }
    }

    fn headroom(&self, growing: bool) -> f64 {
        if growing {
            self.max - *self.duration
        } else {
            *self.duration - self.min
        }
    }
}

fn elastic_total(slots: &[ElasticSlot<'_>]) -> f64 {
    slots.iter().map(|slot| *slot.duration).sum()
}

fn rescale_all_slots(slots: &mut [ElasticSlot<'_>], target: f64, residual: f64) {
    let total = elastic_total(slots);
    if total <= f64::EPSILON {
        spread_evenly(slots, residual);
        return;
    }
    let factor = target / total;
    for slot in slots {
        *slot.duration *= factor;
    }
}

fn rescale_free_slots(slots: &mut [ElasticSlot<'_>], target: f64, residual: f64) {
    let growing = residual > 0.0;
    let (pinned, free): (f64, f64) = slots.iter().fold((0.0, 0.0), |(pinned, free), slot| {
        if slot.pinned(growing) {
            (pinned + *slot.duration, free)
        } else {
            (pinned, free + *slot.duration)
        }
    });

    if free <= f64::EPSILON {
        spread_by_headroom(slots, residual, growing);
        return;
    }

    let factor = (target - pinned) / free;
    for slot in slots.iter_mut().filter(|slot| !slot.pinned(growing)) {
        *slot.duration = (*slot.duration * factor).clamp(slot.min, slot.max);
    }
}

fn spread_evenly(slots: &mut [ElasticSlot<'_>], residual: f64) {
    if slots.is_empty() {
        return;
    }
    let share = residual / slots.len() as f64;
    for slot in slots {
        *slot.duration += share;
    }
}

fn spread_by_headroom(slots: &mut [ElasticSlot<'_>], residual: f64, growing: bool) {
    let headroom: f64 = slots.iter().map(|slot| slot.headroom(growing)).sum();
    if headroom <= f64::EPSILON {
        return;
    }
    for slot in slots {
        let share = residual * slot.headroom(growing) / headroom;
        *slot.duration = (*slot.duration + share).clamp(slot.min, slot.max);
    }
}

fn reset_to_minimum(track: &mut Track) {
    for clip in &mut track.clips {
        if let ClipTiming::Elastic {
            min_length,
            duration,
            ..
        } = &mut clip.timing
        {
            *duration = *min_length;
        }
    }
}

fn fill_to_maximum(track: &mut Track) {
    for clip in &mut track.clips {
        if let ClipTiming::Elastic {
            max_length,
            duration,
            ..
        } = &mut clip.timing
        {
            *duration = *max_length;
        }
    }
}

fn bounds_warnings(track: &Track, tolerance: f64) -> Vec<BalanceWarning> {
    track
        .clips
        .iter()
        .enumerate()
        .filter_map(|(position, clip)| match clip.timing {
            ClipTiming::Elastic {
                min_length,
                max_length,
                duration,
            } if duration < min_length - tolerance || duration > max_length + tolerance => {
                Some(BalanceWarning::OutOfBounds {
                    track: track.index,
                    clip: position,
                    duration,
                    min_length,
                    max_length,
                })
            }
            _ => None,
        })
        .collect()
}
