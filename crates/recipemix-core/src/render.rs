use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::{Context, Result};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    config::{MixConfig, OutputConfig},
    engine::MixPlan,
};

/// Full ffmpeg argument list for rendering `plan` to `output_path`.
#[must_use]
pub fn ffmpeg_args(plan: &MixPlan, output: &OutputConfig, output_path: &Path) -> Vec<String> {
    let mut args: Vec<String> = ["-y", "-hide_banner", "-loglevel", "error"]
        .into_iter()
        .map(str::to_string)
        .collect();

    for input in &plan.inputs {
        args.push("-i".to_string());
        args.push(input.path.to_string_lossy().into_owned());
    }

    args.extend([
        "-filter_complex".to_string(),
        plan.filter_graph(),
        "-map".to_string(),
        format!("[{}]", plan.final_label),
        "-codec:a".to_string(),
        output.codec.clone(),
        "-b:a".to_string(),
        output.bitrate.clone(),
        "-ac".to_string(),
        output.channels.to_string(),
        "-ar".to_string(),
        output.sample_rate.to_string(),
        output_path.to_string_lossy().into_owned(),
    ]);
    args
}

/// `{mix_id}_{title}` reduced to filename-safe characters, whitespace runs
/// collapsed to `_`, with the output format as extension.
#[must_use]
pub fn mix_filename(mix_id: &Uuid, title: &str, format: &str) -> String {
    let raw = format!("{mix_id}_{title}");
    let kept: String = raw
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || "_-(). ".contains(*ch) || ch.is_whitespace())
        .collect();
    let mut stem = String::with_capacity(kept.len());
    let mut in_whitespace = false;
    for ch in kept.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                stem.push('_');
            }
            in_whitespace = true;
        } else {
            stem.push(ch);
            in_whitespace = false;
        }
    }
    format!("{stem}.{format}")
}

#[instrument(skip(plan, config), fields(mix_id = %plan.mix_id, output_dir = %output_dir.display()))]
pub fn render_mix(plan: &MixPlan, config: &MixConfig, output_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_dir).with_context(|| {
        format!(
            "failed to create mix output directory: {}",
            output_dir.display()
        )
    })?;

    let output_path = output_dir.join(mix_filename(
        &plan.mix_id,
        &plan.title,
        &config.output.format,
    ));
    let ffmpeg = &config.export.ffmpeg_binary;
    let status = Command::new(ffmpeg)
        .args(ffmpeg_args(plan, &config.output, &output_path))
        .status()
        .with_context(|| format!("failed to spawn ffmpeg: {ffmpeg}"))?;

    if !status.success() {
        return Err(anyhow::anyhow!(
            "ffmpeg exited with status {} while rendering mix {}",
            status,
            plan.mix_id
        ));
    }

    info!(path = %output_path.display(), "mix rendered");
    Ok(output_path)
}
