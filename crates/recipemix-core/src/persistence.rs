use std::{fs, io::Write, path::Path};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, instrument};

use crate::{
    engine::MixPlan,
    model::Recipe,
    recipe::{RecipeObject, parse_recipe},
};

#[instrument(fields(path = %path.display()))]
pub fn load_recipe(path: &Path) -> Result<Recipe> {
    let content =
        fs::read(path).with_context(|| format!("failed to read recipe: {}", path.display()))?;
    let recipe = parse_recipe(&content)
        .with_context(|| format!("invalid recipe: {}", path.display()))?;
    info!(
        title = %recipe.title,
        tracks = recipe.tracks.len(),
        "recipe loaded"
    );
    Ok(recipe)
}

/// Writes `recipe` in its document form so [`load_recipe`] reads it back.
#[instrument(skip(recipe), fields(title = %recipe.title, path = %path.display()))]
pub fn save_recipe(path: &Path, recipe: &Recipe) -> Result<()> {
    write_json_atomic(path, &RecipeObject::from(recipe), "recipe")?;
    info!("recipe saved");
    Ok(())
}

#[instrument(skip(plan), fields(mix_id = %plan.mix_id, path = %path.display()))]
pub fn save_plan(path: &Path, plan: &MixPlan) -> Result<()> {
    write_json_atomic(path, plan, "plan")?;
    info!("plan saved");
    Ok(())
}

#[instrument(fields(path = %path.display()))]
pub fn load_plan(path: &Path) -> Result<MixPlan> {
    let content =
        fs::read(path).with_context(|| format!("failed to read plan: {}", path.display()))?;
    let plan: MixPlan = serde_json::from_slice(&content).context("invalid plan json")?;
    info!(mix_id = %plan.mix_id, "plan loaded");
    Ok(plan)
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T, what: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }

    let json =
        serde_json::to_vec_pretty(value).with_context(|| format!("failed to serialize {what}"))?;
    let mut temp_file = tempfile::NamedTempFile::new_in(
        path.parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new(".")),
    )
    .with_context(|| format!("failed to create temp {what} file"))?;

    temp_file
        .write_all(&json)
        .with_context(|| format!("failed to write temp {what} file"))?;
    temp_file
        .persist(path)
        .map_err(|error| anyhow::anyhow!(error.error))
        .with_context(|| format!("failed to persist {what}: {}", path.display()))?;
    Ok(())
}
