use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use recipemix_core::{
    MixConfig, MixEngine, MixPlan,
    diagnostics::init_tracing_from_config,
    ffmpeg_args,
    fixtures::demo_recipe,
    mix_filename,
    persistence::{load_recipe, save_plan, save_recipe},
    render_mix,
};

const DEMO_SEED: u64 = 7;

#[derive(Debug, Parser)]
#[command(name = "recipemix-cli")]
#[command(about = "Headless tools for planning and rendering recipe mixes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, default_value = "logs")]
    log_dir: PathBuf,

    /// Config file; defaults to discovery via RECIPEMIX_CONFIG_PATH or the
    /// working directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Balance and compile a recipe, printing or saving the plan.
    Plan {
        #[arg(long)]
        recipe: PathBuf,

        #[arg(long)]
        seed: Option<u64>,

        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Plan a recipe and hand it to ffmpeg.
    Render {
        #[arg(long)]
        recipe: PathBuf,

        #[arg(long)]
        seed: Option<u64>,

        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Print the ffmpeg invocation instead of running it.
        #[arg(long)]
        dry_run: bool,
    },
    /// Write the built-in demo recipe and its plan.
    Demo {
        #[arg(long, default_value = "data/demo")]
        output_dir: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => MixConfig::load_from(path)?,
        None => MixConfig::load_or_default()?,
    };
    let _telemetry = init_tracing_from_config(&cli.log_dir, &config.diagnostics)?;
    let engine = MixEngine::new(config);

    match cli.command {
        Commands::Plan {
            recipe,
            seed,
            output,
        } => {
            let plan = plan_file(&engine, &recipe, seed)?;
            match output {
                Some(path) => {
                    save_plan(&path, &plan)?;
                    tracing::info!(path = %path.display(), "plan written");
                }
                None => println!(
                    "{}",
                    serde_json::to_string_pretty(&plan).context("failed to serialize plan")?
                ),
            }
        }
        Commands::Render {
            recipe,
            seed,
            output_dir,
            dry_run,
        } => {
            let plan = plan_file(&engine, &recipe, seed)?;
            let config = engine.config();
            let output_dir = output_dir.unwrap_or_else(|| config.content.mix_dir.clone());

            if dry_run {
                let output_path = output_dir.join(mix_filename(
                    &plan.mix_id,
                    &plan.title,
                    &config.output.format,
                ));
                let args = ffmpeg_args(&plan, &config.output, &output_path);
                println!("{} {}", config.export.ffmpeg_binary, shell_words(&args));
            } else {
                let path = render_mix(&plan, config, &output_dir)?;
                println!("{}", path.display());
            }
        }
        Commands::Demo { output_dir } => {
            let recipe = demo_recipe();
            let recipe_path = output_dir.join("demo.recipe.json");
            save_recipe(&recipe_path, &recipe)?;
            let plan = engine.plan(&recipe, Some(DEMO_SEED))?;
            let plan_path = output_dir.join("demo.plan.json");
            save_plan(&plan_path, &plan)?;
            tracing::info!(
                recipe = %recipe_path.display(),
                plan = %plan_path.display(),
                fingerprint = %plan.fingerprint,
                "demo written"
            );
        }
    }

    Ok(())
}

fn plan_file(engine: &MixEngine, path: &Path, seed: Option<u64>) -> anyhow::Result<MixPlan> {
    let recipe = load_recipe(path)?;
    let plan = engine
        .plan(&recipe, seed)
        .with_context(|| format!("failed to plan recipe: {}", path.display()))?;
    for warning in &plan.warnings {
        tracing::warn!(%warning, "balance warning");
    }
    Ok(plan)
}

fn shell_words(args: &[String]) -> String {
    args.iter()
        .map(|arg| {
            let needs_quotes = arg.is_empty()
                || arg.contains(|ch: char| ch.is_whitespace() || "'\"[];$".contains(ch));
            if needs_quotes {
                format!("'{}'", arg.replace('\'', r"'\''"))
            } else {
                arg.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
