use anyhow::{Context, Result};
use backend::{CommandExecutor, CommandRunner, RunReport};
use chrono::Utc;
use clap::Parser;
use common::cli::{Cli, Command, utils};
use common::config::{Configuration, normalize_volume};
use policy::Plan;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on CLI arguments
    utils::init_logging(&cli.common);

    let config = utils::load_config(&cli.common)?;

    match cli.command {
        Command::Run { dry_run, volumes } => {
            run(&config, dry_run || config.dry_run, &volumes).await
        }
        Command::Plan { json, volumes } => plan(&config, json, &volumes).await,
        Command::Config { json } => utils::display_config(&config, json),
        Command::Validate => {
            utils::validate_config(&config)?;
            println!("Configuration is valid");
            Ok(())
        }
    }
}

async fn run(config: &Configuration, dry_run: bool, volumes: &[String]) -> Result<()> {
    if dry_run {
        tracing::info!("Dry run: no snapshot will be created or deleted");
    }
    let runner: Arc<dyn CommandRunner> = Arc::new(CommandExecutor::new(dry_run));

    let mut failed = 0;
    for volume in volumes {
        let volume = normalize_volume(volume);
        match snapshot(config, &volume, runner.clone()).await {
            Ok(report) => tracing::info!(
                volume = %volume,
                created = report.created,
                deleted = report.deleted,
                "Volume done"
            ),
            Err(e) => {
                tracing::error!(volume = %volume, "{e:#}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} volume(s) failed", volumes.len());
    }
    Ok(())
}

async fn snapshot(
    config: &Configuration,
    volume: &str,
    runner: Arc<dyn CommandRunner>,
) -> Result<RunReport> {
    let settings = config.volume(volume)?;
    let backend = backend::for_volume(volume, settings.options, config, runner)
        .await
        .context("Failed to open volume")?;
    let policy = settings.keep_policy(Utc::now());
    let report = backend::snapshot_volume(backend.as_ref(), &policy).await?;
    Ok(report)
}

async fn plan(config: &Configuration, json: bool, volumes: &[String]) -> Result<()> {
    // Listing commands still run in dry-run mode; nothing else does.
    let runner: Arc<dyn CommandRunner> = Arc::new(CommandExecutor::new(true));

    let mut plans = Vec::with_capacity(volumes.len());
    for volume in volumes {
        let volume = normalize_volume(volume);
        let settings = config.volume(&volume)?;
        let backend = backend::for_volume(&volume, settings.options, config, runner.clone())
            .await
            .with_context(|| format!("Failed to open volume {volume}"))?;
        let plan = backend::plan_volume(backend.as_ref(), &settings.keep_policy(Utc::now()))
            .await
            .with_context(|| format!("Failed to plan volume {volume}"))?;
        plans.push((volume, plan));
    }

    if json {
        println!("{}", plans_to_json(&plans)?);
    } else {
        for (volume, plan) in &plans {
            print!("{}", render_plan(volume, plan));
        }
    }
    Ok(())
}

fn render_plan(volume: &str, plan: &Plan) -> String {
    let mut out = format!("{volume}:\n");
    if plan.is_empty() {
        out.push_str("  nothing to do\n");
    }
    for action in plan {
        out.push_str(&format!("  {action}\n"));
    }
    out
}

fn plans_to_json(plans: &[(String, Plan)]) -> Result<String> {
    let value: Vec<_> = plans
        .iter()
        .map(|(volume, plan)| serde_json::json!({ "volume": volume, "actions": plan }))
        .collect();
    serde_json::to_string_pretty(&value).context("Failed to serialize plan to JSON")
}
