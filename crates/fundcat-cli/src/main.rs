use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fundcat_sync::{
    build_pipeline, connect_catalog, install_metrics, maybe_build_scheduler, SyncConfig,
    SyncRunSummary,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "fundcat")]
#[command(about = "Fund catalog incremental sync")]
struct Cli {
    /// YAML config file; environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Print the Prometheus exposition on exit; ignored when a metrics listener is configured.
    #[arg(long, global = true)]
    print_metrics: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one incremental sync and print the tally.
    Sync {
        #[arg(long)]
        max_age_days: Option<u32>,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        max_concurrency: Option<usize>,
        /// Print the run summary as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Recompute the 4433 flags without fetching anything.
    Classify,
    /// Refresh manager profiles for a category.
    Managers {
        #[arg(long)]
        category: Option<String>,
    },
    /// Replace the stored stock industry board list.
    Industries,
    Migrate,
    /// Run syncs on the configured interval until interrupted.
    Schedule,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn print_summary(summary: &SyncRunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    println!(
        "sync complete: run_id={} universe={} selected={} success={} error={} skipped={}",
        summary.run_id,
        summary.universe_size,
        summary.selected,
        summary.success_count,
        summary.error_count,
        summary.skipped_count
    );
    for failure in &summary.failures {
        println!("  {} [{}] {}", failure.code, failure.stage, failure.message);
    }
    if let Some(classification) = summary.classification {
        println!(
            "4433: {} of {} funds pass",
            classification.passed, classification.evaluated
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let mut config = SyncConfig::load(cli.config.as_deref())?;
    let metrics = install_metrics(config.metrics.listen_addr.as_deref())?;

    let command = cli.command.unwrap_or(Commands::Sync {
        max_age_days: None,
        batch_size: None,
        max_concurrency: None,
        json: false,
    });
    match command {
        Commands::Sync {
            max_age_days,
            batch_size,
            max_concurrency,
            json,
        } => {
            let run = &mut config.sync;
            run.max_age_days = max_age_days.unwrap_or(run.max_age_days);
            run.batch_size = batch_size.unwrap_or(run.batch_size);
            run.max_concurrency = max_concurrency.unwrap_or(run.max_concurrency).max(1);

            let pipeline = build_pipeline(&config).await?;
            let run = &config.sync;
            let summary = pipeline
                .run_incremental_sync(run.max_age_days, run.batch_size, run.max_concurrency)
                .await?;
            print_summary(&summary, json)?;
        }
        Commands::Classify => {
            let summary = build_pipeline(&config).await?.classify().await?;
            println!(
                "4433: {} of {} funds pass",
                summary.passed, summary.evaluated
            );
        }
        Commands::Managers { category } => {
            let pipeline = build_pipeline(&config).await?;
            let categories = match category {
                Some(category) => vec![category],
                None => config.provider.categories.clone(),
            };
            for category in categories {
                let summary = pipeline.sync_managers(&category).await?;
                println!(
                    "managers {}: fetched={} saved={} failed={}",
                    summary.category, summary.fetched, summary.saved, summary.failed
                );
            }
        }
        Commands::Industries => {
            let summary = build_pipeline(&config).await?.sync_industries().await?;
            println!(
                "industries: fetched={} saved={}",
                summary.fetched, summary.saved
            );
        }
        Commands::Migrate => {
            let catalog = connect_catalog(&config).await?;
            catalog.migrate().await.context("applying migrations")?;
            println!("migrations applied");
        }
        Commands::Schedule => {
            config.scheduler.enabled = true;
            let pipeline = build_pipeline(&config).await?;
            let Some(mut sched) = maybe_build_scheduler(pipeline, &config).await? else {
                return Ok(());
            };
            sched.start().await.context("starting scheduler")?;
            info!(
                interval_secs = config.scheduler.interval_secs,
                trading_days_only = config.scheduler.trading_days_only,
                "scheduler running; ctrl-c to stop"
            );
            tokio::signal::ctrl_c()
                .await
                .context("waiting for ctrl-c")?;
            sched.shutdown().await.context("stopping scheduler")?;
        }
    }

    if let (true, Some(handle)) = (cli.print_metrics, metrics) {
        print!("{}", handle.render());
    }
    Ok(())
}
