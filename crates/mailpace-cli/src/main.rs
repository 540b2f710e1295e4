use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mailpace_core::app::{CampaignDriver, DailySchedule, EngineBuilder, EngineSettings};
use mailpace_core::config::CampaignConfig;
use mailpace_core::impls::{
    CsvRecipientStore, DryRunDeliveryClient, FileSessionSource, SystemClock, TomlTemplateSource,
    csv_store,
};
use mailpace_core::ports::Clock;

#[derive(Debug, Parser)]
#[command(name = "mailpace", version, about = "Paced outbound messaging campaigns")]
struct Cli {
    /// Campaign config file; defaults apply when it does not exist.
    #[arg(long, short, global = true, default_value = "mailpace.toml")]
    config: PathBuf,

    /// Debug-level logging for mailpace (RUST_LOG still wins).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one campaign now and print its summary.
    Run,
    /// Print recipient counts.
    Status,
    /// Print today's mode and the next send window.
    Preview,
    /// Run at startup, then every day at `schedule.daily_run_at`, until Ctrl-C.
    Daemon,
    /// Write a starter recipient file.
    SampleCsv {
        #[arg(default_value = "emails.csv")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Command::SampleCsv { path } = &cli.command {
        csv_store::write_sample(path)
            .with_context(|| format!("cannot write sample to {}", path.display()))?;
        println!("wrote {}", path.display());
        return Ok(());
    }

    let config = load_config(&cli.config)?;
    let driver = Arc::new(build_driver(&config)?);

    match cli.command {
        Command::Run => {
            let summary = driver.run_now().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Status => {
            let status = driver
                .get_status()
                .await
                .with_context(|| format!("cannot read {}", config.paths.store.display()))?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Preview => {
            let preview = driver.get_mode_preview(SystemClock.now());
            println!("{}", serde_json::to_string_pretty(&preview)?);
            if let Some(next) = &preview.next_window {
                println!("next window: {next}");
            }
        }
        Command::Daemon => daemon(driver, cli.config, config).await?,
        Command::SampleCsv { .. } => {}
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "mailpace=debug,mailpace_core=debug"
    } else {
        "mailpace=info,mailpace_core=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: &Path) -> Result<CampaignConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file; using defaults");
        return Ok(CampaignConfig::default());
    }
    CampaignConfig::load_from(path)
        .with_context(|| format!("cannot load config {}", path.display()))
}

fn build_driver(config: &CampaignConfig) -> Result<CampaignDriver> {
    let engine = EngineBuilder::new()
        .store(CsvRecipientStore::new(&config.paths.store))
        .client(DryRunDeliveryClient::new(FileSessionSource::new(
            &config.paths.credentials,
        )))
        .templates(TomlTemplateSource::new(&config.paths.templates))
        .clock(Arc::new(SystemClock))
        .settings(EngineSettings::from_config(config))
        .build()?;
    Ok(CampaignDriver::new(Arc::new(engine)))
}

async fn daemon(
    driver: Arc<CampaignDriver>,
    config_path: PathBuf,
    config: CampaignConfig,
) -> Result<()> {
    let tick_driver = Arc::clone(&driver);
    let schedule = DailySchedule::spawn(
        Arc::new(SystemClock),
        config.schedule.daily_run_at,
        true,
        move || {
            let driver = Arc::clone(&tick_driver);
            let config_path = config_path.clone();
            async move {
                // pick up edits without a restart; keep the old settings on error
                match load_config(&config_path) {
                    Ok(config) => driver
                        .engine()
                        .update_settings(EngineSettings::from_config(&config)),
                    Err(e) => tracing::warn!(error = %format!("{e:#}"), "config reload failed"),
                }
                match driver.run_now().await {
                    Ok(summary) => tracing::info!(
                        mode = %summary.mode,
                        sent = summary.total_sent(),
                        failed = summary.failed,
                        message = %summary.message,
                        "scheduled run finished"
                    ),
                    Err(e) => tracing::warn!(error = %e, "scheduled run skipped"),
                }
            }
        },
    );

    tokio::signal::ctrl_c()
        .await
        .context("cannot listen for ctrl-c")?;
    tracing::info!("shutting down");
    driver.cancel();
    schedule.shutdown_and_join().await;
    Ok(())
}
