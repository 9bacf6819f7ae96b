use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use airsheet::config::Settings;
use airsheet::{
    AirsheetError, CsvFileSink, FetchOrchestrator, GoogleSheetSink, KeyPool, LocationFetcher, OpenWeatherClient,
    OutputSink, locations, logging,
};

/// Publish a weather and air-pollution snapshot for a list of locations
#[derive(Debug, Parser)]
#[command(name = "airsheet", version, about)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, env = "AIRSHEET_CONFIG")]
    config: Option<PathBuf>,

    /// Location CSV, path or URL
    #[arg(long)]
    locations: Option<String>,

    /// Write the snapshot to this CSV file instead of the spreadsheet
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Fetch everything but do not publish
    #[arg(long)]
    dry_run: bool,

    /// Debug logging for this crate
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load_layers(cli.config.clone())?;
    if let Some(source) = cli.locations.clone() {
        settings.run.locations = source;
    }
    if let Some(path) = cli.csv.clone() {
        settings.output.sheet_url = None;
        settings.output.csv_path = Some(path);
    }
    settings.validate()?;

    logging::init(&settings.logging, cli.verbose);
    info!(
        config = %Settings::describe_source(cli.config.as_deref()),
        keys = settings.openweather.api_keys.len(),
        "Starting snapshot run"
    );

    if let Err(err) = run(&settings, cli.dry_run).await {
        match err.downcast_ref::<AirsheetError>() {
            Some(cause) => error!(detail = %format!("{err:#}"), "{}", cause.user_message()),
            None => error!("Run failed: {err:#}"),
        }
        return Err(err);
    }
    Ok(())
}

async fn run(settings: &Settings, dry_run: bool) -> Result<()> {
    // The sink is built first so bad credentials abort before any fetch.
    let sink = build_sink(settings).await?;
    let locations = locations::load(&settings.run.locations, settings.openweather.timeout())
        .await
        .with_context(|| format!("Failed to load locations from {}", settings.run.locations))?;

    let weather = &settings.openweather;
    let pool = Arc::new(KeyPool::new(
        &weather.api_keys,
        weather.key_ceiling,
        weather.cooldown(),
    )?);
    let client = OpenWeatherClient::new(weather)?;
    let fetcher = LocationFetcher::new(client, pool, weather.icon_base_url.clone())
        .with_max_attempts(weather.max_attempts);

    let table = FetchOrchestrator::new(fetcher, sink)
        .with_concurrency(settings.run.concurrency)
        .dry_run(dry_run)
        .run(&locations)
        .await?;

    info!(
        rows = table.len(),
        requested = locations.len(),
        "Run complete"
    );
    Ok(())
}

async fn build_sink(settings: &Settings) -> Result<Box<dyn OutputSink>> {
    let output = &settings.output;
    match (&output.sheet_url, &output.service_account_json, &output.csv_path) {
        (Some(url), Some(service_account), _) => {
            let sink = GoogleSheetSink::connect(
                url,
                service_account,
                &output.worksheet,
                settings.openweather.timeout(),
            )
            .await?;
            Ok(Box::new(sink))
        }
        (_, _, Some(path)) => Ok(Box::new(CsvFileSink::new(path))),
        _ => anyhow::bail!("No usable output sink configured"),
    }
}
