use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use price_scout::{PriceDiscoveryPipeline, ScoutDeps};
use price_scout_common::{load_config, AppConfig, PriceScoutError, Query, ScoutConfig};

#[derive(Parser)]
#[command(name = "price-scout", about = "Find current prices for a product across retailers")]
struct Cli {
    /// Product to price, e.g. "iPhone 16 Pro, 128GB"
    query: String,

    /// Country to search from (two-letter code, e.g. US)
    #[arg(long)]
    country: String,

    /// Path to config TOML file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("price_scout=info".parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn invalid_input(e: &PriceScoutError) -> ExitCode {
    error!(error = %e, "Invalid input");
    eprintln!("error: {e}");
    ExitCode::from(2)
}

async fn run(cli: Cli) -> Result<ExitCode> {
    // Bad input is reported as such even when the environment is incomplete.
    if let Err(e) = Query::new(cli.query.as_str(), cli.country.as_str()) {
        return Ok(invalid_input(&e));
    }

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ScoutConfig::default(),
    };
    let app = AppConfig::from_env()?;

    let deps = ScoutDeps::from_config(&app, &config)?;
    let pipeline = PriceDiscoveryPipeline::from_deps(deps, &config);

    match pipeline.run(&cli.query, &cli.country).await {
        Ok(response) => {
            let json = serde_json::to_string_pretty(&response)
                .context("Failed to serialize response")?;
            println!("{json}");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_input_error() => Ok(invalid_input(&e)),
        Err(e) => {
            error!(error = %e, "Price discovery failed");
            eprintln!("error: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_tracing(cli.json_logs) {
        eprintln!("error: {e:#}");
        return ExitCode::FAILURE;
    }

    info!("price-scout starting");
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Startup failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
