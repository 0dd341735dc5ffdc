//! CLI entry point for the Civic Value Index.
//!
//! Provides subcommands for running the batch pipeline, serving the
//! read-only query API, and printing the last run's summary.

use anyhow::Result;
use civic_value_index::api::{self, AppState, BundleStore};
use civic_value_index::config::PipelineConfig;
use civic_value_index::insights::{ClaudeGenerator, InsightGenerator};
use civic_value_index::pipeline;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "civic_value_index")]
#[command(about = "Neighborhood analysis over municipal open data", long_about = None)]
struct Cli {
    /// JSON config file; missing keys take defaults
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline and write the output bundle
    Run {
        /// Crime extract CSV
        #[arg(long)]
        crime: Option<PathBuf>,

        /// 311 service request extract CSV
        #[arg(long)]
        service_requests: Option<PathBuf>,

        /// Home value extract CSV (one column per monthly snapshot)
        #[arg(long)]
        home_values: Option<PathBuf>,

        /// Budget transaction extract CSV
        #[arg(long)]
        budget: Option<PathBuf>,

        /// Directory to write the output bundle to
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Skip the AI insight request
        #[arg(long, default_value_t = false)]
        no_insights: bool,
    },
    /// Serve the read-only query API over the last output bundle
    Serve {
        /// Directory holding the output bundle
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0:8000")]
        addr: SocketAddr,
    },
    /// Log the summary of the last run
    Summary {
        /// Directory holding the output bundle
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/civic_value_index.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("civic_value_index.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Run {
            crime,
            service_requests,
            home_values,
            budget,
            output_dir,
            no_insights,
        } => {
            if let Some(p) = crime {
                config.crime_path = p;
            }
            if let Some(p) = service_requests {
                config.service_requests_path = p;
            }
            if home_values.is_some() {
                config.home_values_path = home_values;
            }
            if budget.is_some() {
                config.budget_path = budget;
            }
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if no_insights {
                config.insights.enabled = false;
            }
            config.validate()?;

            let generator = if config.insights.enabled {
                match ClaudeGenerator::from_config(&config.insights) {
                    Ok(g) => Some(g),
                    Err(e) => {
                        warn!(error = %e, "AI insights will be unavailable");
                        None
                    }
                }
            } else {
                None
            };

            let outcome = pipeline::run(
                &config,
                generator.as_ref().map(|g| g as &dyn InsightGenerator),
            )
            .await?;

            info!(
                neighborhoods = outcome.analysis.profiles.len(),
                insights_available = outcome.insights.available,
                reports = outcome.reports.len(),
                results = %outcome.files.results.display(),
                "Pipeline finished"
            );
        }
        Commands::Serve { output_dir, addr } => {
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            let state = AppState::new(&config.output_dir, config.insights.api_key().is_some());
            api::serve(addr, state).await?;
        }
        Commands::Summary { output_dir } => {
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            let summary = BundleStore::read_json(&config.summary_path()).await?;
            info!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
