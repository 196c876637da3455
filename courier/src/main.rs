use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracker::backend::BackendError;
use tracker::coordinator::{Resolution, ResolutionState, TrackingCoordinator};
use tracker::local_cache::StoreError;
use tracker::normalize::TrackingKey;
use tracker::share_link::{self, ShareTokenError};
use tracker::types::{RecordError, TrackingRecord};
use url::Url;

mod config;
mod render;
mod telemetry;

use config::Config;

#[derive(Parser)]
#[command(name = "courier", about = "Look up and share shipment tracking records")]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Resolve a tracking code
    Track { code: String },
    /// Resolve a share link
    Open { url: Url },
    /// Print a share link for a tracking code
    Share {
        code: String,
        /// Overrides `tracker.share.base_url`
        #[arg(long)]
        base_url: Option<Url>,
        /// Link to a live lookup of the code instead of a snapshot
        #[arg(long)]
        live: bool,
    },
    /// Store a record read from a JSON file
    Save { file: PathBuf },
    /// Remove a record from the local cache
    Delete { code: String },
    /// List the records in the local cache
    List,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("could not start runtime: {0}")]
    Runtime(std::io::Error),
    #[error("could not set up remote backends: {0}")]
    Backend(#[from] BackendError),
    #[error("local cache error: {0}")]
    Store(#[from] StoreError),
    #[error("could not build share link: {0}")]
    Share(#[from] ShareTokenError),
    #[error("could not read {path:?}: {source}")]
    Input {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("not a tracking record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid tracking record: {0}")]
    InvalidRecord(#[from] RecordError),
    #[error("no share base URL configured, pass --base-url")]
    MissingBaseUrl,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match Config::from_file(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("{err}");
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };

    let _sentry = telemetry::init_logging(config.logging.as_ref());
    if let Some(metrics) = &config.metrics {
        telemetry::init_metrics(metrics);
    }

    match run(cli.command, &config) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: CliCommand, config: &Config) -> Result<ExitCode, CliError> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    rt.block_on(run_async(command, config))
}

async fn run_async(command: CliCommand, config: &Config) -> Result<ExitCode, CliError> {
    let coordinator = tracker::build(&config.tracker)?;
    execute(command, &coordinator, config).await
}

async fn execute(
    command: CliCommand,
    coordinator: &TrackingCoordinator,
    config: &Config,
) -> Result<ExitCode, CliError> {
    match command {
        CliCommand::Track { code } => {
            let resolution = coordinator.resolve(&code, None);
            Ok(follow(coordinator, resolution).await)
        }
        CliCommand::Open { url } => match coordinator.open_link(&url) {
            Some(resolution) => Ok(follow(coordinator, resolution).await),
            None => {
                println!("The link {url} does not point to a tracking record.");
                Ok(ExitCode::FAILURE)
            }
        },
        CliCommand::Share {
            code,
            base_url,
            live,
        } => {
            let base = base_url
                .or_else(|| config.tracker.share.base_url.clone())
                .ok_or(CliError::MissingBaseUrl)?;

            if live {
                let key = TrackingKey::new(&code);
                if key.is_empty() {
                    println!("{}", render::not_found(&key));
                    return Ok(ExitCode::FAILURE);
                }
                println!("{}", share_link::build_code_link(&base, &key));
                return Ok(ExitCode::SUCCESS);
            }

            match coordinator.share_link(&base, &code).await? {
                Some(link) => {
                    println!("{link}");
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    println!("{}", render::not_found(&TrackingKey::new(&code)));
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        CliCommand::Save { file } => {
            let raw = std::fs::read_to_string(&file).map_err(|source| CliError::Input {
                path: file.clone(),
                source,
            })?;
            let record: TrackingRecord = serde_json::from_str(&raw)?;
            record.validate()?;

            let key = record.key();
            if coordinator.save(record).await? {
                println!("Saved {key}");
            } else if coordinator.cloud().is_enabled() {
                println!("Saved {key} locally; no remote backend accepted it");
            } else {
                println!("Saved {key} locally");
            }
            Ok(ExitCode::SUCCESS)
        }
        CliCommand::Delete { code } => {
            let key = TrackingKey::new(&code);
            if coordinator.delete(&code)? {
                println!("Deleted {key}");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("{}", render::not_found(&key));
                Ok(ExitCode::FAILURE)
            }
        }
        CliCommand::List => {
            for record in coordinator.local().get_all()? {
                println!("{}", render::summary_line(&record));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Prints the initial state, waits for the remote lookup and prints the
/// final state if it changed.
async fn follow(coordinator: &TrackingCoordinator, resolution: Resolution) -> ExitCode {
    let initial = coordinator.state();
    println!("{}", render::state(&initial));

    let state = if initial.is_pending() {
        resolution.settled().await;
        let settled = coordinator.state();
        println!("{}", render::state(&settled));
        settled
    } else {
        initial
    };

    match state {
        ResolutionState::NotFound { .. } => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    }
}
