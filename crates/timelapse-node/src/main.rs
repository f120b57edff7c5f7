//! timelapser: periodic camera snapshots and timelapse assembly
//!
//! Usage:
//!   timelapser [run]                      - Schedule every camera until Ctrl-C
//!   timelapser snapshot [--camera NAME]   - Take one snapshot now
//!   timelapser timelapse [--camera NAME]  - Assemble timelapses now
//!   timelapser list                       - List configured cameras
//!   timelapser example-config             - Print an example configuration

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use common::cameras::CameraConfig;
use common::config::AppConfig;
use std::path::{Path, PathBuf};
use telemetry::{LogConfig, LogFormat};
use timelapse_node::runner::{snapshot_all, timelapse_all, BatchReport};
use timelapse_node::Scheduler;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "timelapser", version)]
#[command(about = "Capture camera snapshots on a schedule and assemble them into timelapses", long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Option<Commands>,

  /// Configuration file
  #[arg(long, short, global = true, default_value = "config.yaml", env = "TIMELAPSER_CONFIG")]
  config: PathBuf,

  /// Log level or filter directive (RUST_LOG takes precedence)
  #[arg(long, global = true, default_value = "info")]
  log: String,

  /// Log output format: pretty, compact or json
  #[arg(long, global = true, env = "LOG_FORMAT")]
  log_format: Option<LogFormat>,

  /// Write Prometheus metrics to this file after every run
  #[arg(long, global = true)]
  metrics_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
  /// Run snapshot and timelapse jobs on their schedules until interrupted
  Run,

  /// Take one snapshot now
  Snapshot {
    /// Only this camera (name or directory segment)
    #[arg(long)]
    camera: Option<String>,
  },

  /// Assemble timelapses from the frames collected so far
  Timelapse {
    /// Only this camera (name or directory segment)
    #[arg(long)]
    camera: Option<String>,
  },

  /// List configured cameras
  List,

  /// Print an example configuration file
  ExampleConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  let mut log_config = LogConfig::new("timelapser")
    .with_level(cli.log.as_str())
    .with_version(common::VERSION);
  if let Some(format) = cli.log_format {
    log_config = log_config.with_format(format);
  }
  let _log_guard = telemetry::init_structured_logging(log_config);

  match cli.command.unwrap_or(Commands::Run) {
    Commands::ExampleConfig => {
      print!("{}", common::example_config()?);
      Ok(())
    }
    Commands::Run => {
      let config = load_config(&cli.config)?;
      run_scheduled(&config, cli.metrics_file).await
    }
    Commands::Snapshot { camera } => {
      let config = load_config(&cli.config)?;
      let cameras = select_cameras(&config, camera.as_deref())?;
      let report = snapshot_all(cameras, &config.output_dir, None).await;
      finish(report, cli.metrics_file.as_deref())
    }
    Commands::Timelapse { camera } => {
      let config = load_config(&cli.config)?;
      let cameras = select_cameras(&config, camera.as_deref())?;
      let report = timelapse_all(cameras, &config.output_dir).await;
      finish(report, cli.metrics_file.as_deref())
    }
    Commands::List => {
      let config = load_config(&cli.config)?;
      for camera in &config.cameras {
        println!("{} [{}]", camera.segment(), camera.name());
      }
      Ok(())
    }
  }
}

fn load_config(path: &Path) -> Result<AppConfig> {
  let config = AppConfig::load(path)?;
  info!(
    config = %path.display(),
    output_dir = %config.output_dir.display(),
    cameras = config.cameras.len(),
    "configuration loaded"
  );
  Ok(config)
}

async fn run_scheduled(config: &AppConfig, metrics_file: Option<PathBuf>) -> Result<()> {
  if config.cameras.is_empty() {
    warn!("no cameras configured, nothing to schedule");
  }

  let mut scheduler = Scheduler::from_config(config).context("failed to register jobs")?;
  if let Some(path) = metrics_file {
    scheduler = scheduler.with_metrics_file(path);
  }

  let shutdown = CancellationToken::new();
  let signal = shutdown.clone();
  tokio::spawn(async move {
    match tokio::signal::ctrl_c().await {
      Ok(()) => {
        info!("interrupt received, stopping scheduler");
        signal.cancel();
      }
      Err(e) => error!(error = %e, "failed to listen for interrupt signal"),
    }
  });

  scheduler.run(shutdown).await;
  Ok(())
}

fn select_cameras<'a>(config: &'a AppConfig, camera: Option<&str>) -> Result<Vec<&'a CameraConfig>> {
  match camera {
    None => Ok(config.cameras.iter().collect()),
    Some(name) => match config.find_camera(name) {
      Some(camera) => Ok(vec![camera]),
      None => bail!("camera '{}' not found in configuration", name),
    },
  }
}

fn finish(report: BatchReport, metrics_file: Option<&Path>) -> Result<()> {
  if let Some(path) = metrics_file {
    if let Err(e) = telemetry::write_textfile(path) {
      warn!(path = %path.display(), error = %e, "failed to write metrics file");
    }
  }

  let total = report.succeeded.len() + report.failed.len();
  let failed = report.failed.len();
  for (camera, path) in &report.succeeded {
    info!(camera = %camera, path = %path.display(), "done");
  }

  report
    .into_result()
    .with_context(|| format!("{} of {} cameras failed", failed, total))?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::CommandFactory;

  #[test]
  fn test_cli_definition_is_valid() {
    Cli::command().debug_assert();
  }

  #[test]
  fn test_example_config_needs_no_config_file() {
    let cli = Cli::try_parse_from(["timelapser", "example-config", "--config", "/missing.yaml"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::ExampleConfig)));
    assert!(common::example_config().is_ok());
  }

  #[test]
  fn test_no_subcommand_means_run() {
    let cli = Cli::try_parse_from(["timelapser"]).unwrap();
    assert!(cli.command.is_none());
  }
}
