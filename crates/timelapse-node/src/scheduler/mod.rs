//! Cron-driven job scheduling
//!
//! Every camera gets two independent jobs, one for snapshots and one for
//! timelapses. Each job runs its own timer loop; firings are spawned so a
//! slow run never delays another job's tick.

pub mod expression;
pub mod job;

pub use expression::{normalize_expression, parse_schedule, CronSchedule};
pub use job::{FireOutcome, JobAction, JobDescriptor, JobKind};

use chrono::Local;
use common::config::AppConfig;
use common::cameras::CameraConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use telemetry::metrics::SCHEDULED_JOBS;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::capture::{HttpTransport, SnapshotFetcher};
use crate::error::ScheduleError;

#[derive(Debug)]
pub struct Scheduler {
  jobs: Vec<Arc<JobDescriptor>>,
  metrics_file: Option<PathBuf>,
}

fn register(
  camera: &Arc<CameraConfig>,
  action: JobAction,
  expression: &str,
  output_dir: &Path,
) -> Result<JobDescriptor, ScheduleError> {
  let kind = action.kind();
  let schedule = parse_schedule(expression).map_err(|e| ScheduleError::Registration {
    camera: camera.name().to_string(),
    job: kind.to_string(),
    expression: expression.to_string(),
    reason: match e {
      ScheduleError::Expression { reason, .. } => reason,
      other => other.to_string(),
    },
  })?;

  debug!(camera = %camera.name(), job = %kind, expression, "registered job");

  Ok(JobDescriptor::new(
    Arc::clone(camera),
    action,
    expression.to_string(),
    schedule,
    output_dir.to_path_buf(),
  ))
}

impl Scheduler {
  /// Register both jobs for every camera, each with its own HTTP client.
  pub fn from_config(config: &AppConfig) -> Result<Self, ScheduleError> {
    Self::build(config, |camera| {
      SnapshotFetcher::for_camera(camera).map_err(|e| ScheduleError::Client {
        camera: camera.name().to_string(),
        reason: e.to_string(),
      })
    })
  }

  /// Register both jobs for every camera, sharing one transport.
  pub fn with_transport(
    config: &AppConfig,
    transport: Arc<dyn HttpTransport>,
  ) -> Result<Self, ScheduleError> {
    Self::build(config, |_| Ok(SnapshotFetcher::new(Arc::clone(&transport))))
  }

  fn build<F>(config: &AppConfig, mut fetcher_for: F) -> Result<Self, ScheduleError>
  where
    F: FnMut(&CameraConfig) -> Result<SnapshotFetcher, ScheduleError>,
  {
    let mut jobs = Vec::with_capacity(config.cameras.len() * 2);

    for camera in &config.cameras {
      let camera = Arc::new(camera.clone());
      let fetcher = fetcher_for(&camera)?;

      jobs.push(Arc::new(register(
        &camera,
        JobAction::Snapshot(fetcher),
        &camera.interval,
        &config.output_dir,
      )?));
      jobs.push(Arc::new(register(
        &camera,
        JobAction::Timelapse,
        &camera.timelapse_interval,
        &config.output_dir,
      )?));
    }

    Ok(Self {
      jobs,
      metrics_file: None,
    })
  }

  /// Rewrite a Prometheus textfile after every job run.
  pub fn with_metrics_file(mut self, path: impl Into<PathBuf>) -> Self {
    self.metrics_file = Some(path.into());
    self
  }

  pub fn jobs(&self) -> &[Arc<JobDescriptor>] {
    &self.jobs
  }

  /// Run every job on its schedule until `shutdown` is cancelled, then wait
  /// for in-flight runs to finish.
  pub async fn run(self, shutdown: CancellationToken) {
    let tracker = TaskTracker::new();
    let metrics_file = self.metrics_file.map(Arc::new);

    SCHEDULED_JOBS.set(self.jobs.len() as i64);
    info!(jobs = self.jobs.len(), "scheduler started");

    for job in self.jobs {
      tracker.spawn(job_loop(
        job,
        tracker.clone(),
        shutdown.clone(),
        metrics_file.clone(),
      ));
    }

    shutdown.cancelled().await;
    info!(in_flight = tracker.len(), "shutdown requested, waiting for running jobs");

    tracker.close();
    tracker.wait().await;
    SCHEDULED_JOBS.set(0);
    info!("scheduler stopped");
  }
}

async fn job_loop(
  job: Arc<JobDescriptor>,
  runs: TaskTracker,
  shutdown: CancellationToken,
  metrics_file: Option<Arc<PathBuf>>,
) {
  let mut cursor = Local::now();

  loop {
    let Some(next) = job.schedule().after(&cursor).next() else {
      warn!(
        camera = %job.camera().name(),
        job = %job.kind(),
        expression = job.expression(),
        "schedule has no upcoming ticks, stopping job"
      );
      return;
    };

    let wait = (next - Local::now()).to_std().unwrap_or(Duration::ZERO);
    tokio::select! {
      _ = shutdown.cancelled() => return,
      _ = tokio::time::sleep(wait) => {}
    }
    cursor = next.max(Local::now());

    let job = Arc::clone(&job);
    let metrics_file = metrics_file.clone();
    runs.spawn(async move {
      // Failures are already logged inside the job span.
      if let FireOutcome::Failed(e) = job.fire().await {
        debug!(error = %e, "job failed, waiting for next tick");
      }

      if let Some(path) = metrics_file {
        if let Err(e) = telemetry::write_textfile(&path) {
          warn!(path = %path.display(), error = %e, "failed to write metrics file");
        }
      }
    });
  }
}
